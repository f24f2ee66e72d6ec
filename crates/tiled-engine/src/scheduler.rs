//! # Decode Scheduler
//!
//! Runs region decodes off the render thread.
//!
//! **Mental Model**:
//! - **Issue**: the frame thread hands out a ticket and a cancellation token
//!   per request and spawns one task on the tokio runtime.
//! - **Debounce**: the task sleeps for the debounce delay (cancellable), then
//!   re-checks the latest published viewport and gives up if its tile left it.
//! - **Decode**: the blocking decode runs on the blocking pool.
//! - **Complete**: the result is queued on a channel. Only the frame thread
//!   drains it and commits, so tiles have a single writer.

use std::sync::Arc;
use std::time::Duration;

use tiled_canvas::{PixelBuffer, PixelRect, Rect, TileKey};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::decoder::RegionDecoder;
use crate::error::TileError;

/// The viewport as last seen by the frame thread.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewportSnapshot {
    /// Visible area in Source Space.
    pub rect: Rect,
    /// Active pyramid level.
    pub level: u32,
}

/// Handle to an issued decode, kept by the tile.
#[derive(Debug)]
pub struct DecodeRequest {
    pub ticket: u64,
    pub sample_size: u32,
    pub cancel: CancellationToken,
}

/// What a decode task produced.
#[derive(Debug)]
pub enum DecodeOutcome {
    Decoded(PixelBuffer),
    Failed(TileError),
    /// The tile left the viewport during the debounce delay.
    Aborted,
}

/// Message sent from a decode task back to the frame thread.
#[derive(Debug)]
pub struct Completion {
    pub key: TileKey,
    pub ticket: u64,
    pub sample_size: u32,
    pub outcome: DecodeOutcome,
}

/// Parameters of a single decode.
#[derive(Clone, Copy, Debug)]
pub struct DecodeJob {
    pub key: TileKey,
    pub rect: PixelRect,
    pub sample_size: u32,
    pub delay: Duration,
    /// Abort after the delay if `rect` no longer overlaps the viewport at `key.level`.
    pub recheck_overlap: bool,
}

/// Spawns decode tasks and collects their completions.
pub struct DecodeScheduler {
    runtime: Handle,
    tx: async_channel::Sender<Completion>,
    rx: async_channel::Receiver<Completion>,
    viewport: watch::Sender<ViewportSnapshot>,
    next_ticket: u64,
}

impl DecodeScheduler {
    pub fn new(runtime: Handle) -> Self {
        let (tx, rx) = async_channel::unbounded();
        let (viewport, _) = watch::channel(ViewportSnapshot {
            rect: Rect::new(glam::Vec2::ZERO, glam::Vec2::ZERO),
            level: 0,
        });
        Self {
            runtime,
            tx,
            rx,
            viewport,
            next_ticket: 0,
        }
    }

    /// Makes `snapshot` visible to every running task.
    pub fn publish(&self, snapshot: ViewportSnapshot) {
        self.viewport.send_if_modified(|current| {
            let changed = *current != snapshot;
            *current = snapshot;
            changed
        });
    }

    pub fn viewport(&self) -> ViewportSnapshot {
        *self.viewport.borrow()
    }

    /// Spawns `job` against `decoder`.
    pub fn issue(&mut self, decoder: &Arc<dyn RegionDecoder>, job: DecodeJob) -> DecodeRequest {
        self.next_ticket += 1;
        let ticket = self.next_ticket;
        let cancel = CancellationToken::new();

        tracing::debug!(
            level = job.key.level,
            index = job.key.index,
            sample_size = job.sample_size,
            ticket,
            delay_ms = job.delay.as_millis() as u64,
            "Issuing tile decode"
        );

        self.runtime.spawn(run_job(
            job,
            ticket,
            cancel.clone(),
            Arc::clone(decoder),
            self.viewport.subscribe(),
            self.tx.clone(),
        ));

        DecodeRequest {
            ticket,
            sample_size: job.sample_size,
            cancel,
        }
    }

    /// Next queued completion, without waiting.
    pub fn try_next(&self) -> Option<Completion> {
        self.rx.try_recv().ok()
    }

    /// Waits for the next completion.
    pub async fn next(&self) -> Option<Completion> {
        self.rx.recv().await.ok()
    }
}

async fn run_job(
    job: DecodeJob,
    ticket: u64,
    cancel: CancellationToken,
    decoder: Arc<dyn RegionDecoder>,
    viewport: watch::Receiver<ViewportSnapshot>,
    tx: async_channel::Sender<Completion>,
) {
    let complete = |outcome| Completion {
        key: job.key,
        ticket,
        sample_size: job.sample_size,
        outcome,
    };

    if !job.delay.is_zero() {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(job.delay) => {}
        }
    }

    if job.recheck_overlap {
        let snapshot = *viewport.borrow();
        if snapshot.level != job.key.level || !job.rect.to_rect().intersects(&snapshot.rect) {
            tracing::trace!(level = job.key.level, index = job.key.index, "Tile left viewport during debounce");
            let _ = tx.send(complete(DecodeOutcome::Aborted)).await;
            return;
        }
    }

    if cancel.is_cancelled() {
        return;
    }

    let (rect, sample_size) = (job.rect, job.sample_size);
    let result = tokio::task::spawn_blocking(move || decoder.decode_region(rect, sample_size)).await;

    // A freed tile must never see this result.
    if cancel.is_cancelled() {
        return;
    }

    let outcome = match result {
        Ok(Ok(bitmap)) => DecodeOutcome::Decoded(bitmap),
        Ok(Err(e)) => DecodeOutcome::Failed(e),
        Err(join_error) => DecodeOutcome::Failed(TileError::DecodeFailed {
            rect,
            sample_size,
            reason: join_error.to_string(),
        }),
    };
    let _ = tx.send(complete(outcome)).await;
}
