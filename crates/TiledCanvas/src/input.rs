//! # Pointer Input Protocol
//!
//! The host translates its native touch / mouse events into `PointerEvent`s.
//! Each event carries the positions of every pointer currently on the surface
//! (View Space pixels) in a stable order, plus which pointer the action is about.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// What happened in this event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointerAction {
    /// First pointer touched down.
    Down,
    /// An additional pointer touched down.
    Add,
    /// One or more pointers moved.
    Move,
    /// A pointer lifted while others remain.
    Remove,
    /// The last pointer lifted.
    Up,
    /// The gesture was aborted by the host.
    Cancel,
}

/// A single pointer event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PointerEvent {
    pub action: PointerAction,
    /// Positions of all pointers, including the one being added or removed.
    pub pointers: Vec<Vec2>,
    /// Index into `pointers` of the pointer this action refers to.
    pub action_index: usize,
}

impl PointerEvent {
    pub fn new(action: PointerAction, pointers: Vec<Vec2>, action_index: usize) -> Self {
        Self {
            action,
            pointers,
            action_index,
        }
    }

    pub fn down(p: Vec2) -> Self {
        Self::new(PointerAction::Down, vec![p], 0)
    }

    pub fn moved(pointers: Vec<Vec2>) -> Self {
        Self::new(PointerAction::Move, pointers, 0)
    }

    pub fn add(pointers: Vec<Vec2>) -> Self {
        let index = pointers.len().saturating_sub(1);
        Self::new(PointerAction::Add, pointers, index)
    }

    pub fn remove(pointers: Vec<Vec2>, action_index: usize) -> Self {
        Self::new(PointerAction::Remove, pointers, action_index)
    }

    pub fn up(p: Vec2) -> Self {
        Self::new(PointerAction::Up, vec![p], 0)
    }

    /// Pointers that stay on the surface after this event.
    pub fn remaining(&self) -> impl Iterator<Item = Vec2> + '_ {
        let skip = matches!(self.action, PointerAction::Remove).then_some(self.action_index);
        self.pointers
            .iter()
            .enumerate()
            .filter(move |(i, _)| Some(*i) != skip)
            .map(|(_, p)| *p)
    }
}
