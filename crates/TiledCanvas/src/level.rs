//! # Level Selection
//!
//! Maps the current zoom onto a pyramid level. Every halving of the scale
//! moves one level coarser: `level = floor(log_0.5(scale))`.

/// Absorbs `log2` rounding so exact powers of one half land on their level.
const LEVEL_EPSILON: f32 = 1e-4;

/// Largest exponent used for sample sizes, keeps `2^n` inside `u32`.
const MAX_SAMPLE_EXPONENT: i32 = 30;

/// Unclamped `floor(log_0.5(scale))`. Negative when zoomed in past 1:1.
pub fn zoom_exponent(scale: f32) -> i32 {
    if !(scale.is_finite() && scale > 0.0) {
        return MAX_SAMPLE_EXPONENT;
    }
    (-scale.log2() + LEVEL_EPSILON).floor() as i32
}

/// Pyramid level to decode at for `scale`, in `[0, top_level]`.
pub fn active_level(scale: f32, top_level: u32) -> u32 {
    zoom_exponent(scale).clamp(0, top_level as i32) as u32
}

/// Subsampling factor implied by `scale`, ignoring the pyramid's top level.
pub fn target_sample_size(scale: f32) -> u32 {
    1 << zoom_exponent(scale).clamp(0, MAX_SAMPLE_EXPONENT)
}
