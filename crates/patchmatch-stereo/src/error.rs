//! Error type for matcher construction and input validation.
//!
//! Out-of-bounds sampling and out-of-range disparities inside the matching
//! loop are not errors; they are absorbed by the saturation-cost and penalty
//! policy of the cost evaluator.

use thiserror::Error;

/// Errors reported by [`StereoMatcher`](crate::StereoMatcher) construction
/// and [`compute`](crate::StereoMatcher::compute).
#[derive(Debug, Error)]
pub enum StereoError {
    /// Image dimensions must both be non-zero.
    #[error("invalid image dimensions {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    /// An input buffer does not hold `width * height * 3` bytes.
    #[error("input buffer holds {actual} bytes, expected {expected} (width * height * 3)")]
    BufferSize { expected: usize, actual: usize },

    /// The support window side length must be a positive odd integer.
    #[error("patch size must be a positive odd integer, got {0}")]
    InvalidPatchSize(i32),

    /// The disparity search range is empty.
    #[error("empty disparity range: min {min} > max {max}")]
    EmptyDisparityRange { min: i32, max: i32 },

    /// A bandwidth or truncation parameter was zero or negative.
    #[error("{name} must be positive, got {value}")]
    NonPositiveParameter { name: &'static str, value: f32 },

    /// The colour/gradient blend factor is outside `[0, 1]`.
    #[error("alpha must lie in [0, 1], got {0}")]
    AlphaOutOfRange(f32),
}
