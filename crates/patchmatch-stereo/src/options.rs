//! Matching options and their validation.

use crate::error::StereoError;

/// Configuration for [`StereoMatcher`](crate::StereoMatcher).
///
/// The defaults reproduce the classic PatchMatch stereo parameterisation:
/// a 35x35 support window, disparity search in `0..=64`, colour bandwidth
/// gamma 10, a 0.9 gradient-heavy dissimilarity blend, truncation at 10
/// (colour) and 2 (gradient), and three propagation iterations. Consistency
/// checking, hole filling, frontal-parallel windows and integer disparities
/// are off.
///
/// # Example
///
/// ```
/// use patchmatch_stereo::MatchOptions;
///
/// let options = MatchOptions::new()
///     .disparity_range(0, 32)
///     .num_iterations(4)
///     .check_lr(1.0)
///     .fill_holes(true);
/// ```
#[derive(Debug, Clone)]
pub struct MatchOptions {
    /// Side length of the square support window. Must be a positive odd
    /// integer.
    pub patch_size: i32,

    /// Minimum disparity searched in the left view.
    pub min_disparity: i32,

    /// Maximum disparity searched in the left view. The right view searches
    /// the negated range `-max..=-min`.
    pub max_disparity: i32,

    /// Colour bandwidth of the adaptive support weight `exp(-dc / gamma)`.
    pub gamma: f32,

    /// Blend between colour and gradient dissimilarity; 0 is colour only,
    /// 1 is gradient only.
    pub alpha: f32,

    /// Truncation threshold for the L1 colour dissimilarity.
    pub tau_color: f32,

    /// Truncation threshold for the L1 gradient dissimilarity.
    pub tau_gradient: f32,

    /// Number of full propagation iterations (one left sweep plus one right
    /// sweep each).
    pub num_iterations: u32,

    /// Run the left/right consistency check after matching.
    pub check_lr: bool,

    /// Consistency tolerance: a pixel survives when the magnitudes of its
    /// disparity and its match's disparity agree within this threshold.
    pub lr_threshold: f32,

    /// Fill pixels invalidated by the consistency check from neighbouring
    /// planes. Only takes effect together with `check_lr`.
    pub fill_holes: bool,

    /// Restrict all plane hypotheses to frontal-parallel windows
    /// (normal `(0, 0, 1)`).
    pub frontal_parallel: bool,

    /// Round every disparity hypothesis to the nearest integer.
    pub integer_disparity: bool,

    /// Seed for the pseudo-random source. `None` seeds from entropy, making
    /// outputs vary run to run.
    pub seed: Option<u64>,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            patch_size: 35,
            min_disparity: 0,
            max_disparity: 64,
            gamma: 10.0,
            alpha: 0.9,
            tau_color: 10.0,
            tau_gradient: 2.0,
            num_iterations: 3,
            check_lr: false,
            lr_threshold: 1.0,
            fill_holes: false,
            frontal_parallel: false,
            integer_disparity: false,
            seed: None,
        }
    }
}

impl MatchOptions {
    /// Create options with default values.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the support window side length.
    #[inline]
    pub fn patch_size(mut self, size: i32) -> Self {
        self.patch_size = size;
        self
    }

    /// Set the left-view disparity search range.
    #[inline]
    pub fn disparity_range(mut self, min: i32, max: i32) -> Self {
        self.min_disparity = min;
        self.max_disparity = max;
        self
    }

    /// Set the adaptive-weight colour bandwidth.
    #[inline]
    pub fn gamma(mut self, gamma: f32) -> Self {
        self.gamma = gamma;
        self
    }

    /// Set the colour/gradient blend factor.
    #[inline]
    pub fn alpha(mut self, alpha: f32) -> Self {
        self.alpha = alpha;
        self
    }

    /// Set the colour truncation threshold.
    #[inline]
    pub fn tau_color(mut self, tau: f32) -> Self {
        self.tau_color = tau;
        self
    }

    /// Set the gradient truncation threshold.
    #[inline]
    pub fn tau_gradient(mut self, tau: f32) -> Self {
        self.tau_gradient = tau;
        self
    }

    /// Set the number of propagation iterations.
    #[inline]
    pub fn num_iterations(mut self, iterations: u32) -> Self {
        self.num_iterations = iterations;
        self
    }

    /// Enable the left/right consistency check with the given tolerance.
    #[inline]
    pub fn check_lr(mut self, threshold: f32) -> Self {
        self.check_lr = true;
        self.lr_threshold = threshold;
        self
    }

    /// Enable or disable plane-based hole filling.
    #[inline]
    pub fn fill_holes(mut self, enabled: bool) -> Self {
        self.fill_holes = enabled;
        self
    }

    /// Enable or disable frontal-parallel windows.
    #[inline]
    pub fn frontal_parallel(mut self, enabled: bool) -> Self {
        self.frontal_parallel = enabled;
        self
    }

    /// Enable or disable integer disparities.
    #[inline]
    pub fn integer_disparity(mut self, enabled: bool) -> Self {
        self.integer_disparity = enabled;
        self
    }

    /// Fix the pseudo-random seed for reproducible output.
    #[inline]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Check the option record for contradictory or degenerate values.
    pub fn validate(&self) -> Result<(), StereoError> {
        if self.patch_size <= 0 || self.patch_size % 2 == 0 {
            return Err(StereoError::InvalidPatchSize(self.patch_size));
        }
        if self.min_disparity > self.max_disparity {
            return Err(StereoError::EmptyDisparityRange {
                min: self.min_disparity,
                max: self.max_disparity,
            });
        }
        for (name, value) in [
            ("gamma", self.gamma),
            ("tau_color", self.tau_color),
            ("tau_gradient", self.tau_gradient),
        ] {
            if value <= 0.0 {
                return Err(StereoError::NonPositiveParameter { name, value });
            }
        }
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(StereoError::AlphaOutOfRange(self.alpha));
        }
        Ok(())
    }
}
