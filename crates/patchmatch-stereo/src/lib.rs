//! patchmatch-stereo: dense disparity maps from rectified stereo pairs
//!
//! This library implements PatchMatch stereo matching with slanted support
//! windows. Each pixel carries a 3-D disparity plane hypothesis; random
//! initialisation followed by iterated propagation (spatial, cross-view and
//! randomised refinement) converges the plane field toward the minimum of an
//! adaptive-weight matching cost. Optional left/right consistency checking
//! and plane-based hole filling clean up occlusions.
//!
//! # Quick Start
//!
//! [`StereoMatcher`] is the entry point. Construct it once for a given image
//! size, then feed it rectified BGR pixel pairs:
//!
//! ```
//! use patchmatch_stereo::{MatchOptions, StereoMatcher};
//!
//! let options = MatchOptions::new()
//!     .patch_size(3)
//!     .disparity_range(0, 4)
//!     .num_iterations(1)
//!     .seed(7);
//!
//! let mut matcher = StereoMatcher::new(8, 8, options).unwrap();
//!
//! // Two flat gray 8x8 images, BGR byte order.
//! let left = vec![128u8; 8 * 8 * 3];
//! let right = vec![128u8; 8 * 8 * 3];
//!
//! let (disp_left, disp_right) = matcher.compute(&left, &right).unwrap();
//! assert_eq!(disp_left.width(), 8);
//! assert_eq!(disp_right.height(), 8);
//! ```
//!
//! # Views and signs
//!
//! Disparities are signed: positive in the left map, negative in the right
//! map. The right view is matched with a negated disparity range so both
//! views run through the same code path.
//!
//! # Randomness
//!
//! The algorithm is inherently randomised. Outputs vary run to run unless a
//! seed is fixed via [`MatchOptions::seed`].

pub mod cost;
pub mod disparity;
pub mod error;
pub mod gradient;
pub mod grid;
pub mod matcher;
pub mod options;
pub mod plane;
pub(crate) mod postprocess;
pub(crate) mod propagation;


pub use cost::CostEvaluator;
pub use disparity::{DisparityMap, INVALID_DISPARITY};
pub use error::StereoError;
pub use gradient::Gradient;
pub use grid::Grid;
pub use matcher::StereoMatcher;
pub use options::MatchOptions;
pub use plane::{DisparityPlane, Vector3};
