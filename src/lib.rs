//! Parallax - PatchMatch stereo disparity maps from rectified image pairs.
//!
//! The matching core lives in the `patchmatch-stereo` crate; this library
//! exposes the driver's I/O and visualisation modules for integration
//! testing.

pub mod error;
pub mod io;
pub mod viz;
