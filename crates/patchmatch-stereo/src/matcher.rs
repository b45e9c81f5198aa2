//! The matcher driver: initialisation, iterated propagation and
//! post-processing.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::cost::CostEvaluator;
use crate::disparity::DisparityMap;
use crate::error::StereoError;
use crate::gradient::{grayscale_into, sobel_into, Gradient};
use crate::options::MatchOptions;
use crate::plane::{DisparityPlane, Vector3};
use crate::postprocess::{fill_holes, lr_check};
use crate::propagation::{sweep, ViewGrids};

/// PatchMatch stereo matcher for rectified BGR image pairs.
///
/// Construction validates the options and allocates every per-pixel buffer
/// once; [`compute`](Self::compute) can then be called repeatedly for pairs
/// of the same dimensions.
///
/// See the [crate docs](crate) for a usage example.
pub struct StereoMatcher {
    pub(crate) width: usize,
    pub(crate) height: usize,
    pub(crate) options: MatchOptions,
    pub(crate) rng: StdRng,
    pub(crate) gray_left: Vec<u8>,
    pub(crate) gray_right: Vec<u8>,
    pub(crate) grad_left: Vec<Gradient>,
    pub(crate) grad_right: Vec<Gradient>,
    pub(crate) left: ViewGrids,
    pub(crate) right: ViewGrids,
}

impl StereoMatcher {
    /// Create a matcher for `width` x `height` pairs.
    pub fn new(width: usize, height: usize, options: MatchOptions) -> Result<Self, StereoError> {
        if width == 0 || height == 0 {
            return Err(StereoError::InvalidDimensions { width, height });
        }
        options.validate()?;

        let rng = match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let size = width * height;
        Ok(Self {
            width,
            height,
            options,
            rng,
            gray_left: vec![0; size],
            gray_right: vec![0; size],
            grad_left: vec![Gradient::default(); size],
            grad_right: vec![Gradient::default(); size],
            left: ViewGrids::new(width, height),
            right: ViewGrids::new(width, height),
        })
    }

    /// Image width in pixels.
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Image height in pixels.
    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// The options this matcher was built with.
    #[inline]
    pub fn options(&self) -> &MatchOptions {
        &self.options
    }

    /// Match a rectified pair and return the left and right disparity maps.
    ///
    /// Both buffers must hold `width * height * 3` bytes in BGR order.
    pub fn compute(
        &mut self,
        img_left: &[u8],
        img_right: &[u8],
    ) -> Result<(DisparityMap, DisparityMap), StereoError> {
        let expected = self.width * self.height * 3;
        for buffer in [img_left, img_right] {
            if buffer.len() != expected {
                return Err(StereoError::BufferSize {
                    expected,
                    actual: buffer.len(),
                });
            }
        }

        debug!(width = self.width, height = self.height, "grayscale and gradients");
        grayscale_into(img_left, &mut self.gray_left, self.width, self.height);
        grayscale_into(img_right, &mut self.gray_right, self.width, self.height);
        sobel_into(&self.gray_left, &mut self.grad_left, self.width, self.height);
        sobel_into(&self.gray_right, &mut self.grad_right, self.width, self.height);

        self.random_initialization();
        self.compute_initial_costs(img_left, img_right);

        for iteration in 0..self.options.num_iterations {
            debug!(iteration, "propagation");
            self.propagate_once(img_left, img_right, iteration);
        }

        self.materialize_disparities();

        if self.options.check_lr {
            let mismatches_left = lr_check(
                &mut self.left.disparities,
                &self.right.disparities,
                self.options.lr_threshold,
            );
            let mismatches_right = lr_check(
                &mut self.right.disparities,
                &self.left.disparities,
                self.options.lr_threshold,
            );
            debug!(
                left = mismatches_left.len(),
                right = mismatches_right.len(),
                "LR check mismatches"
            );

            if self.options.fill_holes {
                fill_holes(&mut self.left.disparities, &self.left.planes, &mismatches_left);
                fill_holes(
                    &mut self.right.disparities,
                    &self.right.planes,
                    &mismatches_right,
                );
            }
        }

        Ok((
            DisparityMap::from_grid(self.left.disparities.clone()),
            DisparityMap::from_grid(self.right.disparities.clone()),
        ))
    }

    /// Seed every pixel of both views with a random disparity plane.
    pub(crate) fn random_initialization(&mut self) {
        let min = self.options.min_disparity as f32;
        let max = self.options.max_disparity as f32;

        for (grids, sign) in [(&mut self.left, 1.0f32), (&mut self.right, -1.0f32)] {
            for y in 0..self.height as i32 {
                for x in 0..self.width as i32 {
                    let mut disparity = sign * self.rng.gen_range(min..=max);
                    if self.options.integer_disparity {
                        disparity = disparity.round();
                    }
                    grids.disparities.set(x as usize, y as usize, disparity);

                    let normal = if self.options.frontal_parallel {
                        Vector3::new(0.0, 0.0, 1.0)
                    } else {
                        let mut nz: f32 = self.rng.gen_range(-1.0..=1.0);
                        while nz == 0.0 {
                            nz = self.rng.gen_range(-1.0..=1.0);
                        }
                        Vector3::new(
                            self.rng.gen_range(-1.0..=1.0),
                            self.rng.gen_range(-1.0..=1.0),
                            nz,
                        )
                        .normalized()
                    };

                    grids.planes.set(
                        x as usize,
                        y as usize,
                        DisparityPlane::from_normal(x, y, normal, disparity),
                    );
                }
            }
        }
    }

    /// Evaluate every stored plane in place to fill both cost grids.
    pub(crate) fn compute_initial_costs(&mut self, img_left: &[u8], img_right: &[u8]) {
        let (eval_left, eval_right) = evaluators(
            img_left,
            img_right,
            &self.grad_left,
            &self.grad_right,
            self.width,
            self.height,
            &self.options,
        );

        for (grids, eval) in [(&mut self.left, &eval_left), (&mut self.right, &eval_right)] {
            for y in 0..self.height as i32 {
                for x in 0..self.width as i32 {
                    let plane = *grids.planes.get(x as usize, y as usize);
                    grids
                        .costs
                        .set(x as usize, y as usize, eval.aggregate(x, y, &plane));
                }
            }
        }
    }

    /// One full iteration: a left-view pass then a right-view pass.
    pub(crate) fn propagate_once(&mut self, img_left: &[u8], img_right: &[u8], iteration: u32) {
        let (eval_left, eval_right) = evaluators(
            img_left,
            img_right,
            &self.grad_left,
            &self.grad_right,
            self.width,
            self.height,
            &self.options,
        );

        sweep(
            &eval_left,
            &eval_right,
            &mut self.left,
            &mut self.right,
            &self.options,
            iteration,
            &mut self.rng,
        );
        sweep(
            &eval_right,
            &eval_left,
            &mut self.right,
            &mut self.left,
            &self.options,
            iteration,
            &mut self.rng,
        );
    }

    /// Write each pixel's plane disparity into the disparity grids.
    pub(crate) fn materialize_disparities(&mut self) {
        for grids in [&mut self.left, &mut self.right] {
            for y in 0..self.height as i32 {
                for x in 0..self.width as i32 {
                    let plane = *grids.planes.get(x as usize, y as usize);
                    grids
                        .disparities
                        .set(x as usize, y as usize, plane.disparity_at(x, y));
                }
            }
        }
    }
}

/// Build the per-view cost evaluators; the right view gets swapped images
/// and the negated disparity range.
pub(crate) fn evaluators<'a>(
    img_left: &'a [u8],
    img_right: &'a [u8],
    grad_left: &'a [Gradient],
    grad_right: &'a [Gradient],
    width: usize,
    height: usize,
    options: &MatchOptions,
) -> (CostEvaluator<'a>, CostEvaluator<'a>) {
    let eval_left = CostEvaluator::new(
        img_left,
        img_right,
        grad_left,
        grad_right,
        width,
        height,
        options,
        options.min_disparity,
        options.max_disparity,
    );
    let eval_right = CostEvaluator::new(
        img_right,
        img_left,
        grad_right,
        grad_left,
        width,
        height,
        options,
        -options.max_disparity,
        -options.min_disparity,
    );
    (eval_left, eval_right)
}
