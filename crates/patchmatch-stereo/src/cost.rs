//! Plane-parameterised matching cost with adaptive support weights.
//!
//! [`CostEvaluator`] scores a disparity plane at a pixel by accumulating
//! bilaterally weighted colour and gradient dissimilarities over the support
//! window, sampling the opposing view at sub-pixel positions. One evaluator
//! serves one view; the right view gets an evaluator with swapped images and
//! a negated disparity range.

use crate::gradient::Gradient;
use crate::options::MatchOptions;
use crate::plane::DisparityPlane;

/// Cost added for a window pixel whose plane disparity leaves the search
/// range.
pub const OUT_OF_RANGE_PENALTY: f32 = 120.0;

/// Matching-cost evaluator for one view of a rectified pair.
///
/// Holds non-owning references to both views' colour and gradient buffers.
/// `img_ref` is the view the evaluator scores pixels in; `img_other` is the
/// view it samples at disparity-shifted positions.
pub struct CostEvaluator<'a> {
    img_ref: &'a [u8],
    img_other: &'a [u8],
    grad_ref: &'a [Gradient],
    grad_other: &'a [Gradient],
    width: i32,
    height: i32,
    patch_half: i32,
    min_disparity: f32,
    max_disparity: f32,
    gamma: f32,
    alpha: f32,
    tau_color: f32,
    tau_gradient: f32,
}

impl<'a> CostEvaluator<'a> {
    /// Create an evaluator over one view.
    ///
    /// `min_disparity` / `max_disparity` are the signed bounds for this view;
    /// pass the negated option range for the right view.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        img_ref: &'a [u8],
        img_other: &'a [u8],
        grad_ref: &'a [Gradient],
        grad_other: &'a [Gradient],
        width: usize,
        height: usize,
        options: &MatchOptions,
        min_disparity: i32,
        max_disparity: i32,
    ) -> Self {
        Self {
            img_ref,
            img_other,
            grad_ref,
            grad_other,
            width: width as i32,
            height: height as i32,
            patch_half: options.patch_size / 2,
            min_disparity: min_disparity as f32,
            max_disparity: max_disparity as f32,
            gamma: options.gamma,
            alpha: options.alpha,
            tau_color: options.tau_color,
            tau_gradient: options.tau_gradient,
        }
    }

    /// Lower signed disparity bound of this view.
    #[inline]
    pub fn min_disparity(&self) -> f32 {
        self.min_disparity
    }

    /// Upper signed disparity bound of this view.
    #[inline]
    pub fn max_disparity(&self) -> f32 {
        self.max_disparity
    }

    /// The cost returned when a sample falls outside the opposing view.
    #[inline]
    pub fn saturation_cost(&self) -> f32 {
        (1.0 - self.alpha) * self.tau_color + self.alpha * self.tau_gradient
    }

    /// Dissimilarity of pixel `(x, y)` matched at disparity `d`.
    ///
    /// Samples the opposing view at the sub-pixel column `x - d` with x-only
    /// linear interpolation. Positions outside the image return the
    /// saturation cost.
    pub fn pixel_cost(&self, x: i32, y: i32, d: f32) -> f32 {
        let xr = x as f32 - d;
        if xr < 0.0 || xr >= self.width as f32 {
            return self.saturation_cost();
        }

        let col_p = self.color(self.img_ref, x, y);
        let col_q = self.color_interpolated(self.img_other, xr, y);
        let dc = ((col_p[0] as f32 - col_q[0]).abs()
            + (col_p[1] as f32 - col_q[1]).abs()
            + (col_p[2] as f32 - col_q[2]).abs())
        .min(self.tau_color);

        let grad_p = self.gradient(self.grad_ref, x, y);
        let grad_q = self.gradient_interpolated(self.grad_other, xr, y);
        let dg = ((grad_p.x as f32 - grad_q.0).abs() + (grad_p.y as f32 - grad_q.1).abs())
            .min(self.tau_gradient);

        (1.0 - self.alpha) * dc + self.alpha * dg
    }

    /// Aggregated cost of `plane` at pixel `(x, y)` over the support window.
    ///
    /// Window pixels whose plane disparity leaves the view's search range
    /// contribute [`OUT_OF_RANGE_PENALTY`] instead of a weighted sample.
    /// The sum is not normalised by the weight total; it is an ordinal
    /// score, not a probability.
    pub fn aggregate(&self, x: i32, y: i32, plane: &DisparityPlane) -> f32 {
        let col_p = self.color(self.img_ref, x, y);

        let mut cost = 0.0f32;
        for r in -self.patch_half..=self.patch_half {
            let yq = y + r;
            for c in -self.patch_half..=self.patch_half {
                let xq = x + c;
                if yq < 0 || yq >= self.height || xq < 0 || xq >= self.width {
                    continue;
                }

                let d = plane.disparity_at(xq, yq);
                if d < self.min_disparity || d > self.max_disparity {
                    cost += OUT_OF_RANGE_PENALTY;
                    continue;
                }

                let col_q = self.color(self.img_ref, xq, yq);
                let dc = (col_p[0] as i32 - col_q[0] as i32).abs()
                    + (col_p[1] as i32 - col_q[1] as i32).abs()
                    + (col_p[2] as i32 - col_q[2] as i32).abs();
                let weight = (-(dc as f32) / self.gamma).exp();

                cost += weight * self.pixel_cost(xq, yq, d);
            }
        }
        cost
    }

    /// BGR bytes of an integer pixel position.
    #[inline]
    fn color(&self, img: &[u8], x: i32, y: i32) -> [u8; 3] {
        let i = (y * self.width * 3 + x * 3) as usize;
        [img[i], img[i + 1], img[i + 2]]
    }

    /// BGR channels at a sub-pixel column, linearly interpolated along x.
    fn color_interpolated(&self, img: &[u8], x: f32, y: i32) -> [f32; 3] {
        let x1 = x as i32;
        let x2 = x1 + 1;
        let t = x - x1 as f32;

        let mut col = [0.0f32; 3];
        for (n, channel) in col.iter_mut().enumerate() {
            let c1 = img[(y * self.width * 3 + x1 * 3) as usize + n];
            let c2 = if x2 < self.width {
                img[(y * self.width * 3 + x2 * 3) as usize + n]
            } else {
                c1
            };
            *channel = (1.0 - t) * c1 as f32 + t * c2 as f32;
        }
        col
    }

    /// Gradient of an integer pixel position.
    #[inline]
    fn gradient(&self, grads: &[Gradient], x: i32, y: i32) -> Gradient {
        grads[(y * self.width + x) as usize]
    }

    /// Gradient at a sub-pixel column, linearly interpolated along x.
    fn gradient_interpolated(&self, grads: &[Gradient], x: f32, y: i32) -> (f32, f32) {
        let x1 = x as i32;
        let x2 = x1 + 1;
        let t = x - x1 as f32;

        let g1 = grads[(y * self.width + x1) as usize];
        let g2 = if x2 < self.width {
            grads[(y * self.width + x2) as usize]
        } else {
            g1
        };
        (
            (1.0 - t) * g1.x as f32 + t * g2.x as f32,
            (1.0 - t) * g1.y as f32 + t * g2.y as f32,
        )
    }
}
