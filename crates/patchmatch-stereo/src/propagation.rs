//! PatchMatch propagation: spatial, randomised refinement and cross-view.
//!
//! One pass sweeps a full view in scanline order, alternating direction with
//! iteration parity. Each visited pixel tries, in order: the planes of its
//! two trailing neighbours, a geometrically shrinking random perturbation of
//! its own plane, and finally pushes its plane across to the opposing view.
//! Every proposal is adopted only on strict cost improvement.
//!
//! The two views' passes must run sequentially within an iteration: the
//! cross-view step writes into the opposing view's plane and cost grids.

use rand::rngs::StdRng;
use rand::Rng;

use crate::cost::CostEvaluator;
use crate::grid::Grid;
use crate::options::MatchOptions;
use crate::plane::{DisparityPlane, Vector3};

/// Refinement stops once the disparity step shrinks to this size.
const MIN_DISPARITY_STEP: f32 = 0.1;

/// The mutable per-view state: plane hypotheses, their aggregated costs and
/// the materialised disparities.
#[derive(Debug, Clone)]
pub(crate) struct ViewGrids {
    pub planes: Grid<DisparityPlane>,
    pub costs: Grid<f32>,
    pub disparities: Grid<f32>,
}

impl ViewGrids {
    pub(crate) fn new(width: usize, height: usize) -> Self {
        Self {
            planes: Grid::filled(width, height, DisparityPlane::default()),
            costs: Grid::filled(width, height, 0.0),
            disparities: Grid::filled(width, height, 0.0),
        }
    }
}

/// Run one full pass over the reference view.
///
/// `eval_ref` scores planes in the reference view, `eval_other` in the
/// opposing view; `other` receives cross-view proposals.
pub(crate) fn sweep(
    eval_ref: &CostEvaluator,
    eval_other: &CostEvaluator,
    reference: &mut ViewGrids,
    other: &mut ViewGrids,
    options: &MatchOptions,
    iteration: u32,
    rng: &mut StdRng,
) {
    let width = reference.planes.width() as i32;
    let height = reference.planes.height() as i32;
    let forward = iteration % 2 == 0;
    let dir = if forward { 1 } else { -1 };

    let mut y = if forward { 0 } else { height - 1 };
    for _ in 0..height {
        let mut x = if forward { 0 } else { width - 1 };
        for _ in 0..width {
            spatial_propagation(eval_ref, reference, x, y, dir);
            plane_refinement(eval_ref, reference, x, y, options, rng);
            view_propagation(eval_other, reference, other, x, y);
            x += dir;
        }
        y += dir;
    }
}

/// Try the planes of the trailing horizontal and vertical neighbours.
pub(crate) fn spatial_propagation(
    eval: &CostEvaluator,
    view: &mut ViewGrids,
    x: i32,
    y: i32,
    dir: i32,
) {
    let width = view.planes.width() as i32;
    let height = view.planes.height() as i32;

    for (nx, ny) in [(x - dir, y), (x, y - dir)] {
        if nx < 0 || nx >= width || ny < 0 || ny >= height {
            continue;
        }
        let candidate = *view.planes.get(nx as usize, ny as usize);
        if candidate == *view.planes.get(x as usize, y as usize) {
            continue;
        }
        let cost = eval.aggregate(x, y, &candidate);
        if cost < *view.costs.get(x as usize, y as usize) {
            view.planes.set(x as usize, y as usize, candidate);
            view.costs.set(x as usize, y as usize, cost);
        }
    }
}

/// Randomised local search over (normal, disparity) with a geometric step
/// schedule.
///
/// Starts from half the search range and a unit normal step, halving both
/// until the disparity step reaches [`MIN_DISPARITY_STEP`]. A perturbation
/// that leaves the disparity range consumes a step without being scored.
pub(crate) fn plane_refinement(
    eval: &CostEvaluator,
    view: &mut ViewGrids,
    x: i32,
    y: i32,
    options: &MatchOptions,
    rng: &mut StdRng,
) {
    let min_disparity = eval.min_disparity();
    let max_disparity = eval.max_disparity();

    let mut disparity_step = (max_disparity - min_disparity) / 2.0;
    let mut normal_step = 1.0f32;

    while disparity_step > MIN_DISPARITY_STEP {
        let mut delta: f32 = rng.gen_range(-disparity_step..=disparity_step);
        if options.integer_disparity {
            delta = delta.round();
        }

        let current = *view.planes.get(x as usize, y as usize);
        let disparity = current.disparity_at(x, y) + delta;
        if disparity < min_disparity || disparity > max_disparity {
            disparity_step /= 2.0;
            normal_step /= 2.0;
            continue;
        }

        let normal = if options.frontal_parallel {
            current.normal()
        } else {
            let mut dz: f32 = rng.gen_range(-normal_step..=normal_step);
            while dz == 0.0 {
                dz = rng.gen_range(-normal_step..=normal_step);
            }
            let perturbation = Vector3::new(
                rng.gen_range(-normal_step..=normal_step),
                rng.gen_range(-normal_step..=normal_step),
                dz,
            );
            (current.normal() + perturbation).normalized()
        };

        let candidate = DisparityPlane::from_normal(x, y, normal, disparity);
        if candidate != current {
            let cost = eval.aggregate(x, y, &candidate);
            if cost < *view.costs.get(x as usize, y as usize) {
                view.planes.set(x as usize, y as usize, candidate);
                view.costs.set(x as usize, y as usize, cost);
                view.disparities.set(x as usize, y as usize, disparity);
            }
        }

        disparity_step /= 2.0;
        normal_step /= 2.0;
    }
}

/// Push the current plane across to its matched pixel in the opposing view.
pub(crate) fn view_propagation(
    eval_other: &CostEvaluator,
    reference: &ViewGrids,
    other: &mut ViewGrids,
    x: i32,
    y: i32,
) {
    let width = reference.planes.width() as i32;

    let plane = *reference.planes.get(x as usize, y as usize);
    let d = plane.disparity_at(x, y);
    let xr = (x as f32 - d).round() as i32;
    if xr < 0 || xr >= width {
        return;
    }

    let mapped = plane.to_other_view(x, y);
    let cost = eval_other.aggregate(xr, y, &mapped);
    if cost < *other.costs.get(xr as usize, y as usize) {
        other.planes.set(xr as usize, y as usize, mapped);
        other.costs.set(xr as usize, y as usize, cost);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gradient::{grayscale_into, sobel_into, Gradient};
    use rand::SeedableRng;

    /// Identical left/right images with strong per-pixel texture: the only
    /// zero-cost hypothesis is the frontal-parallel plane at disparity 0.
    struct Fixture {
        img: Vec<u8>,
        grad: Vec<Gradient>,
        width: usize,
        height: usize,
    }

    impl Fixture {
        fn new(width: usize, height: usize) -> Self {
            let mut state = 0x9e3779b9u32;
            let mut img = Vec::with_capacity(width * height * 3);
            for _ in 0..width * height * 3 {
                state = state.wrapping_mul(1664525).wrapping_add(1013904223);
                img.push((state >> 24) as u8);
            }
            let mut gray = vec![0u8; width * height];
            let mut grad = vec![Gradient::default(); width * height];
            grayscale_into(&img, &mut gray, width, height);
            sobel_into(&gray, &mut grad, width, height);
            Self {
                img,
                grad,
                width,
                height,
            }
        }

        fn evaluator(&self, options: &MatchOptions) -> CostEvaluator<'_> {
            CostEvaluator::new(
                &self.img,
                &self.img,
                &self.grad,
                &self.grad,
                self.width,
                self.height,
                options,
                options.min_disparity,
                options.max_disparity,
            )
        }

        fn grids_with_plane(&self, plane: DisparityPlane, eval: &CostEvaluator) -> ViewGrids {
            let mut grids = ViewGrids::new(self.width, self.height);
            for y in 0..self.height {
                for x in 0..self.width {
                    grids.planes.set(x, y, plane);
                    grids
                        .costs
                        .set(x, y, eval.aggregate(x as i32, y as i32, &plane));
                    grids
                        .disparities
                        .set(x, y, plane.disparity_at(x as i32, y as i32));
                }
            }
            grids
        }
    }

    fn fpw_plane(d: f32) -> DisparityPlane {
        DisparityPlane::from_normal(0, 0, Vector3::new(0.0, 0.0, 1.0), d)
    }

    #[test]
    fn test_spatial_propagation_adopts_cheaper_neighbour() {
        let fx = Fixture::new(8, 8);
        let options = MatchOptions::new().patch_size(3).disparity_range(0, 4);
        let eval = fx.evaluator(&options);

        // Everything starts on the wrong plane (d = 2), then the pixel left
        // of (4,4) is handed the perfect hypothesis.
        let mut grids = fx.grids_with_plane(fpw_plane(2.0), &eval);
        let good = fpw_plane(0.0);
        grids.planes.set(3, 4, good);
        grids.costs.set(3, 4, eval.aggregate(3, 4, &good));

        spatial_propagation(&eval, &mut grids, 4, 4, 1);

        assert_eq!(*grids.planes.get(4, 4), good, "should adopt the neighbour plane");
        assert_eq!(*grids.costs.get(4, 4), eval.aggregate(4, 4, &good));
    }

    #[test]
    fn test_spatial_propagation_keeps_cheaper_current_plane() {
        let fx = Fixture::new(8, 8);
        let options = MatchOptions::new().patch_size(3).disparity_range(0, 4);
        let eval = fx.evaluator(&options);

        // The centre already holds the perfect plane; the worse neighbour
        // must not displace it.
        let mut grids = fx.grids_with_plane(fpw_plane(0.0), &eval);
        let bad = fpw_plane(3.0);
        grids.planes.set(3, 4, bad);
        grids.costs.set(3, 4, eval.aggregate(3, 4, &bad));

        spatial_propagation(&eval, &mut grids, 4, 4, 1);

        assert_eq!(*grids.planes.get(4, 4), fpw_plane(0.0));
    }

    #[test]
    fn test_refinement_never_increases_cost() {
        let fx = Fixture::new(8, 8);
        let options = MatchOptions::new()
            .patch_size(3)
            .disparity_range(0, 4)
            .seed(11);
        let eval = fx.evaluator(&options);
        let mut rng = StdRng::seed_from_u64(11);

        let mut grids = fx.grids_with_plane(fpw_plane(2.0), &eval);
        for y in 0..8 {
            for x in 0..8 {
                let before = *grids.costs.get(x as usize, y as usize);
                plane_refinement(&eval, &mut grids, x, y, &options, &mut rng);
                let after = *grids.costs.get(x as usize, y as usize);
                assert!(after <= before, "refinement raised cost at ({x},{y})");
            }
        }
    }

    #[test]
    fn test_refinement_keeps_cost_consistent_with_plane() {
        let fx = Fixture::new(8, 8);
        let options = MatchOptions::new().patch_size(3).disparity_range(0, 4);
        let eval = fx.evaluator(&options);
        let mut rng = StdRng::seed_from_u64(5);

        let mut grids = fx.grids_with_plane(fpw_plane(1.0), &eval);
        plane_refinement(&eval, &mut grids, 4, 4, &options, &mut rng);

        let plane = *grids.planes.get(4, 4);
        assert_eq!(*grids.costs.get(4, 4), eval.aggregate(4, 4, &plane));
    }

    #[test]
    fn test_degenerate_range_skips_refinement() {
        let fx = Fixture::new(8, 8);
        let options = MatchOptions::new()
            .patch_size(3)
            .disparity_range(2, 2)
            .seed(1);
        let eval = fx.evaluator(&options);
        let mut rng = StdRng::seed_from_u64(1);

        // disp_step starts at (2 - 2) / 2 = 0, so the loop never runs and
        // the plane field stays put.
        let mut grids = fx.grids_with_plane(fpw_plane(2.0), &eval);
        let before = grids.planes.clone();
        for y in 0..8 {
            for x in 0..8 {
                plane_refinement(&eval, &mut grids, x, y, &options, &mut rng);
            }
        }
        assert_eq!(grids.planes, before);
    }

    #[test]
    fn test_view_propagation_overwrites_worse_plane() {
        let fx = Fixture::new(8, 8);
        let options = MatchOptions::new().patch_size(3).disparity_range(0, 4);
        let eval_left = fx.evaluator(&options);
        let eval_right = CostEvaluator::new(
            &fx.img,
            &fx.img,
            &fx.grad,
            &fx.grad,
            fx.width,
            fx.height,
            &options,
            -options.max_disparity,
            -options.min_disparity,
        );

        let left = fx.grids_with_plane(fpw_plane(0.0), &eval_left);
        // The right view starts on a wrong hypothesis (d = -3).
        let mut right = fx.grids_with_plane(fpw_plane(-3.0), &eval_right);

        view_propagation(&eval_right, &left, &mut right, 4, 4);

        // d = 0 maps (4,4) onto right pixel (4,4); the mapped plane is the
        // zero-disparity plane again and scores a perfect match there.
        let mapped = fpw_plane(0.0).to_other_view(4, 4);
        assert_eq!(*right.planes.get(4, 4), mapped);
        assert_eq!(*right.costs.get(4, 4), eval_right.aggregate(4, 4, &mapped));
    }

    #[test]
    fn test_view_propagation_on_two_pixel_image() {
        // Smallest interesting case: left pixel (0,0) holds the perfect
        // zero-disparity plane, its matched right pixel starts on a worse
        // hypothesis and must end up with the mapped plane.
        let fx = Fixture::new(2, 1);
        let options = MatchOptions::new().patch_size(1).disparity_range(0, 1);
        let eval_left = fx.evaluator(&options);
        let eval_right = CostEvaluator::new(
            &fx.img,
            &fx.img,
            &fx.grad,
            &fx.grad,
            fx.width,
            fx.height,
            &options,
            -options.max_disparity,
            -options.min_disparity,
        );

        let left = fx.grids_with_plane(fpw_plane(0.0), &eval_left);
        let mut right = fx.grids_with_plane(fpw_plane(-1.0), &eval_right);

        view_propagation(&eval_right, &left, &mut right, 0, 0);

        let mapped = fpw_plane(0.0).to_other_view(0, 0);
        assert_eq!(*right.planes.get(0, 0), mapped);
        assert_eq!(*right.costs.get(0, 0), eval_right.aggregate(0, 0, &mapped));
    }

    #[test]
    fn test_view_propagation_skips_out_of_bounds_match() {
        let fx = Fixture::new(8, 8);
        let options = MatchOptions::new().patch_size(3).disparity_range(0, 16);
        let eval_right = CostEvaluator::new(
            &fx.img,
            &fx.img,
            &fx.grad,
            &fx.grad,
            fx.width,
            fx.height,
            &options,
            -options.max_disparity,
            -options.min_disparity,
        );
        let eval_left = fx.evaluator(&options);

        let left = fx.grids_with_plane(fpw_plane(12.0), &eval_left);
        let mut right = fx.grids_with_plane(fpw_plane(-2.0), &eval_right);
        let before = right.planes.clone();

        // x - d = 4 - 12 = -8 is outside the right view; nothing changes.
        view_propagation(&eval_right, &left, &mut right, 4, 4);
        assert_eq!(right.planes, before);
    }

    #[test]
    fn test_sweep_leaves_costs_consistent_with_planes() {
        let fx = Fixture::new(8, 8);
        let options = MatchOptions::new()
            .patch_size(3)
            .disparity_range(0, 4)
            .seed(23);
        let eval_left = fx.evaluator(&options);
        let eval_right = CostEvaluator::new(
            &fx.img,
            &fx.img,
            &fx.grad,
            &fx.grad,
            fx.width,
            fx.height,
            &options,
            -options.max_disparity,
            -options.min_disparity,
        );
        let mut rng = StdRng::seed_from_u64(23);

        let mut left = fx.grids_with_plane(fpw_plane(2.0), &eval_left);
        let mut right = fx.grids_with_plane(fpw_plane(-2.0), &eval_right);

        sweep(
            &eval_left,
            &eval_right,
            &mut left,
            &mut right,
            &options,
            0,
            &mut rng,
        );
        sweep(
            &eval_right,
            &eval_left,
            &mut right,
            &mut left,
            &options,
            0,
            &mut rng,
        );

        // After the right pass nothing has touched the left grids since the
        // right view's cross-view writes, which keep plane and cost paired.
        for y in 0..8i32 {
            for x in 0..8i32 {
                let plane = *left.planes.get(x as usize, y as usize);
                assert_eq!(
                    *left.costs.get(x as usize, y as usize),
                    eval_left.aggregate(x, y, &plane),
                    "left cost grid inconsistent at ({x},{y})"
                );
                let plane = *right.planes.get(x as usize, y as usize);
                assert_eq!(
                    *right.costs.get(x as usize, y as usize),
                    eval_right.aggregate(x, y, &plane),
                    "right cost grid inconsistent at ({x},{y})"
                );
            }
        }
    }
}
