//! Left/right consistency checking and plane-based hole filling.

use crate::disparity::INVALID_DISPARITY;
use crate::grid::Grid;
use crate::plane::DisparityPlane;

/// Invalidate pixels whose disparity disagrees with their match in the
/// opposing view, returning the mismatched pixel list.
///
/// Because the two views carry opposite disparity signs, agreement means the
/// *sum* of the two disparities stays within `threshold`. Pixels that are
/// already invalid, map outside the opposing view, or disagree are set to
/// the invalid sentinel and recorded.
pub(crate) fn lr_check(
    disp_ref: &mut Grid<f32>,
    disp_other: &Grid<f32>,
    threshold: f32,
) -> Vec<(i32, i32)> {
    let width = disp_ref.width() as i32;
    let height = disp_ref.height() as i32;
    let mut mismatches = Vec::new();

    for y in 0..height {
        for x in 0..width {
            let d = *disp_ref.get(x as usize, y as usize);
            if d == INVALID_DISPARITY {
                mismatches.push((x, y));
                continue;
            }

            let xr = (x as f64 - d as f64).round() as i32;
            if xr < 0 || xr >= width {
                disp_ref.set(x as usize, y as usize, INVALID_DISPARITY);
                mismatches.push((x, y));
            } else {
                let d_other = *disp_other.get(xr as usize, y as usize);
                if (d + d_other).abs() > threshold {
                    disp_ref.set(x as usize, y as usize, INVALID_DISPARITY);
                    mismatches.push((x, y));
                }
            }
        }
    }

    mismatches
}

/// Fill mismatched pixels by extrapolating the nearest valid planes on the
/// same scanline.
///
/// For each hole the first valid pixel to the right and to the left donate
/// their planes; with two donors the smaller extrapolated disparity wins
/// (farther in depth, the conservative choice for occlusions). All fill
/// values are computed before any are written so holes on the same row do
/// not feed each other.
pub(crate) fn fill_holes(
    disp: &mut Grid<f32>,
    planes: &Grid<DisparityPlane>,
    mismatches: &[(i32, i32)],
) {
    let width = disp.width() as i32;
    let mut fills = Vec::with_capacity(mismatches.len());

    for &(x, y) in mismatches {
        let mut donors = Vec::with_capacity(2);

        let mut xr = x + 1;
        while xr < width {
            if *disp.get(xr as usize, y as usize) != INVALID_DISPARITY {
                donors.push(*planes.get(xr as usize, y as usize));
                break;
            }
            xr += 1;
        }

        let mut xl = x - 1;
        while xl >= 0 {
            if *disp.get(xl as usize, y as usize) != INVALID_DISPARITY {
                donors.push(*planes.get(xl as usize, y as usize));
                break;
            }
            xl -= 1;
        }

        let fill = match donors.len() {
            0 => *disp.get(x as usize, y as usize),
            1 => donors[0].disparity_at(x, y),
            _ => donors[0].disparity_at(x, y).min(donors[1].disparity_at(x, y)),
        };
        fills.push(fill);
    }

    for (&(x, y), &fill) in mismatches.iter().zip(&fills) {
        disp.set(x as usize, y as usize, fill);
    }
}
