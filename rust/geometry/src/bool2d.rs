// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! 2D Boolean Area Operations for Facade Polygons
//!
//! Computes real-world areas of unions and differences of user-drawn polygons
//! using the i_overlay crate. Polygons arrive in the normalized image frame,
//! are denormalized into pixel space before clipping, and the resulting pixel
//! area is scaled by `meter_per_pixel²`.
//!
//! Freehand input is not guaranteed to be well formed, so the infallible entry
//! points ([`union_area`], [`difference_area`]) never propagate a failure: a
//! clipping error is logged and counts as an area of zero. The `try_` variants
//! expose the error for callers that want it.

use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::error::{Error, Result};
use crate::types::{ImageSize, Point};
use i_overlay::core::fill_rule::FillRule;
use i_overlay::core::overlay_rule::OverlayRule;
use i_overlay::float::single::SingleFloatOverlay;
use nalgebra::Point2;

/// i_overlay path format: one ring, implicitly closed
type Path = Vec<[f64; 2]>;

/// i_overlay result format: shapes, each an outer ring followed by its holes
type Shapes = Vec<Vec<Path>>;

/// Union area of `polygons` in square meters.
///
/// Polygons with fewer than 3 points are ignored. Overlapping members are
/// counted once.
pub fn union_area<'a>(
    polygons: impl IntoIterator<Item = &'a [Point]>,
    image: ImageSize,
    meter_per_pixel: f64,
) -> f64 {
    settle("union", try_union_area(polygons, image, meter_per_pixel))
}

/// Area of `union(base) - union(subtract)` in square meters.
///
/// An empty base (after dropping polygons with fewer than 3 points) yields 0
/// regardless of the subtract set.
pub fn difference_area<'a>(
    base: impl IntoIterator<Item = &'a [Point]>,
    subtract: impl IntoIterator<Item = &'a [Point]>,
    image: ImageSize,
    meter_per_pixel: f64,
) -> f64 {
    settle(
        "difference",
        try_difference_area(base, subtract, image, meter_per_pixel),
    )
}

/// Fallible form of [`union_area`]
pub fn try_union_area<'a>(
    polygons: impl IntoIterator<Item = &'a [Point]>,
    image: ImageSize,
    meter_per_pixel: f64,
) -> Result<f64> {
    let subject = prepare_rings(polygons, image)?;
    if subject.is_empty() {
        return Ok(0.0);
    }
    check_scale(image, meter_per_pixel)?;

    let clip: Vec<Path> = Vec::new();
    let shapes = run_overlay(&subject, &clip, OverlayRule::Union)?;
    Ok(shapes_area(&shapes) * meter_per_pixel * meter_per_pixel)
}

/// Fallible form of [`difference_area`]
pub fn try_difference_area<'a>(
    base: impl IntoIterator<Item = &'a [Point]>,
    subtract: impl IntoIterator<Item = &'a [Point]>,
    image: ImageSize,
    meter_per_pixel: f64,
) -> Result<f64> {
    let subject = prepare_rings(base, image)?;
    if subject.is_empty() {
        return Ok(0.0);
    }
    check_scale(image, meter_per_pixel)?;

    let clip = prepare_rings(subtract, image)?;
    // Every ring is counter-clockwise, so NonZero fill unions each side
    // before the rule is applied.
    let rule = if clip.is_empty() {
        OverlayRule::Union
    } else {
        OverlayRule::Difference
    };
    let shapes = run_overlay(&subject, &clip, rule)?;
    Ok(shapes_area(&shapes) * meter_per_pixel * meter_per_pixel)
}

/// Compute the signed area of a 2D contour
/// Positive = counter-clockwise, Negative = clockwise
pub fn compute_signed_area(contour: &[Point2<f64>]) -> f64 {
    if contour.len() < 3 {
        return 0.0;
    }

    let mut area = 0.0;
    let n = contour.len();

    for i in 0..n {
        let j = (i + 1) % n;
        area += contour[i].x * contour[j].y;
        area -= contour[j].x * contour[i].y;
    }

    area * 0.5
}

/// Ensure contour has counter-clockwise winding (positive area)
pub fn ensure_ccw(contour: &[Point2<f64>]) -> Vec<Point2<f64>> {
    let area = compute_signed_area(contour);
    if area < 0.0 {
        contour.iter().rev().cloned().collect()
    } else {
        contour.to_vec()
    }
}

/// Denormalize `points` into pixel space and force the ring closed
pub fn closed_pixel_ring(points: &[Point], image: ImageSize) -> Vec<Point2<f64>> {
    let mut ring: Vec<Point2<f64>> = points.iter().map(|p| p.to_pixels(image)).collect();
    if let (Some(first), Some(last)) = (ring.first().copied(), ring.last().copied()) {
        if first != last {
            ring.push(first);
        }
    }
    ring
}

// ============================================================================
// Internal Helper Functions
// ============================================================================

fn settle(op: &str, result: Result<f64>) -> f64 {
    match result {
        Ok(area) => area,
        Err(err @ Error::Clipping(_)) => {
            tracing::warn!(op = op, error = %err, "Polygon clipping failed, area treated as 0");
            0.0
        }
        Err(err) => {
            tracing::debug!(op = op, error = %err, "Degenerate area input, area treated as 0");
            0.0
        }
    }
}

fn check_scale(image: ImageSize, meter_per_pixel: f64) -> Result<()> {
    if !image.is_valid() {
        return Err(Error::DegenerateGeometry(format!(
            "image size {}x{} is not positive",
            image.width, image.height
        )));
    }
    if !meter_per_pixel.is_finite() || meter_per_pixel <= 0.0 {
        return Err(Error::DegenerateGeometry(format!(
            "meter-per-pixel {} is not positive",
            meter_per_pixel
        )));
    }
    Ok(())
}

/// Drop short polygons, close the rest and convert to counter-clockwise paths
fn prepare_rings<'a>(
    polygons: impl IntoIterator<Item = &'a [Point]>,
    image: ImageSize,
) -> Result<Vec<Path>> {
    let mut paths = Vec::new();
    for points in polygons.into_iter().filter(|p| p.len() >= 3) {
        if points.iter().any(|p| !p.is_finite()) {
            return Err(Error::Clipping("polygon has a non-finite coordinate".to_string()));
        }
        let ring = ensure_ccw(&closed_pixel_ring(points, image));
        paths.extend(resolve_ring(ring_to_path(&ring))?);
    }
    Ok(paths)
}

/// Fill one ring on its own and return its simple contours, outer rings
/// counter-clockwise and holes clockwise.
///
/// The lobes of a self-intersecting ring wind in opposite directions. Left
/// as is, a clockwise lobe would cancel against any other polygon covering
/// it in the shared NonZero overlay.
fn resolve_ring(path: Path) -> Result<Vec<Path>> {
    let subject = vec![path];
    let shapes = run_overlay(&subject, &Vec::new(), OverlayRule::Union)?;

    let mut contours = Vec::new();
    for shape in shapes {
        for (index, mut contour) in shape.into_iter().enumerate() {
            let area = signed_path_area(&contour);
            let is_outer = index == 0;
            if (is_outer && area < 0.0) || (!is_outer && area > 0.0) {
                contour.reverse();
            }
            contours.push(contour);
        }
    }
    Ok(contours)
}

/// Convert a closed ring to i_overlay path format, dropping the closing vertex
fn ring_to_path(ring: &[Point2<f64>]) -> Path {
    let open = match (ring.first(), ring.last()) {
        (Some(first), Some(last)) if ring.len() > 1 && first == last => &ring[..ring.len() - 1],
        _ => ring,
    };
    open.iter().map(|p| [p.x, p.y]).collect()
}

#[allow(clippy::ptr_arg)]
fn run_overlay(subject: &Vec<Path>, clip: &Vec<Path>, rule: OverlayRule) -> Result<Shapes> {
    catch_unwind(AssertUnwindSafe(|| {
        subject.overlay(clip, rule, FillRule::NonZero)
    }))
    .map_err(|_| Error::Clipping("overlay aborted on malformed input".to_string()))
}

/// Shoelace area of an implicitly closed path, same sign convention as
/// [`compute_signed_area`]
fn signed_path_area(path: &[[f64; 2]]) -> f64 {
    let n = path.len();
    if n < 3 {
        return 0.0;
    }
    let mut area = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        area += path[i][0] * path[j][1] - path[j][0] * path[i][1];
    }
    area * 0.5
}

fn path_area(path: &[[f64; 2]]) -> f64 {
    signed_path_area(path).abs()
}

/// Sum of outer ring areas minus their holes, in the path's own units
fn shapes_area(shapes: &Shapes) -> f64 {
    shapes
        .iter()
        .filter_map(|shape| {
            let (outer, holes) = shape.split_first()?;
            let holes: f64 = holes.iter().map(|h| path_area(h)).sum();
            Some((path_area(outer) - holes).max(0.0))
        })
        .sum()
}
