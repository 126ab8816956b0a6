// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Polygons derived from typed dimensions.
//!
//! A surveyor who knows a wall is 800 × 300 cm can get a polygon without
//! tracing it. Without a photo anchor the result is a canonical outline in the
//! unit square. With an anchor triplet and a rectangle, the outline is laid
//! along the two observed edges at the calibrated pixel lengths.
//!
//! Only rectangles have an image-aligned variant; triangles and pentagons
//! always use the canonical outline.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::calibration::{triplet_scale, AnchorTriplet, CalibrationConfig, Scale};
use crate::error::{Error, Result};
use crate::types::{ImageSize, Point};

/// Offset of canonical outlines from the top-left corner
pub const SHAPE_MARGIN: f64 = 0.05;

/// Share of the unit square taken by the longest side
pub const SHAPE_EXTENT: f64 = 0.9;

/// Height of the pentagon's eaves, measured from its top
const GABLE_EAVES_RATIO: f64 = 0.4;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    Rectangle,
    Triangle,
    /// Gable wall: rectangle with a triangular top
    Pentagon,
}

/// Width/height in the unit square for real width `a_cm` and height `b_cm`
fn extents(a_cm: f64, b_cm: f64) -> (f64, f64) {
    let valid = |v: f64| v.is_finite() && v > 0.0;
    if !valid(a_cm) || !valid(b_cm) {
        return (SHAPE_EXTENT, SHAPE_EXTENT);
    }
    let aspect = b_cm / a_cm;
    if aspect <= 1.0 {
        (SHAPE_EXTENT, SHAPE_EXTENT * aspect)
    } else {
        (SHAPE_EXTENT / aspect, SHAPE_EXTENT)
    }
}

/// Canonical outline of `kind` with aspect ratio `b_cm / a_cm`
pub fn normalized_shape(kind: ShapeKind, a_cm: f64, b_cm: f64) -> Vec<Point> {
    let (w, h) = extents(a_cm, b_cm);
    let (left, top) = (SHAPE_MARGIN, SHAPE_MARGIN);
    let (right, bottom) = (left + w, top + h);

    match kind {
        ShapeKind::Rectangle => vec![
            Point::new(left, top),
            Point::new(right, top),
            Point::new(right, bottom),
            Point::new(left, bottom),
        ],
        ShapeKind::Triangle => vec![
            Point::new(left, bottom),
            Point::new(right, bottom),
            Point::new(left + w / 2.0, top),
        ],
        ShapeKind::Pentagon => {
            let eaves = top + h * GABLE_EAVES_RATIO;
            vec![
                Point::new(left, bottom),
                Point::new(right, bottom),
                Point::new(right, eaves),
                Point::new(left + w / 2.0, top),
                Point::new(left, eaves),
            ]
        }
    }
}

/// Rectangle fitted to an anchor triplet
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedRectangle {
    pub points: Vec<Point>,
    /// Scale used for the fit (supplied or re-estimated from the triplet)
    pub meter_per_pixel: f64,
}

/// Lay an `a_cm × b_cm` rectangle along the edges of `anchor`.
///
/// `a_cm` runs along `p0 -> p1` and `b_cm` along `p1 -> p2`, or the other way
/// round with `swap_axes`. A known `scale` is used as is; otherwise the scale
/// is estimated from the triplet and the same lengths.
pub fn aligned_rectangle(
    anchor: &AnchorTriplet,
    image: ImageSize,
    a_cm: f64,
    b_cm: f64,
    scale: Scale,
    swap_axes: bool,
    config: &CalibrationConfig,
) -> Result<AlignedRectangle> {
    if !image.is_valid() {
        return Err(Error::DegenerateGeometry(format!(
            "image size {}x{} is not positive",
            image.width, image.height
        )));
    }
    let (along_a, along_b) = if swap_axes { (b_cm, a_cm) } else { (a_cm, b_cm) };
    if !(along_a.is_finite() && along_a > 0.0 && along_b.is_finite() && along_b > 0.0) {
        return Err(Error::InvalidDimensions(format!(
            "rectangle sides must be positive, got {} x {}",
            a_cm, b_cm
        )));
    }

    let (edge_a, edge_b) = anchor.edges(image);
    let (Some(u), Some(v)) = (edge_a.direction, edge_b.direction) else {
        return Err(Error::DegenerateGeometry(
            "anchor triplet has a zero-length edge".to_string(),
        ));
    };

    let meter_per_pixel = scale
        .or(triplet_scale(anchor, Some(along_a), Some(along_b), image, config))
        .known()
        .ok_or_else(|| Error::DegenerateGeometry("no scale for anchor triplet".to_string()))?;

    let len_a = along_a / 100.0 / meter_per_pixel;
    let len_b = along_b / 100.0 / meter_per_pixel;

    let origin = anchor.p0.to_pixels(image);
    let corners: [Point2<f64>; 4] = [
        origin,
        origin + u * len_a,
        origin + u * len_a + v * len_b,
        origin + v * len_b,
    ];

    Ok(AlignedRectangle {
        points: corners
            .iter()
            .map(|c| Point::from_pixels(c, image).clamped())
            .collect(),
        meter_per_pixel,
    })
}

/// Input of [`derive_shape`]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ShapeRequest {
    pub kind: ShapeKind,
    pub a_cm: f64,
    pub b_cm: f64,
    #[serde(default)]
    pub anchor: Option<AnchorTriplet>,
    #[serde(default)]
    pub image: Option<ImageSize>,
    #[serde(default)]
    pub scale: Scale,
    #[serde(default)]
    pub swap_axes: bool,
}

impl ShapeRequest {
    pub fn new(kind: ShapeKind, a_cm: f64, b_cm: f64) -> Self {
        Self {
            kind,
            a_cm,
            b_cm,
            anchor: None,
            image: None,
            scale: Scale::Unknown,
            swap_axes: false,
        }
    }

    pub fn anchored(mut self, anchor: AnchorTriplet, image: ImageSize) -> Self {
        self.anchor = Some(anchor);
        self.image = Some(image);
        self
    }
}

/// Output of [`derive_shape`]
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedShape {
    pub points: Vec<Point>,
    pub scale: Scale,
    pub image_aligned: bool,
}

/// Image-aligned rectangle when possible, canonical outline otherwise
pub fn derive_shape(request: &ShapeRequest, config: &CalibrationConfig) -> DerivedShape {
    if let (ShapeKind::Rectangle, Some(anchor), Some(image)) =
        (request.kind, request.anchor.as_ref(), request.image)
    {
        match aligned_rectangle(
            anchor,
            image,
            request.a_cm,
            request.b_cm,
            request.scale,
            request.swap_axes,
            config,
        ) {
            Ok(fit) => {
                return DerivedShape {
                    points: fit.points,
                    scale: Scale::Known(fit.meter_per_pixel),
                    image_aligned: true,
                }
            }
            Err(err) => {
                tracing::debug!(error = %err, "Anchored rectangle not derivable, using canonical outline");
            }
        }
    }

    DerivedShape {
        points: normalized_shape(request.kind, request.a_cm, request.b_cm),
        scale: request.scale,
        image_aligned: false,
    }
}
