// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Facade-Lite Geometry
//!
//! Measurement primitives for calibrated facade photographs: meter-per-pixel
//! calibration, union/difference areas of drawn polygons (via i_overlay) and
//! polygons derived from typed dimensions.

pub mod bool2d;
pub mod calibration;
pub mod error;
pub mod shapes;
pub mod types;

// Re-export nalgebra types for convenience
pub use nalgebra::{Point2, Vector2};

pub use bool2d::{difference_area, try_difference_area, try_union_area, union_area};
pub use calibration::{
    calibrate, resolve_scale, AnchorTriplet, CalibrationConfig, CalibrationInput, Scale,
};
pub use error::{Error, Result};
pub use shapes::{derive_shape, normalized_shape, DerivedShape, ShapeKind, ShapeRequest};
pub use types::{
    DimensionPair, ImageSize, OpeningKind, Point, PolygonId, PolygonSurface, ShadingKind,
    SurfaceRole,
};
