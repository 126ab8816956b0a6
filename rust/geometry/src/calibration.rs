// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Meter-per-pixel calibration of a processed photograph.
//!
//! A scale can come from three places:
//! - the marker detector's estimate (or a previously saved value),
//! - a reference segment of known real-world length,
//! - an anchor triplet `p0, p1, p2` with the real lengths of one or both of
//!   its edges.
//!
//! When nothing usable is supplied the result is [`Scale::Unknown`]. There is
//! deliberately no numeric default on that path: the `0.01` m/px fallback is
//! only reachable through [`Scale::preview_value`], for drawing previews.

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

use crate::types::{DimensionPair, ImageSize, Point};

/// Lower bound of an accepted triplet scale
pub const MIN_METER_PER_PIXEL: f64 = 1e-4;

/// Upper bound of an accepted triplet scale
pub const MAX_METER_PER_PIXEL: f64 = 1e-1;

/// Decimal places a triplet scale is rounded to
pub const SCALE_DECIMALS: u32 = 6;

/// Scale used to render previews when no calibration exists
pub const PREVIEW_METER_PER_PIXEL: f64 = 0.01;

/// Edges shorter than this (in pixels) carry no direction or scale
const MIN_EDGE_PIXELS: f64 = 1e-6;

/// Tunables for the calibration engine
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationConfig {
    pub min_meter_per_pixel: f64,
    pub max_meter_per_pixel: f64,
    pub decimals: u32,
    pub preview_meter_per_pixel: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            min_meter_per_pixel: MIN_METER_PER_PIXEL,
            max_meter_per_pixel: MAX_METER_PER_PIXEL,
            decimals: SCALE_DECIMALS,
            preview_meter_per_pixel: PREVIEW_METER_PER_PIXEL,
        }
    }
}

/// Largest rounding precision that still fits an `f64`
const MAX_SCALE_DECIMALS: u32 = 15;

impl CalibrationConfig {
    /// Band is finite, positive and not inverted
    pub fn has_valid_band(&self) -> bool {
        self.min_meter_per_pixel.is_finite()
            && self.max_meter_per_pixel.is_finite()
            && self.min_meter_per_pixel > 0.0
            && self.min_meter_per_pixel <= self.max_meter_per_pixel
    }

    /// Clamp into the accepted band and round.
    ///
    /// An unusable band falls back to the default one.
    pub fn finalize(&self, meter_per_pixel: f64) -> f64 {
        let (min, max) = if self.has_valid_band() {
            (self.min_meter_per_pixel, self.max_meter_per_pixel)
        } else {
            (MIN_METER_PER_PIXEL, MAX_METER_PER_PIXEL)
        };
        let clamped = meter_per_pixel.max(min).min(max);
        let factor = 10f64.powi(self.decimals.min(MAX_SCALE_DECIMALS) as i32);
        (clamped * factor).round() / factor
    }
}

/// Calibration state of a photograph
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(tag = "state", content = "meterPerPixel", rename_all = "camelCase")]
pub enum Scale {
    Known(f64),
    #[default]
    Unknown,
}

impl Scale {
    /// `Known` only for a finite, strictly positive value
    pub fn from_value(meter_per_pixel: Option<f64>) -> Self {
        match meter_per_pixel {
            Some(v) if v.is_finite() && v > 0.0 => Scale::Known(v),
            _ => Scale::Unknown,
        }
    }

    pub fn known(&self) -> Option<f64> {
        match self {
            Scale::Known(v) => Some(*v),
            Scale::Unknown => None,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Scale::Known(_))
    }

    /// Value for preview rendering only. Never use it for a persisted area.
    pub fn preview_value(&self) -> f64 {
        self.preview_value_with(&CalibrationConfig::default())
    }

    pub fn preview_value_with(&self, config: &CalibrationConfig) -> f64 {
        self.known().unwrap_or(config.preview_meter_per_pixel)
    }

    /// Keep `self` when known, otherwise try `other`
    pub fn or(self, other: Scale) -> Scale {
        if self.is_known() {
            self
        } else {
            other
        }
    }
}

/// Three observed corners: `p0 -> p1` is edge A, `p1 -> p2` is edge B
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AnchorTriplet {
    pub p0: Point,
    pub p1: Point,
    pub p2: Point,
}

/// Pixel-space description of one edge of a triplet
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    pub length_px: f64,
    /// `None` for a zero-length edge
    pub direction: Option<Vector2<f64>>,
}

impl Edge {
    fn from_delta(delta: Vector2<f64>) -> Self {
        let length_px = delta.norm();
        let direction = if length_px.is_finite() && length_px > MIN_EDGE_PIXELS {
            Some(delta / length_px)
        } else {
            None
        };
        Self {
            length_px,
            direction,
        }
    }

    /// Meters per pixel if this edge is `length_cm` long in reality
    fn candidate(&self, length_cm: Option<f64>) -> Option<f64> {
        self.direction?;
        let cm = length_cm.filter(|cm| cm.is_finite() && *cm > 0.0)?;
        Some(cm / 100.0 / self.length_px)
    }
}

impl AnchorTriplet {
    pub fn new(p0: Point, p1: Point, p2: Point) -> Self {
        Self { p0, p1, p2 }
    }

    /// Edges A (`p0 -> p1`) and B (`p1 -> p2`) in pixels of `image`
    pub fn edges(&self, image: ImageSize) -> (Edge, Edge) {
        (
            Edge::from_delta(image.pixel_delta(&self.p0, &self.p1)),
            Edge::from_delta(image.pixel_delta(&self.p1, &self.p2)),
        )
    }
}

/// One source of calibration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum CalibrationInput {
    /// Estimate from the marker detector or a prior save
    #[serde(rename_all = "camelCase")]
    Detector { estimated_pixel_scale: Option<f64> },
    /// Segment of known length
    #[serde(rename_all = "camelCase")]
    Reference { pair: DimensionPair, length_cm: f64 },
    /// Anchor corners with one or two known side lengths
    #[serde(rename_all = "camelCase")]
    Triplet {
        anchor: AnchorTriplet,
        a_cm: Option<f64>,
        b_cm: Option<f64>,
    },
}

impl CalibrationInput {
    /// Lower ranks win in [`resolve_scale`]
    fn priority(&self) -> u8 {
        match self {
            CalibrationInput::Triplet { .. } => 0,
            CalibrationInput::Reference { .. } => 1,
            CalibrationInput::Detector { .. } => 2,
        }
    }
}

/// Accept a detector estimate if it is a usable number
pub fn detector_scale(estimated_pixel_scale: Option<f64>) -> Scale {
    Scale::from_value(estimated_pixel_scale)
}

/// Scale from a reference segment of `length_cm`
pub fn reference_scale(pair: &DimensionPair, length_cm: f64, image: ImageSize) -> Scale {
    if !image.is_valid() || !length_cm.is_finite() || length_cm <= 0.0 {
        return Scale::Unknown;
    }
    let length_px = pair.pixel_length(image);
    if !length_px.is_finite() || length_px <= MIN_EDGE_PIXELS {
        return Scale::Unknown;
    }
    Scale::from_value(Some(length_cm / 100.0 / length_px))
}

/// Scale from a triplet and the real lengths of its edges.
///
/// With both lengths the two candidates are averaged weighted by their pixel
/// lengths, so the longer edge dominates. The result is clamped into the
/// configured band and rounded.
pub fn triplet_scale(
    anchor: &AnchorTriplet,
    a_cm: Option<f64>,
    b_cm: Option<f64>,
    image: ImageSize,
    config: &CalibrationConfig,
) -> Scale {
    if !image.is_valid() {
        return Scale::Unknown;
    }
    let (edge_a, edge_b) = anchor.edges(image);

    let raw = match (edge_a.candidate(a_cm), edge_b.candidate(b_cm)) {
        (Some(sa), Some(sb)) => {
            let (wa, wb) = (edge_a.length_px, edge_b.length_px);
            (sa * wa + sb * wb) / (wa + wb)
        }
        (Some(s), None) | (None, Some(s)) => s,
        (None, None) => return Scale::Unknown,
    };

    Scale::from_value(Some(config.finalize(raw)))
}

/// Evaluate a single calibration source
pub fn calibrate(input: &CalibrationInput, image: ImageSize) -> Scale {
    calibrate_with(input, image, &CalibrationConfig::default())
}

pub fn calibrate_with(
    input: &CalibrationInput,
    image: ImageSize,
    config: &CalibrationConfig,
) -> Scale {
    match input {
        CalibrationInput::Detector {
            estimated_pixel_scale,
        } => detector_scale(*estimated_pixel_scale),
        CalibrationInput::Reference { pair, length_cm } => {
            reference_scale(pair, *length_cm, image)
        }
        CalibrationInput::Triplet { anchor, a_cm, b_cm } => {
            triplet_scale(anchor, *a_cm, *b_cm, image, config)
        }
    }
}

/// First usable scale among `inputs`.
///
/// User-supplied geometry (triplet, then reference segment) wins over the
/// detector estimate; inputs of the same kind keep their given order.
pub fn resolve_scale(inputs: &[CalibrationInput], image: ImageSize) -> Scale {
    resolve_scale_with(inputs, image, &CalibrationConfig::default())
}

pub fn resolve_scale_with(
    inputs: &[CalibrationInput],
    image: ImageSize,
    config: &CalibrationConfig,
) -> Scale {
    let mut ordered: Vec<&CalibrationInput> = inputs.iter().collect();
    ordered.sort_by_key(|input| input.priority());
    ordered
        .into_iter()
        .map(|input| calibrate_with(input, image, config))
        .find(Scale::is_known)
        .unwrap_or(Scale::Unknown)
}
