// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Walls measured in marker mode: calibrated photographs plus drawn polygons.

use facade_lite_geometry::calibration::Scale;
use facade_lite_geometry::{DimensionPair, ImageSize, PolygonId, PolygonSurface, SurfaceRole};
use serde::{Deserialize, Serialize};

use crate::ids::WallId;

/// Compass orientation of a facade
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Orientation {
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
}

impl Orientation {
    pub const ALL: [Orientation; 8] = [
        Orientation::North,
        Orientation::NorthEast,
        Orientation::East,
        Orientation::SouthEast,
        Orientation::South,
        Orientation::SouthWest,
        Orientation::West,
        Orientation::NorthWest,
    ];

    /// Label shown in the survey form
    pub fn label(&self) -> &'static str {
        match self {
            Orientation::North => "É",
            Orientation::NorthEast => "ÉK",
            Orientation::East => "K",
            Orientation::SouthEast => "DK",
            Orientation::South => "D",
            Orientation::SouthWest => "DNY",
            Orientation::West => "NY",
            Orientation::NorthWest => "ÉNY",
        }
    }

    /// Inverse of [`Orientation::label`], ignoring case and surrounding whitespace
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim().to_uppercase();
        Self::ALL.into_iter().find(|o| o.label() == label)
    }
}

/// One calibrated photograph of a wall
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WallImage {
    pub original_url: String,
    pub processed_url: String,
    /// Pixel width of the processed image
    pub width: f64,
    /// Pixel height of the processed image
    pub height: f64,
    #[serde(default)]
    pub meter_per_pixel: Option<f64>,
    /// Reference segment the scale was derived from, kept for recalibration
    #[serde(default)]
    pub reference: Option<DimensionPair>,
    #[serde(default)]
    pub reference_length_cm: Option<f64>,
}

impl WallImage {
    pub fn size(&self) -> ImageSize {
        ImageSize::new(self.width, self.height)
    }

    pub fn scale(&self) -> Scale {
        Scale::from_value(self.meter_per_pixel)
    }
}

/// A wall of the surveyed building
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Wall {
    pub id: WallId,
    pub name: String,
    #[serde(default)]
    pub orientation: Option<Orientation>,
    #[serde(default)]
    pub images: Vec<WallImage>,
    #[serde(default)]
    pub polygons: Vec<PolygonSurface>,
}

impl Wall {
    pub fn new(id: WallId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            orientation: None,
            images: Vec::new(),
            polygons: Vec::new(),
        }
    }

    /// The image whose calibration is authoritative for the whole wall
    pub fn primary_image(&self) -> Option<&WallImage> {
        self.images.first()
    }

    /// Pixel size and meter-per-pixel of the primary image, if both are usable
    pub fn calibration(&self) -> Option<(ImageSize, f64)> {
        let image = self.primary_image()?;
        let size = image.size();
        if !size.is_valid() {
            return None;
        }
        Some((size, image.scale().known()?))
    }

    /// Closed polygons with `role`, in drawing order
    pub fn polygons_with_role(&self, role: SurfaceRole) -> impl Iterator<Item = &PolygonSurface> {
        self.polygons
            .iter()
            .filter(move |p| p.closed && p.has_role(role))
    }

    pub fn polygon(&self, id: &PolygonId) -> Option<&PolygonSurface> {
        self.polygons.iter().find(|p| &p.id == id)
    }

    /// Replace the polygon with the same id, or append it
    pub fn upsert_polygon(&mut self, polygon: PolygonSurface) {
        match self.polygons.iter_mut().find(|p| p.id == polygon.id) {
            Some(existing) => *existing = polygon,
            None => self.polygons.push(polygon),
        }
    }

    pub fn remove_polygon(&mut self, id: &PolygonId) -> Option<PolygonSurface> {
        let idx = self.polygons.iter().position(|p| &p.id == id)?;
        Some(self.polygons.remove(idx))
    }
}
