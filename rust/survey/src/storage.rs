// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Ports to the external collaborators: image processing and persistence.
//!
//! The engines never talk to a backend directly. Implementations of
//! [`ImageProcessor`] and [`MeasurementStore`] live in the host application;
//! this module only fixes the payloads and the storage layout.

use std::fmt;

use facade_lite_geometry::{
    CalibrationInput, DimensionPair, OpeningKind, Point, PolygonId, PolygonSurface, ShadingKind,
    SurfaceRole,
};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::ids::{CompanyId, SurveyId, WallId};
use crate::wall::WallImage;

/// Which copy of a photograph a blob holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageVariant {
    Original,
    Processed,
}

impl ImageVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageVariant::Original => "original",
            ImageVariant::Processed => "processed",
        }
    }
}

/// Blob key `{company}/{survey}/{wall}/{variant}/{timestamp}_{filename}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePath {
    pub company: CompanyId,
    pub survey: SurveyId,
    pub wall: WallId,
    pub variant: ImageVariant,
    /// Milliseconds since the Unix epoch
    pub timestamp_ms: u64,
    pub filename: String,
}

impl StoragePath {
    pub fn new(
        company: CompanyId,
        survey: SurveyId,
        wall: WallId,
        variant: ImageVariant,
        timestamp_ms: u64,
        filename: &str,
    ) -> Self {
        Self {
            company,
            survey,
            wall,
            variant,
            timestamp_ms,
            filename: sanitize_filename(filename),
        }
    }
}

impl fmt::Display for StoragePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}/{}_{}",
            self.company,
            self.survey,
            self.wall,
            self.variant.as_str(),
            self.timestamp_ms,
            self.filename
        )
    }
}

/// Keep a client-supplied name from escaping its directory
fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    if base.is_empty() {
        "image".to_string()
    } else {
        base.to_string()
    }
}

/// Response of the perspective-rectification service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RectificationResponse {
    pub rectified: bool,
    #[serde(default)]
    pub estimated_pixel_scale: Option<f64>,
    pub image_url: String,
}

impl RectificationResponse {
    /// The detector's estimate as one calibration candidate among others
    pub fn calibration_input(&self) -> CalibrationInput {
        CalibrationInput::Detector {
            estimated_pixel_scale: self.estimated_pixel_scale,
        }
    }
}

/// Image-processing collaborator
#[allow(async_fn_in_trait)]
pub trait ImageProcessor {
    /// Rectify a raw photograph, optionally hinting the printed marker size
    async fn rectify(
        &self,
        photo: &[u8],
        marker_size_cm: Option<f64>,
    ) -> Result<RectificationResponse>;
}

/// Wall row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WallRecord {
    pub id: WallId,
    pub survey_id: SurveyId,
    pub name: String,
}

/// Wall-image row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WallImageRecord {
    pub wall_id: WallId,
    pub original_url: String,
    pub processed_url: String,
    pub width: f64,
    pub height: f64,
    pub meter_per_pixel: Option<f64>,
    pub reference_points: Option<DimensionPair>,
    pub reference_length_cm: Option<f64>,
}

impl WallImageRecord {
    pub fn new(wall_id: &WallId, image: &WallImage) -> Self {
        Self {
            wall_id: wall_id.clone(),
            original_url: image.original_url.clone(),
            processed_url: image.processed_url.clone(),
            width: image.width,
            height: image.height,
            meter_per_pixel: image.meter_per_pixel,
            reference_points: image.reference,
            reference_length_cm: image.reference_length_cm,
        }
    }

    pub fn into_image(self) -> WallImage {
        WallImage {
            original_url: self.original_url,
            processed_url: self.processed_url,
            width: self.width,
            height: self.height,
            meter_per_pixel: self.meter_per_pixel,
            reference: self.reference_points,
            reference_length_cm: self.reference_length_cm,
        }
    }
}

/// Polygon row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolygonRecord {
    pub id: PolygonId,
    pub wall_id: WallId,
    #[serde(rename = "type")]
    pub role: Option<SurfaceRole>,
    pub sub_type: Option<OpeningKind>,
    pub shading: Option<ShadingKind>,
    pub name: String,
    pub visible: bool,
    pub closed: bool,
    pub points: Vec<Point>,
}

impl PolygonRecord {
    pub fn new(wall_id: &WallId, polygon: &PolygonSurface) -> Self {
        Self {
            id: polygon.id.clone(),
            wall_id: wall_id.clone(),
            role: polygon.role,
            sub_type: polygon.sub_type,
            shading: polygon.shading,
            name: polygon.name.clone(),
            visible: polygon.visible,
            closed: polygon.closed,
            points: polygon.points.clone(),
        }
    }

    pub fn into_surface(self) -> PolygonSurface {
        PolygonSurface {
            id: self.id,
            name: self.name,
            points: self.points,
            closed: self.closed,
            role: self.role,
            sub_type: self.sub_type,
            shading: self.shading,
            visible: self.visible,
        }
    }
}

/// Storage collaborator for blobs and records
#[allow(async_fn_in_trait)]
pub trait MeasurementStore {
    /// Store an image blob and return its public URL
    async fn upload_image(&self, path: &StoragePath, bytes: &[u8]) -> Result<String>;

    async fn insert_wall(&self, record: &WallRecord) -> Result<()>;

    async fn insert_wall_image(&self, record: &WallImageRecord) -> Result<()>;

    /// Delete every polygon row of `wall` and insert `polygons` in its place
    async fn replace_polygons(&self, wall: &WallId, polygons: &[PolygonRecord]) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(filename: &str) -> StoragePath {
        StoragePath::new(
            CompanyId::from("acme"),
            SurveyId::from("s1"),
            WallId::from("w1"),
            ImageVariant::Processed,
            1_700_000_000_000,
            filename,
        )
    }

    #[test]
    fn storage_path_layout() {
        assert_eq!(
            path("front.jpg").to_string(),
            "acme/s1/w1/processed/1700000000000_front.jpg"
        );
    }

    #[test]
    fn filename_cannot_escape_directory() {
        assert_eq!(path("../../etc/passwd").filename, "passwd");
        assert_eq!(path("C:\\photos\\a.png").filename, "a.png");
        assert_eq!(path("dir/").filename, "image");
    }

    #[test]
    fn rectification_response_from_json() {
        let response: RectificationResponse = serde_json::from_str(
            r#"{"rectified":true,"estimatedPixelScale":0.0025,"imageUrl":"https://x/p.jpg"}"#,
        )
        .unwrap();
        assert_eq!(
            response.calibration_input(),
            CalibrationInput::Detector {
                estimated_pixel_scale: Some(0.0025)
            }
        );

        let missing: RectificationResponse =
            serde_json::from_str(r#"{"rectified":false,"estimatedPixelScale":null,"imageUrl":""}"#)
                .unwrap();
        assert_eq!(missing.estimated_pixel_scale, None);
    }

    #[test]
    fn polygon_record_keeps_every_attribute() {
        let polygon = PolygonSurface::closed_with_role(
            PolygonId::from("p"),
            "Window 1",
            SurfaceRole::WindowDoor,
            vec![Point::new(0.1, 0.1), Point::new(0.2, 0.1), Point::new(0.2, 0.2)],
        )
        .with_sub_type(OpeningKind::Window)
        .with_shading(ShadingKind::Blind);

        let record = PolygonRecord::new(&WallId::from("w1"), &polygon);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "WINDOW_DOOR");
        assert_eq!(json["wallId"], "w1");
        assert_eq!(record.into_surface(), polygon);
    }
}
