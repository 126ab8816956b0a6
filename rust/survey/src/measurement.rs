// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Saving one measured photograph of a wall.
//!
//! Writes happen strictly in sequence because later records reference the
//! URLs and ids produced by earlier ones:
//!
//! upload original → upload processed → wall record (new walls only)
//! → wall-image record → polygon replacement
//!
//! The repository is touched only after the last write succeeded, so a failed
//! save never leaves an in-memory wall pointing at an unwritten image.

use std::time::{SystemTime, UNIX_EPOCH};

use facade_lite_geometry::calibration::resolve_scale_with;
use facade_lite_geometry::{CalibrationInput, DimensionPair, ImageSize, PolygonSurface};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::Result;
use crate::ids::{CompanyId, SurveyId, WallId};
use crate::repository::WallRepository;
use crate::storage::{
    ImageVariant, MeasurementStore, PolygonRecord, StoragePath, WallImageRecord, WallRecord,
};
use crate::wall::{Orientation, Wall, WallImage};

/// One image blob to upload
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }
}

/// Everything needed to persist one measurement
#[derive(Debug, Clone)]
pub struct SaveMeasurement {
    pub company: CompanyId,
    pub survey: SurveyId,
    /// Existing wall to add the photograph to; `None` creates a new wall
    pub wall_id: Option<WallId>,
    /// Name and orientation of a new wall; ignored for existing walls
    pub wall_name: String,
    pub orientation: Option<Orientation>,
    pub original: ImageUpload,
    pub processed: ImageUpload,
    /// Pixel size of the processed image
    pub image_size: ImageSize,
    pub reference: Option<DimensionPair>,
    pub reference_length_cm: Option<f64>,
    /// Estimate reported by the rectification service
    pub estimated_pixel_scale: Option<f64>,
    /// Full polygon set of the wall after this measurement
    pub polygons: Vec<PolygonSurface>,
}

impl SaveMeasurement {
    /// Calibration candidates in the order the user supplied them
    fn calibration_inputs(&self) -> Vec<CalibrationInput> {
        let mut inputs = Vec::with_capacity(2);
        if let (Some(pair), Some(length_cm)) = (self.reference, self.reference_length_cm) {
            inputs.push(CalibrationInput::Reference { pair, length_cm });
        }
        inputs.push(CalibrationInput::Detector {
            estimated_pixel_scale: self.estimated_pixel_scale,
        });
        inputs
    }
}

/// Persist a measurement through `store`, then register it in `repo`.
///
/// The new image becomes the wall's primary image. Returns the id of the wall
/// that now holds the measurement.
pub async fn save_measurement<S: MeasurementStore>(
    store: &S,
    repo: &mut WallRepository,
    request: SaveMeasurement,
    config: &EngineConfig,
) -> Result<WallId> {
    let (mut wall, is_new) = match &request.wall_id {
        Some(id) => (repo.require_wall(&request.survey, id)?.clone(), false),
        None => {
            let mut wall = Wall::new(WallId::generate(), request.wall_name.clone());
            wall.orientation = request.orientation;
            (wall, true)
        }
    };

    let scale = resolve_scale_with(
        &request.calibration_inputs(),
        request.image_size,
        &config.calibration,
    );
    if !scale.is_known() {
        debug!(wall = %wall.id, "saving measurement without calibration");
    }

    let image = match write_records(store, &request, &wall, is_new, scale.known()).await {
        Ok(image) => image,
        Err(e) => {
            warn!(wall = %wall.id, error = %e, "save measurement aborted");
            return Err(e);
        }
    };

    wall.images.insert(0, image);
    wall.polygons = request.polygons;
    let id = wall.id.clone();
    info!(
        survey = %request.survey,
        wall = %id,
        new_wall = is_new,
        polygons = wall.polygons.len(),
        "measurement saved"
    );
    repo.insert_wall(request.survey, wall);
    Ok(id)
}

async fn write_records<S: MeasurementStore>(
    store: &S,
    request: &SaveMeasurement,
    wall: &Wall,
    is_new: bool,
    meter_per_pixel: Option<f64>,
) -> Result<WallImage> {
    let timestamp_ms = now_ms();
    let path = |variant, filename: &str| {
        StoragePath::new(
            request.company.clone(),
            request.survey.clone(),
            wall.id.clone(),
            variant,
            timestamp_ms,
            filename,
        )
    };

    let original_path = path(ImageVariant::Original, &request.original.filename);
    let original_url = store
        .upload_image(&original_path, &request.original.bytes)
        .await?;
    let processed_path = path(ImageVariant::Processed, &request.processed.filename);
    let processed_url = store
        .upload_image(&processed_path, &request.processed.bytes)
        .await?;

    if is_new {
        store
            .insert_wall(&WallRecord {
                id: wall.id.clone(),
                survey_id: request.survey.clone(),
                name: wall.name.clone(),
            })
            .await?;
    }

    let image = WallImage {
        original_url,
        processed_url,
        width: request.image_size.width,
        height: request.image_size.height,
        meter_per_pixel,
        reference: request.reference,
        reference_length_cm: request.reference_length_cm,
    };
    store
        .insert_wall_image(&WallImageRecord::new(&wall.id, &image))
        .await?;

    let records: Vec<PolygonRecord> = request
        .polygons
        .iter()
        .map(|p| PolygonRecord::new(&wall.id, p))
        .collect();
    store.replace_polygons(&wall.id, &records).await?;

    Ok(image)
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
