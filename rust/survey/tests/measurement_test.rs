// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Save-measurement orchestration against an in-memory store.

use std::cell::RefCell;

use facade_lite_geometry::{
    CalibrationInput, DimensionPair, ImageSize, Point, PolygonId, PolygonSurface, SurfaceRole,
};
use facade_lite_survey::{
    save_measurement, CompanyId, EngineConfig, Error, ImageProcessor, ImageUpload,
    MeasurementStore, PolygonRecord, RectificationResponse, Result, SaveMeasurement,
    StoragePath, SurveyId, Wall, WallId, WallImageRecord, WallRecord, WallRepository,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    UploadOriginal,
    UploadProcessed,
    InsertWall,
    InsertWallImage,
    ReplacePolygons,
}

#[derive(Default)]
struct MemoryStore {
    fail_at: Option<Step>,
    calls: RefCell<Vec<Step>>,
    paths: RefCell<Vec<String>>,
    images: RefCell<Vec<WallImageRecord>>,
    polygons: RefCell<Vec<PolygonRecord>>,
}

impl MemoryStore {
    fn failing_at(step: Step) -> Self {
        Self {
            fail_at: Some(step),
            ..Self::default()
        }
    }

    fn record(&self, step: Step) -> Result<()> {
        self.calls.borrow_mut().push(step);
        if self.fail_at == Some(step) {
            return Err(match step {
                Step::UploadOriginal | Step::UploadProcessed => Error::Upload("bucket offline".into()),
                _ => Error::Persistence("insert rejected".into()),
            });
        }
        Ok(())
    }

    fn calls(&self) -> Vec<Step> {
        self.calls.borrow().clone()
    }
}

impl MeasurementStore for MemoryStore {
    async fn upload_image(&self, path: &StoragePath, _bytes: &[u8]) -> Result<String> {
        let key = path.to_string();
        let step = if key.contains("/original/") {
            Step::UploadOriginal
        } else {
            Step::UploadProcessed
        };
        self.record(step)?;
        self.paths.borrow_mut().push(key.clone());
        Ok(format!("https://cdn.test/{}", key))
    }

    async fn insert_wall(&self, _record: &WallRecord) -> Result<()> {
        self.record(Step::InsertWall)
    }

    async fn insert_wall_image(&self, record: &WallImageRecord) -> Result<()> {
        self.record(Step::InsertWallImage)?;
        self.images.borrow_mut().push(record.clone());
        Ok(())
    }

    async fn replace_polygons(&self, _wall: &WallId, polygons: &[PolygonRecord]) -> Result<()> {
        self.record(Step::ReplacePolygons)?;
        *self.polygons.borrow_mut() = polygons.to_vec();
        Ok(())
    }
}

/// Rectifier that reports a fixed detector estimate
struct FixedRectifier {
    estimate: Option<f64>,
}

impl ImageProcessor for FixedRectifier {
    async fn rectify(&self, photo: &[u8], marker_size_cm: Option<f64>) -> Result<RectificationResponse> {
        if photo.is_empty() {
            return Err(Error::Processing("empty photo".into()));
        }
        Ok(RectificationResponse {
            rectified: marker_size_cm.is_some(),
            estimated_pixel_scale: self.estimate,
            image_url: "https://processor.test/rectified.jpg".into(),
        })
    }
}

fn survey() -> SurveyId {
    SurveyId::from("s1")
}

fn request(wall_id: Option<WallId>) -> SaveMeasurement {
    SaveMeasurement {
        company: CompanyId::from("acme"),
        survey: survey(),
        wall_id,
        wall_name: "Street side".into(),
        orientation: None,
        original: ImageUpload::new("raw.jpg", vec![1, 2, 3]),
        processed: ImageUpload::new("rectified.jpg", vec![4, 5, 6]),
        image_size: ImageSize::new(1000.0, 1000.0),
        // 500 px spanning 250 cm
        reference: Some(DimensionPair::new(Point::new(0.1, 0.5), Point::new(0.6, 0.5))),
        reference_length_cm: Some(250.0),
        estimated_pixel_scale: Some(0.002),
        polygons: vec![PolygonSurface::closed_with_role(
            PolygonId::from("facade"),
            "Facade",
            SurfaceRole::Facade,
            vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0), Point::new(1.0, 1.0)],
        )],
    }
}

#[tokio::test]
async fn new_wall_writes_in_order() {
    let store = MemoryStore::default();
    let mut repo = WallRepository::new();

    let id = save_measurement(&store, &mut repo, request(None), &EngineConfig::default())
        .await
        .unwrap();

    assert_eq!(
        store.calls(),
        [
            Step::UploadOriginal,
            Step::UploadProcessed,
            Step::InsertWall,
            Step::InsertWallImage,
            Step::ReplacePolygons,
        ]
    );

    let paths = store.paths.borrow();
    assert!(paths[0].starts_with(&format!("acme/s1/{}/original/", id)));
    assert!(paths[0].ends_with("_raw.jpg"));
    assert!(paths[1].contains("/processed/"));

    let wall = repo.wall(&survey(), &id).unwrap();
    assert_eq!(wall.name, "Street side");
    assert_eq!(wall.polygons.len(), 1);
    // The reference segment wins over the detector estimate
    let mpp = wall.primary_image().unwrap().meter_per_pixel.unwrap();
    assert!((mpp - 0.005).abs() < 1e-12);
    assert_eq!(store.images.borrow()[0].meter_per_pixel, Some(mpp));
    assert_eq!(store.polygons.borrow()[0].wall_id, id);
}

#[tokio::test]
async fn existing_wall_gets_new_primary_image() {
    let store = MemoryStore::default();
    let mut repo = WallRepository::new();
    let id = save_measurement(&store, &mut repo, request(None), &EngineConfig::default())
        .await
        .unwrap();

    let mut second = request(Some(id.clone()));
    second.reference = None;
    second.processed = ImageUpload::new("second.jpg", vec![7]);
    let again = save_measurement(&store, &mut repo, second, &EngineConfig::default())
        .await
        .unwrap();

    assert_eq!(again, id);
    assert_eq!(
        store.calls().iter().filter(|s| **s == Step::InsertWall).count(),
        1
    );
    let wall = repo.wall(&survey(), &id).unwrap();
    assert_eq!(wall.images.len(), 2);
    let primary = wall.primary_image().unwrap();
    assert!(primary.processed_url.ends_with("_second.jpg"));
    // Without a reference segment the detector estimate is used
    assert_eq!(primary.meter_per_pixel, Some(0.002));
}

#[tokio::test]
async fn failed_upload_aborts_before_any_record() {
    let store = MemoryStore::failing_at(Step::UploadProcessed);
    let mut repo = WallRepository::new();

    let result = save_measurement(&store, &mut repo, request(None), &EngineConfig::default()).await;

    assert!(matches!(result, Err(Error::Upload(_))));
    assert_eq!(store.calls(), [Step::UploadOriginal, Step::UploadProcessed]);
    assert_eq!(repo.wall_count(&survey()), 0);
}

#[tokio::test]
async fn failed_polygon_write_leaves_repository_untouched() {
    let store = MemoryStore::default();
    let mut repo = WallRepository::new();
    let id = save_measurement(&store, &mut repo, request(None), &EngineConfig::default())
        .await
        .unwrap();
    let before: Wall = repo.wall(&survey(), &id).unwrap().clone();

    let failing = MemoryStore::failing_at(Step::ReplacePolygons);
    let mut update = request(Some(id.clone()));
    update.polygons.clear();
    let result = save_measurement(&failing, &mut repo, update, &EngineConfig::default()).await;

    assert!(matches!(result, Err(Error::Persistence(_))));
    assert_eq!(repo.wall(&survey(), &id), Some(&before));
}

#[tokio::test]
async fn unknown_wall_is_rejected_without_writes() {
    let store = MemoryStore::default();
    let mut repo = WallRepository::new();

    let result = save_measurement(
        &store,
        &mut repo,
        request(Some(WallId::from("ghost"))),
        &EngineConfig::default(),
    )
    .await;

    assert!(matches!(result, Err(Error::WallNotFound(_))));
    assert!(store.calls().is_empty());
}

#[tokio::test]
async fn rectifier_estimate_calibrates_measurement() {
    let rectifier = FixedRectifier {
        estimate: Some(0.003),
    };
    let photo = vec![9, 9, 9];
    let response = rectifier.rectify(&photo, Some(15.0)).await.unwrap();
    assert!(response.rectified);
    assert!(matches!(
        rectifier.rectify(&[], None).await,
        Err(Error::Processing(_))
    ));

    let CalibrationInput::Detector {
        estimated_pixel_scale,
    } = response.calibration_input()
    else {
        panic!("rectifier output must be a detector candidate");
    };

    let mut req = request(None);
    req.reference = None;
    req.estimated_pixel_scale = estimated_pixel_scale;

    let store = MemoryStore::default();
    let mut repo = WallRepository::new();
    let id = save_measurement(&store, &mut repo, req, &EngineConfig::default())
        .await
        .unwrap();

    let primary = repo.wall(&survey(), &id).unwrap().primary_image().unwrap().clone();
    assert_eq!(primary.meter_per_pixel, Some(0.003));

    // The stored record rebuilds the same image
    let stored = store.images.borrow()[0].clone();
    assert_eq!(stored.wall_id, id);
    assert_eq!(stored.into_image(), primary);
}
