// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Facade-Lite Survey
//!
//! Walls measured on calibrated photographs, their area breakdown, and the
//! reconciliation between marker-mode geometry and the survey form.
//!
//! ## Overview
//!
//! - [`WallRepository`] owns every wall, keyed by survey
//! - [`compute_wall_surfaces`] turns a wall's polygons into gross and net areas
//! - [`reconcile`] keeps the survey form's wall and opening rows in step with
//!   the geometry
//! - [`save_measurement`] persists a photograph and its polygons through a
//!   [`MeasurementStore`]

pub mod config;
pub mod error;
pub mod form;
pub mod ids;
pub mod measurement;
pub mod repository;
pub mod storage;
pub mod surfaces;
pub mod sync;
pub mod wall;

pub use config::EngineConfig;
pub use error::{Error, Result};
pub use form::{FieldValue, Instance, OpeningInstance, SurveyForm, WallInstance};
pub use ids::{CompanyId, InstanceId, SurveyId, WallId};
pub use measurement::{save_measurement, ImageUpload, SaveMeasurement};
pub use repository::WallRepository;
pub use storage::{
    ImageProcessor, ImageVariant, MeasurementStore, PolygonRecord, RectificationResponse,
    StoragePath, WallImageRecord, WallRecord,
};
pub use surfaces::{compute_wall_surfaces, survey_surfaces, wall_surfaces, WallSurfaceBreakdown};
pub use sync::{reconcile, SyncReport};
pub use wall::{Orientation, Wall, WallImage};
