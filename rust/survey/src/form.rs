// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Survey-mode form model: repeatable wall and opening rows.
//!
//! Each row carries an open set of form fields plus an optional back-reference
//! to the marker-mode entity it mirrors (`_markerWallId` / `_markerPolygonId`
//! on the wire). The back-reference can only be written by [`crate::sync`].

use std::collections::BTreeMap;

use facade_lite_geometry::{OpeningKind, PolygonId, ShadingKind};
use serde::{Deserialize, Serialize};

use crate::ids::{InstanceId, WallId};

// Wall row fields
pub const WALL_NAME: &str = "wall_name";
pub const WALL_ORIENTATION: &str = "wall_orientation";
pub const FACADE_GROSS_AREA: &str = "facade_gross_area";
pub const FACADE_NET_AREA: &str = "facade_net_area";
pub const WINDOW_DOOR_AREA: &str = "window_door_area";
pub const WALL_PLINTH_AREA: &str = "wall_plinth_area";
pub const WALL_PLINTH_NET_AREA: &str = "wall_plinth_net_area";

// Opening row fields
pub const OPENING_NAME: &str = "opening_name";
pub const OPENING_TYPE: &str = "opening_type";
pub const OPENING_WIDTH_CM: &str = "opening_width_cm";
pub const OPENING_HEIGHT_CM: &str = "opening_height_cm";
pub const OPENING_SHADING: &str = "opening_shading";
/// Owned by the user: set once on creation, never overwritten by sync
pub const OPENING_QUANTITY: &str = "opening_quantity";

/// A form field value; any JSON value round-trips
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Number(f64),
    Text(String),
    List(Vec<FieldValue>),
    Map(BTreeMap<String, FieldValue>),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

/// Fields of one row, ordered by key
pub type FieldMap = BTreeMap<String, FieldValue>;

/// Field access shared by wall and opening rows
pub trait Instance {
    fn fields(&self) -> &FieldMap;
    fn fields_mut(&mut self) -> &mut FieldMap;

    fn field(&self, key: &str) -> Option<&FieldValue> {
        self.fields().get(key)
    }

    /// Text value of `key`, if it is non-blank text
    fn text(&self, key: &str) -> Option<&str> {
        self.field(key)
            .and_then(FieldValue::as_text)
            .filter(|s| !s.trim().is_empty())
    }

    fn set_field(&mut self, key: &str, value: impl Into<FieldValue>) {
        self.fields_mut().insert(key.to_string(), value.into());
    }
}

/// One wall row of the survey form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WallInstance {
    pub id: InstanceId,
    #[serde(
        rename = "_markerWallId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    marker_wall_id: Option<WallId>,
    #[serde(flatten)]
    pub fields: FieldMap,
}

impl WallInstance {
    /// A row entered by hand, not yet linked to any wall
    pub fn new(id: InstanceId) -> Self {
        Self {
            id,
            marker_wall_id: None,
            fields: FieldMap::new(),
        }
    }

    pub fn with_field(mut self, key: &str, value: impl Into<FieldValue>) -> Self {
        self.set_field(key, value);
        self
    }

    pub fn marker_wall_id(&self) -> Option<&WallId> {
        self.marker_wall_id.as_ref()
    }

    pub(crate) fn link(&mut self, wall: WallId) {
        self.marker_wall_id = Some(wall);
    }
}

impl Instance for WallInstance {
    fn fields(&self) -> &FieldMap {
        &self.fields
    }

    fn fields_mut(&mut self) -> &mut FieldMap {
        &mut self.fields
    }
}

/// One opening (window/door) row of the survey form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpeningInstance {
    pub id: InstanceId,
    #[serde(
        rename = "_markerPolygonId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    marker_polygon_id: Option<PolygonId>,
    #[serde(flatten)]
    pub fields: FieldMap,
}

impl OpeningInstance {
    /// A row entered by hand, not yet linked to any polygon
    pub fn new(id: InstanceId) -> Self {
        Self {
            id,
            marker_polygon_id: None,
            fields: FieldMap::new(),
        }
    }

    pub fn with_field(mut self, key: &str, value: impl Into<FieldValue>) -> Self {
        self.set_field(key, value);
        self
    }

    pub fn marker_polygon_id(&self) -> Option<&PolygonId> {
        self.marker_polygon_id.as_ref()
    }

    pub(crate) fn link(&mut self, polygon: PolygonId) {
        self.marker_polygon_id = Some(polygon);
    }
}

impl Instance for OpeningInstance {
    fn fields(&self) -> &FieldMap {
        &self.fields
    }

    fn fields_mut(&mut self) -> &mut FieldMap {
        &mut self.fields
    }
}

/// The repeatable sections of one survey that mirror marker-mode geometry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyForm {
    pub walls: Vec<WallInstance>,
    /// Opening rows grouped by their parent wall row
    #[serde(default)]
    pub openings: BTreeMap<InstanceId, Vec<OpeningInstance>>,
}

impl SurveyForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wall_instance(&self, id: &InstanceId) -> Option<&WallInstance> {
        self.walls.iter().find(|w| &w.id == id)
    }

    /// Row linked to `wall`, if any
    pub fn instance_for_wall(&self, wall: &WallId) -> Option<&WallInstance> {
        self.walls.iter().find(|w| w.marker_wall_id() == Some(wall))
    }

    pub fn openings_of(&self, wall_instance: &InstanceId) -> &[OpeningInstance] {
        self.openings
            .get(wall_instance)
            .map_or(&[], |v| v.as_slice())
    }

    pub fn openings_of_mut(
        &mut self,
        wall_instance: &InstanceId,
    ) -> Option<&mut Vec<OpeningInstance>> {
        self.openings.get_mut(wall_instance)
    }

    /// Append a hand-entered opening row under `wall_instance`
    pub fn add_opening(&mut self, wall_instance: &InstanceId, opening: OpeningInstance) {
        self.openings
            .entry(wall_instance.clone())
            .or_default()
            .push(opening);
    }

    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Opening type label; unclassified openings are windows
pub fn opening_type_label(kind: Option<OpeningKind>) -> &'static str {
    match kind {
        Some(OpeningKind::Door) => "Ajtó",
        Some(OpeningKind::TerraceDoor) => "Teraszajtó",
        Some(OpeningKind::Window) | None => "Ablak",
    }
}

/// External shading label; unclassified means no shading
pub fn shading_label(kind: Option<ShadingKind>) -> &'static str {
    match kind {
        Some(ShadingKind::RollerShutter) => "Redőny",
        Some(ShadingKind::Shutter) => "Zsalugáter",
        Some(ShadingKind::Blind) => "Reluxa",
        Some(ShadingKind::Awning) => "Napellenző",
        Some(ShadingKind::None) | None => "Nincs",
    }
}
