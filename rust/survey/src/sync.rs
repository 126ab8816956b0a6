// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Marker↔Survey reconciliation.
//!
//! One pass runs five steps in a fixed order:
//!
//! 1. project every wall onto its survey row (created if missing)
//! 2. back-fill a wall for every unlinked row
//! 3. drop rows whose wall no longer exists, with their opening groups
//! 4. project every closed WINDOW_DOOR polygon onto an opening row
//! 5. drop linked opening rows whose polygon is gone
//!
//! Steps run against a draft of the form and a list of pending walls; both are
//! committed only once all five steps have run. Wall rows are final before
//! the first opening step starts.

use facade_lite_geometry::{ImageSize, PolygonId, PolygonSurface, SurfaceRole};
use rustc_hash::FxHashSet;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::form::{
    opening_type_label, shading_label, FieldMap, FieldValue, Instance, OpeningInstance,
    SurveyForm, WallInstance, FACADE_GROSS_AREA, FACADE_NET_AREA, OPENING_HEIGHT_CM,
    OPENING_NAME, OPENING_QUANTITY, OPENING_SHADING, OPENING_TYPE, OPENING_WIDTH_CM,
    WALL_NAME, WALL_ORIENTATION, WALL_PLINTH_AREA, WALL_PLINTH_NET_AREA, WINDOW_DOOR_AREA,
};
use crate::ids::{InstanceId, SurveyId, WallId};
use crate::repository::WallRepository;
use crate::surfaces::compute_wall_surfaces;
use crate::wall::{Orientation, Wall};

/// Quantity written into a freshly created opening row
const INITIAL_QUANTITY: &str = "1";

/// What one reconciliation pass changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub wall_instances_created: usize,
    pub wall_instances_updated: usize,
    pub walls_backfilled: usize,
    pub wall_instances_removed: usize,
    pub opening_instances_created: usize,
    pub opening_instances_updated: usize,
    pub opening_instances_removed: usize,
}

impl SyncReport {
    /// Nothing was created, changed or removed
    pub fn is_noop(&self) -> bool {
        *self == SyncReport::default()
    }
}

/// Reconcile `form` with the walls of `survey` in `repo`.
///
/// Back-filled walls are registered in `repo` and `form` is replaced only
/// after the whole pass has run.
pub fn reconcile(
    repo: &mut WallRepository,
    survey: &SurveyId,
    form: &mut SurveyForm,
    config: &EngineConfig,
) -> SyncReport {
    let mut draft = form.clone();
    let mut pending: Vec<Wall> = Vec::new();
    let mut report = SyncReport::default();

    project_walls(repo, survey, &mut draft, config, &mut report);
    backfill_walls(&mut draft, &mut pending, &mut report);
    remove_orphan_walls(repo, survey, &pending, &mut draft, &mut report);

    let walls = WallLookup {
        repo,
        survey,
        pending: &pending,
    };
    project_openings(&walls, &mut draft, &mut report);
    remove_orphan_openings(&walls, &mut draft, &mut report);

    for wall in pending {
        repo.insert_wall(survey.clone(), wall);
    }
    *form = draft;

    if report.is_noop() {
        debug!(survey = %survey, "survey form already in sync");
    } else {
        info!(survey = %survey, ?report, "survey form reconciled");
    }
    report
}

/// Walls visible to the opening steps: committed plus pending back-fills
struct WallLookup<'a> {
    repo: &'a WallRepository,
    survey: &'a SurveyId,
    pending: &'a [Wall],
}

impl WallLookup<'_> {
    fn get(&self, id: &WallId) -> Option<&Wall> {
        self.repo
            .wall(self.survey, id)
            .or_else(|| self.pending.iter().find(|w| &w.id == id))
    }
}

// --- Step 1 ---

fn project_walls(
    repo: &WallRepository,
    survey: &SurveyId,
    draft: &mut SurveyForm,
    config: &EngineConfig,
    report: &mut SyncReport,
) {
    for wall in repo.walls(survey) {
        let existing = draft
            .walls
            .iter()
            .position(|row| row.marker_wall_id() == Some(&wall.id));

        let row = match existing {
            Some(index) => &mut draft.walls[index],
            None => {
                let mut row = WallInstance::new(InstanceId::generate());
                row.link(wall.id.clone());
                draft.walls.push(row);
                report.wall_instances_created += 1;
                debug!(wall = %wall.id, "created survey row for wall");
                let last = draft.walls.len() - 1;
                &mut draft.walls[last]
            }
        };

        // A new row's first projection is part of its creation
        if project_wall(wall, &mut row.fields, config.area_decimals) && existing.is_some() {
            report.wall_instances_updated += 1;
        }
    }
}

/// Copy name, orientation and areas of `wall` into a row's fields
fn project_wall(wall: &Wall, fields: &mut FieldMap, area_decimals: usize) -> bool {
    let mut changed = assign(fields, WALL_NAME, wall.name.clone());
    if let Some(orientation) = wall.orientation {
        changed |= assign(fields, WALL_ORIENTATION, orientation.label().to_string());
    }

    // Without a breakdown the areas keep whatever the user entered
    if let Some(b) = compute_wall_surfaces(wall) {
        let areas = [
            (FACADE_GROSS_AREA, b.facade_gross_area),
            (FACADE_NET_AREA, b.facade_net_area),
            (WINDOW_DOOR_AREA, b.window_door_area),
            (WALL_PLINTH_AREA, b.wall_plinth_area),
            (WALL_PLINTH_NET_AREA, b.wall_plinth_net_area),
        ];
        for (key, value) in areas {
            changed |= assign(fields, key, format!("{:.*}", area_decimals, value));
        }
    }
    changed
}

// --- Step 2 ---

fn backfill_walls(draft: &mut SurveyForm, pending: &mut Vec<Wall>, report: &mut SyncReport) {
    for (position, row) in draft.walls.iter_mut().enumerate() {
        if row.marker_wall_id().is_some() {
            continue;
        }

        let name = row
            .text(WALL_NAME)
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|| format!("{}. falfelület", position + 1));
        let orientation = row.text(WALL_ORIENTATION).and_then(Orientation::from_label);

        let mut wall = Wall::new(WallId::generate(), name.clone());
        wall.orientation = orientation;

        // Write back what the wall now holds so the next projection is a no-op
        assign(&mut row.fields, WALL_NAME, name);
        if let Some(orientation) = orientation {
            assign(&mut row.fields, WALL_ORIENTATION, orientation.label().to_string());
        }

        debug!(instance = %row.id, wall = %wall.id, name = %wall.name, "back-filled wall from survey row");
        row.link(wall.id.clone());
        pending.push(wall);
        report.walls_backfilled += 1;
    }
}

// --- Step 3 ---

fn remove_orphan_walls(
    repo: &WallRepository,
    survey: &SurveyId,
    pending: &[Wall],
    draft: &mut SurveyForm,
    report: &mut SyncReport,
) {
    let live: FxHashSet<&WallId> = repo
        .walls(survey)
        .chain(pending.iter())
        .map(|w| &w.id)
        .collect();

    let orphans: FxHashSet<InstanceId> = draft
        .walls
        .iter()
        .filter(|row| row.marker_wall_id().map_or(false, |id| !live.contains(id)))
        .map(|row| row.id.clone())
        .collect();
    if orphans.is_empty() {
        return;
    }

    draft.walls.retain(|row| !orphans.contains(&row.id));
    draft.openings.retain(|parent, _| !orphans.contains(parent));
    report.wall_instances_removed += orphans.len();
    debug!(removed = orphans.len(), "removed survey rows of deleted walls");
}

// --- Step 4 ---

fn project_openings(walls: &WallLookup<'_>, draft: &mut SurveyForm, report: &mut SyncReport) {
    let SurveyForm {
        walls: rows,
        openings,
    } = draft;

    for row in rows.iter() {
        let Some(wall) = row.marker_wall_id().and_then(|id| walls.get(id)) else {
            continue;
        };
        let calibration = wall.calibration();

        for polygon in opening_polygons(wall) {
            let group = openings.entry(row.id.clone()).or_default();
            let index = group
                .iter()
                .position(|o| o.marker_polygon_id() == Some(&polygon.id));

            match index {
                Some(index) => {
                    if project_opening(polygon, calibration, &mut group[index].fields) {
                        report.opening_instances_updated += 1;
                    }
                }
                None => {
                    let mut opening = OpeningInstance::new(InstanceId::generate());
                    opening.link(polygon.id.clone());
                    project_opening(polygon, calibration, &mut opening.fields);
                    opening.set_field(OPENING_QUANTITY, INITIAL_QUANTITY);
                    debug!(wall = %wall.id, polygon = %polygon.id, "created survey row for opening");
                    group.push(opening);
                    report.opening_instances_created += 1;
                }
            }
        }
    }
}

/// Closed WINDOW_DOOR polygons that enclose an area
fn opening_polygons(wall: &Wall) -> impl Iterator<Item = &PolygonSurface> {
    wall.polygons_with_role(SurfaceRole::WindowDoor)
        .filter(|p| p.contributes_area())
}

/// Width and height in whole centimeters of the polygon's bounding box
pub fn opening_dimensions_cm(
    polygon: &PolygonSurface,
    image: ImageSize,
    meter_per_pixel: f64,
) -> Option<(f64, f64)> {
    let (min, max) = polygon.bounding_box()?;
    let to_cm = |extent: f64, pixels: f64| (extent * pixels * meter_per_pixel * 100.0).round();
    Some((
        to_cm(max.x - min.x, image.width),
        to_cm(max.y - min.y, image.height),
    ))
}

/// Everything but the quantity, which belongs to the user once the row exists
fn project_opening(
    polygon: &PolygonSurface,
    calibration: Option<(ImageSize, f64)>,
    fields: &mut FieldMap,
) -> bool {
    let mut changed = false;
    if !polygon.name.trim().is_empty() {
        changed |= assign(fields, OPENING_NAME, polygon.name.clone());
    }
    changed |= assign(fields, OPENING_TYPE, opening_type_label(polygon.sub_type).to_string());
    changed |= assign(fields, OPENING_SHADING, shading_label(polygon.shading).to_string());

    if let Some((width, height)) =
        calibration.and_then(|(image, mpp)| opening_dimensions_cm(polygon, image, mpp))
    {
        changed |= assign(fields, OPENING_WIDTH_CM, format!("{:.0}", width));
        changed |= assign(fields, OPENING_HEIGHT_CM, format!("{:.0}", height));
    }
    changed
}

// --- Step 5 ---

fn remove_orphan_openings(walls: &WallLookup<'_>, draft: &mut SurveyForm, report: &mut SyncReport) {
    for row in &draft.walls {
        let Some(group) = draft.openings.get_mut(&row.id) else {
            continue;
        };
        let live: FxHashSet<&PolygonId> = row
            .marker_wall_id()
            .and_then(|id| walls.get(id))
            .map(|wall| opening_polygons(wall).map(|p| &p.id).collect())
            .unwrap_or_default();

        let before = group.len();
        // Rows entered by hand carry no link and always stay
        group.retain(|o| o.marker_polygon_id().map_or(true, |id| live.contains(id)));
        let removed = before - group.len();
        if removed > 0 {
            report.opening_instances_removed += removed;
            debug!(instance = %row.id, removed = removed, "removed survey rows of deleted openings");
        }
    }

    draft.openings.retain(|_, group| !group.is_empty());
}

/// Set `key` to a text value, reporting whether anything changed
fn assign(fields: &mut FieldMap, key: &str, value: String) -> bool {
    let value = FieldValue::Text(value);
    if fields.get(key) == Some(&value) {
        return false;
    }
    fields.insert(key.to_string(), value);
    true
}
