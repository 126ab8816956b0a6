// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-wall area breakdown by polygon role.

use facade_lite_geometry::{difference_area, union_area, Point, SurfaceRole};
use serde::{Deserialize, Serialize};

use crate::ids::{SurveyId, WallId};
use crate::repository::WallRepository;
use crate::wall::Wall;

/// Areas of one wall in square meters, always computed together
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WallSurfaceBreakdown {
    pub facade_gross_area: f64,
    pub window_door_area: f64,
    pub wall_plinth_area: f64,
    /// Facade minus openings
    pub facade_net_area: f64,
    /// Plinth minus openings
    pub wall_plinth_net_area: f64,
}

/// Area breakdown of `wall` using its primary image's calibration.
///
/// `None` when the wall has no image or the image has no usable scale; a
/// breakdown is never partially filled.
pub fn compute_wall_surfaces(wall: &Wall) -> Option<WallSurfaceBreakdown> {
    let (image, meter_per_pixel) = wall.calibration()?;

    let facade = rings(wall, SurfaceRole::Facade);
    let openings = rings(wall, SurfaceRole::WindowDoor);
    let plinth = rings(wall, SurfaceRole::WallPlinth);

    Some(WallSurfaceBreakdown {
        facade_gross_area: union_area(facade.iter().copied(), image, meter_per_pixel),
        window_door_area: union_area(openings.iter().copied(), image, meter_per_pixel),
        wall_plinth_area: union_area(plinth.iter().copied(), image, meter_per_pixel),
        facade_net_area: difference_area(
            facade.iter().copied(),
            openings.iter().copied(),
            image,
            meter_per_pixel,
        ),
        wall_plinth_net_area: difference_area(
            plinth.iter().copied(),
            openings.iter().copied(),
            image,
            meter_per_pixel,
        ),
    })
}

fn rings(wall: &Wall, role: SurfaceRole) -> Vec<&[Point]> {
    wall.polygons_with_role(role)
        .map(|p| p.points.as_slice())
        .collect()
}

/// Breakdown of a wall looked up in the repository; `None` if it does not exist
pub fn wall_surfaces(
    repo: &WallRepository,
    survey: &SurveyId,
    wall: &WallId,
) -> Option<WallSurfaceBreakdown> {
    compute_wall_surfaces(repo.wall(survey, wall)?)
}

/// Breakdown of every wall of `survey`, in wall order
pub fn survey_surfaces(
    repo: &WallRepository,
    survey: &SurveyId,
) -> Vec<(WallId, Option<WallSurfaceBreakdown>)> {
    repo.walls(survey)
        .map(|w| (w.id.clone(), compute_wall_surfaces(w)))
        .collect()
}
