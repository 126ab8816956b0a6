// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reconciliation across several walls and repeated passes.

use facade_lite_geometry::{OpeningKind, Point, PolygonId, PolygonSurface, SurfaceRole};
use facade_lite_survey::form::{
    OPENING_HEIGHT_CM, OPENING_QUANTITY, OPENING_WIDTH_CM, WALL_NAME,
};
use facade_lite_survey::sync::opening_dimensions_cm;
use facade_lite_survey::{
    reconcile, EngineConfig, Instance, InstanceId, OpeningInstance, SurveyForm, SurveyId, Wall,
    WallId, WallImage, WallInstance, WallRepository,
};

fn survey() -> SurveyId {
    SurveyId::from("survey-1")
}

fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Vec<Point> {
    vec![
        Point::new(x0, y0),
        Point::new(x1, y0),
        Point::new(x1, y1),
        Point::new(x0, y1),
    ]
}

fn wall(id: &str, mpp: f64) -> Wall {
    let mut wall = Wall::new(WallId::from(id), format!("Wall {}", id));
    wall.images.push(WallImage {
        original_url: format!("{}/o.jpg", id),
        processed_url: format!("{}/p.jpg", id),
        width: 2000.0,
        height: 1500.0,
        meter_per_pixel: Some(mpp),
        reference: None,
        reference_length_cm: None,
    });
    wall.polygons.push(PolygonSurface::closed_with_role(
        PolygonId::from(format!("{}-facade", id).as_str()),
        "Facade",
        SurfaceRole::Facade,
        rect(0.05, 0.05, 0.95, 0.9),
    ));
    wall.polygons.push(
        PolygonSurface::closed_with_role(
            PolygonId::from(format!("{}-win", id).as_str()),
            "Window",
            SurfaceRole::WindowDoor,
            rect(0.2, 0.2, 0.35, 0.4),
        )
        .with_sub_type(OpeningKind::Window),
    );
    wall
}

fn populated() -> (WallRepository, SurveyForm) {
    let mut repo = WallRepository::new();
    repo.insert_wall(survey(), wall("a", 0.004));
    repo.insert_wall(survey(), wall("b", 0.005));
    repo.insert_wall(survey(), wall("c", 0.006));

    let mut form = SurveyForm::new();
    // A row the user typed before taking any photo
    form.walls
        .push(WallInstance::new(InstanceId::from("manual")).with_field(WALL_NAME, "Gable"));
    (repo, form)
}

#[test]
fn repeated_passes_are_byte_identical() {
    let (mut repo, mut form) = populated();
    let config = EngineConfig::default();

    reconcile(&mut repo, &survey(), &mut form, &config);
    let first = form.to_json().unwrap();
    let walls_after_first = repo.wall_count(&survey());

    let report = reconcile(&mut repo, &survey(), &mut form, &config);
    assert!(report.is_noop(), "{:?}", report);
    assert_eq!(form.to_json().unwrap(), first);
    assert_eq!(repo.wall_count(&survey()), walls_after_first);
}

#[test]
fn deleting_a_wall_removes_exactly_its_rows() {
    let (mut repo, mut form) = populated();
    let config = EngineConfig::default();
    reconcile(&mut repo, &survey(), &mut form, &config);
    assert_eq!(form.walls.len(), 4);

    let doomed = form
        .instance_for_wall(&WallId::from("b"))
        .map(|row| row.id.clone())
        .unwrap();
    let survivors: Vec<_> = form
        .walls
        .iter()
        .filter(|row| row.id != doomed)
        .cloned()
        .collect();
    let surviving_openings: Vec<_> = survivors
        .iter()
        .map(|row| form.openings_of(&row.id).to_vec())
        .collect();

    repo.remove_wall(&survey(), &WallId::from("b"));
    let report = reconcile(&mut repo, &survey(), &mut form, &config);

    assert_eq!(report.wall_instances_removed, 1);
    assert_eq!(form.walls, survivors);
    assert!(form.openings_of(&doomed).is_empty());
    for (row, openings) in survivors.iter().zip(surviving_openings) {
        assert_eq!(form.openings_of(&row.id), openings.as_slice());
    }
}

#[test]
fn opening_dimensions_scale_linearly() {
    let polygon = PolygonSurface::closed_with_role(
        PolygonId::from("w"),
        "Window",
        SurfaceRole::WindowDoor,
        rect(0.1, 0.1, 0.3, 0.5),
    );
    let image = facade_lite_geometry::ImageSize::new(1000.0, 500.0);

    let (w1, h1) = opening_dimensions_cm(&polygon, image, 0.005).unwrap();
    let (w2, h2) = opening_dimensions_cm(&polygon, image, 0.01).unwrap();
    assert_eq!((w1, h1), (100.0, 100.0));
    assert_eq!((w2, h2), (2.0 * w1, 2.0 * h1));

    // Same check through the form
    let (mut repo, mut form) = populated();
    reconcile(&mut repo, &survey(), &mut form, &EngineConfig::default());
    let width_of = |form: &SurveyForm, wall: &str| -> String {
        let row = form.instance_for_wall(&WallId::from(wall)).unwrap();
        let opening = &form.openings_of(&row.id)[0];
        opening.text(OPENING_WIDTH_CM).unwrap().to_string()
    };
    // 0.15 * 2000 px = 300 px
    assert_eq!(width_of(&form, "a"), "120");
    assert_eq!(width_of(&form, "c"), "180");

    repo.wall_mut(&survey(), &WallId::from("a")).unwrap().images[0].meter_per_pixel = Some(0.008);
    reconcile(&mut repo, &survey(), &mut form, &EngineConfig::default());
    assert_eq!(width_of(&form, "a"), "240");
    let row = form.instance_for_wall(&WallId::from("a")).unwrap();
    assert_eq!(form.openings_of(&row.id)[0].text(OPENING_HEIGHT_CM), Some("240"));
}

#[test]
fn user_quantity_survives_reprojection() {
    let (mut repo, mut form) = populated();
    let config = EngineConfig::default();
    reconcile(&mut repo, &survey(), &mut form, &config);

    let row_id = form
        .instance_for_wall(&WallId::from("a"))
        .map(|row| row.id.clone())
        .unwrap();
    form.openings_of_mut(&row_id).unwrap()[0].set_field(OPENING_QUANTITY, "3");

    // Move the window; the row is re-projected but keeps the quantity
    let a = repo.wall_mut(&survey(), &WallId::from("a")).unwrap();
    a.polygons[1].points = rect(0.2, 0.2, 0.4, 0.4);
    let report = reconcile(&mut repo, &survey(), &mut form, &config);

    assert_eq!(report.opening_instances_updated, 1);
    let opening = &form.openings_of(&row_id)[0];
    assert_eq!(opening.text(OPENING_QUANTITY), Some("3"));
    assert_eq!(opening.text(OPENING_WIDTH_CM), Some("160"));
}

#[test]
fn backfilled_wall_keeps_manual_openings() {
    let mut repo = WallRepository::new();
    let mut form = SurveyForm::new();
    let parent = InstanceId::from("manual");
    form.walls.push(WallInstance::new(parent.clone()));
    form.add_opening(&parent, OpeningInstance::new(InstanceId::from("o1")));

    let report = reconcile(&mut repo, &survey(), &mut form, &EngineConfig::default());
    assert_eq!(report.walls_backfilled, 1);
    assert_eq!(report.opening_instances_removed, 0);
    assert_eq!(form.openings_of(&parent).len(), 1);
    assert_eq!(
        repo.walls(&survey()).next().map(|w| w.name.as_str()),
        Some("1. falfelület")
    );
}
