// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shared geometric vocabulary for photographs of facades.
//!
//! Every point lives in the *normalized image frame*: `(0, 0)` is the top-left
//! corner of the processed photograph and `(1, 1)` the bottom-right corner,
//! independent of its pixel resolution. Conversions to pixel space always go
//! through an [`ImageSize`].

use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};

/// A point in the normalized image frame
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Point) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Denormalize into pixel coordinates of `image`
    pub fn to_pixels(&self, image: ImageSize) -> Point2<f64> {
        Point2::new(self.x * image.width, self.y * image.height)
    }

    /// Normalize a pixel-space point against `image`
    pub fn from_pixels(p: &Point2<f64>, image: ImageSize) -> Self {
        Self {
            x: p.x / image.width,
            y: p.y / image.height,
        }
    }

    /// Clamp both components into `[0, 1]`
    pub fn clamped(&self) -> Self {
        Self {
            x: self.x.clamp(0.0, 1.0),
            y: self.y.clamp(0.0, 1.0),
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Pixel dimensions of a processed photograph
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ImageSize {
    pub width: f64,
    pub height: f64,
}

impl ImageSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Both sides are finite and strictly positive
    pub fn is_valid(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }

    /// Pixel-space vector from `a` to `b`
    pub fn pixel_delta(&self, a: &Point, b: &Point) -> Vector2<f64> {
        Vector2::new((b.x - a.x) * self.width, (b.y - a.y) * self.height)
    }
}

/// Two calibration points whose real-world distance is known
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct DimensionPair {
    pub start: Point,
    pub end: Point,
}

impl DimensionPair {
    pub fn new(start: Point, end: Point) -> Self {
        Self { start, end }
    }

    /// Length of the segment in pixels of `image`
    pub fn pixel_length(&self, image: ImageSize) -> f64 {
        image.pixel_delta(&self.start, &self.end).norm()
    }
}

/// Stable identifier of a drawn polygon
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolygonId(pub String);

impl PolygonId {
    /// Fresh random id for a polygon created in this session
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PolygonId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for PolygonId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Role of a polygon on a facade photograph
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SurfaceRole {
    Facade,
    WindowDoor,
    WallPlinth,
}

/// Kind of opening for a `WindowDoor` polygon
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OpeningKind {
    Door,
    Window,
    TerraceDoor,
}

/// External shading mounted on an opening
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShadingKind {
    None,
    RollerShutter,
    Shutter,
    Blind,
    Awning,
}

/// A user-drawn (or derived) polygon on one photograph
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PolygonSurface {
    pub id: PolygonId,
    pub name: String,
    /// Vertices in drawing order; may hold fewer than 3 while being drawn
    pub points: Vec<Point>,
    /// Area is undefined until the polygon is closed
    pub closed: bool,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub role: Option<SurfaceRole>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_type: Option<OpeningKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shading: Option<ShadingKind>,
    pub visible: bool,
}

impl PolygonSurface {
    /// Open, visible polygon without a role
    pub fn new(id: PolygonId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            points: Vec::new(),
            closed: false,
            role: None,
            sub_type: None,
            shading: None,
            visible: true,
        }
    }

    /// Closed polygon with the given role and vertices
    pub fn closed_with_role(
        id: PolygonId,
        name: impl Into<String>,
        role: SurfaceRole,
        points: Vec<Point>,
    ) -> Self {
        Self {
            points,
            closed: true,
            role: Some(role),
            ..Self::new(id, name)
        }
    }

    pub fn with_sub_type(mut self, sub_type: OpeningKind) -> Self {
        self.sub_type = Some(sub_type);
        self
    }

    pub fn with_shading(mut self, shading: ShadingKind) -> Self {
        self.shading = Some(shading);
        self
    }

    pub fn has_role(&self, role: SurfaceRole) -> bool {
        self.role == Some(role)
    }

    /// Closed and has enough vertices to enclose an area
    pub fn contributes_area(&self) -> bool {
        self.closed && self.points.len() >= 3
    }

    /// Axis-aligned bounds in the normalized frame
    pub fn bounding_box(&self) -> Option<(Point, Point)> {
        let first = self.points.first()?;
        let mut min = *first;
        let mut max = *first;
        for p in self.points.iter().skip(1) {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
        }
        Some((min, max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_round_trip_respects_aspect() {
        let image = ImageSize::new(2000.0, 1000.0);
        let p = Point::new(0.25, 0.5);
        let px = p.to_pixels(image);
        assert_eq!(px, Point2::new(500.0, 500.0));
        assert_eq!(Point::from_pixels(&px, image), p);
    }

    #[test]
    fn dimension_pair_length_uses_both_axes() {
        let image = ImageSize::new(1000.0, 500.0);
        let pair = DimensionPair::new(Point::new(0.0, 0.0), Point::new(0.3, 0.8));
        assert!((pair.pixel_length(image) - 500.0).abs() < 1e-9);
    }

    #[test]
    fn bounding_box_of_triangle() {
        let poly = PolygonSurface::closed_with_role(
            PolygonId::from("p"),
            "t",
            SurfaceRole::Facade,
            vec![Point::new(0.2, 0.9), Point::new(0.7, 0.1), Point::new(0.4, 0.5)],
        );
        let (min, max) = poly.bounding_box().unwrap();
        assert_eq!(min, Point::new(0.2, 0.1));
        assert_eq!(max, Point::new(0.7, 0.9));
    }

    #[test]
    fn open_polygon_does_not_contribute() {
        let mut poly = PolygonSurface::new(PolygonId::from("p"), "draft");
        poly.points = vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0), Point::new(1.0, 1.0)];
        assert!(!poly.contributes_area());
        poly.closed = true;
        assert!(poly.contributes_area());
        assert!(PolygonSurface::new(PolygonId::from("q"), "empty").bounding_box().is_none());
    }

    #[test]
    fn polygon_serializes_with_wire_names() {
        let poly = PolygonSurface::closed_with_role(
            PolygonId::from("w1"),
            "Window 1",
            SurfaceRole::WindowDoor,
            vec![Point::new(0.1, 0.1)],
        )
        .with_sub_type(OpeningKind::TerraceDoor);
        let json = serde_json::to_value(&poly).unwrap();
        assert_eq!(json["type"], "WINDOW_DOOR");
        assert_eq!(json["subType"], "TERRACE_DOOR");
        assert_eq!(json["id"], "w1");
        assert!(json.get("shading").is_none());
    }
}
