// Core domain types for the document translation workflow

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single corner point in image pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Four corner points of a detected text region.
///
/// Not necessarily axis-aligned; OCR engines report rotated or skewed
/// quadrilaterals for slanted text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quad(pub [Point; 4]);

/// Axis-aligned bounding rectangle in pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Quad {
    pub fn new(points: [(f32, f32); 4]) -> Self {
        Self(points.map(|(x, y)| Point::new(x, y)))
    }

    /// Axis-aligned bounding rectangle from the min/max of the corner
    /// coordinates.
    pub fn bounding_rect(&self) -> BoundingRect {
        let x_min = self.0.iter().map(|p| p.x).fold(f32::INFINITY, f32::min);
        let x_max = self.0.iter().map(|p| p.x).fold(f32::NEG_INFINITY, f32::max);
        let y_min = self.0.iter().map(|p| p.y).fold(f32::INFINITY, f32::min);
        let y_max = self.0.iter().map(|p| p.y).fold(f32::NEG_INFINITY, f32::max);

        BoundingRect {
            x: x_min,
            y: y_min,
            width: x_max - x_min,
            height: y_max - y_min,
        }
    }
}

/// A detected text region.
///
/// Region ids are dense, 0-based, assigned in extraction order and never
/// reused or reordered for the lifetime of a session.
#[derive(Debug, Clone, Serialize)]
pub struct Region {
    pub id: usize,
    pub quad: Quad,
    pub text: String,
    pub confidence: f32,
}

/// User decision for a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Translate,
    #[default]
    Preserve,
    Whiteout,
}

impl Action {
    /// Parse an action string, defaulting to `Preserve` for anything
    /// unrecognized instead of failing the request.
    pub fn parse(value: &str) -> Self {
        match value {
            "translate" => Action::Translate,
            "preserve" => Action::Preserve,
            "whiteout" => Action::Whiteout,
            other => {
                tracing::warn!("Unknown region action '{}', defaulting to preserve", other);
                Action::Preserve
            }
        }
    }
}

impl<'de> Deserialize<'de> for Action {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Action::parse(&s))
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Translate => write!(f, "translate"),
            Action::Preserve => write!(f, "preserve"),
            Action::Whiteout => write!(f, "whiteout"),
        }
    }
}

/// Rectangle in percent-of-image units, resolution independent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RectPercent {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

/// A renderable text block positioned in percentage coordinates.
#[derive(Debug, Clone, Serialize)]
pub struct OverlayDescriptor {
    pub rect: RectPercent,
    pub text: String,
    pub font_size: f32,
    pub action: Action,
}

/// Full overlay layout handed to the presentation layer.
#[derive(Debug, Clone, Serialize)]
pub struct OverlayDocument {
    pub overlays: Vec<OverlayDescriptor>,
    pub font_family: String,
    pub width: u32,
    pub height: u32,
}

/// Pixel-space bounding box for the region controls UI.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct BboxPixels {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl From<BoundingRect> for BboxPixels {
    fn from(r: BoundingRect) -> Self {
        Self {
            x: r.x,
            y: r.y,
            width: r.width,
            height: r.height,
        }
    }
}

/// Per-region summary returned by the upload endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct RegionSummary {
    pub id: usize,
    pub text: String,
    pub translated: String,
    pub bbox: BboxPixels,
    pub confidence: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounding_rect_from_skewed_quad() {
        // Corners deliberately out of clockwise order
        let quad = Quad::new([(10.0, 40.0), (100.0, 20.0), (95.0, 60.0), (12.0, 65.0)]);
        let rect = quad.bounding_rect();
        assert_eq!(rect.x, 10.0);
        assert_eq!(rect.y, 20.0);
        assert_eq!(rect.width, 90.0);
        assert_eq!(rect.height, 45.0);
    }

    #[test]
    fn action_defaults_to_preserve() {
        assert_eq!(Action::parse("translate"), Action::Translate);
        assert_eq!(Action::parse("whiteout"), Action::Whiteout);
        assert_eq!(Action::parse("redact"), Action::Preserve);
        assert_eq!(Action::default(), Action::Preserve);
    }

    #[test]
    fn action_deserializes_unknown_as_preserve() {
        let action: Action = serde_json::from_str("\"blank\"").unwrap();
        assert_eq!(action, Action::Preserve);
        let action: Action = serde_json::from_str("\"translate\"").unwrap();
        assert_eq!(action, Action::Translate);
    }
}
