//! Relative positioning: place a component next to, or inside, a reference.
//!
//! All coordinates use a top-left origin. Results are rounded to whole units
//! so that snapshots and diffs never see sub-pixel noise.

use kurbo::{Point, Rect, Size};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Round a coordinate to the nearest integer, halves toward positive infinity.
pub fn round_coord(value: f64) -> f64 {
    (value + 0.5).floor()
}

/// Spatial relationship between a component and its reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relationship {
    Above,
    Below,
    Left,
    Right,
    Inside,
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Relationship::Above => "above",
            Relationship::Below => "below",
            Relationship::Left => "left",
            Relationship::Right => "right",
            Relationship::Inside => "inside",
        })
    }
}

impl FromStr for Relationship {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "above" | "top" => Ok(Relationship::Above),
            "below" | "bottom" => Ok(Relationship::Below),
            "left" | "left-of" => Ok(Relationship::Left),
            "right" | "right-of" => Ok(Relationship::Right),
            "inside" | "in" => Ok(Relationship::Inside),
            other => Err(format!("unknown relationship '{other}'")),
        }
    }
}

/// Edge or center the component lines up with.
///
/// `Left`/`Center`/`Right` act on the x axis, `Top`/`Middle`/`Bottom` on the
/// y axis. `Center` and `Middle` are interchangeable; an edge on the wrong
/// axis falls back to the start edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
    Top,
    Middle,
    Bottom,
}

impl fmt::Display for Alignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Alignment::Left => "left",
            Alignment::Center => "center",
            Alignment::Right => "right",
            Alignment::Top => "top",
            Alignment::Middle => "middle",
            Alignment::Bottom => "bottom",
        })
    }
}

impl FromStr for Alignment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" | "start" => Ok(Alignment::Left),
            "center" | "centre" => Ok(Alignment::Center),
            "right" | "end" => Ok(Alignment::Right),
            "top" => Ok(Alignment::Top),
            "middle" => Ok(Alignment::Middle),
            "bottom" => Ok(Alignment::Bottom),
            other => Err(format!("unknown alignment '{other}'")),
        }
    }
}

fn aligned_x(reference: Rect, width: f64, alignment: Alignment) -> f64 {
    match alignment {
        Alignment::Center | Alignment::Middle => reference.x0 + (reference.width() - width) / 2.0,
        Alignment::Right => reference.x0 + reference.width() - width,
        Alignment::Left | Alignment::Top | Alignment::Bottom => reference.x0,
    }
}

fn aligned_y(reference: Rect, height: f64, alignment: Alignment) -> f64 {
    match alignment {
        Alignment::Middle | Alignment::Center => reference.y0 + (reference.height() - height) / 2.0,
        Alignment::Bottom => reference.y0 + reference.height() - height,
        Alignment::Top | Alignment::Left | Alignment::Right => reference.y0,
    }
}

/// Top-left position for a component of `size` placed relative to `reference`.
pub fn position(
    size: Size,
    reference: Rect,
    relationship: Relationship,
    alignment: Alignment,
    spacing: f64,
) -> Point {
    // Normalize so callers may pass rects built from any two corners.
    let reference = reference.abs();
    let (x, y) = match relationship {
        Relationship::Above => (
            aligned_x(reference, size.width, alignment),
            reference.y0 - size.height - spacing,
        ),
        Relationship::Below => (
            aligned_x(reference, size.width, alignment),
            reference.y0 + reference.height() + spacing,
        ),
        Relationship::Left => (
            reference.x0 - size.width - spacing,
            aligned_y(reference, size.height, alignment),
        ),
        Relationship::Right => (
            reference.x0 + reference.width() + spacing,
            aligned_y(reference, size.height, alignment),
        ),
        Relationship::Inside => (reference.x0 + spacing, reference.y0 + spacing),
    };
    Point::new(round_coord(x), round_coord(y))
}

/// Full target rectangle for a component of `size` placed relative to `reference`.
pub fn target_rect(
    size: Size,
    reference: Rect,
    relationship: Relationship,
    alignment: Alignment,
    spacing: f64,
) -> Rect {
    Rect::from_origin_size(position(size, reference, relationship, alignment, spacing), size)
}
