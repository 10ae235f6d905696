//! Core value types shared across the crate.

use serde::{Deserialize, Serialize};

/// Canonical length unit. All cumulative distances are metres.
pub const METRES: &str = "m";

// ============================================================================
// Coordinates
// ============================================================================

/// A planar coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
  pub x: f64,
  pub y: f64,
}

impl Point {
  pub fn new(x: f64, y: f64) -> Self {
    Self { x, y }
  }

  /// Straight-line distance to another point.
  pub fn distance_to(&self, other: Point) -> f64 {
    (self.x - other.x).hypot(self.y - other.y)
  }
}

/// Result of projecting a point onto a geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearestPoint {
  /// The closest location on the geometry.
  pub coordinates: Point,
  /// Distance from the geometry's start to that location, along the
  /// geometry.
  pub distance_along: f64,
}

// ============================================================================
// Direction
// ============================================================================

/// Direction of a trace relative to the configured reference fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceDirection {
  Upstream,
  Downstream,
  #[default]
  Both,
}

// ============================================================================
// Property values
// ============================================================================

/// A value in a feature record's property map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropValue {
  Null,
  Bool(bool),
  Int(i64),
  Float(f64),
  Str(String),
}

impl PropValue {
  /// Numeric view of the value. String values holding a number parse;
  /// stores commonly type length fields as text.
  pub fn as_f64(&self) -> Option<f64> {
    match self {
      PropValue::Int(v) => Some(*v as f64),
      PropValue::Float(v) => Some(*v),
      PropValue::Str(s) => s.parse().ok(),
      _ => None,
    }
  }

  pub fn as_str(&self) -> Option<&str> {
    match self {
      PropValue::Str(s) => Some(s),
      _ => None,
    }
  }
}

impl From<&str> for PropValue {
  fn from(value: &str) -> Self {
    PropValue::Str(value.to_string())
  }
}

impl From<f64> for PropValue {
  fn from(value: f64) -> Self {
    PropValue::Float(value)
  }
}

impl From<i64> for PropValue {
  fn from(value: i64) -> Self {
    PropValue::Int(value)
  }
}

// ============================================================================
// Tests
// ============================================================================
