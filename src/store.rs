//! Collaborator interfaces
//!
//! The engine consumes the feature store, geometry operations, the filter
//! compiler and unit conversion through these traits. It never implements
//! them itself and never mutates the records they hand out.

use crate::error::{Result, StoreError};
use crate::types::{NearestPoint, Point, PropValue};

// ============================================================================
// Geometry
// ============================================================================

/// Geometric operations on a feature's shape.
///
/// `length` is the planar length used for interpolation along the shape;
/// `geodetic_length` is the real-world length in metres. Distances passed to
/// `point_at_distance` are in the same space as `length`.
pub trait Geometry {
  fn geodetic_length(&self) -> f64;
  fn length(&self) -> f64;
  fn point_at_distance(&self, dist: f64) -> Point;
  fn point_nearest_to(&self, point: Point) -> NearestPoint;
  fn distance_to(&self, point: Point) -> f64;
  fn contains_vertex(&self, point: Point) -> bool;
}

// ============================================================================
// Feature records
// ============================================================================

/// An immutable record handed out by the feature store. Topology nodes and
/// links are feature-like and come through the same interface.
pub trait FeatureRecord {
  type Geom: Geometry;

  /// Stable identifier, unique within the store.
  fn urn(&self) -> &str;

  /// Feature type name, matched against the network definition.
  fn feature_type(&self) -> &str;

  /// Look up a named property.
  fn property(&self, name: &str) -> Option<&PropValue>;

  /// The record's shape, if it has one.
  fn geometry(&self) -> Option<&Self::Geom>;
}

/// The feature store. These are the only suspension points of a trace; all
/// other work is synchronous.
#[allow(async_fn_in_trait)]
pub trait FeatureStore {
  type Record: FeatureRecord;

  /// Resolve a feature by identifier.
  async fn resolve(&self, urn: &str) -> std::result::Result<Self::Record, StoreError>;

  /// Follow a named relationship field to the referenced records.
  async fn follow(
    &self,
    record: &Self::Record,
    field: &str,
  ) -> std::result::Result<Vec<Self::Record>, StoreError>;
}

// ============================================================================
// Filter predicates
// ============================================================================

/// A compiled filter expression.
pub trait Predicate<R> {
  fn matches(&self, record: &R) -> bool;
}

/// Compiles filter expression strings into predicates.
pub trait PredicateCompiler<R> {
  fn compile(&self, expr: &str) -> Result<Box<dyn Predicate<R>>>;
}

// ============================================================================
// Units
// ============================================================================

/// Converts configured length values between units.
pub trait UnitConverter {
  fn convert(&self, value: f64, from: &str, to: &str) -> Result<f64>;
}
