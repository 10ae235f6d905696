//! In-memory fixtures for tests: a feature store over hand-built records, a
//! polyline geometry, an equality-only filter compiler and a metric unit
//! table.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;

use crate::error::{Result, StoreError, TraceError};
use crate::network::{FeatureTypeConfig, NetworkDefinition, TopologySpec};
use crate::store::{
  FeatureRecord, FeatureStore, Geometry, Predicate, PredicateCompiler, UnitConverter,
};
use crate::types::{NearestPoint, Point, PropValue};

// ============================================================================
// Polyline geometry
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct Polyline {
  points: Vec<Point>,
}

impl Polyline {
  pub fn new(points: &[(f64, f64)]) -> Self {
    Self {
      points: points.iter().map(|&(x, y)| Point::new(x, y)).collect(),
    }
  }

  fn first(&self) -> Point {
    self.points.first().copied().unwrap_or(Point::new(0.0, 0.0))
  }
}

impl Geometry for Polyline {
  fn geodetic_length(&self) -> f64 {
    self.length()
  }

  fn length(&self) -> f64 {
    self
      .points
      .windows(2)
      .map(|pair| pair[0].distance_to(pair[1]))
      .sum()
  }

  fn point_at_distance(&self, dist: f64) -> Point {
    let mut remaining = dist.max(0.0);
    for pair in self.points.windows(2) {
      let seg_len = pair[0].distance_to(pair[1]);
      if remaining <= seg_len && seg_len > 0.0 {
        let t = remaining / seg_len;
        return Point::new(
          pair[0].x + t * (pair[1].x - pair[0].x),
          pair[0].y + t * (pair[1].y - pair[0].y),
        );
      }
      remaining -= seg_len;
    }
    self.points.last().copied().unwrap_or(self.first())
  }

  fn point_nearest_to(&self, point: Point) -> NearestPoint {
    let mut best = NearestPoint {
      coordinates: self.first(),
      distance_along: 0.0,
    };
    let mut best_dist = best.coordinates.distance_to(point);
    let mut prefix = 0.0;
    for pair in self.points.windows(2) {
      let (a, b) = (pair[0], pair[1]);
      let seg_len = a.distance_to(b);
      let t = if seg_len > 0.0 {
        (((point.x - a.x) * (b.x - a.x) + (point.y - a.y) * (b.y - a.y)) / (seg_len * seg_len))
          .clamp(0.0, 1.0)
      } else {
        0.0
      };
      let candidate = Point::new(a.x + t * (b.x - a.x), a.y + t * (b.y - a.y));
      let dist = candidate.distance_to(point);
      if dist < best_dist {
        best_dist = dist;
        best = NearestPoint {
          coordinates: candidate,
          distance_along: prefix + t * seg_len,
        };
      }
      prefix += seg_len;
    }
    best
  }

  fn distance_to(&self, point: Point) -> f64 {
    self.point_nearest_to(point).coordinates.distance_to(point)
  }

  fn contains_vertex(&self, point: Point) -> bool {
    self.points.iter().any(|v| v.distance_to(point) < 1e-9)
  }
}

// ============================================================================
// Feature records
// ============================================================================

#[derive(Debug, Serialize)]
struct FeatureData {
  urn: String,
  ftype: String,
  props: HashMap<String, PropValue>,
  geometry: Option<Polyline>,
  rels: HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemFeature {
  inner: Arc<FeatureData>,
}

impl FeatureRecord for MemFeature {
  type Geom = Polyline;

  fn urn(&self) -> &str {
    &self.inner.urn
  }

  fn feature_type(&self) -> &str {
    &self.inner.ftype
  }

  fn property(&self, name: &str) -> Option<&PropValue> {
    self.inner.props.get(name)
  }

  fn geometry(&self) -> Option<&Polyline> {
    self.inner.geometry.as_ref()
  }
}

pub struct FeatureBuilder {
  urn: String,
  ftype: String,
  props: HashMap<String, PropValue>,
  geometry: Option<Polyline>,
  rels: HashMap<String, Vec<String>>,
}

pub fn feature(urn: &str, ftype: &str) -> FeatureBuilder {
  FeatureBuilder {
    urn: urn.to_string(),
    ftype: ftype.to_string(),
    props: HashMap::new(),
    geometry: None,
    rels: HashMap::new(),
  }
}

impl FeatureBuilder {
  pub fn prop(mut self, name: &str, value: impl Into<PropValue>) -> Self {
    self.props.insert(name.to_string(), value.into());
    self
  }

  pub fn geometry(mut self, points: &[(f64, f64)]) -> Self {
    self.geometry = Some(Polyline::new(points));
    self
  }

  pub fn rel(mut self, field: &str, urns: &[&str]) -> Self {
    self
      .rels
      .insert(field.to_string(), urns.iter().map(|u| u.to_string()).collect());
    self
  }

  pub fn build(self) -> MemFeature {
    MemFeature {
      inner: Arc::new(FeatureData {
        urn: self.urn,
        ftype: self.ftype,
        props: self.props,
        geometry: self.geometry,
        rels: self.rels,
      }),
    }
  }
}

// ============================================================================
// Feature store
// ============================================================================

#[derive(Default)]
pub struct MemStore {
  features: HashMap<String, MemFeature>,
  denied: HashSet<String>,
}

impl MemStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Insert a feature, replacing any previous one with the same URN.
  pub fn add(&mut self, builder: FeatureBuilder) {
    let feature = builder.build();
    self.features.insert(feature.urn().to_string(), feature);
  }

  /// Mark a feature as unauthorized for the caller.
  pub fn deny(&mut self, urn: &str) {
    self.denied.insert(urn.to_string());
  }
}

impl FeatureStore for MemStore {
  type Record = MemFeature;

  async fn resolve(&self, urn: &str) -> std::result::Result<MemFeature, StoreError> {
    if self.denied.contains(urn) {
      return Err(StoreError::Unauthorized(urn.to_string()));
    }
    self
      .features
      .get(urn)
      .cloned()
      .ok_or_else(|| StoreError::NotFound(urn.to_string()))
  }

  async fn follow(
    &self,
    record: &MemFeature,
    field: &str,
  ) -> std::result::Result<Vec<MemFeature>, StoreError> {
    let Some(urns) = record.inner.rels.get(field) else {
      return Ok(Vec::new());
    };
    let mut related = Vec::new();
    for urn in urns {
      if self.denied.contains(urn) {
        return Err(StoreError::Unauthorized(urn.clone()));
      }
      if let Some(feature) = self.features.get(urn) {
        related.push(feature.clone());
      }
    }
    Ok(related)
  }
}

// ============================================================================
// Filter compiler
// ============================================================================

/// Compiles `name=value` equality expressions.
pub struct EqCompiler;

struct EqPredicate {
  field: String,
  value: String,
}

impl<R: FeatureRecord> Predicate<R> for EqPredicate {
  fn matches(&self, record: &R) -> bool {
    match record.property(&self.field) {
      Some(PropValue::Str(s)) => *s == self.value,
      Some(PropValue::Int(i)) => i.to_string() == self.value,
      Some(PropValue::Float(f)) => f.to_string() == self.value,
      Some(PropValue::Bool(b)) => b.to_string() == self.value,
      _ => false,
    }
  }
}

impl<R: FeatureRecord + 'static> PredicateCompiler<R> for EqCompiler {
  fn compile(&self, expr: &str) -> Result<Box<dyn Predicate<R>>> {
    let Some((field, value)) = expr.split_once('=') else {
      return Err(TraceError::Filter(format!("expected name=value, got `{expr}`")));
    };
    Ok(Box::new(EqPredicate {
      field: field.trim().to_string(),
      value: value.trim().to_string(),
    }))
  }
}

// ============================================================================
// Units
// ============================================================================

/// Length conversions between metres, kilometres and feet.
pub struct MetricUnits;

fn metres_per(unit: &str) -> Option<f64> {
  match unit {
    "m" => Some(1.0),
    "km" => Some(1000.0),
    "ft" => Some(0.3048),
    _ => None,
  }
}

impl UnitConverter for MetricUnits {
  fn convert(&self, value: f64, from: &str, to: &str) -> Result<f64> {
    let from_scale =
      metres_per(from).ok_or_else(|| TraceError::Units(format!("unknown unit `{from}`")))?;
    let to_scale =
      metres_per(to).ok_or_else(|| TraceError::Units(format!("unknown unit `{to}`")))?;
    Ok(value * from_scale / to_scale)
  }
}

// ============================================================================
// Network definitions
// ============================================================================

/// An undirected graph-engine network where every listed type connects
/// through `upstream`/`downstream` reference fields and measures length from
/// its `len` property.
pub fn graph_network(types: &[&str]) -> NetworkDefinition {
  NetworkDefinition {
    feature_types: types
      .iter()
      .map(|t| (t.to_string(), reference_fields("upstream", "downstream")))
      .collect(),
    directed: false,
    topology: TopologySpec::default(),
    engine: "graph".to_string(),
    external_name: None,
  }
}

/// A topo-engine network where every listed type seeds traversal from its
/// `from_node` topology reference.
pub fn topo_network(types: &[&str]) -> NetworkDefinition {
  let mut config = FeatureTypeConfig::default();
  config
    .fields
    .insert("upstream".to_string(), "from_node".to_string());
  config.fields.insert("length".to_string(), "len".to_string());

  NetworkDefinition {
    feature_types: types
      .iter()
      .map(|t| (t.to_string(), config.clone()))
      .collect(),
    directed: false,
    topology: TopologySpec::default(),
    engine: "topo".to_string(),
    external_name: None,
  }
}

fn reference_fields(upstream: &str, downstream: &str) -> FeatureTypeConfig {
  let mut config = FeatureTypeConfig::default();
  config
    .fields
    .insert("upstream".to_string(), upstream.to_string());
  config
    .fields
    .insert("downstream".to_string(), downstream.to_string());
  config.fields.insert("length".to_string(), "len".to_string());
  config
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_polyline_length_and_interpolation() {
    let line = Polyline::new(&[(0.0, 0.0), (3.0, 0.0), (3.0, 4.0)]);
    assert_eq!(line.length(), 7.0);
    assert_eq!(line.point_at_distance(0.0), Point::new(0.0, 0.0));
    assert_eq!(line.point_at_distance(3.0), Point::new(3.0, 0.0));
    assert_eq!(line.point_at_distance(5.0), Point::new(3.0, 2.0));
    // Past the end clamps to the final vertex.
    assert_eq!(line.point_at_distance(99.0), Point::new(3.0, 4.0));
  }

  #[test]
  fn test_polyline_nearest_point() {
    let line = Polyline::new(&[(0.0, 0.0), (10.0, 0.0)]);
    let nearest = line.point_nearest_to(Point::new(4.0, 3.0));
    assert_eq!(nearest.coordinates, Point::new(4.0, 0.0));
    assert_eq!(nearest.distance_along, 4.0);
    assert_eq!(line.distance_to(Point::new(4.0, 3.0)), 3.0);
  }

  #[test]
  fn test_polyline_contains_vertex() {
    let line = Polyline::new(&[(0.0, 0.0), (10.0, 0.0)]);
    assert!(line.contains_vertex(Point::new(10.0, 0.0)));
    // Interior points are not vertices.
    assert!(!line.contains_vertex(Point::new(5.0, 0.0)));
  }

  #[test]
  fn test_eq_compiler() {
    let predicate: Box<dyn Predicate<MemFeature>> =
      EqCompiler.compile("status=active").expect("compiles");
    let active = feature("urn:a", "pipe").prop("status", "active").build();
    let idle = feature("urn:b", "pipe").prop("status", "idle").build();
    let missing = feature("urn:c", "pipe").build();
    assert!(predicate.matches(&active));
    assert!(!predicate.matches(&idle));
    assert!(!predicate.matches(&missing));
  }

  #[test]
  fn test_metric_units() {
    assert_eq!(MetricUnits.convert(2.0, "km", "m").unwrap(), 2000.0);
    assert_eq!(MetricUnits.convert(1000.0, "m", "km").unwrap(), 1.0);
    assert!(MetricUnits.convert(1.0, "furlong", "m").is_err());
  }
}
