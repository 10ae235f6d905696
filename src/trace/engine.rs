//! Trace orchestration
//!
//! `NetworkEngine` compiles the network's filter predicates and unit scales
//! once at construction, then runs traces against a feature store: a
//! min-priority wavefront expanded through the configured connectivity
//! strategy, with cycle suppression, partial-edge truncation at the distance
//! limit, and an admissible Euclidean lower bound toward stop features.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{Result, StoreError, TraceError};
use crate::network::{EngineKind, NetworkDefinition, ROLE_LENGTH};
use crate::store::{
  FeatureRecord, FeatureStore, Geometry, Predicate, PredicateCompiler, UnitConverter,
};
use crate::trace::node::{TraceNode, TraceTree};
use crate::types::{PropValue, TraceDirection, METRES};
use crate::util::heap::MinHeap;

// ============================================================================
// Options
// ============================================================================

/// Options for a single trace call.
#[derive(Debug, Clone, Default)]
pub struct TraceOptions {
  /// Which configured reference fields to follow. Ignored by undirected
  /// networks, which always follow both.
  pub direction: TraceDirection,
  /// Clamp the trace at this cumulative distance, in metres. Nodes cut by
  /// the clamp are returned as partial.
  pub max_dist: Option<f64>,
  /// Abort the call if the search discovers more nodes than this.
  pub max_nodes: Option<usize>,
  /// Terminate the search as soon as one of these features is reached.
  pub stop_urns: Vec<String>,
}

impl TraceOptions {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn direction(mut self, direction: TraceDirection) -> Self {
    self.direction = direction;
    self
  }

  pub fn max_dist(mut self, metres: f64) -> Self {
    self.max_dist = Some(metres);
    self
  }

  pub fn max_nodes(mut self, count: usize) -> Self {
    self.max_nodes = Some(count);
    self
  }

  pub fn stop_at(mut self, urn: impl Into<String>) -> Self {
    self.stop_urns.push(urn.into());
    self
  }
}

// ============================================================================
// Predicate composition
// ============================================================================

struct And<R>(Box<dyn Predicate<R>>, Box<dyn Predicate<R>>);

impl<R> Predicate<R> for And<R> {
  fn matches(&self, record: &R) -> bool {
    self.0.matches(record) && self.1.matches(record)
  }
}

// ============================================================================
// Engine
// ============================================================================

/// A trace engine bound to one network definition and one feature store.
///
/// Construction is the only place filters compile and unit scales resolve;
/// concurrent traces over one engine share nothing else.
pub struct NetworkEngine<S: FeatureStore>
where
  S::Record: 'static,
{
  pub(crate) store: S,
  pub(crate) network: NetworkDefinition,
  pub(crate) kind: EngineKind,
  predicates: HashMap<String, Box<dyn Predicate<S::Record>>>,
  length_scales: HashMap<String, f64>,
}

impl<S: FeatureStore> std::fmt::Debug for NetworkEngine<S>
where
  S::Record: 'static,
{
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("NetworkEngine")
      .field("network", &self.network)
      .field("kind", &self.kind)
      .finish()
  }
}

impl<S: FeatureStore> NetworkEngine<S> {
  /// Build an engine for a network definition.
  ///
  /// `extra_filters` are caller-supplied per-type filter expressions, ANDed
  /// with the configured ones. Fails on an unknown engine name, a filter
  /// that does not compile, or a length unit that does not convert.
  pub fn new(
    store: S,
    network: NetworkDefinition,
    compiler: &dyn PredicateCompiler<S::Record>,
    units: &dyn UnitConverter,
    extra_filters: &HashMap<String, String>,
  ) -> Result<Self> {
    let kind = EngineKind::lookup(&network.engine)
      .ok_or_else(|| TraceError::UnknownEngine(network.engine.clone()))?;

    let mut predicates: HashMap<String, Box<dyn Predicate<S::Record>>> = HashMap::new();
    let mut length_scales = HashMap::new();
    for (ftype, config) in &network.feature_types {
      let configured = config
        .filter
        .as_deref()
        .map(|expr| compiler.compile(expr))
        .transpose()?;
      let extra = extra_filters
        .get(ftype)
        .map(|expr| compiler.compile(expr))
        .transpose()?;
      let merged = match (configured, extra) {
        (Some(a), Some(b)) => Some(Box::new(And(a, b)) as Box<dyn Predicate<S::Record>>),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
      };
      if let Some(predicate) = merged {
        predicates.insert(ftype.clone(), predicate);
      }

      if let Some(unit) = config.length_unit.as_deref() {
        length_scales.insert(ftype.clone(), units.convert(1.0, unit, METRES)?);
      }
    }

    Ok(Self {
      store,
      network,
      kind,
      predicates,
      length_scales,
    })
  }

  pub fn network(&self) -> &NetworkDefinition {
    &self.network
  }

  /// The configured field name for a role (`upstream`, `downstream`,
  /// `length`) on a feature type.
  pub fn prop_field_name(&self, ftype: &str, role: &str) -> Option<&str> {
    self
      .network
      .feature_types
      .get(ftype)
      .and_then(|config| config.fields.get(role))
      .map(String::as_str)
  }

  /// Whether a feature participates in the network: its type is configured
  /// and the type's predicate (if any) matches.
  pub fn includes_feature(&self, record: &S::Record) -> bool {
    if !self.network.feature_types.contains_key(record.feature_type()) {
      return false;
    }
    match self.predicates.get(record.feature_type()) {
      Some(predicate) => predicate.matches(record),
      None => true,
    }
  }

  /// A feature's length in metres: the configured length property when
  /// present, otherwise the geodesic length of its own geometry.
  pub fn length_of(&self, record: &S::Record) -> f64 {
    if let Some(field) = self.prop_field_name(record.feature_type(), ROLE_LENGTH) {
      if let Some(value) = record.property(field).and_then(PropValue::as_f64) {
        let scale = self
          .length_scales
          .get(record.feature_type())
          .copied()
          .unwrap_or(1.0);
        return value * scale;
      }
    }
    record
      .geometry()
      .map(|g| g.geodetic_length())
      .unwrap_or(0.0)
  }

  // --------------------------------------------------------------------------
  // Public trace surface
  // --------------------------------------------------------------------------

  /// Trace outward from a feature, returning the compacted reachable
  /// subtree. An unresolvable start, or one outside the network, yields an
  /// empty tree.
  pub async fn trace_out(
    &self,
    start_urn: &str,
    options: &TraceOptions,
  ) -> Result<TraceTree<S::Record>> {
    let (mut tree, _) = self.run_trace(start_urn, options).await?;
    tree.tidy();
    Ok(tree)
  }

  /// Find the shortest path between two features. Returns the root-to-stop
  /// chain, or an empty tree when the target is unreachable.
  pub async fn shortest_path(
    &self,
    start_urn: &str,
    to_urn: &str,
    options: &TraceOptions,
  ) -> Result<TraceTree<S::Record>> {
    let mut options = options.clone();
    options.stop_urns = vec![to_urn.to_string()];
    let (mut tree, found) = self.run_trace(start_urn, &options).await?;
    let Some(stop) = found else {
      return Ok(TraceTree::empty());
    };
    tree.prune_to_root_path(stop);
    tree.tidy();
    Ok(tree)
  }

  // --------------------------------------------------------------------------
  // Search loop
  // --------------------------------------------------------------------------

  async fn run_trace(
    &self,
    start_urn: &str,
    options: &TraceOptions,
  ) -> Result<(TraceTree<S::Record>, Option<usize>)> {
    let start = match self.store.resolve(start_urn).await {
      Ok(record) => record,
      Err(StoreError::NotFound(_)) => {
        warn!(urn = start_urn, "trace start not found");
        return Ok((TraceTree::empty(), None));
      }
      Err(err) => return Err(err.into()),
    };
    if !self.includes_feature(&start) {
      warn!(urn = start_urn, "trace start is not part of the network");
      return Ok((TraceTree::empty(), None));
    }

    let stop_set: HashSet<&str> = options.stop_urns.iter().map(String::as_str).collect();
    let mut stop_features = Vec::new();
    for urn in &options.stop_urns {
      match self.store.resolve(urn).await {
        Ok(record) => stop_features.push(record),
        Err(StoreError::NotFound(_)) => warn!(urn = urn.as_str(), "stop feature not found"),
        Err(err) => return Err(err.into()),
      }
    }

    let root = self.root_node(Arc::new(start)).await?;
    let mut tree = TraceTree::with_root(root);
    let mut visited: HashSet<String> = HashSet::new();
    visited.insert(tree.node(0).node_id.clone());

    let mut wavefront = MinHeap::new();
    wavefront.push(self.priority(&tree, 0, &stop_features), 0);

    let mut found = None;
    while let Some(idx) = wavefront.pop() {
      if stop_set.contains(tree.node(idx).feature.urn()) {
        found = Some(idx);
        break;
      }
      // A truncated node is a frontier terminus; anything past it would sit
      // beyond the distance limit.
      if tree.node(idx).partial {
        continue;
      }

      let pending = self.connected_nodes(&tree, idx, options.direction).await?;
      for connection in pending {
        let node = connection.commit(Some(idx), options.max_dist);
        if !visited.insert(node.node_id.clone()) {
          continue;
        }
        if let Some(max) = options.max_nodes {
          if tree.len() + 1 > max {
            return Err(TraceError::SizeLimit(max));
          }
        }
        let new_idx = tree.attach(node);
        wavefront.push(self.priority(&tree, new_idx, &stop_features), new_idx);
      }
    }

    debug!(
      nodes = tree.len(),
      stopped = found.is_some(),
      "trace complete"
    );
    Ok((tree, found))
  }

  /// Wavefront key: cumulative distance plus, when the strategy allows it
  /// and stop geometries are known, the minimum straight-line distance from
  /// this node's stop coordinate to any stop geometry. The bound never
  /// exceeds the real remaining network distance, so reaching a stop first
  /// is reaching it shortest.
  fn priority(&self, tree: &TraceTree<S::Record>, idx: usize, stops: &[S::Record]) -> f64 {
    let dist = tree.node(idx).dist;
    if !self.kind.euclidean() || stops.is_empty() {
      return dist;
    }
    let Some(coord) = tree.stop_coord(idx) else {
      return dist;
    };
    let mut bound = f64::INFINITY;
    for stop in stops {
      if let Some(geom) = stop.geometry() {
        bound = bound.min(geom.distance_to(coord));
      }
    }
    if bound.is_finite() {
      dist + bound
    } else {
      dist
    }
  }

  // --------------------------------------------------------------------------
  // Strategy dispatch
  // --------------------------------------------------------------------------

  async fn root_node(&self, feature: Arc<S::Record>) -> Result<TraceNode<S::Record>> {
    match self.kind {
      EngineKind::Graph => Ok(self.graph_root(feature)),
      EngineKind::Topo => self.topo_root(feature).await,
    }
  }

  async fn connected_nodes(
    &self,
    tree: &TraceTree<S::Record>,
    idx: usize,
    direction: TraceDirection,
  ) -> Result<Vec<crate::trace::node::PendingNode<S::Record>>> {
    match self.kind {
      EngineKind::Graph => self.graph_connected(tree, idx, direction).await,
      EngineKind::Topo => self.topo_connected(tree, idx).await,
    }
  }
}

// ============================================================================
// Tests
// ============================================================================
