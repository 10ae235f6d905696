//! Network definitions
//!
//! A network definition selects which feature types participate in a trace,
//! how they connect (reference fields or topology records), and which
//! connectivity engine interprets them.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Role key for the field referencing upstream features or topology nodes.
pub const ROLE_UPSTREAM: &str = "upstream";
/// Role key for the field referencing downstream features or topology nodes.
pub const ROLE_DOWNSTREAM: &str = "downstream";
/// Role key for the property holding a feature's configured length.
pub const ROLE_LENGTH: &str = "length";

// ============================================================================
// Per-type configuration
// ============================================================================

/// Configuration for one feature type participating in the network.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureTypeConfig {
  /// Optional filter expression; features of this type that do not match are
  /// invisible to the trace.
  #[serde(default)]
  pub filter: Option<String>,

  /// Role -> field name. Recognized roles are `upstream`, `downstream` and
  /// `length`. For graph engines the upstream/downstream fields reference
  /// other features directly; for topo engines they reference topology
  /// nodes.
  #[serde(default)]
  pub fields: HashMap<String, String>,

  /// Unit of the configured length property. Defaults to metres.
  #[serde(default)]
  pub length_unit: Option<String>,
}

// ============================================================================
// Topology
// ============================================================================

/// Relationship field names used on topology records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologySpec {
  /// Topology kind label, opaque to the engine.
  #[serde(default)]
  pub kind: String,

  /// Field on a topology node listing its incident links.
  #[serde(default = "default_links_field")]
  pub links_field: String,

  /// Fields on a topology link referencing its two endpoint nodes.
  #[serde(default = "default_node1_field")]
  pub node1_field: String,
  #[serde(default = "default_node2_field")]
  pub node2_field: String,

  /// Field on a topology node or link referencing its owning feature.
  #[serde(default = "default_owner_field")]
  pub owner_field: String,
}

fn default_links_field() -> String {
  "links".to_string()
}

fn default_node1_field() -> String {
  "node1".to_string()
}

fn default_node2_field() -> String {
  "node2".to_string()
}

fn default_owner_field() -> String {
  "owner".to_string()
}

impl Default for TopologySpec {
  fn default() -> Self {
    Self {
      kind: String::new(),
      links_field: default_links_field(),
      node1_field: default_node1_field(),
      node2_field: default_node2_field(),
      owner_field: default_owner_field(),
    }
  }
}

// ============================================================================
// Network definition
// ============================================================================

/// A complete network definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkDefinition {
  /// The feature types that participate in the network.
  pub feature_types: HashMap<String, FeatureTypeConfig>,

  /// Whether traversal respects the upstream/downstream distinction. An
  /// undirected network follows both reference fields regardless of the
  /// requested direction.
  #[serde(default)]
  pub directed: bool,

  /// Topology record layout. Only meaningful for the `topo` engine.
  #[serde(default)]
  pub topology: TopologySpec,

  /// Connectivity engine name, resolved through [`EngineKind::lookup`].
  pub engine: String,

  /// Display name of the network for callers.
  #[serde(default)]
  pub external_name: Option<String>,
}

// ============================================================================
// Engine registry
// ============================================================================

/// Connectivity strategy selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
  /// Adjacency from reference fields on the feature itself.
  Graph,
  /// Adjacency from an explicit topology of nodes and links.
  Topo,
}

const ENGINE_REGISTRY: &[(&str, EngineKind)] =
  &[("graph", EngineKind::Graph), ("topo", EngineKind::Topo)];

impl EngineKind {
  /// Resolve an engine name from the registry.
  pub fn lookup(name: &str) -> Option<EngineKind> {
    ENGINE_REGISTRY
      .iter()
      .find(|(n, _)| *n == name)
      .map(|(_, kind)| *kind)
  }

  /// Whether this strategy's wavefront may be ordered by a Euclidean
  /// lower bound to the stop geometries. Requires that network hop distance
  /// is never less than straight-line distance.
  pub fn euclidean(self) -> bool {
    match self {
      EngineKind::Graph => true,
      EngineKind::Topo => true,
    }
  }
}

// ============================================================================
// Tests
// ============================================================================
