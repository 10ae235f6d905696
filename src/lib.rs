//! NetTrace - Embedded network trace engine
//!
//! Computes reachability and shortest-path results over a logical "network":
//! a configured subset of spatial feature types connected either by direct
//! attribute references or by an explicit topology layer of nodes and links.
//!
//! # Architecture
//!
//! - **Network definition**: declarative configuration selecting the feature
//!   types that participate, their filter expressions, and the field names
//!   used for connectivity and length.
//! - **Connectivity strategies**: `graph` (adjacency from reference fields on
//!   the feature itself) and `topo` (adjacency from topology nodes joined by
//!   links, with length apportionment along partial links).
//! - **Search**: a min-priority wavefront with an admissible Euclidean
//!   lower-bound heuristic, cycle suppression, and partial-edge truncation at
//!   distance limits.
//! - **Result shaping**: tree compaction ("tidy"), root-path pruning, flat
//!   feature lists, and a parent-indexed serialized node table.
//!
//! The feature store, geometry operations, filter compilation and unit
//! conversion are consumed through traits; see [`store`].

#![deny(clippy::all)]

// Core modules
pub mod error;
pub mod network;
pub mod store;
pub mod types;
pub mod util;

// Trace engine modules
pub mod trace;

#[cfg(test)]
pub(crate) mod testutil;

// Re-export commonly used items
pub use error::{Result, StoreError, TraceError};
pub use network::{EngineKind, FeatureTypeConfig, NetworkDefinition, TopologySpec};
pub use store::{
  FeatureRecord, FeatureStore, Geometry, Predicate, PredicateCompiler, UnitConverter,
};
pub use trace::engine::{NetworkEngine, TraceOptions};
pub use trace::node::{TopoRef, TraceNode, TraceResult, TraceResultNode, TraceTree};
pub use types::{NearestPoint, Point, PropValue, TraceDirection};
