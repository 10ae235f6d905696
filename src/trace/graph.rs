//! Graph connectivity
//!
//! Adjacency comes straight from reference fields on the features: each
//! type's configuration names the fields holding its upstream and downstream
//! neighbours. One feature is one trace node, so tidy never collapses here.

use std::sync::Arc;

use crate::error::{Result, StoreError};
use crate::network::{ROLE_DOWNSTREAM, ROLE_UPSTREAM};
use crate::store::{FeatureRecord, FeatureStore};
use crate::trace::engine::NetworkEngine;
use crate::trace::node::{PendingNode, TraceNode, TraceTree};
use crate::types::TraceDirection;

impl<S: FeatureStore> NetworkEngine<S> {
  pub(crate) fn graph_root(&self, feature: Arc<S::Record>) -> TraceNode<S::Record> {
    TraceNode {
      node_id: feature.urn().to_string(),
      feature,
      dist: 0.0,
      full_dist: 0.0,
      partial: false,
      parent: None,
      children: Vec::new(),
      topo: None,
    }
  }

  pub(crate) async fn graph_connected(
    &self,
    tree: &TraceTree<S::Record>,
    idx: usize,
    direction: TraceDirection,
  ) -> Result<Vec<PendingNode<S::Record>>> {
    let node = tree.node(idx);
    let ftype = node.feature.feature_type();

    // An undirected network follows both reference fields whatever the
    // caller asked for. When both roles name the same field, follow it once.
    let both = !self.network.directed || direction == TraceDirection::Both;
    let mut fields: Vec<&str> = Vec::new();
    if both || direction == TraceDirection::Upstream {
      if let Some(field) = self.prop_field_name(ftype, ROLE_UPSTREAM) {
        fields.push(field);
      }
    }
    if both || direction == TraceDirection::Downstream {
      if let Some(field) = self.prop_field_name(ftype, ROLE_DOWNSTREAM) {
        if !fields.contains(&field) {
          fields.push(field);
        }
      }
    }

    let mut connected = Vec::new();
    for field in fields {
      let related = match self.store.follow(&node.feature, field).await {
        Ok(records) => records,
        Err(StoreError::Unauthorized(_)) => Vec::new(),
        Err(err) => return Err(err.into()),
      };
      for record in related {
        if !self.includes_feature(&record) {
          continue;
        }
        let feature = Arc::new(record);
        let dist = node.dist + self.length_of(&feature);
        connected.push(PendingNode {
          node_id: feature.urn().to_string(),
          feature,
          dist,
          topo: None,
        });
      }
    }
    Ok(connected)
  }
}

// ============================================================================
// Tests
// ============================================================================
