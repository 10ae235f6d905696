//! Topology connectivity
//!
//! Adjacency comes from an explicit topology layer: each feature owns zero
//! or more topology nodes, and nodes are joined by links, each link owned by
//! exactly one feature. A feature spanning several links produces one trace
//! node per traversed element; `tidy` later folds those into single legs.
//!
//! Link distances apportion the owning feature's configured length by the
//! link's share of the feature's geometry.

use std::sync::Arc;

use crate::error::{Result, StoreError};
use crate::network::ROLE_UPSTREAM;
use crate::store::{FeatureRecord, FeatureStore, Geometry};
use crate::trace::engine::NetworkEngine;
use crate::trace::node::{PendingNode, TopoRef, TraceNode, TraceTree};

impl<S: FeatureStore> NetworkEngine<S> {
  /// Wrap the start feature, seeding traversal from its configured upstream
  /// topology node. Without a resolvable seed the trace is root-only.
  pub(crate) async fn topo_root(&self, feature: Arc<S::Record>) -> Result<TraceNode<S::Record>> {
    let seed = match self.prop_field_name(feature.feature_type(), ROLE_UPSTREAM) {
      Some(field) => self.first_related(&feature, field).await?.map(Arc::new),
      None => None,
    };
    let node_id = match &seed {
      Some(node) => format!("{}@{}", feature.urn(), node.urn()),
      None => feature.urn().to_string(),
    };
    Ok(TraceNode {
      feature,
      dist: 0.0,
      full_dist: 0.0,
      partial: false,
      node_id,
      parent: None,
      children: Vec::new(),
      topo: seed.map(|node| TopoRef { node, link: None }),
    })
  }

  pub(crate) async fn topo_connected(
    &self,
    tree: &TraceTree<S::Record>,
    idx: usize,
  ) -> Result<Vec<PendingNode<S::Record>>> {
    let node = tree.node(idx);
    let Some(topo) = &node.topo else {
      return Ok(Vec::new());
    };
    let topology = &self.network.topology;
    let topo_node = &topo.node;

    // A topology node belonging to some other feature is a doorway: the only
    // connection is a zero-length transition onto its owner.
    if let Some(owner) = self.first_related(topo_node, &topology.owner_field).await? {
      if owner.urn() != node.feature.urn() {
        if !self.includes_feature(&owner) {
          return Ok(Vec::new());
        }
        let owner = Arc::new(owner);
        let node_id = format!("{}@{}", owner.urn(), topo_node.urn());
        return Ok(vec![PendingNode {
          feature: owner,
          dist: node.dist,
          node_id,
          topo: Some(TopoRef {
            node: Arc::clone(topo_node),
            link: None,
          }),
        }]);
      }
    }

    let links = match self.store.follow(topo_node, &topology.links_field).await {
      Ok(links) => links,
      Err(StoreError::Unauthorized(_)) => Vec::new(),
      Err(err) => return Err(err.into()),
    };

    let root_urn = tree.node(0).feature.urn();
    let mut connected = Vec::new();
    for link in links {
      // Never turn straight back across the link we arrived by.
      if let Some(via) = &topo.link {
        if via.urn() == link.urn() {
          continue;
        }
      }
      let Some(owner) = self.first_related(&link, &topology.owner_field).await? else {
        continue;
      };
      if !self.includes_feature(&owner) {
        continue;
      }
      let node1 = self.first_related(&link, &topology.node1_field).await?;
      let node2 = self.first_related(&link, &topology.node2_field).await?;
      let far = match (node1, node2) {
        (Some(n1), Some(n2)) => {
          if n1.urn() == topo_node.urn() {
            n2
          } else {
            n1
          }
        }
        (Some(n1), None) => n1,
        (None, Some(n2)) => n2,
        (None, None) => continue,
      };

      let owner = Arc::new(owner);
      let link = Arc::new(link);
      // Crossing back onto the start feature restarts the distance count;
      // every point on the root is distance zero.
      let dist = if owner.urn() == root_urn {
        0.0
      } else {
        node.dist + self.length_of_link(&link, &owner)
      };
      connected.push(PendingNode {
        node_id: format!("{}|{}", owner.urn(), link.urn()),
        feature: owner,
        dist,
        topo: Some(TopoRef {
          node: Arc::new(far),
          link: Some(link),
        }),
      });
    }
    Ok(connected)
  }

  /// Scale a link's geodesic length by the owning feature's configured
  /// length: the link's share of the feature geometry, applied to whatever
  /// length the feature claims.
  pub(crate) fn length_of_link(&self, link: &S::Record, owner: &S::Record) -> f64 {
    let link_len = link.geometry().map(|g| g.geodetic_length()).unwrap_or(0.0);
    let owner_len = owner
      .geometry()
      .map(|g| g.geodetic_length())
      .unwrap_or(0.0);
    if owner_len <= 0.0 {
      return link_len;
    }
    link_len / owner_len * self.length_of(owner)
  }

  async fn first_related(&self, record: &S::Record, field: &str) -> Result<Option<S::Record>> {
    match self.store.follow(record, field).await {
      Ok(records) => Ok(records.into_iter().next()),
      Err(StoreError::Unauthorized(_)) => Ok(None),
      Err(err) => Err(err.into()),
    }
  }
}

// ============================================================================
// Tests
// ============================================================================
