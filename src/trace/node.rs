//! Trace result trees
//!
//! Nodes discovered by a trace live in an arena owned by [`TraceTree`];
//! parents and children are indices into it, so the tree never forms
//! reference cycles. Nodes are committed in their final form (full or
//! truncated) before they enter the wavefront, and all walks are iterative.

use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;

use crate::store::{FeatureRecord, Geometry};
use crate::types::Point;

// ============================================================================
// Nodes
// ============================================================================

/// Topology context of a node reached through the topo strategy: the
/// topology node arrived at, and the link traversed to get there (absent for
/// zero-length owner transitions and for the seed node).
#[derive(Debug)]
pub struct TopoRef<R> {
  pub node: Arc<R>,
  pub link: Option<Arc<R>>,
}

impl<R> Clone for TopoRef<R> {
  fn clone(&self) -> Self {
    Self {
      node: Arc::clone(&self.node),
      link: self.link.clone(),
    }
  }
}

/// One node of a trace tree.
#[derive(Debug)]
pub struct TraceNode<R> {
  /// The feature this node visits.
  pub feature: Arc<R>,
  /// Cumulative distance from the root, in metres. Clamped for partial
  /// nodes.
  pub dist: f64,
  /// The distance this node would carry had it not been truncated. Equal to
  /// `dist` for full nodes.
  pub full_dist: f64,
  /// True when `dist` was clamped at the trace's distance limit.
  pub partial: bool,
  /// Duplicate-suppression key. For topo nodes this includes the traversed
  /// link or node identifier, since a feature may legitimately be revisited
  /// through a different topological element.
  pub node_id: String,
  /// Back-reference only; the arena owns the node.
  pub parent: Option<usize>,
  /// Owned child list, in discovery order.
  pub children: Vec<usize>,
  /// Topology context, absent for graph-strategy nodes.
  pub topo: Option<TopoRef<R>>,
}

/// A connection discovered during expansion, not yet part of the tree.
///
/// Truncation happens in [`PendingNode::commit`], before the node can enter
/// the visited set or the wavefront, so a queued node's priority key is
/// never mutated.
pub(crate) struct PendingNode<R> {
  pub feature: Arc<R>,
  pub dist: f64,
  pub node_id: String,
  pub topo: Option<TopoRef<R>>,
}

impl<R> PendingNode<R> {
  pub(crate) fn commit(self, parent: Option<usize>, max_dist: Option<f64>) -> TraceNode<R> {
    let full_dist = self.dist;
    let (dist, partial, node_id) = match max_dist {
      Some(max) if self.dist > max => {
        // Suffix the key for topo nodes so a truncated visit does not
        // collide with a later full visit of the same element from the
        // other side.
        let node_id = if self.topo.is_some() {
          format!("{}~cut", self.node_id)
        } else {
          self.node_id
        };
        (max, true, node_id)
      }
      _ => (self.dist, false, self.node_id),
    };

    TraceNode {
      feature: self.feature,
      dist,
      full_dist,
      partial,
      node_id,
      parent,
      children: Vec::new(),
      topo: self.topo,
    }
  }
}

// ============================================================================
// Trace tree
// ============================================================================

/// The tree produced by a trace. Empty when the start feature could not be
/// resolved, was outside the network, or a shortest-path target was
/// unreachable.
#[derive(Debug)]
pub struct TraceTree<R> {
  nodes: Vec<TraceNode<R>>,
}

/// Flattened node table entry produced by [`TraceTree::as_trace_result`].
#[derive(Debug, Clone, Serialize)]
pub struct TraceResultNode {
  pub id: usize,
  pub parent: Option<usize>,
  pub urn: String,
  pub feature_type: String,
  pub dist: f64,
  pub partial: bool,
}

/// Serialized form of a trace tree: a parent-indexed node table plus the
/// deduplicated features it references, keyed by URN.
#[derive(Debug, Serialize)]
pub struct TraceResult<R> {
  pub nodes: Vec<TraceResultNode>,
  pub features: IndexMap<String, Arc<R>>,
}

impl<R: FeatureRecord> TraceTree<R> {
  pub fn empty() -> Self {
    Self { nodes: Vec::new() }
  }

  pub(crate) fn with_root(root: TraceNode<R>) -> Self {
    Self { nodes: vec![root] }
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  /// Number of arena slots. After `tidy` this may count nodes that are no
  /// longer reachable from the root.
  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn root(&self) -> Option<&TraceNode<R>> {
    self.nodes.first()
  }

  pub fn node(&self, idx: usize) -> &TraceNode<R> {
    &self.nodes[idx]
  }

  pub fn nodes(&self) -> &[TraceNode<R>] {
    &self.nodes
  }

  /// Append a committed node and link it under its parent.
  pub(crate) fn attach(&mut self, node: TraceNode<R>) -> usize {
    let idx = self.nodes.len();
    let parent = node.parent;
    self.nodes.push(node);
    if let Some(p) = parent {
      self.nodes[p].children.push(idx);
    }
    idx
  }

  // --------------------------------------------------------------------------
  // Compaction
  // --------------------------------------------------------------------------

  /// Collapse chains of same-feature nodes into single legs.
  ///
  /// A feature traversed across several topology segments produces one node
  /// per segment; after tidy the caller sees one node per distinct feature.
  /// The child's cumulative distance, truncation state and terminal topology
  /// references move onto the parent. Graph traces are unaffected, since one
  /// feature is one node there.
  pub fn tidy(&mut self) {
    if self.nodes.is_empty() {
      return;
    }
    let mut stack = vec![0usize];
    while let Some(idx) = stack.pop() {
      loop {
        let child_idx = {
          let node = &self.nodes[idx];
          if node.children.len() != 1 {
            break;
          }
          let c = node.children[0];
          if self.nodes[c].feature.urn() != node.feature.urn() {
            break;
          }
          c
        };

        let (dist, full_dist, partial, topo, children) = {
          let child = &mut self.nodes[child_idx];
          (
            child.dist,
            child.full_dist,
            child.partial,
            child.topo.take(),
            std::mem::take(&mut child.children),
          )
        };
        for &grandchild in &children {
          self.nodes[grandchild].parent = Some(idx);
        }
        let node = &mut self.nodes[idx];
        node.dist = dist;
        node.full_dist = full_dist;
        node.partial = partial;
        if topo.is_some() {
          node.topo = topo;
        }
        node.children = children;
      }
      stack.extend(self.nodes[idx].children.iter().copied());
    }
  }

  /// Reduce the tree to the single root-to-stop chain, discarding every
  /// other branch.
  pub fn prune_to_root_path(&mut self, stop: usize) {
    self.nodes[stop].children.clear();
    let mut current = stop;
    while let Some(parent) = self.nodes[current].parent {
      self.nodes[parent].children = vec![current];
      current = parent;
    }
  }

  // --------------------------------------------------------------------------
  // Flattening
  // --------------------------------------------------------------------------

  /// Pre-order walk producing a de-duplicated, type-filtered feature list.
  /// First occurrence wins; children are visited in discovery order.
  pub fn sub_tree_features(&self, types: Option<&[&str]>) -> Vec<Arc<R>> {
    let mut seen: IndexMap<&str, Arc<R>> = IndexMap::new();
    if self.nodes.is_empty() {
      return Vec::new();
    }
    let mut stack = vec![0usize];
    while let Some(idx) = stack.pop() {
      let node = &self.nodes[idx];
      let ftype = node.feature.feature_type();
      if types.is_none_or(|t| t.contains(&ftype)) {
        seen
          .entry(node.feature.urn())
          .or_insert_with(|| Arc::clone(&node.feature));
      }
      for &child in node.children.iter().rev() {
        stack.push(child);
      }
    }
    seen.into_values().collect()
  }

  /// Pre-order walk producing the flattened node table. Nodes of excluded
  /// types are skipped, with their children re-pointed to the nearest
  /// included ancestor.
  pub fn as_trace_result(&self, types: Option<&[&str]>) -> TraceResult<R> {
    let mut nodes_out = Vec::new();
    let mut features = IndexMap::new();
    if self.nodes.is_empty() {
      return TraceResult {
        nodes: nodes_out,
        features,
      };
    }

    let mut stack: Vec<(usize, Option<usize>)> = vec![(0, None)];
    while let Some((idx, ancestor)) = stack.pop() {
      let node = &self.nodes[idx];
      let included = types.is_none_or(|t| t.contains(&node.feature.feature_type()));
      let next_ancestor = if included {
        let id = nodes_out.len();
        nodes_out.push(TraceResultNode {
          id,
          parent: ancestor,
          urn: node.feature.urn().to_string(),
          feature_type: node.feature.feature_type().to_string(),
          dist: node.dist,
          partial: node.partial,
        });
        features
          .entry(node.feature.urn().to_string())
          .or_insert_with(|| Arc::clone(&node.feature));
        Some(id)
      } else {
        ancestor
      };
      for &child in node.children.iter().rev() {
        stack.push((child, next_ancestor));
      }
    }

    TraceResult {
      nodes: nodes_out,
      features,
    }
  }

  // --------------------------------------------------------------------------
  // Coordinates
  // --------------------------------------------------------------------------

  /// The geometry of the segment this node represents: the traversed link
  /// for topo nodes (falling back to the topology node's own geometry), the
  /// feature's geometry otherwise.
  fn segment_geometry(&self, idx: usize) -> Option<&<R as FeatureRecord>::Geom> {
    let node = &self.nodes[idx];
    match &node.topo {
      Some(topo) => topo
        .link
        .as_deref()
        .and_then(|link| link.geometry())
        .or_else(|| topo.node.geometry()),
      None => node.feature.geometry(),
    }
  }

  fn segment_start_dist(&self, idx: usize) -> f64 {
    self.nodes[idx]
      .parent
      .map(|p| self.nodes[p].dist)
      .unwrap_or(0.0)
  }

  /// Whether the segment geometry runs in traversal direction. Decided by
  /// vertex adjacency to the parent's geometry, with a nearest-endpoint
  /// comparison as fallback when no vertex is shared.
  pub fn is_forward(&self, idx: usize) -> bool {
    let node = &self.nodes[idx];
    let Some(parent) = node.parent else {
      return true;
    };
    let Some(geom) = self.segment_geometry(idx) else {
      return true;
    };
    let Some(parent_geom) = self.segment_geometry(parent) else {
      return true;
    };

    let start = geom.point_at_distance(0.0);
    let end = geom.point_at_distance(geom.length());
    if parent_geom.contains_vertex(start) {
      return true;
    }
    if parent_geom.contains_vertex(end) {
      return false;
    }
    parent_geom.distance_to(start) <= parent_geom.distance_to(end)
  }

  /// Entry point of the segment this node represents.
  pub fn start_coord(&self, idx: usize) -> Option<Point> {
    let geom = self.segment_geometry(idx)?;
    Some(if self.is_forward(idx) {
      geom.point_at_distance(0.0)
    } else {
      geom.point_at_distance(geom.length())
    })
  }

  /// Natural exit point of the segment, ignoring truncation.
  pub fn end_coord(&self, idx: usize) -> Option<Point> {
    let geom = self.segment_geometry(idx)?;
    Some(if self.is_forward(idx) {
      geom.point_at_distance(geom.length())
    } else {
      geom.point_at_distance(0.0)
    })
  }

  /// Where traversal actually stopped on this segment. For partial nodes the
  /// position interpolates at the proportional distance reached before the
  /// clamp; otherwise it is the natural end.
  pub fn stop_coord(&self, idx: usize) -> Option<Point> {
    let node = &self.nodes[idx];
    let geom = self.segment_geometry(idx)?;
    let len = geom.length();
    let fraction = if node.partial {
      let start = self.segment_start_dist(idx);
      let span = node.full_dist - start;
      if span > 0.0 {
        ((node.dist - start) / span).clamp(0.0, 1.0)
      } else {
        1.0
      }
    } else {
      1.0
    };
    let along = fraction * len;
    Some(if self.is_forward(idx) {
      geom.point_at_distance(along)
    } else {
      geom.point_at_distance(len - along)
    })
  }
}

// ============================================================================
// Tests
// ============================================================================
