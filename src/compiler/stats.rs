//! Phase 8: aggregate stats and post-join normalization.
//!
//! Stats are computed before normalization, so `max_branch_depth` reflects
//! the raw BFS assignment. Normalization then pulls every node's
//! `branch_depth` down to the minimum over its predecessors and clears the
//! branch context of nodes that end up at depth zero.

use std::collections::{BTreeMap, BTreeSet};

use crate::ir::{BranchContext, EdgeKind};
use crate::sff::NodeKind;

use super::Builder;

pub(super) fn finalize(b: &mut Builder) {
    let stats = &mut b.stats;
    stats.nodes_total = b.nodes.len();
    stats.edges_total = b.edges.len();
    stats.lanes_total = b.lanes.len();
    stats.decision_nodes = b
        .nodes
        .iter()
        .filter(|n| n.kind == NodeKind::Decision)
        .count();
    stats.branch_edges = b
        .edges
        .iter()
        .filter(|e| e.classification.kind == EdgeKind::Branch)
        .count();
    stats.joins = b
        .edges
        .iter()
        .filter(|e| e.classification.kind == EdgeKind::Join)
        .count();
    stats.max_depth = b.max_depth;
    stats.max_branch_depth = b
        .nodes
        .iter()
        .map(|n| n.rank.branch_depth)
        .max()
        .unwrap_or(0);

    let cycle_ids: BTreeSet<&str> = b
        .nodes
        .iter()
        .filter(|n| n.cycle_context.in_cycle())
        .map(|n| n.cycle_context.cycle_id.as_str())
        .collect();
    stats.cycles_total = cycle_ids.len();
    stats.max_cycle_depth = b
        .nodes
        .iter()
        .map(|n| n.rank.cycle_depth)
        .max()
        .unwrap_or(0);

    let mut branches_per_rank: BTreeMap<u32, usize> = BTreeMap::new();
    for edge in &b.edges {
        if edge.classification.kind != EdgeKind::Branch {
            continue;
        }
        if let Some(&src) = b.node_index.get(&edge.from) {
            *branches_per_rank
                .entry(b.nodes[src].rank.global)
                .or_insert(0) += 1;
        }
    }
    stats.max_branches_per_rank = branches_per_rank.values().copied().max().unwrap_or(0);

    stats.max_tracks_per_lane = b.lanes.values().map(|l| l.tracks_total).max().unwrap_or(0);

    // Post-join normalization. Processing in (global, id) order lets the
    // minimum cascade through forward edges in one pass.
    let mut order: Vec<usize> = (0..b.nodes.len()).collect();
    order.sort_by_key(|&i| (b.nodes[i].rank.global, i));
    for i in order {
        if b.prev[i].is_empty() {
            continue;
        }
        let min_depth = b.prev[i]
            .iter()
            .map(|&p| b.nodes[p].rank.branch_depth)
            .min()
            .unwrap_or(0);
        b.nodes[i].rank.branch_depth = min_depth;
    }
    for node in &mut b.nodes {
        if node.rank.branch_depth == 0 {
            node.branch_context = BranchContext::default();
        }
    }
}
