//! Phase 7: future metrics.
//!
//! For every node, a forward BFS that skips return-classified edges counts
//! the distinct nodes still ahead, the decisions among them and the
//! cross-lane hand-offs. A two-rank lookahead window elects the most likely
//! next lane.

use std::collections::{BTreeMap, VecDeque};

use super::Builder;

pub(super) fn compute(b: &mut Builder) {
    let n = b.nodes.len();

    for origin in 0..n {
        let origin_lane = b.nodes[origin].lane.clone();
        let origin_depth = b.nodes[origin].rank.depth as i64;

        let mut enqueued = vec![false; n];
        let mut queue: VecDeque<usize> = VecDeque::new();
        enqueued[origin] = true;
        queue.push_back(origin);

        let mut steps = 0usize;
        let mut decisions = 0usize;
        let mut cross_lanes = 0usize;
        let mut lane_window: BTreeMap<String, usize> = BTreeMap::new();

        while let Some(curr) = queue.pop_front() {
            if curr != origin {
                steps += 1;
                if b.nodes[curr].kind.is_decision() {
                    decisions += 1;
                }
            }

            for &edge_idx in &b.out_edges[curr] {
                let edge = &b.edges[edge_idx];
                // Return edges would make the walk cyclic.
                if edge.classification.is_return {
                    continue;
                }
                if edge.classification.is_cross_lane {
                    cross_lanes += 1;
                }

                let Some(&target) = b.node_index.get(&edge.to) else {
                    continue;
                };
                if !enqueued[target] {
                    enqueued[target] = true;
                    queue.push_back(target);
                }

                let target_node = &b.nodes[target];
                let depth_diff = target_node.rank.depth as i64 - origin_depth;
                if target_node.lane != origin_lane && (1..=2).contains(&depth_diff) {
                    *lane_window.entry(target_node.lane.clone()).or_insert(0) += 1;
                }
            }
        }

        let next_lane_target = lane_window
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(lane, _)| lane.clone())
            .unwrap_or_default();

        let metrics = &mut b.nodes[origin].future_metrics;
        metrics.future_steps = steps;
        metrics.future_decisions = decisions;
        metrics.cross_lane_ahead = cross_lanes;
        metrics.next_lane_target = next_lane_target;
    }
}
