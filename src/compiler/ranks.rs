//! Phase 3: rank assignment.
//!
//! A FIFO BFS from the entry node sets `depth` and `global` (= depth + 1).
//! Children are visited in sorted-id order. Decision children enter a fresh
//! branch context one level deeper; other children inherit their parent's.
//! Afterwards each lane numbers its nodes 1..k by `(global, id)`.

use std::collections::{BTreeMap, VecDeque};

use crate::ir::BranchContext;

use super::Builder;

pub(super) fn assign(b: &mut Builder) {
    let Some(entry) = b.entry else {
        return;
    };

    let mut visited = vec![false; b.nodes.len()];
    let mut queue: VecDeque<(usize, u32)> = VecDeque::new();
    visited[entry] = true;
    queue.push_back((entry, 0));
    let mut max_global = 0;

    while let Some((curr, depth)) = queue.pop_front() {
        b.nodes[curr].rank.depth = depth;
        b.nodes[curr].rank.global = depth + 1;
        max_global = max_global.max(depth + 1);

        let is_decision = b.nodes[curr].kind.is_decision();
        let parent_branch_depth = b.nodes[curr].rank.branch_depth;
        let parent_context = b.nodes[curr].branch_context.clone();
        let curr_id = b.nodes[curr].id.clone();

        for &child in &b.next[curr].clone() {
            if visited[child] {
                continue;
            }
            visited[child] = true;

            if is_decision {
                b.nodes[child].rank.branch_depth = parent_branch_depth + 1;
                b.nodes[child].branch_context = BranchContext {
                    root_decision: curr_id.clone(),
                    branch_label: String::new(),
                    terminates_soon: false,
                };
            } else {
                b.nodes[child].rank.branch_depth = parent_branch_depth;
                b.nodes[child].branch_context = parent_context.clone();
            }
            queue.push_back((child, depth + 1));
        }
    }

    b.max_depth = max_global;

    // Per-lane ranks: 1..k by (global, id) within each lane.
    let mut lane_nodes: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (i, node) in b.nodes.iter().enumerate() {
        lane_nodes.entry(node.lane.as_str()).or_default().push(i);
    }
    let mut assignments: Vec<(usize, u32)> = Vec::with_capacity(b.nodes.len());
    for (_, mut members) in lane_nodes {
        members.sort_by_key(|&i| (b.nodes[i].rank.global, i));
        for (pos, &i) in members.iter().enumerate() {
            assignments.push((i, pos as u32 + 1));
        }
    }
    for (i, lane_rank) in assignments {
        b.nodes[i].rank.lane = lane_rank;
    }
}
