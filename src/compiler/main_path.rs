//! Phase 5: main-path identification.
//!
//! A single deterministic walk from the entry node until a node repeats or
//! has no outgoing edges. Decisions follow their affirmative branch
//! (`true`/`yes`/`sim`, case-insensitive), then any labelled branch, then the
//! first edge by id; other nodes prefer the first unlabelled edge.

use super::Builder;

const TRUE_LABELS: [&str; 3] = ["true", "yes", "sim"];

pub(super) fn walk(b: &mut Builder) {
    let Some(entry) = b.entry else {
        return;
    };

    let mut visited = vec![false; b.nodes.len()];
    let mut curr = entry;

    while !visited[curr] {
        visited[curr] = true;
        b.main_path_nodes[curr] = true;

        // out_edges is already sorted by edge id.
        let candidates = &b.out_edges[curr];
        if candidates.is_empty() {
            break;
        }

        let chosen = if b.nodes[curr].kind.is_decision() {
            pick_decision_edge(b, candidates)
        } else {
            pick_linear_edge(b, candidates)
        };

        b.main_path_edges[chosen] = true;
        match b.node_index.get(&b.edges[chosen].to) {
            Some(&next) => curr = next,
            None => break,
        }
    }
}

fn pick_decision_edge(b: &Builder, candidates: &[usize]) -> usize {
    let affirmative = candidates.iter().copied().find(|&i| {
        b.edges[i]
            .branch
            .as_deref()
            .is_some_and(|label| TRUE_LABELS.contains(&label.to_lowercase().as_str()))
    });
    if let Some(edge) = affirmative {
        return edge;
    }
    candidates
        .iter()
        .copied()
        .find(|&i| b.edges[i].branch.is_some())
        .unwrap_or(candidates[0])
}

fn pick_linear_edge(b: &Builder, candidates: &[usize]) -> usize {
    candidates
        .iter()
        .copied()
        .find(|&i| b.edges[i].branch.is_none())
        .unwrap_or(candidates[0])
}
