//! Phase 2: adjacency build.
//!
//! Walks the edges once, populating per-node link tables and the global
//! prev/next index. Every adjacency list is deduplicated and sorted by
//! identifier before the later phases run.

use super::Builder;

pub(super) fn build(b: &mut Builder) {
    for (edge_idx, edge) in b.edges.iter().enumerate() {
        let src = b.node_index.get(&edge.from).copied();
        let dst = b.node_index.get(&edge.to).copied();

        if let Some(si) = src {
            b.out_edges[si].push(edge_idx);
            if let Some(di) = dst {
                b.next[si].push(di);
            }
        }
        if let Some(di) = dst {
            b.in_edges[di].push(edge_idx);
            if let Some(si) = src {
                b.prev[di].push(si);
            }
        }
    }

    // Nodes are stored in sorted-id order, so sorting indices ascending is
    // the lexicographic order the IR promises.
    for list in b.next.iter_mut().chain(b.prev.iter_mut()) {
        list.sort_unstable();
        list.dedup();
    }
    let edges = &b.edges;
    for list in b.out_edges.iter_mut().chain(b.in_edges.iter_mut()) {
        list.sort_by(|&a, &c| edges[a].id.cmp(&edges[c].id));
        list.dedup_by(|a, c| edges[*a].id == edges[*c].id);
    }

    for i in 0..b.nodes.len() {
        let prev_nodes: Vec<String> = b.prev[i].iter().map(|&j| b.nodes[j].id.clone()).collect();
        let next_nodes: Vec<String> = b.next[i].iter().map(|&j| b.nodes[j].id.clone()).collect();
        let in_edges: Vec<String> = b.in_edges[i].iter().map(|&j| b.edges[j].id.clone()).collect();
        let out_edges: Vec<String> = b.out_edges[i].iter().map(|&j| b.edges[j].id.clone()).collect();

        let node = &mut b.nodes[i];
        node.links.prev_nodes = prev_nodes;
        node.links.next_nodes = next_nodes;
        node.in_degree = in_edges.len();
        node.out_degree = out_edges.len();
        node.links.in_edges = in_edges;
        node.links.out_edges = out_edges;
    }
}
