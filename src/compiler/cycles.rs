//! Phase 4: cycle detection.
//!
//! Tarjan's SCC algorithm over the successor adjacency, converted to an
//! explicit stack so deep flows cannot overflow the call stack. SCCs of size
//! greater than one are structural cycles; each gets a deterministic
//! `cycle_id` (ordered by minimum member id), a nesting level derived from
//! the condensation DAG, a root and its exit nodes. A cycle with no edge
//! leaving its SCC is a compile error.

use std::collections::BTreeSet;

use super::{Builder, CompileError};

const UNVISITED: usize = usize::MAX;

pub(super) fn detect(b: &mut Builder) -> Result<(), CompileError> {
    if b.nodes.is_empty() {
        return Ok(());
    }

    let sccs = tarjan(&b.next);

    let mut node_scc = vec![0usize; b.nodes.len()];
    for (scc_idx, comp) in sccs.iter().enumerate() {
        for &i in comp {
            node_scc[i] = scc_idx;
        }
    }

    let cyclic: Vec<usize> = (0..sccs.len()).filter(|&i| sccs[i].len() > 1).collect();
    if cyclic.is_empty() {
        return Ok(());
    }

    // Condensation edges between distinct SCCs.
    let mut scc_preds: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); sccs.len()];
    for (i, nexts) in b.next.iter().enumerate() {
        for &j in nexts {
            if node_scc[i] != node_scc[j] {
                scc_preds[node_scc[j]].insert(node_scc[i]);
            }
        }
    }

    for &scc_idx in &cyclic {
        let has_exit = sccs[scc_idx]
            .iter()
            .any(|&i| b.next[i].iter().any(|&j| node_scc[j] != scc_idx));
        if !has_exit {
            return Err(CompileError::CycleWithoutExit);
        }
    }

    // cycle_1, cycle_2, ... ordered by minimum member id. Node indices are
    // in sorted-id order, so the minimum index is the minimum id.
    let mut cyclic_sorted = cyclic.clone();
    cyclic_sorted.sort_by_key(|&scc_idx| sccs[scc_idx].iter().min().copied());
    let is_cyclic = |scc_idx: usize| sccs[scc_idx].len() > 1;

    // Nesting level: longest chain of cyclic SCCs reaching each one. Tarjan
    // emits SCCs in reverse topological order, so walking the list backwards
    // visits predecessors before successors.
    let mut level = vec![0u32; sccs.len()];
    for scc_idx in (0..sccs.len()).rev() {
        if !is_cyclic(scc_idx) {
            continue;
        }
        let best = scc_preds[scc_idx]
            .iter()
            .filter(|&&p| is_cyclic(p))
            .map(|&p| level[p])
            .max()
            .unwrap_or(0);
        level[scc_idx] = best + 1;
    }

    for (order, &scc_idx) in cyclic_sorted.iter().enumerate() {
        let cycle_id = format!("cycle_{}", order + 1);
        let cycle_level = level[scc_idx];

        let root = sccs[scc_idx]
            .iter()
            .min_by_key(|&&i| (b.nodes[i].rank.global, i))
            .copied()
            .unwrap_or(sccs[scc_idx][0]);
        let root_id = b.nodes[root].id.clone();

        let mut exits: Vec<usize> = sccs[scc_idx]
            .iter()
            .filter(|&&i| b.next[i].iter().any(|&j| node_scc[j] != scc_idx))
            .copied()
            .collect();
        exits.sort_unstable();
        let exit_ids: Vec<String> = exits.iter().map(|&i| b.nodes[i].id.clone()).collect();

        for &i in &sccs[scc_idx] {
            let node = &mut b.nodes[i];
            node.rank.cycle_depth = cycle_level;
            node.cycle_context.cycle_id = cycle_id.clone();
            node.cycle_context.cycle_level = cycle_level;
            node.cycle_context.cycle_root = root_id.clone();
            node.cycle_context.cycle_exit_nodes = exit_ids.clone();
        }
    }

    Ok(())
}

/// Iterative Tarjan over an index-based adjacency. Returns SCCs in reverse
/// topological order of the condensation.
fn tarjan(next: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let n = next.len();
    let mut index_of = vec![UNVISITED; n];
    let mut lowlink = vec![0usize; n];
    let mut on_stack = vec![false; n];
    let mut stack: Vec<usize> = Vec::new();
    let mut sccs: Vec<Vec<usize>> = Vec::new();
    let mut counter = 0usize;

    // (node, next child offset)
    let mut frames: Vec<(usize, usize)> = Vec::new();

    for root in 0..n {
        if index_of[root] != UNVISITED {
            continue;
        }
        frames.push((root, 0));

        while let Some(&(v, child)) = frames.last() {
            if child == 0 {
                index_of[v] = counter;
                lowlink[v] = counter;
                counter += 1;
                stack.push(v);
                on_stack[v] = true;
            }

            if child < next[v].len() {
                let w = next[v][child];
                if let Some(frame) = frames.last_mut() {
                    frame.1 += 1;
                }
                if index_of[w] == UNVISITED {
                    frames.push((w, 0));
                } else if on_stack[w] {
                    lowlink[v] = lowlink[v].min(index_of[w]);
                }
            } else {
                frames.pop();
                if let Some(&(parent, _)) = frames.last() {
                    lowlink[parent] = lowlink[parent].min(lowlink[v]);
                }
                if lowlink[v] == index_of[v] {
                    let mut comp = Vec::new();
                    loop {
                        let w = stack.pop().expect("tarjan stack underflow");
                        on_stack[w] = false;
                        comp.push(w);
                        if w == v {
                            break;
                        }
                    }
                    sccs.push(comp);
                }
            }
        }
    }

    sccs
}
