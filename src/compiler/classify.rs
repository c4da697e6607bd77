//! Phase 6: edge classification and node layout hints.
//!
//! The cascade is a fixed priority order; the first matching rule wins:
//! return (40), join (30), main path (100), branch (80), cross-lane (60),
//! then main path again as the fallback.

use crate::ir::{EdgeKind, Side};
use crate::sff::Direction;

use super::{Builder, CompileError};

pub(super) fn run(b: &mut Builder) -> Result<(), CompileError> {
    for edge_idx in 0..b.edges.len() {
        let (from, to) = {
            let edge = &b.edges[edge_idx];
            (edge.from.clone(), edge.to.clone())
        };

        if from == to {
            return Err(CompileError::SelfLoop(b.edges[edge_idx].id.clone()));
        }

        let (Some(&src), Some(&dst)) = (b.node_index.get(&from), b.node_index.get(&to)) else {
            continue;
        };

        let src_rank = b.nodes[src].rank.global;
        let dst_rank = b.nodes[dst].rank.global;
        let same_lane = b.nodes[src].lane == b.nodes[dst].lane;
        let dst_in_degree = b.in_edges[dst].len();
        let on_main_path = b.main_path_edges[edge_idx];
        let src_lane = b.nodes[src].lane.clone();

        let edge = &mut b.edges[edge_idx];
        let (kind, priority) = if dst_rank <= src_rank {
            edge.classification.is_return = true;
            if !same_lane {
                edge.classification.is_cross_lane = true;
            }
            (EdgeKind::Return, 40)
        } else if dst_in_degree > 1 {
            edge.classification.is_join = true;
            (EdgeKind::Join, 30)
        } else if on_main_path {
            (EdgeKind::MainPath, 100)
        } else if edge.branch.is_some() {
            (EdgeKind::Branch, 80)
        } else if !same_lane {
            edge.classification.is_cross_lane = true;
            (EdgeKind::CrossLane, 60)
        } else {
            (EdgeKind::MainPath, 100)
        };

        edge.classification.kind = kind;
        edge.priority = priority;
        edge.routing_hints.backbone_lane = src_lane;
    }

    let (entry_side, exit_side) = match b.direction {
        Direction::Tb => (Side::Top, Side::Bottom),
        Direction::Lr => (Side::Left, Side::Right),
    };
    for (i, node) in b.nodes.iter_mut().enumerate() {
        let is_main = b.main_path_nodes[i];
        node.layout_hints.is_main_path = is_main;
        node.layout_hints.routing_priority = if is_main { 100 } else { 60 };
        node.layout_hints.preferred_entry_side = entry_side;
        node.layout_hints.preferred_exit_side = exit_side;
    }

    Ok(())
}
