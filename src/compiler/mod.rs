//! Flow compiler: expands a validated SFF document into the enriched IR.
//!
//! The compilation is a single deterministic pass made of eight phases, in
//! order: base parse, graph build, ranks, cycle detection, main path, edge
//! classification, future metrics, stats & normalization. All tie-breaks are
//! explicit (lexicographic node/edge ids), so compiling the same document
//! twice yields byte-identical output.

mod classify;
mod cycles;
mod future;
mod graph;
mod main_path;
mod ranks;
mod stats;

use std::collections::{BTreeMap, HashMap};

use tracing::info;

use crate::ir::{
    BranchContext, Classification, CompiledFlow, Cpff, CycleContext, Edge, FutureMetrics,
    GraphIndex, Lane, LayoutContext, LayoutHints, Links, Node, Rank, RoutingConstraints,
    RoutingHints, Stats, CPFF_VERSION, DEFAULT_EXPANSION_FACTOR, DEFAULT_TRACKS_TOTAL,
    DEFAULT_TRACK_GAP,
};
use crate::sff::{Direction, SffDocument};
use crate::validator::{validate_logic, validate_structure};

#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("SFF_STRUCTURAL_ERROR: {}", .0.join("; "))]
    Structural(Vec<String>),
    #[error("SFF_LOGIC_ERROR: {}", .0.join("; "))]
    Logic(Vec<String>),
    #[error("SELF_LOOP_NOT_SUPPORTED_V1: edge '{0}'")]
    SelfLoop(String),
    #[error("CYCLE_WITHOUT_EXIT")]
    CycleWithoutExit,
}

/// Compile a raw JSON mapping: structural validation, typing, logic
/// validation, then the eight compiler phases.
pub fn compile_value(value: &serde_json::Value) -> Result<CompiledFlow, CompileError> {
    let errors = validate_structure(value);
    if !errors.is_empty() {
        return Err(CompileError::Structural(errors));
    }
    let doc: SffDocument = serde_json::from_value(value.clone())
        .map_err(|e| CompileError::Structural(vec![e.to_string()]))?;
    compile_document(doc)
}

/// Compile an already-typed document.
pub fn compile_document(doc: SffDocument) -> Result<CompiledFlow, CompileError> {
    let errors = validate_logic(&doc);
    if !errors.is_empty() {
        return Err(CompileError::Logic(errors));
    }

    let mut builder = Builder::new(doc);
    graph::build(&mut builder);
    ranks::assign(&mut builder);
    cycles::detect(&mut builder)?;
    main_path::walk(&mut builder);
    classify::run(&mut builder)?;
    future::compute(&mut builder);
    stats::finalize(&mut builder);

    let flow = builder.finish();
    let s = &flow.cpff.stats;
    info!(
        target: "rustflow::compiler",
        "compiled flow: N={}, E={}, L={}, decisions={}, branches={}, joins={}, cycles={}, \
         max_depth={}, max_branch_depth={}, B_max={}, T_max={}",
        s.nodes_total,
        s.edges_total,
        s.lanes_total,
        s.decision_nodes,
        s.branch_edges,
        s.joins,
        s.cycles_total,
        s.max_depth,
        s.max_branch_depth,
        s.max_branches_per_rank,
        s.max_tracks_per_lane,
    );

    Ok(flow)
}

/// Working state shared by the compiler phases. Nodes live in a dense vector
/// sorted by id; edges in declaration order. Adjacency is index-based, so
/// ascending node-index order doubles as lexicographic id order.
pub(crate) struct Builder {
    pub(crate) source: SffDocument,
    pub(crate) direction: Direction,
    pub(crate) entry: Option<usize>,

    pub(crate) lanes: BTreeMap<String, Lane>,
    pub(crate) nodes: Vec<Node>,
    pub(crate) node_index: HashMap<String, usize>,
    pub(crate) edges: Vec<Edge>,

    /// Successor / predecessor node indices, ascending and duplicate-free.
    pub(crate) next: Vec<Vec<usize>>,
    pub(crate) prev: Vec<Vec<usize>>,
    /// Outgoing / incoming edge indices, sorted by edge id.
    pub(crate) out_edges: Vec<Vec<usize>>,
    pub(crate) in_edges: Vec<Vec<usize>>,

    pub(crate) main_path_nodes: Vec<bool>,
    pub(crate) main_path_edges: Vec<bool>,
    pub(crate) max_depth: u32,
    pub(crate) stats: Stats,
}

impl Builder {
    /// Phase 1: base parse. Lanes get their defaults, nodes their zeroed
    /// metadata blocks, edges their stable ids in declaration order.
    fn new(doc: SffDocument) -> Self {
        let mut lanes = BTreeMap::new();
        for (lane_id, decl) in &doc.lanes {
            let tracks_total = decl.tracks_total.unwrap_or(DEFAULT_TRACKS_TOTAL);
            lanes.insert(
                lane_id.clone(),
                Lane {
                    title: decl.title.clone(),
                    order: decl.order,
                    tracks_total,
                    center_track: decl.center_track.unwrap_or(tracks_total.div_ceil(2)),
                    track_gap: DEFAULT_TRACK_GAP,
                    expansion_factor: decl.expansion_factor.unwrap_or(DEFAULT_EXPANSION_FACTOR),
                },
            );
        }

        let mut nodes = Vec::with_capacity(doc.nodes.len());
        let mut node_index = HashMap::with_capacity(doc.nodes.len());
        for (node_id, decl) in &doc.nodes {
            node_index.insert(node_id.clone(), nodes.len());
            nodes.push(Node {
                id: node_id.clone(),
                kind: decl.kind,
                lane: decl.lane.clone(),
                label: decl.label.clone(),
                rank: Rank::default(),
                links: Links::default(),
                branch_context: BranchContext::default(),
                future_metrics: FutureMetrics::default(),
                cycle_context: CycleContext::default(),
                layout_hints: LayoutHints::default(),
                in_degree: 0,
                out_degree: 0,
            });
        }

        let edges: Vec<Edge> = doc
            .edges
            .iter()
            .enumerate()
            .map(|(i, decl)| Edge {
                id: decl
                    .id
                    .clone()
                    .unwrap_or_else(|| format!("e{}", i + 1)),
                from: decl.from.clone(),
                to: decl.to.clone(),
                branch: decl.branch.clone(),
                label: decl.label.clone(),
                classification: Classification::default(),
                priority: 0,
                routing_constraints: RoutingConstraints::default(),
                routing_hints: RoutingHints::default(),
            })
            .collect();

        let n = nodes.len();
        let e = edges.len();
        let entry = node_index.get(&doc.entry.start).copied();
        let direction = doc.sff.direction;

        Self {
            source: doc,
            direction,
            entry,
            lanes,
            nodes,
            node_index,
            edges,
            next: vec![Vec::new(); n],
            prev: vec![Vec::new(); n],
            out_edges: vec![Vec::new(); n],
            in_edges: vec![Vec::new(); n],
            main_path_nodes: vec![false; n],
            main_path_edges: vec![false; e],
            max_depth: 0,
            stats: Stats::default(),
        }
    }

    /// Assemble the final compiled document.
    fn finish(self) -> CompiledFlow {
        let mut graph = GraphIndex::default();
        for (i, node) in self.nodes.iter().enumerate() {
            graph.prev.insert(
                node.id.clone(),
                self.prev[i].iter().map(|&j| self.nodes[j].id.clone()).collect(),
            );
            graph.next.insert(
                node.id.clone(),
                self.next[i].iter().map(|&j| self.nodes[j].id.clone()).collect(),
            );
        }

        let cpff = Cpff {
            version: CPFF_VERSION.to_string(),
            stats: self.stats,
            graph,
            layout_context: LayoutContext {
                direction: self.direction,
            },
            subflows: BTreeMap::new(),
        };

        CompiledFlow {
            sff_source: self.source,
            cpff,
            lanes: self.lanes,
            nodes: self.nodes.iter().map(|n| (n.id.clone(), n.clone())).collect(),
            edges: self.edges.iter().map(|e| (e.id.clone(), e.clone())).collect(),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testutil::{compile, CROSS_LANE, LINEAR, LOOPED};
    use super::*;
    use crate::ir::EdgeKind;

    #[test]
    fn test_linear_flow_ranks_and_main_path() {
        let flow = compile(LINEAR).unwrap();
        assert_eq!(flow.nodes["s"].rank.global, 1);
        assert_eq!(flow.nodes["p"].rank.global, 2);
        assert_eq!(flow.nodes["e"].rank.global, 3);
        assert_eq!(flow.cpff.stats.max_depth, 3);
        assert_eq!(flow.cpff.stats.cycles_total, 0);
        for edge in flow.edges.values() {
            assert_eq!(edge.classification.kind, EdgeKind::MainPath);
            assert_eq!(edge.priority, 100);
        }
        assert!(flow.nodes.values().all(|n| n.layout_hints.is_main_path));
    }

    #[test]
    fn test_default_edge_ids_in_declaration_order() {
        let flow = compile(LINEAR).unwrap();
        assert!(flow.edges.contains_key("e1"));
        assert!(flow.edges.contains_key("e2"));
        assert_eq!(flow.edges["e1"].from, "s");
        assert_eq!(flow.edges["e2"].to, "e");
    }

    #[test]
    fn test_lane_defaults() {
        let flow = compile(LINEAR).unwrap();
        let lane = &flow.lanes["L1"];
        assert_eq!(lane.tracks_total, 13);
        assert_eq!(lane.center_track, 7);
        assert_eq!(lane.track_gap, 20.0);
        assert_eq!(lane.expansion_factor, 1.2);
    }

    #[test]
    fn test_looped_flow_return_edge_and_cycle() {
        let flow = compile(LOOPED).unwrap();
        let back = flow
            .edges
            .values()
            .find(|e| e.from == "d" && e.to == "p")
            .unwrap();
        assert_eq!(back.classification.kind, EdgeKind::Return);
        assert!(back.classification.is_return);
        assert_eq!(back.priority, 40);

        assert_eq!(flow.cpff.stats.cycles_total, 1);
        assert_eq!(flow.nodes["p"].cycle_context.cycle_id, "cycle_1");
        assert_eq!(flow.nodes["d"].cycle_context.cycle_id, "cycle_1");
        assert_eq!(flow.nodes["p"].cycle_context.cycle_level, 1);
        assert_eq!(flow.nodes["e"].cycle_context.cycle_id, "");
    }

    #[test]
    fn test_cross_lane_classification() {
        let flow = compile(CROSS_LANE).unwrap();
        let handoff = flow
            .edges
            .values()
            .find(|e| e.from == "p1" && e.to == "p2")
            .unwrap();
        // The hand-off sits on the main path, which beats cross_lane in the
        // cascade.
        assert_eq!(handoff.classification.kind, EdgeKind::MainPath);

        let flow = compile(
            &CROSS_LANE.replace(
                r#"{"from": "p1", "to": "p2"}"#,
                r#"{"from": "p1", "to": "e"}, {"from": "p1", "to": "p2"}"#,
            ),
        )
        .unwrap();
        let handoff = flow
            .edges
            .values()
            .find(|e| e.from == "p1" && e.to == "p2")
            .unwrap();
        assert_eq!(handoff.classification.kind, EdgeKind::CrossLane);
        assert!(handoff.classification.is_cross_lane);
        assert_eq!(handoff.priority, 60);
    }

    #[test]
    fn test_self_loop_rejected() {
        let input = LINEAR.replace(
            r#"{"from": "p", "to": "e"}"#,
            r#"{"from": "p", "to": "p"}, {"from": "p", "to": "e"}"#,
        );
        let err = compile(&input).unwrap_err();
        assert!(matches!(err, CompileError::SelfLoop(_)));
        assert!(err.to_string().starts_with("SELF_LOOP_NOT_SUPPORTED_V1"));
    }

    #[test]
    fn test_structural_error_from_value() {
        let value = serde_json::json!({"sff": {"direction": "TB"}});
        let err = compile_value(&value).unwrap_err();
        assert!(err.to_string().starts_with("SFF_STRUCTURAL_ERROR"));
    }

    #[test]
    fn test_logic_error_reported() {
        let input = LINEAR.replace(r#""ends": ["e"]"#, r#""ends": []"#);
        let err = compile(&input).unwrap_err();
        assert!(err.to_string().starts_with("SFF_LOGIC_ERROR"));
    }

    #[test]
    fn test_compile_is_byte_identical() {
        let a = compile(LOOPED).unwrap().to_pretty_json();
        let b = compile(LOOPED).unwrap().to_pretty_json();
        assert_eq!(a, b);
    }

    #[test]
    fn test_recompile_from_source_reproduces_ir() {
        let first = compile(CROSS_LANE).unwrap();
        let second = compile_document(first.sff_source.clone()).unwrap();
        assert_eq!(first.to_pretty_json(), second.to_pretty_json());
    }

    #[test]
    fn test_stats_totals() {
        let flow = compile(LOOPED).unwrap();
        let s = &flow.cpff.stats;
        assert_eq!(s.nodes_total, flow.nodes.len());
        assert_eq!(s.edges_total, flow.edges.len());
        assert_eq!(s.lanes_total, 1);
        assert_eq!(s.decision_nodes, 1);
        assert_eq!(s.max_tracks_per_lane, 13);
    }

    #[test]
    fn test_links_sorted_unique() {
        let flow = compile(LOOPED).unwrap();
        for node in flow.nodes.values() {
            for list in [
                &node.links.prev_nodes,
                &node.links.next_nodes,
                &node.links.in_edges,
                &node.links.out_edges,
            ] {
                let mut sorted = list.clone();
                sorted.sort();
                sorted.dedup();
                assert_eq!(*list, sorted, "links of {} not sorted-unique", node.id);
            }
        }
    }
}
