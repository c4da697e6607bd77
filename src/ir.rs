//! Enriched intermediate representation (the `cpff`).
//!
//! The compiler expands a validated SFF document into this fully populated,
//! deterministic form: every node carries its rank block, link tables, branch
//! and cycle context, future metrics and layout hints; every edge carries its
//! classification, priority and routing hints. All maps are `BTreeMap` so the
//! serialized output is byte-identical for a fixed input.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::sff::{Direction, NodeKind, SffDocument};

pub const CPFF_VERSION: &str = "1.0";

pub const DEFAULT_TRACKS_TOTAL: u32 = 13;
pub const DEFAULT_TRACK_GAP: f64 = 20.0;
pub const DEFAULT_EXPANSION_FACTOR: f64 = 1.2;

/// Side of a node box an edge prefers to attach to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    #[default]
    Top,
    Bottom,
    Left,
    Right,
}

/// Edge classification kinds, in routing-group order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    MainPath,
    Branch,
    CrossLane,
    Return,
    Join,
}

impl EdgeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EdgeKind::MainPath => "main_path",
            EdgeKind::Branch => "branch",
            EdgeKind::CrossLane => "cross_lane",
            EdgeKind::Return => "return",
            EdgeKind::Join => "join",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lane {
    pub title: String,
    pub order: i64,
    pub tracks_total: u32,
    pub center_track: u32,
    pub track_gap: f64,
    pub expansion_factor: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Rank {
    pub global: u32,
    pub lane: u32,
    pub depth: u32,
    pub branch_depth: u32,
    pub cycle_depth: u32,
}

/// Adjacency tables of one node; each list is sorted and duplicate-free.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Links {
    pub prev_nodes: Vec<String>,
    pub next_nodes: Vec<String>,
    pub in_edges: Vec<String>,
    pub out_edges: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BranchContext {
    pub root_decision: String,
    pub branch_label: String,
    pub terminates_soon: bool,
}

impl BranchContext {
    pub fn is_empty(&self) -> bool {
        self.root_decision.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CycleContext {
    pub cycle_id: String,
    pub cycle_level: u32,
    pub cycle_root: String,
    pub cycle_exit_nodes: Vec<String>,
}

impl CycleContext {
    pub fn in_cycle(&self) -> bool {
        !self.cycle_id.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FutureMetrics {
    pub future_steps: usize,
    pub future_decisions: usize,
    pub cross_lane_ahead: usize,
    /// Predominant lane among targets one or two ranks ahead; empty when the
    /// lookahead window never leaves the node's own lane.
    pub next_lane_target: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LayoutHints {
    pub is_main_path: bool,
    pub routing_priority: u32,
    pub preferred_entry_side: Side,
    pub preferred_exit_side: Side,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub lane: String,
    pub label: String,
    pub rank: Rank,
    pub links: Links,
    pub branch_context: BranchContext,
    pub future_metrics: FutureMetrics,
    pub cycle_context: CycleContext,
    pub layout_hints: LayoutHints,
    pub in_degree: usize,
    pub out_degree: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub kind: EdgeKind,
    pub is_cross_lane: bool,
    pub is_return: bool,
    pub is_join: bool,
}

impl Default for Classification {
    fn default() -> Self {
        Self {
            kind: EdgeKind::MainPath,
            is_cross_lane: false,
            is_return: false,
            is_join: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingConstraints {
    pub no_overlap: bool,
    pub no_cross: bool,
    pub min_separation: f64,
}

impl Default for RoutingConstraints {
    fn default() -> Self {
        Self {
            no_overlap: true,
            no_cross: true,
            min_separation: DEFAULT_TRACK_GAP,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingHints {
    pub backbone_lane: String,
    pub last_mile: bool,
    pub preferred_channel: u32,
}

impl Default for RoutingHints {
    fn default() -> Self {
        Self {
            backbone_lane: String::new(),
            last_mile: true,
            preferred_channel: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub classification: Classification,
    pub priority: u32,
    pub routing_constraints: RoutingConstraints,
    pub routing_hints: RoutingHints,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Stats {
    pub nodes_total: usize,
    pub edges_total: usize,
    pub lanes_total: usize,
    pub decision_nodes: usize,
    pub branch_edges: usize,
    pub joins: usize,
    pub max_depth: u32,
    pub max_branch_depth: u32,
    pub cycles_total: usize,
    pub max_cycle_depth: u32,
    pub max_branches_per_rank: usize,
    pub max_tracks_per_lane: u32,
}

/// Global predecessor/successor index, sorted and duplicate-free.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct GraphIndex {
    pub prev: BTreeMap<String, Vec<String>>,
    pub next: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutContext {
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cpff {
    pub version: String,
    pub stats: Stats,
    pub graph: GraphIndex,
    pub layout_context: LayoutContext,
    /// Reserved; not written by v1.
    pub subflows: BTreeMap<String, serde_json::Value>,
}

/// The complete compiled document: verbatim source plus the enriched IR.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledFlow {
    pub sff_source: SffDocument,
    pub cpff: Cpff,
    pub lanes: BTreeMap<String, Lane>,
    pub nodes: BTreeMap<String, Node>,
    pub edges: BTreeMap<String, Edge>,
}

impl CompiledFlow {
    pub fn direction(&self) -> Direction {
        self.cpff.layout_context.direction
    }

    /// Stable JSON form: 2-space indent, sorted map keys, non-ASCII
    /// preserved, trailing newline. Compiling the same input twice must
    /// produce byte-identical output of this function.
    pub fn to_pretty_json(&self) -> String {
        let mut out = serde_json::to_string_pretty(self).expect("cpff serialization cannot fail");
        out.push('\n');
        out
    }
}
