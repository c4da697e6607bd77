//! Input document model for the structured flow format (SFF).
//!
//! An `.sff` file is a JSON mapping with five top-level blocks: `sff`
//! (flow-wide settings), `entry` (start/end designations), `lanes`,
//! `nodes` and the ordered `edges` sequence.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Flow direction: top-to-bottom or left-to-right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Direction {
    #[default]
    #[serde(rename = "TB")]
    Tb,
    #[serde(rename = "LR")]
    Lr,
}

impl Direction {
    pub fn is_tb(self) -> bool {
        matches!(self, Direction::Tb)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Tb => "TB",
            Direction::Lr => "LR",
        }
    }
}

/// Node kind. The runtime string form (`start`, `end`, ...) appears only at
/// the serialization boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Start,
    End,
    Process,
    Decision,
    Delay,
}

impl NodeKind {
    pub fn is_decision(self) -> bool {
        matches!(self, NodeKind::Decision)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SffDocument {
    pub sff: SffHeader,
    pub entry: Entry,
    pub lanes: BTreeMap<String, LaneDecl>,
    pub nodes: BTreeMap<String, NodeDecl>,
    pub edges: Vec<EdgeDecl>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SffHeader {
    #[serde(default)]
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub start: String,
    #[serde(default)]
    pub ends: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LaneDecl {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub order: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracks_total: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub center_track: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expansion_factor: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDecl {
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub lane: String,
    #[serde(default)]
    pub label: String,
    /// Decision nodes declare their boolean branches here; the matching
    /// edges must also exist in the `edges` sequence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branches: Option<BTreeMap<String, BranchDecl>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchDecl {
    pub next: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeDecl {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}
