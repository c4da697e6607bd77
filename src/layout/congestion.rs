//! Global congestion detection (TUR / RED / BS).
//!
//! Sits between the layout engine and the router: projects lane utilization
//! before any edge is routed, monitors the three saturation metrics after
//! each placement, and decides when a symmetric global expansion is needed.
//! Thresholds are conservative so small flows never trigger it.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::ir::{CompiledFlow, Edge, EdgeKind};
use crate::sff::Direction;

use super::tracks::{Orientation, TrackSystem};
use super::LayoutError;

pub const TUR_CRITICAL: f64 = 0.85;
pub const RED_CRITICAL: f64 = 0.04;
pub const BS_CRITICAL: f64 = 0.75;

/// Edges one track can safely carry in the pre-routing projection.
pub const EDGES_PER_TRACK_SAFE: usize = 4;

pub const MAX_GLOBAL_EXPANSIONS: u32 = 3;

pub struct CongestionManager {
    pub max_global_expansions: u32,
    pub global_expansion_count: u32,
    congested: bool,
    /// (lane id, rank.global) -> routed edge count.
    edges_per_rank: HashMap<(String, u32), usize>,
}

impl Default for CongestionManager {
    fn default() -> Self {
        Self {
            max_global_expansions: MAX_GLOBAL_EXPANSIONS,
            global_expansion_count: 0,
            congested: false,
            edges_per_rank: HashMap::new(),
        }
    }
}

impl CongestionManager {
    pub fn new(max_global_expansions: u32) -> Self {
        Self {
            max_global_expansions,
            ..Self::default()
        }
    }

    pub fn is_congested(&self) -> bool {
        self.congested
    }

    /// Clear the per-attempt state before a routing pass.
    pub fn reset_runtime_state(&mut self) {
        self.congested = false;
        self.edges_per_rank.clear();
    }

    /// Project lane occupancy from edge counts alone. Returns true when any
    /// lane's projected utilization crosses the critical threshold and an
    /// initial global expansion should run before routing.
    pub fn analyze_prerouting(&self, flow: &CompiledFlow) -> bool {
        for (lane_id, lane) in &flow.lanes {
            let edges_in_lane = flow
                .edges
                .values()
                .filter(|e| {
                    let src_lane = flow.nodes.get(&e.from).map(|n| n.lane.as_str());
                    let dst_lane = flow.nodes.get(&e.to).map(|n| n.lane.as_str());
                    src_lane == Some(lane_id.as_str()) || dst_lane == Some(lane_id.as_str())
                })
                .count();
            let safe_capacity =
                (lane.tracks_total as usize * EDGES_PER_TRACK_SAFE).max(1) as f64;
            let projected = edges_in_lane as f64 / safe_capacity;
            if projected > TUR_CRITICAL {
                debug!(
                    target: "rustflow::layout",
                    "lane {} projects TUR {:.2} over {} tracks",
                    lane_id, projected, lane.tracks_total
                );
                return true;
            }
        }
        false
    }

    /// Recompute TUR, RED and BS on the routed edge's source lane. Raises
    /// `CONGESTION_DETECTED` when any metric crosses its critical threshold.
    pub fn update_after_edge(
        &mut self,
        tracks: &TrackSystem,
        flow: &CompiledFlow,
        edge: &Edge,
        lane_width: f64,
        direction: Direction,
    ) -> Result<(), LayoutError> {
        let Some(src_node) = flow.nodes.get(&edge.from) else {
            return Ok(());
        };
        let Some(lane_idx) = tracks.lane_index(&src_node.lane) else {
            return Ok(());
        };
        let lane = tracks.lane(lane_idx);
        let tracks_total = lane.tracks_total.max(1) as f64;

        let tur = lane.used_tracks() as f64 / tracks_total;

        let rank = src_node.rank.global;
        let key = (src_node.lane.clone(), rank);
        let count = self.edges_per_rank.entry(key).or_insert(0);
        *count += 1;
        let red = *count as f64 / lane_width.max(1.0);

        let mut bs = 0.0;
        if edge.classification.kind == EdgeKind::MainPath {
            let orientation = match direction {
                Direction::Tb => Orientation::Horizontal,
                Direction::Lr => Orientation::Vertical,
            };
            let backbone_tracks = lane.tracks_of_edge(&edge.id, orientation);
            if !backbone_tracks.is_empty() {
                bs = backbone_tracks.len() as f64 / tracks_total;
            }
        }

        if tur > TUR_CRITICAL || red > RED_CRITICAL || bs > BS_CRITICAL {
            self.congested = true;
            warn!(
                target: "rustflow::layout",
                "congestion threshold crossed on lane {}: TUR={:.2}, RED={:.4}, BS={:.2}",
                src_node.lane, tur, red, bs
            );
            return Err(LayoutError::CongestionDetected { tur, red, bs });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile_document;
    use crate::ir::CompiledFlow;

    fn wide_flow(branches: usize) -> CompiledFlow {
        // A start fanning out to `branches` parallel processes, all joining
        // one end node, in a single lane.
        let mut nodes = String::new();
        let mut edges = String::new();
        let mut ends = String::new();
        nodes.push_str(r#""s": {"type": "start", "lane": "L1", "label": "Start"},"#);
        for i in 0..branches {
            nodes.push_str(&format!(
                r#""p{:02}": {{"type": "process", "lane": "L1", "label": "P{}"}},"#,
                i, i
            ));
            edges.push_str(&format!(r#"{{"from": "s", "to": "p{:02}"}},"#, i));
            edges.push_str(&format!(r#"{{"from": "p{:02}", "to": "e"}},"#, i));
        }
        nodes.push_str(r#""e": {"type": "end", "lane": "L1", "label": "End"}"#);
        ends.push_str(r#""e""#);
        let input = format!(
            r#"{{
                "sff": {{"direction": "TB"}},
                "entry": {{"start": "s", "ends": [{}]}},
                "lanes": {{"L1": {{"title": "Main", "order": 1}}}},
                "nodes": {{{}}},
                "edges": [{}]
            }}"#,
            ends,
            nodes,
            edges.trim_end_matches(','),
        );
        compile_document(serde_json::from_str(&input).unwrap()).unwrap()
    }

    #[test]
    fn test_small_flow_projects_clean() {
        let flow = wide_flow(3);
        let manager = CongestionManager::default();
        assert!(!manager.analyze_prerouting(&flow));
    }

    #[test]
    fn test_saturated_lane_projects_expansion() {
        // 13 tracks * 4 safe edges = 52; every edge touches L1, so 60 edges
        // push the projection over 0.85.
        let flow = wide_flow(30);
        let manager = CongestionManager::default();
        assert!(manager.analyze_prerouting(&flow));
    }

    #[test]
    fn test_update_detects_track_saturation() {
        let flow = wide_flow(3);
        let mut manager = CongestionManager::default();
        let mut tracks = TrackSystem::new(&flow.lanes);
        let lane = tracks.lane_index("L1").unwrap();
        // Touch 12 of 13 tracks: TUR over 0.85.
        for t in 1..=12 {
            tracks.occupy_h_segment(lane, t, 0.0, 10.0, "seed");
        }
        let edge = flow.edges.values().next().unwrap();
        let err = manager
            .update_after_edge(&tracks, &flow, edge, 300.0, Direction::Tb)
            .unwrap_err();
        assert!(err.to_string().starts_with("CONGESTION_DETECTED"));
        assert!(manager.is_congested());
    }

    #[test]
    fn test_reset_clears_state() {
        let flow = wide_flow(3);
        let mut manager = CongestionManager::default();
        let mut tracks = TrackSystem::new(&flow.lanes);
        let lane = tracks.lane_index("L1").unwrap();
        for t in 1..=12 {
            tracks.occupy_h_segment(lane, t, 0.0, 10.0, "seed");
        }
        let edge = flow.edges.values().next().unwrap();
        let _ = manager.update_after_edge(&tracks, &flow, edge, 300.0, Direction::Tb);
        manager.reset_runtime_state();
        assert!(!manager.is_congested());
    }
}
