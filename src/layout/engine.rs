//! Layout engine: drives lane geometry, node placement, edge routing and
//! congestion-driven retries into a finished geometric layout.

use std::collections::BTreeMap;
use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::ir::{CompiledFlow, EdgeKind, Lane};
use crate::sff::{Direction, NodeKind};

use super::congestion::{CongestionManager, MAX_GLOBAL_EXPANSIONS};
use super::debug::{write_debug_dumps, RoutingFailure};
use super::router::{OrthogonalRouter, RouteContext, BACKBONE_BASE_OFFSET, LOOP_SPACING};
use super::tracks::TrackSystem;
use super::types::{
    Complexity, LaneGeometry, Layout, LayoutEdge, LayoutNode, ENGINE_VERSION,
};
use super::LayoutError;

pub const DEFAULT_RANK_GAP: f64 = 100.0;
pub const DEFAULT_LANE_WIDTH: f64 = 300.0;

/// Extra rank gap added per expansion step from step 2 on.
const RANK_GAP_STEP: f64 = 40.0;

const PROCESS_SIZE: (f64, f64) = (180.0, 50.0);
const DECISION_SIZE: (f64, f64) = (60.0, 60.0);
const TERMINAL_SIZE: (f64, f64) = (40.0, 40.0);

pub struct LayoutEngine {
    pub rank_gap: f64,
    pub lane_width: f64,
    pub max_global_expansions: u32,
    /// When set, debug dumps are written here after a successful layout.
    pub dump_dir: Option<PathBuf>,
}

impl Default for LayoutEngine {
    fn default() -> Self {
        Self {
            rank_gap: DEFAULT_RANK_GAP,
            lane_width: DEFAULT_LANE_WIDTH,
            max_global_expansions: MAX_GLOBAL_EXPANSIONS,
            dump_dir: None,
        }
    }
}

impl LayoutEngine {
    /// Compute the geometric layout for a compiled flow.
    pub fn generate(&self, flow: &CompiledFlow) -> Result<Layout, LayoutError> {
        let direction = flow.direction();
        let mut congestion = CongestionManager::new(self.max_global_expansions);
        let mut working_lanes = flow.lanes.clone();
        let mut rank_gap = self.rank_gap;
        let mut failures: Vec<RoutingFailure> = Vec::new();

        if congestion.analyze_prerouting(flow)
            && congestion.global_expansion_count < congestion.max_global_expansions
        {
            congestion.global_expansion_count += 1;
            info!(
                target: "rustflow::layout",
                "pre-routing projection critical; initial expansion #{}",
                congestion.global_expansion_count
            );
            apply_global_expansion(
                &mut working_lanes,
                &mut rank_gap,
                self.rank_gap,
                congestion.global_expansion_count,
            );
        }

        loop {
            congestion.reset_runtime_state();
            let attempt = congestion.global_expansion_count;

            let mut tracks = TrackSystem::new(&working_lanes);
            let lanes = initialize_lanes(&working_lanes, self.lane_width, direction);
            let boxes = position_nodes(flow, &lanes, rank_gap, direction)?;
            let order = sort_edges(flow);

            let outer_extent = match direction {
                Direction::Tb => lanes.values().map(|l| l.end).fold(0.0, f64::max),
                Direction::Lr => lanes.values().map(|l| l.start).fold(0.0, f64::min),
            };
            let ctx = RouteContext {
                flow,
                boxes: &boxes,
                lanes: &lanes,
                outer_extent,
            };
            let mut router = OrthogonalRouter::new(flow, direction);

            let mut routed: BTreeMap<String, LayoutEdge> = BTreeMap::new();
            let mut attempt_error: Option<LayoutError> = None;

            for edge_id in &order {
                let edge = &flow.edges[edge_id];
                match router.route_edge(&mut tracks, &ctx, edge) {
                    Ok(points) => {
                        routed.insert(
                            edge_id.clone(),
                            LayoutEdge {
                                points,
                                kind: edge.classification.kind,
                            },
                        );
                        if let Err(err) = congestion.update_after_edge(
                            &tracks,
                            flow,
                            edge,
                            self.lane_width,
                            direction,
                        ) {
                            failures.push(RoutingFailure {
                                edge_id: edge_id.clone(),
                                reason: err.to_string(),
                                attempt,
                            });
                            attempt_error = Some(err);
                            break;
                        }
                    }
                    Err(err) if err.is_recoverable() => {
                        failures.push(RoutingFailure {
                            edge_id: edge_id.clone(),
                            reason: err.to_string(),
                            attempt,
                        });
                        attempt_error = Some(err);
                        break;
                    }
                    Err(err) => return Err(err),
                }
            }

            let Some(err) = attempt_error else {
                let layout = Layout {
                    engine_version: ENGINE_VERSION.to_string(),
                    direction,
                    nodes: boxes,
                    edges: routed,
                    lanes,
                    complexity: complexity_of(flow, &working_lanes, rank_gap, self.lane_width, direction),
                };
                info!(
                    target: "rustflow::layout",
                    "layout complete: {} nodes, {} edges, {} expansions",
                    layout.nodes.len(),
                    layout.edges.len(),
                    congestion.global_expansion_count
                );
                if let Some(dir) = &self.dump_dir {
                    if let Err(io_err) =
                        write_debug_dumps(dir, &layout, &tracks, &router.bridges, &failures)
                    {
                        warn!(
                            target: "rustflow::layout",
                            "failed to write debug dumps to {}: {}",
                            dir.display(),
                            io_err
                        );
                    }
                }
                return Ok(layout);
            };

            debug!(target: "rustflow::layout", "attempt {} failed: {}", attempt, err);
            congestion.global_expansion_count += 1;
            if congestion.global_expansion_count >= congestion.max_global_expansions {
                return Err(LayoutError::UnscalableStructure);
            }
            apply_global_expansion(
                &mut working_lanes,
                &mut rank_gap,
                self.rank_gap,
                congestion.global_expansion_count,
            );
        }
    }
}

/// Symmetric global expansion: every lane grows by two tracks; from step 2
/// on the rank gap widens as well.
fn apply_global_expansion(
    lanes: &mut BTreeMap<String, Lane>,
    rank_gap: &mut f64,
    base_rank_gap: f64,
    step: u32,
) {
    for lane in lanes.values_mut() {
        lane.tracks_total += 2;
    }
    if step >= 2 {
        *rank_gap = base_rank_gap + step as f64 * RANK_GAP_STEP;
    }
}

/// Lanes side by side in `(order, id)` order, each `lane_width` wide along
/// the cross-flow axis.
fn initialize_lanes(
    lanes: &BTreeMap<String, Lane>,
    lane_width: f64,
    _direction: Direction,
) -> BTreeMap<String, LaneGeometry> {
    let mut ordered: Vec<(&String, &Lane)> = lanes.iter().collect();
    ordered.sort_by(|a, b| a.1.order.cmp(&b.1.order).then_with(|| a.0.cmp(b.0)));

    let mut out = BTreeMap::new();
    let mut offset = 0.0;
    for (lane_id, lane) in ordered {
        out.insert(
            lane_id.clone(),
            LaneGeometry {
                start: offset,
                end: offset + lane_width,
                tracks_total: lane.tracks_total,
            },
        );
        offset += lane_width;
    }
    out
}

/// Place every node at its lane center along the cross-flow axis and at
/// `rank.global * rank_gap` along the flow axis.
fn position_nodes(
    flow: &CompiledFlow,
    lanes: &BTreeMap<String, LaneGeometry>,
    rank_gap: f64,
    direction: Direction,
) -> Result<BTreeMap<String, LayoutNode>, LayoutError> {
    let mut out = BTreeMap::new();
    for (node_id, node) in &flow.nodes {
        if node.rank.global < 1 {
            return Err(LayoutError::ImpossibleWithCurrentGrid(format!(
                "node '{}' has no rank",
                node_id
            )));
        }
        let lane = lanes.get(&node.lane).ok_or_else(|| {
            LayoutError::ImpossibleWithCurrentGrid(format!(
                "node '{}' references unknown lane '{}'",
                node_id, node.lane
            ))
        })?;

        let primary = lane.center();
        let secondary = node.rank.global as f64 * rank_gap;
        let (x, y) = match direction {
            Direction::Tb => (primary, secondary),
            Direction::Lr => (secondary, primary),
        };
        let (width, height) = match node.kind {
            NodeKind::Decision => DECISION_SIZE,
            NodeKind::Start | NodeKind::End => TERMINAL_SIZE,
            NodeKind::Process | NodeKind::Delay => PROCESS_SIZE,
        };
        out.insert(
            node_id.clone(),
            LayoutNode {
                x,
                y,
                width,
                height,
            },
        );
    }
    Ok(out)
}

fn routing_group(kind: EdgeKind) -> u8 {
    match kind {
        EdgeKind::MainPath => 0,
        EdgeKind::Branch => 1,
        EdgeKind::CrossLane => 3,
        EdgeKind::Return => 4,
        EdgeKind::Join => 5,
    }
}

/// Deterministic routing order: by group, then within `branch` by descending
/// source `future_steps`, otherwise by descending priority; edge id breaks
/// every tie.
fn sort_edges(flow: &CompiledFlow) -> Vec<String> {
    let mut ids: Vec<String> = flow.edges.keys().cloned().collect();
    ids.sort_by(|a, b| {
        let ea = &flow.edges[a];
        let eb = &flow.edges[b];
        let ga = routing_group(ea.classification.kind);
        let gb = routing_group(eb.classification.kind);
        ga.cmp(&gb)
            .then_with(|| {
                if ga == 1 {
                    let fa = flow
                        .nodes
                        .get(&ea.from)
                        .map(|n| n.future_metrics.future_steps)
                        .unwrap_or(0);
                    let fb = flow
                        .nodes
                        .get(&eb.from)
                        .map(|n| n.future_metrics.future_steps)
                        .unwrap_or(0);
                    fb.cmp(&fa)
                } else {
                    eb.priority.cmp(&ea.priority)
                }
            })
            .then_with(|| a.cmp(b))
    });
    ids
}

fn complexity_of(
    flow: &CompiledFlow,
    working_lanes: &BTreeMap<String, Lane>,
    rank_gap: f64,
    lane_width: f64,
    direction: Direction,
) -> Complexity {
    let stats = &flow.cpff.stats;
    let span = working_lanes.len() as f64 * lane_width;
    let backbone_margin = if stats.cycles_total > 0 {
        BACKBONE_BASE_OFFSET + stats.max_cycle_depth as f64 * LOOP_SPACING
    } else {
        0.0
    };
    let cross = span + backbone_margin;
    let along = (stats.max_depth as f64 + 1.0) * rank_gap;
    let (estimated_width, estimated_height) = match direction {
        Direction::Tb => (cross, along),
        Direction::Lr => (along, cross),
    };

    Complexity {
        nodes_total: stats.nodes_total,
        edges_total: stats.edges_total,
        lanes_total: stats.lanes_total,
        max_tracks_per_lane: working_lanes
            .values()
            .map(|l| l.tracks_total)
            .max()
            .unwrap_or(0),
        max_depth: stats.max_depth,
        max_branches_per_rank: stats.max_branches_per_rank,
        cycles_total: stats.cycles_total,
        max_cycle_depth: stats.max_cycle_depth,
        estimated_width,
        estimated_height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile_document;
    use crate::ir::CompiledFlow;

    fn compile(input: &str) -> CompiledFlow {
        compile_document(serde_json::from_str(input).unwrap()).unwrap()
    }

    const LINEAR: &str = r#"{
        "sff": {"direction": "TB"},
        "entry": {"start": "s", "ends": ["e"]},
        "lanes": {"L1": {"title": "Main", "order": 1}},
        "nodes": {
            "s": {"type": "start", "lane": "L1", "label": "Start"},
            "p": {"type": "process", "lane": "L1", "label": "Work"},
            "e": {"type": "end", "lane": "L1", "label": "End"}
        },
        "edges": [
            {"from": "s", "to": "p"},
            {"from": "p", "to": "e"}
        ]
    }"#;

    const LOOPED: &str = r#"{
        "sff": {"direction": "TB"},
        "entry": {"start": "s", "ends": ["e"]},
        "lanes": {"L1": {"title": "Main", "order": 1}},
        "nodes": {
            "s": {"type": "start", "lane": "L1", "label": "Start"},
            "p": {"type": "process", "lane": "L1", "label": "Work"},
            "d": {"type": "decision", "lane": "L1", "label": "Done?",
                  "branches": {"true": {"next": "e"}, "false": {"next": "p"}}},
            "e": {"type": "end", "lane": "L1", "label": "End"}
        },
        "edges": [
            {"from": "s", "to": "p"},
            {"from": "p", "to": "d"},
            {"from": "d", "to": "e", "branch": "true"},
            {"from": "d", "to": "p", "branch": "false"}
        ]
    }"#;

    /// Two lanes; p1 -> p2 classifies cross_lane because the main path
    /// stays in L1 through x1.
    const CROSS_LANE: &str = r#"{
        "sff": {"direction": "TB"},
        "entry": {"start": "s", "ends": ["e"]},
        "lanes": {
            "L1": {"title": "Sales", "order": 1},
            "L2": {"title": "Warehouse", "order": 2}
        },
        "nodes": {
            "s": {"type": "start", "lane": "L1", "label": "Start"},
            "p1": {"type": "process", "lane": "L1", "label": "Take order"},
            "x1": {"type": "process", "lane": "L1", "label": "Log order"},
            "p2": {"type": "process", "lane": "L2", "label": "Pick items"},
            "e": {"type": "end", "lane": "L2", "label": "End"}
        },
        "edges": [
            {"from": "s", "to": "p1"},
            {"from": "p1", "to": "x1"},
            {"from": "p1", "to": "p2"},
            {"from": "p2", "to": "e"},
            {"from": "x1", "to": "e"}
        ]
    }"#;

    fn parallel_flow(branches: usize) -> CompiledFlow {
        let mut nodes = String::new();
        let mut edges = String::new();
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
        let input = format!(
            r#"{{
                "sff": {{"direction": "TB"}},
                "entry": {{"start": "s", "ends": ["e"]}},
                "lanes": {{"L1": {{"title": "Main", "order": 1}}}},
                "nodes": {{{}}},
                "edges": [{}]
            }}"#,
            nodes,
            edges.trim_end_matches(','),
        );
        compile(&input)
    }

    #[test]
    fn test_linear_layout_geometry() {
        let flow = compile(LINEAR);
        let layout = LayoutEngine::default().generate(&flow).unwrap();

        // One lane centered at 150; ranks at 100/200/300.
        let s = &layout.nodes["s"];
        let p = &layout.nodes["p"];
        let e = &layout.nodes["e"];
        assert_eq!((s.x, s.y), (150.0, 100.0));
        assert_eq!((p.x, p.y), (150.0, 200.0));
        assert_eq!((e.x, e.y), (150.0, 300.0));
        assert_eq!((s.width, s.height), (40.0, 40.0));
        assert_eq!((p.width, p.height), (180.0, 50.0));

        // Both edges are 4-point polylines riding the lane center track.
        for edge in layout.edges.values() {
            assert_eq!(edge.points.len(), 4);
            for (x, _) in &edge.points {
                assert_eq!(*x, 150.0);
            }
        }
        assert_eq!(layout.lanes["L1"].start, 0.0);
        assert_eq!(layout.lanes["L1"].end, 300.0);
        assert_eq!(layout.complexity.cycles_total, 0);
    }

    #[test]
    fn test_loop_takes_external_corridor() {
        let flow = compile(LOOPED);
        let layout = LayoutEngine::default().generate(&flow).unwrap();

        let back = &layout.edges["e4"];
        assert_eq!(back.points.len(), 5);
        // The corridor runs outside every lane.
        let corridor_x = back.points[2].0;
        assert_eq!(back.points[3].0, corridor_x);
        assert!(corridor_x > layout.lanes["L1"].end);

        // Forward edges stay at 4 points.
        assert_eq!(layout.edges["e1"].points.len(), 4);
        assert_eq!(layout.edges["e3"].points.len(), 4);
    }

    #[test]
    fn test_bridge_corridor_midpoint() {
        let flow = compile(CROSS_LANE);
        let handoff = flow.edges.values().find(|e| e.to == "p2").unwrap();
        assert_eq!(handoff.classification.kind, crate::ir::EdgeKind::CrossLane);

        let layout = LayoutEngine::default().generate(&flow).unwrap();
        let bridge = &layout.edges[&handoff.id];
        assert_eq!(bridge.points.len(), 4);
        // Spine at the midpoint of L1.end and L2.start.
        assert_eq!(bridge.points[1].0, 300.0);
        assert_eq!(bridge.points[2].0, 300.0);
    }

    #[test]
    fn test_parallel_fanout_expands_tracks() {
        let flow = parallel_flow(3);
        let layout = LayoutEngine::default().generate(&flow).unwrap();
        // Saturated rank windows force global expansions before success.
        assert!(layout.lanes["L1"].tracks_total >= 15);
        assert_eq!(layout.lanes["L1"].tracks_total % 2, 1);
    }

    #[test]
    fn test_heavy_fanout_is_unscalable() {
        let flow = parallel_flow(8);
        let err = LayoutEngine::default().generate(&flow).unwrap_err();
        assert!(matches!(err, LayoutError::UnscalableStructure));
        assert_eq!(err.to_string(), "LAYOUT_UNSCALABLE_STRUCTURE");
    }

    #[test]
    fn test_missing_rank_is_fatal() {
        let mut flow = compile(LINEAR);
        if let Some(node) = flow.nodes.get_mut("p") {
            node.rank.global = 0;
        }
        let err = LayoutEngine::default().generate(&flow).unwrap_err();
        assert!(matches!(err, LayoutError::ImpossibleWithCurrentGrid(_)));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_lr_direction_swaps_axes() {
        let input = LINEAR.replace(r#""direction": "TB""#, r#""direction": "LR""#);
        let flow = compile(&input);
        let layout = LayoutEngine::default().generate(&flow).unwrap();
        let s = &layout.nodes["s"];
        let p = &layout.nodes["p"];
        assert_eq!((s.x, s.y), (100.0, 150.0));
        assert_eq!((p.x, p.y), (200.0, 150.0));
        for edge in layout.edges.values() {
            assert_eq!(edge.points.len(), 4);
        }
    }

    #[test]
    fn test_edge_sort_order() {
        let flow = compile(LOOPED);
        let order = sort_edges(&flow);
        // main_path edges first (e2, e3), then the return, then the join.
        assert_eq!(order, vec!["e2", "e3", "e4", "e1"]);
    }

    #[test]
    fn test_complexity_block() {
        let flow = compile(LOOPED);
        let layout = LayoutEngine::default().generate(&flow).unwrap();
        let c = &layout.complexity;
        assert_eq!(c.nodes_total, 4);
        assert_eq!(c.edges_total, 4);
        assert_eq!(c.lanes_total, 1);
        assert_eq!(c.cycles_total, 1);
        assert_eq!(c.max_cycle_depth, 1);
        assert!(c.estimated_width > 300.0);
        assert!(c.estimated_height >= 500.0);
    }

    #[test]
    fn test_layout_is_deterministic() {
        let flow = compile(LOOPED);
        let engine = LayoutEngine::default();
        let a = engine.generate(&flow).unwrap();
        let b = engine.generate(&flow).unwrap();
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }
}
