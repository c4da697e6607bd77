//! Orthogonal edge routing.
//!
//! Routes one edge at a time in the engine's priority order. Same-lane
//! forward edges take a V-H-V polyline (H-V-H in LR flows) whose middle
//! segment sits on a lane track chosen symmetrically around the center
//! track; cross-lane edges take a bridge corridor between the two lanes;
//! return edges go around the lanes on an external backbone. All polylines
//! have four points, except backbones which have five.

use std::collections::{BTreeMap, HashMap};

use tracing::trace;

use crate::ir::{CompiledFlow, Edge, EdgeKind, Node};
use crate::sff::Direction;

use super::tracks::TrackSystem;
use super::types::{LaneGeometry, LayoutNode};
use super::LayoutError;

const AFFIRMATIVE_BRANCHES: [&str; 3] = ["true", "yes", "sim"];
const NEGATIVE_BRANCHES: [&str; 3] = ["false", "no", "não"];

/// Spacing between anchors when several edges share one node face.
pub const ANCHOR_SPACING: f64 = 24.0;

/// Lateral distance from the outermost lane to the first loop backbone.
pub const BACKBONE_BASE_OFFSET: f64 = 80.0;
/// Distance between nested loop backbones.
pub const LOOP_SPACING: f64 = 80.0;
/// Length of the short stub leaving the source of a loop.
pub const LOOP_STUB: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ChannelRole {
    Branch,
    Join,
    Mid,
}

/// Edges of the same kind and role inside one rank band reuse the track the
/// first of them reserved.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ChannelKey {
    lane: usize,
    rank_band: u32,
    kind: EdgeKind,
    role: ChannelRole,
    forward: bool,
}

/// One bridge corridor use, recorded for the debug dump.
#[derive(Debug, Clone, serde::Serialize)]
pub struct BridgeUse {
    pub edge_id: String,
    pub from_lane: String,
    pub to_lane: String,
    pub spine: f64,
}

/// Geometry the router reads but never mutates.
pub struct RouteContext<'a> {
    pub flow: &'a CompiledFlow,
    pub boxes: &'a BTreeMap<String, LayoutNode>,
    pub lanes: &'a BTreeMap<String, LaneGeometry>,
    /// Far edge of the outermost lane (max x in TB, min y in LR).
    pub outer_extent: f64,
}

pub struct OrthogonalRouter {
    direction: Direction,
    channels: HashMap<ChannelKey, u32>,
    /// node id -> ordered edge ids leaving through the flow-side face.
    out_groups: HashMap<String, Vec<String>>,
    /// node id -> ordered edge ids entering through the flow-side face.
    in_groups: HashMap<String, Vec<String>>,
    pub bridges: Vec<BridgeUse>,
}

impl OrthogonalRouter {
    pub fn new(flow: &CompiledFlow, direction: Direction) -> Self {
        let mut out_groups: HashMap<String, Vec<String>> = HashMap::new();
        let mut in_groups: HashMap<String, Vec<String>> = HashMap::new();

        // Anchor groups hold same-lane forward edges that use the flow-side
        // faces; side-exiting decision branches, bridges and backbones are
        // left out. Link tables are already sorted by edge id.
        for node in flow.nodes.values() {
            for edge_id in &node.links.out_edges {
                let Some(edge) = flow.edges.get(edge_id) else {
                    continue;
                };
                if !uses_flow_face(flow, edge) || side_exit(flow, edge).is_some() {
                    continue;
                }
                out_groups
                    .entry(node.id.clone())
                    .or_default()
                    .push(edge_id.clone());
            }
            for edge_id in &node.links.in_edges {
                let Some(edge) = flow.edges.get(edge_id) else {
                    continue;
                };
                if !uses_flow_face(flow, edge) {
                    continue;
                }
                in_groups
                    .entry(node.id.clone())
                    .or_default()
                    .push(edge_id.clone());
            }
        }

        Self {
            direction,
            channels: HashMap::new(),
            out_groups,
            in_groups,
            bridges: Vec::new(),
        }
    }

    /// Route one edge, reserving tracks as needed.
    pub fn route_edge(
        &mut self,
        tracks: &mut TrackSystem,
        ctx: &RouteContext<'_>,
        edge: &Edge,
    ) -> Result<Vec<(f64, f64)>, LayoutError> {
        let src = require_node(ctx, &edge.from)?;
        let dst = require_node(ctx, &edge.to)?;

        let points = if edge.classification.is_return {
            self.route_backbone(ctx, edge, src)?
        } else if src.lane != dst.lane {
            self.route_bridge(ctx, edge, src, dst)?
        } else {
            self.route_normal(tracks, ctx, edge, src, dst)?
        };

        trace!(
            target: "rustflow::layout",
            "routed {} ({}) with {} points",
            edge.id,
            edge.classification.kind.as_str(),
            points.len()
        );
        Ok(points)
    }

    // ------------------------------------------------------------------
    // Same-lane forward edges: V-H-V (TB) / H-V-H (LR)
    // ------------------------------------------------------------------

    fn route_normal(
        &mut self,
        tracks: &mut TrackSystem,
        ctx: &RouteContext<'_>,
        edge: &Edge,
        src: &Node,
        dst: &Node,
    ) -> Result<Vec<(f64, f64)>, LayoutError> {
        let src_box = *require_box(ctx, &edge.from)?;
        let dst_box = *require_box(ctx, &edge.to)?;
        let lane = tracks.lane_index(&src.lane).ok_or_else(|| {
            LayoutError::ImpossibleWithCurrentGrid(format!("unknown lane '{}'", src.lane))
        })?;

        let (p1, p4) = match self.direction {
            Direction::Tb => (
                self.source_port_tb(ctx, edge, src, &src_box, &dst_box),
                self.dest_port_tb(edge, dst, &dst_box, &src_box),
            ),
            Direction::Lr => (
                self.source_port_lr(ctx, edge, src, &src_box, &dst_box),
                self.dest_port_lr(edge, dst, &dst_box, &src_box),
            ),
        };

        // In TB the middle segment is horizontal at mid_y; LR is the mirror
        // with a vertical segment at mid_x. The clamp window is measured on
        // the node centers.
        let (flow_src, flow_dst) = match self.direction {
            Direction::Tb => (src_box.y, dst_box.y),
            Direction::Lr => (src_box.x, dst_box.x),
        };
        let base_mid = (flow_src + flow_dst) / 2.0;
        let gap = tracks.lane(lane).track_gap;
        let window_lo = flow_src.min(flow_dst) + gap;
        let window_hi = flow_src.max(flow_dst) - gap;

        let (cross_a, cross_b) = match self.direction {
            Direction::Tb => (p1.0, p4.0),
            Direction::Lr => (p1.1, p4.1),
        };
        let degenerate = (cross_a - cross_b).abs() < 1e-9;

        let key = self.channel_key(lane, edge, src, flow_dst >= flow_src);
        let mut reason = "no horizontal track available";

        for track in self.candidate_tracks(tracks, lane, &key) {
            let mid = base_mid + tracks.get_track_offset(lane, track);
            if mid < window_lo || mid > window_hi {
                continue;
            }

            // The middle segment must not traverse any other node's box.
            let mid_hit = match self.direction {
                Direction::Tb => {
                    h_segment_hits_node(ctx, &edge.from, &edge.to, mid, cross_a, cross_b)
                }
                Direction::Lr => {
                    v_segment_hits_node(ctx, &edge.from, &edge.to, mid, cross_a, cross_b)
                }
            };
            if mid_hit {
                reason = "horizontal from source hits node";
                continue;
            }

            // A straight drop has no lateral extent; it reserves nothing.
            if !degenerate {
                let conflict = match self.direction {
                    Direction::Tb => tracks.check_h_conflict(
                        lane,
                        track,
                        cross_a,
                        cross_b,
                        edge.routing_constraints.min_separation,
                    ),
                    Direction::Lr => tracks.check_v_conflict(
                        lane,
                        track,
                        cross_a,
                        cross_b,
                        edge.routing_constraints.min_separation,
                    ),
                };
                if conflict {
                    continue;
                }
            }

            // Short stubs from the ports to the middle segment must stay
            // clear of other nodes too.
            let stub_hit = match self.direction {
                Direction::Tb => {
                    v_segment_hits_node(ctx, &edge.from, &edge.to, cross_a, p1.1, mid)
                        || v_segment_hits_node(ctx, &edge.from, &edge.to, cross_b, mid, p4.1)
                }
                Direction::Lr => {
                    h_segment_hits_node(ctx, &edge.from, &edge.to, cross_a, p1.0, mid)
                        || h_segment_hits_node(ctx, &edge.from, &edge.to, cross_b, mid, p4.0)
                }
            };
            if stub_hit {
                reason = "vertical from source hits node";
                continue;
            }

            if !degenerate {
                match self.direction {
                    Direction::Tb => {
                        tracks.occupy_h_segment(lane, track, cross_a, cross_b, &edge.id)
                    }
                    Direction::Lr => {
                        tracks.occupy_v_segment(lane, track, cross_a, cross_b, &edge.id)
                    }
                }
                self.channels.insert(key, track);
            }

            let points = match self.direction {
                Direction::Tb => vec![p1, (cross_a, mid), (cross_b, mid), p4],
                Direction::Lr => vec![p1, (mid, cross_a), (mid, cross_b), p4],
            };
            return Ok(points);
        }

        Err(LayoutError::RoutingImpossible(reason.to_string()))
    }

    /// Candidate tracks in symmetric order around the center, preceded by
    /// the channel's reserved track when one exists.
    fn candidate_tracks(&self, tracks: &TrackSystem, lane: usize, key: &ChannelKey) -> Vec<u32> {
        let lane_tracks = tracks.lane(lane);
        let center = lane_tracks.center_track;
        let total = lane_tracks.tracks_total;

        let mut order: Vec<u32> = Vec::with_capacity(total as usize + 1);
        if let Some(&reserved) = self.channels.get(key) {
            if reserved >= 1 && reserved <= total {
                order.push(reserved);
            }
        }
        if center >= 1 && center <= total && !order.contains(&center) {
            order.push(center);
        }
        for step in 1..total {
            let above = center + step;
            if above <= total && !order.contains(&above) {
                order.push(above);
            }
            if center > step {
                let below = center - step;
                if !order.contains(&below) {
                    order.push(below);
                }
            }
        }
        order
    }

    fn channel_key(&self, lane: usize, edge: &Edge, src: &Node, forward: bool) -> ChannelKey {
        let role = match edge.classification.kind {
            EdgeKind::Branch => ChannelRole::Branch,
            EdgeKind::Join => ChannelRole::Join,
            _ => ChannelRole::Mid,
        };
        ChannelKey {
            lane,
            rank_band: src.rank.global / 2,
            kind: edge.classification.kind,
            role,
            forward,
        }
    }

    // ------------------------------------------------------------------
    // Ports
    // ------------------------------------------------------------------

    fn source_port_tb(
        &self,
        ctx: &RouteContext<'_>,
        edge: &Edge,
        src: &Node,
        src_box: &LayoutNode,
        dst_box: &LayoutNode,
    ) -> (f64, f64) {
        if let Some(affirmative) = side_exit(ctx.flow, edge) {
            let x = if affirmative { src_box.right() } else { src_box.left() };
            return (x, src_box.y);
        }
        let going_down = dst_box.y >= src_box.y;
        let x = src_box.x + self.anchor_offset(&self.out_groups, src, &edge.id);
        let y = if going_down { src_box.bottom() } else { src_box.top() };
        (x, y)
    }

    fn dest_port_tb(
        &self,
        edge: &Edge,
        dst: &Node,
        dst_box: &LayoutNode,
        src_box: &LayoutNode,
    ) -> (f64, f64) {
        let going_down = dst_box.y >= src_box.y;
        let x = dst_box.x + self.anchor_offset(&self.in_groups, dst, &edge.id);
        let y = if going_down { dst_box.top() } else { dst_box.bottom() };
        (x, y)
    }

    fn source_port_lr(
        &self,
        ctx: &RouteContext<'_>,
        edge: &Edge,
        src: &Node,
        src_box: &LayoutNode,
        dst_box: &LayoutNode,
    ) -> (f64, f64) {
        if let Some(affirmative) = side_exit(ctx.flow, edge) {
            let y = if affirmative { src_box.bottom() } else { src_box.top() };
            return (src_box.x, y);
        }
        let going_right = dst_box.x >= src_box.x;
        let y = src_box.y + self.anchor_offset(&self.out_groups, src, &edge.id);
        let x = if going_right { src_box.right() } else { src_box.left() };
        (x, y)
    }

    fn dest_port_lr(
        &self,
        edge: &Edge,
        dst: &Node,
        dst_box: &LayoutNode,
        src_box: &LayoutNode,
    ) -> (f64, f64) {
        let going_right = dst_box.x >= src_box.x;
        let y = dst_box.y + self.anchor_offset(&self.in_groups, dst, &edge.id);
        let x = if going_right { dst_box.left() } else { dst_box.right() };
        (x, y)
    }

    /// Centered anchor distribution along a face, in edge-id order.
    fn anchor_offset(
        &self,
        groups: &HashMap<String, Vec<String>>,
        node: &Node,
        edge_id: &str,
    ) -> f64 {
        let Some(group) = groups.get(&node.id) else {
            return 0.0;
        };
        let total = group.len();
        if total <= 1 {
            return 0.0;
        }
        let pos = group.iter().position(|id| id == edge_id).unwrap_or(0);
        (pos as f64 - (total - 1) as f64 / 2.0) * ANCHOR_SPACING
    }

    // ------------------------------------------------------------------
    // Cross-lane edges: bridge corridor between the two lanes
    // ------------------------------------------------------------------

    fn route_bridge(
        &mut self,
        ctx: &RouteContext<'_>,
        edge: &Edge,
        src: &Node,
        dst: &Node,
    ) -> Result<Vec<(f64, f64)>, LayoutError> {
        let src_box = *require_box(ctx, &edge.from)?;
        let dst_box = *require_box(ctx, &edge.to)?;
        let src_lane = require_lane(ctx, &src.lane)?;
        let dst_lane = require_lane(ctx, &dst.lane)?;

        let (left, right) = if src_lane.start <= dst_lane.start {
            (src_lane, dst_lane)
        } else {
            (dst_lane, src_lane)
        };
        let spine = (left.end + right.start) / 2.0;

        self.bridges.push(BridgeUse {
            edge_id: edge.id.clone(),
            from_lane: src.lane.clone(),
            to_lane: dst.lane.clone(),
            spine,
        });

        let points = match self.direction {
            Direction::Tb => {
                let x1 = if spine >= src_box.x { src_box.right() } else { src_box.left() };
                let x4 = if spine >= dst_box.x { dst_box.right() } else { dst_box.left() };
                vec![
                    (x1, src_box.y),
                    (spine, src_box.y),
                    (spine, dst_box.y),
                    (x4, dst_box.y),
                ]
            }
            Direction::Lr => {
                let y1 = if spine >= src_box.y { src_box.bottom() } else { src_box.top() };
                let y4 = if spine >= dst_box.y { dst_box.bottom() } else { dst_box.top() };
                vec![
                    (src_box.x, y1),
                    (src_box.x, spine),
                    (dst_box.x, spine),
                    (dst_box.x, y4),
                ]
            }
        };
        Ok(points)
    }

    // ------------------------------------------------------------------
    // Return edges: external backbone around the lanes
    // ------------------------------------------------------------------

    fn route_backbone(
        &mut self,
        ctx: &RouteContext<'_>,
        edge: &Edge,
        src: &Node,
    ) -> Result<Vec<(f64, f64)>, LayoutError> {
        let src_box = *require_box(ctx, &edge.from)?;
        let dst_box = *require_box(ctx, &edge.to)?;
        let level = src.cycle_context.cycle_level.max(1) as f64;

        let points = match self.direction {
            Direction::Tb => {
                // A lateral corridor right of all lanes; nested cycles move
                // further out.
                let corridor_x =
                    ctx.outer_extent + BACKBONE_BASE_OFFSET + (level - 1.0) * LOOP_SPACING;
                let stub_y = src_box.bottom() + LOOP_STUB;
                vec![
                    (src_box.x, src_box.bottom()),
                    (src_box.x, stub_y),
                    (corridor_x, stub_y),
                    (corridor_x, dst_box.y),
                    (dst_box.right(), dst_box.y),
                ]
            }
            Direction::Lr => {
                // A corridor above all lanes.
                let corridor_y =
                    ctx.outer_extent - BACKBONE_BASE_OFFSET - (level - 1.0) * LOOP_SPACING;
                let stub_x = src_box.right() + LOOP_STUB;
                vec![
                    (src_box.right(), src_box.y),
                    (stub_x, src_box.y),
                    (stub_x, corridor_y),
                    (dst_box.x, corridor_y),
                    (dst_box.x, dst_box.top()),
                ]
            }
        };
        Ok(points)
    }
}

fn require_node<'a>(ctx: &'a RouteContext<'_>, node_id: &str) -> Result<&'a Node, LayoutError> {
    ctx.flow.nodes.get(node_id).ok_or_else(|| {
        LayoutError::ImpossibleWithCurrentGrid(format!("unknown node '{}'", node_id))
    })
}

fn require_box<'a>(
    ctx: &'a RouteContext<'_>,
    node_id: &str,
) -> Result<&'a LayoutNode, LayoutError> {
    ctx.boxes.get(node_id).ok_or_else(|| {
        LayoutError::ImpossibleWithCurrentGrid(format!("node '{}' has no position", node_id))
    })
}

fn require_lane<'a>(
    ctx: &'a RouteContext<'_>,
    lane_id: &str,
) -> Result<&'a LaneGeometry, LayoutError> {
    ctx.lanes.get(lane_id).ok_or_else(|| {
        LayoutError::ImpossibleWithCurrentGrid(format!("lane '{}' has no geometry", lane_id))
    })
}

/// Same-lane, non-return edges attach to the flow-side faces.
fn uses_flow_face(flow: &CompiledFlow, edge: &Edge) -> bool {
    if edge.classification.is_return {
        return false;
    }
    match (flow.nodes.get(&edge.from), flow.nodes.get(&edge.to)) {
        (Some(src), Some(dst)) => src.lane == dst.lane,
        _ => false,
    }
}

/// Decision branches with a recognized label leave through a side face.
/// Returns `Some(true)` for affirmative labels, `Some(false)` for negative.
fn side_exit(flow: &CompiledFlow, edge: &Edge) -> Option<bool> {
    let src = flow.nodes.get(&edge.from)?;
    if !src.kind.is_decision() {
        return None;
    }
    let label = edge.branch.as_deref()?.to_lowercase();
    if AFFIRMATIVE_BRANCHES.contains(&label.as_str()) {
        Some(true)
    } else if NEGATIVE_BRANCHES.contains(&label.as_str()) {
        Some(false)
    } else {
        None
    }
}

/// True iff a horizontal segment at `y` spanning `x_a..x_b` crosses the box
/// of any node other than the two endpoints.
fn h_segment_hits_node(
    ctx: &RouteContext<'_>,
    from: &str,
    to: &str,
    y: f64,
    x_a: f64,
    x_b: f64,
) -> bool {
    let lo = x_a.min(x_b);
    let hi = x_a.max(x_b);
    ctx.boxes.iter().any(|(id, node)| {
        id != from
            && id != to
            && y > node.top()
            && y < node.bottom()
            && hi > node.left()
            && lo < node.right()
    })
}

fn v_segment_hits_node(
    ctx: &RouteContext<'_>,
    from: &str,
    to: &str,
    x: f64,
    y_a: f64,
    y_b: f64,
) -> bool {
    let lo = y_a.min(y_b);
    let hi = y_a.max(y_b);
    ctx.boxes.iter().any(|(id, node)| {
        id != from
            && id != to
            && x > node.left()
            && x < node.right()
            && hi > node.top()
            && lo < node.bottom()
    })
}
