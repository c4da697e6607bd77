//! Property-based invariant tests for the compile + layout pipeline.
//!
//! For any valid generated flow:
//! 1. Compilation is deterministic (byte-identical JSON).
//! 2. Layout is deterministic.
//! 3. Every IR node appears in the layout.
//! 4. Return edges have 5-point polylines; all others 4.
//! 5. Consecutive polyline segments are orthogonal (zero-length allowed).
//! 6. No segment crosses the bounding box of a foreign node.
//! 7. Coincident middle segments never overlap laterally.
//! 8. Lane track counts stay odd and never shrink.

use proptest::prelude::*;
use serde_json::json;

use rustflow::compiler::compile_document;
use rustflow::ir::{CompiledFlow, EdgeKind};
use rustflow::layout::{Layout, LayoutEngine};
use rustflow::sff::SffDocument;

/// Build a valid flow: a chain of processes spread round-robin over
/// `lane_count` lanes, optionally closed by a decision that loops back to
/// the first process.
fn build_flow(chain_len: usize, lane_count: usize, with_loop: bool) -> SffDocument {
    // Loops stay single-lane so external backbones cannot cross foreign
    // lane columns at occupied ranks.
    let lane_count = if with_loop { 1 } else { lane_count };
    let lane_of = |i: usize| format!("L{}", (i % lane_count) + 1);

    let mut lanes = serde_json::Map::new();
    for i in 0..lane_count {
        lanes.insert(
            format!("L{}", i + 1),
            json!({"title": format!("Lane {}", i + 1), "order": i as i64 + 1}),
        );
    }

    let mut nodes = serde_json::Map::new();
    let mut edges = Vec::new();
    nodes.insert(
        "s".to_string(),
        json!({"type": "start", "lane": "L1", "label": "Start"}),
    );

    let mut prev = "s".to_string();
    for i in 0..chain_len {
        let id = format!("p{}", i);
        nodes.insert(
            id.clone(),
            json!({"type": "process", "lane": lane_of(i), "label": format!("Step {}", i)}),
        );
        edges.push(json!({"from": prev, "to": id}));
        prev = id;
    }

    let end_lane = lane_of(chain_len.saturating_sub(1));
    if with_loop {
        nodes.insert(
            "d".to_string(),
            json!({
                "type": "decision", "lane": end_lane, "label": "Again?",
                "branches": {"true": {"next": "e"}, "false": {"next": "p0"}}
            }),
        );
        edges.push(json!({"from": prev, "to": "d"}));
        edges.push(json!({"from": "d", "to": "e", "branch": "true"}));
        edges.push(json!({"from": "d", "to": "p0", "branch": "false"}));
        prev = "d".to_string();
    }

    nodes.insert(
        "e".to_string(),
        json!({"type": "end", "lane": end_lane, "label": "End"}),
    );
    if !with_loop {
        edges.push(json!({"from": prev, "to": "e"}));
    }

    let doc = json!({
        "sff": {"direction": "TB"},
        "entry": {"start": "s", "ends": ["e"]},
        "lanes": lanes,
        "nodes": nodes,
        "edges": edges,
    });
    serde_json::from_value(doc).unwrap()
}

fn segments(points: &[(f64, f64)]) -> Vec<((f64, f64), (f64, f64))> {
    points.windows(2).map(|w| (w[0], w[1])).collect()
}

fn check_invariants(flow: &CompiledFlow, layout: &Layout) {
    // Node completeness.
    for node_id in flow.nodes.keys() {
        assert!(layout.nodes.contains_key(node_id), "{} missing", node_id);
    }

    for (edge_id, edge) in &layout.edges {
        let expected = if edge.kind == EdgeKind::Return { 5 } else { 4 };
        assert_eq!(edge.points.len(), expected, "edge {} point count", edge_id);

        // Orthogonality: every segment changes at most one coordinate.
        for ((ax, ay), (bx, by)) in segments(&edge.points) {
            let dx = (ax - bx).abs();
            let dy = (ay - by).abs();
            assert!(
                dx < 1e-9 || dy < 1e-9,
                "edge {} has a diagonal segment ({},{}) -> ({},{})",
                edge_id,
                ax,
                ay,
                bx,
                by
            );
        }

        // No segment crosses a foreign node box.
        let ir_edge = &flow.edges[edge_id];
        for ((ax, ay), (bx, by)) in segments(&edge.points) {
            for (node_id, node) in &layout.nodes {
                if *node_id == ir_edge.from || *node_id == ir_edge.to {
                    continue;
                }
                let (left, right) = (node.x - node.width / 2.0, node.x + node.width / 2.0);
                let (top, bottom) = (node.y - node.height / 2.0, node.y + node.height / 2.0);
                let (lo_x, hi_x) = (ax.min(bx), ax.max(bx));
                let (lo_y, hi_y) = (ay.min(by), ay.max(by));
                let crosses =
                    hi_x > left && lo_x < right && hi_y > top && lo_y < bottom;
                assert!(
                    !crosses,
                    "edge {} segment ({},{})-({},{}) crosses node {}",
                    edge_id, ax, ay, bx, by, node_id
                );
            }
        }
    }

    // Coincident middle segments of same-lane edges must not overlap.
    let mids: Vec<(&String, (f64, f64), (f64, f64))> = layout
        .edges
        .iter()
        .filter(|(_, e)| e.points.len() == 4)
        .map(|(id, e)| (id, e.points[1], e.points[2]))
        .collect();
    for (i, &(id_a, a1, a2)) in mids.iter().enumerate() {
        for &(id_b, b1, b2) in mids.iter().skip(i + 1) {
            // Horizontal mid segments on the same line.
            if (a1.1 - a2.1).abs() < 1e-9
                && (b1.1 - b2.1).abs() < 1e-9
                && (a1.1 - b1.1).abs() < 1e-9
            {
                let (alo, ahi) = (a1.0.min(a2.0), a1.0.max(a2.0));
                let (blo, bhi) = (b1.0.min(b2.0), b1.0.max(b2.0));
                if ahi - alo < 1e-9 || bhi - blo < 1e-9 {
                    continue;
                }
                assert!(
                    ahi <= blo || bhi <= alo,
                    "edges {} and {} overlap on y={}",
                    id_a,
                    id_b,
                    a1.1
                );
            }
        }
    }

    // Lane invariants.
    for (lane_id, lane) in &layout.lanes {
        assert_eq!(lane.tracks_total % 2, 1, "lane {} even tracks", lane_id);
        assert!(
            lane.tracks_total >= flow.lanes[lane_id].tracks_total,
            "lane {} shrank",
            lane_id
        );
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_compile_is_deterministic(
        chain_len in 1usize..6,
        lane_count in 1usize..3,
        with_loop in any::<bool>(),
    ) {
        let doc = build_flow(chain_len, lane_count, with_loop);
        let a = compile_document(doc.clone()).unwrap().to_pretty_json();
        let b = compile_document(doc).unwrap().to_pretty_json();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn prop_layout_invariants_hold(
        chain_len in 1usize..6,
        lane_count in 1usize..3,
        with_loop in any::<bool>(),
    ) {
        let doc = build_flow(chain_len, lane_count, with_loop);
        let flow = compile_document(doc).unwrap();
        let layout = LayoutEngine::default().generate(&flow).unwrap();
        check_invariants(&flow, &layout);
    }

    #[test]
    fn prop_layout_is_deterministic(
        chain_len in 1usize..6,
        lane_count in 1usize..3,
        with_loop in any::<bool>(),
    ) {
        let doc = build_flow(chain_len, lane_count, with_loop);
        let flow = compile_document(doc).unwrap();
        let engine = LayoutEngine::default();
        let a = engine.generate(&flow).unwrap();
        let b = engine.generate(&flow).unwrap();
        prop_assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }
}

#[test]
fn test_single_edge_flow_invariants() {
    let doc = build_flow(0, 1, false);
    let flow = compile_document(doc).unwrap();
    assert_eq!(flow.cpff.stats.max_depth, 2);
    assert_eq!(flow.cpff.stats.cycles_total, 0);
    let layout = LayoutEngine::default().generate(&flow).unwrap();
    check_invariants(&flow, &layout);
}

#[test]
fn test_looped_flow_invariants() {
    let doc = build_flow(3, 1, true);
    let flow = compile_document(doc).unwrap();
    assert_eq!(flow.cpff.stats.cycles_total, 1);
    let layout = LayoutEngine::default().generate(&flow).unwrap();
    check_invariants(&flow, &layout);
}
