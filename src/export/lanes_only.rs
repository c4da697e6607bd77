//! Lanes-only SVG preview: lane bands and nodes on the rank grid, no routed
//! edges. Useful for checking lane assignment before a full layout run.

use std::fmt::Write;

use crate::ir::CompiledFlow;
use crate::measure::TextMetrics;
use crate::sff::NodeKind;

use super::ordered_lane_ids;

const PADDING: f64 = 24.0;
const TITLE_BAR: f64 = 56.0;
const LANE_BODY: f64 = 400.0;
const RANK_GAP: f64 = 160.0;
const NODE_W: f64 = 220.0;
const NODE_H: f64 = 64.0;
const TERMINAL_R: f64 = 26.0;
const DECISION_SIZE: f64 = 90.0;

pub fn export_lanes_only(flow: &CompiledFlow) -> String {
    let metrics = TextMetrics::default();
    let is_tb = flow.direction().is_tb();
    let lane_ids = ordered_lane_ids(flow);

    let max_rank = flow
        .nodes
        .values()
        .map(|n| n.rank.global)
        .max()
        .unwrap_or(1)
        .max(1) as f64;

    // Lanes are bands along the cross-flow axis (columns in TB, rows in LR),
    // matching the layout engine's orientation; the flow axis spans the
    // ranks.
    let flow_span = TITLE_BAR + max_rank * RANK_GAP + PADDING;
    let (width, height) = if is_tb {
        (
            PADDING * 2.0 + lane_ids.len() as f64 * LANE_BODY,
            PADDING * 2.0 + flow_span,
        )
    } else {
        (
            PADDING * 2.0 + flow_span,
            PADDING * 2.0 + lane_ids.len() as f64 * LANE_BODY,
        )
    };

    let mut svg = String::new();
    writeln!(
        &mut svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{}" height="{}" viewBox="0 0 {} {}">"#,
        width, height, width, height
    )
    .unwrap();
    writeln!(
        &mut svg,
        r##"<rect x="0" y="0" width="{}" height="{}" fill="#ffffff" />"##,
        width, height
    )
    .unwrap();

    for (i, lane_id) in lane_ids.iter().enumerate() {
        let lane = &flow.lanes[lane_id];
        let title = if lane.title.is_empty() { lane_id } else { &lane.title };
        let offset = PADDING + i as f64 * LANE_BODY;

        if is_tb {
            writeln!(
                &mut svg,
                r##"<rect x="{}" y="{}" width="{}" height="{}" fill="#fdfdfd" stroke="#666" stroke-width="2" />"##,
                offset, PADDING, LANE_BODY, flow_span
            )
            .unwrap();
            writeln!(
                &mut svg,
                r##"<rect x="{}" y="{}" width="{}" height="{}" fill="#eee" stroke="#666" stroke-width="2" />"##,
                offset, PADDING, LANE_BODY, TITLE_BAR
            )
            .unwrap();
            writeln!(
                &mut svg,
                r##"<text x="{}" y="{}" font-size="20" font-weight="bold" fill="#333" text-anchor="middle" dominant-baseline="middle">{}</text>"##,
                offset + LANE_BODY / 2.0,
                PADDING + TITLE_BAR / 2.0,
                escape_xml(title)
            )
            .unwrap();
        } else {
            writeln!(
                &mut svg,
                r##"<rect x="{}" y="{}" width="{}" height="{}" fill="#fdfdfd" stroke="#666" stroke-width="2" />"##,
                PADDING, offset, flow_span, LANE_BODY
            )
            .unwrap();
            writeln!(
                &mut svg,
                r##"<rect x="{}" y="{}" width="{}" height="{}" fill="#eee" stroke="#666" stroke-width="2" />"##,
                PADDING, offset, TITLE_BAR, LANE_BODY
            )
            .unwrap();
            let tx = PADDING + TITLE_BAR / 2.0;
            let ty = offset + LANE_BODY / 2.0;
            writeln!(
                &mut svg,
                r##"<text x="{}" y="{}" font-size="20" font-weight="bold" fill="#333" text-anchor="middle" dominant-baseline="middle" transform="rotate(-90 {},{})">{}</text>"##,
                tx,
                ty,
                tx,
                ty,
                escape_xml(title)
            )
            .unwrap();
        }

        for node in flow.nodes.values().filter(|n| n.lane == *lane_id) {
            let along = PADDING + TITLE_BAR + (node.rank.global as f64 - 0.5) * RANK_GAP;
            let across = offset + LANE_BODY / 2.0;
            let (cx, cy) = if is_tb { (across, along) } else { (along, across) };
            let label = if node.label.is_empty() { &node.id } else { &node.label };
            draw_node(&mut svg, &metrics, node.kind, cx, cy, label);
        }
    }

    writeln!(&mut svg, "</svg>").unwrap();
    svg
}

fn draw_node(
    svg: &mut String,
    metrics: &TextMetrics,
    kind: NodeKind,
    cx: f64,
    cy: f64,
    label: &str,
) {
    match kind {
        NodeKind::Start => {
            writeln!(
                svg,
                r##"<circle cx="{}" cy="{}" r="{}" fill="#e8f5e9" stroke="#2e7d32" stroke-width="2" />"##,
                cx, cy, TERMINAL_R
            )
            .unwrap();
        }
        NodeKind::End => {
            writeln!(
                svg,
                r##"<circle cx="{}" cy="{}" r="{}" fill="#ffebee" stroke="#c62828" stroke-width="2" />"##,
                cx, cy, TERMINAL_R
            )
            .unwrap();
        }
        NodeKind::Decision => {
            let half = DECISION_SIZE / 2.0;
            writeln!(
                svg,
                r##"<polygon points="{},{} {},{} {},{} {},{}" fill="#fffde7" stroke="#fbc02d" stroke-width="2" />"##,
                cx,
                cy - half,
                cx + half,
                cy,
                cx,
                cy + half,
                cx - half,
                cy
            )
            .unwrap();
        }
        NodeKind::Process | NodeKind::Delay => {
            let fill = if kind == NodeKind::Delay { "#f3e5f5" } else { "#e3f2fd" };
            let stroke = if kind == NodeKind::Delay { "#6a1b9a" } else { "#1565c0" };
            writeln!(
                svg,
                r#"<rect x="{}" y="{}" width="{}" height="{}" rx="8" fill="{}" stroke="{}" stroke-width="2" />"#,
                cx - NODE_W / 2.0,
                cy - NODE_H / 2.0,
                NODE_W,
                NODE_H,
                fill,
                stroke
            )
            .unwrap();
        }
    }

    let is_terminal = matches!(kind, NodeKind::Start | NodeKind::End);
    if is_terminal {
        writeln!(
            svg,
            r##"<text x="{}" y="{}" font-size="13" fill="#333" text-anchor="middle" font-weight="bold">{}</text>"##,
            cx,
            cy - TERMINAL_R - 10.0,
            escape_xml(label)
        )
        .unwrap();
        return;
    }

    let max_width = if kind == NodeKind::Decision {
        DECISION_SIZE
    } else {
        NODE_W - 24.0
    };
    let lines = metrics.wrap_label(label, max_width);
    let mut ty = cy - (lines.len() as f64 - 1.0) * metrics.line_height / 2.0;
    for line in lines {
        writeln!(
            svg,
            r##"<text x="{}" y="{}" font-size="13" fill="#333" text-anchor="middle" dominant-baseline="middle">{}</text>"##,
            cx,
            ty,
            escape_xml(&line)
        )
        .unwrap();
        ty += metrics.line_height;
    }
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile_document;

    #[test]
    fn test_lanes_only_render() {
        let flow = compile_document(
            serde_json::from_str(
                r#"{
                    "sff": {"direction": "TB"},
                    "entry": {"start": "s", "ends": ["e"]},
                    "lanes": {
                        "L1": {"title": "Sales", "order": 1},
                        "L2": {"title": "Warehouse", "order": 2}
                    },
                    "nodes": {
                        "s": {"type": "start", "lane": "L1", "label": "Start"},
                        "p": {"type": "process", "lane": "L2", "label": "Pick items"},
                        "e": {"type": "end", "lane": "L2", "label": "End"}
                    },
                    "edges": [
                        {"from": "s", "to": "p"},
                        {"from": "p", "to": "e"}
                    ]
                }"#,
            )
            .unwrap(),
        )
        .unwrap();
        let svg = export_lanes_only(&flow);
        assert!(svg.contains("<svg"));
        assert!(svg.contains("Sales"));
        assert!(svg.contains("Warehouse"));
        assert!(svg.contains("Pick items"));
        // No routed edges in the preview.
        assert!(!svg.contains("<path"));
        assert!(svg.ends_with("</svg>\n"));
    }
}
