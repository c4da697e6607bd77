//! SVG export driven exclusively by the geometric layout.

use std::fmt::Write;

use crate::ir::CompiledFlow;
use crate::layout::{Layout, LayoutNode};
use crate::measure::TextMetrics;
use crate::sff::NodeKind;

const CANVAS_MARGIN: f64 = 100.0;

pub fn export_svg(flow: &CompiledFlow, layout: &Layout) -> String {
    let metrics = TextMetrics::default();
    let is_tb = layout.direction.is_tb();

    // Canvas bounds from node boxes and edge polylines.
    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for node in layout.nodes.values() {
        min_x = min_x.min(node.left());
        min_y = min_y.min(node.top());
        max_x = max_x.max(node.right());
        max_y = max_y.max(node.bottom());
    }
    for edge in layout.edges.values() {
        for &(x, y) in &edge.points {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
    }
    if layout.nodes.is_empty() {
        min_x = 0.0;
        min_y = 0.0;
        max_x = 800.0;
        max_y = 600.0;
    }
    min_x -= CANVAS_MARGIN;
    min_y -= CANVAS_MARGIN;
    max_x += CANVAS_MARGIN;
    max_y += CANVAS_MARGIN;
    let width = max_x - min_x;
    let height = max_y - min_y;

    let mut svg = String::new();
    writeln!(&mut svg, r#"<?xml version="1.0" encoding="UTF-8"?>"#).unwrap();
    writeln!(
        &mut svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="{} {} {} {}">"#,
        min_x, min_y, width, height
    )
    .unwrap();
    writeln!(
        &mut svg,
        r#"<style>
  .lane {{ fill: #f8f9fa; stroke: #dee2e6; stroke-width: 2; }}
  .lane-title {{ font-family: sans-serif; font-size: 16px; font-weight: bold; fill: #495057; text-anchor: middle; }}
  .node {{ fill: #ffffff; stroke: #333333; stroke-width: 2; }}
  .delay {{ fill: #f3e5f5; }}
  .label {{ font-family: sans-serif; font-size: 13px; fill: #333; text-anchor: middle; }}
  .edge {{ fill: none; stroke: #666; stroke-width: 2; marker-end: url(#arrow); }}
  .edge-label {{ font-family: sans-serif; font-size: 11px; fill: #666; text-anchor: middle; }}
</style>"#
    )
    .unwrap();
    writeln!(
        &mut svg,
        r##"<defs><marker id="arrow" viewBox="0 -5 10 10" refX="8" refY="0" markerWidth="6" markerHeight="6" orient="auto"><path d="M0,-5L10,0L0,5" fill="#666"/></marker></defs>"##
    )
    .unwrap();

    // Lanes as full-height (TB) or full-width (LR) bands.
    for (lane_id, lane) in &layout.lanes {
        let title = flow
            .lanes
            .get(lane_id)
            .map(|l| if l.title.is_empty() { lane_id.clone() } else { l.title.clone() })
            .unwrap_or_else(|| lane_id.clone());
        if is_tb {
            let span = lane.end - lane.start;
            writeln!(
                &mut svg,
                r#"<rect class="lane" x="{}" y="{}" width="{}" height="{}" />"#,
                lane.start, min_y, span, height
            )
            .unwrap();
            writeln!(
                &mut svg,
                r#"<text class="lane-title" x="{}" y="{}">{}</text>"#,
                lane.center(),
                min_y + 30.0,
                escape_xml(&title)
            )
            .unwrap();
        } else {
            let span = lane.end - lane.start;
            writeln!(
                &mut svg,
                r#"<rect class="lane" x="{}" y="{}" width="{}" height="{}" />"#,
                min_x, lane.start, width, span
            )
            .unwrap();
            let tx = min_x + 30.0;
            let ty = lane.center();
            writeln!(
                &mut svg,
                r#"<text class="lane-title" x="{}" y="{}" transform="rotate(-90 {},{})">{}</text>"#,
                tx,
                ty,
                tx,
                ty,
                escape_xml(&title)
            )
            .unwrap();
        }
    }

    // Edges behind nodes.
    for (edge_id, edge) in &layout.edges {
        if edge.points.is_empty() {
            continue;
        }
        let mut d = format!("M {},{}", edge.points[0].0, edge.points[0].1);
        for &(x, y) in &edge.points[1..] {
            write!(&mut d, " L {},{}", x, y).unwrap();
        }
        writeln!(&mut svg, r#"<path class="edge" d="{}" />"#, d).unwrap();

        if let Some(label) = flow.edges.get(edge_id).and_then(|e| edge_label(e)) {
            let mid = edge.points.len() / 2;
            let (ax, ay) = edge.points[mid - 1];
            let (bx, by) = edge.points[mid];
            writeln!(
                &mut svg,
                r#"<text class="edge-label" x="{}" y="{}">{}</text>"#,
                (ax + bx) / 2.0,
                (ay + by) / 2.0 - 5.0,
                escape_xml(&label)
            )
            .unwrap();
        }
    }

    // Nodes.
    for (node_id, node) in &layout.nodes {
        let Some(ir_node) = flow.nodes.get(node_id) else {
            continue;
        };
        let label = if ir_node.label.is_empty() { node_id } else { &ir_node.label };
        render_node(&mut svg, &metrics, node, ir_node.kind, label);
    }

    writeln!(&mut svg, "</svg>").unwrap();
    svg
}

fn edge_label(edge: &crate::ir::Edge) -> Option<String> {
    edge.label
        .clone()
        .or_else(|| edge.branch.clone())
        .filter(|s| !s.is_empty())
}

fn render_node(
    svg: &mut String,
    metrics: &TextMetrics,
    node: &LayoutNode,
    kind: NodeKind,
    label: &str,
) {
    match kind {
        NodeKind::Start | NodeKind::End => {
            let r = node.width.min(node.height) / 2.0;
            writeln!(
                svg,
                r#"<circle class="node" cx="{}" cy="{}" r="{}" />"#,
                node.x, node.y, r
            )
            .unwrap();
            if kind == NodeKind::End {
                writeln!(
                    svg,
                    r##"<circle cx="{}" cy="{}" r="{}" fill="none" stroke="#333" stroke-width="2" />"##,
                    node.x,
                    node.y,
                    r - 4.0
                )
                .unwrap();
            }
            writeln!(
                svg,
                r#"<text class="label" x="{}" y="{}">{}</text>"#,
                node.x,
                node.y + r + 18.0,
                escape_xml(label)
            )
            .unwrap();
        }
        NodeKind::Decision => {
            let points = format!(
                "{},{} {},{} {},{} {},{}",
                node.x,
                node.top(),
                node.right(),
                node.y,
                node.x,
                node.bottom(),
                node.left(),
                node.y
            );
            writeln!(svg, r#"<polygon class="node" points="{}" />"#, points).unwrap();
            writeln!(
                svg,
                r#"<text class="label" x="{}" y="{}">{}</text>"#,
                node.x,
                node.bottom() + 18.0,
                escape_xml(label)
            )
            .unwrap();
        }
        NodeKind::Process | NodeKind::Delay => {
            let class = if kind == NodeKind::Delay { "node delay" } else { "node" };
            writeln!(
                svg,
                r#"<rect class="{}" x="{}" y="{}" width="{}" height="{}" rx="8" />"#,
                class,
                node.left(),
                node.top(),
                node.width,
                node.height
            )
            .unwrap();
            let lines = metrics.wrap_label(label, node.width - 16.0);
            let mut ty =
                node.y - (lines.len() as f64 - 1.0) * metrics.line_height / 2.0 + 4.0;
            for line in lines {
                writeln!(
                    svg,
                    r#"<text class="label" x="{}" y="{}">{}</text>"#,
                    node.x,
                    ty,
                    escape_xml(&line)
                )
                .unwrap();
                ty += metrics.line_height;
            }
        }
    }
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
