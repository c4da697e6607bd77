//! Graphviz DOT export with one cluster per lane.

use std::fmt::Write;

use crate::ir::CompiledFlow;
use crate::sff::NodeKind;

use super::ordered_lane_ids;

pub fn export_dot(flow: &CompiledFlow) -> String {
    let direction = flow.direction();
    let mut out = String::new();
    writeln!(&mut out, "digraph G {{").unwrap();
    writeln!(&mut out, "  rankdir={};", direction.as_str()).unwrap();

    for lane_id in ordered_lane_ids(flow) {
        let lane = &flow.lanes[&lane_id];
        let title = if lane.title.is_empty() { &lane_id } else { &lane.title };
        writeln!(&mut out, "  subgraph cluster_{} {{", lane_id).unwrap();
        writeln!(&mut out, "    label=\"{}\";", escape(title)).unwrap();
        for node in flow.nodes.values().filter(|n| n.lane == lane_id) {
            let label = if node.label.is_empty() { &node.id } else { &node.label };
            let shape = match node.kind {
                NodeKind::Start => "circle",
                NodeKind::End => "doublecircle",
                NodeKind::Decision => "diamond",
                NodeKind::Delay => "cds",
                NodeKind::Process => "box",
            };
            writeln!(
                &mut out,
                "    {} [label=\"{}\", shape={}];",
                node.id,
                escape(label),
                shape
            )
            .unwrap();
        }
        writeln!(&mut out, "  }}").unwrap();
    }

    for edge in flow.edges.values() {
        let label = edge
            .label
            .as_deref()
            .or(edge.branch.as_deref())
            .unwrap_or("");
        if label.is_empty() {
            writeln!(&mut out, "  {} -> {};", edge.from, edge.to).unwrap();
        } else {
            writeln!(
                &mut out,
                "  {} -> {} [label=\"{}\"];",
                edge.from,
                edge.to,
                escape(label)
            )
            .unwrap();
        }
    }

    writeln!(&mut out, "}}").unwrap();
    out
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile_document;

    #[test]
    fn test_dot_structure() {
        let flow = compile_document(
            serde_json::from_str(
                r#"{
                    "sff": {"direction": "TB"},
                    "entry": {"start": "s", "ends": ["e"]},
                    "lanes": {"L1": {"title": "Main", "order": 1}},
                    "nodes": {
                        "s": {"type": "start", "lane": "L1", "label": "Start"},
                        "d": {"type": "decision", "lane": "L1", "label": "Ok?",
                              "branches": {"true": {"next": "e"}, "false": {"next": "p"}}},
                        "p": {"type": "process", "lane": "L1", "label": "Rework"},
                        "e": {"type": "end", "lane": "L1", "label": "End"}
                    },
                    "edges": [
                        {"from": "s", "to": "p"},
                        {"from": "p", "to": "d"},
                        {"from": "d", "to": "e", "branch": "true"},
                        {"from": "d", "to": "p", "branch": "false"}
                    ]
                }"#,
            )
            .unwrap(),
        )
        .unwrap();

        let text = export_dot(&flow);
        assert!(text.starts_with("digraph G {"));
        assert!(text.contains("rankdir=TB;"));
        assert!(text.contains("subgraph cluster_L1 {"));
        assert!(text.contains("label=\"Main\";"));
        assert!(text.contains("d [label=\"Ok?\", shape=diamond];"));
        assert!(text.contains("e [label=\"End\", shape=doublecircle];"));
        assert!(text.contains("d -> e [label=\"true\"];"));
        assert!(text.contains("s -> p;"));
        assert!(text.trim_end().ends_with('}'));
    }

    #[test]
    fn test_dot_escapes_quotes() {
        let flow = compile_document(
            serde_json::from_str(
                r#"{
                    "sff": {"direction": "TB"},
                    "entry": {"start": "s", "ends": ["e"]},
                    "lanes": {"L1": {"title": "Main", "order": 1}},
                    "nodes": {
                        "s": {"type": "start", "lane": "L1", "label": "Say \"hi\""},
                        "e": {"type": "end", "lane": "L1", "label": "End"}
                    },
                    "edges": [{"from": "s", "to": "e"}]
                }"#,
            )
            .unwrap(),
        )
        .unwrap();
        let text = export_dot(&flow);
        assert!(text.contains(r#"label="Say \"hi\"""#));
    }
}
