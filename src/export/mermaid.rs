//! Deterministic Mermaid flowchart export.

use std::fmt::Write;

use crate::ir::CompiledFlow;
use crate::sff::NodeKind;

use super::ordered_lane_ids;

pub fn export_mermaid(flow: &CompiledFlow) -> String {
    let direction = flow.direction();
    let mut out = String::new();
    writeln!(&mut out, "flowchart {}", direction.as_str()).unwrap();

    for lane_id in ordered_lane_ids(flow) {
        let lane = &flow.lanes[&lane_id];
        let title = if lane.title.is_empty() { &lane_id } else { &lane.title };
        writeln!(&mut out, "subgraph {}[\"{}\"]", lane_id, escape(title)).unwrap();
        for node in flow.nodes.values().filter(|n| n.lane == lane_id) {
            let label = escape(if node.label.is_empty() { &node.id } else { &node.label });
            let shape = match node.kind {
                NodeKind::Start | NodeKind::End => format!("((\"{}\"))", label),
                NodeKind::Decision => format!("{{\"{}\"}}", label),
                NodeKind::Delay => format!("[/\"{}\"/]", label),
                NodeKind::Process => format!("[\"{}\"]", label),
            };
            writeln!(&mut out, "    {}{}", node.id, shape).unwrap();
        }
        writeln!(&mut out, "end").unwrap();
    }

    for edge in flow.edges.values() {
        let label = edge
            .label
            .as_deref()
            .or(edge.branch.as_deref())
            .unwrap_or("");
        if label.is_empty() {
            writeln!(&mut out, "{} --> {}", edge.from, edge.to).unwrap();
        } else {
            writeln!(&mut out, "{} -->|{}| {}", edge.from, escape(label), edge.to).unwrap();
        }
    }

    out
}

fn escape(s: &str) -> String {
    s.replace('"', "#quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile_document;

    fn compile(input: &str) -> CompiledFlow {
        compile_document(serde_json::from_str(input).unwrap()).unwrap()
    }

    #[test]
    fn test_mermaid_structure() {
        let flow = compile(
            r#"{
                "sff": {"direction": "TB"},
                "entry": {"start": "s", "ends": ["e"]},
                "lanes": {"L1": {"title": "Main", "order": 1}},
                "nodes": {
                    "s": {"type": "start", "lane": "L1", "label": "Start"},
                    "d": {"type": "decision", "lane": "L1", "label": "Ok?",
                          "branches": {"true": {"next": "e"}, "false": {"next": "w"}}},
                    "w": {"type": "delay", "lane": "L1", "label": "Wait"},
                    "e": {"type": "end", "lane": "L1", "label": "End"}
                },
                "edges": [
                    {"from": "s", "to": "d"},
                    {"from": "d", "to": "e", "branch": "true"},
                    {"from": "d", "to": "w", "branch": "false"},
                    {"from": "w", "to": "e"}
                ]
            }"#,
        );
        let text = export_mermaid(&flow);
        assert!(text.starts_with("flowchart TB"));
        assert!(text.contains("subgraph L1[\"Main\"]"));
        assert!(text.contains("s((\"Start\"))"));
        assert!(text.contains("d{\"Ok?\"}"));
        assert!(text.contains("w[/\"Wait\"/]"));
        assert!(text.contains("d -->|true| e"));
        assert!(text.contains("w --> e"));
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn test_mermaid_is_deterministic() {
        let input = r#"{
            "sff": {"direction": "LR"},
            "entry": {"start": "s", "ends": ["e"]},
            "lanes": {
                "L2": {"title": "Second", "order": 2},
                "L1": {"title": "First", "order": 1}
            },
            "nodes": {
                "s": {"type": "start", "lane": "L1", "label": "Start"},
                "p": {"type": "process", "lane": "L2", "label": "Work"},
                "e": {"type": "end", "lane": "L2", "label": "End"}
            },
            "edges": [
                {"from": "s", "to": "p"},
                {"from": "p", "to": "e"}
            ]
        }"#;
        let a = export_mermaid(&compile(input));
        let b = export_mermaid(&compile(input));
        assert_eq!(a, b);
        // Lane order is the display order.
        let first = a.find("subgraph L1").unwrap();
        let second = a.find("subgraph L2").unwrap();
        assert!(first < second);
        assert!(a.starts_with("flowchart LR"));
    }
}
