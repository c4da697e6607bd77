//! Structural and logical validation of SFF documents.
//!
//! Both validators return an ordered list of error strings; an empty list
//! means the document passed. Structural errors make the document unreadable
//! for the compiler; logical errors abort compilation but not reading.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde_json::Value;

use crate::sff::{NodeKind, SffDocument};

const REQUIRED_BLOCKS: [&str; 5] = ["sff", "entry", "lanes", "nodes", "edges"];

/// Check the presence and top-level shape of the required blocks.
pub fn validate_structure(data: &Value) -> Vec<String> {
    let mut errors = Vec::new();

    let Some(map) = data.as_object() else {
        errors.push("Document root must be a JSON object".to_string());
        return errors;
    };

    for block in REQUIRED_BLOCKS {
        if !map.contains_key(block) {
            errors.push(format!("Missing required block: {}", block));
        }
    }

    for block in ["sff", "entry", "lanes", "nodes"] {
        if let Some(v) = map.get(block) {
            if !v.is_object() {
                errors.push(format!("Block '{}' must be an object", block));
            }
        }
    }
    if let Some(v) = map.get("edges") {
        if !v.is_array() {
            errors.push("Block 'edges' must be an array".to_string());
        }
    }

    errors
}

/// Check the flow rules on a structurally valid, typed document.
pub fn validate_logic(doc: &SffDocument) -> Vec<String> {
    let mut errors = Vec::new();

    // 1. Exactly one start node, and it must be entry.start.
    let start_nodes: Vec<&String> = doc
        .nodes
        .iter()
        .filter(|(_, n)| n.kind == NodeKind::Start)
        .map(|(id, _)| id)
        .collect();
    if start_nodes.len() != 1 {
        errors.push("There must be exactly one node of type 'start'".to_string());
    } else if doc.entry.start != *start_nodes[0] {
        errors.push(format!(
            "entry.start ('{}') must be the 'start' node ('{}')",
            doc.entry.start, start_nodes[0]
        ));
    }

    // 2. At least one end node, each listed in entry.ends.
    let end_nodes: Vec<&String> = doc
        .nodes
        .iter()
        .filter(|(_, n)| n.kind == NodeKind::End)
        .map(|(id, _)| id)
        .collect();
    if end_nodes.is_empty() {
        errors.push("There must be at least one node of type 'end'".to_string());
    } else {
        let entry_ends: BTreeSet<&str> = doc.entry.ends.iter().map(String::as_str).collect();
        for end_id in &end_nodes {
            if !entry_ends.contains(end_id.as_str()) {
                errors.push(format!("End node '{}' is not listed in entry.ends", end_id));
            }
        }
    }

    // 3. Edge endpoints and lane references must exist.
    for edge in &doc.edges {
        if !doc.nodes.contains_key(&edge.from) {
            errors.push(format!("Edge references unknown source node '{}'", edge.from));
        }
        if !doc.nodes.contains_key(&edge.to) {
            errors.push(format!("Edge references unknown target node '{}'", edge.to));
        }
    }
    for (node_id, node) in &doc.nodes {
        if !doc.lanes.contains_key(&node.lane) {
            errors.push(format!(
                "Node '{}' references unknown lane '{}'",
                node_id, node.lane
            ));
        }
    }

    // 4. The start node has no incoming edges; end nodes have no outgoing.
    if let Some(&start_id) = start_nodes.first() {
        if doc.edges.iter().any(|e| e.to == *start_id) {
            errors.push(format!("Start node '{}' must not have incoming edges", start_id));
        }
    }
    for end_id in &end_nodes {
        if doc.edges.iter().any(|e| e.from == **end_id) {
            errors.push(format!("End node '{}' must not have outgoing edges", end_id));
        }
    }

    // 5. Every node reachable from entry.start.
    if doc.nodes.contains_key(&doc.entry.start) {
        let mut next: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for edge in &doc.edges {
            next.entry(edge.from.as_str()).or_default().push(edge.to.as_str());
        }
        let mut reachable: BTreeSet<&str> = BTreeSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        reachable.insert(doc.entry.start.as_str());
        queue.push_back(doc.entry.start.as_str());
        while let Some(curr) = queue.pop_front() {
            for &to in next.get(curr).into_iter().flatten() {
                if reachable.insert(to) {
                    queue.push_back(to);
                }
            }
        }
        for node_id in doc.nodes.keys() {
            if !reachable.contains(node_id.as_str()) {
                errors.push(format!("Node '{}' is not reachable from start", node_id));
            }
        }
    }

    // 6. No isolated nodes.
    for node_id in doc.nodes.keys() {
        let touched = doc
            .edges
            .iter()
            .any(|e| e.from == *node_id || e.to == *node_id);
        if !touched {
            errors.push(format!("Node '{}' is isolated (no incoming or outgoing edges)", node_id));
        }
    }

    // 7. Decision nodes: true/false branches present, targets exist, and a
    // matching edge is declared for each branch.
    for (node_id, node) in &doc.nodes {
        if node.kind != NodeKind::Decision {
            continue;
        }
        let branches = node.branches.clone().unwrap_or_default();
        for key in ["true", "false"] {
            let Some(branch) = branches.get(key) else {
                errors.push(format!(
                    "Decision '{}' must declare branches 'true' and 'false'",
                    node_id
                ));
                continue;
            };
            if !doc.nodes.contains_key(&branch.next) {
                errors.push(format!(
                    "Decision '{}' branch '{}' targets unknown node '{}'",
                    node_id, key, branch.next
                ));
            }
            let matched = doc.edges.iter().any(|e| {
                e.from == *node_id && e.to == branch.next && e.branch.as_deref() == Some(key)
            });
            if !matched {
                errors.push(format!(
                    "Decision '{}' branch '{}' has no matching edge to '{}'",
                    node_id, key, branch.next
                ));
            }
        }
    }

    errors
}
