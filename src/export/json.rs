//! Combined JSON export: source document, compiled IR and geometric layout
//! in one stable, versioned object.

use serde_json::json;

use crate::ir::CompiledFlow;
use crate::layout::Layout;

pub const EXPORT_VERSION: &str = "1.0";

pub fn export_json(flow: &CompiledFlow, layout: &Layout) -> String {
    let obj = json!({
        "sff": flow.sff_source.sff,
        "entry": flow.sff_source.entry,
        "lanes": flow.sff_source.lanes,
        "nodes": flow.sff_source.nodes,
        "edges": flow.sff_source.edges,
        "compiled": {
            "cpff": flow.cpff,
            "lanes": flow.lanes,
            "nodes": flow.nodes,
            "edges": flow.edges,
        },
        "layout": layout,
        "export_version": EXPORT_VERSION,
    });
    let mut out = serde_json::to_string_pretty(&obj).expect("export serialization cannot fail");
    out.push('\n');
    out
}
