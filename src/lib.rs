pub mod compiler;
pub mod export;
pub mod ir;
pub mod layout;
pub mod measure;
pub mod reader;
pub mod sff;
pub mod validator;

use wasm_bindgen::prelude::*;

use export::{export, ExportFormat};
use layout::LayoutEngine;

#[wasm_bindgen(start)]
fn init() {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();
}

fn parse_and_compile(source: &str) -> Result<ir::CompiledFlow, String> {
    let value: serde_json::Value = serde_json::from_str(source).map_err(|e| e.to_string())?;
    compiler::compile_value(&value).map_err(|e| e.to_string())
}

/// Render an SFF document (JSON text) to SVG.
#[wasm_bindgen(js_name = "sffToSvg")]
pub fn sff_to_svg(source: &str) -> Result<String, String> {
    let flow = parse_and_compile(source)?;
    let layout = LayoutEngine::default()
        .generate(&flow)
        .map_err(|e| e.to_string())?;
    Ok(export(&flow, &layout, ExportFormat::Svg, false))
}

/// Render an SFF document to an SVG data URI (for use with <img src={...}>)
#[wasm_bindgen(js_name = "sffToDataUri")]
pub fn sff_to_data_uri(source: &str) -> Result<String, String> {
    let svg = sff_to_svg(source)?;
    Ok(format!(
        "data:image/svg+xml,{}",
        js_sys::encode_uri_component(&svg)
    ))
}

/// Compile an SFF document and return the enriched cpff as stable JSON.
#[wasm_bindgen(js_name = "compileSff")]
pub fn compile_sff(source: &str) -> Result<String, String> {
    let flow = parse_and_compile(source)?;
    Ok(flow.to_pretty_json())
}

/// Render an SFF document as a Mermaid flowchart.
#[wasm_bindgen(js_name = "sffToMermaid")]
pub fn sff_to_mermaid(source: &str) -> Result<String, String> {
    let flow = parse_and_compile(source)?;
    Ok(export::mermaid::export_mermaid(&flow))
}

#[cfg(test)]
mod tests {
    use super::*;

    const FLOW: &str = r#"{
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

    #[test]
    fn test_sff_to_svg() {
        let svg = sff_to_svg(FLOW).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("Work"));
    }

    #[test]
    fn test_compile_sff() {
        let json = compile_sff(FLOW).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["cpff"]["version"], "1.0");
        assert_eq!(value["cpff"]["stats"]["nodes_total"], 3);
    }

    #[test]
    fn test_sff_to_mermaid() {
        let text = sff_to_mermaid(FLOW).unwrap();
        assert!(text.starts_with("flowchart TB"));
    }

    #[test]
    fn test_invalid_source_reports_error() {
        let err = sff_to_svg("{}").unwrap_err();
        assert!(err.starts_with("SFF_STRUCTURAL_ERROR"));
    }
}
