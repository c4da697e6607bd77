//! Exporters consuming the compiled IR and/or the geometric layout.

pub mod dot;
pub mod json;
pub mod lanes_only;
pub mod mermaid;
pub mod svg;

use crate::ir::CompiledFlow;
use crate::layout::Layout;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Svg,
    Mermaid,
    Dot,
    Json,
}

impl ExportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "svg" => Some(Self::Svg),
            "mermaid" => Some(Self::Mermaid),
            "dot" => Some(Self::Dot),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Svg => "svg",
            Self::Mermaid => "mmd",
            Self::Dot => "dot",
            Self::Json => "json",
        }
    }
}

/// Render a compiled flow in the requested format. `lanes_only` swaps the
/// geometric SVG for the rank-grid lane preview.
pub fn export(
    flow: &CompiledFlow,
    layout: &Layout,
    format: ExportFormat,
    lanes_only: bool,
) -> String {
    match format {
        ExportFormat::Svg if lanes_only => lanes_only::export_lanes_only(flow),
        ExportFormat::Svg => svg::export_svg(flow, layout),
        ExportFormat::Mermaid => mermaid::export_mermaid(flow),
        ExportFormat::Dot => dot::export_dot(flow),
        ExportFormat::Json => json::export_json(flow, layout),
    }
}

/// Lanes in display order: by `order`, then id.
pub(crate) fn ordered_lane_ids(flow: &CompiledFlow) -> Vec<String> {
    let mut ids: Vec<&String> = flow.lanes.keys().collect();
    ids.sort_by(|a, b| {
        flow.lanes[*a]
            .order
            .cmp(&flow.lanes[*b].order)
            .then_with(|| a.cmp(b))
    });
    ids.into_iter().cloned().collect()
}
