//! Text report rendering.

use crate::meta::explain::explain_card;
use crate::router::RouteResult;
use oce_common::Summary;

pub const REPORT_TITLE: &str = "# OCE-CORE SUMMARY OUTPUT";

/// Render the consolidated report: header, module blocks in run order,
/// MetaCore annotations, the optional explain card and any warnings.
pub fn render(summary: &Summary, route: &RouteResult, explain: bool) -> String {
    let active = if summary.applied_modules.is_empty() {
        "-".to_string()
    } else {
        summary
            .applied_modules
            .iter()
            .map(|m| m.display_name())
            .collect::<Vec<_>>()
            .join(", ")
    };

    let mut blocks = vec![format!(
        "{}\nACTIVE MODULES: {}\nCORE TASK: ['{}']\nHEURISTIC PATH: {}",
        REPORT_TITLE,
        active,
        summary.intent,
        route.heuristic_path()
    )];

    for kind in &summary.applied_modules {
        if let Some(result) = summary.module(*kind) {
            blocks.push(result.markdown.clone());
        }
    }

    let mut meta = vec![format!("## META\nPOLICY: {}", summary.policy_decision)];
    for (name, value) in &summary.meta {
        meta.push(format!("- {}: {}", name, value));
    }
    blocks.push(meta.join("\n"));

    if explain {
        blocks.push(explain_card());
    }

    if !summary.warnings.is_empty() {
        let mut lines = vec!["## WARNINGS".to_string()];
        lines.extend(summary.warnings.iter().map(|w| format!("- {}", w)));
        blocks.push(lines.join("\n"));
    }

    blocks.join("\n\n") + "\n"
}
