//! Placeholder advisory checkers: bias, ethics, evidence, safety, priority.
//!
//! These report fixed scores with a few hint- and result-driven switches. They exist so
//! the summary carries a stable shape while real heuristics are developed.

use super::MetaContext;
use oce_common::{ModuleOutput, ModuleResult};
use serde_json::{json, Value};

/// Priority score at or above which the recommendation becomes "publish"
const PUBLISH_THRESHOLD: f64 = 7.5;

pub fn bias_sentinel(ctx: &MetaContext<'_>) -> Value {
    let depth = ctx.hints.f64("recursions").unwrap_or(0.0).max(0.0) as u64;
    json!({
        "alerts": [],
        "exposure": 1,
        "recursion_depth": depth,
    })
}

/// Requires at least one counter-position in the assembled report
pub fn cfl_ethics(ctx: &MetaContext<'_>) -> Value {
    let mut warnings = Vec::new();
    if !ctx.assembled.contains("Counter") {
        warnings.push("No counterpoints detected.");
    }
    json!({
        "cfl_score": 5.0,
        "warnings": warnings,
        "predictions": ["If data X contradicts assumption Y, revise."],
    })
}

/// Modules whose numbers come from built-in demo data, not the request
fn placeholder_inputs(results: &[ModuleResult]) -> Vec<&'static str> {
    results
        .iter()
        .filter(|r| match &r.output {
            ModuleOutput::StrategyMcda(o) => o.demo_options,
            ModuleOutput::RiskExpectedLoss(o) => o.fallback_used,
            _ => false,
        })
        .map(|r| r.module.display_name())
        .collect()
}

/// Time-sensitive claims without citations score low; so do results
/// computed on demo data
pub fn evidence_engine(ctx: &MetaContext<'_>) -> Value {
    let timely = ctx.hints.bool("timely").unwrap_or(false);
    let has_citations = ctx
        .hints
        .array("citations")
        .is_some_and(|c| !c.is_empty());
    let missing_sources = timely && !has_citations;
    let placeholders = placeholder_inputs(ctx.results);

    let mut score: f64 = if missing_sources { 3.0 } else { 6.0 };
    if !placeholders.is_empty() {
        score -= 1.0;
    }
    json!({
        "evidence_score": score,
        "missing_sources": missing_sources,
        "placeholder_inputs": placeholders,
    })
}

pub fn safety_gate(_ctx: &MetaContext<'_>) -> Value {
    json!({
        "status": "allow",
        "reasons": [],
    })
}

pub fn gps_prioritizer(_ctx: &MetaContext<'_>) -> Value {
    let gps = 6.5;
    let recommendation = if gps < PUBLISH_THRESHOLD {
        "prototype"
    } else {
        "publish"
    };
    json!({
        "gps_score": gps,
        "recommendation": recommendation,
    })
}
