//! Final consistency check over a finished summary.
//!
//! Never fails a run: every problem becomes a warning on the summary and
//! clears `valid`. Missing required sections are also listed in
//! `missing_sections`.

use crate::meta;
use oce_common::Summary;
use tracing::warn;

const SUM_TOLERANCE: f64 = 1e-6;

/// Validate `summary` in place; returns the number of problems found
pub fn validate(summary: &mut Summary) -> usize {
    let mut problems: Vec<String> = Vec::new();
    let mut missing_sections: Vec<String> = Vec::new();

    // 1) Every selected module produced a result with its required sections
    for kind in &summary.applied_modules {
        let Some(result) = summary.modules.get(kind.key()) else {
            problems.push(format!("Missing result for module {}", kind));
            continue;
        };
        if result.module != *kind {
            problems.push(format!(
                "Result stored under {} belongs to {}",
                kind.key(),
                result.module
            ));
        }
        for required in kind.required_sections() {
            let present = result
                .sections_present
                .iter()
                .any(|s| s.starts_with(required));
            if !present {
                missing_sections.push(required.to_string());
                problems.push(format!("{} is missing section '{}'", kind, required));
            }
        }
    }

    // 2) MCDA invariants
    if let Some(mcda) = summary.mcda() {
        if !mcda.ranking.is_empty() && (mcda.score_sum() - 1.0).abs() > SUM_TOLERANCE {
            problems.push(format!("MCDA scores sum to {:.6}, expected 1", mcda.score_sum()));
        }
        if !mcda.criteria.is_empty() && (mcda.weight_sum() - 1.0).abs() > SUM_TOLERANCE {
            problems.push(format!("MCDA weights sum to {:.6}, expected 1", mcda.weight_sum()));
        }
        if mcda.ranking.windows(2).any(|w| w[0].score < w[1].score) {
            problems.push("MCDA ranking is not sorted by score".to_string());
        }
    }

    // 3) Risk totals
    if let Some(risk) = summary.risk() {
        for (name, value) in [
            ("EL_total_before", risk.el_total_before),
            ("EL_total_after", risk.el_total_after),
            ("Risk-reduction", risk.risk_reduction),
        ] {
            if !value.is_finite() || value < 0.0 {
                problems.push(format!("Risk {} is invalid: {}", name, value));
            }
        }
    }

    // 4) Router confidence
    if !(0.0..=1.0).contains(&summary.confidence) {
        problems.push(format!("Confidence {} outside [0, 1]", summary.confidence));
    }

    // 5) MetaCore annotations
    for name in meta::names() {
        if !summary.meta.contains_key(name) {
            problems.push(format!("Missing MetaCore annotation '{}'", name));
        }
    }

    for section in missing_sections {
        if !summary.missing_sections.contains(&section) {
            summary.missing_sections.push(section);
        }
    }
    summary.missing_sections.sort();

    let count = problems.len();
    for problem in problems {
        warn!("Validator: {}", problem);
        summary.warn(problem);
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::modules::{run_module, ModuleInput};
    use oce_common::{Hints, ModuleKind};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn summary_with(kinds: &[ModuleKind]) -> Summary {
        let config = Config::default();
        let hints = Hints::new();
        let mut modules = BTreeMap::new();
        for kind in kinds {
            let input = ModuleInput {
                text: "Should we enter market A or B?",
                hints: &hints,
                notes: &[],
                prior: &[],
                config: &config,
            };
            modules.insert(kind.key().to_string(), run_module(*kind, &input));
        }
        let meta = meta::names()
            .map(|n| (n.to_string(), json!({})))
            .collect();
        Summary {
            intent: "strategic".into(),
            confidence: 0.67,
            intents_ranked: Vec::new(),
            keyword_hits: BTreeMap::new(),
            triggers_hit: Vec::new(),
            heuristic_self_check: "ok".into(),
            policy_max_modules: 3,
            applied_modules: kinds.to_vec(),
            modules,
            meta,
            sections_present: Vec::new(),
            missing_sections: Vec::new(),
            policy_decision: "allow".into(),
            project_id: None,
            notes: Vec::new(),
            warnings: Vec::new(),
            valid: true,
        }
    }

    #[test]
    fn test_complete_summary_is_valid() {
        let mut summary = summary_with(&ModuleKind::ALL);
        assert_eq!(validate(&mut summary), 0);
        assert!(summary.valid);
        assert!(summary.warnings.is_empty());
    }

    #[test]
    fn test_missing_module_flagged() {
        let mut summary = summary_with(&[ModuleKind::Structure]);
        summary.applied_modules.push(ModuleKind::RiskExpectedLoss);
        assert_eq!(validate(&mut summary), 1);
        assert!(!summary.valid);
        assert!(summary.warnings[0].contains("RiskExpectedLoss"));
        // Results are kept
        assert!(summary.module(ModuleKind::Structure).is_some());
    }

    #[test]
    fn test_missing_section_recorded() {
        let mut summary = summary_with(&[ModuleKind::Structure]);
        if let Some(result) = summary.modules.get_mut("structure") {
            result.sections_present.retain(|s| s != "Next Step");
        }
        validate(&mut summary);
        assert_eq!(summary.missing_sections, vec!["Next Step"]);
        assert!(!summary.valid);
    }

    #[test]
    fn test_bad_confidence_and_meta() {
        let mut summary = summary_with(&[ModuleKind::Structure]);
        summary.confidence = 1.5;
        summary.meta.remove("safety_gate");
        assert_eq!(validate(&mut summary), 2);
    }

    #[test]
    fn test_broken_mcda_scores() {
        let mut summary = summary_with(&[ModuleKind::Structure, ModuleKind::StrategyMcda]);
        if let Some(result) = summary.modules.get_mut("strategy_mcda") {
            if let oce_common::ModuleOutput::StrategyMcda(mcda) = &mut result.output {
                mcda.ranking[1].score = 0.9;
            }
        }
        validate(&mut summary);
        assert!(summary.warnings.iter().any(|w| w.contains("scores sum")));
        assert!(summary.warnings.iter().any(|w| w.contains("not sorted")));
    }
}
