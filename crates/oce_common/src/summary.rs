//! Run summary: module results, MetaCore annotations and validation state.

use crate::notes::SessionNote;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Primary scoring modules, in canonical pipeline order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ModuleKind {
    #[serde(rename = "Structure")]
    Structure,
    #[serde(rename = "StrategyMCDA")]
    StrategyMcda,
    #[serde(rename = "RiskExpectedLoss")]
    RiskExpectedLoss,
    #[serde(rename = "CFL")]
    Cfl,
}

impl std::fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl ModuleKind {
    pub const ALL: [ModuleKind; 4] = [
        ModuleKind::Structure,
        ModuleKind::StrategyMcda,
        ModuleKind::RiskExpectedLoss,
        ModuleKind::Cfl,
    ];

    /// Key used in `Summary.modules`
    pub fn key(&self) -> &'static str {
        match self {
            Self::Structure => "structure",
            Self::StrategyMcda => "strategy_mcda",
            Self::RiskExpectedLoss => "risk_expected_loss",
            Self::Cfl => "cfl",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Structure => "Structure",
            Self::StrategyMcda => "StrategyMCDA",
            Self::RiskExpectedLoss => "RiskExpectedLoss",
            Self::Cfl => "CFL",
        }
    }

    /// Parse a display name, summary key or common short form
    pub fn from_name(s: &str) -> Option<Self> {
        let normalized: String = s
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        match normalized.as_str() {
            "structure" => Some(Self::Structure),
            "strategymcda" | "mcda" | "strategy" => Some(Self::StrategyMcda),
            "riskexpectedloss" | "risk" | "expectedloss" => Some(Self::RiskExpectedLoss),
            "cfl" | "falsification" => Some(Self::Cfl),
            _ => None,
        }
    }

    /// Sections a complete result of this module must carry
    pub fn required_sections(&self) -> &'static [&'static str] {
        match self {
            Self::Structure => &["Thesis", "Key Points", "Actions", "Next Step"],
            Self::StrategyMcda => &["Criteria", "Weights", "Options", "Scores", "Recommendation"],
            Self::RiskExpectedLoss => &["Top Risks", "Expected Loss", "Mitigation"],
            Self::Cfl => &["Falsifiable Claim", "Counterarguments", "Tests / Predictions"],
        }
    }
}

/// Output of one module for one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleResult {
    pub module: ModuleKind,
    pub sections_present: Vec<String>,
    pub output: ModuleOutput,
    /// Rendered block for the text report
    pub markdown: String,
}

/// Named computed values, one shape per module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModuleOutput {
    Structure(StructureOutcome),
    StrategyMcda(McdaOutcome),
    RiskExpectedLoss(RiskOutcome),
    Cfl(CflOutcome),
}

impl ModuleOutput {
    pub fn as_mcda(&self) -> Option<&McdaOutcome> {
        match self {
            Self::StrategyMcda(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_risk(&self) -> Option<&RiskOutcome> {
        match self {
            Self::RiskExpectedLoss(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_structure(&self) -> Option<&StructureOutcome> {
        match self {
            Self::Structure(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_cfl(&self) -> Option<&CflOutcome> {
        match self {
            Self::Cfl(o) => Some(o),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureOutcome {
    pub thesis: String,
    pub key_points: Vec<String>,
    pub counterpoints: Vec<String>,
    pub actions: Vec<String>,
    pub next_step: String,
}

/// Whether larger values of a criterion are better or worse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriterionKind {
    Benefit,
    Cost,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Criterion {
    pub name: String,
    pub kind: CriterionKind,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McdaOption {
    pub label: String,
    /// Raw criterion values after imputation
    pub values: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedOption {
    pub label: String,
    /// Weighted sum of normalized criterion scores
    pub utility: f64,
    /// Utility share; all scores sum to 1.0
    pub score: f64,
    pub normalized: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McdaOutcome {
    pub criteria: Vec<Criterion>,
    pub options: Vec<McdaOption>,
    pub ranking: Vec<RankedOption>,
    pub recommendation: String,
    pub equal_weights: bool,
    pub demo_options: bool,
    pub sensitivity: Vec<String>,
    pub diagnostics: Vec<String>,
}

impl McdaOutcome {
    pub fn weight_sum(&self) -> f64 {
        self.criteria.iter().map(|c| c.weight).sum()
    }

    pub fn score_sum(&self) -> f64 {
        self.ranking.iter().map(|r| r.score).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskRow {
    pub name: String,
    pub p: f64,
    pub loss: f64,
    pub p_after: f64,
    pub loss_after: f64,
    pub el_before: f64,
    pub el_after: f64,
    pub reduction: f64,
    pub mitigation_cost: f64,
    /// Reduction per unit of mitigation cost; absent when cost is zero
    pub roi: Option<f64>,
    pub net_gain: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationEstimate {
    pub samples: usize,
    pub var95_before: f64,
    pub var95_after: f64,
    pub es95_before: f64,
    pub es95_after: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskOutcome {
    /// Sorted by expected loss before mitigation, largest first
    pub risks: Vec<RiskRow>,
    pub el_total_before: f64,
    pub el_total_after: f64,
    pub risk_reduction: f64,
    pub mitigation_applied: bool,
    pub simulation: Option<SimulationEstimate>,
    pub fallback_used: bool,
    pub uncertainty: Vec<String>,
    pub diagnostics: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CflOutcome {
    pub domain: String,
    pub claim: String,
    pub claim_extracted: bool,
    pub counterarguments: Vec<String>,
    pub predictions: Vec<String>,
    pub status: String,
    pub uncertainty: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentScore {
    pub intent: String,
    pub score: f64,
}

/// Aggregated result of one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub intent: String,
    pub confidence: f64,
    pub intents_ranked: Vec<IntentScore>,
    pub keyword_hits: BTreeMap<String, Vec<String>>,
    pub triggers_hit: Vec<String>,
    pub heuristic_self_check: String,
    pub policy_max_modules: usize,
    pub applied_modules: Vec<ModuleKind>,
    /// Keyed by `ModuleKind::key`
    pub modules: BTreeMap<String, ModuleResult>,
    /// Keyed by MetaCore checker name
    pub meta: BTreeMap<String, Value>,
    pub sections_present: Vec<String>,
    pub missing_sections: Vec<String>,
    pub policy_decision: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    /// Session notes visible to this run
    #[serde(default)]
    pub notes: Vec<SessionNote>,
    #[serde(default)]
    pub warnings: Vec<String>,
    pub valid: bool,
}

impl Summary {
    pub fn module(&self, kind: ModuleKind) -> Option<&ModuleResult> {
        self.modules.get(kind.key())
    }

    pub fn mcda(&self) -> Option<&McdaOutcome> {
        self.module(ModuleKind::StrategyMcda)
            .and_then(|r| r.output.as_mcda())
    }

    pub fn risk(&self) -> Option<&RiskOutcome> {
        self.module(ModuleKind::RiskExpectedLoss)
            .and_then(|r| r.output.as_risk())
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
        self.valid = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_kind_names() {
        for kind in ModuleKind::ALL {
            assert_eq!(ModuleKind::from_name(kind.display_name()), Some(kind));
            assert_eq!(ModuleKind::from_name(kind.key()), Some(kind));
        }
        assert_eq!(ModuleKind::from_name(" Strategy-MCDA "), Some(ModuleKind::StrategyMcda));
        assert_eq!(ModuleKind::from_name("oracle"), None);
    }

    #[test]
    fn test_canonical_order() {
        let mut kinds = vec![ModuleKind::Cfl, ModuleKind::RiskExpectedLoss, ModuleKind::Structure];
        kinds.sort();
        assert_eq!(
            kinds,
            vec![ModuleKind::Structure, ModuleKind::RiskExpectedLoss, ModuleKind::Cfl]
        );
    }

    #[test]
    fn test_module_kind_serializes_as_display_name() {
        let json = serde_json::to_string(&ModuleKind::StrategyMcda).unwrap();
        assert_eq!(json, "\"StrategyMCDA\"");
    }

    #[test]
    fn test_untagged_output_roundtrip_picks_right_variant() {
        let output = ModuleOutput::Cfl(CflOutcome {
            domain: "risk".into(),
            claim: "X reduces Y".into(),
            claim_extracted: true,
            counterarguments: vec![],
            predictions: vec![],
            status: "untested".into(),
            uncertainty: String::new(),
        });
        let value = serde_json::to_value(&output).unwrap();
        let back: ModuleOutput = serde_json::from_value(value).unwrap();
        assert!(back.as_cfl().is_some());
    }
}
