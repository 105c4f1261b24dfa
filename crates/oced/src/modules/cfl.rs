//! CFL: critical falsification loop.
//!
//! Pulls a testable claim out of the request (`if … then …`, `X causes Y`,
//! `X increases Y`, `X reduces Y`) or states a neutral default for the
//! guessed domain, then lists counterarguments and predictions that could
//! refute it.

use super::{Markdown, ModuleInput};
use oce_common::summary::CflOutcome;
use oce_common::{ModuleKind, ModuleOutput, ModuleResult};
use regex::Regex;
use std::sync::OnceLock;

const STATUSES: &[&str] = &["untested", "partially supported", "contradicted"];
const DEFAULT_STATUS: &str = "untested";

const UNCERTAINTY: &str =
    "Pre-register metrics and stopping rules; report all outcomes, not only the favourable ones.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Domain {
    Risk,
    Decision,
    Science,
    General,
}

impl Domain {
    fn guess(text: &str) -> Self {
        let lower = text.to_lowercase();
        let any = |words: &[&str]| words.iter().any(|w| lower.contains(w));
        if any(&["risk", "loss", "probability", "variance", "mitigation"]) {
            Self::Risk
        } else if any(&["impact", "cost", "benefit", "utility", "mcda", "option"]) {
            Self::Decision
        } else if any(&["simulate", "experiment", "hypothesis", "measurement", "data"]) {
            Self::Science
        } else {
            Self::General
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Risk => "risk",
            Self::Decision => "decision",
            Self::Science => "science",
            Self::General => "general",
        }
    }

    fn default_claim(self) -> &'static str {
        match self {
            Self::Risk => "Mitigation X reduces expected loss (EL) by ≥ 20% compared to baseline.",
            Self::Decision => "Option A yields higher multi-criteria utility U than option B in ≥ 70% of reasonable weight perturbations.",
            Self::Science => "Variable X has a positive effect on Y (β > 0) when controlling for Z.",
            Self::General => "Intervention X improves outcome Y under clearly stated conditions.",
        }
    }

    fn counterarguments(self) -> [&'static str; 3] {
        match self {
            Self::Risk => [
                "Risks are correlated, so the independence assumption breaks.",
                "Mitigation costs are underestimated (hidden costs).",
                "Tail risk outweighs the gain in expected loss.",
            ],
            Self::Decision => [
                "Weights do not reflect real stakeholder preferences.",
                "Min–max scaling distorts the comparison when outliers exist.",
                "Impact/cost/risk estimates are biased.",
            ],
            Self::Science => [
                "A confounder Z explains the X↔Y association.",
                "The model is misspecified (omitted variables, wrong functional form).",
                "The measurement instrument is unstable.",
            ],
            Self::General => [
                "Selection bias: the group does not represent the population.",
                "The effect fades over time.",
                "An environmental factor W explains the effect.",
            ],
        }
    }

    fn predictions(self) -> [&'static str; 3] {
        match self {
            Self::Risk => [
                "Observed EL_after ≤ 0.8·EL_before over the next N periods.",
                "VaR95_after < VaR95_before under the independence assumption.",
                "ROI(mitigation) ≥ 1.0 once costs are fully loaded.",
            ],
            Self::Decision => [
                "U_A > U_B after +0.10 on any single criterion weight (renormalised).",
                "The recommendation survives ±20% noise in the measurements.",
                "Impact dominates the rank order in a sensitivity sweep.",
            ],
            Self::Science => [
                "β̂_X > 0 with a 95% CI not crossing 0 in a preregistered model.",
                "Test power ≥ 0.8 for effect size d ≥ 0.3.",
                "Out-of-sample RMSE improves on the baseline by ≥ 10%.",
            ],
            Self::General => [
                "The success metric improves by ≥ 15% over baseline within T.",
                "The effect replicates in an independent sample with similar magnitude.",
                "No single confounder explains more than 50% of the effect.",
            ],
        }
    }
}

fn if_then_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(if\s.+?\sthen\s[^.?!\n]+)").expect("static regex"))
}

fn relation_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?P<subj>[a-z][\w\- ]*?)\s+(?P<verb>causes|increases|reduces)\s+(?P<obj>[a-z][\w\- ]*)")
            .expect("static regex")
    })
}

/// Claim stated in the text, if any
fn extract_claim(text: &str) -> Option<String> {
    let text = text.trim();
    if let Some(caps) = if_then_regex().captures(text) {
        return Some(caps[1].trim().trim_end_matches('.').to_string());
    }
    let caps = relation_regex().captures(text)?;
    let arrow = match caps["verb"].to_lowercase().as_str() {
        "increases" => "↑→",
        "reduces" => "↓→",
        _ => "→",
    };
    Some(format!("{} {} {}", caps["subj"].trim(), arrow, caps["obj"].trim()))
}

pub fn run(input: &ModuleInput<'_>) -> ModuleResult {
    let domain = Domain::guess(input.text);
    let extracted = extract_claim(input.text);
    let claim_extracted = extracted.is_some();
    let claim = extracted.unwrap_or_else(|| domain.default_claim().to_string());

    let status = input
        .hints
        .section("cfl")
        .str("status")
        .map(str::to_lowercase)
        .filter(|s| STATUSES.contains(&s.as_str()))
        .unwrap_or_else(|| DEFAULT_STATUS.to_string());

    let counterarguments: Vec<String> = domain.counterarguments().iter().map(|s| s.to_string()).collect();
    let predictions: Vec<String> = domain.predictions().iter().map(|s| s.to_string()).collect();

    let mut md = Markdown::new(ModuleKind::Cfl.display_name());
    md.section("Falsifiable Claim").bullets([&claim]);
    md.section("Counterarguments").bullets(&counterarguments);
    md.section("Tests / Predictions").bullets(&predictions);
    md.section("Status").line(&status);
    md.section("Uncertainty").line(UNCERTAINTY);
    let (markdown, sections_present) = md.finish();

    ModuleResult {
        module: ModuleKind::Cfl,
        sections_present,
        output: ModuleOutput::Cfl(CflOutcome {
            domain: domain.name().to_string(),
            claim,
            claim_extracted,
            counterarguments,
            predictions,
            status,
            uncertainty: UNCERTAINTY.to_string(),
        }),
        markdown,
    }
}
