//! RiskExpectedLoss: expected loss before and after mitigation.
//!
//! Risks come from `hints.risk.risks` or from text such as
//! `Supply delay (p=0.3, loss=15k, cost=1200)`. With no usable risk the
//! module falls back to a demo register, so it always yields totals.
//! An optional Monte Carlo pass estimates VaR95/ES95 with a seeded RNG,
//! which keeps repeated runs identical.

use super::parse::{clamp01, fmt_thousands, parse_number};
use super::{Markdown, ModuleInput};
use oce_common::hints::value_as_f64;
use oce_common::summary::{RiskOutcome, RiskRow, SimulationEstimate};
use oce_common::{Hints, ModuleKind, ModuleOutput, ModuleResult};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;
use tracing::debug;

/// Words dropped from the front of a risk name taken from text
const NAME_STOPWORDS: &[&str] = &[
    "and", "or", "the", "a", "an", "risk", "risks", "are", "is", "include", "includes", "with",
    "plus", "also", "of",
];

/// Longest risk name taken from text, in words
const MAX_NAME_WORDS: usize = 3;

#[derive(Debug, Clone, Default, PartialEq)]
struct Mitigation {
    delta_p: f64,
    delta_loss: f64,
    cost: f64,
}

#[derive(Debug, Clone, PartialEq)]
struct RiskInput {
    name: String,
    p: f64,
    loss: f64,
    mitigation: Option<Mitigation>,
}

impl RiskInput {
    fn mitigated(&self) -> (f64, f64) {
        match &self.mitigation {
            Some(m) => (clamp01(self.p - m.delta_p), (self.loss - m.delta_loss).max(0.0)),
            None => (self.p, self.loss),
        }
    }
}

fn demo_register() -> Vec<RiskInput> {
    [
        ("Supply delay", 0.30, 15_000.0, 0.08, 2_000.0, 1_200.0),
        ("Data loss", 0.05, 80_000.0, 0.02, 20_000.0, 5_000.0),
        ("Key hire quits", 0.15, 22_000.0, 0.04, 5_000.0, 3_000.0),
    ]
    .into_iter()
    .map(|(name, p, loss, delta_p, delta_loss, cost)| RiskInput {
        name: name.to_string(),
        p,
        loss,
        mitigation: Some(Mitigation {
            delta_p,
            delta_loss,
            cost,
        }),
    })
    .collect()
}

fn mitigation_from_json(value: Option<&Value>) -> Option<Mitigation> {
    let obj = value?.as_object()?;
    let read = |k: &str| obj.get(k).and_then(value_as_f64).unwrap_or(0.0);
    Some(Mitigation {
        delta_p: read("delta_p"),
        delta_loss: read("delta_loss"),
        cost: read("cost").max(0.0),
    })
}

fn risks_from_hints(risk_hints: &Hints, diagnostics: &mut Vec<String>) -> Vec<RiskInput> {
    let Some(items) = risk_hints.array("risks") else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for (index, item) in items.iter().enumerate() {
        let Some(obj) = item.as_object() else {
            diagnostics.push(format!("Risk #{} is not an object; skipped.", index + 1));
            continue;
        };
        let p = obj.get("p").and_then(value_as_f64);
        let loss = obj.get("loss").and_then(value_as_f64);
        let (Some(p), Some(loss)) = (p, loss) else {
            diagnostics.push(format!("Risk #{} lacks numeric p/loss; skipped.", index + 1));
            continue;
        };
        let name = obj
            .get("name")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("risk {}", index + 1));
        out.push(RiskInput {
            name,
            p: clamp01(p),
            loss: loss.max(0.0),
            mitigation: mitigation_from_json(obj.get("mitigation")),
        });
    }
    out
}

fn risk_paren_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\((?P<fields>[^)]*\bloss\b[^)]*)\)").expect("static regex"))
}

fn risk_field_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?P<key>[A-Za-z_]+)\s*[=:]\s*(?P<val>[-+−]?(?:\d[\d.,]*|\.\d+)(?:\s*(?:[kKmM]\b|%))?)")
            .expect("static regex")
    })
}

/// Up to three words before the opening parenthesis, minus leading filler
fn name_before(prefix: &str) -> Option<String> {
    let start = prefix
        .rfind([',', ';', ':', '\n', ')', '?', '!'])
        .map(|i| i + 1)
        .unwrap_or(0);
    let words: Vec<&str> = prefix[start..].split_whitespace().collect();
    let mut tail = &words[words.len().saturating_sub(MAX_NAME_WORDS)..];
    while let Some(first) = tail.first() {
        if tail.len() > 1 && NAME_STOPWORDS.contains(&first.to_lowercase().as_str()) {
            tail = &tail[1..];
        } else {
            break;
        }
    }
    let name = tail.join(" ");
    let name = name.trim_matches(|c: char| !c.is_alphanumeric());
    (!name.is_empty()).then(|| name.to_string())
}

fn risks_from_text(text: &str, diagnostics: &mut Vec<String>) -> Vec<RiskInput> {
    let mut out = Vec::new();
    for caps in risk_paren_regex().captures_iter(text) {
        let whole = caps.get(0).map(|m| m.start()).unwrap_or(0);
        let name = name_before(&text[..whole]).unwrap_or_else(|| format!("risk {}", out.len() + 1));

        let mut p = None;
        let mut loss = None;
        let mut mitigation = Mitigation::default();
        let mut mitigated = false;
        for field in risk_field_regex().captures_iter(&caps["fields"]) {
            let Some(value) = parse_number(&field["val"]) else {
                continue;
            };
            match field["key"].to_lowercase().as_str() {
                "p" | "prob" | "probability" => p = Some(value),
                "loss" | "l" | "impact" => loss = Some(value),
                "dp" | "delta_p" => {
                    mitigation.delta_p = value;
                    mitigated = true;
                }
                "dl" | "dloss" | "delta_loss" => {
                    mitigation.delta_loss = value;
                    mitigated = true;
                }
                "cost" | "mitigation_cost" => {
                    mitigation.cost = value.max(0.0);
                    mitigated = true;
                }
                _ => {}
            }
        }
        match (p, loss) {
            (Some(p), Some(loss)) => out.push(RiskInput {
                name,
                p: clamp01(p),
                loss: loss.max(0.0),
                mitigation: mitigated.then_some(mitigation),
            }),
            _ => diagnostics.push(format!("Could not read p/loss for \"{}\"; skipped.", name)),
        }
    }
    out
}

/// VaR95 and ES95 of total loss, before and after mitigation.
///
/// Both totals share the same uniform draw per risk, so mitigation can
/// only lower a sample.
fn simulate(risks: &[RiskInput], samples: usize, apply_mitigation: bool, seed: u64) -> SimulationEstimate {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut before = Vec::with_capacity(samples);
    let mut after = Vec::with_capacity(samples);
    for _ in 0..samples {
        let mut total_before = 0.0;
        let mut total_after = 0.0;
        for risk in risks {
            let u: f64 = rng.gen();
            let (p_after, loss_after) = if apply_mitigation {
                risk.mitigated()
            } else {
                (risk.p, risk.loss)
            };
            if u < risk.p {
                total_before += risk.loss;
            }
            if u < p_after {
                total_after += loss_after;
            }
        }
        before.push(total_before);
        after.push(total_after);
    }
    let (var95_before, es95_before) = tail_stats(&mut before);
    let (var95_after, es95_after) = tail_stats(&mut after);
    SimulationEstimate {
        samples,
        var95_before,
        var95_after,
        es95_before,
        es95_after,
    }
}

fn tail_stats(losses: &mut [f64]) -> (f64, f64) {
    if losses.is_empty() {
        return (0.0, 0.0);
    }
    losses.sort_by(f64::total_cmp);
    let index = (0.95 * (losses.len() - 1) as f64) as usize;
    let tail = &losses[index..];
    (losses[index], tail.iter().sum::<f64>() / tail.len() as f64)
}

/// Samples to draw: explicit hints first, then config defaults
fn sample_count(risk_hints: &Hints, input: &ModuleInput<'_>) -> usize {
    let config = &input.config.risk;
    let requested = risk_hints
        .f64("n_sims")
        .filter(|n| *n >= 1.0)
        .map(|n| n as usize);
    let samples = match risk_hints.bool("simulate") {
        Some(false) => 0,
        Some(true) => requested.unwrap_or(config.simulate_samples),
        None => requested.unwrap_or(config.default_samples),
    };
    samples.min(config.max_samples)
}

/// Leading MCDA option from an earlier module in this run, if one leads
fn leading_option(input: &ModuleInput<'_>) -> Option<String> {
    let mcda = input
        .prior_result(ModuleKind::StrategyMcda)?
        .output
        .as_mcda()?;
    let first = mcda.ranking.first()?;
    match mcda.ranking.get(1) {
        Some(second) if (first.score - second.score).abs() < 1e-12 => None,
        _ => Some(first.label.clone()),
    }
}

pub fn run(input: &ModuleInput<'_>) -> ModuleResult {
    let risk_hints = input.hints.section("risk");
    let mut diagnostics = Vec::new();

    let mut risks = risks_from_hints(&risk_hints, &mut diagnostics);
    if risks.is_empty() {
        risks = risks_from_text(input.text, &mut diagnostics);
    }
    let fallback_used = risks.is_empty();
    if fallback_used {
        risks = demo_register();
        diagnostics.push("No usable probability/loss pairs → demo risk register.".to_string());
    }

    let apply_mitigation = risk_hints
        .bool("apply_mitigation")
        .unwrap_or(input.config.risk.apply_mitigation);

    let mut rows: Vec<RiskRow> = risks
        .iter()
        .map(|risk| {
            let el_before = risk.p * risk.loss;
            let (p_after, loss_after) = risk.mitigated();
            let el_after = if apply_mitigation {
                p_after * loss_after
            } else {
                el_before
            };
            let reduction = (el_before - el_after).max(0.0);
            let mitigation_cost = risk.mitigation.as_ref().map(|m| m.cost).unwrap_or(0.0);
            RiskRow {
                name: risk.name.clone(),
                p: risk.p,
                loss: risk.loss,
                p_after,
                loss_after,
                el_before,
                el_after,
                reduction,
                mitigation_cost,
                roi: (mitigation_cost > 0.0).then(|| reduction / mitigation_cost),
                net_gain: reduction - mitigation_cost,
            }
        })
        .collect();
    rows.sort_by(|a, b| b.el_before.total_cmp(&a.el_before).then_with(|| a.name.cmp(&b.name)));

    let el_total_before: f64 = rows.iter().map(|r| r.el_before).sum();
    let el_total_after: f64 = rows.iter().map(|r| r.el_after).sum();
    let risk_reduction = (el_total_before - el_total_after).max(0.0);

    let samples = sample_count(&risk_hints, input);
    let simulation = (samples > 0).then(|| {
        debug!("Risk simulation: {} samples over {} risks", samples, risks.len());
        simulate(&risks, samples, apply_mitigation, input.config.risk.seed)
    });

    let mut uncertainty = vec![
        "Risks assumed independent (in simulation).".to_string(),
        "Δp/ΔL/cost estimates must be sourced; apply ±20% sensitivity.".to_string(),
    ];
    if let Some(sim) = &simulation {
        uncertainty.push(format!(
            "Sim (n={}): VaR95 before={}, after={}; ES95 before={}, after={}.",
            sim.samples,
            fmt_thousands(sim.var95_before),
            fmt_thousands(sim.var95_after),
            fmt_thousands(sim.es95_before),
            fmt_thousands(sim.es95_after)
        ));
    }
    if !apply_mitigation {
        uncertainty.push("Mitigation not applied: EL_after equals EL_before.".to_string());
    }
    if let Some(label) = leading_option(input) {
        uncertainty.push(format!("Risks assessed against the leading option: {}.", label));
    }

    let mut md = Markdown::new(ModuleKind::RiskExpectedLoss.display_name());
    md.section("Top Risks").bullets(rows.iter().map(|r| {
        format!(
            "{}: p={:.2}, L={}, EL={}",
            r.name,
            r.p,
            fmt_thousands(r.loss),
            fmt_thousands(r.el_before)
        )
    }));
    md.section("Expected Loss")
        .line(format!("EL_total_before = {}", fmt_thousands(el_total_before)))
        .line(format!("EL_total_after  = {}", fmt_thousands(el_total_after)))
        .line(format!("Risk-reduction  = {}", fmt_thousands(risk_reduction)));
    md.section("Mitigation").bullets(rows.iter().map(|r| {
        let roi = r
            .roi
            .map(|roi| format!("{:.2}", roi))
            .unwrap_or_else(|| "—".to_string());
        format!(
            "{}: EL_before={} → EL_after={} (reduction={}); cost={}; ROI={}; net_gain={}",
            r.name,
            fmt_thousands(r.el_before),
            fmt_thousands(r.el_after),
            fmt_thousands(r.reduction),
            fmt_thousands(r.mitigation_cost),
            roi,
            fmt_thousands(r.net_gain)
        )
    }));
    md.section("Uncertainty");
    for line in &uncertainty {
        md.line(line);
    }
    if !diagnostics.is_empty() {
        md.section("Diagnostics").bullets(&diagnostics);
    }
    let (markdown, sections_present) = md.finish();

    ModuleResult {
        module: ModuleKind::RiskExpectedLoss,
        sections_present,
        output: ModuleOutput::RiskExpectedLoss(RiskOutcome {
            risks: rows,
            el_total_before,
            el_total_after,
            risk_reduction,
            mitigation_applied: apply_mitigation,
            simulation,
            fallback_used,
            uncertainty,
            diagnostics,
        }),
        markdown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use approx::assert_relative_eq;
    use oce_common::summary::{McdaOutcome, RankedOption};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn risk_with(text: &str, hints: Hints, config: &Config, prior: &[ModuleResult]) -> RiskOutcome {
        let input = ModuleInput {
            text,
            hints: &hints,
            notes: &[],
            prior,
            config,
        };
        run(&input).output.as_risk().cloned().unwrap()
    }

    fn risk(text: &str, hints: Hints) -> RiskOutcome {
        risk_with(text, hints, &Config::default(), &[])
    }

    #[test]
    fn test_zero_pairs_fall_back_to_demo() {
        let out = risk("Should we enter market A or B?", Hints::new());
        assert!(out.fallback_used);
        assert_eq!(out.risks.len(), 3);
        // 0.30*15000 + 0.05*80000 + 0.15*22000
        assert_relative_eq!(out.el_total_before, 11_800.0, epsilon = 1e-6);
        // 0.22*13000 + 0.03*60000 + 0.11*17000
        assert_relative_eq!(out.el_total_after, 6_530.0, epsilon = 1e-6);
        assert_relative_eq!(out.risk_reduction, 5_270.0, epsilon = 1e-6);
        assert!(out.simulation.is_none());
        assert_eq!(out.risks[0].name, "Supply delay");
    }

    #[test]
    fn test_rows_sorted_by_expected_loss() {
        let out = risk("", Hints::new());
        for pair in out.risks.windows(2) {
            assert!(pair[0].el_before >= pair[1].el_before);
        }
    }

    #[test]
    fn test_hint_risks_and_roi() {
        let hints = Hints::from_value(json!({"risk": {"risks": [
            {"name": "Outage", "p": 0.5, "loss": 10000,
             "mitigation": {"delta_p": 0.25, "delta_loss": 0, "cost": 500}},
            {"name": "Churn", "p": "0.1", "loss": 2000}
        ]}}));
        let out = risk("x", hints);
        assert!(!out.fallback_used);
        let outage = &out.risks[0];
        assert_eq!(outage.name, "Outage");
        assert_relative_eq!(outage.el_before, 5000.0);
        assert_relative_eq!(outage.el_after, 2500.0);
        assert_relative_eq!(outage.roi.unwrap(), 5.0);
        assert_relative_eq!(outage.net_gain, 2000.0);
        let churn = &out.risks[1];
        assert_eq!(churn.roi, None);
        assert_relative_eq!(churn.reduction, 0.0);
    }

    #[test]
    fn test_out_of_range_inputs_clamped() {
        let hints = Hints::from_value(json!({"risk": {"risks": [
            {"name": "Wild", "p": 1.7, "loss": -50},
            {"name": "Broken", "p": "abc", "loss": 100},
            "nonsense"
        ]}}));
        let out = risk("", hints);
        assert_eq!(out.risks.len(), 1);
        assert_relative_eq!(out.risks[0].p, 1.0);
        assert_relative_eq!(out.risks[0].loss, 0.0);
        assert_eq!(out.diagnostics.len(), 2);
    }

    #[test]
    fn test_all_malformed_falls_back() {
        let hints = Hints::from_value(json!({"risk": {"risks": [{"p": null}]}}));
        let out = risk("", hints);
        assert!(out.fallback_used);
        assert!(out.el_total_before > 0.0);
    }

    #[test]
    fn test_text_pairs() {
        let text = "Main risks are Supply delay (p=0.3, loss=15k, cost=1200, dp=0.1) and data breach (p=5%, loss=80,000).";
        let out = risk(text, Hints::new());
        assert!(!out.fallback_used);
        let names: Vec<&str> = out.risks.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Supply delay", "data breach"]);
        let supply = &out.risks[0];
        assert_relative_eq!(supply.el_before, 4500.0, epsilon = 1e-9);
        assert_relative_eq!(supply.p_after, 0.2, epsilon = 1e-9);
        assert_relative_eq!(supply.mitigation_cost, 1200.0);
    }

    #[test]
    fn test_mitigation_can_be_disabled() {
        let hints = Hints::from_value(json!({"risk": {"apply_mitigation": false}}));
        let out = risk("", hints);
        assert!(!out.mitigation_applied);
        assert_relative_eq!(out.el_total_before, out.el_total_after);
        assert_relative_eq!(out.risk_reduction, 0.0);
    }

    #[test]
    fn test_simulation_is_seeded_and_ordered() {
        let hints = Hints::from_value(json!({"risk": {"simulate": true, "n_sims": 5000}}));
        let a = risk("", hints.clone());
        let b = risk("", hints);
        let sim = a.simulation.clone().unwrap();
        assert_eq!(sim.samples, 5000);
        assert_eq!(a.simulation, b.simulation);
        assert!(sim.var95_after <= sim.var95_before);
        assert!(sim.es95_before >= sim.var95_before);
        assert!(sim.es95_after.is_finite());
    }

    #[test]
    fn test_sample_count_capped() {
        let mut config = Config::default();
        config.risk.max_samples = 100;
        let hints = Hints::from_value(json!({"risk": {"n_sims": 1000000}}));
        let out = risk_with("", hints, &config, &[]);
        assert_eq!(out.simulation.unwrap().samples, 100);
    }

    #[test]
    fn test_config_default_samples() {
        let mut config = Config::default();
        config.risk.default_samples = 200;
        let out = risk_with("", Hints::new(), &config, &[]);
        assert_eq!(out.simulation.unwrap().samples, 200);

        let hints = Hints::from_value(json!({"risk": {"simulate": false}}));
        let out = risk_with("", hints, &config, &[]);
        assert!(out.simulation.is_none());
    }

    #[test]
    fn test_tail_stats() {
        let mut losses: Vec<f64> = (0..=100).map(f64::from).collect();
        let (var, es) = tail_stats(&mut losses);
        assert_relative_eq!(var, 95.0);
        assert_relative_eq!(es, 97.5);
    }

    #[test]
    fn test_references_leading_option() {
        let ranked = |label: &str, score: f64| RankedOption {
            label: label.to_string(),
            utility: score,
            score,
            normalized: BTreeMap::new(),
        };
        let prior = vec![ModuleResult {
            module: ModuleKind::StrategyMcda,
            sections_present: Vec::new(),
            output: ModuleOutput::StrategyMcda(McdaOutcome {
                criteria: Vec::new(),
                options: Vec::new(),
                ranking: vec![ranked("B", 0.7), ranked("A", 0.3)],
                recommendation: String::new(),
                equal_weights: true,
                demo_options: false,
                sensitivity: Vec::new(),
                diagnostics: Vec::new(),
            }),
            markdown: String::new(),
        }];
        let out = risk_with("", Hints::new(), &Config::default(), &prior);
        assert!(out.uncertainty.iter().any(|u| u.contains("leading option: B")));
    }
}
