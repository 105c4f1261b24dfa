//! StrategyMCDA: multi-criteria ranking of options.
//!
//! Options come from hints or from the text (`A (impact 8, cost 7k, risk
//! 25%)`, `A: impact 8 cost 7000`, `A or B`, `between A and B`). Criteria are
//! min–max normalised (reversed for cost criteria) and combined with weights
//! into a utility per option. Scores are utility shares and sum to 1.0; when
//! no option has any utility every option scores 1/N. Missing or unparsable
//! weights mean equal weighting.

use super::parse::{canonical_criterion, parse_criteria, CRITERIA_ALIASES};
use super::{Markdown, ModuleInput};
use oce_common::hints::value_as_f64;
use oce_common::summary::{
    Criterion, CriterionKind, McdaOption, McdaOutcome, RankedOption,
};
use oce_common::{Hints, ModuleKind, ModuleOutput, ModuleResult};
use regex::{Captures, Regex};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Upper bound on options considered per request
const MAX_OPTIONS: usize = 12;

/// Scores closer than this count as a tie
const SCORE_EPSILON: f64 = 1e-12;

fn criterion_kind(name: &str) -> CriterionKind {
    match name {
        "Cost" | "Risk" => CriterionKind::Cost,
        _ => CriterionKind::Benefit,
    }
}

fn default_criteria() -> Vec<&'static str> {
    CRITERIA_ALIASES.iter().map(|(canon, _)| *canon).collect()
}

/// Options parsed so far, in first-seen order
#[derive(Default)]
struct OptionSet {
    options: Vec<(String, BTreeMap<String, f64>)>,
}

impl OptionSet {
    fn add(&mut self, label: &str, values: BTreeMap<String, f64>) {
        let label = label.trim();
        if label.is_empty() || self.options.len() >= MAX_OPTIONS {
            return;
        }
        if self.options.iter().any(|(l, _)| l == label) {
            return;
        }
        self.options.push((label.to_string(), values));
    }

    fn is_empty(&self) -> bool {
        self.options.is_empty()
    }
}

fn paren_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(?P<label>[A-Za-z][\w\-]*)\s*\((?P<fields>[^)]+)\)").expect("static regex")
    })
}

fn inline_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(?:[Oo]ption\s+)?(?P<label>[A-Za-z][\w\-]*)\s*:\s*(?P<fields>.+)$")
            .expect("static regex")
    })
}

fn alternatives_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"\b(?P<run>[A-Z0-9][\w\-]*(?:\s*,\s*[A-Z0-9][\w\-]*)*(?:\s*,?\s+(?:or|OR|vs\.?|versus)\s+(?:[Oo]ption\s+)?[A-Z0-9][\w\-]*)+)",
        )
        .expect("static regex")
    })
}

/// Separators inside a run of alternatives: commas and `or`/`vs`/`versus`
fn connective_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\s*,?\s+(?:or|OR|vs\.?|versus)\s+(?:[Oo]ption\s+)?|\s*,\s*")
            .expect("static regex")
    })
}

fn between_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b[Bb]etween\s+(?:[Oo]ption\s+)?(?P<a>[A-Z0-9][\w\-]*)\s+and\s+(?:[Oo]ption\s+)?(?P<b>[A-Z0-9][\w\-]*)")
            .expect("static regex")
    })
}

fn weights_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\bweights?\b\s*[:(]?(?P<fields>[^)\n]+)\)?").expect("static regex")
    })
}

fn criteria_map(pairs: Vec<(&'static str, f64)>) -> BTreeMap<String, f64> {
    pairs.into_iter().map(|(c, v)| (c.to_string(), v)).collect()
}

/// Criterion values from a JSON object, skipping unknown keys and non-numbers
fn criteria_from_json(map: &serde_json::Map<String, Value>) -> BTreeMap<String, f64> {
    map.iter()
        .filter_map(|(k, v)| {
            let canon = canonical_criterion(k)?;
            let value = value_as_f64(v)?;
            Some((canon.to_string(), value))
        })
        .collect()
}

fn options_from_hints(hints: &Hints) -> OptionSet {
    let mut set = OptionSet::default();
    match hints.get("options") {
        Some(Value::Array(items)) => {
            for item in items {
                match item {
                    Value::String(label) => set.add(label, BTreeMap::new()),
                    Value::Object(obj) => {
                        let label = ["label", "name", "option"]
                            .iter()
                            .find_map(|k| obj.get(*k).and_then(Value::as_str));
                        if let Some(label) = label {
                            set.add(label, criteria_from_json(obj));
                        }
                    }
                    _ => {}
                }
            }
        }
        Some(Value::Object(map)) => {
            for (label, values) in map {
                let values = values.as_object().map(criteria_from_json).unwrap_or_default();
                set.add(label, values);
            }
        }
        _ => {}
    }
    set
}

fn is_reserved_label(label: &str) -> bool {
    matches!(
        label.to_lowercase().as_str(),
        "weight" | "weights" | "compare" | "vs" | "versus" | "option" | "options" | "criteria"
    )
}

fn options_from_text(text: &str) -> OptionSet {
    let mut set = OptionSet::default();
    // Drop `weights: ...` clauses so their criteria are not read as options;
    // a bare mention of "weight" stays in place
    let without_weights = weights_regex().replace_all(text, |caps: &Captures<'_>| {
        if parse_criteria(&caps["fields"]).is_empty() {
            caps[0].to_string()
        } else {
            String::new()
        }
    });

    // (1) A (impact 8, cost 7k, risk 25%)
    for caps in paren_regex().captures_iter(&without_weights) {
        let fields = &caps["fields"];
        // `name (p=0.3, loss=15k)` describes a risk, not an option
        if fields.to_lowercase().contains("loss") {
            continue;
        }
        let label = &caps["label"];
        if is_reserved_label(label) {
            continue;
        }
        let values = parse_criteria(fields);
        if !values.is_empty() {
            set.add(label, criteria_map(values));
        }
    }

    // (2) A: impact 8 cost 7000   (one per line or `;` segment)
    for segment in without_weights.split(['\n', ';']) {
        if let Some(caps) = inline_regex().captures(segment) {
            let label = &caps["label"];
            if is_reserved_label(label) {
                continue;
            }
            let values = parse_criteria(&caps["fields"]);
            if !values.is_empty() {
                set.add(label, criteria_map(values));
            }
        }
    }

    // (3) Bare alternatives: `A or B`, `A, B or C`, `between A and B`
    if set.is_empty() {
        for caps in alternatives_regex().captures_iter(&without_weights) {
            for label in connective_regex().split(&caps["run"]) {
                set.add(label, BTreeMap::new());
            }
        }
        for caps in between_regex().captures_iter(&without_weights) {
            set.add(&caps["a"], BTreeMap::new());
            set.add(&caps["b"], BTreeMap::new());
        }
    }
    set
}

fn demo_options() -> OptionSet {
    let mut set = OptionSet::default();
    for (label, impact, cost, risk) in [
        ("A", 8.0, 7000.0, 0.25),
        ("B", 7.0, 5500.0, 0.30),
        ("C", 6.0, 4800.0, 0.40),
    ] {
        let values = BTreeMap::from([
            ("Impact".to_string(), impact),
            ("Cost".to_string(), cost),
            ("Risk".to_string(), risk),
        ]);
        set.add(label, values);
    }
    set
}

/// Weights supplied by hints or a `weights:` clause, restricted to `criteria`
fn supplied_weights(input: &ModuleInput<'_>, criteria: &[&str]) -> Option<BTreeMap<String, f64>> {
    let raw: BTreeMap<String, f64> = if let Some(map) = input.hints.object("weights") {
        criteria_from_json(map)
    } else {
        weights_regex()
            .captures_iter(input.text)
            .map(|caps| parse_criteria(&caps["fields"]))
            .find(|pairs| !pairs.is_empty())
            .map(criteria_map)?
    };
    let filtered: BTreeMap<String, f64> = raw
        .into_iter()
        .filter(|(c, _)| criteria.contains(&c.as_str()))
        .collect();
    (!filtered.is_empty()).then_some(filtered)
}

fn minmax(x: f64, lo: f64, hi: f64, reverse: bool) -> f64 {
    if (hi - lo).abs() < f64::EPSILON {
        return 0.0;
    }
    let v = (x - lo) / (hi - lo);
    if reverse {
        1.0 - v
    } else {
        v
    }
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted[sorted.len() / 2]
}

/// Utility per option for the given weights
fn utilities(
    labels: &[String],
    criteria: &[Criterion],
    normalized: &BTreeMap<String, BTreeMap<String, f64>>,
    weights: &BTreeMap<String, f64>,
) -> Vec<f64> {
    labels
        .iter()
        .map(|label| {
            criteria
                .iter()
                .map(|c| weights.get(&c.name).copied().unwrap_or(0.0) * normalized[label][&c.name])
                .sum()
        })
        .collect()
}

/// Index of the best utility; earlier labels win ties
fn winner(utilities: &[f64]) -> usize {
    let mut best = 0;
    for (i, u) in utilities.iter().enumerate() {
        if *u > utilities[best] + SCORE_EPSILON {
            best = i;
        }
    }
    best
}

fn renormalize(weights: &mut BTreeMap<String, f64>) {
    let sum: f64 = weights.values().sum();
    if sum > 0.0 {
        for w in weights.values_mut() {
            *w /= sum;
        }
    }
}

pub fn run(input: &ModuleInput<'_>) -> ModuleResult {
    let mut diagnostics: Vec<String> = Vec::new();

    // 1) Options: hints, then text, then demo data
    let mut set = options_from_hints(input.hints);
    if set.is_empty() {
        set = options_from_text(input.text);
    } else {
        diagnostics.push("Options taken from hints.".to_string());
    }
    let demo = set.is_empty();
    if demo {
        set = demo_options();
        diagnostics.push("No structured options found in text → using demo A/B/C.".to_string());
    }
    let mut options = set.options;

    // 2) Criteria: those with at least one value, in default order
    let defaults = default_criteria();
    let mut criteria_names: Vec<&str> = defaults
        .iter()
        .copied()
        .filter(|c| options.iter().any(|(_, v)| v.contains_key(*c)))
        .collect();
    if criteria_names.is_empty() {
        criteria_names = defaults.clone();
        diagnostics.push(format!(
            "No criterion values found → options scored equally on {}.",
            criteria_names.join("/")
        ));
    }

    // 3) Impute missing values with the median of the others (0.0 when none)
    for criterion in &criteria_names {
        let present: Vec<f64> = options
            .iter()
            .filter_map(|(_, v)| v.get(*criterion).copied())
            .collect();
        let fill = if present.is_empty() { 0.0 } else { median(&present) };
        for (label, values) in options.iter_mut() {
            if !values.contains_key(*criterion) {
                values.insert(criterion.to_string(), fill);
                if !present.is_empty() {
                    diagnostics.push(format!("Missing {} for {} imputed as median {}.", criterion, label, fill));
                }
            }
        }
    }
    for (_, values) in options.iter_mut() {
        values.retain(|k, _| criteria_names.contains(&k.as_str()));
    }

    // 4) Weights
    let (mut weights, equal_weights) = match supplied_weights(input, &criteria_names) {
        Some(supplied) => {
            let mut w: BTreeMap<String, f64> = criteria_names
                .iter()
                .map(|c| (c.to_string(), supplied.get(*c).copied().unwrap_or(0.0).max(0.0)))
                .collect();
            if w.values().sum::<f64>() > 0.0 {
                for c in &criteria_names {
                    if !supplied.contains_key(*c) {
                        diagnostics.push(format!("No weight given for {} → 0.", c));
                    }
                }
                renormalize(&mut w);
                (w, false)
            } else {
                diagnostics.push("Weights unusable (sum ≤ 0) → equal weighting.".to_string());
                (BTreeMap::new(), true)
            }
        }
        None => (BTreeMap::new(), true),
    };
    if equal_weights {
        let share = 1.0 / criteria_names.len() as f64;
        weights = criteria_names.iter().map(|c| (c.to_string(), share)).collect();
        if !demo {
            diagnostics.push("No weights parsed → equal weighting.".to_string());
        }
    }

    let criteria: Vec<Criterion> = criteria_names
        .iter()
        .map(|c| Criterion {
            name: c.to_string(),
            kind: criterion_kind(c),
            weight: weights[*c],
        })
        .collect();

    // 5) Normalise and score
    let labels: Vec<String> = options.iter().map(|(l, _)| l.clone()).collect();
    let mut normalized: BTreeMap<String, BTreeMap<String, f64>> =
        labels.iter().map(|l| (l.clone(), BTreeMap::new())).collect();
    for c in &criteria {
        let values: Vec<f64> = options.iter().map(|(_, v)| v[&c.name]).collect();
        let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let reverse = c.kind == CriterionKind::Cost;
        for (label, value) in labels.iter().zip(&values) {
            if let Some(row) = normalized.get_mut(label) {
                row.insert(c.name.clone(), minmax(*value, lo, hi, reverse));
            }
        }
    }

    let utility = utilities(&labels, &criteria, &normalized, &weights);
    let total: f64 = utility.iter().sum();
    let n = labels.len() as f64;
    let mut ranking: Vec<RankedOption> = labels
        .iter()
        .zip(&utility)
        .map(|(label, u)| RankedOption {
            label: label.clone(),
            utility: *u,
            score: if total > SCORE_EPSILON { u / total } else { 1.0 / n },
            normalized: normalized[label].clone(),
        })
        .collect();
    ranking.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.label.cmp(&b.label)));

    let undecided = ranking.len() > 1
        && (ranking[0].score - ranking[ranking.len() - 1].score).abs() < SCORE_EPSILON;
    let best = ranking[0].label.clone();
    let recommendation = if undecided {
        "No option dominates on the available criteria; add values such as `A (impact 8, cost 7k, risk 25%)`.".to_string()
    } else {
        format!("Choose {} (highest utility U).", best)
    };

    // 6) Sensitivity: bump one weight, renormalise, see if the winner flips
    let mut sensitivity = Vec::new();
    if labels.len() > 1 && !undecided {
        let step = input.config.mcda.sensitivity_step;
        let best_index = winner(&utility);
        for c in &criteria {
            let mut tweaked = weights.clone();
            if let Some(w) = tweaked.get_mut(&c.name) {
                *w += step;
            }
            renormalize(&mut tweaked);
            let flipped = winner(&utilities(&labels, &criteria, &normalized, &tweaked));
            if flipped != best_index {
                sensitivity.push(format!(
                    "If weight({}) +{:.2} → winner flips: {} → {}.",
                    c.name, step, labels[best_index], labels[flipped]
                ));
            }
        }
        if sensitivity.is_empty() {
            sensitivity.push(format!(
                "Decision stable for small single-weight increases (+{:.2}).",
                step
            ));
        }
    } else {
        sensitivity.push("Sensitivity not applicable: no option leads.".to_string());
    }

    // 7) Report
    let mut md = Markdown::new(ModuleKind::StrategyMcda.display_name());
    md.section("Criteria").bullets(criteria.iter().map(|c| {
        let kind = match c.kind {
            CriterionKind::Benefit => "benefit",
            CriterionKind::Cost => "cost",
        };
        format!("{} ({})", c.name, kind)
    }));
    md.section("Weights")
        .bullets(criteria.iter().map(|c| format!("{}: {:.3}", c.name, c.weight)));
    md.section("Options (raw)").bullets(options.iter().map(|(label, values)| {
        let vals: Vec<String> = criteria
            .iter()
            .map(|c| format!("{}={}", c.name, values[&c.name]))
            .collect();
        format!("{}: {}", label, vals.join(", "))
    }));
    md.section("Scores (normalized min–max)").bullets(ranking.iter().map(|r| {
        let parts: Vec<String> = criteria
            .iter()
            .map(|c| format!("{}:{:.3}", c.name, r.normalized[&c.name]))
            .collect();
        format!("{}: score={:.3} U={:.3}  |  [{}]", r.label, r.score, r.utility, parts.join(", "))
    }));
    md.section("Recommendation").line(&recommendation);
    md.section("Uncertainty / Sensitivity");
    for note in &sensitivity {
        md.line(note);
    }
    md.section("Diagnostics");
    if diagnostics.is_empty() {
        md.bullets(["Parsed successfully from natural language."]);
    } else {
        md.bullets(&diagnostics);
    }
    let (markdown, sections_present) = md.finish();

    let options = options
        .into_iter()
        .map(|(label, values)| McdaOption { label, values })
        .collect();

    ModuleResult {
        module: ModuleKind::StrategyMcda,
        sections_present,
        output: ModuleOutput::StrategyMcda(McdaOutcome {
            criteria,
            options,
            ranking,
            recommendation,
            equal_weights,
            demo_options: demo,
            sensitivity,
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
    use serde_json::json;

    fn mcda(text: &str, hints: Hints) -> McdaOutcome {
        let config = Config::default();
        let input = ModuleInput {
            text,
            hints: &hints,
            notes: &[],
            prior: &[],
            config: &config,
        };
        run(&input).output.as_mcda().cloned().unwrap()
    }

    fn labels(out: &McdaOutcome) -> Vec<&str> {
        out.ranking.iter().map(|r| r.label.as_str()).collect()
    }

    #[test]
    fn test_market_a_or_b_equal_weighting() {
        let out = mcda("Should we enter market A or B?", Hints::new());
        let mut found = labels(&out);
        found.sort();
        assert_eq!(found, vec!["A", "B"]);
        assert!(out.equal_weights);
        assert!(!out.demo_options);
        for r in &out.ranking {
            assert_relative_eq!(r.score, 0.5);
        }
        assert_relative_eq!(out.score_sum(), 1.0);
        assert!(out.recommendation.contains("No option dominates"));
    }

    #[test]
    fn test_list_of_alternatives() {
        let out = mcda("Pick X, Y or Z for the launch", Hints::new());
        assert_eq!(out.ranking.len(), 3);
        for r in &out.ranking {
            assert_relative_eq!(r.score, 1.0 / 3.0);
        }
        let out = mcda("choose between Alpha and Beta", Hints::new());
        assert_eq!(out.ranking.len(), 2);
    }

    #[test]
    fn test_chained_connectives_keep_every_option() {
        let out = mcda("Compare A vs B vs C", Hints::new());
        assert_eq!(labels(&out), vec!["A", "B", "C"]);
        assert!(!out.demo_options);

        let out = mcda("Should we pick A or B or C?", Hints::new());
        assert_eq!(labels(&out), vec!["A", "B", "C"]);

        let out = mcda("North, South or East vs. option West", Hints::new());
        let mut found = labels(&out);
        found.sort();
        assert_eq!(found, vec!["East", "North", "South", "West"]);
    }

    #[test]
    fn test_mention_of_weight_keeps_options() {
        let out = mcda("Which option carries more weight: A or B?", Hints::new());
        assert!(!out.demo_options);
        assert!(out.equal_weights);
        assert_eq!(labels(&out), vec!["A", "B"]);
    }

    #[test]
    fn test_paren_options_rank() {
        let text = "Compare A (impact 8, cost 7k, risk 25%) and B (impact 6, cost 5k, risk 40%)";
        let out = mcda(text, Hints::new());
        assert_eq!(out.options.len(), 2);
        assert_relative_eq!(out.options[0].values["Cost"], 7000.0);
        // Equal weights: A wins impact and risk, B wins cost
        assert_eq!(out.ranking[0].label, "A");
        assert_relative_eq!(out.ranking[0].utility, 2.0 / 3.0, epsilon = 1e-9);
        assert_relative_eq!(out.ranking[1].utility, 1.0 / 3.0, epsilon = 1e-9);
        assert_relative_eq!(out.score_sum(), 1.0, epsilon = 1e-9);
        assert_eq!(out.recommendation, "Choose A (highest utility U).");
    }

    #[test]
    fn test_inline_options_and_weights_clause() {
        let text = "A: impact 8 cost 7000 risk .25\nB: impact 7 cost 5500 risk .30\nweights: impact 0.2, cost 0.8";
        let out = mcda(text, Hints::new());
        assert!(!out.equal_weights);
        let cost = out.criteria.iter().find(|c| c.name == "Cost").unwrap();
        assert_relative_eq!(cost.weight, 0.8);
        let risk = out.criteria.iter().find(|c| c.name == "Risk").unwrap();
        assert_relative_eq!(risk.weight, 0.0);
        assert_relative_eq!(out.weight_sum(), 1.0);
        // Cost-heavy weighting favours the cheaper option
        assert_eq!(out.ranking[0].label, "B");
    }

    #[test]
    fn test_hint_options_and_weights() {
        let hints = Hints::from_value(json!({
            "options": {"North": {"impact": 9, "cost": "8000"}, "South": {"impact": 5, "cost": 3000}},
            "weights": {"benefit": 3, "price": 1}
        }));
        let out = mcda("anything", hints);
        assert_eq!(out.criteria.len(), 2);
        assert_relative_eq!(out.weight_sum(), 1.0);
        assert_relative_eq!(out.criteria[0].weight, 0.75);
        assert_eq!(out.ranking[0].label, "North");
    }

    #[test]
    fn test_malformed_weights_degrade_to_equal() {
        let hints = Hints::from_value(json!({
            "options": ["A", "B"],
            "weights": {"impact": -1, "cost": "abc"}
        }));
        let out = mcda("x", hints);
        assert!(out.equal_weights);
        assert_relative_eq!(out.weight_sum(), 1.0);
        assert_relative_eq!(out.score_sum(), 1.0);
    }

    #[test]
    fn test_missing_value_imputed_with_median() {
        let text = "A (impact 8, cost 100) B (impact 4) C (impact 6, cost 300)";
        let out = mcda(text, Hints::new());
        let b = out.options.iter().find(|o| o.label == "B").unwrap();
        assert_relative_eq!(b.values["Cost"], 300.0);
        assert!(out.diagnostics.iter().any(|d| d.contains("imputed")));
    }

    #[test]
    fn test_no_options_uses_demo() {
        let out = mcda("we need a strategy", Hints::new());
        assert!(out.demo_options);
        assert_eq!(out.ranking.len(), 3);
        assert_relative_eq!(out.score_sum(), 1.0, epsilon = 1e-9);
        // Ranking sorted by score, descending
        for pair in out.ranking.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn test_risk_pairs_are_not_options() {
        let out = mcda("Supply delay (p=0.3, loss=15k) for A or B", Hints::new());
        let mut found = labels(&out);
        found.sort();
        assert_eq!(found, vec!["A", "B"]);
    }

    #[test]
    fn test_sensitivity_reports_flip() {
        let text = "A (impact 10, cost 9000) B (impact 9, cost 1000)\nweights: impact 0.52, cost 0.48";
        let out = mcda(text, Hints::new());
        assert_eq!(out.ranking[0].label, "A");
        assert!(out.sensitivity.iter().any(|s| s.contains("weight(Cost)")));
    }
}
