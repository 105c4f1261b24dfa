//! Deterministic intent router.
//!
//! Scores each configured intent by keyword hits, picks the modules of the
//! winning intent and then lets structured hints adjust the selection.
//! Structure is always selected. Malformed hints never fail routing; they are
//! ignored and the keyword route stands.

use crate::config::RouterConfig;
use oce_common::summary::IntentScore;
use oce_common::{Hints, ModuleKind};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use tracing::{debug, info};

/// Intent reported when no keyword matched
pub const GENERAL_INTENT: &str = "general";

/// Self check value when routing is confident
pub const SELF_CHECK_OK: &str = "ok";

/// Self check value when confidence is under the threshold
pub const SELF_CHECK_LOW: &str = "low-confidence: ask clarifiers (goal/constraints/timeframe)";

/// Per-token bonus for long queries, applied past this many tokens
const LONG_QUERY_TOKENS: usize = 12;
const LONG_QUERY_BONUS: f64 = 0.05;

/// Routing decision for one request
#[derive(Debug, Clone, PartialEq)]
pub struct RouteResult {
    pub intent: String,
    pub confidence: f64,
    pub intents_ranked: Vec<IntentScore>,
    pub keyword_hits: BTreeMap<String, Vec<String>>,
    /// Intents with at least one keyword hit
    pub triggers_hit: Vec<String>,
    /// Modules to run, in canonical order
    pub selected_modules: Vec<ModuleKind>,
    pub self_check: String,
    pub policy_max_modules: usize,
    /// What the hints changed, for the heuristic path
    pub hint_adjustments: Vec<String>,
}

impl RouteResult {
    /// One-line description of how the route was chosen
    pub fn heuristic_path(&self) -> String {
        let hits = self
            .keyword_hits
            .get(&self.intent)
            .filter(|h| !h.is_empty())
            .map(|h| h.join(","))
            .unwrap_or_else(|| "-".to_string());
        let modules = if self.selected_modules.is_empty() {
            "-".to_string()
        } else {
            self.selected_modules
                .iter()
                .map(|m| m.display_name())
                .collect::<Vec<_>>()
                .join(", ")
        };
        let mut path = format!(
            "intent={} ({:.2}) | keywords=[{}] | modules=[{}] | self_check={}",
            self.intent, self.confidence, hits, modules, self.self_check
        );
        if !self.hint_adjustments.is_empty() {
            path.push_str(&format!(" | hints=[{}]", self.hint_adjustments.join("; ")));
        }
        path
    }
}

fn token_regex() -> &'static Regex {
    static TOKEN_RE: OnceLock<Regex> = OnceLock::new();
    TOKEN_RE.get_or_init(|| Regex::new(r"[a-zA-ZåäöÅÄÖ0-9\-]+").expect("static token regex"))
}

/// Lower-cased word tokens
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    token_regex()
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .collect()
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Parse module names, dropping unknown ones
fn parse_modules(names: &[String]) -> Vec<ModuleKind> {
    names.iter().filter_map(|n| ModuleKind::from_name(n)).collect()
}

/// Sort into canonical order, dedupe, force Structure, cap at max
fn finalize_selection(mut modules: Vec<ModuleKind>, max_modules: usize) -> Vec<ModuleKind> {
    modules.retain(|m| *m != ModuleKind::Structure);
    modules.sort();
    modules.dedup();
    modules.insert(0, ModuleKind::Structure);
    modules.truncate(max_modules.max(1));
    modules
}

/// Classify a request and select its modules
pub fn evaluate(text: &str, hints: &Hints, config: &RouterConfig) -> RouteResult {
    let tokens = tokenize(text);
    let max_modules = config.max_modules.max(1);
    let length_bonus = LONG_QUERY_BONUS * tokens.len().saturating_sub(LONG_QUERY_TOKENS) as f64;

    // 1) Score intents: keyword hits plus a soft bonus for longer queries
    let mut keyword_hits: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut scored: Vec<(usize, String, f64, usize)> = Vec::new();
    for (index, rule) in config.intents.iter().enumerate() {
        let hits: Vec<String> = rule
            .keywords
            .iter()
            .map(|k| k.to_lowercase())
            .filter(|k| tokens.iter().any(|t| t == k))
            .collect();
        let hit_count = hits.len();
        let score = hit_count as f64 + length_bonus;
        keyword_hits.insert(rule.name.clone(), hits);
        scored.push((index, rule.name.clone(), score, hit_count));
    }

    // Highest score first; config order breaks ties
    scored.sort_by(|a, b| b.2.total_cmp(&a.2).then(a.0.cmp(&b.0)));

    let intents_ranked: Vec<IntentScore> = scored
        .iter()
        .map(|(_, name, score, _)| IntentScore {
            intent: name.clone(),
            score: round2(*score),
        })
        .collect();

    let triggers_hit: Vec<String> = config
        .intents
        .iter()
        .filter(|rule| keyword_hits.get(&rule.name).is_some_and(|h| !h.is_empty()))
        .map(|rule| rule.name.clone())
        .collect();

    // 2) Pick the intent and its modules
    let top = scored.first().filter(|(_, _, _, hits)| *hits > 0);
    let (intent, confidence, mut modules) = match top {
        Some((index, name, top_score, _)) => {
            let second = scored.get(1).map(|s| s.2).unwrap_or(0.0);
            let denom = if top_score + second > 0.0 { top_score + second } else { 1.0 };
            let modules = if config.auto_detect_intent {
                parse_modules(&config.intents[*index].modules)
            } else {
                parse_modules(&config.default_modules)
            };
            (name.clone(), round2(top_score / denom), modules)
        }
        None => (
            GENERAL_INTENT.to_string(),
            0.0,
            parse_modules(&config.default_modules),
        ),
    };

    // 3) Hints adjust the selection
    let mut hint_adjustments = Vec::new();
    let requested = parse_modules(&hints.strings("modules"));
    if !requested.is_empty() {
        hint_adjustments.push(format!(
            "modules override: {}",
            requested
                .iter()
                .map(|m| m.display_name())
                .collect::<Vec<_>>()
                .join(",")
        ));
        modules = requested;
    }
    let options_hint = hints.array("options").is_some() || hints.object("options").is_some();
    let weights_hint = hints.object("weights").is_some();
    if (options_hint || weights_hint) && !modules.contains(&ModuleKind::StrategyMcda) {
        hint_adjustments.push("options/weights hint adds StrategyMCDA".to_string());
        modules.push(ModuleKind::StrategyMcda);
    }
    if hints.object("risk").is_some() && !modules.contains(&ModuleKind::RiskExpectedLoss) {
        hint_adjustments.push("risk hint adds RiskExpectedLoss".to_string());
        modules.push(ModuleKind::RiskExpectedLoss);
    }

    let selected_modules = finalize_selection(modules, max_modules);

    // 4) Self check
    let self_check = if confidence < config.confidence_threshold {
        SELF_CHECK_LOW.to_string()
    } else {
        SELF_CHECK_OK.to_string()
    };

    debug!("Router tokens={} ranked={:?}", tokens.len(), intents_ranked);

    let result = RouteResult {
        intent,
        confidence,
        intents_ranked,
        keyword_hits,
        triggers_hit,
        selected_modules,
        self_check,
        policy_max_modules: max_modules,
        hint_adjustments,
    };

    info!("OCE_ROUTER {}", result.heuristic_path());
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{IntentRule, RouterConfig};
    use serde_json::json;

    fn route(text: &str) -> RouteResult {
        evaluate(text, &Hints::new(), &RouterConfig::default())
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(
            tokenize("Should we enter market A or B?"),
            vec!["should", "we", "enter", "market", "a", "or", "b"]
        );
        assert_eq!(tokenize("Long-term ROI!"), vec!["long-term", "roi"]);
    }

    #[test]
    fn test_market_question_routes_strategic() {
        let r = route("Should we enter market A or B?");
        assert_eq!(r.intent, "strategic");
        assert_eq!(
            r.selected_modules,
            vec![
                ModuleKind::Structure,
                ModuleKind::StrategyMcda,
                ModuleKind::RiskExpectedLoss
            ]
        );
        assert_eq!(r.keyword_hits["strategic"], vec!["market", "enter"]);
        assert_eq!(r.confidence, 0.67);
        assert_eq!(r.self_check, SELF_CHECK_OK);
        assert!(r.triggers_hit.contains(&"decision".to_string()));
    }

    #[test]
    fn test_risk_question() {
        let r = route("What is the risk of supply loss and how do we mitigate the probability?");
        assert_eq!(r.intent, "risk");
        assert_eq!(
            r.selected_modules,
            vec![ModuleKind::Structure, ModuleKind::RiskExpectedLoss]
        );
    }

    #[test]
    fn test_no_keywords_defaults_to_structure() {
        let r = route("hello there");
        assert_eq!(r.intent, GENERAL_INTENT);
        assert_eq!(r.confidence, 0.0);
        assert_eq!(r.selected_modules, vec![ModuleKind::Structure]);
        assert_eq!(r.self_check, SELF_CHECK_LOW);
        assert!(r.triggers_hit.is_empty());
    }

    #[test]
    fn test_structure_always_present() {
        let mut config = RouterConfig::default();
        config.intents = vec![IntentRule {
            name: "budget".into(),
            keywords: vec!["budget".into()],
            modules: vec!["StrategyMCDA".into()],
        }];
        let r = evaluate("budget review", &Hints::new(), &config);
        assert_eq!(r.selected_modules[0], ModuleKind::Structure);
        assert!(r.selected_modules.contains(&ModuleKind::StrategyMcda));
    }

    #[test]
    fn test_max_modules_cap_keeps_structure() {
        let mut config = RouterConfig::default();
        config.max_modules = 0;
        let r = evaluate("Should we enter market A or B?", &Hints::new(), &config);
        assert_eq!(r.selected_modules, vec![ModuleKind::Structure]);
        assert_eq!(r.policy_max_modules, 1);
    }

    #[test]
    fn test_modules_hint_overrides() {
        let hints = Hints::from_value(json!({"modules": ["cfl", "nonsense", 7]}));
        let r = evaluate("Should we enter market A or B?", &hints, &RouterConfig::default());
        assert_eq!(r.selected_modules, vec![ModuleKind::Structure, ModuleKind::Cfl]);
        assert!(r.heuristic_path().contains("modules override"));
    }

    #[test]
    fn test_risk_hint_adds_module() {
        let hints = Hints::from_value(json!({"risk": {"risks": []}}));
        let r = evaluate("hello", &hints, &RouterConfig::default());
        assert_eq!(
            r.selected_modules,
            vec![ModuleKind::Structure, ModuleKind::RiskExpectedLoss]
        );
    }

    #[test]
    fn test_malformed_hints_fall_back_to_keyword_route() {
        for hints in [
            json!({"modules": "Structure", "risk": "high"}),
            json!({"weights": "heavy"}),
            json!({"options": 5}),
            json!({"options": "A or B", "weights": [0.5, 0.5]}),
        ] {
            let r = evaluate("hello", &Hints::from_value(hints), &RouterConfig::default());
            assert_eq!(r.selected_modules, vec![ModuleKind::Structure]);
            assert!(r.hint_adjustments.is_empty());
        }
    }

    #[test]
    fn test_options_hint_adds_mcda() {
        let hints = Hints::from_value(json!({"options": ["A", "B"]}));
        let r = evaluate("hello", &hints, &RouterConfig::default());
        assert_eq!(
            r.selected_modules,
            vec![ModuleKind::Structure, ModuleKind::StrategyMcda]
        );

        let hints = Hints::from_value(json!({"weights": {"impact": 2}}));
        let r = evaluate("hello", &hints, &RouterConfig::default());
        assert!(r.selected_modules.contains(&ModuleKind::StrategyMcda));
    }

    #[test]
    fn test_deterministic() {
        let a = route("I need strategy and risk analysis for project prioritization.");
        let b = route("I need strategy and risk analysis for project prioritization.");
        assert_eq!(a, b);
    }

    #[test]
    fn test_tie_broken_by_config_order() {
        let r = route("Tarvitsen strategiaa ja riskiarvion.");
        assert_eq!(r.intent, "strategic");
        assert_eq!(r.confidence, 0.5);
        assert_eq!(r.self_check, SELF_CHECK_LOW);
    }

    #[test]
    fn test_long_query_bonus() {
        let text = "one two three four five six seven eight nine ten eleven twelve thirteen fourteen risk";
        let r = route(text);
        assert_eq!(r.intent, "risk");
        assert_eq!(r.intents_ranked[0].score, 1.15);
    }
}
