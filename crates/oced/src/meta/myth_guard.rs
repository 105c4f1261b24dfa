//! Flags absolute wording ("always", "never", "guaranteed", and Finnish
//! equivalents) in the request and proposes a rebuttal frame plus a
//! spaced-reinforcement schedule.

use super::MetaContext;
use regex::Regex;
use serde_json::{json, Value};
use std::sync::OnceLock;

const STRONG_PATTERNS: &[&str] = &[
    r"\balways\b",
    r"\bnever\b",
    r"\bmust\b",
    r"\bguarantee(d)?\b",
    r"\bik(i|u)inä\b",
    r"\baina\b",
    r"\bei koskaan\b",
    r"\bpakko\b",
];

const REINFORCEMENT_DAYS: [u32; 2] = [7, 60];

fn patterns() -> &'static [Regex] {
    static RE: OnceLock<Vec<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        STRONG_PATTERNS
            .iter()
            .map(|p| Regex::new(&format!("(?i){}", p)).expect("static regex"))
            .collect()
    })
}

/// Absolute phrases found in `text`, in pattern order
pub fn strong_claims(text: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for re in patterns() {
        if let Some(m) = re.find(text) {
            let word = m.as_str().to_lowercase();
            if !found.contains(&word) {
                found.push(word);
            }
        }
    }
    found
}

pub fn myth_guard(ctx: &MetaContext<'_>) -> Value {
    let findings = strong_claims(ctx.text);
    if findings.is_empty() {
        return json!({
            "status": "clean",
            "findings": [],
            "recommendation": "No strong claims detected.",
        });
    }
    json!({
        "status": "flagged",
        "findings": findings,
        "rebuttal": "Look for counterexamples and bound the claim (conditions, time, audience). \
                     Propose a testable form: 'The claim holds when X but fails when Y'.",
        "reinforcement": {
            "suggested_days": REINFORCEMENT_DAYS,
            "note": "Reviewing after 7 and 60 days improves retention.",
        },
    })
}
