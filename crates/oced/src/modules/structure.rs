//! Structure: problem framing.
//!
//! Works in cold start; session notes, when present, become constraints.

use super::{Markdown, ModuleInput};
use oce_common::summary::StructureOutcome;
use oce_common::{ModuleKind, ModuleOutput, ModuleResult};

const DEFAULT_THESIS: &str = "You are exploring a strategic overview.";
const MAX_THESIS_CHARS: usize = 160;

/// First sentence of the request, shortened for the thesis line
fn framing_sentence(text: &str) -> Option<String> {
    let first = text
        .split_inclusive(['.', '?', '!', '\n'])
        .map(str::trim)
        .find(|s| !s.is_empty())?;
    if first.chars().count() <= MAX_THESIS_CHARS {
        return Some(first.to_string());
    }
    let mut short: String = first.chars().take(MAX_THESIS_CHARS).collect();
    short.push('…');
    Some(short)
}

pub fn run(input: &ModuleInput<'_>) -> ModuleResult {
    let thesis = match framing_sentence(input.text) {
        Some(sentence) => format!("You are exploring: \"{}\"", sentence),
        None => DEFAULT_THESIS.to_string(),
    };

    let mut key_points = vec![
        "Clarify long-term goal (2–3 years).".to_string(),
        "List constraints and resources (time, money, skills).".to_string(),
        "Define decision timeline and success criteria.".to_string(),
    ];
    for note in input.notes {
        key_points.push(format!("Known constraint ({}): {}", note.key, note.value));
    }

    let counterpoints = vec![
        "What if priorities change mid-course?".to_string(),
        "What if constraints tighten (budget/time)?".to_string(),
    ];

    let actions = vec![
        "Write 1–3 concrete outcomes.".to_string(),
        "Pick a planning horizon (e.g., 24–36 months).".to_string(),
        "List top 3 constraints and 3 resources.".to_string(),
    ];

    let next_step = if input.notes.is_empty() {
        "Answer: goal, constraints, timeframe.".to_string()
    } else {
        "Answer: goal and timeframe; confirm the stored constraints still hold.".to_string()
    };

    let mut md = Markdown::new(ModuleKind::Structure.display_name());
    md.section("Thesis").line(&thesis);
    md.section("Key Points").bullets(&key_points);
    md.section("Counterpoints").bullets(&counterpoints);
    md.section("Actions").bullets(&actions);
    md.section("Next Step").line(&next_step);
    let (markdown, sections_present) = md.finish();

    ModuleResult {
        module: ModuleKind::Structure,
        sections_present,
        output: ModuleOutput::Structure(StructureOutcome {
            thesis,
            key_points,
            counterpoints,
            actions,
            next_step,
        }),
        markdown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use oce_common::{Hints, SessionNote};

    fn run_with(text: &str, notes: &[SessionNote]) -> StructureOutcome {
        let config = Config::default();
        let hints = Hints::new();
        let input = ModuleInput {
            text,
            hints: &hints,
            notes,
            prior: &[],
            config: &config,
        };
        run(&input).output.as_structure().cloned().unwrap()
    }

    #[test]
    fn test_thesis_restates_first_sentence() {
        let out = run_with("Should we enter market A or B? We have little cash.", &[]);
        assert_eq!(out.thesis, "You are exploring: \"Should we enter market A or B?\"");
    }

    #[test]
    fn test_blank_text_uses_default_thesis() {
        let out = run_with("   ", &[]);
        assert_eq!(out.thesis, DEFAULT_THESIS);
    }

    #[test]
    fn test_long_sentence_truncated() {
        let text = "x".repeat(400);
        let out = run_with(&text, &[]);
        assert!(out.thesis.ends_with("…\""));
    }

    #[test]
    fn test_notes_become_constraints() {
        let notes = vec![SessionNote::new("p2", "note", "budget under 5000")];
        let out = run_with("Plan the launch", &notes);
        assert!(out
            .key_points
            .iter()
            .any(|k| k.contains("budget under 5000")));
        assert!(out.next_step.contains("stored constraints"));
    }
}
