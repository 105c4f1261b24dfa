//! Terminal output for ocectl. ASCII only.

use oce_common::{NotesResponse, RunResponse, SessionNote};
use owo_colors::OwoColorize;

pub const THIN_SEPARATOR: &str = "------------------------------------------------------------";

/// Reliability tag for a routing confidence
pub fn confidence_tag(confidence: f64) -> &'static str {
    if confidence >= 0.7 {
        "[OK]"
    } else if confidence >= 0.5 {
        "[PARTIAL]"
    } else {
        "[LOW]"
    }
}

/// Print the report followed by a short status footer
pub fn display_run(response: &RunResponse) {
    let summary = &response.json_summary;
    println!("{}", response.text.trim_end());
    println!();
    println!("{}", THIN_SEPARATOR.dimmed());

    let tag = confidence_tag(summary.confidence);
    let conf = format!("{:.2}", summary.confidence);
    match tag {
        "[OK]" => println!("{}  intent={} confidence={}", tag.bright_green(), summary.intent, conf),
        "[PARTIAL]" => println!("{}  intent={} confidence={}", tag.yellow(), summary.intent, conf),
        _ => println!("{}  intent={} confidence={}", tag.bright_red(), summary.intent, conf),
    }

    if summary.valid {
        println!("{} policy={}", "[VALID]".bright_green(), summary.policy_decision);
    } else {
        println!(
            "{} policy={} ({} warning(s))",
            "[INVALID]".bright_red(),
            summary.policy_decision,
            summary.warnings.len()
        );
    }
    println!(
        "{}",
        format!(
            "request {} in {} ms",
            response.telemetry.request_id, response.telemetry.duration_ms
        )
        .dimmed()
    );
}

pub fn display_notes(response: &NotesResponse) {
    if response.notes.is_empty() {
        println!("No notes for {}", response.project_id.cyan());
        return;
    }
    println!("[NOTES] {}", response.project_id.cyan());
    for note in &response.notes {
        display_note(note);
    }
}

pub fn display_note(note: &SessionNote) {
    println!(
        "  {}  {} = {}",
        note.timestamp.format("%Y-%m-%d %H:%M").to_string().dimmed(),
        note.key.bold(),
        note.value
    );
}

pub fn display_error(message: &str) {
    eprintln!();
    eprintln!("[ERROR] {}", message.red());
    eprintln!();
}

pub fn display_success(message: &str) {
    println!("{} {}", "[OK]".bright_green(), message);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_tag() {
        assert_eq!(confidence_tag(1.0), "[OK]");
        assert_eq!(confidence_tag(0.7), "[OK]");
        assert_eq!(confidence_tag(0.5), "[PARTIAL]");
        assert_eq!(confidence_tag(0.0), "[LOW]");
    }
}
