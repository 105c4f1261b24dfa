//! Core orchestrator.
//!
//! Router → modules (in canonical order, each seeing earlier results) →
//! MetaCore → validator → session notes update → report. A run is
//! synchronous and only fails on a malformed request; everything else
//! degrades into warnings on the summary.

use crate::config::Config;
use crate::meta::{self, explain, MetaContext};
use crate::modules::{run_module, ModuleInput};
use crate::report;
use crate::router;
use crate::validator;
use oce_common::error::Result;
use oce_common::{ModuleResult, NoteStore, RunRequest, RunResponse, SessionNote, Summary, Telemetry};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

/// Shared pipeline: immutable config plus the notes store
pub struct Engine {
    config: Arc<Config>,
    store: Arc<dyn NoteStore>,
}

impl Engine {
    pub fn new(config: Config, store: Arc<dyn NoteStore>) -> Self {
        Self {
            config: Arc::new(config),
            store,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn NoteStore> {
        &self.store
    }

    /// Notes for `project_id`; read errors count as "no notes"
    fn load_notes(&self, project_id: Option<&str>) -> Vec<SessionNote> {
        let Some(project_id) = project_id else {
            return Vec::new();
        };
        match self.store.get(project_id) {
            Ok(notes) => notes,
            Err(e) => {
                warn!("Could not read notes for {}: {}", project_id, e);
                Vec::new()
            }
        }
    }

    /// Run the full pipeline for one request
    pub fn run(&self, request: &RunRequest) -> Result<RunResponse> {
        let started = Instant::now();
        request.validate()?;

        let request_id = Uuid::new_v4().to_string();
        let mut events = vec!["start"];
        let project_id = request.effective_project_id().map(str::to_string);
        info!(
            "OCE_START request={} project={}",
            request_id,
            project_id.as_deref().unwrap_or("-")
        );

        let notes = self.load_notes(project_id.as_deref());

        // 1) Route
        let route = router::evaluate(&request.text, &request.hints, &self.config.router);
        events.push("router");

        // 2) Modules, sequentially; later modules may read earlier results
        let mut results: Vec<ModuleResult> = Vec::with_capacity(route.selected_modules.len());
        for kind in &route.selected_modules {
            let input = ModuleInput {
                text: &request.text,
                hints: &request.hints,
                notes: &notes,
                prior: &results,
                config: &self.config,
            };
            let result = run_module(*kind, &input);
            results.push(result);
        }
        events.push("modules_run");

        // 3) MetaCore over the assembled module output
        let assembled = results
            .iter()
            .map(|r| r.markdown.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let meta_out = meta::run_all(&MetaContext {
            text: &request.text,
            assembled: &assembled,
            hints: &request.hints,
            results: &results,
        });
        events.push("meta");

        let sections_present = results
            .iter()
            .flat_map(|r| r.sections_present.iter().cloned())
            .collect();
        let mut summary = Summary {
            intent: route.intent.clone(),
            confidence: route.confidence,
            intents_ranked: route.intents_ranked.clone(),
            keyword_hits: route.keyword_hits.clone(),
            triggers_hit: route.triggers_hit.clone(),
            heuristic_self_check: route.self_check.clone(),
            policy_max_modules: route.policy_max_modules,
            applied_modules: route.selected_modules.clone(),
            modules: results
                .into_iter()
                .map(|r| (r.module.key().to_string(), r))
                .collect(),
            policy_decision: meta::policy_decision(&meta_out),
            meta: meta_out,
            sections_present,
            missing_sections: Vec::new(),
            project_id: project_id.clone(),
            notes,
            warnings: Vec::new(),
            valid: true,
        };

        // 4) Validate
        validator::validate(&mut summary);
        events.push("validated");

        // 5) Store requested notes
        self.store_notes(&mut summary, request);
        events.push("notes");

        let text = report::render(&summary, &route, explain::wants_explain(&request.hints));
        events.push("done");

        let duration_ms = started.elapsed().as_millis() as u64;
        info!(
            "OCE_END request={} modules={} policy={} valid={} duration_ms={}",
            request_id,
            summary.applied_modules.len(),
            summary.policy_decision,
            summary.valid,
            duration_ms
        );

        Ok(RunResponse {
            text,
            json_summary: summary,
            telemetry: Telemetry {
                request_id,
                events: events.into_iter().map(str::to_string).collect(),
                duration_ms,
            },
        })
    }

    fn store_notes(&self, summary: &mut Summary, request: &RunRequest) {
        let to_store = request.hints.notes_to_store();
        if to_store.is_empty() {
            return;
        }
        let Some(project_id) = summary.project_id.clone() else {
            warn!("Ignoring {} note(s): request has no project_id", to_store.len());
            return;
        };

        let mut stored = 0;
        for (key, value) in &to_store {
            match self.store.put(&project_id, key, value) {
                Ok(_) => stored += 1,
                Err(e) => summary.warn(format!("Could not store note '{}': {}", key, e)),
            }
        }
        if stored > 0 {
            summary.notes = self.load_notes(Some(&project_id));
            info!("Stored {} note(s) for {}", stored, project_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oce_common::{Hints, MemoryNoteStore, ModuleKind, OceError};
    use serde_json::json;

    fn engine() -> Engine {
        Engine::new(Config::default(), Arc::new(MemoryNoteStore::new()))
    }

    #[test]
    fn test_blank_text_rejected() {
        let err = engine().run(&RunRequest::new("   ")).unwrap_err();
        assert!(matches!(err, OceError::MalformedRequest(_)));
    }

    #[test]
    fn test_report_header_and_events() {
        let out = engine()
            .run(&RunRequest::new("Should we enter market A or B?"))
            .unwrap();
        assert!(out.text.starts_with(report::REPORT_TITLE));
        assert!(out
            .text
            .contains("ACTIVE MODULES: Structure, StrategyMCDA, RiskExpectedLoss"));
        assert!(out.text.contains("CORE TASK: ['strategic']"));
        assert!(out.text.contains("## META"));
        assert!(!out.text.contains("EXPLAIN"));
        assert_eq!(
            out.telemetry.events,
            vec!["start", "router", "modules_run", "meta", "validated", "notes", "done"]
        );
        assert!(!out.telemetry.request_id.is_empty());
    }

    #[test]
    fn test_pro_mode_adds_explain_card() {
        let request = RunRequest::new("Assess the risk")
            .with_hints(Hints::new().with("mode", json!("pro")));
        let out = engine().run(&request).unwrap();
        assert!(out.text.contains("## EXPLAIN (Pro)"));
    }

    #[test]
    fn test_modules_see_notes() {
        let engine = engine();
        engine.store().put("p9", "budget", "under 5000").unwrap();
        let out = engine
            .run(&RunRequest::new("Plan the launch").with_project("p9"))
            .unwrap();
        let structure = out
            .json_summary
            .module(ModuleKind::Structure)
            .and_then(|r| r.output.as_structure())
            .unwrap();
        assert!(structure.key_points.iter().any(|k| k.contains("under 5000")));
        assert_eq!(out.json_summary.notes.len(), 1);
    }

    #[test]
    fn test_note_without_project_is_not_stored() {
        let engine = engine();
        let request = RunRequest::new("hello")
            .with_hints(Hints::new().with("note", json!("remember me")));
        let out = engine.run(&request).unwrap();
        assert!(out.json_summary.notes.is_empty());
        assert!(out.json_summary.valid);
    }

    #[test]
    fn test_policy_decision_from_safety_gate() {
        let out = engine().run(&RunRequest::new("hello")).unwrap();
        assert_eq!(out.json_summary.policy_decision, "allow");
        assert!(out.json_summary.meta.contains_key("myth_guard"));
    }
}
