//! Primary scoring modules.
//!
//! Each module is a pure function of the request text, hints, session
//! notes and the results of modules that ran before it. Modules never fail:
//! unparsable input degrades to defaults and is reported in diagnostics.

pub mod cfl;
pub mod parse;
pub mod risk_expected_loss;
pub mod strategy_mcda;
pub mod structure;

use crate::config::Config;
use oce_common::{Hints, ModuleKind, ModuleResult, SessionNote};
use tracing::debug;

/// Everything a module may read
pub struct ModuleInput<'a> {
    pub text: &'a str,
    pub hints: &'a Hints,
    pub notes: &'a [SessionNote],
    /// Results of modules that already ran in this request
    pub prior: &'a [ModuleResult],
    pub config: &'a Config,
}

impl<'a> ModuleInput<'a> {
    pub fn prior_result(&self, kind: ModuleKind) -> Option<&'a ModuleResult> {
        self.prior.iter().find(|r| r.module == kind)
    }
}

/// Run one module
pub fn run_module(kind: ModuleKind, input: &ModuleInput<'_>) -> ModuleResult {
    let result = match kind {
        ModuleKind::Structure => structure::run(input),
        ModuleKind::StrategyMcda => strategy_mcda::run(input),
        ModuleKind::RiskExpectedLoss => risk_expected_loss::run(input),
        ModuleKind::Cfl => cfl::run(input),
    };
    debug!(
        "Module {} produced {} sections",
        kind,
        result.sections_present.len()
    );
    result
}

/// Markdown builder shared by the modules
#[derive(Default)]
pub(crate) struct Markdown {
    lines: Vec<String>,
    sections: Vec<String>,
}

impl Markdown {
    pub fn new(title: &str) -> Self {
        Self {
            lines: vec![format!("# {}", title)],
            sections: Vec::new(),
        }
    }

    /// Start a bold-labelled section and record it as present
    pub fn section(&mut self, name: &str) -> &mut Self {
        if self.lines.len() > 1 {
            self.lines.push(String::new());
        }
        self.lines.push(format!("**{}:**", name));
        self.sections.push(name.to_string());
        self
    }

    pub fn line(&mut self, text: impl Into<String>) -> &mut Self {
        self.lines.push(text.into());
        self
    }

    pub fn bullets<I, S>(&mut self, items: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for item in items {
            self.lines.push(format!("- {}", item.as_ref()));
        }
        self
    }

    pub fn finish(self) -> (String, Vec<String>) {
        (self.lines.join("\n"), self.sections)
    }
}
