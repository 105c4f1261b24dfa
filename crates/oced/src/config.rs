//! Configuration management for oced.
//!
//! Loads settings from $OCE_CONFIG, /etc/oce/config.toml or
//! /var/lib/oce/config.toml, falling back to defaults. Every field has a
//! serde default so partial files are fine.

use anyhow::Result;
use oce_common::{JsonlNoteStore, MemoryNoteStore, NoteStore, DEFAULT_BIND};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Config file path
pub const CONFIG_PATH: &str = "/etc/oce/config.toml";

/// Default config file path for fallback
pub const DEFAULT_CONFIG_PATH: &str = "/var/lib/oce/config.toml";

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Bearer key required on /run_oce and /v1/notes; unset disables the check
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Whole-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Maximum request body size in bytes
    #[serde(default = "default_max_body")]
    pub max_body_bytes: usize,
}

fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

fn default_request_timeout() -> u64 {
    20
}

fn default_max_body() -> usize {
    64 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            api_key: None,
            request_timeout_secs: default_request_timeout(),
            max_body_bytes: default_max_body(),
        }
    }
}

/// Session notes backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotesBackend {
    Jsonl,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotesConfig {
    #[serde(default = "default_notes_backend")]
    pub backend: NotesBackend,

    #[serde(default = "default_notes_path")]
    pub path: PathBuf,

    /// Log length that triggers compaction
    #[serde(default = "default_notes_max_entries")]
    pub max_entries: usize,
}

fn default_notes_backend() -> NotesBackend {
    NotesBackend::Jsonl
}

fn default_notes_path() -> PathBuf {
    JsonlNoteStore::default_path()
}

fn default_notes_max_entries() -> usize {
    5_000
}

impl Default for NotesConfig {
    fn default() -> Self {
        Self {
            backend: default_notes_backend(),
            path: default_notes_path(),
            max_entries: default_notes_max_entries(),
        }
    }
}

impl NotesConfig {
    /// Build the configured store
    pub fn open_store(&self) -> Arc<dyn NoteStore> {
        match self.backend {
            NotesBackend::Jsonl => {
                info!("Session notes: {}", self.path.display());
                Arc::new(JsonlNoteStore::new(&self.path, self.max_entries))
            }
            NotesBackend::Memory => {
                info!("Session notes: in-memory");
                Arc::new(MemoryNoteStore::new())
            }
        }
    }
}

/// One routable intent: keywords that vote for it and the modules it runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentRule {
    pub name: String,
    pub keywords: Vec<String>,
    pub modules: Vec<String>,
}

impl IntentRule {
    fn new(name: &str, keywords: &[&str], modules: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            modules: modules.iter().map(|m| m.to_string()).collect(),
        }
    }
}

/// Router heuristics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    #[serde(default = "default_max_modules")]
    pub max_modules: usize,

    /// Below this confidence the self check asks for clarifiers
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,

    /// Modules used when no intent matches
    #[serde(default = "default_modules")]
    pub default_modules: Vec<String>,

    /// Pick modules from the top intent; when false always use the defaults
    #[serde(default = "default_auto_detect")]
    pub auto_detect_intent: bool,

    #[serde(default = "default_intents")]
    pub intents: Vec<IntentRule>,
}

fn default_max_modules() -> usize {
    3
}

fn default_confidence_threshold() -> f64 {
    0.55
}

fn default_modules() -> Vec<String> {
    vec!["Structure".to_string()]
}

fn default_auto_detect() -> bool {
    true
}

fn default_intents() -> Vec<IntentRule> {
    vec![
        IntentRule::new(
            "strategic",
            &[
                "strategy", "strategic", "strategia", "strategiaa", "plan", "planning", "goal",
                "goals", "vision", "roadmap", "direction", "long-term", "market", "markets",
                "enter", "expand", "expansion", "growth", "prioritization", "priorities",
            ],
            &["Structure", "StrategyMCDA", "RiskExpectedLoss"],
        ),
        IntentRule::new(
            "decision",
            &[
                "decide", "decision", "choose", "choice", "option", "options", "compare",
                "versus", "vs", "alternative", "alternatives", "rank", "ranking", "weights",
                "criteria", "mcda", "should", "which", "better",
            ],
            &["Structure", "StrategyMCDA"],
        ),
        IntentRule::new(
            "risk",
            &[
                "risk", "risks", "riski", "riskiarvio", "riskiarvion", "loss", "losses",
                "probability", "mitigation", "mitigate", "threat", "threats", "exposure",
                "downside", "failure", "uncertainty", "var", "monte-carlo",
            ],
            &["Structure", "RiskExpectedLoss"],
        ),
        IntentRule::new(
            "falsification",
            &[
                "claim", "claims", "hypothesis", "evidence", "causes", "increases", "reduces",
                "prove", "proof", "falsify", "experiment", "test", "true", "always", "never",
            ],
            &["Structure", "CFL"],
        ),
    ]
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_modules: default_max_modules(),
            confidence_threshold: default_confidence_threshold(),
            default_modules: default_modules(),
            auto_detect_intent: default_auto_detect(),
            intents: default_intents(),
        }
    }
}

/// Risk module settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Monte Carlo samples per run when the request does not ask; 0 disables
    #[serde(default)]
    pub default_samples: usize,

    /// Sample count used when a request sets `simulate` without `n_sims`
    #[serde(default = "default_simulate_samples")]
    pub simulate_samples: usize,

    /// Upper bound for any requested sample count
    #[serde(default = "default_max_samples")]
    pub max_samples: usize,

    /// RNG seed; fixed so identical requests give identical estimates
    #[serde(default = "default_seed")]
    pub seed: u64,

    #[serde(default = "default_apply_mitigation")]
    pub apply_mitigation: bool,
}

fn default_simulate_samples() -> usize {
    20_000
}

fn default_max_samples() -> usize {
    200_000
}

fn default_seed() -> u64 {
    0x0CE5_EED
}

fn default_apply_mitigation() -> bool {
    true
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            default_samples: 0,
            simulate_samples: default_simulate_samples(),
            max_samples: default_max_samples(),
            seed: default_seed(),
            apply_mitigation: default_apply_mitigation(),
        }
    }
}

/// MCDA settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McdaConfig {
    /// Weight bump used by the sensitivity check
    #[serde(default = "default_sensitivity_step")]
    pub sensitivity_step: f64,
}

fn default_sensitivity_step() -> f64 {
    0.10
}

impl Default for McdaConfig {
    fn default() -> Self {
        Self {
            sensitivity_step: default_sensitivity_step(),
        }
    }
}

/// Full daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub notes: NotesConfig,

    #[serde(default)]
    pub router: RouterConfig,

    #[serde(default)]
    pub risk: RiskConfig,

    #[serde(default)]
    pub mcda: McdaConfig,
}

impl Config {
    /// Load config from file, or return defaults, then apply env overrides
    pub fn load() -> Self {
        let from_env = std::env::var("OCE_CONFIG").ok();
        let mut config = from_env
            .as_deref()
            .map(Self::load_from_path)
            .unwrap_or_else(|| Err(anyhow::anyhow!("OCE_CONFIG not set")))
            .or_else(|_| Self::load_from_path(CONFIG_PATH))
            .or_else(|_| Self::load_from_path(DEFAULT_CONFIG_PATH))
            .unwrap_or_else(|e| {
                warn!("Config not found, using defaults: {}", e);
                Config::default()
            });
        config.apply_env_overrides();
        config
    }

    /// Load config from specific path
    pub fn load_from_path(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        info!("Loaded config from {}", path);
        Ok(config)
    }

    /// `OCE_API_KEY` and `OCE_BIND` win over file values
    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("OCE_API_KEY") {
            if !key.trim().is_empty() {
                self.server.api_key = Some(key.trim().to_string());
            }
        }
        if let Ok(bind) = std::env::var("OCE_BIND") {
            if !bind.trim().is_empty() {
                self.server.bind = bind.trim().to_string();
            }
        }
    }

    /// Save default config to path (for init)
    pub fn save_default(path: &Path) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        info!("Saved default config to {}", path.display());
        Ok(())
    }
}
