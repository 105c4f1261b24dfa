//! MetaCore: advisory checkers run after the primary modules.
//!
//! The checker set is a closed, static table. Each entry is a pure function
//! of the shared [`MetaContext`] and contributes exactly one key to
//! `Summary.meta`. Adding a checker means adding a row to [`REGISTRY`].

pub mod advisory;
pub mod calibration;
pub mod explain;
pub mod myth_guard;

use oce_common::{Hints, ModuleResult};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// Key whose `status` becomes the summary's policy decision
pub const SAFETY_GATE: &str = "safety_gate";

/// Policy decision when the safety gate output carries no status
pub const DEFAULT_POLICY: &str = "allow";

/// Read-only view handed to every checker
pub struct MetaContext<'a> {
    /// Request text as received
    pub text: &'a str,
    /// Report assembled from the module blocks so far
    pub assembled: &'a str,
    pub hints: &'a Hints,
    pub results: &'a [ModuleResult],
}

/// One registered checker
pub struct MetaModule {
    pub name: &'static str,
    pub run: fn(&MetaContext<'_>) -> Value,
}

pub const REGISTRY: &[MetaModule] = &[
    MetaModule {
        name: "bias_sentinel",
        run: advisory::bias_sentinel,
    },
    MetaModule {
        name: "cfl_ethics",
        run: advisory::cfl_ethics,
    },
    MetaModule {
        name: "evidence_engine",
        run: advisory::evidence_engine,
    },
    MetaModule {
        name: SAFETY_GATE,
        run: advisory::safety_gate,
    },
    MetaModule {
        name: "metacog_calib",
        run: calibration::metacog_calib,
    },
    MetaModule {
        name: "myth_guard",
        run: myth_guard::myth_guard,
    },
    MetaModule {
        name: "gps_prioritizer",
        run: advisory::gps_prioritizer,
    },
];

/// Names of all registered checkers, in run order
pub fn names() -> impl Iterator<Item = &'static str> {
    REGISTRY.iter().map(|m| m.name)
}

/// Run every checker and collect their annotations
pub fn run_all(ctx: &MetaContext<'_>) -> BTreeMap<String, Value> {
    let mut out = BTreeMap::new();
    for module in REGISTRY {
        let value = (module.run)(ctx);
        debug!("MetaCore {} -> {}", module.name, value);
        out.insert(module.name.to_string(), value);
    }
    out
}

/// Policy decision carried by the safety gate annotation
pub fn policy_decision(meta: &BTreeMap<String, Value>) -> String {
    meta.get(SAFETY_GATE)
        .and_then(|v| v.get("status"))
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_POLICY)
        .to_string()
}

/// Round to `places` decimals
pub(crate) fn round_to(x: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (x * factor).round() / factor
}
