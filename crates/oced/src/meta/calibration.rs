//! Metacognitive calibration: the caller's confidence against the model's.
//!
//! Reads `self_prob`, `model_prob` and `outcome` from hints. Without a valid
//! `self_prob` the checker reports `insufficient-data`.

use super::{round_to, MetaContext};
use serde_json::{json, Value};

/// Model probability assumed when none is supplied
pub const DEFAULT_MODEL_PROB: f64 = 0.60;

/// Gap beyond which the caller counts as over- or underconfident
const CALIBRATION_BAND: f64 = 0.10;

fn probability(ctx: &MetaContext<'_>, key: &str) -> Option<f64> {
    ctx.hints.f64(key).filter(|p| (0.0..=1.0).contains(p))
}

pub fn metacog_calib(ctx: &MetaContext<'_>) -> Value {
    let Some(self_prob) = probability(ctx, "self_prob") else {
        return json!({
            "status": "insufficient-data",
            "message": "Provide 'self_prob' between 0 and 1.",
        });
    };
    let model_prob = probability(ctx, "model_prob").unwrap_or(DEFAULT_MODEL_PROB);

    let delta = model_prob - self_prob;
    let state = if delta > CALIBRATION_BAND {
        "underconfident"
    } else if delta < -CALIBRATION_BAND {
        "overconfident"
    } else {
        "aligned"
    };
    let advice = match state {
        "overconfident" => "Overconfident: lower your certainty by 10–20 points or gather more evidence.",
        "underconfident" => "Underconfident: the reasoning is strong; certainty can rise moderately.",
        _ => "Calibration aligned. Keep the same discipline.",
    };

    let mut out = json!({
        "status": "ok",
        "self_prob": round_to(self_prob, 3),
        "model_prob": round_to(model_prob, 3),
        "delta": round_to(delta, 3),
        "state": state,
        "advice": advice,
    });

    let outcome = ctx.hints.f64("outcome").filter(|o| *o == 0.0 || *o == 1.0);
    if let (Some(outcome), Some(obj)) = (outcome, out.as_object_mut()) {
        obj.insert(
            "brier_user".to_string(),
            json!(round_to((self_prob - outcome).powi(2), 4)),
        );
        obj.insert(
            "brier_model".to_string(),
            json!(round_to((model_prob - outcome).powi(2), 4)),
        );
    }
    out
}
