//! Formula card appended to the report in pro mode.

use oce_common::Hints;

pub fn wants_explain(hints: &Hints) -> bool {
    hints
        .str("mode")
        .is_some_and(|m| m.eq_ignore_ascii_case("pro"))
}

pub fn explain_card() -> String {
    [
        "## EXPLAIN (Pro)",
        "**MCDA**: U(j) = Σ_i w_i · s_ij; min–max normalisation per criterion, reversed for cost criteria; score = U(j) / Σ U.",
        "**Risk**: EL = Σ p_i · L_i; mitigation p_i' = max(0, p_i − Δp_i), L_i' = max(0, L_i − ΔL_i).",
        "**Mitigation ROI**: ROI = (EL_before − EL_after) / cost; net gain = EL_before − EL_after − cost.",
        "**Sim (optional)**: VaR95/ES95 by Monte Carlo, independent risks, seeded.",
    ]
    .join("\n")
}
