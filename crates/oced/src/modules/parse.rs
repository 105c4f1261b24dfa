//! Free-text number and key/value parsing shared by the modules.

use regex::Regex;
use std::sync::OnceLock;

fn number_regex() -> &'static Regex {
    static NUM_RE: OnceLock<Regex> = OnceLock::new();
    NUM_RE.get_or_init(|| {
        Regex::new(
            r"(?x)
            (?P<sign>[-+−])?
            (?P<int>\d{1,3}(?:[,\x20]\d{3})+|\d+)?
            (?:[.,](?P<frac>\d+))?
            (?P<unit>\s*(?:[kKmM]\b|%))?",
        )
        .expect("static number regex")
    })
}

/// Parse the first number in `raw`, honouring `k`, `M` and `%` suffixes.
///
/// `7k` → 7000, `25%` → 0.25, `5,500€` → 5500, `.25` → 0.25, `1 200` → 1200.
pub fn parse_number(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    for caps in number_regex().captures_iter(raw) {
        let int = caps.name("int").map(|m| m.as_str());
        let frac = caps.name("frac").map(|m| m.as_str());
        if int.is_none() && frac.is_none() {
            continue;
        }

        let digits: String = int
            .unwrap_or("0")
            .chars()
            .filter(|c| c.is_ascii_digit())
            .collect();
        let text = match frac {
            Some(f) => format!("{}.{}", digits, f),
            None => digits,
        };
        let mut value: f64 = text.parse().ok()?;

        match caps.name("unit").map(|m| m.as_str().trim()) {
            Some("k") | Some("K") => value *= 1_000.0,
            Some("m") | Some("M") => value *= 1_000_000.0,
            Some("%") => value /= 100.0,
            _ => {}
        }

        if matches!(caps.name("sign").map(|m| m.as_str()), Some("-") | Some("−")) {
            value = -value;
        }
        return value.is_finite().then_some(value);
    }
    None
}

/// Canonical MCDA criteria and their aliases
pub const CRITERIA_ALIASES: &[(&str, &[&str])] = &[
    ("Impact", &["impact", "benefit", "value", "utility", "gain", "score"]),
    ("Cost", &["cost", "price", "budget", "expense", "capex", "opex", "€", "eur", "euro"]),
    ("Risk", &["risk", "p", "prob", "probability", "uncertainty", "chance"]),
];

/// Map a criterion name or alias to its canonical name
pub fn canonical_criterion(name: &str) -> Option<&'static str> {
    let n = name.trim().to_lowercase();
    CRITERIA_ALIASES
        .iter()
        .find(|(canon, aliases)| n == canon.to_lowercase() || aliases.contains(&n.as_str()))
        .map(|(canon, _)| *canon)
}

fn keyval_regex() -> &'static Regex {
    static KV_RE: OnceLock<Regex> = OnceLock::new();
    KV_RE.get_or_init(|| {
        Regex::new(r"(?P<key>[A-Za-z€]+)\s*[=:]?\s*(?P<val>[-+−]?(?:\d[\d.,]*|\.\d+)(?:\s*(?:[kKmM]\b|%))?)")
            .expect("static key/value regex")
    })
}

/// Criterion values from a field string such as `impact 8, cost=7k, risk: 25%`.
/// Unknown keys are ignored; the first value for a criterion wins.
pub fn parse_criteria(fields: &str) -> Vec<(&'static str, f64)> {
    let mut out: Vec<(&'static str, f64)> = Vec::new();
    for caps in keyval_regex().captures_iter(fields) {
        let Some(canon) = canonical_criterion(&caps["key"]) else {
            continue;
        };
        if out.iter().any(|(c, _)| *c == canon) {
            continue;
        }
        if let Some(value) = parse_number(&caps["val"]) {
            out.push((canon, value));
        }
    }
    out
}

/// Clamp into [0, 1]
pub fn clamp01(x: f64) -> f64 {
    x.clamp(0.0, 1.0)
}

/// Format with thousands separators and no decimals: 15000.4 → "15,000"
pub fn fmt_thousands(x: f64) -> String {
    let rounded = x.round();
    let negative = rounded < 0.0;
    let digits = format!("{:.0}", rounded.abs());
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    if negative && out != "0" {
        out.insert(0, '-');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_parse_plain_numbers() {
        assert_eq!(parse_number("8"), Some(8.0));
        assert_eq!(parse_number("7000"), Some(7000.0));
        assert_eq!(parse_number("0.25"), Some(0.25));
        assert_eq!(parse_number(".25"), Some(0.25));
        assert_eq!(parse_number("-3"), Some(-3.0));
    }

    #[test]
    fn test_parse_suffixes() {
        assert_eq!(parse_number("7k"), Some(7000.0));
        assert_eq!(parse_number("1.5M"), Some(1_500_000.0));
        assert_relative_eq!(parse_number("25%").unwrap(), 0.25);
    }

    #[test]
    fn test_parse_thousands() {
        assert_eq!(parse_number("5,500€"), Some(5500.0));
        assert_eq!(parse_number("15,000"), Some(15000.0));
        assert_eq!(parse_number("1 200"), Some(1200.0));
    }

    #[test]
    fn test_parse_garbage() {
        assert_eq!(parse_number("abc"), None);
        assert_eq!(parse_number(""), None);
    }

    #[test]
    fn test_canonical_criterion() {
        assert_eq!(canonical_criterion("Benefit"), Some("Impact"));
        assert_eq!(canonical_criterion("price"), Some("Cost"));
        assert_eq!(canonical_criterion("prob"), Some("Risk"));
        assert_eq!(canonical_criterion("colour"), None);
    }

    #[test]
    fn test_parse_criteria_forms() {
        let kv = parse_criteria("impact 8, cost 7k, risk 25%");
        assert_eq!(kv, vec![("Impact", 8.0), ("Cost", 7000.0), ("Risk", 0.25)]);

        let kv = parse_criteria("impact=7 price=5,500€ risk=.30");
        assert_eq!(kv[0], ("Impact", 7.0));
        assert_eq!(kv[1], ("Cost", 5500.0));
        assert_relative_eq!(kv[2].1, 0.30);

        assert!(parse_criteria("nothing useful here").is_empty());
    }

    #[test]
    fn test_fmt_thousands() {
        assert_eq!(fmt_thousands(15000.4), "15,000");
        assert_eq!(fmt_thousands(999.0), "999");
        assert_eq!(fmt_thousands(1234567.0), "1,234,567");
        assert_eq!(fmt_thousands(-2500.0), "-2,500");
        assert_eq!(fmt_thousands(0.0), "0");
    }
}
