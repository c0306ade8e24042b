// 💯 Rate Text - parsing and normalization of quoted fees
//
// Providers publish fees with the Argentine decimal comma ("0,8%") and
// usually quote them before tax. Stored rates always use a dot and carry
// the "+ IVA" notation.

use regex::Regex;
use std::sync::LazyLock;

pub const IVA_SUFFIX: &str = "+ IVA";

/// Appended when a concept's rate depends on the payment method used
pub const BY_METHOD_QUALIFIER: &str = "(según medio)";

/// Two percentages closer than this are the same rate
pub const RANGE_TOLERANCE: f64 = 0.001;

static PERCENTAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+[,.]?\d*)\s*%").expect("percentage pattern"));

static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+[,.]?\d*").expect("number pattern"));

/// "1,8" → "1.8"
pub fn normalize_decimal_separator(s: &str) -> String {
    s.replace(',', ".")
}

/// Parse a bare number written with either decimal separator
pub fn parse_rate_value(s: &str) -> Option<f64> {
    let cleaned = normalize_decimal_separator(s.trim().trim_end_matches('%').trim());
    cleaned.parse::<f64>().ok()
}

/// First number appearing anywhere in a rate string ("0.8% + IVA" → 0.8)
pub fn first_rate_value(s: &str) -> Option<f64> {
    NUMBER_RE
        .find(s)
        .and_then(|m| parse_rate_value(m.as_str()))
}

/// Ensure a percent sign and the tax notation are present, exactly once
///
/// "0,8" → "0,8% + IVA", "1.8%" → "1.8% + IVA", "0.6% + IVA" unchanged.
pub fn normalize_rate_text(s: &str) -> String {
    let mut rate = s.trim().to_string();
    if !rate.contains('%') {
        rate.push('%');
    }
    if !rate.to_lowercase().contains("iva") {
        rate.push(' ');
        rate.push_str(IVA_SUFFIX);
    }
    rate
}

/// Build a single rate or a "min - max" range from several quoted fees
///
/// Each input is a table cell such as "0,8%"; inputs without a percentage are
/// ignored. Returns None when nothing usable is left.
pub fn percentage_range<S: AsRef<str>>(fee_texts: &[S]) -> Option<String> {
    let mut values: Vec<(f64, String)> = Vec::new();

    for text in fee_texts {
        if let Some(caps) = PERCENTAGE_RE.captures(text.as_ref()) {
            let raw = &caps[1];
            if let Some(v) = parse_rate_value(raw) {
                values.push((v, format!("{}%", raw)));
            }
        }
    }

    let (first, rest) = values.split_first()?;
    let mut min = first;
    let mut max = first;
    for v in rest {
        if v.0 < min.0 {
            min = v;
        }
        if v.0 > max.0 {
            max = v;
        }
    }

    let result = if (min.0 - max.0).abs() < RANGE_TOLERANCE {
        format!("{} {}", min.1, IVA_SUFFIX)
    } else {
        format!("{} - {} {} {}", min.1, max.1, IVA_SUFFIX, BY_METHOD_QUALIFIER)
    };

    Some(normalize_decimal_separator(&result))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimal_normalization() {
        assert_eq!(normalize_decimal_separator("1,8"), "1.8");
        assert_eq!(normalize_decimal_separator("0,6"), "0.6");
        assert_eq!(normalize_decimal_separator("0.6"), "0.6");
        assert_eq!(
            normalize_decimal_separator(&normalize_decimal_separator("2,9% + IVA")),
            "2.9% + IVA"
        );
    }

    #[test]
    fn test_parse_rate_value_accepts_both_separators() {
        assert_eq!(parse_rate_value("0,8"), Some(0.8));
        assert_eq!(parse_rate_value("1.8"), Some(1.8));
        assert_eq!(parse_rate_value(" 3,25% "), Some(3.25));
        assert_eq!(parse_rate_value("abc"), None);
    }

    #[test]
    fn test_first_rate_value() {
        assert_eq!(first_rate_value("0.8% + IVA"), Some(0.8));
        assert_eq!(first_rate_value("Desde 2,9%"), Some(2.9));
        assert_eq!(first_rate_value("Bonificado o Variable"), None);
    }

    #[test]
    fn test_normalize_appends_single_percent() {
        assert_eq!(normalize_rate_text("0,8"), "0,8% + IVA");
        assert_eq!(normalize_rate_text("1.8%"), "1.8% + IVA");
        assert_eq!(normalize_rate_text("0.6% + IVA").matches('%').count(), 1);
    }

    #[test]
    fn test_normalize_never_duplicates_iva() {
        let once = normalize_rate_text("0.8");
        let twice = normalize_rate_text(&once);

        assert_eq!(once, "0.8% + IVA");
        assert_eq!(twice, once);
        assert_eq!(twice.matches("IVA").count(), 1);
    }

    #[test]
    fn test_range_with_equal_values_is_single_rate() {
        assert_eq!(
            percentage_range(&["0,8%", "0.8%"]).as_deref(),
            Some("0.8% + IVA")
        );
    }

    #[test]
    fn test_range_with_different_values() {
        assert_eq!(
            percentage_range(&["0,9%", "0,7%", "0,8%"]).as_deref(),
            Some("0.7% - 0.9% + IVA (según medio)")
        );
    }

    #[test]
    fn test_range_ignores_cells_without_percentage() {
        assert_eq!(percentage_range(&["Sin costo", "0,6 %"]).as_deref(), Some("0.6% + IVA"));
        assert_eq!(percentage_range::<&str>(&[]), None);
        assert_eq!(percentage_range(&["Sin costo"]), None);
    }
}
