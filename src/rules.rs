// 🏷️ Extraction Rules - Rules as Data
// Ordered regex rules with plausibility ranges, evaluated first-match-wins
//
// Every provider that reads fees out of free text goes through this module;
// only the pattern lists differ between providers.

use crate::rates::parse_rate_value;
use regex::Regex;

// ============================================================================
// RULE DEFINITION
// ============================================================================

/// Inclusive plausibility bounds for an extracted percentage
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    pub const fn new(min: f64, max: f64) -> Self {
        ValueRange { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        self.min <= value && value <= self.max
    }
}

impl std::fmt::Display for ValueRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}%", self.min, self.max)
    }
}

#[derive(Debug, Clone)]
pub struct ExtractionRule {
    /// Regex whose first capture group is the number
    pub pattern: String,

    /// Compiled once at build; None when the pattern does not compile
    regex: Option<Regex>,

    /// Values outside the range reject the rule (evaluation moves on)
    pub range: Option<ValueRange>,

    /// Skip matches immediately followed by a dash: "0,6% - 0,8%" is a
    /// range start, not a rate
    pub reject_dash_suffix: bool,
}

impl ExtractionRule {
    pub fn new(pattern: &str) -> Self {
        let regex = match Regex::new(pattern) {
            Ok(re) => Some(re),
            Err(e) => {
                tracing::warn!(pattern, error = %e, "invalid extraction pattern");
                None
            }
        };

        ExtractionRule {
            pattern: pattern.to_string(),
            regex,
            range: None,
            reject_dash_suffix: false,
        }
    }

    /// False when the pattern failed to compile; such a rule never matches
    pub fn is_valid(&self) -> bool {
        self.regex.is_some()
    }

    /// Builder pattern: add plausibility range
    pub fn within(mut self, range: ValueRange) -> Self {
        self.range = Some(range);
        self
    }

    /// Builder pattern: ignore percentages that open a range
    pub fn not_before_dash(mut self) -> Self {
        self.reject_dash_suffix = true;
        self
    }

    /// First acceptable capture in `text`, as raw text
    fn capture<'t>(&self, re: &Regex, text: &'t str) -> Option<&'t str> {
        for caps in re.captures_iter(text) {
            let whole = caps.get(0)?;
            if self.reject_dash_suffix && text[whole.end()..].trim_start().starts_with('-') {
                continue;
            }
            return caps.get(1).map(|m| m.as_str().trim());
        }
        None
    }
}

// ============================================================================
// RULE MATCH
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct RuleMatch {
    /// 1-based position of the accepted rule
    pub rule: usize,
    /// Captured number as written on the page ("0,8")
    pub raw: String,
    pub value: f64,
}

// ============================================================================
// RULE SET
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<ExtractionRule>,
}

impl RuleSet {
    pub fn new(rules: Vec<ExtractionRule>) -> Self {
        RuleSet { rules }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Try rules in declared order; the first one that matches with a value
    /// inside its range wins. None is a miss, never an error.
    pub fn first_match(&self, text: &str) -> Option<RuleMatch> {
        for (idx, rule) in self.rules.iter().enumerate() {
            let Some(re) = &rule.regex else {
                continue;
            };

            let Some(raw) = rule.capture(re, text) else {
                continue;
            };

            let Some(value) = parse_rate_value(raw) else {
                tracing::debug!(rule = idx + 1, raw, "capture is not a number");
                continue;
            };

            if let Some(range) = rule.range {
                if !range.contains(value) {
                    tracing::debug!(rule = idx + 1, value, %range, "value outside plausible range");
                    continue;
                }
            }

            return Some(RuleMatch {
                rule: idx + 1,
                raw: raw.to_string(),
                value,
            });
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEBIT: ValueRange = ValueRange::new(0.7, 1.0);

    #[test]
    fn test_value_range_is_inclusive() {
        assert!(DEBIT.contains(0.7));
        assert!(DEBIT.contains(1.0));
        assert!(!DEBIT.contains(1.01));
    }

    #[test]
    fn test_first_rule_wins() {
        let rules = RuleSet::new(vec![
            ExtractionRule::new(r"(?i)d[ée]bito:\s*(\d+[,.]\d+)\s*%").within(DEBIT),
            ExtractionRule::new(r"(\d+[,.]\d+)\s*%").within(DEBIT),
        ]);

        let m = rules.first_match("Tasa 0,9% general. Débito: 0,8% + IVA").unwrap();
        assert_eq!(m.rule, 1);
        assert_eq!(m.raw, "0,8");
        assert_eq!(m.value, 0.8);
    }

    #[test]
    fn test_out_of_range_falls_through_to_next_rule() {
        let rules = RuleSet::new(vec![
            ExtractionRule::new(r"(?i)d[ée]bito:\s*(\d+[,.]\d+)\s*%").within(DEBIT),
            ExtractionRule::new(r"(?i)tarjetas:\s*(\d+[,.]\d+)\s*%").within(DEBIT),
        ]);

        let m = rules.first_match("Débito: 3,5% | Tarjetas: 0,9%").unwrap();
        assert_eq!(m.rule, 2);
        assert_eq!(m.value, 0.9);
    }

    #[test]
    fn test_no_rule_in_range_is_a_miss() {
        let rules = RuleSet::new(vec![
            ExtractionRule::new(r"(?i)d[ée]bito:\s*(\d+[,.]\d+)\s*%").within(DEBIT),
        ]);

        assert_eq!(rules.first_match("Débito: 3,5%"), None);
        assert_eq!(rules.first_match("sin datos"), None);
    }

    #[test]
    fn test_rule_without_range_accepts_any_value() {
        let rules = RuleSet::new(vec![ExtractionRule::new(r"(?i)link\s+de\s+pago[^.]{0,30}(\d+[,.]\d+)\s*%")]);

        let m = rules.first_match("Link de pago: 4,4%").unwrap();
        assert_eq!(m.value, 4.4);
    }

    #[test]
    fn test_dash_suffix_skips_range_start() {
        let rule = ExtractionRule::new(r"(?i)dni[:\s]+(\d+[,.]\d+)\s*%").not_before_dash();
        let rules = RuleSet::new(vec![rule]);

        assert_eq!(rules.first_match("DNI: 0,6% - 0,8%"), None);

        let m = rules.first_match("DNI: 0,6% - 0,8%. Clave DNI: 0,6% + IVA").unwrap();
        assert_eq!(m.raw, "0,6");
    }

    #[test]
    fn test_invalid_pattern_is_skipped() {
        let rules = RuleSet::new(vec![
            ExtractionRule::new(r"(unclosed"),
            ExtractionRule::new(r"qr[:\s]+(\d+[,.]\d+)\s*%"),
        ]);

        let m = rules.first_match("qr: 0,8%").unwrap();
        assert_eq!(m.rule, 2);
    }

    #[test]
    fn test_pattern_is_compiled_when_the_rule_is_built() {
        assert!(!ExtractionRule::new(r"(unclosed").is_valid());

        let rule = ExtractionRule::new(r"qr[:\s]+(\d+[,.]\d+)\s*%").within(DEBIT).not_before_dash();
        assert!(rule.is_valid());

        let rules = RuleSet::new(vec![rule]);
        assert_eq!(rules.first_match("qr: 0,8%").unwrap().value, 0.8);
        assert_eq!(rules.first_match("qr: 0,9% + IVA").unwrap().value, 0.9);
    }
}
