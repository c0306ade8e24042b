// 📱 Ualá Bis Extractor
//
// Primary: https://mpos.ualabis.com.ar/productos/mpos/
// Backup:  https://www.ualabis.com.ar/
//
// Ualá renders most of its pricing client-side, so inline script payloads are
// searched together with the visible text. Fees it does not publish
// (credit, payment links) are expected to come from the verified fallbacks.

use super::{extract_by_rules, Candidate, FeeExtractor, Provider, RuleTarget};
use crate::driver::{PageSource, PersistPolicy, ProviderConfig, RunPolicy};
use crate::html::searchable_text;
use crate::rates::IVA_SUFFIX;
use crate::reconciliation::{CandidateSelector, FeeMapping, LabelMatch};
use crate::rules::{ExtractionRule, RuleSet, ValueRange};
use regex::Regex;
use std::sync::LazyLock;

pub const PRIMARY_URL: &str = "https://mpos.ualabis.com.ar/productos/mpos/";
pub const BACKUP_URL: &str = "https://www.ualabis.com.ar/";

/// Below this many candidates on the primary page, the backup is consulted
const MIN_PRIMARY_CANDIDATES: usize = 2;

const EXPECTED_RANGE: ValueRange = ValueRange::new(2.0, 6.0);

static DESDE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^desde\s+").expect("desde pattern"));

/// "Desde 2,9%" → "2.9"
pub fn normalize_fee(s: &str) -> String {
    DESDE_RE
        .replace(s.trim(), "")
        .replace(',', ".")
        .replace('%', "")
        .trim()
        .to_string()
}

fn case_insensitive(patterns: &[&str]) -> RuleSet {
    RuleSet::new(
        patterns
            .iter()
            .map(|p| ExtractionRule::new(&format!("(?i){}", p)))
            .collect(),
    )
}

pub struct UalaExtractor {
    targets: Vec<RuleTarget>,
}

impl UalaExtractor {
    pub fn new() -> Self {
        let targets = vec![
            RuleTarget {
                label: "débito".to_string(),
                rules: case_insensitive(&[
                    r"(\d+[,.]\d+)\s*%[^.]{0,50}(?:con\s+)?(?:tarjeta\s+de\s+)?d[ée]bito",
                    r"d[ée]bito\s*:?\s*(\d+[,.]\d+)\s*%",
                    r#"["']?d[ée]bito["']?\s*:\s*["']?(\d+[,.]\d+)\s*%?["']?"#,
                ]),
            },
            RuleTarget {
                label: "crédito".to_string(),
                rules: case_insensitive(&[
                    r"(\d+[,.]\d+)\s*%[^.]{0,50}(?:con\s+)?(?:tarjeta\s+de\s+)?cr[ée]dito",
                    r"cr[ée]dito\s*:?\s*(\d+[,.]\d+)\s*%",
                    r"cr[ée]dito\s+(?:en\s+(?:1|un)\s+pago|en\s+el\s+momento)[^.]{0,30}(\d+[,.]\d+)\s*%",
                    r#"["']?cr[ée]dito["']?\s*:\s*["']?(\d+[,.]\d+)\s*%?["']?"#,
                ]),
            },
            RuleTarget {
                label: "link".to_string(),
                rules: case_insensitive(&[
                    r"link\s+de\s+pago[^.]{0,30}(\d+[,.]\d+)\s*%",
                    r"(?:pago\s+online|e-commerce|ecommerce)[^.]{0,30}(\d+[,.]\d+)\s*%",
                    r#"["']?link[_\s]?(?:de[_\s])?pago["']?\s*:\s*["']?(\d+[,.]\d+)\s*%?["']?"#,
                ]),
            },
        ];

        UalaExtractor { targets }
    }
}

impl Default for UalaExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FeeExtractor for UalaExtractor {
    fn extract(&self, html: &str, source: &str) -> Vec<Candidate> {
        let searchable = searchable_text(html);
        extract_by_rules(&self.targets, &searchable, source, |m| {
            format!("{}% {}", normalize_fee(&m.raw), IVA_SUFFIX)
        })
    }

    fn provider(&self) -> Provider {
        Provider::Uala
    }
}

fn keywords(words: &[&str]) -> CandidateSelector {
    CandidateSelector::new(LabelMatch::ContainsAny(
        words.iter().map(|w| w.to_string()).collect(),
    ))
}

pub fn config() -> ProviderConfig {
    ProviderConfig {
        provider: Provider::Uala,
        entity_id: "uala".to_string(),
        title: "Ualá Bis Fee Update Script".to_string(),
        sources: vec![
            PageSource::primary("primary", PRIMARY_URL),
            PageSource::backup("backup", BACKUP_URL, MIN_PRIMARY_CANDIDATES),
        ],
        mappings: vec![
            FeeMapping::scraped("mPOS - Débito", "En el momento", keywords(&["débito", "debito"]))
                .with_fallback("2.9% + IVA")
                .with_advisory_range(EXPECTED_RANGE),
            FeeMapping::scraped("mPOS - Crédito", "En el momento", keywords(&["crédito", "credito"]))
                .with_fallback("4.4% + IVA")
                .with_advisory_range(EXPECTED_RANGE),
            FeeMapping::scraped("Link de Pago", "En el momento", keywords(&["link", "pago"]))
                .with_fallback("4.4% + IVA")
                .with_advisory_range(EXPECTED_RANGE),
        ],
        policy: RunPolicy {
            load_first: false,
            fatal_when_empty: false,
            persist: PersistPolicy::Always,
            refresh_timestamp: true,
            fee_url: Some(PRIMARY_URL.to_string()),
        },
    }
}
