// 🏛️ Banco Provincia Extractor
//
// Source: https://www.bancoprovincia.com.ar/web/adhesion_comercios
//
// The adhesion page describes fees in prose, so each fee row gets an ordered
// list of patterns, most specific first. A captured value outside the row's
// plausible range rejects the pattern; when no pattern survives, the
// verified fallback rate is used.

use super::{extract_by_rules, Candidate, FeeExtractor, Provider, RuleTarget};
use crate::driver::{PageSource, PersistPolicy, ProviderConfig, RunPolicy};
use crate::html::searchable_text;
use crate::rates::normalize_rate_text;
use crate::reconciliation::{CandidateSelector, FeeMapping, LabelMatch};
use crate::rules::{ExtractionRule, RuleSet, ValueRange};

pub const PRIMARY_FEE_URL: &str = "https://www.bancoprovincia.com.ar/web/adhesion_comercios";

/// One fee row of the bapro entity and how to find it on the page
pub struct BaproTarget {
    pub concept: &'static str,
    pub term: &'static str,
    pub rules: RuleSet,
    pub fallback: &'static str,
}

fn rules(range: ValueRange, patterns: &[(&str, bool)]) -> RuleSet {
    RuleSet::new(
        patterns
            .iter()
            .map(|&(pattern, dash_guard)| {
                let rule = ExtractionRule::new(pattern).within(range);
                if dash_guard {
                    rule.not_before_dash()
                } else {
                    rule
                }
            })
            .collect(),
    )
}

pub fn targets() -> Vec<BaproTarget> {
    vec![
        BaproTarget {
            concept: "Débito",
            term: "48 hs",
            rules: rules(
                ValueRange::new(0.7, 1.0),
                &[
                    (r"(?i)tarjetas\s+de\s+d[ée]bito[^<]*<[^>]*>\s*[^:]*fiserv[^:]*:\s*(\d+[,.]\d+)\s*%", false),
                    (r"(?i)tarjetas\s+de\s+d[ée]bito.*?fiserv[^:]*:\s*(\d+[,.]\d+)\s*%", false),
                    (r"(?i)(?:débito|debito)[:\s]+(\d+[,.]\d+)\s*%", false),
                    (r"(?i)(\d+[,.]\d+)\s*%[^.]{0,40}(?:con\s+)?(?:tarjeta\s+de\s+)?d[ée]bito", false),
                ],
            ),
            fallback: "0.8% + IVA",
        },
        BaproTarget {
            concept: "Crédito",
            term: "8-10 días hábiles",
            rules: rules(
                ValueRange::new(1.7, 2.0),
                &[
                    (r"(?i)tarjetas\s+de\s+cr[ée]dito\s+en\s+un\s+pago[^:]*:\s*(\d+[,.]\d+)\s*%", false),
                    (r"(?i)(?:crédito|credito)[:\s]+(\d+[,.]\d+)\s*%", false),
                    (r"(?i)(\d+[,.]\d+)\s*%[^.]{0,40}(?:con\s+)?(?:tarjeta\s+de\s+)?cr[ée]dito", false),
                ],
            ),
            fallback: "1.8% + IVA",
        },
        BaproTarget {
            concept: "Clave DNI (Token)",
            term: "Inmediato",
            rules: rules(
                ValueRange::new(0.5, 0.7),
                &[
                    (r"(?i)clave\s+dni\s+token[:\s]*(\d+[,.]\d+)\s*%", false),
                    (r"(?i)clave\s+(?:dni\s+)?token[:\s]*(\d+[,.]\d+)\s*%", false),
                    (r"(?i)(?:clave\s+)?dni\s+(?:token|inmediata)[^.]{0,50}(\d+[,.]\d+)\s*%", true),
                ],
            ),
            fallback: "0.6% + IVA",
        },
        BaproTarget {
            concept: "QR (Saldo en Cuenta)",
            term: "Inmediato",
            rules: rules(
                ValueRange::new(0.7, 0.9),
                &[
                    (r"(?i)qr\s+a\s+trav[ée]s\s+de\s+d[ée]bito\s+en\s+cuenta[^:]*:\s*(\d+[,.]\d+)\s*%", false),
                    (r"(?i)qr[:\s]+(\d+[,.]\d+)\s*%", true),
                    (r"(?i)(?:qr|transferencia).*?saldo[^.]{0,50}(\d+[,.]\d+)\s*%", true),
                    (r"(?i)saldo\s+en\s+cuenta[^.]{0,50}(\d+[,.]\d+)\s*%", true),
                ],
            ),
            fallback: "0.8% + IVA",
        },
    ]
}

pub struct BaproExtractor {
    targets: Vec<RuleTarget>,
}

impl BaproExtractor {
    pub fn new() -> Self {
        BaproExtractor {
            targets: targets()
                .into_iter()
                .map(|t| RuleTarget {
                    label: t.concept.to_string(),
                    rules: t.rules,
                })
                .collect(),
        }
    }
}

impl Default for BaproExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FeeExtractor for BaproExtractor {
    fn extract(&self, html: &str, source: &str) -> Vec<Candidate> {
        let text = searchable_text(html);
        extract_by_rules(&self.targets, &text, source, |m| normalize_rate_text(&m.raw))
    }

    fn provider(&self) -> Provider {
        Provider::Bapro
    }
}

pub fn config() -> ProviderConfig {
    let mappings = targets()
        .into_iter()
        .map(|t| {
            FeeMapping::scraped(
                t.concept,
                t.term,
                CandidateSelector::new(LabelMatch::Exact(t.concept.to_string())),
            )
            .with_fallback(t.fallback)
        })
        .collect();

    ProviderConfig {
        provider: Provider::Bapro,
        entity_id: "bapro".to_string(),
        title: "Banco Provincia Fee Updater".to_string(),
        sources: vec![PageSource::primary("primary", PRIMARY_FEE_URL)],
        mappings,
        policy: RunPolicy {
            load_first: true,
            fatal_when_empty: false,
            persist: PersistPolicy::Always,
            refresh_timestamp: true,
            ..RunPolicy::default()
        },
    }
}
