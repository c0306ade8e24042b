// 🏗️ Extractor Framework
// One extractor per provider, all producing the same transient candidates
//
// Extractors never fail: markup that cannot be understood yields no
// candidates, and the reconciler falls back to static rates.

pub mod bapro;
pub mod bna;
pub mod mercadopago;
pub mod uala;

use crate::driver::ProviderConfig;
use crate::rules::{RuleMatch, RuleSet};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// CORE TYPES
// ============================================================================

/// Provider - which updater a run belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    MercadoPago,
    Bna,
    Bapro,
    Uala,
}

impl Provider {
    pub const ALL: [Provider; 4] = [
        Provider::MercadoPago,
        Provider::Bna,
        Provider::Bapro,
        Provider::Uala,
    ];

    /// Identifier used on the command line, in URLs and as entity id
    pub fn id(&self) -> &'static str {
        match self {
            Provider::MercadoPago => "mercadopago",
            Provider::Bna => "bna",
            Provider::Bapro => "bapro",
            Provider::Uala => "uala",
        }
    }

    /// Human-readable name for display
    pub fn name(&self) -> &'static str {
        match self {
            Provider::MercadoPago => "Mercado Pago",
            Provider::Bna => "BNA (Fiserv)",
            Provider::Bapro => "Banco Provincia",
            Provider::Uala => "Ualá Bis",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown provider '{0}' (expected one of: mercadopago, bna, bapro, uala)")]
pub struct UnknownProvider(pub String);

impl FromStr for Provider {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Provider::ALL
            .into_iter()
            .find(|p| p.id() == wanted)
            .ok_or_else(|| UnknownProvider(s.to_string()))
    }
}

/// Where a candidate came from
#[derive(Debug, Clone, PartialEq)]
pub struct Provenance {
    /// Logical page key ("point", "qr", "primary", "backup", ...)
    pub source: String,
    /// 1-based rule that produced it, for rule-driven extractors
    pub rule: Option<usize>,
}

/// Candidate - one fee figure found on a page
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Payment type as the page (or the extractor) names it
    pub label: String,
    /// Rate text, e.g. "0,8%" or "0,8% + IVA"
    pub rate: String,
    /// Settlement term when the page states one
    pub term: Option<String>,
    pub provenance: Provenance,
}

impl Candidate {
    pub fn new(label: &str, rate: &str, source: &str) -> Self {
        Candidate {
            label: label.to_string(),
            rate: rate.to_string(),
            term: None,
            provenance: Provenance {
                source: source.to_string(),
                rule: None,
            },
        }
    }

    /// Builder pattern: add settlement term
    pub fn with_term(mut self, term: &str) -> Self {
        self.term = Some(term.to_string());
        self
    }

    /// Builder pattern: record the rule that matched
    pub fn with_rule(mut self, rule: usize) -> Self {
        self.provenance.rule = Some(rule);
        self
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.label, self.rate)?;
        if let Some(term) = &self.term {
            write!(f, " (plazo: {})", term)?;
        }
        write!(f, " [{}", self.provenance.source)?;
        if let Some(rule) = self.provenance.rule {
            write!(f, ", pattern {}", rule)?;
        }
        write!(f, "]")
    }
}

// ============================================================================
// EXTRACTOR TRAIT
// ============================================================================

/// FeeExtractor - Core trait
pub trait FeeExtractor {
    /// Pull candidates out of one fetched page
    ///
    /// # Arguments
    /// * `html` - raw page body
    /// * `source` - logical key of the page, copied into each provenance
    fn extract(&self, html: &str, source: &str) -> Vec<Candidate>;

    fn provider(&self) -> Provider;
}

/// Extractor for a provider (factory)
pub fn get_extractor(provider: Provider) -> Box<dyn FeeExtractor> {
    match provider {
        Provider::MercadoPago => Box::new(mercadopago::MercadoPagoExtractor),
        Provider::Bna => Box::new(bna::FiservExtractor),
        Provider::Bapro => Box::new(bapro::BaproExtractor::new()),
        Provider::Uala => Box::new(uala::UalaExtractor::new()),
    }
}

/// Static configuration for a provider (URLs, mappings, run policy)
pub fn provider_config(provider: Provider) -> ProviderConfig {
    match provider {
        Provider::MercadoPago => mercadopago::config(),
        Provider::Bna => bna::config(),
        Provider::Bapro => bapro::config(),
        Provider::Uala => uala::config(),
    }
}

// ============================================================================
// RULE-DRIVEN EXTRACTION (shared by text-pattern providers)
// ============================================================================

/// A payment type and the ordered rules that find its rate
#[derive(Debug, Clone)]
pub struct RuleTarget {
    pub label: String,
    pub rules: RuleSet,
}

/// Evaluate every target's rule set against `text`
///
/// `format` turns the accepted match into the candidate's rate text.
pub fn extract_by_rules<F>(
    targets: &[RuleTarget],
    text: &str,
    source: &str,
    format: F,
) -> Vec<Candidate>
where
    F: Fn(&RuleMatch) -> String,
{
    let mut out = Vec::new();

    for target in targets {
        match target.rules.first_match(text) {
            Some(m) => {
                tracing::debug!(label = %target.label, rule = m.rule, raw = %m.raw, "rule matched");
                out.push(Candidate::new(&target.label, &format(&m), source).with_rule(m.rule));
            }
            None => {
                tracing::debug!(label = %target.label, rules = target.rules.len(), "no rule matched");
            }
        }
    }

    out
}
