// ⚖️ Reconciliation Engine - Apply resolved rates to the record store
//
// For every configured mapping:
//   extracted candidate → static fallback → skip (warning)
// then the matching fee row is overwritten only when the text differs.
//
// The engine never creates fee rows: a mapping whose row is missing from the
// store is reported and skipped.

use crate::extractors::Candidate;
use crate::rates::{first_rate_value, normalize_decimal_separator, normalize_rate_text, percentage_range};
use crate::rules::ValueRange;
use crate::store::{find_fee, update_fee, Entity, FeeChange};
use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt;

// ============================================================================
// MAPPING CONFIGURATION
// ============================================================================

/// How a candidate label is compared with a selector
#[derive(Debug, Clone, PartialEq)]
pub enum LabelMatch {
    /// Exact label
    Exact(String),
    /// Case-insensitive substring, any of several keywords
    ContainsAny(Vec<String>),
}

impl LabelMatch {
    pub fn contains(keyword: &str) -> Self {
        LabelMatch::ContainsAny(vec![keyword.to_string()])
    }

    fn matches(&self, label: &str) -> bool {
        match self {
            LabelMatch::Exact(expected) => label == expected,
            LabelMatch::ContainsAny(keywords) => {
                let label = label.to_lowercase();
                keywords.iter().any(|k| label.contains(&k.to_lowercase()))
            }
        }
    }
}

/// Which candidate feeds a mapping
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateSelector {
    pub label: LabelMatch,
    /// Only candidates from this page
    pub source: Option<String>,
    /// Only candidates quoted for this settlement term
    pub term: Option<String>,
}

impl CandidateSelector {
    pub fn new(label: LabelMatch) -> Self {
        CandidateSelector {
            label,
            source: None,
            term: None,
        }
    }

    /// Builder pattern: restrict to one page
    pub fn from_source(mut self, source: &str) -> Self {
        self.source = Some(source.to_string());
        self
    }

    /// Builder pattern: restrict to one settlement term
    pub fn with_term(mut self, term: &str) -> Self {
        self.term = Some(term.to_string());
        self
    }

    pub fn matches(&self, c: &Candidate) -> bool {
        if let Some(source) = &self.source {
            if &c.provenance.source != source {
                return false;
            }
        }
        if let Some(term) = &self.term {
            if c.term.as_deref() != Some(term.as_str()) {
                return false;
            }
        }
        self.label.matches(&c.label)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RateSource {
    /// First candidate picked by the selector
    Scraped(CandidateSelector),
    /// Min/max over every candidate of one page
    Range { source: String },
    /// Fixed text, never scraped
    Static(String),
}

/// FeeMapping - binds a (concept, term) fee row to where its rate comes from
#[derive(Debug, Clone, PartialEq)]
pub struct FeeMapping {
    pub concept: String,
    pub term: String,
    pub source: RateSource,
    /// Verified rate used when nothing was extracted
    pub fallback: Option<String>,
    /// Outside this range a resolved rate is still used, but reported
    pub advisory_range: Option<ValueRange>,
}

impl FeeMapping {
    pub fn scraped(concept: &str, term: &str, selector: CandidateSelector) -> Self {
        Self::with_source(concept, term, RateSource::Scraped(selector))
    }

    pub fn range(concept: &str, term: &str, source: &str) -> Self {
        Self::with_source(
            concept,
            term,
            RateSource::Range {
                source: source.to_string(),
            },
        )
    }

    pub fn fixed(concept: &str, term: &str, rate: &str) -> Self {
        Self::with_source(concept, term, RateSource::Static(rate.to_string()))
    }

    fn with_source(concept: &str, term: &str, source: RateSource) -> Self {
        FeeMapping {
            concept: concept.to_string(),
            term: term.to_string(),
            source,
            fallback: None,
            advisory_range: None,
        }
    }

    /// Builder pattern: add verified fallback rate
    pub fn with_fallback(mut self, rate: &str) -> Self {
        self.fallback = Some(rate.to_string());
        self
    }

    /// Builder pattern: add advisory range
    pub fn with_advisory_range(mut self, range: ValueRange) -> Self {
        self.advisory_range = Some(range);
        self
    }
}

// ============================================================================
// RECONCILIATION RESULT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateOrigin {
    Scraped,
    Fallback,
    Static,
}

impl RateOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateOrigin::Scraped => "scraped",
            RateOrigin::Fallback => "fallback",
            RateOrigin::Static => "static",
        }
    }
}

/// Recoverable conditions; they never abort a run
#[derive(Debug, Clone, PartialEq)]
pub enum Warning {
    /// Nothing extracted and no fallback configured
    ExtractionMiss { concept: String, term: String },

    /// Fee row absent from the store
    LookupMiss { concept: String, term: String },

    /// Entity absent from the store
    EntityMissing { id: String },

    /// Resolved value outside the advisory range
    RangeWarning {
        concept: String,
        value: f64,
        range: ValueRange,
    },

    /// A secondary page could not be fetched
    SourceUnavailable { url: String, reason: String },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::ExtractionMiss { concept, term } => {
                write!(f, "Could not find a rate for '{}' ({}). Skipping.", concept, term)
            }
            Warning::LookupMiss { concept, term } => {
                write!(f, "Fee entry not found for '{}' ({}) in the record store", concept, term)
            }
            Warning::EntityMissing { id } => {
                write!(f, "Entity '{}' not found in the record store", id)
            }
            Warning::RangeWarning { concept, value, range } => {
                write!(f, "Unusual rate {}% for '{}' (expected {})", value, concept, range)
            }
            Warning::SourceUnavailable { url, reason } => {
                write!(f, "Source {} unavailable: {}", url, reason)
            }
        }
    }
}

/// What happened to one mapping
#[derive(Debug, Clone, PartialEq)]
pub struct FeeOutcome {
    pub concept: String,
    pub term: String,
    pub origin: RateOrigin,
    pub rate: String,
    /// None when the fee row was missing
    pub change: Option<FeeChange>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReconciliationReport {
    pub entity_id: String,
    pub outcomes: Vec<FeeOutcome>,
    pub warnings: Vec<Warning>,
    /// Any fee row (or entity field) changed
    pub updated: bool,
    /// New lastUpdated value when the timestamp was refreshed
    pub verified_at: Option<String>,
    /// (previous, current) when feeUrl was corrected
    pub fee_url_change: Option<(String, String)>,
}

impl ReconciliationReport {
    pub fn count(&self, origin: RateOrigin) -> usize {
        self.outcomes.iter().filter(|o| o.origin == origin).count()
    }

    pub fn changed_fees(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.change.as_ref().map(|c| c.is_updated()).unwrap_or(false))
            .count()
    }

    pub fn summary(&self) -> String {
        format!(
            "{}: {} fee(s) changed, {} scraped, {} fallback(s), {} static, {} warning(s)",
            self.entity_id,
            self.changed_fees(),
            self.count(RateOrigin::Scraped),
            self.count(RateOrigin::Fallback),
            self.count(RateOrigin::Static),
            self.warnings.len()
        )
    }
}

// ============================================================================
// RECONCILIATION ENGINE
// ============================================================================

pub struct ReconciliationEngine {
    mappings: Vec<FeeMapping>,

    /// Stamp lastUpdated on every run, changed or not ("last verified")
    pub refresh_timestamp: bool,

    /// Canonical feeUrl to enforce on the entity
    pub fee_url: Option<String>,
}

impl ReconciliationEngine {
    pub fn new(mappings: Vec<FeeMapping>) -> Self {
        ReconciliationEngine {
            mappings,
            refresh_timestamp: false,
            fee_url: None,
        }
    }

    /// Builder pattern: refresh lastUpdated on every run
    pub fn with_timestamp_refresh(mut self, refresh: bool) -> Self {
        self.refresh_timestamp = refresh;
        self
    }

    /// Builder pattern: enforce a feeUrl
    pub fn with_fee_url(mut self, url: Option<&str>) -> Self {
        self.fee_url = url.map(|u| u.to_string());
        self
    }

    pub fn mappings(&self) -> &[FeeMapping] {
        &self.mappings
    }

    /// Rate for one mapping: extraction first, then the fallback
    pub fn resolve(&self, mapping: &FeeMapping, candidates: &[Candidate]) -> Option<(String, RateOrigin)> {
        let extracted = match &mapping.source {
            RateSource::Static(rate) => {
                return Some((normalize_decimal_separator(rate), RateOrigin::Static));
            }
            RateSource::Scraped(selector) => candidates
                .iter()
                .find(|c| selector.matches(c))
                .map(|c| normalize_decimal_separator(&normalize_rate_text(&c.rate))),
            RateSource::Range { source } => {
                let rates: Vec<&str> = candidates
                    .iter()
                    .filter(|c| &c.provenance.source == source)
                    .map(|c| c.rate.as_str())
                    .collect();
                percentage_range(&rates)
            }
        };

        extracted
            .map(|rate| (rate, RateOrigin::Scraped))
            .or_else(|| {
                mapping
                    .fallback
                    .as_ref()
                    .map(|fb| (normalize_decimal_separator(fb), RateOrigin::Fallback))
            })
    }

    /// Apply every mapping to `entity`
    ///
    /// `now` becomes lastUpdated when timestamp refresh is enabled.
    pub fn reconcile(
        &self,
        entity: &mut Entity,
        candidates: &[Candidate],
        now: DateTime<Utc>,
    ) -> ReconciliationReport {
        let mut outcomes = Vec::new();
        let mut warnings = Vec::new();
        let mut updated = false;

        for mapping in &self.mappings {
            let Some((rate, origin)) = self.resolve(mapping, candidates) else {
                warnings.push(Warning::ExtractionMiss {
                    concept: mapping.concept.clone(),
                    term: mapping.term.clone(),
                });
                continue;
            };

            if let (Some(range), true) = (mapping.advisory_range, origin != RateOrigin::Static) {
                if let Some(value) = first_rate_value(&rate) {
                    if !range.contains(value) {
                        warnings.push(Warning::RangeWarning {
                            concept: mapping.concept.clone(),
                            value,
                            range,
                        });
                    }
                }
            }

            let change = match find_fee(&mut entity.fees, &mapping.concept, &mapping.term) {
                Some(fee) => {
                    let change = update_fee(fee, &rate);
                    updated |= change.is_updated();
                    Some(change)
                }
                None => {
                    warnings.push(Warning::LookupMiss {
                        concept: mapping.concept.clone(),
                        term: mapping.term.clone(),
                    });
                    None
                }
            };

            outcomes.push(FeeOutcome {
                concept: mapping.concept.clone(),
                term: mapping.term.clone(),
                origin,
                rate,
                change,
            });
        }

        let mut fee_url_change = None;
        if let Some(url) = &self.fee_url {
            if &entity.fee_url != url {
                let previous = std::mem::replace(&mut entity.fee_url, url.clone());
                fee_url_change = Some((previous, url.clone()));
                updated = true;
            }
        }

        let verified_at = if self.refresh_timestamp {
            let stamp = now.to_rfc3339_opts(SecondsFormat::Secs, true);
            entity.last_updated = stamp.clone();
            Some(stamp)
        } else {
            None
        };

        ReconciliationReport {
            entity_id: entity.id.clone(),
            outcomes,
            warnings,
            updated,
            verified_at,
            fee_url_change,
        }
    }
}
