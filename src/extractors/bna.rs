// 🏦 BNA Extractor - Fiserv authoritative source
//
// Fiserv Argentina acquires for BNA and publishes the BCRA-regulated caps at
// https://aranceles.fiservargentina.com/. The page has no stable structure,
// so figures are located by proximity: the percentage nearest to the first
// "Débito"/"Crédito" label wins, as long as it is on the right side of 1%.

use super::{Candidate, FeeExtractor, Provider};
use crate::driver::{PageSource, PersistPolicy, ProviderConfig, RunPolicy};
use crate::html::searchable_text;
use crate::rates::parse_rate_value;
use crate::reconciliation::{CandidateSelector, FeeMapping, LabelMatch};
use crate::rules::ValueRange;
use regex::Regex;
use std::sync::LazyLock;

pub const FISERV_FEE_URL: &str = "https://aranceles.fiservargentina.com/";

/// Max distance, in characters, between a label and its percentage
const PROXIMITY_WINDOW: usize = 300;

/// Debit caps sit below this value, credit caps above it
const DEBIT_CREDIT_BOUNDARY: f64 = 1.0;

static PERCENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+[,.]?\d*)\s*%").expect("percent pattern"));

// Also matches the mojibake some Fiserv builds serve ("DÃ©bito")
static DEBIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)[Dd](?:Ã©|é)bito|[Dd]ebito").expect("debit label pattern"));

static CREDIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)[Cc](?:rÃ©|ré)dito|[Cc]redito").expect("credit label pattern"));

struct Percentage<'t> {
    /// Character offset of the match start
    pos: usize,
    raw: &'t str,
    value: f64,
}

/// Byte → character offsets for one text, built in a single pass
struct CharIndex(Vec<usize>);

impl CharIndex {
    fn new(text: &str) -> Self {
        CharIndex(text.char_indices().map(|(i, _)| i).collect())
    }

    /// Characters before `byte_idx`
    fn char_pos(&self, byte_idx: usize) -> usize {
        self.0.partition_point(|&b| b < byte_idx)
    }
}

/// Nearest percentage to `label_pos` inside the window that `accept`s
///
/// Ties go to the earlier percentage.
fn nearest<'t>(
    percentages: &[Percentage<'t>],
    label_pos: usize,
    accept: impl Fn(f64) -> bool,
) -> Option<&'t str> {
    let mut best: Option<(usize, &'t str)> = None;

    for p in percentages {
        let dist = p.pos.abs_diff(label_pos);
        if dist >= PROXIMITY_WINDOW || !accept(p.value) {
            continue;
        }
        if best.map(|(d, _)| dist < d).unwrap_or(true) {
            best = Some((dist, p.raw));
        }
    }

    best.map(|(_, raw)| raw)
}

pub struct FiservExtractor;

impl FeeExtractor for FiservExtractor {
    fn extract(&self, html: &str, source: &str) -> Vec<Candidate> {
        let text = searchable_text(html);
        let index = CharIndex::new(&text);

        let percentages: Vec<Percentage<'_>> = PERCENT_RE
            .captures_iter(&text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let raw = caps.get(1)?.as_str();
                Some(Percentage {
                    pos: index.char_pos(whole.start()),
                    raw,
                    value: parse_rate_value(raw)?,
                })
            })
            .collect();

        if percentages.is_empty() {
            tracing::debug!(source, "no percentages on page");
            return Vec::new();
        }

        let mut out = Vec::new();

        if let Some(label) = DEBIT_RE.find(&text) {
            let pos = index.char_pos(label.start());
            if let Some(raw) = nearest(&percentages, pos, |v| v < DEBIT_CREDIT_BOUNDARY) {
                out.push(Candidate::new("Débito", &format!("{}%", raw), source).with_term("24 horas hábiles"));
            }
        }

        if let Some(label) = CREDIT_RE.find(&text) {
            let pos = index.char_pos(label.start());
            if let Some(raw) = nearest(&percentages, pos, |v| v > DEBIT_CREDIT_BOUNDARY) {
                out.push(Candidate::new("Crédito", &format!("{}%", raw), source).with_term("8-10 días hábiles"));
            }
        }

        out
    }

    fn provider(&self) -> Provider {
        Provider::Bna
    }
}

pub fn config() -> ProviderConfig {
    ProviderConfig {
        provider: Provider::Bna,
        entity_id: "bna".to_string(),
        title: "BNA Fee Updater (Fiserv Authoritative Source)".to_string(),
        sources: vec![PageSource::primary("fiserv", FISERV_FEE_URL)],
        mappings: vec![
            FeeMapping::scraped("Débito", "24 hs", CandidateSelector::new(LabelMatch::contains("Débito")))
                .with_advisory_range(ValueRange::new(0.5, 1.1)),
            FeeMapping::scraped(
                "Crédito",
                "8-10 días hábiles",
                CandidateSelector::new(LabelMatch::contains("Crédito")),
            )
            .with_advisory_range(ValueRange::new(1.5, 2.1)),
            FeeMapping::fixed("Mantenimiento Terminal", "Mensual", "Bonificado o Variable"),
        ],
        policy: RunPolicy {
            load_first: true,
            fatal_when_empty: true,
            persist: PersistPolicy::OnChange,
            ..RunPolicy::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FISERV_PAGE: &str = r#"<html><body>
        <h1>Aranceles máximos BCRA</h1>
        <section><h2>Tarjetas de Débito</h2><p>Arancel máximo: 0,8%</p><p>Acreditación en 24 horas hábiles</p></section>
        <section><h2>Tarjetas de Crédito</h2><p>Arancel máximo: 1,8%</p><p>Acreditación en 8 a 10 días hábiles</p></section>
        </body></html>"#;

    #[test]
    fn test_extracts_debit_and_credit_by_proximity() {
        let found = FiservExtractor.extract(FISERV_PAGE, "fiserv");

        assert_eq!(found.len(), 2);
        assert_eq!(found[0].label, "Débito");
        assert_eq!(found[0].rate, "0,8%");
        assert_eq!(found[0].term.as_deref(), Some("24 horas hábiles"));
        assert_eq!(found[1].label, "Crédito");
        assert_eq!(found[1].rate, "1,8%");
    }

    #[test]
    fn test_boundary_filters_wrong_side_values() {
        // Figures swapped relative to their labels
        let found = FiservExtractor.extract("<p>Débito 1,8% Crédito 0,8%</p>", "fiserv");

        assert_eq!(found.len(), 2);
        assert_eq!(found[0].label, "Débito");
        assert_eq!(found[0].rate, "0,8%");
        assert_eq!(found[1].label, "Crédito");
        assert_eq!(found[1].rate, "1,8%");

        // Only a credit-sized figure near a lone debit label
        assert!(FiservExtractor.extract("<p>Débito 1,8%</p>", "fiserv").is_empty());
    }

    #[test]
    fn test_far_away_percentage_is_ignored() {
        let filler = "x".repeat(400);
        let html = format!("<p>Débito</p><p>{}</p><p>0,8%</p>", filler);

        assert!(FiservExtractor.extract(&html, "fiserv").is_empty());
    }

    #[test]
    fn test_window_counts_characters_not_bytes() {
        // 150 two-byte chars: 300 bytes but only 150 characters
        let filler = "é".repeat(150);
        let html = format!("<p>Débito {} 0,8%</p>", filler);

        let found = FiservExtractor.extract(&html, "fiserv");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].rate, "0,8%");
    }

    #[test]
    fn test_char_index() {
        let index = CharIndex::new("Débito 0,8%");
        assert_eq!(index.char_pos(0), 0);
        assert_eq!(index.char_pos(3), 2);
        assert_eq!(index.char_pos(8), 7);
        assert_eq!(index.char_pos("Débito 0,8%".len()), 11);
    }

    #[test]
    fn test_figures_inside_script_payload() {
        let html = r#"<section><h2>Débito</h2><h2>Crédito</h2><div id="caps"></div></section>
            <script>window.caps = {"debito": "0,8%", "credito": "1,8%"};</script>"#;

        let found = FiservExtractor.extract(html, "fiserv");

        assert_eq!(found.len(), 2);
        assert_eq!(found[0].label, "Débito");
        assert_eq!(found[0].rate, "0,8%");
        assert_eq!(found[1].label, "Crédito");
        assert_eq!(found[1].rate, "1,8%");
    }

    #[test]
    fn test_mojibake_label() {
        let found = FiservExtractor.extract("<p>DÃ©bito: 0,8%</p>", "fiserv");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].label, "Débito");
    }

    #[test]
    fn test_page_without_percentages() {
        assert!(FiservExtractor.extract("<p>Débito y Crédito</p>", "fiserv").is_empty());
    }
}
