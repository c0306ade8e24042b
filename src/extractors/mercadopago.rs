// 💳 Mercado Pago Extractor
//
// Source pages (Buenos Aires province):
//   - Point terminals: https://www.mercadopago.com.ar/ayuda/2779
//   - QR payments:     https://www.mercadopago.com.ar/ayuda/3605
//
// Both pages render the fees in a table inside div#tabla1, one row group per
// payment type:
//   | Tarjeta de crédito | 6,29% | Al instante |
//   |                      3,25% | 10 días     |

use super::{Candidate, FeeExtractor, Provider};
use crate::driver::{PageSource, PersistPolicy, ProviderConfig, RunPolicy};
use crate::html::{grouped_rows, table_rows};
use crate::reconciliation::{CandidateSelector, FeeMapping, LabelMatch};

pub const POINT_FEE_URL: &str = "https://www.mercadopago.com.ar/ayuda/2779";
pub const QR_FEE_URL: &str = "https://www.mercadopago.com.ar/ayuda/3605";

const FEES_TABLE: &str = "div#tabla1";

pub struct MercadoPagoExtractor;

impl FeeExtractor for MercadoPagoExtractor {
    fn extract(&self, html: &str, source: &str) -> Vec<Candidate> {
        let Some(rows) = table_rows(html, FEES_TABLE) else {
            tracing::warn!(source, "fees table ({}) not found", FEES_TABLE);
            return Vec::new();
        };

        grouped_rows(&rows)
            .into_iter()
            .filter(|r| !r.group.is_empty() && r.cells[0].contains('%'))
            .map(|r| Candidate::new(&r.group, &r.cells[0], source).with_term(&r.cells[1]))
            .collect()
    }

    fn provider(&self) -> Provider {
        Provider::MercadoPago
    }
}

fn point(payment_type: &str, page_term: &str) -> CandidateSelector {
    CandidateSelector::new(LabelMatch::contains(payment_type))
        .from_source("point")
        .with_term(page_term)
}

pub fn config() -> ProviderConfig {
    ProviderConfig {
        provider: Provider::MercadoPago,
        entity_id: "mercadopago".to_string(),
        title: "Mercado Pago Fee Updater".to_string(),
        sources: vec![
            PageSource::primary("point", POINT_FEE_URL),
            PageSource::primary("qr", QR_FEE_URL),
        ],
        mappings: vec![
            FeeMapping::scraped("Point - Débito", "En el momento", point("Tarjeta de débito", "Al instante")),
            FeeMapping::scraped("Point - Crédito", "En el momento", point("Tarjeta de crédito", "Al instante")),
            FeeMapping::scraped("Point - Crédito", "14 días", point("Tarjeta de crédito", "10 días")),
            FeeMapping::range("QR", "En el momento", "qr"),
        ],
        policy: RunPolicy {
            load_first: false,
            fatal_when_empty: true,
            persist: PersistPolicy::OnChange,
            ..RunPolicy::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconciliation::{RateOrigin, ReconciliationEngine};
    use crate::store::{Entity, Fee};
    use chrono::Utc;

    const POINT_PAGE: &str = r#"<html><body>
        <div id="tabla1"><table>
          <thead><tr><th>Medio de pago</th><th>Costo</th><th>Plazo</th></tr></thead>
          <tbody>
            <tr><td>Tarjeta de débito</td><td>1,5%</td><td>Al instante</td></tr>
            <tr><td>Tarjeta de crédito</td><td>6,29%</td><td>Al instante</td></tr>
            <tr><td>3,25%</td><td>10 días</td></tr>
            <tr><td>Sin costo</td><td>30 días</td></tr>
          </tbody>
        </table></div></body></html>"#;

    const QR_PAGE: &str = r#"<div id="tabla1"><table><tbody>
        <tr><td>Dinero en cuenta</td><td>0,8%</td><td>Al instante</td></tr>
        <tr><td>Tarjeta de débito</td><td>0,8%</td><td>Al instante</td></tr>
        <tr><td>Tarjeta de crédito</td><td>6,29%</td><td>Al instante</td></tr>
        </tbody></table></div>"#;

    #[test]
    fn test_extracts_grouped_rows() {
        let found = MercadoPagoExtractor.extract(POINT_PAGE, "point");

        assert_eq!(found.len(), 3);
        assert_eq!(found[2].label, "Tarjeta de crédito");
        assert_eq!(found[2].rate, "3,25%");
        assert_eq!(found[2].term.as_deref(), Some("10 días"));
        assert!(found.iter().all(|c| c.provenance.source == "point"));
    }

    #[test]
    fn test_missing_table_yields_nothing() {
        assert!(MercadoPagoExtractor
            .extract("<p>Página en mantenimiento</p>", "qr")
            .is_empty());
    }

    #[test]
    fn test_mappings_against_both_pages() {
        let mut candidates = MercadoPagoExtractor.extract(POINT_PAGE, "point");
        candidates.extend(MercadoPagoExtractor.extract(QR_PAGE, "qr"));

        let mut entity = Entity {
            id: "mercadopago".to_string(),
            fees: vec![
                Fee::new("Point - Débito", "En el momento", "1.49% + IVA"),
                Fee::new("Point - Crédito", "En el momento", "6.29% + IVA"),
                Fee::new("Point - Crédito", "14 días", "3.25% + IVA"),
                Fee::new("QR", "En el momento", "0.8% + IVA"),
            ],
            ..Default::default()
        };

        let engine = ReconciliationEngine::new(config().mappings);
        let report = engine.reconcile(&mut entity, &candidates, Utc::now());

        assert!(report.updated);
        assert_eq!(report.changed_fees(), 2);
        assert_eq!(entity.fees[0].rate, "1.5% + IVA");
        assert_eq!(entity.fees[1].rate, "6.29% + IVA");
        assert_eq!(entity.fees[2].rate, "3.25% + IVA");
        assert_eq!(entity.fees[3].rate, "0.8% - 6.29% + IVA (según medio)");
        assert_eq!(report.count(RateOrigin::Fallback), 0);
    }
}
