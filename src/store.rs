// 🗄️ Record Store - data.json load/save + lookups
//
// The whole dataset is read once at run start, mutated in memory by the
// reconciler and written back once at run end. No locking: concurrent runs
// against the same file are not supported.

use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

pub const DEFAULT_DATA_FILE: &str = "data.json";

// ============================================================================
// CORE TYPES
// ============================================================================

/// Fee - one row of an entity's fee schedule
///
/// Identified inside its entity by (concept, term).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Fee {
    pub concept: String,
    pub term: String,
    /// "1.8% + IVA", or free text such as "Bonificado o Variable"
    pub rate: String,
}

impl Fee {
    pub fn new(concept: &str, term: &str, rate: &str) -> Self {
        Fee {
            concept: concept.to_string(),
            term: term.to_string(),
            rate: rate.to_string(),
        }
    }
}

/// Entity - a financial-service provider tracked by the store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Entity {
    // ========================================================================
    // IDENTITY
    // ========================================================================
    pub id: String,
    pub name: String,

    #[serde(rename = "type")]
    pub entity_type: String,

    // ========================================================================
    // PRESENTATION
    // ========================================================================
    pub color: String,
    pub text_color: String,
    pub logo: String,

    // ========================================================================
    // SOURCES
    // ========================================================================
    pub fee_url: String,
    pub api_url: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub api_docs: String,

    pub has_api: bool,

    /// ISO-8601 instant of the last verification run
    #[serde(skip_serializing_if = "String::is_empty")]
    pub last_updated: String,

    pub fees: Vec<Fee>,

    // ========================================================================
    // EXTENSIBLE METADATA (fields this tool does not know about)
    // ========================================================================
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Outcome of writing a new rate into a fee row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeeChange {
    Updated { previous: String, current: String },
    Unchanged { current: String },
}

impl FeeChange {
    pub fn is_updated(&self) -> bool {
        matches!(self, FeeChange::Updated { .. })
    }
}

// ============================================================================
// LOAD / SAVE
// ============================================================================

/// Read and parse the record store
///
/// Fails when the file is unreadable, is not a JSON array of entities, or
/// repeats an entity id.
pub fn load_data(path: &Path) -> Result<Vec<Entity>, StoreError> {
    let raw = std::fs::read_to_string(path).map_err(|source| StoreError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    parse_data(&raw, path)
}

fn parse_data(raw: &str, path: &Path) -> Result<Vec<Entity>, StoreError> {
    let data: Vec<Entity> = serde_json::from_str(raw).map_err(|source| StoreError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let mut seen = HashSet::new();
    for entity in &data {
        if !seen.insert(entity.id.as_str()) {
            return Err(StoreError::DuplicateId {
                path: path.to_path_buf(),
                id: entity.id.clone(),
            });
        }
    }

    Ok(data)
}

/// Serialize entities the way the store file is kept on disk:
/// 4-space indent, literal `&`, `<`, `>` and non-ASCII text, trailing newline.
pub fn to_store_string(data: &[Entity]) -> Result<String, StoreError> {
    let mut buf = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    data.serialize(&mut ser).map_err(StoreError::Serialize)?;

    // serde_json only emits valid UTF-8
    let mut output = String::from_utf8_lossy(&buf).into_owned();
    output.push('\n');
    Ok(output)
}

/// Rewrite the whole store file
pub fn save_data(path: &Path, data: &[Entity]) -> Result<(), StoreError> {
    let output = to_store_string(data)?;
    std::fs::write(path, output).map_err(|source| StoreError::Write {
        path: path.to_path_buf(),
        source,
    })
}

// ============================================================================
// LOOKUPS
// ============================================================================

pub fn find_entity<'a>(data: &'a mut [Entity], id: &str) -> Option<&'a mut Entity> {
    data.iter_mut().find(|e| e.id == id)
}

/// Fee with the given (concept, term) key, compared exactly
pub fn find_fee<'a>(fees: &'a mut [Fee], concept: &str, term: &str) -> Option<&'a mut Fee> {
    fees.iter_mut()
        .find(|f| f.concept == concept && f.term == term)
}

/// Overwrite the rate when it differs from the stored one
pub fn update_fee(fee: &mut Fee, new_rate: &str) -> FeeChange {
    if fee.rate != new_rate {
        let previous = std::mem::replace(&mut fee.rate, new_rate.to_string());
        FeeChange::Updated {
            previous,
            current: fee.rate.clone(),
        }
    } else {
        FeeChange::Unchanged {
            current: fee.rate.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r##"[
    {
        "id": "bna",
        "name": "Banco Nación",
        "type": "Banco",
        "color": "#005FA8",
        "textColor": "#FFFFFF",
        "logo": "logos/bna.svg",
        "feeUrl": "https://aranceles.fiservargentina.com/",
        "apiUrl": "",
        "hasApi": false,
        "fees": [
            { "concept": "Débito", "term": "24 hs", "rate": "0.8% + IVA" },
            { "concept": "Crédito", "term": "8-10 días hábiles", "rate": "1.8% + IVA" }
        ]
    },
    {
        "id": "mercadopago",
        "name": "Mercado Pago",
        "type": "Billetera",
        "color": "#00B1EA",
        "textColor": "#FFFFFF",
        "logo": "logos/mp.svg",
        "feeUrl": "https://www.mercadopago.com.ar/ayuda/2779",
        "apiUrl": "https://api.mercadopago.com",
        "apiDocs": "Docs & SDKs <v1>",
        "hasApi": true,
        "lastUpdated": "2025-01-01T00:00:00Z",
        "fees": [],
        "badge": { "label": "Nuevo" }
    }
]"##;

    fn sample() -> Vec<Entity> {
        parse_data(SAMPLE, Path::new("data.json")).unwrap()
    }

    #[test]
    fn test_parse_sample() {
        let data = sample();

        assert_eq!(data.len(), 2);
        assert_eq!(data[0].entity_type, "Banco");
        assert_eq!(data[0].fees.len(), 2);
        assert_eq!(data[1].api_docs, "Docs & SDKs <v1>");
        assert!(data[1].has_api);
        assert!(data[1].extra.contains_key("badge"));
    }

    #[test]
    fn test_store_string_format() {
        let output = to_store_string(&sample()).unwrap();

        assert!(output.ends_with("]\n"));
        assert!(output.contains("\n    {\n        \"id\": \"bna\""));
        assert!(output.contains("Docs & SDKs <v1>"));
        assert!(!output.contains("\\u0026"));
        assert!(output.contains("Banco Nación"));
        assert!(output.contains("\"rate\": \"0.8% + IVA\""));
    }

    #[test]
    fn test_empty_optional_fields_are_omitted() {
        let output = to_store_string(&sample()[..1]).unwrap();

        assert!(!output.contains("apiDocs"));
        assert!(!output.contains("lastUpdated"));
        assert!(output.contains("\"apiUrl\": \"\""));
    }

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        let original = sample();

        save_data(&path, &original).unwrap();
        let reloaded = load_data(&path).unwrap();

        assert_eq!(reloaded, original);

        // Saving again must be byte-identical (no double escaping)
        let first = std::fs::read_to_string(&path).unwrap();
        save_data(&path, &reloaded).unwrap();
        let second = std::fs::read_to_string(&path).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let raw = r#"[{"id":"uala","fees":[]},{"id":"uala","fees":[]}]"#;
        let result = parse_data(raw, Path::new("data.json"));

        assert!(matches!(result, Err(StoreError::DuplicateId { ref id, .. }) if id == "uala"));
    }

    #[test]
    fn test_malformed_store_is_parse_error() {
        let result = parse_data("{\"id\": \"bna\"}", Path::new("data.json"));
        assert!(matches!(result, Err(StoreError::Parse { .. })));
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_data(&dir.path().join("nope.json"));
        assert!(matches!(result, Err(StoreError::Read { .. })));
    }

    #[test]
    fn test_find_entity_and_fee() {
        let mut data = sample();

        let entity = find_entity(&mut data, "bna").unwrap();
        let fee = find_fee(&mut entity.fees, "Crédito", "8-10 días hábiles").unwrap();
        assert_eq!(fee.rate, "1.8% + IVA");

        assert!(find_fee(&mut entity.fees, "Crédito", "24 hs").is_none());
        assert!(find_entity(&mut data, "naranja").is_none());
    }

    #[test]
    fn test_update_fee_detects_change() {
        let mut fee = Fee::new("Débito", "24 hs", "0.8% + IVA");

        let same = update_fee(&mut fee, "0.8% + IVA");
        assert!(!same.is_updated());

        let changed = update_fee(&mut fee, "0.9% + IVA");
        assert_eq!(
            changed,
            FeeChange::Updated {
                previous: "0.8% + IVA".to_string(),
                current: "0.9% + IVA".to_string(),
            }
        );
        assert_eq!(fee.rate, "0.9% + IVA");
    }
}
