// Monitor Comisiones - Core Library
// Merchant-fee updaters for Argentine acquirers, shared by the CLI and the trigger server

pub mod error;          // Fatal error taxonomy
pub mod store;          // JSON record store (entities + fees)
pub mod fetch;          // Page fetching
pub mod rates;          // Rate text parsing / normalization
pub mod rules;          // Ordered extraction rules with plausibility ranges
pub mod html;           // Page text and table helpers
pub mod extractors;     // One extractor per provider
pub mod reconciliation; // Candidates → fee rows
pub mod datestamp;      // "Actualizado:" marker in index.html
pub mod driver;         // One provider run, end to end

// Re-export commonly used types
pub use error::{FetchError, StoreError, UpdateError};
pub use store::{
    Entity, Fee, FeeChange,
    load_data, save_data, find_entity, find_fee, update_fee,
};
pub use fetch::{HttpFetcher, PageFetcher};
pub use extractors::{
    Candidate, FeeExtractor, Provider, UnknownProvider,
    get_extractor, provider_config,
};
pub use reconciliation::{
    CandidateSelector, FeeMapping, LabelMatch, RateOrigin, RateSource,
    ReconciliationEngine, ReconciliationReport, Warning,
};
pub use datestamp::DateStampOutcome;
pub use driver::{run, ProviderConfig, RunOptions, RunSummary};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
