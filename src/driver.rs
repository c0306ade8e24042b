// 🚚 Updater Driver - one provider run, end to end
//
// load store ↔ fetch pages → extract → (backup) → reconcile → persist → date stamp
//
// The order of "load store" and "fetch pages" is a per-provider choice, as are
// the empty-extraction and persistence policies; everything else is shared.

use crate::datestamp::{refresh_date_stamp, DateStampOutcome, DEFAULT_INDEX_FILE};
use crate::error::UpdateError;
use crate::extractors::{get_extractor, Candidate, Provider};
use crate::fetch::PageFetcher;
use crate::reconciliation::{FeeMapping, ReconciliationEngine, ReconciliationReport, Warning};
use crate::store::{find_entity, load_data, save_data, Entity, FeeChange, DEFAULT_DATA_FILE};
use chrono::{DateTime, Local, Utc};
use std::path::{Path, PathBuf};

const RULE_WIDTH: usize = 70;

// ============================================================================
// PROVIDER CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceRole {
    /// Always fetched; a fetch failure aborts the run
    Primary,
    /// Fetched only when fewer than `min_candidates` were extracted so far;
    /// a fetch failure is a warning
    Backup { min_candidates: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageSource {
    /// Logical key carried into candidate provenance
    pub key: String,
    pub url: String,
    pub role: SourceRole,
}

impl PageSource {
    pub fn primary(key: &str, url: &str) -> Self {
        PageSource {
            key: key.to_string(),
            url: url.to_string(),
            role: SourceRole::Primary,
        }
    }

    pub fn backup(key: &str, url: &str, min_candidates: usize) -> Self {
        PageSource {
            key: key.to_string(),
            url: url.to_string(),
            role: SourceRole::Backup { min_candidates },
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PersistPolicy {
    /// Write the store only when a fee (or entity field) changed
    #[default]
    OnChange,
    /// Write the store on every run that reaches reconciliation
    Always,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunPolicy {
    /// Load the store before fetching (a broken store fails fast)
    pub load_first: bool,
    /// Abort when no candidate was extracted from any page
    pub fatal_when_empty: bool,
    pub persist: PersistPolicy,
    /// Stamp the entity's lastUpdated on every run
    pub refresh_timestamp: bool,
    /// Canonical feeUrl for the entity
    pub fee_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub provider: Provider,
    /// Entity id in the record store
    pub entity_id: String,
    /// Banner printed at the start of a run
    pub title: String,
    pub sources: Vec<PageSource>,
    pub mappings: Vec<FeeMapping>,
    pub policy: RunPolicy,
}

// ============================================================================
// RUN OPTIONS / SUMMARY
// ============================================================================

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub data_file: PathBuf,
    pub index_file: PathBuf,
    pub refresh_date_stamp: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            data_file: PathBuf::from(DEFAULT_DATA_FILE),
            index_file: PathBuf::from(DEFAULT_INDEX_FILE),
            refresh_date_stamp: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub provider: Provider,
    pub candidates: Vec<Candidate>,
    /// None when the entity was missing from the store
    pub report: Option<ReconciliationReport>,
    /// Fetch warnings followed by reconciliation warnings
    pub warnings: Vec<Warning>,
    pub persisted: bool,
    pub date_stamp: Option<DateStampOutcome>,
}

impl RunSummary {
    /// Any fee or entity field changed
    pub fn updated(&self) -> bool {
        self.report.as_ref().map(|r| r.updated).unwrap_or(false)
    }
}

// ============================================================================
// RUN
// ============================================================================

pub fn run(
    config: &ProviderConfig,
    fetcher: &dyn PageFetcher,
    opts: &RunOptions,
) -> Result<RunSummary, UpdateError> {
    run_at(config, fetcher, opts, Utc::now())
}

/// Same as `run`, with the clock injected
pub fn run_at(
    config: &ProviderConfig,
    fetcher: &dyn PageFetcher,
    opts: &RunOptions,
    now: DateTime<Utc>,
) -> Result<RunSummary, UpdateError> {
    let policy = &config.policy;

    println!("{}", "=".repeat(RULE_WIDTH));
    println!("{}", config.title);
    println!("{}", "=".repeat(RULE_WIDTH));

    let loaded = if policy.load_first {
        Some(load_store(&opts.data_file)?)
    } else {
        None
    };

    let (candidates, mut warnings) = collect_candidates(config, fetcher)?;

    if candidates.is_empty() {
        if policy.fatal_when_empty {
            return Err(UpdateError::NothingExtracted(config.provider.name().to_string()));
        }
        println!("\nℹ No fees scraped from the website, verified fallback rates will be used");
    } else {
        println!("\n✓ Scraping complete: {} fee(s) found", candidates.len());
        for c in &candidates {
            println!("   - {}", c);
        }
    }

    let mut data = match loaded {
        Some(d) => d,
        None => load_store(&opts.data_file)?,
    };

    println!("\n📝 Updating {} with scraped values...", opts.data_file.display());
    println!("{}", "-".repeat(RULE_WIDTH));

    let Some(entity) = find_entity(&mut data, &config.entity_id) else {
        let missing = Warning::EntityMissing {
            id: config.entity_id.clone(),
        };
        println!("⚠ {}", missing);
        tracing::warn!(entity = %config.entity_id, "entity missing, store left untouched");
        warnings.push(missing);
        return Ok(RunSummary {
            provider: config.provider,
            candidates,
            report: None,
            warnings,
            persisted: false,
            date_stamp: None,
        });
    };

    let report = reconcile(config, entity, &candidates, now);
    println!("{}", "-".repeat(RULE_WIDTH));
    println!("{}", report.summary());
    warnings.extend(report.warnings.iter().cloned());

    let persist = match policy.persist {
        PersistPolicy::Always => true,
        PersistPolicy::OnChange => report.updated,
    };
    if persist {
        save_data(&opts.data_file, &data)?;
        if report.updated {
            println!("\n✓ {} has been successfully updated", opts.data_file.display());
        } else {
            println!("\n✓ No fee changes detected, {} rewritten", opts.data_file.display());
        }
    } else {
        println!("\nℹ No fee changes detected. {} remains unchanged", opts.data_file.display());
    }

    let date_stamp = if opts.refresh_date_stamp {
        println!("\n📅 Updating date stamp in {}...", opts.index_file.display());
        let outcome = refresh_date_stamp(&opts.index_file, now.with_timezone(&Local).date_naive());
        let line = outcome.describe(&opts.index_file);
        match outcome {
            DateStampOutcome::Updated(_) | DateStampOutcome::AlreadyCurrent(_) => println!("   {}", line),
            _ => println!("   ⚠ {}", line),
        }
        Some(outcome)
    } else {
        None
    };

    println!("\n{}", "=".repeat(RULE_WIDTH));
    println!("Script finished successfully.");

    Ok(RunSummary {
        provider: config.provider,
        candidates,
        report: Some(report),
        warnings,
        persisted: persist,
        date_stamp,
    })
}

fn load_store(path: &Path) -> Result<Vec<Entity>, UpdateError> {
    println!("\n📂 Loading {}...", path.display());
    let data = load_data(path)?;
    println!("✓ Loaded {} entities", data.len());
    Ok(data)
}

/// Fetch and extract every source the policy asks for
fn collect_candidates(
    config: &ProviderConfig,
    fetcher: &dyn PageFetcher,
) -> Result<(Vec<Candidate>, Vec<Warning>), UpdateError> {
    let extractor = get_extractor(config.provider);
    let mut candidates: Vec<Candidate> = Vec::new();
    let mut warnings = Vec::new();

    for source in &config.sources {
        match source.role {
            SourceRole::Primary => {
                println!("\n🌐 Fetching {} fees from: {}", source.key, source.url);
                let html = fetcher.fetch(&source.url)?;
                let found = extractor.extract(&html, &source.key);
                if found.is_empty() {
                    println!("⚠ Could not extract any {} fees from the page", source.key);
                } else {
                    println!("✓ Extracted {} {} fee entries", found.len(), source.key);
                }
                candidates.extend(found);
            }
            SourceRole::Backup { min_candidates } => {
                if candidates.len() >= min_candidates {
                    continue;
                }
                println!(
                    "\nℹ Found {} fee(s) so far. Trying backup: {}",
                    candidates.len(),
                    source.url
                );
                match fetcher.fetch(&source.url) {
                    Ok(html) => {
                        for c in extractor.extract(&html, &source.key) {
                            if candidates.iter().any(|existing| existing.label == c.label) {
                                continue;
                            }
                            println!("✓ Added {} fee from backup source", c.label);
                            candidates.push(c);
                        }
                    }
                    Err(e) => {
                        let w = Warning::SourceUnavailable {
                            url: source.url.clone(),
                            reason: e.to_string(),
                        };
                        println!("⚠ {}", w);
                        tracing::warn!(url = %source.url, error = %e, "backup source failed");
                        warnings.push(w);
                    }
                }
            }
        }
    }

    Ok((candidates, warnings))
}

fn reconcile(
    config: &ProviderConfig,
    entity: &mut Entity,
    candidates: &[Candidate],
    now: DateTime<Utc>,
) -> ReconciliationReport {
    let engine = ReconciliationEngine::new(config.mappings.clone())
        .with_timestamp_refresh(config.policy.refresh_timestamp)
        .with_fee_url(config.policy.fee_url.as_deref());

    let report = engine.reconcile(entity, candidates, now);

    for outcome in &report.outcomes {
        match &outcome.change {
            Some(FeeChange::Updated { previous, current }) => println!(
                "✓ Updated '{}' ({}): '{}' -> '{}' ({})",
                outcome.concept,
                outcome.term,
                previous,
                current,
                outcome.origin.as_str()
            ),
            Some(FeeChange::Unchanged { current }) => println!(
                "  '{}' ({}): '{}' (source: {})",
                outcome.concept,
                outcome.term,
                current,
                outcome.origin.as_str()
            ),
            None => {}
        }
    }
    for w in &report.warnings {
        println!("⚠ {}", w);
    }
    if let Some((previous, current)) = &report.fee_url_change {
        println!("✓ Updated feeUrl: '{}' -> '{}'", previous, current);
    }
    if let Some(stamp) = &report.verified_at {
        println!("✓ Updated lastUpdated timestamp: {}", stamp);
    }

    report
}
