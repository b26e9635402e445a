//! Global settings: command-line flags with environment fallbacks.

use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgAction, Args};
use lasearch_core::finding::DEFAULT_CONFIDENCE;
use lasearch_store::{DuckStore, IngestOptions, ReplaceScope};
use tracing::Level;

#[derive(Debug, Clone, Args)]
pub struct Settings {
    /// DuckDB file holding findings and risks.
    #[arg(long, global = true, env = "LASEARCH_DB", default_value = "lasearch.duckdb")]
    pub db: PathBuf,

    /// Which existing findings an ingest replaces: `kind` or `matter`.
    #[arg(long, global = true, env = "LASEARCH_REPLACE_SCOPE", default_value = "kind")]
    pub replace_scope: ReplaceScope,

    /// Confidence (0-100) recorded on extracted findings.
    #[arg(
        long,
        global = true,
        env = "LASEARCH_CONFIDENCE",
        default_value_t = DEFAULT_CONFIDENCE,
        value_parser = clap::value_parser!(u8).range(0..=100)
    )]
    pub confidence: u8,

    /// More log output on stderr (-v debug, -vv trace).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Settings {
    pub fn ingest_options(&self) -> IngestOptions {
        IngestOptions {
            replace_scope: self.replace_scope,
            confidence: self.confidence,
        }
    }

    pub fn log_level(&self) -> Level {
        match self.verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    }

    pub fn open_store(&self) -> anyhow::Result<DuckStore> {
        DuckStore::open_persistent(&self.db)
            .with_context(|| format!("opening matter store {}", self.db.display()))
    }
}
