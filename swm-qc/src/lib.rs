//! swm-qc library interface
//!
//! Replicate detection, duplicate consolidation and threshold classification
//! for stream monitoring data. The `swm-qc` binary is a thin CLI over these
//! modules.

pub mod aggregator;
pub mod bio_resolver;
pub mod classifier;
pub mod consolidator;
pub mod db;
pub mod error;
pub mod field_log;
pub mod habitat;
pub mod macro_columns;
pub mod parameters;
pub mod pipeline;
pub mod replicate_finder;
pub mod utils;

pub use crate::error::{QcError, QcResult};

use crate::classifier::{ThresholdClassifier, ThresholdRegistry};
use crate::consolidator::ChemicalConsolidator;
use crate::field_log::{FieldLog, FieldLogMatcher, SiteNameMatcher};
use sqlx::SqlitePool;
use std::path::Path;
use std::sync::Arc;
use swm_common::config::MatchingConfig;
use swm_common::LogContext;

/// Shared engine state: storage, thresholds and the field-work log
#[derive(Clone)]
pub struct QcState {
    pub db: SqlitePool,
    pub classifier: ThresholdClassifier,
    pub field_log: Arc<FieldLogMatcher>,
    pub log: LogContext,
}

impl QcState {
    /// Build thresholds from stored reference values and load the field-work log
    pub async fn build(
        db: SqlitePool,
        field_log_path: &Path,
        matching: &MatchingConfig,
        log: LogContext,
    ) -> QcResult<Self> {
        let reference = db::load_reference_values(&db).await?;
        let registry = ThresholdRegistry::from_reference_values(&reference);
        tracing::debug!(parameters = registry.parameters().count(), "Threshold registry built");

        let field_log = FieldLogMatcher::new(FieldLog::load(field_log_path), log.component("field_log"))
            .with_site_matcher(SiteNameMatcher::new(matching.site_threshold))
            .with_year_buffer(matching.year_buffer);

        Ok(Self {
            db,
            classifier: ThresholdClassifier::new(Arc::new(registry)),
            field_log: Arc::new(field_log),
            log,
        })
    }

    pub fn consolidator(&self) -> ChemicalConsolidator {
        ChemicalConsolidator::new(
            self.db.clone(),
            self.classifier.clone(),
            self.log.component("consolidator"),
        )
    }
}
