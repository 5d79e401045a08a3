//! Stored-data duplicate resolution jobs
//!
//! Each job reads one domain's records, resolves duplicates in memory and writes
//! the result back in a single transaction.

use crate::bio_resolver::{BiologicalDuplicateResolver, ResolutionStats};
use crate::classifier::ThresholdClassifier;
use crate::db::biological;
use crate::error::{QcError, QcResult};
use crate::field_log::FieldLogMatcher;
use crate::habitat::HabitatDuplicateResolver;
use crate::parameters::COMPARISON_TO_REFERENCE;
use crate::utils::begin_monitored;
use serde::Serialize;
use sqlx::SqlitePool;
use swm_common::{Domain, LogContext};
use tracing::Instrument;

/// Outcome of one stored-data resolution job
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResolveReport {
    pub records_before: usize,
    pub records_after: usize,
    pub dates_corrected: usize,
    #[serde(flatten)]
    pub resolution: ResolutionStats,
}

/// Resolve fish or macro duplicates in storage
///
/// Fish dates are corrected against the field-work log first. Records left
/// without a class label get one from the classifier.
pub async fn resolve_biological(
    pool: &SqlitePool,
    domain: Domain,
    field_log: &FieldLogMatcher,
    classifier: &ThresholdClassifier,
    context: &LogContext,
) -> QcResult<ResolveReport> {
    async {
        let mut tx = begin_monitored(pool, "pipeline::resolve_biological").await?;

        let mut records = biological::load_bio_records(tx.conn()?, domain).await?;
        let records_before = records.len();

        let dates_corrected = if domain == Domain::Fish {
            field_log.correct_collection_dates(&mut records)
        } else {
            0
        };

        let resolver = BiologicalDuplicateResolver::new(field_log, context.component("bio_resolver"));
        let (mut resolved, resolution) = resolver.resolve_with_stats(records);

        for record in resolved.iter_mut().filter(|r| r.class_label.is_none()) {
            let result = classifier.classify(domain, COMPARISON_TO_REFERENCE, record.comparison_to_reference);
            if !result.is_unknown() {
                record.class_label = Some(result.status);
            }
        }

        biological::replace_bio_records(tx.conn()?, domain, &resolved).await?;
        tx.commit().await?;

        let report = ResolveReport {
            records_before,
            records_after: resolved.len(),
            dates_corrected,
            resolution,
        };
        tracing::info!(%domain, before = records_before, after = report.records_after, "Resolved stored records");
        Ok::<_, QcError>(report)
    }
    .instrument(context.span().clone())
    .await
}

/// Average duplicate habitat assessments in storage
pub async fn resolve_habitat(
    pool: &SqlitePool,
    classifier: &ThresholdClassifier,
    context: &LogContext,
) -> QcResult<ResolveReport> {
    async {
        let mut tx = begin_monitored(pool, "pipeline::resolve_habitat").await?;

        let records = biological::load_habitat_records(tx.conn()?).await?;
        let records_before = records.len();

        let resolver = HabitatDuplicateResolver::new(classifier.clone(), context.component("habitat_resolver"));
        let resolved = resolver.resolve(records);

        biological::replace_habitat_records(tx.conn()?, &resolved).await?;
        tx.commit().await?;

        tracing::info!(before = records_before, after = resolved.len(), "Resolved stored habitat assessments");
        Ok::<_, QcError>(ResolveReport {
            records_before,
            records_after: resolved.len(),
            ..ResolveReport::default()
        })
    }
    .instrument(context.span().clone())
    .await
}
