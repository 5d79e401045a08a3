//! Chemical replicate consolidation
//!
//! Merges every replicate group into its lowest event id. Per parameter the
//! worst reading of the group wins and its status is recomputed; the other
//! events and their measurements are removed. The whole run is one
//! transaction: it either commits once at the end or leaves storage untouched.

use crate::aggregator::worst_case;
use crate::classifier::ThresholdClassifier;
use crate::db::chemical;
use crate::error::{QcError, QcResult};
use crate::replicate_finder::ReplicateGroupFinder;
use crate::utils::begin_monitored;
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::BTreeMap;
use swm_common::db::ReplicateGroup;
use swm_common::{Domain, LogContext};
use tracing::Instrument;

/// Totals for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConsolidationStats {
    pub groups_processed: usize,
    pub events_removed: usize,
    pub measurements_updated: usize,
}

pub struct ChemicalConsolidator {
    pool: SqlitePool,
    finder: ReplicateGroupFinder,
    classifier: ThresholdClassifier,
    context: LogContext,
}

impl ChemicalConsolidator {
    pub fn new(pool: SqlitePool, classifier: ThresholdClassifier, context: LogContext) -> Self {
        let finder = ReplicateGroupFinder::new(pool.clone(), context.component("replicate_finder"));
        Self {
            pool,
            finder,
            classifier,
            context,
        }
    }

    /// Consolidate all replicate groups
    ///
    /// Detection errors surface here too: a consolidation run must not mistake an
    /// unreadable store for a clean one.
    pub async fn consolidate(&self) -> QcResult<ConsolidationStats> {
        async {
            let groups = self
                .finder
                .try_find_replicate_groups()
                .await
                .map_err(QcError::consolidation)?;

            if groups.is_empty() {
                tracing::info!("No replicate groups found");
                return Ok(ConsolidationStats::default());
            }

            tracing::info!(groups = groups.len(), "Consolidating replicate groups");

            let mut tx = begin_monitored(&self.pool, "consolidator::consolidate")
                .await
                .map_err(|e| QcError::consolidation(e.into()))?;

            let mut stats = ConsolidationStats::default();
            for group in &groups {
                let conn = tx.conn().map_err(|e| QcError::consolidation(e.into()))?;
                let (updated, removed) = self
                    .consolidate_group(conn, group)
                    .await
                    .map_err(QcError::consolidation)?;

                stats.groups_processed += 1;
                stats.measurements_updated += updated;
                stats.events_removed += removed;
            }

            tx.commit()
                .await
                .map_err(|e| QcError::consolidation(e.into()))?;

            tracing::info!(
                groups_processed = stats.groups_processed,
                events_removed = stats.events_removed,
                measurements_updated = stats.measurements_updated,
                "Consolidation complete"
            );
            Ok::<_, QcError>(stats)
        }
        .instrument(self.context.span().clone())
        .await
    }

    /// Rewrite one group; returns (measurements written, events removed)
    async fn consolidate_group(
        &self,
        conn: &mut SqliteConnection,
        group: &ReplicateGroup,
    ) -> QcResult<(usize, usize)> {
        let mut by_parameter: BTreeMap<String, Vec<Option<f64>>> = BTreeMap::new();
        for &event_id in &group.event_ids {
            for m in chemical::measurements_for_event(&mut *conn, event_id).await? {
                by_parameter.entry(m.parameter_code).or_default().push(m.value);
            }
        }

        let mut updated = 0;
        for (parameter, values) in &by_parameter {
            let value = worst_case(values, parameter)?;
            let status = self.classifier.classify(Domain::Chemical, parameter, value).status;
            chemical::upsert_measurement(&mut *conn, group.keep_event_id, parameter, value, &status)
                .await?;
            updated += 1;
        }

        let mut removed = 0;
        for event_id in group.removed_event_ids() {
            chemical::delete_event(&mut *conn, event_id).await?;
            removed += 1;
        }

        tracing::debug!(
            site = %group.site_name,
            date = %group.collection_date,
            keep_event_id = group.keep_event_id,
            parameters = updated,
            events_removed = removed,
            "Consolidated replicate group"
        );

        Ok((updated, removed))
    }
}
