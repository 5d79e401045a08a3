//! Replicate group detection
//!
//! Chemical events are replicates of each other when they share a site and a
//! collection date. Groups are computed on demand and never stored.

use crate::error::{QcError, QcResult};
use chrono::NaiveDate;
use sqlx::SqlitePool;
use swm_common::db::{CollectionEvent, ReplicateGroup};
use swm_common::{Domain, LogContext};
use tracing::Instrument;

pub struct ReplicateGroupFinder {
    pool: SqlitePool,
    context: LogContext,
}

impl ReplicateGroupFinder {
    pub fn new(pool: SqlitePool, context: LogContext) -> Self {
        Self { pool, context }
    }

    /// Replicate groups, or nothing when storage cannot be read
    ///
    /// Storage failures are logged. Use [`Self::try_find_replicate_groups`] to tell
    /// "no replicates" apart from "could not look".
    pub async fn find_replicate_groups(&self) -> Vec<ReplicateGroup> {
        match self.try_find_replicate_groups().await {
            Ok(groups) => groups,
            Err(e) => {
                tracing::error!(parent: self.context.span(), error = %e, "Replicate detection failed");
                Vec::new()
            }
        }
    }

    /// Replicate groups ordered by site name then date
    pub async fn try_find_replicate_groups(&self) -> QcResult<Vec<ReplicateGroup>> {
        async {
            let rows: Vec<(i64, String, NaiveDate, i32, u32)> = sqlx::query_as(
                r#"
                SELECT e.event_id, s.site_name, e.collection_date, e.year, e.month
                FROM chemical_collection_events e
                JOIN sites s ON s.site_id = e.site_id
                JOIN (
                    SELECT site_id, collection_date
                    FROM chemical_collection_events
                    GROUP BY site_id, collection_date
                    HAVING COUNT(*) > 1
                ) dup ON dup.site_id = e.site_id AND dup.collection_date = e.collection_date
                ORDER BY s.site_name, e.collection_date, e.event_id
                "#,
            )
            .fetch_all(&self.pool)
            .await?;

            let events = rows
                .into_iter()
                .map(|(event_id, site_name, collection_date, year, month)| CollectionEvent {
                    event_id,
                    site_name,
                    collection_date,
                    year,
                    month,
                    domain: Domain::Chemical,
                })
                .collect();
            let groups = group_events(events);
            tracing::debug!(groups = groups.len(), "Found replicate groups");
            Ok::<_, QcError>(groups)
        }
        .instrument(self.context.span().clone())
        .await
    }
}

/// Fold events sorted by (site, date) into groups
fn group_events(events: Vec<CollectionEvent>) -> Vec<ReplicateGroup> {
    let mut groups = Vec::new();
    let mut current: Option<(String, NaiveDate, Vec<i64>)> = None;

    for event in events {
        match current.as_mut() {
            Some((site, d, ids)) if *site == event.site_name && *d == event.collection_date => {
                ids.push(event.event_id)
            }
            _ => {
                if let Some((site, d, ids)) = current.take() {
                    groups.extend(ReplicateGroup::new(site, d, ids));
                }
                current = Some((event.site_name, event.collection_date, vec![event.event_id]));
            }
        }
    }
    if let Some((site, d, ids)) = current {
        groups.extend(ReplicateGroup::new(site, d, ids));
    }

    groups
}
