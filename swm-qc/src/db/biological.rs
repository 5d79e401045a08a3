//! Fish, macroinvertebrate and habitat storage
//!
//! Fish and macro records are stored as summary rows. Habitat assessments keep
//! their per-metric scores in `habitat_metrics` so duplicates average them too.

use crate::bio_resolver::BioRecord;
use crate::habitat::HabitatRecord;
use chrono::NaiveDate;
use sqlx::SqliteConnection;
use std::collections::HashMap;
use swm_common::{Domain, Error, Result};

use super::chemical::insert_site;

type BioRow = (
    String,
    String,
    i64,
    Option<NaiveDate>,
    Option<String>,
    Option<String>,
    Option<f64>,
    Option<f64>,
    Option<String>,
);

fn require_biological(domain: Domain) -> Result<()> {
    match domain {
        Domain::Fish | Domain::Macro => Ok(()),
        other => Err(Error::UnsupportedDomain(format!(
            "'{}' is not a biological domain",
            other
        ))),
    }
}

/// Insert one sample with its summary scores; returns the event id
pub async fn insert_bio_record(conn: &mut SqliteConnection, domain: Domain, record: &BioRecord) -> Result<i64> {
    require_biological(domain)?;
    let site_id = insert_site(&mut *conn, &record.site_name).await?;

    let event_id = match domain {
        Domain::Fish => sqlx::query(
            r#"
            INSERT INTO fish_collection_events (site_id, sample_id, collection_date, year)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(site_id)
        .bind(&record.sample_id)
        .bind(record.collection_date)
        .bind(record.year)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid(),
        _ => sqlx::query(
            r#"
            INSERT INTO macro_collection_events (site_id, sample_id, collection_date, year, season, habitat)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(site_id)
        .bind(&record.sample_id)
        .bind(record.collection_date)
        .bind(record.year)
        .bind(&record.season)
        .bind(&record.habitat)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid(),
    };

    let summary_sql = match domain {
        Domain::Fish => {
            r#"
            INSERT INTO fish_summary_scores (event_id, total_score, comparison_to_reference, integrity_class)
            VALUES (?, ?, ?, ?)
            "#
        }
        _ => {
            r#"
            INSERT INTO macro_summary_scores (event_id, total_score, comparison_to_reference, biological_condition)
            VALUES (?, ?, ?, ?)
            "#
        }
    };
    sqlx::query(summary_sql)
        .bind(event_id)
        .bind(record.total_score)
        .bind(record.comparison_to_reference)
        .bind(&record.class_label)
        .execute(&mut *conn)
        .await?;

    Ok(event_id)
}

/// All samples of a domain in event id order
pub async fn load_bio_records(conn: &mut SqliteConnection, domain: Domain) -> Result<Vec<BioRecord>> {
    require_biological(domain)?;

    let sql = match domain {
        Domain::Fish => {
            r#"
            SELECT e.sample_id, s.site_name, e.year, e.collection_date, NULL, NULL,
                   f.comparison_to_reference, f.total_score, f.integrity_class
            FROM fish_collection_events e
            JOIN sites s ON s.site_id = e.site_id
            LEFT JOIN fish_summary_scores f ON f.event_id = e.event_id
            ORDER BY e.event_id
            "#
        }
        _ => {
            r#"
            SELECT e.sample_id, s.site_name, e.year, e.collection_date, e.season, e.habitat,
                   m.comparison_to_reference, m.total_score, m.biological_condition
            FROM macro_collection_events e
            JOIN sites s ON s.site_id = e.site_id
            LEFT JOIN macro_summary_scores m ON m.event_id = e.event_id
            ORDER BY e.event_id
            "#
        }
    };

    let rows: Vec<BioRow> = sqlx::query_as(sql).fetch_all(&mut *conn).await?;

    Ok(rows
        .into_iter()
        .map(
            |(sample_id, site_name, year, collection_date, season, habitat, ratio, total, label)| BioRecord {
                sample_id,
                site_name,
                year: year as i32,
                collection_date,
                season,
                habitat,
                comparison_to_reference: ratio,
                total_score: total,
                class_label: label,
                metric_scores: Vec::new(),
            },
        )
        .collect())
}

/// Replace every sample of a domain; summary rows go with their events
pub async fn replace_bio_records(
    conn: &mut SqliteConnection,
    domain: Domain,
    records: &[BioRecord],
) -> Result<usize> {
    require_biological(domain)?;

    let (summaries, events) = match domain {
        Domain::Fish => ("DELETE FROM fish_summary_scores", "DELETE FROM fish_collection_events"),
        _ => ("DELETE FROM macro_summary_scores", "DELETE FROM macro_collection_events"),
    };
    sqlx::query(summaries).execute(&mut *conn).await?;
    sqlx::query(events).execute(&mut *conn).await?;

    for record in records {
        insert_bio_record(&mut *conn, domain, record).await?;
    }
    Ok(records.len())
}

pub async fn insert_habitat_record(conn: &mut SqliteConnection, record: &HabitatRecord) -> Result<i64> {
    let site_id = insert_site(&mut *conn, &record.site_name).await?;

    let result = sqlx::query(
        r#"
        INSERT INTO habitat_assessments (site_id, assessment_date, year, total_score, habitat_grade)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(site_id)
    .bind(record.assessment_date)
    .bind(record.year)
    .bind(record.total_score)
    .bind(&record.grade)
    .execute(&mut *conn)
    .await?;
    let assessment_id = result.last_insert_rowid();

    for (name, score) in &record.metrics {
        sqlx::query("INSERT INTO habitat_metrics (assessment_id, metric_name, score) VALUES (?, ?, ?)")
            .bind(assessment_id)
            .bind(name)
            .bind(score)
            .execute(&mut *conn)
            .await?;
    }

    Ok(assessment_id)
}

/// All habitat assessments in id order, metrics in stored order
pub async fn load_habitat_records(conn: &mut SqliteConnection) -> Result<Vec<HabitatRecord>> {
    let rows: Vec<(i64, String, NaiveDate, i64, Option<f64>, Option<String>)> = sqlx::query_as(
        r#"
        SELECT a.assessment_id, s.site_name, a.assessment_date, a.year, a.total_score, a.habitat_grade
        FROM habitat_assessments a
        JOIN sites s ON s.site_id = a.site_id
        ORDER BY a.assessment_id
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;

    let metric_rows: Vec<(i64, String, Option<f64>)> = sqlx::query_as(
        "SELECT assessment_id, metric_name, score FROM habitat_metrics ORDER BY assessment_id, metric_id",
    )
    .fetch_all(&mut *conn)
    .await?;

    let mut metrics: HashMap<i64, Vec<(String, Option<f64>)>> = HashMap::new();
    for (assessment_id, name, score) in metric_rows {
        metrics.entry(assessment_id).or_default().push((name, score));
    }

    Ok(rows
        .into_iter()
        .map(|(assessment_id, site_name, assessment_date, year, total_score, grade)| HabitatRecord {
            site_name,
            assessment_date,
            year: year as i32,
            metrics: metrics.remove(&assessment_id).unwrap_or_default(),
            total_score,
            grade,
        })
        .collect())
}

pub async fn replace_habitat_records(conn: &mut SqliteConnection, records: &[HabitatRecord]) -> Result<usize> {
    sqlx::query("DELETE FROM habitat_metrics")
        .execute(&mut *conn)
        .await?;
    sqlx::query("DELETE FROM habitat_assessments")
        .execute(&mut *conn)
        .await?;
    for record in records {
        insert_habitat_record(&mut *conn, record).await?;
    }
    Ok(records.len())
}
