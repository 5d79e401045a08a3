//! Chemical event and measurement storage
//!
//! Single-statement helpers are generic over the executor so the same call works
//! on the pool and inside a consolidation transaction.

use chrono::{Datelike, NaiveDate};
use sqlx::{Executor, Sqlite, SqliteConnection};
use swm_common::db::{Measurement, ReferenceValueSet};
use swm_common::{Error, Result};

/// Insert a site if missing and return its id
pub async fn insert_site<'e, E>(executor: E, site_name: &str) -> Result<i64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let site_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO sites (site_name) VALUES (?)
        ON CONFLICT (site_name) DO UPDATE SET site_name = excluded.site_name
        RETURNING site_id
        "#,
    )
    .bind(site_name)
    .fetch_one(executor)
    .await?;

    Ok(site_id)
}

/// Insert a collection event; year and month come from the date
pub async fn insert_event<'e, E>(executor: E, site_id: i64, collection_date: NaiveDate) -> Result<i64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        INSERT INTO chemical_collection_events (site_id, collection_date, year, month)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(site_id)
    .bind(collection_date)
    .bind(collection_date.year())
    .bind(collection_date.month() as i64)
    .execute(executor)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Insert one measurement by parameter code
///
/// An unknown parameter code is `Error::UnknownParameter`.
pub async fn insert_measurement<'e, E>(
    executor: E,
    event_id: i64,
    parameter_code: &str,
    value: Option<f64>,
    status: Option<&str>,
) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        INSERT INTO chemical_measurements (event_id, parameter_id, value, status)
        SELECT ?, parameter_id, ?, ? FROM chemical_parameters WHERE parameter_code = ?
        "#,
    )
    .bind(event_id)
    .bind(value)
    .bind(status)
    .bind(parameter_code)
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::UnknownParameter(parameter_code.to_string()));
    }
    Ok(())
}

/// Write a value onto an event, inserting the row when the event lacks the parameter
pub async fn upsert_measurement<'e, E>(
    executor: E,
    event_id: i64,
    parameter_code: &str,
    value: Option<f64>,
    status: &str,
) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        INSERT INTO chemical_measurements (event_id, parameter_id, value, status)
        SELECT ?, parameter_id, ?, ? FROM chemical_parameters WHERE parameter_code = ?
        ON CONFLICT (event_id, parameter_id) DO UPDATE SET
            value = excluded.value,
            status = excluded.status
        "#,
    )
    .bind(event_id)
    .bind(value)
    .bind(status)
    .bind(parameter_code)
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::UnknownParameter(parameter_code.to_string()));
    }
    Ok(())
}

/// Measurements of one event, in parameter id order
pub async fn measurements_for_event<'e, E>(executor: E, event_id: i64) -> Result<Vec<Measurement>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows: Vec<(i64, String, Option<f64>, Option<String>)> = sqlx::query_as(
        r#"
        SELECT m.event_id, p.parameter_code, m.value, m.status
        FROM chemical_measurements m
        JOIN chemical_parameters p ON p.parameter_id = m.parameter_id
        WHERE m.event_id = ?
        ORDER BY m.parameter_id
        "#,
    )
    .bind(event_id)
    .fetch_all(executor)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(event_id, parameter_code, value, status)| Measurement {
            event_id,
            parameter_code,
            value,
            status,
        })
        .collect())
}

/// Remove an event and its measurements; returns the number of measurements removed
pub async fn delete_event(conn: &mut SqliteConnection, event_id: i64) -> Result<u64> {
    let measurements = sqlx::query("DELETE FROM chemical_measurements WHERE event_id = ?")
        .bind(event_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    sqlx::query("DELETE FROM chemical_collection_events WHERE event_id = ?")
        .bind(event_id)
        .execute(&mut *conn)
        .await?;

    Ok(measurements)
}

pub async fn count_events<'e, E>(executor: E) -> Result<i64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chemical_collection_events")
        .fetch_one(executor)
        .await?;
    Ok(count)
}

/// Reference values for every parameter that has any
///
/// An empty table means the catalogue was never seeded; that is a configuration error.
pub async fn load_reference_values<'e, E>(executor: E) -> Result<ReferenceValueSet>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows: Vec<(String, String, f64)> = sqlx::query_as(
        r#"
        SELECT p.parameter_code, r.threshold_type, r.value
        FROM chemical_reference_values r
        JOIN chemical_parameters p ON p.parameter_id = r.parameter_id
        ORDER BY p.parameter_id, r.threshold_type
        "#,
    )
    .fetch_all(executor)
    .await?;

    if rows.is_empty() {
        return Err(Error::MissingReferenceValues);
    }

    let mut set = ReferenceValueSet::new();
    for (code, threshold_type, value) in rows {
        if !set.entry(code.clone()).or_default().set(&threshold_type, value) {
            tracing::warn!(parameter = %code, threshold_type = %threshold_type, "Ignoring unknown threshold type");
        }
    }

    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use swm_common::db::open_in_memory;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_insert_site_is_idempotent() {
        let pool = open_in_memory().await.unwrap();
        let first = insert_site(&pool, "Coal Creek").await.unwrap();
        let second = insert_site(&pool, "Coal Creek").await.unwrap();
        let other = insert_site(&pool, "Bird Creek").await.unwrap();
        assert_eq!(first, second);
        assert_ne!(first, other);
    }

    #[tokio::test]
    async fn test_event_and_measurements_roundtrip() {
        let pool = open_in_memory().await.unwrap();
        let site = insert_site(&pool, "Coal Creek").await.unwrap();
        let event = insert_event(&pool, site, date(2023, 5, 10)).await.unwrap();

        insert_measurement(&pool, event, "pH", Some(7.4), Some("Normal")).await.unwrap();
        insert_measurement(&pool, event, "Nitrate", None, None).await.unwrap();

        let measurements = measurements_for_event(&pool, event).await.unwrap();
        assert_eq!(measurements.len(), 2);
        assert_eq!(measurements[0].parameter_code, "pH");
        assert_eq!(measurements[0].value, Some(7.4));
        assert_eq!(measurements[1].parameter_code, "Nitrate");
        assert_eq!(measurements[1].value, None);

        let (year, month): (i64, i64) = sqlx::query_as(
            "SELECT year, month FROM chemical_collection_events WHERE event_id = ?",
        )
        .bind(event)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!((year, month), (2023, 5));
    }

    #[tokio::test]
    async fn test_unknown_parameter_rejected() {
        let pool = open_in_memory().await.unwrap();
        let site = insert_site(&pool, "Coal Creek").await.unwrap();
        let event = insert_event(&pool, site, date(2023, 5, 10)).await.unwrap();

        let err = insert_measurement(&pool, event, "Turbidity", Some(1.0), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnknownParameter(ref code) if code == "Turbidity"));
    }

    #[tokio::test]
    async fn test_upsert_updates_then_inserts() {
        let pool = open_in_memory().await.unwrap();
        let site = insert_site(&pool, "Coal Creek").await.unwrap();
        let event = insert_event(&pool, site, date(2023, 5, 10)).await.unwrap();
        insert_measurement(&pool, event, "pH", Some(7.0), Some("Normal")).await.unwrap();

        upsert_measurement(&pool, event, "pH", Some(9.4), "Above Normal (Basic/Alkaline)")
            .await
            .unwrap();
        upsert_measurement(&pool, event, "Chloride", Some(280.0), "Caution")
            .await
            .unwrap();

        let measurements = measurements_for_event(&pool, event).await.unwrap();
        assert_eq!(measurements.len(), 2);
        assert_eq!(measurements[0].value, Some(9.4));
        assert_eq!(measurements[0].status.as_deref(), Some("Above Normal (Basic/Alkaline)"));
        assert_eq!(measurements[1].parameter_code, "Chloride");
    }

    #[tokio::test]
    async fn test_delete_event_removes_measurements() {
        let pool = open_in_memory().await.unwrap();
        let site = insert_site(&pool, "Coal Creek").await.unwrap();
        let event = insert_event(&pool, site, date(2023, 5, 10)).await.unwrap();
        insert_measurement(&pool, event, "pH", Some(7.0), None).await.unwrap();
        insert_measurement(&pool, event, "Nitrate", Some(0.3), None).await.unwrap();

        let mut conn = pool.acquire().await.unwrap();
        let removed = delete_event(&mut conn, event).await.unwrap();
        drop(conn);

        assert_eq!(removed, 2);
        assert_eq!(count_events(&pool).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_load_reference_values() {
        let pool = open_in_memory().await.unwrap();
        let set = load_reference_values(&pool).await.unwrap();

        let ph = &set["pH"];
        assert_eq!(ph.normal_min, Some(6.5));
        assert_eq!(ph.normal_max, Some(9.0));
        assert_eq!(set["Chloride"].caution, Some(400.0));
        assert_eq!(set, swm_common::db::default_reference_value_set());
    }

    #[tokio::test]
    async fn test_empty_reference_values_is_config_error() {
        let pool = open_in_memory().await.unwrap();
        sqlx::query("DELETE FROM chemical_reference_values")
            .execute(&pool)
            .await
            .unwrap();

        let err = load_reference_values(&pool).await.unwrap_err();
        assert!(matches!(err, Error::MissingReferenceValues));
    }
}
