//! Database initialization
//!
//! Creates the monitoring schema on first run and seeds the chemical parameter
//! catalogue with its default reference values. Every statement is idempotent,
//! so opening an existing database re-applies nothing.

use crate::db::models::ReferenceValueSet;
use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Chemical parameter catalogue: (parameter_id, code, display name, unit)
pub const CHEMICAL_PARAMETERS: &[(i64, &str, &str, &str)] = &[
    (1, "do_percent", "Dissolved Oxygen", "% saturation"),
    (2, "pH", "pH", "pH units"),
    (3, "soluble_nitrogen", "Soluble Nitrogen", "mg/L"),
    (4, "Phosphorus", "Phosphorus", "mg/L"),
    (5, "Chloride", "Chloride", "mg/L"),
    (6, "Nitrate", "Nitrate", "mg/L"),
    (7, "Nitrite", "Nitrite", "mg/L"),
    (8, "Ammonia", "Ammonia", "mg/L"),
];

/// Default reference values: (parameter code, threshold type, value)
pub const DEFAULT_REFERENCE_VALUES: &[(&str, &str, f64)] = &[
    ("do_percent", "normal_min", 80.0),
    ("do_percent", "normal_max", 130.0),
    ("do_percent", "caution_min", 50.0),
    ("do_percent", "caution_max", 150.0),
    ("pH", "normal_min", 6.5),
    ("pH", "normal_max", 9.0),
    ("soluble_nitrogen", "normal", 0.8),
    ("soluble_nitrogen", "caution", 1.5),
    ("Phosphorus", "normal", 0.05),
    ("Phosphorus", "caution", 0.1),
    ("Chloride", "normal", 200.0),
    ("Chloride", "caution", 400.0),
];

/// Default reference values grouped by parameter code
pub fn default_reference_value_set() -> ReferenceValueSet {
    let mut set = ReferenceValueSet::new();
    for &(code, threshold_type, value) in DEFAULT_REFERENCE_VALUES {
        set.entry(code.to_string())
            .or_default()
            .set(threshold_type, value);
    }
    set
}

/// Open (creating if needed) the database file and apply the schema
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;

    Ok(pool)
}

/// Single-connection in-memory database with the full schema
///
/// One connection only: every SQLite `:memory:` connection is its own database.
pub async fn open_in_memory() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables and seed the parameter catalogue
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_sites_table(pool).await?;
    create_chemical_tables(pool).await?;
    create_fish_tables(pool).await?;
    create_macro_tables(pool).await?;
    create_habitat_tables(pool).await?;
    seed_chemical_parameters(pool).await?;
    Ok(())
}

async fn create_sites_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sites (
            site_id INTEGER PRIMARY KEY,
            site_name TEXT NOT NULL UNIQUE,
            latitude REAL,
            longitude REAL,
            county TEXT,
            river_basin TEXT,
            ecoregion TEXT,
            active INTEGER NOT NULL DEFAULT 1
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_chemical_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chemical_parameters (
            parameter_id INTEGER PRIMARY KEY,
            parameter_code TEXT NOT NULL UNIQUE,
            display_name TEXT NOT NULL,
            unit TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chemical_reference_values (
            reference_id INTEGER PRIMARY KEY,
            parameter_id INTEGER NOT NULL REFERENCES chemical_parameters(parameter_id),
            threshold_type TEXT NOT NULL,
            value REAL NOT NULL,
            UNIQUE (parameter_id, threshold_type)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chemical_collection_events (
            event_id INTEGER PRIMARY KEY,
            site_id INTEGER NOT NULL REFERENCES sites(site_id),
            collection_date TEXT NOT NULL,
            year INTEGER NOT NULL,
            month INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_chemical_events_site_date
            ON chemical_collection_events (site_id, collection_date)
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chemical_measurements (
            measurement_id INTEGER PRIMARY KEY,
            event_id INTEGER NOT NULL REFERENCES chemical_collection_events(event_id) ON DELETE CASCADE,
            parameter_id INTEGER NOT NULL REFERENCES chemical_parameters(parameter_id),
            value REAL,
            status TEXT,
            UNIQUE (event_id, parameter_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_fish_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS fish_collection_events (
            event_id INTEGER PRIMARY KEY,
            site_id INTEGER NOT NULL REFERENCES sites(site_id),
            sample_id TEXT NOT NULL,
            collection_date TEXT,
            year INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS fish_summary_scores (
            event_id INTEGER PRIMARY KEY REFERENCES fish_collection_events(event_id) ON DELETE CASCADE,
            total_score REAL,
            comparison_to_reference REAL,
            integrity_class TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_macro_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS macro_collection_events (
            event_id INTEGER PRIMARY KEY,
            site_id INTEGER NOT NULL REFERENCES sites(site_id),
            sample_id TEXT NOT NULL,
            collection_date TEXT,
            year INTEGER NOT NULL,
            season TEXT,
            habitat TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS macro_summary_scores (
            event_id INTEGER PRIMARY KEY REFERENCES macro_collection_events(event_id) ON DELETE CASCADE,
            total_score REAL,
            comparison_to_reference REAL,
            biological_condition TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_habitat_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS habitat_assessments (
            assessment_id INTEGER PRIMARY KEY,
            site_id INTEGER NOT NULL REFERENCES sites(site_id),
            assessment_date TEXT NOT NULL,
            year INTEGER NOT NULL,
            total_score REAL,
            habitat_grade TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    // metric_id keeps the source column order
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS habitat_metrics (
            metric_id INTEGER PRIMARY KEY,
            assessment_id INTEGER NOT NULL REFERENCES habitat_assessments(assessment_id) ON DELETE CASCADE,
            metric_name TEXT NOT NULL,
            score REAL,
            UNIQUE (assessment_id, metric_name)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Insert the parameter catalogue and default reference values if absent
async fn seed_chemical_parameters(pool: &SqlitePool) -> Result<()> {
    for &(parameter_id, code, display_name, unit) in CHEMICAL_PARAMETERS {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO chemical_parameters (parameter_id, parameter_code, display_name, unit)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(parameter_id)
        .bind(code)
        .bind(display_name)
        .bind(unit)
        .execute(pool)
        .await?;
    }

    for &(code, threshold_type, value) in DEFAULT_REFERENCE_VALUES {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO chemical_reference_values (parameter_id, threshold_type, value)
            SELECT parameter_id, ?, ? FROM chemical_parameters WHERE parameter_code = ?
            "#,
        )
        .bind(threshold_type)
        .bind(value)
        .bind(code)
        .execute(pool)
        .await?;
    }

    Ok(())
}
