//! Database initialization: creation, reopening and seeded catalogue

use swm_common::db::init::{
    default_reference_value_set, init_database, open_in_memory, CHEMICAL_PARAMETERS,
    DEFAULT_REFERENCE_VALUES,
};
use swm_common::db::{ReferenceValues, ReplicateGroup};
use swm_common::Domain;

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("sub").join("swm.db");

    let pool = init_database(&db_path).await.unwrap();
    assert!(db_path.exists(), "Database file was not created");
    pool.close().await;
}

#[tokio::test]
async fn test_reopen_does_not_duplicate_seed_rows() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("swm.db");

    let pool = init_database(&db_path).await.unwrap();
    pool.close().await;
    let pool = init_database(&db_path).await.unwrap();

    let parameters: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chemical_parameters")
        .fetch_one(&pool)
        .await
        .unwrap();
    let references: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chemical_reference_values")
        .fetch_one(&pool)
        .await
        .unwrap();

    assert_eq!(parameters as usize, CHEMICAL_PARAMETERS.len());
    assert_eq!(references as usize, DEFAULT_REFERENCE_VALUES.len());
    pool.close().await;
}

#[tokio::test]
async fn test_all_tables_created() {
    let pool = open_in_memory().await.unwrap();

    let tables: Vec<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
    )
    .fetch_all(&pool)
    .await
    .unwrap();

    for expected in [
        "chemical_collection_events",
        "chemical_measurements",
        "chemical_parameters",
        "chemical_reference_values",
        "fish_collection_events",
        "fish_summary_scores",
        "habitat_assessments",
        "habitat_metrics",
        "macro_collection_events",
        "macro_summary_scores",
        "sites",
    ] {
        assert!(tables.iter().any(|t| t == expected), "missing table {}", expected);
    }
}

#[tokio::test]
async fn test_foreign_keys_enforced() {
    let pool = open_in_memory().await.unwrap();

    let result = sqlx::query(
        "INSERT INTO chemical_collection_events (site_id, collection_date, year, month) VALUES (999, '2023-01-01', 2023, 1)",
    )
    .execute(&pool)
    .await;
    assert!(result.is_err(), "Event with unknown site should be rejected");
}

#[test]
fn test_default_reference_value_set() {
    let set = default_reference_value_set();
    assert_eq!(set["do_percent"].caution_min, Some(50.0));
    assert_eq!(set["pH"], ReferenceValues::normal_range(6.5, 9.0));
    assert_eq!(set["Phosphorus"], ReferenceValues::upper_limits(0.05, 0.1));
    assert!(!set.contains_key("Nitrate"));
}

#[test]
fn test_reference_values_set_by_type() {
    let mut values = ReferenceValues::default();
    assert!(values.is_empty());
    assert!(values.set("normal", 1.0));
    assert!(values.set("poor", 3.0));
    assert!(!values.set("extreme", 9.0));
    assert_eq!(values.normal, Some(1.0));
    assert_eq!(values.poor, Some(3.0));
    assert!(!values.is_empty());
}

#[test]
fn test_replicate_group_keeps_lowest_id() {
    let date = chrono::NaiveDate::from_ymd_opt(2023, 5, 10).unwrap();

    let group = ReplicateGroup::new("Coal Creek".to_string(), date, vec![102, 101]).unwrap();
    assert_eq!(group.keep_event_id, 101);
    assert_eq!(group.event_ids, vec![101, 102]);
    assert_eq!(group.removed_event_ids().collect::<Vec<_>>(), vec![102]);

    let group = ReplicateGroup::new("Bird Creek".to_string(), date, vec![203, 201, 202, 201]).unwrap();
    assert_eq!(group.keep_event_id, 201);
    assert_eq!(group.event_count, 3);

    assert!(ReplicateGroup::new("Empty".to_string(), date, vec![]).is_none());
}

#[test]
fn test_domain_parsing() {
    assert_eq!("chemical".parse::<Domain>().unwrap(), Domain::Chemical);
    assert_eq!(" Fish ".parse::<Domain>().unwrap(), Domain::Fish);
    assert_eq!("macroinvertebrate".parse::<Domain>().unwrap(), Domain::Macro);
    assert_eq!(Domain::Habitat.to_string(), "habitat");
    assert!("birds".parse::<Domain>().is_err());
}
