//! End-to-end chemical replicate consolidation against an in-memory database

use chrono::NaiveDate;
use sqlx::SqlitePool;
use std::sync::Arc;
use swm_common::db::{default_reference_value_set, open_in_memory};
use swm_common::LogContext;
use swm_qc::classifier::{ThresholdClassifier, ThresholdRegistry};
use swm_qc::consolidator::{ChemicalConsolidator, ConsolidationStats};
use swm_qc::db::chemical::{count_events, insert_event, insert_measurement, insert_site, measurements_for_event};
use swm_qc::replicate_finder::ReplicateGroupFinder;
use swm_qc::QcError;

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn classifier() -> ThresholdClassifier {
    let registry = ThresholdRegistry::from_reference_values(&default_reference_value_set());
    ThresholdClassifier::new(Arc::new(registry))
}

fn consolidator(pool: &SqlitePool) -> ChemicalConsolidator {
    ChemicalConsolidator::new(pool.clone(), classifier(), LogContext::new("consolidation-test"))
}

/// Three same-day events at Coal Creek plus one unrelated visit; returns the event ids
async fn seed_replicates(pool: &SqlitePool) -> (i64, i64, i64, i64) {
    let site = insert_site(pool, "Coal Creek").await.unwrap();
    let date = ymd(2023, 5, 10);

    let first = insert_event(pool, site, date).await.unwrap();
    let second = insert_event(pool, site, date).await.unwrap();
    let third = insert_event(pool, site, date).await.unwrap();
    let other = insert_event(pool, site, ymd(2023, 6, 14)).await.unwrap();

    for (event, ph, dox, nitrate) in [
        (first, 6.5, 95.5, Some(0.5)),
        (second, 7.2, 88.0, None),
        (third, 8.5, 110.2, Some(1.2)),
    ] {
        insert_measurement(pool, event, "pH", Some(ph), Some("Normal")).await.unwrap();
        insert_measurement(pool, event, "do_percent", Some(dox), Some("Normal")).await.unwrap();
        insert_measurement(pool, event, "Nitrate", nitrate, None).await.unwrap();
    }
    // Only the second replicate measured chloride
    insert_measurement(pool, second, "Chloride", Some(280.0), Some("Caution")).await.unwrap();
    insert_measurement(pool, other, "pH", Some(7.0), Some("Normal")).await.unwrap();

    (first, second, third, other)
}

#[tokio::test]
async fn test_worst_case_values_written_to_lowest_event() {
    let pool = open_in_memory().await.unwrap();
    let (first, second, third, other) = seed_replicates(&pool).await;

    let stats = consolidator(&pool).consolidate().await.unwrap();
    assert_eq!(
        stats,
        ConsolidationStats {
            groups_processed: 1,
            events_removed: 2,
            measurements_updated: 4,
        }
    );

    let kept = measurements_for_event(&pool, first).await.unwrap();
    let value_of = |code: &str| {
        kept.iter()
            .find(|m| m.parameter_code == code)
            .unwrap_or_else(|| panic!("missing {}", code))
            .clone()
    };

    let ph = value_of("pH");
    assert_eq!(ph.value, Some(8.5));
    assert_eq!(ph.status.as_deref(), Some("Normal"));

    let dox = value_of("do_percent");
    assert_eq!(dox.value, Some(88.0));
    assert_eq!(dox.status.as_deref(), Some("Normal"));

    assert_eq!(value_of("Nitrate").value, Some(1.2));

    // Inserted onto the kept event even though it never measured chloride
    let chloride = value_of("Chloride");
    assert_eq!(chloride.value, Some(280.0));
    assert_eq!(chloride.status.as_deref(), Some("Caution"));

    assert!(measurements_for_event(&pool, second).await.unwrap().is_empty());
    assert!(measurements_for_event(&pool, third).await.unwrap().is_empty());
    assert_eq!(measurements_for_event(&pool, other).await.unwrap().len(), 1);
    assert_eq!(count_events(&pool).await.unwrap(), 2);
}

#[tokio::test]
async fn test_status_recomputed_from_worst_value() {
    let pool = open_in_memory().await.unwrap();
    let site = insert_site(&pool, "Bird Creek").await.unwrap();
    let a = insert_event(&pool, site, ymd(2022, 8, 2)).await.unwrap();
    let b = insert_event(&pool, site, ymd(2022, 8, 2)).await.unwrap();

    insert_measurement(&pool, a, "pH", Some(7.1), Some("Normal")).await.unwrap();
    insert_measurement(&pool, b, "pH", Some(9.4), Some("Normal")).await.unwrap();
    insert_measurement(&pool, a, "do_percent", Some(95.0), Some("Normal")).await.unwrap();
    insert_measurement(&pool, b, "do_percent", Some(60.0), Some("Normal")).await.unwrap();

    consolidator(&pool).consolidate().await.unwrap();

    let kept = measurements_for_event(&pool, a).await.unwrap();
    assert_eq!(kept.len(), 2);
    assert_eq!(kept[0].parameter_code, "do_percent");
    assert_eq!(kept[0].value, Some(60.0));
    assert_eq!(kept[0].status.as_deref(), Some("Caution"));
    assert_eq!(kept[1].parameter_code, "pH");
    assert_eq!(kept[1].value, Some(9.4));
    assert_eq!(kept[1].status.as_deref(), Some("Above Normal (Basic/Alkaline)"));
}

#[tokio::test]
async fn test_second_run_is_a_no_op() {
    let pool = open_in_memory().await.unwrap();
    seed_replicates(&pool).await;

    let consolidator = consolidator(&pool);
    let first = consolidator.consolidate().await.unwrap();
    assert_eq!(first.groups_processed, 1);

    let second = consolidator.consolidate().await.unwrap();
    assert_eq!(second, ConsolidationStats::default());

    let finder = ReplicateGroupFinder::new(pool.clone(), LogContext::detached());
    assert!(finder.find_replicate_groups().await.is_empty());
}

#[tokio::test]
async fn test_no_replicates_returns_zero_stats() {
    let pool = open_in_memory().await.unwrap();
    let site = insert_site(&pool, "Coal Creek").await.unwrap();
    insert_event(&pool, site, ymd(2023, 1, 1)).await.unwrap();
    insert_event(&pool, site, ymd(2023, 2, 1)).await.unwrap();

    let stats = consolidator(&pool).consolidate().await.unwrap();
    assert_eq!(stats, ConsolidationStats::default());
    assert_eq!(count_events(&pool).await.unwrap(), 2);
}

#[tokio::test]
async fn test_failure_rolls_back_whole_run() {
    let pool = open_in_memory().await.unwrap();
    let (first, second, _, _) = seed_replicates(&pool).await;

    // A catalogued parameter with no worst-case rule aborts the run midway
    sqlx::query(
        "INSERT INTO chemical_parameters (parameter_id, parameter_code, display_name, unit) VALUES (99, 'Turbidity', 'Turbidity', 'NTU')",
    )
    .execute(&pool)
    .await
    .unwrap();
    insert_measurement(&pool, first, "Turbidity", Some(3.0), None).await.unwrap();
    insert_measurement(&pool, second, "Turbidity", Some(5.0), None).await.unwrap();

    let err = consolidator(&pool).consolidate().await.unwrap_err();
    assert!(matches!(err, QcError::Consolidation(_)));
    let message = err.to_string();
    assert!(message.starts_with("Failed to consolidate replicate samples"), "{}", message);
    assert!(message.contains("Turbidity"), "{}", message);

    // Nothing committed: all events remain, kept event untouched
    assert_eq!(count_events(&pool).await.unwrap(), 4);
    let kept = measurements_for_event(&pool, first).await.unwrap();
    assert!(kept.iter().all(|m| m.parameter_code != "Chloride"));
    let ph = kept.iter().find(|m| m.parameter_code == "pH").unwrap();
    assert_eq!(ph.value, Some(6.5));
}

#[tokio::test]
async fn test_unreadable_store_is_an_error_not_zero_stats() {
    let pool = open_in_memory().await.unwrap();
    sqlx::query("DROP TABLE chemical_measurements").execute(&pool).await.unwrap();
    sqlx::query("DROP TABLE chemical_collection_events").execute(&pool).await.unwrap();

    let err = consolidator(&pool).consolidate().await.unwrap_err();
    assert!(matches!(err, QcError::Consolidation(_)));
}
