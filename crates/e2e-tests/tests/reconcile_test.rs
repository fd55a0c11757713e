//! Reconciliation E2E tests.
//!
//! Drift in the engine->registry direction heals automatically; drift in
//! the other direction is only reported.

use pretty_assertions::assert_eq;

use catalog_core::CatalogError;
use catalog_engine::EngineGateway;
use catalog_registry::RegistryStore;
use catalog_types::NewIndexRecord;
use e2e_tests::TestHarness;

#[tokio::test]
async fn test_untracked_engine_index_is_registered() {
    let harness = TestHarness::with_engine_indices(&["ashwagandha"]);

    let report = harness.catalog.reconciler.run().await.unwrap();

    assert_eq!(report.inserted, vec!["ashwagandha"]);
    assert_eq!(harness.registry_names(), vec!["ashwagandha"]);
    let record = harness.record("ashwagandha");
    assert!(record.engine_id.is_some());
    assert_eq!(
        record.engine_id,
        Some(harness.engine.get_engine_id("ashwagandha").await.unwrap())
    );
    assert_eq!(record.description, "Initialized 'ashwagandha'");
    assert_eq!(record.alias, None);
}

#[tokio::test]
async fn test_registry_only_row_is_left_alone() {
    let harness = TestHarness::new();
    harness
        .registry
        .insert(NewIndexRecord::new("ghost", "engine index removed elsewhere"))
        .unwrap();

    let report = harness.catalog.reconciler.run().await.unwrap();

    assert_eq!(report.orphaned, vec!["ghost"]);
    assert_eq!(report.writes(), 0);
    assert_eq!(harness.registry_names(), vec!["ghost"]);
    assert!(!harness.engine.exists("ghost").await.unwrap());
    assert_eq!(harness.engine.call_count("create"), 0);
    assert_eq!(harness.engine.call_count("delete"), 0);
}

#[tokio::test]
async fn test_second_pass_makes_no_writes() {
    let harness = TestHarness::with_engine_indices(&["amla", "brahmi", "neem"]);
    harness
        .registry
        .insert(NewIndexRecord::new("brahmi", "memory herb").with_engine_id("stale-id"))
        .unwrap();
    harness
        .registry
        .insert(NewIndexRecord::new("ghost", "orphan"))
        .unwrap();

    let first = harness.catalog.reconciler.run().await.unwrap();
    assert_eq!(first.inserted, vec!["amla", "neem"]);
    assert_eq!(first.repaired, vec!["brahmi"]);

    let rows_after_first = harness.registry.list_all().unwrap();
    let second = harness.catalog.reconciler.run().await.unwrap();

    assert_eq!(second.writes(), 0);
    assert_eq!(second.unchanged, 3);
    assert_eq!(second.orphaned, vec!["ghost"]);
    assert_eq!(harness.registry.list_all().unwrap(), rows_after_first);
}

#[tokio::test]
async fn test_failed_create_is_healed_by_next_pass() {
    let harness = TestHarness::new();
    harness.registry.fail_inserts(true);

    let err = harness
        .catalog
        .coordinator
        .create_index("new-idx", "fresh")
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::RegistryWrite(_)));

    harness.registry.fail_inserts(false);
    let report = harness.catalog.reconciler.run().await.unwrap();

    assert_eq!(report.inserted, vec!["new-idx"]);
    let record = harness.record("new-idx");
    assert_eq!(
        record.engine_id,
        Some(harness.engine.get_engine_id("new-idx").await.unwrap())
    );
}

#[tokio::test]
async fn test_repair_keeps_metadata() {
    let harness = TestHarness::with_engine_indices(&["tulsi"]);
    let original = harness
        .registry
        .insert(NewIndexRecord::new("tulsi", "Ocimum tenuiflorum").with_engine_id("recreated"))
        .unwrap();

    let report = harness.catalog.reconciler.run().await.unwrap();
    assert_eq!(report.repaired, vec!["tulsi"]);

    let record = harness.record("tulsi");
    assert_eq!(record.id, original.id);
    assert_eq!(record.description, "Ocimum tenuiflorum");
    assert_eq!(record.created_at, original.created_at);
    assert_ne!(record.engine_id, original.engine_id);
}

#[tokio::test]
async fn test_failing_row_does_not_block_others() {
    let harness = TestHarness::with_engine_indices(&["amla", "brahmi"]);
    harness
        .registry
        .insert(NewIndexRecord::new("amla", "herb").with_engine_id("stale"))
        .unwrap();
    harness.registry.fail_updates(true);

    let report = harness.catalog.reconciler.run().await.unwrap();

    assert_eq!(report.inserted, vec!["brahmi"]);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].name, "amla");
    assert_eq!(harness.registry_names(), vec!["amla", "brahmi"]);
}

#[tokio::test]
async fn test_unreachable_engine_aborts_pass() {
    let harness = TestHarness::with_engine_indices(&["amla"]);
    harness.engine.set_unavailable(true);

    let err = harness.catalog.reconciler.run().await.unwrap_err();
    assert!(matches!(err, CatalogError::EngineUnavailable(_)));
    assert!(harness.registry_names().is_empty());
}

#[tokio::test]
async fn test_row_created_without_engine_id_is_repaired() {
    let harness = TestHarness::new();
    harness.engine.fail_operation("create_id");

    let record = harness
        .catalog
        .coordinator
        .create_index("plants", "Medicinal plants")
        .await
        .unwrap();
    assert_eq!(record.engine_id, None);

    harness.engine.clear_failures();
    let report = harness.catalog.reconciler.run().await.unwrap();

    assert_eq!(report.repaired, vec!["plants"]);
    let record = harness.record("plants");
    assert_eq!(record.description, "Medicinal plants");
    assert_eq!(
        record.engine_id,
        Some(harness.engine.get_engine_id("plants").await.unwrap())
    );
}
