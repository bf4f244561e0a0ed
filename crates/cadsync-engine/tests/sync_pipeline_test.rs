//! End-to-end import and reimport runs against the in-memory store

use cadsync_core::config::SyncConfig;
use cadsync_core::formats::{DxfWriter, OutputEntity};
use cadsync_core::models::{
    DrawingEntity, EntityErrorKind, EntityKind, EntityStatus, Geometry, ObjectAttributes,
    ObjectKind, ParseIssue, ParsedDrawing, PatternRule, Project, SyncState, TokenSlot,
    TokenSlotKey,
};
use cadsync_core::CadSyncError;
use cadsync_engine::{CancelFlag, ReimportScope, SyncEngine};
use cadsync_store::{LinkStore, MemoryStore, ObjectStore, ReferenceSeed};
use std::sync::Arc;
use tempfile::TempDir;

const STORM_LAYER: &str = "CIV-UTIL-STORM-12IN-NEW-LN";

async fn engine_with(project: &Project) -> (SyncEngine<MemoryStore>, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    store.put_project(project).await.unwrap();
    (SyncEngine::new(store.clone(), SyncConfig::default()), store)
}

fn line(handle: &str, layer: &str, dx: f64) -> DrawingEntity {
    DrawingEntity::new(
        handle,
        layer,
        EntityKind::Line,
        Geometry::line([1000.0 + dx, 500.0, 10.0], [1100.0 + dx, 500.0, 10.0]),
    )
}

fn drawing(entities: Vec<DrawingEntity>) -> ParsedDrawing {
    ParsedDrawing::new("c101.dxf", entities)
}

#[tokio::test]
async fn test_storm_line_lifecycle() {
    let project = Project::new("Harbor Blvd");
    let (engine, store) = engine_with(&project).await;
    let cancel = CancelFlag::new();

    // Import: one specific utility line
    let report = engine
        .import_drawing(project.id, &drawing(vec![line("1F", STORM_LAYER, 0.0)]), &cancel)
        .await
        .unwrap();
    assert_eq!(report.total_parsed, 1);
    assert_eq!(report.specific, 1);
    assert_eq!(report.generic, 0);
    let object = match report.entities[0].status {
        EntityStatus::Specific { object, confidence } => {
            assert_eq!(confidence, 1.0);
            object
        }
        ref other => panic!("expected specific, got {:?}", other),
    };
    assert_eq!(object.kind, ObjectKind::UtilityLine);

    let stored = store.get_object(project.id, object).await.unwrap().unwrap();
    match &stored.attributes {
        ObjectAttributes::UtilityLine(line) => {
            assert_eq!(line.system, "STORM");
            assert_eq!(line.diameter_in, Some(12.0));
            assert!((line.length - 100.0).abs() < 1e-9);
        }
        other => panic!("expected utility line, got {:?}", other),
    }

    // Unchanged reimport
    let report = engine
        .reimport_drawing(
            project.id,
            &drawing(vec![line("1F", STORM_LAYER, 0.0)]),
            ReimportScope::Project,
            &cancel,
        )
        .await
        .unwrap();
    assert_eq!(report.modified, 0);
    assert_eq!(report.unchanged, 1);
    assert!(report.is_noop());

    // Moved five units
    let report = engine
        .reimport_drawing(
            project.id,
            &drawing(vec![line("1F", STORM_LAYER, 5.0)]),
            ReimportScope::Project,
            &cancel,
        )
        .await
        .unwrap();
    assert_eq!(report.modified, 1);
    assert_eq!(report.geometry_changed, vec![object]);
    let stored = store.get_object(project.id, object).await.unwrap().unwrap();
    assert_eq!(stored.sync_state, SyncState::Modified);

    // Removed from the drawing
    let report = engine
        .reimport_drawing(project.id, &drawing(vec![]), ReimportScope::Project, &cancel)
        .await
        .unwrap();
    assert_eq!(report.deleted, 1);
    assert!(store.list_objects(project.id).await.unwrap().is_empty());
    assert!(store.find_link(project.id, "1F").await.unwrap().is_none());
    assert_eq!(store.all_links(project.id).unwrap().len(), 1);
}

#[tokio::test]
async fn test_reimport_is_idempotent() {
    let project = Project::new("Harbor Blvd");
    let (engine, store) = engine_with(&project).await;
    let cancel = CancelFlag::new();
    let parsed = drawing(vec![
        line("1F", STORM_LAYER, 0.0),
        line("20", "CIV-UTIL-WATER-8IN-EXIST-LN", 50.0),
        line("21", "STORM_PIPE", 80.0),
    ]);

    engine.import_drawing(project.id, &parsed, &cancel).await.unwrap();
    let links_before = store.all_links(project.id).unwrap();
    let objects_before = store.list_objects(project.id).await.unwrap();

    for _ in 0..2 {
        let report = engine
            .reimport_drawing(project.id, &parsed, ReimportScope::Project, &cancel)
            .await
            .unwrap();
        assert_eq!(report.unchanged, 3);
        assert!(report.is_noop());
    }

    let links_after = store.all_links(project.id).unwrap();
    assert_eq!(links_after.len(), links_before.len());
    for link in &links_before {
        let after = links_after.iter().find(|l| l.id == link.id).unwrap();
        assert_eq!(after.geometry_hash, link.geometry_hash);
        assert_eq!(after.object_ref, link.object_ref);
        assert_eq!(after.sync_state, link.sync_state);
    }
    assert_eq!(store.list_objects(project.id).await.unwrap(), objects_before);
}

#[tokio::test]
async fn test_second_import_does_not_duplicate() {
    let project = Project::new("Harbor Blvd");
    let (engine, store) = engine_with(&project).await;
    let parsed = drawing(vec![line("1F", STORM_LAYER, 0.0)]);

    engine.import_drawing(project.id, &parsed, &CancelFlag::new()).await.unwrap();
    let report = engine.import_drawing(project.id, &parsed, &CancelFlag::new()).await.unwrap();

    assert_eq!(report.specific, 0);
    assert!(matches!(report.entities[0].status, EntityStatus::Unchanged { .. }));
    assert_eq!(store.list_objects(project.id).await.unwrap().len(), 1);
    assert_eq!(store.all_links(project.id).unwrap().len(), 1);
}

#[tokio::test]
async fn test_deletion_sweep_only_touches_absent_handles() {
    let project = Project::new("Harbor Blvd");
    let (engine, store) = engine_with(&project).await;
    let cancel = CancelFlag::new();

    engine
        .import_drawing(
            project.id,
            &drawing(vec![
                line("A1", STORM_LAYER, 0.0),
                line("A2", STORM_LAYER, 200.0),
                line("A3", STORM_LAYER, 400.0),
            ]),
            &cancel,
        )
        .await
        .unwrap();

    let report = engine
        .reimport_drawing(
            project.id,
            &drawing(vec![line("A1", STORM_LAYER, 0.0), line("A3", STORM_LAYER, 400.0)]),
            ReimportScope::Project,
            &cancel,
        )
        .await
        .unwrap();

    assert_eq!(report.deleted, 1);
    assert_eq!(report.unchanged, 2);
    let deleted: Vec<_> = report
        .entities
        .iter()
        .filter(|e| matches!(e.status, EntityStatus::Deleted { .. }))
        .map(|e| e.handle.as_str())
        .collect();
    assert_eq!(deleted, vec!["A2"]);
    assert_eq!(store.list_objects(project.id).await.unwrap().len(), 2);

    // The handle comes back as a new entity with a new link row
    let report = engine
        .reimport_drawing(
            project.id,
            &drawing(vec![
                line("A1", STORM_LAYER, 0.0),
                line("A2", STORM_LAYER, 200.0),
                line("A3", STORM_LAYER, 400.0),
            ]),
            ReimportScope::Project,
            &cancel,
        )
        .await
        .unwrap();
    assert_eq!(report.new, 1);
    assert_eq!(store.all_links(project.id).unwrap().len(), 4);
}

#[tokio::test]
async fn test_skipped_entities_are_not_swept() {
    let project = Project::new("Harbor Blvd");
    let (engine, store) = engine_with(&project).await;
    let cancel = CancelFlag::new();

    engine
        .import_drawing(project.id, &drawing(vec![line("B1", STORM_LAYER, 0.0)]), &cancel)
        .await
        .unwrap();

    // Same handle, now degenerate
    let degenerate = DrawingEntity::new(
        "B1",
        STORM_LAYER,
        EntityKind::Line,
        Geometry::line([0.0, 0.0, 0.0], [0.0, 0.0, 0.0]),
    );
    let report = engine
        .reimport_drawing(project.id, &drawing(vec![degenerate]), ReimportScope::Project, &cancel)
        .await
        .unwrap();

    assert_eq!(report.skipped, 1);
    assert_eq!(report.deleted, 0);
    assert_eq!(report.errors[0].kind, EntityErrorKind::GeometryInvalid);
    assert!(store.find_link(project.id, "B1").await.unwrap().is_some());
}

#[tokio::test]
async fn test_per_entity_failures_are_reported() {
    let project = Project::new("Harbor Blvd");
    let (engine, _store) = engine_with(&project).await;

    let mut parsed = drawing(vec![
        line("C1", STORM_LAYER, 0.0),
        DrawingEntity::new(
            "C2",
            "0",
            EntityKind::Other("HATCH".to_string()),
            Geometry::point(0.0, 0.0, 0.0),
        ),
        DrawingEntity::new("C3", STORM_LAYER, EntityKind::Line, Geometry::line_string(vec![])),
    ]);
    parsed.issues.push(ParseIssue {
        handle: "C4".to_string(),
        layer: "0".to_string(),
        reason: "unmapped entity kind SPLINE".to_string(),
    });

    let report = engine.import_drawing(project.id, &parsed, &CancelFlag::new()).await.unwrap();

    assert_eq!(report.total_parsed, 4);
    assert_eq!(report.specific, 1);
    assert_eq!(report.skipped, 3);
    let mut kinds: Vec<_> = report.errors.iter().map(|e| (e.handle.as_str(), e.kind)).collect();
    kinds.sort_by_key(|(handle, _)| *handle);
    assert_eq!(
        kinds,
        vec![
            ("C2", EntityErrorKind::Parse),
            ("C3", EntityErrorKind::GeometryInvalid),
            ("C4", EntityErrorKind::Parse),
        ]
    );
}

#[tokio::test]
async fn test_threshold_boundary_with_client_rules() {
    let rule = |client: &str, confidence: f64| {
        PatternRule::new(
            format!("{}-sd", client),
            client,
            10,
            r"^SD-(\d+IN)-(EX|PR)$",
            vec![TokenSlot::Attribute, TokenSlot::Phase],
            confidence,
        )
        .with_default(TokenSlotKey::Discipline, "CIV")
        .with_default(TokenSlotKey::Category, "UTIL")
        .with_default(TokenSlotKey::ObjectType, "STORM")
        .with_alias("PR", "NEW")
        .with_alias("EX", "EXIST")
    };

    let store = Arc::new(MemoryStore::new());
    let at = Project::new("At threshold").with_client("acme");
    let below = Project::new("Below threshold").with_client("globex");
    store.put_project(&at).await.unwrap();
    store.put_project(&below).await.unwrap();
    store.put_pattern_rule(&rule("acme", 0.70)).await.unwrap();
    store.put_pattern_rule(&rule("globex", 0.699999)).await.unwrap();
    let engine = SyncEngine::new(store.clone(), SyncConfig::default());

    let parsed = drawing(vec![line("D1", "sd-12in-pr", 0.0)]);

    let report = engine.import_drawing(at.id, &parsed, &CancelFlag::new()).await.unwrap();
    assert_eq!(report.specific, 1);
    let object = &store.list_objects(at.id).await.unwrap()[0];
    assert_eq!(object.kind(), ObjectKind::UtilityLine);
    assert_eq!(object.quality_score, 0.70);

    let report = engine.import_drawing(below.id, &parsed, &CancelFlag::new()).await.unwrap();
    assert_eq!(report.generic, 1);
    let object = &store.list_objects(below.id).await.unwrap()[0];
    let generic = object.attributes.as_generic().unwrap();
    assert_eq!(generic.confidence, 0.699999);
    assert_eq!(generic.suggested_object_type.as_deref(), Some("utility_line"));
}

#[tokio::test]
async fn test_cancelled_reimport_skips_sweep() {
    let project = Project::new("Harbor Blvd");
    let (engine, store) = engine_with(&project).await;

    engine
        .import_drawing(
            project.id,
            &drawing(vec![line("E1", STORM_LAYER, 0.0), line("E2", STORM_LAYER, 300.0)]),
            &CancelFlag::new(),
        )
        .await
        .unwrap();

    let cancel = CancelFlag::new();
    cancel.cancel();
    let report = engine
        .reimport_drawing(project.id, &drawing(vec![]), ReimportScope::Project, &cancel)
        .await
        .unwrap();

    assert!(report.cancelled);
    assert_eq!(report.deleted, 0);
    assert_eq!(store.list_objects(project.id).await.unwrap().len(), 2);

    let report = engine
        .import_drawing(project.id, &drawing(vec![line("E3", STORM_LAYER, 600.0)]), &cancel)
        .await
        .unwrap();
    assert!(report.cancelled);
    assert!(report.entities.is_empty());
}

#[tokio::test]
async fn test_drawing_scope_limits_the_sweep() {
    let project = Project::new("Harbor Blvd");
    let (engine, store) = engine_with(&project).await;
    let cancel = CancelFlag::new();

    let c101 = drawing(vec![line("F1", STORM_LAYER, 0.0), line("F2", STORM_LAYER, 200.0)])
        .with_drawing_id("C-101");
    let c102 = drawing(vec![line("G1", STORM_LAYER, 900.0)]).with_drawing_id("C-102");
    engine.import_drawing(project.id, &c101, &cancel).await.unwrap();
    engine.import_drawing(project.id, &c102, &cancel).await.unwrap();

    let trimmed = drawing(vec![line("F1", STORM_LAYER, 0.0)]).with_drawing_id("C-101");
    let report = engine
        .reimport_drawing(project.id, &trimmed, ReimportScope::Drawing, &cancel)
        .await
        .unwrap();
    assert_eq!(report.deleted, 1);
    assert!(store.find_link(project.id, "F2").await.unwrap().is_none());
    assert!(store.find_link(project.id, "G1").await.unwrap().is_some());

    // Project scope treats every other drawing's handle as absent
    let report = engine
        .reimport_drawing(project.id, &trimmed, ReimportScope::Project, &cancel)
        .await
        .unwrap();
    assert_eq!(report.deleted, 1);
    assert!(store.find_link(project.id, "G1").await.unwrap().is_none());

    let err = engine
        .reimport_drawing(project.id, &drawing(vec![]), ReimportScope::Drawing, &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, CadSyncError::ConfigInvalid { .. }));
}

#[tokio::test]
async fn test_unknown_project() {
    let store = Arc::new(MemoryStore::new());
    let engine = SyncEngine::new(store, SyncConfig::default());
    let missing = Project::new("Nowhere");

    let err = engine
        .import_drawing(missing.id, &drawing(vec![]), &CancelFlag::new())
        .await
        .unwrap_err();
    assert!(matches!(err, CadSyncError::ProjectNotFound(id) if id == missing.id));
}

#[tokio::test]
async fn test_dxf_file_round_trip_through_engine() {
    let project = Project::new("Harbor Blvd");
    let (engine, store) = engine_with(&project).await;
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("c101.dxf");

    let bytes = DxfWriter
        .write(&[
            OutputEntity::new(STORM_LAYER, Geometry::line([0.0, 0.0, 0.0], [100.0, 0.0, 0.0])),
            OutputEntity::new("SURV-CTRL-MON-EXIST-PT", Geometry::point(10.0, 10.0, 42.5)),
        ])
        .unwrap();
    std::fs::write(&path, bytes).unwrap();

    let report = engine.import(project.id, &path).await.unwrap();
    assert_eq!(report.source_name, "c101.dxf");
    assert_eq!(report.specific, 2);

    let report = engine.reimport(project.id, &path).await.unwrap();
    assert_eq!(report.unchanged, 2);
    assert!(report.is_noop());

    let kinds: Vec<_> = store
        .list_objects(project.id)
        .await
        .unwrap()
        .iter()
        .map(|o| o.kind())
        .collect();
    assert!(kinds.contains(&ObjectKind::UtilityLine));
    assert!(kinds.contains(&ObjectKind::SurveyPoint));
}

#[tokio::test]
async fn test_json_interchange_upload() {
    let project = Project::new("Harbor Blvd");
    let (engine, _store) = engine_with(&project).await;
    let document = br#"{"drawing_id": "C-101", "entities": [
        {"handle": "10", "layer": "CIV-STRM-BIOR-NEW-PG", "kind": "polygon",
         "geometry": {"type": "Polygon", "coordinates": [[[0,0],[10,0],[10,10],[0,10],[0,0]]]}}
    ]}"#;

    let report = engine.import_bytes(project.id, "c101.json", document).await.unwrap();
    assert_eq!(report.specific, 1);

    let err = engine.import_bytes(project.id, "c101.dwg", b"").await.unwrap_err();
    assert!(matches!(err, CadSyncError::UnsupportedFormat(_)));
}

#[tokio::test]
async fn test_preview_writes_nothing() {
    let project = Project::new("Harbor Blvd");
    let (engine, store) = engine_with(&project).await;
    let preview = drawing(vec![
        line("1F", STORM_LAYER, 0.0),
        line("20", "STORM_PIPE", 0.0),
        line("", STORM_LAYER, 0.0),
    ]);

    let report = engine.preview_drawing(project.id, &preview).await.unwrap();

    assert_eq!(report.specific, 1);
    assert_eq!(report.generic, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.errors[0].kind, EntityErrorKind::Parse);
    assert!(store.list_objects(project.id).await.unwrap().is_empty());
    assert!(store.list_links(project.id, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_repeated_handle_keeps_reimport_idempotent() {
    let project = Project::new("Harbor Blvd");
    let (engine, store) = engine_with(&project).await;
    let cancel = CancelFlag::new();
    let parsed = drawing(vec![line("1F", STORM_LAYER, 0.0), line("1F", STORM_LAYER, 40.0)]);

    let report = engine.import_drawing(project.id, &parsed, &cancel).await.unwrap();
    assert_eq!(report.specific, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.errors[0].kind, EntityErrorKind::Parse);
    assert!(report.errors[0].message.contains("duplicate handle 1F"));

    for _ in 0..2 {
        let report = engine
            .reimport_drawing(project.id, &parsed, ReimportScope::Project, &cancel)
            .await
            .unwrap();
        assert_eq!(report.modified, 0);
        assert_eq!(report.unchanged, 1);
        assert_eq!(report.skipped, 1);
        assert!(report.is_noop());
    }

    // The first occurrence owns the handle
    let objects = store.list_objects(project.id).await.unwrap();
    assert_eq!(objects.len(), 1);
    assert_eq!(
        objects[0].geometry,
        Geometry::line([1000.0, 500.0, 10.0], [1100.0, 500.0, 10.0])
    );

    let preview = engine.preview_drawing(project.id, &parsed).await.unwrap();
    assert_eq!(preview.skipped, 1);
}
