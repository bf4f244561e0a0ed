//! Review queue, reclassification and export

use cadsync_core::config::SyncConfig;
use cadsync_core::formats::{DrawingReader, DxfReader};
use cadsync_core::models::{
    DrawingEntity, EntityKind, EntityStatus, Geometry, ObjectAttributes, ObjectKind,
    ParsedDrawing, PatternRule, Project, ReimportReport, ReviewStatus, TokenSlot, TokenSlotKey,
};
use cadsync_core::CadSyncError;
use cadsync_engine::{
    CancelFlag, ExportConfig, LinkRegistry, ReimportScope, ReviewDecision, SyncEngine,
};
use cadsync_store::{LinkStore, MemoryStore, ObjectStore, ReferenceSeed};
use std::sync::Arc;

async fn engine_with(project: &Project) -> (SyncEngine<MemoryStore>, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    store.put_project(project).await.unwrap();
    (SyncEngine::new(store.clone(), SyncConfig::default()), store)
}

fn site_drawing() -> ParsedDrawing {
    ParsedDrawing::new(
        "c101.dxf",
        vec![
            DrawingEntity::new(
                "1F",
                "CIV-UTIL-STORM-12IN-NEW-LN",
                EntityKind::Line,
                Geometry::line([0.0, 0.0, 0.0], [100.0, 0.0, 0.0]),
            ),
            DrawingEntity::new(
                "2A",
                "STORM_PIPE",
                EntityKind::Line,
                Geometry::line([0.0, 50.0, 0.0], [80.0, 50.0, 0.0]),
            ),
        ],
    )
}

async fn reimport(engine: &SyncEngine<MemoryStore>, project: &Project) -> ReimportReport {
    engine
        .reimport_drawing(project.id, &site_drawing(), ReimportScope::Project, &CancelFlag::new())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_reclassify_moves_link_without_duplicating() {
    let project = Project::new("Harbor Blvd");
    let (engine, store) = engine_with(&project).await;
    engine.import_drawing(project.id, &site_drawing(), &CancelFlag::new()).await.unwrap();

    let queue = engine.review_queue(project.id).await.unwrap();
    assert_eq!(queue.len(), 1);
    let generic_id = queue[0].id;

    let result = engine
        .reclassify(project.id, generic_id, "CIV-UTIL-STORM-10IN-EXIST-LN")
        .await
        .unwrap();
    assert!(result.link_retargeted);
    assert_eq!(result.object.kind(), ObjectKind::UtilityLine);
    assert_eq!(result.object.quality_score, 1.0);
    match &result.object.attributes {
        ObjectAttributes::UtilityLine(line) => assert_eq!(line.diameter_in, Some(10.0)),
        other => panic!("expected utility line, got {:?}", other),
    }

    let links = store.all_links(project.id).unwrap();
    assert_eq!(links.len(), 2);
    let link = result.link.unwrap();
    assert_eq!(link.source_handle, "2A");
    assert_eq!(link.object_ref, result.object.object_ref());

    let generic = store.get_object(project.id, result.previous).await.unwrap().unwrap();
    let attributes = generic.attributes.as_generic().unwrap();
    assert_eq!(attributes.review_status, ReviewStatus::Reclassified);
    assert!(!attributes.needs_review);
    assert!(engine.review_queue(project.id).await.unwrap().is_empty());

    // The next reimport follows the link to the typed object
    let report = reimport(&engine, &project).await;
    assert_eq!(report.unchanged, 2);
    assert!(report.is_noop());
    assert!(report
        .entities
        .iter()
        .any(|e| e.status == EntityStatus::Unchanged { object: result.object.object_ref() }));
    assert_eq!(store.all_links(project.id).unwrap().len(), 2);

    let err = engine
        .reclassify(project.id, generic_id, "CIV-UTIL-STORM-10IN-EXIST-LN")
        .await
        .unwrap_err();
    assert!(matches!(err, CadSyncError::InvalidReview { .. }));
}

#[tokio::test]
async fn test_reclassify_rejects_unusable_targets() {
    let project = Project::new("Harbor Blvd");
    let (engine, _store) = engine_with(&project).await;
    engine.import_drawing(project.id, &site_drawing(), &CancelFlag::new()).await.unwrap();
    let generic_id = engine.review_queue(project.id).await.unwrap()[0].id;

    // No object type in the name
    let err = engine.reclassify(project.id, generic_id, "A-WALL").await.unwrap_err();
    assert!(matches!(err, CadSyncError::InvalidReview { .. }));

    // A line cannot become a survey point
    let err = engine
        .reclassify(project.id, generic_id, "SURV-CTRL-MON-EXIST-PT")
        .await
        .unwrap_err();
    assert!(matches!(err, CadSyncError::InvalidReview { .. }));

    let err = engine
        .reclassify(project.id, cadsync_core::models::ObjectId::new(), "CIV-UTIL-STORM-NEW-LN")
        .await
        .unwrap_err();
    assert!(matches!(err, CadSyncError::ObjectNotFound(_)));

    // The generic object is still waiting
    assert_eq!(engine.review_queue(project.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_review_decisions() {
    let project = Project::new("Harbor Blvd");
    let (engine, _store) = engine_with(&project).await;
    engine.import_drawing(project.id, &site_drawing(), &CancelFlag::new()).await.unwrap();
    let generic_id = engine.review_queue(project.id).await.unwrap()[0].id;

    let reviewed = engine.review(project.id, generic_id, ReviewDecision::Ignore).await.unwrap();
    assert_eq!(reviewed.attributes.as_generic().unwrap().review_status, ReviewStatus::Ignored);
    assert!(engine.review_queue(project.id).await.unwrap().is_empty());

    let err = engine
        .review(project.id, generic_id, ReviewDecision::Approve)
        .await
        .unwrap_err();
    assert!(matches!(err, CadSyncError::InvalidReview { .. }));
}

#[tokio::test]
async fn test_classify_uses_project_rules() {
    let project = Project::new("Harbor Blvd").with_client("acme");
    let (engine, store) = engine_with(&project).await;
    store
        .put_pattern_rule(
            &PatternRule::new("acme-mh", "acme", 1, r"^MANHOLE$", vec![], 0.95)
                .with_default(TokenSlotKey::Category, "UTIL")
                .with_default(TokenSlotKey::ObjectType, "MH"),
        )
        .await
        .unwrap();

    let result = engine.classify(project.id, "manhole").await.unwrap();
    assert_eq!(result.confidence, 0.95);
    assert_eq!(result.object_type.as_deref(), Some("MH"));

    let result = engine.classify(project.id, "CIV-UTIL-STORM-12IN-NEW-LN").await.unwrap();
    assert_eq!(result.confidence, 1.0);
}

#[tokio::test]
async fn test_export_canonical_layers() {
    let project = Project::new("Harbor Blvd");
    let (engine, store) = engine_with(&project).await;
    engine.import_drawing(project.id, &site_drawing(), &CancelFlag::new()).await.unwrap();
    let links_before = store.all_links(project.id).unwrap();

    let exported = engine.export(project.id, &ExportConfig::default()).await.unwrap();

    assert_eq!(exported.summary.objects_written, 2);
    assert_eq!(exported.summary.layers, vec!["CIV-UTIL-STORM-12IN-NEW-LN", "MISC"]);
    let parsed = DxfReader.parse("export.dxf", &exported.bytes).unwrap();
    assert_eq!(parsed.entities.len(), 2);

    // Export never touches links
    let links_after = store.all_links(project.id).unwrap();
    assert_eq!(links_after.len(), links_before.len());
    for link in &links_before {
        let after = links_after.iter().find(|l| l.id == link.id).unwrap();
        assert_eq!(after.last_seen, link.last_seen);
    }
}

#[tokio::test]
async fn test_export_client_template_reverses_aliases() {
    let project = Project::new("Harbor Blvd").with_client("acme");
    let (engine, store) = engine_with(&project).await;
    store
        .put_pattern_rule(
            &PatternRule::new(
                "acme-sd",
                "acme",
                10,
                r"^(SD)-(\d+IN)-(EX|PR)$",
                vec![TokenSlot::ObjectType, TokenSlot::Attribute, TokenSlot::Phase],
                0.9,
            )
            .with_default(TokenSlotKey::Discipline, "CIV")
            .with_default(TokenSlotKey::Category, "UTIL")
            .with_alias("SD", "STORM")
            .with_alias("PR", "NEW")
            .with_alias("EX", "EXIST"),
        )
        .await
        .unwrap();

    let drawing = ParsedDrawing::new(
        "acme.dxf",
        vec![DrawingEntity::new(
            "30",
            "SD-15IN-PR",
            EntityKind::Line,
            Geometry::line([0.0, 0.0, 0.0], [40.0, 0.0, 0.0]),
        )],
    );
    let report = engine.import_drawing(project.id, &drawing, &CancelFlag::new()).await.unwrap();
    assert_eq!(report.specific, 1);

    let config = ExportConfig::default().with_template("{type}-{attributes}-{phase}");
    let exported = engine.export(project.id, &config).await.unwrap();
    assert_eq!(exported.summary.layers, vec!["SD-15IN-PR"]);
}

#[tokio::test]
async fn test_reclassified_generic_is_not_exported() {
    let project = Project::new("Harbor Blvd");
    let (engine, _store) = engine_with(&project).await;
    engine.import_drawing(project.id, &site_drawing(), &CancelFlag::new()).await.unwrap();
    let generic_id = engine.review_queue(project.id).await.unwrap()[0].id;
    engine
        .reclassify(project.id, generic_id, "CIV-UTIL-STORM-10IN-EXIST-LN")
        .await
        .unwrap();

    let exported = engine.export(project.id, &ExportConfig::default()).await.unwrap();
    assert_eq!(exported.summary.objects_written, 2);
    assert_eq!(
        exported.summary.layers,
        vec!["CIV-UTIL-STORM-10IN-EXIST-LN", "CIV-UTIL-STORM-12IN-NEW-LN"]
    );

    // Dropping the entity removes it from the next export entirely
    let trimmed = ParsedDrawing::new("c101.dxf", vec![site_drawing().entities.remove(0)]);
    let report = engine
        .reimport_drawing(project.id, &trimmed, ReimportScope::Project, &CancelFlag::new())
        .await
        .unwrap();
    assert_eq!(report.deleted, 1);

    let exported = engine.export(project.id, &ExportConfig::default()).await.unwrap();
    assert_eq!(exported.summary.objects_written, 1);
    assert_eq!(exported.summary.layers, vec!["CIV-UTIL-STORM-12IN-NEW-LN"]);
}

#[tokio::test]
async fn test_reclassify_creates_link_when_active_one_is_gone() {
    let project = Project::new("Harbor Blvd");
    let (engine, store) = engine_with(&project).await;
    engine.import_drawing(project.id, &site_drawing(), &CancelFlag::new()).await.unwrap();
    let generic_id = engine.review_queue(project.id).await.unwrap()[0].id;

    LinkRegistry::new(store.as_ref()).mark_deleted(project.id, "2A").await.unwrap();

    let result = engine
        .reclassify(project.id, generic_id, "CIV-UTIL-STORM-10IN-EXIST-LN")
        .await
        .unwrap();
    assert!(!result.link_retargeted);

    let active: Vec<_> = store
        .all_links(project.id)
        .unwrap()
        .into_iter()
        .filter(|link| link.source_handle == "2A" && !link.is_deleted())
        .collect();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].object_ref, result.object.object_ref());
    assert_eq!(result.link.unwrap().id, active[0].id);

    // The handle resolves to the typed object, so nothing is created twice
    let report = reimport(&engine, &project).await;
    assert_eq!(report.new, 0);
    assert_eq!(report.unchanged, 2);
}

#[tokio::test]
async fn test_reclassify_refuses_a_handle_claimed_by_another_object() {
    let project = Project::new("Harbor Blvd");
    let (engine, store) = engine_with(&project).await;
    engine.import_drawing(project.id, &site_drawing(), &CancelFlag::new()).await.unwrap();
    let generic_id = engine.review_queue(project.id).await.unwrap()[0].id;

    LinkRegistry::new(store.as_ref()).mark_deleted(project.id, "2A").await.unwrap();
    let redrawn = ParsedDrawing::new("c101.dxf", vec![site_drawing().entities.remove(1)]);
    engine.import_drawing(project.id, &redrawn, &CancelFlag::new()).await.unwrap();
    let claimed = store.find_link(project.id, "2A").await.unwrap().unwrap();

    let err = engine
        .reclassify(project.id, generic_id, "CIV-UTIL-STORM-10IN-EXIST-LN")
        .await
        .unwrap_err();
    assert!(matches!(err, CadSyncError::InvalidReview { .. }));

    // Rolled back: the newer link still points where it did
    let link = store.find_link(project.id, "2A").await.unwrap().unwrap();
    assert_eq!(link.object_ref, claimed.object_ref);
    assert_eq!(engine.review_queue(project.id).await.unwrap().len(), 2);
}
