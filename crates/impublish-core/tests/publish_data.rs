//! Dataset publishing and incremental updates against the in-memory backend

mod common;

use common::Workspace;
use impublish_core::{
    AbortOnShortfall, ChecksumTracker, ContinueOnShortfall, DatasetParameters, DefinedType,
    InMemoryBackend, PublishError, RecordId, Reconciler, RepositoryBackend, Visibility,
};
use std::path::PathBuf;

fn parameters(files: Vec<PathBuf>) -> DatasetParameters {
    DatasetParameters {
        title: "Tidal run".to_string(),
        description: "Model output".to_string(),
        files,
        tags: vec!["ocean".to_string()],
        category: Some("Oceanography".to_string()),
    }
}

#[test]
fn new_dataset_uploads_everything() {
    let ws = Workspace::new();
    let a = ws.write_source("a.txt", "alpha");
    let b = ws.write_source("b.txt", "beta");
    let backend = InMemoryBackend::new();
    let reconciler = Reconciler::new(&backend);

    let outcome = reconciler
        .publish_data(&parameters(vec![a.clone(), b.clone()]), None, false)
        .unwrap();
    assert!(outcome.created);
    assert_eq!(outcome.uploaded, vec![a.clone(), b.clone()]);
    assert_eq!(outcome.visibility, Visibility::Public);

    let record = backend.record(&outcome.id).unwrap();
    assert_eq!(record.defined_type, DefinedType::Dataset);
    assert!(record.tags.contains("ocean"));
    assert!(record.categories.contains("Oceanography"));

    let tracker = ChecksumTracker::default();
    assert!(!tracker.is_modified(&a).unwrap());
    assert!(!tracker.is_modified(&b).unwrap());
}

#[test]
fn update_uploads_only_modified_files() {
    let ws = Workspace::new();
    let a = ws.write_source("a.txt", "alpha");
    let b = ws.write_source("b.txt", "beta");
    let c = ws.write_source("c.txt", "gamma");
    let backend = InMemoryBackend::new();
    let reconciler = Reconciler::new(&backend);
    let params = parameters(vec![a.clone(), b.clone(), c.clone()]);

    let first = reconciler.publish_data(&params, None, false).unwrap();

    std::fs::write(&a, "alpha, revised").unwrap();
    std::fs::write(&c, "gamma, revised").unwrap();
    let second = reconciler.publish_data(&params, Some(&first.id), false).unwrap();

    assert!(!second.created);
    assert_eq!(second.id, first.id);
    assert_eq!(second.uploaded, vec![a.clone(), c.clone()]);
    assert_eq!(second.unchanged, vec![b.clone()]);
    assert_eq!(backend.count_calls("create_record"), 1);
}

#[test]
fn modified_file_replaces_remote_copy() {
    let ws = Workspace::new();
    let a = ws.write_source("a.txt", "alpha");
    let backend = InMemoryBackend::new();
    let reconciler = Reconciler::new(&backend);
    let params = parameters(vec![a.clone()]);

    let first = reconciler.publish_data(&params, None, true).unwrap();
    std::fs::write(&a, "alpha, revised").unwrap();
    reconciler.publish_data(&params, Some(&first.id), true).unwrap();

    let copies = backend
        .list_files(&first.id)
        .unwrap()
        .into_iter()
        .filter(|f| f.name == "a.txt")
        .count();
    assert_eq!(copies, 1);
    assert_eq!(backend.count_calls("delete_file"), 1);
}

#[test]
fn missing_local_files_are_skipped() {
    let ws = Workspace::new();
    let a = ws.write_source("a.txt", "alpha");
    let missing = ws.source.path().join("not-there.txt");
    let backend = InMemoryBackend::new();
    let reconciler = Reconciler::new(&backend);

    let outcome = reconciler
        .publish_data(&parameters(vec![a.clone(), missing.clone()]), None, false)
        .unwrap();
    assert_eq!(outcome.uploaded, vec![a]);
    assert_eq!(outcome.skipped, vec![missing]);
    assert!(outcome.verified);
}

#[test]
fn unknown_record_is_reported() {
    let ws = Workspace::new();
    let a = ws.write_source("a.txt", "alpha");
    let backend = InMemoryBackend::new();
    let reconciler = Reconciler::new(&backend);

    let err = reconciler
        .publish_data(&parameters(vec![a]), Some(&RecordId::from("404")), false)
        .unwrap_err();
    assert!(matches!(err, PublishError::RecordNotFound(id) if id.as_str() == "404"));
}

#[test]
fn unchanged_public_dataset_is_left_alone() {
    let ws = Workspace::new();
    let a = ws.write_source("a.txt", "alpha");
    let backend = InMemoryBackend::new();
    let reconciler = Reconciler::new(&backend);
    let params = parameters(vec![a]);

    let first = reconciler.publish_data(&params, None, false).unwrap();
    let second = reconciler.publish_data(&params, Some(&first.id), false).unwrap();

    assert!(second.uploaded.is_empty());
    assert_eq!(second.visibility, Visibility::Public);
    assert_eq!(backend.count_calls("make_public"), 1);
    assert_eq!(backend.count_calls("add_tag"), 1);
    assert_eq!(backend.count_calls("add_category"), 1);
}

#[test]
fn aborted_update_keeps_the_existing_record() {
    let ws = Workspace::new();
    let a = ws.write_source("a.txt", "alpha");
    let backend = InMemoryBackend::new();
    let reconciler = Reconciler::new(&backend).with_policy(AbortOnShortfall);
    let params = parameters(vec![a.clone()]);

    let first = reconciler.publish_data(&params, None, false).unwrap();
    std::fs::write(&a, "alpha, revised").unwrap();
    backend.drop_uploads_named("a.txt");

    let err = reconciler.publish_data(&params, Some(&first.id), false).unwrap_err();
    assert!(matches!(err, PublishError::Aborted { rolled_back: false, .. }));
    assert!(backend.record(&first.id).is_some());
    assert_eq!(backend.count_calls("delete_record"), 0);
}

#[test]
fn aborted_new_dataset_is_rolled_back() {
    let ws = Workspace::new();
    let a = ws.write_source("a.txt", "alpha");
    let b = ws.write_source("b.txt", "beta");
    let backend = InMemoryBackend::new();
    backend.drop_uploads_named("b.txt");
    let reconciler = Reconciler::new(&backend);

    let err = reconciler
        .publish_data(&parameters(vec![a, b.clone()]), None, false)
        .unwrap_err();
    match err {
        PublishError::Aborted { missing, rolled_back, .. } => {
            assert_eq!(missing, vec![b]);
            assert!(rolled_back);
        }
        other => panic!("expected abort, got {}", other),
    }
    assert!(backend.records().is_empty());
    assert_eq!(backend.count_calls("make_public"), 0);
}

#[test]
fn accepted_shortfall_still_publishes() {
    let ws = Workspace::new();
    let a = ws.write_source("a.txt", "alpha");
    let backend = InMemoryBackend::new();
    backend.drop_uploads_named("a.txt");
    let reconciler = Reconciler::new(&backend).with_policy(ContinueOnShortfall);

    let outcome = reconciler.publish_data(&parameters(vec![a]), None, false).unwrap();
    assert!(!outcome.verified);
    assert_eq!(outcome.visibility, Visibility::Public);
}

#[test]
fn upload_failure_is_reported_with_stage() {
    let ws = Workspace::new();
    let a = ws.write_source("a.txt", "alpha");
    let backend = InMemoryBackend::new();
    backend.fail_operation("add_file", impublish_core::BackendError::http(413, "quota exceeded"));
    let reconciler = Reconciler::new(&backend);

    let err = reconciler.publish_data(&parameters(vec![a.clone()]), None, false).unwrap_err();
    assert!(matches!(
        err,
        PublishError::Backend { operation: "add_file", .. }
    ));
    // No checksum is recorded for a failed upload
    assert!(ChecksumTracker::default().is_modified(&a).unwrap());
}
