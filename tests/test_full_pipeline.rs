//! Integration test: file → reconcile → normalize → infer → store

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;

use rusty_wrench::batch::{BatchPredictor, RowResult, process_dataset};
use rusty_wrench::error::{BatchError, ModelError};
use rusty_wrench::inference::Label;
use rusty_wrench::model::{
    Classifier, FeatureFile, HandleUnknown, ModelFile, ModelHandle, ModelStore, OneHotColumn,
    Preprocessor, TreeNode,
};
use rusty_wrench::persistence::{
    DatasetStatus, MemoryRepository, PredictionRepository, SqliteRepository,
};
use rusty_wrench::schema::CanonicalFeature;

const FEATURES: [&str; 6] = [
    "Type",
    "Air temperature [K]",
    "Process temperature [K]",
    "Rotational speed [rpm]",
    "Torque [Nm]",
    "Tool wear [min]",
];

/// Tool wear > 200 fails; otherwise torque > 60 fails.
fn write_model(dir: &Path, handle_unknown: HandleUnknown) -> ModelStore {
    let model = ModelFile {
        preprocessor: Preprocessor {
            numeric: FEATURES[1..].iter().map(|s| s.to_string()).collect(),
            categorical: vec![OneHotColumn {
                column: "Type".into(),
                categories: vec!["H".into(), "L".into(), "M".into()],
                handle_unknown,
            }],
        },
        classifier: Classifier::DecisionTree {
            root: TreeNode::split(
                4,
                200.0,
                TreeNode::split(3, 60.0, TreeNode::leaf(9.0, 1.0), TreeNode::leaf(1.0, 9.0)),
                TreeNode::leaf(2.0, 8.0),
            ),
        },
    };
    let features = FeatureFile {
        features: FEATURES.iter().map(|s| s.to_string()).collect(),
        target: Some("Machine failure".into()),
        ..Default::default()
    };
    let store = ModelStore::new(dir.join("models"));
    store
        .write_artifact("20240101_120000", &model, &features)
        .unwrap();
    store
}

fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

fn row_id(r: &RowResult) -> &str {
    match r {
        Ok(p) => &p.row_id,
        Err(e) => &e.row_id,
    }
}

const REFERENCE_CSV: &str = "\
UDI,Product ID,Type,Air temperature [K],Process temperature [K],Rotational speed [rpm],Torque [Nm],Tool wear [min]
1,M14860,M,298.1,308.6,1551,42.8,0
2,L47181,L,298.2,308.7,1408,46.3,3
3,L47182,L,298.1,308.5,1498,65.9,5
4,L47183,L,298.2,308.6,1433,39.5,220
";

#[test]
fn test_one_result_per_row_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let store = write_model(dir.path(), HandleUnknown::Ignore);
    let data = write_file(dir.path(), "reference.csv", REFERENCE_CSV);

    let predictor = BatchPredictor::new(ModelHandle::from_store(&store));
    let results = predictor.predict_file(&data).unwrap();

    let ids: Vec<&str> = results.iter().map(row_id).collect();
    assert_eq!(ids, ["M14860", "L47181", "L47182", "L47183"]);

    let labels: Vec<Label> = results.iter().map(|r| r.as_ref().unwrap().label).collect();
    assert_eq!(labels, [Label::Normal, Label::Normal, Label::Failure, Label::Failure]);
}

#[test]
fn test_reference_row_scores_in_range() {
    let dir = tempfile::tempdir().unwrap();
    let store = write_model(dir.path(), HandleUnknown::Ignore);
    let data = write_file(
        dir.path(),
        "one.json",
        r#"[{"Type": "L", "Air temperature [K]": 298.1, "Process temperature [K]": 308.6,
            "Rotational speed [rpm]": 1551, "Torque [Nm]": 42.8, "Tool wear [min]": 0}]"#,
    );

    let predictor = BatchPredictor::new(ModelHandle::from_store(&store));
    let results = predictor.predict_file(&data).unwrap();
    assert_eq!(results.len(), 1);

    let p = results[0].as_ref().unwrap();
    assert!((0.0..=1.0).contains(&p.confidence));
    assert_eq!(p.label, Label::from_confidence(p.confidence));
    assert_eq!(p.row_id, "ROW_1");
}

#[test]
fn test_drifted_headers_are_reconciled() {
    let dir = tempfile::tempdir().unwrap();
    let store = write_model(dir.path(), HandleUnknown::Ignore);
    let data = write_file(
        dir.path(),
        "drifted.csv",
        "product_id,machine_type,air_temp,process_temp,rpm,torque_nm,tool_wear\n\
         A1,L,298.1,308.6,1551,70.0,10\n\
         A2,M,298.1,308.6,1551,not-a-number,10\n",
    );

    let results = BatchPredictor::new(ModelHandle::from_store(&store))
        .predict_file(&data)
        .unwrap();

    let first = results[0].as_ref().unwrap();
    assert_eq!(first.row_id, "A1");
    assert_eq!(first.label, Label::Failure);

    // Unparseable torque falls back to its default instead of failing the row.
    let second = results[1].as_ref().unwrap();
    assert!(second.features.defaulted.contains(&CanonicalFeature::Torque));
    assert_eq!(second.label, Label::Normal);
}

#[test]
fn test_missing_features_is_a_file_error() {
    let dir = tempfile::tempdir().unwrap();
    let store = write_model(dir.path(), HandleUnknown::Ignore);
    let data = write_file(dir.path(), "partial.csv", "type,air_temp,proc_temp\nL,298,308\n");

    let err = BatchPredictor::new(ModelHandle::from_store(&store))
        .predict_file(&data)
        .unwrap_err();

    match &err {
        BatchError::MissingFeatures { missing } => assert_eq!(
            missing,
            &[
                CanonicalFeature::RotationalSpeed,
                CanonicalFeature::Torque,
                CanonicalFeature::ToolWear
            ]
        ),
        other => panic!("expected missing features, got {other:?}"),
    }
    let json = err.to_json();
    assert_eq!(json["error"], "Missing required features");
    assert_eq!(json["details"].as_array().unwrap().len(), 3);
}

#[test]
fn test_bad_rows_do_not_abort_the_batch() {
    let dir = tempfile::tempdir().unwrap();
    let store = write_model(dir.path(), HandleUnknown::Error);
    let data = write_file(
        dir.path(),
        "mixed.csv",
        "Product ID,Type,Air temperature [K],Process temperature [K],Rotational speed [rpm],Torque [Nm],Tool wear [min]\n\
         P1,L,298,308,1500,40,10\n\
         P2,X,298,308,1500,40,10\n\
         P3,H,298,308,1500,40,10\n",
    );

    let results = BatchPredictor::new(ModelHandle::from_store(&store))
        .predict_file(&data)
        .unwrap();
    assert_eq!(results.len(), 3);
    assert!(results[0].is_ok());
    let err = results[1].as_ref().unwrap_err();
    assert_eq!(err.row_id, "P2");
    assert!(err.message.contains("'X'"));
    assert!(results[2].is_ok());
}

#[test]
fn test_rerun_replaces_results_sqlite() {
    let repo = SqliteRepository::in_memory().unwrap();
    rerun_replaces_results(&repo);
}

#[test]
fn test_rerun_replaces_results_memory() {
    let repo = MemoryRepository::new();
    rerun_replaces_results(&repo);
}

fn rerun_replaces_results(repo: &dyn PredictionRepository) {
    let dir = tempfile::tempdir().unwrap();
    let store = write_model(dir.path(), HandleUnknown::Ignore);
    let predictor = BatchPredictor::new(ModelHandle::from_store(&store));
    let data = write_file(dir.path(), "reference.csv", REFERENCE_CSV);

    let id = repo.register_dataset(&data.to_string_lossy()).unwrap();
    let first = process_dataset(id, &data, &predictor, repo).unwrap();
    assert_eq!(first.total, 4);
    assert_eq!(repo.predictions(id).unwrap().len(), 4);

    // Same dataset, now with two rows.
    let shorter: String = REFERENCE_CSV.lines().take(3).map(|l| format!("{l}\n")).collect();
    fs::write(&data, shorter).unwrap();
    let second = process_dataset(id, &data, &predictor, repo).unwrap();
    assert_eq!(second.total, 2);

    let stored = repo.predictions(id).unwrap();
    let ids: Vec<&str> = stored.iter().map(|r| r.product_id.as_str()).collect();
    assert_eq!(ids, ["M14860", "L47181"]);
    assert_eq!(stored[0].features["Torque [Nm]"], 42.8);

    let state = repo.status(id).unwrap().unwrap();
    assert_eq!(state.status, DatasetStatus::Processed);
    assert_eq!(state.error_message, None);
}

#[test]
fn test_failed_run_ends_in_error_status() {
    let dir = tempfile::tempdir().unwrap();
    let store = write_model(dir.path(), HandleUnknown::Ignore);
    let predictor = BatchPredictor::new(ModelHandle::from_store(&store));
    let repo = MemoryRepository::new();

    let partial = write_file(dir.path(), "partial.csv", "type,air_temp,proc_temp\nL,298,308\n");
    let id = repo.register_dataset("partial.csv").unwrap();
    let err = process_dataset(id, &partial, &predictor, &repo).unwrap_err();
    assert!(matches!(err, BatchError::MissingFeatures { .. }));

    let state = repo.status(id).unwrap().unwrap();
    assert_eq!(state.status, DatasetStatus::Error);
    assert_eq!(
        state.error_message.as_deref(),
        Some("Missing required features: Rotational speed, Torque, Tool wear")
    );

    let missing = dir.path().join("gone.csv");
    let err = process_dataset(id, &missing, &predictor, &repo).unwrap_err();
    assert!(matches!(err, BatchError::Load(_)));
    assert_eq!(repo.status(id).unwrap().unwrap().status, DatasetStatus::Error);
}

#[test]
fn test_no_model_leaves_status_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let store = ModelStore::new(dir.path().join("empty"));
    let handle = ModelHandle::from_store(&store);
    assert!(!handle.is_loaded());

    let repo = MemoryRepository::new();
    let data = write_file(dir.path(), "reference.csv", REFERENCE_CSV);
    let id = repo.register_dataset("reference.csv").unwrap();

    let err = process_dataset(id, &data, &BatchPredictor::new(handle), &repo).unwrap_err();
    assert!(matches!(err, BatchError::ModelUnavailable(ModelError::Unavailable)));
    assert_eq!(repo.status(id).unwrap().unwrap().status, DatasetStatus::Uploaded);
    assert!(repo.predictions(id).unwrap().is_empty());
}

#[test]
fn test_reload_picks_up_newer_model() {
    let dir = tempfile::tempdir().unwrap();
    let store = write_model(dir.path(), HandleUnknown::Ignore);
    let handle = ModelHandle::from_store(&store);
    let before = handle.current().unwrap();

    let always_fails = ModelFile {
        preprocessor: Preprocessor { numeric: vec!["Torque [Nm]".into()], categorical: vec![] },
        classifier: Classifier::DecisionTree { root: TreeNode::leaf(0.0, 1.0) },
    };
    let features = FeatureFile { features: vec!["Torque [Nm]".into()], ..Default::default() };
    store.write_artifact("20250101_000000", &always_fails, &features).unwrap();

    let after = handle.reload(&store).unwrap();
    assert_ne!(before.version, after.version);

    // A batch snapshot taken before the reload keeps the old model.
    assert_eq!(before.features.len(), 6);
    assert_eq!(after.features, vec![CanonicalFeature::Torque]);

    let data = write_file(dir.path(), "reference.csv", REFERENCE_CSV);
    let results = BatchPredictor::new(handle).predict_file(&data).unwrap();
    assert!(results.iter().all(|r| r.as_ref().unwrap().label == Label::Failure));
}

#[test]
fn test_concurrent_datasets_share_handle_and_repo() {
    let dir = tempfile::tempdir().unwrap();
    let store = write_model(dir.path(), HandleUnknown::Ignore);
    let handle = ModelHandle::from_store(&store);
    let predictor = BatchPredictor::new(handle.clone());
    let repo = SqliteRepository::in_memory().unwrap();

    let csv = write_file(dir.path(), "reference.csv", REFERENCE_CSV);
    let json = write_file(
        dir.path(),
        "drifted.json",
        r#"[{"product_id": "J1", "machine_type": "M", "air_temp": 298.0, "process_temp": 308.0,
             "rpm": 1500, "torque_nm": 70.0, "tool_wear": 10},
            {"product_id": "J2", "machine_type": "L", "air_temp": 298.0, "process_temp": 308.0,
             "rpm": 1500, "torque_nm": 30.0, "tool_wear": 10}]"#,
    );
    let csv_id = repo.register_dataset("reference.csv").unwrap();
    let json_id = repo.register_dataset("drifted.json").unwrap();

    thread::scope(|s| {
        let first = s.spawn(|| process_dataset(csv_id, &csv, &predictor, &repo));
        handle.reload(&store).unwrap();
        let second = s.spawn(|| process_dataset(json_id, &json, &predictor, &repo));

        assert_eq!(first.join().unwrap().unwrap().total, 4);
        let summary = second.join().unwrap().unwrap();
        assert_eq!((summary.total, summary.failures), (2, 1));
    });

    for (id, rows) in [(csv_id, 4), (json_id, 2)] {
        let state = repo.status(id).unwrap().unwrap();
        assert_eq!(state.status, DatasetStatus::Processed);
        let stored = repo.predictions(id).unwrap();
        assert_eq!(stored.len(), rows);
        assert!(stored.iter().all(|r| !r.is_error()));
    }
    let json_rows = repo.predictions(json_id).unwrap();
    assert_eq!(json_rows[0].product_id, "J1");
    assert_eq!(json_rows[0].prediction, "Failure");
}
