use churn_clv_core::{
    error::ScoreError,
    store::{ExperimentStore, RunStatus},
};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn store() -> ExperimentStore {
    let store = ExperimentStore::in_memory().unwrap();
    store.migrate().unwrap();
    store
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// A started run is visible as running until finished.
#[test]
fn run_lifecycle() {
    let store = store();
    let run_id = store.start_run("Churn_Prediction_CLV", "tuned").unwrap();

    let run = store.get_run(&run_id).unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Running);
    assert!(run.finished_at.is_none());

    store.finish_run(&run_id, RunStatus::Finished).unwrap();
    let run = store.get_run(&run_id).unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Finished);
    assert!(run.finished_at.is_some());
}

/// Logging the same key twice keeps the latest value.
#[test]
fn params_and_metrics_upsert() {
    let store = store();
    let run_id = store.start_run("exp", "run").unwrap();

    store.log_param(&run_id, "max_depth", "3").unwrap();
    store.log_param(&run_id, "max_depth", "4").unwrap();
    store.log_metric(&run_id, "roc_auc", 0.71).unwrap();
    store.log_metric(&run_id, "roc_auc", 0.74).unwrap();
    store.log_metric(&run_id, "recall_tuned", 0.62).unwrap();

    assert_eq!(store.run_params(&run_id).unwrap(), vec![("max_depth".to_string(), "4".to_string())]);
    assert_eq!(store.run_metric(&run_id, "roc_auc").unwrap(), Some(0.74));
    assert_eq!(store.run_metric(&run_id, "precision_tuned").unwrap(), None);
    assert_eq!(store.run_metrics(&run_id).unwrap().len(), 2);
}

/// Runs are listed per experiment in start order.
#[test]
fn runs_are_grouped_by_experiment() {
    let store = store();
    let a = store.start_run("exp-a", "first").unwrap();
    let b = store.start_run("exp-a", "second").unwrap();
    store.start_run("exp-b", "other").unwrap();

    let runs: Vec<String> = store.runs_for_experiment("exp-a").unwrap().into_iter().map(|r| r.run_id).collect();
    assert_eq!(runs, vec![a, b]);
    assert!(store.runs_for_experiment("missing").unwrap().is_empty());
}

/// Finishing an unknown run is an error, not a silent no-op.
#[test]
fn finishing_unknown_run_fails() {
    let store = store();
    assert!(matches!(
        store.finish_run("nope", RunStatus::Failed),
        Err(ScoreError::RunNotFound { .. })
    ));
    assert!(store.get_run("nope").unwrap().is_none());
}

/// Metrics for a run that does not exist violate the foreign key.
#[test]
fn metric_for_unknown_run_is_rejected() {
    let store = store();
    assert!(matches!(
        store.log_metric("nope", "roc_auc", 0.5),
        Err(ScoreError::Database(_))
    ));
}

/// A file-backed store persists runs across reopen.
#[test]
fn file_store_persists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("runs.db").display().to_string();

    let run_id = {
        let store = ExperimentStore::open(&path).unwrap();
        store.migrate().unwrap();
        let id = store.start_run("exp", "run").unwrap();
        store.log_artifact(&id, "churn_model.json", "models/churn_model.json").unwrap();
        id
    };

    let store = ExperimentStore::open(&path).unwrap();
    store.migrate().unwrap();
    assert!(store.get_run(&run_id).unwrap().is_some());
    assert_eq!(
        store.run_artifacts(&run_id).unwrap(),
        vec![("churn_model.json".to_string(), "models/churn_model.json".to_string())]
    );
}
