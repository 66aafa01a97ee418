use churn_clv_core::{
    artifacts::{ModelArtifacts, Threshold},
    dataset::Table,
    error::ScoreError,
    features::{FeatureSchema, FeatureVector},
    labeling::{label_file, label_table, APPENDED_COLUMNS},
    model::ChurnClassifier,
    scoring::ScoringContext,
    segment::ValueSegment,
};
use std::{fs, sync::Arc};

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Churn probability falls linearly with tenure, reaching 0 at 400 days.
struct TenureClassifier;

impl ChurnClassifier for TenureClassifier {
    fn name(&self) -> &str {
        "Tenure"
    }

    fn predict_probability(&self, row: &FeatureVector) -> f64 {
        1.0 - (row.as_slice()[3] / 400.0).min(1.0)
    }
}

fn context() -> ScoringContext {
    ScoringContext::new(ModelArtifacts::new(
        Arc::new(TenureClassifier),
        FeatureSchema::canonical(),
        Threshold::new(0.3).unwrap(),
    ))
}

const INPUT: &str = "\
CustomerID,country,avg_order_value,invoice_count,total_quantity,tenure_days,total_revenue
1,United Kingdom,100,5,20,400,2000
2,France,80,2,6,200,400
3,Germany,30,1,2,0,90
4,Spain,n/a,3,,300,-50
";

fn write_input(dir: &std::path::Path) -> std::path::PathBuf {
    let path = dir.join("customer_churn_ready.csv");
    fs::write(&path, INPUT).unwrap();
    path
}

fn table_headers() -> Vec<String> {
    INPUT.lines().next().unwrap().split(',').map(String::from).collect()
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// Each row gets a probability, a revenue-based raw CLV, and its segment.
#[test]
fn rows_are_labeled_from_revenue() {
    let dir = tempfile::tempdir().unwrap();
    let table = Table::read(write_input(dir.path())).unwrap();

    let rows = label_table(&table, &context(), "total_revenue").unwrap();

    assert_eq!(rows.len(), 4);
    // tenure 400: p=0, keeps all 2000.
    assert_eq!(rows[0].churn_probability, 0.0);
    assert_eq!(rows[0].final_clv, 2000.0);
    assert_eq!(rows[0].clv_segment, ValueSegment::High);
    // tenure 200: p=0.5, 400 → 200.
    assert_eq!(rows[1].final_clv, 200.0);
    assert_eq!(rows[1].clv_segment, ValueSegment::Mid);
    // tenure 0: p=1, nothing retained.
    assert_eq!(rows[2].final_clv, 0.0);
    assert_eq!(rows[2].clv_segment, ValueSegment::Low);
}

/// Unparsable feature cells coerce to 0 and negative revenue floors at 0.
#[test]
fn bad_cells_are_coerced_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let table = Table::read(write_input(dir.path())).unwrap();

    let rows = label_table(&table, &context(), "total_revenue").unwrap();

    assert_eq!(rows[3].raw_clv, 0.0);
    assert_eq!(rows[3].final_clv, 0.0);
    assert_eq!(rows[3].clv_segment, ValueSegment::Low);
}

/// The output keeps every input column and appends the CLV columns.
#[test]
fn output_file_appends_columns() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path());
    let output = dir.path().join("out").join("final_output.csv");

    let summary = label_file(&input, &output, &context(), "total_revenue").unwrap();

    assert_eq!(summary.rows, 4);
    assert_eq!(summary.segment_counts.get(&ValueSegment::High), Some(&1));
    assert_eq!(summary.segment_counts.get(&ValueSegment::Mid), Some(&1));
    assert_eq!(summary.segment_counts.get(&ValueSegment::Low), Some(&2));
    assert_eq!(summary.total_raw_clv, 2000.0 + 400.0 + 90.0);
    assert_eq!(summary.total_final_clv, 2000.0 + 200.0);

    let written = Table::read(&output).unwrap();
    assert_eq!(written.len(), 4);
    assert_eq!(&written.headers[..7], &table_headers()[..]);
    assert_eq!(&written.headers[7..], &APPENDED_COLUMNS.map(String::from)[..]);
    let segment_col = written.column("clv_segment").unwrap();
    assert_eq!(written.records[1].get(segment_col), Some("Mid Value"));
    assert_eq!(written.records[3].get(written.column("country").unwrap()), Some("Spain"));
}

/// A table without the revenue column cannot be labeled.
#[test]
fn missing_revenue_column_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("no_revenue.csv");
    fs::write(&path, "avg_order_value,invoice_count,total_quantity,tenure_days\n1,1,1,1\n").unwrap();
    let table = Table::read(&path).unwrap();

    match label_table(&table, &context(), "total_revenue") {
        Err(ScoreError::MissingColumns { missing }) => assert_eq!(missing, vec!["total_revenue"]),
        other => panic!("expected missing columns, got {other:?}"),
    }
}

/// A row missing its trailing cells keeps the appended columns under their headers.
#[test]
fn short_row_keeps_columns_aligned() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("ragged.csv");
    fs::write(
        &input,
        "CustomerID,avg_order_value,invoice_count,total_quantity,tenure_days,total_revenue,country\n\
         1,10,1,1,200,500,France\n\
         2,10,1,1,200,500\n",
    )
    .unwrap();
    let output = dir.path().join("final_output.csv");

    label_file(&input, &output, &context(), "total_revenue").unwrap();

    let written = Table::read(&output).unwrap();
    let prob = written.column("churn_probability").unwrap();
    let country = written.column("country").unwrap();
    for record in &written.records {
        assert_eq!(record.len(), written.headers.len());
        assert_eq!(record.get(prob), Some("0.5"));
    }
    assert_eq!(written.records[1].get(country), Some(""));
}

/// A row with more cells than the header is refused.
#[test]
fn long_row_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("long.csv");
    fs::write(
        &input,
        "avg_order_value,invoice_count,total_quantity,tenure_days,total_revenue\n1,1,1,1,1,extra\n",
    )
    .unwrap();

    assert!(Table::read(&input).is_err());
}
