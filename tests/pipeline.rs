use async_trait::async_trait;
use community_analytics::analyzers::aggregate::Aggregator;
use community_analytics::analyzers::keys::{KeyFields, KeyResolver};
use community_analytics::config::{AnalyticsConfig, Dataset};
use community_analytics::errors::RetrievalError;
use community_analytics::fetch::{DataSource, DatasetLoader, DirectorySource, FetchPolicy};
use community_analytics::output::ReportWriter;
use community_analytics::record::Record;
use community_analytics::tools::{self, Tool, business_deserts, permit_hotspots};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

const PERMITS: &str = "c2es-76ed";
const ASSESSMENTS: &str = "4bsw-nn7w";
const CRIME: &str = "78gh-n26t";
const DEMOGRAPHICS: &str = "rkfr-buzb";

fn write_dataset(dir: &Path, id: &str, rows: Value) {
    std::fs::write(dir.join(format!("{id}.json")), rows.to_string()).unwrap();
}

fn records(rows: Value) -> Vec<Record> {
    serde_json::from_value(rows).unwrap()
}

fn permits() -> Value {
    let mut rows = Vec::new();
    for month in 1..=12 {
        rows.push(json!({
            "communityname": "Beltline",
            "estprojectcost": "100000",
            "permitclassmapped": "Residential",
            "applieddate": format!("2023-{month:02}-10T00:00:00.000"),
            "latitude": "51.0486",
            "longitude": "-114.0625",
        }));
    }
    for _ in 0..4 {
        rows.push(json!({
            "communityname": "Hillhurst",
            "estprojectcost": 250000,
            "permitclassmapped": "Commercial",
            "applieddate": "2023-12-01",
            "latitude": 51.0536,
            "longitude": -114.0866,
        }));
    }
    Value::Array(rows)
}

fn assessments() -> Value {
    let mut rows = Vec::new();
    for _ in 0..12 {
        rows.push(json!({"comm_name": "Beltline", "assessed_value": "300000"}));
        rows.push(json!({"comm_name": "Hillhurst", "assessed_value": "650000"}));
    }
    Value::Array(rows)
}

fn crime() -> Value {
    json!([
        {"community": "BLN", "category": "Theft FROM Vehicle", "crime_count": "9", "year": "2023"},
        {"community": "BLN", "category": "Street Robbery", "crime_count": "2", "year": "2023"},
        {"community": "HIL", "category": "Theft FROM Vehicle", "crime_count": "1", "year": "2023"},
        {"community": "HIL", "category": "Theft FROM Vehicle", "crime_count": "40", "year": "2015"},
    ])
}

fn demographics() -> Value {
    json!([
        {"name": "Beltline", "comm_code": "BLN", "res_cnt": "25000"},
        {"name": "Hillhurst", "comm_code": "HIL", "res_cnt": "6500"},
    ])
}

fn snapshot(dir: &Path) {
    write_dataset(dir, PERMITS, permits());
    write_dataset(dir, ASSESSMENTS, assessments());
    write_dataset(dir, CRIME, crime());
    write_dataset(dir, DEMOGRAPHICS, demographics());
}

/// Counts fetches per dataset id.
struct Counting<S> {
    inner: S,
    calls: Mutex<HashMap<String, usize>>,
}

impl<S> Counting<S> {
    fn new(inner: S) -> Self {
        Self {
            inner,
            calls: Mutex::new(HashMap::new()),
        }
    }

    fn calls(&self, dataset_id: &str) -> usize {
        self.calls.lock().unwrap().get(dataset_id).copied().unwrap_or(0)
    }
}

#[async_trait]
impl<S: DataSource> DataSource for Counting<S> {
    async fn fetch(&self, dataset_id: &str, limit: usize) -> Result<Vec<Record>, RetrievalError> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(dataset_id.to_string())
            .or_default() += 1;
        self.inner.fetch(dataset_id, limit).await
    }
}

#[test]
fn test_beltline_aggregation_and_permit_gate() {
    let permits = records(json!([
        {"communityname": "Beltline", "estprojectcost": "100000"},
        {"communityname": "Beltline", "estprojectcost": "50000"},
        {"communityname": "Unknown"},
    ]));
    let assessments = records(Value::Array(
        (0..12)
            .map(|_| json!({"comm_name": "Beltline", "assessed_value": "300000"}))
            .collect(),
    ));

    let permit_aggs = Aggregator::new(KeyResolver::new(KeyFields::PERMITS))
        .sum("estprojectcost")
        .run(&permits);
    let beltline = permit_aggs.get("Beltline").unwrap();
    assert_eq!(beltline.count(), 2);
    assert_eq!(beltline.sum("estprojectcost"), 150000.0);
    assert_eq!(permit_aggs.len(), 1);

    let assessment_aggs = Aggregator::new(KeyResolver::new(KeyFields::ASSESSMENTS))
        .sum("assessed_value")
        .run(&assessments);
    let beltline = assessment_aggs.get("Beltline").unwrap();
    assert_eq!(beltline.count(), 12);
    assert_eq!(beltline.avg("assessed_value"), 300000.0);

    let ranked = permit_hotspots::analyze(&permits, &assessments, &AnalyticsConfig::default());
    assert!(ranked.is_empty());
}

#[tokio::test]
async fn test_key_reconciliation_through_snapshots() {
    let dir = tempfile::tempdir().unwrap();
    snapshot(dir.path());
    let source = DirectorySource::new(dir.path());
    let config = AnalyticsConfig::default();
    let mut loader = DatasetLoader::new(&source, &config.datasets);

    let permits = loader.load(Dataset::Permits, FetchPolicy::Abort).await.unwrap();
    let demographics = loader
        .load(Dataset::Demographics, FetchPolicy::Abort)
        .await
        .unwrap();

    let ranked = business_deserts::analyze(&permits, &demographics, &config);
    let hillhurst = ranked
        .all()
        .iter()
        .find(|r| r.community == "Hillhurst")
        .unwrap();
    assert_eq!(hillhurst.population, 6500);
    assert_eq!(hillhurst.commercial_permits, 4);
}

#[tokio::test]
async fn test_all_tools_write_every_report_with_one_fetch_per_dataset() {
    let data = tempfile::tempdir().unwrap();
    snapshot(data.path());
    let out = tempfile::tempdir().unwrap();
    let out_dir = out.path().join("reports");

    let source = Counting::new(DirectorySource::new(data.path()));
    let config = AnalyticsConfig::default();
    let mut loader = DatasetLoader::new(&source, &config.datasets);

    let files = tools::run_all(&Tool::ALL, &mut loader, &config).await.unwrap();
    let written = ReportWriter::new(&out_dir).write_all(&files).unwrap();
    assert_eq!(written.len(), 22);

    for id in [PERMITS, ASSESSMENTS, CRIME, DEMOGRAPHICS] {
        assert_eq!(source.calls(id), 1, "{id} fetched more than once");
    }

    for name in [
        "permit_hotspots.json",
        "investment_targets.csv",
        "crime_value_analysis.json",
        "opportunities.csv",
        "construction_velocity.json",
        "tod_hotspots.json",
        "gentrification_scores.json",
        "recommendations.txt",
        "crime_dashboard_data.json",
        "crime_dashboard.html",
    ] {
        assert!(out_dir.join(name).is_file(), "{name} missing");
    }
    let leftovers = std::fs::read_dir(&out_dir)
        .unwrap()
        .filter(|e| {
            e.as_ref()
                .unwrap()
                .path()
                .extension()
                .is_some_and(|ext| ext == "tmp")
        })
        .count();
    assert_eq!(leftovers, 0);

    let hotspots: Value =
        serde_json::from_str(&std::fs::read_to_string(out_dir.join("permit_hotspots.json")).unwrap())
            .unwrap();
    let communities: Vec<&str> = hotspots
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["community"].as_str().unwrap())
        .collect();
    assert_eq!(communities, ["Beltline", "Hillhurst"]);

    // Crime codes resolve to names; the 2015 Hillhurst records are dropped.
    let signals: Value = serde_json::from_str(
        &std::fs::read_to_string(out_dir.join("crime_value_analysis.json")).unwrap(),
    )
    .unwrap();
    let hillhurst = signals
        .as_array()
        .unwrap()
        .iter()
        .find(|row| row["community"] == "Hillhurst")
        .unwrap();
    assert_eq!(hillhurst["crime_count"], 1);

    let dashboard: Value = serde_json::from_str(
        &std::fs::read_to_string(out_dir.join("crime_dashboard_data.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(dashboard["total_crimes"], 52);
    assert_eq!(dashboard["communities"][0]["community"], "Hillhurst");
}

#[tokio::test]
async fn test_failed_fetch_writes_nothing() {
    let data = tempfile::tempdir().unwrap();
    snapshot(data.path());
    std::fs::remove_file(data.path().join(format!("{CRIME}.json"))).unwrap();
    let out = tempfile::tempdir().unwrap();
    let out_dir = out.path().join("reports");

    let source = DirectorySource::new(data.path());
    let config = AnalyticsConfig::default();
    let mut loader = DatasetLoader::new(&source, &config.datasets);

    let err = match tools::run_all(&Tool::ALL, &mut loader, &config).await {
        Ok(files) => {
            ReportWriter::new(&out_dir).write_all(&files).unwrap();
            panic!("run should fail without the crime dataset");
        }
        Err(err) => err,
    };
    let retrieval = err.downcast_ref::<RetrievalError>().unwrap();
    assert_eq!(retrieval.dataset(), CRIME);
    assert!(!out_dir.exists());
}

#[tokio::test]
async fn test_cross_analyze_degrades_on_missing_datasets() {
    let data = tempfile::tempdir().unwrap();
    write_dataset(data.path(), PERMITS, permits());

    let source = DirectorySource::new(data.path());
    let config = AnalyticsConfig::default();
    let mut loader = DatasetLoader::new(&source, &config.datasets);

    let files = tools::run(Tool::CrossAnalyze, &mut loader, &config).await.unwrap();
    let correlations = files
        .iter()
        .find(|f| f.name() == "correlations.json")
        .unwrap();
    let rows: Value = serde_json::from_str(correlations.contents()).unwrap();
    assert_eq!(rows[0]["community"], "Beltline");
    assert_eq!(rows[0]["permits"], 12);
    assert_eq!(rows[0]["crime"], 0);
}
