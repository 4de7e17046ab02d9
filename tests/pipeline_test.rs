//! End-to-end orchestration tests with a scripted download driver.
//!
//! These exercise pool, retry, report and pipeline behavior without a
//! browser: each dataset id is scripted with a sequence of outcomes, and the
//! driver replays them attempt by attempt.

use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use ine_scraper::config::Config;
use ine_scraper::models::{
    DownloadFailure, DownloadResult, DownloadSuccess, DownloadTask, Step,
};
use ine_scraper::orchestrator::pipeline::{Pipeline, PipelineStage};
use ine_scraper::orchestrator::scrape_stage::ScrapeStage;
use ine_scraper::storage::{local::LocalStore, ArtifactStore};
use ine_scraper::workflow::{DownloadDriver, DownloadSession};

const DATE_FOLDER: &str = "01-01-2026";

/// What one attempt on a dataset should produce.
#[derive(Clone)]
enum Outcome {
    Succeed,
    FailAt(Step),
}

/// Scripted driver: per dataset id, a sequence of outcomes replayed across
/// attempts. The last outcome repeats when attempts outrun the script.
struct ScriptedDriver {
    scripts: Arc<HashMap<String, Vec<Outcome>>>,
    attempts: Arc<Mutex<HashMap<String, usize>>>,
    sessions_opened: AtomicUsize,
    fail_session_open: bool,
}

impl ScriptedDriver {
    fn new(scripts: HashMap<String, Vec<Outcome>>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Arc::new(scripts),
            attempts: Arc::new(Mutex::new(HashMap::new())),
            sessions_opened: AtomicUsize::new(0),
            fail_session_open: false,
        })
    }

    fn broken() -> Arc<Self> {
        Arc::new(Self {
            scripts: Arc::new(HashMap::new()),
            attempts: Arc::new(Mutex::new(HashMap::new())),
            sessions_opened: AtomicUsize::new(0),
            fail_session_open: true,
        })
    }
}

#[async_trait]
impl DownloadDriver for ScriptedDriver {
    async fn open_session(
        &self,
        worker_id: usize,
    ) -> anyhow::Result<Box<dyn DownloadSession>> {
        if self.fail_session_open {
            anyhow::bail!("no browser available");
        }
        self.sessions_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedSession {
            scripts: Arc::clone(&self.scripts),
            attempts: Arc::clone(&self.attempts),
            worker_id,
        }))
    }
}

struct ScriptedSession {
    scripts: Arc<HashMap<String, Vec<Outcome>>>,
    attempts: Arc<Mutex<HashMap<String, usize>>>,
    worker_id: usize,
}

#[async_trait]
impl DownloadSession for ScriptedSession {
    async fn download(&mut self, task: &DownloadTask) -> DownloadResult {
        let id = task.dataset.id.clone();
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            let entry = attempts.entry(id.clone()).or_insert(0);
            *entry += 1;
            *entry
        };
        let outcome = match self.scripts.get(&id) {
            Some(script) => script
                .get(attempt - 1)
                .or_else(|| script.last())
                .cloned()
                .unwrap_or(Outcome::Succeed),
            None => Outcome::Succeed,
        };

        match outcome {
            Outcome::Succeed => DownloadResult::Success(DownloadSuccess {
                dataset_id: id.clone(),
                display_name: task.dataset.nombre.clone(),
                stored_filename: task.dataset.stored_filename(),
                stored_path: format!("{}/raw/{}", DATE_FOLDER, task.dataset.stored_filename()),
                category: task.dataset.categoria.clone(),
                byte_size: 2048,
                size_kb: 2.0,
                elapsed_seconds: 0.5,
                worker_id: self.worker_id,
                retried: false,
                previous_error: None,
            }),
            Outcome::FailAt(step) => DownloadResult::Failure(DownloadFailure {
                dataset_id: id,
                display_name: task.dataset.nombre.clone(),
                source_url: task.dataset.url.clone(),
                category: task.dataset.categoria.clone(),
                error_message: format!("scripted failure at {}", step),
                failed_step: step,
                elapsed_seconds: 0.5,
                worker_id: self.worker_id,
                retried: false,
            }),
        }
    }

    async fn close(&mut self) {}
}

struct Harness {
    _dir: TempDir,
    config: Config,
    storage: Arc<dyn ArtifactStore>,
}

fn harness(dataset_count: usize, workers: usize) -> Harness {
    let dir = TempDir::new().expect("temp dir");
    let catalog_path = dir.path().join("catalog.json");
    let entries: Vec<String> = (1..=dataset_count)
        .map(|i| {
            format!(
                r#"{{"id": "d{i}", "url": "https://example.test/d{i}", "nombre": "Dataset {i}", "categoria": "cat{i}"}}"#
            )
        })
        .collect();
    let mut file = std::fs::File::create(&catalog_path).expect("catalog file");
    write!(file, "[{}]", entries.join(",")).expect("write catalog");

    let output_dir = dir.path().join("outputs");
    let config = Config {
        max_concurrent_browsers: workers,
        delay_between_downloads_secs: 0.0,
        catalog_path: catalog_path.to_string_lossy().to_string(),
        output_dir: output_dir.to_string_lossy().to_string(),
        ..Config::default()
    };
    let storage: Arc<dyn ArtifactStore> = Arc::new(LocalStore::new(&config.output_dir));
    Harness {
        _dir: dir,
        config,
        storage,
    }
}

async fn run_stage(
    harness: &Harness,
    driver: Arc<dyn DownloadDriver>,
) -> anyhow::Result<serde_json::Value> {
    let stage = ScrapeStage::new(
        harness.config.clone(),
        Arc::clone(&harness.storage),
        driver,
        DATE_FOLDER.to_string(),
    );
    let result = stage.run().await;
    let report = harness
        .storage
        .load_json("paso1_scraper.json", &format!("{}/reportes", DATE_FOLDER))
        .await
        .expect("the report must exist even after a failed stage");
    result.map(|_| report)
}

#[tokio::test]
async fn all_successes_fill_the_report() {
    let h = harness(5, 2);
    let driver = ScriptedDriver::new(HashMap::new());
    let report = run_stage(&h, Arc::clone(&driver) as Arc<dyn DownloadDriver>)
        .await
        .expect("stage");

    assert_eq!(
        driver.sessions_opened.load(Ordering::SeqCst),
        2,
        "one session per worker, no retry pass"
    );
    assert_eq!(report["resumen"]["total"], 5);
    assert_eq!(report["resumen"]["exitosos"], 5);
    assert_eq!(report["resumen"]["fallidos"], 0);
    assert_eq!(report["resumen"]["tasa_exito"], 100.0);
    assert_eq!(report["datasets_exitosos"].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn worker_count_does_not_change_the_result_set() {
    let mut scripts = HashMap::new();
    scripts.insert("d2".to_string(), vec![Outcome::FailAt(Step::ModalAccess)]);

    let mut id_sets = Vec::new();
    for workers in [1, 4] {
        let h = harness(6, workers);
        let driver = ScriptedDriver::new(scripts.clone());
        let report = run_stage(&h, driver).await.expect("stage");

        let mut ids: Vec<String> = report["datasets_exitosos"]
            .as_array()
            .unwrap()
            .iter()
            .chain(report["datasets_fallidos"].as_array().unwrap().iter())
            .map(|r| r["dataset_id"].as_str().unwrap().to_string())
            .collect();
        ids.sort();
        assert_eq!(ids.len(), 6, "exactly one result per dataset");
        id_sets.push(ids);
    }
    assert_eq!(id_sets[0], id_sets[1]);
}

#[tokio::test]
async fn transient_failure_recovers_on_the_retry_pass() {
    let mut scripts = HashMap::new();
    scripts.insert(
        "d2".to_string(),
        vec![Outcome::FailAt(Step::ButtonSearch), Outcome::Succeed],
    );

    let h = harness(3, 2);
    let driver = ScriptedDriver::new(scripts);
    let report = run_stage(&h, driver).await.expect("stage");

    assert_eq!(report["resumen"]["exitosos"], 3);
    assert_eq!(report["resumen"]["fallidos"], 0);
    assert_eq!(report["resumen"]["reintentos_exitosos"], 1);

    let recovered = report["datasets_exitosos"]
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["dataset_id"] == "d2")
        .expect("d2 recovered");
    assert_eq!(recovered["retried"], true);
    assert_eq!(
        recovered["previous_error"],
        "scripted failure at button_search"
    );
    assert_eq!(
        recovered["category"], "cat2",
        "the retry pass must not lose the catalog category"
    );
}

#[tokio::test]
async fn retry_never_touches_datasets_that_already_succeeded() {
    let mut scripts = HashMap::new();
    scripts.insert("d2".to_string(), vec![Outcome::FailAt(Step::Download)]);

    let h = harness(3, 2);
    let driver = ScriptedDriver::new(scripts);
    let _ = run_stage(&h, Arc::clone(&driver) as Arc<dyn DownloadDriver>)
        .await
        .expect("stage");

    let attempts = driver.attempts.lock().unwrap();
    assert_eq!(attempts["d1"], 1);
    assert_eq!(attempts["d2"], 2, "only the failure is re-attempted");
    assert_eq!(attempts["d3"], 1);
}

#[tokio::test]
async fn permanent_failure_keeps_its_step_and_retried_flag() {
    let mut scripts = HashMap::new();
    scripts.insert("d1".to_string(), vec![Outcome::FailAt(Step::ModalAccess)]);

    let h = harness(1, 1);
    let driver = ScriptedDriver::new(scripts);
    let report = run_stage(&h, driver).await.expect("stage");

    assert_eq!(report["resumen"]["fallidos"], 1);
    let failure = &report["datasets_fallidos"][0];
    assert_eq!(failure["failed_step"], "modal_access");
    assert_eq!(failure["retried"], true);
    assert_eq!(report["resumen"]["tasa_exito"], 0.0);
}

#[tokio::test]
async fn stale_artifacts_from_the_same_date_are_removed_before_the_run() {
    let h = harness(2, 1);
    let raw_folder = format!("{}/raw", DATE_FOLDER);
    h.storage
        .save(b"stale bytes", "Dataset_old.csv", &raw_folder)
        .await
        .expect("seed stale artifact");

    let driver = ScriptedDriver::new(HashMap::new());
    let report = run_stage(&h, driver).await.expect("stage");

    assert_eq!(report["resumen"]["exitosos"], 2);
    let stale = h.storage.load("Dataset_old.csv", &raw_folder).await;
    assert!(
        stale.is_err(),
        "artifacts from an earlier run on the same date must be deleted"
    );
}

#[tokio::test]
async fn dead_pool_still_writes_a_report_and_fails_the_stage() {
    let h = harness(4, 2);
    let driver = ScriptedDriver::broken();
    let err = run_stage(&h, driver).await;

    assert!(err.is_err(), "the stage must propagate the pool abort");
    // The report itself was asserted inside run_stage.
}

#[tokio::test]
async fn pipeline_writes_the_consolidated_report() {
    let h = harness(2, 1);
    let driver = ScriptedDriver::new(HashMap::new());
    let stage = ScrapeStage::new(
        h.config.clone(),
        Arc::clone(&h.storage),
        driver,
        DATE_FOLDER.to_string(),
    );

    Pipeline::new(Arc::clone(&h.storage), DATE_FOLDER.to_string())
        .add_stage(Box::new(stage))
        .run()
        .await
        .expect("pipeline");

    let consolidated = h
        .storage
        .load_json(
            "pipeline_completo.json",
            &format!("{}/reportes", DATE_FOLDER),
        )
        .await
        .expect("consolidated report");
    assert_eq!(consolidated["estado_global"], "completado");
    let etapas = consolidated["etapas"].as_array().unwrap();
    assert_eq!(etapas.len(), 1);
    assert_eq!(etapas[0]["nombre"], "scraper");
    assert_eq!(etapas[0]["estado"], "completado");
    assert!(etapas[0]["reporte"]["resumen"].is_object());
}
