//! Multi-stage pipeline shell.
//!
//! The download stage is the first of several processing stages; the shell
//! runs them in order and guarantees that the consolidated
//! `pipeline_completo.json` is written on the way out, whatever happened in
//! between. A fatal stage stops the sequence; a non-fatal one only logs.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{error, info, warn};

use crate::storage::ArtifactStore;

#[async_trait]
pub trait PipelineStage: Send + Sync {
    fn number(&self) -> usize;
    fn name(&self) -> &'static str;
    /// Whether a failure of this stage stops the pipeline.
    fn fatal(&self) -> bool {
        false
    }
    async fn run(&self) -> Result<()>;
}

#[derive(Debug, Serialize)]
struct StageOutcome {
    numero: usize,
    nombre: String,
    estado: String,
    duracion_segundos: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    /// The stage's own report, when it wrote a loadable one.
    #[serde(skip_serializing_if = "Option::is_none")]
    reporte: Option<JsonValue>,
}

pub struct Pipeline {
    stages: Vec<Box<dyn PipelineStage>>,
    storage: Arc<dyn ArtifactStore>,
    date_folder: String,
}

impl Pipeline {
    pub fn new(storage: Arc<dyn ArtifactStore>, date_folder: String) -> Self {
        Self {
            stages: Vec::new(),
            storage,
            date_folder,
        }
    }

    pub fn add_stage(mut self, stage: Box<dyn PipelineStage>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Runs every stage in order. The consolidated report is written before
    /// any stage error propagates.
    pub async fn run(&self) -> Result<()> {
        let mut outcomes = Vec::with_capacity(self.stages.len());
        let mut fatal_error = None;

        for stage in &self.stages {
            info!("▶️ Stage {} ({}) starting", stage.number(), stage.name());
            let start = Instant::now();
            let result = stage.run().await;
            let duracion = round2(start.elapsed().as_secs_f64());

            match result {
                Ok(()) => {
                    info!(
                        "✅ Stage {} ({}) finished in {:.1}s",
                        stage.number(),
                        stage.name(),
                        duracion
                    );
                    outcomes.push(self.outcome(stage.as_ref(), "completado", duracion, None).await);
                }
                Err(e) => {
                    let message = format!("{:#}", e);
                    outcomes.push(
                        self.outcome(stage.as_ref(), "fallido", duracion, Some(message.clone()))
                            .await,
                    );
                    if stage.fatal() {
                        error!("💥 Stage {} ({}) failed: {}", stage.number(), stage.name(), message);
                        fatal_error = Some(e);
                        break;
                    }
                    warn!(
                        "⚠️ Stage {} ({}) failed (non-fatal): {}",
                        stage.number(),
                        stage.name(),
                        message
                    );
                }
            }
        }

        self.write_consolidated(&outcomes).await;
        match fatal_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn outcome(
        &self,
        stage: &dyn PipelineStage,
        estado: &str,
        duracion_segundos: f64,
        error: Option<String>,
    ) -> StageOutcome {
        let report_file = format!("paso{}_{}.json", stage.number(), stage.name());
        let folder = format!("{}/reportes", self.date_folder);
        let reporte = self.storage.load_json(&report_file, &folder).await.ok();

        StageOutcome {
            numero: stage.number(),
            nombre: stage.name().to_string(),
            estado: estado.to_string(),
            duracion_segundos,
            error,
            reporte,
        }
    }

    async fn write_consolidated(&self, outcomes: &[StageOutcome]) {
        let all_ok = outcomes.iter().all(|o| o.estado == "completado");
        let consolidated = serde_json::json!({
            "timestamp": chrono::Local::now().to_rfc3339(),
            "fecha": self.date_folder,
            "estado_global": if all_ok { "completado" } else { "fallido" },
            "etapas": outcomes,
        });

        let folder = format!("{}/reportes", self.date_folder);
        if let Err(e) = self
            .storage
            .save_json(&consolidated, "pipeline_completo.json", &folder)
            .await
        {
            error!("💥 Could not write the consolidated pipeline report: {}", e);
        } else {
            info!(
                "📝 Pipeline report saved to {}",
                self.storage.path_for("pipeline_completo.json", &folder)
            );
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
