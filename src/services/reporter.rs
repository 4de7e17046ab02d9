//! Run report generation.
//!
//! Builds the download stage's JSON report (Spanish keys, consumed by the
//! downstream transformation stages and dashboards) and renders the console
//! summary. Aggregation is pure so it can be tested without a run.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::info;

use crate::config::Config;
use crate::models::{DownloadFailure, DownloadSuccess, RunResults};
use crate::utils::truncate_text;

/// How many failures the console summary lists before eliding.
const MAX_CONSOLE_FAILURES: usize = 10;

#[derive(Debug, Serialize, Deserialize)]
pub struct RunReport {
    pub metadata: Metadata,
    pub configuracion: Configuracion,
    pub resumen: Resumen,
    pub tiempos: Tiempos,
    pub datos: Datos,
    pub datasets_exitosos: Vec<DownloadSuccess>,
    pub datasets_fallidos: Vec<DownloadFailure>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Metadata {
    pub timestamp: String,
    pub version: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Configuracion {
    pub workers: usize,
    pub timeout: u64,
    pub delay: f64,
    pub headless: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Resumen {
    pub total: usize,
    pub exitosos: usize,
    pub fallidos: usize,
    pub reintentos_exitosos: usize,
    pub tasa_exito: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Tiempos {
    pub total: f64,
    pub promedio: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Datos {
    pub total_bytes: u64,
    pub promedio_kb: f64,
}

impl RunReport {
    /// Aggregates one run into the report schema. `elapsed_seconds` is the
    /// wall-clock duration of the whole download stage.
    pub fn build(results: &RunResults, config: &Config, elapsed_seconds: f64) -> Self {
        let exitosos = results.successes.len();
        let fallidos = results.failures.len();
        let total = exitosos + fallidos;
        let reintentos_exitosos = results.successes.iter().filter(|s| s.retried).count();

        let tasa_exito = if total == 0 {
            0.0
        } else {
            round2(exitosos as f64 / total as f64 * 100.0)
        };

        let times: Vec<f64> = results.successes.iter().map(|s| s.elapsed_seconds).collect();
        let (min, max, promedio) = if times.is_empty() {
            (0.0, 0.0, 0.0)
        } else {
            let min = times.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = times.iter().cloned().fold(0.0, f64::max);
            let avg = times.iter().sum::<f64>() / times.len() as f64;
            (round2(min), round2(max), round2(avg))
        };

        let total_bytes: u64 = results.successes.iter().map(|s| s.byte_size).sum();
        let promedio_kb = if exitosos == 0 {
            0.0
        } else {
            round2(total_bytes as f64 / 1024.0 / exitosos as f64)
        };

        RunReport {
            metadata: Metadata {
                timestamp: chrono::Local::now().to_rfc3339(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            configuracion: Configuracion {
                workers: config.max_concurrent_browsers,
                timeout: config.download_timeout_secs,
                delay: config.delay_between_downloads_secs,
                headless: config.headless,
            },
            resumen: Resumen {
                total,
                exitosos,
                fallidos,
                reintentos_exitosos,
                tasa_exito,
            },
            tiempos: Tiempos {
                total: round2(elapsed_seconds),
                promedio,
                min,
                max,
            },
            datos: Datos {
                total_bytes,
                promedio_kb,
            },
            datasets_exitosos: results.successes.clone(),
            datasets_fallidos: results.failures.clone(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<JsonValue> {
        serde_json::to_value(self)
    }

    /// The final console summary.
    pub fn render_console(&self) {
        info!("{}", "=".repeat(60));
        info!("📊 Download stage finished");
        info!(
            "   Datasets: {} total | {} ✓ | {} ✗ | {:.1}% success",
            self.resumen.total,
            self.resumen.exitosos,
            self.resumen.fallidos,
            self.resumen.tasa_exito
        );
        if self.resumen.reintentos_exitosos > 0 {
            info!(
                "   Recovered on retry: {}",
                self.resumen.reintentos_exitosos
            );
        }
        info!(
            "   Time: {:.1}s total | {:.1}s avg | {:.1}s min | {:.1}s max",
            self.tiempos.total, self.tiempos.promedio, self.tiempos.min, self.tiempos.max
        );
        info!(
            "   Data: {:.1} MB | {:.1} KB avg",
            self.datos.total_bytes as f64 / 1_048_576.0,
            self.datos.promedio_kb
        );

        if !self.datasets_fallidos.is_empty() {
            info!("   Failed datasets:");
            for failure in self.datasets_fallidos.iter().take(MAX_CONSOLE_FAILURES) {
                info!(
                    "     ✗ {} [{}]: {}",
                    failure.display_name,
                    failure.failed_step,
                    truncate_text(&failure.error_message, 80)
                );
            }
            if self.datasets_fallidos.len() > MAX_CONSOLE_FAILURES {
                info!(
                    "     ... and {} more",
                    self.datasets_fallidos.len() - MAX_CONSOLE_FAILURES
                );
            }
        }
        info!("{}", "=".repeat(60));
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
