// ============================================================
// Layer 6 — Sweep Report
// ============================================================
// One CSV row per (architecture, percentage, learning rate,
// training steps) run. Rows are flushed as they are written so
// a long sweep can be inspected while it runs.
//
// Example output:
//   NO,model name,percent test,learning rate,training step,train accuracy,cross entropy,validation accuracy,final test accuracy,time
//   1,mobilenet_v1_1.0_224,10,0.0001,100,92.00,0.31,88.00,87.50,12.34
//
// Accuracies are percentages with two decimals; a metric that
// was never measured (no eval step, empty test set) is left blank.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, File},
    path::{Path, PathBuf},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepRow {
    #[serde(rename = "NO")]
    pub no: usize,
    #[serde(rename = "model name")]
    pub model_name: String,
    #[serde(rename = "percent test")]
    pub percent_test: String,
    #[serde(rename = "learning rate")]
    pub learning_rate: String,
    #[serde(rename = "training step")]
    pub training_step: usize,
    #[serde(rename = "train accuracy")]
    pub train_accuracy: Option<String>,
    #[serde(rename = "cross entropy")]
    pub cross_entropy: Option<String>,
    #[serde(rename = "validation accuracy")]
    pub validation_accuracy: Option<String>,
    #[serde(rename = "final test accuracy")]
    pub final_test_accuracy: Option<String>,
    /// Wall-clock seconds, rounded to two decimals
    pub time: f64,
}

/// Shortest decimal form, as in run names: `10.0` → `"10"`, `0.0001` → `"0.0001"`.
pub fn format_number(value: f64) -> String {
    format!("{value}")
}

/// `0.875` → `"87.50"`
pub fn format_percent(fraction: Option<f64>) -> Option<String> {
    fraction.map(|f| format!("{:.2}", f * 100.0))
}

pub fn format_value(value: Option<f64>) -> Option<String> {
    value.map(|v| format!("{v:.2}"))
}

pub fn round_seconds(seconds: f64) -> f64 {
    (seconds * 100.0).round() / 100.0
}

pub struct SweepReport {
    writer:  csv::Writer<File>,
    path:    PathBuf,
    next_no: usize,
}

impl SweepReport {
    /// Truncates `path`; the header is written with the first row.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let writer = csv::Writer::from_path(&path)
            .with_context(|| format!("Cannot create report '{}'", path.display()))?;
        tracing::debug!("Created sweep report: '{}'", path.display());
        Ok(Self { writer, path, next_no: 1 })
    }

    /// Numbers the row and appends it. Returns the assigned number.
    pub fn append(&mut self, mut row: SweepRow) -> Result<usize> {
        row.no = self.next_no;
        self.writer
            .serialize(&row)
            .with_context(|| format!("Cannot write row {} to '{}'", row.no, self.path.display()))?;
        self.writer.flush()?;
        self.next_no += 1;
        Ok(row.no)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
