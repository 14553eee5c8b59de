// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves the trained classifier head with Burn's CompactRecorder.
//
// What gets written per run:
//   1. The final head record at `head_path` (recorder adds .mpk)
//   2. run_config.json next to it, the RetrainConfig that produced it
//   3. Optional intermediate heads while training:
//
//   <intermediate_dir>/
//     intermediate_100.mpk   ← head after step 100
//     intermediate_200.mpk
//     ...
//
// The recorder replaces everything after the last '.' of the
// file name with its own extension, so record names must not
// contain dots. Directory names may.

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::application::retrain_use_case::RetrainConfig;
use crate::ml::model::ClassifierHead;

pub const RUN_CONFIG_FILE: &str = "run_config.json";

pub struct CheckpointManager {
    head_path:        PathBuf,
    intermediate_dir: PathBuf,
}

impl CheckpointManager {
    /// Creates the directory that will hold the final head.
    pub fn new(head_path: impl Into<PathBuf>, intermediate_dir: impl Into<PathBuf>) -> Result<Self> {
        let head_path = head_path.into();
        let manager = Self { head_path, intermediate_dir: intermediate_dir.into() };
        fs::create_dir_all(manager.output_dir())
            .with_context(|| format!("Cannot create output directory '{}'", manager.output_dir().display()))?;
        Ok(manager)
    }

    pub fn head_path(&self) -> &Path {
        &self.head_path
    }

    /// Directory containing the head record and its run config.
    pub fn output_dir(&self) -> &Path {
        match self.head_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    pub fn save_head<B: Backend>(&self, head: &ClassifierHead<B>) -> Result<()> {
        record_head(head, &self.head_path)?;
        tracing::info!("Saved classifier head to '{}'", self.head_path.display());
        Ok(())
    }

    pub fn save_intermediate<B: Backend>(&self, head: &ClassifierHead<B>, step: usize) -> Result<PathBuf> {
        fs::create_dir_all(&self.intermediate_dir).with_context(|| {
            format!("Cannot create intermediate directory '{}'", self.intermediate_dir.display())
        })?;
        let path = self.intermediate_dir.join(format!("intermediate_{step}"));
        record_head(head, &path)?;
        tracing::info!("Save intermediate result to: '{}'", path.display());
        Ok(path)
    }

    pub fn save_config(&self, cfg: &RetrainConfig) -> Result<()> {
        let path = self.output_dir().join(RUN_CONFIG_FILE);
        let json = serde_json::to_string_pretty(cfg)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;

        tracing::debug!("Saved run config to '{}'", path.display());
        Ok(())
    }
}

fn record_head<B: Backend>(head: &ClassifierHead<B>, path: &Path) -> Result<()> {
    CompactRecorder::new()
        .record(head.clone().into_record(), path.to_path_buf())
        .with_context(|| format!("Failed to save classifier head to '{}'", path.display()))
}
