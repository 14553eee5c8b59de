// ============================================================
// Layer 2 — SweepUseCase
// ============================================================
// Runs RetrainUseCase's pipeline over a hyperparameter grid:
//
//   for architecture       (backbone loaded once)
//     for percentage       (testing = validation = p, re-partitioned)
//       for learning rate
//         for training steps   → one fresh head, one CSV row
//
// Each run writes its head and run_config.json into
//   <output_dir>/retrained_<arch>-PT<p>-LR<lr>-TS<steps>/

use anyhow::Result;
use burn::tensor::backend::AutodiffBackend;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::application::retrain_use_case::{retrain_with, RetrainConfig};
use crate::domain::{architecture::ArchitectureProfile, traits::FeatureExtractor};
use crate::infra::report::{format_number, format_percent, format_value, round_seconds, SweepReport, SweepRow};
use crate::ml::{
    backbone::BackboneExtractor,
    trainer::{InferenceBackend, TrainingBackend},
};

pub const HEAD_FILE_NAME: &str = "retrained_head";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Shared settings; the swept fields are overridden per run
    pub base:            RetrainConfig,
    pub architectures:   Vec<String>,
    pub percentages:     Vec<f64>,
    pub learning_rates:  Vec<f64>,
    pub training_steps:  Vec<usize>,
    pub output_dir:      String,
    pub report_path:     String,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            base: RetrainConfig::default(),
            architectures: vec![
                "mobilenet_v1_1.0_224".to_string(),
                "mobilenet_v2_1.4_224".to_string(),
                "inception_v3".to_string(),
            ],
            percentages:    vec![10.0],
            learning_rates: vec![0.0001],
            training_steps: vec![100],
            output_dir:     "output/sweep".to_string(),
            report_path:    "output/sweep/tests.csv".to_string(),
        }
    }
}

impl SweepConfig {
    pub fn run_name(architecture: &str, percentage: f64, learning_rate: f64, steps: usize) -> String {
        format!("retrained_{architecture}-PT{percentage}-LR{learning_rate}-TS{steps}")
    }

    /// The base config with one grid point applied.
    pub fn run_config(&self, architecture: &str, percentage: f64, learning_rate: f64, steps: usize) -> RetrainConfig {
        let run_dir = Path::new(&self.output_dir).join(Self::run_name(architecture, percentage, learning_rate, steps));
        RetrainConfig {
            architecture:            architecture.to_string(),
            testing_percentage:      percentage,
            validation_percentage:   percentage,
            learning_rate,
            how_many_training_steps: steps,
            output_graph:            run_dir.join(HEAD_FILE_NAME).display().to_string(),
            ..self.base.clone()
        }
    }

    pub fn run_count(&self) -> usize {
        self.architectures.len() * self.percentages.len() * self.learning_rates.len() * self.training_steps.len()
    }
}

#[derive(Debug, Clone)]
pub struct SweepSummary {
    pub runs:        usize,
    pub report_path: PathBuf,
}

// ─── SweepUseCase ─────────────────────────────────────────────────────────────
pub struct SweepUseCase {
    config: SweepConfig,
}

impl SweepUseCase {
    pub fn new(config: SweepConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<SweepSummary> {
        let device = burn::backend::wgpu::WgpuDevice::default();
        tracing::info!("Using WGPU device: {:?}", device);
        let model_dir = PathBuf::from(&self.config.base.model_dir);

        self.run::<TrainingBackend, _>(&device, |profile| {
            let extractor = BackboneExtractor::<InferenceBackend>::load(&model_dir, profile, &device)?;
            Ok(Box::new(extractor))
        })
    }

    /// Walks the grid, loading one extractor per architecture.
    pub fn run<B, F>(&self, device: &B::Device, mut load_extractor: F) -> Result<SweepSummary>
    where
        B: AutodiffBackend,
        F: FnMut(ArchitectureProfile) -> Result<Box<dyn FeatureExtractor>>,
    {
        let cfg = &self.config;
        let mut report = SweepReport::create(&cfg.report_path)?;
        tracing::info!("Sweeping {} runs, report at '{}'", cfg.run_count(), cfg.report_path);

        for architecture in &cfg.architectures {
            let profile = ArchitectureProfile::lookup(architecture)?;
            let extractor = load_extractor(profile)?;

            for &percentage in &cfg.percentages {
                let lists = cfg.run_config(architecture, percentage, 0.0, 0).image_lists()?;

                for &learning_rate in &cfg.learning_rates {
                    for &steps in &cfg.training_steps {
                        let run_cfg = cfg.run_config(architecture, percentage, learning_rate, steps);
                        tracing::info!(
                            "Starting {}",
                            SweepConfig::run_name(architecture, percentage, learning_rate, steps)
                        );

                        let summary = retrain_with::<B>(&run_cfg, &lists, extractor.as_ref(), device)?;
                        let outcome = &summary.outcome;
                        let no = report.append(SweepRow {
                            no:                  0,
                            model_name:          architecture.clone(),
                            percent_test:        format_number(percentage),
                            learning_rate:       format_number(learning_rate),
                            training_step:       steps,
                            train_accuracy:      format_percent(outcome.train_accuracy),
                            cross_entropy:       format_value(outcome.cross_entropy),
                            validation_accuracy: format_percent(outcome.validation_accuracy),
                            final_test_accuracy: format_percent(outcome.test_accuracy),
                            time:                round_seconds(summary.elapsed.as_secs_f64()),
                        })?;
                        tracing::info!("Recorded run {} in {:.2}s", no, summary.elapsed.as_secs_f64());
                    }
                }
            }
        }

        Ok(SweepSummary { runs: cfg.run_count(), report_path: report.path().to_path_buf() })
    }
}
