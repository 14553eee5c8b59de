// ============================================================
// Layer 2 — RetrainUseCase
// ============================================================
// Orchestrates one retraining run in order:
//
//   Step 1: Resolve the architecture        (Layer 3 - domain)
//   Step 2: Partition the image folders     (Layer 4 - data)
//   Step 3: Load the frozen backbone        (Layer 5 - ml)
//   Step 4: Pre-warm the bottleneck cache,  (Layer 4 - data)
//           unless distortions are on
//   Step 5: Save the run config             (Layer 6 - infra)
//   Step 6: Train and test the head         (Layer 5 - ml)
//   Step 7: Save head and label list        (Layer 6 - infra)

use anyhow::{Context, Result};
use burn::tensor::backend::AutodiffBackend;
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use crate::data::{
    bottleneck_cache::{BottleneckCache, BottleneckCacheConfig},
    distortion::{DistortionConfig, RandomDistorter},
    partitioner::create_image_lists,
    sampler::BottleneckSampler,
};
use crate::domain::{
    architecture::ArchitectureProfile,
    image_lists::ImageLists,
    traits::{FeatureExtractor, ImageDistorter},
};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::{
    backbone::BackboneExtractor,
    trainer::{train_head, InferenceBackend, TrainingBackend, TrainingOutcome},
};

// ─── Retraining Configuration ────────────────────────────────────────────────
// Everything one run needs. Saved as run_config.json next to the head.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrainConfig {
    pub image_dir:                      String,
    pub bottleneck_dir:                 String,
    pub model_dir:                      String,
    pub architecture:                   String,
    pub output_graph:                   String,
    pub output_labels:                  String,
    pub intermediate_output_graphs_dir: String,
    /// 0 disables intermediate heads
    pub intermediate_store_frequency:   usize,
    pub how_many_training_steps:        usize,
    pub learning_rate:                  f64,
    pub testing_percentage:             f64,
    pub validation_percentage:          f64,
    pub eval_step_interval:             usize,
    pub train_batch_size:               usize,
    /// Negative = the whole validation set
    pub validation_batch_size:          i64,
    /// Negative = the whole test set
    pub test_batch_size:                i64,
    pub print_misclassified_test_images: bool,
    #[serde(flatten)]
    pub distortions:                    DistortionConfig,
    pub random_seed:                    Option<u64>,
    /// In-memory bottleneck entries kept per run; 0 disables the memo
    pub memo_capacity:                  u64,
}

impl Default for RetrainConfig {
    fn default() -> Self {
        Self {
            image_dir:                      "data/images".to_string(),
            bottleneck_dir:                 "data/bottlenecks".to_string(),
            model_dir:                      "data/models".to_string(),
            architecture:                   "inception_v3".to_string(),
            output_graph:                   "output/retrained_head".to_string(),
            output_labels:                  "output/retrained_labels.txt".to_string(),
            intermediate_output_graphs_dir: "output/intermediate".to_string(),
            intermediate_store_frequency:   0,
            how_many_training_steps:        100,
            learning_rate:                  0.01,
            testing_percentage:             10.0,
            validation_percentage:          10.0,
            eval_step_interval:             10,
            train_batch_size:               100,
            validation_batch_size:          100,
            test_batch_size:                -1,
            print_misclassified_test_images: false,
            distortions:                    DistortionConfig::default(),
            random_seed:                    None,
            memo_capacity:                  10_000,
        }
    }
}

impl RetrainConfig {
    /// Cache files are suffixed with the resolved (lower-cased) architecture name.
    pub fn cache_config(&self, profile: &ArchitectureProfile) -> BottleneckCacheConfig {
        BottleneckCacheConfig {
            image_dir:      PathBuf::from(&self.image_dir),
            bottleneck_dir: PathBuf::from(&self.bottleneck_dir),
            architecture:   profile.name.clone(),
            memo_capacity:  self.memo_capacity,
        }
    }

    /// Partitions `image_dir` and checks there is something to classify.
    pub fn image_lists(&self) -> Result<ImageLists> {
        let image_dir = Path::new(&self.image_dir);
        let lists = create_image_lists(image_dir, self.testing_percentage, self.validation_percentage)?;
        lists.require_classifiable(image_dir)?;
        Ok(lists)
    }
}

/// What a finished run produced.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub class_count: usize,
    pub outcome:     TrainingOutcome,
    pub head_path:   PathBuf,
    pub labels_path: PathBuf,
    /// Training plus final test, excluding cache pre-warming
    pub elapsed:     Duration,
}

// ─── RetrainUseCase ──────────────────────────────────────────────────────────
pub struct RetrainUseCase {
    config: RetrainConfig,
}

impl RetrainUseCase {
    pub fn new(config: RetrainConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<RunSummary> {
        let cfg = &self.config;

        // ── Step 1: Architecture ──────────────────────────────────────────────
        let profile = ArchitectureProfile::lookup(&cfg.architecture)?;

        // ── Step 2: Partition ─────────────────────────────────────────────────
        let lists = cfg.image_lists()?;

        // ── Step 3: Backbone ──────────────────────────────────────────────────
        let device = burn::backend::wgpu::WgpuDevice::default();
        tracing::info!("Using WGPU device: {:?}", device);
        let extractor = BackboneExtractor::<InferenceBackend>::load(Path::new(&cfg.model_dir), profile, &device)?;

        // ── Steps 4-7 ─────────────────────────────────────────────────────────
        retrain_with::<TrainingBackend>(cfg, &lists, &extractor, &device)
    }
}

/// One run against an already partitioned image set and a loaded extractor.
pub fn retrain_with<B: AutodiffBackend>(
    cfg:       &RetrainConfig,
    lists:     &ImageLists,
    extractor: &dyn FeatureExtractor,
    device:    &B::Device,
) -> Result<RunSummary> {
    let cache = BottleneckCache::new(cfg.cache_config(extractor.profile()), extractor);

    // ── Step 4: Distortions or cached bottlenecks ─────────────────────────────
    let distorter = cfg
        .distortions
        .should_distort_images()
        .then(|| RandomDistorter::new(cfg.distortions, extractor.profile()));
    match &distorter {
        Some(_) => tracing::info!("Distortions enabled; bottlenecks are computed per step"),
        None => {
            let cached = cache.cache_bottlenecks(lists)?;
            tracing::info!("{} bottleneck files ready in '{}'", cached, cfg.bottleneck_dir);
        }
    }

    // ── Step 5: Save config ───────────────────────────────────────────────────
    let checkpoints = CheckpointManager::new(&cfg.output_graph, &cfg.intermediate_output_graphs_dir)?;
    checkpoints.save_config(cfg)?;

    // ── Step 6: Train ─────────────────────────────────────────────────────────
    let mut sampler = BottleneckSampler::new(
        &cache,
        distorter.as_ref().map(|d| d as &dyn ImageDistorter),
        cfg.random_seed,
    );
    let start = Instant::now();
    let trained = train_head::<B>(cfg, lists, &mut sampler, &checkpoints, device)?;
    let elapsed = start.elapsed();

    // ── Step 7: Persist ───────────────────────────────────────────────────────
    checkpoints.save_head(&trained.head)?;
    let labels_path = PathBuf::from(&cfg.output_labels);
    lists
        .write_labels(&labels_path)
        .with_context(|| format!("Cannot write labels to '{}'", labels_path.display()))?;

    Ok(RunSummary {
        class_count: lists.class_count(),
        outcome: trained.outcome,
        head_path: checkpoints.head_path().to_path_buf(),
        labels_path,
        elapsed,
    })
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::testing::{Corpus, FakeExtractor, FakeMode};
    use crate::infra::checkpoint::RUN_CONFIG_FILE;
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = Autodiff<NdArray<f32>>;

    fn config_for(corpus: &Corpus) -> RetrainConfig {
        let out = corpus.root.path().join("out");
        RetrainConfig {
            image_dir:                      corpus.image_dir().display().to_string(),
            bottleneck_dir:                 corpus.bottleneck_dir().display().to_string(),
            output_graph:                   out.join("retrained_head").display().to_string(),
            output_labels:                  out.join("labels.txt").display().to_string(),
            intermediate_output_graphs_dir: out.join("intermediate").display().to_string(),
            architecture:                   "mobilenet_v1_1.0_224".to_string(),
            how_many_training_steps:        3,
            learning_rate:                  1e-6,
            train_batch_size:               4,
            validation_batch_size:          -1,
            random_seed:                    Some(1),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults() {
        let cfg = RetrainConfig::default();
        assert_eq!(cfg.train_batch_size, 100);
        assert_eq!(cfg.eval_step_interval, 10);
        assert_eq!(cfg.validation_batch_size, 100);
        assert_eq!(cfg.test_batch_size, -1);
        assert!(!cfg.distortions.should_distort_images());
    }

    #[test]
    fn test_config_json_flattens_distortions() {
        let cfg = RetrainConfig {
            distortions: DistortionConfig { flip_left_right: true, ..Default::default() },
            ..Default::default()
        };
        let json: serde_json::Value = serde_json::to_value(&cfg).unwrap();
        assert_eq!(json["flip_left_right"], serde_json::Value::Bool(true));
        let back: RetrainConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back, cfg);
    }

    #[test]
    fn test_cache_suffix_ignores_architecture_case() {
        let typed = RetrainConfig { architecture: "MobileNet_V1_1.0_224".to_string(), ..Default::default() };
        let profile = ArchitectureProfile::lookup(&typed.architecture).unwrap();
        assert_eq!(typed.cache_config(&profile).architecture, "mobilenet_v1_1.0_224");
    }

    #[test]
    fn test_image_lists_require_two_classes() {
        let corpus = Corpus::build(&[("cat", 3)]);
        let cfg = config_for(&corpus);
        assert!(cfg.image_lists().is_err());
    }

    #[test]
    fn test_run_prewarms_cache_and_writes_outputs() {
        let corpus = Corpus::build_split(&[("cat", 30), ("dog", 30)], 30.0, 30.0);
        let cfg = config_for(&corpus);
        let lists = cfg.image_lists().unwrap();
        let extractor = FakeExtractor::new(FakeMode::Normal);

        let summary = retrain_with::<TestBackend>(&cfg, &lists, &extractor, &Default::default()).unwrap();

        assert_eq!(summary.class_count, 2);
        assert_eq!(summary.outcome.steps, 3);
        // Pre-warm extracted every image; training reused the cache.
        assert_eq!(extractor.calls(), 60);
        assert_eq!(std::fs::read_to_string(&summary.labels_path).unwrap(), "cat\ndog\n");
        assert!(summary.head_path.parent().unwrap().join(RUN_CONFIG_FILE).is_file());
        assert!(std::fs::read_dir(summary.head_path.parent().unwrap())
            .unwrap()
            .any(|e| e.unwrap().file_name().to_string_lossy().starts_with("retrained_head.")));
    }

    #[test]
    fn test_distorted_run_skips_prewarm() {
        let corpus = Corpus::build_split(&[("cat", 30), ("dog", 30)], 30.0, 30.0);
        for partition in corpus.lists.iter() {
            for category in crate::domain::category::Category::ALL {
                for name in partition.category(category) {
                    std::fs::write(
                        corpus.image_dir().join(&partition.dir).join(name),
                        crate::data::testing::png_bytes(8, 8, [40, 80, 120]),
                    )
                    .unwrap();
                }
            }
        }
        let cfg = RetrainConfig {
            distortions: DistortionConfig { random_brightness: 10, ..Default::default() },
            how_many_training_steps: 2,
            eval_step_interval: 0,
            ..config_for(&corpus)
        };
        let lists = cfg.image_lists().unwrap();
        let extractor = FakeExtractor::new(FakeMode::Normal);

        let summary = retrain_with::<TestBackend>(&cfg, &lists, &extractor, &Default::default()).unwrap();

        // Two distorted batches of 4; validation and test go through the cache.
        let test_and_validation: usize = lists
            .iter()
            .map(|p| p.testing.len() + p.validation.len())
            .sum();
        assert_eq!(extractor.calls(), 8 + test_and_validation);
        assert!(summary.outcome.test_accuracy.is_some());
    }
}
