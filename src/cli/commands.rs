// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the three subcommands: `retrain`, `sweep` and `cache`.
//
// Flags shared between subcommands live in two flattened groups:
//   DataArgs     — where images, bottlenecks and backbones are
//   TrainingArgs — batch sizes, evaluation, outputs, distortions
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};

use crate::application::{retrain_use_case::RetrainConfig, sweep_use_case::SweepConfig};
use crate::data::distortion::DistortionConfig;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train a new classifier head on one architecture
    Retrain(RetrainArgs),

    /// Train one head per architecture / percentage / learning rate / steps and write a CSV report
    Sweep(SweepArgs),

    /// Compute and cache every bottleneck without training
    Cache(CacheArgs),
}

// ─── Shared Groups ────────────────────────────────────────────────────────────
#[derive(Args, Debug, Clone)]
pub struct DataArgs {
    /// Folder of labelled image folders, one subfolder per label
    #[arg(long, default_value = "data/images")]
    pub image_dir: String,

    /// Where cached bottleneck files are stored
    #[arg(long, default_value = "data/bottlenecks")]
    pub bottleneck_dir: String,

    /// Folder holding the pretrained backbone weights
    #[arg(long, default_value = "data/models")]
    pub model_dir: String,

    /// Percentage of images used as the test set
    #[arg(long, default_value_t = 10.0)]
    pub testing_percentage: f64,

    /// Percentage of images used as the validation set
    #[arg(long, default_value_t = 10.0)]
    pub validation_percentage: f64,

    /// Bottlenecks kept in memory per run (0 disables)
    #[arg(long, default_value_t = 10_000)]
    pub memo_capacity: u64,
}

impl DataArgs {
    fn apply(self, cfg: &mut RetrainConfig) {
        cfg.image_dir             = self.image_dir;
        cfg.bottleneck_dir        = self.bottleneck_dir;
        cfg.model_dir             = self.model_dir;
        cfg.testing_percentage    = self.testing_percentage;
        cfg.validation_percentage = self.validation_percentage;
        cfg.memo_capacity         = self.memo_capacity;
    }
}

#[derive(Args, Debug, Clone)]
pub struct TrainingArgs {
    /// Where to write the label list, one label per line
    #[arg(long, default_value = "output/retrained_labels.txt")]
    pub output_labels: String,

    /// Where intermediate heads are saved
    #[arg(long, default_value = "output/intermediate")]
    pub intermediate_output_graphs_dir: String,

    /// Save an intermediate head every N steps (0 = never)
    #[arg(long, default_value_t = 0)]
    pub intermediate_store_frequency: usize,

    /// Images per training step
    #[arg(long, default_value_t = 100)]
    pub train_batch_size: usize,

    /// Evaluate every N steps
    #[arg(long, default_value_t = 10)]
    pub eval_step_interval: usize,

    /// Images per validation evaluation (-1 = whole validation set)
    #[arg(long, default_value_t = 100, allow_hyphen_values = true)]
    pub validation_batch_size: i64,

    /// Images in the final test (-1 = whole test set)
    #[arg(long, default_value_t = -1, allow_hyphen_values = true)]
    pub test_batch_size: i64,

    /// Log every misclassified test image
    #[arg(long)]
    pub print_misclassified_test_images: bool,

    /// Randomly mirror half of the training images
    #[arg(long)]
    pub flip_left_right: bool,

    /// Margin to randomly crop off, in percent
    #[arg(long, default_value_t = 0)]
    pub random_crop: u32,

    /// Maximum random upscale, in percent
    #[arg(long, default_value_t = 0)]
    pub random_scale: u32,

    /// Maximum random brightness change, in percent
    #[arg(long, default_value_t = 0)]
    pub random_brightness: u32,

    /// Seed for sampling and distortions (random when omitted)
    #[arg(long)]
    pub random_seed: Option<u64>,
}

impl TrainingArgs {
    fn apply(self, cfg: &mut RetrainConfig) {
        cfg.output_labels                   = self.output_labels;
        cfg.intermediate_output_graphs_dir  = self.intermediate_output_graphs_dir;
        cfg.intermediate_store_frequency    = self.intermediate_store_frequency;
        cfg.train_batch_size                = self.train_batch_size;
        cfg.eval_step_interval              = self.eval_step_interval;
        cfg.validation_batch_size           = self.validation_batch_size;
        cfg.test_batch_size                 = self.test_batch_size;
        cfg.print_misclassified_test_images = self.print_misclassified_test_images;
        cfg.random_seed                     = self.random_seed;
        cfg.distortions = DistortionConfig {
            flip_left_right:   self.flip_left_right,
            random_crop:       self.random_crop,
            random_scale:      self.random_scale,
            random_brightness: self.random_brightness,
        };
    }
}

// ─── retrain ──────────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct RetrainArgs {
    #[command(flatten)]
    pub data: DataArgs,

    #[command(flatten)]
    pub training: TrainingArgs,

    /// inception_v3, mobilenet_v1_* or mobilenet_v2_*
    #[arg(long, default_value = "inception_v3")]
    pub architecture: String,

    /// Number of training steps
    #[arg(long, default_value_t = 100)]
    pub how_many_training_steps: usize,

    #[arg(long, default_value_t = 0.01)]
    pub learning_rate: f64,

    /// Where to save the trained head; the file name must not contain a '.'
    #[arg(long, default_value = "output/retrained_head")]
    pub output_graph: String,
}

/// The application layer never sees clap types.
impl From<RetrainArgs> for RetrainConfig {
    fn from(a: RetrainArgs) -> Self {
        let mut cfg = RetrainConfig {
            architecture:            a.architecture,
            how_many_training_steps: a.how_many_training_steps,
            learning_rate:           a.learning_rate,
            output_graph:            a.output_graph,
            ..Default::default()
        };
        a.data.apply(&mut cfg);
        a.training.apply(&mut cfg);
        cfg
    }
}

// ─── sweep ────────────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct SweepArgs {
    #[command(flatten)]
    pub data: DataArgs,

    #[command(flatten)]
    pub training: TrainingArgs,

    #[arg(long, value_delimiter = ',', default_value = "mobilenet_v1_1.0_224,mobilenet_v2_1.4_224,inception_v3")]
    pub architectures: Vec<String>,

    /// Testing and validation percentage per run
    #[arg(long, value_delimiter = ',', default_value = "10")]
    pub percentages: Vec<f64>,

    #[arg(long, value_delimiter = ',', default_value = "0.0001")]
    pub learning_rates: Vec<f64>,

    #[arg(long, value_delimiter = ',', default_value = "100")]
    pub training_steps: Vec<usize>,

    /// Parent folder of the per-run output folders
    #[arg(long, default_value = "output/sweep")]
    pub output_dir: String,

    #[arg(long, default_value = "output/sweep/tests.csv")]
    pub report: String,
}

impl From<SweepArgs> for SweepConfig {
    fn from(a: SweepArgs) -> Self {
        let mut base = RetrainConfig::default();
        a.data.apply(&mut base);
        a.training.apply(&mut base);
        SweepConfig {
            base,
            architectures:  a.architectures,
            percentages:    a.percentages,
            learning_rates: a.learning_rates,
            training_steps: a.training_steps,
            output_dir:     a.output_dir,
            report_path:    a.report,
        }
    }
}

// ─── cache ────────────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct CacheArgs {
    #[command(flatten)]
    pub data: DataArgs,

    #[arg(long, default_value = "inception_v3")]
    pub architecture: String,
}

impl From<CacheArgs> for RetrainConfig {
    fn from(a: CacheArgs) -> Self {
        let mut cfg = RetrainConfig { architecture: a.architecture, ..Default::default() };
        a.data.apply(&mut cfg);
        cfg
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    fn parse(args: &[&str]) -> Commands {
        Cli::try_parse_from(std::iter::once("bottleneck-retrain").chain(args.iter().copied()))
            .unwrap()
            .command
    }

    #[test]
    fn test_retrain_defaults_match_config_defaults() {
        let Commands::Retrain(args) = parse(&["retrain"]) else { panic!("expected retrain") };
        assert_eq!(RetrainConfig::from(args), RetrainConfig::default());
    }

    #[test]
    fn test_retrain_flags() {
        let Commands::Retrain(args) = parse(&[
            "retrain",
            "--image-dir", "flowers",
            "--architecture", "mobilenet_v2_1.4_224",
            "--test-batch-size", "50",
            "--validation-batch-size", "-1",
            "--flip-left-right",
            "--random-crop", "10",
            "--random-seed", "7",
        ]) else {
            panic!("expected retrain")
        };
        let cfg = RetrainConfig::from(args);

        assert_eq!(cfg.image_dir, "flowers");
        assert_eq!(cfg.architecture, "mobilenet_v2_1.4_224");
        assert_eq!(cfg.test_batch_size, 50);
        assert_eq!(cfg.validation_batch_size, -1);
        assert!(cfg.distortions.flip_left_right);
        assert_eq!(cfg.distortions.random_crop, 10);
        assert_eq!(cfg.random_seed, Some(7));
    }

    #[test]
    fn test_sweep_lists() {
        let Commands::Sweep(args) = parse(&[
            "sweep",
            "--architectures", "inception_v3",
            "--learning-rates", "0.01,0.001",
            "--training-steps", "100,200,300",
        ]) else {
            panic!("expected sweep")
        };
        let cfg = SweepConfig::from(args);

        assert_eq!(cfg.architectures, vec!["inception_v3"]);
        assert_eq!(cfg.percentages, vec![10.0]);
        assert_eq!(cfg.learning_rates, vec![0.01, 0.001]);
        assert_eq!(cfg.run_count(), 6);
    }

    #[test]
    fn test_sweep_defaults_match_config_defaults() {
        let Commands::Sweep(args) = parse(&["sweep"]) else { panic!("expected sweep") };
        assert_eq!(SweepConfig::from(args), SweepConfig::default());
    }
}
