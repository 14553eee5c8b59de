// ============================================================
// Layer 3 — Error Taxonomy
// ============================================================
// Failures raised by partitioning, bottleneck caching and
// sampling. Everything here is fatal for the run except
// `CorruptBottleneck` on a first read, which the cache repairs
// once before it ever reaches a caller.

use std::path::PathBuf;
use thiserror::Error;

use crate::domain::category::Category;

#[derive(Debug, Error)]
pub enum RetrainError {
    #[error("Image directory '{}' not found", path.display())]
    ImageDirNotFound { path: PathBuf },

    #[error("Invalid split: testing={testing}% validation={validation}% (each must be >= 0 and the sum <= 100)")]
    InvalidPercentages { testing: f64, validation: f64 },

    #[error("{found} valid folder(s) of images found at '{}' - multiple classes are needed for classification", path.display())]
    TooFewClasses { path: PathBuf, found: usize },

    #[error("Label does not exist: {label}")]
    UnknownLabel { label: String },

    #[error("Label {label} has no images in the category {category}")]
    EmptyCategory { label: String, category: Category },

    #[error("File does not exist: {}", path.display())]
    MissingImage { path: PathBuf },

    #[error("Error during processing file {}", path.display())]
    Extraction {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("Bottleneck file {} is still unreadable after being recreated: {reason}", path.display())]
    CorruptBottleneck { path: PathBuf, reason: String },

    #[error("Couldn't understand architecture name '{name}'")]
    UnknownArchitecture { name: String },

    #[error("I/O error on '{}'", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RetrainError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}

pub type RetrainResult<T> = Result<T, RetrainError>;
