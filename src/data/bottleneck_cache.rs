// ============================================================
// Layer 4 — Bottleneck Cache
// ============================================================
// Resolves (label, category, index) to the backbone's feature
// vector for that image, running the backbone at most once per
// image and architecture.
//
// On-disk layout (one text file per image and architecture):
//
//   <bottleneck_dir>/<label dir>/<image name>_<architecture>.txt
//
//   content: comma-separated decimals, no trailing newline
//
// Lookup order:
//   1. in-memory memo (per cache instance, bounded)
//   2. file on disk, parsed
//   3. missing file → run the extractor, persist, parse
//
// A file that fails to decode or parse is recreated once. If the fresh file
// fails to parse too, the error is returned: that points at the
// extractor or the disk, not at stale data.

use moka::sync::Cache;
use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::domain::{
    category::Category,
    error::{RetrainError, RetrainResult},
    image_lists::{ImageLists, ImageReference},
    traits::FeatureExtractor,
};

/// Log a progress line every this many bottlenecks during pre-warm.
const PROGRESS_EVERY: usize = 100;

/// Where images are read from and bottlenecks written to.
#[derive(Debug, Clone)]
pub struct BottleneckCacheConfig {
    pub image_dir: PathBuf,
    pub bottleneck_dir: PathBuf,
    /// Suffix of every cache file; one architecture per cache instance
    pub architecture: String,
    /// Entries kept in memory; 0 disables the memo
    pub memo_capacity: u64,
}

/// Read state of one resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    First,
    Repair,
}

pub struct BottleneckCache<'e> {
    config: BottleneckCacheConfig,
    extractor: &'e dyn FeatureExtractor,
    memo: Option<Cache<PathBuf, Arc<Vec<f32>>>>,
}

impl<'e> BottleneckCache<'e> {
    pub fn new(config: BottleneckCacheConfig, extractor: &'e dyn FeatureExtractor) -> Self {
        let memo = (config.memo_capacity > 0)
            .then(|| Cache::builder().max_capacity(config.memo_capacity).build());
        Self { config, extractor, memo }
    }

    pub fn config(&self) -> &BottleneckCacheConfig {
        &self.config
    }

    pub fn extractor(&self) -> &'e dyn FeatureExtractor {
        self.extractor
    }

    /// Cache file for a resolved image reference.
    pub fn bottleneck_path(&self, reference: &ImageReference<'_>) -> PathBuf {
        self.config
            .bottleneck_dir
            .join(&reference.partition.dir)
            .join(format!("{}_{}.txt", reference.base_name(), self.config.architecture))
    }

    /// Feature vector of image `index` (modulo-reduced) of `label` in `category`.
    pub fn get_or_create(
        &self,
        lists: &ImageLists,
        label: &str,
        category: Category,
        index: u64,
    ) -> RetrainResult<Arc<Vec<f32>>> {
        let reference = lists.reference(label, category, index)?;
        self.resolve(&reference)
    }

    pub fn resolve(&self, reference: &ImageReference<'_>) -> RetrainResult<Arc<Vec<f32>>> {
        let bottleneck_path = self.bottleneck_path(reference);

        if let Some(values) = self.memo.as_ref().and_then(|m| m.get(&bottleneck_path)) {
            return Ok(values);
        }

        let sub_dir = self.config.bottleneck_dir.join(&reference.partition.dir);
        fs::create_dir_all(&sub_dir).map_err(|e| RetrainError::io(&sub_dir, e))?;

        if !bottleneck_path.exists() {
            self.create_bottleneck_file(reference, &bottleneck_path)?;
        }

        let mut attempt = Attempt::First;
        loop {
            let bytes = fs::read(&bottleneck_path)
                .map_err(|e| RetrainError::io(&bottleneck_path, e))?;

            match decode_bottleneck(&bytes) {
                Ok(values) => {
                    let values = Arc::new(values);
                    if let Some(memo) = &self.memo {
                        memo.insert(bottleneck_path, Arc::clone(&values));
                    }
                    return Ok(values);
                }
                Err(reason) if attempt == Attempt::First => {
                    tracing::warn!(
                        "Invalid float found in '{}' ({}), recreating bottleneck",
                        bottleneck_path.display(),
                        reason
                    );
                    self.create_bottleneck_file(reference, &bottleneck_path)?;
                    attempt = Attempt::Repair;
                }
                Err(reason) => {
                    return Err(RetrainError::CorruptBottleneck { path: bottleneck_path, reason });
                }
            }
        }
    }

    /// Make sure every image of every label and category has a
    /// bottleneck on disk. Returns how many entries were visited.
    pub fn cache_bottlenecks(&self, lists: &ImageLists) -> RetrainResult<usize> {
        let root = &self.config.bottleneck_dir;
        fs::create_dir_all(root).map_err(|e| RetrainError::io(root, e))?;

        let mut how_many_bottlenecks = 0usize;
        for partition in lists.iter() {
            for category in Category::ALL {
                for index in 0..partition.category(category).len() {
                    self.resolve(&ImageReference { partition, category, index })?;

                    how_many_bottlenecks += 1;
                    if how_many_bottlenecks % PROGRESS_EVERY == 0 {
                        tracing::info!("{} bottleneck files created.", how_many_bottlenecks);
                    }
                }
            }
        }
        Ok(how_many_bottlenecks)
    }

    /// Run the extractor on the referenced image and persist the result.
    fn create_bottleneck_file(
        &self,
        reference: &ImageReference<'_>,
        bottleneck_path: &Path,
    ) -> RetrainResult<()> {
        tracing::debug!("Creating bottleneck at {}", bottleneck_path.display());

        let image_path = reference.path_under(&self.config.image_dir);
        let image_data = read_image(&image_path)?;

        let values = self
            .extractor
            .extract(&image_data)
            .map_err(|source| RetrainError::Extraction { path: image_path, source })?;

        let bottleneck_string = values
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(",");
        write_atomically(bottleneck_path, &bottleneck_string)
    }
}

/// Read a listed image; a file that vanished since the scan is fatal.
pub fn read_image(image_path: &Path) -> RetrainResult<Vec<u8>> {
    fs::read(image_path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => {
            tracing::error!("File does not exist {}", image_path.display());
            RetrainError::MissingImage { path: image_path.to_path_buf() }
        }
        _ => RetrainError::io(image_path, e),
    })
}

/// Decode a cache file; bytes that are not UTF-8 count as a malformed entry.
fn decode_bottleneck(bytes: &[u8]) -> Result<Vec<f32>, String> {
    let text = std::str::from_utf8(bytes).map_err(|e| format!("not UTF-8: {}", e))?;
    parse_bottleneck(text)
}

/// Parse comma-separated decimals; any malformed field fails the whole entry.
fn parse_bottleneck(text: &str) -> Result<Vec<f32>, String> {
    text.split(',')
        .map(|field| {
            field
                .trim()
                .parse::<f32>()
                .map_err(|e| format!("'{}': {}", field, e))
        })
        .collect()
}

/// Write to `<path>.tmp`, then rename over `path`.
fn write_atomically(path: &Path, contents: &str) -> RetrainResult<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, contents).map_err(|e| RetrainError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| RetrainError::io(path, e))
}
