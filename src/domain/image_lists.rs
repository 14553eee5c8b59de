// ============================================================
// Layer 3 — Image Lists
// ============================================================
// The result of partitioning: for every label, which base
// filenames are training, testing and validation images.
//
// ImageLists keeps labels in insertion order (sorted directory
// order from the scan). That order defines each label's index,
// and therefore the position of the 1.0 in its one-hot vector.

use std::path::{Path, PathBuf};

use crate::domain::category::Category;
use crate::domain::error::{RetrainError, RetrainResult};

/// The partitioned images of one label directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelPartition {
    /// Normalised label name (lower-case, non-alphanumeric runs → ' ')
    pub label: String,
    /// Name of the source subdirectory under the image root
    pub dir: String,
    pub training: Vec<String>,
    pub testing: Vec<String>,
    pub validation: Vec<String>,
}

impl LabelPartition {
    pub fn new(label: impl Into<String>, dir: impl Into<String>) -> Self {
        Self {
            label:      label.into(),
            dir:        dir.into(),
            training:   Vec::new(),
            testing:    Vec::new(),
            validation: Vec::new(),
        }
    }

    pub fn category(&self, category: Category) -> &[String] {
        match category {
            Category::Training   => &self.training,
            Category::Testing    => &self.testing,
            Category::Validation => &self.validation,
        }
    }

    pub fn category_mut(&mut self, category: Category) -> &mut Vec<String> {
        match category {
            Category::Training   => &mut self.training,
            Category::Testing    => &mut self.testing,
            Category::Validation => &mut self.validation,
        }
    }

    pub fn total_images(&self) -> usize {
        self.training.len() + self.testing.len() + self.validation.len()
    }
}

/// A concrete image picked by (label, category, ordinal index).
///
/// `index` is already reduced modulo the category length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference<'a> {
    pub partition: &'a LabelPartition,
    pub category: Category,
    pub index: usize,
}

impl<'a> ImageReference<'a> {
    pub fn base_name(&self) -> &'a str {
        &self.partition.category(self.category)[self.index]
    }

    /// `root/<label dir>/<base name>`
    pub fn path_under(&self, root: &Path) -> PathBuf {
        root.join(&self.partition.dir).join(self.base_name())
    }
}

/// Insertion-ordered mapping from label name to its partition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageLists {
    partitions: Vec<LabelPartition>,
}

impl ImageLists {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a partition. A label that is already present keeps its
    /// position but its partition is replaced.
    pub fn insert(&mut self, partition: LabelPartition) -> Option<LabelPartition> {
        match self.partitions.iter_mut().find(|p| p.label == partition.label) {
            Some(existing) => Some(std::mem::replace(existing, partition)),
            None => {
                self.partitions.push(partition);
                None
            }
        }
    }

    pub fn class_count(&self) -> usize {
        self.partitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.partitions.iter().map(|p| p.label.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &LabelPartition> {
        self.partitions.iter()
    }

    pub fn get(&self, label: &str) -> Option<&LabelPartition> {
        self.partitions.iter().find(|p| p.label == label)
    }

    pub fn by_index(&self, label_index: usize) -> Option<&LabelPartition> {
        self.partitions.get(label_index)
    }

    pub fn label_index(&self, label: &str) -> Option<usize> {
        self.partitions.iter().position(|p| p.label == label)
    }

    /// Resolve an ordinal index to a concrete image reference.
    ///
    /// The index may come from a much larger domain than the category
    /// holds; it is reduced modulo the category length.
    pub fn reference(
        &self,
        label: &str,
        category: Category,
        index: u64,
    ) -> RetrainResult<ImageReference<'_>> {
        let partition = self.get(label).ok_or_else(|| RetrainError::UnknownLabel {
            label: label.to_string(),
        })?;

        let len = partition.category(category).len();
        if len == 0 {
            return Err(RetrainError::EmptyCategory {
                label: label.to_string(),
                category,
            });
        }

        Ok(ImageReference {
            partition,
            category,
            index: (index % len as u64) as usize,
        })
    }

    /// Full path of the image `index` (modulo-reduced) refers to.
    pub fn image_path(
        &self,
        image_dir: &Path,
        label: &str,
        category: Category,
        index: u64,
    ) -> RetrainResult<PathBuf> {
        Ok(self.reference(label, category, index)?.path_under(image_dir))
    }

    /// Classification needs at least two labels.
    pub fn require_classifiable(&self, image_dir: &Path) -> RetrainResult<()> {
        if self.class_count() < 2 {
            return Err(RetrainError::TooFewClasses {
                path:  image_dir.to_path_buf(),
                found: self.class_count(),
            });
        }
        Ok(())
    }

    /// Write label names, one per line in label-index order.
    pub fn write_labels(&self, path: &Path) -> RetrainResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| RetrainError::io(parent, e))?;
        }
        let mut text = self.labels().collect::<Vec<_>>().join("\n");
        text.push('\n');
        std::fs::write(path, text).map_err(|e| RetrainError::io(path, e))
    }
}
