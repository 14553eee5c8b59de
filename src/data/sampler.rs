// ============================================================
// Layer 4 — Bottleneck Sampler
// ============================================================
// Draws batches of (bottleneck, one-hot label, image path).
//
// Three modes:
//
//   cached, Random(n) → n draws with replacement: a uniform label,
//                       then a uniform index in [0, 2^27 - 1]
//                       reduced modulo the category length
//   cached, All       → every image of the category once, labels
//                       in mapping order, images in list order
//   distorted         → like Random(n), but each image is freshly
//                       augmented and run through the backbone,
//                       bypassing the cache
//
// The modulo reduction keeps the draw independent of how many
// images a label has. Its integer bias is negligible and kept.

use rand::{rngs::StdRng, Rng, SeedableRng};
use std::{path::PathBuf, sync::Arc};

use crate::data::{
    bottleneck_cache::{read_image, BottleneckCache},
    partitioner::MAX_NUM_IMAGES_PER_CLASS,
};
use crate::domain::{
    category::{Category, SampleSize},
    error::{RetrainError, RetrainResult},
    image_lists::{ImageLists, ImageReference},
    traits::ImageDistorter,
};

/// Parallel sequences; entry `i` of each field describes sample `i`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BottleneckBatch {
    pub bottlenecks: Vec<Arc<Vec<f32>>>,
    pub ground_truths: Vec<Vec<f32>>,
    pub label_indices: Vec<usize>,
    pub filenames: Vec<PathBuf>,
}

impl BottleneckBatch {
    fn with_capacity(n: usize) -> Self {
        Self {
            bottlenecks:   Vec::with_capacity(n),
            ground_truths: Vec::with_capacity(n),
            label_indices: Vec::with_capacity(n),
            filenames:     Vec::with_capacity(n),
        }
    }

    fn push(&mut self, bottleneck: Arc<Vec<f32>>, label_index: usize, class_count: usize, filename: PathBuf) {
        self.bottlenecks.push(bottleneck);
        self.ground_truths.push(one_hot(class_count, label_index));
        self.label_indices.push(label_index);
        self.filenames.push(filename);
    }

    pub fn len(&self) -> usize {
        self.bottlenecks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bottlenecks.is_empty()
    }
}

/// A `class_count`-long vector with 1.0 at `label_index`.
pub fn one_hot(class_count: usize, label_index: usize) -> Vec<f32> {
    let mut ground_truth = vec![0.0f32; class_count];
    ground_truth[label_index] = 1.0;
    ground_truth
}

pub struct BottleneckSampler<'c, 'e> {
    cache: &'c BottleneckCache<'e>,
    distorter: Option<&'c dyn ImageDistorter>,
    rng: StdRng,
}

impl<'c, 'e> BottleneckSampler<'c, 'e> {
    /// `distorter` switches training batches to the augmented path.
    /// Without a seed the generator is seeded from the OS.
    pub fn new(
        cache: &'c BottleneckCache<'e>,
        distorter: Option<&'c dyn ImageDistorter>,
        seed: Option<u64>,
    ) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { cache, distorter, rng }
    }

    /// Length of every vector this sampler produces.
    pub fn bottleneck_size(&self) -> usize {
        self.cache.extractor().profile().bottleneck_size
    }

    /// A training batch, augmented when a distorter is configured.
    pub fn training_batch(&mut self, lists: &ImageLists, how_many: usize) -> RetrainResult<BottleneckBatch> {
        match self.distorter {
            Some(distorter) => self.distorted_bottlenecks(lists, how_many, Category::Training, distorter),
            None => self.cached_bottlenecks(lists, SampleSize::Random(how_many), Category::Training),
        }
    }

    /// A batch resolved through the bottleneck cache.
    pub fn cached_bottlenecks(
        &mut self,
        lists: &ImageLists,
        size: SampleSize,
        category: Category,
    ) -> RetrainResult<BottleneckBatch> {
        let class_count = lists.class_count();
        let image_dir = self.cache.config().image_dir.clone();

        match size {
            SampleSize::Random(how_many) => {
                let mut batch = BottleneckBatch::with_capacity(how_many);
                for _ in 0..how_many {
                    let (label_index, label, image_index) = self.random_draw(lists)?;
                    let bottleneck = self.cache.get_or_create(lists, label, category, image_index)?;
                    let image_path = lists.image_path(&image_dir, label, category, image_index)?;
                    batch.push(bottleneck, label_index, class_count, image_path);
                }
                Ok(batch)
            }
            SampleSize::All => {
                let mut batch = BottleneckBatch::default();
                for (label_index, partition) in lists.iter().enumerate() {
                    for index in 0..partition.category(category).len() {
                        let reference = ImageReference { partition, category, index };
                        let bottleneck = self.cache.resolve(&reference)?;
                        batch.push(bottleneck, label_index, class_count, reference.path_under(&image_dir));
                    }
                }
                Ok(batch)
            }
        }
    }

    /// Random draws of freshly distorted images. There is no
    /// exhaustive variant of this mode.
    pub fn distorted_bottlenecks(
        &mut self,
        lists: &ImageLists,
        how_many: usize,
        category: Category,
        distorter: &dyn ImageDistorter,
    ) -> RetrainResult<BottleneckBatch> {
        let class_count = lists.class_count();
        let image_dir = self.cache.config().image_dir.clone();
        let extractor = self.cache.extractor();

        let mut batch = BottleneckBatch::with_capacity(how_many);
        for _ in 0..how_many {
            let (label_index, label, image_index) = self.random_draw(lists)?;
            let image_path = lists.image_path(&image_dir, label, category, image_index)?;
            let image_data = read_image(&image_path)?;

            let distorted = match distorter.distort(&image_data, &mut self.rng) {
                Ok(input) => input,
                Err(source) => return Err(RetrainError::Extraction { path: image_path, source }),
            };
            let values = match extractor.extract_input(&distorted) {
                Ok(values) => values,
                Err(source) => return Err(RetrainError::Extraction { path: image_path, source }),
            };

            batch.push(Arc::new(values), label_index, class_count, image_path);
        }
        Ok(batch)
    }

    /// A uniform label and an unreduced ordinal index.
    fn random_draw<'l>(&mut self, lists: &'l ImageLists) -> RetrainResult<(usize, &'l str, u64)> {
        if lists.is_empty() {
            return Err(RetrainError::TooFewClasses {
                path:  self.cache.config().image_dir.clone(),
                found: 0,
            });
        }
        let label_index = self.rng.gen_range(0..lists.class_count());
        let image_index = self.rng.gen_range(0..=MAX_NUM_IMAGES_PER_CLASS);

        let label = lists
            .by_index(label_index)
            .map(|p| p.label.as_str())
            .unwrap_or_default();
        Ok((label_index, label, image_index))
    }
}
