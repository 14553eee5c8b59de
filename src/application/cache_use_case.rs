// ============================================================
// Layer 2 — CacheUseCase
// ============================================================
// Pre-computes every bottleneck for one architecture without
// training anything, so later runs start from a warm cache.

use anyhow::Result;
use std::path::Path;

use crate::application::retrain_use_case::RetrainConfig;
use crate::data::bottleneck_cache::BottleneckCache;
use crate::domain::{architecture::ArchitectureProfile, traits::FeatureExtractor};
use crate::ml::{backbone::BackboneExtractor, trainer::InferenceBackend};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSummary {
    pub class_count: usize,
    pub entries:     usize,
}

pub struct CacheUseCase {
    config: RetrainConfig,
}

impl CacheUseCase {
    pub fn new(config: RetrainConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<CacheSummary> {
        let cfg = &self.config;
        let profile = ArchitectureProfile::lookup(&cfg.architecture)?;
        let device = burn::backend::wgpu::WgpuDevice::default();
        let extractor = BackboneExtractor::<InferenceBackend>::load(Path::new(&cfg.model_dir), profile, &device)?;
        self.warm(&extractor)
    }

    pub fn warm(&self, extractor: &dyn FeatureExtractor) -> Result<CacheSummary> {
        let lists = self.config.image_lists()?;
        let cache = BottleneckCache::new(self.config.cache_config(extractor.profile()), extractor);
        let entries = cache.cache_bottlenecks(&lists)?;
        Ok(CacheSummary { class_count: lists.class_count(), entries })
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::testing::{Corpus, FakeExtractor, FakeMode};

    #[test]
    fn test_warm_twice_extracts_once() {
        let corpus = Corpus::build(&[("cat", 5), ("dog", 7)]);
        let use_case = CacheUseCase::new(RetrainConfig {
            image_dir:      corpus.image_dir().display().to_string(),
            bottleneck_dir: corpus.bottleneck_dir().display().to_string(),
            ..Default::default()
        });
        let extractor = FakeExtractor::new(FakeMode::Normal);

        let first = use_case.warm(&extractor).unwrap();
        assert_eq!(first, CacheSummary { class_count: 2, entries: 12 });
        assert_eq!(extractor.calls(), 12);

        let second = use_case.warm(&extractor).unwrap();
        assert_eq!(second.entries, 12);
        assert_eq!(extractor.calls(), 12);
    }

    #[test]
    fn test_mixed_case_architecture_shares_the_cache() {
        let corpus = Corpus::build(&[("cat", 2), ("dog", 2)]);
        let extractor = FakeExtractor::new(FakeMode::Normal);
        for architecture in ["MobileNet_V1_1.0_224", "mobilenet_v1_1.0_224"] {
            CacheUseCase::new(RetrainConfig {
                image_dir:      corpus.image_dir().display().to_string(),
                bottleneck_dir: corpus.bottleneck_dir().display().to_string(),
                architecture:   architecture.to_string(),
                ..Default::default()
            })
            .warm(&extractor)
            .unwrap();
        }
        assert_eq!(extractor.calls(), 4);

        let names: Vec<String> = std::fs::read_dir(corpus.bottleneck_dir().join("cat"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 2);
        assert!(names.iter().all(|n| n.ends_with("_mobilenet_v1_1.0_224.txt")));
    }
}
