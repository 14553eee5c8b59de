// ============================================================
// Layer 5 — Frozen Backbone
// ============================================================
// The pretrained feature extractor. Its weights are loaded once
// from `<model_dir>/<profile.model_file_name>` and never updated.
//
//   input  [1, depth, height, width]
//       │  stem: 3×3 conv, stride 2, relu
//       ▼
//   N × depthwise-separable block:
//       3×3 depthwise conv (groups = channels), stride 2, relu
//       1×1 pointwise conv, channels × 2, relu
//       │
//       ▼
//   global average pool → [1, channels]
//       │  Linear
//       ▼
//   bottleneck [1, bottleneck_size]

use anyhow::{bail, Context, Result};
use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        Linear, LinearConfig, PaddingConfig2d,
    },
    prelude::*,
    record::{CompactRecorder, Recorder},
    tensor::{activation::relu, TensorData},
};
use std::path::{Path, PathBuf};

use crate::data::preprocessor::ImageDecoder;
use crate::domain::{
    architecture::ArchitectureProfile,
    traits::{FeatureExtractor, InputImage},
};

#[derive(Config, Debug)]
pub struct BackboneConfig {
    pub input_depth:     usize,
    pub bottleneck_size: usize,
    #[config(default = 32)]
    pub stem_channels:   usize,
    #[config(default = 4)]
    pub block_count:     usize,
}

impl BackboneConfig {
    pub fn for_profile(profile: &ArchitectureProfile) -> Self {
        Self::new(profile.input_depth as usize, profile.bottleneck_size)
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Backbone<B> {
        let stem = Conv2dConfig::new([self.input_depth, self.stem_channels], [3, 3])
            .with_stride([2, 2])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);

        let mut channels = self.stem_channels;
        let blocks = (0..self.block_count)
            .map(|_| {
                let block = SeparableBlock {
                    depthwise: Conv2dConfig::new([channels, channels], [3, 3])
                        .with_stride([2, 2])
                        .with_padding(PaddingConfig2d::Explicit(1, 1))
                        .with_groups(channels)
                        .init(device),
                    pointwise: Conv2dConfig::new([channels, channels * 2], [1, 1]).init(device),
                };
                channels *= 2;
                block
            })
            .collect();

        let projection = LinearConfig::new(channels, self.bottleneck_size).init(device);
        Backbone { stem, blocks, projection }
    }
}

#[derive(Module, Debug)]
pub struct SeparableBlock<B: Backend> {
    pub depthwise: Conv2d<B>,
    pub pointwise: Conv2d<B>,
}

impl<B: Backend> SeparableBlock<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = relu(self.depthwise.forward(x));
        relu(self.pointwise.forward(x))
    }
}

#[derive(Module, Debug)]
pub struct Backbone<B: Backend> {
    pub stem:       Conv2d<B>,
    pub blocks:     Vec<SeparableBlock<B>>,
    pub projection: Linear<B>,
}

impl<B: Backend> Backbone<B> {
    /// images: [batch, depth, height, width] → [batch, bottleneck_size]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let mut x = relu(self.stem.forward(images));
        for block in &self.blocks {
            x = block.forward(x);
        }
        let [batch, channels, _, _] = x.dims();
        let pooled = x.mean_dim(3).mean_dim(2).reshape([batch, channels]);
        self.projection.forward(pooled)
    }
}

// ─── BackboneExtractor ────────────────────────────────────────────────────────
/// `FeatureExtractor` over a loaded backbone: decodes bytes with the
/// profile's `ImageDecoder` and runs one image at a time.
pub struct BackboneExtractor<B: Backend> {
    profile:  ArchitectureProfile,
    decoder:  ImageDecoder,
    backbone: Backbone<B>,
    device:   B::Device,
}

impl<B: Backend> BackboneExtractor<B> {
    /// Weight file for `profile` inside `model_dir` (the recorder adds the extension).
    pub fn weights_path(model_dir: &Path, profile: &ArchitectureProfile) -> PathBuf {
        model_dir.join(&profile.model_file_name)
    }

    pub fn load(model_dir: &Path, profile: ArchitectureProfile, device: &B::Device) -> Result<Self> {
        let path = Self::weights_path(model_dir, &profile);
        tracing::info!("Loading {} backbone weights from '{}'", profile.name, path.display());

        let record = CompactRecorder::new()
            .load(path.clone(), device)
            .with_context(|| {
                format!(
                    "Cannot load backbone weights '{}' for architecture '{}'",
                    path.display(),
                    profile.name
                )
            })?;
        let backbone = BackboneConfig::for_profile(&profile)
            .init::<B>(device)
            .load_record(record);

        Ok(Self::from_backbone(profile, backbone, device.clone()))
    }

    pub fn from_backbone(profile: ArchitectureProfile, backbone: Backbone<B>, device: B::Device) -> Self {
        let decoder = ImageDecoder::new(&profile);
        Self { profile, decoder, backbone, device }
    }
}

impl<B: Backend> FeatureExtractor for BackboneExtractor<B> {
    fn profile(&self) -> &ArchitectureProfile {
        &self.profile
    }

    fn extract_input(&self, input: &InputImage) -> Result<Vec<f32>> {
        if input.channels != self.profile.input_depth as usize {
            bail!(
                "Backbone '{}' expects {} channels, got {}",
                self.profile.name,
                self.profile.input_depth,
                input.channels
            );
        }

        // HWC → [1, C, H, W]
        let image = Tensor::<B, 3>::from_data(
            TensorData::new(input.pixels.clone(), [input.height, input.width, input.channels]),
            &self.device,
        )
        .permute([2, 0, 1])
        .unsqueeze::<4>();

        let bottleneck = self.backbone.forward(image);
        Ok(bottleneck.into_data().iter::<f32>().collect())
    }

    fn extract(&self, image_data: &[u8]) -> Result<Vec<f32>> {
        let input = self.decoder.preprocess(image_data)?;
        self.extract_input(&input)
    }
}
