// ============================================================
// Layer 4 — Random Image Distortions
// ============================================================
// Training-time augmentation applied to raw image bytes:
//
//   1. Scale up by a fixed crop margin (1 + crop%) times a random
//      factor drawn from [1, 1 + scale%)
//   2. Crop a random input_width × input_height window
//   3. Mirror horizontally with probability 1/2 (if enabled)
//   4. Multiply pixels by a random factor in [1 - b%, 1 + b%]
//   5. Normalise like the undistorted path
//
// Every draw yields a different image, so distorted bottlenecks
// are never cached.

use anyhow::Result;
use image::imageops::FilterType;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

use crate::data::preprocessor::ImageDecoder;
use crate::domain::{
    architecture::ArchitectureProfile,
    traits::{ImageDistorter, InputImage},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DistortionConfig {
    pub flip_left_right: bool,
    /// Margin to randomly crop off, in percent
    pub random_crop: u32,
    /// Maximum random upscale, in percent
    pub random_scale: u32,
    /// Maximum brightness change, in percent
    pub random_brightness: u32,
}

impl DistortionConfig {
    /// True when any distortion differs from its neutral value.
    pub fn should_distort_images(&self) -> bool {
        self.flip_left_right
            || self.random_crop != 0
            || self.random_scale != 0
            || self.random_brightness != 0
    }
}

pub struct RandomDistorter {
    config: DistortionConfig,
    decoder: ImageDecoder,
}

impl RandomDistorter {
    pub fn new(config: DistortionConfig, profile: &ArchitectureProfile) -> Self {
        Self { config, decoder: ImageDecoder::new(profile) }
    }
}

/// Uniform draw from [1 - spread, 1 + spread) or [1, 1 + spread) when `symmetric` is false.
fn factor(rng: &mut dyn RngCore, percent: u32, symmetric: bool) -> f32 {
    if percent == 0 {
        return 1.0;
    }
    let spread = percent as f32 / 100.0;
    let low = if symmetric { 1.0 - spread } else { 1.0 };
    rng.gen_range(low..1.0 + spread)
}

impl ImageDistorter for RandomDistorter {
    fn distort(&self, image_data: &[u8], rng: &mut dyn RngCore) -> Result<InputImage> {
        let (input_width, input_height) = self.decoder.input_size();
        let img = self.decoder.decode(image_data)?;

        let margin_scale = 1.0 + self.config.random_crop as f32 / 100.0;
        let scale_value = margin_scale * factor(rng, self.config.random_scale, false);

        let precrop_width = ((scale_value * input_width as f32) as u32).max(input_width);
        let precrop_height = ((scale_value * input_height as f32) as u32).max(input_height);
        let precropped = img.resize_exact(precrop_width, precrop_height, FilterType::Triangle);

        let x = rng.gen_range(0..=precrop_width - input_width);
        let y = rng.gen_range(0..=precrop_height - input_height);
        let mut cropped = precropped.crop_imm(x, y, input_width, input_height);

        if self.config.flip_left_right && rng.gen_bool(0.5) {
            cropped = cropped.fliph();
        }

        let brightness = factor(rng, self.config.random_brightness, true);
        self.decoder.normalise(&cropped, brightness)
    }
}
