// ============================================================
// Layer 4 — Image Preprocessor
// ============================================================
// Turns raw image file bytes into the backbone's input:
//
//   1. Decode (JPEG, PNG, GIF, BMP) with the `image` crate
//   2. Convert to the profile's channel depth
//   3. Bilinear resize to input_width × input_height
//   4. Normalise every channel value: (x - mean) / std
//
// The result is channel-last (height, width, channels).

use anyhow::{bail, Context, Result};
use image::{imageops::FilterType, DynamicImage};

use crate::domain::{architecture::ArchitectureProfile, traits::InputImage};

#[derive(Debug, Clone)]
pub struct ImageDecoder {
    width: u32,
    height: u32,
    depth: u32,
    mean: f32,
    std: f32,
}

impl ImageDecoder {
    pub fn new(profile: &ArchitectureProfile) -> Self {
        Self {
            width:  profile.input_width,
            height: profile.input_height,
            depth:  profile.input_depth,
            mean:   profile.input_mean,
            std:    profile.input_std,
        }
    }

    pub fn input_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Decode raw bytes into an image.
    pub fn decode(&self, image_data: &[u8]) -> Result<DynamicImage> {
        image::load_from_memory(image_data).context("Cannot decode image data")
    }

    /// Decode, resize and normalise in one step.
    pub fn preprocess(&self, image_data: &[u8]) -> Result<InputImage> {
        let img = self.decode(image_data)?;
        let resized = img.resize_exact(self.width, self.height, FilterType::Triangle);
        self.normalise(&resized, 1.0)
    }

    /// Normalise an image that already has the input size.
    /// `brightness` multiplies every value before normalisation.
    pub fn normalise(&self, img: &DynamicImage, brightness: f32) -> Result<InputImage> {
        let raw: Vec<u8> = match self.depth {
            1 => img.to_luma8().into_raw(),
            3 => img.to_rgb8().into_raw(),
            4 => img.to_rgba8().into_raw(),
            other => bail!("Unsupported input depth {other}"),
        };

        let pixels = raw
            .into_iter()
            .map(|v| (f32::from(v) * brightness - self.mean) / self.std)
            .collect();

        Ok(InputImage {
            width:    img.width() as usize,
            height:   img.height() as usize,
            channels: self.depth as usize,
            pixels,
        })
    }
}
