// Test fixtures shared by the data-layer tests: a throwaway image
// corpus on disk and a fake backbone that counts its calls.

use std::{cell::Cell, fs, path::PathBuf};

use anyhow::{bail, Result};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use tempfile::TempDir;

use crate::data::partitioner::create_image_lists;
use crate::domain::{
    architecture::ArchitectureProfile,
    image_lists::ImageLists,
    traits::{FeatureExtractor, InputImage},
};

pub const FAKE_BOTTLENECK_SIZE: usize = 4;

/// `root/images/<label>/<label>_NNN.jpg`; the file content is its name.
pub struct Corpus {
    pub root: TempDir,
    pub lists: ImageLists,
}

impl Corpus {
    /// Every image in training.
    pub fn build(labels: &[(&str, usize)]) -> Self {
        Self::build_split(labels, 0.0, 0.0)
    }

    pub fn build_split(labels: &[(&str, usize)], testing: f64, validation: f64) -> Self {
        let root = tempfile::tempdir().expect("tempdir");
        let image_dir = root.path().join("images");
        for (label, count) in labels {
            let dir = image_dir.join(label);
            fs::create_dir_all(&dir).expect("label dir");
            for i in 0..*count {
                let name = format!("{}_{:03}.jpg", label.to_lowercase(), i);
                fs::write(dir.join(&name), name.as_bytes()).expect("image file");
            }
        }
        let lists = create_image_lists(&image_dir, testing, validation).expect("partition");
        Self { root, lists }
    }

    pub fn image_dir(&self) -> PathBuf {
        self.root.path().join("images")
    }

    pub fn bottleneck_dir(&self) -> PathBuf {
        self.root.path().join("bottlenecks")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeMode {
    /// A vector derived from the bytes
    Normal,
    /// An empty vector (serialises to an unparsable entry)
    Empty,
    /// Always fails
    Fail,
}

pub struct FakeExtractor {
    profile: ArchitectureProfile,
    mode: FakeMode,
    calls: Cell<usize>,
}

impl FakeExtractor {
    pub fn new(mode: FakeMode) -> Self {
        let mut profile = ArchitectureProfile::lookup("mobilenet_v1_1.0_224").expect("profile");
        profile.bottleneck_size = FAKE_BOTTLENECK_SIZE;
        Self { profile, mode, calls: Cell::new(0) }
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }

    pub fn reset_calls(&self) {
        self.calls.set(0);
    }
}

impl FeatureExtractor for FakeExtractor {
    fn profile(&self) -> &ArchitectureProfile {
        &self.profile
    }

    fn extract_input(&self, input: &InputImage) -> Result<Vec<f32>> {
        self.calls.set(self.calls.get() + 1);
        let mean = input.pixels.iter().sum::<f32>() / input.pixels.len().max(1) as f32;
        Ok(vec![input.width as f32, input.height as f32, input.channels as f32, mean])
    }

    fn extract(&self, image_data: &[u8]) -> Result<Vec<f32>> {
        self.calls.set(self.calls.get() + 1);
        match self.mode {
            FakeMode::Normal => {
                let sum: u32 = image_data.iter().map(|&b| u32::from(b)).sum();
                Ok(vec![
                    image_data.len() as f32,
                    sum as f32,
                    f32::from(image_data.first().copied().unwrap_or(0)),
                    0.125,
                ])
            }
            FakeMode::Empty => Ok(Vec::new()),
            FakeMode::Fail => bail!("backbone exploded"),
        }
    }
}

/// A solid-colour PNG.
pub fn png_bytes(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb(color));
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("png encode");
    bytes
}
