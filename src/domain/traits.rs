// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The data layer never knows which backbone or which image
// transform is in use. It only sees these two traits:
//
//   - FeatureExtractor → BackboneExtractor (burn), test fakes
//   - ImageDistorter   → RandomDistorter (crop/scale/flip/brightness)

use anyhow::Result;
use rand::RngCore;

use crate::domain::architecture::ArchitectureProfile;

/// A decoded, resized and normalised image, channel-last
/// (`pixels.len() == height * width * channels`).
#[derive(Debug, Clone, PartialEq)]
pub struct InputImage {
    pub width: usize,
    pub height: usize,
    pub channels: usize,
    pub pixels: Vec<f32>,
}

// ─── FeatureExtractor ─────────────────────────────────────────────────────────
/// The frozen, pretrained part of the network.
///
/// Implementations must be deterministic for a fixed input and
/// must fail instead of returning a partial vector.
pub trait FeatureExtractor {
    /// The architecture this extractor was built for
    fn profile(&self) -> &ArchitectureProfile;

    /// Run the backbone on an already decoded image
    fn extract_input(&self, input: &InputImage) -> Result<Vec<f32>>;

    /// Decode raw image bytes and run the backbone on them
    fn extract(&self, image_data: &[u8]) -> Result<Vec<f32>>;
}

// ─── ImageDistorter ───────────────────────────────────────────────────────────
/// A random augmentation applied to raw image bytes, producing
/// the backbone's input directly.
pub trait ImageDistorter {
    fn distort(&self, image_data: &[u8], rng: &mut dyn RngCore) -> Result<InputImage>;
}
