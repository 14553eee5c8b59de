// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything between the image folders on disk and the tensor
// batches the training loop consumes:
//
//   image_dir/<label>/<image>
//       │
//       ▼
//   partitioner       → label → training / testing / validation lists
//       │
//       ▼
//   sampler           → picks (label, category, index) references
//       │
//       ├──► bottleneck_cache → cached feature vector (extract on miss)
//       │
//       └──► distortion + preprocessor → fresh augmented feature vector
//       │
//       ▼
//   batcher           → [batch, bottleneck] and [batch, classes] tensors

/// Hash-based, growth-stable train / test / validation split
pub mod partitioner;

/// Disk-backed, self-repairing bottleneck cache
pub mod bottleneck_cache;

/// Random, exhaustive and distorted batch sampling
pub mod sampler;

/// Decoding, resizing and normalising raw image bytes
pub mod preprocessor;

/// Random crop / scale / flip / brightness augmentation
pub mod distortion;

/// Turns sampled batches into Burn tensors
pub mod batcher;

#[cfg(test)]
pub mod testing;
