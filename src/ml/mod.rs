// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// The networks and the training loop:
//
//   backbone.rs  — The frozen, pretrained feature extractor
//                  Depthwise-separable conv stack loaded from
//                  a CompactRecorder record; implements
//                  FeatureExtractor for the data layer
//
//   model.rs     — The trainable classifier head
//                  One Linear layer, softmax cross entropy,
//                  accuracy evaluation
//
//   trainer.rs   — The training loop
//                  SGD steps on sampled bottlenecks, periodic
//                  train/validation evaluation, intermediate
//                  checkpoints, final test evaluation
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)

/// Frozen backbone and its FeatureExtractor adapter
pub mod backbone;

/// Linear classifier head
pub mod model;

/// Training loop with evaluation and checkpointing
pub mod trainer;
