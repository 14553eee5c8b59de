// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types and traits describing the retraining problem:
// labels and their partitions, categories, architecture profiles,
// the error taxonomy, and the seams to the feature extractor and
// the image distorter.
//
// Rules for this layer:
//   - NO Burn framework types
//   - NO file I/O beyond path arithmetic
//   - Only plain structs, enums, and traits

/// Training / testing / validation categories
pub mod category;

/// Label partitions and the label → partition mapping
pub mod image_lists;

/// Supported feature-extractor profiles
pub mod architecture;

/// Error taxonomy shared by the data layer
pub mod error;

/// Seams to the feature extractor and the augmentation transform
pub mod traits;
