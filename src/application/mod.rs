// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer orchestrates all the other layers to accomplish
// one goal per CLI subcommand.
//
// Rules for this layer:
//   - No ML math or model code here
//   - No printing here (that's Layer 1)
//   - Only workflow coordination

/// One retraining run
pub mod retrain_use_case;

/// Hyperparameter grid over retraining runs
pub mod sweep_use_case;

/// Bottleneck cache pre-warming
pub mod cache_use_case;
