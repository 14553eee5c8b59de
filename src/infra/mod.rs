// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Output files that outlive a run:
//
//   checkpoint.rs — Saving trained heads
//                   Burn's CompactRecorder for the final and
//                   intermediate heads, RetrainConfig as JSON
//                   next to the final head.
//
//   report.rs     — The sweep's CSV report
//                   One row per run, written through the csv
//                   crate from a serde-derived row struct.

/// Classifier head checkpoints and run config
pub mod checkpoint;

/// Sweep CSV report
pub mod report;
