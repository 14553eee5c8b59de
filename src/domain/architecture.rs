// ============================================================
// Layer 3 — Architecture Catalog
// ============================================================
// One fixed profile per supported feature extractor. The
// profile decides how raw images are decoded for the backbone
// and how long every bottleneck vector is.

use serde::{Deserialize, Serialize};

use crate::domain::error::{RetrainError, RetrainResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchitectureProfile {
    /// Lower-cased identifier, also used as the bottleneck file suffix
    pub name: String,
    pub input_width: u32,
    pub input_height: u32,
    pub input_depth: u32,
    pub input_mean: f32,
    pub input_std: f32,
    /// Length of every feature vector this backbone produces
    pub bottleneck_size: usize,
    /// Weight record of the frozen backbone, relative to the model directory
    pub model_file_name: String,
}

impl ArchitectureProfile {
    /// Look up a profile by name.
    ///
    /// `inception_v3` matches exactly; MobileNets are matched by the
    /// `mobilenet_v1` / `mobilenet_v2` prefix so that variants such as
    /// `mobilenet_v1_1.0_224` all resolve to the same backbone.
    pub fn lookup(name: &str) -> RetrainResult<Self> {
        let name = name.to_lowercase();

        if name == "inception_v3" {
            Ok(Self {
                input_width:     299,
                input_height:    299,
                input_depth:     3,
                input_mean:      128.0,
                input_std:       128.0,
                bottleneck_size: 2048,
                model_file_name: "inception_v3_frozen".to_string(),
                name,
            })
        } else if name.starts_with("mobilenet_v1") {
            Ok(Self {
                input_width:     224,
                input_height:    224,
                input_depth:     3,
                input_mean:      127.5,
                input_std:       127.5,
                bottleneck_size: 1001,
                model_file_name: "mobilenet_v1_1_0_224_frozen".to_string(),
                name,
            })
        } else if name.starts_with("mobilenet_v2") {
            Ok(Self {
                input_width:     224,
                input_height:    224,
                input_depth:     3,
                input_mean:      127.5,
                input_std:       127.5,
                bottleneck_size: 1001,
                model_file_name: "mobilenet_v2_1_4_224_frozen".to_string(),
                name,
            })
        } else {
            tracing::error!("Couldn't understand architecture name '{}'", name);
            Err(RetrainError::UnknownArchitecture { name })
        }
    }
}
