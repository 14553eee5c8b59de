// ============================================================
// Layer 4 — Bottleneck Batcher
// ============================================================
// Stacks a sampled BottleneckBatch into two tensors:
//
//   bottlenecks:   [batch_size, bottleneck_size]
//   ground_truths: [batch_size, class_count]   (one-hot rows)
//
// Rows are flattened into one Vec and reshaped, the same way
// every sample has the same width.

use anyhow::{bail, Result};
use burn::{prelude::*, tensor::TensorData};

use crate::data::sampler::BottleneckBatch;

#[derive(Debug, Clone)]
pub struct BottleneckTensors<B: Backend> {
    pub bottlenecks: Tensor<B, 2>,
    pub ground_truths: Tensor<B, 2>,
}

/// Holds the target device so tensors land on the right GPU/CPU.
#[derive(Clone, Debug)]
pub struct BottleneckBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> BottleneckBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }

    pub fn batch(&self, batch: &BottleneckBatch) -> Result<BottleneckTensors<B>> {
        let Some(first) = batch.bottlenecks.first() else {
            bail!("Cannot build tensors from an empty batch");
        };
        let batch_size = batch.len();
        let bottleneck_size = first.len();
        let class_count = batch.ground_truths.first().map(Vec::len).unwrap_or(0);

        if let Some(i) = batch.bottlenecks.iter().position(|b| b.len() != bottleneck_size) {
            bail!(
                "Bottleneck for '{}' has {} values, expected {}",
                batch.filenames.get(i).map(|p| p.display().to_string()).unwrap_or_default(),
                batch.bottlenecks[i].len(),
                bottleneck_size
            );
        }

        let bottleneck_flat: Vec<f32> = batch
            .bottlenecks
            .iter()
            .flat_map(|b| b.iter().copied())
            .collect();
        let truth_flat: Vec<f32> = batch
            .ground_truths
            .iter()
            .flat_map(|g| g.iter().copied())
            .collect();

        let bottlenecks = Tensor::<B, 2>::from_data(
            TensorData::new(bottleneck_flat, [batch_size, bottleneck_size]),
            &self.device,
        );
        let ground_truths = Tensor::<B, 2>::from_data(
            TensorData::new(truth_flat, [batch_size, class_count]),
            &self.device,
        );

        Ok(BottleneckTensors { bottlenecks, ground_truths })
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use std::{path::PathBuf, sync::Arc};

    type TestBackend = NdArray<f32>;

    fn batch_of(rows: &[(&[f32], usize)]) -> BottleneckBatch {
        BottleneckBatch {
            bottlenecks:   rows.iter().map(|(b, _)| Arc::new(b.to_vec())).collect(),
            ground_truths: rows.iter().map(|(_, l)| crate::data::sampler::one_hot(2, *l)).collect(),
            label_indices: rows.iter().map(|(_, l)| *l).collect(),
            filenames:     rows.iter().map(|_| PathBuf::from("x.jpg")).collect(),
        }
    }

    #[test]
    fn test_batch_shapes_and_values() {
        let batcher = BottleneckBatcher::<TestBackend>::new(Default::default());
        let tensors = batcher
            .batch(&batch_of(&[(&[1.0, 2.0, 3.0], 0), (&[4.0, 5.0, 6.0], 1)]))
            .unwrap();

        assert_eq!(tensors.bottlenecks.dims(), [2, 3]);
        assert_eq!(tensors.ground_truths.dims(), [2, 2]);
        let values = tensors.bottlenecks.into_data().to_vec::<f32>().unwrap();
        assert_eq!(values, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let truths = tensors.ground_truths.into_data().to_vec::<f32>().unwrap();
        assert_eq!(truths, vec![1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_ragged_or_empty_batches_are_rejected() {
        let batcher = BottleneckBatcher::<TestBackend>::new(Default::default());
        assert!(batcher.batch(&BottleneckBatch::default()).is_err());
        assert!(batcher.batch(&batch_of(&[(&[1.0, 2.0], 0), (&[1.0], 1)])).is_err());
    }
}
