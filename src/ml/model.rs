// ============================================================
// Layer 5 — Classifier Head
// ============================================================
// The only trained part of the network: one fully connected
// layer from the bottleneck to one logit per label.
//
//   bottlenecks [batch, bottleneck_size]
//       │  Linear (weights ~ N(0, 0.001))
//       ▼
//   logits      [batch, class_count]
//
// Loss is softmax cross entropy against one-hot ground truth,
// averaged over the batch.

use burn::{
    nn::{Initializer, Linear, LinearConfig},
    prelude::*,
    tensor::activation::log_softmax,
};

use crate::data::batcher::BottleneckTensors;

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct ClassifierHeadConfig {
    pub bottleneck_size: usize,
    pub class_count:     usize,
    #[config(default = 0.001)]
    pub init_stddev:     f64,
}

impl ClassifierHeadConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> ClassifierHead<B> {
        let final_layer = LinearConfig::new(self.bottleneck_size, self.class_count)
            .with_initializer(Initializer::Normal { mean: 0.0, std: self.init_stddev })
            .init(device);
        ClassifierHead { final_layer }
    }
}

#[derive(Module, Debug)]
pub struct ClassifierHead<B: Backend> {
    pub final_layer: Linear<B>,
}

/// Accuracy and loss of the head on one batch, plus the
/// predicted label index per row.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub accuracy:      f64,
    pub cross_entropy: f64,
    pub predictions:   Vec<usize>,
}

impl Evaluation {
    pub fn sample_count(&self) -> usize {
        self.predictions.len()
    }
}

impl<B: Backend> ClassifierHead<B> {
    /// bottlenecks: [batch, bottleneck_size] → logits: [batch, class_count]
    pub fn forward(&self, bottlenecks: Tensor<B, 2>) -> Tensor<B, 2> {
        self.final_layer.forward(bottlenecks)
    }

    pub fn forward_loss(&self, bottlenecks: Tensor<B, 2>, ground_truths: Tensor<B, 2>) -> Tensor<B, 1> {
        softmax_cross_entropy(self.forward(bottlenecks), ground_truths)
    }

    pub fn evaluate(&self, tensors: BottleneckTensors<B>) -> Evaluation {
        let logits = self.forward(tensors.bottlenecks);
        let cross_entropy = softmax_cross_entropy(logits.clone(), tensors.ground_truths.clone())
            .into_scalar()
            .elem::<f64>();

        // argmax(1) returns [batch, 1]; flatten to [batch] before comparing
        let predicted = logits.argmax(1).flatten::<1>(0, 1);
        let expected  = tensors.ground_truths.argmax(1).flatten::<1>(0, 1);
        let total = predicted.dims()[0];

        let correct: i64 = predicted
            .clone()
            .equal(expected)
            .int()
            .sum()
            .into_scalar()
            .elem::<i64>();
        let predictions = predicted
            .into_data()
            .iter::<i64>()
            .map(|p| p as usize)
            .collect();

        Evaluation {
            accuracy: if total > 0 { correct as f64 / total as f64 } else { 0.0 },
            cross_entropy,
            predictions,
        }
    }
}

/// Mean over the batch of `-sum(truth * log_softmax(logits))`.
pub fn softmax_cross_entropy<B: Backend>(logits: Tensor<B, 2>, ground_truths: Tensor<B, 2>) -> Tensor<B, 1> {
    (log_softmax(logits, 1) * ground_truths)
        .sum_dim(1)
        .mean()
        .neg()
}
