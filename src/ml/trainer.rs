// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Trains a fresh ClassifierHead on sampled bottlenecks with SGD.
//
// Per step:
//   1. Draw a training batch (cached, or distorted if enabled)
//   2. Forward, softmax cross entropy, backward, SGD update
//   3. Every eval_step_interval steps and on the last step:
//      train accuracy + cross entropy on that same batch,
//      validation accuracy on a validation batch
//   4. Every intermediate_store_frequency steps (not step 0):
//      save an intermediate head
//
// After the last step the head is evaluated once on the test
// category (the whole set by default).
//
// Key Burn insight:
//   - Training runs on B (Autodiff<...>) for gradients
//   - head.valid() returns the head on B::InnerBackend
//   - Evaluation batches must be built for the inner backend too

use anyhow::Result;
use burn::{
    module::AutodiffModule,
    optim::{GradientsParams, Optimizer, SgdConfig},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use std::path::PathBuf;

use crate::application::retrain_use_case::RetrainConfig;
use crate::data::{
    batcher::BottleneckBatcher,
    sampler::{BottleneckBatch, BottleneckSampler},
};
use crate::domain::{
    category::{Category, SampleSize},
    image_lists::ImageLists,
};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::model::{ClassifierHead, ClassifierHeadConfig, Evaluation};

pub type TrainingBackend  = burn::backend::Autodiff<burn::backend::Wgpu>;
pub type InferenceBackend = burn::backend::Wgpu;

/// A test image the trained head got wrong.
#[derive(Debug, Clone, PartialEq)]
pub struct Misclassified {
    pub path:      PathBuf,
    pub predicted: String,
}

/// Metrics of the last evaluation step and of the final test.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingOutcome {
    pub steps:               usize,
    pub train_accuracy:      Option<f64>,
    pub cross_entropy:       Option<f64>,
    pub validation_accuracy: Option<f64>,
    pub test_accuracy:       Option<f64>,
    pub test_count:          usize,
    pub misclassified:       Vec<Misclassified>,
}

pub struct TrainedHead<B: AutodiffBackend> {
    pub head:    ClassifierHead<B>,
    pub outcome: TrainingOutcome,
}

pub fn train_head<B: AutodiffBackend>(
    cfg:         &RetrainConfig,
    lists:       &ImageLists,
    sampler:     &mut BottleneckSampler<'_, '_>,
    checkpoints: &CheckpointManager,
    device:      &B::Device,
) -> Result<TrainedHead<B>> {
    let steps = cfg.how_many_training_steps;

    // ── Build head ────────────────────────────────────────────────────────────
    let head_cfg = ClassifierHeadConfig::new(sampler.bottleneck_size(), lists.class_count());
    let mut head: ClassifierHead<B> = head_cfg.init(device);
    tracing::info!(
        "Head ready: {} → {} classes, {} steps at lr={}",
        head_cfg.bottleneck_size, head_cfg.class_count, steps, cfg.learning_rate
    );

    // ── Plain gradient descent ────────────────────────────────────────────────
    // θ = θ - lr * g
    let mut optim = SgdConfig::new().init();

    let train_batcher = BottleneckBatcher::<B>::new(device.clone());
    let eval_batcher  = BottleneckBatcher::<B::InnerBackend>::new(device.clone());
    let mut outcome = TrainingOutcome { steps, ..Default::default() };

    // ── Step loop ─────────────────────────────────────────────────────────────
    for step in 0..steps {
        let batch   = sampler.training_batch(lists, cfg.train_batch_size)?;
        let tensors = train_batcher.batch(&batch)?;

        let loss  = head.forward_loss(tensors.bottlenecks, tensors.ground_truths);
        let grads = GradientsParams::from_grads(loss.backward(), &head);
        head = optim.step(cfg.learning_rate, head, grads);

        let is_last_step = step + 1 == steps;
        let on_interval  = cfg.eval_step_interval > 0 && step % cfg.eval_step_interval == 0;
        if on_interval || is_last_step {
            let head_valid = head.valid();

            if let Some(train) = evaluate_batch(&head_valid, &eval_batcher, &batch)? {
                tracing::info!("Step {}: Train accuracy = {:.2}%", step, train.accuracy * 100.0);
                tracing::info!("Step {}: Cross entropy = {:.6}", step, train.cross_entropy);
                outcome.train_accuracy = Some(train.accuracy);
                outcome.cross_entropy  = Some(train.cross_entropy);
            }

            let validation_batch = sampler.cached_bottlenecks(
                lists,
                SampleSize::from(cfg.validation_batch_size),
                Category::Validation,
            )?;
            match evaluate_batch(&head_valid, &eval_batcher, &validation_batch)? {
                Some(validation) => {
                    tracing::info!(
                        "Step {}: Validation accuracy = {:.1}% (N={})",
                        step, validation.accuracy * 100.0, validation.sample_count()
                    );
                    outcome.validation_accuracy = Some(validation.accuracy);
                }
                None => tracing::warn!("Step {}: no validation images to evaluate", step),
            }
        }

        let frequency = cfg.intermediate_store_frequency;
        if frequency > 0 && step > 0 && step % frequency == 0 {
            checkpoints.save_intermediate(&head, step)?;
        }
    }

    // ── Final test evaluation ─────────────────────────────────────────────────
    let head_valid = head.valid();
    let test_batch = sampler.cached_bottlenecks(lists, SampleSize::from(cfg.test_batch_size), Category::Testing)?;

    match evaluate_batch(&head_valid, &eval_batcher, &test_batch)? {
        Some(test) => {
            tracing::info!("Final test accuracy = {:.2}% (N={})", test.accuracy * 100.0, test.sample_count());
            outcome.test_accuracy = Some(test.accuracy);
            outcome.test_count    = test.sample_count();

            if cfg.print_misclassified_test_images {
                outcome.misclassified = misclassified(lists, &test_batch, &test);
                tracing::info!("=== MISCLASSIFIED TEST IMAGES ===");
                for m in &outcome.misclassified {
                    tracing::info!("{:>70}  {}", m.path.display(), m.predicted);
                }
            }
        }
        None => tracing::warn!("No test images; skipping final test evaluation"),
    }

    Ok(TrainedHead { head, outcome })
}

fn evaluate_batch<B: Backend>(
    head:    &ClassifierHead<B>,
    batcher: &BottleneckBatcher<B>,
    batch:   &BottleneckBatch,
) -> Result<Option<Evaluation>> {
    if batch.is_empty() {
        return Ok(None);
    }
    Ok(Some(head.evaluate(batcher.batch(batch)?)))
}

fn misclassified(lists: &ImageLists, batch: &BottleneckBatch, evaluation: &Evaluation) -> Vec<Misclassified> {
    evaluation
        .predictions
        .iter()
        .zip(&batch.label_indices)
        .zip(&batch.filenames)
        .filter(|((predicted, expected), _)| predicted != expected)
        .map(|((&predicted, _), path)| Misclassified {
            path:      path.clone(),
            predicted: lists
                .by_index(predicted)
                .map(|p| p.label.clone())
                .unwrap_or_default(),
        })
        .collect()
}
