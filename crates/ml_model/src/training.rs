//! Training loop for the MLP classifier.

use std::sync::{Mutex, PoisonError};

use anyhow::ensure;
use burn::backend::ndarray::NdArrayDevice;
use burn::module::AutodiffModule;
use burn::nn::loss::{CrossEntropyLoss, CrossEntropyLossConfig};
use burn::optim::decay::WeightDecayConfig;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::prelude::*;
use burn::tensor::ElementConversion;
use ndarray::{Array1, Array2};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::mlp::{InferenceBackend, MlpConfig, MlpNetwork, TrainBackend};
use crate::split::stratified_indices;

/// The backend RNG is process-global; seeding and weight init must not
/// interleave with another training run.
static INIT_LOCK: Mutex<()> = Mutex::new(());

/// Output from training.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingOutput {
    /// Mean training loss of the last completed epoch.
    pub final_train_loss: f64,
    /// Lowest validation loss seen, if a validation split was possible.
    pub best_valid_loss: Option<f64>,
    /// Number of epochs completed.
    pub epochs_completed: usize,
    /// True if training stopped before `max_epochs`.
    pub stopped_early: bool,
}

/// A batch of inputs and class targets.
#[derive(Debug, Clone)]
pub struct HeartBatch<B: Backend> {
    /// Shape `[batch, n_features]`.
    pub inputs: Tensor<B, 2>,
    /// Shape `[batch]`.
    pub targets: Tensor<B, 1, Int>,
}

/// Turns `ndarray` rows into backend tensors.
#[derive(Debug, Clone)]
pub struct HeartBatcher<B: Backend> {
    device: B::Device,
}

impl<B: Backend> HeartBatcher<B> {
    pub const fn new(device: B::Device) -> Self {
        Self { device }
    }

    /// All rows of `x` as a float tensor.
    #[allow(clippy::cast_possible_truncation)]
    pub fn inputs(&self, x: &Array2<f64>) -> Tensor<B, 2> {
        let values: Vec<f32> = x.iter().map(|&v| v as f32).collect();
        Tensor::from_data(TensorData::new(values, [x.nrows(), x.ncols()]), &self.device)
    }

    /// The rows of `x` and `y` at `indices`, in that order.
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    pub fn batch(&self, x: &Array2<f64>, y: &Array1<usize>, indices: &[usize]) -> HeartBatch<B> {
        let n_features = x.ncols();
        let mut values = Vec::with_capacity(indices.len() * n_features);
        let mut labels = Vec::with_capacity(indices.len());

        for &i in indices {
            values.extend(x.row(i).iter().map(|&v| v as f32));
            labels.push(y[i] as i64);
        }

        let inputs = Tensor::from_data(
            TensorData::new(values, [indices.len(), n_features]),
            &self.device,
        );
        let targets = Tensor::from_data(TensorData::new(labels, [indices.len()]), &self.device);

        HeartBatch { inputs, targets }
    }
}

/// Trains a fresh network on `x`/`y`.
///
/// Uses Adam with weight decay and cross-entropy loss. A stratified
/// `validation_fraction` of the rows is held out; training stops once the
/// validation loss has not improved by `tolerance` for `patience` epochs and
/// the best weights are returned. If the rows are too few to stratify, the
/// training loss drives the stopping rule instead.
///
/// Weight initialization and epoch shuffles are seeded with `seed`.
///
/// # Errors
///
/// Returns an error for empty input, mismatched lengths, or labels outside
/// `0..n_classes`.
#[allow(clippy::cast_precision_loss)]
pub fn train(
    x: &Array2<f64>,
    y: &Array1<usize>,
    config: &MlpConfig,
    seed: u64,
) -> anyhow::Result<(MlpNetwork<InferenceBackend>, TrainingOutput)> {
    ensure!(x.nrows() > 0, "No training data provided");
    ensure!(
        x.nrows() == y.len(),
        "Training data has {} rows but {} labels",
        x.nrows(),
        y.len()
    );
    ensure!(
        y.iter().all(|&label| label < config.n_classes),
        "Labels must be below {}",
        config.n_classes
    );

    let device = NdArrayDevice::default();
    let mut model = init_network::<TrainBackend>(&device, x.ncols(), config, Some(seed));

    let labels = y.to_vec();
    let (train_indices, valid_indices) =
        match stratified_indices(&labels, config.validation_fraction, seed) {
            Ok((train, valid)) => (train, Some(valid)),
            Err(err) => {
                debug!(error = %err, "No validation split, stopping on training loss");
                ((0..labels.len()).collect(), None)
            }
        };

    let batcher = HeartBatcher::<TrainBackend>::new(device);
    let valid_batcher = HeartBatcher::<InferenceBackend>::new(device);
    let valid_batch = valid_indices
        .as_deref()
        .map(|indices| valid_batcher.batch(x, y, indices));

    let mut optimizer = AdamConfig::new()
        .with_weight_decay(Some(WeightDecayConfig::new(config.weight_decay)))
        .init();
    let loss_fn = CrossEntropyLossConfig::new().init(&device);
    let valid_loss_fn = CrossEntropyLossConfig::new().init(&device);

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let batch_size = config.batch_size.clamp(1, train_indices.len());
    let mut order = train_indices;

    let mut best_score = f64::INFINITY;
    let mut best_model: Option<MlpNetwork<TrainBackend>> = None;
    let mut best_valid_loss = None;
    let mut epochs_without_improvement = 0;
    let mut final_train_loss = 0.0;
    let mut epochs_completed = 0;
    let mut stopped_early = false;

    for epoch in 0..config.max_epochs {
        order.shuffle(&mut rng);

        let mut weighted_loss = 0.0;
        for chunk in order.chunks(batch_size) {
            let batch = batcher.batch(x, y, chunk);
            let logits = model.forward(batch.inputs);
            let loss = loss_fn.forward(logits, batch.targets);

            weighted_loss += scalar(loss.clone()) * chunk.len() as f64;

            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optimizer.step(config.learning_rate, model, grads);
        }

        final_train_loss = weighted_loss / order.len() as f64;
        epochs_completed = epoch + 1;

        let score = match &valid_batch {
            Some(batch) => {
                let valid_loss = validation_loss(&model.valid(), batch, &valid_loss_fn);
                best_valid_loss = Some(best_valid_loss.map_or(valid_loss, |b: f64| b.min(valid_loss)));
                valid_loss
            }
            None => final_train_loss,
        };

        if score < best_score - config.tolerance {
            best_score = score;
            best_model = Some(model.clone());
            epochs_without_improvement = 0;
        } else {
            epochs_without_improvement += 1;
        }

        if epoch % 50 == 0 {
            log_progress(epochs_completed, final_train_loss, best_valid_loss);
        }

        if epochs_without_improvement >= config.patience {
            debug!(
                epoch = epochs_completed,
                patience = config.patience,
                "Early stopping triggered"
            );
            stopped_early = true;
            break;
        }
    }

    let model = best_model.unwrap_or(model);
    Ok((
        model.valid(),
        TrainingOutput {
            final_train_loss,
            best_valid_loss,
            epochs_completed,
            stopped_early,
        },
    ))
}

/// Builds a network under the init lock, reseeding the backend first when
/// `seed` is given.
pub(crate) fn init_network<B: Backend>(
    device: &B::Device,
    n_features: usize,
    config: &MlpConfig,
    seed: Option<u64>,
) -> MlpNetwork<B> {
    let _guard = INIT_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(seed) = seed {
        B::seed(seed);
    }
    MlpNetwork::new(device, n_features, config)
}

fn validation_loss(
    model: &MlpNetwork<InferenceBackend>,
    batch: &HeartBatch<InferenceBackend>,
    loss_fn: &CrossEntropyLoss<InferenceBackend>,
) -> f64 {
    let logits = model.forward(batch.inputs.clone());
    scalar(loss_fn.forward(logits, batch.targets.clone()))
}

fn scalar<B: Backend>(tensor: Tensor<B, 1>) -> f64 {
    tensor.into_scalar().elem::<f64>()
}

fn log_progress(epoch: usize, train_loss: f64, valid_loss: Option<f64>) {
    if let Some(vl) = valid_loss {
        debug!("Epoch {epoch}: train_loss = {train_loss:.6}, valid_loss = {vl:.6}");
    } else {
        debug!("Epoch {epoch}: train_loss = {train_loss:.6}");
    }
}
