//! Feed-forward network classifier built on Burn.

use std::path::Path;

use anyhow::{anyhow, ensure};
use burn::backend::ndarray::NdArrayDevice;
use burn::backend::{Autodiff, NdArray};
use burn::nn::{Linear, LinearConfig, Relu};
use burn::prelude::*;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use burn::tensor::activation::softmax;
use ndarray::{Array1, Array2};

use crate::metrics::POSITIVE_LABEL;
use crate::training::{self, HeartBatcher};
use crate::Classifier;

/// Backend used for inference and persistence.
pub type InferenceBackend = NdArray;

/// Backend used while fitting.
pub type TrainBackend = Autodiff<NdArray>;

/// Hyperparameters of the network and its optimizer.
#[derive(Debug, Clone)]
pub struct MlpConfig {
    /// Units in the first hidden layer.
    pub hidden_size_1: usize,
    /// Units in the second hidden layer.
    pub hidden_size_2: usize,
    /// Output logits, one per class.
    pub n_classes: usize,
    /// Adam step size.
    pub learning_rate: f64,
    /// L2 penalty applied through the optimizer.
    pub weight_decay: f32,
    /// Upper bound on passes over the training rows.
    pub max_epochs: usize,
    /// Rows per minibatch, capped at the training size.
    pub batch_size: usize,
    /// Share of the training rows held out to drive early stopping.
    pub validation_fraction: f64,
    /// Epochs without improvement before training stops.
    pub patience: usize,
    /// Minimum loss decrease that counts as an improvement.
    pub tolerance: f64,
}

impl Default for MlpConfig {
    fn default() -> Self {
        Self {
            hidden_size_1: 100,
            hidden_size_2: 50,
            n_classes: 2,
            learning_rate: 1e-3,
            weight_decay: 1e-4,
            max_epochs: 1000,
            batch_size: 200,
            validation_fraction: 0.1,
            patience: 10,
            tolerance: 1e-4,
        }
    }
}

/// Two ReLU hidden layers followed by a linear logit layer.
#[derive(Module, Debug)]
pub struct MlpNetwork<B: Backend> {
    linear1: Linear<B>,
    linear2: Linear<B>,
    linear_out: Linear<B>,
    activation: Relu,
}

impl<B: Backend> MlpNetwork<B> {
    pub fn new(device: &B::Device, n_features: usize, config: &MlpConfig) -> Self {
        Self {
            linear1: LinearConfig::new(n_features, config.hidden_size_1).init(device),
            linear2: LinearConfig::new(config.hidden_size_1, config.hidden_size_2).init(device),
            linear_out: LinearConfig::new(config.hidden_size_2, config.n_classes).init(device),
            activation: Relu::new(),
        }
    }

    /// Maps `[batch, n_features]` inputs to `[batch, n_classes]` logits.
    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self.linear1.forward(input);
        let x = self.activation.forward(x);
        let x = self.linear2.forward(x);
        let x = self.activation.forward(x);
        self.linear_out.forward(x)
    }
}

/// Fitted network plus the input width it expects.
#[derive(Debug, Clone)]
pub struct MlpClassifier {
    network: MlpNetwork<InferenceBackend>,
    n_features: usize,
}

impl MlpClassifier {
    /// Trains a network with the default configuration.
    ///
    /// # Errors
    ///
    /// See [`training::train`].
    pub fn fit(x: &Array2<f64>, y: &Array1<usize>, seed: u64) -> anyhow::Result<Self> {
        Self::fit_with(x, y, &MlpConfig::default(), seed)
    }

    /// Trains a network with an explicit configuration.
    ///
    /// # Errors
    ///
    /// See [`training::train`].
    pub fn fit_with(
        x: &Array2<f64>,
        y: &Array1<usize>,
        config: &MlpConfig,
        seed: u64,
    ) -> anyhow::Result<Self> {
        let (network, output) = training::train(x, y, config, seed)?;
        tracing::debug!(
            epochs = output.epochs_completed,
            train_loss = output.final_train_loss,
            valid_loss = ?output.best_valid_loss,
            "MLP training finished"
        );

        Ok(Self {
            network,
            n_features: x.ncols(),
        })
    }

    #[must_use]
    pub const fn n_features(&self) -> usize {
        self.n_features
    }

    /// Writes the weights as a named MessagePack record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be written.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        self.network
            .clone()
            .save_file(path, &recorder)
            .map_err(|e| anyhow!("Failed to save MLP to {}: {e:?}", path.display()))
    }

    /// Restores weights written by [`MlpClassifier::save`].
    ///
    /// The record does not carry the input width, so it must be supplied.
    ///
    /// # Errors
    ///
    /// Returns an error if the record is missing or does not match the
    /// network shape.
    pub fn load(path: &Path, n_features: usize) -> anyhow::Result<Self> {
        let device = NdArrayDevice::default();
        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        let network = training::init_network::<InferenceBackend>(
            &device,
            n_features,
            &MlpConfig::default(),
            None,
        )
        .load_file(path, &recorder, &device)
        .map_err(|e| anyhow!("Failed to load MLP from {}: {e:?}", path.display()))?;

        Ok(Self {
            network,
            n_features,
        })
    }

    /// `None` for an empty batch.
    fn logits(&self, x: &Array2<f64>) -> anyhow::Result<Option<Tensor<InferenceBackend, 2>>> {
        ensure!(
            x.ncols() == self.n_features,
            "MLP was fitted on {} features, got {}",
            self.n_features,
            x.ncols()
        );
        if x.nrows() == 0 {
            return Ok(None);
        }
        let batcher = HeartBatcher::<InferenceBackend>::new(NdArrayDevice::default());
        Ok(Some(self.network.forward(batcher.inputs(x))))
    }
}

impl Classifier for MlpClassifier {
    fn predict(&self, x: &Array2<f64>) -> anyhow::Result<Array1<usize>> {
        let Some(logits) = self.logits(x)? else {
            return Ok(Array1::zeros(0));
        };

        let labels = logits
            .argmax(1)
            .flatten::<1>(0, 1)
            .into_data()
            .convert::<i64>()
            .to_vec::<i64>()
            .map_err(|e| anyhow!("Failed to read MLP output: {e:?}"))?;

        Ok(labels
            .into_iter()
            .map(|label| usize::try_from(label).unwrap_or(0))
            .collect())
    }

    /// Softmax of the logits, positive column.
    fn predict_proba(&self, x: &Array2<f64>) -> anyhow::Result<Array1<f64>> {
        let Some(logits) = self.logits(x)? else {
            return Ok(Array1::zeros(0));
        };

        let probabilities = softmax(logits, 1)
            .slice([0..x.nrows(), POSITIVE_LABEL..POSITIVE_LABEL + 1])
            .flatten::<1>(0, 1)
            .into_data()
            .convert::<f64>()
            .to_vec::<f64>()
            .map_err(|e| anyhow!("Failed to read MLP output: {e:?}"))?;

        Ok(Array1::from(probabilities))
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    fn clusters() -> (Array2<f64>, Array1<usize>) {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..20 {
            let label = i % 2;
            let offset = if label == 1 { 1.5 } else { -1.5 };
            let jitter = i as f64 * 0.01;
            rows.extend_from_slice(&[offset + jitter, offset - jitter]);
            labels.push(label);
        }
        (
            Array2::from_shape_vec((20, 2), rows).expect("shape"),
            Array1::from(labels),
        )
    }

    #[test]
    fn test_network_output_shape() {
        let device = NdArrayDevice::default();
        let network = training::init_network::<InferenceBackend>(
            &device,
            13,
            &MlpConfig::default(),
            None,
        );
        let input = Tensor::<InferenceBackend, 2>::zeros([4, 13], &device);

        assert_eq!(network.forward(input).dims(), [4, 2]);
    }

    #[test]
    fn test_learns_separable_clusters() {
        let (x, y) = clusters();
        let mlp = MlpClassifier::fit(&x, &y, 42).expect("fit");

        let predictions = mlp.predict(&array![[-1.5, -1.5], [1.5, 1.5]]).expect("predict");
        assert_eq!(predictions, array![0, 1]);
    }

    #[test]
    fn test_save_and_load_reproduce_predictions() {
        let (x, y) = clusters();
        let config = MlpConfig {
            max_epochs: 20,
            ..MlpConfig::default()
        };
        let mlp = MlpClassifier::fit_with(&x, &y, &config, 7).expect("fit");

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("mlp.mpk");
        mlp.save(&path).expect("save");
        assert!(path.exists());

        let restored = MlpClassifier::load(&path, 2).expect("load");
        assert_eq!(restored.n_features(), mlp.n_features());
        assert_eq!(
            restored.predict(&x).expect("predict"),
            mlp.predict(&x).expect("predict")
        );
        assert_eq!(
            restored.predict_proba(&x).expect("proba"),
            mlp.predict_proba(&x).expect("proba")
        );
    }

    #[test]
    fn test_probabilities_agree_with_labels() {
        let (x, y) = clusters();
        let config = MlpConfig {
            max_epochs: 30,
            ..MlpConfig::default()
        };
        let mlp = MlpClassifier::fit_with(&x, &y, &config, 3).expect("fit");
        assert_eq!(mlp.n_features(), 2);

        let probabilities = mlp.predict_proba(&x).expect("proba");
        let labels = mlp.predict(&x).expect("predict");
        assert_eq!(probabilities.len(), x.nrows());
        for (p, label) in probabilities.iter().zip(labels.iter()) {
            assert!((0.0..=1.0).contains(p));
            // Ties in the logits resolve to label 0.
            if (p - 0.5).abs() > 1e-6 {
                assert_eq!(*p > 0.5, *label == 1);
            }
        }
    }

    #[test]
    fn test_rejects_wrong_width() {
        let (x, y) = clusters();
        let config = MlpConfig {
            max_epochs: 1,
            ..MlpConfig::default()
        };
        let mlp = MlpClassifier::fit_with(&x, &y, &config, 1).expect("fit");
        assert!(mlp.predict(&array![[0.0, 0.0, 0.0]]).is_err());
    }
}
