use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis, Zip};
use rand::Rng;
use rand::prelude::SliceRandom;
use rand::{RngCore, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use std::error::Error;
use std::fmt::{Display, Formatter};

const ADAM_BETA1: f32 = 0.9;
const ADAM_BETA2: f32 = 0.999;
const ADAM_EPS: f32 = 1e-8;

/// Errors that can occur while training or querying an MLP.
#[derive(Debug, Clone, PartialEq)]
pub enum MlpError {
    /// The training data is empty.
    EmptyTrainingSet,
    /// A feature vector or label list does not match the expected length.
    DimensionMismatch { expected: usize, got: usize },
    /// A training label references a class index outside the output layer.
    LabelOutOfRange { label: usize, classes: usize },
    /// Invalid hyperparameter configuration (e.g., zero batch size).
    InvalidConfig(String),
    /// The loss became NaN or infinite during training.
    NonFiniteLoss { epoch: u32 },
}

impl Display for MlpError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            MlpError::EmptyTrainingSet => write!(f, "Training data is empty"),
            MlpError::DimensionMismatch { expected, got } => {
                write!(f, "Dimension mismatch: expected {}, got {}", expected, got)
            }
            MlpError::LabelOutOfRange { label, classes } => {
                write!(f, "Label {} out of range for {} classes", label, classes)
            }
            MlpError::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
            MlpError::NonFiniteLoss { epoch } => {
                write!(f, "Loss became non-finite during epoch {}", epoch)
            }
        }
    }
}

impl Error for MlpError {}

/// Hyperparameters for a two-hidden-layer feed-forward classifier.
#[derive(Debug, Clone)]
pub struct MlpConfig {
    /// Units in the first and second hidden layers.
    pub hidden: (usize, usize),
    /// Dropout rate applied after each hidden layer during training, in [0, 1).
    pub dropout: f32,
    /// Adam learning rate.
    pub learning_rate: f32,
    /// Number of passes over the training partition.
    pub epochs: u32,
    /// Minibatch size.
    pub batch_size: usize,
}

impl Default for MlpConfig {
    fn default() -> Self {
        Self {
            hidden: (128, 64),
            dropout: 0.2,
            learning_rate: 0.001,
            epochs: 50,
            batch_size: 32,
        }
    }
}

/// Per-epoch training statistics handed to the progress callback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochStats {
    /// 1-based epoch index.
    pub epoch: u32,
    pub total: u32,
    pub train_accuracy: f32,
    /// 0.0 when the validation partition is empty.
    pub val_accuracy: f32,
}

/// One fully-connected layer. Weights are laid out `(n_in, n_out)` so a
/// batch `(B, n_in)` maps forward as `x.dot(&w) + b`.
#[derive(Debug, Clone)]
#[cfg_attr(
    feature = "serde",
    derive(serde_crate::Serialize, serde_crate::Deserialize)
)]
#[cfg_attr(feature = "serde", serde(crate = "serde_crate"))]
struct Dense {
    w: Array2<f32>,
    b: Array1<f32>,
}

/// A trained multi-layer perceptron classifier with a softmax output.
///
/// Built by [`Mlp::fit`]; immutable afterwards. Retraining produces a new
/// instance rather than updating this one in place.
#[derive(Debug, Clone)]
#[cfg_attr(
    feature = "serde",
    derive(serde_crate::Serialize, serde_crate::Deserialize)
)]
#[cfg_attr(feature = "serde", serde(crate = "serde_crate"))]
pub struct Mlp {
    layers: Vec<Dense>,
}

/// Adam first/second moment estimates for one layer.
struct LayerMoments {
    mw: Array2<f32>,
    vw: Array2<f32>,
    mb: Array1<f32>,
    vb: Array1<f32>,
}

struct AdamState {
    t: i32,
    lr: f32,
    layers: Vec<LayerMoments>,
}

impl AdamState {
    fn new(layers: &[Dense], lr: f32) -> Self {
        let layers = layers
            .iter()
            .map(|l| LayerMoments {
                mw: Array2::zeros(l.w.dim()),
                vw: Array2::zeros(l.w.dim()),
                mb: Array1::zeros(l.b.len()),
                vb: Array1::zeros(l.b.len()),
            })
            .collect();
        Self { t: 0, lr, layers }
    }

    fn begin_step(&mut self) {
        self.t += 1;
    }

    fn apply(&mut self, i: usize, layer: &mut Dense, gw: &Array2<f32>, gb: &Array1<f32>) {
        let m = &mut self.layers[i];
        adam_update(&mut layer.w, gw, &mut m.mw, &mut m.vw, self.lr, self.t);
        adam_update(&mut layer.b, gb, &mut m.mb, &mut m.vb, self.lr, self.t);
    }
}

fn adam_update<D: ndarray::Dimension>(
    param: &mut ndarray::Array<f32, D>,
    grad: &ndarray::Array<f32, D>,
    m: &mut ndarray::Array<f32, D>,
    v: &mut ndarray::Array<f32, D>,
    lr: f32,
    t: i32,
) {
    let bias1 = 1.0 - ADAM_BETA1.powi(t);
    let bias2 = 1.0 - ADAM_BETA2.powi(t);
    Zip::from(param)
        .and(grad)
        .and(m)
        .and(v)
        .for_each(|p, &g, m, v| {
            *m = ADAM_BETA1 * *m + (1.0 - ADAM_BETA1) * g;
            *v = ADAM_BETA2 * *v + (1.0 - ADAM_BETA2) * g * g;
            let m_hat = *m / bias1;
            let v_hat = *v / bias2;
            *p -= lr * m_hat / (v_hat.sqrt() + ADAM_EPS);
        });
}

fn relu(v: f32) -> f32 {
    v.max(0.0)
}

/// Row-wise softmax with the usual max-subtraction for stability.
fn softmax_rows(z: &mut Array2<f32>) {
    for mut row in z.rows_mut() {
        let max = row.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        row.mapv_inplace(|v| v / sum);
    }
}

fn argmax(row: ArrayView1<f32>) -> usize {
    let mut best = 0;
    let mut best_val = f32::NEG_INFINITY;
    for (i, &v) in row.iter().enumerate() {
        if v > best_val {
            best_val = v;
            best = i;
        }
    }
    best
}

/// Inverted dropout mask: kept units are pre-scaled by `1 / keep` so
/// inference needs no rescaling.
fn dropout_mask<R: RngCore + Rng>(dim: (usize, usize), keep: f32, rng: &mut R) -> Array2<f32> {
    Array2::from_shape_fn(dim, |_| {
        if rng.random::<f32>() < keep {
            1.0 / keep
        } else {
            0.0
        }
    })
}

/// Glorot-uniform weight initialization.
fn glorot<R: RngCore + Rng>(n_in: usize, n_out: usize, rng: &mut R) -> Array2<f32> {
    let limit = (6.0 / (n_in + n_out) as f32).sqrt();
    Array2::from_shape_fn((n_in, n_out), |_| rng.random_range(-limit..limit))
}

impl Mlp {
    /// Trains a new classifier with a specific seed for reproducibility.
    ///
    /// # Arguments
    ///
    /// * `config`: Hyperparameters (layer widths, dropout, learning rate, epochs, batch size).
    /// * `train_x` / `train_y`: Training features `(n, d)` and class indices.
    /// * `val_x` / `val_y`: Held-out partition used only for the per-epoch accuracy report;
    ///   may be empty.
    /// * `n_classes`: Width of the softmax output layer.
    /// * `seed`: Seed for weight initialization, minibatch shuffling, and dropout masks.
    /// * `on_epoch`: Invoked synchronously after every pass over the training data.
    ///
    /// # Errors
    ///
    /// Returns `MlpError` if the data is empty, shapes or labels are inconsistent,
    /// the configuration is invalid, or the loss diverges to NaN/infinity.
    pub fn fit(
        config: &MlpConfig,
        train_x: ArrayView2<f32>,
        train_y: &[usize],
        val_x: ArrayView2<f32>,
        val_y: &[usize],
        n_classes: usize,
        seed: u64,
        mut on_epoch: impl FnMut(&EpochStats),
    ) -> Result<Self, MlpError> {
        validate_fit_inputs(config, train_x, train_y, val_x, val_y, n_classes)?;

        let n_features = train_x.ncols();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let (h1, h2) = config.hidden;
        let mut net = Mlp {
            layers: vec![
                Dense {
                    w: glorot(n_features, h1, &mut rng),
                    b: Array1::zeros(h1),
                },
                Dense {
                    w: glorot(h1, h2, &mut rng),
                    b: Array1::zeros(h2),
                },
                Dense {
                    w: glorot(h2, n_classes, &mut rng),
                    b: Array1::zeros(n_classes),
                },
            ],
        };

        let mut adam = AdamState::new(&net.layers, config.learning_rate);
        let mut order: Vec<usize> = (0..train_x.nrows()).collect();

        for epoch in 1..=config.epochs {
            order.shuffle(&mut rng);

            for chunk in order.chunks(config.batch_size) {
                let xb = train_x.select(Axis(0), chunk);
                let yb: Vec<usize> = chunk.iter().map(|&i| train_y[i]).collect();
                let loss = net.train_batch(xb.view(), &yb, config.dropout, &mut adam, &mut rng);
                if !loss.is_finite() {
                    return Err(MlpError::NonFiniteLoss { epoch });
                }
            }

            let stats = EpochStats {
                epoch,
                total: config.epochs,
                train_accuracy: net.accuracy(train_x, train_y),
                val_accuracy: net.accuracy(val_x, val_y),
            };
            on_epoch(&stats);
        }

        Ok(net)
    }

    /// Number of input features the network expects.
    pub fn input_len(&self) -> usize {
        self.layers[0].w.nrows()
    }

    /// Width of the softmax output layer.
    pub fn n_classes(&self) -> usize {
        self.layers[self.layers.len() - 1].b.len()
    }

    /// Runs inference on a single feature vector, returning the class
    /// probability distribution.
    ///
    /// # Errors
    ///
    /// Returns `MlpError::DimensionMismatch` if the input width is wrong.
    pub fn predict_proba(&self, x: ArrayView1<f32>) -> Result<Array1<f32>, MlpError> {
        if x.len() != self.input_len() {
            return Err(MlpError::DimensionMismatch {
                expected: self.input_len(),
                got: x.len(),
            });
        }
        let batch = self.predict_batch(x.insert_axis(Axis(0)));
        Ok(batch.row(0).to_owned())
    }

    /// Forward pass with no dropout; one probability row per input row.
    pub fn predict_batch(&self, x: ArrayView2<f32>) -> Array2<f32> {
        let mut a = x.to_owned();
        let last = self.layers.len() - 1;
        for (i, layer) in self.layers.iter().enumerate() {
            let mut z = a.dot(&layer.w) + &layer.b;
            if i == last {
                softmax_rows(&mut z);
            } else {
                z.mapv_inplace(relu);
            }
            a = z;
        }
        a
    }

    /// Fraction of rows whose argmax matches the label; 0.0 for empty input.
    pub fn accuracy(&self, x: ArrayView2<f32>, y: &[usize]) -> f32 {
        if y.is_empty() {
            return 0.0;
        }
        let probs = self.predict_batch(x);
        let hits = probs
            .rows()
            .into_iter()
            .zip(y)
            .filter(|&(ref row, &label)| argmax(row.view()) == label)
            .count();
        hits as f32 / y.len() as f32
    }

    /// One forward/backward pass over a minibatch; returns the mean
    /// cross-entropy loss before the update.
    fn train_batch<R: RngCore + Rng>(
        &mut self,
        x: ArrayView2<f32>,
        y: &[usize],
        dropout: f32,
        adam: &mut AdamState,
        rng: &mut R,
    ) -> f32 {
        let last = self.layers.len() - 1;
        let batch = x.nrows() as f32;

        // Forward, keeping pre-activations and dropout masks for backprop.
        let mut activations: Vec<Array2<f32>> = vec![x.to_owned()];
        let mut pre_acts: Vec<Array2<f32>> = Vec::with_capacity(self.layers.len());
        let mut masks: Vec<Option<Array2<f32>>> = Vec::with_capacity(self.layers.len());
        for (i, layer) in self.layers.iter().enumerate() {
            let z = activations[i].dot(&layer.w) + &layer.b;
            if i == last {
                let mut p = z.clone();
                softmax_rows(&mut p);
                pre_acts.push(z);
                masks.push(None);
                activations.push(p);
            } else {
                let mut a = z.mapv(relu);
                let mask = if dropout > 0.0 {
                    let m = dropout_mask(a.dim(), 1.0 - dropout, rng);
                    a *= &m;
                    Some(m)
                } else {
                    None
                };
                pre_acts.push(z);
                masks.push(mask);
                activations.push(a);
            }
        }

        let probs = &activations[last + 1];
        let loss = -y
            .iter()
            .enumerate()
            .map(|(r, &label)| probs[[r, label]].max(f32::MIN_POSITIVE).ln())
            .sum::<f32>()
            / batch;

        // Softmax + cross-entropy gradient at the output.
        let mut delta = probs.clone();
        for (r, &label) in y.iter().enumerate() {
            delta[[r, label]] -= 1.0;
        }
        delta /= batch;

        adam.begin_step();
        for i in (0..self.layers.len()).rev() {
            let gw = activations[i].t().dot(&delta);
            let gb = delta.sum_axis(Axis(0));
            let next_delta = if i > 0 {
                let mut d = delta.dot(&self.layers[i].w.t());
                Zip::from(&mut d).and(&pre_acts[i - 1]).for_each(|d, &z| {
                    if z <= 0.0 {
                        *d = 0.0;
                    }
                });
                if let Some(mask) = &masks[i - 1] {
                    d *= mask;
                }
                Some(d)
            } else {
                None
            };
            adam.apply(i, &mut self.layers[i], &gw, &gb);
            if let Some(d) = next_delta {
                delta = d;
            }
        }

        loss
    }
}

fn validate_fit_inputs(
    config: &MlpConfig,
    train_x: ArrayView2<f32>,
    train_y: &[usize],
    val_x: ArrayView2<f32>,
    val_y: &[usize],
    n_classes: usize,
) -> Result<(), MlpError> {
    if n_classes < 2 {
        return Err(MlpError::InvalidConfig(format!(
            "need at least 2 output classes, got {}",
            n_classes
        )));
    }
    if config.batch_size == 0 {
        return Err(MlpError::InvalidConfig("batch size must be > 0".into()));
    }
    if !(0.0..1.0).contains(&config.dropout) {
        return Err(MlpError::InvalidConfig(format!(
            "dropout must be in [0, 1), got {}",
            config.dropout
        )));
    }
    if config.learning_rate <= 0.0 || !config.learning_rate.is_finite() {
        return Err(MlpError::InvalidConfig(format!(
            "learning rate must be positive, got {}",
            config.learning_rate
        )));
    }
    if config.hidden.0 == 0 || config.hidden.1 == 0 {
        return Err(MlpError::InvalidConfig("hidden layers must be non-empty".into()));
    }
    if train_x.nrows() == 0 {
        return Err(MlpError::EmptyTrainingSet);
    }
    if train_y.len() != train_x.nrows() {
        return Err(MlpError::DimensionMismatch {
            expected: train_x.nrows(),
            got: train_y.len(),
        });
    }
    if val_y.len() != val_x.nrows() {
        return Err(MlpError::DimensionMismatch {
            expected: val_x.nrows(),
            got: val_y.len(),
        });
    }
    if val_x.nrows() > 0 && val_x.ncols() != train_x.ncols() {
        return Err(MlpError::DimensionMismatch {
            expected: train_x.ncols(),
            got: val_x.ncols(),
        });
    }
    for &label in train_y.iter().chain(val_y) {
        if label >= n_classes {
            return Err(MlpError::LabelOutOfRange {
                label,
                classes: n_classes,
            });
        }
    }
    Ok(())
}
