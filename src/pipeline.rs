use crate::centroid::CentroidModel;
use crate::dataset::GestureDataset;
use crate::landmarks::FEATURE_LEN;
use log::{debug, info};
use mlp::{Mlp, MlpConfig, MlpError};
use ndarray::{Array2, Axis};
use rand::prelude::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors that can occur during a training run.
#[derive(Debug, Clone, PartialEq)]
pub enum TrainError {
    /// Training needs at least two classes with samples.
    InsufficientClasses(usize),
    /// A training run is already active; runs never queue.
    AlreadyRunning,
    /// The underlying classifier failed to train.
    Mlp(MlpError),
}

impl Display for TrainError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TrainError::InsufficientClasses(n) => {
                write!(f, "Need at least 2 gestures with samples to train, have {}", n)
            }
            TrainError::AlreadyRunning => write!(f, "Training already in progress"),
            TrainError::Mlp(e) => write!(f, "Training failed: {}", e),
        }
    }
}

impl Error for TrainError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TrainError::Mlp(e) => Some(e),
            _ => None,
        }
    }
}

impl From<MlpError> for TrainError {
    fn from(e: MlpError) -> Self {
        TrainError::Mlp(e)
    }
}

/// Callback reporting `(epoch, total_epochs, train_accuracy, val_accuracy)`
/// after each pass. Knows nothing about any rendering target.
pub type ProgressFn<'a> = dyn FnMut(u32, u32, f32, f32) + 'a;

/// The atomic product of a completed training run.
///
/// Owns the classifier and its companion centroid model; installed and
/// replaced wholesale, never mutated incrementally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedModel {
    /// Sorted gesture names; classifier output index i is `labels[i]`.
    pub labels: Vec<String>,
    pub mlp: Mlp,
    pub centroids: CentroidModel,
}

/// Orchestrates a training run: label derivation, dataset snapshot,
/// shuffled 80/20 split, classifier fit, and centroid computation.
#[derive(Debug)]
pub struct TrainingPipeline {
    model_config: MlpConfig,
    train_split: f32,
    seed: u64,
    running: Cell<bool>,
}

impl Default for TrainingPipeline {
    fn default() -> Self {
        Self::new(MlpConfig::default(), rand::random())
    }
}

/// Clears the reentrancy flag on every exit path, error paths included.
struct RunGuard<'a>(&'a Cell<bool>);

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a Cell<bool>) -> Option<Self> {
        if flag.get() {
            return None;
        }
        flag.set(true);
        Some(RunGuard(flag))
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl TrainingPipeline {
    pub fn new(model_config: MlpConfig, seed: u64) -> Self {
        Self {
            model_config,
            train_split: 0.8,
            seed,
            running: Cell::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.get()
    }

    /// Runs one full training pass over a snapshot of `dataset`.
    ///
    /// Samples are flattened in sorted label order, shuffled with the
    /// pipeline's seeded RNG, and split 80/20 into train/validation.
    /// (The shuffle is deliberate: splitting the label-ordered list
    /// unshuffled can leave whole classes out of either partition.)
    /// `progress`, when supplied, is invoked synchronously after every
    /// epoch. On success the centroids are computed over the full unsplit
    /// dataset and returned together with the classifier; on error no
    /// partial model escapes.
    ///
    /// # Errors
    ///
    /// `TrainError::AlreadyRunning` if a run is active (including a
    /// reentrant call from inside `progress`),
    /// `TrainError::InsufficientClasses` for fewer than two non-empty
    /// classes, and `TrainError::Mlp` for classifier failures.
    pub fn train(
        &self,
        dataset: &GestureDataset,
        mut progress: Option<&mut ProgressFn<'_>>,
    ) -> Result<TrainedModel, TrainError> {
        let _guard = RunGuard::acquire(&self.running).ok_or(TrainError::AlreadyRunning)?;

        let labels = dataset.labels();
        if labels.len() < 2 {
            return Err(TrainError::InsufficientClasses(labels.len()));
        }

        // Snapshot: training never reads the live dataset after this point.
        let total: usize = labels
            .iter()
            .map(|name| dataset.samples(name).map_or(0, |s| s.len()))
            .sum();
        let mut x = Array2::<f32>::zeros((total, FEATURE_LEN));
        let mut y = Vec::with_capacity(total);
        let mut row = 0;
        for (index, name) in labels.iter().enumerate() {
            for sample in dataset.samples(name).unwrap_or(&[]) {
                x.row_mut(row).assign(sample);
                y.push(index);
                row += 1;
            }
        }

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.seed);
        let mut order: Vec<usize> = (0..total).collect();
        order.shuffle(&mut rng);
        let split = ((total as f32 * self.train_split) as usize).clamp(1, total);
        let (train_idx, val_idx) = order.split_at(split);

        let train_x = x.select(Axis(0), train_idx);
        let train_y: Vec<usize> = train_idx.iter().map(|&i| y[i]).collect();
        let val_x = x.select(Axis(0), val_idx);
        let val_y: Vec<usize> = val_idx.iter().map(|&i| y[i]).collect();

        info!(
            "training on {} samples, validating on {} ({} classes)",
            train_x.nrows(),
            val_x.nrows(),
            labels.len()
        );

        let mlp = Mlp::fit(
            &self.model_config,
            train_x.view(),
            &train_y,
            val_x.view(),
            &val_y,
            labels.len(),
            rng.random(),
            |stats| {
                debug!(
                    "epoch {}/{}: acc={:.3}, val_acc={:.3}",
                    stats.epoch, stats.total, stats.train_accuracy, stats.val_accuracy
                );
                if let Some(cb) = progress.as_mut() {
                    cb(stats.epoch, stats.total, stats.train_accuracy, stats.val_accuracy);
                }
            },
        )?;

        let centroids = CentroidModel::from_dataset(dataset);
        info!("training complete: {} classes, {} centroids", labels.len(), centroids.len());

        Ok(TrainedModel {
            labels,
            mlp,
            centroids,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{synthetic_pose, two_class_dataset};

    fn fast_pipeline() -> TrainingPipeline {
        let config = MlpConfig {
            hidden: (32, 16),
            epochs: 25,
            ..MlpConfig::default()
        };
        TrainingPipeline::new(config, 42)
    }

    #[test]
    fn test_insufficient_classes() {
        let pipeline = fast_pipeline();
        let mut dataset = GestureDataset::new();
        assert_eq!(
            pipeline.train(&dataset, None).unwrap_err(),
            TrainError::InsufficientClasses(0)
        );
        dataset.add("only", &synthetic_pose(1.0, 0)).unwrap();
        assert_eq!(
            pipeline.train(&dataset, None).unwrap_err(),
            TrainError::InsufficientClasses(1)
        );
    }

    #[test]
    fn test_train_produces_labels_and_centroids() {
        let pipeline = fast_pipeline();
        let dataset = two_class_dataset(20);
        let model = pipeline.train(&dataset, None).expect("training should succeed");

        assert_eq!(model.labels, vec!["fist", "open"]);
        assert_eq!(model.mlp.n_classes(), 2);
        for name in &model.labels {
            assert!(model.centroids.get(name).is_some(), "missing centroid for {}", name);
        }
        assert!(!pipeline.is_running());
    }

    #[test]
    fn test_progress_reports_every_epoch() {
        let pipeline = fast_pipeline();
        let dataset = two_class_dataset(10);
        let mut epochs = Vec::new();
        let mut cb = |epoch: u32, total: u32, _train: f32, _val: f32| {
            assert_eq!(total, 25);
            epochs.push(epoch);
        };
        pipeline.train(&dataset, Some(&mut cb)).unwrap();
        let expected: Vec<u32> = (1..=25).collect();
        assert_eq!(epochs, expected);
    }

    #[test]
    fn test_reentrant_train_from_progress_callback_fails() {
        let pipeline = fast_pipeline();
        let dataset = two_class_dataset(10);
        let mut reentrant: Vec<Result<TrainedModel, TrainError>> = Vec::new();
        {
            let mut cb = |epoch: u32, _: u32, _: f32, _: f32| {
                if epoch == 1 {
                    reentrant.push(pipeline.train(&dataset, None));
                }
            };
            pipeline.train(&dataset, Some(&mut cb)).unwrap();
        }
        assert!(matches!(reentrant.as_slice(), [Err(TrainError::AlreadyRunning)]));
        assert!(!pipeline.is_running());
    }

    #[test]
    fn test_same_seed_reproduces_model() {
        let dataset = two_class_dataset(15);
        let a = fast_pipeline().train(&dataset, None).unwrap();
        let b = fast_pipeline().train(&dataset, None).unwrap();
        let query = crate::landmarks::normalize(&synthetic_pose(1.0, 3)).unwrap();
        let pa = a.mlp.predict_proba(query.view()).unwrap();
        let pb = b.mlp.predict_proba(query.view()).unwrap();
        assert_eq!(pa, pb);
    }

    #[test]
    fn test_end_to_end_recognizes_training_sample() {
        let pipeline = fast_pipeline();
        let dataset = two_class_dataset(20);
        let model = pipeline.train(&dataset, None).unwrap();

        let query = crate::landmarks::normalize(&synthetic_pose(1.0, 5)).unwrap();
        let probs = model.mlp.predict_proba(query.view()).unwrap();
        let best = probs
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(model.labels[best], "open");
        assert!(probs[best] > 0.5, "confidence {} too low", probs[best]);
    }
}
