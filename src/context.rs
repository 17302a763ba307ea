use crate::dataset::{DatasetError, GestureDataset};
use crate::engine::{EngineConfig, RecognitionEngine, Verdict};
use crate::landmarks::Landmark;
use crate::persist::{ModelStore, PersistenceError};
use crate::pipeline::{ProgressFn, TrainError, TrainingPipeline};
use crate::stability::{StabilityBuffer, StabilityConfig};
use log::{debug, warn};

/// Owns the whole recognition state: dataset, pipeline, engine, and
/// stability buffer.
///
/// The application layer holds exactly one of these and passes poses in;
/// there is no ambient global. Every dataset mutation drops any installed
/// model, so a stale classifier can never answer for data it was not
/// trained on.
#[derive(Debug, Default)]
pub struct RecognizerContext {
    dataset: GestureDataset,
    pipeline: TrainingPipeline,
    engine: RecognitionEngine,
    stability: StabilityBuffer,
}

impl RecognizerContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_configs(
        pipeline: TrainingPipeline,
        engine: EngineConfig,
        stability: StabilityConfig,
    ) -> Self {
        Self {
            dataset: GestureDataset::new(),
            pipeline,
            engine: RecognitionEngine::new(engine),
            stability: StabilityBuffer::new(stability),
        }
    }

    pub fn dataset(&self) -> &GestureDataset {
        &self.dataset
    }

    pub fn is_trained(&self) -> bool {
        self.engine.is_trained()
    }

    /// Records one pose under `name`; returns the class's new sample
    /// count. Invalidates any installed model.
    pub fn record_sample(&mut self, name: &str, pose: &[Landmark]) -> Result<usize, DatasetError> {
        let count = self.dataset.add(name, pose)?;
        self.invalidate();
        Ok(count)
    }

    /// Removes a gesture class; returns whether it existed. Invalidates
    /// any installed model on removal.
    pub fn remove_gesture(&mut self, name: &str) -> bool {
        let removed = self.dataset.remove(name);
        if removed {
            self.invalidate();
        }
        removed
    }

    /// Drops every recorded gesture and any installed model.
    pub fn clear_gestures(&mut self) {
        self.dataset.clear();
        self.invalidate();
    }

    pub fn export_dataset(&self) -> Result<String, DatasetError> {
        self.dataset.export_json()
    }

    /// Replaces the dataset from an exported payload; the previous
    /// contents (and any installed model) survive a failed import.
    pub fn import_dataset(&mut self, json: &str) -> Result<(), DatasetError> {
        self.dataset.import_json(json)?;
        self.invalidate();
        Ok(())
    }

    /// Trains on the current dataset and installs the result.
    pub fn train(&mut self, progress: Option<&mut ProgressFn<'_>>) -> Result<(), TrainError> {
        let model = self.pipeline.train(&self.dataset, progress)?;
        self.engine.install(model);
        Ok(())
    }

    /// The per-frame path: classify the pose, feed named recognitions to
    /// the stability window, and return the verdict together with an
    /// emission if one fired. "No hand detected" is simply the absence of
    /// a call.
    pub fn on_pose(&mut self, pose: &[Landmark], now_ms: u64) -> (Verdict, Option<String>) {
        let verdict = self.engine.recognize(pose);
        let emission = match &verdict {
            Verdict::Recognized { name, confidence } => {
                self.stability.observe(name, *confidence, now_ms)
            }
            _ => None,
        };
        (verdict, emission)
    }

    /// Stops detection: empties the stability window so a later restart
    /// begins from a clean slate.
    pub fn stop(&mut self) {
        self.stability.reset();
    }

    /// Persists the installed model, if any. A missing model is not an
    /// error; there is simply nothing to save.
    pub fn save_model(&self, store: &mut dyn ModelStore) -> Result<(), PersistenceError> {
        match self.engine.model() {
            Some(model) => store.save(model),
            None => {
                warn!("no trained model to save");
                Ok(())
            }
        }
    }

    /// Loads and installs a previously saved model; returns whether one
    /// was found.
    pub fn load_model(&mut self, store: &mut dyn ModelStore) -> Result<bool, PersistenceError> {
        match store.load()? {
            Some(model) => {
                self.engine.install(model);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn invalidate(&mut self) {
        if self.engine.is_trained() {
            debug!("dataset changed; dropping installed model");
            self.engine.clear();
            self.stability.reset();
        }
    }
}
