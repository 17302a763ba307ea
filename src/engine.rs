use crate::landmarks::{self, Landmark};
use crate::pipeline::TrainedModel;
use log::{debug, warn};
use ndarray::ArrayView1;

/// Tunables for per-frame recognition.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Maximum allowed Euclidean distance from the predicted class's
    /// centroid before a result is rejected as an outlier. Sensitive to
    /// the producer's coordinate units; tune, do not derive.
    pub max_centroid_distance: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_centroid_distance: 10.0,
        }
    }
}

/// Per-frame recognition result.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// The classifier picked a known gesture.
    Recognized { name: String, confidence: f32 },
    /// Classified confidently but too far from the class centroid.
    Uncertain { distance: f32 },
    /// No trained model installed, or the pose was malformed.
    NoModel,
    /// Inference failed; the frame is dropped, the loop continues.
    PredictionFailed,
}

impl Verdict {
    /// Stable sentinel strings for display and interop.
    pub fn label(&self) -> &str {
        match self {
            Verdict::Recognized { name, .. } => name,
            Verdict::Uncertain { .. } => "uncertain",
            Verdict::NoModel => "no_model_trained",
            Verdict::PredictionFailed => "prediction_error",
        }
    }

    pub fn confidence(&self) -> f32 {
        match self {
            Verdict::Recognized { confidence, .. } => *confidence,
            _ => 0.0,
        }
    }
}

/// Runs the trained classifier on incoming poses.
///
/// Holds the one installed [`TrainedModel`]; recognition is read-only and
/// absorbs every per-frame failure into a sentinel verdict rather than
/// propagating it to the detection loop.
#[derive(Debug, Default)]
pub struct RecognitionEngine {
    config: EngineConfig,
    model: Option<TrainedModel>,
}

impl RecognitionEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            model: None,
        }
    }

    /// Installs a freshly trained model, replacing any prior one.
    pub fn install(&mut self, model: TrainedModel) {
        debug!("installing model with {} classes", model.labels.len());
        self.model = Some(model);
    }

    /// Drops the installed model; subsequent verdicts are `NoModel`.
    pub fn clear(&mut self) {
        self.model = None;
    }

    pub fn is_trained(&self) -> bool {
        self.model.is_some()
    }

    pub fn model(&self) -> Option<&TrainedModel> {
        self.model.as_ref()
    }

    /// Classifies one pose.
    ///
    /// Returns `NoModel` without a trained model or for malformed poses,
    /// `Uncertain` when the winner lies beyond the centroid threshold, and
    /// `PredictionFailed` for any internal inference failure.
    pub fn recognize(&self, pose: &[Landmark]) -> Verdict {
        let Some(model) = &self.model else {
            return Verdict::NoModel;
        };
        let Ok(features) = landmarks::normalize(pose) else {
            return Verdict::NoModel;
        };

        let probs = match model.mlp.predict_proba(features.view()) {
            Ok(p) => p,
            Err(e) => {
                warn!("inference failed: {}", e);
                return Verdict::PredictionFailed;
            }
        };
        let Some((best, confidence)) = argmax(probs.view()) else {
            warn!("inference produced a non-finite distribution");
            return Verdict::PredictionFailed;
        };
        let Some(name) = model.labels.get(best) else {
            warn!("predicted index {} outside label set", best);
            return Verdict::PredictionFailed;
        };

        // Geometric safety net: a softmax can be confidently wrong near
        // decision boundaries; distance to the class mean is independent
        // of the learned surface.
        if let Some(distance) = model.centroids.distance_to(name, features.view()) {
            if distance > self.config.max_centroid_distance {
                debug!(
                    "outlier: {:.2} from {:?} centroid exceeds {:.2}",
                    distance, name, self.config.max_centroid_distance
                );
                return Verdict::Uncertain { distance };
            }
        }

        Verdict::Recognized {
            name: name.clone(),
            confidence,
        }
    }
}

fn argmax(probs: ArrayView1<f32>) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &p) in probs.iter().enumerate() {
        if !p.is_finite() {
            return None;
        }
        if best.is_none_or(|(_, b)| p > b) {
            best = Some((i, p));
        }
    }
    best
}
