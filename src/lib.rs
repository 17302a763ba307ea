//! Hand-gesture recognition core.
//!
//! Turns streams of 21-point hand landmarks into discrete gesture
//! emissions: poses are flattened into wrist-centered feature vectors,
//! a user-recorded [`GestureDataset`] trains a small feed-forward
//! classifier (the `mlp` crate) alongside per-class [`CentroidModel`]
//! means, and per-frame [`Verdict`]s are debounced by a
//! [`StabilityBuffer`] before a gesture is emitted downstream.
//!
//! Camera capture, landmark extraction, rendering, and speech are
//! external collaborators; this crate starts at the pose and ends at the
//! emission.

pub mod centroid;
pub mod context;
pub mod dataset;
pub mod engine;
pub mod landmarks;
pub mod metric;
pub mod persist;
pub mod pipeline;
pub mod stability;

#[cfg(test)]
pub(crate) mod testutil;

pub use centroid::CentroidModel;
pub use context::RecognizerContext;
pub use dataset::{DatasetError, GestureDataset};
pub use engine::{EngineConfig, RecognitionEngine, Verdict};
pub use landmarks::{FEATURE_LEN, LANDMARK_COUNT, Landmark, LandmarkError, normalize};
pub use metric::{Distance, L2Dist};
pub use persist::{MemoryStore, ModelStore, PersistenceError};
pub use pipeline::{ProgressFn, TrainError, TrainedModel, TrainingPipeline};
pub use stability::{StabilityBuffer, StabilityConfig};
