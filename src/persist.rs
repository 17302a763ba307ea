use crate::pipeline::TrainedModel;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors surfaced by a model store.
///
/// Persistence failures are reported but non-fatal by design; the system
/// keeps operating with its in-memory model.
#[derive(Debug, Clone, PartialEq)]
pub enum PersistenceError {
    /// The model could not be encoded or decoded.
    Format(String),
    /// The underlying storage failed.
    Store(String),
}

impl Display for PersistenceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PersistenceError::Format(msg) => write!(f, "Model encoding failed: {}", msg),
            PersistenceError::Store(msg) => write!(f, "Model storage failed: {}", msg),
        }
    }
}

impl Error for PersistenceError {}

/// Opaque storage for a trained model (classifier weights, centroids, and
/// label set). The blob format is the adapter's business, not the core's.
pub trait ModelStore {
    fn save(&mut self, model: &TrainedModel) -> Result<(), PersistenceError>;
    fn load(&mut self) -> Result<Option<TrainedModel>, PersistenceError>;
}

/// In-process store holding one serialized model blob. The default
/// adapter for tests and single-session use.
#[derive(Debug, Default)]
pub struct MemoryStore {
    blob: Option<Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ModelStore for MemoryStore {
    fn save(&mut self, model: &TrainedModel) -> Result<(), PersistenceError> {
        let bytes =
            serde_json::to_vec(model).map_err(|e| PersistenceError::Format(e.to_string()))?;
        self.blob = Some(bytes);
        Ok(())
    }

    fn load(&mut self) -> Result<Option<TrainedModel>, PersistenceError> {
        match &self.blob {
            None => Ok(None),
            Some(bytes) => serde_json::from_slice(bytes)
                .map(Some)
                .map_err(|e| PersistenceError::Format(e.to_string())),
        }
    }
}
