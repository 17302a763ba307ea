use crate::landmarks::{self, FEATURE_LEN, Landmark, LandmarkError};
use log::{debug, warn};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors that can occur while mutating or importing a dataset.
#[derive(Debug, Clone, PartialEq)]
pub enum DatasetError {
    /// Gesture names must be non-empty.
    EmptyName,
    /// The recorded pose was malformed.
    Landmark(LandmarkError),
    /// The import payload could not be parsed or failed validation.
    Parse(String),
}

impl Display for DatasetError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DatasetError::EmptyName => write!(f, "Gesture name must not be empty"),
            DatasetError::Landmark(e) => write!(f, "Invalid pose: {}", e),
            DatasetError::Parse(msg) => write!(f, "Failed to import dataset: {}", msg),
        }
    }
}

impl Error for DatasetError {}

impl From<LandmarkError> for DatasetError {
    fn from(e: LandmarkError) -> Self {
        DatasetError::Landmark(e)
    }
}

/// On-disk interchange form: sorted label list plus plain nested float
/// lists per class, so exports are readable and diff-friendly.
#[derive(Serialize, Deserialize)]
struct DatasetFile {
    labels: Vec<String>,
    dataset: BTreeMap<String, Vec<Vec<f32>>>,
}

/// In-memory store of recorded gesture samples, keyed by gesture name.
///
/// Samples are held as normalized feature vectors in recording order.
/// Key iteration is sorted (BTreeMap), which makes label derivation and
/// export deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GestureDataset {
    classes: BTreeMap<String, Vec<Array1<f32>>>,
}

impl GestureDataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalizes `pose` and appends it to `name`'s sample list, creating
    /// the class if it is new. Returns the class's new sample count.
    ///
    /// # Errors
    ///
    /// Rejects empty names and poses that fail normalization; the dataset
    /// is left untouched on error.
    pub fn add(&mut self, name: &str, pose: &[Landmark]) -> Result<usize, DatasetError> {
        if name.is_empty() {
            return Err(DatasetError::EmptyName);
        }
        let features = landmarks::normalize(pose)?;
        let samples = self.classes.entry(name.to_string()).or_default();
        samples.push(features);
        debug!("added sample to {:?} (total: {})", name, samples.len());
        Ok(samples.len())
    }

    /// Removes a class and all its samples. Returns whether it existed.
    pub fn remove(&mut self, name: &str) -> bool {
        let removed = self.classes.remove(name).is_some();
        if removed {
            debug!("removed gesture {:?}", name);
        }
        removed
    }

    /// Drops every class and sample.
    pub fn clear(&mut self) {
        self.classes.clear();
    }

    /// Sorted names of classes that currently hold at least one sample.
    /// Index i here is the classifier's output index i after training.
    pub fn labels(&self) -> Vec<String> {
        self.classes
            .iter()
            .filter(|(_, samples)| !samples.is_empty())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Per-class sample counts, sorted by name.
    pub fn stats(&self) -> BTreeMap<String, usize> {
        self.classes
            .iter()
            .map(|(name, samples)| (name.clone(), samples.len()))
            .collect()
    }

    /// The recorded samples for one class, in recording order.
    pub fn samples(&self, name: &str) -> Option<&[Array1<f32>]> {
        self.classes.get(name).map(Vec::as_slice)
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    pub fn sample_count(&self) -> usize {
        self.classes.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Serializes the dataset to the JSON interchange form
    /// `{ "labels": [...], "dataset": { name: [[f32; 63], ...] } }`.
    pub fn export_json(&self) -> Result<String, DatasetError> {
        let file = DatasetFile {
            labels: self.labels(),
            dataset: self
                .classes
                .iter()
                .filter(|(_, samples)| !samples.is_empty())
                .map(|(name, samples)| {
                    (
                        name.clone(),
                        samples.iter().map(|s| s.to_vec()).collect(),
                    )
                })
                .collect(),
        };
        serde_json::to_string_pretty(&file).map_err(|e| DatasetError::Parse(e.to_string()))
    }

    /// Replaces the dataset wholesale with the contents of an exported
    /// payload.
    ///
    /// # Errors
    ///
    /// Fails with `DatasetError::Parse` on malformed JSON, empty names, or
    /// samples of the wrong width; the previous contents are kept intact
    /// in that case.
    pub fn import_json(&mut self, json: &str) -> Result<(), DatasetError> {
        let file: DatasetFile =
            serde_json::from_str(json).map_err(|e| DatasetError::Parse(e.to_string()))?;

        let mut classes: BTreeMap<String, Vec<Array1<f32>>> = BTreeMap::new();
        for (name, samples) in file.dataset {
            if name.is_empty() {
                return Err(DatasetError::Parse("empty gesture name".into()));
            }
            if samples.is_empty() {
                // Empty classes are never persisted; tolerate and drop.
                warn!("import: skipping gesture {:?} with no samples", name);
                continue;
            }
            let mut converted = Vec::with_capacity(samples.len());
            for sample in samples {
                if sample.len() != FEATURE_LEN {
                    return Err(DatasetError::Parse(format!(
                        "gesture {:?}: sample has {} values, expected {}",
                        name,
                        sample.len(),
                        FEATURE_LEN
                    )));
                }
                converted.push(Array1::from_vec(sample));
            }
            classes.insert(name, converted);
        }

        let derived: Vec<&String> = classes.keys().collect();
        if file.labels.iter().collect::<Vec<_>>() != derived {
            warn!("import: stored label list disagrees with dataset keys; using keys");
        }

        self.classes = classes;
        debug!(
            "imported dataset: {} classes, {} samples",
            self.class_count(),
            self.sample_count()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::LANDMARK_COUNT;

    fn pose_at(origin: f32) -> Vec<Landmark> {
        (0..LANDMARK_COUNT)
            .map(|i| Landmark::new(origin + 0.01 * i as f32, origin, 0.0))
            .collect()
    }

    #[test]
    fn test_add_creates_class_and_counts() {
        let mut dataset = GestureDataset::new();
        assert_eq!(dataset.add("fist", &pose_at(0.1)).unwrap(), 1);
        assert_eq!(dataset.add("fist", &pose_at(0.2)).unwrap(), 2);
        assert_eq!(dataset.stats().get("fist"), Some(&2));
        assert_eq!(dataset.sample_count(), 2);
    }

    #[test]
    fn test_add_rejects_bad_input_without_mutating() {
        let mut dataset = GestureDataset::new();
        assert_eq!(
            dataset.add("", &pose_at(0.0)),
            Err(DatasetError::EmptyName)
        );
        assert_eq!(
            dataset.add("fist", &pose_at(0.0)[..5]),
            Err(DatasetError::Landmark(LandmarkError::WrongCount(5)))
        );
        assert!(dataset.is_empty());
    }

    #[test]
    fn test_labels_sorted_regardless_of_insertion_order() {
        let mut dataset = GestureDataset::new();
        for name in ["b", "a", "c"] {
            dataset.add(name, &pose_at(0.5)).unwrap();
        }
        assert_eq!(dataset.labels(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut dataset = GestureDataset::new();
        dataset.add("wave", &pose_at(0.3)).unwrap();
        assert!(dataset.remove("wave"));
        assert!(!dataset.remove("wave"));
        dataset.add("wave", &pose_at(0.3)).unwrap();
        dataset.clear();
        assert!(dataset.is_empty());
    }

    #[test]
    fn test_export_import_round_trip() {
        let mut dataset = GestureDataset::new();
        dataset.add("open", &pose_at(0.1)).unwrap();
        dataset.add("open", &pose_at(0.15)).unwrap();
        dataset.add("fist", &pose_at(0.7)).unwrap();

        let json = dataset.export_json().unwrap();
        let mut restored = GestureDataset::new();
        restored.import_json(&json).unwrap();

        assert_eq!(restored, dataset);
        assert_eq!(restored.labels(), dataset.labels());
    }

    #[test]
    fn test_import_failure_keeps_previous_contents() {
        let mut dataset = GestureDataset::new();
        dataset.add("keep", &pose_at(0.2)).unwrap();
        let before = dataset.clone();

        assert!(matches!(
            dataset.import_json("not json"),
            Err(DatasetError::Parse(_))
        ));
        let bad_width = r#"{"labels":["x"],"dataset":{"x":[[1.0,2.0]]}}"#;
        assert!(matches!(
            dataset.import_json(bad_width),
            Err(DatasetError::Parse(_))
        ));

        assert_eq!(dataset, before);
    }
}
