use crate::dataset::GestureDataset;
use crate::metric::{Distance, L2Dist};
use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-class mean feature vectors, used for geometric outlier rejection
/// independent of the learned decision surface.
///
/// Computed from the full dataset at the end of a training run and
/// replaced wholesale on retraining.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CentroidModel {
    centroids: BTreeMap<String, Array1<f32>>,
}

impl CentroidModel {
    /// Computes the arithmetic mean of every non-empty class's samples.
    pub fn from_dataset(dataset: &GestureDataset) -> Self {
        let mut centroids = BTreeMap::new();
        for name in dataset.labels() {
            let samples = dataset.samples(&name).unwrap_or(&[]);
            if samples.is_empty() {
                continue;
            }
            let mut sum = Array1::<f32>::zeros(samples[0].len());
            for sample in samples {
                sum += sample;
            }
            sum /= samples.len() as f32;
            centroids.insert(name, sum);
        }
        Self { centroids }
    }

    pub fn get(&self, name: &str) -> Option<&Array1<f32>> {
        self.centroids.get(name)
    }

    /// Euclidean distance from `features` to the named class's centroid,
    /// or `None` if the class has no centroid.
    pub fn distance_to(&self, name: &str, features: ArrayView1<f32>) -> Option<f32> {
        self.centroids
            .get(name)
            .map(|c| L2Dist.distance(features, c.view()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.centroids.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.centroids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.centroids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::{LANDMARK_COUNT, Landmark};
    use approx::assert_abs_diff_eq;
    use ndarray::Array1;

    fn pose_with_first_x(x: f32) -> Vec<Landmark> {
        // Wrist pinned at the origin so the first feature component equals
        // the second landmark's x untouched by normalization.
        let mut pose = vec![Landmark::planar(0.0, 0.0); LANDMARK_COUNT];
        pose[1] = Landmark::planar(x, 0.0);
        pose
    }

    #[test]
    fn test_centroid_is_componentwise_mean() {
        let mut dataset = GestureDataset::new();
        dataset.add("wave", &pose_with_first_x(1.0)).unwrap();
        dataset.add("wave", &pose_with_first_x(3.0)).unwrap();

        let model = CentroidModel::from_dataset(&dataset);
        let centroid = model.get("wave").expect("class should have a centroid");
        // Component 3 is the second landmark's x.
        assert_abs_diff_eq!(centroid[3], 2.0);
        assert_eq!(model.len(), 1);
    }

    #[test]
    fn test_distance_to_known_and_unknown_class() {
        let mut dataset = GestureDataset::new();
        dataset.add("wave", &pose_with_first_x(2.0)).unwrap();
        let model = CentroidModel::from_dataset(&dataset);

        let query = Array1::<f32>::zeros(crate::landmarks::FEATURE_LEN);
        let dist = model.distance_to("wave", query.view()).unwrap();
        assert_abs_diff_eq!(dist, 2.0);
        assert!(model.distance_to("missing", query.view()).is_none());
    }

    #[test]
    fn test_empty_dataset_yields_empty_model() {
        let model = CentroidModel::from_dataset(&GestureDataset::new());
        assert!(model.is_empty());
    }
}
