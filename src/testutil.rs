//! Shared fixtures for the crate's test modules.

use crate::dataset::GestureDataset;
use crate::landmarks::{LANDMARK_COUNT, Landmark};

/// Deterministic jittered pose around a per-gesture base shape. `base`
/// picks the shape ("open" spreads one way, "fist" the other), `variant`
/// adds small per-sample jitter.
pub(crate) fn synthetic_pose(base: f32, variant: usize) -> Vec<Landmark> {
    let jitter = variant as f32 * 0.002;
    (0..LANDMARK_COUNT)
        .map(|i| {
            Landmark::new(
                0.5 + base * 0.02 * i as f32 + jitter,
                0.5 - base * 0.015 * i as f32 - jitter,
                0.001 * i as f32,
            )
        })
        .collect()
}

pub(crate) fn two_class_dataset(samples_per_class: usize) -> GestureDataset {
    let mut dataset = GestureDataset::new();
    for v in 0..samples_per_class {
        dataset.add("open", &synthetic_pose(1.0, v)).unwrap();
        dataset.add("fist", &synthetic_pose(-1.0, v)).unwrap();
    }
    dataset
}
