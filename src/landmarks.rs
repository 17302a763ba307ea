use ndarray::Array1;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Number of landmarks the hand-tracking producer emits per detected hand.
pub const LANDMARK_COUNT: usize = 21;
/// Length of a flattened (x, y, z) feature vector.
pub const FEATURE_LEN: usize = LANDMARK_COUNT * 3;
/// Index of the wrist landmark, the local origin after normalization.
pub const WRIST: usize = 0;

/// One 3-D hand landmark in the producer's coordinate system.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// A landmark with no depth estimate; z defaults to 0.
    pub fn planar(x: f32, y: f32) -> Self {
        Self { x, y, z: 0.0 }
    }
}

/// Errors for malformed pose input.
#[derive(Debug, Clone, PartialEq)]
pub enum LandmarkError {
    /// The pose did not contain exactly [`LANDMARK_COUNT`] landmarks.
    WrongCount(usize),
}

impl Display for LandmarkError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LandmarkError::WrongCount(n) => {
                write!(f, "Expected {} landmarks, got {}", LANDMARK_COUNT, n)
            }
        }
    }
}

impl Error for LandmarkError {}

/// Flattens a 21-landmark pose into a wrist-centered feature vector.
///
/// Layout is `[x0, y0, z0, x1, y1, z1, ...]` in landmark order, with the
/// wrist's x and y subtracted from every x and y component. z is left
/// untouched; the producer already reports it relative to the hand.
///
/// # Errors
///
/// Returns `LandmarkError::WrongCount` for any pose length other than 21.
pub fn normalize(pose: &[Landmark]) -> Result<Array1<f32>, LandmarkError> {
    if pose.len() != LANDMARK_COUNT {
        return Err(LandmarkError::WrongCount(pose.len()));
    }

    let wrist = pose[WRIST];
    let mut features = Array1::zeros(FEATURE_LEN);
    for (i, lm) in pose.iter().enumerate() {
        features[3 * i] = lm.x - wrist.x;
        features[3 * i + 1] = lm.y - wrist.y;
        features[3 * i + 2] = lm.z;
    }
    Ok(features)
}
