use ndarray::ArrayView1;

/// A distance metric over feature vectors.
///
/// `rdistance` is a rank-preserving surrogate (squared distance for L2)
/// that skips the final root when only comparisons are needed.
pub trait Distance {
    fn rdistance(&self, a: ArrayView1<f32>, b: ArrayView1<f32>) -> f32;
    fn distance(&self, a: ArrayView1<f32>, b: ArrayView1<f32>) -> f32;
}

/// Euclidean (L2) distance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct L2Dist;

impl Distance for L2Dist {
    fn rdistance(&self, a: ArrayView1<f32>, b: ArrayView1<f32>) -> f32 {
        a.iter()
            .zip(b.iter())
            .map(|(x, y)| (x - y) * (x - y))
            .sum()
    }

    fn distance(&self, a: ArrayView1<f32>, b: ArrayView1<f32>) -> f32 {
        self.rdistance(a, b).sqrt()
    }
}
