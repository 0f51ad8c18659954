//! Distance function used for exact re-ranking

/// Compute Euclidean (L2) distance between two equal-length slices
pub fn euclidean_distance(v1: &[f32], v2: &[f32]) -> f32 {
    v1.iter()
        .zip(v2.iter())
        .map(|(a, b)| (a - b).powi(2))
        .sum::<f32>()
        .sqrt()
}
