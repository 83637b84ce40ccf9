use std::cmp::Ordering;

use crate::error::SimilarityError;

/// Cosine of the angle between `left` and `right`, clamped to [-1, 1].
///
/// Accumulates in f64 so the result is symmetric and a vector compared with
/// itself scores 1 up to rounding.
pub fn cosine_similarity(left: &[f32], right: &[f32]) -> Result<f32, SimilarityError> {
    if left.len() != right.len() {
        return Err(SimilarityError::DimensionMismatch {
            left: left.len(),
            right: right.len(),
        });
    }
    let mut dot = 0.0f64;
    let mut left_norm = 0.0f64;
    let mut right_norm = 0.0f64;
    for (a, b) in left.iter().zip(right) {
        let (a, b) = (f64::from(*a), f64::from(*b));
        dot += a * b;
        left_norm += a * a;
        right_norm += b * b;
    }
    if left_norm == 0.0 || right_norm == 0.0 || !dot.is_finite() {
        return Err(SimilarityError::DegenerateVector);
    }
    let score = dot / (left_norm.sqrt() * right_norm.sqrt());
    Ok(score.clamp(-1.0, 1.0) as f32)
}

/// True when `vector` has zero magnitude and cannot take part in a cosine.
pub fn is_degenerate(vector: &[f32]) -> bool {
    vector.iter().all(|value| *value == 0.0)
}

/// Keeps the `k` highest scores, best first. Ties keep their input order.
pub fn rank_top_k<T>(mut scored: Vec<(T, f32)>, k: usize) -> Vec<(T, f32)> {
    if k == 0 {
        return Vec::new();
    }
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    scored.truncate(k);
    scored
}
