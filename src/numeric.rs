//! Pure numeric helpers over decoded float32 payloads (SPEC_FULL §3, §6).
//! The object store never computes over vector contents itself (Non-goals);
//! these exist for callers doing their own comparisons.

use crate::error::{EmbrError, Result};

const MIN_MAGNITUDE: f64 = 1e-10;

pub fn bytes_to_f32(payload: &[u8]) -> Result<Vec<f32>> {
    if payload.len() % 4 != 0 {
        return Err(EmbrError::InvalidFormat(
            "payload length is not a multiple of 4".into(),
        ));
    }
    Ok(payload
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// Cosine similarity with double-precision accumulation over float32
/// magnitudes. Fails with `ComputationFailed` if either magnitude is below
/// `1e-10`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f64> {
    if a.len() != b.len() {
        return Err(EmbrError::DimensionMismatch(format!(
            "{} vs {} elements",
            a.len(),
            b.len()
        )));
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    norm_a = norm_a.sqrt();
    norm_b = norm_b.sqrt();

    if norm_a < MIN_MAGNITUDE || norm_b < MIN_MAGNITUDE {
        return Err(EmbrError::ComputationFailed(
            "vector magnitude below 1e-10".into(),
        ));
    }

    Ok(dot / (norm_a * norm_b))
}

/// Euclidean distance with float32 accumulation.
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(EmbrError::DimensionMismatch(format!(
            "{} vs {} elements",
            a.len(),
            b.len()
        )));
    }
    let sum_sq: f32 = a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum();
    Ok(sum_sq.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_vectors_have_cosine_one() {
        let v = vec![1.0f32, 2.0, 3.0];
        let sim = cosine_similarity(&v, &v).unwrap();
        assert!((sim - 1.0).abs() < 1e-9);
    }

    #[test]
    fn orthogonal_vectors_have_cosine_zero() {
        let a = vec![1.0f32, 0.0];
        let b = vec![0.0f32, 1.0];
        let sim = cosine_similarity(&a, &b).unwrap();
        assert!(sim.abs() < 1e-9);
    }

    #[test]
    fn near_zero_magnitude_fails_computation() {
        let a = vec![0.0f32, 0.0];
        let b = vec![1.0f32, 0.0];
        assert!(matches!(
            cosine_similarity(&a, &b),
            Err(EmbrError::ComputationFailed(_))
        ));
    }

    #[test]
    fn mismatched_dims_reported() {
        let a = vec![1.0f32];
        let b = vec![1.0f32, 2.0];
        assert!(matches!(
            euclidean_distance(&a, &b),
            Err(EmbrError::DimensionMismatch(_))
        ));
    }

    #[test]
    fn euclidean_distance_of_identical_vectors_is_zero() {
        let a = vec![1.0f32, 2.0, 3.0];
        let d = euclidean_distance(&a, &a).unwrap();
        assert_eq!(d, 0.0);
    }
}
