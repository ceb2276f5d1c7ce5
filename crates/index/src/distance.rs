//! Vector arithmetic for inner-product search.
//!
//! Stored and query vectors are unit length, so the dot product is the score.

use chunkvault_core::{VaultError, VaultResult};

/// Tolerance under which a vector is already considered unit length
pub const UNIT_TOLERANCE: f32 = 1e-5;

/// Dot product (inner product)
///
/// Range: [-1, 1] for unit vectors, higher = more similar
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "Dimension mismatch in dot product");
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// L2 norm (Euclidean length)
pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Whether `v` already has unit length
pub fn is_unit(v: &[f32]) -> bool {
    (l2_norm(v) - 1.0).abs() <= UNIT_TOLERANCE
}

/// Return a unit-length copy of `v`
///
/// Fails with `NotNormalized` for non-finite components or a zero norm.
pub fn normalize(v: &[f32]) -> VaultResult<Vec<f32>> {
    if let Some(pos) = v.iter().position(|x| !x.is_finite()) {
        return Err(VaultError::not_normalized(format!(
            "non-finite component at position {}",
            pos
        )));
    }

    let norm = l2_norm(v);
    if norm == 0.0 || !norm.is_finite() {
        return Err(VaultError::not_normalized(format!("norm is {}", norm)));
    }
    if (norm - 1.0).abs() <= UNIT_TOLERANCE {
        return Ok(v.to_vec());
    }
    Ok(v.iter().map(|x| x / norm).collect())
}
