//! Tensor & TensorOps
//!
//! Dense float vectors and the HDC vector algebra (bind, permute, normalize,
//! cosine similarity) that every other component builds on. Currently only
//! 1-D tensors are produced by the rest of the crate, but `shape` is kept
//! explicit so a future N-D extension doesn't change the wire shape of
//! anything that persists a `Tensor`.

/// Error type for tensor operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TensorError {
    /// Operand lengths differ where equal length is required.
    #[error("dim_mismatch: expected {expected}, got {actual}")]
    DimMismatch { expected: usize, actual: usize },
}

/// A dense float vector with an explicit shape.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Tensor {
    shape: Vec<usize>,
    data: Vec<f32>,
}

impl Tensor {
    /// Build a tensor from a flat buffer, inferring a 1-D shape.
    pub fn from_vec(data: Vec<f32>) -> Self {
        let len = data.len();
        Self {
            shape: vec![len],
            data,
        }
    }

    /// An empty (zero-length) tensor.
    pub fn empty() -> Self {
        Self {
            shape: vec![0],
            data: Vec::new(),
        }
    }

    /// Total element count (`∏shape`).
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// 1-D view/copy of the same values.
    pub fn flatten(&self) -> Vec<f32> {
        self.data.clone()
    }

    fn require_same_len(&self, other: &Tensor) -> Result<(), TensorError> {
        if self.data.len() != other.data.len() {
            return Err(TensorError::DimMismatch {
                expected: self.data.len(),
                actual: other.data.len(),
            });
        }
        Ok(())
    }
}

/// Pure vector-algebra operations over `Tensor`. Kept as free functions
/// (rather than inherent methods) so they read as the "TensorOps" surface
/// the spec names separately from the data type.
pub struct TensorOps;

impl TensorOps {
    /// Elementwise product. `dim_mismatch` if lengths differ.
    pub fn bind(a: &Tensor, b: &Tensor) -> Result<Tensor, TensorError> {
        a.require_same_len(b)?;
        let data = a.data.iter().zip(&b.data).map(|(x, y)| x * y).collect();
        Ok(Tensor::from_vec(data))
    }

    /// Cyclic shift by `steps mod N`. Total-length preserving; a no-op
    /// result for empty tensors.
    pub fn permute(a: &Tensor, steps: i64) -> Tensor {
        let n = a.data.len();
        if n == 0 {
            return a.clone();
        }
        let shift = steps.rem_euclid(n as i64) as usize;
        let mut data = Vec::with_capacity(n);
        for i in 0..n {
            data.push(a.data[(i + n - shift) % n]);
        }
        Tensor::from_vec(data)
    }

    /// `a / ||a||₂`. A zero (or all-denormal) vector normalizes to a
    /// uniform vector of `1/sqrt(N)` so that it still has unit norm and
    /// `cos(v, v) == 1`.
    pub fn normalize_l2(a: &Tensor) -> Tensor {
        let n = a.data.len();
        if n == 0 {
            return a.clone();
        }
        let norm = l2_norm(&a.data);
        if norm < 1e-12 {
            let uniform = 1.0 / (n as f32).sqrt();
            return Tensor::from_vec(vec![uniform; n]);
        }
        let data = a.data.iter().map(|v| v / norm).collect();
        Tensor::from_vec(data)
    }

    /// `⟨a,b⟩ / (||a||·||b||)`. Zero if either norm is (near) zero.
    pub fn cosine_similarity(a: &Tensor, b: &Tensor) -> f32 {
        if a.data.len() != b.data.len() || a.data.is_empty() {
            return 0.0;
        }
        let norm_a = l2_norm(&a.data);
        let norm_b = l2_norm(&b.data);
        if norm_a < 1e-12 || norm_b < 1e-12 {
            return 0.0;
        }
        let dot: f32 = a.data.iter().zip(&b.data).map(|(x, y)| x * y).sum();
        dot / (norm_a * norm_b)
    }
}

/// L2 norm, treating denormals (`|v| < 1e-12`) as zero.
fn l2_norm(data: &[f32]) -> f32 {
    data.iter()
        .map(|v| if v.abs() < 1e-12 { 0.0 } else { *v })
        .map(|v| v * v)
        .sum::<f32>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(v: &[f32]) -> Tensor {
        Tensor::from_vec(v.to_vec())
    }

    #[test]
    fn normalize_then_self_cosine_is_one() {
        let v = t(&[3.0, 4.0]);
        let n = TensorOps::normalize_l2(&v);
        assert!((TensorOps::cosine_similarity(&n, &n) - 1.0).abs() < 1e-6);
        let norm = l2_norm(n.as_slice());
        assert!((norm - 1.0).abs() < 1e-6);
    }

    #[test]
    fn normalize_zero_vector_yields_uniform() {
        let v = t(&[0.0, 0.0, 0.0, 0.0]);
        let n = TensorOps::normalize_l2(&v);
        let expected = 1.0 / 4.0_f32.sqrt();
        for x in n.as_slice() {
            assert!((x - expected).abs() < 1e-6);
        }
        assert!((TensorOps::cosine_similarity(&n, &n) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn permute_full_cycle_is_identity() {
        let v = t(&[1.0, 2.0, 3.0, 4.0]);
        let p = TensorOps::permute(&v, 4);
        assert_eq!(p, v);
    }

    #[test]
    fn permute_then_inverse_restores() {
        let v = t(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let p = TensorOps::permute(&v, 2);
        let back = TensorOps::permute(&p, -2);
        assert_eq!(back, v);
    }

    #[test]
    fn bind_with_ones_is_identity() {
        let v = t(&[1.0, -2.0, 3.5]);
        let ones = t(&[1.0, 1.0, 1.0]);
        let bound = TensorOps::bind(&v, &ones).unwrap();
        assert_eq!(bound, v);
    }

    #[test]
    fn bind_dim_mismatch() {
        let a = t(&[1.0, 2.0]);
        let b = t(&[1.0, 2.0, 3.0]);
        assert_eq!(
            TensorOps::bind(&a, &b).unwrap_err(),
            TensorError::DimMismatch {
                expected: 2,
                actual: 3
            }
        );
    }

    #[test]
    fn cosine_zero_vector_is_zero() {
        let a = t(&[0.0, 0.0]);
        let b = t(&[1.0, 0.0]);
        assert_eq!(TensorOps::cosine_similarity(&a, &b), 0.0);
    }
}
