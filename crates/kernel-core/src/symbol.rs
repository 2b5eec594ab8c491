//! SymbolSpace
//!
//! Named vector registry. Tokens resolve to vectors; a miss mints one
//! deterministically from a seeded RNG so the same token always yields the
//! same vector within a process (and across processes, since the seed is a
//! pure function of the name).

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::fnv::fnv64_str;
use crate::tensor::{Tensor, TensorOps};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SymbolError {
    #[error("dim_conflict: symbol already has dimension {existing}, cannot register {attempted}")]
    DimConflict { existing: usize, attempted: usize },
    #[error("dim_mismatch: requested {requested}, space dimension is {space}")]
    DimMismatch { requested: usize, space: usize },
    #[error("dim_mismatch: token {token:?} requires dim {requested}, space dimension is {space}")]
    TokenDimMismatch {
        token: String,
        requested: usize,
        space: usize,
    },
}

/// Named vector registry with deterministic miss-minting.
#[derive(Debug, Default)]
pub struct SymbolSpace {
    symbols: HashMap<String, Tensor>,
    /// Locked to the first registered vector's length.
    symbol_dim: Option<usize>,
}

impl SymbolSpace {
    pub fn new() -> Self {
        Self::default()
    }

    /// The dimension locked in on first registration, if any.
    pub fn symbol_dim(&self) -> Option<usize> {
        self.symbol_dim
    }

    /// Register a symbol under `name`. Fails `dim_conflict` if the space
    /// already has a locked dimension that disagrees with `vec`.
    pub fn register(&mut self, name: &str, vec: Tensor) -> Result<(), SymbolError> {
        if let Some(locked) = self.symbol_dim {
            if locked != vec.len() {
                return Err(SymbolError::DimConflict {
                    existing: locked,
                    attempted: vec.len(),
                });
            }
        } else {
            self.symbol_dim = Some(vec.len());
        }
        self.symbols.insert(name.to_string(), vec);
        Ok(())
    }

    /// Resolve `name` to a vector of `requested_dim`, minting one on miss.
    pub fn resolve_symbol(
        &mut self,
        name: &str,
        requested_dim: usize,
    ) -> Result<Tensor, SymbolError> {
        if let Some(locked) = self.symbol_dim {
            if locked != requested_dim {
                return Err(SymbolError::DimMismatch {
                    requested: requested_dim,
                    space: locked,
                });
            }
        }
        if let Some(existing) = self.symbols.get(name) {
            return Ok(existing.clone());
        }
        let minted = mint_symbol(name, requested_dim);
        self.register(name, minted.clone())?;
        Ok(minted)
    }

    /// Resolve every token, short-circuiting on the first dimension
    /// mismatch with the offending token named in the error.
    pub fn resolve_tokens(
        &mut self,
        tokens: &[String],
        requested_dim: usize,
    ) -> Result<Vec<Tensor>, SymbolError> {
        let mut out = Vec::with_capacity(tokens.len());
        for token in tokens {
            match self.resolve_symbol(token, requested_dim) {
                Ok(v) => out.push(v),
                Err(SymbolError::DimMismatch { requested, space }) => {
                    return Err(SymbolError::TokenDimMismatch {
                        token: token.clone(),
                        requested,
                        space,
                    });
                }
                Err(e) => return Err(e),
            }
        }
        Ok(out)
    }
}

/// Synthesize a unit vector for `name` seeded from `fnv64(name)`.
fn mint_symbol(name: &str, dim: usize) -> Tensor {
    let seed = fnv64_str(name);
    let mut rng = StdRng::seed_from_u64(seed);
    let data: Vec<f32> = (0..dim).map(|_| rng.random_range(-1.0..=1.0)).collect();
    TensorOps::normalize_l2(&Tensor::from_vec(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn miss_mints_deterministically() {
        let mut space = SymbolSpace::new();
        let a = space.resolve_symbol("alpha", 16).unwrap();
        let mut other = SymbolSpace::new();
        let b = other.resolve_symbol("alpha", 16).unwrap();
        assert_eq!(a.as_slice(), b.as_slice());
    }

    #[test]
    fn dim_locks_after_first_registration() {
        let mut space = SymbolSpace::new();
        space.resolve_symbol("alpha", 16).unwrap();
        let err = space.resolve_symbol("beta", 32).unwrap_err();
        assert_eq!(
            err,
            SymbolError::DimMismatch {
                requested: 32,
                space: 16
            }
        );
    }

    #[test]
    fn resolve_tokens_reports_offending_token() {
        let mut space = SymbolSpace::new();
        space.resolve_symbol("alpha", 16).unwrap();
        let tokens = vec!["alpha".to_string(), "beta".to_string()];
        let err = space.resolve_tokens(&tokens, 8).unwrap_err();
        assert_eq!(
            err,
            SymbolError::TokenDimMismatch {
                token: "alpha".to_string(),
                requested: 8,
                space: 16
            }
        );
    }

    #[test]
    fn minted_symbol_is_unit_norm() {
        let mut space = SymbolSpace::new();
        let v = space.resolve_symbol("gamma", 64).unwrap();
        let norm: f32 = v.as_slice().iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }
}
