//! HdcSystem
//!
//! Façade bundling `SymbolSpace`, `SequenceEncoder` and a bounded
//! recent-memory log (`remember`/`recent`) used for deep-think candidate
//! seeding.

use std::collections::VecDeque;

use crate::symbol::SymbolSpace;
use crate::tensor::Tensor;

/// How many recently-remembered vectors `HdcSystem` retains.
const DEFAULT_REMEMBER_CAPACITY: usize = 256;

/// Bundles the symbol registry, encoder, and a short-term recall log.
pub struct HdcSystem {
    pub symbols: SymbolSpace,
    remember_log: VecDeque<Tensor>,
    remember_capacity: usize,
}

impl HdcSystem {
    pub fn new() -> Self {
        Self {
            symbols: SymbolSpace::new(),
            remember_log: VecDeque::new(),
            remember_capacity: DEFAULT_REMEMBER_CAPACITY,
        }
    }

    pub fn with_remember_capacity(capacity: usize) -> Self {
        Self {
            remember_capacity: capacity.max(1),
            ..Self::new()
        }
    }

    /// Append `vec` to the recent-memory log, evicting the oldest entry if
    /// at capacity.
    pub fn remember(&mut self, vec: Tensor) {
        if self.remember_log.len() >= self.remember_capacity {
            self.remember_log.pop_front();
        }
        self.remember_log.push_back(vec);
    }

    /// The `n` most recently remembered vectors, newest first.
    pub fn recent(&self, n: usize) -> Vec<&Tensor> {
        self.remember_log.iter().rev().take(n).collect()
    }

    pub fn remember_len(&self) -> usize {
        self.remember_log.len()
    }
}

impl Default for HdcSystem {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remember_evicts_oldest_at_capacity() {
        let mut hdc = HdcSystem::with_remember_capacity(2);
        hdc.remember(Tensor::from_vec(vec![1.0]));
        hdc.remember(Tensor::from_vec(vec![2.0]));
        hdc.remember(Tensor::from_vec(vec![3.0]));
        assert_eq!(hdc.remember_len(), 2);
        let recent = hdc.recent(2);
        assert_eq!(recent[0].as_slice(), &[3.0]);
        assert_eq!(recent[1].as_slice(), &[2.0]);
    }

    #[test]
    fn recent_returns_newest_first() {
        let mut hdc = HdcSystem::new();
        hdc.remember(Tensor::from_vec(vec![1.0]));
        hdc.remember(Tensor::from_vec(vec![2.0]));
        let recent = hdc.recent(1);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].as_slice(), &[2.0]);
    }
}
