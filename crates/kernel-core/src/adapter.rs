//! CognitiveAdapter
//!
//! Heuristic analysis of ingest inputs, dynamic candidate routing for
//! deep-think, critic gating, and anomaly consolidation. Holds no state of
//! its own across calls — `KernelLoop` owns the cache/metabolism/HDC
//! system and passes non-owning references in for the duration of a call
//! (see `DESIGN.md`'s note on mutual references).

use crate::cache::WorkingMemoryCache;
use crate::hdc::HdcSystem;
use crate::metabolism::SystemMetabolism;
use crate::sequence::{EncodeError, SequenceEncoder, TokenizeParams};
use crate::tensor::{Tensor, TensorOps};

/// Raw ingest input, as spec §3 defines it.
#[derive(Debug, Clone)]
pub struct DataStream {
    pub dataset_type: String,
    pub dataset_id: String,
    pub payload: String,
    /// `0` means "auto" (the adapter picks a default).
    pub dim_hint: usize,
}

const DEFAULT_DIM: usize = 1024;

/// Payload statistics plus the routing knobs they derive.
#[derive(Debug, Clone)]
pub struct SignalProfile {
    pub length: usize,
    pub mean: f32,
    pub std_dev: f32,
    pub skewness: f32,
    pub sparsity: f32,
    pub entropy: f32,
    pub unique_ratio: f32,
    pub range: f32,
    pub system1_similarity_threshold: f32,
    pub critic_acceptance_threshold: f32,
    pub deep_think_cost_bias: f32,
    pub label: String,
}

/// Tagged deep-think strategy variant, selected by iteration index per
/// `SPEC_FULL.md` §12.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    BindRecall,
    PermuteScan,
    DiscoveryInduction,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::BindRecall => "bind_recall",
            Strategy::PermuteScan => "permute_scan",
            Strategy::DiscoveryInduction => "discovery_induction",
        }
    }

    /// `iteration % 3` picks among the three, with `DiscoveryInduction`
    /// forced whenever `iteration` is a positive multiple of 7.
    pub fn for_iteration(iteration: u32) -> Strategy {
        if iteration > 0 && iteration % 7 == 0 {
            return Strategy::DiscoveryInduction;
        }
        match iteration % 3 {
            0 => Strategy::BindRecall,
            1 => Strategy::PermuteScan,
            _ => Strategy::DiscoveryInduction,
        }
    }
}

/// A generated deep-think candidate and its scoring.
#[derive(Debug, Clone)]
pub struct RouteCandidate {
    pub vector: Tensor,
    pub strategy: Strategy,
    pub similarity: f32,
    pub fitness: f32,
}

pub struct CognitiveAdapter;

impl CognitiveAdapter {
    /// Lowercase, trimmed.
    pub fn normalize_type(raw: &str) -> String {
        raw.trim().to_lowercase()
    }

    /// Compute a `SignalProfile` from the payload's character statistics.
    pub fn analyze_heuristics(input: &DataStream) -> SignalProfile {
        let chars: Vec<char> = input.payload.chars().collect();
        let length = chars.len();
        if length == 0 {
            return SignalProfile {
                length: 0,
                mean: 0.0,
                std_dev: 0.0,
                skewness: 0.0,
                sparsity: 1.0,
                entropy: 0.0,
                unique_ratio: 0.0,
                range: 0.0,
                system1_similarity_threshold: 0.80,
                critic_acceptance_threshold: 0.50,
                deep_think_cost_bias: 0.0,
                label: Self::normalize_type(&input.dataset_type),
            };
        }

        let codes: Vec<f32> = chars.iter().map(|c| *c as u32 as f32).collect();
        let mean = codes.iter().sum::<f32>() / length as f32;
        let variance = codes.iter().map(|c| (c - mean).powi(2)).sum::<f32>() / length as f32;
        let std_dev = variance.sqrt();
        let skewness = if std_dev > 1e-9 {
            codes
                .iter()
                .map(|c| ((c - mean) / std_dev).powi(3))
                .sum::<f32>()
                / length as f32
        } else {
            0.0
        };
        let min = codes.iter().cloned().fold(f32::INFINITY, f32::min);
        let max = codes.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        let range = max - min;

        let mut freq = std::collections::HashMap::new();
        for c in &chars {
            *freq.entry(*c).or_insert(0usize) += 1;
        }
        let unique_ratio = freq.len() as f32 / length as f32;
        let whitespace = chars.iter().filter(|c| c.is_whitespace()).count();
        let sparsity = whitespace as f32 / length as f32;
        let entropy = {
            let n = length as f32;
            -freq
                .values()
                .map(|&count| {
                    let p = count as f32 / n;
                    p * p.log2()
                })
                .sum::<f32>()
                / (n.log2().max(1.0))
        }
        .clamp(0.0, 1.0);

        // Higher for noisy/high-entropy inputs.
        let system1_similarity_threshold = (0.80 + entropy * 0.15).clamp(0.0, 0.99);
        let critic_acceptance_threshold = (0.50 + entropy * 0.20).clamp(0.0, 0.99);
        let deep_think_cost_bias = entropy;

        SignalProfile {
            length,
            mean,
            std_dev,
            skewness,
            sparsity,
            entropy,
            unique_ratio,
            range,
            system1_similarity_threshold,
            critic_acceptance_threshold,
            deep_think_cost_bias,
            label: Self::normalize_type(&input.dataset_type),
        }
    }

    /// Encode the payload into the target tensor, using `dim_hint` or the
    /// default of 1024.
    pub fn l2_normalize_and_flatten(
        input: &DataStream,
        hdc: &mut HdcSystem,
    ) -> Result<Tensor, EncodeError> {
        let dim = if input.dim_hint == 0 {
            DEFAULT_DIM
        } else {
            input.dim_hint
        };
        let params = TokenizeParams::clamped(3, 1, 256, dim);
        let positioned = SequenceEncoder::tokenize(&input.payload, params);
        let tokens: Vec<String> = positioned.iter().map(|p| p.token.clone()).collect();
        let positions: Vec<usize> = positioned.iter().map(|p| p.position).collect();
        SequenceEncoder::encode_tokens(&mut hdc.symbols, &tokens, &positions, dim)
    }

    /// Generate one candidate for `iteration` by mixing `target` with a
    /// permuted memory candidate selected round-robin from
    /// `memory_candidates`.
    pub fn route_dynamic_connectome(
        target: &Tensor,
        profile: &SignalProfile,
        memory_candidates: &[Tensor],
        iteration: u32,
    ) -> RouteCandidate {
        let strategy = Strategy::for_iteration(iteration);
        let mixed = if memory_candidates.is_empty() {
            target.clone()
        } else {
            let pick = &memory_candidates[iteration as usize % memory_candidates.len()];
            let shift = (iteration as i64) + 1;
            let permuted = TensorOps::permute(pick, shift);
            let bound = TensorOps::bind(target, &permuted).unwrap_or_else(|_| target.clone());
            TensorOps::normalize_l2(&bound)
        };
        let similarity = TensorOps::cosine_similarity(&mixed, target);
        let fitness = similarity * (1.0 - profile.entropy * 0.2);
        RouteCandidate {
            vector: mixed,
            strategy,
            similarity,
            fitness,
        }
    }

    /// `base(1.0 + deep_think_cost_bias·0.15) · (1 + iteration_penalty)`,
    /// with `iteration_penalty = iteration as f32 * 0.01`.
    pub fn calculate_thermodynamic_cost(profile: &SignalProfile, iteration: u32) -> f32 {
        let base = 1.0 + profile.deep_think_cost_bias * 0.15;
        let iteration_penalty = iteration as f32 * 0.01;
        base * (1.0 + iteration_penalty)
    }

    /// `fitness >= max(profile.critic_acceptance_threshold,
    /// metabolism.critic_threshold())`.
    pub fn passes_critic_threshold(
        candidate: &RouteCandidate,
        profile: &SignalProfile,
        metabolism: &SystemMetabolism,
    ) -> bool {
        candidate.fitness >= profile.critic_acceptance_threshold.max(metabolism.critic_threshold())
    }

    /// `NormalizeL2(required_next - current)` — the anomaly payload
    /// stored during discovery-strategy promotions.
    pub fn deduce_geometric_gap(current: &Tensor, required_next: &Tensor) -> Tensor {
        let diff: Vec<f32> = required_next
            .as_slice()
            .iter()
            .zip(current.as_slice())
            .map(|(a, b)| a - b)
            .collect();
        TensorOps::normalize_l2(&Tensor::from_vec(diff))
    }

    /// Merge anomalies into the cache via weighted averaging with the
    /// existing entry of the same key (or insert as a new low-fitness
    /// entry when no such key exists). Anomalies themselves are cleared by
    /// the caller, not here.
    pub fn consolidate_memory(working_memory: &WorkingMemoryCache) {
        let anomalies = working_memory.get_anomalies();
        for (key, deduced) in anomalies {
            let Some(deduced) = deduced else { continue };
            if let Some(existing) = working_memory.get(&key) {
                let merged: Vec<f32> = existing
                    .vector
                    .as_slice()
                    .iter()
                    .zip(deduced.as_slice())
                    .map(|(a, b)| 0.5 * a + 0.5 * b)
                    .collect();
                let merged = TensorOps::normalize_l2(&Tensor::from_vec(merged));
                working_memory.promote_to_cache(
                    &key,
                    merged,
                    existing.fitness,
                    &existing.entry_type,
                    &existing.id,
                    existing.burn,
                );
            } else {
                working_memory.promote_to_cache(&key, deduced, 0.3, "anomaly", &key, 0.0);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(payload: &str) -> DataStream {
        DataStream {
            dataset_type: "Text".to_string(),
            dataset_id: "d1".to_string(),
            payload: payload.to_string(),
            dim_hint: 32,
        }
    }

    #[test]
    fn normalize_type_trims_and_lowercases() {
        assert_eq!(CognitiveAdapter::normalize_type("  Text "), "text");
    }

    #[test]
    fn analyze_heuristics_empty_payload() {
        let profile = CognitiveAdapter::analyze_heuristics(&stream(""));
        assert_eq!(profile.length, 0);
        assert_eq!(profile.sparsity, 1.0);
    }

    #[test]
    fn analyze_heuristics_noisy_payload_raises_threshold() {
        let uniform = CognitiveAdapter::analyze_heuristics(&stream(&"a".repeat(50)));
        let noisy = CognitiveAdapter::analyze_heuristics(&stream("a1B!c2D@e3F#g4H$i5J%"));
        assert!(noisy.system1_similarity_threshold >= uniform.system1_similarity_threshold);
    }

    #[test]
    fn strategy_for_iteration_is_deterministic() {
        assert_eq!(Strategy::for_iteration(7), Strategy::DiscoveryInduction);
        assert_eq!(Strategy::for_iteration(0), Strategy::BindRecall);
        assert_eq!(Strategy::for_iteration(1), Strategy::PermuteScan);
    }

    #[test]
    fn thermodynamic_cost_grows_with_iteration() {
        let profile = CognitiveAdapter::analyze_heuristics(&stream("hello world"));
        let c0 = CognitiveAdapter::calculate_thermodynamic_cost(&profile, 0);
        let c10 = CognitiveAdapter::calculate_thermodynamic_cost(&profile, 10);
        assert!(c10 > c0);
    }

    #[test]
    fn deduce_geometric_gap_is_unit_norm() {
        let a = Tensor::from_vec(vec![1.0, 0.0]);
        let b = Tensor::from_vec(vec![0.0, 1.0]);
        let gap = CognitiveAdapter::deduce_geometric_gap(&a, &b);
        let norm: f32 = gap.as_slice().iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }
}
