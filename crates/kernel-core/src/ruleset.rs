//! RulesetParser
//!
//! Line-oriented textual config: `#` comments, `symbols:` and
//! `reflex_triggers:` sections, root `key: value` lines. Mirrors the
//! teacher's line-based migration/config parsing style.

use std::collections::HashMap;

use crate::tensor::{Tensor, TensorOps};

#[derive(Debug, thiserror::Error)]
pub enum RulesetError {
    #[error("invalid float {value:?} on line {line}")]
    InvalidFloat { line: usize, value: String },
    #[error("invalid reflex trigger syntax on line {line}: {text:?}")]
    InvalidReflexTrigger { line: usize, text: String },
    #[error("invalid symbol definition on line {line}: {text:?}")]
    InvalidSymbolDefinition { line: usize, text: String },
}

#[derive(Debug, Clone)]
pub struct HeuristicConfig {
    pub critic_entropy_weight: f32,
    /// Floor used by `ProgramManifold::sleep` as the similarity threshold
    /// for reflex triggers synthesized from consolidated anomalies.
    pub critic_min: f32,
}

impl Default for HeuristicConfig {
    fn default() -> Self {
        Self {
            critic_entropy_weight: 0.0,
            critic_min: 0.5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReflexTrigger {
    pub target_symbol: String,
    pub similarity_threshold: f32,
    pub action_intent: String,
}

#[derive(Debug, Clone, Default)]
pub struct Ruleset {
    pub constraint_mode: String,
    pub heuristics: HeuristicConfig,
    pub symbol_definitions: HashMap<String, Tensor>,
    pub reflex_triggers: Vec<ReflexTrigger>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Root,
    Symbols,
    ReflexTriggers,
}

pub struct RulesetParser;

impl RulesetParser {
    pub fn parse(text: &str) -> Result<Ruleset, RulesetError> {
        let mut ruleset = Ruleset::default();
        let mut section = Section::Root;

        for (idx, raw_line) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw_line.trim_end_matches('\r');
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            if trimmed == "symbols:" {
                section = Section::Symbols;
                continue;
            }
            if trimmed == "reflex_triggers:" {
                section = Section::ReflexTriggers;
                continue;
            }

            match section {
                Section::Root => Self::parse_root_line(&mut ruleset, trimmed),
                Section::Symbols => {
                    Self::parse_symbol_line(&mut ruleset, trimmed, line_no)?;
                }
                Section::ReflexTriggers => {
                    Self::parse_reflex_line(&mut ruleset, trimmed, line_no)?;
                }
            }
        }

        Ok(ruleset)
    }

    fn parse_root_line(ruleset: &mut Ruleset, line: &str) {
        let Some((key, value)) = line.split_once(':') else {
            return;
        };
        let key = key.trim();
        let value = value.trim();
        match key {
            "constraint_mode" => ruleset.constraint_mode = value.to_string(),
            "entropy_tolerance" => {
                if let Ok(v) = value.parse::<f32>() {
                    ruleset.heuristics.critic_entropy_weight = v;
                }
            }
            _ => {}
        }
    }

    /// `NAME = f1, f2, ...` (invariant-culture floats) -> L2-normalized
    /// vector.
    fn parse_symbol_line(
        ruleset: &mut Ruleset,
        line: &str,
        line_no: usize,
    ) -> Result<(), RulesetError> {
        let Some((name, values)) = line.split_once('=') else {
            return Err(RulesetError::InvalidSymbolDefinition {
                line: line_no,
                text: line.to_string(),
            });
        };
        let name = name.trim().to_string();
        let mut data = Vec::new();
        for part in values.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let v = part
                .parse::<f32>()
                .map_err(|_| RulesetError::InvalidFloat {
                    line: line_no,
                    value: part.to_string(),
                })?;
            data.push(v);
        }
        let vec = TensorOps::normalize_l2(&Tensor::from_vec(data));
        ruleset.symbol_definitions.insert(name, vec);
        Ok(())
    }

    /// `sim(x, SYMBOL) > 0.85 -> ACTION_INTENT`. Missing threshold
    /// defaults to 0.85.
    fn parse_reflex_line(
        ruleset: &mut Ruleset,
        line: &str,
        line_no: usize,
    ) -> Result<(), RulesetError> {
        let Some((condition, action)) = line.split_once("->") else {
            return Err(RulesetError::InvalidReflexTrigger {
                line: line_no,
                text: line.to_string(),
            });
        };
        let action_intent = action.trim().to_string();
        let condition = condition.trim();

        let open = condition.find('(').ok_or_else(|| RulesetError::InvalidReflexTrigger {
            line: line_no,
            text: line.to_string(),
        })?;
        let close = condition.find(')').ok_or_else(|| RulesetError::InvalidReflexTrigger {
            line: line_no,
            text: line.to_string(),
        })?;
        let args = &condition[open + 1..close];
        let target_symbol = args
            .split(',')
            .nth(1)
            .map(|s| s.trim().to_string())
            .ok_or_else(|| RulesetError::InvalidReflexTrigger {
                line: line_no,
                text: line.to_string(),
            })?;

        let rest = &condition[close + 1..];
        let similarity_threshold = rest
            .trim_start_matches('>')
            .trim()
            .parse::<f32>()
            .unwrap_or(0.85);

        ruleset.reflex_triggers.push(ReflexTrigger {
            target_symbol,
            similarity_threshold,
            action_intent,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_ruleset() {
        let text = "\
# comment
constraint_mode: strict
entropy_tolerance: 0.4

symbols:
A = 1, 0, 0
B = 0.0, 1.0

reflex_triggers:
sim(x, A) > 0.9 -> execute_geometric_shift
sim(x, B) -> default_action
";
        let ruleset = RulesetParser::parse(text).unwrap();
        assert_eq!(ruleset.constraint_mode, "strict");
        assert_eq!(ruleset.heuristics.critic_entropy_weight, 0.4);
        assert_eq!(ruleset.symbol_definitions.len(), 2);
        assert_eq!(ruleset.reflex_triggers.len(), 2);
        assert_eq!(ruleset.reflex_triggers[0].similarity_threshold, 0.9);
        assert_eq!(ruleset.reflex_triggers[0].target_symbol, "A");
        assert_eq!(ruleset.reflex_triggers[1].similarity_threshold, 0.85);
    }

    #[test]
    fn symbol_vectors_are_normalized() {
        let text = "symbols:\nA = 3, 4\n";
        let ruleset = RulesetParser::parse(text).unwrap();
        let vec = &ruleset.symbol_definitions["A"];
        let norm: f32 = vec.as_slice().iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn crlf_line_endings_are_tolerated() {
        let text = "constraint_mode: loose\r\nsymbols:\r\nA = 1\r\n";
        let ruleset = RulesetParser::parse(text).unwrap();
        assert_eq!(ruleset.constraint_mode, "loose");
        assert_eq!(ruleset.symbol_definitions.len(), 1);
    }
}
