// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Heuristic prompt complexity classification and token budgeting.
//!
//! Pure function of the prompt and static configuration: no network, no
//! state, defined for every input.

use std::collections::HashSet;

use waypoint_config::model::ClassifierConfig;
use waypoint_core::ComplexityTier;

/// Result of classifying a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub tier: ComplexityTier,
    pub token_budget: u32,
    /// Human-readable reason for the classification.
    pub reason: &'static str,
}

/// Keyword and length based classifier.
#[derive(Debug, Clone)]
pub struct ComplexityClassifier {
    /// Single-word keywords, lowercased.
    words: HashSet<String>,
    /// Multi-word keywords as space-padded lowercase phrases.
    phrases: Vec<String>,
    complex_length_threshold: usize,
    short_prompt_chars: usize,
    min_budget: u32,
    mid_budget: u32,
    max_budget: u32,
}

impl ComplexityClassifier {
    pub fn new(config: &ClassifierConfig) -> Self {
        let mut words = HashSet::new();
        let mut phrases = Vec::new();
        for keyword in &config.complex_keywords {
            let tokens = tokenize(keyword);
            match tokens.as_slice() {
                [] => {}
                [single] => {
                    words.insert(single.clone());
                }
                many => phrases.push(format!(" {} ", many.join(" "))),
            }
        }
        Self {
            words,
            phrases,
            complex_length_threshold: config.complex_length_threshold,
            short_prompt_chars: config.short_prompt_chars,
            min_budget: config.min_budget,
            mid_budget: config.mid_budget,
            max_budget: config.max_budget,
        }
    }

    /// The full configured ceiling.
    pub fn max_budget(&self) -> u32 {
        self.max_budget
    }

    /// Classify `prompt` into a tier and token budget.
    ///
    /// Complex when the prompt contains a configured keyword (whole word,
    /// case-insensitive) or is longer than the length threshold. Complex
    /// prompts get the full ceiling; simple prompts get the minimum budget
    /// when short and the middle budget otherwise.
    pub fn classify(&self, prompt: &str) -> Classification {
        let trimmed = prompt.trim();
        if trimmed.is_empty() {
            return Classification {
                tier: ComplexityTier::Simple,
                token_budget: self.min_budget,
                reason: "empty prompt",
            };
        }

        let length = trimmed.chars().count();
        if self.has_keyword(trimmed) {
            return self.complex("complexity keyword");
        }
        if length > self.complex_length_threshold {
            return self.complex("long prompt");
        }

        if length <= self.short_prompt_chars {
            Classification {
                tier: ComplexityTier::Simple,
                token_budget: self.min_budget,
                reason: "short prompt",
            }
        } else {
            Classification {
                tier: ComplexityTier::Simple,
                token_budget: self.mid_budget,
                reason: "medium prompt",
            }
        }
    }

    fn complex(&self, reason: &'static str) -> Classification {
        Classification {
            tier: ComplexityTier::Complex,
            token_budget: self.max_budget,
            reason,
        }
    }

    fn has_keyword(&self, prompt: &str) -> bool {
        let tokens = tokenize(prompt);
        if tokens.iter().any(|t| self.words.contains(t)) {
            return true;
        }
        if self.phrases.is_empty() {
            return false;
        }
        let padded = format!(" {} ", tokens.join(" "));
        self.phrases.iter().any(|p| padded.contains(p.as_str()))
    }
}

impl Default for ComplexityClassifier {
    fn default() -> Self {
        Self::new(&ClassifierConfig::default())
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}
