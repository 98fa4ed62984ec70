//! Fact-coverage heuristic for stage-2 output.

use super::facts::FactList;
use crate::text::{content_tokens, sentences};

/// How many narrative sentences share a content token with the fact list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageReport {
    pub sentences: usize,
    pub grounded: usize,
    /// Sentences with no overlap, for logging.
    pub ungrounded: Vec<String>,
}

impl CoverageReport {
    pub fn measure(narrative: &str, facts: &FactList) -> Self {
        let fact_tokens = facts.tokens();
        let mut report = Self {
            sentences: 0,
            grounded: 0,
            ungrounded: Vec::new(),
        };

        for sentence in sentences(narrative) {
            report.sentences += 1;
            if content_tokens(sentence)
                .iter()
                .any(|token| fact_tokens.contains(token))
            {
                report.grounded += 1;
            } else {
                report.ungrounded.push(sentence.to_string());
            }
        }
        report
    }

    /// At least two thirds of sentences are grounded.
    pub fn within_tolerance(&self) -> bool {
        self.grounded * 3 >= self.sentences * 2
    }

    pub fn ratio(&self) -> f32 {
        if self.sentences == 0 {
            return 1.0;
        }
        self.grounded as f32 / self.sentences as f32
    }
}
