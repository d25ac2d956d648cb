//! Question Pool: the canonical interview questions for one session.
//!
//! Questions are drawn at random WITHOUT replacement: once drawn, a question is gone
//! from the pool for the rest of the session. An empty pool is a normal terminal
//! condition for question generation, so `draw()` returns `None` instead of failing.

use std::collections::BTreeMap;
use std::path::Path;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Text shown to the candidate when the pool has been exhausted.
pub const NO_MORE_QUESTIONS: &str = "No more questions available.";

const BUILTIN_BANK: &str = include_str!("../../data/react_basic.json");

#[derive(Debug, Error)]
pub enum QuestionBankError {
    #[error("failed to read question bank {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid question bank JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("question bank is empty")]
    Empty,
}

/// A single interview question with the answer the scorer compares against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub prompt: String,
    pub expected_answer: String,
}

/// On-disk shape: `{"question_1": {"question": "...", "expected_answer": "..."}}`.
#[derive(Debug, Deserialize)]
struct BankEntry {
    question: String,
    expected_answer: String,
}

/// Parses a question bank document into questions keyed by their bank id.
pub fn parse_bank(json: &str) -> Result<Vec<Question>, QuestionBankError> {
    let entries: BTreeMap<String, BankEntry> = serde_json::from_str(json)?;
    if entries.is_empty() {
        return Err(QuestionBankError::Empty);
    }
    Ok(entries
        .into_iter()
        .map(|(id, entry)| Question {
            id,
            prompt: entry.question,
            expected_answer: entry.expected_answer,
        })
        .collect())
}

/// The built-in React fundamentals bank.
pub fn builtin_bank() -> Result<Vec<Question>, QuestionBankError> {
    parse_bank(BUILTIN_BANK)
}

/// Loads a bank from `path`, falling back to the built-in bank when no path is given.
pub fn load_bank(path: Option<&Path>) -> Result<Vec<Question>, QuestionBankError> {
    match path {
        None => builtin_bank(),
        Some(path) => {
            let raw = std::fs::read_to_string(path).map_err(|source| QuestionBankError::Io {
                path: path.display().to_string(),
                source,
            })?;
            parse_bank(&raw)
        }
    }
}

/// Per-session pool of undrawn questions.
#[derive(Debug, Clone)]
pub struct QuestionPool {
    questions: Vec<Question>,
}

impl QuestionPool {
    pub fn new(questions: Vec<Question>) -> Self {
        Self { questions }
    }

    /// Draws a random question and removes it from the pool.
    pub fn draw(&mut self) -> Option<Question> {
        self.draw_with(&mut rand::thread_rng())
    }

    pub fn draw_with<R: Rng>(&mut self, rng: &mut R) -> Option<Question> {
        if self.questions.is_empty() {
            return None;
        }
        let index = rng.gen_range(0..self.questions.len());
        Some(self.questions.swap_remove(index))
    }

    pub fn remaining(&self) -> usize {
        self.questions.len()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    fn sample(n: usize) -> Vec<Question> {
        (1..=n)
            .map(|i| Question {
                id: format!("question_{i}"),
                prompt: format!("Question text {i}?"),
                expected_answer: format!("Answer {i}"),
            })
            .collect()
    }

    #[test]
    fn test_builtin_bank_has_twenty_questions() {
        let bank = builtin_bank().unwrap();
        assert_eq!(bank.len(), 20);
        assert!(bank.iter().any(|q| q.prompt == "What is JSX?"));
        assert!(bank.iter().all(|q| !q.expected_answer.is_empty()));
    }

    #[test]
    fn test_draw_never_repeats_within_a_session() {
        let mut pool = QuestionPool::new(sample(12));
        let mut rng = StdRng::seed_from_u64(7);
        let mut seen = HashSet::new();

        while let Some(q) = pool.draw_with(&mut rng) {
            assert!(seen.insert(q.id.clone()), "question {} drawn twice", q.id);
        }
        assert_eq!(seen.len(), 12);
    }

    #[test]
    fn test_draw_from_empty_pool_returns_none() {
        let mut pool = QuestionPool::new(sample(1));
        assert!(pool.draw().is_some());
        assert_eq!(pool.remaining(), 0);
        assert!(pool.draw().is_none());
        assert!(pool.draw().is_none());
    }

    #[test]
    fn test_remaining_decrements_per_draw() {
        let mut pool = QuestionPool::new(sample(3));
        assert_eq!(pool.remaining(), 3);
        pool.draw();
        assert_eq!(pool.remaining(), 2);
    }

    #[test]
    fn test_parse_bank_rejects_empty_document() {
        assert!(matches!(parse_bank("{}"), Err(QuestionBankError::Empty)));
    }

    #[test]
    fn test_parse_bank_requires_expected_answer() {
        let json = r#"{"q1": {"question": "What is Rust?"}}"#;
        assert!(matches!(parse_bank(json), Err(QuestionBankError::Parse(_))));
    }

    #[test]
    fn test_load_bank_reports_missing_file() {
        let result = load_bank(Some(Path::new("/definitely/not/here.json")));
        assert!(matches!(result, Err(QuestionBankError::Io { .. })));
    }
}
