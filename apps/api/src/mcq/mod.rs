//! Multiple-choice round.
//!
//! A fixed bank of questions. Clients only ever see the questions and options; correct
//! answers stay on the server and are used when a submitted sheet is graded.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod grading;
pub mod handlers;

const BUILTIN_MCQ_BANK: &str = include_str!("../../data/mcq.json");

#[derive(Debug, Error)]
pub enum McqBankError {
    #[error("invalid MCQ bank JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("MCQ bank is empty")]
    Empty,

    #[error("correct answer for question {index} is not one of its options")]
    AnswerNotAnOption { index: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct McqQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
}

/// Client view of a question: no correct answer.
#[derive(Debug, Clone, Serialize)]
pub struct PublicQuestion {
    pub index: usize,
    pub question: String,
    pub options: Vec<String>,
}

pub fn parse_bank(json: &str) -> Result<Vec<McqQuestion>, McqBankError> {
    let bank: Vec<McqQuestion> = serde_json::from_str(json)?;
    if bank.is_empty() {
        return Err(McqBankError::Empty);
    }
    if let Some(index) = bank
        .iter()
        .position(|q| !q.options.contains(&q.correct_answer))
    {
        return Err(McqBankError::AnswerNotAnOption { index });
    }
    Ok(bank)
}

pub fn builtin_bank() -> Result<Vec<McqQuestion>, McqBankError> {
    parse_bank(BUILTIN_MCQ_BANK)
}

pub fn public_view(bank: &[McqQuestion]) -> Vec<PublicQuestion> {
    bank.iter()
        .enumerate()
        .map(|(index, q)| PublicQuestion {
            index,
            question: q.question.clone(),
            options: q.options.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_bank_is_consistent() {
        let bank = builtin_bank().unwrap();
        assert_eq!(bank.len(), 20);
        assert_eq!(bank[0].correct_answer, "Paris");
    }

    #[test]
    fn test_answer_must_be_an_option() {
        let json = r#"[{"question":"2+2?","options":["3","5"],"correct_answer":"4"}]"#;
        assert!(matches!(
            parse_bank(json),
            Err(McqBankError::AnswerNotAnOption { index: 0 })
        ));
    }

    #[test]
    fn test_public_view_hides_answers() {
        let bank = builtin_bank().unwrap();
        let json = serde_json::to_value(public_view(&bank)).unwrap();
        assert_eq!(json[1]["index"], 1);
        assert!(json[1].get("correct_answer").is_none());
        assert_eq!(json[1]["options"].as_array().unwrap().len(), 4);
    }
}
