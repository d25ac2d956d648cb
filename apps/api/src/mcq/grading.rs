use std::collections::BTreeMap;

use serde::Deserialize;
use thiserror::Error;

use crate::mcq::McqQuestion;
use crate::models::records::McqResponse;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SheetError {
    #[error("question {0} does not exist")]
    UnknownQuestion(usize),

    #[error("'{answer}' is not an option for question {question}")]
    UnknownOption { question: usize, answer: String },
}

/// One click on an option. Later selections for the same question replace earlier ones.
#[derive(Debug, Clone, Deserialize)]
pub struct Selection {
    pub question: usize,
    pub answer: String,
}

#[derive(Debug)]
pub struct AnswerSheet<'a> {
    bank: &'a [McqQuestion],
    selections: BTreeMap<usize, String>,
}

impl<'a> AnswerSheet<'a> {
    pub fn new(bank: &'a [McqQuestion]) -> Self {
        Self {
            bank,
            selections: BTreeMap::new(),
        }
    }

    pub fn from_selections(
        bank: &'a [McqQuestion],
        selections: impl IntoIterator<Item = Selection>,
    ) -> Result<Self, SheetError> {
        let mut sheet = Self::new(bank);
        for selection in selections {
            sheet.select(selection.question, selection.answer)?;
        }
        Ok(sheet)
    }

    pub fn select(&mut self, question: usize, answer: String) -> Result<(), SheetError> {
        let q = self
            .bank
            .get(question)
            .ok_or(SheetError::UnknownQuestion(question))?;
        if !q.options.contains(&answer) {
            return Err(SheetError::UnknownOption { question, answer });
        }
        self.selections.insert(question, answer);
        Ok(())
    }

    pub fn answered(&self) -> usize {
        self.selections.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct McqGrade {
    pub score: usize,
    pub total: usize,
    pub responses: Vec<McqResponse>,
}

/// Scores the sheet. Unanswered questions count against the total but are not reported
/// as responses.
pub fn grade(sheet: &AnswerSheet<'_>) -> McqGrade {
    let responses: Vec<McqResponse> = sheet
        .selections
        .iter()
        .map(|(&index, selected)| {
            let q = &sheet.bank[index];
            McqResponse {
                question: q.question.clone(),
                selected_answer: selected.clone(),
                correct_answer: q.correct_answer.clone(),
            }
        })
        .collect();
    let score = responses
        .iter()
        .filter(|r| r.selected_answer == r.correct_answer)
        .count();

    McqGrade {
        score,
        total: sheet.bank.len(),
        responses,
    }
}
