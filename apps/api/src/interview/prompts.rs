// Prompt templates for every model-backed interview stage.
// Placeholders are replaced verbatim; building a prompt has no side effects.

use crate::interview::stages::Stage;
use crate::llm_client::prompts::SPOKEN_OUTPUT_INSTRUCTION;

/// System prompt shared by all interview stages.
pub const INTERVIEWER_SYSTEM: &str = "You are a professional technical interviewer \
    conducting a live spoken interview for a full stack developer position. \
    Keep every reply short and conversational.";

pub const WELCOME_TEMPLATE: &str = "You are conducting an interview for a full stack \
    developer position at {company}. Welcome the candidate, {candidate}, and ask them to \
    introduce themselves.";

pub const INTRODUCTION_TEMPLATE: &str = "You are conducting an interview. Candidate's name \
    is {candidate}, Field is full stack dev. This is Candidate's introduction: {transcript}";

pub const START_TEMPLATE: &str = "Introduction is over. Provide brief feedback to what the \
    candidate said and tell the candidate that we are moving on to the questions. \
    Candidate said: {transcript}";

pub const NEXT_QUESTION_TEMPLATE: &str = "You are an interviewer. Tell the candidate that we \
    are getting into the next question. Do not ask them if they are ready. \
    Candidate name: {candidate}";

pub const INTERVIEW_END_TEMPLATE: &str = "You are an interviewer. The interview has ended. \
    Tell that to the candidate. Candidate name: {candidate}";

pub const FOLLOWUP_TEMPLATE: &str = "You are an interviewer. Ask a follow-up question based \
    upon the previous question. Just ask the question. The question should be purely \
    theoretical, do not ask for code examples. Make the question easier than the previous \
    question. Previous Question: {question}";

pub const COMPARE_TEMPLATE: &str = "You are an Interviewer. Compare the expected answer and \
    candidate answer and give coverage in the end like eg: Coverage=80.
Question: {question}
Expected Answer: {expected_answer}
Candidate Answer: {transcript}";

pub const COMPARE_FOLLOWUP_TEMPLATE: &str = "You are an Interviewer. Compare candidate answer \
    and give coverage in the end like eg: Coverage=80.
Question: {question}
Candidate Answer: {transcript}";

pub const SUMMARY_TEMPLATE: &str = "I will provide you with a conversation of an interviewer \
    and a candidate. Rank the candidate based on three criteria: 1. Language fluency \
    2. Subject knowledge 3. Behaviour. As output give only these three rankings out of 10 \
    and a small summary of how the candidate did, in exactly this format:
Lan=number Sub=number Beh=number Sum=summary
Conversation: {conversation}";

/// A model-backed stage together with the inputs its template needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StagePrompt {
    Welcome {
        company: String,
        candidate: String,
    },
    Introduction {
        candidate: String,
        transcript: String,
    },
    Start {
        transcript: String,
    },
    NextQuestion {
        candidate: String,
    },
    InterviewEnd {
        candidate: String,
    },
    Summary {
        conversation: String,
    },
    Followup {
        question: String,
    },
    Compare {
        question: String,
        expected_answer: String,
        transcript: String,
    },
    CompareFollowup {
        question: String,
        transcript: String,
    },
}

impl StagePrompt {
    pub fn stage(&self) -> Stage {
        match self {
            StagePrompt::Welcome { .. } => Stage::Welcome,
            StagePrompt::Introduction { .. } => Stage::Introduction,
            StagePrompt::Start { .. } => Stage::Start,
            StagePrompt::NextQuestion { .. } => Stage::NextQuestion,
            StagePrompt::InterviewEnd { .. } => Stage::InterviewEnd,
            StagePrompt::Summary { .. } => Stage::Summary,
            StagePrompt::Followup { .. } => Stage::Followup,
            StagePrompt::Compare { .. } => Stage::Compare,
            StagePrompt::CompareFollowup { .. } => Stage::CompareFollowup,
        }
    }

    /// The candidate utterance this stage carries, if any.
    pub fn transcript(&self) -> Option<&str> {
        match self {
            StagePrompt::Introduction { transcript, .. }
            | StagePrompt::Start { transcript }
            | StagePrompt::Compare { transcript, .. }
            | StagePrompt::CompareFollowup { transcript, .. } => Some(transcript),
            _ => None,
        }
    }

    /// Renders the instruction sent to the model.
    pub fn build(&self) -> String {
        let body = match self {
            StagePrompt::Welcome { company, candidate } => fill(
                WELCOME_TEMPLATE,
                &[("company", company.as_str()), ("candidate", candidate.as_str())],
            ),
            StagePrompt::Introduction {
                candidate,
                transcript,
            } => fill(
                INTRODUCTION_TEMPLATE,
                &[("candidate", candidate.as_str()), ("transcript", transcript.as_str())],
            ),
            StagePrompt::Start { transcript } => {
                fill(START_TEMPLATE, &[("transcript", transcript.as_str())])
            }
            StagePrompt::NextQuestion { candidate } => {
                fill(NEXT_QUESTION_TEMPLATE, &[("candidate", candidate.as_str())])
            }
            StagePrompt::InterviewEnd { candidate } => {
                fill(INTERVIEW_END_TEMPLATE, &[("candidate", candidate.as_str())])
            }
            // Summary output is parsed, not spoken.
            StagePrompt::Summary { conversation } => {
                return fill(SUMMARY_TEMPLATE, &[("conversation", conversation.as_str())])
            }
            StagePrompt::Followup { question } => {
                fill(FOLLOWUP_TEMPLATE, &[("question", question.as_str())])
            }
            StagePrompt::Compare {
                question,
                expected_answer,
                transcript,
            } => fill(
                COMPARE_TEMPLATE,
                &[
                    ("question", question.as_str()),
                    ("expected_answer", expected_answer.as_str()),
                    ("transcript", transcript.as_str()),
                ],
            ),
            StagePrompt::CompareFollowup {
                question,
                transcript,
            } => fill(
                COMPARE_FOLLOWUP_TEMPLATE,
                &[("question", question.as_str()), ("transcript", transcript.as_str())],
            ),
        };
        format!("{body}\n\n{SPOKEN_OUTPUT_INSTRUCTION}")
    }
}

/// Substitutes `{name}` placeholders in one pass over the template. Inserted values are
/// never scanned again, so braces inside candidate text or bank questions stay literal.
fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let value = after.find('}').and_then(|close| {
            let name = &after[..close];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value, close))
        });
        match value {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
