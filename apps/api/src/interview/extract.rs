//! Result Extractor: pulls structured fields out of free-text model responses.
//!
//! Compare responses carry `Coverage=<int>` somewhere in the text; the marker is
//! stripped before the text is shown or spoken. The summary response must be a single
//! `Lan=<int> Sub=<int> Beh=<int> Sum=<text>` line.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

static COVERAGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)coverage=(\d+)").expect("coverage pattern is valid"));

static RANKING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Lan=(\d+)\s+Sub=(\d+)\s+Beh=(\d+)\s+Sum=(.+)").expect("ranking pattern is valid")
});

/// Final per-candidate scores produced from the summary stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingResult {
    pub fluency: u8,
    pub subject_knowledge: u8,
    pub professional_behavior: u8,
    pub summary: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RankingParseError {
    #[error("summary response does not match 'Lan=<n> Sub=<n> Beh=<n> Sum=<text>'")]
    Malformed,

    #[error("{field} score {value} is outside 0-10")]
    OutOfRange { field: &'static str, value: u32 },
}

/// Compare-stage output after the coverage marker has been removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageExtraction {
    pub text: String,
    pub coverage: Option<u8>,
}

/// Finds the first `coverage=<int>` (any case), removes it, and returns the cleaned text.
/// Without a marker the text is returned untouched and coverage is `None`.
/// Values above 100 are clamped to 100.
pub fn extract_coverage(response: &str) -> CoverageExtraction {
    let Some(caps) = COVERAGE_RE.captures(response) else {
        return CoverageExtraction {
            text: response.to_string(),
            coverage: None,
        };
    };

    let coverage = caps[1]
        .parse::<u32>()
        .map(|v| v.min(100) as u8)
        .unwrap_or(100);
    let text = COVERAGE_RE.replace(response, "").trim().to_string();

    CoverageExtraction {
        text,
        coverage: Some(coverage),
    }
}

/// Parses the summary line into a `RankingResult`. Never defaults missing scores.
pub fn extract_ranking(response: &str) -> Result<RankingResult, RankingParseError> {
    let caps = RANKING_RE
        .captures(response)
        .ok_or(RankingParseError::Malformed)?;

    let fluency = score_field("Lan", &caps[1])?;
    let subject_knowledge = score_field("Sub", &caps[2])?;
    let professional_behavior = score_field("Beh", &caps[3])?;
    let summary = caps[4].trim().to_string();
    if summary.is_empty() {
        return Err(RankingParseError::Malformed);
    }

    Ok(RankingResult {
        fluency,
        subject_knowledge,
        professional_behavior,
        summary,
    })
}

fn score_field(field: &'static str, raw: &str) -> Result<u8, RankingParseError> {
    let value: u32 = raw.parse().map_err(|_| RankingParseError::Malformed)?;
    if value > 10 {
        return Err(RankingParseError::OutOfRange { field, value });
    }
    Ok(value as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coverage_is_extracted_and_stripped() {
        let out = extract_coverage("Good answer. Coverage=75");
        assert_eq!(out.text, "Good answer.");
        assert_eq!(out.coverage, Some(75));
    }

    #[test]
    fn test_coverage_marker_is_case_insensitive() {
        let out = extract_coverage("coverage=40 You missed the virtual DOM part.");
        assert_eq!(out.coverage, Some(40));
        assert_eq!(out.text, "You missed the virtual DOM part.");
    }

    #[test]
    fn test_missing_coverage_returns_original_text() {
        let original = "  Nice try, but incomplete.  ";
        let out = extract_coverage(original);
        assert_eq!(out.text, original);
        assert_eq!(out.coverage, None);
    }

    #[test]
    fn test_coverage_above_hundred_is_clamped() {
        assert_eq!(extract_coverage("Coverage=150").coverage, Some(100));
    }

    #[test]
    fn test_ranking_line_parses_all_four_fields() {
        let ranking = extract_ranking("Lan=8 Sub=7 Beh=9 Sum=Did well overall").unwrap();
        assert_eq!(
            ranking,
            RankingResult {
                fluency: 8,
                subject_knowledge: 7,
                professional_behavior: 9,
                summary: "Did well overall".to_string(),
            }
        );
    }

    #[test]
    fn test_ranking_line_may_be_surrounded_by_text() {
        let ranking =
            extract_ranking("Here is the ranking:\nLan=6 Sub=5  Beh=8 Sum=Solid basics \n")
                .unwrap();
        assert_eq!(ranking.subject_knowledge, 5);
        assert_eq!(ranking.summary, "Solid basics");
    }

    #[test]
    fn test_ranking_missing_field_fails() {
        assert_eq!(
            extract_ranking("Lan=8 Beh=9 Sum=Did well overall"),
            Err(RankingParseError::Malformed)
        );
    }

    #[test]
    fn test_ranking_out_of_range_fails() {
        assert_eq!(
            extract_ranking("Lan=11 Sub=7 Beh=9 Sum=Great"),
            Err(RankingParseError::OutOfRange {
                field: "Lan",
                value: 11
            })
        );
    }
}
