//! Shared deterministic types for the workflow core.
//!
//! These types define stable contracts between the controller and its
//! collaborators. They carry no behavior that touches I/O and must serialize
//! identically across runs.

use std::fmt;
use std::str::FromStr;

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// One of the two live candidates in a comparison round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    #[serde(alias = "a")]
    A,
    #[serde(alias = "b")]
    B,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Side::A => "A",
            Side::B => "B",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "A" | "a" => Ok(Side::A),
            "B" | "b" => Ok(Side::B),
            other => Err(format!("unknown side '{other}' (expected A or B)")),
        }
    }
}

/// User-supplied seed for one workflow run.
///
/// Missing fields default to [`FormInput::default`], so an omitted `date`
/// means "today" while an explicit empty string means "not provided".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormInput {
    #[serde(deserialize_with = "deserialize_optional_date")]
    pub date: Option<NaiveDate>,
    pub url: String,
    pub decided: String,
    pub anniversary: String,
    pub remarks: String,
}

impl FormInput {
    /// Empty form dated `date`.
    pub fn dated(date: NaiveDate) -> Self {
        Self {
            date: Some(date),
            url: String::new(),
            decided: String::new(),
            anniversary: String::new(),
            remarks: String::new(),
        }
    }
}

impl Default for FormInput {
    fn default() -> Self {
        Self::dated(Local::now().date_naive())
    }
}

fn deserialize_optional_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// Output of context retrieval. Entries are opaque to the controller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextBundle {
    pub retrieval_matches: Vec<Value>,
    pub similar_posts: Vec<Value>,
    pub analytics_insights: String,
}

impl ContextBundle {
    /// Whether retrieval produced anything worth reviewing.
    pub fn has_matches(&self) -> bool {
        !self.retrieval_matches.is_empty()
    }
}

/// One generated content item.
///
/// Generator-supplied fields beyond the known three are kept in `metadata`
/// and passed through unmodified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub text: String,
    #[serde(default)]
    pub character_count: usize,
    #[serde(default)]
    pub is_valid: bool,
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

impl Candidate {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            character_count: text.chars().count(),
            text,
            is_valid: true,
            metadata: Map::new(),
        }
    }

    /// Reported character count, falling back to counting `text`.
    pub fn length(&self) -> usize {
        if self.character_count > 0 {
            return self.character_count;
        }
        self.text.chars().count()
    }
}

/// The two candidates produced by generation or refinement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidatePair {
    pub a: Candidate,
    pub b: Candidate,
}

/// Acknowledgement returned by a publisher.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishReceipt {
    pub draft_row: Option<u64>,
    pub published_row: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_parses_either_case() {
        assert_eq!("a".parse::<Side>(), Ok(Side::A));
        assert_eq!(" B ".parse::<Side>(), Ok(Side::B));
        assert!("C".parse::<Side>().unwrap_err().contains("unknown side"));
    }

    #[test]
    fn form_without_date_defaults_to_today() {
        let form: FormInput = serde_json::from_str(r#"{"url":"http://x"}"#).expect("parse");
        assert_eq!(form.date, Some(Local::now().date_naive()));
        assert_eq!(form.url, "http://x");
        assert!(form.decided.is_empty());
    }

    #[test]
    fn form_with_blank_date_has_no_date() {
        let form: FormInput = serde_json::from_str(r#"{"date":""}"#).expect("parse");
        assert_eq!(form.date, None);

        let form: FormInput = serde_json::from_str(r#"{"date":"2024-01-01"}"#).expect("parse");
        assert_eq!(form.date, NaiveDate::from_ymd_opt(2024, 1, 1));
    }

    #[test]
    fn candidate_keeps_unknown_fields() {
        let raw = r#"{"text":"hello","character_count":5,"is_valid":true,"thinking":"because"}"#;
        let candidate: Candidate = serde_json::from_str(raw).expect("parse");
        assert_eq!(
            candidate.metadata.get("thinking"),
            Some(&Value::String("because".to_string()))
        );

        let back = serde_json::to_value(&candidate).expect("serialize");
        assert_eq!(back["thinking"], "because");
    }

    #[test]
    fn candidate_length_falls_back_to_text() {
        let mut candidate = Candidate::new("防災の日");
        assert_eq!(candidate.length(), 4);
        candidate.character_count = 0;
        assert_eq!(candidate.length(), 4);
        candidate.character_count = 140;
        assert_eq!(candidate.length(), 140);
    }
}
