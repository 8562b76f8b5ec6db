use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::VoteError;

pub const MIN_OPTIONS: usize = 2;
pub const MAX_OPTIONS: usize = 6;

pub const VOTE_RECORDED: &str = "Vote recorded";
pub const ALREADY_VOTED: &str = "User has already voted";

// ===== Polls =====

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Poll {
    pub id: String,
    pub question: String,
    pub options: Vec<String>,
    pub votes: HashMap<String, u64>,
    pub created_at: DateTime<Utc>,
}

impl Poll {
    /// Builds a poll with every option's tally at zero.
    pub fn new(id: String, question: String, options: Vec<String>) -> Self {
        let votes = options.iter().map(|o| (o.clone(), 0)).collect();
        Self {
            id,
            question,
            options,
            votes,
            created_at: Utc::now(),
        }
    }

    pub fn has_option(&self, option_id: &str) -> bool {
        self.options.iter().any(|o| o == option_id)
    }

    pub fn total_votes(&self) -> u64 {
        self.votes.values().sum()
    }

    pub fn results(&self) -> VoteResult {
        VoteResult::from_poll(self)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPoll {
    #[serde(default)]
    pub id: Option<String>,
    pub question: String,
    pub options: Vec<String>,
}

impl NewPoll {
    /// Trims every field and checks the poll form rules, returning the
    /// cleaned `(id, question, options)`. Ids are generated when absent.
    pub fn validate(self) -> Result<(String, String, Vec<String>), VoteError> {
        let question = self.question.trim().to_string();
        if question.is_empty() {
            return Err(VoteError::InvalidInput("question must not be empty".into()));
        }

        let options: Vec<String> = self.options.iter().map(|o| o.trim().to_string()).collect();
        if options.iter().any(String::is_empty) {
            return Err(VoteError::InvalidInput("options must not be empty".into()));
        }
        if !(MIN_OPTIONS..=MAX_OPTIONS).contains(&options.len()) {
            return Err(VoteError::InvalidInput(format!(
                "a poll needs between {MIN_OPTIONS} and {MAX_OPTIONS} options, got {}",
                options.len()
            )));
        }
        for (i, option) in options.iter().enumerate() {
            if options[..i].contains(option) {
                return Err(VoteError::InvalidInput(format!(
                    "duplicate option: {option}"
                )));
            }
        }

        let id = match self.id.map(|id| id.trim().to_string()) {
            Some(id) if id.is_empty() => {
                return Err(VoteError::InvalidInput("poll id must not be empty".into()));
            }
            Some(id) => id,
            None => uuid::Uuid::new_v4().to_string(),
        };

        Ok((id, question, options))
    }
}

// ===== Votes =====

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub poll_id: String,
    pub user_id: String,
    pub option_id: String,
}

impl VoteRequest {
    pub fn new(
        poll_id: impl Into<String>,
        user_id: impl Into<String>,
        option_id: impl Into<String>,
    ) -> Self {
        Self {
            poll_id: poll_id.into(),
            user_id: user_id.into(),
            option_id: option_id.into(),
        }
    }

    /// Required-field check, done before the ledger is touched.
    pub fn validate(&self) -> Result<(), VoteError> {
        for (field, value) in [
            ("pollId", &self.poll_id),
            ("userId", &self.user_id),
            ("optionId", &self.option_id),
        ] {
            if value.trim().is_empty() {
                return Err(VoteError::InvalidInput(format!("{field} is required")));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct VoteRecord {
    pub poll_id: String,
    pub user_id: String,
    pub option_id: String,
    pub created_at: DateTime<Utc>,
}

/// Outcome of a vote that passed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    Recorded,
    AlreadyVoted,
}

impl VoteOutcome {
    pub fn is_recorded(self) -> bool {
        self == VoteOutcome::Recorded
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteResponse {
    pub success: bool,
    pub message: String,
}

impl From<VoteOutcome> for VoteResponse {
    fn from(outcome: VoteOutcome) -> Self {
        match outcome {
            VoteOutcome::Recorded => Self {
                success: true,
                message: VOTE_RECORDED.to_string(),
            },
            VoteOutcome::AlreadyVoted => Self {
                success: false,
                message: ALREADY_VOTED.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteStatus {
    pub has_voted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub option_id: Option<String>,
}

impl From<Option<VoteRecord>> for VoteStatus {
    fn from(record: Option<VoteRecord>) -> Self {
        Self {
            has_voted: record.is_some(),
            option_id: record.map(|r| r.option_id),
        }
    }
}

// ===== Results =====

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteResult {
    pub poll_id: String,
    pub question: String,
    pub total_votes: u64,
    pub options: Vec<OptionResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionResult {
    pub option: String,
    pub votes: u64,
    pub percentage: u32,
}

impl VoteResult {
    /// Options come out sorted by votes, highest first. Ties keep the
    /// poll's option order.
    pub fn from_poll(poll: &Poll) -> Self {
        let total_votes = poll.total_votes();
        let mut options: Vec<OptionResult> = poll
            .options
            .iter()
            .map(|option| {
                let votes = poll.votes.get(option).copied().unwrap_or(0);
                OptionResult {
                    option: option.clone(),
                    votes,
                    percentage: percentage(votes, total_votes),
                }
            })
            .collect();
        options.sort_by(|a, b| b.votes.cmp(&a.votes));

        Self {
            poll_id: poll.id.clone(),
            question: poll.question.clone(),
            total_votes,
            options,
        }
    }
}

pub fn percentage(votes: u64, total: u64) -> u32 {
    if total == 0 {
        return 0;
    }
    (votes as f64 / total as f64 * 100.0).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_poll(options: &[&str]) -> NewPoll {
        NewPoll {
            id: None,
            question: "Best time for team meetings?".into(),
            options: options.iter().map(|o| o.to_string()).collect(),
        }
    }

    #[test]
    fn validate_trims_and_generates_id() {
        let (id, question, options) = NewPoll {
            id: None,
            question: "  Which meal do you prefer? ".into(),
            options: vec![" Lunch".into(), "Dinner ".into()],
        }
        .validate()
        .unwrap();

        assert!(!id.is_empty());
        assert_eq!(question, "Which meal do you prefer?");
        assert_eq!(options, vec!["Lunch", "Dinner"]);
    }

    #[test]
    fn validate_rejects_bad_option_counts() {
        assert!(matches!(
            new_poll(&["Only"]).validate(),
            Err(VoteError::InvalidInput(_))
        ));
        assert!(matches!(
            new_poll(&["a", "b", "c", "d", "e", "f", "g"]).validate(),
            Err(VoteError::InvalidInput(_))
        ));
        assert!(new_poll(&["a", "b", "c", "d", "e", "f"]).validate().is_ok());
    }

    #[test]
    fn validate_rejects_blank_and_duplicate_options() {
        assert!(new_poll(&["Morning", "  "]).validate().is_err());
        assert!(new_poll(&["Morning", "Morning"]).validate().is_err());
    }

    #[test]
    fn vote_request_requires_every_field() {
        assert!(VoteRequest::new("poll123", "user456", "option789").validate().is_ok());
        let err = VoteRequest::new("poll123", " ", "option789")
            .validate()
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid input: userId is required");
    }

    #[test]
    fn vote_request_uses_camel_case() {
        let req: VoteRequest = serde_json::from_str(
            r#"{"pollId":"poll123","userId":"user456","optionId":"option789"}"#,
        )
        .unwrap();
        assert_eq!(req.poll_id, "poll123");
        assert_eq!(req.option_id, "option789");
    }

    #[test]
    fn percentages_round_and_handle_empty_polls() {
        assert_eq!(percentage(0, 0), 0);
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(2, 3), 67);
        assert_eq!(percentage(1, 8), 13);
    }

    #[test]
    fn results_sort_by_votes_keeping_ties_in_order() {
        let mut poll = Poll::new(
            "p".into(),
            "q".into(),
            vec!["JavaScript".into(), "Python".into(), "Go".into()],
        );
        poll.votes.insert("Python".into(), 3);
        poll.votes.insert("Go".into(), 1);

        let result = poll.results();
        assert_eq!(result.total_votes, 4);
        let order: Vec<_> = result.options.iter().map(|o| o.option.as_str()).collect();
        assert_eq!(order, vec!["Python", "Go", "JavaScript"]);
        assert_eq!(result.options[0].percentage, 75);
        assert_eq!(result.options[2].percentage, 0);
    }
}
