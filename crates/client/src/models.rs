use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct Poll {
    pub id: String,
    pub question: String,
    pub options: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct NewPoll {
    pub question: String,
    pub options: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub poll_id: String,
    pub user_id: String,
    pub option_id: String,
}

#[derive(Debug, Deserialize)]
pub struct VoteResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteResult {
    pub question: String,
    pub total_votes: u64,
    pub options: Vec<OptionResult>,
}

#[derive(Debug, Deserialize)]
pub struct OptionResult {
    pub option: String,
    pub votes: u64,
    pub percentage: u32,
}
