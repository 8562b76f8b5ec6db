//! Postgres-backed polls and votes.
//!
//! A vote is one transaction: the poll row is locked with `FOR UPDATE`, the
//! `(poll_id, user_id)` primary key of `votes` enforces the ledger rule, and
//! the tally update commits together with the vote row or not at all.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{PgPool, postgres::PgPoolOptions};
use tracing::{debug, info, warn};

use crate::backend::VoteBackend;
use crate::error::{Result, VoteError};
use crate::models::{NewPoll, Poll, VoteOutcome, VoteRecord, VoteRequest, VoteResult};

const CREATE_POLLS: &str = "CREATE TABLE IF NOT EXISTS polls (
    id TEXT PRIMARY KEY,
    question TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)";

const CREATE_POLL_OPTIONS: &str = "CREATE TABLE IF NOT EXISTS poll_options (
    poll_id TEXT NOT NULL REFERENCES polls (id),
    position INTEGER NOT NULL,
    option_id TEXT NOT NULL,
    votes BIGINT NOT NULL DEFAULT 0 CHECK (votes >= 0),
    PRIMARY KEY (poll_id, option_id)
)";

const CREATE_VOTES: &str = "CREATE TABLE IF NOT EXISTS votes (
    poll_id TEXT NOT NULL REFERENCES polls (id),
    user_id TEXT NOT NULL,
    option_id TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    PRIMARY KEY (poll_id, user_id)
)";

#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let db = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(db))
    }

    /// Creates the tables if they are missing.
    pub async fn migrate(&self) -> Result<()> {
        for statement in [CREATE_POLLS, CREATE_POLL_OPTIONS, CREATE_VOTES] {
            sqlx::query(statement).execute(&self.db).await?;
        }
        info!("database schema ready");
        Ok(())
    }

    pub async fn question_exists(&self, question: &str) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM polls WHERE question = $1)")
                .bind(question)
                .fetch_one(&self.db)
                .await?;
        Ok(exists)
    }

    pub async fn create_poll(&self, new_poll: NewPoll) -> Result<Poll> {
        let (id, question, options) = new_poll.validate()?;
        let poll = Poll::new(id, question, options);

        let mut tx = self.db.begin().await?;

        let inserted = sqlx::query(
            "INSERT INTO polls (id, question, created_at)
             VALUES ($1, $2, $3)
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(&poll.id)
        .bind(&poll.question)
        .bind(poll.created_at)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            return Err(VoteError::PollExists(poll.id));
        }

        for (position, option) in poll.options.iter().enumerate() {
            sqlx::query("INSERT INTO poll_options (poll_id, position, option_id) VALUES ($1, $2, $3)")
                .bind(&poll.id)
                .bind(position as i32)
                .bind(option)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        info!(poll_id = %poll.id, "poll created");
        Ok(poll)
    }

    pub async fn get_poll(&self, poll_id: &str) -> Result<Poll> {
        let row: Option<(String, String, DateTime<Utc>)> =
            sqlx::query_as("SELECT id, question, created_at FROM polls WHERE id = $1")
                .bind(poll_id)
                .fetch_optional(&self.db)
                .await?;
        let (id, question, created_at) =
            row.ok_or_else(|| VoteError::PollNotFound(poll_id.to_string()))?;

        let options: Vec<(String, i64)> = sqlx::query_as(
            "SELECT option_id, votes FROM poll_options WHERE poll_id = $1 ORDER BY position",
        )
        .bind(poll_id)
        .fetch_all(&self.db)
        .await?;

        Ok(assemble(id, question, created_at, options))
    }

    pub async fn list_polls(&self) -> Result<Vec<Poll>> {
        let polls: Vec<(String, String, DateTime<Utc>)> =
            sqlx::query_as("SELECT id, question, created_at FROM polls ORDER BY created_at DESC, id")
                .fetch_all(&self.db)
                .await?;

        let rows: Vec<(String, String, i64)> = sqlx::query_as(
            "SELECT poll_id, option_id, votes FROM poll_options ORDER BY poll_id, position",
        )
        .fetch_all(&self.db)
        .await?;

        let mut options: HashMap<String, Vec<(String, i64)>> = HashMap::new();
        for (poll_id, option_id, votes) in rows {
            options.entry(poll_id).or_default().push((option_id, votes));
        }

        Ok(polls
            .into_iter()
            .map(|(id, question, created_at)| {
                let opts = options.remove(&id).unwrap_or_default();
                assemble(id, question, created_at, opts)
            })
            .collect())
    }

    pub async fn record(&self, vote: &VoteRequest) -> Result<VoteOutcome> {
        vote.validate()?;

        let mut tx = self.db.begin().await?;

        // Serializes votes on this poll until commit.
        let locked: Option<String> = sqlx::query_scalar("SELECT id FROM polls WHERE id = $1 FOR UPDATE")
            .bind(&vote.poll_id)
            .fetch_optional(&mut *tx)
            .await?;
        if locked.is_none() {
            return Err(VoteError::PollNotFound(vote.poll_id.clone()));
        }

        let valid_option: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM poll_options WHERE poll_id = $1 AND option_id = $2)",
        )
        .bind(&vote.poll_id)
        .bind(&vote.option_id)
        .fetch_one(&mut *tx)
        .await?;
        if !valid_option {
            return Err(VoteError::InvalidOption {
                poll_id: vote.poll_id.clone(),
                option_id: vote.option_id.clone(),
            });
        }

        let inserted = sqlx::query(
            "INSERT INTO votes (poll_id, user_id, option_id)
             VALUES ($1, $2, $3)
             ON CONFLICT (poll_id, user_id) DO NOTHING",
        )
        .bind(&vote.poll_id)
        .bind(&vote.user_id)
        .bind(&vote.option_id)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            tx.rollback().await?;
            debug!(poll_id = %vote.poll_id, user_id = %vote.user_id, "duplicate vote rejected");
            return Ok(VoteOutcome::AlreadyVoted);
        }

        let updated = sqlx::query(
            "UPDATE poll_options SET votes = votes + 1 WHERE poll_id = $1 AND option_id = $2",
        )
        .bind(&vote.poll_id)
        .bind(&vote.option_id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() != 1 {
            tx.rollback().await?;
            warn!(poll_id = %vote.poll_id, option_id = %vote.option_id, "tally update missed, vote rolled back");
            return Err(VoteError::InconsistentState(format!(
                "tally for option '{}' on poll {} could not be updated",
                vote.option_id, vote.poll_id
            )));
        }

        tx.commit().await?;
        debug!(poll_id = %vote.poll_id, option_id = %vote.option_id, "vote recorded");
        Ok(VoteOutcome::Recorded)
    }

    pub async fn get_vote(&self, poll_id: &str, user_id: &str) -> Result<Option<VoteRecord>> {
        let record = sqlx::query_as::<_, VoteRecord>(
            "SELECT poll_id, user_id, option_id, created_at
             FROM votes WHERE poll_id = $1 AND user_id = $2",
        )
        .bind(poll_id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(record)
    }
}

fn assemble(
    id: String,
    question: String,
    created_at: DateTime<Utc>,
    rows: Vec<(String, i64)>,
) -> Poll {
    let votes = rows
        .iter()
        .map(|(option, count)| (option.clone(), (*count).max(0) as u64))
        .collect();
    Poll {
        id,
        question,
        options: rows.into_iter().map(|(option, _)| option).collect(),
        votes,
        created_at,
    }
}

impl VoteBackend for PgStore {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn health(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }

    async fn add_poll(&self, poll: NewPoll) -> Result<Poll> {
        self.create_poll(poll).await
    }

    async fn fetch_poll(&self, poll_id: &str) -> Result<Poll> {
        self.get_poll(poll_id).await
    }

    async fn fetch_polls(&self) -> Result<Vec<Poll>> {
        self.list_polls().await
    }

    async fn submit_vote(&self, vote: &VoteRequest) -> Result<VoteOutcome> {
        self.record(vote).await
    }

    async fn fetch_results(&self, poll_id: &str) -> Result<VoteResult> {
        Ok(self.get_poll(poll_id).await?.results())
    }

    async fn fetch_vote(&self, poll_id: &str, user_id: &str) -> Result<Option<VoteRecord>> {
        self.get_vote(poll_id, user_id).await
    }
}
