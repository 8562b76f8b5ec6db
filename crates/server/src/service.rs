//! Vote recording over the in-memory poll store and ledger.

use tracing::{debug, error, info};

use crate::backend::VoteBackend;
use crate::error::{Result, VoteError, lock_poisoned};
use crate::ledger::VoteLedger;
use crate::models::{
    NewPoll, Poll, VoteOutcome, VoteRecord, VoteRequest, VoteResponse, VoteResult,
};
use crate::store::{self, PollStore};

#[derive(Debug, Default)]
pub struct VoteService {
    polls: PollStore,
    ledger: VoteLedger,
}

impl VoteService {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn polls(&self) -> &PollStore {
        &self.polls
    }

    /// Number of users with a recorded vote on the poll.
    pub fn vote_count(&self, poll_id: &str) -> Result<usize> {
        self.ledger.count_for_poll(poll_id)
    }

    // ========================
    // Polls
    // ========================

    pub fn create_poll(&self, new_poll: NewPoll) -> Result<Poll> {
        let (id, question, options) = new_poll.validate()?;
        let poll = Poll::new(id, question, options);
        self.polls.insert(poll.clone())?;
        info!(poll_id = %poll.id, options = poll.options.len(), "poll created");
        Ok(poll)
    }

    pub fn get_poll(&self, poll_id: &str) -> Result<Poll> {
        self.polls.get_poll(poll_id)
    }

    pub fn list_polls(&self) -> Result<Vec<Poll>> {
        self.polls.list()
    }

    /// Results are read under the poll lock, so they never show a vote
    /// that is half applied.
    pub fn results(&self, poll_id: &str) -> Result<VoteResult> {
        let slot = self.polls.slot(poll_id)?;
        let poll = slot.lock().map_err(lock_poisoned)?;
        Ok(poll.results())
    }

    // ========================
    // Votes
    // ========================

    pub fn has_voted(&self, poll_id: &str, user_id: &str) -> Result<bool> {
        self.ledger.has_voted(poll_id, user_id)
    }

    pub fn get_vote(&self, poll_id: &str, user_id: &str) -> Result<Option<VoteRecord>> {
        self.ledger.get(poll_id, user_id)
    }

    /// Records one vote and answers in the `{ success, message }` shape.
    /// A repeat vote is a normal outcome, not an error.
    pub fn record_vote(
        &self,
        poll_id: &str,
        user_id: &str,
        option_id: &str,
    ) -> Result<VoteResponse> {
        let outcome = self.record(&VoteRequest::new(poll_id, user_id, option_id))?;
        Ok(outcome.into())
    }

    pub fn record(&self, vote: &VoteRequest) -> Result<VoteOutcome> {
        vote.validate()?;

        let slot = self.polls.slot(&vote.poll_id)?;
        let mut poll = slot.lock().map_err(lock_poisoned)?;

        if !poll.has_option(&vote.option_id) {
            return Err(VoteError::InvalidOption {
                poll_id: vote.poll_id.clone(),
                option_id: vote.option_id.clone(),
            });
        }

        self.apply(&mut poll, vote)
    }

    /// Ledger insert then tally increment, on a poll the caller has locked.
    /// A failed increment removes the ledger entry again.
    fn apply(&self, poll: &mut Poll, vote: &VoteRequest) -> Result<VoteOutcome> {
        let outcome = self
            .ledger
            .record_if_absent(&vote.poll_id, &vote.user_id, &vote.option_id)?;

        if outcome == VoteOutcome::AlreadyVoted {
            debug!(poll_id = %vote.poll_id, user_id = %vote.user_id, "duplicate vote rejected");
            return Ok(outcome);
        }

        if let Err(err) = store::increment(poll, &vote.option_id) {
            return match self.ledger.remove(&vote.poll_id, &vote.user_id)? {
                Some(_) => Err(err),
                None => {
                    error!(
                        poll_id = %vote.poll_id,
                        user_id = %vote.user_id,
                        "vote record vanished before rollback"
                    );
                    Err(VoteError::InconsistentState(format!(
                        "could not roll back vote of {} on {}",
                        vote.user_id, vote.poll_id
                    )))
                }
            };
        }

        debug!(poll_id = %vote.poll_id, option_id = %vote.option_id, "vote recorded");
        Ok(outcome)
    }
}

impl VoteBackend for VoteService {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn health(&self) -> Result<()> {
        Ok(())
    }

    async fn add_poll(&self, poll: NewPoll) -> Result<Poll> {
        self.create_poll(poll)
    }

    async fn fetch_poll(&self, poll_id: &str) -> Result<Poll> {
        self.get_poll(poll_id)
    }

    async fn fetch_polls(&self) -> Result<Vec<Poll>> {
        self.list_polls()
    }

    async fn submit_vote(&self, vote: &VoteRequest) -> Result<VoteOutcome> {
        self.record(vote)
    }

    async fn fetch_results(&self, poll_id: &str) -> Result<VoteResult> {
        self.results(poll_id)
    }

    async fn fetch_vote(&self, poll_id: &str, user_id: &str) -> Result<Option<VoteRecord>> {
        self.get_vote(poll_id, user_id)
    }
}
