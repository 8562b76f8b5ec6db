use std::future::Future;

use crate::error::Result;
use crate::models::{NewPoll, Poll, VoteOutcome, VoteRecord, VoteRequest, VoteResult};

/// What the HTTP layer needs from a place that stores polls and votes.
///
/// Implemented by the in-memory [`VoteService`](crate::service::VoteService)
/// and by [`PgStore`](crate::postgres::PgStore). Both must make the ledger
/// write and the tally increment of a vote appear as one step.
pub trait VoteBackend: Send + Sync + 'static {
    fn backend_name(&self) -> &'static str;

    fn health(&self) -> impl Future<Output = Result<()>> + Send;

    fn add_poll(&self, poll: NewPoll) -> impl Future<Output = Result<Poll>> + Send;

    fn fetch_poll(&self, poll_id: &str) -> impl Future<Output = Result<Poll>> + Send;

    fn fetch_polls(&self) -> impl Future<Output = Result<Vec<Poll>>> + Send;

    fn submit_vote(&self, vote: &VoteRequest) -> impl Future<Output = Result<VoteOutcome>> + Send;

    fn fetch_results(&self, poll_id: &str) -> impl Future<Output = Result<VoteResult>> + Send;

    fn fetch_vote(
        &self,
        poll_id: &str,
        user_id: &str,
    ) -> impl Future<Output = Result<Option<VoteRecord>>> + Send;
}
