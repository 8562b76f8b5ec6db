//! Poll voting backend: one vote per user per poll, with tallies that stay
//! in step with the vote ledger under concurrent callers.

pub mod backend;
pub mod config;
pub mod error;
pub mod ledger;
pub mod models;
pub mod postgres;
pub mod routes;
pub mod service;
pub mod store;

pub use backend::VoteBackend;
pub use error::{Result, VoteError};
pub use ledger::VoteLedger;
pub use models::*;
pub use postgres::PgStore;
pub use service::VoteService;
pub use store::PollStore;
