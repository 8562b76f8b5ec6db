//! Which users have voted on which polls.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Mutex;

use chrono::Utc;

use crate::error::{Result, lock_poisoned};
use crate::models::{VoteOutcome, VoteRecord};

/// Vote records keyed by poll id, then user id.
#[derive(Debug, Default)]
pub struct VoteLedger {
    records: Mutex<HashMap<String, HashMap<String, VoteRecord>>>,
}

impl VoteLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_voted(&self, poll_id: &str, user_id: &str) -> Result<bool> {
        Ok(self.get(poll_id, user_id)?.is_some())
    }

    pub fn get(&self, poll_id: &str, user_id: &str) -> Result<Option<VoteRecord>> {
        let records = self.records.lock().map_err(lock_poisoned)?;
        Ok(records
            .get(poll_id)
            .and_then(|voters| voters.get(user_id))
            .cloned())
    }

    /// Check-and-insert under a single lock acquisition. Two callers racing
    /// on the same pair cannot both see it absent.
    pub fn record_if_absent(
        &self,
        poll_id: &str,
        user_id: &str,
        option_id: &str,
    ) -> Result<VoteOutcome> {
        let mut records = self.records.lock().map_err(lock_poisoned)?;
        let voters = records.entry(poll_id.to_string()).or_default();

        match voters.entry(user_id.to_string()) {
            Entry::Occupied(_) => Ok(VoteOutcome::AlreadyVoted),
            Entry::Vacant(slot) => {
                slot.insert(VoteRecord {
                    poll_id: poll_id.to_string(),
                    user_id: user_id.to_string(),
                    option_id: option_id.to_string(),
                    created_at: Utc::now(),
                });
                Ok(VoteOutcome::Recorded)
            }
        }
    }

    /// Undoes a record. Only the vote service calls this, to roll back a
    /// vote whose tally update failed.
    pub(crate) fn remove(&self, poll_id: &str, user_id: &str) -> Result<Option<VoteRecord>> {
        let mut records = self.records.lock().map_err(lock_poisoned)?;
        let Some(voters) = records.get_mut(poll_id) else {
            return Ok(None);
        };
        let removed = voters.remove(user_id);
        if voters.is_empty() {
            records.remove(poll_id);
        }
        Ok(removed)
    }

    pub fn count_for_poll(&self, poll_id: &str) -> Result<usize> {
        let records = self.records.lock().map_err(lock_poisoned)?;
        Ok(records.get(poll_id).map_or(0, HashMap::len))
    }
}
