//! In-memory poll definitions and tallies.
//!
//! Every poll sits in its own [`PollSlot`]. Holding a slot's lock is the
//! per-poll critical section: the vote service keeps it for the whole
//! ledger-check, ledger-insert and tally-increment sequence.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use crate::error::{Result, VoteError, lock_poisoned};
use crate::models::Poll;

pub type PollSlot = Arc<Mutex<Poll>>;

#[derive(Debug, Default)]
pub struct PollStore {
    polls: RwLock<HashMap<String, PollSlot>>,
}

impl PollStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a poll with no votes yet. Tallies only grow through
    /// [`increment`], so a poll arriving with counts is refused.
    pub fn insert(&self, poll: Poll) -> Result<()> {
        if poll.votes.values().any(|&count| count != 0)
            || poll.votes.keys().any(|option| !poll.has_option(option))
        {
            return Err(VoteError::InvalidInput(format!(
                "poll {} must start with empty tallies",
                poll.id
            )));
        }

        let mut polls = self.polls.write().map_err(lock_poisoned)?;
        if polls.contains_key(&poll.id) {
            return Err(VoteError::PollExists(poll.id));
        }
        polls.insert(poll.id.clone(), Arc::new(Mutex::new(poll)));
        Ok(())
    }

    /// Returns the lock slot for a poll. The map lock is released before
    /// the caller locks the slot.
    pub(crate) fn slot(&self, poll_id: &str) -> Result<PollSlot> {
        let polls = self.polls.read().map_err(lock_poisoned)?;
        polls
            .get(poll_id)
            .cloned()
            .ok_or_else(|| VoteError::PollNotFound(poll_id.to_string()))
    }

    pub fn get_poll(&self, poll_id: &str) -> Result<Poll> {
        let slot = self.slot(poll_id)?;
        let poll = slot.lock().map_err(lock_poisoned)?;
        Ok(poll.clone())
    }

    // Vote paths hold the slot lock and call `increment` directly.
    #[cfg_attr(not(test), allow(dead_code))]
    pub(crate) fn increment_tally(&self, poll_id: &str, option_id: &str) -> Result<()> {
        let slot = self.slot(poll_id)?;
        let mut poll = slot.lock().map_err(lock_poisoned)?;
        increment(&mut poll, option_id)
    }

    /// Snapshot of every poll, newest first.
    pub fn list(&self) -> Result<Vec<Poll>> {
        let slots: Vec<PollSlot> = {
            let polls = self.polls.read().map_err(lock_poisoned)?;
            polls.values().cloned().collect()
        };

        let mut out = Vec::with_capacity(slots.len());
        for slot in slots {
            out.push(slot.lock().map_err(lock_poisoned)?.clone());
        }
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(out)
    }

    pub fn len(&self) -> Result<usize> {
        let polls = self.polls.read().map_err(lock_poisoned)?;
        Ok(polls.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

/// Adds one vote to `option_id` on an already locked poll.
pub(crate) fn increment(poll: &mut Poll, option_id: &str) -> Result<()> {
    if !poll.has_option(option_id) {
        return Err(VoteError::InvalidOption {
            poll_id: poll.id.clone(),
            option_id: option_id.to_string(),
        });
    }
    *poll.votes.entry(option_id.to_string()).or_insert(0) += 1;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_poll() -> PollStore {
        let store = PollStore::new();
        store
            .insert(Poll::new(
                "poll123".into(),
                "Preferred work-from-home schedule?".into(),
                vec!["Full remote".into(), "Hybrid".into(), "Office only".into()],
            ))
            .unwrap();
        store
    }

    #[test]
    fn increment_touches_only_one_option() {
        let store = store_with_poll();
        store.increment_tally("poll123", "Hybrid").unwrap();
        store.increment_tally("poll123", "Hybrid").unwrap();

        let poll = store.get_poll("poll123").unwrap();
        assert_eq!(poll.votes["Hybrid"], 2);
        assert_eq!(poll.votes["Full remote"], 0);
        assert_eq!(poll.votes["Office only"], 0);
    }

    #[test]
    fn increment_rejects_unknown_option() {
        let store = store_with_poll();
        let err = store.increment_tally("poll123", "Four-day week").unwrap_err();
        assert!(matches!(err, VoteError::InvalidOption { .. }));
        assert_eq!(store.get_poll("poll123").unwrap().total_votes(), 0);
    }

    #[test]
    fn unknown_poll_is_not_found() {
        let store = store_with_poll();
        assert!(matches!(
            store.get_poll("pollXYZ"),
            Err(VoteError::PollNotFound(id)) if id == "pollXYZ"
        ));
        assert!(matches!(
            store.increment_tally("pollXYZ", "Hybrid"),
            Err(VoteError::PollNotFound(_))
        ));
    }

    #[test]
    fn duplicate_poll_ids_are_rejected() {
        let store = store_with_poll();
        let err = store
            .insert(Poll::new("poll123".into(), "q".into(), vec!["a".into(), "b".into()]))
            .unwrap_err();
        assert!(matches!(err, VoteError::PollExists(_)));
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn insert_refuses_preloaded_tallies() {
        let store = PollStore::new();
        let mut poll = Poll::new("poll456".into(), "q".into(), vec!["a".into(), "b".into()]);
        poll.votes.insert("a".into(), 7);

        let err = store.insert(poll).unwrap_err();
        assert!(matches!(err, VoteError::InvalidInput(_)));
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn insert_refuses_tallies_for_unknown_options() {
        let store = PollStore::new();
        let mut poll = Poll::new("poll456".into(), "q".into(), vec!["a".into(), "b".into()]);
        poll.votes.insert("c".into(), 0);

        assert!(store.insert(poll).is_err());
        assert_eq!(store.len().unwrap(), 0);
    }

    #[test]
    fn poisoned_map_lock_is_reported() {
        let store = std::sync::Arc::new(store_with_poll());
        let poisoner = std::sync::Arc::clone(&store);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.polls.write().unwrap();
            panic!("poison the poll map");
        })
        .join();

        assert!(matches!(store.len(), Err(VoteError::InconsistentState(_))));
        assert!(store.is_empty().is_err());
    }
}
