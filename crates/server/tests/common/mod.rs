// Shared by several test files that are compiled separately
#![allow(dead_code)]

use poll_vote::{NewPoll, Poll, VoteService};

pub const LANGUAGES: [&str; 4] = ["JavaScript", "Python", "TypeScript", "Go"];

/// Service with one poll, `poll123`, offering the four languages.
pub fn seeded_service() -> VoteService {
    let service = VoteService::new();
    create_poll(&service, "poll123", &LANGUAGES);
    service
}

pub fn create_poll(service: &VoteService, id: &str, options: &[&str]) -> Poll {
    service
        .create_poll(NewPoll {
            id: Some(id.to_string()),
            question: "What's your favorite programming language?".to_string(),
            options: options.iter().map(|o| o.to_string()).collect(),
        })
        .unwrap()
}

/// Tally sum, ledger size and the expected voter count must all agree.
pub fn assert_consistent(service: &VoteService, poll_id: &str, voters: usize) {
    let poll = service.get_poll(poll_id).unwrap();
    assert_eq!(poll.total_votes(), voters as u64, "tally sum");
    assert_eq!(
        service.vote_count(poll_id).unwrap(),
        voters,
        "ledger entries"
    );
}
