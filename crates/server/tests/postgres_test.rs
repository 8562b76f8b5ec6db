//! Runs against the database in `DATABASE_URL`; each test returns early
//! when it is not set. Poll ids are random so runs can share a database.

use poll_vote::{NewPoll, PgStore, VoteError, VoteOutcome, VoteRequest};
use sqlx::{PgPool, postgres::PgPoolOptions};

async fn test_store() -> Option<(PgStore, PgPool)> {
    dotenv::dotenv().ok();
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping postgres test");
        return None;
    };

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .unwrap();
    let store = PgStore::new(pool.clone());
    store.migrate().await.unwrap();
    Some((store, pool))
}

async fn create_poll(store: &PgStore, options: &[&str]) -> String {
    store
        .create_poll(NewPoll {
            id: Some(format!("poll-{}", uuid::Uuid::new_v4())),
            question: "Best time for team meetings?".to_string(),
            options: options.iter().map(|o| o.to_string()).collect(),
        })
        .await
        .unwrap()
        .id
}

async fn vote_rows(pool: &PgPool, poll_id: &str) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM votes WHERE poll_id = $1")
        .bind(poll_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

#[tokio::test]
async fn first_vote_recorded_then_duplicate_rejected() {
    let Some((store, pool)) = test_store().await else {
        return;
    };
    let poll_id = create_poll(&store, &["Morning", "Afternoon"]).await;

    let first = store
        .record(&VoteRequest::new(&poll_id, "user456", "Morning"))
        .await
        .unwrap();
    let second = store
        .record(&VoteRequest::new(&poll_id, "user456", "Afternoon"))
        .await
        .unwrap();

    assert_eq!(first, VoteOutcome::Recorded);
    assert_eq!(second, VoteOutcome::AlreadyVoted);

    let poll = store.get_poll(&poll_id).await.unwrap();
    assert_eq!(poll.votes["Morning"], 1);
    assert_eq!(poll.votes["Afternoon"], 0);
    assert_eq!(vote_rows(&pool, &poll_id).await, 1);

    let record = store.get_vote(&poll_id, "user456").await.unwrap().unwrap();
    assert_eq!(record.option_id, "Morning");
}

#[tokio::test]
async fn vote_on_unknown_poll_is_not_found() {
    let Some((store, pool)) = test_store().await else {
        return;
    };
    let poll_id = format!("missing-{}", uuid::Uuid::new_v4());

    let err = store
        .record(&VoteRequest::new(&poll_id, "userA", "optionA"))
        .await
        .unwrap_err();

    assert!(matches!(err, VoteError::PollNotFound(id) if id == poll_id));
    assert_eq!(vote_rows(&pool, &poll_id).await, 0);
}

#[tokio::test]
async fn invalid_option_leaves_no_vote_row() {
    let Some((store, pool)) = test_store().await else {
        return;
    };
    let poll_id = create_poll(&store, &["Morning", "Afternoon"]).await;

    let err = store
        .record(&VoteRequest::new(&poll_id, "user456", "Midnight"))
        .await
        .unwrap_err();

    assert!(matches!(err, VoteError::InvalidOption { .. }));
    assert_eq!(vote_rows(&pool, &poll_id).await, 0);
    assert_eq!(store.get_poll(&poll_id).await.unwrap().total_votes(), 0);

    // the failed attempt does not use up the user's vote
    let outcome = store
        .record(&VoteRequest::new(&poll_id, "user456", "Afternoon"))
        .await
        .unwrap();
    assert_eq!(outcome, VoteOutcome::Recorded);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_voters_match_vote_rows() {
    let Some((store, pool)) = test_store().await else {
        return;
    };
    let options = ["Morning", "Afternoon", "Evening", "Flexible"];
    let poll_id = create_poll(&store, &options).await;

    let tasks: Vec<_> = (0..40)
        .map(|i| {
            let store = store.clone();
            let poll_id = poll_id.clone();
            tokio::spawn(async move {
                // users 0..20 each submit twice
                let vote = VoteRequest::new(&poll_id, format!("user{}", i % 20), options[i % 4]);
                store.record(&vote).await.unwrap()
            })
        })
        .collect();

    let mut recorded = 0;
    for task in tasks {
        if task.await.unwrap() == VoteOutcome::Recorded {
            recorded += 1;
        }
    }

    let poll = store.get_poll(&poll_id).await.unwrap();
    assert_eq!(recorded, 20);
    assert_eq!(poll.total_votes(), 20);
    assert_eq!(vote_rows(&pool, &poll_id).await, 20);
}
