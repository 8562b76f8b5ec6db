use poll_vote::{NewPoll, PgStore, config::Config};

/// Parses `question | option | option ...`. Blank lines and `#` comments
/// yield `None`.
fn parse_line(line: &str) -> Option<NewPoll> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let mut parts = line.split('|').map(str::trim);
    let question = parts.next()?.to_string();
    Some(NewPoll {
        id: None,
        question,
        options: parts.map(str::to_string).collect(),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = Config::load()?;
    let database_url = config
        .database_url
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("DATABASE_URL must be set"))?;

    let store = PgStore::connect(database_url, config.db_max_connections).await?;
    store.migrate().await?;

    println!("Connected to database!");

    let polls_content = std::fs::read_to_string(&config.polls_file).map_err(|e| {
        anyhow::anyhow!("Failed to read {} - make sure it exists! ({e})", config.polls_file)
    })?;

    let mut count = 0;
    let mut skipped = 0;

    for line in polls_content.lines() {
        let Some(new_poll) = parse_line(line) else {
            continue;
        };

        if store.question_exists(new_poll.question.trim()).await? {
            println!("⊘ Skipped (duplicate): {}", new_poll.question);
            skipped += 1;
            continue;
        }

        let question = new_poll.question.clone();
        match store.create_poll(new_poll).await {
            Ok(poll) => {
                count += 1;
                println!("✓ Loaded: {} ({} options)", poll.question, poll.options.len());
            }
            Err(err) if err.is_client_error() => {
                println!("✗ Rejected: {question} - {err}");
                skipped += 1;
            }
            Err(err) => return Err(err.into()),
        }
    }

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✓ Successfully loaded {} new polls!", count);
    if skipped > 0 {
        println!("⊘ Skipped {} polls", skipped);
    }
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_question_and_options() {
        let poll = parse_line("Best time for team meetings? | Morning | Afternoon | Evening").unwrap();
        assert_eq!(poll.question, "Best time for team meetings?");
        assert_eq!(poll.options, vec!["Morning", "Afternoon", "Evening"]);
    }

    #[test]
    fn skips_comments_and_blank_lines() {
        assert!(parse_line("   ").is_none());
        assert!(parse_line("# seeded for the demo").is_none());
    }
}
