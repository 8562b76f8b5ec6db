mod models;

use clap::{Parser, Subcommand};
use colored::*;
use models::*;
use std::io::{self, Write};

const BAR_WIDTH: usize = 30;

// ===== CLI =====

#[derive(Parser)]
#[command(name = "client", about = "Vote on polls from the terminal")]
struct Cli {
    /// Base URL of the poll server.
    #[arg(long, env = "BACKEND_URL", default_value = "http://localhost:3000")]
    url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List every poll.
    List,
    /// Create a poll with 2 to 6 options.
    Create {
        question: String,
        #[arg(required = true, num_args = 2..=6)]
        options: Vec<String>,
    },
    /// Vote on a poll. Without an option, you are asked to pick one.
    Vote {
        poll_id: String,
        user_id: String,
        option: Option<String>,
    },
    /// Show the results of a poll.
    Results { poll_id: String },
}

// ===== Main =====

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    let api = Api::new(cli.url);

    match cli.command {
        Command::List => list_polls(&api).await,
        Command::Create { question, options } => {
            let poll = api.create_poll(&NewPoll { question, options }).await?;
            println!("{} {}", "✓ Poll created:".green().bold(), poll.id.bright_cyan());
            Ok(())
        }
        Command::Vote {
            poll_id,
            user_id,
            option,
        } => vote(&api, &poll_id, &user_id, option).await,
        Command::Results { poll_id } => show_results(&api, &poll_id).await,
    }
}

// ===== Commands =====

async fn list_polls(api: &Api) -> anyhow::Result<()> {
    let polls = api.list_polls().await?;
    if polls.is_empty() {
        println!("{}", "No polls yet.".yellow());
        return Ok(());
    }

    for poll in polls {
        println!("{} {}", poll.id.bright_black(), poll.question.bright_white().bold());
        for option in &poll.options {
            println!("    • {}", option);
        }
    }
    Ok(())
}

async fn vote(
    api: &Api,
    poll_id: &str,
    user_id: &str,
    option: Option<String>,
) -> anyhow::Result<()> {
    let option_id = match option {
        Some(option) => option,
        None => {
            let poll = api.get_poll(poll_id).await?;
            match pick_option(&poll)? {
                Some(option) => option,
                None => {
                    println!("{}", "No vote cast.".yellow());
                    return Ok(());
                }
            }
        }
    };

    let response = api
        .submit_vote(&VoteRequest {
            poll_id: poll_id.to_string(),
            user_id: user_id.to_string(),
            option_id: option_id.clone(),
        })
        .await?;

    if response.success {
        println!("{} {}", "✓".green(), format!("Voted {option_id}").green());
    } else {
        println!("{} {}", "⊘".yellow(), response.message.yellow());
    }

    show_results(api, poll_id).await
}

fn pick_option(poll: &Poll) -> anyhow::Result<Option<String>> {
    println!("{}", "━".repeat(60).bright_black());
    println!("{}", poll.question.bright_white().bold());
    println!();
    for (i, option) in poll.options.iter().enumerate() {
        println!("  {} {}", format!("[{}]", i + 1).bright_cyan(), option);
    }
    println!();

    loop {
        println!("{}", "Pick a number, or [Q]uit".bright_black());
        print!("{}", "> ".bright_green().bold());
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        let choice = input.trim().to_lowercase();

        if choice == "q" || choice == "quit" {
            return Ok(None);
        }
        match choice.parse::<usize>() {
            Ok(n) if (1..=poll.options.len()).contains(&n) => {
                return Ok(Some(poll.options[n - 1].clone()));
            }
            _ => println!("{}", "Invalid choice. Please try again.".red()),
        }
    }
}

async fn show_results(api: &Api, poll_id: &str) -> anyhow::Result<()> {
    let results = api.get_results(poll_id).await?;

    println!();
    println!("{}", "=".repeat(60).bright_cyan());
    println!("    📊 {}", results.question.bright_yellow().bold());
    println!("{}", "=".repeat(60).bright_cyan());
    println!();

    for (i, option) in results.options.iter().enumerate() {
        println!(
            "{}. {} ({} votes, {}%)",
            (i + 1).to_string().bright_cyan(),
            option.option.bright_white().bold(),
            option.votes.to_string().yellow(),
            option.percentage
        );
        println!("   {}", bar(option.percentage, BAR_WIDTH).green());
    }

    println!();
    println!("Total votes: {}", results.total_votes.to_string().bright_cyan());
    println!();
    Ok(())
}

fn bar(percentage: u32, width: usize) -> String {
    let filled = (percentage.min(100) as usize * width + 50) / 100;
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}

// ===== API Calls =====

struct Api {
    client: reqwest::Client,
    base_url: String,
}

impl Api {
    fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn list_polls(&self) -> anyhow::Result<Vec<Poll>> {
        let response = self
            .client
            .get(format!("{}/api/polls", self.base_url))
            .send()
            .await?;
        read(response).await
    }

    async fn get_poll(&self, poll_id: &str) -> anyhow::Result<Poll> {
        let response = self
            .client
            .get(format!("{}/api/polls/{}", self.base_url, poll_id))
            .send()
            .await?;
        read(response).await
    }

    async fn create_poll(&self, poll: &NewPoll) -> anyhow::Result<Poll> {
        let response = self
            .client
            .post(format!("{}/api/polls", self.base_url))
            .json(poll)
            .send()
            .await?;
        read(response).await
    }

    async fn submit_vote(&self, vote: &VoteRequest) -> anyhow::Result<VoteResponse> {
        let response = self
            .client
            .post(format!("{}/api/vote", self.base_url))
            .json(vote)
            .send()
            .await?;
        read(response).await
    }

    async fn get_results(&self, poll_id: &str) -> anyhow::Result<VoteResult> {
        let response = self
            .client
            .get(format!("{}/api/polls/{}/results", self.base_url, poll_id))
            .send()
            .await?;
        read(response).await
    }
}

async fn read<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> anyhow::Result<T> {
    if !response.status().is_success() {
        let status = response.status();
        let text = response.text().await?;
        let message = serde_json::from_str::<VoteResponse>(&text)
            .map(|body| body.message)
            .unwrap_or(text);
        anyhow::bail!("API error ({}): {}", status, message);
    }

    Ok(response.json().await?)
}
