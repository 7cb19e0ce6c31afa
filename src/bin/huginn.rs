//! huginn: operator CLI
//!
//! Fetch random media, check topics and inspect rate limits from the shell.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use huginn::{Config, MediaCandidate, MediaProviderBuilder, RateLimitStatus, Secrets};
use tracing::debug;

/// Huginn CLI
#[derive(Parser)]
#[command(name = "huginn")]
#[command(version = huginn::PKG_VERSION)]
#[command(about = "Random media from community listings")]
struct Args {
    /// Path to config file
    #[arg(short, long, env = "HUGINN_CONFIG")]
    config: Option<PathBuf>,

    /// Keep all state in memory for this run
    #[arg(long)]
    in_memory: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve random media
    Random {
        /// Topic to draw from (default: preferred or random seed topic)
        topic: Option<String>,
        /// Number of candidates to serve
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,
    },

    /// Check whether a topic exists
    Exists {
        topic: String,
    },

    /// Pick a random valid seed topic
    RandomTopic,

    /// Inspect or override the request budget (in-process)
    RateLimit {
        #[command(subcommand)]
        action: RateLimitAction,
    },
}

#[derive(Subcommand)]
enum RateLimitAction {
    /// Show the current budget
    Status,
    /// Block the source for the given number of seconds
    Trigger {
        #[arg(default_value_t = 60)]
        seconds: u64,
    },
    /// Clear the window and any manual block
    Reset,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise tracing (default: warn for CLI; override with RUST_LOG).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();
    debug!(version = huginn::version_string(), "huginn starting");

    let config = Config::load(args.config.as_deref())?;
    let secrets = Secrets::load()?;
    let mut builder = MediaProviderBuilder::from_config(&config, &secrets);
    if args.in_memory {
        builder = builder.in_memory();
    }
    let provider = builder.build()?;

    match args.command {
        Command::Random { topic, count } => {
            for _ in 0..count.max(1) {
                let media = provider.get_random_media(topic.as_deref(), None).await?;
                print_candidate(&media);
            }
        }

        Command::Exists { topic } => {
            let exists = provider.topic_exists(&topic).await?;
            println!("r/{topic}: {}", if exists { "exists" } else { "not found" });
        }

        Command::RandomTopic => {
            let topic = provider.random_topic().await?;
            println!("{topic}");
        }

        Command::RateLimit { action } => {
            let source = provider.source_tag().to_string();
            let limiter = provider.rate_limiter();
            match action {
                RateLimitAction::Status => {}
                RateLimitAction::Trigger { seconds } => {
                    limiter.trigger(&source, Duration::from_secs(seconds));
                }
                RateLimitAction::Reset => limiter.reset(&source),
            }
            print_status(&source, &limiter.status(&source));
        }
    }

    Ok(())
}

fn print_candidate(media: &MediaCandidate) {
    println!("title: {}", media.title);
    match &media.placeholder_text {
        Some(text) => println!("text: {text}"),
        None => println!("url: {}", media.asset_url),
    }
    println!("by: {}", media.description);
    println!();
}

fn print_status(source: &str, status: &RateLimitStatus) {
    println!("source: {source}");
    println!("limit: {}", status.limit);
    println!("remaining: {}", status.remaining);
    println!("resets in: {}s", status.resets_in.as_secs());
    if let Some(blocked) = status.blocked_for {
        println!("blocked for: {}s", blocked.as_secs());
    }
}
