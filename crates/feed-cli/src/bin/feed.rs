//! feed: publish markdown documents to a feed server.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use uuid::Uuid;

use feed_cli::{prepare_document, FeedClient};

#[derive(Parser)]
#[command(name = "feed")]
#[command(author, version, about = "Publish markdown documents as posts")]
#[command(propagate_version = true)]
struct Cli {
    /// Base URL of the feed server
    #[arg(long, env = "FEED_SERVER_URL", default_value = "http://localhost:3000")]
    server: String,

    /// Bearer token for write routes
    #[arg(long, env = "FEED_API_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new post from a markdown file
    Post {
        /// Markdown file with frontmatter
        file: PathBuf,
    },

    /// Replace an existing post with the contents of a markdown file
    Update {
        /// Id of the post to update
        id: Uuid,

        /// Markdown file with frontmatter
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let client = FeedClient::new(&cli.server, cli.token)?;

    match cli.command {
        Commands::Post { file } => publish(&client, &file, None).await,
        Commands::Update { id, file } => publish(&client, &file, Some(id)).await,
    }
}

async fn publish(client: &FeedClient, file: &Path, target: Option<Uuid>) -> anyhow::Result<()> {
    let prepared = prepare_document(file, client)
        .await
        .with_context(|| format!("failed to prepare {}", file.display()))?;

    for failure in &prepared.failures {
        eprintln!("Warning: {} not uploaded: {}", failure.reference, failure.reason);
    }
    if prepared.uploaded > 0 {
        println!("Uploaded {} asset(s)", prepared.uploaded);
    }

    let response = client
        .submit(prepared.text, target)
        .await
        .with_context(|| format!("failed to submit {}", prepared.title))?;

    for warning in &response.warnings {
        eprintln!("Warning: {}", warning);
    }

    let post = response.post;
    match target {
        None => println!("Post created successfully!"),
        Some(_) => println!("Post updated successfully!"),
    }
    println!("Title: {}", post.title);
    println!("ID: {}", post.id);
    match post.permalink {
        Some(url) => println!("URL: {}", url),
        None => println!("Slug: {}", post.slug),
    }
    Ok(())
}
