mod api;
mod commands;
mod poller;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use api::ApiClient;
use poller::{DEFAULT_INTERVAL_MS, DEFAULT_MAX_ATTEMPTS};

#[derive(Parser)]
#[command(name = "prepd")]
#[command(about = "prepd CLI - Run code, batch tests, and interview chat against a prepd-api backend", long_about = None)]
struct Cli {
    /// Backend base URL
    #[arg(long, global = true, env = "PREPD_SERVER", default_value = "http://localhost:3001")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a source file and poll for the execution result
    Run {
        /// Source file to execute
        #[arg(short, long)]
        file: PathBuf,

        /// Execution-service language id (e.g. 71 for Python 3)
        #[arg(short, long)]
        language: u32,

        /// File whose contents are passed as standard input
        #[arg(long)]
        stdin_file: Option<PathBuf>,

        /// Poll interval in milliseconds
        #[arg(long, default_value_t = DEFAULT_INTERVAL_MS)]
        interval_ms: u64,

        /// Maximum number of polls before giving up
        #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS)]
        attempts: u32,
    },

    /// Run a source file against a JSON file of test cases
    Test {
        /// Source file to execute
        #[arg(short, long)]
        file: PathBuf,

        /// Execution-service language id
        #[arg(short, long)]
        language: u32,

        /// JSON array of {input, expectedOutput} objects
        #[arg(short, long)]
        cases: PathBuf,
    },

    /// List available execution languages
    Languages,

    /// Generate a practice question with test cases
    Question {
        /// Problem topic (e.g. arrays, graphs)
        #[arg(short, long)]
        topic: Option<String>,

        /// Problem difficulty (easy, medium, hard)
        #[arg(short, long)]
        difficulty: Option<String>,
    },

    /// Send one chat message to the interview assistant
    Chat {
        /// Message text
        #[arg(short, long)]
        message: String,

        /// Source file to include as code context
        #[arg(long)]
        code_file: Option<PathBuf>,

        /// Wait for the full reply instead of streaming
        #[arg(long)]
        plain: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = ApiClient::new(&cli.server);

    match cli.command {
        Commands::Run {
            file,
            language,
            stdin_file,
            interval_ms,
            attempts,
        } => {
            commands::run(
                &client,
                &file,
                language,
                stdin_file.as_deref(),
                interval_ms,
                attempts,
            )
            .await?;
        }
        Commands::Test {
            file,
            language,
            cases,
        } => {
            commands::test(&client, &file, language, &cases).await?;
        }
        Commands::Languages => {
            commands::languages(&client).await?;
        }
        Commands::Question { topic, difficulty } => {
            commands::question(&client, topic.as_deref(), difficulty.as_deref()).await?;
        }
        Commands::Chat {
            message,
            code_file,
            plain,
        } => {
            commands::chat(&client, &message, code_file.as_deref(), plain).await?;
        }
    }

    Ok(())
}
