//! ragpilot CLI: the main entry point.
//!
//! Commands:
//! - `ask`: Answer one question about the project
//! - `chat`: Interactive session with persistent history
//! - `context`: Show the prompt that would be sent, without calling a model
//! - `index`: Build or refresh the project index
//! - `session`: Start a new session or inspect the current one
//! - `config`: Show, validate or create configuration

use clap::{Parser, Subcommand};

mod commands;
mod runtime;

#[derive(Parser)]
#[command(
    name = "ragpilot",
    about = "ragpilot: ask questions about your codebase within a fixed context window",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a single question
    Ask {
        /// The question
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,

        /// Wait for the whole answer instead of streaming it
        #[arg(long)]
        no_stream: bool,
    },

    /// Interactive chat (`/new`, `/help`, `/exit`)
    Chat,

    /// Dry run: print the budget split, sections and warnings for a question
    Context {
        /// The question
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,

        /// Also print the full rendered prompt
        #[arg(long)]
        full: bool,
    },

    /// Build or refresh the project index
    Index {
        /// Directory to index (overrides `index.root`)
        #[arg(long)]
        root: Option<std::path::PathBuf>,

        /// Re-chunk every file even if unchanged
        #[arg(long)]
        rebuild: bool,
    },

    /// Manage the conversation session
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum SessionAction {
    /// Archive the current session and start a new one
    New,
    /// Print the current session
    Show,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration (API keys redacted)
    Show,
    /// Load and validate the configuration
    Validate,
    /// Print the config file locations
    Path,
    /// Write a default config file
    Init {
        /// Write `.ragpilot/config.toml` in the current directory instead of the global file
        #[arg(long)]
        project: bool,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Ask {
            question,
            no_stream,
        } => commands::ask::run(&question.join(" "), !no_stream).await?,
        Commands::Chat => commands::chat::run().await?,
        Commands::Context { question, full } => {
            commands::context::run(&question.join(" "), full).await?
        }
        Commands::Index { root, rebuild } => commands::index::run(root, rebuild).await?,
        Commands::Session { action } => match action {
            SessionAction::New => commands::session::new().await?,
            SessionAction::Show => commands::session::show().await?,
        },
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show().await?,
            ConfigAction::Validate => commands::config_cmd::validate().await?,
            ConfigAction::Path => commands::config_cmd::path().await?,
            ConfigAction::Init { project, force } => {
                commands::config_cmd::init(project, force).await?
            }
        },
    }

    Ok(())
}
