//! UIForge CLI
//!
//! Builds React component trees from requirements and refines them with
//! change requests.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod provider;

/// UIForge - requirements to design-system compliant React components
#[derive(Parser)]
#[command(name = "uiforge")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Project directory or uiforge.yaml path
    #[arg(short, long, default_value = ".")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Log as JSON lines
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the design tokens in force
    Tokens {
        /// Only this category (color, spacing, font_size, ...)
        #[arg(short = 't', long)]
        category: Option<String>,
    },

    /// Check existing .tsx/.css components against the design system
    Check {
        /// File or directory to scan
        path: PathBuf,
    },

    /// Build a component tree from a requirements file
    Build {
        /// Requirements text file
        requirements: PathBuf,

        /// Where to write the project state
        #[arg(short, long, default_value = "uiforge.state.json")]
        out: PathBuf,

        /// Also write each component's .tsx/.css into this directory
        #[arg(long)]
        emit: Option<PathBuf>,

        /// Replay provider answers from a fixture instead of calling the API
        #[arg(long)]
        replay: Option<PathBuf>,
    },

    /// Apply a change request to a project state
    Feedback {
        /// Change request text
        request: String,

        /// Project state file
        #[arg(short, long, default_value = "uiforge.state.json")]
        state: PathBuf,

        /// Components the request is about (comma separated)
        #[arg(long, value_delimiter = ',')]
        scope: Vec<String>,

        /// Also write each component's .tsx/.css into this directory
        #[arg(long)]
        emit: Option<PathBuf>,

        /// Replay provider answers from a fixture instead of calling the API
        #[arg(long)]
        replay: Option<PathBuf>,
    },

    /// Show the change history of a project state
    History {
        /// Project state file
        #[arg(short, long, default_value = "uiforge.state.json")]
        state: PathBuf,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let registry = tracing_subscriber::registry().with(filter);
    if cli.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    match cli.command {
        Commands::Tokens { category } => {
            commands::tokens::run(&cli.config, category.as_deref())?;
        }
        Commands::Check { path } => {
            commands::check::run(&cli.config, &path)?;
        }
        Commands::Build {
            requirements,
            out,
            emit,
            replay,
        } => {
            commands::build::run(
                &cli.config,
                &requirements,
                &out,
                emit.as_deref(),
                replay.as_deref(),
            )
            .await?;
        }
        Commands::Feedback {
            request,
            state,
            scope,
            emit,
            replay,
        } => {
            commands::feedback::run(
                &cli.config,
                &request,
                &state,
                scope,
                emit.as_deref(),
                replay.as_deref(),
            )
            .await?;
        }
        Commands::History { state, json } => {
            commands::history::run(&state, json)?;
        }
    }

    Ok(())
}
