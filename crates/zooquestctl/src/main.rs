//! ZooQuest Control - CLI over a local progression data directory
//!
//! Drives the profile, fact, quest and conservation engines without the app.

mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use zooquest_shared::ZooQuestConfig;

#[derive(Parser)]
#[command(name = "zooquestctl")]
#[command(about = "ZooQuest - progression, quests and conservation points", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to ~/.config/zooquest/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory override
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the user profile
    Profile,

    /// Update name, age or avatar
    SetProfile {
        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        age: Option<u8>,

        #[arg(long)]
        avatar: Option<String>,
    },

    /// Record an app visit
    Visit,

    /// Record a learned fact about an animal
    Fact {
        animal: String,
        category: String,
        content: String,
    },

    /// Record one quest event
    Quest {
        quest_type: String,

        /// Free-form event context (e.g. a habitat id)
        #[arg(long)]
        context: Option<String>,
    },

    /// List quests that still have tiers to complete
    Quests,

    /// Allocate points to a conservation project
    Allocate { project: String, amount: u32 },

    /// List conservation projects and allocations
    Projects,

    /// Tick or untick a conservation task
    Task { action: String, task: String },

    /// List conservation actions and their tasks
    Actions,

    /// Submit a conservation reflection
    Reflect { text: String },

    /// Show the effective configuration
    Config {
        /// Write the effective configuration to the user config path
        #[arg(long)]
        init: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let json_output = cli.json;

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            commands::report_error(&e, json_output);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = ZooQuestConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(dir) = cli.data_dir {
        config.storage.data_dir = dir;
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!("Using data directory {}", config.storage.data_dir.display());
    let ctx = commands::Context::new(config, cli.json);

    match cli.command {
        Commands::Profile => commands::profile(&ctx),
        Commands::SetProfile { name, age, avatar } => commands::set_profile(&ctx, name, age, avatar),
        Commands::Visit => commands::visit(&ctx),
        Commands::Fact { animal, category, content } => commands::fact(&ctx, &animal, &category, &content),
        Commands::Quest { quest_type, context } => commands::quest(&ctx, &quest_type, context.as_deref()),
        Commands::Quests => commands::quests(&ctx),
        Commands::Allocate { project, amount } => commands::allocate(&ctx, &project, amount),
        Commands::Projects => commands::projects(&ctx),
        Commands::Task { action, task } => commands::task(&ctx, &action, &task),
        Commands::Actions => commands::actions(&ctx),
        Commands::Reflect { text } => commands::reflect(&ctx, &text),
        Commands::Config { init } => commands::config(&ctx, init),
    }
}
