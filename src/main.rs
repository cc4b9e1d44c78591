use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cmd;

#[derive(Parser)]
#[command(name = "textcraft")]
#[command(version, about = "Autonomous manuscript engine")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Project root (defaults to the current directory)
    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a manuscript project in the project directory
    Init,
    /// Run the orchestration loop until stopped
    Run {
        /// Stop after this many cycles
        #[arg(long)]
        max_cycles: Option<u64>,
    },
    /// Scan the manuscripts once and update the Matrix
    Scan,
    /// Show unit statuses and the control state
    Status,
    /// Pause a running loop at the start of its next cycle
    Pause,
    /// Resume a paused loop
    Resume,
    /// Stop the loop at the start of its next cycle
    Stop,
    /// Queue a one-shot instruction for the next planning call
    Override {
        instruction: String,

        /// Unit the planner should work on
        #[arg(short, long)]
        target: Option<String>,
    },
    /// Show effective configuration and validation warnings
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    let log_dir = matches!(cli.command, Commands::Run { .. })
        .then(|| project_dir.join("data").join("logs"))
        .filter(|_| textcraft::init::is_initialized(&project_dir));
    let _log_guard = textcraft::logging::init(&textcraft::logging::LogOptions {
        verbose: cli.verbose,
        json: cli.log_json,
        log_dir,
    });

    match &cli.command {
        Commands::Init => cmd::cmd_init(&project_dir)?,
        Commands::Run { max_cycles } => cmd::run_orchestrator(&project_dir, *max_cycles).await?,
        Commands::Scan => cmd::cmd_scan(&project_dir)?,
        Commands::Status => cmd::cmd_status(&project_dir)?,
        Commands::Pause => cmd::cmd_pause(&project_dir)?,
        Commands::Resume => cmd::cmd_resume(&project_dir)?,
        Commands::Stop => cmd::cmd_stop(&project_dir)?,
        Commands::Override {
            instruction,
            target,
        } => cmd::cmd_override(&project_dir, instruction, target.as_deref())?,
        Commands::Config => cmd::cmd_config(&project_dir)?,
    }

    Ok(())
}
