//! SiteBlockr CLI
//!
//! Edits the block list, compiles it into declarative rules and keeps an
//! installed rules file in sync with the settings.

mod edit;
mod rules;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{ArgAction, Parser, Subcommand};

use sb_sync::{JsonFileStore, SyncConfig};

#[derive(Parser)]
#[command(name = "siteblockr")]
#[command(about = "SiteBlockr block list and rule tools")]
struct Cli {
    /// Settings storage file
    #[arg(long, global = true, default_value = "siteblockr.json")]
    settings: PathBuf,

    /// Installed rules file used by sync and watch
    #[arg(long, global = true, default_value = "rules.json")]
    rules: PathBuf,

    /// Runtime config file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Extra attempts when saving settings fails
    #[arg(long, global = true, default_value_t = 1)]
    retries: u32,

    /// More log output (-v, -vv)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the block list and blocking state
    List {
        /// Print the raw settings JSON
        #[arg(long)]
        json: bool,
    },

    /// Block a site
    Add {
        /// Host, URL or URL fragment
        url: String,

        /// Free-form label
        #[arg(short, long)]
        category: Option<String>,
    },

    /// Unblock a site
    Remove {
        url: String,
    },

    /// Switch blocking on
    Enable,

    /// Switch blocking off
    Disable,

    /// Flip the blocking switch
    Toggle,

    /// Check whether URLs would be blocked
    Check {
        #[arg(required = true)]
        urls: Vec<String>,
    },

    /// Compile the block list into a declarative ruleset
    Compile {
        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Reconcile the rules file with the settings once
    Sync,

    /// Keep the rules file in sync until interrupted
    Watch,

    /// Manage the weekly blocking schedule
    Schedule {
        #[command(subcommand)]
        action: ScheduleCommand,
    },

    /// Manage focus sessions
    Focus {
        #[command(subcommand)]
        action: FocusCommand,
    },
}

#[derive(Subcommand)]
enum ScheduleCommand {
    /// Set the schedule
    Set {
        /// Start time, HH:MM
        #[arg(long)]
        start: String,

        /// End time, HH:MM (exclusive)
        #[arg(long)]
        end: String,

        /// Days, 0 = Sunday .. 6 = Saturday (e.g. 1,2,3,4,5)
        #[arg(long, value_delimiter = ',', required = true)]
        days: Vec<u8>,
    },

    /// Remove the schedule
    Clear,

    /// Show the schedule and whether it is active now
    Status,
}

#[derive(Subcommand)]
enum FocusCommand {
    /// Start a focus session
    Start {
        /// Length in minutes
        #[arg(default_value_t = 25)]
        minutes: u32,
    },

    /// End the running focus session
    Stop,
}

/// What every command needs: the settings file and the runtime config.
pub struct Context {
    pub store: Arc<JsonFileStore>,
    pub rules_path: PathBuf,
    pub config: SyncConfig,
    pub retries: u32,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn load_context(cli: &Cli) -> Result<Context, String> {
    let config = match &cli.config {
        Some(path) => SyncConfig::from_file(path).map_err(|e| e.to_string())?,
        None => SyncConfig::default(),
    };
    let store = JsonFileStore::with_key(&cli.settings, config.storage_key.clone());
    log::debug!("using settings '{}' and rules '{}'", cli.settings.display(), cli.rules.display());

    Ok(Context {
        store: Arc::new(store),
        rules_path: cli.rules.clone(),
        config,
        retries: cli.retries,
    })
}

async fn run(cli: Cli) -> Result<(), String> {
    let ctx = load_context(&cli)?;

    match cli.command {
        Commands::List { json } => edit::cmd_list(&ctx, json).await,
        Commands::Add { url, category } => edit::cmd_add(&ctx, &url, category.as_deref()).await,
        Commands::Remove { url } => edit::cmd_remove(&ctx, &url).await,
        Commands::Enable => edit::cmd_set_enabled(&ctx, true).await,
        Commands::Disable => edit::cmd_set_enabled(&ctx, false).await,
        Commands::Toggle => edit::cmd_toggle(&ctx).await,
        Commands::Check { urls } => rules::cmd_check(&ctx, &urls).await,
        Commands::Compile { output } => rules::cmd_compile(&ctx, output.as_deref()).await,
        Commands::Sync => rules::cmd_sync(&ctx).await,
        Commands::Watch => rules::cmd_watch(&ctx).await,
        Commands::Schedule { action } => match action {
            ScheduleCommand::Set { start, end, days } => edit::cmd_schedule_set(&ctx, start, end, days).await,
            ScheduleCommand::Clear => edit::cmd_schedule_clear(&ctx).await,
            ScheduleCommand::Status => edit::cmd_schedule_status(&ctx).await,
        },
        Commands::Focus { action } => match action {
            FocusCommand::Start { minutes } => edit::cmd_focus_start(&ctx, minutes).await,
            FocusCommand::Stop => edit::cmd_focus_stop(&ctx).await,
        },
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
