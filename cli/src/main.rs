mod commands;
mod config;
mod server;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

use crate::commands::{
    SheetBoard, authenticate, cmd_import, cmd_records, cmd_rejected, cmd_stats, cmd_user_add,
    cmd_user_list, cmd_weight_delete, cmd_weight_log,
};
use crate::config::Config;
use weighboard_core::service::Board;
use weighboard_core::store::open_store;

#[derive(Parser)]
#[command(
    name = "weighboard",
    version,
    about = "A group weigh-in tracker",
    long_about = "Log weigh-ins to a shared sheet and see who is losing the most.\n\n\
        The sheet is a SQLite file by default; pass --store with a .csv path to use a \
        spreadsheet export instead."
)]
struct Cli {
    /// Sheet to read and write (.csv export or SQLite file)
    #[arg(long, global = true, env = "WEIGHBOARD_STORE", value_name = "PATH")]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct Login {
    /// User name (matched ignoring case)
    #[arg(short, long, env = "WEIGHBOARD_USER")]
    user: String,
    /// Secret for the user
    #[arg(short, long, env = "WEIGHBOARD_PASSWORD", hide_env_values = true)]
    password: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Log a weigh-in for yourself
    Log {
        /// Weight value (number)
        value: f64,
        /// Unit: kg or lbs (default: kg)
        #[arg(long, default_value = "kg")]
        unit: String,
        /// Date (YYYY-MM-DD or today/yesterday, default: today)
        #[arg(long)]
        date: Option<String>,
        #[command(flatten)]
        login: Login,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete your most recent weigh-in
    Delete {
        #[command(flatten)]
        login: Login,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the cleaned sheet, newest first
    Records {
        /// Only show this user (matched ignoring case)
        #[arg(long)]
        user: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show sheet rows that could not be read
    Rejected {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the leaderboard
    Stats {
        /// Ranking: weekly (since last weigh-in), total, or percent
        #[arg(long, default_value = "total")]
        by: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Append rows from a sheet export (Fecha,Usuario,Peso CSV)
    Import {
        /// Path to the CSV file
        file: PathBuf,
        /// Preview import without making changes
        #[arg(long)]
        dry_run: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage who may log weigh-ins
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
    /// Start the REST API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
        /// Address to bind to (default: 127.0.0.1, use 0.0.0.0 to expose to network)
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: String,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// Add a user or change their secret
    Add {
        /// User name
        name: String,
        /// Secret
        secret: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List configured users
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_logging(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if matches!(cli.command, Commands::Serve { .. }) {
        "info"
    } else {
        "warn"
    };
    init_logging(default_level);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.store)?;
    tracing::debug!(store = %config.store_path.display(), "using sheet");

    let open_board = || -> Result<SheetBoard> { Ok(Board::new(open_store(&config.store_path)?)) };

    match cli.command {
        Commands::Log {
            value,
            unit,
            date,
            login,
            json,
        } => {
            let session = authenticate(&config.credentials()?, &login.user, &login.password)?;
            cmd_weight_log(&open_board()?, &session, value, &unit, date, json)
        }
        Commands::Delete { login, json } => {
            let session = authenticate(&config.credentials()?, &login.user, &login.password)?;
            cmd_weight_delete(&open_board()?, &session, json)
        }
        Commands::Records { user, json } => cmd_records(&open_board()?, user.as_deref(), json),
        Commands::Rejected { json } => cmd_rejected(&open_board()?, json),
        Commands::Stats { by, json } => cmd_stats(&open_board()?, &by, json),
        Commands::Import {
            file,
            dry_run,
            json,
        } => cmd_import(&open_board()?, &file, dry_run, json),
        Commands::User { command } => match command {
            UserCommands::Add { name, secret, json } => {
                cmd_user_add(&config, &name, &secret, json)
            }
            UserCommands::List { json } => cmd_user_list(&config, json),
        },
        Commands::Serve { port, bind } => {
            server::start_server(open_board()?, config.credentials()?, port, &bind).await
        }
    }
}
