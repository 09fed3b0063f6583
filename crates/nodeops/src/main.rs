mod commands;
mod utils;

use clap::{Args, Parser, Subcommand};
use commands::db_user::UserAction;
use nodeops_compiler::{DatabaseUser, NodeOperation};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "nodeops")]
#[command(about = "Compile and run node operations for database clusters", long_about = None)]
#[command(version)]
struct Cli {
    /// Runtime configuration file (default: discovered nodeops.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log more (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a node operation and print the executor command as JSON
    Compile(OperationArgs),
    /// Compile a node operation and run it with the devops command
    Run(OperationArgs),
    /// Create a YSQL user on a universe
    CreateUser(DbUserArgs),
    /// Change the password of the YSQL admin user
    SetAdminPassword(DbUserArgs),
    /// Print the effective runtime configuration
    Config,
}

#[derive(Args)]
struct OperationArgs {
    /// Cluster state snapshot (JSON)
    #[arg(short, long)]
    state: PathBuf,

    /// Operation name (e.g. create, configure, wait_for_ssh)
    #[arg(short, long)]
    operation: NodeOperation,

    /// Operation parameters (JSON)
    #[arg(short, long)]
    params: PathBuf,

    /// Parameters describe a machine outside any universe (precheck only)
    #[arg(long)]
    detached: bool,
}

#[derive(Args)]
struct DbUserArgs {
    /// Cluster state snapshot (JSON)
    #[arg(short, long)]
    state: PathBuf,

    /// Universe UUID
    #[arg(short, long)]
    universe: Uuid,

    #[arg(long, default_value = "yugabyte")]
    username: String,

    #[arg(long, env = "NODEOPS_DB_PASSWORD", hide_env_values = true)]
    password: String,

    #[arg(long, default_value = "yugabyte")]
    database: String,
}

impl DbUserArgs {
    fn user(&self) -> DatabaseUser {
        DatabaseUser {
            username: self.username.clone(),
            password: self.password.clone(),
            database: self.database.clone(),
        }
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // stdout carries command output
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = utils::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Compile(args) => {
            commands::compile::handle(
                config,
                &args.state,
                args.operation,
                &args.params,
                args.detached,
            )
            .await?;
        }
        Commands::Run(args) => {
            commands::run::handle(
                config,
                &args.state,
                args.operation,
                &args.params,
                args.detached,
            )
            .await?;
        }
        Commands::CreateUser(args) => {
            commands::db_user::handle(
                config,
                &args.state,
                args.universe,
                args.user(),
                UserAction::Create,
            )
            .await?;
        }
        Commands::SetAdminPassword(args) => {
            commands::db_user::handle(
                config,
                &args.state,
                args.universe,
                args.user(),
                UserAction::SetAdminPassword,
            )
            .await?;
        }
        Commands::Config => {
            commands::config::handle(&config, cli.config.as_deref())?;
        }
    }

    Ok(())
}
