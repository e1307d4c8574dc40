use clap::{Parser, Subcommand};
use journalship::cli::run::RunOptions;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "journalship")]
#[command(about = "Ship systemd journal entries to Elasticsearch", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Comma-separated list of target Elasticsearch hosts
    #[arg(long, global = true)]
    hosts: Option<String>,

    /// Index name prefix; indices are named <prefix>-YYYY-MM-DD
    #[arg(long, global = true)]
    prefix: Option<String>,

    /// File keeping the journal cursor between runs
    #[arg(long, global = true)]
    cursor_file: Option<PathBuf>,

    /// Hostname recorded on every shipped record
    #[arg(long, global = true)]
    hostname: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    Run,
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    Init {
        #[arg(long)]
        stdout: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "journalship=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config_path = journalship::config::resolve_config_path(cli.config.as_deref());

    match cli.command {
        Some(Commands::Run) | None => {
            let opts = RunOptions {
                config_path,
                hosts: cli.hosts,
                index_prefix: cli.prefix,
                cursor_file: cli.cursor_file,
                hostname: cli.hostname,
            };
            if let Err(e) = journalship::cli::run::run(opts).await {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Config { action }) => match action {
            ConfigAction::Init { stdout } => {
                journalship::cli::config::init(stdout)?;
            }
        },
    }

    Ok(())
}
