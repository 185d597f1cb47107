mod cmd;
mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "deploybot",
    about = "Chat-driven environment sync and cutover bot",
    version,
    propagate_version = true
)]
struct Cli {
    /// Settings file (YAML); built-in pm/prd defaults when omitted
    #[arg(long = "config", global = true, env = "DEPLOYBOT_CONFIG")]
    settings: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the Slack and HTTP listeners until Ctrl-C
    Serve {
        /// HTTP port (overrides DEPLOYBOT_PORT and the settings file)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Sync or switch one environment now and exit non-zero on failure
    Run {
        /// Environment name, e.g. pm or prd
        environment: String,
    },

    /// Resolve and print the configuration (secrets omitted)
    Config,
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let settings = cli.settings.as_deref();

    let result = match cli.command {
        Commands::Serve { port } => cmd::serve::run(settings, port),
        Commands::Run { environment } => cmd::run::run(settings, &environment, cli.json),
        Commands::Config => cmd::config::run(settings, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
