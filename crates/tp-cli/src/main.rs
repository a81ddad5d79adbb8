//! termprobe CLI
//!
//! Single binary for probing device remote terminals:
//! - One-shot and interactive shell sessions against a device agent
//! - Lifecycle checks of an agent's shell protocol behavior
//! - A local agent emulator to run all of the above against

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use termprobe::commands::{self, ConnectArgs};
use termprobe::output::{print_error, print_info, print_success};
use tp_core::config;

#[derive(Parser)]
#[command(name = "termprobe")]
#[command(author, version, about = "Remote terminal protocol probe")]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one command in a fresh remote shell and print its output
    Exec {
        /// Command line to send
        command: String,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        connect: ConnectArgs,
    },

    /// Interactive line-based remote shell
    Shell {
        #[command(flatten)]
        connect: ConnectArgs,
    },

    /// Probe a device agent's session lifecycle behavior
    Check {
        /// Print results as JSON
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        connect: ConnectArgs,
    },

    /// Run the device-agent emulator in the foreground
    Serve {
        /// Bind address (overrides config)
        #[arg(short, long)]
        bind: Option<String>,
        /// Require this bearer token (overrides config)
        #[arg(long, env = "TERMPROBE_AGENT_TOKEN", hide_env_values = true)]
        token: Option<String>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show effective configuration
    Show,
    /// Show config file path
    Path,
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Exec {
            command,
            json,
            connect,
        } => {
            let client = commands::load_client_config(config_path, &connect)?;
            let outcome = commands::run_exec(&client, &command)
                .with_context(|| format!("Failed to run command on {}", client.endpoint()))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                print!("{}", outcome.output);
                std::io::stdout().flush()?;
            }
            if !outcome.started() {
                if !json {
                    print_error(&format!("Agent refused shell: {}", outcome.output.trim()));
                }
                std::process::exit(1);
            }
        }

        Commands::Shell { connect } => {
            let client = commands::load_client_config(config_path, &connect)?;
            let stdin = std::io::stdin();
            commands::run_shell(&client, stdin.lock(), std::io::stdout())?;
        }

        Commands::Check { json, connect } => {
            let client = commands::load_client_config(config_path, &connect)?;
            if !json && !cli.quiet {
                print_info(&format!("Probing {}", client.endpoint()));
            }
            let results = commands::run_check(&client);

            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                for result in &results {
                    match &result.detail {
                        None => print_success(result.name),
                        Some(detail) => print_error(&format!("{}: {}", result.name, detail)),
                    }
                }
            }
            if results.iter().any(|r| !r.passed) {
                std::process::exit(1);
            }
        }

        Commands::Serve { bind, token } => {
            let file = config::load_or_default(config_path)
                .with_context(|| "Failed to load configuration")?;
            let mut agent = file.agent;
            if let Some(bind) = bind {
                agent.bind_address = bind;
            }
            if token.is_some() {
                agent.auth_token = token;
            }
            commands::run_serve(agent)?;
        }

        Commands::Config { action } => match action {
            ConfigAction::Show => {
                println!("{}", commands::config_show(config_path)?);
            }
            ConfigAction::Path => {
                println!("{}", commands::config_path(config_path).display());
            }
            ConfigAction::Init { force } => {
                commands::config_init(config_path, force)?;
            }
        },
    }

    Ok(())
}
