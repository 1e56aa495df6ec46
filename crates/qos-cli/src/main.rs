use clap::{Parser, Subcommand};
use qos_core::config::{AppConfig, LoggingConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
use commands::{handle_config_command, handle_replay_command, ConfigCommands, ReplayArgs};

#[derive(Parser)]
#[command(name = "qos-cli")]
#[command(about = "QoS CLI - configuration tooling and offline replay for the QoS engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configuration Management
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Replay recorded observations and report the resulting selection
    Replay(ReplayArgs),
}

impl Commands {
    fn config_file(&self) -> Option<&str> {
        match self {
            Self::Config(command) => command.config_file(),
            Self::Replay(args) => Some(&args.config),
        }
    }
}

/// Installs the global subscriber.
///
/// `RUST_LOG` wins when set; otherwise `[logging].level` applies to the QoS
/// crates and everything else logs at `warn`.
fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_env("RUST_LOG").unwrap_or_else(|_| {
        EnvFilter::new(format!("warn,qos_core={0},qos_cli={0}", logging.level))
    });

    let registry = tracing_subscriber::registry().with(filter);

    if logging.format.as_str() == "json" {
        let fmt_layer = tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr);
        registry.with(fmt_layer).init();
    } else {
        // "pretty" and any other format default to pretty logging
        let fmt_layer = tracing_subscriber::fmt::layer()
            .pretty()
            .with_file(true)
            .with_line_number(true)
            .with_target(false)
            .with_writer(std::io::stderr);
        registry.with(fmt_layer).init();
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let logging = cli
        .command
        .config_file()
        .and_then(|file| AppConfig::from_file(file).ok())
        .map(|config| config.logging)
        .unwrap_or_default();
    init_logging(&logging);

    match cli.command {
        Commands::Config(config_command) => handle_config_command(config_command)?,
        Commands::Replay(args) => handle_replay_command(args)?,
    }

    Ok(())
}
