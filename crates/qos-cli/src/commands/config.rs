use clap::Subcommand;
use qos_core::config::{AppConfig, FamilyConfig, ServiceQosConfig};
use std::path::Path;

use super::utils::{print_error, print_info, print_success, CliError, CliResult};

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Validate a configuration file
    Validate {
        /// Path to config file (defaults to config/qos.toml)
        #[arg(short, long, default_value = "config/qos.toml")]
        file: String,
    },

    /// Show the effective configuration
    Show {
        /// Path to config file (defaults to config/qos.toml)
        #[arg(short, long, default_value = "config/qos.toml")]
        file: String,
    },

    /// Generate a sample configuration file
    Generate {
        /// Output path for the config file
        #[arg(short, long, default_value = "config/qos.toml")]
        output: String,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}

impl ConfigCommands {
    /// Config file whose `[logging]` section applies to this command.
    #[must_use]
    pub fn config_file(&self) -> Option<&str> {
        match self {
            Self::Validate { file } | Self::Show { file } => Some(file),
            Self::Generate { .. } => None,
        }
    }
}

pub fn handle_config_command(command: ConfigCommands) -> CliResult<()> {
    match command {
        ConfigCommands::Validate { file } => validate_config(&file),
        ConfigCommands::Show { file } => show_config(&file),
        ConfigCommands::Generate { output, force } => generate_config(&output, force),
    }
}

fn load_config(file: &str) -> CliResult<AppConfig> {
    if !Path::new(file).exists() {
        print_error(&format!("Configuration file not found: {file}"));
        return Err(CliError::Config(format!("File not found: {file}")));
    }

    AppConfig::from_file(file).map_err(|e| CliError::Config(e.to_string()))
}

fn validate_config(file: &str) -> CliResult<()> {
    print_info(&format!("Loading configuration from {file}..."));
    let config = load_config(file)?;

    print_info("Validating configuration...");
    config.validate().map_err(CliError::Config)?;

    print_success("Configuration is valid!");

    println!("Configuration Summary:");
    println!("  Environment: {}", config.environment);
    println!("  Services: {}", config.services.len());
    for service in &config.services {
        println!("    {} ({})", service.service_id, family_name(&service.family));
    }
    println!(
        "  Hydrator: {}",
        if config.hydrator.enabled {
            "enabled"
        } else {
            "disabled"
        }
    );
    println!(
        "  Metrics: {}",
        if config.metrics.enabled {
            "enabled"
        } else {
            "disabled"
        }
    );

    Ok(())
}

fn family_name(family: &FamilyConfig) -> &'static str {
    match family {
        FamilyConfig::Evm(_) => "evm",
        FamilyConfig::CometBft(_) => "comet_bft",
        FamilyConfig::Cosmos(_) => "cosmos",
        FamilyConfig::Solana(_) => "solana",
    }
}

fn show_service(service: &ServiceQosConfig) {
    println!("\n[Service {}]", service.service_id);
    println!("  Family: {}", family_name(&service.family));
    match &service.family {
        FamilyConfig::Evm(evm) => {
            println!("  Chain ID: {}", evm.chain_id);
            match &evm.archival {
                Some(archival) => {
                    println!("  Archival Contract: {}", archival.contract_address);
                    println!("  Archival Start Block: {}", archival.contract_start_block);
                    println!("  Archival Threshold: {}", archival.threshold);
                }
                None => println!("  Archival: disabled"),
            }
        }
        FamilyConfig::CometBft(comet) => println!("  Chain ID: {}", comet.chain_id),
        FamilyConfig::Cosmos(cosmos) => {
            println!("  Chain ID: {}", cosmos.chain_id);
            if let Some(evm_chain_id) = &cosmos.evm_chain_id {
                println!("  EVM Chain ID: {evm_chain_id}");
            }
            println!("  Supported APIs: {:?}", cosmos.supported_apis);
        }
        FamilyConfig::Solana(solana) => println!("  Chain ID: {}", solana.chain_id),
    }
    println!("  Sync Allowance: {}", service.effective_sync_allowance());
    println!("  Sanction Timeout: {}s", service.sanction_timeout_seconds);
}

fn show_config(file: &str) -> CliResult<()> {
    let config = load_config(file)?;

    println!("Configuration from {file}:");
    println!("  Environment: {}", config.environment);

    for service in &config.services {
        show_service(service);
    }

    println!("\n[Hydrator]");
    println!("  Enabled: {}", config.hydrator.enabled);
    println!("  Run Interval: {}s", config.hydrator.run_interval_seconds);
    println!("  Max Endpoint Check Workers: {}", config.hydrator.max_endpoint_check_workers);

    println!("\n[Metrics]");
    println!("  Enabled: {}", config.metrics.enabled);

    println!("\n[Logging]");
    println!("  Level: {}", config.logging.level);
    println!("  Format: {}", config.logging.format);

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# QoS Engine Configuration
# This is a sample configuration file with sensible defaults

environment = "development"

[logging]
level = "info"
format = "pretty"

[metrics]
enabled = true

[hydrator]
enabled = true
run_interval_seconds = 10
max_endpoint_check_workers = 100

# Ethereum mainnet with archival verification
[[services]]
service_id = "eth"
sync_allowance = 5
sanction_timeout_seconds = 1800

[services.family]
type = "evm"
chain_id = "0x1"

[services.family.archival]
contract_address = "0x28C6c06298d514Db089934071355E5743bf21d60"
contract_start_block = 12300000
threshold = 128

# Cosmos Hub over CometBFT RPC and the SDK REST API
[[services]]
service_id = "cosmoshub"

[services.family]
type = "cosmos"
chain_id = "cosmoshub-4"
supported_apis = ["comet_bft", "rest"]

# Solana mainnet
[[services]]
service_id = "solana"

[services.family]
type = "solana"
chain_id = "solana"
"#;

fn generate_config(output: &str, force: bool) -> CliResult<()> {
    if Path::new(output).exists() && !force {
        return Err(CliError::Config(format!(
            "File {output} already exists. Use --force to overwrite."
        )));
    }

    if let Some(parent) = Path::new(output).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(output, SAMPLE_CONFIG)?;

    print_success(&format!("Sample configuration generated: {output}"));
    print_info("Remember to:");
    print_info("  1. Set the chain ids of the services you serve");
    print_info("  2. Adjust sync allowances and sanction timeouts per chain");

    Ok(())
}
