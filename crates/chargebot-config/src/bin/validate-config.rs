//! Config validation CLI tool
//!
//! Validates a chargebot configuration file and reports any errors.

use chargebot_config::ConfigError;
use chargebot_util::{default_config_path, format_remaining};
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let config_path = match args.get(1) {
        Some(path) => PathBuf::from(path),
        None => {
            let default_path = default_config_path();
            eprintln!("Usage: validate-config [config-file]");
            eprintln!();
            eprintln!("Validates a chargebot configuration file.");
            eprintln!();
            eprintln!("Example:");
            eprintln!("  validate-config {}", default_path.display());
            return ExitCode::from(2);
        }
    };

    if !config_path.exists() {
        eprintln!("Error: Configuration file not found: {}", config_path.display());
        return ExitCode::from(1);
    }

    match chargebot_config::load_config(&config_path) {
        Ok(policy) => {
            let timing = &policy.timing;
            println!("✓ Configuration is valid");
            println!();
            println!("Summary:");
            println!("  Config version:  {}", chargebot_config::CURRENT_CONFIG_VERSION);
            println!("  Socket:          {}", policy.service.socket_path.display());
            match policy.service.http_addr {
                Some(addr) => println!("  Dashboard:       http://{}", addr),
                None => println!("  Dashboard:       disabled"),
            }
            println!("  Grace period:    {}", format_remaining(timing.grace_period()));
            println!("  Charge duration: {}", format_remaining(timing.charge_duration()));
            println!(
                "  Warning at:      {} into the charge ({} before expiry)",
                format_remaining(timing.warning_after()),
                format_remaining(timing.warning_lead())
            );

            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed");
            eprintln!();
            match &e {
                ConfigError::ReadError(io_err) => {
                    eprintln!("Failed to read file: {}", io_err);
                }
                ConfigError::ParseError(parse_err) => {
                    eprintln!("TOML parse error:");
                    eprintln!("  {}", parse_err);
                }
                ConfigError::ValidationFailed { errors } => {
                    eprintln!("Validation errors ({}):", errors.len());
                    for err in errors {
                        eprintln!("  - {}", err);
                    }
                }
                ConfigError::UnsupportedVersion(ver) => {
                    eprintln!(
                        "Unsupported config version: {} (expected {})",
                        ver,
                        chargebot_config::CURRENT_CONFIG_VERSION
                    );
                }
            }
            ExitCode::from(1)
        }
    }
}
