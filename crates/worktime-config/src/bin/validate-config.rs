//! Config validation CLI tool
//!
//! Validates a worktimed configuration file and reports any errors.

use std::path::PathBuf;
use std::process::ExitCode;
use worktime_config::{ConfigError, CURRENT_CONFIG_VERSION};
use worktime_util::default_config_path;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let config_path = match args.get(1) {
        Some(path) => PathBuf::from(path),
        None => {
            let default_path = default_config_path();
            eprintln!("Usage: validate-config [config-file]");
            eprintln!();
            eprintln!("Validates a worktimed configuration file.");
            eprintln!();
            eprintln!("If no path is provided, uses: {}", default_path.display());
            return ExitCode::from(2);
        }
    };

    if !config_path.exists() {
        eprintln!("Error: Configuration file not found: {}", config_path.display());
        return ExitCode::from(1);
    }

    match worktime_config::load_config(&config_path) {
        Ok(config) => {
            let policy = &config.default_policy;
            println!("✓ Configuration is valid");
            println!();
            println!("Summary:");
            println!("  Config version: {}", CURRENT_CONFIG_VERSION);
            println!("  Data directory: {}", config.service.data_dir.display());
            println!(
                "  Cleanup interval: {}s",
                config.service.cleanup_interval.as_secs()
            );
            println!();
            println!("Default policy:");
            println!("  Enabled: {}", policy.enabled);
            println!("  Window: {} - {}", policy.start_time, policy.end_time);

            let days: Vec<String> = policy
                .days_of_week
                .days()
                .iter()
                .map(|d| d.to_string())
                .collect();
            println!("  Days: {}", days.join(", "));

            if policy.end_time <= policy.start_time {
                println!();
                println!("Note: end_time is not after start_time.");
                println!("  Entity evaluation never treats this window as open;");
                println!("  devices read it as overnight, or all day when the times are equal.");
            }

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
                        ver, CURRENT_CONFIG_VERSION
                    );
                }
            }
            ExitCode::from(1)
        }
    }
}
