//! Validate config command implementation

use crate::config::load_config;
use clap::Args;
use secrecy::ExposeSecret;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    ///
    /// Loading already validates, so a load failure and a validation failure
    /// both exit with 2.
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("Validating configuration file: {config_path}");
        println!();

        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("Configuration is invalid");
                println!("   Error: {e}");
                return Ok(2);
            }
        };

        let export = &config.export;
        let database = &config.database;

        println!("Configuration is valid");
        println!();
        println!("Configuration Summary:");
        println!("  Log Level: {}", config.application.log_level);
        println!("  Dry Run: {}", config.application.dry_run);
        println!(
            "  Database: {}",
            database.connection_string.expose_secret().redacted_dsn()
        );
        println!("  Max Connections: {}", database.max_connections);
        println!("  SSL Mode: {}", database.ssl_mode);
        println!("  Refresh Procedure: {}", database.refresh_procedure);
        println!("  Source View: {}", database.source_view);
        println!("  Output Directory: {}", export.output_directory);
        println!(
            "  Worker Override: {}",
            export
                .worker_override
                .map_or_else(|| "automatic".to_string(), |n| n.to_string())
        );
        println!(
            "  Combination Timeout: {}",
            export
                .combination_timeout_secs
                .map_or_else(|| "none".to_string(), |s| format!("{s}s"))
        );
        println!(
            "  Run Log: {}",
            if config.run_log.enabled {
                format!("{} ({})", config.run_log.file_name, config.run_log.format)
            } else {
                "disabled".to_string()
            }
        );
        println!();
        Ok(0)
    }
}
