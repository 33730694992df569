//! hdforge CLI - Command-line interface for building HD wallets.

pub mod commands;
pub mod config;
pub mod output;
pub mod telemetry;

use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = commands::Cli::parse();

    let config = match config::CliConfig::load() {
        Ok(config) => config,
        Err(e) => {
            output::print_warning(&format!("Ignoring unreadable config: {}", e));
            config::CliConfig::default()
        }
    };
    let config = commands::effective_config(&cli, config);
    telemetry::init_telemetry(&config.log_level, config.json_logs)?;

    if let Err(e) = commands::execute(cli.command, &config).await {
        output::print_error(&format!("Error: {}", e));
        std::process::exit(1);
    }

    Ok(())
}
