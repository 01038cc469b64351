use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;

use query_monitor::config::{self, LoggingConfig};
use query_monitor::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    // Logging settings come from the config file when it parses; a broken
    // file is reported by the command itself
    let logging = config::load_config(&args.config)
        .map(|cfg| cfg.logging)
        .unwrap_or_else(|_| LoggingConfig::default());
    init_tracing(&logging.level, &logging.format);

    match args.get_command() {
        cli::Commands::Logs(logs_args) => {
            let cfg = config::load_config(&args.config)?;
            commands::logs::execute(&cfg, logs_args).await?;
        }
        cli::Commands::Summary { date, format } => {
            let cfg = config::load_config(&args.config)?;
            commands::summary::execute(&cfg, date, &format).await?;
        }
        cli::Commands::Files => {
            let cfg = config::load_config(&args.config)?;
            commands::files::execute(&cfg).await?;
        }
        cli::Commands::Report(report_args) => {
            let cfg = config::load_config(&args.config)?;
            commands::report::execute(&cfg, report_args).await?;
        }
        cli::Commands::Config { action } => match action {
            cli::ConfigCommands::Show => commands::config::show(&args.config)?,
            cli::ConfigCommands::Validate => commands::config::validate(&args.config)?,
        },
        cli::Commands::Version => {
            println!("Query Monitor v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
