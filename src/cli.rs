use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "qmon", version, about = "Query performance monitor")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml", global = true)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Show slow-query log entries
    Logs(crate::commands::logs::LogsArgs),

    /// Summarize one day of the slow-query log
    Summary {
        /// Day to summarize (YYYY-MM-DD, UTC); defaults to today
        #[arg(short, long)]
        date: Option<String>,

        /// Output format (text, json)
        #[arg(short = 'f', long, default_value = "text")]
        format: String,
    },

    /// List slow-query log files
    Files,

    /// Replay the slow-query log and print stats, issues and recommendations
    Report(crate::commands::report::ReportArgs),

    /// Configuration management commands
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },

    /// Show version information
    Version,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommands {
    /// Display the effective configuration
    Show,

    /// Validate configuration file
    Validate,
}

impl Cli {
    /// Get the command to execute, defaulting to a summary of today
    pub fn get_command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Summary {
            date: None,
            format: "text".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command_is_summary() {
        let cli = Cli {
            config: PathBuf::from("config.toml"),
            command: None,
        };

        match cli.get_command() {
            Commands::Summary { date, format } => {
                assert!(date.is_none());
                assert_eq!(format, "text");
            }
            other => panic!("unexpected default command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_logs_args() {
        let cli = Cli::parse_from([
            "qmon", "--config", "/etc/qmon.toml", "logs", "--days", "3", "--model", "User", "--severity", "critical",
        ]);
        assert_eq!(cli.config, PathBuf::from("/etc/qmon.toml"));
        match cli.get_command() {
            Commands::Logs(args) => {
                assert_eq!(args.days, Some(3));
                assert_eq!(args.model.as_deref(), Some("User"));
                assert_eq!(args.severity.as_deref(), Some("critical"));
                assert_eq!(args.limit, 100);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_config_validate() {
        let cli = Cli::parse_from(["qmon", "config", "validate"]);
        assert!(matches!(
            cli.get_command(),
            Commands::Config {
                action: ConfigCommands::Validate
            }
        ));
    }
}
