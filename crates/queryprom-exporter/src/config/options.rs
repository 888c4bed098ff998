//! Process options, each settable by flag or environment variable.

use std::time::Duration;

use clap::error::ErrorKind;
use clap::Parser;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    /// `json` in any case selects JSON; anything else is text.
    pub fn parse_lenient(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}

fn log_format(s: &str) -> Result<LogFormat, std::convert::Infallible> {
    Ok(LogFormat::parse_lenient(s))
}

/// Export query results as Prometheus metrics.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Options {
    /// Log output format
    #[arg(long, env = "LOG_TYPE", default_value = "text", value_parser = log_format)]
    pub log_type: LogFormat,

    /// Log level or EnvFilter directives (e.g. "info,queryprom_exporter=debug")
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// HTTP listen port
    #[arg(long, env = "PORT", default_value = "9246")]
    pub port: u16,

    /// HTTP listen address
    #[arg(long, env = "LISTEN_ADDR", default_value = "localhost")]
    pub listen_addr: String,

    /// Database connection string shared by every poller
    #[arg(long, env = "DB_CONN_STRING", default_value = "http://127.0.0.1:8123")]
    pub db_conn_string: String,

    /// YAML file with the driver and metric definitions
    #[arg(long, env = "CONFIG_FILE")]
    pub config_file: String,

    /// Delay between a shutdown signal and process exit
    #[arg(long, env = "SHUTDOWN_DELAY", default_value = "3s", value_parser = humantime::parse_duration)]
    pub shutdown_delay: Duration,
}

/// Process exit status for an option-parsing failure.
///
/// Help and version requests exit 0; every other parse error is a
/// startup failure and exits 1.
pub fn parse_error_status(e: &clap::Error) -> u8 {
    match e.kind() {
        ErrorKind::DisplayHelp
        | ErrorKind::DisplayVersion
        | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => 0,
        _ => 1,
    }
}
