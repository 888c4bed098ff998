//! queryprom exporter
//!
//! Polls the configured queries and serves their results on `/metrics`.
//! Options come from flags or environment (`CONFIG_FILE`, `DB_CONN_STRING`,
//! `PORT`, `LISTEN_ADDR`, `LOG_TYPE`, `LOG_LEVEL`, `SHUTDOWN_DELAY`).

use std::process::ExitCode;

use clap::Parser;

use queryprom_exporter::config::{self, Options};
use queryprom_exporter::{obs, supervisor};

#[tokio::main]
async fn main() -> ExitCode {
    let opts = match Options::try_parse() {
        Ok(opts) => opts,
        Err(e) => {
            let status = config::parse_error_status(&e);
            if status == 0 {
                e.exit();
            }
            let _ = e.print();
            return ExitCode::from(status);
        }
    };
    obs::logging::init(opts.log_type, &opts.log_level);
    tracing::debug!(config_file = %opts.config_file, "started");

    match supervisor::run(opts).await {
        Ok(termination) => {
            tracing::info!(?termination, "exiting");
            termination.exit_code()
        }
        Err(e) if e.code().is_startup_fatal() => {
            tracing::error!(code = e.code().as_str(), error = %e, "startup failed");
            ExitCode::FAILURE
        }
        Err(e) => {
            tracing::error!(code = e.code().as_str(), error = %e, "exporter failed");
            ExitCode::FAILURE
        }
    }
}
