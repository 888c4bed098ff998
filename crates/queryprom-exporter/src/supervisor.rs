//! Process lifecycle: spawn pollers, serve HTTP, wait for the end.
//!
//! The process ends in one of three ways:
//! - SIGINT/SIGTERM: mark draining, wait `shutdown_delay`, exit 0. Pollers
//!   are abandoned mid-cycle and their connections are not closed.
//! - every poller stopped: nothing left to export, exit 1.
//! - the HTTP server failed: exit 1.

use std::future::IntoFuture;
use std::panic::AssertUnwindSafe;
use std::process::ExitCode;
use std::sync::Arc;

use futures_util::FutureExt;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use queryprom_core::error::{QueryPromError, Result};

use crate::app_state::AppState;
use crate::config::{self, Options};
use crate::poller::{MetricPoller, PollerState};
use crate::router;
use crate::source::{self, Connector};

/// Why the exporter stopped without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Interrupt or terminate signal.
    Signal,
    /// Every poller reached `Stopped`.
    PollersExhausted,
}

impl Termination {
    pub fn status(self) -> u8 {
        match self {
            Termination::Signal => 0,
            Termination::PollersExhausted => 1,
        }
    }

    pub fn exit_code(self) -> ExitCode {
        ExitCode::from(self.status())
    }
}

/// Load config, start everything, and block until the process should exit.
pub async fn run(opts: Options) -> Result<Termination> {
    let cfg = config::load_from_file(&opts.config_file)?;
    info!(driver = %cfg.driver, metrics = cfg.metrics.len(), "config loaded");

    let connector = source::connector_for(cfg.driver, &opts.db_conn_string)
        .map_err(|e| QueryPromError::InvalidConfig(format!("DB_CONN_STRING: {e}")))?;
    let state = AppState::new(cfg)?;

    let listener = TcpListener::bind((opts.listen_addr.as_str(), opts.port))
        .await
        .map_err(|e| {
            QueryPromError::Internal(format!(
                "bind {}:{} failed: {e}",
                opts.listen_addr, opts.port
            ))
        })?;
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "queryprom-exporter listening");
    }

    let mut pollers = spawn_pollers(&state, connector);
    let mut server = tokio::spawn(
        axum::serve(listener, router::build_router(state.clone())).into_future(),
    );

    tokio::select! {
        signal = shutdown_signal() => {
            state.metrics().set_draining();
            info!(signal, delay = ?opts.shutdown_delay, "exit by signal");
            tokio::time::sleep(opts.shutdown_delay).await;
            Ok(Termination::Signal)
        }
        () = wait_pollers(&mut pollers) => {
            error!("all pollers have stopped, shutting down");
            Ok(Termination::PollersExhausted)
        }
        res = &mut server => {
            let reason = match res {
                Ok(Ok(())) => "server exited".to_string(),
                Ok(Err(e)) => e.to_string(),
                Err(e) => e.to_string(),
            };
            Err(QueryPromError::Internal(format!("http server failed: {reason}")))
        }
    }
}

/// One task per metric definition. A panic stays inside its task.
pub fn spawn_pollers(state: &AppState, connector: Arc<dyn Connector>) -> JoinSet<()> {
    let mut set = JoinSet::new();
    for (id, def) in state.cfg().metrics.iter().enumerate() {
        let def = Arc::new(def.clone());
        let poller = MetricPoller::new(
            id,
            Arc::clone(&def),
            Arc::clone(&connector),
            state.registry(),
            state.metrics(),
            state.board(),
        );
        let metrics = state.metrics();
        let board = state.board();

        metrics.pollers_running.inc();
        set.spawn(async move {
            if AssertUnwindSafe(poller.run()).catch_unwind().await.is_err() {
                error!(metric = %def.name, "poller panicked");
                board.set(id, &def.name, PollerState::Stopped);
            }
            metrics.pollers_running.dec();
        });
    }
    set
}

/// Resolves once every poller task has ended.
pub async fn wait_pollers(set: &mut JoinSet<()>) {
    while let Some(res) = set.join_next().await {
        if let Err(e) = res {
            warn!(error = %e, "poller task ended abnormally");
        }
    }
}

async fn shutdown_signal() -> &'static str {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => "SIGINT",
        _ = terminate => "SIGTERM",
    }
}
