//! Fintrack is a REST API for tracking personal finances: income and
//! expenses, categories, budgets, savings goals, and recurring expenses, with
//! CSV, JSON and PDF exports.
//!
//! All state lives in a SQLite database. Clients authenticate with a bearer
//! token issued at log in.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum_server::Handle;
use tokio::signal;

/// Bearer token issuing and validation.
pub mod auth;
/// Spending budgets with alert thresholds.
pub mod budget;
/// User-defined transaction categories.
pub mod category;
mod config;
/// Database schema setup.
pub mod db;
mod database_id;
/// The API endpoint URIs.
pub mod endpoints;
mod error;
/// CSV, JSON and PDF export route handlers.
pub mod export;
/// Savings goals and contributions.
pub mod goal;
mod password;
/// Recurring expense templates and materialization.
pub mod recurring;
/// Ledger summaries and report rendering.
pub mod report;
mod routing;
/// The income and expense ledger.
pub mod transaction;
/// User accounts and profiles.
pub mod user;

pub use config::AppConfig;
pub use database_id::DatabaseID;
pub use error::{AppJson, Error};
pub use password::PasswordHash;
pub use routing::build_router;

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}
