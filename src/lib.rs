//! Procure-to-pay library
//!
//! Requests for quotation, purchase orders, multi-lot goods receiving,
//! supplier invoices and payments, each state change running in one
//! transaction under a tenant-scoped idempotency guard.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod migrator;
pub mod notifications;
pub mod repositories;
pub mod services;
pub mod tracing;

use std::sync::Arc;

pub use auth::{Permission, RequestContext, Role};
pub use errors::{ErrorKind, ServiceError};
pub use services::ProcurementServices;

/// Connects to the configured database, applies migrations when
/// `auto_migrate` is set and wires the services to the given sinks.
pub async fn bootstrap(
    cfg: &config::AppConfig,
    audit_sink: Arc<dyn events::AuditSink>,
    dispatcher: Arc<dyn notifications::DocumentDispatcher>,
) -> Result<ProcurementServices, ServiceError> {
    let pool = db::establish_connection_from_app_config(cfg).await?;
    if cfg.auto_migrate {
        db::run_migrations(&pool).await?;
    }
    Ok(ProcurementServices::new(
        Arc::new(pool),
        cfg.procurement.clone(),
        audit_sink,
        dispatcher,
    ))
}
