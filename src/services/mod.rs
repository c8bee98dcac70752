//! Procurement-to-pay services.
//!
//! Each state-changing operation has a `*_in` function that does the work on
//! a caller-supplied transaction and returns a [`Transition`], and a service
//! method that checks the role, wraps the function in the idempotency guard
//! and runs post-commit side effects.

pub mod goods_receipts;
pub mod idempotency;
pub mod pricing;
pub mod purchase_orders;
pub mod rfq;
pub mod supplier_invoices;
pub mod supplier_payments;

use futures::future::BoxFuture;
use sea_orm::DatabaseTransaction;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::RequestContext;
use crate::config::ProcurementConfig;
use crate::db::DbPool;
use crate::errors::ServiceError;
use crate::events::{AuditSink, AuditTrail};
use crate::notifications::{DocumentCourier, DocumentDispatcher};

pub use goods_receipts::GoodsReceiptService;
pub use idempotency::{Guarded, IdempotencyGuard, Transition};
pub use purchase_orders::PurchaseOrderService;
pub use rfq::RfqService;
pub use supplier_invoices::SupplierInvoiceService;
pub use supplier_payments::SupplierPaymentService;

/// Shared plumbing behind every service: the pool, the idempotency guard and
/// the post-commit channels.
pub struct ProcurementCore {
    db: Arc<DbPool>,
    guard: IdempotencyGuard,
    audit: AuditTrail,
    courier: DocumentCourier,
    settings: ProcurementConfig,
}

impl ProcurementCore {
    pub fn new(
        db: Arc<DbPool>,
        settings: ProcurementConfig,
        audit_sink: Arc<dyn AuditSink>,
        dispatcher: Arc<dyn DocumentDispatcher>,
    ) -> Self {
        Self {
            guard: IdempotencyGuard::new(settings.idempotency_key_max_len),
            audit: AuditTrail::new(audit_sink, Duration::from_millis(settings.audit_timeout_ms)),
            courier: DocumentCourier::new(
                dispatcher,
                Duration::from_millis(settings.dispatch_timeout_ms),
            ),
            db,
            settings,
        }
    }

    pub fn db(&self) -> &DbPool {
        &self.db
    }

    pub fn settings(&self) -> &ProcurementConfig {
        &self.settings
    }

    /// Runs `work` under the idempotency guard and, for a fresh execution,
    /// delivers its audit events and documents once the transaction committed.
    pub async fn perform<R, F>(
        &self,
        ctx: &RequestContext,
        action: &'static str,
        work: F,
    ) -> Result<R, ServiceError>
    where
        R: Serialize + DeserializeOwned + Send,
        F: for<'c> FnOnce(
                &'c DatabaseTransaction,
            ) -> BoxFuture<'c, Result<Transition<R>, ServiceError>>
            + Send,
    {
        let Guarded { value, replayed } = self.guard.run(&self.db, ctx, action, work).await?;

        if !replayed {
            self.audit.emit(value.audit).await;
            self.courier.deliver(value.documents).await;
        }

        Ok(value.response)
    }
}

impl std::fmt::Debug for ProcurementCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcurementCore")
            .field("guard", &self.guard)
            .field("audit", &self.audit)
            .field("courier", &self.courier)
            .field("settings", &self.settings)
            .finish()
    }
}

/// All procurement-to-pay services over one shared core.
#[derive(Debug, Clone)]
pub struct ProcurementServices {
    pub rfqs: RfqService,
    pub purchase_orders: PurchaseOrderService,
    pub goods_receipts: GoodsReceiptService,
    pub supplier_invoices: SupplierInvoiceService,
    pub supplier_payments: SupplierPaymentService,
}

impl ProcurementServices {
    pub fn new(
        db: Arc<DbPool>,
        settings: ProcurementConfig,
        audit_sink: Arc<dyn AuditSink>,
        dispatcher: Arc<dyn DocumentDispatcher>,
    ) -> Self {
        let core = Arc::new(ProcurementCore::new(db, settings, audit_sink, dispatcher));
        Self {
            rfqs: RfqService::new(core.clone()),
            purchase_orders: PurchaseOrderService::new(core.clone()),
            goods_receipts: GoodsReceiptService::new(core.clone()),
            supplier_invoices: SupplierInvoiceService::new(core.clone()),
            supplier_payments: SupplierPaymentService::new(core),
        }
    }
}

pub(crate) fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
