use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::RequestContext;

/// Committed transitions reported to the audit sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum AuditAction {
    #[serde(rename = "rfq.created")]
    #[strum(serialize = "rfq.created")]
    RfqCreated,
    #[serde(rename = "rfq.sent")]
    #[strum(serialize = "rfq.sent")]
    RfqSent,
    #[serde(rename = "rfq.offers_recorded")]
    #[strum(serialize = "rfq.offers_recorded")]
    RfqOffersRecorded,
    #[serde(rename = "rfq.converted")]
    #[strum(serialize = "rfq.converted")]
    RfqConverted,
    #[serde(rename = "purchase_order.created")]
    #[strum(serialize = "purchase_order.created")]
    PurchaseOrderCreated,
    #[serde(rename = "purchase_order.confirmed")]
    #[strum(serialize = "purchase_order.confirmed")]
    PurchaseOrderConfirmed,
    #[serde(rename = "purchase_order.sent")]
    #[strum(serialize = "purchase_order.sent")]
    PurchaseOrderSent,
    #[serde(rename = "purchase_order.received")]
    #[strum(serialize = "purchase_order.received")]
    PurchaseOrderReceived,
    #[serde(rename = "goods_receipt.lot_recorded")]
    #[strum(serialize = "goods_receipt.lot_recorded")]
    GoodsReceiptLotRecorded,
    #[serde(rename = "supplier_invoice.created")]
    #[strum(serialize = "supplier_invoice.created")]
    SupplierInvoiceCreated,
    #[serde(rename = "supplier_invoice.posted")]
    #[strum(serialize = "supplier_invoice.posted")]
    SupplierInvoicePosted,
    #[serde(rename = "supplier_invoice.cancelled")]
    #[strum(serialize = "supplier_invoice.cancelled")]
    SupplierInvoiceCancelled,
    #[serde(rename = "supplier_payment.recorded")]
    #[strum(serialize = "supplier_payment.recorded")]
    SupplierPaymentRecorded,
}

impl AuditAction {
    pub fn entity_type(self) -> &'static str {
        match self {
            AuditAction::RfqCreated
            | AuditAction::RfqSent
            | AuditAction::RfqOffersRecorded
            | AuditAction::RfqConverted => "rfq",
            AuditAction::PurchaseOrderCreated
            | AuditAction::PurchaseOrderConfirmed
            | AuditAction::PurchaseOrderSent
            | AuditAction::PurchaseOrderReceived => "purchase_order",
            AuditAction::GoodsReceiptLotRecorded => "goods_receipt",
            AuditAction::SupplierInvoiceCreated
            | AuditAction::SupplierInvoicePosted
            | AuditAction::SupplierInvoiceCancelled => "supplier_invoice",
            AuditAction::SupplierPaymentRecorded => "supplier_payment",
        }
    }
}

/// One audited state change, delivered after the writing transaction commits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub action: AuditAction,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub tenant_id: Uuid,
    pub actor_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<serde_json::Value>,
    pub metadata: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(ctx: &RequestContext, action: AuditAction, entity_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            action,
            entity_type: action.entity_type().to_string(),
            entity_id,
            tenant_id: ctx.tenant_id,
            actor_id: ctx.actor_id,
            before: None,
            after: None,
            metadata: serde_json::Value::Null,
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            occurred_at: Utc::now(),
        }
    }

    pub fn before<T: Serialize>(mut self, snapshot: &T) -> Self {
        self.before = serde_json::to_value(snapshot).ok();
        self
    }

    pub fn after<T: Serialize>(mut self, snapshot: &T) -> Self {
        self.after = serde_json::to_value(snapshot).ok();
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit channel closed")]
    ChannelClosed,
    #[error("audit sink rejected event: {0}")]
    Rejected(String),
}

/// Destination for audit events. Persistence of the log is the sink's concern.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: AuditEvent) -> Result<(), AuditError>;
}

/// Forwards events to a consumer task over a bounded channel. A full channel
/// rejects the event instead of stalling the caller.
#[derive(Debug, Clone)]
pub struct ChannelAuditSink {
    sender: mpsc::Sender<AuditEvent>,
}

impl ChannelAuditSink {
    pub fn new(sender: mpsc::Sender<AuditEvent>) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl AuditSink for ChannelAuditSink {
    async fn record(&self, event: AuditEvent) -> Result<(), AuditError> {
        self.sender.try_send(event).map_err(|err| match err {
            TrySendError::Full(event) => AuditError::Rejected(format!(
                "audit channel full, dropped {} for {}",
                event.action, event.entity_id
            )),
            TrySendError::Closed(_) => AuditError::ChannelClosed,
        })
    }
}

/// Writes events to the structured log. Default sink when nothing else is wired.
#[derive(Debug, Clone, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, event: AuditEvent) -> Result<(), AuditError> {
        info!(
            target: "procure_pay::audit",
            action = %event.action,
            entity_type = %event.entity_type,
            entity_id = %event.entity_id,
            tenant_id = %event.tenant_id,
            actor_id = %event.actor_id,
            request_id = event.request_id.as_deref().unwrap_or("-"),
            "audit"
        );
        Ok(())
    }
}

/// Best-effort delivery of audit events: failures and timeouts are logged
/// and counted, never returned.
#[derive(Clone)]
pub struct AuditTrail {
    sink: Arc<dyn AuditSink>,
    timeout: Duration,
}

impl AuditTrail {
    pub fn new(sink: Arc<dyn AuditSink>, timeout: Duration) -> Self {
        Self { sink, timeout }
    }

    pub async fn emit(&self, events: Vec<AuditEvent>) {
        for event in events {
            let action = event.action;
            let entity_id = event.entity_id;

            match tokio::time::timeout(self.timeout, self.sink.record(event)).await {
                Ok(Ok(())) => {
                    counter!("procure_pay.audit.delivered", 1);
                }
                Ok(Err(e)) => {
                    warn!(%action, %entity_id, error = %e, "Audit event delivery failed");
                    counter!("procure_pay.audit.failed", 1);
                }
                Err(_) => {
                    warn!(%action, %entity_id, timeout = ?self.timeout, "Audit event delivery timed out");
                    counter!("procure_pay.audit.failed", 1);
                }
            }
        }
    }
}

impl std::fmt::Debug for AuditTrail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditTrail")
            .field("timeout", &self.timeout)
            .finish()
    }
}
