use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Document dispatch errors
#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Rendering failed: {0}")]
    Rendering(String),
    #[error("Delivery failed: {0}")]
    Delivery(String),
    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RfqDocumentLine {
    pub item: String,
    pub quantity: Decimal,
    pub unit: Option<String>,
}

/// Summary of an RFQ as sent to candidate suppliers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RfqDocument {
    pub tenant_id: Uuid,
    pub rfq_id: Uuid,
    pub note: Option<String>,
    pub suppliers: Vec<String>,
    pub lines: Vec<RfqDocumentLine>,
    pub sent_at: DateTime<Utc>,
}

impl RfqDocument {
    pub fn render_text(&self) -> String {
        let mut out = format!("Request for quotation {}\n", self.rfq_id);
        if let Some(note) = &self.note {
            let _ = writeln!(out, "{}", note);
        }
        for (idx, line) in self.lines.iter().enumerate() {
            let _ = writeln!(
                out,
                "{:>3}. {} x {} {}",
                idx + 1,
                line.item,
                line.quantity.normalize(),
                line.unit.as_deref().unwrap_or("")
            );
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseOrderDocumentLine {
    pub name: String,
    pub quantity: Decimal,
    pub unit: Option<String>,
    pub unit_price: Decimal,
    pub tax_rate: Decimal,
    pub total_ttc: Decimal,
}

/// Purchase order as sent to its supplier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseOrderDocument {
    pub tenant_id: Uuid,
    pub purchase_order_id: Uuid,
    pub supplier_name: String,
    pub recipient: String,
    pub lines: Vec<PurchaseOrderDocumentLine>,
    pub total_ht: Decimal,
    pub total_tax: Decimal,
    pub total_ttc: Decimal,
}

impl PurchaseOrderDocument {
    pub fn render_text(&self) -> String {
        let mut out = format!(
            "Purchase order {} for {}\n",
            self.purchase_order_id, self.supplier_name
        );
        for line in &self.lines {
            let _ = writeln!(
                out,
                "{} x {} @ {} ({}% tax) = {}",
                line.name,
                line.quantity.normalize(),
                line.unit_price,
                line.tax_rate.normalize(),
                line.total_ttc
            );
        }
        let _ = writeln!(
            out,
            "HT {} / tax {} / TTC {}",
            self.total_ht, self.total_tax, self.total_ttc
        );
        out
    }
}

/// Outbound document produced by a committed transition.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundDocument {
    Rfq(RfqDocument),
    PurchaseOrder(PurchaseOrderDocument),
}

/// Renders and delivers documents (PDF + e-mail in production).
#[async_trait]
pub trait DocumentDispatcher: Send + Sync {
    async fn send_rfq(&self, document: &RfqDocument) -> Result<(), NotificationError>;
    async fn send_purchase_order(
        &self,
        document: &PurchaseOrderDocument,
    ) -> Result<(), NotificationError>;
}

/// Dispatcher that only logs the rendered summary.
#[derive(Debug, Clone, Default)]
pub struct LoggingDispatcher;

#[async_trait]
impl DocumentDispatcher for LoggingDispatcher {
    async fn send_rfq(&self, document: &RfqDocument) -> Result<(), NotificationError> {
        info!(
            rfq_id = %document.rfq_id,
            suppliers = document.suppliers.len(),
            "RFQ dispatched:\n{}",
            document.render_text()
        );
        Ok(())
    }

    async fn send_purchase_order(
        &self,
        document: &PurchaseOrderDocument,
    ) -> Result<(), NotificationError> {
        info!(
            purchase_order_id = %document.purchase_order_id,
            recipient = %document.recipient,
            "Purchase order dispatched:\n{}",
            document.render_text()
        );
        Ok(())
    }
}

/// Post-commit, best-effort delivery of outbound documents.
#[derive(Clone)]
pub struct DocumentCourier {
    dispatcher: Arc<dyn DocumentDispatcher>,
    timeout: Duration,
}

impl DocumentCourier {
    pub fn new(dispatcher: Arc<dyn DocumentDispatcher>, timeout: Duration) -> Self {
        Self {
            dispatcher,
            timeout,
        }
    }

    #[instrument(skip_all, fields(documents = documents.len()))]
    pub async fn deliver(&self, documents: Vec<OutboundDocument>) {
        for document in documents {
            let result = match &document {
                OutboundDocument::Rfq(doc) => {
                    tokio::time::timeout(self.timeout, self.dispatcher.send_rfq(doc)).await
                }
                OutboundDocument::PurchaseOrder(doc) => {
                    tokio::time::timeout(self.timeout, self.dispatcher.send_purchase_order(doc))
                        .await
                }
            };

            match result {
                Ok(Ok(())) => counter!("procure_pay.documents.dispatched", 1),
                Ok(Err(e)) => {
                    warn!(error = %e, "Document dispatch failed");
                    counter!("procure_pay.documents.failed", 1);
                }
                Err(_) => {
                    warn!(timeout = ?self.timeout, "Document dispatch timed out");
                    counter!("procure_pay.documents.failed", 1);
                }
            }
        }
    }
}

impl std::fmt::Debug for DocumentCourier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentCourier")
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    struct BrokenDispatcher;

    #[async_trait]
    impl DocumentDispatcher for BrokenDispatcher {
        async fn send_rfq(&self, _document: &RfqDocument) -> Result<(), NotificationError> {
            Err(NotificationError::Delivery("smtp down".into()))
        }

        async fn send_purchase_order(
            &self,
            _document: &PurchaseOrderDocument,
        ) -> Result<(), NotificationError> {
            Err(NotificationError::Rendering("template missing".into()))
        }
    }

    fn rfq_document() -> RfqDocument {
        RfqDocument {
            tenant_id: Uuid::new_v4(),
            rfq_id: Uuid::new_v4(),
            note: Some("Q3 restock".into()),
            suppliers: vec!["A".into()],
            lines: vec![RfqDocumentLine {
                item: "Bolts".into(),
                quantity: dec!(10.000),
                unit: Some("box".into()),
            }],
            sent_at: Utc::now(),
        }
    }

    #[test]
    fn rfq_summary_lists_lines() {
        let text = rfq_document().render_text();
        assert!(text.contains("Q3 restock"));
        assert!(text.contains("Bolts x 10 box"));
    }

    #[tokio::test]
    async fn dispatch_failures_do_not_propagate() {
        let courier = DocumentCourier::new(Arc::new(BrokenDispatcher), Duration::from_millis(50));
        courier
            .deliver(vec![OutboundDocument::Rfq(rfq_document())])
            .await;
    }
}
