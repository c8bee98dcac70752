#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use procure_pay::{
    auth::{RequestContext, Role},
    config::ProcurementConfig,
    db::{self, DbConfig, DbPool},
    events::{AuditAction, AuditError, AuditEvent, AuditSink},
    notifications::{
        DocumentDispatcher, NotificationError, PurchaseOrderDocument, RfqDocument,
    },
    services::{
        goods_receipts::{ReceiptLineInput, ReceiptOutcome, ReceiveGoods},
        purchase_orders::{CreatePurchaseOrder, OrderLineInput, PurchaseOrderConfirmation},
        supplier_invoices::{InvoiceEdits, SetInvoiceStatus, SupplierInvoiceDetail},
    },
    entities::SupplierInvoiceStatus,
    ProcurementServices,
};

/// Audit sink that keeps every event in memory.
#[derive(Default)]
pub struct RecordingAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl RecordingAuditSink {
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().expect("audit lock").clone()
    }

    pub fn count(&self, action: AuditAction) -> usize {
        self.events().iter().filter(|e| e.action == action).count()
    }
}

#[async_trait]
impl AuditSink for RecordingAuditSink {
    async fn record(&self, event: AuditEvent) -> Result<(), AuditError> {
        self.events.lock().expect("audit lock").push(event);
        Ok(())
    }
}

/// Dispatcher that records what would have been sent.
#[derive(Default)]
pub struct RecordingDispatcher {
    rfqs: Mutex<Vec<RfqDocument>>,
    purchase_orders: Mutex<Vec<PurchaseOrderDocument>>,
}

impl RecordingDispatcher {
    pub fn rfqs(&self) -> Vec<RfqDocument> {
        self.rfqs.lock().expect("dispatch lock").clone()
    }

    pub fn purchase_orders(&self) -> Vec<PurchaseOrderDocument> {
        self.purchase_orders.lock().expect("dispatch lock").clone()
    }
}

#[async_trait]
impl DocumentDispatcher for RecordingDispatcher {
    async fn send_rfq(&self, document: &RfqDocument) -> Result<(), NotificationError> {
        self.rfqs.lock().expect("dispatch lock").push(document.clone());
        Ok(())
    }

    async fn send_purchase_order(
        &self,
        document: &PurchaseOrderDocument,
    ) -> Result<(), NotificationError> {
        self.purchase_orders
            .lock()
            .expect("dispatch lock")
            .push(document.clone());
        Ok(())
    }
}

/// Services over a fresh in-memory SQLite database.
pub struct TestApp {
    pub services: ProcurementServices,
    pub db: Arc<DbPool>,
    pub audit: Arc<RecordingAuditSink>,
    pub dispatcher: Arc<RecordingDispatcher>,
    pub tenant_id: Uuid,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_settings(ProcurementConfig::default()).await
    }

    pub async fn with_settings(settings: ProcurementConfig) -> Self {
        let pool = db::establish_connection_with_config(&DbConfig::in_memory_sqlite())
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool).await.expect("migrations");

        let db = Arc::new(pool);
        let audit = Arc::new(RecordingAuditSink::default());
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let services =
            ProcurementServices::new(db.clone(), settings, audit.clone(), dispatcher.clone());

        Self {
            services,
            db,
            audit,
            dispatcher,
            tenant_id: Uuid::new_v4(),
        }
    }

    pub fn owner(&self) -> RequestContext {
        RequestContext::new(self.tenant_id, Uuid::new_v4(), Role::Owner)
    }

    pub fn member(&self) -> RequestContext {
        RequestContext::new(self.tenant_id, Uuid::new_v4(), Role::Member)
    }

    /// An owner of an unrelated tenant
    pub fn stranger(&self) -> RequestContext {
        RequestContext::new(Uuid::new_v4(), Uuid::new_v4(), Role::Owner)
    }

    /// Creates and confirms an order for `lines` of `(name, quantity, unit price, tax rate)`.
    pub async fn confirmed_order(
        &self,
        lines: &[(&str, Decimal, Decimal, Decimal)],
    ) -> PurchaseOrderConfirmation {
        let ctx = self.owner();
        let detail = self
            .services
            .purchase_orders
            .create(
                &ctx,
                CreatePurchaseOrder {
                    supplier_name: "Acme Supplies".into(),
                    note: None,
                    lines: lines
                        .iter()
                        .map(|(name, quantity, unit_price, tax_rate)| OrderLineInput {
                            name: name.to_string(),
                            quantity: *quantity,
                            unit: None,
                            unit_price: *unit_price,
                            tax_rate: *tax_rate,
                            rfq_line_id: None,
                        })
                        .collect(),
                },
            )
            .await
            .expect("create purchase order");

        self.services
            .purchase_orders
            .confirm(&ctx, detail.purchase_order.id)
            .await
            .expect("confirm purchase order")
    }

    /// Receives every line of a confirmed order in full.
    pub async fn receive_all(&self, confirmation: &PurchaseOrderConfirmation) -> ReceiptOutcome {
        let detail = self
            .services
            .purchase_orders
            .get(&self.owner(), confirmation.purchase_order.id)
            .await
            .expect("load purchase order");

        self.services
            .goods_receipts
            .receive(
                &self.owner(),
                confirmation.purchase_order.id,
                ReceiveGoods {
                    lines: detail
                        .lines
                        .iter()
                        .map(|l| ReceiptLineInput {
                            purchase_order_line_id: l.id,
                            quantity: l.quantity,
                        })
                        .collect(),
                    note: None,
                },
            )
            .await
            .expect("receive all lines")
    }

    /// A draft invoice for a fully received single-line order.
    pub async fn draft_invoice(&self, quantity: Decimal, unit_price: Decimal) -> SupplierInvoiceDetail {
        let confirmation = self
            .confirmed_order(&[("Widget", quantity, unit_price, Decimal::ZERO)])
            .await;
        let outcome = self.receive_all(&confirmation).await;
        self.services
            .supplier_invoices
            .create_from_receipt(&self.owner(), outcome.goods_receipt_id, InvoiceEdits::default())
            .await
            .expect("draft invoice")
    }

    /// A posted invoice whose total is `quantity * unit_price` (no tax).
    pub async fn posted_invoice(&self, quantity: Decimal, unit_price: Decimal) -> Uuid {
        let draft = self.draft_invoice(quantity, unit_price).await;
        self.services
            .supplier_invoices
            .set_status(
                &self.owner(),
                draft.invoice.id,
                SetInvoiceStatus::new(SupplierInvoiceStatus::Posted)
                    .with_attachment("bills/scan.pdf"),
            )
            .await
            .expect("post invoice");
        draft.invoice.id
    }
}
