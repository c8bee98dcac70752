use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{DatabaseTransaction, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use super::idempotency::{actions, Transition};
use super::{trimmed, ProcurementCore};
use crate::auth::{Permission, RequestContext};
use crate::entities::{
    supplier_invoice, supplier_invoice_line, supplier_payment, GoodsReceiptStatus,
    SupplierInvoiceStatus,
};
use crate::errors::ServiceError;
use crate::events::{AuditAction, AuditEvent};
use crate::repositories::{
    DocumentSequenceRepository, GoodsReceiptRepository, Lock, PurchaseOrderRepository,
    SupplierInvoiceRepository, SupplierPaymentRepository,
};

const NUMBER_SCOPE: &str = "supplier_invoice";

/// Optional header fields supplied when an invoice is drafted or edited.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvoiceEdits {
    #[serde(default)]
    pub supplier_number: Option<String>,
    #[serde(default)]
    pub invoice_date: Option<NaiveDate>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub attachment_ref: Option<String>,
}

impl InvoiceEdits {
    fn apply(self, active: &mut supplier_invoice::ActiveModel) {
        if let Some(number) = trimmed(self.supplier_number) {
            active.supplier_number = Set(Some(number));
        }
        if let Some(date) = self.invoice_date {
            active.invoice_date = Set(Some(date));
        }
        if let Some(date) = self.due_date {
            active.due_date = Set(Some(date));
        }
        if let Some(note) = trimmed(self.note) {
            active.note = Set(Some(note));
        }
        if let Some(attachment) = trimmed(self.attachment_ref) {
            active.attachment_ref = Set(Some(attachment));
        }
    }

    fn check_dates(
        &self,
        current_invoice_date: Option<NaiveDate>,
        current_due_date: Option<NaiveDate>,
    ) -> Result<(), ServiceError> {
        let invoice_date = self.invoice_date.or(current_invoice_date);
        let due_date = self.due_date.or(current_due_date);
        match (invoice_date, due_date) {
            (Some(issued), Some(due)) if due < issued => Err(ServiceError::ValidationError(
                "due date must not precede the invoice date".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

/// Target of a status change plus edits applied before the transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetInvoiceStatus {
    pub status: SupplierInvoiceStatus,
    #[serde(default, flatten)]
    pub edits: InvoiceEdits,
}

impl SetInvoiceStatus {
    pub fn new(status: SupplierInvoiceStatus) -> Self {
        Self {
            status,
            edits: InvoiceEdits::default(),
        }
    }

    pub fn with_attachment(mut self, attachment_ref: impl Into<String>) -> Self {
        self.edits.attachment_ref = Some(attachment_ref.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierInvoiceDetail {
    pub invoice: supplier_invoice::Model,
    pub lines: Vec<supplier_invoice_line::Model>,
    pub payments: Vec<supplier_payment::Model>,
    pub balance_due: Decimal,
}

/// `<PREFIX>-<YEAR>-<seq>`, with the sequence zero-padded to four digits.
pub fn format_invoice_number(prefix: &str, year: i32, sequence: i64) -> String {
    format!("{}-{}-{:04}", prefix, year, sequence)
}

/// Drafts the invoice of a fully received order, mirroring its lines.
pub async fn create_from_receipt_in(
    txn: &DatabaseTransaction,
    ctx: &RequestContext,
    goods_receipt_id: Uuid,
    edits: InvoiceEdits,
) -> Result<Transition<SupplierInvoiceDetail>, ServiceError> {
    edits.check_dates(None, None)?;

    let receipt = GoodsReceiptRepository::find(txn, ctx.tenant_id, goods_receipt_id, Lock::ForUpdate)
        .await?
        .ok_or_else(|| ServiceError::not_found("goods receipt", goods_receipt_id))?;
    if receipt.status != GoodsReceiptStatus::Received {
        return Err(ServiceError::StateConflict(format!(
            "goods receipt {} is {}; invoices are drafted from fully received orders",
            receipt.id, receipt.status
        )));
    }

    if let Some(existing) =
        SupplierInvoiceRepository::find_by_purchase_order(txn, ctx.tenant_id, receipt.purchase_order_id)
            .await?
    {
        return Err(ServiceError::Conflict(format!(
            "one invoice per order: purchase order {} already has invoice {}",
            receipt.purchase_order_id, existing.id
        )));
    }

    let order =
        PurchaseOrderRepository::find(txn, ctx.tenant_id, receipt.purchase_order_id, Lock::None)
            .await?
            .ok_or_else(|| ServiceError::not_found("purchase order", receipt.purchase_order_id))?;
    let order_lines = PurchaseOrderRepository::lines(txn, ctx.tenant_id, order.id).await?;

    let now = Utc::now();
    let invoice = SupplierInvoiceRepository::insert(
        txn,
        supplier_invoice::ActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(ctx.tenant_id),
            purchase_order_id: Set(order.id),
            goods_receipt_id: Set(receipt.id),
            status: Set(SupplierInvoiceStatus::Draft),
            number: Set(None),
            supplier_number: Set(trimmed(edits.supplier_number)),
            invoice_date: Set(edits.invoice_date),
            due_date: Set(edits.due_date),
            note: Set(trimmed(edits.note)),
            attachment_ref: Set(trimmed(edits.attachment_ref)),
            total_ht: Set(order.total_ht),
            total_tax: Set(order.total_tax),
            total_ttc: Set(order.total_ttc),
            amount_paid: Set(Decimal::ZERO),
            created_by: Set(ctx.actor_id),
            created_at: Set(now),
            updated_at: Set(now),
            posted_at: Set(None),
            paid_at: Set(None),
            cancelled_at: Set(None),
        },
    )
    .await
    .map_err(|e| {
        let err = ServiceError::from(e);
        if err.is_unique_violation() {
            ServiceError::Conflict(format!(
                "one invoice per order: purchase order {} is already invoiced",
                order.id
            ))
        } else {
            err
        }
    })?;

    let mut lines = Vec::with_capacity(order_lines.len());
    for line in &order_lines {
        let row = SupplierInvoiceRepository::insert_line(
            txn,
            supplier_invoice_line::ActiveModel {
                id: Set(Uuid::new_v4()),
                tenant_id: Set(ctx.tenant_id),
                supplier_invoice_id: Set(invoice.id),
                purchase_order_line_id: Set(line.id),
                position: Set(line.position),
                name: Set(line.name.clone()),
                quantity: Set(line.quantity),
                unit: Set(line.unit.clone()),
                unit_price: Set(line.unit_price),
                tax_rate: Set(line.tax_rate),
                total_ht: Set(line.total_ht),
                total_tax: Set(line.total_tax),
                total_ttc: Set(line.total_ttc),
            },
        )
        .await?;
        lines.push(row);
    }

    let event = AuditEvent::new(ctx, AuditAction::SupplierInvoiceCreated, invoice.id)
        .after(&invoice)
        .with_metadata(serde_json::json!({
            "purchase_order_id": order.id,
            "goods_receipt_id": receipt.id,
        }));

    Ok(Transition::new(SupplierInvoiceDetail {
        balance_due: invoice.balance_due(),
        invoice,
        lines,
        payments: Vec::new(),
    })
    .audited(event))
}

/// Applies edits, then moves a draft invoice to `posted` or `cancelled`.
pub async fn set_status_in(
    txn: &DatabaseTransaction,
    ctx: &RequestContext,
    invoice_id: Uuid,
    request: SetInvoiceStatus,
    number_prefix: &str,
) -> Result<Transition<supplier_invoice::Model>, ServiceError> {
    let invoice = SupplierInvoiceRepository::find(txn, ctx.tenant_id, invoice_id, Lock::ForUpdate)
        .await?
        .ok_or_else(|| ServiceError::not_found("supplier invoice", invoice_id))?;

    let action = match request.status {
        SupplierInvoiceStatus::Posted => AuditAction::SupplierInvoicePosted,
        SupplierInvoiceStatus::Cancelled => AuditAction::SupplierInvoiceCancelled,
        other => {
            return Err(ServiceError::StateConflict(format!(
                "invoice {} cannot be moved to {} directly",
                invoice.id, other
            )))
        }
    };
    if invoice.status != SupplierInvoiceStatus::Draft {
        return Err(ServiceError::StateConflict(format!(
            "invoice {} is {}; only draft invoices can be {}",
            invoice.id, invoice.status, request.status
        )));
    }

    request
        .edits
        .check_dates(invoice.invoice_date, invoice.due_date)?;

    let attachment = trimmed(request.edits.attachment_ref.clone()).or(invoice.attachment_ref.clone());
    if request.status == SupplierInvoiceStatus::Posted && attachment.is_none() {
        return Err(ServiceError::ValidationError(
            "attachment required to post a supplier invoice".to_string(),
        ));
    }

    let now = Utc::now();
    let before = invoice.clone();
    let mut active: supplier_invoice::ActiveModel = invoice.into();
    request.edits.apply(&mut active);
    active.status = Set(request.status);
    active.updated_at = Set(now);

    let mut number = None;
    if request.status == SupplierInvoiceStatus::Posted {
        let year = now.year();
        let sequence =
            DocumentSequenceRepository::next_value(txn, ctx.tenant_id, NUMBER_SCOPE, year).await?;
        let formatted = format_invoice_number(number_prefix, year, sequence);
        active.number = Set(Some(formatted.clone()));
        active.posted_at = Set(Some(now));
        number = Some(formatted);
    } else {
        active.cancelled_at = Set(Some(now));
    }

    let updated = SupplierInvoiceRepository::update(txn, active).await?;

    let event = AuditEvent::new(ctx, action, updated.id)
        .before(&before)
        .after(&updated)
        .with_metadata(serde_json::json!({ "number": number }));

    Ok(Transition::new(updated).audited(event))
}

/// Supplier invoice generator
#[derive(Debug, Clone)]
pub struct SupplierInvoiceService {
    core: Arc<ProcurementCore>,
}

impl SupplierInvoiceService {
    pub fn new(core: Arc<ProcurementCore>) -> Self {
        Self { core }
    }

    #[instrument(skip(self, ctx, edits), fields(tenant_id = %ctx.tenant_id))]
    pub async fn create_from_receipt(
        &self,
        ctx: &RequestContext,
        goods_receipt_id: Uuid,
        edits: InvoiceEdits,
    ) -> Result<SupplierInvoiceDetail, ServiceError> {
        ctx.require(Permission::CreateSupplierInvoices)?;
        let owned = ctx.clone();
        let detail = self
            .core
            .perform(ctx, actions::SUPPLIER_INVOICE_CREATE, move |txn| {
                Box::pin(async move {
                    create_from_receipt_in(txn, &owned, goods_receipt_id, edits).await
                })
            })
            .await?;
        info!(invoice_id = %detail.invoice.id, "Supplier invoice drafted");
        Ok(detail)
    }

    #[instrument(skip(self, ctx, request), fields(tenant_id = %ctx.tenant_id, target = %request.status))]
    pub async fn set_status(
        &self,
        ctx: &RequestContext,
        invoice_id: Uuid,
        request: SetInvoiceStatus,
    ) -> Result<supplier_invoice::Model, ServiceError> {
        let permission = match request.status {
            SupplierInvoiceStatus::Cancelled => Permission::CancelSupplierInvoices,
            _ => Permission::PostSupplierInvoices,
        };
        ctx.require(permission)?;

        let owned = ctx.clone();
        let prefix = self.core.settings().invoice_number_prefix.clone();
        let invoice = self
            .core
            .perform(ctx, actions::SUPPLIER_INVOICE_SET_STATUS, move |txn| {
                Box::pin(async move { set_status_in(txn, &owned, invoice_id, request, &prefix).await })
            })
            .await?;
        info!(
            status = %invoice.status,
            number = invoice.number.as_deref().unwrap_or("-"),
            "Supplier invoice status changed"
        );
        Ok(invoice)
    }

    /// Invoice with lines, payments and the outstanding balance
    #[instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id))]
    pub async fn get(
        &self,
        ctx: &RequestContext,
        invoice_id: Uuid,
    ) -> Result<SupplierInvoiceDetail, ServiceError> {
        ctx.require(Permission::Read)?;
        let db = self.core.db();
        let invoice = SupplierInvoiceRepository::find(db, ctx.tenant_id, invoice_id, Lock::None)
            .await?
            .ok_or_else(|| ServiceError::not_found("supplier invoice", invoice_id))?;
        let lines = SupplierInvoiceRepository::lines(db, ctx.tenant_id, invoice.id).await?;
        let payments =
            SupplierPaymentRepository::list_for_invoice(db, ctx.tenant_id, invoice.id).await?;
        Ok(SupplierInvoiceDetail {
            balance_due: invoice.balance_due(),
            invoice,
            lines,
            payments,
        })
    }
}
