use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, DatabaseTransaction, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use super::idempotency::{actions, Transition};
use super::pricing::{DocumentTotals, LineTotals};
use super::{trimmed, ProcurementCore};
use crate::auth::{Permission, RequestContext};
use crate::entities::{
    goods_receipt, purchase_order, purchase_order_line, GoodsReceiptStatus, PurchaseOrderStatus,
};
use crate::errors::ServiceError;
use crate::events::{AuditAction, AuditEvent};
use crate::notifications::{OutboundDocument, PurchaseOrderDocument, PurchaseOrderDocumentLine};
use crate::repositories::{GoodsReceiptRepository, Lock, PurchaseOrderRepository};

/// A line to order. Quantities and prices are validated, never silently dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLineInput {
    pub name: String,
    pub quantity: Decimal,
    #[serde(default)]
    pub unit: Option<String>,
    pub unit_price: Decimal,
    #[serde(default)]
    pub tax_rate: Decimal,
    /// RFQ line the order line was converted from
    #[serde(default)]
    pub rfq_line_id: Option<Uuid>,
}

impl OrderLineInput {
    fn check(&self, position: usize) -> Result<(), ServiceError> {
        let problem = if self.name.trim().is_empty() {
            Some("name is required")
        } else if self.quantity <= Decimal::ZERO {
            Some("quantity must be positive")
        } else if self.unit_price < Decimal::ZERO {
            Some("unit price must not be negative")
        } else if self.tax_rate < Decimal::ZERO || self.tax_rate > Decimal::ONE_HUNDRED {
            Some("tax rate must be between 0 and 100")
        } else {
            None
        };

        match problem {
            Some(message) => Err(ServiceError::ValidationError(format!(
                "line {}: {}",
                position + 1,
                message
            ))),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreatePurchaseOrder {
    #[validate(length(min = 1, max = 255))]
    pub supplier_name: String,
    #[serde(default)]
    pub note: Option<String>,
    #[validate(length(min = 1, message = "at least one line is required"))]
    pub lines: Vec<OrderLineInput>,
}

/// An order with its lines and, once confirmed, its goods receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseOrderDetail {
    pub purchase_order: purchase_order::Model,
    pub lines: Vec<purchase_order_line::Model>,
    pub goods_receipt_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseOrderConfirmation {
    pub purchase_order: purchase_order::Model,
    pub goods_receipt: goods_receipt::Model,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseOrderDispatch {
    pub purchase_order_id: Uuid,
    pub recipient: String,
    pub status: PurchaseOrderStatus,
    pub sent_at: DateTime<Utc>,
}

pub(crate) async fn load_detail<C: ConnectionTrait>(
    conn: &C,
    order: purchase_order::Model,
) -> Result<PurchaseOrderDetail, ServiceError> {
    let lines = PurchaseOrderRepository::lines(conn, order.tenant_id, order.id).await?;
    let receipt =
        GoodsReceiptRepository::find_by_purchase_order(conn, order.tenant_id, order.id, Lock::None)
            .await?;
    Ok(PurchaseOrderDetail {
        purchase_order: order,
        lines,
        goods_receipt_id: receipt.map(|r| r.id),
    })
}

/// Inserts an order and its priced lines. Lines must already be valid.
pub(crate) async fn insert_order(
    txn: &DatabaseTransaction,
    ctx: &RequestContext,
    rfq_id: Option<Uuid>,
    supplier_name: &str,
    note: Option<String>,
    lines: &[OrderLineInput],
) -> Result<PurchaseOrderDetail, ServiceError> {
    let now = Utc::now();
    let priced: Vec<LineTotals> = lines
        .iter()
        .map(|l| LineTotals::compute(l.quantity, l.unit_price, l.tax_rate))
        .collect();
    let totals: DocumentTotals = priced.iter().collect();

    let order = PurchaseOrderRepository::insert(
        txn,
        purchase_order::ActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(ctx.tenant_id),
            rfq_id: Set(rfq_id),
            supplier_name: Set(supplier_name.trim().to_string()),
            status: Set(PurchaseOrderStatus::Created),
            total_ht: Set(totals.total_ht),
            total_tax: Set(totals.total_tax),
            total_ttc: Set(totals.total_ttc),
            note: Set(trimmed(note)),
            created_by: Set(ctx.actor_id),
            created_at: Set(now),
            updated_at: Set(now),
            confirmed_at: Set(None),
            received_at: Set(None),
        },
    )
    .await?;

    let mut saved = Vec::with_capacity(lines.len());
    for (position, (line, line_totals)) in lines.iter().zip(priced.iter()).enumerate() {
        let row = PurchaseOrderRepository::insert_line(
            txn,
            purchase_order_line::ActiveModel {
                id: Set(Uuid::new_v4()),
                tenant_id: Set(ctx.tenant_id),
                purchase_order_id: Set(order.id),
                rfq_line_id: Set(line.rfq_line_id),
                position: Set(position as i32 + 1),
                name: Set(line.name.trim().to_string()),
                quantity: Set(line.quantity),
                unit: Set(trimmed(line.unit.clone())),
                unit_price: Set(line.unit_price),
                tax_rate: Set(line.tax_rate),
                total_ht: Set(line_totals.total_ht),
                total_tax: Set(line_totals.total_tax),
                total_ttc: Set(line_totals.total_ttc),
            },
        )
        .await?;
        saved.push(row);
    }

    Ok(PurchaseOrderDetail {
        purchase_order: order,
        lines: saved,
        goods_receipt_id: None,
    })
}

pub async fn create_in(
    txn: &DatabaseTransaction,
    ctx: &RequestContext,
    input: CreatePurchaseOrder,
) -> Result<Transition<PurchaseOrderDetail>, ServiceError> {
    input.validate()?;
    if input.supplier_name.trim().is_empty() {
        return Err(ServiceError::ValidationError(
            "supplier name is required".to_string(),
        ));
    }
    for (position, line) in input.lines.iter().enumerate() {
        line.check(position)?;
    }

    let detail = insert_order(
        txn,
        ctx,
        None,
        &input.supplier_name,
        input.note,
        &input.lines,
    )
    .await?;

    let event = AuditEvent::new(ctx, AuditAction::PurchaseOrderCreated, detail.purchase_order.id)
        .after(&detail.purchase_order);
    Ok(Transition::new(detail).audited(event))
}

/// `created -> confirmed`, provisioning the goods receipt in the same transaction.
pub async fn confirm_in(
    txn: &DatabaseTransaction,
    ctx: &RequestContext,
    purchase_order_id: Uuid,
) -> Result<Transition<PurchaseOrderConfirmation>, ServiceError> {
    let order =
        PurchaseOrderRepository::find(txn, ctx.tenant_id, purchase_order_id, Lock::ForUpdate)
            .await?
            .ok_or_else(|| ServiceError::not_found("purchase order", purchase_order_id))?;

    if order.status != PurchaseOrderStatus::Created {
        return Err(ServiceError::StateConflict(format!(
            "purchase order {} is {}; only created orders can be confirmed",
            order.id, order.status
        )));
    }

    let now = Utc::now();
    let before = order.clone();
    let mut active: purchase_order::ActiveModel = order.into();
    active.status = Set(PurchaseOrderStatus::Confirmed);
    active.confirmed_at = Set(Some(now));
    active.updated_at = Set(now);
    let confirmed = PurchaseOrderRepository::update(txn, active).await?;

    let receipt = match GoodsReceiptRepository::find_by_purchase_order(
        txn,
        ctx.tenant_id,
        confirmed.id,
        Lock::ForUpdate,
    )
    .await?
    {
        Some(existing) => existing,
        None => {
            GoodsReceiptRepository::insert(
                txn,
                goods_receipt::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    tenant_id: Set(ctx.tenant_id),
                    purchase_order_id: Set(confirmed.id),
                    status: Set(GoodsReceiptStatus::NotReceived),
                    note: Set(None),
                    created_at: Set(now),
                    updated_at: Set(now),
                },
            )
            .await?
        }
    };

    let event = AuditEvent::new(ctx, AuditAction::PurchaseOrderConfirmed, confirmed.id)
        .before(&before)
        .after(&confirmed)
        .with_metadata(serde_json::json!({ "goods_receipt_id": receipt.id }));

    Ok(Transition::new(PurchaseOrderConfirmation {
        purchase_order: confirmed,
        goods_receipt: receipt,
    })
    .audited(event))
}

/// Renders the order for its supplier. Status is left untouched.
pub async fn send_in(
    txn: &DatabaseTransaction,
    ctx: &RequestContext,
    purchase_order_id: Uuid,
    recipient: String,
) -> Result<Transition<PurchaseOrderDispatch>, ServiceError> {
    let recipient = recipient.trim().to_string();
    if !validator::validate_email(recipient.as_str()) {
        return Err(ServiceError::ValidationError(format!(
            "'{}' is not a valid e-mail address",
            recipient
        )));
    }

    let order = PurchaseOrderRepository::find(txn, ctx.tenant_id, purchase_order_id, Lock::None)
        .await?
        .ok_or_else(|| ServiceError::not_found("purchase order", purchase_order_id))?;
    let lines = PurchaseOrderRepository::lines(txn, ctx.tenant_id, order.id).await?;

    let document = PurchaseOrderDocument {
        tenant_id: ctx.tenant_id,
        purchase_order_id: order.id,
        supplier_name: order.supplier_name.clone(),
        recipient: recipient.clone(),
        lines: lines
            .iter()
            .map(|l| PurchaseOrderDocumentLine {
                name: l.name.clone(),
                quantity: l.quantity,
                unit: l.unit.clone(),
                unit_price: l.unit_price,
                tax_rate: l.tax_rate,
                total_ttc: l.total_ttc,
            })
            .collect(),
        total_ht: order.total_ht,
        total_tax: order.total_tax,
        total_ttc: order.total_ttc,
    };

    let event = AuditEvent::new(ctx, AuditAction::PurchaseOrderSent, order.id)
        .with_metadata(serde_json::json!({ "recipient": recipient }));

    Ok(Transition::new(PurchaseOrderDispatch {
        purchase_order_id: order.id,
        recipient,
        status: order.status,
        sent_at: Utc::now(),
    })
    .audited(event)
    .with_document(OutboundDocument::PurchaseOrder(document)))
}

/// Purchase order lifecycle controller
#[derive(Debug, Clone)]
pub struct PurchaseOrderService {
    core: Arc<ProcurementCore>,
}

impl PurchaseOrderService {
    pub fn new(core: Arc<ProcurementCore>) -> Self {
        Self { core }
    }

    /// Creates an order that does not originate from an RFQ
    #[instrument(skip(self, ctx, input), fields(tenant_id = %ctx.tenant_id))]
    pub async fn create(
        &self,
        ctx: &RequestContext,
        input: CreatePurchaseOrder,
    ) -> Result<PurchaseOrderDetail, ServiceError> {
        ctx.require(Permission::CreatePurchaseOrders)?;
        let owned = ctx.clone();
        let detail = self
            .core
            .perform(ctx, actions::PURCHASE_ORDER_CREATE, move |txn| {
                Box::pin(async move { create_in(txn, &owned, input).await })
            })
            .await?;
        info!(purchase_order_id = %detail.purchase_order.id, "Purchase order created");
        Ok(detail)
    }

    #[instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id))]
    pub async fn confirm(
        &self,
        ctx: &RequestContext,
        purchase_order_id: Uuid,
    ) -> Result<PurchaseOrderConfirmation, ServiceError> {
        ctx.require(Permission::ConfirmPurchaseOrders)?;
        let owned = ctx.clone();
        let confirmation = self
            .core
            .perform(ctx, actions::PURCHASE_ORDER_CONFIRM, move |txn| {
                Box::pin(async move { confirm_in(txn, &owned, purchase_order_id).await })
            })
            .await?;
        info!(
            goods_receipt_id = %confirmation.goods_receipt.id,
            "Purchase order confirmed"
        );
        Ok(confirmation)
    }

    /// Sends the order document to `recipient`; retries with the same key do not re-send
    #[instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id))]
    pub async fn send(
        &self,
        ctx: &RequestContext,
        purchase_order_id: Uuid,
        recipient: &str,
    ) -> Result<PurchaseOrderDispatch, ServiceError> {
        ctx.require(Permission::SendPurchaseOrders)?;
        let owned = ctx.clone();
        let recipient = recipient.to_string();
        self.core
            .perform(ctx, actions::PURCHASE_ORDER_SEND, move |txn| {
                Box::pin(async move { send_in(txn, &owned, purchase_order_id, recipient).await })
            })
            .await
    }

    #[instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id))]
    pub async fn get(
        &self,
        ctx: &RequestContext,
        purchase_order_id: Uuid,
    ) -> Result<PurchaseOrderDetail, ServiceError> {
        ctx.require(Permission::Read)?;
        let db = self.core.db();
        let order = PurchaseOrderRepository::find(db, ctx.tenant_id, purchase_order_id, Lock::None)
            .await?
            .ok_or_else(|| ServiceError::not_found("purchase order", purchase_order_id))?;
        load_detail(db, order).await
    }

    /// Orders converted from one RFQ
    #[instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id))]
    pub async fn list_for_rfq(
        &self,
        ctx: &RequestContext,
        rfq_id: Uuid,
    ) -> Result<Vec<PurchaseOrderDetail>, ServiceError> {
        ctx.require(Permission::Read)?;
        let db = self.core.db();
        let orders = PurchaseOrderRepository::list_for_rfq(db, ctx.tenant_id, rfq_id).await?;
        let mut details = Vec::with_capacity(orders.len());
        for order in orders {
            details.push(load_detail(db, order).await?);
        }
        Ok(details)
    }
}
