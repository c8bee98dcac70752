use chrono::Utc;
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, DatabaseTransaction, Set};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::idempotency::{actions, Transition};
use super::{trimmed, ProcurementCore};
use crate::auth::{Permission, RequestContext};
use crate::entities::{
    goods_receipt, goods_receipt_entry, goods_receipt_entry_line, purchase_order,
    purchase_order_line, GoodsReceiptStatus, PurchaseOrderStatus,
};
use crate::errors::{OverReceiptLine, ServiceError};
use crate::events::{AuditAction, AuditEvent};
use crate::repositories::{GoodsReceiptRepository, Lock, PurchaseOrderRepository};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptLineInput {
    pub purchase_order_line_id: Uuid,
    pub quantity: Decimal,
}

/// One delivered lot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiveGoods {
    pub lines: Vec<ReceiptLineInput>,
    #[serde(default)]
    pub note: Option<String>,
}

/// Fulfillment of one ordered line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineProgress {
    pub purchase_order_line_id: Uuid,
    pub name: String,
    pub ordered: Decimal,
    pub received: Decimal,
    pub remaining: Decimal,
}

impl LineProgress {
    pub fn is_complete(&self) -> bool {
        self.received >= self.ordered
    }
}

/// Result of recording a lot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptOutcome {
    pub goods_receipt_id: Uuid,
    pub entry_id: Uuid,
    pub sequence: i32,
    pub status: GoodsReceiptStatus,
    pub purchase_order_status: PurchaseOrderStatus,
    pub lines: Vec<LineProgress>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptEntryDetail {
    pub entry: goods_receipt_entry::Model,
    pub lines: Vec<goods_receipt_entry_line::Model>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoodsReceiptDetail {
    pub goods_receipt: goods_receipt::Model,
    pub entries: Vec<ReceiptEntryDetail>,
    pub progress: Vec<LineProgress>,
}

/// Per-line progress in purchase order line order.
pub fn line_progress(
    lines: &[purchase_order_line::Model],
    received: &HashMap<Uuid, Decimal>,
) -> Vec<LineProgress> {
    lines
        .iter()
        .map(|line| {
            let got = received.get(&line.id).copied().unwrap_or_default();
            LineProgress {
                purchase_order_line_id: line.id,
                name: line.name.clone(),
                ordered: line.quantity,
                received: got,
                remaining: (line.quantity - got).max(Decimal::ZERO),
            }
        })
        .collect()
}

/// All lines at target: received; anything received: partial; otherwise not received.
pub fn derive_status(progress: &[LineProgress]) -> GoodsReceiptStatus {
    if !progress.is_empty() && progress.iter().all(LineProgress::is_complete) {
        GoodsReceiptStatus::Received
    } else if progress.iter().any(|p| p.received > Decimal::ZERO) {
        GoodsReceiptStatus::Partial
    } else {
        GoodsReceiptStatus::NotReceived
    }
}

/// Checks a lot against what is still outstanding.
///
/// Submitted lines for the same order line are summed first. Returns the
/// quantities to record, in first-submitted order, or every offending line.
pub fn plan_lot(
    order_lines: &[purchase_order_line::Model],
    already_received: &HashMap<Uuid, Decimal>,
    submitted: &[ReceiptLineInput],
) -> Result<Vec<(Uuid, Decimal)>, ServiceError> {
    if submitted.is_empty() {
        return Err(ServiceError::ValidationError(
            "a lot needs at least one line".to_string(),
        ));
    }

    let by_id: HashMap<Uuid, &purchase_order_line::Model> =
        order_lines.iter().map(|l| (l.id, l)).collect();

    let mut planned: Vec<(Uuid, Decimal)> = Vec::new();
    for input in submitted {
        if !by_id.contains_key(&input.purchase_order_line_id) {
            return Err(ServiceError::ValidationError(format!(
                "line {} does not belong to this purchase order",
                input.purchase_order_line_id
            )));
        }
        if input.quantity <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(format!(
                "quantity for line {} must be positive",
                input.purchase_order_line_id
            )));
        }
        match planned
            .iter_mut()
            .find(|(id, _)| *id == input.purchase_order_line_id)
        {
            Some((_, qty)) => *qty += input.quantity,
            None => planned.push((input.purchase_order_line_id, input.quantity)),
        }
    }

    let offending: Vec<OverReceiptLine> = planned
        .iter()
        .filter_map(|(id, requested)| {
            let line = by_id.get(id)?;
            let already = already_received.get(id).copied().unwrap_or_default();
            (*requested > line.quantity - already).then(|| OverReceiptLine {
                purchase_order_line_id: *id,
                ordered: line.quantity,
                already_received: already,
                requested: *requested,
            })
        })
        .collect();

    if offending.is_empty() {
        Ok(planned)
    } else {
        Err(ServiceError::OverReceipt(offending))
    }
}

async fn ensure_receipt(
    txn: &DatabaseTransaction,
    order: &purchase_order::Model,
) -> Result<goods_receipt::Model, ServiceError> {
    if let Some(receipt) =
        GoodsReceiptRepository::find_by_purchase_order(txn, order.tenant_id, order.id, Lock::ForUpdate)
            .await?
    {
        return Ok(receipt);
    }

    warn!(purchase_order_id = %order.id, "Confirmed order had no goods receipt; provisioning one");
    let now = Utc::now();
    let receipt = GoodsReceiptRepository::insert(
        txn,
        goods_receipt::ActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(order.tenant_id),
            purchase_order_id: Set(order.id),
            status: Set(GoodsReceiptStatus::NotReceived),
            note: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        },
    )
    .await?;
    Ok(receipt)
}

/// Records one lot against a confirmed order and re-derives receipt and order status.
pub async fn receive_in(
    txn: &DatabaseTransaction,
    ctx: &RequestContext,
    purchase_order_id: Uuid,
    input: ReceiveGoods,
) -> Result<Transition<ReceiptOutcome>, ServiceError> {
    let order =
        PurchaseOrderRepository::find(txn, ctx.tenant_id, purchase_order_id, Lock::ForUpdate)
            .await?
            .ok_or_else(|| ServiceError::not_found("purchase order", purchase_order_id))?;

    // A received order stays receivable so extra quantity surfaces as over-receipt.
    if order.status == PurchaseOrderStatus::Created {
        return Err(ServiceError::StateConflict(format!(
            "purchase order {} must be confirmed before goods are received",
            order.id
        )));
    }

    let order_lines = PurchaseOrderRepository::lines(txn, ctx.tenant_id, order.id).await?;
    let receipt = ensure_receipt(txn, &order).await?;
    let mut received =
        GoodsReceiptRepository::received_by_line(txn, ctx.tenant_id, receipt.id).await?;

    let planned = match plan_lot(&order_lines, &received, &input.lines) {
        Ok(planned) => planned,
        Err(e) => {
            if let ServiceError::OverReceipt(lines) = &e {
                counter!("procure_pay.receipts.over_receipt_rejected", 1);
                warn!(
                    purchase_order_id = %order.id,
                    offending = lines.len(),
                    "Over-receipt rejected"
                );
            }
            return Err(e);
        }
    };

    let now = Utc::now();
    let sequence =
        GoodsReceiptRepository::count_entries(txn, ctx.tenant_id, receipt.id).await? as i32 + 1;
    let entry = GoodsReceiptRepository::insert_entry(
        txn,
        goods_receipt_entry::ActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(ctx.tenant_id),
            goods_receipt_id: Set(receipt.id),
            sequence: Set(sequence),
            note: Set(trimmed(input.note)),
            received_by: Set(ctx.actor_id),
            created_at: Set(now),
        },
    )
    .await?;

    for (line_id, quantity) in &planned {
        GoodsReceiptRepository::insert_entry_line(
            txn,
            goods_receipt_entry_line::ActiveModel {
                id: Set(Uuid::new_v4()),
                tenant_id: Set(ctx.tenant_id),
                entry_id: Set(entry.id),
                purchase_order_line_id: Set(*line_id),
                quantity: Set(*quantity),
            },
        )
        .await?;
        *received.entry(*line_id).or_default() += *quantity;
    }

    let progress = line_progress(&order_lines, &received);
    let derived = derive_status(&progress);
    let previous_status = receipt.status;
    // Never regress
    let status = if derived.rank() >= previous_status.rank() {
        derived
    } else {
        previous_status
    };

    let mut active: goods_receipt::ActiveModel = receipt.into();
    active.status = Set(status);
    active.updated_at = Set(now);
    let receipt = GoodsReceiptRepository::update(txn, active).await?;

    let mut transition_events = vec![AuditEvent::new(
        ctx,
        AuditAction::GoodsReceiptLotRecorded,
        receipt.id,
    )
    .with_metadata(serde_json::json!({
        "purchase_order_id": order.id,
        "entry_id": entry.id,
        "sequence": sequence,
        "previous_status": previous_status,
        "status": status,
        "lines": planned
            .iter()
            .map(|(id, qty)| serde_json::json!({ "purchase_order_line_id": id, "quantity": qty }))
            .collect::<Vec<_>>(),
    }))];

    let mut purchase_order_status = order.status;
    if status == GoodsReceiptStatus::Received && order.status != PurchaseOrderStatus::Received {
        let before = order.clone();
        let mut active: purchase_order::ActiveModel = order.into();
        active.status = Set(PurchaseOrderStatus::Received);
        active.received_at = Set(Some(now));
        active.updated_at = Set(now);
        let updated = PurchaseOrderRepository::update(txn, active).await?;
        purchase_order_status = updated.status;
        transition_events.push(
            AuditEvent::new(ctx, AuditAction::PurchaseOrderReceived, updated.id)
                .before(&before)
                .after(&updated),
        );
    }

    let mut transition = Transition::new(ReceiptOutcome {
        goods_receipt_id: receipt.id,
        entry_id: entry.id,
        sequence,
        status,
        purchase_order_status,
        lines: progress,
    });
    transition.audit = transition_events;
    Ok(transition)
}

pub(crate) async fn load_detail<C: ConnectionTrait>(
    conn: &C,
    receipt: goods_receipt::Model,
) -> Result<GoodsReceiptDetail, ServiceError> {
    let tenant_id = receipt.tenant_id;
    let order_lines =
        PurchaseOrderRepository::lines(conn, tenant_id, receipt.purchase_order_id).await?;
    let entries = GoodsReceiptRepository::entries(conn, tenant_id, receipt.id).await?;
    let all_lines = GoodsReceiptRepository::entry_lines(conn, tenant_id, receipt.id).await?;

    let mut received: HashMap<Uuid, Decimal> = HashMap::new();
    let mut by_entry: HashMap<Uuid, Vec<goods_receipt_entry_line::Model>> = HashMap::new();
    for line in all_lines {
        *received.entry(line.purchase_order_line_id).or_default() += line.quantity;
        by_entry.entry(line.entry_id).or_default().push(line);
    }

    let entries = entries
        .into_iter()
        .map(|entry| ReceiptEntryDetail {
            lines: by_entry.remove(&entry.id).unwrap_or_default(),
            entry,
        })
        .collect();

    Ok(GoodsReceiptDetail {
        progress: line_progress(&order_lines, &received),
        goods_receipt: receipt,
        entries,
    })
}

/// Goods receipt reconciler
#[derive(Debug, Clone)]
pub struct GoodsReceiptService {
    core: Arc<ProcurementCore>,
}

impl GoodsReceiptService {
    pub fn new(core: Arc<ProcurementCore>) -> Self {
        Self { core }
    }

    #[instrument(skip(self, ctx, input), fields(tenant_id = %ctx.tenant_id, lines = input.lines.len()))]
    pub async fn receive(
        &self,
        ctx: &RequestContext,
        purchase_order_id: Uuid,
        input: ReceiveGoods,
    ) -> Result<ReceiptOutcome, ServiceError> {
        ctx.require(Permission::ReceiveGoods)?;
        let owned = ctx.clone();
        let outcome = self
            .core
            .perform(ctx, actions::GOODS_RECEIPT_RECEIVE, move |txn| {
                Box::pin(async move { receive_in(txn, &owned, purchase_order_id, input).await })
            })
            .await?;
        info!(
            goods_receipt_id = %outcome.goods_receipt_id,
            sequence = outcome.sequence,
            status = %outcome.status,
            "Lot recorded"
        );
        Ok(outcome)
    }

    #[instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id))]
    pub async fn get(
        &self,
        ctx: &RequestContext,
        goods_receipt_id: Uuid,
    ) -> Result<GoodsReceiptDetail, ServiceError> {
        ctx.require(Permission::Read)?;
        let db = self.core.db();
        let receipt = GoodsReceiptRepository::find(db, ctx.tenant_id, goods_receipt_id, Lock::None)
            .await?
            .ok_or_else(|| ServiceError::not_found("goods receipt", goods_receipt_id))?;
        load_detail(db, receipt).await
    }

    #[instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id))]
    pub async fn find_by_purchase_order(
        &self,
        ctx: &RequestContext,
        purchase_order_id: Uuid,
    ) -> Result<GoodsReceiptDetail, ServiceError> {
        ctx.require(Permission::Read)?;
        let db = self.core.db();
        let receipt = GoodsReceiptRepository::find_by_purchase_order(
            db,
            ctx.tenant_id,
            purchase_order_id,
            Lock::None,
        )
        .await?
        .ok_or_else(|| {
            ServiceError::NotFound(format!(
                "goods receipt for purchase order {} not found",
                purchase_order_id
            ))
        })?;
        load_detail(db, receipt).await
    }
}
