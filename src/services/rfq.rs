use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{DatabaseTransaction, Set};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::idempotency::{actions, Transition};
use super::purchase_orders::{insert_order, OrderLineInput, PurchaseOrderDetail};
use super::{trimmed, ProcurementCore};
use crate::auth::{Permission, RequestContext};
use crate::entities::{rfq, rfq_line, rfq_offer, RfqStatus};
use crate::errors::ServiceError;
use crate::events::{AuditAction, AuditEvent};
use crate::notifications::{OutboundDocument, RfqDocument, RfqDocumentLine};
use crate::repositories::{Lock, RfqRepository};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRfqLine {
    pub item: String,
    pub quantity: Decimal,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub estimated_unit_price: Option<Decimal>,
    #[serde(default)]
    pub tax_rate: Option<Decimal>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateRfq {
    #[serde(default)]
    pub suppliers: Vec<String>,
    #[serde(default)]
    pub note: Option<String>,
    pub lines: Vec<NewRfqLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfferInput {
    pub rfq_line_id: Uuid,
    pub supplier_name: String,
    pub quoted_price: Decimal,
    #[serde(default)]
    pub lead_time_days: i32,
    #[serde(default)]
    pub notes: Option<String>,
}

/// The supplier picked for one RFQ line at conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierChoice {
    pub supplier_name: String,
    pub unit_price: Decimal,
    #[serde(default)]
    pub lead_time_days: Option<i32>,
}

impl SupplierChoice {
    pub fn from_offer(offer: &rfq_offer::Model) -> Self {
        Self {
            supplier_name: offer.supplier_name.clone(),
            unit_price: offer.quoted_price,
            lead_time_days: Some(offer.lead_time_days),
        }
    }
}

/// RFQ line id to the supplier chosen for it
pub type Selection = BTreeMap<Uuid, SupplierChoice>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RfqDetail {
    pub rfq: rfq::Model,
    pub lines: Vec<rfq_line::Model>,
    pub offers: Vec<rfq_offer::Model>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RfqSent {
    pub rfq_id: Uuid,
    pub status: RfqStatus,
    pub suppliers: Vec<String>,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OffersRecorded {
    pub rfq_id: Uuid,
    pub offers: Vec<rfq_offer::Model>,
    /// Offers discarded as invalid
    pub dropped: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RfqConversion {
    pub rfq_id: Uuid,
    pub status: RfqStatus,
    pub purchase_orders: Vec<PurchaseOrderDetail>,
}

/// Trims names, drops blanks and keeps the first of any duplicate.
pub fn normalize_suppliers(suppliers: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    suppliers
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(s.to_string()))
        .map(str::to_string)
        .collect()
}

/// Keeps the lines worth quoting, with absent price and tax defaulted to zero.
pub fn normalize_lines(lines: Vec<NewRfqLine>) -> Vec<NewRfqLine> {
    lines
        .into_iter()
        .filter_map(|line| {
            let item = line.item.trim().to_string();
            let price = line.estimated_unit_price.unwrap_or_default();
            let tax = line.tax_rate.unwrap_or_default();
            let valid = !item.is_empty()
                && line.quantity > Decimal::ZERO
                && price >= Decimal::ZERO
                && (Decimal::ZERO..=Decimal::ONE_HUNDRED).contains(&tax);
            valid.then(|| NewRfqLine {
                item,
                quantity: line.quantity,
                unit: trimmed(line.unit),
                estimated_unit_price: Some(price),
                tax_rate: Some(tax),
            })
        })
        .collect()
}

fn offer_is_valid(offer: &OfferInput, line_ids: &HashSet<Uuid>) -> bool {
    line_ids.contains(&offer.rfq_line_id)
        && !offer.supplier_name.trim().is_empty()
        && offer.quoted_price >= Decimal::ZERO
        && offer.lead_time_days >= 0
}

/// Groups the selection by supplier. Suppliers appear in the order their
/// first line appears on the RFQ, and each group keeps RFQ line order.
pub fn group_selection(
    lines: &[rfq_line::Model],
    selection: &Selection,
) -> Result<Vec<(String, Vec<OrderLineInput>)>, ServiceError> {
    if selection.is_empty() {
        return Err(ServiceError::ValidationError(
            "selection must name at least one line".to_string(),
        ));
    }

    let known: HashSet<Uuid> = lines.iter().map(|l| l.id).collect();
    for (line_id, choice) in selection {
        if !known.contains(line_id) {
            return Err(ServiceError::ValidationError(format!(
                "line {} does not belong to this RFQ",
                line_id
            )));
        }
        if choice.supplier_name.trim().is_empty() {
            return Err(ServiceError::ValidationError(format!(
                "no supplier chosen for line {}",
                line_id
            )));
        }
        if choice.unit_price < Decimal::ZERO {
            return Err(ServiceError::ValidationError(format!(
                "price for line {} must not be negative",
                line_id
            )));
        }
    }

    let mut groups: Vec<(String, Vec<OrderLineInput>)> = Vec::new();
    for line in lines {
        let Some(choice) = selection.get(&line.id) else {
            continue;
        };
        let supplier = choice.supplier_name.trim();
        let order_line = OrderLineInput {
            name: line.item.clone(),
            quantity: line.quantity,
            unit: line.unit.clone(),
            unit_price: choice.unit_price,
            tax_rate: line.tax_rate,
            rfq_line_id: Some(line.id),
        };
        match groups.iter_mut().find(|(name, _)| name == supplier) {
            Some((_, group)) => group.push(order_line),
            None => groups.push((supplier.to_string(), vec![order_line])),
        }
    }
    Ok(groups)
}

async fn load_rfq(
    txn: &DatabaseTransaction,
    ctx: &RequestContext,
    rfq_id: Uuid,
) -> Result<rfq::Model, ServiceError> {
    RfqRepository::find(txn, ctx.tenant_id, rfq_id, Lock::ForUpdate)
        .await?
        .ok_or_else(|| ServiceError::not_found("rfq", rfq_id))
}

pub async fn create_in(
    txn: &DatabaseTransaction,
    ctx: &RequestContext,
    input: CreateRfq,
) -> Result<Transition<RfqDetail>, ServiceError> {
    let submitted = input.lines.len();
    let lines = normalize_lines(input.lines);
    if lines.is_empty() {
        return Err(ServiceError::ValidationError(
            "an RFQ needs at least one line with an item and a positive quantity".to_string(),
        ));
    }
    if lines.len() < submitted {
        debug!(dropped = submitted - lines.len(), "Discarded invalid RFQ lines");
    }
    let suppliers = normalize_suppliers(&input.suppliers);

    let now = Utc::now();
    let rfq = RfqRepository::insert(
        txn,
        rfq::ActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(ctx.tenant_id),
            status: Set(RfqStatus::Draft),
            note: Set(trimmed(input.note)),
            suppliers: Set(serde_json::to_value(&suppliers)?),
            created_by: Set(ctx.actor_id),
            created_at: Set(now),
            updated_at: Set(now),
            sent_at: Set(None),
            closed_at: Set(None),
        },
    )
    .await?;

    let mut saved = Vec::with_capacity(lines.len());
    for (position, line) in lines.into_iter().enumerate() {
        let row = RfqRepository::insert_line(
            txn,
            rfq_line::ActiveModel {
                id: Set(Uuid::new_v4()),
                tenant_id: Set(ctx.tenant_id),
                rfq_id: Set(rfq.id),
                position: Set(position as i32 + 1),
                item: Set(line.item),
                quantity: Set(line.quantity),
                unit: Set(line.unit),
                estimated_unit_price: Set(line.estimated_unit_price.unwrap_or_default()),
                tax_rate: Set(line.tax_rate.unwrap_or_default()),
                created_at: Set(now),
            },
        )
        .await?;
        saved.push(row);
    }

    let event = AuditEvent::new(ctx, AuditAction::RfqCreated, rfq.id)
        .after(&rfq)
        .with_metadata(serde_json::json!({ "lines": saved.len() }));

    Ok(Transition::new(RfqDetail {
        rfq,
        lines: saved,
        offers: Vec::new(),
    })
    .audited(event))
}

/// `draft -> sent`, queuing the summary document for every supplier.
pub async fn send_in(
    txn: &DatabaseTransaction,
    ctx: &RequestContext,
    rfq_id: Uuid,
) -> Result<Transition<RfqSent>, ServiceError> {
    let rfq = load_rfq(txn, ctx, rfq_id).await?;
    if rfq.status != RfqStatus::Draft {
        return Err(ServiceError::StateConflict(format!(
            "rfq {} is {}; only draft RFQs can be sent",
            rfq.id, rfq.status
        )));
    }

    let suppliers = rfq.supplier_names();
    if suppliers.is_empty() {
        return Err(ServiceError::ValidationError(
            "an RFQ without suppliers cannot be sent".to_string(),
        ));
    }

    let lines = RfqRepository::lines(txn, ctx.tenant_id, rfq.id).await?;
    let now = Utc::now();
    let before = rfq.clone();
    let mut active: rfq::ActiveModel = rfq.into();
    active.status = Set(RfqStatus::Sent);
    active.sent_at = Set(Some(now));
    active.updated_at = Set(now);
    let sent = RfqRepository::update(txn, active).await?;

    let document = RfqDocument {
        tenant_id: ctx.tenant_id,
        rfq_id: sent.id,
        note: sent.note.clone(),
        suppliers: suppliers.clone(),
        lines: lines
            .iter()
            .map(|l| RfqDocumentLine {
                item: l.item.clone(),
                quantity: l.quantity,
                unit: l.unit.clone(),
            })
            .collect(),
        sent_at: now,
    };

    let event = AuditEvent::new(ctx, AuditAction::RfqSent, sent.id)
        .before(&before)
        .after(&sent);

    Ok(Transition::new(RfqSent {
        rfq_id: sent.id,
        status: sent.status,
        suppliers,
        sent_at: now,
    })
    .audited(event)
    .with_document(OutboundDocument::Rfq(document)))
}

pub async fn record_offers_in(
    txn: &DatabaseTransaction,
    ctx: &RequestContext,
    rfq_id: Uuid,
    offers: Vec<OfferInput>,
) -> Result<Transition<OffersRecorded>, ServiceError> {
    let rfq = load_rfq(txn, ctx, rfq_id).await?;
    if rfq.status != RfqStatus::Sent {
        return Err(ServiceError::StateConflict(format!(
            "rfq {} is {}; offers are recorded on sent RFQs only",
            rfq.id, rfq.status
        )));
    }

    let line_ids: HashSet<Uuid> = RfqRepository::lines(txn, ctx.tenant_id, rfq.id)
        .await?
        .into_iter()
        .map(|l| l.id)
        .collect();

    let submitted = offers.len();
    let valid: Vec<OfferInput> = offers
        .into_iter()
        .filter(|o| offer_is_valid(o, &line_ids))
        .collect();
    if valid.is_empty() {
        return Err(ServiceError::ValidationError(
            "no valid offer to record".to_string(),
        ));
    }
    let dropped = submitted - valid.len();

    let now = Utc::now();
    let mut saved = Vec::with_capacity(valid.len());
    for offer in valid {
        let row = RfqRepository::insert_offer(
            txn,
            rfq_offer::ActiveModel {
                id: Set(Uuid::new_v4()),
                tenant_id: Set(ctx.tenant_id),
                rfq_id: Set(rfq.id),
                rfq_line_id: Set(offer.rfq_line_id),
                supplier_name: Set(offer.supplier_name.trim().to_string()),
                quoted_price: Set(offer.quoted_price),
                lead_time_days: Set(offer.lead_time_days),
                notes: Set(trimmed(offer.notes)),
                created_at: Set(now),
            },
        )
        .await?;
        saved.push(row);
    }

    let event = AuditEvent::new(ctx, AuditAction::RfqOffersRecorded, rfq.id).with_metadata(
        serde_json::json!({
            "recorded": saved.len(),
            "dropped": dropped,
        }),
    );

    Ok(Transition::new(OffersRecorded {
        rfq_id: rfq.id,
        offers: saved,
        dropped,
    })
    .audited(event))
}

/// Creates one purchase order per chosen supplier and closes the RFQ.
pub async fn convert_in(
    txn: &DatabaseTransaction,
    ctx: &RequestContext,
    rfq_id: Uuid,
    selection: Selection,
) -> Result<Transition<RfqConversion>, ServiceError> {
    let rfq = load_rfq(txn, ctx, rfq_id).await?;
    if rfq.status == RfqStatus::Closed {
        return Err(ServiceError::StateConflict(format!(
            "rfq {} is already closed",
            rfq.id
        )));
    }

    let lines = RfqRepository::lines(txn, ctx.tenant_id, rfq.id).await?;
    let groups = group_selection(&lines, &selection)?;

    let mut transition_events = Vec::with_capacity(groups.len() + 1);
    let mut orders = Vec::with_capacity(groups.len());
    for (supplier, order_lines) in &groups {
        let detail = insert_order(txn, ctx, Some(rfq.id), supplier, rfq.note.clone(), order_lines)
            .await?;
        transition_events.push(
            AuditEvent::new(ctx, AuditAction::PurchaseOrderCreated, detail.purchase_order.id)
                .after(&detail.purchase_order)
                .with_metadata(serde_json::json!({ "rfq_id": rfq.id })),
        );
        orders.push(detail);
    }

    let now = Utc::now();
    let before = rfq.clone();
    let mut active: rfq::ActiveModel = rfq.into();
    active.status = Set(RfqStatus::Closed);
    active.closed_at = Set(Some(now));
    active.updated_at = Set(now);
    let closed = RfqRepository::update(txn, active).await?;

    let lead_times: HashMap<String, Option<i32>> = selection
        .iter()
        .map(|(line_id, choice)| (line_id.to_string(), choice.lead_time_days))
        .collect();
    transition_events.insert(
        0,
        AuditEvent::new(ctx, AuditAction::RfqConverted, closed.id)
            .before(&before)
            .after(&closed)
            .with_metadata(serde_json::json!({
                "purchase_order_ids": orders
                    .iter()
                    .map(|o| o.purchase_order.id)
                    .collect::<Vec<_>>(),
                "lead_time_days": lead_times,
            })),
    );

    let mut transition = Transition::new(RfqConversion {
        rfq_id: closed.id,
        status: closed.status,
        purchase_orders: orders,
    });
    transition.audit = transition_events;
    Ok(transition)
}

/// RFQ manager
#[derive(Debug, Clone)]
pub struct RfqService {
    core: Arc<ProcurementCore>,
}

impl RfqService {
    pub fn new(core: Arc<ProcurementCore>) -> Self {
        Self { core }
    }

    #[instrument(skip(self, ctx, input), fields(tenant_id = %ctx.tenant_id))]
    pub async fn create(
        &self,
        ctx: &RequestContext,
        input: CreateRfq,
    ) -> Result<RfqDetail, ServiceError> {
        ctx.require(Permission::ManageRfqs)?;
        let owned = ctx.clone();
        let detail = self
            .core
            .perform(ctx, actions::RFQ_CREATE, move |txn| {
                Box::pin(async move { create_in(txn, &owned, input).await })
            })
            .await?;
        info!(rfq_id = %detail.rfq.id, lines = detail.lines.len(), "RFQ created");
        Ok(detail)
    }

    #[instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id))]
    pub async fn send(&self, ctx: &RequestContext, rfq_id: Uuid) -> Result<RfqSent, ServiceError> {
        ctx.require(Permission::ManageRfqs)?;
        let owned = ctx.clone();
        let sent = self
            .core
            .perform(ctx, actions::RFQ_SEND, move |txn| {
                Box::pin(async move { send_in(txn, &owned, rfq_id).await })
            })
            .await?;
        info!(suppliers = sent.suppliers.len(), "RFQ sent");
        Ok(sent)
    }

    #[instrument(skip(self, ctx, offers), fields(tenant_id = %ctx.tenant_id, submitted = offers.len()))]
    pub async fn record_offers(
        &self,
        ctx: &RequestContext,
        rfq_id: Uuid,
        offers: Vec<OfferInput>,
    ) -> Result<OffersRecorded, ServiceError> {
        ctx.require(Permission::ManageRfqs)?;
        let owned = ctx.clone();
        self.core
            .perform(ctx, actions::RFQ_RECORD_OFFERS, move |txn| {
                Box::pin(async move { record_offers_in(txn, &owned, rfq_id, offers).await })
            })
            .await
    }

    #[instrument(skip(self, ctx, selection), fields(tenant_id = %ctx.tenant_id, selected = selection.len()))]
    pub async fn convert(
        &self,
        ctx: &RequestContext,
        rfq_id: Uuid,
        selection: Selection,
    ) -> Result<RfqConversion, ServiceError> {
        ctx.require(Permission::CreatePurchaseOrders)?;
        let owned = ctx.clone();
        let conversion = self
            .core
            .perform(ctx, actions::RFQ_CONVERT, move |txn| {
                Box::pin(async move { convert_in(txn, &owned, rfq_id, selection).await })
            })
            .await?;
        info!(
            purchase_orders = conversion.purchase_orders.len(),
            "RFQ converted"
        );
        Ok(conversion)
    }

    #[instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id))]
    pub async fn get(&self, ctx: &RequestContext, rfq_id: Uuid) -> Result<RfqDetail, ServiceError> {
        ctx.require(Permission::Read)?;
        let db = self.core.db();
        let rfq = RfqRepository::find(db, ctx.tenant_id, rfq_id, Lock::None)
            .await?
            .ok_or_else(|| ServiceError::not_found("rfq", rfq_id))?;
        let lines = RfqRepository::lines(db, ctx.tenant_id, rfq.id).await?;
        let offers = RfqRepository::offers(db, ctx.tenant_id, rfq.id).await?;
        Ok(RfqDetail { rfq, lines, offers })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    fn rfq_line(item: &str, quantity: Decimal, tax_rate: Decimal) -> rfq_line::Model {
        rfq_line::Model {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            rfq_id: Uuid::nil(),
            position: 1,
            item: item.into(),
            quantity,
            unit: None,
            estimated_unit_price: dec!(0),
            tax_rate,
            created_at: Utc::now(),
        }
    }

    fn choice(supplier: &str, price: Decimal) -> SupplierChoice {
        SupplierChoice {
            supplier_name: supplier.into(),
            unit_price: price,
            lead_time_days: None,
        }
    }

    #[test]
    fn suppliers_are_trimmed_and_deduplicated() {
        let raw = vec![
            " Acme ".to_string(),
            "".to_string(),
            "Globex".to_string(),
            "Acme".to_string(),
            "   ".to_string(),
        ];
        assert_eq!(normalize_suppliers(&raw), vec!["Acme", "Globex"]);
    }

    #[test]
    fn invalid_lines_are_dropped_and_defaults_applied() {
        let line = |item: &str, qty: Decimal, price: Option<Decimal>, tax: Option<Decimal>| NewRfqLine {
            item: item.into(),
            quantity: qty,
            unit: None,
            estimated_unit_price: price,
            tax_rate: tax,
        };
        let kept = normalize_lines(vec![
            line("  Bolts ", dec!(10), None, None),
            line("", dec!(1), None, None),
            line("Nuts", dec!(0), None, None),
            line("Washers", dec!(5), Some(dec!(-1)), None),
            line("Rivets", dec!(5), None, Some(dec!(120))),
            line("Screws", dec!(2), Some(dec!(0.5)), Some(dec!(20))),
        ]);

        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].item, "Bolts");
        assert_eq!(kept[0].estimated_unit_price, Some(dec!(0)));
        assert_eq!(kept[0].tax_rate, Some(dec!(0)));
        assert_eq!(kept[1].item, "Screws");
    }

    #[test]
    fn selection_groups_by_supplier_in_line_order() {
        let a = rfq_line("Bolts", dec!(10), dec!(20));
        let b = rfq_line("Nuts", dec!(4), dec!(20));
        let c = rfq_line("Washers", dec!(2), dec!(0));
        let selection = Selection::from([
            (a.id, choice("Acme", dec!(1.5))),
            (b.id, choice("Globex", dec!(2))),
            (c.id, choice(" Acme ", dec!(3))),
        ]);

        let groups = group_selection(&[a.clone(), b.clone(), c.clone()], &selection).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, "Acme");
        assert_eq!(
            groups[0].1.iter().map(|l| l.rfq_line_id).collect::<Vec<_>>(),
            vec![Some(a.id), Some(c.id)]
        );
        assert_eq!(groups[0].1[0].unit_price, dec!(1.5));
        assert_eq!(groups[1].0, "Globex");
    }

    #[test]
    fn bad_selections_are_rejected() {
        let a = rfq_line("Bolts", dec!(10), dec!(20));
        let lines = [a.clone()];

        assert_matches!(
            group_selection(&lines, &Selection::new()),
            Err(ServiceError::ValidationError(_))
        );
        assert_matches!(
            group_selection(&lines, &Selection::from([(Uuid::new_v4(), choice("Acme", dec!(1)))])),
            Err(ServiceError::ValidationError(_))
        );
        assert_matches!(
            group_selection(&lines, &Selection::from([(a.id, choice("  ", dec!(1)))])),
            Err(ServiceError::ValidationError(_))
        );
        assert_matches!(
            group_selection(&lines, &Selection::from([(a.id, choice("Acme", dec!(-1)))])),
            Err(ServiceError::ValidationError(_))
        );
    }

    #[test]
    fn offers_for_foreign_lines_are_invalid() {
        let own = Uuid::new_v4();
        let ids = HashSet::from([own]);
        let offer = |line: Uuid, supplier: &str, price: Decimal| OfferInput {
            rfq_line_id: line,
            supplier_name: supplier.into(),
            quoted_price: price,
            lead_time_days: 3,
            notes: None,
        };

        assert!(offer_is_valid(&offer(own, "Acme", dec!(2)), &ids));
        assert!(!offer_is_valid(&offer(Uuid::new_v4(), "Acme", dec!(2)), &ids));
        assert!(!offer_is_valid(&offer(own, " ", dec!(2)), &ids));
        assert!(!offer_is_valid(&offer(own, "Acme", dec!(-2)), &ids));
    }
}
