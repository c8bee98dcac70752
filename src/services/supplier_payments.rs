use chrono::{DateTime, Datelike, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use rust_decimal::Decimal;
use sea_orm::{DatabaseTransaction, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::idempotency::{actions, Transition};
use super::{trimmed, ProcurementCore};
use crate::auth::{Permission, RequestContext};
use crate::config::ProcurementConfig;
use crate::entities::{supplier_invoice, supplier_payment, PaymentMethod, SupplierInvoiceStatus};
use crate::errors::ServiceError;
use crate::events::{AuditAction, AuditEvent};
use crate::repositories::{Lock, SupplierInvoiceRepository, SupplierPaymentRepository};

const RANDOM_SUFFIX_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordPayment {
    pub amount: Decimal,
    pub method: PaymentMethod,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub paid_at: Option<DateTime<Utc>>,
}

impl RecordPayment {
    pub fn new(amount: Decimal, method: PaymentMethod) -> Self {
        Self {
            amount,
            method,
            reference: None,
            paid_at: None,
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecorded {
    pub payment: supplier_payment::Model,
    pub invoice_id: Uuid,
    pub status: SupplierInvoiceStatus,
    pub amount_paid: Decimal,
    pub balance_due: Decimal,
}

fn random_reference(prefix: &str, year: i32) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(RANDOM_SUFFIX_LEN)
        .map(|b| char::from(b).to_ascii_uppercase())
        .collect();
    format!("{}-{}-{}", prefix, year, suffix)
}

fn fallback_reference(prefix: &str, now: DateTime<Utc>) -> String {
    format!("{}-{}-{}", prefix, now.year(), now.timestamp_micros())
}

/// Picks an unused reference for the tenant, falling back to a timestamp-derived
/// one once the retry budget is spent.
async fn generate_reference(
    txn: &DatabaseTransaction,
    tenant_id: Uuid,
    settings: &ProcurementConfig,
) -> Result<String, ServiceError> {
    let now = Utc::now();
    for _ in 0..settings.reference_retry_budget {
        let candidate = random_reference(&settings.payment_reference_prefix, now.year());
        if !SupplierPaymentRepository::reference_exists(txn, tenant_id, &candidate).await? {
            return Ok(candidate);
        }
    }
    warn!(
        attempts = settings.reference_retry_budget,
        "Random payment references exhausted; using timestamp fallback"
    );
    Ok(fallback_reference(&settings.payment_reference_prefix, now))
}

/// Applies a payment to a posted invoice and settles it once fully paid.
pub async fn record_in(
    txn: &DatabaseTransaction,
    ctx: &RequestContext,
    invoice_id: Uuid,
    input: RecordPayment,
    settings: &ProcurementConfig,
) -> Result<Transition<PaymentRecorded>, ServiceError> {
    if input.amount <= Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "payment amount must be positive".to_string(),
        ));
    }

    let invoice = SupplierInvoiceRepository::find(txn, ctx.tenant_id, invoice_id, Lock::ForUpdate)
        .await?
        .ok_or_else(|| ServiceError::not_found("supplier invoice", invoice_id))?;

    match invoice.status {
        SupplierInvoiceStatus::Posted => {}
        other => {
            return Err(ServiceError::StateConflict(format!(
                "invoice {} is {}; payments apply to posted invoices only",
                invoice.id, other
            )))
        }
    }

    let paid_so_far = SupplierPaymentRepository::total_paid(txn, ctx.tenant_id, invoice.id).await?;
    let remaining = invoice.total_ttc - paid_so_far;
    if input.amount > remaining {
        return Err(ServiceError::ValidationError(format!(
            "payment of {} exceeds the remaining balance of {}",
            input.amount,
            remaining.max(Decimal::ZERO)
        )));
    }

    let reference = match trimmed(input.reference) {
        Some(supplied) => {
            if SupplierPaymentRepository::reference_exists(txn, ctx.tenant_id, &supplied).await? {
                return Err(ServiceError::Conflict(format!(
                    "payment reference {} is already in use",
                    supplied
                )));
            }
            supplied
        }
        None => generate_reference(txn, ctx.tenant_id, settings).await?,
    };

    let now = Utc::now();
    let payment = SupplierPaymentRepository::insert(
        txn,
        supplier_payment::ActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(ctx.tenant_id),
            supplier_invoice_id: Set(invoice.id),
            amount: Set(input.amount),
            method: Set(input.method),
            reference: Set(reference.clone()),
            paid_at: Set(input.paid_at.unwrap_or(now)),
            recorded_by: Set(ctx.actor_id),
            created_at: Set(now),
        },
    )
    .await
    .map_err(|e| {
        let err = ServiceError::from(e);
        if err.is_unique_violation() {
            ServiceError::Conflict(format!("payment reference {} is already in use", reference))
        } else {
            err
        }
    })?;

    let amount_paid = paid_so_far + payment.amount;
    let previous_status = invoice.status;
    let total = invoice.total_ttc;
    let mut active: supplier_invoice::ActiveModel = invoice.into();
    active.amount_paid = Set(amount_paid);
    active.updated_at = Set(now);
    if amount_paid >= total {
        active.status = Set(SupplierInvoiceStatus::Paid);
        active.paid_at = Set(Some(now));
    }
    let updated = SupplierInvoiceRepository::update(txn, active).await?;

    let event = AuditEvent::new(ctx, AuditAction::SupplierPaymentRecorded, payment.id)
        .after(&payment)
        .with_metadata(serde_json::json!({
            "supplier_invoice_id": updated.id,
            "previous_status": previous_status,
            "status": updated.status,
            "amount_paid": amount_paid,
        }));

    Ok(Transition::new(PaymentRecorded {
        invoice_id: updated.id,
        status: updated.status,
        balance_due: updated.balance_due(),
        amount_paid,
        payment,
    })
    .audited(event))
}

/// Payment applicator
#[derive(Debug, Clone)]
pub struct SupplierPaymentService {
    core: Arc<ProcurementCore>,
}

impl SupplierPaymentService {
    pub fn new(core: Arc<ProcurementCore>) -> Self {
        Self { core }
    }

    #[instrument(skip(self, ctx, input), fields(tenant_id = %ctx.tenant_id, method = %input.method))]
    pub async fn record(
        &self,
        ctx: &RequestContext,
        invoice_id: Uuid,
        input: RecordPayment,
    ) -> Result<PaymentRecorded, ServiceError> {
        ctx.require(Permission::RecordSupplierPayments)?;
        let owned = ctx.clone();
        let settings = self.core.settings().clone();
        let recorded = self
            .core
            .perform(ctx, actions::SUPPLIER_PAYMENT_RECORD, move |txn| {
                Box::pin(async move { record_in(txn, &owned, invoice_id, input, &settings).await })
            })
            .await?;
        info!(
            reference = %recorded.payment.reference,
            status = %recorded.status,
            balance_due = %recorded.balance_due,
            "Supplier payment recorded"
        );
        Ok(recorded)
    }

    #[instrument(skip(self, ctx), fields(tenant_id = %ctx.tenant_id))]
    pub async fn list_for_invoice(
        &self,
        ctx: &RequestContext,
        invoice_id: Uuid,
    ) -> Result<Vec<supplier_payment::Model>, ServiceError> {
        ctx.require(Permission::Read)?;
        let db = self.core.db();
        SupplierInvoiceRepository::find(db, ctx.tenant_id, invoice_id, Lock::None)
            .await?
            .ok_or_else(|| ServiceError::not_found("supplier invoice", invoice_id))?;
        Ok(SupplierPaymentRepository::list_for_invoice(db, ctx.tenant_id, invoice_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_references_follow_the_format() {
        let reference = random_reference("PAY", 2024);
        let parts: Vec<&str> = reference.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "PAY");
        assert_eq!(parts[1], "2024");
        assert_eq!(parts[2].len(), RANDOM_SUFFIX_LEN);
        assert!(parts[2]
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[test]
    fn fallback_reference_is_timestamp_derived() {
        let now = Utc::now();
        let reference = fallback_reference("PAY", now);
        assert_eq!(
            reference,
            format!("PAY-{}-{}", now.year(), now.timestamp_micros())
        );
    }

    #[test]
    fn payment_requests_deserialize_method_names() {
        let request: RecordPayment = serde_json::from_value(serde_json::json!({
            "amount": "120.50",
            "method": "bank_transfer",
        }))
        .unwrap();
        assert_eq!(request.method, PaymentMethod::BankTransfer);
        assert!(request.reference.is_none());
    }
}
