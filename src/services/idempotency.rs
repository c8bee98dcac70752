use chrono::Utc;
use futures::future::BoxFuture;
use metrics::counter;
use sea_orm::{DatabaseTransaction, Set};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::RequestContext;
use crate::db::{self, DbPool};
use crate::entities::idempotency_record;
use crate::errors::ServiceError;
use crate::events::AuditEvent;
use crate::notifications::OutboundDocument;
use crate::repositories::IdempotencyRepository;

/// Action names scoping idempotency keys. A key reused under a different
/// action executes independently.
pub mod actions {
    pub const RFQ_CREATE: &str = "rfq.create";
    pub const RFQ_SEND: &str = "rfq.send";
    pub const RFQ_RECORD_OFFERS: &str = "rfq.record_offers";
    pub const RFQ_CONVERT: &str = "rfq.convert";
    pub const PURCHASE_ORDER_CREATE: &str = "purchase_order.create";
    pub const PURCHASE_ORDER_CONFIRM: &str = "purchase_order.confirm";
    pub const PURCHASE_ORDER_SEND: &str = "purchase_order.send";
    pub const GOODS_RECEIPT_RECEIVE: &str = "goods_receipt.receive";
    pub const SUPPLIER_INVOICE_CREATE: &str = "supplier_invoice.create";
    pub const SUPPLIER_INVOICE_SET_STATUS: &str = "supplier_invoice.set_status";
    pub const SUPPLIER_PAYMENT_RECORD: &str = "supplier_payment.record";
}

/// Result of a committed mutation plus the side effects it owes once the
/// transaction is durable. Only `response` is stored for replay, so a replayed
/// call carries no audit events and no documents.
#[derive(Debug, Serialize, Deserialize)]
pub struct Transition<R> {
    pub response: R,
    #[serde(skip)]
    pub audit: Vec<AuditEvent>,
    #[serde(skip)]
    pub documents: Vec<OutboundDocument>,
}

impl<R> Transition<R> {
    pub fn new(response: R) -> Self {
        Self {
            response,
            audit: Vec::new(),
            documents: Vec::new(),
        }
    }

    pub fn audited(mut self, event: AuditEvent) -> Self {
        self.audit.push(event);
        self
    }

    pub fn with_document(mut self, document: OutboundDocument) -> Self {
        self.documents.push(document);
        self
    }
}

/// Value returned by [`IdempotencyGuard::run`]
#[derive(Debug)]
pub struct Guarded<T> {
    pub value: T,
    /// True when `value` is the stored response of an earlier execution
    pub replayed: bool,
}

/// Runs a unit of work in one transaction and, when the caller supplied a
/// key, commits the serialized response alongside it.
#[derive(Debug, Clone)]
pub struct IdempotencyGuard {
    max_key_len: usize,
}

impl IdempotencyGuard {
    pub fn new(max_key_len: usize) -> Self {
        Self { max_key_len }
    }

    /// Blank keys count as absent; surrounding whitespace is ignored.
    pub fn normalize_key(&self, key: Option<&str>) -> Result<Option<String>, ServiceError> {
        let Some(key) = key.map(str::trim).filter(|k| !k.is_empty()) else {
            return Ok(None);
        };

        if key.chars().count() > self.max_key_len {
            return Err(ServiceError::ValidationError(format!(
                "idempotency key exceeds {} characters",
                self.max_key_len
            )));
        }

        Ok(Some(key.to_string()))
    }

    pub async fn run<T, F>(
        &self,
        pool: &DbPool,
        ctx: &RequestContext,
        action: &str,
        work: F,
    ) -> Result<Guarded<T>, ServiceError>
    where
        T: Serialize + DeserializeOwned + Send,
        F: for<'c> FnOnce(&'c DatabaseTransaction) -> BoxFuture<'c, Result<T, ServiceError>>
            + Send,
    {
        let key = self.normalize_key(ctx.idempotency_key.as_deref())?;
        let txn = db::begin_transaction(pool).await?;

        let Some(key) = key else {
            let outcome = work(&txn).await;
            return match outcome {
                Ok(value) => {
                    db::commit(txn).await?;
                    Ok(Guarded {
                        value,
                        replayed: false,
                    })
                }
                Err(e) => {
                    db::rollback(txn).await;
                    Err(e)
                }
            };
        };

        let stored = match IdempotencyRepository::find(&txn, ctx.tenant_id, &key, action).await {
            Ok(stored) => stored,
            Err(e) => {
                db::rollback(txn).await;
                return Err(e.into());
            }
        };
        if let Some(record) = stored {
            db::rollback(txn).await;
            return Self::replay(record);
        }

        let value = match work(&txn).await {
            Ok(value) => value,
            Err(e) => {
                db::rollback(txn).await;
                // A concurrent request with the same key may have won the race;
                // its stored response takes precedence over our failure.
                return self.replay_or(pool, ctx, &key, action, e).await;
            }
        };

        let response = match serde_json::to_value(&value) {
            Ok(response) => response,
            Err(e) => {
                db::rollback(txn).await;
                return Err(e.into());
            }
        };

        let record = idempotency_record::ActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(ctx.tenant_id),
            client_key: Set(key.clone()),
            action: Set(action.to_string()),
            response: Set(response),
            created_at: Set(Utc::now()),
        };

        if let Err(e) = IdempotencyRepository::insert(&txn, record).await {
            db::rollback(txn).await;
            return self.replay_or(pool, ctx, &key, action, e.into()).await;
        }

        if let Err(e) = db::commit(txn).await {
            return self.replay_or(pool, ctx, &key, action, e.into()).await;
        }

        debug!(tenant_id = %ctx.tenant_id, action, "Idempotency record stored");
        Ok(Guarded {
            value,
            replayed: false,
        })
    }

    async fn replay_or<T: DeserializeOwned>(
        &self,
        pool: &DbPool,
        ctx: &RequestContext,
        key: &str,
        action: &str,
        error: ServiceError,
    ) -> Result<Guarded<T>, ServiceError> {
        match IdempotencyRepository::find(pool, ctx.tenant_id, key, action).await {
            Ok(Some(record)) => {
                info!(
                    tenant_id = %ctx.tenant_id,
                    action,
                    error = %error,
                    "Lost idempotency race; returning the stored response"
                );
                Self::replay(record)
            }
            Ok(None) => Err(error),
            Err(lookup) => {
                warn!(error = %lookup, "Idempotency lookup after failure also failed");
                Err(error)
            }
        }
    }

    fn replay<T: DeserializeOwned>(
        record: idempotency_record::Model,
    ) -> Result<Guarded<T>, ServiceError> {
        counter!("procure_pay.idempotency.replayed", 1, "action" => record.action.clone());
        debug!(action = %record.action, "Replaying stored response");
        let value = serde_json::from_value(record.response)?;
        Ok(Guarded {
            value,
            replayed: true,
        })
    }
}
