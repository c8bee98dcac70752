//! Tenant-scoped data access. Every query takes the tenant id as its leading
//! filter and runs on whatever connection it is handed, so the same functions
//! serve reads on the pool and locked reads inside a transaction.

pub mod document_sequence_repository;
pub mod goods_receipt_repository;
pub mod idempotency_repository;
pub mod purchase_order_repository;
pub mod rfq_repository;
pub mod supplier_invoice_repository;
pub mod supplier_payment_repository;

pub use document_sequence_repository::DocumentSequenceRepository;
pub use goods_receipt_repository::GoodsReceiptRepository;
pub use idempotency_repository::IdempotencyRepository;
pub use purchase_order_repository::PurchaseOrderRepository;
pub use rfq_repository::RfqRepository;
pub use supplier_invoice_repository::SupplierInvoiceRepository;
pub use supplier_payment_repository::SupplierPaymentRepository;

/// Whether a read should take a row lock (`SELECT ... FOR UPDATE`).
///
/// SQLite has no row locks; its writer lock already serializes the transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lock {
    None,
    ForUpdate,
}

pub(crate) fn apply_lock<Q: sea_orm::QuerySelect>(query: Q, lock: Lock) -> Q {
    match lock {
        Lock::None => query,
        Lock::ForUpdate => query.lock_exclusive(),
    }
}
