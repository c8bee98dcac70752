// Request for quotation
pub mod rfq;
pub mod rfq_line;
pub mod rfq_offer;

// Ordering and receiving
pub mod goods_receipt;
pub mod goods_receipt_entry;
pub mod goods_receipt_entry_line;
pub mod purchase_order;
pub mod purchase_order_line;

// Payables
pub mod supplier_invoice;
pub mod supplier_invoice_line;
pub mod supplier_payment;

// Bookkeeping
pub mod document_sequence;
pub mod idempotency_record;

pub use goods_receipt::GoodsReceiptStatus;
pub use purchase_order::PurchaseOrderStatus;
pub use rfq::RfqStatus;
pub use supplier_invoice::SupplierInvoiceStatus;
pub use supplier_payment::PaymentMethod;
