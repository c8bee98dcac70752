use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SupplierInvoiceStatus {
    #[sea_orm(string_value = "draft")]
    Draft,
    #[sea_orm(string_value = "posted")]
    Posted,
    #[sea_orm(string_value = "paid")]
    Paid,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

/// Supplier invoice, at most one per purchase order. Totals mirror the order.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "supplier_invoices")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub purchase_order_id: Uuid,
    pub goods_receipt_id: Uuid,
    pub status: SupplierInvoiceStatus,
    /// Sequential number, assigned when the invoice is posted
    pub number: Option<String>,
    /// The supplier's own document number
    pub supplier_number: Option<String>,
    pub invoice_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    #[sea_orm(column_type = "Text", nullable)]
    pub note: Option<String>,
    pub attachment_ref: Option<String>,
    pub total_ht: Decimal,
    pub total_tax: Decimal,
    pub total_ttc: Decimal,
    pub amount_paid: Decimal,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub posted_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Model {
    pub fn balance_due(&self) -> Decimal {
        (self.total_ttc - self.amount_paid).max(Decimal::ZERO)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::purchase_order::Entity",
        from = "Column::PurchaseOrderId",
        to = "super::purchase_order::Column::Id",
        on_delete = "Restrict"
    )]
    PurchaseOrder,
    #[sea_orm(
        belongs_to = "super::goods_receipt::Entity",
        from = "Column::GoodsReceiptId",
        to = "super::goods_receipt::Column::Id",
        on_delete = "Restrict"
    )]
    GoodsReceipt,
    #[sea_orm(has_many = "super::supplier_invoice_line::Entity")]
    Lines,
    #[sea_orm(has_many = "super::supplier_payment::Entity")]
    Payments,
}

impl Related<super::purchase_order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PurchaseOrder.def()
    }
}

impl Related<super::supplier_invoice_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Lines.def()
    }
}

impl Related<super::supplier_payment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
