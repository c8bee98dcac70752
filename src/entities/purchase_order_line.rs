use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// An ordered line. Immutable once its purchase order exists.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "purchase_order_lines")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub purchase_order_id: Uuid,
    /// RFQ line this order line was converted from
    pub rfq_line_id: Option<Uuid>,
    pub position: i32,
    pub name: String,
    pub quantity: Decimal,
    pub unit: Option<String>,
    pub unit_price: Decimal,
    pub tax_rate: Decimal,
    pub total_ht: Decimal,
    pub total_tax: Decimal,
    pub total_ttc: Decimal,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::purchase_order::Entity",
        from = "Column::PurchaseOrderId",
        to = "super::purchase_order::Column::Id",
        on_delete = "Cascade"
    )]
    PurchaseOrder,
    #[sea_orm(has_many = "super::goods_receipt_entry_line::Entity")]
    ReceiptLines,
}

impl Related<super::purchase_order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PurchaseOrder.def()
    }
}

impl Related<super::goods_receipt_entry_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ReceiptLines.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
