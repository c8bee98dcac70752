use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Mirror of a purchase order line taken when the invoice is created.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "supplier_invoice_lines")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub supplier_invoice_id: Uuid,
    pub purchase_order_line_id: Uuid,
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
        belongs_to = "super::supplier_invoice::Entity",
        from = "Column::SupplierInvoiceId",
        to = "super::supplier_invoice::Column::Id",
        on_delete = "Cascade"
    )]
    SupplierInvoice,
}

impl Related<super::supplier_invoice::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SupplierInvoice.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
