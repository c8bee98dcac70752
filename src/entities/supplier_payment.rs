use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaymentMethod {
    #[sea_orm(string_value = "bank_transfer")]
    BankTransfer,
    #[sea_orm(string_value = "card")]
    Card,
    #[sea_orm(string_value = "cheque")]
    Cheque,
    #[sea_orm(string_value = "cash")]
    Cash,
    #[sea_orm(string_value = "direct_debit")]
    DirectDebit,
    #[sea_orm(string_value = "other")]
    Other,
}

/// Append-only payment applied to a supplier invoice.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "supplier_payments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub supplier_invoice_id: Uuid,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub reference: String,
    pub paid_at: DateTime<Utc>,
    pub recorded_by: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::supplier_invoice::Entity",
        from = "Column::SupplierInvoiceId",
        to = "super::supplier_invoice::Column::Id",
        on_delete = "Restrict"
    )]
    SupplierInvoice,
}

impl Related<super::supplier_invoice::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SupplierInvoice.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
