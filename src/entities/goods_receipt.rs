use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Aggregate receipt status derived from line-level completion.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GoodsReceiptStatus {
    #[sea_orm(string_value = "not_received")]
    NotReceived,
    #[sea_orm(string_value = "partial")]
    Partial,
    #[sea_orm(string_value = "received")]
    Received,
}

impl GoodsReceiptStatus {
    /// Position along `not_received -> partial -> received`; status only moves forward.
    pub fn rank(self) -> u8 {
        match self {
            GoodsReceiptStatus::NotReceived => 0,
            GoodsReceiptStatus::Partial => 1,
            GoodsReceiptStatus::Received => 2,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "goods_receipts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    #[sea_orm(unique)]
    pub purchase_order_id: Uuid,
    pub status: GoodsReceiptStatus,
    #[sea_orm(column_type = "Text", nullable)]
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
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
    #[sea_orm(has_many = "super::goods_receipt_entry::Entity")]
    Entries,
}

impl Related<super::purchase_order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PurchaseOrder.def()
    }
}

impl Related<super::goods_receipt_entry::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Entries.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::GoodsReceiptStatus;

    #[test]
    fn ranks_follow_lifecycle() {
        assert!(GoodsReceiptStatus::NotReceived.rank() < GoodsReceiptStatus::Partial.rank());
        assert!(GoodsReceiptStatus::Partial.rank() < GoodsReceiptStatus::Received.rank());
        assert_eq!(GoodsReceiptStatus::NotReceived.to_string(), "not_received");
    }
}
