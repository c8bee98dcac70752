use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One immutable lot recorded against a goods receipt.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "goods_receipt_entries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub goods_receipt_id: Uuid,
    /// 1-based lot number within the receipt
    pub sequence: i32,
    #[sea_orm(column_type = "Text", nullable)]
    pub note: Option<String>,
    pub received_by: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::goods_receipt::Entity",
        from = "Column::GoodsReceiptId",
        to = "super::goods_receipt::Column::Id",
        on_delete = "Cascade"
    )]
    GoodsReceipt,
    #[sea_orm(has_many = "super::goods_receipt_entry_line::Entity")]
    Lines,
}

impl Related<super::goods_receipt::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::GoodsReceipt.def()
    }
}

impl Related<super::goods_receipt_entry_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Lines.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
