use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "rfq_offers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub rfq_id: Uuid,
    pub rfq_line_id: Uuid,
    pub supplier_name: String,
    pub quoted_price: Decimal,
    pub lead_time_days: i32,
    #[sea_orm(column_type = "Text", nullable)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::rfq::Entity",
        from = "Column::RfqId",
        to = "super::rfq::Column::Id",
        on_delete = "Cascade"
    )]
    Rfq,
    #[sea_orm(
        belongs_to = "super::rfq_line::Entity",
        from = "Column::RfqLineId",
        to = "super::rfq_line::Column::Id",
        on_delete = "Cascade"
    )]
    RfqLine,
}

impl Related<super::rfq::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Rfq.def()
    }
}

impl Related<super::rfq_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RfqLine.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
