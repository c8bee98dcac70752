use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
};
use uuid::Uuid;

use super::{apply_lock, Lock};
use crate::entities::{rfq, rfq_line, rfq_offer};

/// Repository for RFQs, their lines and collected offers
#[derive(Debug, Clone, Copy, Default)]
pub struct RfqRepository;

impl RfqRepository {
    pub async fn find<C: ConnectionTrait>(
        conn: &C,
        tenant_id: Uuid,
        id: Uuid,
        lock: Lock,
    ) -> Result<Option<rfq::Model>, DbErr> {
        let query = rfq::Entity::find_by_id(id).filter(rfq::Column::TenantId.eq(tenant_id));
        apply_lock(query, lock).one(conn).await
    }

    pub async fn lines<C: ConnectionTrait>(
        conn: &C,
        tenant_id: Uuid,
        rfq_id: Uuid,
    ) -> Result<Vec<rfq_line::Model>, DbErr> {
        rfq_line::Entity::find()
            .filter(rfq_line::Column::TenantId.eq(tenant_id))
            .filter(rfq_line::Column::RfqId.eq(rfq_id))
            .order_by_asc(rfq_line::Column::Position)
            .all(conn)
            .await
    }

    pub async fn offers<C: ConnectionTrait>(
        conn: &C,
        tenant_id: Uuid,
        rfq_id: Uuid,
    ) -> Result<Vec<rfq_offer::Model>, DbErr> {
        rfq_offer::Entity::find()
            .filter(rfq_offer::Column::TenantId.eq(tenant_id))
            .filter(rfq_offer::Column::RfqId.eq(rfq_id))
            .order_by_asc(rfq_offer::Column::CreatedAt)
            .order_by_asc(rfq_offer::Column::Id)
            .all(conn)
            .await
    }

    pub async fn insert<C: ConnectionTrait>(
        conn: &C,
        model: rfq::ActiveModel,
    ) -> Result<rfq::Model, DbErr> {
        model.insert(conn).await
    }

    pub async fn insert_line<C: ConnectionTrait>(
        conn: &C,
        model: rfq_line::ActiveModel,
    ) -> Result<rfq_line::Model, DbErr> {
        model.insert(conn).await
    }

    pub async fn insert_offer<C: ConnectionTrait>(
        conn: &C,
        model: rfq_offer::ActiveModel,
    ) -> Result<rfq_offer::Model, DbErr> {
        model.insert(conn).await
    }

    pub async fn update<C: ConnectionTrait>(
        conn: &C,
        model: rfq::ActiveModel,
    ) -> Result<rfq::Model, DbErr> {
        model.update(conn).await
    }
}
