use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter};
use uuid::Uuid;

use crate::entities::idempotency_record;

#[derive(Debug, Clone, Copy, Default)]
pub struct IdempotencyRepository;

impl IdempotencyRepository {
    pub async fn find<C: ConnectionTrait>(
        conn: &C,
        tenant_id: Uuid,
        client_key: &str,
        action: &str,
    ) -> Result<Option<idempotency_record::Model>, DbErr> {
        idempotency_record::Entity::find()
            .filter(idempotency_record::Column::TenantId.eq(tenant_id))
            .filter(idempotency_record::Column::ClientKey.eq(client_key))
            .filter(idempotency_record::Column::Action.eq(action))
            .one(conn)
            .await
    }

    pub async fn insert<C: ConnectionTrait>(
        conn: &C,
        model: idempotency_record::ActiveModel,
    ) -> Result<idempotency_record::Model, DbErr> {
        model.insert(conn).await
    }
}
