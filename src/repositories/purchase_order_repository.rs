use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
};
use uuid::Uuid;

use super::{apply_lock, Lock};
use crate::entities::{purchase_order, purchase_order_line};

/// Repository for purchase orders and their lines
#[derive(Debug, Clone, Copy, Default)]
pub struct PurchaseOrderRepository;

impl PurchaseOrderRepository {
    pub async fn find<C: ConnectionTrait>(
        conn: &C,
        tenant_id: Uuid,
        id: Uuid,
        lock: Lock,
    ) -> Result<Option<purchase_order::Model>, DbErr> {
        let query = purchase_order::Entity::find_by_id(id)
            .filter(purchase_order::Column::TenantId.eq(tenant_id));
        apply_lock(query, lock).one(conn).await
    }

    pub async fn lines<C: ConnectionTrait>(
        conn: &C,
        tenant_id: Uuid,
        purchase_order_id: Uuid,
    ) -> Result<Vec<purchase_order_line::Model>, DbErr> {
        purchase_order_line::Entity::find()
            .filter(purchase_order_line::Column::TenantId.eq(tenant_id))
            .filter(purchase_order_line::Column::PurchaseOrderId.eq(purchase_order_id))
            .order_by_asc(purchase_order_line::Column::Position)
            .all(conn)
            .await
    }

    pub async fn list_for_rfq<C: ConnectionTrait>(
        conn: &C,
        tenant_id: Uuid,
        rfq_id: Uuid,
    ) -> Result<Vec<purchase_order::Model>, DbErr> {
        purchase_order::Entity::find()
            .filter(purchase_order::Column::TenantId.eq(tenant_id))
            .filter(purchase_order::Column::RfqId.eq(rfq_id))
            .order_by_asc(purchase_order::Column::CreatedAt)
            .order_by_asc(purchase_order::Column::SupplierName)
            .all(conn)
            .await
    }

    pub async fn insert<C: ConnectionTrait>(
        conn: &C,
        model: purchase_order::ActiveModel,
    ) -> Result<purchase_order::Model, DbErr> {
        model.insert(conn).await
    }

    pub async fn insert_line<C: ConnectionTrait>(
        conn: &C,
        model: purchase_order_line::ActiveModel,
    ) -> Result<purchase_order_line::Model, DbErr> {
        model.insert(conn).await
    }

    pub async fn update<C: ConnectionTrait>(
        conn: &C,
        model: purchase_order::ActiveModel,
    ) -> Result<purchase_order::Model, DbErr> {
        model.update(conn).await
    }
}
