use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, RelationTrait,
};
use sea_orm::sea_query::JoinType;
use std::collections::HashMap;
use uuid::Uuid;

use super::{apply_lock, Lock};
use crate::entities::{goods_receipt, goods_receipt_entry, goods_receipt_entry_line};

/// Repository for goods receipts and their append-only lots
#[derive(Debug, Clone, Copy, Default)]
pub struct GoodsReceiptRepository;

impl GoodsReceiptRepository {
    pub async fn find<C: ConnectionTrait>(
        conn: &C,
        tenant_id: Uuid,
        id: Uuid,
        lock: Lock,
    ) -> Result<Option<goods_receipt::Model>, DbErr> {
        let query = goods_receipt::Entity::find_by_id(id)
            .filter(goods_receipt::Column::TenantId.eq(tenant_id));
        apply_lock(query, lock).one(conn).await
    }

    pub async fn find_by_purchase_order<C: ConnectionTrait>(
        conn: &C,
        tenant_id: Uuid,
        purchase_order_id: Uuid,
        lock: Lock,
    ) -> Result<Option<goods_receipt::Model>, DbErr> {
        let query = goods_receipt::Entity::find()
            .filter(goods_receipt::Column::TenantId.eq(tenant_id))
            .filter(goods_receipt::Column::PurchaseOrderId.eq(purchase_order_id));
        apply_lock(query, lock).one(conn).await
    }

    pub async fn entries<C: ConnectionTrait>(
        conn: &C,
        tenant_id: Uuid,
        goods_receipt_id: Uuid,
    ) -> Result<Vec<goods_receipt_entry::Model>, DbErr> {
        goods_receipt_entry::Entity::find()
            .filter(goods_receipt_entry::Column::TenantId.eq(tenant_id))
            .filter(goods_receipt_entry::Column::GoodsReceiptId.eq(goods_receipt_id))
            .order_by_asc(goods_receipt_entry::Column::Sequence)
            .all(conn)
            .await
    }

    pub async fn count_entries<C: ConnectionTrait>(
        conn: &C,
        tenant_id: Uuid,
        goods_receipt_id: Uuid,
    ) -> Result<u64, DbErr> {
        goods_receipt_entry::Entity::find()
            .filter(goods_receipt_entry::Column::TenantId.eq(tenant_id))
            .filter(goods_receipt_entry::Column::GoodsReceiptId.eq(goods_receipt_id))
            .count(conn)
            .await
    }

    /// Every lot line recorded against the receipt, across all entries.
    pub async fn entry_lines<C: ConnectionTrait>(
        conn: &C,
        tenant_id: Uuid,
        goods_receipt_id: Uuid,
    ) -> Result<Vec<goods_receipt_entry_line::Model>, DbErr> {
        goods_receipt_entry_line::Entity::find()
            .join(
                JoinType::InnerJoin,
                goods_receipt_entry_line::Relation::Entry.def(),
            )
            .filter(goods_receipt_entry_line::Column::TenantId.eq(tenant_id))
            .filter(goods_receipt_entry::Column::GoodsReceiptId.eq(goods_receipt_id))
            .order_by_asc(goods_receipt_entry::Column::Sequence)
            .all(conn)
            .await
    }

    /// Cumulative received quantity per purchase order line.
    pub async fn received_by_line<C: ConnectionTrait>(
        conn: &C,
        tenant_id: Uuid,
        goods_receipt_id: Uuid,
    ) -> Result<HashMap<Uuid, Decimal>, DbErr> {
        let lines = Self::entry_lines(conn, tenant_id, goods_receipt_id).await?;
        let mut received: HashMap<Uuid, Decimal> = HashMap::new();
        for line in lines {
            *received.entry(line.purchase_order_line_id).or_default() += line.quantity;
        }
        Ok(received)
    }

    pub async fn insert<C: ConnectionTrait>(
        conn: &C,
        model: goods_receipt::ActiveModel,
    ) -> Result<goods_receipt::Model, DbErr> {
        model.insert(conn).await
    }

    pub async fn insert_entry<C: ConnectionTrait>(
        conn: &C,
        model: goods_receipt_entry::ActiveModel,
    ) -> Result<goods_receipt_entry::Model, DbErr> {
        model.insert(conn).await
    }

    pub async fn insert_entry_line<C: ConnectionTrait>(
        conn: &C,
        model: goods_receipt_entry_line::ActiveModel,
    ) -> Result<goods_receipt_entry_line::Model, DbErr> {
        model.insert(conn).await
    }

    pub async fn update<C: ConnectionTrait>(
        conn: &C,
        model: goods_receipt::ActiveModel,
    ) -> Result<goods_receipt::Model, DbErr> {
        model.update(conn).await
    }
}
