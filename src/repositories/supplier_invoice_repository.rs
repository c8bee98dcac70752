use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
};
use uuid::Uuid;

use super::{apply_lock, Lock};
use crate::entities::{supplier_invoice, supplier_invoice_line};

/// Repository for supplier invoices and their mirrored lines
#[derive(Debug, Clone, Copy, Default)]
pub struct SupplierInvoiceRepository;

impl SupplierInvoiceRepository {
    pub async fn find<C: ConnectionTrait>(
        conn: &C,
        tenant_id: Uuid,
        id: Uuid,
        lock: Lock,
    ) -> Result<Option<supplier_invoice::Model>, DbErr> {
        let query = supplier_invoice::Entity::find_by_id(id)
            .filter(supplier_invoice::Column::TenantId.eq(tenant_id));
        apply_lock(query, lock).one(conn).await
    }

    pub async fn find_by_purchase_order<C: ConnectionTrait>(
        conn: &C,
        tenant_id: Uuid,
        purchase_order_id: Uuid,
    ) -> Result<Option<supplier_invoice::Model>, DbErr> {
        supplier_invoice::Entity::find()
            .filter(supplier_invoice::Column::TenantId.eq(tenant_id))
            .filter(supplier_invoice::Column::PurchaseOrderId.eq(purchase_order_id))
            .one(conn)
            .await
    }

    pub async fn lines<C: ConnectionTrait>(
        conn: &C,
        tenant_id: Uuid,
        supplier_invoice_id: Uuid,
    ) -> Result<Vec<supplier_invoice_line::Model>, DbErr> {
        supplier_invoice_line::Entity::find()
            .filter(supplier_invoice_line::Column::TenantId.eq(tenant_id))
            .filter(supplier_invoice_line::Column::SupplierInvoiceId.eq(supplier_invoice_id))
            .order_by_asc(supplier_invoice_line::Column::Position)
            .all(conn)
            .await
    }

    pub async fn insert<C: ConnectionTrait>(
        conn: &C,
        model: supplier_invoice::ActiveModel,
    ) -> Result<supplier_invoice::Model, DbErr> {
        model.insert(conn).await
    }

    pub async fn insert_line<C: ConnectionTrait>(
        conn: &C,
        model: supplier_invoice_line::ActiveModel,
    ) -> Result<supplier_invoice_line::Model, DbErr> {
        model.insert(conn).await
    }

    pub async fn update<C: ConnectionTrait>(
        conn: &C,
        model: supplier_invoice::ActiveModel,
    ) -> Result<supplier_invoice::Model, DbErr> {
        model.update(conn).await
    }
}
