use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder,
};
use uuid::Uuid;

use crate::entities::supplier_payment;

/// Repository for append-only supplier payments
#[derive(Debug, Clone, Copy, Default)]
pub struct SupplierPaymentRepository;

impl SupplierPaymentRepository {
    pub async fn list_for_invoice<C: ConnectionTrait>(
        conn: &C,
        tenant_id: Uuid,
        supplier_invoice_id: Uuid,
    ) -> Result<Vec<supplier_payment::Model>, DbErr> {
        supplier_payment::Entity::find()
            .filter(supplier_payment::Column::TenantId.eq(tenant_id))
            .filter(supplier_payment::Column::SupplierInvoiceId.eq(supplier_invoice_id))
            .order_by_asc(supplier_payment::Column::PaidAt)
            .order_by_asc(supplier_payment::Column::CreatedAt)
            .all(conn)
            .await
    }

    pub async fn total_paid<C: ConnectionTrait>(
        conn: &C,
        tenant_id: Uuid,
        supplier_invoice_id: Uuid,
    ) -> Result<Decimal, DbErr> {
        let payments = Self::list_for_invoice(conn, tenant_id, supplier_invoice_id).await?;
        Ok(payments.iter().map(|p| p.amount).sum())
    }

    pub async fn reference_exists<C: ConnectionTrait>(
        conn: &C,
        tenant_id: Uuid,
        reference: &str,
    ) -> Result<bool, DbErr> {
        let count = supplier_payment::Entity::find()
            .filter(supplier_payment::Column::TenantId.eq(tenant_id))
            .filter(supplier_payment::Column::Reference.eq(reference))
            .count(conn)
            .await?;
        Ok(count > 0)
    }

    pub async fn insert<C: ConnectionTrait>(
        conn: &C,
        model: supplier_payment::ActiveModel,
    ) -> Result<supplier_payment::Model, DbErr> {
        model.insert(conn).await
    }
}
