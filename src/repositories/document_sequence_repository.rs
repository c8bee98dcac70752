use chrono::Utc;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use crate::entities::document_sequence::{self, Column};

/// Gap-free counters backing sequential document numbers
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentSequenceRepository;

impl DocumentSequenceRepository {
    /// Issues the next value of `(tenant, scope, year)`, starting at 1.
    ///
    /// Must run inside the transaction that consumes the value so a rollback
    /// returns it to the sequence. The counter is bumped with a single
    /// insert-on-conflict upsert, so concurrent first issues of a year queue on
    /// the unique index rather than colliding on insert. Under serializable
    /// isolation the later of two overlapping writers fails with a retryable
    /// serialization error instead of reusing a number.
    pub async fn next_value<C: ConnectionTrait>(
        conn: &C,
        tenant_id: Uuid,
        scope: &str,
        year: i32,
    ) -> Result<i64, DbErr> {
        let now = Utc::now();
        let seed = document_sequence::ActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(tenant_id),
            scope: Set(scope.to_string()),
            year: Set(year),
            last_value: Set(1),
            updated_at: Set(now),
        };

        document_sequence::Entity::insert(seed)
            .on_conflict(
                OnConflict::columns([Column::TenantId, Column::Scope, Column::Year])
                    .value(
                        Column::LastValue,
                        Expr::col((document_sequence::Entity, Column::LastValue)).add(1),
                    )
                    .value(Column::UpdatedAt, Expr::value(now))
                    .to_owned(),
            )
            .exec_without_returning(conn)
            .await?;

        document_sequence::Entity::find()
            .filter(Column::TenantId.eq(tenant_id))
            .filter(Column::Scope.eq(scope))
            .filter(Column::Year.eq(year))
            .one(conn)
            .await?
            .map(|row| row.last_value)
            .ok_or_else(|| {
                DbErr::RecordNotFound(format!("document sequence {scope}/{year} after upsert"))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{self, DbConfig};

    #[tokio::test]
    async fn values_count_up_per_scope_and_year() {
        let pool = db::establish_connection_with_config(&DbConfig::in_memory_sqlite())
            .await
            .expect("pool");
        db::run_migrations(&pool).await.expect("migrations");
        let tenant = Uuid::new_v4();

        let mut issued = Vec::new();
        for _ in 0..3 {
            issued.push(
                DocumentSequenceRepository::next_value(&pool, tenant, "supplier_invoice", 2025)
                    .await
                    .expect("next"),
            );
        }
        assert_eq!(issued, vec![1, 2, 3]);

        let next_year =
            DocumentSequenceRepository::next_value(&pool, tenant, "supplier_invoice", 2026)
                .await
                .expect("next year");
        let other_tenant =
            DocumentSequenceRepository::next_value(&pool, Uuid::new_v4(), "supplier_invoice", 2025)
                .await
                .expect("other tenant");
        assert_eq!((next_year, other_tenant), (1, 1));

        let rows = document_sequence::Entity::find()
            .filter(Column::TenantId.eq(tenant))
            .all(&pool)
            .await
            .expect("rows");
        assert_eq!(rows.len(), 2);
    }
}
