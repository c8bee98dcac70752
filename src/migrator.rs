use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_rfq_tables::Migration),
            Box::new(m20240301_000002_create_purchase_order_tables::Migration),
            Box::new(m20240301_000003_create_goods_receipt_tables::Migration),
            Box::new(m20240301_000004_create_supplier_invoice_tables::Migration),
            Box::new(m20240301_000005_create_supplier_payments_table::Migration),
            Box::new(m20240301_000006_create_idempotency_records_table::Migration),
            Box::new(m20240301_000007_create_document_sequences_table::Migration),
        ]
    }
}

// Money and quantities share one precision. SQLite caps decimal precision at 16.
fn amount(col: impl IntoIden) -> ColumnDef {
    ColumnDef::new(col).decimal_len(16, 4).not_null().to_owned()
}

mod m20240301_000001_create_rfq_tables {
    use super::amount;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000001_create_rfq_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Rfqs::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Rfqs::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Rfqs::TenantId).uuid().not_null())
                        .col(ColumnDef::new(Rfqs::Status).string_len(32).not_null())
                        .col(ColumnDef::new(Rfqs::Note).text().null())
                        .col(ColumnDef::new(Rfqs::Suppliers).json().not_null())
                        .col(ColumnDef::new(Rfqs::CreatedBy).uuid().not_null())
                        .col(
                            ColumnDef::new(Rfqs::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Rfqs::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Rfqs::SentAt).timestamp_with_time_zone().null())
                        .col(
                            ColumnDef::new(Rfqs::ClosedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_rfqs_tenant_status")
                        .table(Rfqs::Table)
                        .col(Rfqs::TenantId)
                        .col(Rfqs::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(RfqLines::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(RfqLines::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(RfqLines::TenantId).uuid().not_null())
                        .col(ColumnDef::new(RfqLines::RfqId).uuid().not_null())
                        .col(ColumnDef::new(RfqLines::Position).integer().not_null())
                        .col(ColumnDef::new(RfqLines::Item).string().not_null())
                        .col(amount(RfqLines::Quantity))
                        .col(ColumnDef::new(RfqLines::Unit).string_len(32).null())
                        .col(amount(RfqLines::EstimatedUnitPrice))
                        .col(amount(RfqLines::TaxRate))
                        .col(
                            ColumnDef::new(RfqLines::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_rfq_lines_rfq_id")
                                .from(RfqLines::Table, RfqLines::RfqId)
                                .to(Rfqs::Table, Rfqs::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_rfq_lines_tenant_rfq")
                        .table(RfqLines::Table)
                        .col(RfqLines::TenantId)
                        .col(RfqLines::RfqId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(RfqOffers::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(RfqOffers::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(RfqOffers::TenantId).uuid().not_null())
                        .col(ColumnDef::new(RfqOffers::RfqId).uuid().not_null())
                        .col(ColumnDef::new(RfqOffers::RfqLineId).uuid().not_null())
                        .col(ColumnDef::new(RfqOffers::SupplierName).string().not_null())
                        .col(amount(RfqOffers::QuotedPrice))
                        .col(ColumnDef::new(RfqOffers::LeadTimeDays).integer().not_null())
                        .col(ColumnDef::new(RfqOffers::Notes).text().null())
                        .col(
                            ColumnDef::new(RfqOffers::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_rfq_offers_rfq_id")
                                .from(RfqOffers::Table, RfqOffers::RfqId)
                                .to(Rfqs::Table, Rfqs::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_rfq_offers_rfq_line_id")
                                .from(RfqOffers::Table, RfqOffers::RfqLineId)
                                .to(RfqLines::Table, RfqLines::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_rfq_offers_tenant_rfq")
                        .table(RfqOffers::Table)
                        .col(RfqOffers::TenantId)
                        .col(RfqOffers::RfqId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(RfqOffers::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(RfqLines::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Rfqs::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Rfqs {
        Table,
        Id,
        TenantId,
        Status,
        Note,
        Suppliers,
        CreatedBy,
        CreatedAt,
        UpdatedAt,
        SentAt,
        ClosedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum RfqLines {
        Table,
        Id,
        TenantId,
        RfqId,
        Position,
        Item,
        Quantity,
        Unit,
        EstimatedUnitPrice,
        TaxRate,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum RfqOffers {
        Table,
        Id,
        TenantId,
        RfqId,
        RfqLineId,
        SupplierName,
        QuotedPrice,
        LeadTimeDays,
        Notes,
        CreatedAt,
    }
}

mod m20240301_000002_create_purchase_order_tables {
    use super::amount;
    use super::m20240301_000001_create_rfq_tables::{RfqLines, Rfqs};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000002_create_purchase_order_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(PurchaseOrders::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PurchaseOrders::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PurchaseOrders::TenantId).uuid().not_null())
                        .col(ColumnDef::new(PurchaseOrders::RfqId).uuid().null())
                        .col(
                            ColumnDef::new(PurchaseOrders::SupplierName)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrders::Status)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(amount(PurchaseOrders::TotalHt))
                        .col(amount(PurchaseOrders::TotalTax))
                        .col(amount(PurchaseOrders::TotalTtc))
                        .col(ColumnDef::new(PurchaseOrders::Note).text().null())
                        .col(ColumnDef::new(PurchaseOrders::CreatedBy).uuid().not_null())
                        .col(
                            ColumnDef::new(PurchaseOrders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrders::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrders::ConfirmedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrders::ReceivedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_purchase_orders_rfq_id")
                                .from(PurchaseOrders::Table, PurchaseOrders::RfqId)
                                .to(Rfqs::Table, Rfqs::Id)
                                .on_delete(ForeignKeyAction::SetNull),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_purchase_orders_tenant_status")
                        .table(PurchaseOrders::Table)
                        .col(PurchaseOrders::TenantId)
                        .col(PurchaseOrders::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_purchase_orders_tenant_rfq")
                        .table(PurchaseOrders::Table)
                        .col(PurchaseOrders::TenantId)
                        .col(PurchaseOrders::RfqId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(PurchaseOrderLines::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PurchaseOrderLines::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrderLines::TenantId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrderLines::PurchaseOrderId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PurchaseOrderLines::RfqLineId).uuid().null())
                        .col(
                            ColumnDef::new(PurchaseOrderLines::Position)
                                .integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PurchaseOrderLines::Name).string().not_null())
                        .col(amount(PurchaseOrderLines::Quantity))
                        .col(
                            ColumnDef::new(PurchaseOrderLines::Unit)
                                .string_len(32)
                                .null(),
                        )
                        .col(amount(PurchaseOrderLines::UnitPrice))
                        .col(amount(PurchaseOrderLines::TaxRate))
                        .col(amount(PurchaseOrderLines::TotalHt))
                        .col(amount(PurchaseOrderLines::TotalTax))
                        .col(amount(PurchaseOrderLines::TotalTtc))
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_purchase_order_lines_purchase_order_id")
                                .from(
                                    PurchaseOrderLines::Table,
                                    PurchaseOrderLines::PurchaseOrderId,
                                )
                                .to(PurchaseOrders::Table, PurchaseOrders::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_purchase_order_lines_rfq_line_id")
                                .from(PurchaseOrderLines::Table, PurchaseOrderLines::RfqLineId)
                                .to(RfqLines::Table, RfqLines::Id)
                                .on_delete(ForeignKeyAction::SetNull),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_purchase_order_lines_tenant_po")
                        .table(PurchaseOrderLines::Table)
                        .col(PurchaseOrderLines::TenantId)
                        .col(PurchaseOrderLines::PurchaseOrderId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(PurchaseOrderLines::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(PurchaseOrders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum PurchaseOrders {
        Table,
        Id,
        TenantId,
        RfqId,
        SupplierName,
        Status,
        TotalHt,
        TotalTax,
        TotalTtc,
        Note,
        CreatedBy,
        CreatedAt,
        UpdatedAt,
        ConfirmedAt,
        ReceivedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum PurchaseOrderLines {
        Table,
        Id,
        TenantId,
        PurchaseOrderId,
        RfqLineId,
        Position,
        Name,
        Quantity,
        Unit,
        UnitPrice,
        TaxRate,
        TotalHt,
        TotalTax,
        TotalTtc,
    }
}

mod m20240301_000003_create_goods_receipt_tables {
    use super::amount;
    use super::m20240301_000002_create_purchase_order_tables::{
        PurchaseOrderLines, PurchaseOrders,
    };
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000003_create_goods_receipt_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(GoodsReceipts::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(GoodsReceipts::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(GoodsReceipts::TenantId).uuid().not_null())
                        .col(
                            ColumnDef::new(GoodsReceipts::PurchaseOrderId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(GoodsReceipts::Status)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(ColumnDef::new(GoodsReceipts::Note).text().null())
                        .col(
                            ColumnDef::new(GoodsReceipts::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(GoodsReceipts::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_goods_receipts_purchase_order_id")
                                .from(GoodsReceipts::Table, GoodsReceipts::PurchaseOrderId)
                                .to(PurchaseOrders::Table, PurchaseOrders::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            // One receipt per order
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_goods_receipts_purchase_order")
                        .table(GoodsReceipts::Table)
                        .col(GoodsReceipts::PurchaseOrderId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(GoodsReceiptEntries::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(GoodsReceiptEntries::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(GoodsReceiptEntries::TenantId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(GoodsReceiptEntries::GoodsReceiptId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(GoodsReceiptEntries::Sequence)
                                .integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(GoodsReceiptEntries::Note).text().null())
                        .col(
                            ColumnDef::new(GoodsReceiptEntries::ReceivedBy)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(GoodsReceiptEntries::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_goods_receipt_entries_goods_receipt_id")
                                .from(
                                    GoodsReceiptEntries::Table,
                                    GoodsReceiptEntries::GoodsReceiptId,
                                )
                                .to(GoodsReceipts::Table, GoodsReceipts::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_goods_receipt_entries_sequence")
                        .table(GoodsReceiptEntries::Table)
                        .col(GoodsReceiptEntries::GoodsReceiptId)
                        .col(GoodsReceiptEntries::Sequence)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(GoodsReceiptEntryLines::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(GoodsReceiptEntryLines::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(GoodsReceiptEntryLines::TenantId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(GoodsReceiptEntryLines::EntryId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(GoodsReceiptEntryLines::PurchaseOrderLineId)
                                .uuid()
                                .not_null(),
                        )
                        .col(amount(GoodsReceiptEntryLines::Quantity))
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_goods_receipt_entry_lines_entry_id")
                                .from(
                                    GoodsReceiptEntryLines::Table,
                                    GoodsReceiptEntryLines::EntryId,
                                )
                                .to(GoodsReceiptEntries::Table, GoodsReceiptEntries::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_goods_receipt_entry_lines_po_line_id")
                                .from(
                                    GoodsReceiptEntryLines::Table,
                                    GoodsReceiptEntryLines::PurchaseOrderLineId,
                                )
                                .to(PurchaseOrderLines::Table, PurchaseOrderLines::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_goods_receipt_entry_lines_entry")
                        .table(GoodsReceiptEntryLines::Table)
                        .col(GoodsReceiptEntryLines::EntryId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(GoodsReceiptEntryLines::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(GoodsReceiptEntries::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(GoodsReceipts::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum GoodsReceipts {
        Table,
        Id,
        TenantId,
        PurchaseOrderId,
        Status,
        Note,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum GoodsReceiptEntries {
        Table,
        Id,
        TenantId,
        GoodsReceiptId,
        Sequence,
        Note,
        ReceivedBy,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum GoodsReceiptEntryLines {
        Table,
        Id,
        TenantId,
        EntryId,
        PurchaseOrderLineId,
        Quantity,
    }
}

mod m20240301_000004_create_supplier_invoice_tables {
    use super::amount;
    use super::m20240301_000002_create_purchase_order_tables::{
        PurchaseOrderLines, PurchaseOrders,
    };
    use super::m20240301_000003_create_goods_receipt_tables::GoodsReceipts;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000004_create_supplier_invoice_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(SupplierInvoices::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(SupplierInvoices::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(SupplierInvoices::TenantId).uuid().not_null())
                        .col(
                            ColumnDef::new(SupplierInvoices::PurchaseOrderId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SupplierInvoices::GoodsReceiptId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SupplierInvoices::Status)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(ColumnDef::new(SupplierInvoices::Number).string_len(64).null())
                        .col(
                            ColumnDef::new(SupplierInvoices::SupplierNumber)
                                .string_len(128)
                                .null(),
                        )
                        .col(ColumnDef::new(SupplierInvoices::InvoiceDate).date().null())
                        .col(ColumnDef::new(SupplierInvoices::DueDate).date().null())
                        .col(ColumnDef::new(SupplierInvoices::Note).text().null())
                        .col(
                            ColumnDef::new(SupplierInvoices::AttachmentRef)
                                .string()
                                .null(),
                        )
                        .col(amount(SupplierInvoices::TotalHt))
                        .col(amount(SupplierInvoices::TotalTax))
                        .col(amount(SupplierInvoices::TotalTtc))
                        .col(amount(SupplierInvoices::AmountPaid))
                        .col(ColumnDef::new(SupplierInvoices::CreatedBy).uuid().not_null())
                        .col(
                            ColumnDef::new(SupplierInvoices::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SupplierInvoices::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SupplierInvoices::PostedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(SupplierInvoices::PaidAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(SupplierInvoices::CancelledAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_supplier_invoices_purchase_order_id")
                                .from(SupplierInvoices::Table, SupplierInvoices::PurchaseOrderId)
                                .to(PurchaseOrders::Table, PurchaseOrders::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_supplier_invoices_goods_receipt_id")
                                .from(SupplierInvoices::Table, SupplierInvoices::GoodsReceiptId)
                                .to(GoodsReceipts::Table, GoodsReceipts::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await?;

            // One invoice per order
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_supplier_invoices_tenant_purchase_order")
                        .table(SupplierInvoices::Table)
                        .col(SupplierInvoices::TenantId)
                        .col(SupplierInvoices::PurchaseOrderId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_supplier_invoices_tenant_number")
                        .table(SupplierInvoices::Table)
                        .col(SupplierInvoices::TenantId)
                        .col(SupplierInvoices::Number)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(SupplierInvoiceLines::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(SupplierInvoiceLines::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SupplierInvoiceLines::TenantId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SupplierInvoiceLines::SupplierInvoiceId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SupplierInvoiceLines::PurchaseOrderLineId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SupplierInvoiceLines::Position)
                                .integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(SupplierInvoiceLines::Name).string().not_null())
                        .col(amount(SupplierInvoiceLines::Quantity))
                        .col(
                            ColumnDef::new(SupplierInvoiceLines::Unit)
                                .string_len(32)
                                .null(),
                        )
                        .col(amount(SupplierInvoiceLines::UnitPrice))
                        .col(amount(SupplierInvoiceLines::TaxRate))
                        .col(amount(SupplierInvoiceLines::TotalHt))
                        .col(amount(SupplierInvoiceLines::TotalTax))
                        .col(amount(SupplierInvoiceLines::TotalTtc))
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_supplier_invoice_lines_invoice_id")
                                .from(
                                    SupplierInvoiceLines::Table,
                                    SupplierInvoiceLines::SupplierInvoiceId,
                                )
                                .to(SupplierInvoices::Table, SupplierInvoices::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_supplier_invoice_lines_po_line_id")
                                .from(
                                    SupplierInvoiceLines::Table,
                                    SupplierInvoiceLines::PurchaseOrderLineId,
                                )
                                .to(PurchaseOrderLines::Table, PurchaseOrderLines::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_supplier_invoice_lines_invoice")
                        .table(SupplierInvoiceLines::Table)
                        .col(SupplierInvoiceLines::SupplierInvoiceId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(SupplierInvoiceLines::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(SupplierInvoices::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum SupplierInvoices {
        Table,
        Id,
        TenantId,
        PurchaseOrderId,
        GoodsReceiptId,
        Status,
        Number,
        SupplierNumber,
        InvoiceDate,
        DueDate,
        Note,
        AttachmentRef,
        TotalHt,
        TotalTax,
        TotalTtc,
        AmountPaid,
        CreatedBy,
        CreatedAt,
        UpdatedAt,
        PostedAt,
        PaidAt,
        CancelledAt,
    }

    #[derive(DeriveIden)]
    enum SupplierInvoiceLines {
        Table,
        Id,
        TenantId,
        SupplierInvoiceId,
        PurchaseOrderLineId,
        Position,
        Name,
        Quantity,
        Unit,
        UnitPrice,
        TaxRate,
        TotalHt,
        TotalTax,
        TotalTtc,
    }
}

mod m20240301_000005_create_supplier_payments_table {
    use super::amount;
    use super::m20240301_000004_create_supplier_invoice_tables::SupplierInvoices;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000005_create_supplier_payments_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(SupplierPayments::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(SupplierPayments::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(SupplierPayments::TenantId).uuid().not_null())
                        .col(
                            ColumnDef::new(SupplierPayments::SupplierInvoiceId)
                                .uuid()
                                .not_null(),
                        )
                        .col(amount(SupplierPayments::Amount))
                        .col(
                            ColumnDef::new(SupplierPayments::Method)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SupplierPayments::Reference)
                                .string_len(64)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SupplierPayments::PaidAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(SupplierPayments::RecordedBy).uuid().not_null())
                        .col(
                            ColumnDef::new(SupplierPayments::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_supplier_payments_invoice_id")
                                .from(
                                    SupplierPayments::Table,
                                    SupplierPayments::SupplierInvoiceId,
                                )
                                .to(SupplierInvoices::Table, SupplierInvoices::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_supplier_payments_tenant_reference")
                        .table(SupplierPayments::Table)
                        .col(SupplierPayments::TenantId)
                        .col(SupplierPayments::Reference)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_supplier_payments_invoice")
                        .table(SupplierPayments::Table)
                        .col(SupplierPayments::SupplierInvoiceId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(SupplierPayments::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum SupplierPayments {
        Table,
        Id,
        TenantId,
        SupplierInvoiceId,
        Amount,
        Method,
        Reference,
        PaidAt,
        RecordedBy,
        CreatedAt,
    }
}

mod m20240301_000006_create_idempotency_records_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000006_create_idempotency_records_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(IdempotencyRecords::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(IdempotencyRecords::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(IdempotencyRecords::TenantId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(IdempotencyRecords::ClientKey)
                                .string_len(1024)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(IdempotencyRecords::Action)
                                .string_len(64)
                                .not_null(),
                        )
                        .col(ColumnDef::new(IdempotencyRecords::Response).json().not_null())
                        .col(
                            ColumnDef::new(IdempotencyRecords::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_idempotency_records_tenant_key_action")
                        .table(IdempotencyRecords::Table)
                        .col(IdempotencyRecords::TenantId)
                        .col(IdempotencyRecords::ClientKey)
                        .col(IdempotencyRecords::Action)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(IdempotencyRecords::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum IdempotencyRecords {
        Table,
        Id,
        TenantId,
        ClientKey,
        Action,
        Response,
        CreatedAt,
    }
}

mod m20240301_000007_create_document_sequences_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000007_create_document_sequences_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(DocumentSequences::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(DocumentSequences::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DocumentSequences::TenantId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DocumentSequences::Scope)
                                .string_len(64)
                                .not_null(),
                        )
                        .col(ColumnDef::new(DocumentSequences::Year).integer().not_null())
                        .col(
                            ColumnDef::new(DocumentSequences::LastValue)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DocumentSequences::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_document_sequences_tenant_scope_year")
                        .table(DocumentSequences::Table)
                        .col(DocumentSequences::TenantId)
                        .col(DocumentSequences::Scope)
                        .col(DocumentSequences::Year)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(DocumentSequences::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum DocumentSequences {
        Table,
        Id,
        TenantId,
        Scope,
        Year,
        LastValue,
        UpdatedAt,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amount_columns_build_for_every_backend() {
        let statement = Table::create()
            .table(Alias::new("ledger"))
            .col(amount(Alias::new("total_ttc")))
            .to_owned();

        let sqlite = statement.to_string(SqliteQueryBuilder);
        let postgres = statement.to_string(PostgresQueryBuilder);
        assert!(sqlite.contains("\"total_ttc\""), "{sqlite}");
        assert!(postgres.contains("decimal(16, 4)"), "{postgres}");
    }

    #[test]
    fn migrations_are_ordered() {
        let names: Vec<String> = Migrator::migrations()
            .iter()
            .map(|m| m.name().to_string())
            .collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        assert_eq!(names.len(), 7);
    }
}
