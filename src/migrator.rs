use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_users_table::Migration),
            Box::new(m20240101_000002_create_categories_table::Migration),
            Box::new(m20240101_000003_create_products_table::Migration),
            Box::new(m20240101_000004_create_activities_table::Migration),
            Box::new(m20240101_000005_create_activity_items_table::Migration),
            Box::new(m20240101_000006_create_stock_ledger_entries_table::Migration),
            Box::new(m20240101_000007_create_price_histories_table::Migration),
        ]
    }
}

// Shared column helpers. Every table carries the same audit columns.
fn id_column<T: IntoIden>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .integer()
        .not_null()
        .auto_increment()
        .primary_key()
        .to_owned()
}

fn timestamp_column<T: IntoIden>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .timestamp_with_time_zone()
        .not_null()
        .to_owned()
}

fn deleted_at_column<T: IntoIden>(col: T) -> ColumnDef {
    ColumnDef::new(col).timestamp_with_time_zone().null().to_owned()
}

fn money_column<T: IntoIden + Clone + 'static>(col: T) -> ColumnDef {
    ColumnDef::new(col.clone())
        .decimal_len(12, 2)
        .not_null()
        .check(Expr::col(col).gte(0))
        .to_owned()
}

mod m20240101_000001_create_users_table {
    use super::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_users_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Users::Table)
                        .if_not_exists()
                        .col(id_column(Users::Id))
                        .col(ColumnDef::new(Users::Name).string().not_null())
                        .col(ColumnDef::new(Users::Email).string().not_null().unique_key())
                        .col(ColumnDef::new(Users::PasswordHash).string().not_null())
                        .col(
                            ColumnDef::new(Users::Role)
                                .string_len(16)
                                .not_null()
                                .default("karyawan"),
                        )
                        .col(timestamp_column(Users::CreatedAt))
                        .col(timestamp_column(Users::UpdatedAt))
                        .col(deleted_at_column(Users::DeletedAt))
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Users::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden, Clone)]
    pub enum Users {
        Table,
        Id,
        Name,
        Email,
        PasswordHash,
        Role,
        CreatedAt,
        UpdatedAt,
        DeletedAt,
    }
}

mod m20240101_000002_create_categories_table {
    use super::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_categories_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Categories::Table)
                        .if_not_exists()
                        .col(id_column(Categories::Id))
                        .col(
                            ColumnDef::new(Categories::Name)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(timestamp_column(Categories::CreatedAt))
                        .col(timestamp_column(Categories::UpdatedAt))
                        .col(deleted_at_column(Categories::DeletedAt))
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Categories::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden, Clone)]
    pub enum Categories {
        Table,
        Id,
        Name,
        CreatedAt,
        UpdatedAt,
        DeletedAt,
    }
}

mod m20240101_000003_create_products_table {
    use super::m20240101_000002_create_categories_table::Categories;
    use super::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_products_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Products::Table)
                        .if_not_exists()
                        .col(id_column(Products::Id))
                        .col(ColumnDef::new(Products::Name).string().not_null())
                        .col(
                            ColumnDef::new(Products::Stock)
                                .integer()
                                .not_null()
                                .default(0)
                                .check(Expr::col(Products::Stock).gte(0)),
                        )
                        .col(money_column(Products::Price))
                        .col(ColumnDef::new(Products::Location).string().not_null())
                        .col(ColumnDef::new(Products::CategoryId).integer().not_null())
                        .col(timestamp_column(Products::CreatedAt))
                        .col(timestamp_column(Products::UpdatedAt))
                        .col(deleted_at_column(Products::DeletedAt))
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_products_category_id")
                                .from(Products::Table, Products::CategoryId)
                                .to(Categories::Table, Categories::Id)
                                .on_delete(ForeignKeyAction::Restrict)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_products_category_id")
                        .table(Products::Table)
                        .col(Products::CategoryId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden, Clone)]
    pub enum Products {
        Table,
        Id,
        Name,
        Stock,
        Price,
        Location,
        CategoryId,
        CreatedAt,
        UpdatedAt,
        DeletedAt,
    }
}

mod m20240101_000004_create_activities_table {
    use super::m20240101_000001_create_users_table::Users;
    use super::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_activities_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Activities::Table)
                        .if_not_exists()
                        .col(id_column(Activities::Id))
                        .col(ColumnDef::new(Activities::UserId).integer().not_null())
                        .col(
                            ColumnDef::new(Activities::Kind)
                                .string_len(16)
                                .not_null()
                                .check(Expr::col(Activities::Kind).is_in(["inbound", "outbound"])),
                        )
                        .col(
                            ColumnDef::new(Activities::Status)
                                .string_len(16)
                                .not_null()
                                .default("success")
                                .check(Expr::col(Activities::Status).is_in(["success", "failed"])),
                        )
                        .col(timestamp_column(Activities::Date))
                        .col(timestamp_column(Activities::CreatedAt))
                        .col(timestamp_column(Activities::UpdatedAt))
                        .col(deleted_at_column(Activities::DeletedAt))
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_activities_user_id")
                                .from(Activities::Table, Activities::UserId)
                                .to(Users::Table, Users::Id)
                                .on_delete(ForeignKeyAction::Restrict)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_activities_kind")
                        .table(Activities::Table)
                        .col(Activities::Kind)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Activities::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden, Clone)]
    pub enum Activities {
        Table,
        Id,
        UserId,
        Kind,
        Status,
        Date,
        CreatedAt,
        UpdatedAt,
        DeletedAt,
    }
}

mod m20240101_000005_create_activity_items_table {
    use super::m20240101_000003_create_products_table::Products;
    use super::m20240101_000004_create_activities_table::Activities;
    use super::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000005_create_activity_items_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ActivityItems::Table)
                        .if_not_exists()
                        .col(id_column(ActivityItems::Id))
                        .col(ColumnDef::new(ActivityItems::ActivityId).integer().not_null())
                        .col(ColumnDef::new(ActivityItems::ProductId).integer().not_null())
                        .col(
                            ColumnDef::new(ActivityItems::Quantity)
                                .integer()
                                .not_null()
                                .check(Expr::col(ActivityItems::Quantity).gt(0)),
                        )
                        .col(money_column(ActivityItems::PriceAtTime))
                        .col(money_column(ActivityItems::DiscountAmount).default(0))
                        .col(money_column(ActivityItems::FinalPrice))
                        .col(timestamp_column(ActivityItems::CreatedAt))
                        .col(timestamp_column(ActivityItems::UpdatedAt))
                        .col(deleted_at_column(ActivityItems::DeletedAt))
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_activity_items_activity_id")
                                .from(ActivityItems::Table, ActivityItems::ActivityId)
                                .to(Activities::Table, Activities::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_activity_items_product_id")
                                .from(ActivityItems::Table, ActivityItems::ProductId)
                                .to(Products::Table, Products::Id)
                                .on_delete(ForeignKeyAction::Restrict)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_activity_items_activity_id")
                        .table(ActivityItems::Table)
                        .col(ActivityItems::ActivityId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ActivityItems::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden, Clone)]
    pub enum ActivityItems {
        Table,
        Id,
        ActivityId,
        ProductId,
        Quantity,
        PriceAtTime,
        DiscountAmount,
        FinalPrice,
        CreatedAt,
        UpdatedAt,
        DeletedAt,
    }
}

mod m20240101_000006_create_stock_ledger_entries_table {
    use super::m20240101_000003_create_products_table::Products;
    use super::m20240101_000005_create_activity_items_table::ActivityItems;
    use super::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000006_create_stock_ledger_entries_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(StockLedgerEntries::Table)
                        .if_not_exists()
                        .col(id_column(StockLedgerEntries::Id))
                        .col(
                            ColumnDef::new(StockLedgerEntries::ProductId)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockLedgerEntries::ActivityItemId)
                                .integer()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(StockLedgerEntries::ChangeQuantity)
                                .integer()
                                .not_null()
                                .check(Expr::col(StockLedgerEntries::ChangeQuantity).ne(0)),
                        )
                        .col(ColumnDef::new(StockLedgerEntries::Note).string().not_null())
                        .col(timestamp_column(StockLedgerEntries::Date))
                        .col(timestamp_column(StockLedgerEntries::CreatedAt))
                        .col(timestamp_column(StockLedgerEntries::UpdatedAt))
                        .col(deleted_at_column(StockLedgerEntries::DeletedAt))
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_stock_ledger_entries_product_id")
                                .from(StockLedgerEntries::Table, StockLedgerEntries::ProductId)
                                .to(Products::Table, Products::Id)
                                .on_delete(ForeignKeyAction::Restrict)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_stock_ledger_entries_activity_item_id")
                                .from(
                                    StockLedgerEntries::Table,
                                    StockLedgerEntries::ActivityItemId,
                                )
                                .to(ActivityItems::Table, ActivityItems::Id)
                                .on_delete(ForeignKeyAction::Restrict)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_ledger_entries_product_id")
                        .table(StockLedgerEntries::Table)
                        .col(StockLedgerEntries::ProductId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StockLedgerEntries::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden, Clone)]
    enum StockLedgerEntries {
        Table,
        Id,
        ProductId,
        ActivityItemId,
        ChangeQuantity,
        Note,
        Date,
        CreatedAt,
        UpdatedAt,
        DeletedAt,
    }
}

mod m20240101_000007_create_price_histories_table {
    use super::m20240101_000003_create_products_table::Products;
    use super::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000007_create_price_histories_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(PriceHistories::Table)
                        .if_not_exists()
                        .col(id_column(PriceHistories::Id))
                        .col(ColumnDef::new(PriceHistories::ProductId).integer().not_null())
                        .col(money_column(PriceHistories::OldPrice))
                        .col(money_column(PriceHistories::NewPrice))
                        .col(timestamp_column(PriceHistories::DateChanged))
                        .col(timestamp_column(PriceHistories::CreatedAt))
                        .col(timestamp_column(PriceHistories::UpdatedAt))
                        .col(deleted_at_column(PriceHistories::DeletedAt))
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_price_histories_product_id")
                                .from(PriceHistories::Table, PriceHistories::ProductId)
                                .to(Products::Table, Products::Id)
                                .on_delete(ForeignKeyAction::Restrict)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(PriceHistories::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden, Clone)]
    enum PriceHistories {
        Table,
        Id,
        ProductId,
        OldPrice,
        NewPrice,
        DateChanged,
        CreatedAt,
        UpdatedAt,
        DeletedAt,
    }
}
