use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_catalog_tables::Migration),
            Box::new(m20240301_000002_create_customer_tables::Migration),
            Box::new(m20240301_000003_create_order_tables::Migration),
            Box::new(m20240301_000004_create_inventory_tables::Migration),
            Box::new(m20240301_000005_create_indexes::Migration),
        ]
    }
}

mod m20240301_000001_create_catalog_tables {
    use crate::entities::{category, product, product_image, product_variant};
    use sea_orm::Schema;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000001_create_catalog_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            let schema = Schema::new(manager.get_database_backend());

            manager
                .create_table(
                    schema
                        .create_table_from_entity(category::Entity)
                        .if_not_exists()
                        .to_owned(),
                )
                .await?;
            manager
                .create_table(
                    schema
                        .create_table_from_entity(product::Entity)
                        .if_not_exists()
                        .to_owned(),
                )
                .await?;
            manager
                .create_table(
                    schema
                        .create_table_from_entity(product_variant::Entity)
                        .if_not_exists()
                        .to_owned(),
                )
                .await?;
            manager
                .create_table(
                    schema
                        .create_table_from_entity(product_image::Entity)
                        .if_not_exists()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(product_image::Entity).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(product_variant::Entity).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(product::Entity).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(category::Entity).to_owned())
                .await
        }
    }
}

mod m20240301_000002_create_customer_tables {
    use crate::entities::{customer, customer_price, discount, wishlist_item};
    use sea_orm::Schema;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000002_create_customer_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            let schema = Schema::new(manager.get_database_backend());

            manager
                .create_table(
                    schema
                        .create_table_from_entity(customer::Entity)
                        .if_not_exists()
                        .to_owned(),
                )
                .await?;
            manager
                .create_table(
                    schema
                        .create_table_from_entity(customer_price::Entity)
                        .if_not_exists()
                        .to_owned(),
                )
                .await?;
            manager
                .create_table(
                    schema
                        .create_table_from_entity(discount::Entity)
                        .if_not_exists()
                        .to_owned(),
                )
                .await?;
            manager
                .create_table(
                    schema
                        .create_table_from_entity(wishlist_item::Entity)
                        .if_not_exists()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(wishlist_item::Entity).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(discount::Entity).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(customer_price::Entity).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(customer::Entity).to_owned())
                .await
        }
    }
}

mod m20240301_000003_create_order_tables {
    use crate::entities::{order, order_item, order_status_history};
    use sea_orm::Schema;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000003_create_order_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            let schema = Schema::new(manager.get_database_backend());

            manager
                .create_table(
                    schema
                        .create_table_from_entity(order::Entity)
                        .if_not_exists()
                        .to_owned(),
                )
                .await?;
            manager
                .create_table(
                    schema
                        .create_table_from_entity(order_item::Entity)
                        .if_not_exists()
                        .to_owned(),
                )
                .await?;
            manager
                .create_table(
                    schema
                        .create_table_from_entity(order_status_history::Entity)
                        .if_not_exists()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(
                    Table::drop()
                        .table(order_status_history::Entity)
                        .to_owned(),
                )
                .await?;
            manager
                .drop_table(Table::drop().table(order_item::Entity).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(order::Entity).to_owned())
                .await
        }
    }
}

mod m20240301_000004_create_inventory_tables {
    use crate::entities::{inventory_movement, stock_alert};
    use sea_orm::Schema;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000004_create_inventory_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            let schema = Schema::new(manager.get_database_backend());

            manager
                .create_table(
                    schema
                        .create_table_from_entity(inventory_movement::Entity)
                        .if_not_exists()
                        .to_owned(),
                )
                .await?;
            manager
                .create_table(
                    schema
                        .create_table_from_entity(stock_alert::Entity)
                        .if_not_exists()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(stock_alert::Entity).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(inventory_movement::Entity).to_owned())
                .await
        }
    }
}

mod m20240301_000005_create_indexes {
    use crate::entities::{customer_price, inventory_movement, product, stock_alert, wishlist_item};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000005_create_indexes"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_index(
                    Index::create()
                        .name("idx_customer_prices_pair")
                        .table(customer_price::Entity)
                        .col(customer_price::Column::CustomerId)
                        .col(customer_price::Column::ProductId)
                        .unique()
                        .if_not_exists()
                        .to_owned(),
                )
                .await?;
            manager
                .create_index(
                    Index::create()
                        .name("idx_wishlist_items_pair")
                        .table(wishlist_item::Entity)
                        .col(wishlist_item::Column::CustomerId)
                        .col(wishlist_item::Column::ProductId)
                        .unique()
                        .if_not_exists()
                        .to_owned(),
                )
                .await?;
            manager
                .create_index(
                    Index::create()
                        .name("idx_inventory_movements_product")
                        .table(inventory_movement::Entity)
                        .col(inventory_movement::Column::ProductId)
                        .col(inventory_movement::Column::CreatedAt)
                        .if_not_exists()
                        .to_owned(),
                )
                .await?;
            manager
                .create_index(
                    Index::create()
                        .name("idx_stock_alerts_open")
                        .table(stock_alert::Entity)
                        .col(stock_alert::Column::ProductId)
                        .col(stock_alert::Column::Resolved)
                        .if_not_exists()
                        .to_owned(),
                )
                .await?;
            manager
                .create_index(
                    Index::create()
                        .name("idx_products_category")
                        .table(product::Entity)
                        .col(product::Column::CategoryId)
                        .if_not_exists()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_index(
                    Index::drop()
                        .name("idx_products_category")
                        .table(product::Entity)
                        .to_owned(),
                )
                .await?;
            manager
                .drop_index(
                    Index::drop()
                        .name("idx_stock_alerts_open")
                        .table(stock_alert::Entity)
                        .to_owned(),
                )
                .await?;
            manager
                .drop_index(
                    Index::drop()
                        .name("idx_inventory_movements_product")
                        .table(inventory_movement::Entity)
                        .to_owned(),
                )
                .await?;
            manager
                .drop_index(
                    Index::drop()
                        .name("idx_wishlist_items_pair")
                        .table(wishlist_item::Entity)
                        .to_owned(),
                )
                .await?;
            manager
                .drop_index(
                    Index::drop()
                        .name("idx_customer_prices_pair")
                        .table(customer_price::Entity)
                        .to_owned(),
                )
                .await
        }
    }
}
