//! Relational product repository.
//!
//! SQLite via `SQLx`. Stock changes are single conditional `UPDATE ...
//! RETURNING` statements; the affected-row result is the only guard, so
//! several service instances can share one database file.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tracing::{debug, info, warn};

use crate::domain::catalog::{
    AmountCheck, CatalogError, DeleteOutcome, NewProduct, Page, Product, ProductPage,
    ProductRepository, ProductUpdate, PurchaseOrder, PurchaseRecord, PurchasedProduct,
    StockAdjustment, purchase::sort_history,
};
use crate::domain::shared::{ProductId, PurchaseId, RequestContext, UserId};

const SCHEMA: &[&str] = &[
    r"
    CREATE TABLE IF NOT EXISTS products (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        name        TEXT    NOT NULL,
        description TEXT    NOT NULL DEFAULT '',
        price       TEXT    NOT NULL,
        amount      INTEGER NOT NULL CHECK (amount >= 0),
        created_at  TEXT    NOT NULL,
        updated_at  TEXT    NOT NULL
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS users_products (
        id           INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id      TEXT    NOT NULL,
        product_id   INTEGER NOT NULL,
        amount       INTEGER NOT NULL CHECK (amount > 0),
        purchased_at TEXT    NOT NULL
    )
    ",
    "CREATE INDEX IF NOT EXISTS idx_users_products_user_id ON users_products (user_id)",
];

const PRODUCT_COLUMNS: &str = "id, name, description, price, amount, created_at, updated_at";

// SQLITE_BUSY / SQLITE_LOCKED
const BUSY_CODES: &[&str] = &["5", "6"];

/// `ProductRepository` backed by SQLite.
#[derive(Debug, Clone)]
pub struct SqlProductRepository {
    pool: SqlitePool,
}

impl SqlProductRepository {
    /// Connect to `database_url` and create the schema if needed.
    ///
    /// A missing parent directory of the database file is created first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, CatalogError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| CatalogError::Unavailable {
                message: format!("invalid database url: {e}"),
            })?
            .create_if_missing(true);

        if let Some(parent) = options
            .get_filename()
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CatalogError::Unavailable {
                    message: format!("cannot create database directory '{}': {e}", parent.display()),
                })?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect_with(options)
            .await
            .map_err(|e| store_error("connect", e, false))?;

        info!(max_connections, "SQLite connection pool initialized");

        let repo = Self { pool };
        repo.migrate().await?;
        Ok(repo)
    }

    /// Private in-memory database on a single pinned connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub async fn in_memory() -> Result<Self, CatalogError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| store_error("connect", e, false))?;

        let repo = Self { pool };
        repo.migrate().await?;
        Ok(repo)
    }

    async fn migrate(&self) -> Result<(), CatalogError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| store_error("migrate", e, true))?;
        }
        debug!("SQLite schema ready");
        Ok(())
    }

    async fn fetch_product(&self, id: ProductId) -> Result<Option<Product>, CatalogError> {
        let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?"))
            .bind(id.value())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_error("get_by_id", e, false))?;
        row.as_ref().map(row_to_product).transpose()
    }

    async fn insert_purchase<'e, E>(
        executor: E,
        order: &PurchaseOrder,
        purchased_at: DateTime<Utc>,
    ) -> Result<(), CatalogError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        sqlx::query(
            r"
            INSERT INTO users_products (user_id, product_id, amount, purchased_at)
            VALUES (?, ?, ?, ?)
            ",
        )
        .bind(order.user_id.as_str())
        .bind(order.product_id.value())
        .bind(order.amount)
        .bind(purchased_at)
        .execute(executor)
        .await
        .map_err(|e| store_error("buy_product", e, true))?;
        Ok(())
    }

    async fn buy_with_debit(
        &self,
        order: &PurchaseOrder,
        now: DateTime<Utc>,
    ) -> Result<Product, CatalogError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| store_error("buy_product", e, true))?;

        let row = sqlx::query(&format!(
            r"
            UPDATE products SET amount = amount - ?, updated_at = ?
            WHERE id = ? AND amount >= ?
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(order.amount)
        .bind(now)
        .bind(order.product_id.value())
        .bind(order.amount)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| store_error("buy_product", e, true))?;

        let Some(row) = row else {
            let available: Option<i64> = sqlx::query_scalar("SELECT amount FROM products WHERE id = ?")
                .bind(order.product_id.value())
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| store_error("buy_product", e, false))?;
            return Err(available.map_or_else(
                || CatalogError::product_not_found(order.product_id),
                |available| CatalogError::InsufficientStock {
                    product_id: order.product_id,
                    requested: order.amount,
                    available,
                },
            ));
        };
        let product = row_to_product(&row)?;

        Self::insert_purchase(&mut *tx, order, now).await?;
        tx.commit()
            .await
            .map_err(|e| store_error("buy_product", e, true))?;
        Ok(product)
    }
}

/// Map a driver error; pool exhaustion, I/O, and lock contention are transient.
fn store_error(operation: &str, err: sqlx::Error, write: bool) -> CatalogError {
    let transient = match &err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => true,
        sqlx::Error::Database(db) => db
            .code()
            .is_some_and(|code| BUSY_CODES.iter().any(|busy| *busy == code)),
        _ => false,
    };
    if transient {
        CatalogError::Unavailable {
            message: format!("{operation}: {err}"),
        }
    } else if write {
        CatalogError::write(operation, err.to_string())
    } else {
        CatalogError::storage(operation, err.to_string())
    }
}

fn column<T>(row: &SqliteRow, name: &str) -> Result<T, CatalogError>
where
    T: for<'r> sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get::<T, _>(name)
        .map_err(|e| CatalogError::storage("decode", format!("{name}: {e}")))
}

fn row_to_product(row: &SqliteRow) -> Result<Product, CatalogError> {
    let price: String = column(row, "price")?;
    let price = Decimal::from_str(&price)
        .map_err(|e| CatalogError::storage("decode", format!("price: {e}")))?;

    Ok(Product {
        id: ProductId::new(column(row, "id")?),
        name: column(row, "name")?,
        description: column(row, "description")?,
        price,
        amount: column(row, "amount")?,
        created_at: column(row, "created_at")?,
        updated_at: column(row, "updated_at")?,
    })
}

fn row_to_history_entry(row: &SqliteRow) -> Result<PurchasedProduct, CatalogError> {
    let purchase = PurchaseRecord {
        id: PurchaseId::new(column(row, "purchase_id")?),
        user_id: UserId::new(column::<String>(row, "user_id")?),
        product_id: ProductId::new(column(row, "product_id")?),
        quantity: column(row, "quantity")?,
        purchased_at: column(row, "purchased_at")?,
    };
    let product = match column::<Option<i64>>(row, "id")? {
        Some(_) => Some(row_to_product(row)?),
        None => None,
    };
    Ok(PurchasedProduct::resolve(purchase, product))
}

#[async_trait]
impl ProductRepository for SqlProductRepository {
    async fn create(
        &self,
        ctx: &RequestContext,
        product: NewProduct,
    ) -> Result<Product, CatalogError> {
        ctx.run("create", async {
            let now = Utc::now();
            let row = sqlx::query(&format!(
                r"
                INSERT INTO products (name, description, price, amount, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?)
                RETURNING {PRODUCT_COLUMNS}
                "
            ))
            .bind(&product.name)
            .bind(&product.description)
            .bind(product.price.to_string())
            .bind(product.amount)
            .bind(now)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| store_error("create", e, true))?;

            let created = row_to_product(&row)?;
            info!(product_id = %created.id, "Product created");
            Ok(created)
        })
        .await
    }

    async fn get_by_id(&self, ctx: &RequestContext, id: ProductId) -> Result<Product, CatalogError> {
        ctx.run("get_by_id", async {
            let product = self.fetch_product(id).await?;
            debug!(product_id = %id, found = product.is_some(), "Product lookup");
            product.ok_or_else(|| CatalogError::product_not_found(id))
        })
        .await
    }

    async fn update(
        &self,
        ctx: &RequestContext,
        id: ProductId,
        update: ProductUpdate,
    ) -> Result<Product, CatalogError> {
        ctx.run("update", async {
            let row = sqlx::query(&format!(
                r"
                UPDATE products
                SET name = ?, description = ?, price = ?, amount = ?, updated_at = ?
                WHERE id = ?
                RETURNING {PRODUCT_COLUMNS}
                "
            ))
            .bind(&update.name)
            .bind(&update.description)
            .bind(update.price.to_string())
            .bind(update.amount)
            .bind(Utc::now())
            .bind(id.value())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_error("update", e, true))?
            .ok_or_else(|| CatalogError::product_not_found(id))?;

            info!(product_id = %id, "Product updated");
            row_to_product(&row)
        })
        .await
    }

    async fn delete(&self, ctx: &RequestContext, id: ProductId) -> Result<DeleteOutcome, CatalogError> {
        ctx.run("delete", async {
            let result = sqlx::query("DELETE FROM products WHERE id = ?")
                .bind(id.value())
                .execute(&self.pool)
                .await
                .map_err(|e| store_error("delete", e, true))?;

            if result.rows_affected() == 0 {
                return Err(CatalogError::product_not_found(id));
            }
            info!(product_id = %id, "Product deleted");
            Ok(DeleteOutcome { success: true })
        })
        .await
    }

    async fn list(&self, ctx: &RequestContext, page: Page) -> Result<ProductPage, CatalogError> {
        ctx.run("list", async {
            let offset = i64::try_from(page.offset()).unwrap_or(i64::MAX);
            let rows = sqlx::query(&format!(
                "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY id LIMIT ? OFFSET ?"
            ))
            .bind(i64::from(page.limit))
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| store_error("list", e, false))?;

            let products = rows
                .iter()
                .map(row_to_product)
                .collect::<Result<Vec<_>, _>>()?;

            debug!(page = page.page, limit = page.limit, count = products.len(), "Products listed");
            Ok(ProductPage::from(products))
        })
        .await
    }

    async fn increase_amount(
        &self,
        ctx: &RequestContext,
        id: ProductId,
        by: i64,
    ) -> Result<StockAdjustment, CatalogError> {
        ctx.run("increase_amount", async {
            // SQLite silently promotes overflowing integers to REAL; guard instead.
            let row = sqlx::query(&format!(
                r"
                UPDATE products SET amount = amount + ?, updated_at = ?
                WHERE id = ? AND amount <= ?
                RETURNING {PRODUCT_COLUMNS}
                "
            ))
            .bind(by)
            .bind(Utc::now())
            .bind(id.value())
            .bind(i64::MAX.saturating_sub(by))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_error("increase_amount", e, true))?;

            let Some(row) = row else {
                return match self.fetch_product(id).await? {
                    Some(_) => Err(CatalogError::write(
                        "increase_amount",
                        format!("amount of product {id} would overflow"),
                    )),
                    None => Err(CatalogError::product_not_found(id)),
                };
            };

            let product = row_to_product(&row)?;
            info!(product_id = %id, by, amount = product.amount, "Stock increased");
            Ok(StockAdjustment::applied(product))
        })
        .await
    }

    async fn decrease_amount(
        &self,
        ctx: &RequestContext,
        id: ProductId,
        by: i64,
    ) -> Result<StockAdjustment, CatalogError> {
        ctx.run("decrease_amount", async {
            let row = sqlx::query(&format!(
                r"
                UPDATE products SET amount = amount - ?, updated_at = ?
                WHERE id = ? AND amount >= ?
                RETURNING {PRODUCT_COLUMNS}
                "
            ))
            .bind(by)
            .bind(Utc::now())
            .bind(id.value())
            .bind(by)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_error("decrease_amount", e, true))?;

            if let Some(row) = row {
                let product = row_to_product(&row)?;
                info!(product_id = %id, by, amount = product.amount, "Stock decreased");
                return Ok(StockAdjustment::applied(product));
            }

            let product = self
                .fetch_product(id)
                .await?
                .ok_or_else(|| CatalogError::product_not_found(id))?;
            let refused = StockAdjustment::refused(product);
            warn!(
                product_id = %id,
                by,
                amount = refused.product.amount,
                reason = ?refused.reason,
                "Stock decrease refused"
            );
            Ok(refused)
        })
        .await
    }

    async fn check_amount(&self, ctx: &RequestContext, id: ProductId) -> Result<AmountCheck, CatalogError> {
        ctx.run("check_amount", async {
            let amount: Option<i64> = sqlx::query_scalar("SELECT amount FROM products WHERE id = ?")
                .bind(id.value())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| store_error("check_amount", e, false))?;

            amount
                .map(|amount| AmountCheck {
                    product_id: id,
                    amount,
                })
                .ok_or_else(|| CatalogError::product_not_found(id))
        })
        .await
    }

    async fn buy_product(
        &self,
        ctx: &RequestContext,
        order: PurchaseOrder,
    ) -> Result<Product, CatalogError> {
        ctx.run("buy_product", async {
            let now = Utc::now();
            let product = if order.debit_stock {
                self.buy_with_debit(&order, now).await?
            } else {
                Self::insert_purchase(&self.pool, &order, now).await?;
                self.fetch_product(order.product_id)
                    .await?
                    .ok_or_else(|| CatalogError::product_not_found(order.product_id))?
            };

            info!(
                user_id = %order.user_id,
                product_id = %order.product_id,
                quantity = order.amount,
                debit_stock = order.debit_stock,
                "Purchase recorded"
            );
            Ok(product)
        })
        .await
    }

    async fn purchased_products_by_user(
        &self,
        ctx: &RequestContext,
        user_id: &UserId,
    ) -> Result<Vec<PurchasedProduct>, CatalogError> {
        ctx.run("purchased_products_by_user", async {
            let rows = sqlx::query(
                r"
                SELECT up.id AS purchase_id, up.user_id, up.product_id,
                       up.amount AS quantity, up.purchased_at,
                       p.id, p.name, p.description, p.price, p.amount,
                       p.created_at, p.updated_at
                FROM users_products up
                LEFT JOIN products p ON p.id = up.product_id
                WHERE up.user_id = ?
                ORDER BY up.id
                ",
            )
            .bind(user_id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| store_error("purchased_products_by_user", e, false))?;

            let mut history = rows
                .iter()
                .map(row_to_history_entry)
                .collect::<Result<Vec<_>, _>>()?;
            sort_history(&mut history);

            debug!(user_id = %user_id, count = history.len(), "Purchase history loaded");
            Ok(history)
        })
        .await
    }

    async fn close(&self) -> Result<(), CatalogError> {
        self.pool.close().await;
        info!("SQLite connection pool closed");
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::StockReason;
    use rust_decimal_macros::dec;

    async fn repo() -> SqlProductRepository {
        SqlProductRepository::in_memory().await.unwrap()
    }

    #[tokio::test]
    async fn connect_creates_missing_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing_dir").join("x.db");
        let url = format!("sqlite://{}?mode=rwc", path.display());

        let repo = SqlProductRepository::connect(&url, 2, Duration::from_secs(5))
            .await
            .unwrap();
        let ctx = RequestContext::background();
        let created = repo
            .create(&ctx, NewProduct::new("Shelf", "pine", dec!(40.00), 2))
            .await
            .unwrap();
        repo.close().await.unwrap();

        assert!(path.exists());
        let reopened = SqlProductRepository::connect(&url, 2, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(reopened.get_by_id(&ctx, created.id).await.unwrap().name, "Shelf");
    }

    #[tokio::test]
    async fn create_assigns_id_and_timestamps() {
        let repo = repo().await;
        let ctx = RequestContext::background();

        let created = repo
            .create(&ctx, NewProduct::new("Desk", "oak", dec!(250.00), 3))
            .await
            .unwrap();

        assert_eq!(created.id, ProductId::new(1));
        assert_eq!(created.price, dec!(250.00));
        assert_eq!(created.created_at, created.updated_at);
        assert_eq!(repo.get_by_id(&ctx, created.id).await.unwrap(), created);
    }

    #[tokio::test]
    async fn decrease_to_zero_then_out_of_stock() {
        let repo = repo().await;
        let ctx = RequestContext::background();
        let p = repo
            .create(&ctx, NewProduct::new("Chair", "", dec!(40), 2))
            .await
            .unwrap();

        let applied = repo.decrease_amount(&ctx, p.id, 2).await.unwrap();
        assert!(applied.is_enough);
        assert_eq!(applied.product.amount, 0);

        let refused = repo.decrease_amount(&ctx, p.id, 1).await.unwrap();
        assert!(!refused.is_enough);
        assert_eq!(refused.reason, StockReason::OutOfStock);
    }

    #[tokio::test]
    async fn increase_near_max_is_write_error() {
        let repo = repo().await;
        let ctx = RequestContext::background();
        let p = repo
            .create(&ctx, NewProduct::new("Screw", "", dec!(0.01), i64::MAX - 1))
            .await
            .unwrap();

        let err = repo.increase_amount(&ctx, p.id, 2).await.unwrap_err();
        assert!(matches!(err, CatalogError::Write { .. }));
        let ok = repo.increase_amount(&ctx, p.id, 1).await.unwrap();
        assert_eq!(ok.product.amount, i64::MAX);
    }

    #[tokio::test]
    async fn debit_purchase_rolls_back_on_insufficient_stock() {
        let repo = repo().await;
        let ctx = RequestContext::background();
        let p = repo
            .create(&ctx, NewProduct::new("Table", "", dec!(99), 1))
            .await
            .unwrap();

        let err = repo
            .buy_product(&ctx, PurchaseOrder::with_debit("u1", p.id, 2))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            CatalogError::InsufficientStock {
                product_id: p.id,
                requested: 2,
                available: 1,
            }
        );

        let history = repo
            .purchased_products_by_user(&ctx, &UserId::new("u1"))
            .await
            .unwrap();
        assert!(history.is_empty());
        assert_eq!(repo.check_amount(&ctx, p.id).await.unwrap().amount, 1);
    }

    #[tokio::test]
    async fn closed_pool_is_unavailable() {
        let repo = repo().await;
        repo.close().await.unwrap();

        let err = repo
            .get_by_id(&RequestContext::background(), ProductId::new(1))
            .await
            .unwrap_err();
        assert!(err.is_transient(), "expected transient error, got {err:?}");
    }

    #[tokio::test]
    async fn file_database_persists_across_connections() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("catalog.db").display());
        let ctx = RequestContext::background();

        let repo = SqlProductRepository::connect(&url, 2, Duration::from_secs(1))
            .await
            .unwrap();
        let p = repo
            .create(&ctx, NewProduct::new("Shelf", "", dec!(15), 4))
            .await
            .unwrap();
        repo.close().await.unwrap();

        let reopened = SqlProductRepository::connect(&url, 2, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(reopened.check_amount(&ctx, p.id).await.unwrap().amount, 4);
    }
}
