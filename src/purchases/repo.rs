use serde::Serialize;
use sqlx::{types::Decimal, FromRow, PgPool};
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::error::ApiError;
use crate::messages;

/// Immutable record of a completed transaction. `total_price` is frozen at
/// purchase time; later price changes on the product do not affect it.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Purchase {
    pub id: i64,
    pub user_id: i64,
    pub product_id: i64,
    pub quantity: i32,
    pub total_price: Decimal,
    pub purchase_date: OffsetDateTime,
}

pub fn compute_total(unit_price: Decimal, quantity: i32) -> Decimal {
    unit_price * Decimal::from(quantity)
}

/// Stock guard: a purchase may take everything that is left, but not more.
pub fn check_stock(stock: i32, quantity: i32) -> Result<(), ApiError> {
    if stock < quantity {
        return Err(ApiError::BusinessRule(messages::INSUFFICIENT_STOCK.into()));
    }
    Ok(())
}

impl Purchase {
    /// Stock check, purchase insert and stock decrement as one all-or-nothing
    /// unit. The `FOR UPDATE` row lock serializes concurrent purchases of the
    /// same product, so two buyers can never both pass the stock check and
    /// drive stock negative.
    pub async fn create(
        db: &PgPool,
        user_id: i64,
        product_id: i64,
        quantity: i32,
    ) -> Result<Purchase, ApiError> {
        let mut tx = db.begin().await?;

        let row: Option<(Decimal, i32)> =
            sqlx::query_as("SELECT price, stock FROM products WHERE id = $1 FOR UPDATE")
                .bind(product_id)
                .fetch_optional(&mut *tx)
                .await?;

        let (price, stock) = row.ok_or_else(|| {
            warn!(product_id, "purchase against unknown product");
            ApiError::NotFound(messages::PRODUCT_NOT_FOUND.into())
        })?;

        if let Err(e) = check_stock(stock, quantity) {
            warn!(product_id, stock, quantity, "insufficient stock");
            return Err(e);
        }

        let total_price = compute_total(price, quantity);

        let purchase = sqlx::query_as::<_, Purchase>(
            r#"
            INSERT INTO purchases (user_id, product_id, quantity, total_price)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, product_id, quantity, total_price, purchase_date
            "#,
        )
        .bind(user_id)
        .bind(product_id)
        .bind(quantity)
        .bind(total_price)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE products SET stock = stock - $1 WHERE id = $2")
            .bind(quantity)
            .bind(product_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(
            purchase_id = purchase.id,
            user_id, product_id, quantity, %total_price,
            "purchase recorded"
        );
        Ok(purchase)
    }

    /// All purchases owned by a user, in insertion order.
    pub async fn find_by_user(db: &PgPool, user_id: i64) -> anyhow::Result<Vec<Purchase>> {
        let rows = sqlx::query_as::<_, Purchase>(
            r#"
            SELECT id, user_id, product_id, quantity, total_price, purchase_date
            FROM purchases
            WHERE user_id = $1
            ORDER BY id
            "#,
        )
        .bind(user_id)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }
}
