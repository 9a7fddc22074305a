use serde::Serialize;
use sqlx::{types::Decimal, FromRow, PgPool};
use time::OffsetDateTime;
use tracing::info;

use crate::products::dto::{NewProduct, ProductForm};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub stock: i32,
    pub image_filename: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    /// Materialized from product_categories on every read.
    pub categories: Vec<i64>,
}

const SELECT_WITH_CATEGORIES: &str = r#"
    SELECT p.id, p.name, p.description, p.price, p.stock, p.image_filename,
           p.created_at, p.updated_at,
           COALESCE(
               ARRAY_AGG(pc.category_id ORDER BY pc.category_id)
                   FILTER (WHERE pc.category_id IS NOT NULL),
               '{}'::BIGINT[]
           ) AS categories
    FROM products p
    LEFT JOIN product_categories pc ON pc.product_id = p.id
"#;

impl Product {
    pub async fn find_all(db: &PgPool) -> anyhow::Result<Vec<Product>> {
        let rows = sqlx::query_as::<_, Product>(&format!(
            "{} GROUP BY p.id ORDER BY p.id",
            SELECT_WITH_CATEGORIES
        ))
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    pub async fn find_by_id(db: &PgPool, id: i64) -> anyhow::Result<Option<Product>> {
        let row = sqlx::query_as::<_, Product>(&format!(
            "{} WHERE p.id = $1 GROUP BY p.id",
            SELECT_WITH_CATEGORIES
        ))
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(row)
    }

    /// Insert the row and its category associations in one transaction.
    pub async fn create(
        db: &PgPool,
        new: &NewProduct,
        image_filename: Option<&str>,
    ) -> anyhow::Result<Product> {
        let mut tx = db.begin().await?;

        info!(name = %new.name, "creating product");
        let (product_id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO products (name, description, price, stock, image_filename)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(&new.name)
        .bind(&new.description)
        .bind(new.price)
        .bind(new.stock)
        .bind(image_filename)
        .fetch_one(&mut *tx)
        .await?;

        for category_id in &new.categories {
            sqlx::query("INSERT INTO product_categories (product_id, category_id) VALUES ($1, $2)")
                .bind(product_id)
                .bind(category_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        info!(product_id, "product created");

        Self::find_by_id(db, product_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("product {} vanished after insert", product_id))
    }

    /// Sparse update: omitted scalar fields keep their value; a supplied
    /// category list replaces the whole association set. Returns None when
    /// the id does not exist.
    pub async fn update(
        db: &PgPool,
        id: i64,
        changes: &ProductForm,
        image_filename: Option<&str>,
    ) -> anyhow::Result<Option<Product>> {
        let mut tx = db.begin().await?;

        info!(product_id = id, "updating product");
        let result = sqlx::query(
            r#"
            UPDATE products
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                price = COALESCE($4, price),
                stock = COALESCE($5, stock),
                image_filename = COALESCE($6, image_filename),
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&changes.name)
        .bind(&changes.description)
        .bind(changes.price)
        .bind(changes.stock)
        .bind(image_filename)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        if let Some(ref categories) = changes.categories {
            sqlx::query("DELETE FROM product_categories WHERE product_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            for category_id in categories {
                sqlx::query(
                    "INSERT INTO product_categories (product_id, category_id) VALUES ($1, $2)",
                )
                .bind(id)
                .bind(category_id)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        info!(product_id = id, "product updated");

        Self::find_by_id(db, id).await
    }

    /// Category associations go with the row via ON DELETE CASCADE.
    pub async fn delete(db: &PgPool, id: i64) -> anyhow::Result<bool> {
        info!(product_id = id, "deleting product");
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
