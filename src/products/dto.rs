use serde::Serialize;
use sqlx::types::Decimal;
use time::OffsetDateTime;

use crate::error::ApiError;
use crate::products::images::public_image_url;
use crate::products::repo::Product;

/// Fields collected from the multipart form. Everything is optional at parse
/// time; `into_new_product` enforces the create contract, `validate_update`
/// only bounds-checks whatever was supplied.
#[derive(Debug, Default)]
pub struct ProductForm {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub stock: Option<i32>,
    pub categories: Option<Vec<i64>>,
}

/// A fully validated create payload.
#[derive(Debug)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub stock: i32,
    pub categories: Vec<i64>,
}

impl ProductForm {
    pub fn into_new_product(self) -> Result<NewProduct, ApiError> {
        let name = self
            .name
            .ok_or_else(|| ApiError::Validation("name is required".into()))?;
        if name.len() < 3 || name.len() > 255 {
            return Err(ApiError::Validation(
                "name must be between 3 and 255 characters".into(),
            ));
        }
        let price = self
            .price
            .ok_or_else(|| ApiError::Validation("price is required".into()))?;
        if price < Decimal::ZERO {
            return Err(ApiError::Validation("price must not be negative".into()));
        }
        let stock = self
            .stock
            .ok_or_else(|| ApiError::Validation("stock is required".into()))?;
        if stock < 0 {
            return Err(ApiError::Validation("stock must not be negative".into()));
        }
        Ok(NewProduct {
            name,
            description: self.description,
            price,
            stock,
            categories: self.categories.unwrap_or_default(),
        })
    }

    pub fn validate_update(&self) -> Result<(), ApiError> {
        if let Some(ref name) = self.name {
            if name.len() < 3 || name.len() > 255 {
                return Err(ApiError::Validation(
                    "name must be between 3 and 255 characters".into(),
                ));
            }
        }
        if let Some(price) = self.price {
            if price < Decimal::ZERO {
                return Err(ApiError::Validation("price must not be negative".into()));
            }
        }
        if let Some(stock) = self.stock {
            if stock < 0 {
                return Err(ApiError::Validation("stock must not be negative".into()));
            }
        }
        Ok(())
    }
}

/// Product as returned to clients: raw filename replaced by an absolute URL.
#[derive(Debug, Serialize)]
pub struct ProductResponse {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub stock: i32,
    pub categories: Vec<i64>,
    pub image_url: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl ProductResponse {
    pub fn from_product(p: Product, base_url: &str) -> Self {
        let image_url = p
            .image_filename
            .as_deref()
            .and_then(|f| public_image_url(base_url, &p.categories, f));
        Self {
            id: p.id,
            name: p.name,
            description: p.description,
            price: p.price,
            stock: p.stock,
            categories: p.categories,
            image_url,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(name: Option<&str>, price: Option<&str>, stock: Option<i32>) -> ProductForm {
        ProductForm {
            name: name.map(|s| s.to_string()),
            description: None,
            price: price.map(|p| p.parse().unwrap()),
            stock,
            categories: None,
        }
    }

    #[test]
    fn create_requires_name_price_stock() {
        assert!(form(None, Some("10"), Some(5)).into_new_product().is_err());
        assert!(form(Some("Widget"), None, Some(5)).into_new_product().is_err());
        assert!(form(Some("Widget"), Some("10"), None).into_new_product().is_err());
        assert!(form(Some("Widget"), Some("10"), Some(5)).into_new_product().is_ok());
    }

    #[test]
    fn create_rejects_negative_price_and_stock() {
        assert!(form(Some("Widget"), Some("-1"), Some(5)).into_new_product().is_err());
        assert!(form(Some("Widget"), Some("10"), Some(-1)).into_new_product().is_err());
    }

    #[test]
    fn create_rejects_short_name() {
        assert!(form(Some("ab"), Some("10"), Some(5)).into_new_product().is_err());
    }

    #[test]
    fn create_defaults_categories_to_empty() {
        let new = form(Some("Widget"), Some("10"), Some(5))
            .into_new_product()
            .unwrap();
        assert!(new.categories.is_empty());
    }

    #[test]
    fn update_allows_everything_omitted() {
        assert!(ProductForm::default().validate_update().is_ok());
    }

    #[test]
    fn update_bounds_checks_supplied_fields() {
        assert!(form(Some("ab"), None, None).validate_update().is_err());
        assert!(form(None, Some("-2"), None).validate_update().is_err());
        assert!(form(None, None, Some(-3)).validate_update().is_err());
        assert!(form(Some("Widget"), Some("2"), Some(3)).validate_update().is_ok());
    }

    #[test]
    fn response_builds_image_url_from_first_category() {
        let p = Product {
            id: 1,
            name: "Widget".into(),
            description: None,
            price: "10".parse().unwrap(),
            stock: 5,
            image_filename: Some("a.png".into()),
            created_at: OffsetDateTime::now_utc(),
            updated_at: OffsetDateTime::now_utc(),
            categories: vec![2, 9],
        };
        let resp = ProductResponse::from_product(p, "http://localhost:3000");
        assert_eq!(
            resp.image_url.as_deref(),
            Some("http://localhost:3000/uploads/2/a.png")
        );
    }
}
