use serde::Deserialize;

use crate::error::ApiError;

/// Request body for recording a purchase. The buyer comes from the token.
#[derive(Debug, Deserialize)]
pub struct CreatePurchaseRequest {
    pub product_id: i64,
    pub quantity: i32,
}

impl CreatePurchaseRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.product_id <= 0 {
            return Err(ApiError::Validation(
                "product_id must be a positive integer".into(),
            ));
        }
        if self.quantity <= 0 {
            return Err(ApiError::Validation(
                "quantity must be a positive integer".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_positive_values() {
        let req = CreatePurchaseRequest {
            product_id: 1,
            quantity: 3,
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn rejects_zero_or_negative_quantity() {
        for quantity in [0, -1] {
            let req = CreatePurchaseRequest {
                product_id: 1,
                quantity,
            };
            assert!(req.validate().is_err());
        }
    }

    #[test]
    fn rejects_non_positive_product_id() {
        let req = CreatePurchaseRequest {
            product_id: 0,
            quantity: 1,
        };
        assert!(req.validate().is_err());
    }
}
