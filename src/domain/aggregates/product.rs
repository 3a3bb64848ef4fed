//! Product catalog record, as the order engine sees it.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Catalog product. The order engine only reads `stock` and `is_active`;
/// everything else is carried for the catalog endpoints and order views.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub price: Decimal,
    pub stock: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn has_stock_for(&self, quantity: u32) -> bool {
        self.stock >= i64::from(quantity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stock_check_is_inclusive() {
        let now = Utc::now();
        let product = Product {
            id: Uuid::now_v7(),
            name: "Widget".into(),
            description: None,
            price: Decimal::new(1000, 2),
            stock: 3,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        assert!(product.has_stock_for(3));
        assert!(product.has_stock_for(1));
        assert!(!product.has_stock_for(4));
    }
}
