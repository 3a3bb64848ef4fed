//! Service layer: the order lifecycle engine, the catalog service, and the
//! response envelopes they hand to the HTTP boundary.

pub mod catalog;
pub mod orders;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::aggregates::order::{Order, OrderStatus};
use crate::domain::aggregates::product::Product;
use crate::domain::value_objects::{PageMeta, Paging, ShippingAddress};
use crate::{CommerceError, Result};

pub use catalog::CatalogService;
pub use orders::{CreateOrder, OrderService};

/// Applies the pagination defaults and bounds shared by every listing
/// operation.
pub(crate) fn resolve_paging(page: Option<u32>, limit: Option<u32>) -> Result<Paging> {
    let page = page.unwrap_or(Paging::DEFAULT_PAGE);
    let limit = limit.unwrap_or(Paging::DEFAULT_LIMIT);
    if page < 1 || limit < 1 {
        tracing::warn!(page, limit, "invalid pagination parameters");
        return Err(CommerceError::Validation(
            "Page and limit must be positive numbers".into(),
        ));
    }
    Ok(Paging { page, limit })
}

/// JSON envelope every operation returns: `data`, plus an optional `message`
/// and pagination `meta`.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<PageMeta>,
}

impl<T> Envelope<T> {
    pub fn new(data: T) -> Self {
        Self { message: None, data, meta: None }
    }

    pub fn paged(data: T, meta: PageMeta) -> Self {
        Self { message: None, data, meta: Some(meta) }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Populated user reference inside an order view. `email` only appears on
/// admin listings.
#[derive(Clone, Debug, Serialize)]
pub struct UserSummary {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Populated product reference inside an order line item.
#[derive(Clone, Debug, Serialize)]
pub struct ProductSummary {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub price: Decimal,
}

/// One order line with its product populated. The product is `null` when it
/// has since been removed from the catalog.
#[derive(Clone, Debug, Serialize)]
pub struct ItemView {
    pub product: Option<ProductSummary>,
    pub quantity: u32,
    pub price: Decimal,
}

/// The order as returned to API callers.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub user: Option<UserSummary>,
    pub items: Vec<ItemView>,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_address: Option<ShippingAddress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderView {
    pub fn assemble(order: Order, user: Option<UserSummary>, products: &[Product]) -> Self {
        let items = order
            .items
            .iter()
            .map(|item| ItemView {
                product: products.iter().find(|p| p.id == item.product).map(|p| ProductSummary {
                    id: p.id,
                    name: p.name.clone(),
                    price: p.price,
                }),
                quantity: item.quantity,
                price: item.price,
            })
            .collect();
        OrderView {
            id: order.id,
            user,
            items,
            total_amount: order.total_amount,
            status: order.status,
            shipping_address: order.shipping_address,
            payment: order.payment,
            return_reason: order.return_reason,
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_skips_absent_message_and_meta() {
        let json = serde_json::to_value(Envelope::new(7)).unwrap();
        assert_eq!(json, serde_json::json!({ "data": 7 }));

        let json =
            serde_json::to_value(Envelope::new(7).with_message("done")).unwrap();
        assert_eq!(json, serde_json::json!({ "message": "done", "data": 7 }));
    }
}
