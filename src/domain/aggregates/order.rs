//! Order aggregate and its status state machine.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::value_objects::ShippingAddress;

/// Days after delivery during which a return may still be requested.
pub const RETURN_WINDOW_DAYS: i64 = 30;

const MS_PER_DAY: i64 = 86_400_000;

/// Closed order status enumeration. Wire strings are the lowercase forms,
/// including the two-word return states.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "processing")]
    Processing,
    #[serde(rename = "shipped")]
    Shipped,
    #[serde(rename = "delivered")]
    Delivered,
    #[serde(rename = "cancelled")]
    Cancelled,
    #[serde(rename = "return requested")]
    ReturnRequested,
    #[serde(rename = "return approved")]
    ReturnApproved,
    #[serde(rename = "return rejected")]
    ReturnRejected,
    #[serde(rename = "returned")]
    Returned,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 9] = [
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
        OrderStatus::ReturnRequested,
        OrderStatus::ReturnApproved,
        OrderStatus::ReturnRejected,
        OrderStatus::Returned,
    ];

    pub fn parse(value: &str) -> Option<OrderStatus> {
        match value {
            "pending" => Some(OrderStatus::Pending),
            "processing" => Some(OrderStatus::Processing),
            "shipped" => Some(OrderStatus::Shipped),
            "delivered" => Some(OrderStatus::Delivered),
            "cancelled" => Some(OrderStatus::Cancelled),
            "return requested" => Some(OrderStatus::ReturnRequested),
            "return approved" => Some(OrderStatus::ReturnApproved),
            "return rejected" => Some(OrderStatus::ReturnRejected),
            "returned" => Some(OrderStatus::Returned),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::ReturnRequested => "return requested",
            OrderStatus::ReturnApproved => "return approved",
            OrderStatus::ReturnRejected => "return rejected",
            OrderStatus::Returned => "returned",
        }
    }

    /// Only orders that have not shipped yet can be cancelled.
    pub fn can_cancel(self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Processing)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One product + quantity + unit price entry within an order. Immutable once
/// the order is created.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub product: Uuid,
    pub quantity: u32,
    pub price: Decimal,
}

impl LineItem {
    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

/// Rejected status transition. Messages are user-visible.
#[derive(Debug, Error)]
pub enum TransitionError {
    #[error("Order cannot be cancelled. Status: {status}")]
    NotCancellable { status: OrderStatus },
    #[error("A return can only be requested for a delivered order. Current status: {status}")]
    NotReturnable { status: OrderStatus },
    #[error("The {}-day return window for this order has expired.", RETURN_WINDOW_DAYS)]
    ReturnWindowExpired,
}

/// The order aggregate. `items` and `total_amount` are fixed at creation;
/// `status` only moves through the methods below (or the admin override).
/// Timestamps are maintained by the store.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub user: Uuid,
    pub items: Vec<LineItem>,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub shipping_address: Option<ShippingAddress>,
    pub payment: Option<Uuid>,
    pub return_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Total as fixed at creation time: Σ quantity × unit price. Never
    /// recomputed after the order is persisted.
    pub fn compute_total(items: &[LineItem]) -> Decimal {
        items.iter().map(LineItem::line_total).sum()
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.user == user_id
    }

    /// pending/processing -> cancelled. The caller restores stock.
    pub fn cancel(&mut self) -> Result<(), TransitionError> {
        if !self.status.can_cancel() {
            return Err(TransitionError::NotCancellable { status: self.status });
        }
        self.status = OrderStatus::Cancelled;
        Ok(())
    }

    /// delivered -> return requested. The window is counted in whole days
    /// (rounded up) from the last update, which stands in for the delivery
    /// timestamp. No stock changes on this path.
    pub fn request_return(
        &mut self,
        reason: String,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        if self.status != OrderStatus::Delivered {
            return Err(TransitionError::NotReturnable { status: self.status });
        }
        if days_between(self.updated_at, now) > RETURN_WINDOW_DAYS {
            return Err(TransitionError::ReturnWindowExpired);
        }
        self.status = OrderStatus::ReturnRequested;
        self.return_reason = Some(reason);
        Ok(())
    }

    /// Admin override: any enum member may be written regardless of the
    /// current status. Parsing the wire value is the only guard.
    pub fn force_status(&mut self, status: OrderStatus) {
        self.status = status;
    }
}

/// Whole-day distance between two instants, rounded up.
fn days_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> i64 {
    let ms = later.signed_duration_since(earlier).num_milliseconds().abs();
    (ms + MS_PER_DAY - 1) / MS_PER_DAY
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn order_with_status(status: OrderStatus) -> Order {
        let now = Utc::now();
        Order {
            id: Uuid::now_v7(),
            user: Uuid::now_v7(),
            items: vec![LineItem {
                product: Uuid::now_v7(),
                quantity: 2,
                price: Decimal::new(1000, 2),
            }],
            total_amount: Decimal::new(2000, 2),
            status,
            shipping_address: None,
            payment: None,
            return_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn status_wire_strings_round_trip() {
        for status in OrderStatus::ALL {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(OrderStatus::parse("return requested"), Some(OrderStatus::ReturnRequested));
        assert_eq!(OrderStatus::parse("refunded"), None);
        assert_eq!(
            serde_json::to_string(&OrderStatus::ReturnRequested).unwrap(),
            "\"return requested\""
        );
    }

    #[test]
    fn compute_total_is_exact() {
        let items = vec![
            LineItem { product: Uuid::now_v7(), quantity: 3, price: Decimal::new(1999, 2) },
            LineItem { product: Uuid::now_v7(), quantity: 1, price: Decimal::new(1, 2) },
        ];
        assert_eq!(Order::compute_total(&items), Decimal::new(5998, 2));
        assert_eq!(Order::compute_total(&[]), Decimal::ZERO);
    }

    #[test]
    fn cancel_only_from_pending_or_processing() {
        for status in [OrderStatus::Pending, OrderStatus::Processing] {
            let mut order = order_with_status(status);
            order.cancel().unwrap();
            assert_eq!(order.status, OrderStatus::Cancelled);
        }
        for status in [
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
            OrderStatus::Returned,
        ] {
            let mut order = order_with_status(status);
            let err = order.cancel().unwrap_err();
            assert_eq!(
                err.to_string(),
                format!("Order cannot be cancelled. Status: {status}")
            );
            assert_eq!(order.status, status);
        }
    }

    #[test]
    fn return_requires_delivered() {
        let mut order = order_with_status(OrderStatus::Pending);
        let err = order.request_return("too small".into(), Utc::now()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "A return can only be requested for a delivered order. Current status: pending"
        );
    }

    #[test]
    fn return_window_counts_whole_days_rounded_up() {
        let mut order = order_with_status(OrderStatus::Delivered);
        let delivered_at = order.updated_at;

        // exactly 30 days out is still inside the window
        order
            .request_return("wrong colour".into(), delivered_at + Duration::days(30))
            .unwrap();
        assert_eq!(order.status, OrderStatus::ReturnRequested);
        assert_eq!(order.return_reason.as_deref(), Some("wrong colour"));

        // one extra hour rounds up to day 31
        let mut order = order_with_status(OrderStatus::Delivered);
        let err = order
            .request_return("late".into(), delivered_at + Duration::days(30) + Duration::hours(1))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "The 30-day return window for this order has expired."
        );
        assert_eq!(order.status, OrderStatus::Delivered);
        assert_eq!(order.return_reason, None);
    }

    #[test]
    fn force_status_ignores_the_transition_table() {
        let mut order = order_with_status(OrderStatus::Cancelled);
        order.force_status(OrderStatus::Shipped);
        assert_eq!(order.status, OrderStatus::Shipped);
    }
}
