//! Domain events published to the message bus after successful mutations.

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::aggregates::order::OrderStatus;

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    Created { order_id: Uuid, user: Uuid, total_amount: Decimal },
    Cancelled { order_id: Uuid },
    ReturnRequested { order_id: Uuid },
    StatusChanged { order_id: Uuid, status: OrderStatus },
}

impl OrderEvent {
    /// Subject the event is published under.
    pub fn subject(&self) -> &'static str {
        match self {
            OrderEvent::Created { .. } => "orders.created",
            OrderEvent::Cancelled { .. } => "orders.cancelled",
            OrderEvent::ReturnRequested { .. } => "orders.return_requested",
            OrderEvent::StatusChanged { .. } => "orders.status_changed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_type_tags() {
        let event = OrderEvent::StatusChanged {
            order_id: Uuid::now_v7(),
            status: OrderStatus::Shipped,
        };
        assert_eq!(event.subject(), "orders.status_changed");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "status_changed");
        assert_eq!(json["status"], "shipped");
    }
}
