//! Order lifecycle engine.
//!
//! Validates and creates orders, enforces stock and ownership invariants,
//! and drives the order status state machine. All store access goes through
//! the injected traits, so the engine itself never sees a database handle.

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::aggregates::order::{LineItem, Order, OrderStatus};
use crate::domain::value_objects::{PageMeta, Role, ShippingAddress};
use crate::store::{CatalogStore, IdentityStore, NewOrder, OrderStore, User};
use crate::{CommerceError, Result};

use super::{resolve_paging, Envelope, OrderView, UserSummary};

const MAX_RETURN_REASON_LEN: usize = 500;

/// Input for [`OrderService::create_order`]. Identifiers arrive already
/// parsed; `user` stays optional so the missing-user precondition is the
/// engine's to report.
#[derive(Clone, Debug)]
pub struct CreateOrder {
    pub user: Option<Uuid>,
    pub items: Vec<LineItem>,
    pub shipping_address: Option<ShippingAddress>,
    pub payment: Option<Uuid>,
}

fn distinct_products(items: &[LineItem]) -> Vec<Uuid> {
    let mut ids: Vec<Uuid> = Vec::new();
    for item in items {
        if !ids.contains(&item.product) {
            ids.push(item.product);
        }
    }
    ids
}

#[derive(Clone)]
pub struct OrderService<O, C, I> {
    orders: O,
    catalog: C,
    identity: I,
}

impl<O, C, I> OrderService<O, C, I>
where
    O: OrderStore,
    C: CatalogStore,
    I: IdentityStore,
{
    pub fn new(orders: O, catalog: C, identity: I) -> Self {
        Self { orders, catalog, identity }
    }

    /// Validates the request, persists the order at `pending` and reserves
    /// stock for every line item.
    ///
    /// Stock is taken with per-item atomic conditional decrements; if any
    /// reservation or the insert fails, the decrements already applied are
    /// released again so a rejected request leaves no trace.
    pub async fn create_order(&self, input: CreateOrder) -> Result<Envelope<OrderView>> {
        let user_id = input.user.ok_or_else(|| {
            warn!("order creation without a user reference");
            CommerceError::Validation("User is required".into())
        })?;
        if input.items.is_empty() {
            warn!(user = %user_id, "order creation without items");
            return Err(CommerceError::Validation("At least one item is required".into()));
        }

        if self.identity.find_by_id(user_id).await?.is_none() {
            warn!(user = %user_id, "user not found");
            return Err(CommerceError::BadRequest("User not found".into()));
        }

        let product_ids = distinct_products(&input.items);
        let products = self.catalog.find_active(&product_ids).await?;
        if products.len() != product_ids.len() {
            warn!(requested = product_ids.len(), matched = products.len(), "one or more products not found or inactive");
            return Err(CommerceError::BadRequest(
                "One or more products not found or inactive".into(),
            ));
        }

        for item in &input.items {
            if item.quantity < 1 {
                warn!(product = %item.product, "invalid quantity");
                return Err(CommerceError::Validation("Quantity must be at least 1".into()));
            }
            if item.price < Decimal::ZERO {
                warn!(product = %item.product, "invalid price");
                return Err(CommerceError::Validation("Price cannot be negative".into()));
            }
            // find_active returned every requested id, so this lookup holds
            let product = products.iter().find(|p| p.id == item.product);
            if let Some(product) = product {
                if !product.has_stock_for(item.quantity) {
                    warn!(product = %item.product, stock = product.stock, requested = item.quantity, "insufficient stock");
                    return Err(CommerceError::BadRequest(format!(
                        "Insufficient stock for product: {}",
                        product.name
                    )));
                }
            }
        }

        if let Some(address) = &input.shipping_address {
            address.check_bounds().map_err(CommerceError::Validation)?;
        }

        let total_amount = Order::compute_total(&input.items);

        let mut reserved: Vec<(Uuid, u32)> = Vec::new();
        for item in &input.items {
            let taken = match self.catalog.reserve_stock(item.product, item.quantity).await {
                Ok(taken) => taken,
                Err(err) => {
                    self.release_reserved(&reserved).await;
                    return Err(err.into());
                }
            };
            if !taken {
                self.release_reserved(&reserved).await;
                let name = products
                    .iter()
                    .find(|p| p.id == item.product)
                    .map(|p| p.name.clone())
                    .unwrap_or_else(|| item.product.to_string());
                warn!(product = %item.product, "stock reservation lost to a concurrent order");
                return Err(CommerceError::BadRequest(format!(
                    "Insufficient stock for product: {name}"
                )));
            }
            reserved.push((item.product, item.quantity));
        }

        info!(user = %user_id, "creating new order");
        let order = match self
            .orders
            .insert(NewOrder {
                user: user_id,
                items: input.items,
                total_amount,
                shipping_address: input.shipping_address,
                payment: input.payment,
            })
            .await
        {
            Ok(order) => order,
            Err(err) => {
                self.release_reserved(&reserved).await;
                return Err(err.into());
            }
        };

        info!(order = %order.id, user = %user_id, "order created");
        let view = self.view_of(order, false).await?;
        Ok(Envelope::new(view))
    }

    pub async fn get_order_by_id(
        &self,
        order_id: Uuid,
        caller: Uuid,
        role: Role,
    ) -> Result<Envelope<OrderView>> {
        let order = self
            .orders
            .find_by_id(order_id)
            .await?
            .ok_or_else(|| {
                warn!(order = %order_id, "order not found");
                CommerceError::NotFound("Order not found".into())
            })?;

        if !role.is_admin() && !order.is_owned_by(caller) {
            warn!(order = %order_id, user = %caller, "unauthorized access to order");
            return Err(CommerceError::Unauthorized("Unauthorized to view this order".into()));
        }

        let view = self.view_of(order, false).await?;
        Ok(Envelope::new(view))
    }

    pub async fn get_user_orders(
        &self,
        user_id: Uuid,
        page: Option<u32>,
        limit: Option<u32>,
    ) -> Result<Envelope<Vec<OrderView>>> {
        let user = self.identity.find_by_id(user_id).await?.ok_or_else(|| {
            warn!(user = %user_id, "user not found");
            CommerceError::BadRequest("User not found".into())
        })?;
        let paging = resolve_paging(page, limit)?;

        let page_of = self.orders.list_by_user(user_id, paging).await?;
        let meta = PageMeta::new(page_of.total, paging);
        info!(user = %user_id, count = page_of.records.len(), total = meta.total, "orders retrieved");

        let summary = UserSummary { id: user.id, username: user.username, email: None };
        let views = self.views_of(page_of.records, Some(summary)).await?;
        Ok(Envelope::paged(views, meta))
    }

    pub async fn get_all_orders_for_admin(
        &self,
        page: Option<u32>,
        limit: Option<u32>,
    ) -> Result<Envelope<Vec<OrderView>>> {
        let paging = resolve_paging(page, limit)?;
        let page_of = self.orders.list_all(paging).await?;
        let meta = PageMeta::new(page_of.total, paging);
        let views = self.views_of(page_of.records, None).await?;
        Ok(Envelope::paged(views, meta).with_message("All orders retrieved successfully."))
    }

    /// Cancels an order that has not shipped yet, restoring every line
    /// item's stock.
    pub async fn cancel_order(
        &self,
        order_id: Uuid,
        caller: Uuid,
        role: Role,
    ) -> Result<Envelope<OrderView>> {
        info!(order = %order_id, user = %caller, "attempting to cancel order");
        let mut order = self
            .orders
            .find_by_id(order_id)
            .await?
            .ok_or_else(|| {
                warn!(order = %order_id, "order not found for cancellation");
                CommerceError::NotFound("Order not found".into())
            })?;

        if !role.is_admin() && !order.is_owned_by(caller) {
            warn!(order = %order_id, user = %caller, "unauthorized cancellation attempt");
            return Err(CommerceError::Unauthorized("Unauthorized to cancel this order".into()));
        }

        order.cancel().map_err(|err| {
            warn!(order = %order_id, status = %order.status, "cancellation rejected");
            CommerceError::from(err)
        })?;

        for item in &order.items {
            self.catalog.release_stock(item.product, item.quantity).await?;
        }
        info!(order = %order_id, "product stock restored for cancelled order");

        let order = self.orders.save(&order).await?;
        info!(order = %order_id, "order cancelled");

        let view = self.view_of(order, false).await?;
        Ok(Envelope::new(view).with_message("Order has been cancelled successfully."))
    }

    /// Marks a delivered order as `return requested` when the owner asks
    /// within the 30-day window. Stock stays untouched on this path.
    pub async fn request_return(
        &self,
        order_id: Uuid,
        caller: Uuid,
        reason: String,
    ) -> Result<Envelope<OrderView>> {
        info!(order = %order_id, user = %caller, "attempting to request return");
        if reason.trim().is_empty() {
            return Err(CommerceError::Validation("Return reason is required".into()));
        }
        if reason.len() > MAX_RETURN_REASON_LEN {
            return Err(CommerceError::Validation(
                "Return reason must not exceed 500 characters".into(),
            ));
        }

        let mut order = self
            .orders
            .find_by_id(order_id)
            .await?
            .ok_or_else(|| CommerceError::NotFound("Order not found".into()))?;

        // no admin override here: only the buyer may start a return
        if !order.is_owned_by(caller) {
            warn!(order = %order_id, user = %caller, "unauthorized return attempt");
            return Err(CommerceError::Unauthorized(
                "Unauthorized to request a return for this order".into(),
            ));
        }

        order.request_return(reason, Utc::now()).map_err(CommerceError::from)?;

        let order = self.orders.save(&order).await?;
        info!(order = %order_id, "return requested");

        let view = self.view_of(order, false).await?;
        Ok(Envelope::new(view)
            .with_message("Return has been requested successfully. You will be notified once it is reviewed."))
    }

    /// Admin override of the order status. The wire value must name a member
    /// of the status enum; the current status is deliberately not consulted.
    pub async fn update_order_status(
        &self,
        order_id: Uuid,
        status: &str,
    ) -> Result<Envelope<OrderView>> {
        let status = OrderStatus::parse(status).ok_or_else(|| {
            warn!(status, "invalid status value");
            CommerceError::BadRequest(format!("Invalid status: \"{status}\" is not a valid option."))
        })?;

        let order = self
            .orders
            .set_status(order_id, status)
            .await?
            .ok_or_else(|| CommerceError::NotFound("Order not found.".into()))?;
        info!(order = %order_id, status = %status, "order status updated");

        let view = self.view_of(order, false).await?;
        Ok(Envelope::new(view).with_message("Order status updated successfully."))
    }

    async fn release_reserved(&self, reserved: &[(Uuid, u32)]) {
        for (product, quantity) in reserved {
            if let Err(err) = self.catalog.release_stock(*product, *quantity).await {
                warn!(product = %product, error = %err, "failed to release reserved stock");
            }
        }
    }

    async fn view_of(&self, order: Order, include_email: bool) -> Result<OrderView> {
        let user = self.identity.find_by_id(order.user).await?;
        let summary = user.map(|u| summarize(u, include_email));
        let products = self.catalog.find_by_ids(&distinct_products(&order.items)).await?;
        Ok(OrderView::assemble(order, summary, &products))
    }

    /// Builds views for a page of orders. When `shared_user` is given it is
    /// used for every order (the single-user listing); otherwise each order's
    /// user is resolved and populated with its email (the admin listing).
    async fn views_of(
        &self,
        orders: Vec<Order>,
        shared_user: Option<UserSummary>,
    ) -> Result<Vec<OrderView>> {
        let mut product_ids: Vec<Uuid> = Vec::new();
        for order in &orders {
            for id in distinct_products(&order.items) {
                if !product_ids.contains(&id) {
                    product_ids.push(id);
                }
            }
        }
        let products = self.catalog.find_by_ids(&product_ids).await?;

        let mut views = Vec::with_capacity(orders.len());
        for order in orders {
            let summary = match &shared_user {
                Some(summary) => Some(summary.clone()),
                None => self
                    .identity
                    .find_by_id(order.user)
                    .await?
                    .map(|u| summarize(u, true)),
            };
            views.push(OrderView::assemble(order, summary, &products));
        }
        Ok(views)
    }
}

fn summarize(user: User, include_email: bool) -> UserSummary {
    UserSummary {
        id: user.id,
        email: if include_email { Some(user.email) } else { None },
        username: user.username,
    }
}
