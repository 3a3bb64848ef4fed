//! Store traits the services are wired against.
//!
//! Production uses the Postgres implementations; tests substitute the
//! in-memory ones. The engine never touches a database handle directly.

pub mod memory;
pub mod postgres;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::aggregates::order::{LineItem, Order, OrderStatus};
use crate::domain::aggregates::product::Product;
use crate::domain::value_objects::{Paging, Role, ShippingAddress};

/// Failure inside a store backend. Carries only a message; callers wrap it
/// into the public error taxonomy.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// One page of records plus the unpaged total.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub records: Vec<T>,
    pub total: u64,
}

/// Identity record. Authentication happens upstream; the stores only resolve
/// references.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: Role,
}

/// Order fields fixed by the engine at creation time. The store assigns the
/// id and both timestamps, and always starts the order at `pending`.
#[derive(Clone, Debug)]
pub struct NewOrder {
    pub user: Uuid,
    pub items: Vec<LineItem>,
    pub total_amount: Decimal,
    pub shipping_address: Option<ShippingAddress>,
    pub payment: Option<Uuid>,
}

/// Product fields supplied by the catalog service at creation time.
#[derive(Clone, Debug)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub stock: i64,
    pub is_active: bool,
}

#[allow(async_fn_in_trait)]
pub trait OrderStore {
    async fn insert(&self, order: NewOrder) -> StoreResult<Order>;
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Order>>;
    /// Whole-aggregate update for an order fetched and mutated in memory.
    /// Bumps `updated_at`.
    async fn save(&self, order: &Order) -> StoreResult<Order>;
    /// Fetch-and-update used by the admin status override.
    async fn set_status(&self, id: Uuid, status: OrderStatus) -> StoreResult<Option<Order>>;
    /// A user's orders in creation order.
    async fn list_by_user(&self, user: Uuid, paging: Paging) -> StoreResult<Page<Order>>;
    /// All orders, newest first.
    async fn list_all(&self, paging: Paging) -> StoreResult<Page<Order>>;
}

#[allow(async_fn_in_trait)]
pub trait CatalogStore {
    async fn insert(&self, product: NewProduct) -> StoreResult<Product>;
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Product>>;
    async fn find_active_by_id(&self, id: Uuid) -> StoreResult<Option<Product>>;
    async fn find_by_name(&self, name: &str) -> StoreResult<Option<Product>>;
    /// Products matching `ids`, active or not. Used for view population.
    async fn find_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<Product>>;
    /// Active products matching `ids`.
    async fn find_active(&self, ids: &[Uuid]) -> StoreResult<Vec<Product>>;
    async fn list_active(&self, paging: Paging) -> StoreResult<Page<Product>>;
    /// Atomic conditional decrement: succeeds only while the product is
    /// active and holds at least `quantity` units. Returns whether the
    /// decrement was applied.
    async fn reserve_stock(&self, id: Uuid, quantity: u32) -> StoreResult<bool>;
    /// Atomic unconditional increment (cancellation restore, reservation
    /// rollback). A missing product is a no-op.
    async fn release_stock(&self, id: Uuid, quantity: u32) -> StoreResult<()>;
    async fn set_stock(&self, id: Uuid, stock: i64) -> StoreResult<Option<Product>>;
}

#[allow(async_fn_in_trait)]
pub trait IdentityStore {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;
}
