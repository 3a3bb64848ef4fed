//! Postgres-backed stores.
//!
//! Stock mutation is a single conditional `UPDATE`, so "check stock, then
//! decrement" never spans two statements.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::aggregates::order::{LineItem, Order, OrderStatus};
use crate::domain::aggregates::product::Product;
use crate::domain::value_objects::{Paging, Role, ShippingAddress};

use super::{
    CatalogStore, IdentityStore, NewOrder, NewProduct, OrderStore, Page, StoreError, StoreResult,
    User,
};

const ORDER_COLUMNS: &str = "id, user_id, total_amount, status, street, city, state, country, \
                             postal_code, payment, return_reason, created_at, updated_at";
const PRODUCT_COLUMNS: &str = "id, name, description, price, stock, is_active, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    user_id: Uuid,
    total_amount: Decimal,
    status: String,
    street: Option<String>,
    city: Option<String>,
    state: Option<String>,
    country: Option<String>,
    postal_code: Option<String>,
    payment: Option<Uuid>,
    return_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct ItemRow {
    order_id: Uuid,
    product_id: Uuid,
    quantity: i32,
    price: Decimal,
}

fn assemble(row: OrderRow, items: Vec<LineItem>) -> StoreResult<Order> {
    let status = OrderStatus::parse(&row.status)
        .ok_or_else(|| StoreError::Backend(format!("unknown order status: {}", row.status)))?;
    let address = ShippingAddress {
        street: row.street,
        city: row.city,
        state: row.state,
        country: row.country,
        postal_code: row.postal_code,
    };
    Ok(Order {
        id: row.id,
        user: row.user_id,
        items,
        total_amount: row.total_amount,
        status,
        shipping_address: if address.is_empty() { None } else { Some(address) },
        payment: row.payment,
        return_reason: row.return_reason,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

#[derive(Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn items_for(&self, ids: &[Uuid]) -> StoreResult<HashMap<Uuid, Vec<LineItem>>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows: Vec<ItemRow> = sqlx::query_as(
            "SELECT order_id, product_id, quantity, price FROM order_items \
             WHERE order_id = ANY($1) ORDER BY order_id, position",
        )
        .bind(ids.to_vec())
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<Uuid, Vec<LineItem>> = HashMap::new();
        for row in rows {
            let quantity = u32::try_from(row.quantity).map_err(|_| {
                StoreError::Backend(format!("corrupt quantity on order {}", row.order_id))
            })?;
            grouped.entry(row.order_id).or_default().push(LineItem {
                product: row.product_id,
                quantity,
                price: row.price,
            });
        }
        Ok(grouped)
    }

    async fn hydrate(&self, rows: Vec<OrderRow>) -> StoreResult<Vec<Order>> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut items = self.items_for(&ids).await?;
        rows.into_iter()
            .map(|row| {
                let list = items.remove(&row.id).unwrap_or_default();
                assemble(row, list)
            })
            .collect()
    }
}

impl OrderStore for PgOrderStore {
    async fn insert(&self, order: NewOrder) -> StoreResult<Order> {
        let id = Uuid::now_v7();
        let address = order.shipping_address.clone().unwrap_or_default();
        let mut tx = self.pool.begin().await?;
        let row: OrderRow = sqlx::query_as(&format!(
            "INSERT INTO orders (id, user_id, total_amount, status, street, city, state, \
             country, postal_code, payment, created_at, updated_at) \
             VALUES ($1, $2, $3, 'pending', $4, $5, $6, $7, $8, $9, NOW(), NOW()) \
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(id)
        .bind(order.user)
        .bind(order.total_amount)
        .bind(address.street.as_deref())
        .bind(address.city.as_deref())
        .bind(address.state.as_deref())
        .bind(address.country.as_deref())
        .bind(address.postal_code.as_deref())
        .bind(order.payment)
        .fetch_one(&mut *tx)
        .await?;

        for (position, item) in order.items.iter().enumerate() {
            sqlx::query(
                "INSERT INTO order_items (order_id, product_id, quantity, price, position) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(id)
            .bind(item.product)
            .bind(item.quantity as i32)
            .bind(item.price)
            .bind(position as i32)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        assemble(row, order.items)
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Order>> {
        let row: Option<OrderRow> =
            sqlx::query_as(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        match row {
            None => Ok(None),
            Some(row) => {
                let mut items = self.items_for(&[row.id]).await?;
                let list = items.remove(&row.id).unwrap_or_default();
                Ok(Some(assemble(row, list)?))
            }
        }
    }

    async fn save(&self, order: &Order) -> StoreResult<Order> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            "UPDATE orders SET status = $2, return_reason = $3, updated_at = NOW() \
             WHERE id = $1 RETURNING {ORDER_COLUMNS}"
        ))
        .bind(order.id)
        .bind(order.status.as_str())
        .bind(order.return_reason.as_deref())
        .fetch_optional(&self.pool)
        .await?;
        let row = row.ok_or_else(|| StoreError::Backend(format!("order {} vanished", order.id)))?;
        assemble(row, order.items.clone())
    }

    async fn set_status(&self, id: Uuid, status: OrderStatus) -> StoreResult<Option<Order>> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            "UPDATE orders SET status = $2, updated_at = NOW() \
             WHERE id = $1 RETURNING {ORDER_COLUMNS}"
        ))
        .bind(id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await?;
        match row {
            None => Ok(None),
            Some(row) => {
                let mut items = self.items_for(&[row.id]).await?;
                let list = items.remove(&row.id).unwrap_or_default();
                Ok(Some(assemble(row, list)?))
            }
        }
    }

    async fn list_by_user(&self, user: Uuid, paging: Paging) -> StoreResult<Page<Order>> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 \
             ORDER BY created_at LIMIT $2 OFFSET $3"
        ))
        .bind(user)
        .bind(paging.limit as i64)
        .bind(paging.offset() as i64)
        .fetch_all(&self.pool)
        .await?;
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders WHERE user_id = $1")
            .bind(user)
            .fetch_one(&self.pool)
            .await?;
        Ok(Page {
            records: self.hydrate(rows).await?,
            total: total.0 as u64,
        })
    }

    async fn list_all(&self, paging: Paging) -> StoreResult<Page<Order>> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC LIMIT $1 OFFSET $2"
        ))
        .bind(paging.limit as i64)
        .bind(paging.offset() as i64)
        .fetch_all(&self.pool)
        .await?;
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders")
            .fetch_one(&self.pool)
            .await?;
        Ok(Page {
            records: self.hydrate(rows).await?,
            total: total.0 as u64,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    price: Decimal,
    stock: i64,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            name: row.name,
            description: row.description,
            price: row.price,
            stock: row.stock,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Clone)]
pub struct PgCatalogStore {
    pool: PgPool,
}

impl PgCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl CatalogStore for PgCatalogStore {
    async fn insert(&self, product: NewProduct) -> StoreResult<Product> {
        let row: ProductRow = sqlx::query_as(&format!(
            "INSERT INTO products (id, name, description, price, stock, is_active, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, NOW(), NOW()) RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(Uuid::now_v7())
        .bind(&product.name)
        .bind(product.description.as_deref())
        .bind(product.price)
        .bind(product.stock)
        .bind(product.is_active)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Product>> {
        let row: Option<ProductRow> =
            sqlx::query_as(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Product::from))
    }

    async fn find_active_by_id(&self, id: Uuid) -> StoreResult<Option<Product>> {
        let row: Option<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 AND is_active"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Product::from))
    }

    async fn find_by_name(&self, name: &str) -> StoreResult<Option<Product>> {
        let row: Option<ProductRow> =
            sqlx::query_as(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE name = $1"))
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Product::from))
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<Product>> {
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1)"
        ))
        .bind(ids.to_vec())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn find_active(&self, ids: &[Uuid]) -> StoreResult<Vec<Product>> {
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1) AND is_active"
        ))
        .bind(ids.to_vec())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn list_active(&self, paging: Paging) -> StoreResult<Page<Product>> {
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE is_active \
             ORDER BY created_at DESC LIMIT $1 OFFSET $2"
        ))
        .bind(paging.limit as i64)
        .bind(paging.offset() as i64)
        .fetch_all(&self.pool)
        .await?;
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products WHERE is_active")
            .fetch_one(&self.pool)
            .await?;
        Ok(Page {
            records: rows.into_iter().map(Product::from).collect(),
            total: total.0 as u64,
        })
    }

    async fn reserve_stock(&self, id: Uuid, quantity: u32) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE products SET stock = stock - $2, updated_at = NOW() \
             WHERE id = $1 AND is_active AND stock >= $2",
        )
        .bind(id)
        .bind(i64::from(quantity))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn release_stock(&self, id: Uuid, quantity: u32) -> StoreResult<()> {
        sqlx::query("UPDATE products SET stock = stock + $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(i64::from(quantity))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_stock(&self, id: Uuid, stock: i64) -> StoreResult<Option<Product>> {
        let row: Option<ProductRow> = sqlx::query_as(&format!(
            "UPDATE products SET stock = $2, updated_at = NOW() \
             WHERE id = $1 RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(id)
        .bind(stock)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Product::from))
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    email: String,
    role: String,
}

#[derive(Clone)]
pub struct PgIdentityStore {
    pool: PgPool,
}

impl PgIdentityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl IdentityStore for PgIdentityStore {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        let row: Option<UserRow> =
            sqlx::query_as("SELECT id, username, email, role FROM users WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|row| User {
            id: row.id,
            username: row.username,
            email: row.email,
            role: Role::parse(&row.role).unwrap_or(Role::User),
        }))
    }
}
