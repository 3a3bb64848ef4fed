//! In-memory stores. They back the unit tests and double as lightweight
//! fakes wherever a database is unavailable.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use uuid::Uuid;

use crate::domain::aggregates::order::{Order, OrderStatus};
use crate::domain::aggregates::product::Product;
use crate::domain::value_objects::Paging;

use super::{
    CatalogStore, IdentityStore, NewOrder, NewProduct, OrderStore, Page, StoreError, StoreResult,
    User,
};

fn slice<T: Clone>(records: &[T], paging: Paging) -> Vec<T> {
    records
        .iter()
        .skip(paging.offset() as usize)
        .take(paging.limit as usize)
        .cloned()
        .collect()
}

/// Orders held in a `Vec` so insertion order doubles as creation order.
#[derive(Clone, Default)]
pub struct MemoryOrderStore {
    inner: Arc<Mutex<Vec<Order>>>,
}

impl MemoryOrderStore {
    fn lock(&self) -> StoreResult<std::sync::MutexGuard<'_, Vec<Order>>> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Backend("order store poisoned".into()))
    }

    /// Rewrites an order's `updated_at`, for exercising time-window logic.
    #[cfg(test)]
    pub fn backdate(&self, id: Uuid, updated_at: chrono::DateTime<Utc>) {
        let mut orders = self.inner.lock().unwrap();
        if let Some(order) = orders.iter_mut().find(|o| o.id == id) {
            order.updated_at = updated_at;
        }
    }
}

impl OrderStore for MemoryOrderStore {
    async fn insert(&self, order: NewOrder) -> StoreResult<Order> {
        let now = Utc::now();
        let record = Order {
            id: Uuid::now_v7(),
            user: order.user,
            items: order.items,
            total_amount: order.total_amount,
            status: OrderStatus::Pending,
            shipping_address: order.shipping_address,
            payment: order.payment,
            return_reason: None,
            created_at: now,
            updated_at: now,
        };
        self.lock()?.push(record.clone());
        Ok(record)
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Order>> {
        Ok(self.lock()?.iter().find(|o| o.id == id).cloned())
    }

    async fn save(&self, order: &Order) -> StoreResult<Order> {
        let mut orders = self.lock()?;
        let slot = orders
            .iter_mut()
            .find(|o| o.id == order.id)
            .ok_or_else(|| StoreError::Backend(format!("order {} vanished", order.id)))?;
        *slot = order.clone();
        slot.updated_at = Utc::now();
        Ok(slot.clone())
    }

    async fn set_status(&self, id: Uuid, status: OrderStatus) -> StoreResult<Option<Order>> {
        let mut orders = self.lock()?;
        Ok(orders.iter_mut().find(|o| o.id == id).map(|order| {
            order.status = status;
            order.updated_at = Utc::now();
            order.clone()
        }))
    }

    async fn list_by_user(&self, user: Uuid, paging: Paging) -> StoreResult<Page<Order>> {
        let orders = self.lock()?;
        let matching: Vec<Order> = orders.iter().filter(|o| o.user == user).cloned().collect();
        Ok(Page {
            total: matching.len() as u64,
            records: slice(&matching, paging),
        })
    }

    async fn list_all(&self, paging: Paging) -> StoreResult<Page<Order>> {
        let orders = self.lock()?;
        let mut all: Vec<Order> = orders.clone();
        all.reverse();
        Ok(Page {
            total: all.len() as u64,
            records: slice(&all, paging),
        })
    }
}

#[derive(Clone, Default)]
pub struct MemoryCatalogStore {
    inner: Arc<Mutex<HashMap<Uuid, Product>>>,
}

impl MemoryCatalogStore {
    fn lock(&self) -> StoreResult<std::sync::MutexGuard<'_, HashMap<Uuid, Product>>> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Backend("catalog store poisoned".into()))
    }

    /// Current stock level, for assertions.
    pub fn stock_of(&self, id: Uuid) -> Option<i64> {
        self.inner.lock().ok()?.get(&id).map(|p| p.stock)
    }
}

impl CatalogStore for MemoryCatalogStore {
    async fn insert(&self, product: NewProduct) -> StoreResult<Product> {
        let now = Utc::now();
        let record = Product {
            id: Uuid::now_v7(),
            name: product.name,
            description: product.description,
            price: product.price,
            stock: product.stock,
            is_active: product.is_active,
            created_at: now,
            updated_at: now,
        };
        self.lock()?.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Product>> {
        Ok(self.lock()?.get(&id).cloned())
    }

    async fn find_active_by_id(&self, id: Uuid) -> StoreResult<Option<Product>> {
        Ok(self.lock()?.get(&id).filter(|p| p.is_active).cloned())
    }

    async fn find_by_name(&self, name: &str) -> StoreResult<Option<Product>> {
        Ok(self.lock()?.values().find(|p| p.name == name).cloned())
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<Product>> {
        let products = self.lock()?;
        Ok(ids.iter().filter_map(|id| products.get(id).cloned()).collect())
    }

    async fn find_active(&self, ids: &[Uuid]) -> StoreResult<Vec<Product>> {
        let products = self.lock()?;
        Ok(ids
            .iter()
            .filter_map(|id| products.get(id).filter(|p| p.is_active).cloned())
            .collect())
    }

    async fn list_active(&self, paging: Paging) -> StoreResult<Page<Product>> {
        let products = self.lock()?;
        let mut active: Vec<Product> = products.values().filter(|p| p.is_active).cloned().collect();
        active.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(Page {
            total: active.len() as u64,
            records: slice(&active, paging),
        })
    }

    async fn reserve_stock(&self, id: Uuid, quantity: u32) -> StoreResult<bool> {
        let mut products = self.lock()?;
        match products.get_mut(&id) {
            Some(product) if product.is_active && product.has_stock_for(quantity) => {
                product.stock -= i64::from(quantity);
                product.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release_stock(&self, id: Uuid, quantity: u32) -> StoreResult<()> {
        let mut products = self.lock()?;
        if let Some(product) = products.get_mut(&id) {
            product.stock += i64::from(quantity);
            product.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn set_stock(&self, id: Uuid, stock: i64) -> StoreResult<Option<Product>> {
        let mut products = self.lock()?;
        Ok(products.get_mut(&id).map(|product| {
            product.stock = stock;
            product.updated_at = Utc::now();
            product.clone()
        }))
    }
}

#[derive(Clone, Default)]
pub struct MemoryIdentityStore {
    inner: Arc<Mutex<HashMap<Uuid, User>>>,
}

impl MemoryIdentityStore {
    pub fn insert(&self, user: User) {
        if let Ok(mut users) = self.inner.lock() {
            users.insert(user.id, user);
        }
    }
}

impl IdentityStore for MemoryIdentityStore {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        let users = self
            .inner
            .lock()
            .map_err(|_| StoreError::Backend("identity store poisoned".into()))?;
        Ok(users.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn widget(stock: i64, active: bool) -> NewProduct {
        NewProduct {
            name: "Widget".into(),
            description: None,
            price: Decimal::new(1000, 2),
            stock,
            is_active: active,
        }
    }

    #[tokio::test]
    async fn reserve_is_conditional_release_is_not() {
        let catalog = MemoryCatalogStore::default();
        let product = catalog.insert(widget(5, true)).await.unwrap();

        assert!(catalog.reserve_stock(product.id, 5).await.unwrap());
        assert_eq!(catalog.stock_of(product.id), Some(0));
        assert!(!catalog.reserve_stock(product.id, 1).await.unwrap());

        catalog.release_stock(product.id, 2).await.unwrap();
        assert_eq!(catalog.stock_of(product.id), Some(2));

        // releasing against an unknown id is a no-op
        catalog.release_stock(Uuid::now_v7(), 2).await.unwrap();
    }

    #[tokio::test]
    async fn inactive_products_cannot_be_reserved() {
        let catalog = MemoryCatalogStore::default();
        let product = catalog.insert(widget(5, false)).await.unwrap();
        assert!(!catalog.reserve_stock(product.id, 1).await.unwrap());
        assert_eq!(catalog.stock_of(product.id), Some(5));
        assert!(catalog.find_active_by_id(product.id).await.unwrap().is_none());
        assert!(catalog.find_by_id(product.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn orders_paginate_in_creation_order() {
        let store = MemoryOrderStore::default();
        let user = Uuid::now_v7();
        for n in 0..3 {
            store
                .insert(NewOrder {
                    user,
                    items: vec![],
                    total_amount: Decimal::from(n),
                    shipping_address: None,
                    payment: None,
                })
                .await
                .unwrap();
        }

        let page = store
            .list_by_user(user, Paging { page: 1, limit: 2 })
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.records.len(), 2);
        assert_eq!(page.records[0].total_amount, Decimal::from(0));

        let page = store
            .list_by_user(user, Paging { page: 2, limit: 2 })
            .await
            .unwrap();
        assert_eq!(page.records.len(), 1);
        assert_eq!(page.records[0].total_amount, Decimal::from(2));

        // admin listing is newest first
        let all = store.list_all(Paging { page: 1, limit: 10 }).await.unwrap();
        assert_eq!(all.records[0].total_amount, Decimal::from(2));
    }
}
