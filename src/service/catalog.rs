//! Catalog service: product CRUD and the stock-adjustment path it shares
//! with the order engine.

use rust_decimal::Decimal;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::aggregates::product::Product;
use crate::domain::value_objects::PageMeta;
use crate::store::{CatalogStore, NewProduct};
use crate::{CommerceError, Result};

use super::{resolve_paging, Envelope};

/// Input for [`CatalogService::create_product`].
#[derive(Clone, Debug)]
pub struct CreateProduct {
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub stock: Option<i64>,
    pub is_active: Option<bool>,
}

#[derive(Clone)]
pub struct CatalogService<C> {
    catalog: C,
}

impl<C> CatalogService<C>
where
    C: CatalogStore,
{
    pub fn new(catalog: C) -> Self {
        Self { catalog }
    }

    pub async fn create_product(&self, input: CreateProduct) -> Result<Envelope<Product>> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            warn!("product name is required");
            return Err(CommerceError::Validation("Product name is required".into()));
        }
        if input.price < Decimal::ZERO {
            warn!(name = %name, "invalid product price");
            return Err(CommerceError::Validation("Valid product price is required".into()));
        }
        let stock = input.stock.unwrap_or(0);
        if stock < 0 {
            warn!(name = %name, stock, "invalid initial stock");
            return Err(CommerceError::Validation("Stock cannot be negative".into()));
        }
        if self.catalog.find_by_name(&name).await?.is_some() {
            warn!(name = %name, "product already exists");
            return Err(CommerceError::BadRequest(
                "Product with this name already exists".into(),
            ));
        }

        let product = self
            .catalog
            .insert(NewProduct {
                name,
                description: input.description.map(|d| d.trim().to_string()),
                price: input.price,
                stock,
                is_active: input.is_active.unwrap_or(true),
            })
            .await?;
        info!(product = %product.id, name = %product.name, "product created");
        Ok(Envelope::new(product))
    }

    /// Fetches a product that is still visible to shoppers.
    pub async fn get_product(&self, id: Uuid) -> Result<Envelope<Product>> {
        let product = self
            .catalog
            .find_active_by_id(id)
            .await?
            .ok_or_else(|| CommerceError::NotFound("Product not found".into()))?;
        Ok(Envelope::new(product))
    }

    pub async fn list_products(
        &self,
        page: Option<u32>,
        limit: Option<u32>,
    ) -> Result<Envelope<Vec<Product>>> {
        let paging = resolve_paging(page, limit)?;
        let page_of = self.catalog.list_active(paging).await?;
        let meta = PageMeta::new(page_of.total, paging);
        Ok(Envelope::paged(page_of.records, meta))
    }

    /// Replaces a product's stock counter. Order creation and cancellation
    /// adjust the same counter through atomic increments instead.
    pub async fn update_stock(&self, id: Uuid, stock: i64) -> Result<Envelope<Product>> {
        if stock < 0 {
            warn!(product = %id, stock, "invalid stock value");
            return Err(CommerceError::Validation("Stock cannot be negative".into()));
        }
        let product = self
            .catalog
            .set_stock(id, stock)
            .await?
            .ok_or_else(|| CommerceError::NotFound("Product not found".into()))?;
        info!(product = %id, stock, "product stock updated");
        Ok(Envelope::new(product).with_message("Product stock updated successfully."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryCatalogStore;

    fn service() -> (CatalogService<MemoryCatalogStore>, MemoryCatalogStore) {
        let catalog = MemoryCatalogStore::default();
        (CatalogService::new(catalog.clone()), catalog)
    }

    fn widget() -> CreateProduct {
        CreateProduct {
            name: "Widget".into(),
            description: Some("  A fine widget  ".into()),
            price: Decimal::new(1999, 2),
            stock: Some(5),
            is_active: None,
        }
    }

    #[tokio::test]
    async fn create_product_trims_and_defaults() {
        let (service, _) = service();
        let envelope = service.create_product(widget()).await.unwrap();
        let product = envelope.data;
        assert_eq!(product.name, "Widget");
        assert_eq!(product.description.as_deref(), Some("A fine widget"));
        assert!(product.is_active);
        assert_eq!(product.stock, 5);
    }

    #[tokio::test]
    async fn create_product_rejects_bad_input_and_duplicates() {
        let (service, _) = service();

        let mut input = widget();
        input.name = "   ".into();
        let err = service.create_product(input).await.unwrap_err();
        assert!(matches!(err, CommerceError::Validation(ref m) if m == "Product name is required"));

        let mut input = widget();
        input.price = Decimal::new(-1, 0);
        let err = service.create_product(input).await.unwrap_err();
        assert!(matches!(err, CommerceError::Validation(ref m) if m == "Valid product price is required"));

        let mut input = widget();
        input.stock = Some(-3);
        let err = service.create_product(input).await.unwrap_err();
        assert!(matches!(err, CommerceError::Validation(ref m) if m == "Stock cannot be negative"));

        service.create_product(widget()).await.unwrap();
        let err = service.create_product(widget()).await.unwrap_err();
        assert!(matches!(err, CommerceError::BadRequest(ref m) if m == "Product with this name already exists"));
    }

    #[tokio::test]
    async fn inactive_products_are_hidden_from_lookup() {
        let (service, catalog) = service();
        let mut input = widget();
        input.is_active = Some(false);
        let product = service.create_product(input).await.unwrap().data;

        let err = service.get_product(product.id).await.unwrap_err();
        assert!(matches!(err, CommerceError::NotFound(ref m) if m == "Product not found"));
        assert!(catalog.find_by_id(product.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn stock_updates_validate_and_report() {
        let (service, catalog) = service();
        let product = service.create_product(widget()).await.unwrap().data;

        let err = service.update_stock(product.id, -1).await.unwrap_err();
        assert!(matches!(err, CommerceError::Validation(ref m) if m == "Stock cannot be negative"));

        let envelope = service.update_stock(product.id, 42).await.unwrap();
        assert_eq!(envelope.data.stock, 42);
        assert_eq!(catalog.stock_of(product.id), Some(42));

        let err = service.update_stock(Uuid::now_v7(), 1).await.unwrap_err();
        assert!(matches!(err, CommerceError::NotFound(ref m) if m == "Product not found"));
    }

    #[tokio::test]
    async fn listing_pages_active_products() {
        let (service, _) = service();
        for n in 0..3 {
            let mut input = widget();
            input.name = format!("Widget {n}");
            service.create_product(input).await.unwrap();
        }
        let envelope = service.list_products(Some(1), Some(2)).await.unwrap();
        assert_eq!(envelope.data.len(), 2);
        assert_eq!(envelope.meta.unwrap().total, 3);

        let err = service.list_products(Some(0), None).await.unwrap_err();
        assert!(matches!(err, CommerceError::Validation(_)));
    }
}
