//! Storefront - self-hosted e-commerce backend.
//!
//! HTTP boundary only: requests are parsed and checked here, then handed to
//! the services. Authentication happens upstream; callers arrive with
//! `x-user-id` / `x-user-role` headers already established.

use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, patch, put},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::postgres::PgPoolOptions;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;
use validator::Validate;

use storefront::domain::aggregates::order::LineItem;
use storefront::domain::aggregates::product::Product;
use storefront::domain::events::OrderEvent;
use storefront::domain::value_objects::{Role, ShippingAddress};
use storefront::service::catalog::CreateProduct;
use storefront::service::{CatalogService, CreateOrder, Envelope, OrderService, OrderView};
use storefront::store::postgres::{PgCatalogStore, PgIdentityStore, PgOrderStore};
use storefront::CommerceError;

type Orders = OrderService<PgOrderStore, PgCatalogStore, PgIdentityStore>;
type Catalog = CatalogService<PgCatalogStore>;

#[derive(Clone)]
pub struct AppState {
    orders: Orders,
    catalog: Catalog,
    nats: Option<async_nats::Client>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let db = PgPoolOptions::new()
        .max_connections(10)
        .connect(&std::env::var("DATABASE_URL")?)
        .await?;
    sqlx::migrate!("./migrations").run(&db).await?;

    let nats = match std::env::var("NATS_URL") {
        Ok(url) => async_nats::connect(&url).await.ok(),
        Err(_) => None,
    };

    let catalog_store = PgCatalogStore::new(db.clone());
    let state = AppState {
        orders: OrderService::new(
            PgOrderStore::new(db.clone()),
            catalog_store.clone(),
            PgIdentityStore::new(db.clone()),
        ),
        catalog: CatalogService::new(catalog_store),
        nats,
    };

    let app = Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "storefront"})) }))
        .route("/api/v1/orders", get(get_user_orders).post(create_order))
        .route("/api/v1/orders/admin/all", get(get_all_orders_for_admin))
        .route("/api/v1/orders/:id", get(get_order_by_id))
        .route("/api/v1/orders/:id/cancel", patch(cancel_order))
        .route("/api/v1/orders/:id/return", patch(request_return))
        .route("/api/v1/orders/:id/status", put(update_order_status))
        .route("/api/v1/products", get(list_products).post(create_product))
        .route("/api/v1/products/:id", get(get_product))
        .route("/api/v1/products/:id/stock", patch(update_stock))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let port = std::env::var("PORT").unwrap_or_else(|_| "8080".to_string());
    tracing::info!("storefront listening on 0.0.0.0:{}", port);
    axum::serve(tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?, app).await?;
    Ok(())
}

// =============================================================================
// Caller identity
// =============================================================================

fn caller(headers: &HeaderMap) -> std::result::Result<(Uuid, Role), CommerceError> {
    let id = headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v).ok())
        .ok_or_else(|| CommerceError::Unauthorized("User not authenticated".into()))?;
    let role = headers
        .get("x-user-role")
        .and_then(|v| v.to_str().ok())
        .and_then(Role::parse)
        .unwrap_or(Role::User);
    Ok((id, role))
}

fn require_admin(role: Role) -> std::result::Result<(), CommerceError> {
    if role.is_admin() {
        Ok(())
    } else {
        Err(CommerceError::Unauthorized("Admin access required".into()))
    }
}

fn parse_order_id(id: &str) -> std::result::Result<Uuid, CommerceError> {
    Uuid::parse_str(id).map_err(|_| CommerceError::BadRequest("Invalid order ID".into()))
}

fn parse_product_id(id: &str) -> std::result::Result<Uuid, CommerceError> {
    Uuid::parse_str(id).map_err(|_| CommerceError::BadRequest("Invalid product ID".into()))
}

async fn publish(state: &AppState, event: OrderEvent) {
    let Some(nats) = &state.nats else { return };
    match serde_json::to_vec(&event) {
        Ok(payload) => {
            if let Err(err) = nats.publish(event.subject().to_string(), payload.into()).await {
                tracing::warn!(error = %err, subject = event.subject(), "failed to publish event");
            }
        }
        Err(err) => tracing::warn!(error = %err, "failed to encode event"),
    }
}

// =============================================================================
// Orders
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub user: Option<Uuid>,
    #[validate(length(min = 1, message = "Order must contain at least one item"))]
    pub items: Vec<OrderItemRequest>,
    #[validate]
    pub shipping_address: Option<ShippingAddress>,
    pub payment: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct OrderItemRequest {
    pub product: Uuid,
    pub quantity: u32,
    pub price: Decimal,
}

async fn create_order(
    State(state): State<AppState>,
    Json(req): Json<CreateOrderRequest>,
) -> std::result::Result<(StatusCode, Json<Envelope<OrderView>>), CommerceError> {
    req.validate().map_err(|e| CommerceError::Validation(e.to_string()))?;
    let user = req.user;
    let input = CreateOrder {
        user,
        items: req
            .items
            .into_iter()
            .map(|i| LineItem { product: i.product, quantity: i.quantity, price: i.price })
            .collect(),
        shipping_address: req.shipping_address,
        payment: req.payment,
    };
    let envelope = state.orders.create_order(input).await?;
    if let Some(user) = user {
        publish(
            &state,
            OrderEvent::Created {
                order_id: envelope.data.id,
                user,
                total_amount: envelope.data.total_amount,
            },
        )
        .await;
    }
    Ok((StatusCode::CREATED, Json(envelope)))
}

async fn get_user_orders(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<PageQuery>,
) -> std::result::Result<Json<Envelope<Vec<OrderView>>>, CommerceError> {
    let (user_id, _) = caller(&headers)?;
    let envelope = state.orders.get_user_orders(user_id, query.page, query.limit).await?;
    Ok(Json(envelope))
}

async fn get_order_by_id(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> std::result::Result<Json<Envelope<OrderView>>, CommerceError> {
    let (user_id, role) = caller(&headers)?;
    let order_id = parse_order_id(&id)?;
    let envelope = state.orders.get_order_by_id(order_id, user_id, role).await?;
    Ok(Json(envelope))
}

async fn cancel_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> std::result::Result<Json<Envelope<OrderView>>, CommerceError> {
    let (user_id, role) = caller(&headers)?;
    let order_id = parse_order_id(&id)?;
    let envelope = state.orders.cancel_order(order_id, user_id, role).await?;
    publish(&state, OrderEvent::Cancelled { order_id }).await;
    Ok(Json(envelope))
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReturnRequest {
    #[validate(length(min = 1, message = "Return reason is required"))]
    pub reason: String,
}

async fn request_return(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<ReturnRequest>,
) -> std::result::Result<Json<Envelope<OrderView>>, CommerceError> {
    let (user_id, _) = caller(&headers)?;
    let order_id = parse_order_id(&id)?;
    req.validate().map_err(|e| CommerceError::Validation(e.to_string()))?;
    let envelope = state.orders.request_return(order_id, user_id, req.reason).await?;
    publish(&state, OrderEvent::ReturnRequested { order_id }).await;
    Ok(Json(envelope))
}

async fn get_all_orders_for_admin(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<PageQuery>,
) -> std::result::Result<Json<Envelope<Vec<OrderView>>>, CommerceError> {
    let (_, role) = caller(&headers)?;
    require_admin(role)?;
    let envelope = state.orders.get_all_orders_for_admin(query.page, query.limit).await?;
    Ok(Json(envelope))
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

async fn update_order_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> std::result::Result<Json<Envelope<OrderView>>, CommerceError> {
    let (_, role) = caller(&headers)?;
    require_admin(role)?;
    let order_id = parse_order_id(&id)?;
    let envelope = state.orders.update_order_status(order_id, &req.status).await?;
    publish(
        &state,
        OrderEvent::StatusChanged { order_id, status: envelope.data.status },
    )
    .await;
    Ok(Json(envelope))
}

// =============================================================================
// Catalog
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub stock: Option<i64>,
    pub is_active: Option<bool>,
}

async fn create_product(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateProductRequest>,
) -> std::result::Result<(StatusCode, Json<Envelope<Product>>), CommerceError> {
    let (_, role) = caller(&headers)?;
    require_admin(role)?;
    let envelope = state
        .catalog
        .create_product(CreateProduct {
            name: req.name,
            description: req.description,
            price: req.price,
            stock: req.stock,
            is_active: req.is_active,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(envelope)))
}

async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> std::result::Result<Json<Envelope<Vec<Product>>>, CommerceError> {
    let envelope = state.catalog.list_products(query.page, query.limit).await?;
    Ok(Json(envelope))
}

async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> std::result::Result<Json<Envelope<Product>>, CommerceError> {
    let product_id = parse_product_id(&id)?;
    let envelope = state.catalog.get_product(product_id).await?;
    Ok(Json(envelope))
}

#[derive(Debug, Deserialize)]
pub struct UpdateStockRequest {
    pub stock: i64,
}

async fn update_stock(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<UpdateStockRequest>,
) -> std::result::Result<Json<Envelope<Product>>, CommerceError> {
    let (_, role) = caller(&headers)?;
    require_admin(role)?;
    let product_id = parse_product_id(&id)?;
    let envelope = state.catalog.update_stock(product_id, req.stock).await?;
    Ok(Json(envelope))
}
