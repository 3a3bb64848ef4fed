//! Aggregates module

pub mod order;
pub mod product;

pub use order::{LineItem, Order, OrderStatus, TransitionError};
pub use product::Product;
