// src/store/mod.rs

//! Persistence seam. `Store` is the application-facing surface; `CheckoutUnit`
//! is the scoped, per-user unit of work checkout runs inside.
//!
//! Two backends implement it: `PgStore` (PostgreSQL via sqlx) and
//! `MemoryStore` (process-local, with fault injection for tests).

pub mod memory;
pub mod postgres;

pub use memory::{MemoryStore, StoreFault};
pub use postgres::PgStore;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
  CartLine, CartViewLine, NewOrder, NewOrderItem, NewProduct, NewUser, Order, OrderItem, OrderItemView,
  PricedCartLine, Product, ProductFilter, ProductUpdate, User,
};

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("database error: {0}")]
  Database(#[from] sqlx::Error),

  #[error("migration error: {0}")]
  Migration(#[from] sqlx::migrate::MigrateError),

  #[error("unique constraint violated: {0}")]
  UniqueViolation(String),

  #[error("referenced {0} does not exist")]
  MissingReference(&'static str),

  #[error("cart line quantity out of range")]
  QuantityOverflow,

  #[error("corrupt record: {0}")]
  Corrupt(String),

  #[error("injected fault at {0}")]
  Injected(&'static str),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TopProduct {
  pub product_id: Uuid,
  pub name: Option<String>,
  pub units_sold: i64,
  pub revenue: Decimal,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SalesSummary {
  pub total_orders: i64,
  pub total_sales: Decimal,
  pub unique_customers: i64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CustomerSpend {
  pub user_id: Uuid,
  pub name: String,
  pub email: String,
  pub total_orders: i64,
  pub total_spent: Decimal,
}

#[async_trait]
pub trait Store: Send + Sync {
  async fn ping(&self) -> StoreResult<()>;

  // --- users ---
  /// Fails with `UniqueViolation` when the email is taken.
  async fn insert_user(&self, new_user: NewUser) -> StoreResult<User>;
  async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
  async fn find_user_by_id(&self, user_id: Uuid) -> StoreResult<Option<User>>;

  // --- catalog ---
  async fn insert_product(&self, new_product: NewProduct) -> StoreResult<Product>;
  async fn get_product(&self, product_id: Uuid) -> StoreResult<Option<Product>>;
  async fn list_products(&self, filter: &ProductFilter) -> StoreResult<Vec<Product>>;
  async fn update_product(&self, product_id: Uuid, update: ProductUpdate) -> StoreResult<Option<Product>>;
  async fn delete_product(&self, product_id: Uuid) -> StoreResult<bool>;

  // --- cart ---
  // Cart mutations share the per-user lock with each other and wait for an
  // in-flight checkout of the same user.

  /// Inserts a line or adds `quantity` to the existing line for the product.
  async fn upsert_cart_line(&self, user_id: Uuid, product_id: Uuid, quantity: i32) -> StoreResult<CartLine>;
  /// `None` when no line with `line_id` belongs to `user_id`.
  async fn set_cart_line_quantity(&self, user_id: Uuid, line_id: Uuid, quantity: i32) -> StoreResult<Option<CartLine>>;
  /// `false` when no line with `line_id` belongs to `user_id`.
  async fn delete_cart_line(&self, user_id: Uuid, line_id: Uuid) -> StoreResult<bool>;
  async fn cart_view(&self, user_id: Uuid) -> StoreResult<Vec<CartViewLine>>;

  // --- orders ---
  /// Opens a checkout unit holding the exclusive lock for `user_id`.
  async fn begin_checkout(&self, user_id: Uuid) -> StoreResult<Box<dyn CheckoutUnit>>;
  /// Only returns the order if it belongs to `user_id`.
  async fn find_order_for_user(&self, user_id: Uuid, order_id: Uuid) -> StoreResult<Option<Order>>;
  /// Newest first.
  async fn list_orders_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Order>>;
  async fn order_items(&self, order_id: Uuid) -> StoreResult<Vec<OrderItem>>;
  async fn order_item_views(&self, order_id: Uuid) -> StoreResult<Vec<OrderItemView>>;

  // --- reports ---
  async fn top_products(&self, limit: i64) -> StoreResult<Vec<TopProduct>>;
  async fn sales_summary(&self) -> StoreResult<SalesSummary>;
  async fn customer_spend(&self, limit: i64) -> StoreResult<Vec<CustomerSpend>>;
}

/// A unit of work scoped to a single user. Writes become visible only on
/// `commit`; dropping the unit without committing discards them.
#[async_trait]
pub trait CheckoutUnit: Send {
  async fn find_order_by_idempotency_key(&mut self, key: &str) -> StoreResult<Option<Order>>;
  async fn priced_cart_lines(&mut self) -> StoreResult<Vec<PricedCartLine>>;
  async fn insert_order(&mut self, new_order: NewOrder) -> StoreResult<Order>;
  async fn insert_order_item(&mut self, new_item: NewOrderItem) -> StoreResult<OrderItem>;
  /// Deletes exactly the given lines of this user's cart.
  async fn delete_cart_lines(&mut self, line_ids: &[Uuid]) -> StoreResult<u64>;

  async fn commit(self: Box<Self>) -> StoreResult<()>;
  async fn rollback(self: Box<Self>) -> StoreResult<()>;
}
