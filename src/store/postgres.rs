// src/store/postgres.rs

//! PostgreSQL `Store`.
//!
//! Per-user exclusion rides on the `users` row: checkout takes it
//! `FOR UPDATE`, cart mutations take it `FOR SHARE`. Checkout runs at READ
//! COMMITTED so that, once the row lock is granted, its reads see whatever
//! the previous holder committed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{FromRow, Postgres, Transaction};
use std::time::Duration;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::{CheckoutUnit, CustomerSpend, SalesSummary, Store, StoreError, StoreResult, TopProduct};
use crate::models::{
  CartLine, CartViewLine, NewOrder, NewOrderItem, NewProduct, NewUser, Order, OrderItem, OrderItemView,
  PricedCartLine, Product, ProductFilter, ProductUpdate, Role, User,
};

const PRODUCT_COLUMNS: &str = "id, seller_id, farm_id, name, description, price, unit, image_url, category, \
                               organic, available, created_at, updated_at";
const ORDER_COLUMNS: &str = "id, user_id, shipping_address, payment_method, status, idempotency_key, created_at";
const CART_LINE_COLUMNS: &str = "id, user_id, product_id, quantity, added_at";

#[derive(FromRow)]
struct UserRow {
  id: Uuid,
  name: String,
  email: String,
  password_hash: String,
  role: String,
  created_at: DateTime<Utc>,
  updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
  type Error = StoreError;

  fn try_from(row: UserRow) -> Result<Self, Self::Error> {
    let role: Role = row.role.parse().map_err(StoreError::Corrupt)?;
    Ok(User {
      id: row.id,
      name: row.name,
      email: row.email,
      password_hash: row.password_hash,
      role,
      created_at: row.created_at,
      updated_at: row.updated_at,
    })
  }
}

#[derive(FromRow)]
struct OrderRow {
  id: Uuid,
  user_id: Uuid,
  shipping_address: String,
  payment_method: String,
  status: String,
  idempotency_key: Option<String>,
  created_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
  type Error = StoreError;

  fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
    Ok(Order {
      id: row.id,
      user_id: row.user_id,
      shipping_address: row.shipping_address,
      payment_method: row.payment_method,
      status: row.status.parse().map_err(StoreError::Corrupt)?,
      idempotency_key: row.idempotency_key,
      created_at: row.created_at,
    })
  }
}

/// Translates constraint violations into their domain meaning.
fn classify(err: sqlx::Error, unique_on: &str, missing: &'static str) -> StoreError {
  if let sqlx::Error::Database(db_err) = &err {
    if db_err.is_unique_violation() {
      return StoreError::UniqueViolation(unique_on.to_string());
    }
    if db_err.is_foreign_key_violation() {
      return StoreError::MissingReference(missing);
    }
    // numeric_value_out_of_range
    if db_err.code().as_deref() == Some("22003") {
      return StoreError::QuantityOverflow;
    }
  }
  StoreError::Database(err)
}

#[derive(Clone)]
pub struct PgStore {
  pool: PgPool,
}

impl PgStore {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }

  #[instrument(name = "PgStore::connect", skip(database_url), err(Display))]
  pub async fn connect(database_url: &str, max_connections: u32, acquire_timeout: Duration) -> StoreResult<Self> {
    let pool = PgPoolOptions::new()
      .max_connections(max_connections)
      .acquire_timeout(acquire_timeout)
      .connect(database_url)
      .await?;
    info!(max_connections, "Database connection pool established.");
    Ok(Self { pool })
  }

  #[instrument(name = "PgStore::migrate", skip(self), err(Display))]
  pub async fn migrate(&self) -> StoreResult<()> {
    sqlx::migrate!("./migrations").run(&self.pool).await?;
    info!("Database migrations applied.");
    Ok(())
  }

  /// Opens a transaction holding the shared lock on the user's row.
  async fn begin_shared(&self, user_id: Uuid) -> StoreResult<Transaction<'static, Postgres>> {
    let mut tx = self.pool.begin().await?;
    let locked = sqlx::query("SELECT id FROM users WHERE id = $1 FOR SHARE")
      .bind(user_id)
      .fetch_optional(&mut *tx)
      .await?;
    if locked.is_none() {
      return Err(StoreError::MissingReference("user"));
    }
    Ok(tx)
  }
}

#[async_trait]
impl Store for PgStore {
  async fn ping(&self) -> StoreResult<()> {
    sqlx::query("SELECT 1").execute(&self.pool).await?;
    Ok(())
  }

  async fn insert_user(&self, new_user: NewUser) -> StoreResult<User> {
    let row = sqlx::query_as::<_, UserRow>(
      "INSERT INTO users (id, name, email, password_hash, role) VALUES ($1, $2, $3, $4, $5) \
       RETURNING id, name, email, password_hash, role, created_at, updated_at",
    )
    .bind(Uuid::new_v4())
    .bind(&new_user.name)
    .bind(&new_user.email)
    .bind(&new_user.password_hash)
    .bind(new_user.role.as_str())
    .fetch_one(&self.pool)
    .await
    .map_err(|e| classify(e, "users.email", "user"))?;
    row.try_into()
  }

  async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
    sqlx::query_as::<_, UserRow>(
      "SELECT id, name, email, password_hash, role, created_at, updated_at FROM users WHERE email = $1",
    )
    .bind(email)
    .fetch_optional(&self.pool)
    .await?
    .map(User::try_from)
    .transpose()
  }

  async fn find_user_by_id(&self, user_id: Uuid) -> StoreResult<Option<User>> {
    sqlx::query_as::<_, UserRow>(
      "SELECT id, name, email, password_hash, role, created_at, updated_at FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(&self.pool)
    .await?
    .map(User::try_from)
    .transpose()
  }

  async fn insert_product(&self, new_product: NewProduct) -> StoreResult<Product> {
    let sql = format!(
      "INSERT INTO products (id, seller_id, farm_id, name, description, price, unit, image_url, category, organic, available) \
       VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING {PRODUCT_COLUMNS}"
    );
    sqlx::query_as::<_, Product>(&sql)
      .bind(Uuid::new_v4())
      .bind(new_product.seller_id)
      .bind(new_product.farm_id)
      .bind(&new_product.name)
      .bind(&new_product.description)
      .bind(new_product.price)
      .bind(&new_product.unit)
      .bind(&new_product.image_url)
      .bind(&new_product.category)
      .bind(new_product.organic)
      .bind(new_product.available)
      .fetch_one(&self.pool)
      .await
      .map_err(|e| classify(e, "products.id", "seller"))
  }

  async fn get_product(&self, product_id: Uuid) -> StoreResult<Option<Product>> {
    let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
    Ok(
      sqlx::query_as::<_, Product>(&sql)
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?,
    )
  }

  async fn list_products(&self, filter: &ProductFilter) -> StoreResult<Vec<Product>> {
    let sql = format!(
      "SELECT {PRODUCT_COLUMNS} FROM products \
       WHERE ($1::TEXT IS NULL OR name ILIKE '%' || $1 || '%') \
         AND ($2::TEXT IS NULL OR category = $2) \
         AND ($3::BOOLEAN IS NULL OR organic = $3) \
         AND ($4::BOOLEAN IS NULL OR available = $4) \
       ORDER BY created_at DESC LIMIT $5"
    );
    Ok(
      sqlx::query_as::<_, Product>(&sql)
        .bind(&filter.search)
        .bind(&filter.category)
        .bind(filter.organic)
        .bind(filter.available)
        .bind(ProductFilter::LIMIT)
        .fetch_all(&self.pool)
        .await?,
    )
  }

  async fn update_product(&self, product_id: Uuid, update: ProductUpdate) -> StoreResult<Option<Product>> {
    let sql = format!(
      "UPDATE products SET \
         name = COALESCE($2, name), \
         description = COALESCE($3, description), \
         price = COALESCE($4, price), \
         unit = COALESCE($5, unit), \
         image_url = COALESCE($6, image_url), \
         category = COALESCE($7, category), \
         organic = COALESCE($8, organic), \
         available = COALESCE($9, available), \
         updated_at = NOW() \
       WHERE id = $1 RETURNING {PRODUCT_COLUMNS}"
    );
    Ok(
      sqlx::query_as::<_, Product>(&sql)
        .bind(product_id)
        .bind(update.name)
        .bind(update.description)
        .bind(update.price)
        .bind(update.unit)
        .bind(update.image_url)
        .bind(update.category)
        .bind(update.organic)
        .bind(update.available)
        .fetch_optional(&self.pool)
        .await?,
    )
  }

  async fn delete_product(&self, product_id: Uuid) -> StoreResult<bool> {
    let result = sqlx::query("DELETE FROM products WHERE id = $1")
      .bind(product_id)
      .execute(&self.pool)
      .await?;
    Ok(result.rows_affected() > 0)
  }

  #[instrument(name = "PgStore::upsert_cart_line", skip(self), err(Display))]
  async fn upsert_cart_line(&self, user_id: Uuid, product_id: Uuid, quantity: i32) -> StoreResult<CartLine> {
    let mut tx = self.begin_shared(user_id).await?;
    let sql = format!(
      "INSERT INTO cart_lines (id, user_id, product_id, quantity) VALUES ($1, $2, $3, $4) \
       ON CONFLICT (user_id, product_id) DO UPDATE SET quantity = cart_lines.quantity + EXCLUDED.quantity \
       RETURNING {CART_LINE_COLUMNS}"
    );
    let line = sqlx::query_as::<_, CartLine>(&sql)
      .bind(Uuid::new_v4())
      .bind(user_id)
      .bind(product_id)
      .bind(quantity)
      .fetch_one(&mut *tx)
      .await
      .map_err(|e| classify(e, "cart_lines.user_product", "product"))?;
    tx.commit().await?;
    Ok(line)
  }

  async fn set_cart_line_quantity(&self, user_id: Uuid, line_id: Uuid, quantity: i32) -> StoreResult<Option<CartLine>> {
    let mut tx = self.begin_shared(user_id).await?;
    let sql = format!("UPDATE cart_lines SET quantity = $3 WHERE id = $1 AND user_id = $2 RETURNING {CART_LINE_COLUMNS}");
    let line = sqlx::query_as::<_, CartLine>(&sql)
      .bind(line_id)
      .bind(user_id)
      .bind(quantity)
      .fetch_optional(&mut *tx)
      .await?;
    tx.commit().await?;
    Ok(line)
  }

  async fn delete_cart_line(&self, user_id: Uuid, line_id: Uuid) -> StoreResult<bool> {
    let mut tx = self.begin_shared(user_id).await?;
    let result = sqlx::query("DELETE FROM cart_lines WHERE id = $1 AND user_id = $2")
      .bind(line_id)
      .bind(user_id)
      .execute(&mut *tx)
      .await?;
    tx.commit().await?;
    Ok(result.rows_affected() > 0)
  }

  async fn cart_view(&self, user_id: Uuid) -> StoreResult<Vec<CartViewLine>> {
    Ok(
      sqlx::query_as::<_, CartViewLine>(
        "SELECT c.id, c.product_id, p.name, p.price, p.unit, p.image_url AS image, c.quantity, c.added_at \
         FROM cart_lines c JOIN products p ON p.id = c.product_id \
         WHERE c.user_id = $1 ORDER BY c.added_at",
      )
      .bind(user_id)
      .fetch_all(&self.pool)
      .await?,
    )
  }

  #[instrument(name = "PgStore::begin_checkout", skip(self), err(Display))]
  async fn begin_checkout(&self, user_id: Uuid) -> StoreResult<Box<dyn CheckoutUnit>> {
    let mut tx = self.pool.begin().await?;
    sqlx::query("SET TRANSACTION ISOLATION LEVEL READ COMMITTED")
      .execute(&mut *tx)
      .await?;
    let locked = sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
      .bind(user_id)
      .fetch_optional(&mut *tx)
      .await?;
    if locked.is_none() {
      return Err(StoreError::MissingReference("user"));
    }
    debug!(%user_id, "Checkout unit opened.");
    Ok(Box::new(PgCheckoutUnit { user_id, tx }))
  }

  async fn find_order_for_user(&self, user_id: Uuid, order_id: Uuid) -> StoreResult<Option<Order>> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 AND user_id = $2");
    sqlx::query_as::<_, OrderRow>(&sql)
      .bind(order_id)
      .bind(user_id)
      .fetch_optional(&self.pool)
      .await?
      .map(Order::try_from)
      .transpose()
  }

  async fn list_orders_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Order>> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC");
    sqlx::query_as::<_, OrderRow>(&sql)
      .bind(user_id)
      .fetch_all(&self.pool)
      .await?
      .into_iter()
      .map(Order::try_from)
      .collect()
  }

  async fn order_items(&self, order_id: Uuid) -> StoreResult<Vec<OrderItem>> {
    Ok(
      sqlx::query_as::<_, OrderItem>("SELECT id, order_id, product_id, quantity, price FROM order_items WHERE order_id = $1")
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?,
    )
  }

  async fn order_item_views(&self, order_id: Uuid) -> StoreResult<Vec<OrderItemView>> {
    let rows = sqlx::query_as::<_, OrderItemView>(
      "SELECT oi.product_id, p.name, oi.quantity, oi.price \
       FROM order_items oi LEFT JOIN products p ON p.id = oi.product_id \
       WHERE oi.order_id = $1",
    )
    .bind(order_id)
    .fetch_all(&self.pool)
    .await?;
    Ok(rows.into_iter().map(OrderItemView::with_line_total).collect())
  }

  async fn top_products(&self, limit: i64) -> StoreResult<Vec<TopProduct>> {
    Ok(
      sqlx::query_as::<_, TopProduct>(
        "SELECT oi.product_id, p.name, SUM(oi.quantity)::BIGINT AS units_sold, \
                SUM(oi.price * oi.quantity) AS revenue \
         FROM order_items oi LEFT JOIN products p ON p.id = oi.product_id \
         GROUP BY oi.product_id, p.name \
         ORDER BY units_sold DESC, revenue DESC LIMIT $1",
      )
      .bind(limit)
      .fetch_all(&self.pool)
      .await?,
    )
  }

  async fn sales_summary(&self) -> StoreResult<SalesSummary> {
    Ok(
      sqlx::query_as::<_, SalesSummary>(
        "SELECT (SELECT COUNT(*) FROM orders) AS total_orders, \
                COALESCE((SELECT SUM(price * quantity) FROM order_items), 0) AS total_sales, \
                (SELECT COUNT(DISTINCT user_id) FROM orders) AS unique_customers",
      )
      .fetch_one(&self.pool)
      .await?,
    )
  }

  async fn customer_spend(&self, limit: i64) -> StoreResult<Vec<CustomerSpend>> {
    Ok(
      sqlx::query_as::<_, CustomerSpend>(
        "SELECT u.id AS user_id, u.name, u.email, COUNT(DISTINCT o.id) AS total_orders, \
                COALESCE(SUM(oi.price * oi.quantity), 0) AS total_spent \
         FROM users u JOIN orders o ON o.user_id = u.id \
         LEFT JOIN order_items oi ON oi.order_id = o.id \
         GROUP BY u.id, u.name, u.email \
         ORDER BY total_spent DESC LIMIT $1",
      )
      .bind(limit)
      .fetch_all(&self.pool)
      .await?,
    )
  }
}

struct PgCheckoutUnit {
  user_id: Uuid,
  tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl CheckoutUnit for PgCheckoutUnit {
  async fn find_order_by_idempotency_key(&mut self, key: &str) -> StoreResult<Option<Order>> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 AND idempotency_key = $2");
    sqlx::query_as::<_, OrderRow>(&sql)
      .bind(self.user_id)
      .bind(key)
      .fetch_optional(&mut *self.tx)
      .await?
      .map(Order::try_from)
      .transpose()
  }

  async fn priced_cart_lines(&mut self) -> StoreResult<Vec<PricedCartLine>> {
    Ok(
      sqlx::query_as::<_, PricedCartLine>(
        "SELECT c.id AS line_id, c.product_id, c.quantity, p.price AS current_price \
         FROM cart_lines c LEFT JOIN products p ON p.id = c.product_id \
         WHERE c.user_id = $1 ORDER BY c.added_at",
      )
      .bind(self.user_id)
      .fetch_all(&mut *self.tx)
      .await?,
    )
  }

  async fn insert_order(&mut self, new_order: NewOrder) -> StoreResult<Order> {
    let sql = format!(
      "INSERT INTO orders (id, user_id, shipping_address, payment_method, idempotency_key) \
       VALUES ($1, $2, $3, $4, $5) RETURNING {ORDER_COLUMNS}"
    );
    sqlx::query_as::<_, OrderRow>(&sql)
      .bind(new_order.id)
      .bind(self.user_id)
      .bind(&new_order.shipping_address)
      .bind(&new_order.payment_method)
      .bind(&new_order.idempotency_key)
      .fetch_one(&mut *self.tx)
      .await
      .map_err(|e| classify(e, "orders.idempotency_key", "user"))?
      .try_into()
  }

  async fn insert_order_item(&mut self, new_item: NewOrderItem) -> StoreResult<OrderItem> {
    sqlx::query_as::<_, OrderItem>(
      "INSERT INTO order_items (id, order_id, product_id, quantity, price) VALUES ($1, $2, $3, $4, $5) \
       RETURNING id, order_id, product_id, quantity, price",
    )
    .bind(Uuid::new_v4())
    .bind(new_item.order_id)
    .bind(new_item.product_id)
    .bind(new_item.quantity)
    .bind(new_item.price)
    .fetch_one(&mut *self.tx)
    .await
    .map_err(|e| classify(e, "order_items.id", "order"))
  }

  async fn delete_cart_lines(&mut self, line_ids: &[Uuid]) -> StoreResult<u64> {
    let result = sqlx::query("DELETE FROM cart_lines WHERE user_id = $1 AND id = ANY($2)")
      .bind(self.user_id)
      .bind(line_ids)
      .execute(&mut *self.tx)
      .await?;
    Ok(result.rows_affected())
  }

  async fn commit(self: Box<Self>) -> StoreResult<()> {
    let PgCheckoutUnit { user_id, tx } = *self;
    tx.commit().await?;
    debug!(%user_id, "Checkout unit committed.");
    Ok(())
  }

  async fn rollback(self: Box<Self>) -> StoreResult<()> {
    let PgCheckoutUnit { user_id, tx } = *self;
    tx.rollback().await?;
    debug!(%user_id, "Checkout unit rolled back.");
    Ok(())
  }
}
