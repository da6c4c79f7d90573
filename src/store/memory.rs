// src/store/memory.rs

//! Process-local `Store`. Each user gets a `tokio::sync::RwLock`: checkout
//! holds it exclusively for the life of its unit, cart mutations hold it
//! shared. A checkout unit stages its writes and applies them in one step on
//! commit, so a dropped or failed unit leaves no trace.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{CheckoutUnit, CustomerSpend, SalesSummary, Store, StoreError, StoreResult, TopProduct};
use crate::models::{
  CartLine, CartViewLine, NewOrder, NewOrderItem, NewProduct, NewUser, Order, OrderItem, OrderItemView,
  OrderStatus, PricedCartLine, Product, ProductFilter, ProductUpdate, User,
};

/// One-shot failures a test can arm on a `MemoryStore`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreFault {
  /// The next order item write inside a checkout unit fails.
  OrderItemInsert,
  /// The next checkout commit fails and nothing is applied.
  Commit,
}

#[derive(Default)]
struct Tables {
  users: HashMap<Uuid, User>,
  products: HashMap<Uuid, Product>,
  cart_lines: HashMap<Uuid, CartLine>,
  orders: HashMap<Uuid, Order>,
  order_items: Vec<OrderItem>,
}

impl Tables {
  fn idempotency_key_taken(&self, user_id: Uuid, key: &str) -> bool {
    self
      .orders
      .values()
      .any(|o| o.user_id == user_id && o.idempotency_key.as_deref() == Some(key))
  }

  fn item_view(&self, item: &OrderItem) -> OrderItemView {
    OrderItemView {
      product_id: item.product_id,
      name: self.products.get(&item.product_id).map(|p| p.name.clone()),
      quantity: item.quantity,
      price: item.price,
      line_total: Decimal::ZERO,
    }
    .with_line_total()
  }
}

#[derive(Default)]
struct Inner {
  tables: Mutex<Tables>,
  user_locks: Mutex<HashMap<Uuid, Arc<RwLock<()>>>>,
  faults: Mutex<HashSet<StoreFault>>,
  commit_delay: Mutex<Option<Duration>>,
}

impl Inner {
  fn take_fault(&self, fault: StoreFault) -> bool {
    self.faults.lock().remove(&fault)
  }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
  inner: Arc<Inner>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Arms `fault`; it fires once, on the next matching operation.
  pub fn inject_fault(&self, fault: StoreFault) {
    warn!(?fault, "Arming store fault.");
    self.inner.faults.lock().insert(fault);
  }

  /// Makes the next checkout commit take at least `delay` before applying.
  pub fn delay_next_commit(&self, delay: Duration) {
    *self.inner.commit_delay.lock() = Some(delay);
  }

  fn user_lock(&self, user_id: Uuid) -> Arc<RwLock<()>> {
    self
      .inner
      .user_locks
      .lock()
      .entry(user_id)
      .or_insert_with(|| Arc::new(RwLock::new(())))
      .clone()
  }
}

#[async_trait]
impl Store for MemoryStore {
  async fn ping(&self) -> StoreResult<()> {
    Ok(())
  }

  async fn insert_user(&self, new_user: NewUser) -> StoreResult<User> {
    let mut tables = self.inner.tables.lock();
    if tables.users.values().any(|u| u.email == new_user.email) {
      return Err(StoreError::UniqueViolation("users.email".to_string()));
    }
    let now = Utc::now();
    let user = User {
      id: Uuid::new_v4(),
      name: new_user.name,
      email: new_user.email,
      password_hash: new_user.password_hash,
      role: new_user.role,
      created_at: now,
      updated_at: now,
    };
    tables.users.insert(user.id, user.clone());
    Ok(user)
  }

  async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
    let tables = self.inner.tables.lock();
    Ok(tables.users.values().find(|u| u.email == email).cloned())
  }

  async fn find_user_by_id(&self, user_id: Uuid) -> StoreResult<Option<User>> {
    Ok(self.inner.tables.lock().users.get(&user_id).cloned())
  }

  async fn insert_product(&self, new_product: NewProduct) -> StoreResult<Product> {
    let mut tables = self.inner.tables.lock();
    if !tables.users.contains_key(&new_product.seller_id) {
      return Err(StoreError::MissingReference("seller"));
    }
    let now = Utc::now();
    let product = Product {
      id: Uuid::new_v4(),
      seller_id: new_product.seller_id,
      farm_id: new_product.farm_id,
      name: new_product.name,
      description: new_product.description,
      price: new_product.price,
      unit: new_product.unit,
      image_url: new_product.image_url,
      category: new_product.category,
      organic: new_product.organic,
      available: new_product.available,
      created_at: now,
      updated_at: now,
    };
    tables.products.insert(product.id, product.clone());
    Ok(product)
  }

  async fn get_product(&self, product_id: Uuid) -> StoreResult<Option<Product>> {
    Ok(self.inner.tables.lock().products.get(&product_id).cloned())
  }

  async fn list_products(&self, filter: &ProductFilter) -> StoreResult<Vec<Product>> {
    let tables = self.inner.tables.lock();
    let mut products: Vec<Product> = tables.products.values().filter(|p| filter.matches(p)).cloned().collect();
    products.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    products.truncate(ProductFilter::LIMIT as usize);
    Ok(products)
  }

  async fn update_product(&self, product_id: Uuid, update: ProductUpdate) -> StoreResult<Option<Product>> {
    let mut tables = self.inner.tables.lock();
    let Some(product) = tables.products.get_mut(&product_id) else {
      return Ok(None);
    };
    if let Some(name) = update.name {
      product.name = name;
    }
    if let Some(description) = update.description {
      product.description = Some(description);
    }
    if let Some(price) = update.price {
      product.price = price;
    }
    if let Some(unit) = update.unit {
      product.unit = unit;
    }
    if let Some(image_url) = update.image_url {
      product.image_url = Some(image_url);
    }
    if let Some(category) = update.category {
      product.category = Some(category);
    }
    if let Some(organic) = update.organic {
      product.organic = organic;
    }
    if let Some(available) = update.available {
      product.available = available;
    }
    product.updated_at = Utc::now();
    Ok(Some(product.clone()))
  }

  async fn delete_product(&self, product_id: Uuid) -> StoreResult<bool> {
    let mut tables = self.inner.tables.lock();
    let removed = tables.products.remove(&product_id).is_some();
    if removed {
      // cart lines cascade, order items keep their snapshot
      tables.cart_lines.retain(|_, line| line.product_id != product_id);
    }
    Ok(removed)
  }

  async fn upsert_cart_line(&self, user_id: Uuid, product_id: Uuid, quantity: i32) -> StoreResult<CartLine> {
    let lock = self.user_lock(user_id);
    let _shared = lock.read().await;

    let mut tables = self.inner.tables.lock();
    if !tables.users.contains_key(&user_id) {
      return Err(StoreError::MissingReference("user"));
    }
    if !tables.products.contains_key(&product_id) {
      return Err(StoreError::MissingReference("product"));
    }
    if let Some(line) = tables
      .cart_lines
      .values_mut()
      .find(|l| l.user_id == user_id && l.product_id == product_id)
    {
      line.quantity = line.quantity.checked_add(quantity).ok_or(StoreError::QuantityOverflow)?;
      return Ok(line.clone());
    }
    let line = CartLine {
      id: Uuid::new_v4(),
      user_id,
      product_id,
      quantity,
      added_at: Utc::now(),
    };
    tables.cart_lines.insert(line.id, line.clone());
    Ok(line)
  }

  async fn set_cart_line_quantity(&self, user_id: Uuid, line_id: Uuid, quantity: i32) -> StoreResult<Option<CartLine>> {
    let lock = self.user_lock(user_id);
    let _shared = lock.read().await;

    let mut tables = self.inner.tables.lock();
    match tables.cart_lines.get_mut(&line_id) {
      Some(line) if line.user_id == user_id => {
        line.quantity = quantity;
        Ok(Some(line.clone()))
      }
      _ => Ok(None),
    }
  }

  async fn delete_cart_line(&self, user_id: Uuid, line_id: Uuid) -> StoreResult<bool> {
    let lock = self.user_lock(user_id);
    let _shared = lock.read().await;

    let mut tables = self.inner.tables.lock();
    let owned = tables.cart_lines.get(&line_id).is_some_and(|l| l.user_id == user_id);
    if owned {
      tables.cart_lines.remove(&line_id);
    }
    Ok(owned)
  }

  async fn cart_view(&self, user_id: Uuid) -> StoreResult<Vec<CartViewLine>> {
    let tables = self.inner.tables.lock();
    let lines = tables
      .cart_lines
      .values()
      .filter(|l| l.user_id == user_id)
      .filter_map(|line| {
        tables.products.get(&line.product_id).map(|product| CartViewLine {
          id: line.id,
          product_id: product.id,
          name: product.name.clone(),
          price: product.price,
          unit: product.unit.clone(),
          image: product.image_url.clone(),
          quantity: line.quantity,
          line_total: Decimal::ZERO,
          added_at: line.added_at,
        })
      })
      .collect();
    Ok(lines)
  }

  async fn begin_checkout(&self, user_id: Uuid) -> StoreResult<Box<dyn CheckoutUnit>> {
    let guard = self.user_lock(user_id).write_owned().await;
    if !self.inner.tables.lock().users.contains_key(&user_id) {
      return Err(StoreError::MissingReference("user"));
    }
    debug!(%user_id, "Checkout unit opened.");
    Ok(Box::new(MemoryCheckoutUnit {
      user_id,
      inner: Arc::clone(&self.inner),
      _exclusive: guard,
      staged_orders: Vec::new(),
      staged_items: Vec::new(),
      staged_deletions: HashSet::new(),
    }))
  }

  async fn find_order_for_user(&self, user_id: Uuid, order_id: Uuid) -> StoreResult<Option<Order>> {
    let tables = self.inner.tables.lock();
    Ok(tables.orders.get(&order_id).filter(|o| o.user_id == user_id).cloned())
  }

  async fn list_orders_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Order>> {
    let tables = self.inner.tables.lock();
    let mut orders: Vec<Order> = tables.orders.values().filter(|o| o.user_id == user_id).cloned().collect();
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(orders)
  }

  async fn order_items(&self, order_id: Uuid) -> StoreResult<Vec<OrderItem>> {
    let tables = self.inner.tables.lock();
    Ok(tables.order_items.iter().filter(|i| i.order_id == order_id).cloned().collect())
  }

  async fn order_item_views(&self, order_id: Uuid) -> StoreResult<Vec<OrderItemView>> {
    let tables = self.inner.tables.lock();
    Ok(
      tables
        .order_items
        .iter()
        .filter(|i| i.order_id == order_id)
        .map(|i| tables.item_view(i))
        .collect(),
    )
  }

  async fn top_products(&self, limit: i64) -> StoreResult<Vec<TopProduct>> {
    let tables = self.inner.tables.lock();
    let mut by_product: HashMap<Uuid, (i64, Decimal)> = HashMap::new();
    for item in &tables.order_items {
      let entry = by_product.entry(item.product_id).or_insert((0, Decimal::ZERO));
      entry.0 += i64::from(item.quantity);
      entry.1 += item.line_total();
    }
    let mut rows: Vec<TopProduct> = by_product
      .into_iter()
      .map(|(product_id, (units_sold, revenue))| TopProduct {
        product_id,
        name: tables.products.get(&product_id).map(|p| p.name.clone()),
        units_sold,
        revenue,
      })
      .collect();
    rows.sort_by(|a, b| b.units_sold.cmp(&a.units_sold).then(b.revenue.cmp(&a.revenue)));
    rows.truncate(limit.max(0) as usize);
    Ok(rows)
  }

  async fn sales_summary(&self) -> StoreResult<SalesSummary> {
    let tables = self.inner.tables.lock();
    let total_sales = tables.order_items.iter().map(OrderItem::line_total).sum();
    let customers: HashSet<Uuid> = tables.orders.values().map(|o| o.user_id).collect();
    Ok(SalesSummary {
      total_orders: tables.orders.len() as i64,
      total_sales,
      unique_customers: customers.len() as i64,
    })
  }

  async fn customer_spend(&self, limit: i64) -> StoreResult<Vec<CustomerSpend>> {
    let tables = self.inner.tables.lock();
    let mut by_user: HashMap<Uuid, (HashSet<Uuid>, Decimal)> = HashMap::new();
    for order in tables.orders.values() {
      by_user.entry(order.user_id).or_default().0.insert(order.id);
    }
    for item in &tables.order_items {
      if let Some(order) = tables.orders.get(&item.order_id) {
        by_user.entry(order.user_id).or_default().1 += item.line_total();
      }
    }
    let mut rows: Vec<CustomerSpend> = by_user
      .into_iter()
      .filter_map(|(user_id, (order_ids, total_spent))| {
        tables.users.get(&user_id).map(|user| CustomerSpend {
          user_id,
          name: user.name.clone(),
          email: user.email.clone(),
          total_orders: order_ids.len() as i64,
          total_spent,
        })
      })
      .collect();
    rows.sort_by(|a, b| b.total_spent.cmp(&a.total_spent));
    rows.truncate(limit.max(0) as usize);
    Ok(rows)
  }
}

struct MemoryCheckoutUnit {
  user_id: Uuid,
  inner: Arc<Inner>,
  _exclusive: OwnedRwLockWriteGuard<()>,
  staged_orders: Vec<Order>,
  staged_items: Vec<OrderItem>,
  staged_deletions: HashSet<Uuid>,
}

#[async_trait]
impl CheckoutUnit for MemoryCheckoutUnit {
  async fn find_order_by_idempotency_key(&mut self, key: &str) -> StoreResult<Option<Order>> {
    if let Some(order) = self
      .staged_orders
      .iter()
      .find(|o| o.idempotency_key.as_deref() == Some(key))
    {
      return Ok(Some(order.clone()));
    }
    let tables = self.inner.tables.lock();
    Ok(
      tables
        .orders
        .values()
        .find(|o| o.user_id == self.user_id && o.idempotency_key.as_deref() == Some(key))
        .cloned(),
    )
  }

  async fn priced_cart_lines(&mut self) -> StoreResult<Vec<PricedCartLine>> {
    let tables = self.inner.tables.lock();
    let mut lines: Vec<&CartLine> = tables
      .cart_lines
      .values()
      .filter(|l| l.user_id == self.user_id && !self.staged_deletions.contains(&l.id))
      .collect();
    lines.sort_by_key(|l| l.added_at);
    Ok(
      lines
        .into_iter()
        .map(|line| PricedCartLine {
          line_id: line.id,
          product_id: line.product_id,
          quantity: line.quantity,
          current_price: tables.products.get(&line.product_id).map(|p| p.price),
        })
        .collect(),
    )
  }

  async fn insert_order(&mut self, new_order: NewOrder) -> StoreResult<Order> {
    if let Some(key) = new_order.idempotency_key.as_deref() {
      let staged_dup = self.staged_orders.iter().any(|o| o.idempotency_key.as_deref() == Some(key));
      if staged_dup || self.inner.tables.lock().idempotency_key_taken(self.user_id, key) {
        return Err(StoreError::UniqueViolation("orders.idempotency_key".to_string()));
      }
    }
    let order = Order {
      id: new_order.id,
      user_id: self.user_id,
      shipping_address: new_order.shipping_address,
      payment_method: new_order.payment_method,
      status: OrderStatus::Pending,
      idempotency_key: new_order.idempotency_key,
      created_at: Utc::now(),
    };
    self.staged_orders.push(order.clone());
    Ok(order)
  }

  async fn insert_order_item(&mut self, new_item: NewOrderItem) -> StoreResult<OrderItem> {
    if self.inner.take_fault(StoreFault::OrderItemInsert) {
      return Err(StoreError::Injected("order item insert"));
    }
    if !self.staged_orders.iter().any(|o| o.id == new_item.order_id) {
      return Err(StoreError::MissingReference("order"));
    }
    let item = OrderItem {
      id: Uuid::new_v4(),
      order_id: new_item.order_id,
      product_id: new_item.product_id,
      quantity: new_item.quantity,
      price: new_item.price,
    };
    self.staged_items.push(item.clone());
    Ok(item)
  }

  async fn delete_cart_lines(&mut self, line_ids: &[Uuid]) -> StoreResult<u64> {
    let tables = self.inner.tables.lock();
    let mut deleted = 0;
    for line_id in line_ids {
      let owned = tables.cart_lines.get(line_id).is_some_and(|l| l.user_id == self.user_id);
      if owned && self.staged_deletions.insert(*line_id) {
        deleted += 1;
      }
    }
    Ok(deleted)
  }

  async fn commit(self: Box<Self>) -> StoreResult<()> {
    if self.inner.take_fault(StoreFault::Commit) {
      return Err(StoreError::Injected("commit"));
    }
    let delay = self.inner.commit_delay.lock().take();
    if let Some(delay) = delay {
      tokio::time::sleep(delay).await;
    }
    let unit = *self;
    let mut tables = unit.inner.tables.lock();
    for order in unit.staged_orders {
      tables.orders.insert(order.id, order);
    }
    tables.order_items.extend(unit.staged_items);
    tables.cart_lines.retain(|id, _| !unit.staged_deletions.contains(id));
    debug!(user_id = %unit.user_id, "Checkout unit committed.");
    Ok(())
  }

  async fn rollback(self: Box<Self>) -> StoreResult<()> {
    debug!(user_id = %self.user_id, "Checkout unit rolled back.");
    Ok(())
  }
}
