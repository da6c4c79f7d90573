// tests/checkout_tests.rs
mod common;

use std::time::Duration;

use agri_market::config::AppConfig;
use agri_market::errors::AppError;
use agri_market::models::{ProductUpdate, Role};
use agri_market::services::CheckoutRequest;
use agri_market::store::{Store, StoreFault};
use common::*;
use rust_decimal::Decimal;
use serial_test::serial;

fn request(key: Option<&str>) -> CheckoutRequest {
  CheckoutRequest {
    shipping_address: "12 Orchard Lane".to_string(),
    payment_method: "card".to_string(),
    idempotency_key: key.map(str::to_string),
  }
}

#[tokio::test]
async fn test_checkout_totals_match_captured_prices() {
  setup_tracing();
  let (store, state) = memory_state();
  let seller = create_user(&store, Role::Seller).await;
  let buyer = create_user(&store, Role::Buyer).await;
  let honey = create_product(&store, &seller, "Honey", "7.40").await;
  let eggs = create_product(&store, &seller, "Eggs", "0.35").await;
  state.cart.add_or_increment(buyer.id, honey.id, 2).await.unwrap();
  state.cart.add_or_increment(buyer.id, eggs.id, 12).await.unwrap();

  let receipt = state.fulfillment.checkout(buyer.id, request(None)).await.unwrap();

  assert!(!receipt.replayed);
  assert_eq!(receipt.total, dec("19.00"));
  let items = store.order_items(receipt.order_id).await.unwrap();
  assert_eq!(items.len(), 2);
  let recomputed: Decimal = items.iter().map(|i| i.price * Decimal::from(i.quantity)).sum();
  assert_eq!(recomputed, receipt.total);
  let detail = state.orders.get(buyer.id, receipt.order_id).await.unwrap();
  assert_eq!(detail.total, receipt.total);
}

#[tokio::test]
async fn test_checkout_empties_cart() {
  setup_tracing();
  let (store, state) = memory_state();
  let seller = create_user(&store, Role::Seller).await;
  let buyer = create_user(&store, Role::Buyer).await;
  let milk = create_product(&store, &seller, "Milk", "1.10").await;
  state.cart.add_or_increment(buyer.id, milk.id, 3).await.unwrap();

  state.fulfillment.checkout(buyer.id, request(None)).await.unwrap();

  assert!(state.cart.view(buyer.id).await.unwrap().items.is_empty());
}

#[tokio::test]
async fn test_checkout_of_empty_cart_fails_without_creating_order() {
  setup_tracing();
  let (store, state) = memory_state();
  let buyer = create_user(&store, Role::Buyer).await;

  let err = state.fulfillment.checkout(buyer.id, request(None)).await.unwrap_err();

  assert!(matches!(err, AppError::EmptyCart));
  assert!(state.orders.list(buyer.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_resubmission_without_key_fails_with_empty_cart() {
  setup_tracing();
  let (store, state) = memory_state();
  let seller = create_user(&store, Role::Seller).await;
  let buyer = create_user(&store, Role::Buyer).await;
  let squash = create_product(&store, &seller, "Squash", "2.00").await;
  state.cart.add_or_increment(buyer.id, squash.id, 1).await.unwrap();

  state.fulfillment.checkout(buyer.id, request(None)).await.unwrap();
  let err = state.fulfillment.checkout(buyer.id, request(None)).await.unwrap_err();

  assert!(matches!(err, AppError::EmptyCart));
  assert_eq!(state.orders.list(buyer.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_missing_shipping_or_payment_is_invalid_input() {
  setup_tracing();
  let (store, state) = memory_state();
  let seller = create_user(&store, Role::Seller).await;
  let buyer = create_user(&store, Role::Buyer).await;
  let herbs = create_product(&store, &seller, "Herbs", "1.00").await;
  state.cart.add_or_increment(buyer.id, herbs.id, 1).await.unwrap();

  let mut no_address = request(None);
  no_address.shipping_address = "   ".to_string();
  let err = state.fulfillment.checkout(buyer.id, no_address).await.unwrap_err();
  assert!(matches!(err, AppError::InvalidInput(_)));

  let mut no_payment = request(None);
  no_payment.payment_method = String::new();
  let err = state.fulfillment.checkout(buyer.id, no_payment).await.unwrap_err();
  assert!(matches!(err, AppError::InvalidInput(_)));

  assert_eq!(state.cart.view(buyer.id).await.unwrap().items.len(), 1);
}

#[tokio::test]
async fn test_failed_item_write_rolls_back_everything() {
  setup_tracing();
  let (store, state) = memory_state();
  let seller = create_user(&store, Role::Seller).await;
  let buyer = create_user(&store, Role::Buyer).await;
  let plums = create_product(&store, &seller, "Plums", "3.30").await;
  let figs = create_product(&store, &seller, "Figs", "5.00").await;
  state.cart.add_or_increment(buyer.id, plums.id, 2).await.unwrap();
  state.cart.add_or_increment(buyer.id, figs.id, 1).await.unwrap();
  let before = state.cart.view(buyer.id).await.unwrap();

  store.inject_fault(StoreFault::OrderItemInsert);
  let err = state.fulfillment.checkout(buyer.id, request(None)).await.unwrap_err();

  assert!(matches!(err, AppError::OrderCreationFailed(_)));
  assert!(state.orders.list(buyer.id).await.unwrap().is_empty());
  let summary = store.sales_summary().await.unwrap();
  assert_eq!(summary.total_orders, 0);
  assert_eq!(summary.total_sales, Decimal::ZERO);

  let after = state.cart.view(buyer.id).await.unwrap();
  assert_eq!(after.items.len(), before.items.len());
  assert_eq!(after.subtotal, before.subtotal);

  // the lock was released, so a retry goes through
  let receipt = state.fulfillment.checkout(buyer.id, request(None)).await.unwrap();
  assert_eq!(receipt.total, dec("11.60"));
}

#[tokio::test]
async fn test_failed_commit_leaves_cart_untouched() {
  setup_tracing();
  let (store, state) = memory_state();
  let seller = create_user(&store, Role::Seller).await;
  let buyer = create_user(&store, Role::Buyer).await;
  let peas = create_product(&store, &seller, "Peas", "1.50").await;
  state.cart.add_or_increment(buyer.id, peas.id, 2).await.unwrap();

  store.inject_fault(StoreFault::Commit);
  let err = state.fulfillment.checkout(buyer.id, request(Some("commit-fault"))).await.unwrap_err();

  assert!(matches!(err, AppError::OrderCreationFailed(_)));
  assert!(state.orders.list(buyer.id).await.unwrap().is_empty());
  assert_eq!(state.cart.view(buyer.id).await.unwrap().items[0].quantity, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn test_concurrent_checkouts_produce_exactly_one_order() {
  setup_tracing();
  let (store, state) = memory_state();
  let seller = create_user(&store, Role::Seller).await;
  let buyer = create_user(&store, Role::Buyer).await;
  let melon = create_product(&store, &seller, "Melon", "4.50").await;
  state.cart.add_or_increment(buyer.id, melon.id, 2).await.unwrap();
  let buyer_id = buyer.id;

  let first = tokio::spawn({
    let fulfillment = state.fulfillment.clone();
    async move { fulfillment.checkout(buyer_id, request(None)).await }
  });
  let second = tokio::spawn({
    let fulfillment = state.fulfillment.clone();
    async move { fulfillment.checkout(buyer_id, request(None)).await }
  });
  let outcomes = [first.await.unwrap(), second.await.unwrap()];

  let successes: Vec<_> = outcomes.iter().filter_map(|o| o.as_ref().ok()).collect();
  let empty_cart_failures = outcomes
    .iter()
    .filter(|o| matches!(o, Err(AppError::EmptyCart)))
    .count();
  assert_eq!(successes.len(), 1);
  assert_eq!(empty_cart_failures, 1);
  assert_eq!(successes[0].total, dec("9.00"));

  let orders = state.orders.list(buyer.id).await.unwrap();
  assert_eq!(orders.len(), 1);
  assert_eq!(store.order_items(orders[0].id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_idempotency_key_replays_original_order() {
  setup_tracing();
  let (store, state) = memory_state();
  let seller = create_user(&store, Role::Seller).await;
  let buyer = create_user(&store, Role::Buyer).await;
  let cheese = create_product(&store, &seller, "Cheese", "6.25").await;
  state.cart.add_or_increment(buyer.id, cheese.id, 2).await.unwrap();

  let original = state.fulfillment.checkout(buyer.id, request(Some("order-42"))).await.unwrap();
  // new items after the first checkout must not be swept into the replay
  state.cart.add_or_increment(buyer.id, cheese.id, 1).await.unwrap();
  let replay = state.fulfillment.checkout(buyer.id, request(Some("order-42"))).await.unwrap();

  assert!(!original.replayed);
  assert!(replay.replayed);
  assert_eq!(replay.order_id, original.order_id);
  assert_eq!(replay.total, dec("12.50"));
  assert_eq!(state.orders.list(buyer.id).await.unwrap().len(), 1);
  assert_eq!(state.cart.view(buyer.id).await.unwrap().items[0].quantity, 1);

  let fresh = state.fulfillment.checkout(buyer.id, request(Some("order-43"))).await.unwrap();
  assert_ne!(fresh.order_id, original.order_id);
  assert_eq!(state.orders.list(buyer.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_idempotency_keys_are_scoped_per_user() {
  setup_tracing();
  let (store, state) = memory_state();
  let seller = create_user(&store, Role::Seller).await;
  let alice = create_user(&store, Role::Buyer).await;
  let bob = create_user(&store, Role::Buyer).await;
  let nuts = create_product(&store, &seller, "Nuts", "9.99").await;
  state.cart.add_or_increment(alice.id, nuts.id, 1).await.unwrap();
  state.cart.add_or_increment(bob.id, nuts.id, 1).await.unwrap();

  let a = state.fulfillment.checkout(alice.id, request(Some("shared-key"))).await.unwrap();
  let b = state.fulfillment.checkout(bob.id, request(Some("shared-key"))).await.unwrap();

  assert!(!b.replayed);
  assert_ne!(a.order_id, b.order_id);
}

#[tokio::test]
async fn test_malformed_idempotency_key_is_invalid_input() {
  setup_tracing();
  let (store, state) = memory_state();
  let buyer = create_user(&store, Role::Buyer).await;

  let too_long = "k".repeat(129);
  for key in ["", "has space", too_long.as_str()] {
    let err = state.fulfillment.checkout(buyer.id, request(Some(key))).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)), "key {:?} gave {:?}", key, err);
  }
}

#[tokio::test]
async fn test_order_keeps_price_captured_at_checkout() {
  setup_tracing();
  let (store, state) = memory_state();
  let seller = create_user(&store, Role::Seller).await;
  let buyer = create_user(&store, Role::Buyer).await;
  let berries = create_product(&store, &seller, "Berries", "4.00").await;
  state.cart.add_or_increment(buyer.id, berries.id, 3).await.unwrap();
  let receipt = state.fulfillment.checkout(buyer.id, request(None)).await.unwrap();

  state
    .catalog
    .update(
      seller.id,
      berries.id,
      ProductUpdate {
        price: Some(dec("9.00")),
        ..Default::default()
      },
    )
    .await
    .unwrap();
  let detail = state.orders.get(buyer.id, receipt.order_id).await.unwrap();
  assert_eq!(detail.items[0].price, dec("4.00"));
  assert_eq!(detail.total, dec("12.00"));

  state.catalog.delete(seller.id, berries.id).await.unwrap();
  let detail = state.orders.get(buyer.id, receipt.order_id).await.unwrap();
  assert_eq!(detail.items[0].name, None);
  assert_eq!(detail.total, dec("12.00"));
}

#[tokio::test]
async fn test_checkout_does_not_touch_other_users_carts() {
  setup_tracing();
  let (store, state) = memory_state();
  let seller = create_user(&store, Role::Seller).await;
  let alice = create_user(&store, Role::Buyer).await;
  let bob = create_user(&store, Role::Buyer).await;
  let bread = create_product(&store, &seller, "Bread", "3.00").await;
  state.cart.add_or_increment(alice.id, bread.id, 1).await.unwrap();
  state.cart.add_or_increment(bob.id, bread.id, 2).await.unwrap();

  state.fulfillment.checkout(alice.id, request(None)).await.unwrap();

  let bob_cart = state.cart.view(bob.id).await.unwrap();
  assert_eq!(bob_cart.items.len(), 1);
  assert_eq!(bob_cart.items[0].quantity, 2);
}

fn short_timeout_config(timeout: Duration) -> AppConfig {
  let mut config = AppConfig::for_memory(TEST_TOKEN_SECRET);
  config.storage_timeout = timeout;
  config
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn test_checkout_blocked_on_user_lock_times_out_cleanly() {
  setup_tracing();
  let (store, state) = memory_state_with(short_timeout_config(Duration::from_millis(50)));
  let seller = create_user(&store, Role::Seller).await;
  let buyer = create_user(&store, Role::Buyer).await;
  let plums = create_product(&store, &seller, "Plums", "2.20").await;
  state.cart.add_or_increment(buyer.id, plums.id, 3).await.unwrap();

  let held = store.begin_checkout(buyer.id).await.unwrap();
  let outcome = state.fulfillment.checkout(buyer.id, request(None)).await;
  held.rollback().await.unwrap();

  assert!(matches!(outcome, Err(AppError::OrderCreationFailed(_))));
  assert!(state.orders.list(buyer.id).await.unwrap().is_empty());
  let cart = state.cart.view(buyer.id).await.unwrap();
  assert_eq!(cart.items.len(), 1);
  assert_eq!(cart.items[0].quantity, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn test_commit_outlasting_storage_timeout_still_succeeds() {
  setup_tracing();
  let (store, state) = memory_state_with(short_timeout_config(Duration::from_millis(50)));
  let seller = create_user(&store, Role::Seller).await;
  let buyer = create_user(&store, Role::Buyer).await;
  let kale = create_product(&store, &seller, "Kale", "1.75").await;
  state.cart.add_or_increment(buyer.id, kale.id, 4).await.unwrap();

  store.delay_next_commit(Duration::from_millis(150));
  let receipt = state.fulfillment.checkout(buyer.id, request(None)).await.unwrap();

  assert_eq!(receipt.total, dec("7.00"));
  let orders = state.orders.list(buyer.id).await.unwrap();
  assert_eq!(orders.len(), 1);
  assert_eq!(orders[0].id, receipt.order_id);
  assert!(state.cart.view(buyer.id).await.unwrap().items.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn test_cart_add_racing_checkout_lands_in_order_or_cart() {
  setup_tracing();
  let (store, state) = memory_state();
  let seller = create_user(&store, Role::Seller).await;
  let corn = create_product(&store, &seller, "Corn", "0.80").await;
  let leeks = create_product(&store, &seller, "Leeks", "1.30").await;

  let leeks_id = leeks.id;

  for _ in 0..20 {
    let buyer_id = create_user(&store, Role::Buyer).await.id;
    state.cart.add_or_increment(buyer_id, corn.id, 1).await.unwrap();

    let checkout = tokio::spawn({
      let fulfillment = state.fulfillment.clone();
      async move { fulfillment.checkout(buyer_id, request(None)).await }
    });
    let add = tokio::spawn({
      let cart = state.cart.clone();
      async move { cart.add_or_increment(buyer_id, leeks_id, 2).await }
    });
    let receipt = checkout.await.unwrap().unwrap();
    add.await.unwrap().unwrap();

    let items = store.order_items(receipt.order_id).await.unwrap();
    let ordered_leeks: i32 = items.iter().filter(|i| i.product_id == leeks_id).map(|i| i.quantity).sum();
    let cart = state.cart.view(buyer_id).await.unwrap();
    let carted_leeks: i32 = cart.items.iter().filter(|l| l.product_id == leeks_id).map(|l| l.quantity).sum();
    assert_eq!(ordered_leeks + carted_leeks, 2);
    assert!(cart.items.iter().all(|l| l.product_id != corn.id));
    assert!(items.iter().any(|i| i.product_id == corn.id));
  }
}
