// src/models/mod.rs

//! Records exchanged between the store, the services and the web layer.

pub mod cart_line;
pub mod order;
pub mod order_item;
pub mod product;
pub mod user;

pub use cart_line::{CartLine, CartView, CartViewLine, PricedCartLine};
pub use order::{NewOrder, Order, OrderDetail, OrderStatus, OrderSummary};
pub use order_item::{NewOrderItem, OrderItem, OrderItemView};
pub use product::{NewProduct, Product, ProductFilter, ProductUpdate};
pub use user::{NewUser, Role, User};
