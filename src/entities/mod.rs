//! sea-orm entities for the storefront and back office tables

pub mod category;
pub mod customer;
pub mod customer_price;
pub mod discount;
pub mod inventory_movement;
pub mod order;
pub mod order_item;
pub mod order_status_history;
pub mod product;
pub mod product_image;
pub mod product_variant;
pub mod stock_alert;
pub mod wishlist_item;

pub use discount::{DiscountScope, DiscountType};
pub use inventory_movement::MovementType;
pub use order::OrderStatus;
