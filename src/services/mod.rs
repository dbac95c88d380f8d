// Pricing and discounts
pub mod discounts;
pub mod pricing;

// Catalog and administration
pub mod catalog;
pub mod categories;
pub mod csv_io;
pub mod products;

// Customers
pub mod customer_prices;
pub mod customers;
pub mod wishlist;

// Inventory
pub mod inventory;

// Orders and checkout handoff
pub mod messaging;
pub mod order_status;
pub mod orders;
