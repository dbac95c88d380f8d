//! Session cart.
//!
//! Lines are keyed by product id, or `<product>-<variant>` when a variant was
//! chosen. Each line keeps its list price and the per-unit discount resolved for
//! it, so the subtotal is at list price and the discount is shown apart.
//! Checkout re-prices every line on the server.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CartItem {
    pub id: String,
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub name: String,
    /// List price of one unit
    pub price: Decimal,
    #[serde(default)]
    pub unit_discount: Decimal,
    pub quantity: i32,
    pub image: Option<String>,
}

impl CartItem {
    pub fn new(
        product_id: Uuid,
        variant_id: Option<Uuid>,
        name: impl Into<String>,
        price: Decimal,
    ) -> Self {
        Self {
            id: line_key(product_id, variant_id),
            product_id,
            variant_id,
            name: name.into(),
            price,
            unit_discount: Decimal::ZERO,
            quantity: 1,
            image: None,
        }
    }

    pub fn with_image(mut self, image: Option<String>) -> Self {
        self.image = image;
        self
    }

    pub fn with_discount(mut self, unit_discount: Decimal) -> Self {
        self.unit_discount = unit_discount;
        self
    }

    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }

    pub fn line_discount(&self) -> Decimal {
        self.unit_discount * Decimal::from(self.quantity)
    }
}

pub fn line_key(product_id: Uuid, variant_id: Option<Uuid>) -> String {
    match variant_id {
        Some(variant) => format!("{}-{}", product_id, variant),
        None => product_id.to_string(),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of units across all lines
    pub fn item_count(&self) -> i32 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    /// Adds one unit: a new line at quantity 1 or +1 on the existing line.
    ///
    /// The quantity carried by `item` is ignored, use [`Cart::add_quantity`] to
    /// add several units at once.
    pub fn add_to_cart(&mut self, item: CartItem) {
        self.add_quantity(item, 1);
    }

    pub fn add_quantity(&mut self, item: CartItem, quantity: i32) {
        if quantity <= 0 {
            return;
        }
        match self.items.iter_mut().find(|line| line.id == item.id) {
            Some(line) => line.quantity += quantity,
            None => self.items.push(CartItem { quantity, ..item }),
        }
    }

    /// Returns false when no line has that id
    pub fn increment(&mut self, id: &str) -> bool {
        match self.items.iter_mut().find(|line| line.id == id) {
            Some(line) => {
                line.quantity += 1;
                true
            }
            None => false,
        }
    }

    /// Decrementing a line at quantity 1 removes it
    pub fn decrement(&mut self, id: &str) -> bool {
        let Some(pos) = self.items.iter().position(|line| line.id == id) else {
            return false;
        };
        if self.items[pos].quantity <= 1 {
            self.items.remove(pos);
        } else {
            self.items[pos].quantity -= 1;
        }
        true
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|line| line.id != id);
        self.items.len() != before
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn subtotal(&self) -> Decimal {
        self.items.iter().map(CartItem::line_total).sum()
    }

    /// Replaces the price of a line; false when no line has that id
    pub fn reprice(&mut self, id: &str, price: Decimal, unit_discount: Decimal) -> bool {
        match self.items.iter_mut().find(|line| line.id == id) {
            Some(line) => {
                line.price = price;
                line.unit_discount = unit_discount;
                true
            }
            None => false,
        }
    }

    /// Sum of the line discounts, never more than the subtotal
    pub fn discount_amount(&self) -> Decimal {
        let discount: Decimal = self.items.iter().map(CartItem::line_discount).sum();
        discount.min(self.subtotal()).round_dp(2)
    }

    pub fn total(&self) -> Decimal {
        (self.subtotal() - self.discount_amount()).max(Decimal::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn item(product: Uuid, price: Decimal) -> CartItem {
        CartItem::new(product, None, "Cemento", price)
    }

    #[test]
    fn same_product_twice_is_one_line_of_two() {
        let product = Uuid::new_v4();
        let mut cart = Cart::new();
        cart.add_to_cart(item(product, dec!(100)));
        cart.add_to_cart(item(product, dec!(100)));
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.items()[0].quantity, 2);
        assert_eq!(cart.subtotal(), dec!(200));
    }

    #[test]
    fn add_to_cart_ignores_item_quantity() {
        let product = Uuid::new_v4();
        let mut cart = Cart::new();
        let mut line = item(product, dec!(10));
        line.quantity = 7;
        cart.add_to_cart(line);
        assert_eq!(cart.items()[0].quantity, 1);

        cart.add_quantity(item(product, dec!(10)), 4);
        assert_eq!(cart.items()[0].quantity, 5);
    }

    #[test]
    fn variants_get_their_own_line() {
        let product = Uuid::new_v4();
        let variant = Uuid::new_v4();
        let mut cart = Cart::new();
        cart.add_to_cart(item(product, dec!(10)));
        cart.add_to_cart(CartItem::new(product, Some(variant), "Cemento 25kg", dec!(6)));
        assert_eq!(cart.items().len(), 2);
        assert_eq!(cart.items()[1].id, format!("{}-{}", product, variant));
    }

    #[test]
    fn decrement_at_one_removes_the_line() {
        let product = Uuid::new_v4();
        let id = product.to_string();
        let mut cart = Cart::new();
        cart.add_to_cart(item(product, dec!(10)));
        assert!(cart.increment(&id));
        assert!(cart.decrement(&id));
        assert_eq!(cart.items()[0].quantity, 1);
        assert!(cart.decrement(&id));
        assert!(cart.is_empty());
        assert!(!cart.decrement(&id));
    }

    #[test]
    fn line_discounts_come_off_the_list_subtotal() {
        let mut cart = Cart::new();
        cart.add_quantity(item(Uuid::new_v4(), dec!(1000)).with_discount(dec!(100)), 2);
        cart.add_to_cart(item(Uuid::new_v4(), dec!(500)));
        assert_eq!(cart.subtotal(), dec!(2500));
        assert_eq!(cart.discount_amount(), dec!(200));
        assert_eq!(cart.total(), dec!(2300));
    }

    #[test]
    fn reprice_updates_price_and_discount() {
        let product = Uuid::new_v4();
        let mut cart = Cart::new();
        cart.add_quantity(item(product, dec!(1000)), 3);
        assert!(cart.reprice(&product.to_string(), dec!(1200), dec!(120)));
        assert!(!cart.reprice("missing", dec!(1), dec!(0)));
        assert_eq!(cart.subtotal(), dec!(3600));
        assert_eq!(cart.total(), dec!(3240));
    }

    #[test]
    fn sessions_saved_without_discounts_still_load() {
        let id = Uuid::new_v4();
        let json = serde_json::json!({
            "id": id.to_string(),
            "product_id": id,
            "variant_id": null,
            "name": "Arena",
            "price": "10",
            "quantity": 2,
            "image": null,
        });
        let line: CartItem = serde_json::from_value(json).unwrap();
        assert_eq!(line.unit_discount, Decimal::ZERO);
        assert_eq!(line.line_total(), dec!(20));
    }

    #[derive(Debug, Clone)]
    enum Op {
        Add(usize),
        AddQty(usize, i32),
        Inc(usize),
        Dec(usize),
        Remove(usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0..4usize).prop_map(Op::Add),
            (0..4usize, 1..5i32).prop_map(|(p, q)| Op::AddQty(p, q)),
            (0..4usize).prop_map(Op::Inc),
            (0..4usize).prop_map(Op::Dec),
            (0..4usize).prop_map(Op::Remove),
        ]
    }

    proptest! {
        #[test]
        fn subtotal_is_sum_of_lines(ops in proptest::collection::vec(op(), 0..40)) {
            let products: Vec<(Uuid, Decimal)> = (0..4)
                .map(|i| (Uuid::new_v4(), Decimal::new(1250 * (i + 1), 2)))
                .collect();
            let mut cart = Cart::new();

            for op in ops {
                match op {
                    Op::Add(p) => cart.add_to_cart(item(products[p].0, products[p].1)),
                    Op::AddQty(p, q) => cart.add_quantity(item(products[p].0, products[p].1), q),
                    Op::Inc(p) => { cart.increment(&products[p].0.to_string()); }
                    Op::Dec(p) => { cart.decrement(&products[p].0.to_string()); }
                    Op::Remove(p) => { cart.remove(&products[p].0.to_string()); }
                }
            }

            let expected: Decimal = cart
                .items()
                .iter()
                .map(|i| i.price * Decimal::from(i.quantity))
                .sum();
            prop_assert_eq!(cart.subtotal(), expected);
            prop_assert!(cart.items().iter().all(|i| i.quantity >= 1));
        }
    }
}
