//! Cart store: an ordered collection of products and quantities.
//!
//! The [`CartStore`] trait is the seam the cart page works against. [`Cart`]
//! is the in-memory implementation kept in each visitor's session.
//!
//! # Invariants
//!
//! - At most one line per product id.
//! - Lines keep insertion order, which is display order.
//! - Every stored quantity is at least one. Setting a quantity of zero or
//!   less removes the line instead of persisting it.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::ProductId;

/// A purchasable product as shown in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Catalog identifier.
    pub id: ProductId,
    /// Display name, also sent to the payment processor.
    pub name: String,
    /// Unit price in the store currency's standard unit. Never negative.
    pub price: Decimal,
}

/// One line of the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product: Product,
    pub quantity: u32,
}

impl CartItem {
    /// Unit price multiplied by quantity.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.product.price * Decimal::from(self.quantity)
    }
}

/// State container for cart lines.
///
/// Mutations are clamped at the boundary: implementations never keep a line
/// with a zero or negative quantity.
pub trait CartStore {
    /// Lines in display order.
    fn items(&self) -> &[CartItem];

    /// Set the quantity of a line. A quantity `<= 0` removes the line;
    /// unknown product ids are ignored.
    fn update_quantity(&mut self, product_id: &ProductId, quantity: i64);

    /// Remove a line by product id. Unknown ids are ignored.
    fn remove_item(&mut self, product_id: &ProductId);

    /// Add `quantity` units of a product, merging with an existing line.
    fn add_item(&mut self, product: Product, quantity: u32);

    /// Sum of `price × quantity` over all lines.
    fn subtotal(&self) -> Decimal {
        self.items().iter().map(CartItem::line_total).sum()
    }

    /// Current quantity of a product, if it is in the cart.
    fn quantity_of(&self, product_id: &ProductId) -> Option<u32> {
        self.items()
            .iter()
            .find(|item| &item.product.id == product_id)
            .map(|item| item.quantity)
    }

    /// Total number of units across all lines.
    fn item_count(&self) -> u32 {
        self.items()
            .iter()
            .fold(0u32, |acc, item| acc.saturating_add(item.quantity))
    }

    /// Whether the cart has no lines.
    fn is_empty(&self) -> bool {
        self.items().is_empty()
    }
}

/// In-memory cart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    /// Create an empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    fn position(&self, product_id: &ProductId) -> Option<usize> {
        self.items
            .iter()
            .position(|item| &item.product.id == product_id)
    }
}

impl CartStore for Cart {
    fn items(&self) -> &[CartItem] {
        &self.items
    }

    fn update_quantity(&mut self, product_id: &ProductId, quantity: i64) {
        let Some(index) = self.position(product_id) else {
            return;
        };

        if quantity <= 0 {
            self.items.remove(index);
            return;
        }

        if let Some(item) = self.items.get_mut(index) {
            item.quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
        }
    }

    fn remove_item(&mut self, product_id: &ProductId) {
        self.items.retain(|item| &item.product.id != product_id);
    }

    fn add_item(&mut self, product: Product, quantity: u32) {
        if quantity == 0 {
            return;
        }

        match self.position(&product.id).and_then(|i| self.items.get_mut(i)) {
            Some(item) => {
                item.quantity = item.quantity.saturating_add(quantity);
                item.product = product;
            }
            None => self.items.push(CartItem { product, quantity }),
        }
    }
}

impl FromIterator<CartItem> for Cart {
    fn from_iter<I: IntoIterator<Item = CartItem>>(iter: I) -> Self {
        let mut cart = Self::new();
        for item in iter {
            cart.add_item(item.product, item.quantity);
        }
        cart
    }
}
