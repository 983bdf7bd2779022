use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::display::format::euro;

/// Lines shown before the rest collapses into an "and N more" entry
const VISIBLE_LINES: usize = 7;
const MAX_LINES_WITHOUT_MARKER: usize = 8;

/// Money is kept in cents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub product: i64,
    pub name: String,
    pub amount: u32,
    pub price_per_unit: i64,
    pub price_total: i64,
    pub image_url: String,
}

#[derive(Debug, Serialize)]
struct CheckoutItem {
    product: i64,
    amount: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CartEntryView {
    Line {
        product: i64,
        name: String,
        image_url: String,
        /// "3x"
        image_amount: String,
        /// "3x € 0,50"
        amount: String,
        total: String,
    },
    More {
        count: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CartView {
    pub entries: Vec<CartEntryView>,
    pub total: String,
    /// Empty cart: single-tap buying instead of the cart panel
    pub insta_buy: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ShoppingCart {
    lines: BTreeMap<i64, CartLine>,
}

impl ShoppingCart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adding a product that is already in the cart raises its amount;
    /// name, price and image of the first add stay.
    pub fn add(&mut self, product: i64, name: &str, amount: u32, price_per_unit: i64, image_url: &str) {
        let line = self.lines.entry(product).or_insert_with(|| CartLine {
            product,
            name: name.to_string(),
            amount: 0,
            price_per_unit,
            price_total: 0,
            image_url: image_url.to_string(),
        });
        line.amount = line.amount.saturating_add(amount);
        line.price_total = i64::from(line.amount) * line.price_per_unit;
    }

    pub fn remove(&mut self, product: i64) -> Option<CartLine> {
        self.lines.remove(&product)
    }

    pub fn reset(&mut self) {
        self.lines.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn lines(&self) -> impl Iterator<Item = &CartLine> {
        self.lines.values()
    }

    pub fn total(&self) -> i64 {
        self.lines.values().map(|l| l.price_total).sum()
    }

    /// `[{"product":12,"amount":2}]`, the format of the checkout form
    pub fn checkout_payload(&self) -> String {
        let items: Vec<CheckoutItem> = self
            .lines
            .values()
            .map(|l| CheckoutItem {
                product: l.product,
                amount: l.amount,
            })
            .collect();
        serde_json::to_string(&items).unwrap_or_else(|_| "[]".to_string())
    }

    pub fn view(&self) -> CartView {
        let count = self.lines.len();
        let mut entries = Vec::with_capacity(count + 1);

        for (i, line) in self.lines.values().enumerate() {
            if i == VISIBLE_LINES && count > MAX_LINES_WITHOUT_MARKER {
                entries.push(CartEntryView::More {
                    count: count - VISIBLE_LINES,
                });
            }
            entries.push(CartEntryView::Line {
                product: line.product,
                name: line.name.clone(),
                image_url: line.image_url.clone(),
                image_amount: format!("{}x", line.amount),
                amount: format!("{}x {}", line.amount, euro(line.price_per_unit)),
                total: euro(line.price_total),
            });
        }

        CartView {
            entries,
            total: euro(self.total()),
            insta_buy: self.is_empty(),
        }
    }
}
