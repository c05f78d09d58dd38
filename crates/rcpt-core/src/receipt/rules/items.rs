//! Item line cleanup.

use crate::models::receipt::Item;

use super::amounts::split_trailing_price;
use super::patterns::PatternTables;

/// Turns an item-candidate line into an [`Item`], or rejects it.
pub struct ItemCleaner<'a> {
    tables: &'a PatternTables,
    keep_prices: bool,
}

impl<'a> ItemCleaner<'a> {
    pub fn new(tables: &'a PatternTables, keep_prices: bool) -> Self {
        Self {
            tables,
            keep_prices,
        }
    }

    /// Clean a candidate line.
    ///
    /// Strips a `<n> x ` quantity prefix and a trailing price, then leading and
    /// trailing punctuation. Internal hyphens and ampersands survive, as does a
    /// trailing percent sign ("Milk 2%").
    pub fn clean(&self, line: &str) -> Option<Item> {
        let without_quantity = match self.tables.quantity_prefix.find(line) {
            Some(m) => &line[m.end()..],
            None => line,
        };

        let (without_price, price) =
            split_trailing_price(&self.tables.trailing_price, without_quantity);

        let name = strip_edges(without_price);

        if name.chars().count() <= 1 || is_numeric(name) || self.tables.is_noise(name) {
            return None;
        }

        Some(Item::new(name, if self.keep_prices { price } else { None }))
    }
}

fn strip_edges(s: &str) -> &str {
    s.trim_start_matches(|c: char| !c.is_alphanumeric())
        .trim_end_matches(|c: char| !c.is_alphanumeric() && c != '%')
}

fn is_numeric(s: &str) -> bool {
    s.chars()
        .all(|c| c.is_ascii_digit() || c.is_whitespace() || matches!(c, '.' | ',' | '/' | '-' | ':'))
}
