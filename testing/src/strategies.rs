//! proptest strategies for pantry inputs.
//!
//! Most quantities are multiples of a quarter unit so sums and differences
//! stay exact in `f64` and assertions can compare with `==`. The tenth-unit
//! strategies produce amounts like `0.1` that are not exact in binary.

use proptest::prelude::*;

/// A non-negative stock quantity in `[0, 50]`.
pub fn stock_quantity() -> impl Strategy<Value = f64> {
    (0u32..=200).prop_map(|quarters| f64::from(quarters) / 4.0)
}

/// A strictly positive amount to consume, in `(0, 20]`.
pub fn use_amount() -> impl Strategy<Value = f64> {
    (1u32..=80).prop_map(|quarters| f64::from(quarters) / 4.0)
}

/// A stock quantity in tenths, as `(tenths, quantity)`, in `[0, 5]`.
pub fn tenth_stock_quantity() -> impl Strategy<Value = (u32, f64)> {
    (0u32..=50).prop_map(|tenths| (tenths, f64::from(tenths) / 10.0))
}

/// An amount to consume in tenths, as `(tenths, amount)`, in `(0, 2]`.
pub fn tenth_use_amount() -> impl Strategy<Value = (u32, f64)> {
    (1u32..=20).prop_map(|tenths| (tenths, f64::from(tenths) / 10.0))
}

/// A short display name.
pub fn item_name() -> impl Strategy<Value = String> {
    "[A-Z][a-z]{1,10}"
}

/// `name` with random casing and surrounding whitespace.
pub fn name_variant(name: String) -> impl Strategy<Value = String> {
    (
        proptest::collection::vec(any::<bool>(), name.chars().count()),
        0usize..3,
        0usize..3,
    )
        .prop_map(move |(upper, lead, trail)| {
            let body: String = name
                .chars()
                .zip(upper)
                .map(|(c, up)| {
                    if up {
                        c.to_ascii_uppercase()
                    } else {
                        c.to_ascii_lowercase()
                    }
                })
                .collect();
            format!("{}{body}{}", " ".repeat(lead), " ".repeat(trail))
        })
}

/// One step of a stock sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StockStep {
    /// Consume this amount
    Use(f64),
    /// Re-add with this absolute quantity
    Restock(f64),
}

/// A stock step, weighted towards consumption.
pub fn stock_step() -> impl Strategy<Value = StockStep> {
    prop_oneof![
        4 => use_amount().prop_map(StockStep::Use),
        1 => stock_quantity().prop_map(StockStep::Restock),
    ]
}
