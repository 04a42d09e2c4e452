//! Invoice arithmetic. Pure functions, no error conditions: absent
//! optionals are normalized to zero by the caller before reaching here.

use crate::model::InvoiceItem;

pub fn item_total(quantity: u32, price_per_unit: f64) -> f64 {
    quantity as f64 * price_per_unit
}

pub fn subtotal(items: &[InvoiceItem]) -> f64 {
    items.iter().map(|item| item.total).sum()
}

pub fn total_amount(subtotal: f64, tax_rate: f64) -> f64 {
    subtotal + subtotal * tax_rate / 100.0
}

pub fn revenue(total_amount: f64, production_cost: f64) -> f64 {
    total_amount - production_cost
}

/// Profitability multiple, rounded to 2 decimals. A zero production cost
/// yields 0 rather than a division error.
pub fn revenue_ratio(total_amount: f64, production_cost: f64) -> f64 {
    if production_cost == 0.0 {
        return 0.0;
    }
    (total_amount / production_cost * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::InvoiceItem;

    fn item(quantity: u32, price: f64) -> InvoiceItem {
        let mut item = InvoiceItem::blank("item-test".to_string());
        item.set_quantity(quantity);
        item.set_price_per_unit(price);
        item
    }

    #[test]
    fn item_total_is_quantity_times_price() {
        assert_eq!(item_total(3, 9.99), 29.97);
        assert_eq!(item_total(1, 0.0), 0.0);
        assert_eq!(item_total(0, 100.0), 0.0);
    }

    #[test]
    fn subtotal_sums_line_totals() {
        let items = vec![item(2, 10.0), item(3, 5.5)];
        assert_eq!(subtotal(&items), 36.5);
    }

    #[test]
    fn total_amount_applies_percentage_tax() {
        assert_eq!(total_amount(100.0, 0.0), 100.0);
        assert_eq!(total_amount(100.0, 20.0), 120.0);
        assert!((total_amount(29.97, 8.875) - 32.629_837_5).abs() < 1e-9);
    }

    #[test]
    fn revenue_subtracts_production_cost() {
        assert_eq!(revenue(120.0, 45.0), 75.0);
        assert_eq!(revenue(120.0, 0.0), 120.0);
    }

    #[test]
    fn revenue_ratio_guards_zero_cost() {
        assert_eq!(revenue_ratio(500.0, 0.0), 0.0);
        assert_eq!(revenue_ratio(0.0, 0.0), 0.0);
    }

    #[test]
    fn revenue_ratio_rounds_to_two_decimals() {
        assert_eq!(revenue_ratio(200.0, 100.0), 2.0);
        assert_eq!(revenue_ratio(100.0, 30.0), 3.33);
        assert_eq!(revenue_ratio(100.0, 3.0), 33.33);
    }
}
