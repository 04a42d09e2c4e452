//! Identifier generation.
//!
//! Invoice numbers keep the user-visible `{prefix}-{YYYYMM}-{NNN}` shape;
//! bulk flows call [`unique_invoice_number`] so a batch can never commit
//! duplicate natural keys. Item ids carry a process-wide sequence number
//! so every id handed out in one run is distinct.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{Datelike, Local, Utc};
use rand::Rng;

static ITEM_SEQ: AtomicU64 = AtomicU64::new(0);

/// A candidate invoice number: `{prefix}-{YYYYMM}-{NNN}` with a 3-digit
/// pseudo-random suffix. Collisions are possible; callers that care pass
/// the taken set to [`unique_invoice_number`] instead.
pub fn invoice_number(prefix: &str) -> String {
    let now = Local::now();
    let suffix: u32 = rand::thread_rng().gen_range(0..1000);
    format!("{}-{}{:02}-{:03}", prefix, now.year(), now.month(), suffix)
}

/// An invoice number guaranteed absent from `taken`. Re-rolls the random
/// suffix, then falls back to widening with a sequence number once the
/// 3-digit space for the month is exhausted.
pub fn unique_invoice_number(prefix: &str, taken: &HashSet<String>) -> String {
    for _ in 0..1000 {
        let candidate = invoice_number(prefix);
        if !taken.contains(&candidate) {
            return candidate;
        }
    }
    loop {
        let seq = ITEM_SEQ.fetch_add(1, Ordering::Relaxed);
        let candidate = format!("{}-{}", invoice_number(prefix), seq);
        if !taken.contains(&candidate) {
            return candidate;
        }
    }
}

/// Ad hoc id for line items and import rows: `{kind}-{millis}-{seq}`.
pub fn item_id(kind: &str) -> String {
    let seq = ITEM_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("{}-{}-{}", kind, Utc::now().timestamp_millis(), seq)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Local};

    #[test]
    fn invoice_number_has_prefix_period_and_suffix() {
        let number = invoice_number("TEST");
        let parts: Vec<&str> = number.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "TEST");
        let now = Local::now();
        assert_eq!(parts[1], format!("{}{:02}", now.year(), now.month()));
        assert_eq!(parts[2].len(), 3);
        assert!(parts[2].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn unique_invoice_number_avoids_taken_set() {
        let mut taken = HashSet::new();
        for _ in 0..200 {
            let number = unique_invoice_number("TEST", &taken);
            assert!(!taken.contains(&number));
            taken.insert(number);
        }
    }

    #[test]
    fn item_ids_are_distinct_within_a_run() {
        let a = item_id("item");
        let b = item_id("item");
        assert_ne!(a, b);
        assert!(a.starts_with("item-"));
    }
}
