use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use uuid::Uuid;

pub mod momo;
pub mod vnpay;

/// Gateway transaction reference: the order id plus a uniqueness suffix,
/// so replays of the same order still produce distinct references.
pub fn build_txn_ref(order_id: i64) -> String {
    format!("{}_{}", order_id, Uuid::new_v4())
}

/// Recover the order id from a gateway reference. Everything after the
/// first underscore is an opaque uniqueness token.
pub fn parse_txn_ref(txn_ref: &str) -> Option<i64> {
    txn_ref.split('_').next()?.parse::<i64>().ok()
}

/// Amounts cross the wire in minor currency units.
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    (amount * Decimal::from(100)).to_i64()
}

pub fn from_minor_units(minor: i64) -> Decimal {
    Decimal::new(minor, 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn txn_ref_round_trips_order_id() {
        let txn_ref = build_txn_ref(42);
        assert_eq!(parse_txn_ref(&txn_ref), Some(42));
    }

    #[test]
    fn txn_refs_are_unique_per_attempt() {
        assert_ne!(build_txn_ref(7), build_txn_ref(7));
    }

    #[test]
    fn parse_rejects_non_numeric_prefix() {
        assert_eq!(parse_txn_ref("abc_123"), None);
        assert_eq!(parse_txn_ref(""), None);
        assert_eq!(parse_txn_ref("15"), Some(15));
    }

    #[test]
    fn minor_units_round_trip() {
        let total = Decimal::new(13000000, 2); // 130000.00
        let minor = to_minor_units(total).unwrap();
        assert_eq!(minor, 13_000_000);
        assert_eq!(from_minor_units(minor), total);
    }
}
