use serde::{Deserialize, Serialize};

use crate::{FeePercentage, Money};

/// The split of a winning bid amount between the platform and the shopper.
///
/// By construction, `platform_fee + shopper_payout` always equals the bid amount the split was derived from, so
/// transaction rows reconcile exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSplit {
    pub platform_fee: Money,
    pub shopper_payout: Money,
}

/// Computes the platform fee and shopper payout for a bid amount.
///
/// The fee is `amount * percentage`, rounded half-up to the nearest cent. The payout is the remainder. Pure and
/// deterministic; the award flow is its only caller in the engine, but it is exported for display code that wants to
/// preview a split before a bid is accepted.
pub fn calculate_fees(amount: Money, percentage: FeePercentage) -> FeeSplit {
    // i128 so that amount * basis_points cannot overflow even for absurd amounts
    let raw = i128::from(amount.value()) * i128::from(percentage.basis_points());
    let fee_cents = (raw + 5_000) / 10_000;
    // the fee is bounded above by the amount, so this cannot truncate
    #[allow(clippy::cast_possible_truncation)]
    let platform_fee = Money::from_cents(fee_cents as i64);
    let shopper_payout = amount - platform_fee;
    FeeSplit { platform_fee, shopper_payout }
}

#[cfg(test)]
mod test {
    use super::*;

    fn split(amount_cents: i64, bp: i64) -> FeeSplit {
        calculate_fees(Money::from_cents(amount_cents), FeePercentage::from_basis_points(bp).unwrap())
    }

    #[test]
    fn five_percent_of_one_hundred() {
        let s = split(10_000, 500);
        assert_eq!(s.platform_fee, Money::from_cents(500));
        assert_eq!(s.shopper_payout, Money::from_cents(9_500));
    }

    #[test]
    fn sub_cent_fees_round_half_up() {
        // 1.25% of $0.99 = 1.2375c -> 1c
        let s = split(99, 125);
        assert_eq!(s.platform_fee, Money::from_cents(1));
        // 2.5% of $0.99 = 2.475c -> 2c
        let s = split(99, 250);
        assert_eq!(s.platform_fee, Money::from_cents(2));
        // 7.5% of $0.10 = 0.75c -> 1c
        let s = split(10, 750);
        assert_eq!(s.platform_fee, Money::from_cents(1));
    }

    #[test]
    fn split_always_reconciles() {
        for amount in [1, 99, 101, 9_999, 123_456, 10_000_000] {
            for bp in [0, 1, 333, 500, 999, 2_500, 10_000] {
                let s = split(amount, bp);
                assert_eq!(
                    s.platform_fee + s.shopper_payout,
                    Money::from_cents(amount),
                    "split of {amount}c at {bp}bp does not reconcile"
                );
            }
        }
    }

    #[test]
    fn zero_and_full_fee_edges() {
        let s = split(10_000, 0);
        assert_eq!(s.platform_fee, Money::from_cents(0));
        assert_eq!(s.shopper_payout, Money::from_cents(10_000));
        let s = split(10_000, 10_000);
        assert_eq!(s.platform_fee, Money::from_cents(10_000));
        assert_eq!(s.shopper_payout, Money::from_cents(0));
    }
}
