//! Straight-up settlement against the winning number.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

use crate::types::WagerStatus;

/// Net odds for a straight-up hit (35 to 1).
pub const STRAIGHT_UP_PAYOUT: Decimal = dec!(35);

/// Largest single stake accepted for settlement. Payouts on stakes up to
/// this bound, summed over any realistic session, stay within `Decimal`.
pub const MAX_STAKE: Decimal = dec!(1000000000);

/// Net profit of a single-number wager: `35 × amount` on a hit, `-amount`
/// otherwise.
pub fn payout(bet_number: u8, amount: Decimal, winning_number: u8) -> Decimal {
    if bet_number == winning_number {
        amount.saturating_mul(STRAIGHT_UP_PAYOUT)
    } else {
        -amount
    }
}

/// Final state of a wager once the winning number is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Settlement {
    pub status: WagerStatus,
    pub profit: Decimal,
}

/// Settle a wager covering `numbers` with a stake of `amount`.
///
/// Won when the winning number is one of `numbers`.
pub fn settle(numbers: &[u8], amount: Decimal, winning_number: u8) -> Settlement {
    if numbers.contains(&winning_number) {
        Settlement {
            status: WagerStatus::Won,
            profit: amount.saturating_mul(STRAIGHT_UP_PAYOUT),
        }
    } else {
        Settlement {
            status: WagerStatus::Lost,
            profit: -amount,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payout_hit_and_miss() {
        assert_eq!(payout(17, dec!(10), 17), dec!(350));
        assert_eq!(payout(17, dec!(10), 5), dec!(-10));
    }

    #[test]
    fn test_payout_zero() {
        assert_eq!(payout(0, dec!(2.0), 0), dec!(70.0));
    }

    #[test]
    fn test_settle_membership() {
        let won = settle(&[3, 17, 30], dec!(1.5), 30);
        assert_eq!(won.status, WagerStatus::Won);
        assert_eq!(won.profit, dec!(52.5));

        let lost = settle(&[3, 17, 30], dec!(1.5), 0);
        assert_eq!(lost.status, WagerStatus::Lost);
        assert_eq!(lost.profit, dec!(-1.5));
    }

    #[test]
    fn test_settle_at_max_stake() {
        let won = settle(&[7], MAX_STAKE, 7);
        assert_eq!(won.profit, dec!(35000000000));
        assert_eq!(payout(7, MAX_STAKE, 8), -MAX_STAKE);
    }

    #[test]
    fn test_huge_amount_saturates() {
        let won = settle(&[3], Decimal::MAX, 3);
        assert_eq!(won.status, WagerStatus::Won);
        assert_eq!(won.profit, Decimal::MAX);
    }
}
