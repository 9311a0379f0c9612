//! Monetary arithmetic in integer minor units.
//!
//! Every amount in the crate is a [`Money`] value (minor units of the
//! configured currency). Multipliers are basis points (10000 = 1.0x) so
//! pricing never touches binary floats.

/// Amount in minor units (e.g. cents).
pub type Money = i64;

/// Basis points per whole unit (10000 = 1.0x).
pub const BPS_SCALE: i64 = 10_000;

/// Multiplies an amount by a basis-point factor, rounding half-up.
///
/// Returns `None` when the result does not fit a `Money`. Inputs are
/// expected to be non-negative.
pub fn mul_bps(amount: Money, bps: i32) -> Option<Money> {
    let scaled = (amount as i128) * (bps as i128) + BPS_SCALE as i128 / 2;
    Money::try_from(scaled / BPS_SCALE as i128).ok()
}

/// Takes `pct` percent of an amount, rounding down to the minor unit.
///
/// Used for refunds: flooring keeps the sum of per-participant refunds
/// within the refund pool for any split.
pub fn pct_floor(amount: Money, pct: i32) -> Money {
    ((amount as i128) * (pct as i128) / 100) as Money
}

/// Per-invitee share of an evenly split total, rounded down.
///
/// The initiator's share is `total - share * invitees`, so the shares of
/// one initiator plus `invitees` invitees always sum to `total` exactly
/// and the initiator absorbs the rounding remainder.
pub fn split_share(total: Money, invitees: u32) -> Money {
    total / (i64::from(invitees) + 1)
}

/// The initiator's share after `invitees` invitees take [`split_share`].
pub fn initiator_share(total: Money, invitees: u32) -> Money {
    total - split_share(total, invitees) * i64::from(invitees)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bps_identity_and_surge() {
        assert_eq!(mul_bps(5_000, 10_000), Some(5_000));
        // 2h at 2500/h with a 1.5x evening rule.
        assert_eq!(mul_bps(2_500 * 2, 15_000), Some(7_500));
    }

    #[test]
    fn test_bps_rounds_half_up() {
        // 5 * 1.25% = 0.0625 minor units -> 0; 50 * 1.25% = 0.625 -> 1.
        assert_eq!(mul_bps(5, 125), Some(0));
        assert_eq!(mul_bps(50, 125), Some(1));
        // Exact .5 rounds up.
        assert_eq!(mul_bps(1, 5_000), Some(1));
    }

    #[test]
    fn test_bps_overflow_is_none() {
        assert_eq!(mul_bps(Money::MAX, 20_000), None);
    }

    #[test]
    fn test_even_split_with_remainder_to_initiator() {
        // 6000 across initiator + 2 invitees.
        assert_eq!(split_share(6_000, 2), 2_000);
        assert_eq!(initiator_share(6_000, 2), 2_000);
        // 100 across initiator + 2 invitees: 33 + 33 + 34.
        assert_eq!(split_share(100, 2), 33);
        assert_eq!(initiator_share(100, 2), 34);
        // Degenerate total smaller than the party size.
        assert_eq!(split_share(2, 3), 0);
        assert_eq!(initiator_share(2, 3), 2);
    }

    #[test]
    fn test_percentage_floors() {
        assert_eq!(pct_floor(4_000, 50), 2_000);
        assert_eq!(pct_floor(4_000, 100), 4_000);
        assert_eq!(pct_floor(4_000, 0), 0);
        assert_eq!(pct_floor(999, 33), 329);
    }
}
