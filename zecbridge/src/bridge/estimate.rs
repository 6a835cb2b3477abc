//! Display-only arithmetic for the bridge form.

use crate::types::Direction;

/// Shown whenever no meaningful estimate exists.
pub const ZERO_ESTIMATE: &str = "0.00";

/// Fixed network fee shown under the form, in USD.
pub const NETWORK_FEE_USD: f64 = 0.45;
/// Fixed completion time shown under the form.
pub const ESTIMATED_TIME: &str = "~2 Minutes";

/// Decimal places of the estimate for each direction.
pub fn estimate_precision(direction: Direction) -> usize {
    match direction {
        Direction::Deposit => 4,
        Direction::Withdraw => 6,
    }
}

/// Parse the amount field. Blank, non-numeric, negative and non-finite
/// input yields `None`.
pub fn parse_amount(amount: &str) -> Option<f64> {
    let trimmed = amount.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
}

/// Amount received on the other side after the modeled fee.
///
/// Deposit converts token -> ZEC (`amount * token / zec`), withdraw converts
/// ZEC -> token (`amount * zec / token`); both are multiplied by
/// `fee_factor`. Returns [`ZERO_ESTIMATE`] when the amount is unusable or
/// either price is still unknown (0).
pub fn receive_estimate(
    amount: &str,
    token_price: f64,
    zec_price: f64,
    direction: Direction,
    fee_factor: f64,
) -> String {
    let Some(value) = parse_amount(amount) else {
        return ZERO_ESTIMATE.into();
    };
    if token_price == 0.0 || zec_price == 0.0 {
        return ZERO_ESTIMATE.into();
    }
    let received = match direction {
        Direction::Deposit => value * token_price / zec_price * fee_factor,
        Direction::Withdraw => value * zec_price / token_price * fee_factor,
    };
    format!("{:.*}", estimate_precision(direction), received)
}

/// USD value of the typed amount at `price`; 0 when the amount is unusable.
pub fn usd_value(amount: &str, price: f64) -> f64 {
    parse_amount(amount).map(|v| v * price).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEE: f64 = 0.995;

    #[test]
    fn test_deposit_estimate() {
        // (100 * 2000 / 40) * 0.995
        assert_eq!(receive_estimate("100", 2000.0, 40.0, Direction::Deposit, FEE), "4975.0000");
    }

    #[test]
    fn test_withdraw_estimate_uses_six_decimals() {
        // (10 * 40 / 2000) * 0.995 = 0.199
        assert_eq!(receive_estimate("10", 2000.0, 40.0, Direction::Withdraw, FEE), "0.199000");
    }

    #[test]
    fn test_zero_price_yields_zero_estimate() {
        for amount in ["1", "100", "0.5", "123456"] {
            for direction in [Direction::Deposit, Direction::Withdraw] {
                assert_eq!(receive_estimate(amount, 0.0, 40.0, direction, FEE), ZERO_ESTIMATE);
                assert_eq!(receive_estimate(amount, 2000.0, 0.0, direction, FEE), ZERO_ESTIMATE);
            }
        }
    }

    #[test]
    fn test_unusable_amount_yields_zero_estimate() {
        assert_eq!(receive_estimate("", 2000.0, 40.0, Direction::Deposit, FEE), ZERO_ESTIMATE);
        assert_eq!(receive_estimate("abc", 2000.0, 40.0, Direction::Deposit, FEE), ZERO_ESTIMATE);
        assert_eq!(receive_estimate("-3", 2000.0, 40.0, Direction::Deposit, FEE), ZERO_ESTIMATE);
    }

    #[test]
    fn test_usd_value() {
        assert_eq!(usd_value("2.5", 100.0), 250.0);
        assert_eq!(usd_value("", 100.0), 0.0);
    }
}
