use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};

/// Monetary values are kept at 2 decimal places
pub const MONEY_SCALE: u32 = 2;

/// 获取当前 UTC 时间
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Round a monetary value to 2 dp (half away from zero)
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_money() {
        assert_eq!(round_money(Decimal::new(22505, 3)), Decimal::new(2251, 2));
        assert_eq!(round_money(Decimal::new(22504, 3)), Decimal::new(2250, 2));
        assert_eq!(round_money(Decimal::new(-1005, 3)), Decimal::new(-101, 2));
    }
}
