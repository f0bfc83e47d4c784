use serde::Serialize;

pub const PLATFORM_COMMISSION_RATE: f64 = 0.15;
pub const MINIMUM_COMMISSION: f64 = 5.0;
pub const MAXIMUM_COMMISSION: f64 = 100.0;

/// Platform cut of a booking amount: 15%, never below 5 and never above 100.
pub fn commission(amount: f64) -> f64 {
    (amount * PLATFORM_COMMISSION_RATE).clamp(MINIMUM_COMMISSION, MAXIMUM_COMMISSION)
}

pub fn provider_earnings(amount: f64) -> f64 {
    amount - commission(amount)
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CommissionBreakdown {
    pub booking_amount: f64,
    pub commission: f64,
    pub provider_earnings: f64,
    pub commission_rate: f64,
    pub percentage: String,
}

pub fn breakdown(amount: f64) -> CommissionBreakdown {
    let commission = commission(amount);
    CommissionBreakdown {
        booking_amount: amount,
        commission,
        provider_earnings: provider_earnings(amount),
        commission_rate: PLATFORM_COMMISSION_RATE,
        percentage: format!("{:.1}%", PLATFORM_COMMISSION_RATE * 100.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_floor_applies_to_small_amounts() {
        assert!(approx(commission(10.0), 5.0));
        assert!(approx(commission(0.5), 5.0));
    }

    #[test]
    fn test_linear_in_middle_band() {
        assert!(approx(commission(500.0), 75.0));
        assert!(approx(commission(100.0), 15.0));
    }

    #[test]
    fn test_ceiling_applies_to_large_amounts() {
        assert!(approx(commission(1000.0), 100.0));
        assert!(approx(commission(250_000.0), 100.0));
    }

    #[test]
    fn test_monotonic_non_decreasing() {
        let mut previous = commission(0.0);
        let mut amount = 0.0;
        while amount <= 1500.0 {
            let current = commission(amount);
            assert!(current >= previous, "commission dropped at {amount}");
            previous = current;
            amount += 0.5;
        }
    }

    #[test]
    fn test_earnings_are_amount_minus_commission() {
        assert!(approx(provider_earnings(500.0), 425.0));
        assert!(approx(provider_earnings(1000.0), 900.0));
    }

    #[test]
    fn test_breakdown_percentage_label() {
        let b = breakdown(200.0);
        assert_eq!(b.percentage, "15.0%");
        assert!(approx(b.commission, 30.0));
        assert!(approx(b.provider_earnings, 170.0));
    }
}
