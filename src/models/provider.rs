use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provider {
    pub id: String,
    pub user_id: String,
    pub category: String,
    pub description: String,
    pub verified: bool,
    pub available: bool,
    pub rating: Option<f64>,
    pub total_earnings: f64,
    pub platform_fees: f64,
    pub completed_bookings: i64,
    #[serde(skip_serializing)]
    pub bank_details: Option<BankDetails>,
    #[serde(skip_serializing)]
    pub upi_id: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Provider {
    pub fn new(id: String, user_id: String, category: String, description: String, now: NaiveDateTime) -> Self {
        Self {
            id,
            user_id,
            category,
            description,
            verified: false,
            available: true,
            rating: None,
            total_earnings: 0.0,
            platform_fees: 0.0,
            completed_bookings: 0,
            bank_details: None,
            upi_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Balance a provider may withdraw. Fees are subtracted from the running
    /// earnings total even though payouts already credit net earnings.
    pub fn available_balance(&self) -> f64 {
        self.total_earnings - self.platform_fees
    }

    pub fn has_method_configured(&self, method: PaymentMethod) -> bool {
        match method {
            PaymentMethod::Bank => self
                .bank_details
                .as_ref()
                .map(|b| !b.account_number.is_empty())
                .unwrap_or(false),
            PaymentMethod::Upi => self.upi_id.as_deref().map(|u| !u.is_empty()).unwrap_or(false),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BankDetails {
    pub account_number: String,
    pub ifsc_code: String,
    pub account_holder_name: String,
    pub bank_name: String,
}

impl BankDetails {
    /// Replaces every digit that is immediately followed by four more digits.
    pub fn masked_account_number(&self) -> String {
        let chars: Vec<char> = self.account_number.chars().collect();
        chars
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                let followed_by_four = chars
                    .get(i + 1..i + 5)
                    .is_some_and(|next| next.iter().all(char::is_ascii_digit));
                if c.is_ascii_digit() && followed_by_four {
                    '*'
                } else {
                    c
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Bank,
    Upi,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Bank => "bank",
            PaymentMethod::Upi => "upi",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "bank" => Some(PaymentMethod::Bank),
            "upi" => Some(PaymentMethod::Upi),
            _ => None,
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalStatus {
    Pending,
    Completed,
    Failed,
}

impl WithdrawalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalStatus::Pending => "pending",
            WithdrawalStatus::Completed => "completed",
            WithdrawalStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(WithdrawalStatus::Pending),
            "completed" => Some(WithdrawalStatus::Completed),
            "failed" => Some(WithdrawalStatus::Failed),
            _ => None,
        }
    }
}

/// One line of a provider's payout ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalEntry {
    pub amount: f64,
    pub date: NaiveDateTime,
    pub status: WithdrawalStatus,
    pub transaction_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<PaymentMethod>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bank(number: &str) -> BankDetails {
        BankDetails {
            account_number: number.to_string(),
            ifsc_code: "HDFC0001234".to_string(),
            account_holder_name: "Ravi Kumar".to_string(),
            bank_name: String::new(),
        }
    }

    #[test]
    fn test_mask_keeps_last_four_digits() {
        assert_eq!(bank("123456789012").masked_account_number(), "********9012");
    }

    #[test]
    fn test_mask_short_number_untouched() {
        assert_eq!(bank("1234").masked_account_number(), "1234");
    }

    #[test]
    fn test_mask_stops_at_separators() {
        assert_eq!(bank("1234-5678").masked_account_number(), "1234-5678");
        assert_eq!(bank("123456-7890").masked_account_number(), "**3456-7890");
    }

    #[test]
    fn test_available_balance_subtracts_fees() {
        let now = chrono::Utc::now().naive_utc();
        let mut provider = Provider::new(
            "p1".to_string(),
            "u1".to_string(),
            "cleaning".to_string(),
            String::new(),
            now,
        );
        provider.total_earnings = 1200.0;
        provider.platform_fees = 200.0;
        assert_eq!(provider.available_balance(), 1000.0);
    }

    #[test]
    fn test_method_configured() {
        let now = chrono::Utc::now().naive_utc();
        let mut provider = Provider::new(
            "p1".to_string(),
            "u1".to_string(),
            "cleaning".to_string(),
            String::new(),
            now,
        );
        assert!(!provider.has_method_configured(PaymentMethod::Bank));
        assert!(!provider.has_method_configured(PaymentMethod::Upi));

        provider.upi_id = Some("ravi@upi".to_string());
        assert!(provider.has_method_configured(PaymentMethod::Upi));
        assert!(!provider.has_method_configured(PaymentMethod::Bank));
    }
}
