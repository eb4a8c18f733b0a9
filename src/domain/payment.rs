use super::member::{MemberId, PaymentContact};
use super::money::Amount;
use crate::error::LedgerError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentId(pub u64);

impl fmt::Display for PaymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Bank,
    Paytm,
    Upi,
    GooglePay,
    PhonePe,
}

impl PaymentMethod {
    /// Methods a member may choose for a withdrawal.
    pub fn is_payout_method(&self) -> bool {
        matches!(
            self,
            PaymentMethod::Bank | PaymentMethod::Paytm | PaymentMethod::Upi
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Bank => "BANK",
            PaymentMethod::Paytm => "PAYTM",
            PaymentMethod::Upi => "UPI",
            PaymentMethod::GooglePay => "GOOGLE_PAY",
            PaymentMethod::PhonePe => "PHONE_PE",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "BANK" => Ok(PaymentMethod::Bank),
            "PAYTM" => Ok(PaymentMethod::Paytm),
            "UPI" => Ok(PaymentMethod::Upi),
            "GOOGLE_PAY" => Ok(PaymentMethod::GooglePay),
            "PHONE_PE" => Ok(PaymentMethod::PhonePe),
            _ => Err(LedgerError::not_found(format!("payment method '{}'", s.trim()))),
        }
    }
}

/// Lifecycle of a payment request. Stored as 0 / 1 / -1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "i8", try_from = "i8")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Verified,
    Rejected,
}

impl PaymentStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }
}

impl From<PaymentStatus> for i8 {
    fn from(status: PaymentStatus) -> Self {
        match status {
            PaymentStatus::Pending => 0,
            PaymentStatus::Verified => 1,
            PaymentStatus::Rejected => -1,
        }
    }
}

impl TryFrom<i8> for PaymentStatus {
    type Error = String;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PaymentStatus::Pending),
            1 => Ok(PaymentStatus::Verified),
            -1 => Ok(PaymentStatus::Rejected),
            other => Err(format!("invalid payment status {other}")),
        }
    }
}

/// What the receiver does with a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveAction {
    Accept,
    Reject,
}

impl FromStr for ResolveAction {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "accept" => Ok(ResolveAction::Accept),
            "reject" | "deny" => Ok(ResolveAction::Reject),
            _ => Err(LedgerError::InvalidAction(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub id: PaymentId,
    pub uuid: Uuid,
    pub sender: MemberId,
    /// The member who must confirm receipt.
    pub receiver: MemberId,
    pub method: PaymentMethod,
    /// Sender's contact data as it was when the request was made.
    pub contact: PaymentContact,
    pub amount: Amount,
    pub status: PaymentStatus,
    pub txn_id: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl PaymentRequest {
    pub fn is_pending(&self) -> bool {
        self.status == PaymentStatus::Pending
    }

    pub fn verify(&mut self, now: DateTime<Utc>) {
        self.status = PaymentStatus::Verified;
        self.verified_at = Some(now);
    }

    pub fn reject(&mut self) {
        self.status = PaymentStatus::Rejected;
        self.txn_id = None;
        self.paid_at = None;
    }
}
