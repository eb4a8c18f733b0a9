use super::ledger::Wallet;
use super::payment::PaymentMethod;
use super::referral::ReferralRelation;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(pub u64);

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Prefix of every human facing member code.
pub const CODE_PREFIX: &str = "GL";

/// Generates a candidate short code such as `GL483920`. Uniqueness is the
/// caller's job.
pub fn generate_code() -> String {
    let n: u32 = rand::thread_rng().gen_range(100_000..=999_999);
    format!("{CODE_PREFIX}{n}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Member,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KycStatus {
    #[default]
    NotSubmitted,
    Pending,
    Approved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    #[default]
    Inactive,
    Active,
}

/// Payout contact details a member keeps on file.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PaymentContact {
    pub bank_account_number: Option<String>,
    pub bank_holder_name: Option<String>,
    pub bank_name: Option<String>,
    pub bank_ifsc: Option<String>,
    pub paytm_number: Option<String>,
    pub upi_id: Option<String>,
    pub phone_number: Option<String>,
}

impl PaymentContact {
    /// The contact field that backs `method`, if it is filled in.
    pub fn field_for(&self, method: PaymentMethod) -> Option<&str> {
        let field = match method {
            PaymentMethod::Bank => &self.bank_account_number,
            PaymentMethod::Paytm => &self.paytm_number,
            PaymentMethod::Upi => &self.upi_id,
            PaymentMethod::GooglePay | PaymentMethod::PhonePe => &self.phone_number,
        };
        field.as_deref().map(str::trim).filter(|v| !v.is_empty())
    }

    pub fn supports(&self, method: PaymentMethod) -> bool {
        self.field_for(method).is_some()
    }
}

/// A pending account upgrade: the member paid outside the system and uploaded proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeApplication {
    pub method: PaymentMethod,
    /// Opaque reference to the uploaded screenshot.
    pub proof: String,
    pub applied_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub code: String,
    pub uuid: Uuid,
    pub full_name: String,
    pub email: Option<String>,
    #[serde(default)]
    pub role: Role,
    /// Parent in the manually chosen referral tree.
    pub referrer: Option<MemberId>,
    /// Parent in the system assigned auto-fill tree.
    pub auto_referrer: Option<MemberId>,
    #[serde(default)]
    pub wallet: Wallet,
    #[serde(default)]
    pub kyc_status: KycStatus,
    pub kyc_requested_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub profile_completed: bool,
    #[serde(default)]
    pub payment_confirmed: bool,
    #[serde(default)]
    pub status: AccountStatus,
    pub activated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub total_referrals: u32,
    #[serde(default)]
    pub total_task_pending: u32,
    #[serde(default)]
    pub contact: PaymentContact,
    pub preferred_method: Option<PaymentMethod>,
    pub upgrade: Option<UpgradeApplication>,
}

impl Member {
    pub fn new(id: MemberId, code: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self {
            id,
            code: code.into(),
            uuid: Uuid::new_v4(),
            full_name: full_name.into(),
            email: None,
            role: Role::Member,
            referrer: None,
            auto_referrer: None,
            wallet: Wallet::default(),
            kyc_status: KycStatus::NotSubmitted,
            kyc_requested_at: None,
            profile_completed: false,
            payment_confirmed: false,
            status: AccountStatus::Inactive,
            activated_at: None,
            total_referrals: 0,
            total_task_pending: 0,
            contact: PaymentContact::default(),
            preferred_method: None,
            upgrade: None,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Parent pointer for `relation`.
    pub fn parent(&self, relation: ReferralRelation) -> Option<MemberId> {
        match relation {
            ReferralRelation::Manual => self.referrer,
            ReferralRelation::AutoFill => self.auto_referrer,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }

    /// Activates the account if both the profile and the joining payment are done.
    ///
    /// Returns `true` only on the transition; the activation timestamp is never
    /// rewritten.
    pub fn try_activate(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_active() || !(self.profile_completed && self.payment_confirmed) {
            return false;
        }
        self.status = AccountStatus::Active;
        self.activated_at = Some(now);
        true
    }

    /// Updates the pending task counter, floored at zero.
    pub fn set_pending_tasks(&mut self, total_tasks: u64, completed: u64) {
        let pending = total_tasks.saturating_sub(completed);
        self.total_task_pending = u32::try_from(pending).unwrap_or(u32::MAX);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_code_shape() {
        for _ in 0..100 {
            let code = generate_code();
            assert!(code.starts_with(CODE_PREFIX));
            assert_eq!(code.len(), 8);
            assert!(code[2..].chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_activation_requires_both_flags() {
        let now = Utc::now();
        let mut member = Member::new(MemberId(1), "GL100001", "Asha");
        member.profile_completed = true;
        assert!(!member.try_activate(now));
        assert_eq!(member.status, AccountStatus::Inactive);

        member.payment_confirmed = true;
        assert!(member.try_activate(now));
        assert_eq!(member.status, AccountStatus::Active);
        assert_eq!(member.activated_at, Some(now));
    }

    #[test]
    fn test_activation_timestamp_set_once() {
        let first = Utc::now();
        let mut member = Member::new(MemberId(1), "GL100001", "Asha");
        member.profile_completed = true;
        member.payment_confirmed = true;
        assert!(member.try_activate(first));

        let later = first + chrono::Duration::hours(1);
        assert!(!member.try_activate(later));
        assert_eq!(member.activated_at, Some(first));
    }

    #[test]
    fn test_pending_tasks_floor_at_zero() {
        let mut member = Member::new(MemberId(1), "GL100001", "Asha");
        member.set_pending_tasks(5, 2);
        assert_eq!(member.total_task_pending, 3);
        member.set_pending_tasks(3, 4);
        assert_eq!(member.total_task_pending, 0);
    }

    #[test]
    fn test_contact_field_lookup_ignores_blank() {
        let contact = PaymentContact {
            bank_account_number: Some("0012345678".into()),
            upi_id: Some("   ".into()),
            phone_number: Some("9800000000".into()),
            ..Default::default()
        };
        assert_eq!(contact.field_for(PaymentMethod::Bank), Some("0012345678"));
        assert!(!contact.supports(PaymentMethod::Upi));
        assert!(!contact.supports(PaymentMethod::Paytm));
        assert!(contact.supports(PaymentMethod::PhonePe));
    }
}
