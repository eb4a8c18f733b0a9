use super::member::MemberId;
use super::money::{Amount, Balance};
use crate::error::LedgerError;
use chrono::{DateTime, Utc};
use rand::Rng;
use rand::distributions::Alphanumeric;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// The named earning balances a credit can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletKind {
    /// Self earnings.
    #[serde(rename = "self")]
    SelfEarnings,
    /// Task rewards.
    Task,
    /// Referral commissions.
    Referral,
    /// Payments received from other members.
    Income,
}

impl WalletKind {
    pub const ALL: [WalletKind; 4] = [
        WalletKind::SelfEarnings,
        WalletKind::Task,
        WalletKind::Referral,
        WalletKind::Income,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WalletKind::SelfEarnings => "self",
            WalletKind::Task => "task",
            WalletKind::Referral => "referral",
            WalletKind::Income => "income",
        }
    }
}

impl fmt::Display for WalletKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WalletKind {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "self" => Ok(WalletKind::SelfEarnings),
            "task" => Ok(WalletKind::Task),
            "referral" => Ok(WalletKind::Referral),
            "income" => Ok(WalletKind::Income),
            other => Err(LedgerError::not_found(format!("wallet '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Credit,
    Debit,
    Adjustment,
}

/// One immutable line of a member's audit trail.
///
/// `amount` is the signed movement of `wallet` (if any) and `cashout_delta` the
/// signed movement of the cashout balance. Credits move both, debits only the
/// cashout balance, adjustments only the named wallet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub member: MemberId,
    pub kind: EntryKind,
    pub wallet: Option<WalletKind>,
    pub amount: Decimal,
    pub cashout_delta: Decimal,
    pub description: String,
    pub reference: String,
    pub created_at: DateTime<Utc>,
}

/// Generates a 16 character uppercase transaction reference.
pub fn new_reference() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(16)
        .map(|c| char::from(c).to_ascii_uppercase())
        .collect()
}

/// A member's balances, kept as running totals of its ledger entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    pub self_earnings: Balance,
    pub task: Balance,
    pub referral: Balance,
    pub income: Balance,
    /// Aggregate balance eligible for withdrawal requests.
    pub cashout: Balance,
}

impl Wallet {
    pub fn balance(&self, kind: WalletKind) -> Balance {
        match kind {
            WalletKind::SelfEarnings => self.self_earnings,
            WalletKind::Task => self.task,
            WalletKind::Referral => self.referral,
            WalletKind::Income => self.income,
        }
    }

    fn balance_mut(&mut self, kind: WalletKind) -> &mut Balance {
        match kind {
            WalletKind::SelfEarnings => &mut self.self_earnings,
            WalletKind::Task => &mut self.task,
            WalletKind::Referral => &mut self.referral,
            WalletKind::Income => &mut self.income,
        }
    }

    /// Credits `wallet` and the cashout balance, returning the entry to persist.
    pub fn credit(
        &mut self,
        member: MemberId,
        wallet: WalletKind,
        amount: Amount,
        description: impl Into<String>,
        reference: Option<String>,
        now: DateTime<Utc>,
    ) -> LedgerEntry {
        let entry = LedgerEntry {
            id: Uuid::new_v4(),
            member,
            kind: EntryKind::Credit,
            wallet: Some(wallet),
            amount: amount.value(),
            cashout_delta: amount.value(),
            description: description.into(),
            reference: reference.unwrap_or_else(new_reference),
            created_at: now,
        };
        self.apply(&entry);
        entry
    }

    /// Debits the cashout balance if it covers `amount`.
    pub fn debit(
        &mut self,
        member: MemberId,
        amount: Amount,
        description: impl Into<String>,
        reference: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<LedgerEntry, LedgerError> {
        if self.cashout < Balance::from(amount) {
            return Err(LedgerError::InsufficientFunds {
                requested: amount.value(),
                available: self.cashout.value(),
            });
        }
        let entry = LedgerEntry {
            id: Uuid::new_v4(),
            member,
            kind: EntryKind::Debit,
            wallet: None,
            amount: Decimal::ZERO,
            cashout_delta: -amount.value(),
            description: description.into(),
            reference: reference.unwrap_or_else(new_reference),
            created_at: now,
        };
        self.apply(&entry);
        Ok(entry)
    }

    /// Forces `wallet` to `target`, recording the difference. Returns `None` when
    /// the balance already matches.
    pub fn adjust_to(
        &mut self,
        member: MemberId,
        wallet: WalletKind,
        target: Balance,
        description: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Option<LedgerEntry> {
        let delta = target.value() - self.balance(wallet).value();
        if delta.is_zero() {
            return None;
        }
        let entry = LedgerEntry {
            id: Uuid::new_v4(),
            member,
            kind: EntryKind::Adjustment,
            wallet: Some(wallet),
            amount: delta,
            cashout_delta: Decimal::ZERO,
            description: description.into(),
            reference: new_reference(),
            created_at: now,
        };
        self.apply(&entry);
        Some(entry)
    }

    fn apply(&mut self, entry: &LedgerEntry) {
        if let Some(kind) = entry.wallet {
            *self.balance_mut(kind) += Balance::new(entry.amount);
        }
        self.cashout += Balance::new(entry.cashout_delta);
    }

    /// Rebuilds a wallet from its audit trail.
    pub fn replay<'a>(entries: impl IntoIterator<Item = &'a LedgerEntry>) -> Self {
        let mut wallet = Wallet::default();
        for entry in entries {
            wallet.apply(entry);
        }
        wallet
    }
}
