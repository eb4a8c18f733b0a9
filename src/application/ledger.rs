use super::load_member;
use super::locks::MemberLocks;
use crate::domain::ledger::{LedgerEntry, Wallet, WalletKind};
use crate::domain::member::MemberId;
use crate::domain::money::Amount;
use crate::domain::ports::{ChangeSet, ClockRef, RepositoryRef};
use crate::error::Result;
use rust_decimal::Decimal;
use tracing::debug;

/// Standalone credits and debits against a member's wallet.
///
/// Task completion and payment requests stage their ledger movements through
/// `Wallet` inside their own change sets instead of calling this service, so the
/// movement commits together with the rest of the operation.
#[derive(Clone)]
pub struct LedgerEngine {
    repo: RepositoryRef,
    clock: ClockRef,
    locks: MemberLocks,
}

impl LedgerEngine {
    pub fn new(repo: RepositoryRef, clock: ClockRef, locks: MemberLocks) -> Self {
        Self { repo, clock, locks }
    }

    /// Credits `wallet` (and the cashout balance) by `amount`.
    pub async fn credit(
        &self,
        member: MemberId,
        wallet: WalletKind,
        amount: Decimal,
        description: &str,
        reference: Option<String>,
    ) -> Result<LedgerEntry> {
        let amount = Amount::new(amount)?;
        let _guard = self.locks.lock(member).await;
        let mut account = load_member(&self.repo, member).await?;

        let entry = account.wallet.credit(
            member,
            wallet,
            amount,
            description,
            reference,
            self.clock.now(),
        );

        let mut changes = ChangeSet::new();
        changes.put_member(account).append(entry.clone());
        self.repo.commit(changes).await?;

        debug!(member = %member, wallet = %wallet, amount = %amount, reference = %entry.reference, "credited");
        Ok(entry)
    }

    /// Debits the cashout balance, failing with `InsufficientFunds` if it does
    /// not cover `amount`.
    pub async fn debit(
        &self,
        member: MemberId,
        amount: Decimal,
        description: &str,
        reference: Option<String>,
    ) -> Result<LedgerEntry> {
        let amount = Amount::new(amount)?;
        let _guard = self.locks.lock(member).await;
        let mut account = load_member(&self.repo, member).await?;

        let entry = account
            .wallet
            .debit(member, amount, description, reference, self.clock.now())?;

        let mut changes = ChangeSet::new();
        changes.put_member(account).append(entry.clone());
        self.repo.commit(changes).await?;

        debug!(member = %member, amount = %amount, reference = %entry.reference, "debited");
        Ok(entry)
    }

    pub async fn wallet(&self, member: MemberId) -> Result<Wallet> {
        Ok(load_member(&self.repo, member).await?.wallet)
    }

    /// Ledger entries newest first, optionally capped at `limit`.
    pub async fn history(&self, member: MemberId, limit: Option<usize>) -> Result<Vec<LedgerEntry>> {
        load_member(&self.repo, member).await?;
        let mut entries = self.repo.entries(member).await?;
        entries.reverse();
        if let Some(limit) = limit {
            entries.truncate(limit);
        }
        Ok(entries)
    }

    /// True when replaying the audit trail reproduces the stored wallet.
    pub async fn audit(&self, member: MemberId) -> Result<bool> {
        let _guard = self.locks.lock(member).await;
        let account = load_member(&self.repo, member).await?;
        let entries = self.repo.entries(member).await?;
        Ok(Wallet::replay(&entries) == account.wallet)
    }
}
