//! JSON fixture that populates a fresh repository before commands are replayed.

use crate::domain::ledger::WalletKind;
use crate::domain::member::{KycStatus, Member, MemberId, PaymentContact, Role};
use crate::domain::money::Amount;
use crate::domain::payment::PaymentMethod;
use crate::domain::ports::{ChangeSet, Repository};
use crate::domain::task::{Task, TaskId};
use crate::error::{LedgerError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Seed {
    pub members: Vec<SeedMember>,
    pub tasks: Vec<SeedTask>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SeedMember {
    pub id: u64,
    /// Defaults to `GL` followed by the zero padded id.
    pub code: Option<String>,
    pub full_name: String,
    pub email: Option<String>,
    pub role: Role,
    pub referrer: Option<u64>,
    pub auto_referrer: Option<u64>,
    pub kyc_status: KycStatus,
    pub profile_completed: bool,
    pub payment_confirmed: bool,
    pub contact: PaymentContact,
    pub preferred_method: Option<PaymentMethod>,
    /// Opening balances, booked as ledger credits. Zero entries are skipped.
    pub balances: HashMap<WalletKind, Decimal>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedTask {
    pub id: u64,
    pub title: String,
    pub reward: Decimal,
}

impl Seed {
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| LedgerError::Config(format!("invalid seed: {e}")))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    /// Writes every seeded member and task in a single change set.
    ///
    /// Referral counters and pending task counters are derived from the seed
    /// itself, so they are only correct for an empty repository.
    pub async fn apply(self, repo: &dyn Repository, now: DateTime<Utc>) -> Result<usize> {
        let mut referrals: HashMap<u64, u32> = HashMap::new();
        for member in &self.members {
            if let Some(parent) = member.referrer {
                *referrals.entry(parent).or_default() += 1;
            }
        }

        let mut changes = ChangeSet::new();
        for task in &self.tasks {
            changes.put_task(Task::new(TaskId(task.id), task.title.clone(), Amount::new(task.reward)?));
        }

        let seeded = self.members.len();
        for seed in self.members {
            let id = MemberId(seed.id);
            let code = seed.code.unwrap_or_else(|| format!("GL{:06}", seed.id));
            let mut member = Member::new(id, code.to_ascii_uppercase(), seed.full_name);
            member.email = seed.email;
            member.role = seed.role;
            member.referrer = seed.referrer.map(MemberId);
            member.auto_referrer = seed.auto_referrer.map(MemberId);
            member.kyc_status = seed.kyc_status;
            member.profile_completed = seed.profile_completed;
            member.payment_confirmed = seed.payment_confirmed;
            member.contact = seed.contact;
            member.preferred_method = seed.preferred_method;
            member.total_referrals = referrals.get(&seed.id).copied().unwrap_or_default();
            member.set_pending_tasks(self.tasks.len() as u64, 0);
            member.try_activate(now);

            for kind in WalletKind::ALL {
                if let Some(value) = seed.balances.get(&kind)
                    && !value.is_zero()
                {
                    let entry = member.wallet.credit(
                        id,
                        kind,
                        Amount::new(*value)?,
                        "Opening balance",
                        None,
                        now,
                    );
                    changes.append(entry);
                }
            }
            changes.put_member(member);
        }

        repo.commit(changes).await?;
        Ok(seeded)
    }
}
