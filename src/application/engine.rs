use super::ledger::LedgerEngine;
use super::locks::MemberLocks;
use super::members::{KycSubmission, MemberAdmin, NewMember};
use super::payments::PaymentDesk;
use super::referrals::ReferralWalker;
use super::tasks::{CompletionReceipt, TaskProcessor};
use crate::config::Settings;
use crate::domain::command::{Command, Operation};
use crate::domain::ledger::{LedgerEntry, WalletKind};
use crate::domain::member::{Member, MemberId};
use crate::domain::payment::{PaymentId, PaymentMethod, PaymentRequest};
use crate::domain::ports::{ClockRef, NotifierRef, RepositoryRef, SystemClock};
use crate::domain::referral::{ReferralLevels, ReferralRelation};
use crate::domain::task::{TaskId, TaskSummary, TaskView};
use crate::error::{LedgerError, Result};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;

/// What a replayed command produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Entry(LedgerEntry),
    Completion(Box<CompletionReceipt>),
    Payment(Box<PaymentRequest>),
    Member(Box<Member>),
    Referrals(ReferralLevels),
}

/// The entry point the surrounding shell calls into.
///
/// `Dashboard` owns the storage, clock and notifier ports and hands them to the
/// individual services. All services share one set of member locks so that,
/// for example, a payout request and a task credit on the same member never
/// interleave.
#[derive(Clone)]
pub struct Dashboard {
    repo: RepositoryRef,
    ledger: LedgerEngine,
    tasks: TaskProcessor,
    payments: PaymentDesk,
    referrals: ReferralWalker,
    members: MemberAdmin,
}

impl Dashboard {
    /// Creates a dashboard using the system clock.
    pub fn new(repo: RepositoryRef, notifier: NotifierRef, settings: Settings) -> Self {
        Self::with_clock(repo, notifier, Arc::new(SystemClock), settings)
    }

    pub fn with_clock(
        repo: RepositoryRef,
        notifier: NotifierRef,
        clock: ClockRef,
        settings: Settings,
    ) -> Self {
        let locks = MemberLocks::new();
        let settings = Arc::new(settings);
        Self {
            ledger: LedgerEngine::new(repo.clone(), clock.clone(), locks.clone()),
            tasks: TaskProcessor::new(repo.clone(), clock.clone(), locks.clone()),
            payments: PaymentDesk::new(
                repo.clone(),
                clock.clone(),
                notifier.clone(),
                locks.clone(),
                settings.clone(),
            ),
            referrals: ReferralWalker::new(repo.clone(), settings.referrals),
            members: MemberAdmin::new(repo.clone(), clock, notifier, locks, settings),
            repo,
        }
    }

    pub fn ledger(&self) -> &LedgerEngine {
        &self.ledger
    }

    pub fn payments(&self) -> &PaymentDesk {
        &self.payments
    }

    pub fn tasks(&self) -> &TaskProcessor {
        &self.tasks
    }

    pub fn members(&self) -> &MemberAdmin {
        &self.members
    }

    pub async fn complete_task(&self, member: MemberId, task: TaskId) -> Result<CompletionReceipt> {
        self.tasks.complete_task(member, task).await
    }

    pub async fn create_payment_request(
        &self,
        sender: MemberId,
        method: PaymentMethod,
        amount: Decimal,
    ) -> Result<PaymentRequest> {
        self.payments.create_request(sender, method, amount).await
    }

    pub async fn resolve_payment_request(
        &self,
        request: PaymentId,
        actor: MemberId,
        action: &str,
    ) -> Result<PaymentRequest> {
        self.payments.resolve(request, actor, action).await
    }

    pub async fn enumerate_referrals(
        &self,
        member: MemberId,
        relation: ReferralRelation,
        depth: Option<usize>,
    ) -> Result<ReferralLevels> {
        self.referrals.enumerate(member, relation, depth).await
    }

    pub async fn add_member(&self, actor: MemberId, new: NewMember) -> Result<Member> {
        self.members.add_member(actor, new).await
    }

    pub async fn submit_kyc(&self, member: MemberId, submission: KycSubmission) -> Result<Member> {
        self.members.submit_kyc(member, submission).await
    }

    pub async fn task_board(&self, member: MemberId) -> Result<Vec<TaskView>> {
        self.tasks.task_board(member).await
    }

    pub async fn task_summary(&self, member: MemberId) -> Result<TaskSummary> {
        self.tasks.summary(member).await
    }

    /// Applies one replayed command.
    pub async fn execute(&self, cmd: Command) -> Result<Outcome> {
        let actor = MemberId(cmd.member);
        match cmd.op {
            Operation::Credit => {
                let wallet: WalletKind = parse(cmd.target.as_deref(), "wallet")?;
                let entry = self
                    .ledger
                    .credit(actor, wallet, amount(&cmd)?, "Manual credit", None)
                    .await?;
                Ok(Outcome::Entry(entry))
            }
            Operation::Debit => {
                let entry = self
                    .ledger
                    .debit(actor, amount(&cmd)?, "Manual debit", None)
                    .await?;
                Ok(Outcome::Entry(entry))
            }
            Operation::CompleteTask => {
                let task = TaskId(parse(cmd.target.as_deref(), "task id")?);
                let receipt = self.complete_task(actor, task).await?;
                Ok(Outcome::Completion(Box::new(receipt)))
            }
            Operation::RequestPayout => {
                let method: PaymentMethod = parse(cmd.detail.as_deref(), "payment method")?;
                let request = self
                    .create_payment_request(actor, method, amount(&cmd)?)
                    .await?;
                Ok(Outcome::Payment(Box::new(request)))
            }
            Operation::Pay => {
                let receiver = MemberId(parse(cmd.target.as_deref(), "receiver id")?);
                let method: PaymentMethod = parse(cmd.detail.as_deref(), "payment method")?;
                let request = self
                    .payments
                    .create_request_to(actor, receiver, method, amount(&cmd)?)
                    .await?;
                Ok(Outcome::Payment(Box::new(request)))
            }
            Operation::MarkSent => {
                let payment = PaymentId(parse(cmd.target.as_deref(), "payment id")?);
                let txn_id = cmd.detail.as_deref().unwrap_or_default();
                let request = self.payments.record_sent(payment, actor, txn_id).await?;
                Ok(Outcome::Payment(Box::new(request)))
            }
            Operation::Resolve => {
                let payment = PaymentId(parse(cmd.target.as_deref(), "payment id")?);
                let action = cmd.detail.as_deref().unwrap_or_default();
                let request = self.resolve_payment_request(payment, actor, action).await?;
                Ok(Outcome::Payment(Box::new(request)))
            }
            Operation::ApproveKyc => {
                let member = MemberId(parse(cmd.target.as_deref(), "member id")?);
                let member = self.members.approve_kyc(actor, member).await?;
                Ok(Outcome::Member(Box::new(member)))
            }
            Operation::Upgrade => {
                let method: PaymentMethod = parse(cmd.detail.as_deref(), "payment method")?;
                let proof = cmd.target.as_deref().unwrap_or_default();
                let member = self.members.apply_for_upgrade(actor, method, proof).await?;
                Ok(Outcome::Member(Box::new(member)))
            }
            Operation::Referrals => {
                let relation = match cmd.detail.as_deref() {
                    Some(raw) => raw.parse()?,
                    None => ReferralRelation::Manual,
                };
                let depth = match cmd.target.as_deref() {
                    Some(raw) => Some(parse(Some(raw), "depth")?),
                    None => None,
                };
                let levels = self.enumerate_referrals(actor, relation, depth).await?;
                Ok(Outcome::Referrals(levels))
            }
        }
    }

    /// Final state of every member, ordered by id.
    pub async fn into_results(self) -> Result<Vec<Member>> {
        self.repo.members().await
    }
}

fn amount(cmd: &Command) -> Result<Decimal> {
    cmd.amount
        .ok_or_else(|| LedgerError::InvalidAmount(format!("{:?} requires an amount", cmd.op)))
}

fn parse<T>(raw: Option<&str>, what: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| LedgerError::InvalidAction(format!("missing {what}")))?;
    raw.parse()
        .map_err(|e| LedgerError::InvalidAction(format!("invalid {what} '{raw}': {e}")))
}
