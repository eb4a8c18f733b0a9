use super::ledger::LedgerEntry;
use super::member::{Member, MemberId};
use super::money::Amount;
use super::payment::{PaymentId, PaymentRequest, PaymentStatus};
use super::referral::ReferralRelation;
use super::task::{Task, TaskCompletion, TaskId};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

#[async_trait]
pub trait MemberStore: Send + Sync {
    async fn member(&self, id: MemberId) -> Result<Option<Member>>;
    async fn member_by_code(&self, code: &str) -> Result<Option<Member>>;
    /// All members ordered by id.
    async fn members(&self) -> Result<Vec<Member>>;
    /// Direct children of `parent` under `relation`, ordered by id.
    async fn children(&self, relation: ReferralRelation, parent: MemberId)
    -> Result<Vec<MemberId>>;
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn task(&self, id: TaskId) -> Result<Option<Task>>;
    /// All tasks ordered by id.
    async fn tasks(&self) -> Result<Vec<Task>>;
    async fn completed_tasks(&self, member: MemberId) -> Result<Vec<TaskCompletion>>;
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn payment(&self, id: PaymentId) -> Result<Option<PaymentRequest>>;
    async fn payments_sent(&self, sender: MemberId) -> Result<Vec<PaymentRequest>>;
    async fn payments_received(&self, receiver: MemberId) -> Result<Vec<PaymentRequest>>;
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// A member's audit trail in the order it was written.
    async fn entries(&self, member: MemberId) -> Result<Vec<LedgerEntry>>;
}

/// Id sequences handed out by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sequence {
    Member,
    Payment,
}

impl Sequence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sequence::Member => "member",
            Sequence::Payment => "payment",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentWrite {
    pub request: PaymentRequest,
    /// `None` inserts a new request; `Some(status)` updates only if the stored
    /// status still equals it.
    pub expected: Option<PaymentStatus>,
}

/// Everything one operation wants to write.
///
/// `UnitOfWork::commit` applies a change set entirely or not at all.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    pub members: Vec<Member>,
    pub tasks: Vec<Task>,
    /// Tasks whose impression counter goes up by one, applied against the
    /// stored row at commit time.
    pub impressions: Vec<TaskId>,
    pub completions: Vec<TaskCompletion>,
    pub payments: Vec<PaymentWrite>,
    pub entries: Vec<LedgerEntry>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upserts a member. The store rejects a short code already held by a
    /// different member.
    pub fn put_member(&mut self, member: Member) -> &mut Self {
        self.members.retain(|m| m.id != member.id);
        self.members.push(member);
        self
    }

    pub fn put_task(&mut self, task: Task) -> &mut Self {
        self.tasks.retain(|t| t.id != task.id);
        self.tasks.push(task);
        self
    }

    /// Counts one impression of `task`. The store increments the value it
    /// holds, so concurrent change sets never overwrite each other's bumps.
    pub fn bump_impressions(&mut self, task: TaskId) -> &mut Self {
        self.impressions.push(task);
        self
    }

    /// Inserts a completion; the store fails with `AlreadyCompleted` if the pair exists.
    pub fn insert_completion(&mut self, completion: TaskCompletion) -> &mut Self {
        self.completions.push(completion);
        self
    }

    pub fn insert_payment(&mut self, request: PaymentRequest) -> &mut Self {
        self.payments.push(PaymentWrite {
            request,
            expected: None,
        });
        self
    }

    /// Updates a request guarded on its stored status; the store fails with
    /// `AlreadyResolved` if it moved on.
    pub fn update_payment(&mut self, request: PaymentRequest, expected: PaymentStatus) -> &mut Self {
        self.payments.push(PaymentWrite {
            request,
            expected: Some(expected),
        });
        self
    }

    pub fn append(&mut self, entry: LedgerEntry) -> &mut Self {
        self.entries.push(entry);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
            && self.tasks.is_empty()
            && self.impressions.is_empty()
            && self.completions.is_empty()
            && self.payments.is_empty()
            && self.entries.is_empty()
    }
}

#[async_trait]
pub trait UnitOfWork: Send + Sync {
    async fn next_id(&self, sequence: Sequence) -> Result<u64>;
    async fn commit(&self, changes: ChangeSet) -> Result<()>;
}

/// The full persistence port.
pub trait Repository: MemberStore + TaskStore + PaymentStore + LedgerStore + UnitOfWork {}

impl<T> Repository for T where T: MemberStore + TaskStore + PaymentStore + LedgerStore + UnitOfWork {}

pub type RepositoryRef = Arc<dyn Repository>;

/// Events delivered to members outside the core.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Notification {
    PaymentSent { payment: PaymentId, amount: Amount },
    PaymentVerified { payment: PaymentId, amount: Amount },
    PaymentDeclined { payment: PaymentId, amount: Amount },
    MemberAdded { member: MemberId, code: String },
}

impl Notification {
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::PaymentSent { .. } => "payment_sent",
            Notification::PaymentVerified { .. } => "payment_verified",
            Notification::PaymentDeclined { .. } => "payment_declined",
            Notification::MemberAdded { .. } => "member_added",
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, member: MemberId, event: Notification) -> Result<()>;
}

pub type NotifierRef = Arc<dyn Notifier>;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub type ClockRef = Arc<dyn Clock>;

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
