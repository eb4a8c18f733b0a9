use crate::domain::ledger::LedgerEntry;
use crate::domain::member::{Member, MemberId};
use crate::domain::payment::{PaymentId, PaymentRequest};
use crate::domain::ports::{
    ChangeSet, LedgerStore, MemberStore, PaymentStore, Sequence, TaskStore, UnitOfWork,
};
use crate::domain::referral::{ChildIndex, ReferralRelation};
use crate::domain::task::{Task, TaskCompletion, TaskId};
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct State {
    members: BTreeMap<MemberId, Member>,
    codes: HashMap<String, MemberId>,
    children: HashMap<ReferralRelation, ChildIndex>,
    tasks: BTreeMap<TaskId, Task>,
    completions: BTreeMap<(MemberId, TaskId), TaskCompletion>,
    payments: BTreeMap<PaymentId, PaymentRequest>,
    entries: HashMap<MemberId, Vec<LedgerEntry>>,
    member_seq: u64,
    payment_seq: u64,
}

impl State {
    /// Checks every guard of `changes` without touching anything.
    fn validate(&self, changes: &ChangeSet) -> Result<()> {
        let mut pairs = HashSet::new();
        for completion in &changes.completions {
            let key = (completion.member, completion.task);
            if self.completions.contains_key(&key) || !pairs.insert(key) {
                return Err(LedgerError::AlreadyCompleted {
                    member: completion.member,
                    task: completion.task,
                });
            }
        }

        for write in &changes.payments {
            let id = write.request.id;
            match (write.expected, self.payments.get(&id)) {
                (None, None) => {}
                (None, Some(_)) => {
                    return Err(LedgerError::internal(format!("payment {id} already exists")));
                }
                (Some(expected), Some(stored)) if stored.status == expected => {}
                (Some(_), Some(_)) => return Err(LedgerError::AlreadyResolved(id)),
                (Some(_), None) => {
                    return Err(LedgerError::not_found(format!("payment request {id}")));
                }
            }
        }

        for task in &changes.impressions {
            let staged = changes.tasks.iter().any(|t| t.id == *task);
            if !staged && !self.tasks.contains_key(task) {
                return Err(LedgerError::not_found(format!("task {task}")));
            }
        }

        let mut codes = HashMap::new();
        for member in &changes.members {
            let taken_by_other = self
                .codes
                .get(&member.code)
                .is_some_and(|owner| *owner != member.id);
            let repeated = codes
                .insert(member.code.clone(), member.id)
                .is_some_and(|owner| owner != member.id);
            if taken_by_other || repeated {
                return Err(LedgerError::DuplicateCode(member.code.clone()));
            }
        }
        Ok(())
    }

    fn put_member(&mut self, member: Member) {
        let previous = self.members.get(&member.id);
        for relation in ReferralRelation::ALL {
            let old_parent = previous.and_then(|m| m.parent(relation));
            let new_parent = member.parent(relation);
            if old_parent == new_parent {
                continue;
            }
            let index = self.children.entry(relation).or_default();
            if let Some(parent) = old_parent {
                index.unlink(parent, member.id);
            }
            if let Some(parent) = new_parent {
                index.link(parent, member.id);
            }
        }
        if let Some(old_code) = previous.map(|m| m.code.clone())
            && old_code != member.code
        {
            self.codes.remove(&old_code);
        }
        self.codes.insert(member.code.clone(), member.id);
        self.members.insert(member.id, member);
    }

    fn apply(&mut self, changes: ChangeSet) {
        for member in changes.members {
            self.put_member(member);
        }
        for task in changes.tasks {
            self.tasks.insert(task.id, task);
        }
        for id in changes.impressions {
            if let Some(task) = self.tasks.get_mut(&id) {
                task.impressions += 1;
            }
        }
        for completion in changes.completions {
            self.completions
                .insert((completion.member, completion.task), completion);
        }
        for write in changes.payments {
            self.payments.insert(write.request.id, write.request);
        }
        for entry in changes.entries {
            self.entries.entry(entry.member).or_default().push(entry);
        }
    }
}

/// A thread-safe in-memory repository.
///
/// All state sits behind one `tokio::sync::RwLock`; `commit` validates and
/// applies a change set under a single write guard, so readers never observe
/// half of it. Ideal for tests and for replaying command files without
/// persistence.
#[derive(Default, Clone)]
pub struct InMemoryRepository {
    state: Arc<RwLock<State>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MemberStore for InMemoryRepository {
    async fn member(&self, id: MemberId) -> Result<Option<Member>> {
        let state = self.state.read().await;
        Ok(state.members.get(&id).cloned())
    }

    async fn member_by_code(&self, code: &str) -> Result<Option<Member>> {
        let state = self.state.read().await;
        Ok(state
            .codes
            .get(code)
            .and_then(|id| state.members.get(id))
            .cloned())
    }

    async fn members(&self) -> Result<Vec<Member>> {
        let state = self.state.read().await;
        Ok(state.members.values().cloned().collect())
    }

    async fn children(
        &self,
        relation: ReferralRelation,
        parent: MemberId,
    ) -> Result<Vec<MemberId>> {
        let state = self.state.read().await;
        Ok(state
            .children
            .get(&relation)
            .map(|index| index.children(parent).to_vec())
            .unwrap_or_default())
    }
}

#[async_trait]
impl TaskStore for InMemoryRepository {
    async fn task(&self, id: TaskId) -> Result<Option<Task>> {
        let state = self.state.read().await;
        Ok(state.tasks.get(&id).cloned())
    }

    async fn tasks(&self) -> Result<Vec<Task>> {
        let state = self.state.read().await;
        Ok(state.tasks.values().cloned().collect())
    }

    async fn completed_tasks(&self, member: MemberId) -> Result<Vec<TaskCompletion>> {
        let state = self.state.read().await;
        Ok(state
            .completions
            .range((member, TaskId(0))..=(member, TaskId(u64::MAX)))
            .map(|(_, completion)| *completion)
            .collect())
    }
}

#[async_trait]
impl PaymentStore for InMemoryRepository {
    async fn payment(&self, id: PaymentId) -> Result<Option<PaymentRequest>> {
        let state = self.state.read().await;
        Ok(state.payments.get(&id).cloned())
    }

    async fn payments_sent(&self, sender: MemberId) -> Result<Vec<PaymentRequest>> {
        let state = self.state.read().await;
        Ok(state
            .payments
            .values()
            .filter(|p| p.sender == sender)
            .cloned()
            .collect())
    }

    async fn payments_received(&self, receiver: MemberId) -> Result<Vec<PaymentRequest>> {
        let state = self.state.read().await;
        Ok(state
            .payments
            .values()
            .filter(|p| p.receiver == receiver)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl LedgerStore for InMemoryRepository {
    async fn entries(&self, member: MemberId) -> Result<Vec<LedgerEntry>> {
        let state = self.state.read().await;
        Ok(state.entries.get(&member).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl UnitOfWork for InMemoryRepository {
    async fn next_id(&self, sequence: Sequence) -> Result<u64> {
        let mut state = self.state.write().await;
        let next = match sequence {
            Sequence::Member => {
                let floor = state.members.keys().next_back().map_or(0, |id| id.0);
                state.member_seq = state.member_seq.max(floor) + 1;
                state.member_seq
            }
            Sequence::Payment => {
                let floor = state.payments.keys().next_back().map_or(0, |id| id.0);
                state.payment_seq = state.payment_seq.max(floor) + 1;
                state.payment_seq
            }
        };
        Ok(next)
    }

    async fn commit(&self, changes: ChangeSet) -> Result<()> {
        let mut state = self.state.write().await;
        state.validate(&changes)?;
        state.apply(changes);
        Ok(())
    }
}
