use crate::domain::ledger::LedgerEntry;
use crate::domain::member::{Member, MemberId};
use crate::domain::payment::{PaymentId, PaymentRequest};
use crate::domain::ports::{
    ChangeSet, LedgerStore, MemberStore, PaymentStore, Sequence, TaskStore, UnitOfWork,
};
use crate::domain::referral::ReferralRelation;
use crate::domain::task::{Task, TaskCompletion, TaskId};
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, Direction, IteratorMode, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Members keyed by big-endian id.
pub const CF_MEMBERS: &str = "members";
/// Member code to big-endian id.
pub const CF_CODES: &str = "codes";
/// Empty values keyed by relation tag, parent id and child id.
pub const CF_REFERRALS: &str = "referrals";
pub const CF_TASKS: &str = "tasks";
/// Completions keyed by member id then task id.
pub const CF_COMPLETIONS: &str = "completions";
pub const CF_PAYMENTS: &str = "payments";
/// Ledger entries keyed by member id then a global write counter.
pub const CF_ENTRIES: &str = "entries";
pub const CF_SEQUENCES: &str = "sequences";

const COLUMN_FAMILIES: [&str; 8] = [
    CF_MEMBERS,
    CF_CODES,
    CF_REFERRALS,
    CF_TASKS,
    CF_COMPLETIONS,
    CF_PAYMENTS,
    CF_ENTRIES,
    CF_SEQUENCES,
];

const ENTRY_SEQUENCE: &str = "entry";

/// A persistent repository on RocksDB.
///
/// Each entity lives in its own column family with serde_json values. A change
/// set is validated and then written as one `WriteBatch` while holding the
/// write lock, so it lands completely or not at all.
///
/// `Clone` shares the underlying `Arc<DB>`.
#[derive(Clone)]
pub struct RocksDbRepository {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDbRepository {
    /// Opens or creates a database at `path`, creating missing column families.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect::<Vec<_>>();
        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| LedgerError::internal(format!("{name} column family not found")))
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| LedgerError::internal("write lock poisoned"))
    }

    fn get<T: DeserializeOwned>(&self, cf: &str, key: &[u8]) -> Result<Option<T>> {
        match self.db.get_cf(self.cf(cf)?, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Values whose key starts with `prefix`, in key order.
    fn scan<T: DeserializeOwned>(&self, cf: &str, prefix: &[u8]) -> Result<Vec<T>> {
        self.scan_keys(cf, prefix, |_, value| Ok(serde_json::from_slice(value)?))
    }

    fn scan_keys<T>(
        &self,
        cf: &str,
        prefix: &[u8],
        mut map: impl FnMut(&[u8], &[u8]) -> Result<T>,
    ) -> Result<Vec<T>> {
        let iter = self
            .db
            .iterator_cf(self.cf(cf)?, IteratorMode::From(prefix, Direction::Forward));
        let mut out = Vec::new();
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            out.push(map(&key, &value)?);
        }
        Ok(out)
    }

    fn last_key_id(&self, cf: &str) -> Result<u64> {
        match self.db.iterator_cf(self.cf(cf)?, IteratorMode::End).next() {
            Some(item) => read_u64(&item?.0),
            None => Ok(0),
        }
    }

    fn sequence_value(&self, name: &str) -> Result<u64> {
        match self.db.get_cf(self.cf(CF_SEQUENCES)?, name.as_bytes())? {
            Some(bytes) => read_u64(&bytes),
            None => Ok(0),
        }
    }

    fn validate(&self, changes: &ChangeSet) -> Result<()> {
        let mut pairs = HashSet::new();
        for completion in &changes.completions {
            let key = pair_key(completion.member.0, completion.task.0);
            let stored = self.db.get_pinned_cf(self.cf(CF_COMPLETIONS)?, key)?;
            if stored.is_some() || !pairs.insert(key) {
                return Err(LedgerError::AlreadyCompleted {
                    member: completion.member,
                    task: completion.task,
                });
            }
        }

        for write in &changes.payments {
            let id = write.request.id;
            let stored: Option<PaymentRequest> = self.get(CF_PAYMENTS, &id.0.to_be_bytes())?;
            match (write.expected, stored) {
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

        let mut codes = HashSet::new();
        for member in &changes.members {
            let owner = self
                .db
                .get_cf(self.cf(CF_CODES)?, member.code.as_bytes())?
                .map(|bytes| read_u64(&bytes))
                .transpose()?;
            let taken_by_other = owner.is_some_and(|owner| owner != member.id.0);
            if taken_by_other || !codes.insert(member.code.as_str()) {
                return Err(LedgerError::DuplicateCode(member.code.clone()));
            }
        }
        Ok(())
    }

    fn stage_member(&self, batch: &mut WriteBatch, member: &Member) -> Result<()> {
        let previous: Option<Member> = self.get(CF_MEMBERS, &member.id.0.to_be_bytes())?;
        let referrals = self.cf(CF_REFERRALS)?;
        for relation in ReferralRelation::ALL {
            let old_parent = previous.as_ref().and_then(|m| m.parent(relation));
            let new_parent = member.parent(relation);
            if old_parent == new_parent {
                continue;
            }
            if let Some(parent) = old_parent {
                batch.delete_cf(referrals, referral_key(relation, parent, member.id));
            }
            if let Some(parent) = new_parent {
                batch.put_cf(referrals, referral_key(relation, parent, member.id), b"");
            }
        }

        let codes = self.cf(CF_CODES)?;
        if let Some(previous) = &previous
            && previous.code != member.code
        {
            batch.delete_cf(codes, previous.code.as_bytes());
        }
        batch.put_cf(codes, member.code.as_bytes(), member.id.0.to_be_bytes());
        batch.put_cf(
            self.cf(CF_MEMBERS)?,
            member.id.0.to_be_bytes(),
            encode(member)?,
        );
        Ok(())
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

fn read_u64(bytes: &[u8]) -> Result<u64> {
    let head: [u8; 8] = bytes
        .get(..8)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| LedgerError::internal("malformed key"))?;
    Ok(u64::from_be_bytes(head))
}

fn pair_key(first: u64, second: u64) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&first.to_be_bytes());
    key[8..].copy_from_slice(&second.to_be_bytes());
    key
}

fn relation_tag(relation: ReferralRelation) -> u8 {
    match relation {
        ReferralRelation::Manual => 0,
        ReferralRelation::AutoFill => 1,
    }
}

fn referral_prefix(relation: ReferralRelation, parent: MemberId) -> [u8; 9] {
    let mut key = [0u8; 9];
    key[0] = relation_tag(relation);
    key[1..].copy_from_slice(&parent.0.to_be_bytes());
    key
}

fn referral_key(relation: ReferralRelation, parent: MemberId, child: MemberId) -> [u8; 17] {
    let mut key = [0u8; 17];
    key[..9].copy_from_slice(&referral_prefix(relation, parent));
    key[9..].copy_from_slice(&child.0.to_be_bytes());
    key
}

#[async_trait]
impl MemberStore for RocksDbRepository {
    async fn member(&self, id: MemberId) -> Result<Option<Member>> {
        self.get(CF_MEMBERS, &id.0.to_be_bytes())
    }

    async fn member_by_code(&self, code: &str) -> Result<Option<Member>> {
        match self.db.get_cf(self.cf(CF_CODES)?, code.as_bytes())? {
            Some(id) => self.get(CF_MEMBERS, &id),
            None => Ok(None),
        }
    }

    async fn members(&self) -> Result<Vec<Member>> {
        self.scan(CF_MEMBERS, &[])
    }

    async fn children(
        &self,
        relation: ReferralRelation,
        parent: MemberId,
    ) -> Result<Vec<MemberId>> {
        let prefix = referral_prefix(relation, parent);
        self.scan_keys(CF_REFERRALS, &prefix, |key, _| {
            Ok(MemberId(read_u64(&key[prefix.len()..])?))
        })
    }
}

#[async_trait]
impl TaskStore for RocksDbRepository {
    async fn task(&self, id: TaskId) -> Result<Option<Task>> {
        self.get(CF_TASKS, &id.0.to_be_bytes())
    }

    async fn tasks(&self) -> Result<Vec<Task>> {
        self.scan(CF_TASKS, &[])
    }

    async fn completed_tasks(&self, member: MemberId) -> Result<Vec<TaskCompletion>> {
        self.scan(CF_COMPLETIONS, &member.0.to_be_bytes())
    }
}

#[async_trait]
impl PaymentStore for RocksDbRepository {
    async fn payment(&self, id: PaymentId) -> Result<Option<PaymentRequest>> {
        self.get(CF_PAYMENTS, &id.0.to_be_bytes())
    }

    async fn payments_sent(&self, sender: MemberId) -> Result<Vec<PaymentRequest>> {
        let all: Vec<PaymentRequest> = self.scan(CF_PAYMENTS, &[])?;
        Ok(all.into_iter().filter(|p| p.sender == sender).collect())
    }

    async fn payments_received(&self, receiver: MemberId) -> Result<Vec<PaymentRequest>> {
        let all: Vec<PaymentRequest> = self.scan(CF_PAYMENTS, &[])?;
        Ok(all.into_iter().filter(|p| p.receiver == receiver).collect())
    }
}

#[async_trait]
impl LedgerStore for RocksDbRepository {
    async fn entries(&self, member: MemberId) -> Result<Vec<LedgerEntry>> {
        self.scan(CF_ENTRIES, &member.0.to_be_bytes())
    }
}

#[async_trait]
impl UnitOfWork for RocksDbRepository {
    async fn next_id(&self, sequence: Sequence) -> Result<u64> {
        let _guard = self.lock()?;
        let floor = match sequence {
            Sequence::Member => self.last_key_id(CF_MEMBERS)?,
            Sequence::Payment => self.last_key_id(CF_PAYMENTS)?,
        };
        let next = self.sequence_value(sequence.as_str())?.max(floor) + 1;
        self.db.put_cf(
            self.cf(CF_SEQUENCES)?,
            sequence.as_str().as_bytes(),
            next.to_be_bytes(),
        )?;
        Ok(next)
    }

    async fn commit(&self, changes: ChangeSet) -> Result<()> {
        let _guard = self.lock()?;
        self.validate(&changes)?;

        let mut batch = WriteBatch::default();
        for member in &changes.members {
            self.stage_member(&mut batch, member)?;
        }
        let mut tasks: BTreeMap<TaskId, Task> =
            changes.tasks.iter().map(|t| (t.id, t.clone())).collect();
        for id in &changes.impressions {
            let task = match tasks.remove(id) {
                Some(task) => Some(task),
                None => self.get::<Task>(CF_TASKS, &id.0.to_be_bytes())?,
            };
            let mut task = task.ok_or_else(|| LedgerError::not_found(format!("task {id}")))?;
            task.impressions += 1;
            tasks.insert(*id, task);
        }
        for task in tasks.values() {
            batch.put_cf(self.cf(CF_TASKS)?, task.id.0.to_be_bytes(), encode(task)?);
        }
        for completion in &changes.completions {
            batch.put_cf(
                self.cf(CF_COMPLETIONS)?,
                pair_key(completion.member.0, completion.task.0),
                encode(completion)?,
            );
        }
        for write in &changes.payments {
            batch.put_cf(
                self.cf(CF_PAYMENTS)?,
                write.request.id.0.to_be_bytes(),
                encode(&write.request)?,
            );
        }
        if !changes.entries.is_empty() {
            let mut counter = self.sequence_value(ENTRY_SEQUENCE)?;
            for entry in &changes.entries {
                counter += 1;
                batch.put_cf(
                    self.cf(CF_ENTRIES)?,
                    pair_key(entry.member.0, counter),
                    encode(entry)?,
                );
            }
            batch.put_cf(
                self.cf(CF_SEQUENCES)?,
                ENTRY_SEQUENCE.as_bytes(),
                counter.to_be_bytes(),
            );
        }

        self.db.write(batch)?;
        Ok(())
    }
}
