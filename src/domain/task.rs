use super::member::MemberId;
use super::money::Amount;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A paid task. The reward is fixed at creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub uuid: Uuid,
    pub title: String,
    pub reward: Amount,
    /// Number of completions across all members.
    pub impressions: u64,
}

impl Task {
    pub fn new(id: TaskId, title: impl Into<String>, reward: Amount) -> Self {
        Self {
            id,
            uuid: Uuid::new_v4(),
            title: title.into(),
            reward,
            impressions: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCompletion {
    pub member: MemberId,
    pub task: TaskId,
    pub status: u8,
    pub completed_at: DateTime<Utc>,
}

impl TaskCompletion {
    pub fn new(member: MemberId, task: TaskId, completed_at: DateTime<Utc>) -> Self {
        Self {
            member,
            task,
            status: 1,
            completed_at,
        }
    }
}

/// A task as seen by one member.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskView {
    pub task: Task,
    pub completed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TaskSummary {
    pub completed: u64,
    pub pending: u64,
}
