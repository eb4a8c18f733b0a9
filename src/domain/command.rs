use rust_decimal::Decimal;
use serde::Deserialize;

#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Credit,
    Debit,
    CompleteTask,
    RequestPayout,
    Pay,
    MarkSent,
    Resolve,
    ApproveKyc,
    Upgrade,
    Referrals,
}

/// One row of a replayable command file.
///
/// `member` is always the acting member. The meaning of `target` and `detail`
/// depends on the operation:
///
/// | op              | target          | detail            | amount |
/// |-----------------|-----------------|-------------------|--------|
/// | `credit`        | wallet name     |                   | yes    |
/// | `debit`         |                 |                   | yes    |
/// | `complete_task` | task id         |                   |        |
/// | `request_payout`|                 | method            | yes    |
/// | `pay`           | receiver id     | method            | yes    |
/// | `mark_sent`     | payment id      | transaction id    |        |
/// | `resolve`       | payment id      | accept / reject   |        |
/// | `approve_kyc`   | member id       |                   |        |
/// | `upgrade`       | proof reference | method            |        |
/// | `referrals`     | depth           | manual / auto_fill|        |
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct Command {
    pub op: Operation,
    pub member: u64,
    pub target: Option<String>,
    pub detail: Option<String>,
    pub amount: Option<Decimal>,
}
