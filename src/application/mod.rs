//! Application layer: the services that enforce the ledger, task, payment and
//! referral rules on top of the storage port.
//!
//! `Dashboard` wires them together and is what the CLI (or any other shell)
//! calls into.

pub mod engine;
pub mod ledger;
pub mod locks;
pub mod members;
pub mod payments;
pub mod referrals;
pub mod tasks;

use crate::domain::member::{Member, MemberId};
use crate::domain::ports::RepositoryRef;
use crate::error::{LedgerError, Result};

pub(crate) async fn load_member(repo: &RepositoryRef, id: MemberId) -> Result<Member> {
    repo.member(id)
        .await?
        .ok_or_else(|| LedgerError::not_found(format!("member {id}")))
}
