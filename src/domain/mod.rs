//! Domain model: members and their wallets, tasks, payment requests and the
//! referral forests, plus the ports the application layer talks through.

pub mod command;
pub mod ledger;
pub mod member;
pub mod money;
pub mod payment;
pub mod ports;
pub mod referral;
pub mod task;
