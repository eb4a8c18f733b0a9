use crate::domain::member::MemberId;
use crate::domain::payment::{PaymentId, PaymentMethod};
use crate::domain::task::TaskId;
use rust_decimal::Decimal;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LedgerError>;

/// Every failure the core can report.
///
/// Domain variants are recoverable at the request boundary: the caller shows a
/// message and re-renders. `Internal` means the persistence layer failed and the
/// whole change set was abandoned.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds {
        requested: Decimal,
        available: Decimal,
    },

    #[error("Member {member} has already completed task {task}")]
    AlreadyCompleted { member: MemberId, task: TaskId },

    #[error("Payment request {0} is already resolved")]
    AlreadyResolved(PaymentId),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("No {0} contact data on file for this member")]
    InvalidMethodData(PaymentMethod),

    #[error("Unknown action: {0}")]
    InvalidAction(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("KYC must be approved before requesting a payout")]
    KycNotApproved,

    #[error("KYC has already been submitted")]
    KycAlreadySubmitted,

    #[error("{0} requests are closed right now")]
    FeatureClosed(&'static str),

    #[error("Upgrade has already been applied for")]
    UpgradeAlreadyApplied,

    #[error("Member code {0} is already taken")]
    DuplicateCode(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
}

impl From<config::ConfigError> for LedgerError {
    fn from(e: config::ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}

impl LedgerError {
    pub fn not_found(what: impl std::fmt::Display) -> Self {
        Self::NotFound(what.to_string())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::InternalError(Box::new(std::io::Error::other(msg.into())))
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        Self::InternalError(Box::new(err))
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for LedgerError {
    fn from(err: rocksdb::Error) -> Self {
        Self::InternalError(Box::new(err))
    }
}
