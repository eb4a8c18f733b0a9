use crate::domain::member::MemberId;
use crate::domain::referral::{AUTO_FILL_MAX_DEPTH, MANUAL_MAX_DEPTH, ReferralRelation};
use crate::error::Result;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;

/// Prefix of environment overrides, e.g. `REFERRAL_LEDGER__TOGGLES__PAYOUTS_OPEN=false`.
pub const ENV_PREFIX: &str = "REFERRAL_LEDGER";

/// Runtime settings injected into the dashboard.
///
/// Every field has a default so a partial JSON file is enough.
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub toggles: Toggles,
    pub payouts: PayoutSettings,
    pub referrals: ReferralSettings,
}

/// Site-wide switches an administrator flips on and off.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Toggles {
    pub kyc_open: bool,
    pub payouts_open: bool,
    pub upgrades_open: bool,
}

impl Default for Toggles {
    fn default() -> Self {
        Self {
            kyc_open: true,
            payouts_open: true,
            upgrades_open: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct PayoutSettings {
    /// Member who confirms payouts. Falls back to the lowest-id administrator.
    pub receiver: Option<MemberId>,
    /// Amounts a payout may be requested in. Empty allows any amount.
    pub amount_options: Vec<Decimal>,
}

impl Default for PayoutSettings {
    fn default() -> Self {
        Self {
            receiver: None,
            amount_options: [
                300, 500, 1000, 2000, 5000, 10000, 15000, 20000, 30000, 40000, 50000,
            ]
            .into_iter()
            .map(Decimal::from)
            .collect(),
        }
    }
}

impl PayoutSettings {
    pub fn allows(&self, amount: Decimal) -> bool {
        self.amount_options.is_empty() || self.amount_options.contains(&amount)
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReferralSettings {
    pub manual_depth: usize,
    pub auto_fill_depth: usize,
    /// Upper bound on members visited by a single enumeration.
    pub max_visited: usize,
}

impl Default for ReferralSettings {
    fn default() -> Self {
        Self {
            manual_depth: MANUAL_MAX_DEPTH,
            auto_fill_depth: AUTO_FILL_MAX_DEPTH,
            max_visited: 100_000,
        }
    }
}

impl ReferralSettings {
    pub fn max_depth(&self, relation: ReferralRelation) -> usize {
        match relation {
            ReferralRelation::Manual => self.manual_depth,
            ReferralRelation::AutoFill => self.auto_fill_depth,
        }
    }
}

impl Settings {
    /// Reads the optional JSON file, then applies `REFERRAL_LEDGER__*`
    /// environment overrides on top.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::layered(path, environment())
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Self::build(Config::builder().add_source(File::from_str(raw, FileFormat::Json)))
    }

    fn layered(path: Option<&Path>, env: Environment) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Json));
        }
        Self::build(builder.add_source(env))
    }

    fn build(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        Ok(builder.build()?.try_deserialize()?)
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .try_parsing(true)
}
