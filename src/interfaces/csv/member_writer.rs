use crate::domain::member::{AccountStatus, Member};
use crate::error::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct MemberRow<'a> {
    member: u64,
    code: &'a str,
    status: &'static str,
    #[serde(rename = "self")]
    self_earnings: Decimal,
    task: Decimal,
    referral: Decimal,
    income: Decimal,
    cashout: Decimal,
    pending_tasks: u32,
    referrals: u32,
}

impl<'a> From<&'a Member> for MemberRow<'a> {
    fn from(member: &'a Member) -> Self {
        let wallet = &member.wallet;
        Self {
            member: member.id.0,
            code: &member.code,
            status: match member.status {
                AccountStatus::Active => "active",
                AccountStatus::Inactive => "inactive",
            },
            self_earnings: wallet.self_earnings.value().normalize(),
            task: wallet.task.value().normalize(),
            referral: wallet.referral.value().normalize(),
            income: wallet.income.value().normalize(),
            cashout: wallet.cashout.value().normalize(),
            pending_tasks: member.total_task_pending,
            referrals: member.total_referrals,
        }
    }
}

/// Writes the final member balances as CSV.
pub struct MemberWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> MemberWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_members(&mut self, members: &[Member]) -> Result<()> {
        for member in members {
            self.writer.serialize(MemberRow::from(member))?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
