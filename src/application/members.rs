use super::load_member;
use super::locks::MemberLocks;
use crate::config::Settings;
use crate::domain::member::{KycStatus, Member, MemberId, PaymentContact, UpgradeApplication, generate_code};
use crate::domain::payment::PaymentMethod;
use crate::domain::ports::{ChangeSet, ClockRef, Notification, NotifierRef, RepositoryRef, Sequence};
use crate::error::{LedgerError, Result};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

const CODE_ATTEMPTS: usize = 32;

/// Details an administrator enters for a new member.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewMember {
    pub full_name: String,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    /// Short code of the manual referrer. Unknown codes are ignored.
    pub referrer_code: Option<String>,
    /// Short code of the auto-fill parent.
    pub auto_referrer_code: Option<String>,
}

/// Profile and payout details submitted for KYC.
#[derive(Debug, Clone, Deserialize)]
pub struct KycSubmission {
    pub contact: PaymentContact,
    pub preferred_method: PaymentMethod,
}

/// Member onboarding: admin-created accounts, KYC and the upgrade application.
#[derive(Clone)]
pub struct MemberAdmin {
    repo: RepositoryRef,
    clock: ClockRef,
    notifier: NotifierRef,
    locks: MemberLocks,
    settings: Arc<Settings>,
}

impl MemberAdmin {
    pub fn new(
        repo: RepositoryRef,
        clock: ClockRef,
        notifier: NotifierRef,
        locks: MemberLocks,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            repo,
            clock,
            notifier,
            locks,
            settings,
        }
    }

    async fn require_admin(&self, actor: MemberId) -> Result<Member> {
        let member = load_member(&self.repo, actor).await?;
        if !member.is_admin() {
            return Err(LedgerError::Unauthorized(format!(
                "member {actor} is not an administrator"
            )));
        }
        Ok(member)
    }

    async fn find_by_code(&self, code: Option<&str>) -> Result<Option<Member>> {
        match code.map(str::trim).filter(|c| !c.is_empty()) {
            Some(code) => self.repo.member_by_code(&code.to_ascii_uppercase()).await,
            None => Ok(None),
        }
    }

    /// Creates a member under the given referrers. Administrator only.
    pub async fn add_member(&self, actor: MemberId, new: NewMember) -> Result<Member> {
        self.require_admin(actor).await?;
        let full_name = new.full_name.trim();
        if full_name.is_empty() {
            return Err(LedgerError::InvalidAction("full name is required".to_string()));
        }

        let referrer = self.find_by_code(new.referrer_code.as_deref()).await?;
        let auto_referrer = self.find_by_code(new.auto_referrer_code.as_deref()).await?;
        let _guard = match &referrer {
            Some(r) => Some(self.locks.lock(r.id).await),
            None => None,
        };

        let id = MemberId(self.repo.next_id(Sequence::Member).await?);
        for _ in 0..CODE_ATTEMPTS {
            let code = generate_code();
            if self.repo.member_by_code(&code).await?.is_some() {
                continue;
            }

            let mut member = Member::new(id, code, full_name);
            member.email = new.email.clone();
            member.contact.phone_number = new.phone_number.clone();
            member.auto_referrer = auto_referrer.as_ref().map(|m| m.id);

            let mut changes = ChangeSet::new();
            if let Some(referrer) = &referrer {
                // reload under the lock
                let mut referrer = load_member(&self.repo, referrer.id).await?;
                referrer.total_referrals += 1;
                member.referrer = Some(referrer.id);
                changes.put_member(referrer);
            }
            changes.put_member(member.clone());

            match self.repo.commit(changes).await {
                Ok(()) => {}
                Err(LedgerError::DuplicateCode(code)) => {
                    warn!(code = %code, "member code collision, retrying");
                    continue;
                }
                Err(e) => return Err(e),
            }

            info!(member = %member.id, code = %member.code, referrer = ?member.referrer, "member added");
            let event = Notification::MemberAdded {
                member: member.id,
                code: member.code.clone(),
            };
            if let Err(e) = self.notifier.notify(member.id, event).await {
                warn!(member = %member.id, error = %e, "notification dispatch failed");
            }
            return Ok(member);
        }
        Err(LedgerError::internal("could not allocate a unique member code"))
    }

    /// Stores the member's KYC details while KYC intake is open.
    pub async fn submit_kyc(&self, member_id: MemberId, submission: KycSubmission) -> Result<Member> {
        if !self.settings.toggles.kyc_open {
            return Err(LedgerError::FeatureClosed("KYC"));
        }
        let _guard = self.locks.lock(member_id).await;
        let mut member = load_member(&self.repo, member_id).await?;
        if member.kyc_status != KycStatus::NotSubmitted {
            return Err(LedgerError::KycAlreadySubmitted);
        }
        let method = submission.preferred_method;
        if !method.is_payout_method() || !submission.contact.supports(method) {
            return Err(LedgerError::InvalidMethodData(method));
        }

        let now = self.clock.now();
        let phone = member.contact.phone_number.take();
        member.contact = submission.contact;
        if member.contact.phone_number.is_none() {
            member.contact.phone_number = phone;
        }
        member.preferred_method = Some(method);
        member.profile_completed = true;
        member.kyc_status = KycStatus::Pending;
        member.kyc_requested_at = Some(now);
        if member.try_activate(now) {
            info!(member = %member_id, "member activated");
        }

        let mut changes = ChangeSet::new();
        changes.put_member(member.clone());
        self.repo.commit(changes).await?;
        info!(member = %member_id, method = %method, "KYC submitted");
        Ok(member)
    }

    /// Approves a pending KYC. Administrator only.
    pub async fn approve_kyc(&self, actor: MemberId, member_id: MemberId) -> Result<Member> {
        self.require_admin(actor).await?;
        let _guard = self.locks.lock(member_id).await;
        let mut member = load_member(&self.repo, member_id).await?;
        if member.kyc_status != KycStatus::Pending {
            return Err(LedgerError::InvalidAction(format!(
                "KYC of member {member_id} is not pending"
            )));
        }
        member.kyc_status = KycStatus::Approved;

        let mut changes = ChangeSet::new();
        changes.put_member(member.clone());
        self.repo.commit(changes).await?;
        info!(member = %member_id, admin = %actor, "KYC approved");
        Ok(member)
    }

    /// Records an account upgrade application with its payment proof.
    pub async fn apply_for_upgrade(
        &self,
        member_id: MemberId,
        method: PaymentMethod,
        proof: &str,
    ) -> Result<Member> {
        if !self.settings.toggles.upgrades_open {
            return Err(LedgerError::FeatureClosed("Upgrade"));
        }
        let proof = proof.trim();
        if proof.is_empty() {
            return Err(LedgerError::InvalidAction("payment proof is required".to_string()));
        }
        let _guard = self.locks.lock(member_id).await;
        let mut member = load_member(&self.repo, member_id).await?;
        if member.payment_confirmed || member.upgrade.is_some() {
            return Err(LedgerError::UpgradeAlreadyApplied);
        }
        member.upgrade = Some(UpgradeApplication {
            method,
            proof: proof.to_string(),
            applied_at: self.clock.now(),
        });

        let mut changes = ChangeSet::new();
        changes.put_member(member.clone());
        self.repo.commit(changes).await?;
        info!(member = %member_id, method = %method, "upgrade applied");
        Ok(member)
    }

    pub async fn member(&self, id: MemberId) -> Result<Member> {
        load_member(&self.repo, id).await
    }

    pub async fn member_by_code(&self, code: &str) -> Result<Member> {
        self.find_by_code(Some(code))
            .await?
            .ok_or_else(|| LedgerError::not_found(format!("member {code}")))
    }
}
