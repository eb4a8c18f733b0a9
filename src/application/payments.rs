use super::load_member;
use super::locks::MemberLocks;
use crate::config::Settings;
use crate::domain::ledger::WalletKind;
use crate::domain::member::{KycStatus, Member, MemberId};
use crate::domain::money::{Amount, Balance};
use crate::domain::ports::{
    ChangeSet, ClockRef, Notification, NotifierRef, RepositoryRef, Sequence,
};
use crate::domain::payment::{
    PaymentId, PaymentMethod, PaymentRequest, PaymentStatus, ResolveAction,
};
use crate::error::{LedgerError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Lifecycle of payout and peer payment requests.
///
/// A request is created `Pending` with the amount already debited from the
/// sender (escrow), and is resolved exactly once by its receiver.
#[derive(Clone)]
pub struct PaymentDesk {
    repo: RepositoryRef,
    clock: ClockRef,
    notifier: NotifierRef,
    locks: MemberLocks,
    settings: Arc<Settings>,
}

impl PaymentDesk {
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

    /// Creates a withdrawal request addressed to the payout receiver.
    ///
    /// Requires open payouts, approved KYC, a payout method, and an amount from
    /// the configured options. The receiver itself cannot request a payout,
    /// since nobody else would be able to confirm it.
    pub async fn create_request(
        &self,
        sender: MemberId,
        method: PaymentMethod,
        amount: Decimal,
    ) -> Result<PaymentRequest> {
        if !self.settings.toggles.payouts_open {
            return Err(LedgerError::FeatureClosed("Payout"));
        }
        let amount = Amount::new(amount)?;
        if !self.settings.payouts.allows(amount.value()) {
            return Err(LedgerError::InvalidAmount(format!(
                "{amount} is not an offered payout amount"
            )));
        }
        if !method.is_payout_method() {
            return Err(LedgerError::InvalidMethodData(method));
        }
        let receiver = self.payout_receiver().await?;
        if receiver == sender {
            return Err(LedgerError::Unauthorized(format!(
                "member {sender} is the payout receiver; configure a different receiver to pay them out"
            )));
        }
        self.open_request(sender, receiver, method, amount, true).await
    }

    /// Creates a request from `sender` to a specific `receiver`.
    pub async fn create_request_to(
        &self,
        sender: MemberId,
        receiver: MemberId,
        method: PaymentMethod,
        amount: Decimal,
    ) -> Result<PaymentRequest> {
        let amount = Amount::new(amount)?;
        let receiver = load_member(&self.repo, receiver).await?.id;
        self.open_request(sender, receiver, method, amount, false).await
    }

    async fn payout_receiver(&self) -> Result<MemberId> {
        if let Some(receiver) = self.settings.payouts.receiver {
            return Ok(load_member(&self.repo, receiver).await?.id);
        }
        self.repo
            .members()
            .await?
            .into_iter()
            .find(|m| m.is_admin())
            .map(|m| m.id)
            .ok_or_else(|| LedgerError::not_found("payout receiver"))
    }

    async fn open_request(
        &self,
        sender_id: MemberId,
        receiver: MemberId,
        method: PaymentMethod,
        amount: Amount,
        require_kyc: bool,
    ) -> Result<PaymentRequest> {
        if sender_id == receiver {
            return Err(LedgerError::Unauthorized(
                "a member cannot confirm their own payment".to_string(),
            ));
        }
        let _guard = self.locks.lock(sender_id).await;
        let mut sender = load_member(&self.repo, sender_id).await?;

        if require_kyc && sender.kyc_status != KycStatus::Approved {
            return Err(LedgerError::KycNotApproved);
        }
        if !sender.contact.supports(method) {
            warn!(member = %sender_id, method = %method, "payment method without contact data on file");
            return Err(LedgerError::InvalidMethodData(method));
        }
        if sender.wallet.cashout < Balance::from(amount) {
            return Err(LedgerError::InsufficientFunds {
                requested: amount.value(),
                available: sender.wallet.cashout.value(),
            });
        }

        let now = self.clock.now();
        let id = PaymentId(self.repo.next_id(Sequence::Payment).await?);
        let request = PaymentRequest {
            id,
            uuid: Uuid::new_v4(),
            sender: sender_id,
            receiver,
            method,
            contact: sender.contact.clone(),
            amount,
            status: PaymentStatus::Pending,
            txn_id: None,
            paid_at: None,
            verified_at: None,
            created_at: now,
        };
        let escrow = sender.wallet.debit(
            sender_id,
            amount,
            format!("Withdraw Request ID: {id}"),
            None,
            now,
        )?;

        let mut changes = ChangeSet::new();
        changes
            .insert_payment(request.clone())
            .append(escrow)
            .put_member(sender);
        self.repo.commit(changes).await?;

        info!(payment = %id, sender = %sender_id, receiver = %receiver, method = %method, amount = %amount, "payment request created");
        Ok(request)
    }

    /// The sender records that the money went out, with its transaction id.
    pub async fn record_sent(
        &self,
        payment_id: PaymentId,
        actor: MemberId,
        txn_id: &str,
    ) -> Result<PaymentRequest> {
        let request = self.request(payment_id).await?;
        let _guard = self.locks.lock_all(&[request.sender, request.receiver]).await;
        let mut request = self.request(payment_id).await?;
        if request.status.is_terminal() {
            return Err(LedgerError::AlreadyResolved(payment_id));
        }
        if request.sender != actor {
            return Err(LedgerError::Unauthorized(format!(
                "member {actor} did not send payment {payment_id}"
            )));
        }
        let txn_id = txn_id.trim();
        if txn_id.is_empty() {
            return Err(LedgerError::InvalidAction(
                "transaction id must not be empty".to_string(),
            ));
        }
        request.txn_id = Some(txn_id.to_string());
        request.paid_at = Some(self.clock.now());

        let mut changes = ChangeSet::new();
        changes.update_payment(request.clone(), PaymentStatus::Pending);
        self.repo.commit(changes).await?;

        self.dispatch(
            request.receiver,
            Notification::PaymentSent {
                payment: payment_id,
                amount: request.amount,
            },
        )
        .await;
        Ok(request)
    }

    /// Resolves a pending request on behalf of its receiver.
    ///
    /// `accept` verifies the request and credits the receiver's income. If that
    /// leaves the sender with no unverified outbound request, the sender's
    /// payment is confirmed and the account activated when the profile is also
    /// complete. `reject`/`deny` marks it rejected and clears the payment
    /// details.
    ///
    /// Known issue: a rejection does not return the escrowed amount to the
    /// sender. This matches the behaviour members have seen so far and is kept
    /// until product decides otherwise.
    pub async fn resolve(
        &self,
        payment_id: PaymentId,
        actor: MemberId,
        action: &str,
    ) -> Result<PaymentRequest> {
        let request = self.request(payment_id).await?;
        let _guard = self.locks.lock_all(&[request.sender, request.receiver]).await;
        // reload under the locks
        let mut request = self.request(payment_id).await?;

        if request.status.is_terminal() {
            return Err(LedgerError::AlreadyResolved(payment_id));
        }
        if request.receiver != actor {
            return Err(LedgerError::Unauthorized(format!(
                "member {actor} is not the receiver of payment {payment_id}"
            )));
        }
        let action: ResolveAction = action.parse()?;

        let now = self.clock.now();
        let mut changes = ChangeSet::new();
        let notification = match action {
            ResolveAction::Accept => {
                request.verify(now);

                let mut receiver = load_member(&self.repo, request.receiver).await?;
                let income = receiver.wallet.credit(
                    receiver.id,
                    WalletKind::Income,
                    request.amount,
                    format!("Payment received, request ID: {payment_id}"),
                    request.txn_id.clone(),
                    now,
                );
                changes.append(income);

                let unverified = self
                    .repo
                    .payments_sent(request.sender)
                    .await?
                    .into_iter()
                    .filter(|p| p.id != payment_id && p.status != PaymentStatus::Verified)
                    .count();
                if unverified == 0 {
                    let mut sender = load_member(&self.repo, request.sender).await?;
                    confirm_payment(&mut sender, now);
                    changes.put_member(sender);
                }
                changes.put_member(receiver);

                Notification::PaymentVerified {
                    payment: payment_id,
                    amount: request.amount,
                }
            }
            ResolveAction::Reject => {
                request.reject();
                Notification::PaymentDeclined {
                    payment: payment_id,
                    amount: request.amount,
                }
            }
        };

        changes.update_payment(request.clone(), PaymentStatus::Pending);
        self.repo.commit(changes).await?;

        info!(
            payment = %payment_id,
            receiver = %actor,
            sender = %request.sender,
            status = ?request.status,
            "payment request resolved"
        );
        self.dispatch(request.sender, notification).await;
        Ok(request)
    }

    pub async fn request(&self, payment_id: PaymentId) -> Result<PaymentRequest> {
        self.repo
            .payment(payment_id)
            .await?
            .ok_or_else(|| LedgerError::not_found(format!("payment request {payment_id}")))
    }

    /// Requests sent by `member`, newest first.
    pub async fn outbound(&self, member: MemberId) -> Result<Vec<PaymentRequest>> {
        let mut requests = self.repo.payments_sent(member).await?;
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(requests)
    }

    /// Requests waiting on or resolved by `member`, newest first.
    pub async fn inbound(&self, member: MemberId) -> Result<Vec<PaymentRequest>> {
        let mut requests = self.repo.payments_received(member).await?;
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(requests)
    }

    /// Notifications never fail the operation that triggered them.
    async fn dispatch(&self, member: MemberId, event: Notification) {
        let kind = event.kind();
        if let Err(e) = self.notifier.notify(member, event).await {
            warn!(member = %member, event = kind, error = %e, "notification dispatch failed");
        }
    }
}

fn confirm_payment(member: &mut Member, now: DateTime<Utc>) {
    member.payment_confirmed = true;
    if member.try_activate(now) {
        info!(member = %member.id, "member activated");
    }
}
