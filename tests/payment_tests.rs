mod common;

use common::{ADMIN, NEWCOMER, PEER, SEED, SENDER, fixture, fixture_with};
use referral_ledger::config::Settings;
use referral_ledger::domain::member::AccountStatus;
use referral_ledger::domain::money::Balance;
use referral_ledger::domain::payment::{PaymentId, PaymentMethod, PaymentStatus};
use referral_ledger::domain::ports::{LedgerStore, MemberStore, Notification, PaymentStore};
use referral_ledger::error::LedgerError;
use rust_decimal_macros::dec;

#[tokio::test]
async fn test_create_request_debits_sender() {
    let f = fixture().await;
    let request = f
        .dashboard
        .create_payment_request(SENDER, PaymentMethod::Bank, dec!(300))
        .await
        .unwrap();

    assert_eq!(request.status, PaymentStatus::Pending);
    assert_eq!(request.receiver, ADMIN);
    assert_eq!(request.amount.value(), dec!(300));
    assert_eq!(
        request.contact.bank_account_number.as_deref(),
        Some("001122334455")
    );

    let sender = f.repo.member(SENDER).await.unwrap().unwrap();
    assert_eq!(sender.wallet.cashout, Balance::new(dec!(700)));
    let history = f.dashboard.ledger().history(SENDER, Some(1)).await.unwrap();
    assert_eq!(history[0].amount, dec!(300));
    assert_eq!(
        history[0].description,
        format!("Withdraw Request ID: {}", request.id)
    );
}

#[tokio::test]
async fn test_accept_credits_receiver_once() {
    let mut f = fixture().await;
    let request = f
        .dashboard
        .create_payment_request(SENDER, PaymentMethod::Bank, dec!(300))
        .await
        .unwrap();

    let verified = f
        .dashboard
        .resolve_payment_request(request.id, ADMIN, "accept")
        .await
        .unwrap();
    assert_eq!(verified.status, PaymentStatus::Verified);
    assert!(verified.verified_at.is_some());

    let second = f
        .dashboard
        .resolve_payment_request(request.id, ADMIN, "accept")
        .await;
    assert!(matches!(second, Err(LedgerError::AlreadyResolved(id)) if id == request.id));

    let admin = f.repo.member(ADMIN).await.unwrap().unwrap();
    assert_eq!(admin.wallet.income, Balance::new(dec!(300)));
    assert_eq!(f.repo.entries(ADMIN).await.unwrap().len(), 1);

    // escrow is not restored
    let sender = f.repo.member(SENDER).await.unwrap().unwrap();
    assert_eq!(sender.wallet.cashout, Balance::new(dec!(700)));
    // last outbound request verified and profile complete
    assert!(sender.payment_confirmed);
    assert_eq!(sender.status, AccountStatus::Active);
    assert!(sender.activated_at.is_some());

    let events = f.drain_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, SENDER);
    assert!(matches!(events[0].1, Notification::PaymentVerified { payment, .. } if payment == request.id));
}

#[tokio::test]
async fn test_resolve_by_other_member_is_unauthorized() {
    let mut f = fixture().await;
    let request = f
        .dashboard
        .create_payment_request(SENDER, PaymentMethod::Bank, dec!(300))
        .await
        .unwrap();

    let result = f
        .dashboard
        .resolve_payment_request(request.id, PEER, "accept")
        .await;
    assert!(matches!(result, Err(LedgerError::Unauthorized(_))));

    let stored = f.dashboard.payments().request(request.id).await.unwrap();
    assert_eq!(stored, request);
    assert!(f.repo.entries(PEER).await.unwrap().is_empty());
    assert!(f.repo.entries(ADMIN).await.unwrap().is_empty());
    assert!(f.drain_events().is_empty());
}

#[tokio::test]
async fn test_reject_keeps_escrow_debit() {
    let mut f = fixture().await;
    let request = f
        .dashboard
        .create_payment_request(SENDER, PaymentMethod::Bank, dec!(500))
        .await
        .unwrap();
    f.dashboard
        .payments()
        .record_sent(request.id, SENDER, "UTR0001")
        .await
        .unwrap();

    let rejected = f
        .dashboard
        .resolve_payment_request(request.id, ADMIN, "deny")
        .await
        .unwrap();
    assert_eq!(rejected.status, PaymentStatus::Rejected);
    assert_eq!(rejected.txn_id, None);
    assert_eq!(rejected.paid_at, None);

    let sender = f.repo.member(SENDER).await.unwrap().unwrap();
    assert_eq!(sender.wallet.cashout, Balance::new(dec!(500)));
    assert!(!sender.payment_confirmed);

    let kinds: Vec<_> = f.drain_events().into_iter().map(|(m, e)| (m, e.kind())).collect();
    assert_eq!(
        kinds,
        vec![(ADMIN, "payment_sent"), (SENDER, "payment_declined")]
    );

    let again = f
        .dashboard
        .resolve_payment_request(request.id, ADMIN, "reject")
        .await;
    assert!(matches!(again, Err(LedgerError::AlreadyResolved(_))));
}

#[tokio::test]
async fn test_unknown_action_changes_nothing() {
    let f = fixture().await;
    let request = f
        .dashboard
        .create_payment_request(SENDER, PaymentMethod::Bank, dec!(300))
        .await
        .unwrap();

    let result = f
        .dashboard
        .resolve_payment_request(request.id, ADMIN, "maybe")
        .await;
    assert!(matches!(result, Err(LedgerError::InvalidAction(_))));
    let stored = f.dashboard.payments().request(request.id).await.unwrap();
    assert_eq!(stored.status, PaymentStatus::Pending);
}

#[tokio::test]
async fn test_accept_credits_transaction_reference() {
    let f = fixture().await;
    let request = f
        .dashboard
        .create_payment_request(SENDER, PaymentMethod::Bank, dec!(300))
        .await
        .unwrap();
    f.dashboard
        .payments()
        .record_sent(request.id, SENDER, " UTR9911 ")
        .await
        .unwrap();
    f.dashboard
        .resolve_payment_request(request.id, ADMIN, "Accept")
        .await
        .unwrap();

    let history = f.dashboard.ledger().history(ADMIN, None).await.unwrap();
    assert_eq!(history[0].reference, "UTR9911");
}

#[tokio::test]
async fn test_record_sent_rules() {
    let f = fixture().await;
    let request = f
        .dashboard
        .create_payment_request(SENDER, PaymentMethod::Bank, dec!(300))
        .await
        .unwrap();
    let payments = f.dashboard.payments();

    assert!(matches!(
        payments.record_sent(request.id, ADMIN, "UTR1").await,
        Err(LedgerError::Unauthorized(_))
    ));
    assert!(matches!(
        payments.record_sent(request.id, SENDER, "   ").await,
        Err(LedgerError::InvalidAction(_))
    ));
    let sent = payments.record_sent(request.id, SENDER, "UTR1").await.unwrap();
    assert_eq!(sent.txn_id.as_deref(), Some("UTR1"));
    assert!(sent.paid_at.is_some());
    assert_eq!(sent.status, PaymentStatus::Pending);
}

#[tokio::test]
async fn test_method_without_contact_data() {
    let f = fixture().await;
    let result = f
        .dashboard
        .create_payment_request(SENDER, PaymentMethod::Paytm, dec!(300))
        .await;
    assert!(matches!(
        result,
        Err(LedgerError::InvalidMethodData(PaymentMethod::Paytm))
    ));
    let result = f
        .dashboard
        .create_payment_request(SENDER, PaymentMethod::GooglePay, dec!(300))
        .await;
    assert!(matches!(result, Err(LedgerError::InvalidMethodData(_))));

    let sender = f.repo.member(SENDER).await.unwrap().unwrap();
    assert_eq!(sender.wallet.cashout, Balance::new(dec!(1000)));
}

#[tokio::test]
async fn test_amount_rules() {
    let f = fixture().await;
    assert!(matches!(
        f.dashboard
            .create_payment_request(SENDER, PaymentMethod::Bank, dec!(5000))
            .await,
        Err(LedgerError::InsufficientFunds { .. })
    ));
    assert!(matches!(
        f.dashboard
            .create_payment_request(SENDER, PaymentMethod::Bank, dec!(250))
            .await,
        Err(LedgerError::InvalidAmount(_))
    ));
    assert!(matches!(
        f.dashboard
            .create_payment_request(SENDER, PaymentMethod::Bank, dec!(-300))
            .await,
        Err(LedgerError::InvalidAmount(_))
    ));

    // the whole balance may go out
    f.dashboard
        .create_payment_request(SENDER, PaymentMethod::Bank, dec!(1000))
        .await
        .unwrap();
    let sender = f.repo.member(SENDER).await.unwrap().unwrap();
    assert_eq!(sender.wallet.cashout, Balance::ZERO);
    assert_eq!(f.repo.payments_sent(SENDER).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_payout_preconditions() {
    let f = fixture().await;
    assert!(matches!(
        f.dashboard
            .create_payment_request(NEWCOMER, PaymentMethod::Bank, dec!(300))
            .await,
        Err(LedgerError::KycNotApproved)
    ));

    let mut settings = Settings::default();
    settings.toggles.payouts_open = false;
    let closed = fixture_with(SEED, settings).await;
    assert!(matches!(
        closed
            .dashboard
            .create_payment_request(SENDER, PaymentMethod::Bank, dec!(300))
            .await,
        Err(LedgerError::FeatureClosed(_))
    ));
}

#[tokio::test]
async fn test_configured_payout_receiver() {
    let mut settings = Settings::default();
    settings.payouts.receiver = Some(PEER);
    let f = fixture_with(SEED, settings).await;
    let request = f
        .dashboard
        .create_payment_request(SENDER, PaymentMethod::Bank, dec!(300))
        .await
        .unwrap();
    assert_eq!(request.receiver, PEER);
    assert!(matches!(
        f.dashboard
            .resolve_payment_request(request.id, ADMIN, "accept")
            .await,
        Err(LedgerError::Unauthorized(_))
    ));
}

#[tokio::test]
async fn test_payout_receiver_cannot_request_payout() {
    let f = fixture().await;
    let result = f
        .dashboard
        .create_payment_request(ADMIN, PaymentMethod::Bank, dec!(300))
        .await;
    match result {
        Err(LedgerError::Unauthorized(message)) => assert!(message.contains("payout receiver")),
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(f.repo.payments_sent(ADMIN).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_activation_waits_for_last_unverified_request() {
    let f = fixture().await;
    let first = f
        .dashboard
        .create_payment_request(SENDER, PaymentMethod::Bank, dec!(300))
        .await
        .unwrap();
    let second = f
        .dashboard
        .create_payment_request(SENDER, PaymentMethod::Bank, dec!(500))
        .await
        .unwrap();

    f.dashboard
        .resolve_payment_request(first.id, ADMIN, "accept")
        .await
        .unwrap();
    let sender = f.repo.member(SENDER).await.unwrap().unwrap();
    assert!(!sender.payment_confirmed);
    assert_eq!(sender.status, AccountStatus::Inactive);

    f.dashboard
        .resolve_payment_request(second.id, ADMIN, "accept")
        .await
        .unwrap();
    let sender = f.repo.member(SENDER).await.unwrap().unwrap();
    assert!(sender.payment_confirmed);
    assert_eq!(sender.status, AccountStatus::Active);

    let admin = f.repo.member(ADMIN).await.unwrap().unwrap();
    assert_eq!(admin.wallet.income, Balance::new(dec!(800)));
}

#[tokio::test]
async fn test_concurrent_resolutions_succeed_once() {
    let f = fixture().await;
    let request = f
        .dashboard
        .create_payment_request(SENDER, PaymentMethod::Bank, dec!(300))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for action in ["accept", "accept", "reject", "accept"] {
        let dashboard = f.dashboard.clone();
        handles.push(tokio::spawn(async move {
            dashboard
                .resolve_payment_request(request.id, ADMIN, action)
                .await
        }));
    }
    let mut resolved = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => resolved += 1,
            Err(LedgerError::AlreadyResolved(_)) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(resolved, 1);

    let stored = f.dashboard.payments().request(request.id).await.unwrap();
    let admin = f.repo.member(ADMIN).await.unwrap().unwrap();
    match stored.status {
        PaymentStatus::Verified => assert_eq!(admin.wallet.income, Balance::new(dec!(300))),
        PaymentStatus::Rejected => assert_eq!(admin.wallet.income, Balance::ZERO),
        PaymentStatus::Pending => panic!("request left pending"),
    }
}

#[tokio::test]
async fn test_peer_payment_to_named_receiver() {
    let f = fixture().await;
    let request = f
        .dashboard
        .payments()
        .create_request_to(SENDER, PEER, PaymentMethod::Bank, dec!(120))
        .await
        .unwrap();
    assert_eq!(request.receiver, PEER);

    f.dashboard
        .resolve_payment_request(request.id, PEER, "accept")
        .await
        .unwrap();
    let peer = f.repo.member(PEER).await.unwrap().unwrap();
    assert_eq!(peer.wallet.income, Balance::new(dec!(120)));
    assert_eq!(peer.wallet.cashout, Balance::new(dec!(120)));

    let inbound = f.dashboard.payments().inbound(PEER).await.unwrap();
    assert_eq!(inbound.len(), 1);
    let outbound = f.dashboard.payments().outbound(SENDER).await.unwrap();
    assert_eq!(outbound[0].id, request.id);

    assert!(matches!(
        f.dashboard
            .payments()
            .create_request_to(SENDER, SENDER, PaymentMethod::Bank, dec!(10))
            .await,
        Err(LedgerError::Unauthorized(_))
    ));
}

#[tokio::test]
async fn test_unknown_request() {
    let f = fixture().await;
    assert!(matches!(
        f.dashboard
            .resolve_payment_request(PaymentId(404), ADMIN, "accept")
            .await,
        Err(LedgerError::NotFound(_))
    ));
}
