#![allow(dead_code)]

use referral_ledger::application::engine::Dashboard;
use referral_ledger::config::Settings;
use referral_ledger::domain::member::MemberId;
use referral_ledger::domain::ports::Notification;
use referral_ledger::infrastructure::in_memory::InMemoryRepository;
use referral_ledger::infrastructure::notify::ChannelNotifier;
use referral_ledger::interfaces::seed::Seed;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

pub const ADMIN: MemberId = MemberId(1);
/// KYC approved, bank details on file, 1000 in self earnings.
pub const SENDER: MemberId = MemberId(2);
/// Plain member with a UPI id.
pub const PEER: MemberId = MemberId(3);
/// Fresh member: no KYC, no balance, referred by `SENDER`.
pub const NEWCOMER: MemberId = MemberId(4);

pub const SEED: &str = r#"{
    "members": [
        {"id": 1, "full_name": "Site Admin", "role": "admin", "kyc_status": "approved"},
        {"id": 2, "full_name": "Sunita Rao", "referrer": 1, "kyc_status": "approved",
         "profile_completed": true,
         "contact": {"bank_account_number": "001122334455", "bank_holder_name": "Sunita Rao",
                     "bank_name": "State Bank", "bank_ifsc": "SBIN0000001"},
         "preferred_method": "BANK",
         "balances": {"self": "1000"}},
        {"id": 3, "full_name": "Arjun Das", "referrer": 1,
         "contact": {"upi_id": "arjun@upi", "phone_number": "9800000003"}},
        {"id": 4, "full_name": "Neha Singh", "referrer": 2}
    ],
    "tasks": [
        {"id": 1, "title": "Watch the intro video", "reward": "50"},
        {"id": 2, "title": "Share the launch post", "reward": "30"}
    ]
}"#;

pub struct Fixture {
    pub dashboard: Dashboard,
    pub repo: Arc<InMemoryRepository>,
    pub events: UnboundedReceiver<(MemberId, Notification)>,
}

impl Fixture {
    /// Notifications delivered so far.
    pub fn drain_events(&mut self) -> Vec<(MemberId, Notification)> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

pub async fn fixture() -> Fixture {
    fixture_with(SEED, Settings::default()).await
}

pub async fn fixture_with(seed: &str, settings: Settings) -> Fixture {
    let repo = Arc::new(InMemoryRepository::new());
    Seed::from_json(seed)
        .expect("Failed to parse seed")
        .apply(repo.as_ref(), chrono::Utc::now())
        .await
        .expect("Failed to apply seed");
    let (notifier, events) = ChannelNotifier::new();
    let dashboard = Dashboard::new(repo.clone(), Arc::new(notifier), settings);
    Fixture {
        dashboard,
        repo,
        events,
    }
}
