use crate::domain::member::MemberId;
use crate::domain::ports::{Notification, Notifier};
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::info;

/// Writes every notification to the log. Used by the CLI.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, member: MemberId, event: Notification) -> Result<()> {
        info!(member = %member, event = event.kind(), payload = ?event, "notification");
        Ok(())
    }
}

/// Forwards notifications over an unbounded channel.
///
/// Sending fails once the receiving half is dropped; callers only log that.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: UnboundedSender<(MemberId, Notification)>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, UnboundedReceiver<(MemberId, Notification)>) {
        let (tx, rx) = unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn notify(&self, member: MemberId, event: Notification) -> Result<()> {
        self.tx
            .send((member, event))
            .map_err(|_| LedgerError::internal("notification channel closed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_notifier_delivers_in_order() {
        let (notifier, mut rx) = ChannelNotifier::new();
        for member in [1, 2] {
            notifier
                .notify(
                    MemberId(member),
                    Notification::MemberAdded {
                        member: MemberId(member),
                        code: format!("GL00000{member}"),
                    },
                )
                .await
                .unwrap();
        }
        assert_eq!(rx.recv().await.unwrap().0, MemberId(1));
        assert_eq!(rx.recv().await.unwrap().0, MemberId(2));
    }

    #[tokio::test]
    async fn test_channel_notifier_closed_receiver() {
        let (notifier, rx) = ChannelNotifier::new();
        drop(rx);
        let result = notifier
            .notify(
                MemberId(1),
                Notification::MemberAdded {
                    member: MemberId(1),
                    code: "GL000001".into(),
                },
            )
            .await;
        assert!(matches!(result, Err(LedgerError::InternalError(_))));
    }
}
