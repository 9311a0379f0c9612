//! Guest invite notification boundary. Delivery itself is out of
//! scope; failures must never fail a settlement.

use async_trait::async_trait;
use tracing::info;

/// Notification sender for guest invites.
#[async_trait]
pub trait InviteNotifier: Send + Sync {
    async fn send_invite(&self, email: &str, invite_token: &str);
}

/// Default notifier: records the invite as a structured log event.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl InviteNotifier for LogNotifier {
    async fn send_invite(&self, email: &str, invite_token: &str) {
        info!(email, invite_token, "guest invite ready to send");
    }
}
