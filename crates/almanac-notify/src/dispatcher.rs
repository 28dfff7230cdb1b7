//! Notification dispatch.

use std::sync::Arc;

use tracing::{debug, warn};

use almanac_store::Database;

use crate::{Mailer, NotifyError};

/// The scheduler callback: turns a fired reminder job into a mail send.
///
/// Constructed once with its dependencies and shared with the scheduler,
/// so a firing never has to bootstrap its own context.
pub struct NotificationDispatcher {
    db: Arc<Database>,
    mailer: Arc<dyn Mailer>,
}

impl NotificationDispatcher {
    pub fn new(db: Arc<Database>, mailer: Arc<dyn Mailer>) -> Self {
        Self { db, mailer }
    }

    /// Send the reminder for an event, at most once.
    ///
    /// The `started` flag is claimed and committed before the send, so a
    /// duplicate fire (scheduler catch-up, cancel racing a fire) is a no-op.
    /// A crash between claim and send drops that notification; delivery is
    /// best-effort by design.
    pub async fn dispatch(&self, event_id: i64) -> Result<(), NotifyError> {
        let Some(event) = self.db.get_event(event_id)? else {
            // Event deleted while the job was in flight; tolerate the race
            debug!(event_id, "reminder fired for missing event, skipping");
            return Ok(());
        };

        if !self.db.mark_started(event_id)? {
            debug!(event_id, "reminder already sent, skipping");
            return Ok(());
        }

        let Some(owner) = self.db.get_user(event.user_id)? else {
            warn!(event_id, user_id = event.user_id, "event owner missing, skipping reminder");
            return Ok(());
        };

        let recipients = recipient_set(&event.participants, &owner.email);
        let subject = format!("Event Reminder: {}", event.title);
        let body = format!(
            "Reminder for your event: {}\nDescription: {}",
            event.title,
            event.description.as_deref().unwrap_or("")
        );

        if let Err(e) = self.mailer.send(&subject, &body, &recipients).await {
            // The started flag stays set: favor at-most-one send over retry
            warn!(event_id, error = %e, "reminder delivery failed, not retrying");
        }

        Ok(())
    }
}

/// Participants plus the owner's own email, deduplicated, order preserved.
fn recipient_set(participants: &[String], owner_email: &str) -> Vec<String> {
    let mut recipients: Vec<String> = Vec::with_capacity(participants.len() + 1);
    for address in participants {
        if !recipients.contains(address) {
            recipients.push(address.clone());
        }
    }
    if !recipients.iter().any(|r| r == owner_email) {
        recipients.push(owner_email.to_string());
    }
    recipients
}
