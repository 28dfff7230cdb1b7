//! Reminder notifications for Almanac.
//!
//! The [`NotificationDispatcher`] is the scheduler's callback target: it
//! claims the event's `started` flag (idempotent under duplicate fires),
//! composes the reminder, and hands it to a [`Mailer`]. Delivery is
//! best-effort: failures are logged, never retried.

mod dispatcher;
mod error;
mod mailer;

pub use dispatcher::NotificationDispatcher;
pub use error::NotifyError;
pub use mailer::{LogMailer, Mailer, SmtpMailer};
