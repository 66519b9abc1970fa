//! Lockout notifications
//!
//! Operators are told once when the geocode API enters its 24h lockout.

use chrono::{DateTime, Utc};
use tracing::warn;

/// Sink for operator notifications.
pub trait Notifier: Send + Sync {
    fn quota_lockout(&self, api: &str, until: Option<DateTime<Utc>>);
}

/// Notifier that writes to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn quota_lockout(&self, api: &str, until: Option<DateTime<Utc>>) {
        match until {
            Some(until) => warn!(
                "{} API quota exhausted, upstream calls suspended until {}",
                api,
                until.to_rfc3339()
            ),
            None => warn!("{} API quota exhausted, upstream calls suspended", api),
        }
    }
}
