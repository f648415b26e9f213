//! Notification payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A push notification delivered while the app is in the foreground.
///
/// Transient: held only until dismissed or acted upon, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundNotification {
    /// Platform-assigned notification id.
    pub notification_id: String,
    /// Banner title.
    pub title: String,
    /// Banner body text.
    pub body: String,
    /// Deep-link target opened when the user taps the banner.
    #[serde(default)]
    pub launch_url: Option<String>,
    /// When the client intercepted the delivery.
    pub received_at: DateTime<Utc>,
}

impl InboundNotification {
    /// Create a notification stamped with the current time.
    pub fn new(
        notification_id: impl Into<String>,
        title: impl Into<String>,
        body: impl Into<String>,
        launch_url: Option<String>,
    ) -> Self {
        Self {
            notification_id: notification_id.into(),
            title: title.into(),
            body: body.into(),
            launch_url,
            received_at: Utc::now(),
        }
    }
}

/// A foreground delivery event from the platform.
///
/// The platform inspects [`is_handled`](Self::is_handled) after the
/// listeners return: a handled delivery must not produce the native banner.
#[derive(Debug, Clone)]
pub struct ForegroundDelivery {
    notification: InboundNotification,
    handled: Arc<AtomicBool>,
}

impl ForegroundDelivery {
    pub fn new(notification: InboundNotification) -> Self {
        Self {
            notification,
            handled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The delivered notification.
    pub fn notification(&self) -> &InboundNotification {
        &self.notification
    }

    /// Suppress the platform's default presentation.
    ///
    /// Synchronous: callable (and called) inside the event handler before
    /// any other work.
    pub fn prevent_default(&self) {
        self.handled.store(true, Ordering::SeqCst);
    }

    /// Whether default presentation was suppressed.
    pub fn is_handled(&self) -> bool {
        self.handled.load(Ordering::SeqCst)
    }
}
