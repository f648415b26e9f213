//! The notification gateway.

use crate::notification::{ForegroundDelivery, InboundNotification};
use crate::platform::{ForegroundListener, PushPlatform, Subscription, UrlOpener};
use crate::PushResult;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Intercepts foreground deliveries and exposes the pending notification.
///
/// Holds at most one notification, latest-wins: a newer delivery replaces an
/// unread one, since the UI shows at most one banner.
pub struct NotificationGateway {
    inner: Arc<GatewayInner>,
}

struct GatewayInner {
    current: watch::Sender<Option<InboundNotification>>,
    opener: Arc<dyn UrlOpener>,
}

impl ForegroundListener for GatewayInner {
    fn on_foreground_will_display(&self, delivery: &ForegroundDelivery) {
        // Suppress the native banner before anything else; suppression is
        // unconditional.
        delivery.prevent_default();

        let notification = delivery.notification().clone();
        debug!(
            notification_id = %notification.notification_id,
            "Intercepted foreground notification"
        );
        self.current.send_replace(Some(notification));
    }
}

impl NotificationGateway {
    /// Create a gateway that opens deep links through the given opener.
    pub fn new(opener: Arc<dyn UrlOpener>) -> Self {
        let (current, _) = watch::channel(None);
        Self {
            inner: Arc::new(GatewayInner { current, opener }),
        }
    }

    /// Register with the platform's foreground delivery stream.
    ///
    /// The returned guard unregisters on drop; hold it for the lifetime of
    /// the authenticated UI.
    pub fn attach(&self, platform: Arc<dyn PushPlatform>) -> Subscription {
        let id = platform.add_foreground_listener(self.inner.clone());
        Subscription::new(platform, id)
    }

    /// The pending notification, if any.
    pub fn current(&self) -> Option<InboundNotification> {
        self.inner.current.borrow().clone()
    }

    /// Subscribe to pending-notification changes.
    pub fn watch(&self) -> watch::Receiver<Option<InboundNotification>> {
        self.inner.current.subscribe()
    }

    /// Clear the pending notification. No side effect beyond hiding the
    /// banner.
    pub fn dismiss(&self) {
        self.inner.current.send_replace(None);
    }

    /// Act on the pending notification (user tapped the banner).
    ///
    /// Opens the deep link through the platform opener and dismisses. A
    /// notification without a link is left in place, matching a banner tap
    /// that has nowhere to go. If opening fails the banner also stays, and
    /// the error is surfaced.
    pub fn activate(&self) -> PushResult<()> {
        let Some(notification) = self.current() else {
            return Ok(());
        };
        let Some(url) = notification.launch_url.as_deref() else {
            return Ok(());
        };

        if let Err(e) = self.inner.opener.open_url(url) {
            warn!(url, error = %e, "Failed to open notification link");
            return Err(e);
        }
        self.dismiss();
        Ok(())
    }
}
