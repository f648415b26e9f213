//! Seams over the platform push service and URL opener.

use crate::notification::ForegroundDelivery;
use crate::PushResult;
use std::sync::Arc;
use uuid::Uuid;

/// Identifier of a registered foreground listener.
pub type ListenerId = Uuid;

/// A handler for foreground delivery events.
pub trait ForegroundListener: Send + Sync {
    /// Called synchronously for each foreground delivery, before the
    /// platform renders anything.
    fn on_foreground_will_display(&self, delivery: &ForegroundDelivery);
}

/// The platform push-notification service.
pub trait PushPlatform: Send + Sync {
    /// Register a listener for the foreground delivery stream.
    fn add_foreground_listener(&self, listener: Arc<dyn ForegroundListener>) -> ListenerId;

    /// Remove a previously registered listener. Unknown ids are ignored.
    fn remove_foreground_listener(&self, id: ListenerId);
}

/// The platform's URL-opening facility, used for deep links.
pub trait UrlOpener: Send + Sync {
    fn open_url(&self, url: &str) -> PushResult<()>;
}

/// An active foreground subscription.
///
/// Dropping the guard unregisters the listener, so a torn-down UI never
/// receives further deliveries.
pub struct Subscription {
    platform: Arc<dyn PushPlatform>,
    id: ListenerId,
}

impl Subscription {
    pub(crate) fn new(platform: Arc<dyn PushPlatform>, id: ListenerId) -> Self {
        Self { platform, id }
    }

    /// The listener id this subscription holds.
    pub fn id(&self) -> ListenerId {
        self.id
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.platform.remove_foreground_listener(self.id);
    }
}
