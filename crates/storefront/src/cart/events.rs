//! Cart change notifications.
//!
//! Every tab a visitor has open shares one cart. When any of them changes
//! it, a [`CartChanged`] event goes out on a process-wide broadcast channel
//! tagged with the visitor's key; each open page listens on
//! `GET /cart/events` and keeps only the events for its own visitor.

use tokio::sync::broadcast;

/// Capacity of the broadcast buffer. Slow listeners skip missed events and
/// pick up the next one, which always carries the current count.
const CHANNEL_CAPACITY: usize = 256;

/// A cart was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartChanged {
    /// Key of the visitor whose cart changed.
    pub visitor: String,
    /// Item count after the change.
    pub count: u32,
}

/// Broadcast hub for cart changes.
#[derive(Debug, Clone)]
pub struct CartEvents {
    sender: broadcast::Sender<CartChanged>,
}

impl Default for CartEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl CartEvents {
    /// Create an empty hub.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Announce a change. Having no listeners is not an error.
    pub fn publish(&self, event: CartChanged) {
        let _ = self.sender.send(event);
    }

    /// Listen for changes of every visitor.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CartChanged> {
        self.sender.subscribe()
    }

    /// Handle that publishes changes for one visitor.
    #[must_use]
    pub fn notifier(&self, visitor: impl Into<String>) -> CartNotifier {
        CartNotifier {
            events: self.clone(),
            visitor: visitor.into(),
        }
    }
}

/// Publishes changes for a single visitor.
#[derive(Debug, Clone)]
pub struct CartNotifier {
    events: CartEvents,
    visitor: String,
}

impl CartNotifier {
    pub(super) fn notify(&self, count: u32) {
        self.events.publish(CartChanged {
            visitor: self.visitor.clone(),
            count,
        });
    }
}
