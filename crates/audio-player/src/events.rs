//! Event delivery to subscribers.
//!
//! The runtime only needs something implementing [`EventSink`]. [`EventBus`] is the in-process
//! default: a bounded broadcast channel, so each subscriber sees events in emission order.

use tokio::sync::broadcast;

pub use audio_player_types::{AUDIO_SAMPLE_UPDATE, PLAYBACK_STATUS_UPDATE, PlayerEvent};

/// Default broadcast capacity for [`EventBus`].
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Destination for named player events.
///
/// Called from the media thread, engine callback threads and the reporter task; implementations
/// must return quickly.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: PlayerEvent);
}

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<PlayerEvent>,
}

impl EventBus {
    /// Create a new event bus with a bounded broadcast channel.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to the event stream. Dropping the receiver detaches it.
    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl EventSink for EventBus {
    fn emit(&self, event: PlayerEvent) {
        // No subscribers is not an error; the event is simply dropped.
        let _ = self.sender.send(event);
    }
}
