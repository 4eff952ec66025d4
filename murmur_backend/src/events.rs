use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Events published to connected real-time consumers. Delivery is
/// best-effort; nothing in the write path waits on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventPayload {
    NewPost(NewPostEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPostEvent {
    pub post_id: String,
    pub user_id: String,
    pub title: Option<String>,
}

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventPayload>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Fire-and-forget publish. A send error only means nobody is currently
    /// subscribed.
    pub fn emit(&self, payload: EventPayload) {
        if self.sender.send(payload).is_err() {
            tracing::debug!("no event subscribers connected, dropping event");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventPayload> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
