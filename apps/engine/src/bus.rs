use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::warn;
use uuid::Uuid;

const CHANNEL_CAPACITY: usize = 64;

/// The closed set of events tabs broadcast to each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    CandidateCreated,
    CandidateUpdated,
    InterviewStarted,
    InterviewProgress,
    InterviewCompleted,
    ChatMessage,
    TimerUpdate,
    QuestionAnswered,
}

/// Wire envelope carried on the shared channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub data: Value,
    /// Epoch milliseconds at broadcast time.
    pub timestamp: i64,
    #[serde(rename = "originId")]
    pub origin_id: String,
}

/// Delivery metadata handed to listeners alongside the payload.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub timestamp: i64,
    pub origin_id: String,
}

/// A listener returning an error is logged; it never blocks delivery to the
/// listeners after it.
pub type Listener = Arc<dyn Fn(&Value, &Delivery) -> anyhow::Result<()> + Send + Sync>;

type ListenerMap = HashMap<MessageType, Vec<Listener>>;

/// The process-wide channel all tabs of one profile share. Cheap to clone;
/// create exactly one per process and attach a [`TabBus`] per tab.
#[derive(Clone)]
pub struct BusChannel {
    tx: broadcast::Sender<Envelope>,
}

impl BusChannel {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        BusChannel { tx }
    }
}

impl Default for BusChannel {
    fn default() -> Self {
        BusChannel::new()
    }
}

/// One tab's endpoint on the bus: a stable random origin id, per-type
/// listener registration with set semantics, and self-delivery filtering.
/// Created at tab startup and torn down with [`TabBus::close`] on unload.
pub struct TabBus {
    origin_id: String,
    tx: broadcast::Sender<Envelope>,
    listeners: Arc<Mutex<ListenerMap>>,
    dispatch: JoinHandle<()>,
}

impl TabBus {
    pub fn attach(channel: &BusChannel) -> Self {
        let origin_id = format!("tab_{}_{}", Utc::now().timestamp_millis(), Uuid::new_v4());
        let listeners: Arc<Mutex<ListenerMap>> = Arc::new(Mutex::new(HashMap::new()));

        let mut rx = channel.tx.subscribe();
        let own_id = origin_id.clone();
        let dispatch_listeners = Arc::clone(&listeners);
        let dispatch = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(envelope) => {
                        // No self-delivery.
                        if envelope.origin_id == own_id {
                            continue;
                        }
                        deliver(&dispatch_listeners, &envelope);
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("bus receiver lagged, {skipped} messages dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                }
            }
        });

        TabBus {
            origin_id,
            tx: channel.tx.clone(),
            listeners,
            dispatch,
        }
    }

    pub fn origin_id(&self) -> &str {
        &self.origin_id
    }

    /// Publishes to every other tab. Delivery is asynchronous; a bus with no
    /// other tabs attached simply drops the message.
    pub fn broadcast(&self, message_type: MessageType, data: Value) {
        let envelope = Envelope {
            message_type,
            data,
            timestamp: Utc::now().timestamp_millis(),
            origin_id: self.origin_id.clone(),
        };
        let _ = self.tx.send(envelope);
    }

    /// Registers a listener for one message type. Set semantics: registering
    /// the same `Arc` twice has no additional effect.
    pub fn subscribe(&self, message_type: MessageType, listener: Listener) {
        let mut map = self.lock_listeners();
        let entry = map.entry(message_type).or_default();
        if !entry.iter().any(|l| Arc::ptr_eq(l, &listener)) {
            entry.push(listener);
        }
    }

    pub fn unsubscribe(&self, message_type: MessageType, listener: &Listener) {
        let mut map = self.lock_listeners();
        if let Some(entry) = map.get_mut(&message_type) {
            entry.retain(|l| !Arc::ptr_eq(l, listener));
        }
    }

    /// Tears down the dispatch task. Dropping the bus does the same.
    pub fn close(self) {
        self.dispatch.abort();
        self.lock_listeners().clear();
    }

    fn lock_listeners(&self) -> MutexGuard<'_, ListenerMap> {
        self.listeners.lock().expect("bus listener map poisoned")
    }
}

impl Drop for TabBus {
    fn drop(&mut self) {
        self.dispatch.abort();
    }
}

fn deliver(listeners: &Mutex<ListenerMap>, envelope: &Envelope) {
    let delivery = Delivery {
        timestamp: envelope.timestamp,
        origin_id: envelope.origin_id.clone(),
    };
    let registered: Vec<Listener> = {
        let map = listeners.lock().expect("bus listener map poisoned");
        map.get(&envelope.message_type).cloned().unwrap_or_default()
    };
    for listener in registered {
        if let Err(e) = listener(&envelope.data, &delivery) {
            warn!("bus listener failed for {:?}: {e}", envelope.message_type);
        }
    }
}
