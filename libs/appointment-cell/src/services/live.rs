// libs/appointment-cell/src/services/live.rs
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, error};
use uuid::Uuid;

use crate::services::events::{EventSink, SchedulingEvent};

pub type LiveSender = broadcast::Sender<String>;
pub type LiveReceiver = broadcast::Receiver<String>;

const USER_CHANNEL_CAPACITY: usize = 100;
const GLOBAL_CHANNEL_CAPACITY: usize = 1000;

/// Wire shape of a pushed event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveEvent {
    pub event: String,
    pub payload: serde_json::Value,
    pub sent_at: DateTime<Utc>,
}

/// Per-user broadcast channels standing in for live client connections.
pub struct LiveNotificationService {
    channels: RwLock<HashMap<Uuid, LiveSender>>,
    global_sender: LiveSender,
}

impl Default for LiveNotificationService {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveNotificationService {
    pub fn new() -> Self {
        let (global_sender, _) = broadcast::channel(GLOBAL_CHANNEL_CAPACITY);

        Self {
            channels: RwLock::new(HashMap::new()),
            global_sender,
        }
    }

    /// Opens (or joins) the live channel of `user_id`.
    pub async fn subscribe(&self, user_id: Uuid) -> LiveReceiver {
        let mut channels = self.channels.write().await;
        let sender = channels.entry(user_id).or_insert_with(|| {
            debug!("Created live channel for user {}", user_id);
            broadcast::channel(USER_CHANNEL_CAPACITY).0
        });
        sender.subscribe()
    }

    /// Every event pushed to any user.
    pub fn subscribe_all(&self) -> LiveReceiver {
        self.global_sender.subscribe()
    }

    /// Drops the channel of `user_id` once its last receiver is gone.
    pub async fn release_channel(&self, user_id: Uuid) {
        let mut channels = self.channels.write().await;
        if channels
            .get(&user_id)
            .is_some_and(|sender| sender.receiver_count() == 0)
        {
            channels.remove(&user_id);
            debug!("Removed live channel for user {}", user_id);
        }
    }

    pub async fn connected_users(&self) -> Vec<Uuid> {
        let channels = self.channels.read().await;
        channels
            .iter()
            .filter(|(_, sender)| sender.receiver_count() > 0)
            .map(|(user_id, _)| *user_id)
            .collect()
    }
}

#[async_trait]
impl EventSink for LiveNotificationService {
    async fn push_to_user(&self, user_id: Uuid, event: SchedulingEvent) {
        let payload = match serde_json::to_value(&event) {
            Ok(payload) => payload,
            Err(e) => {
                error!("Failed to serialize {} event: {}", event.name(), e);
                return;
            }
        };

        let live_event = LiveEvent {
            event: event.name().to_string(),
            payload,
            sent_at: Utc::now(),
        };
        let message = match serde_json::to_string(&live_event) {
            Ok(message) => message,
            Err(e) => {
                error!("Failed to encode live event: {}", e);
                return;
            }
        };

        {
            let channels = self.channels.read().await;
            match channels.get(&user_id) {
                Some(sender) => {
                    if sender.send(message.clone()).is_err() {
                        debug!("User {} has no open live connection", user_id);
                    }
                }
                None => debug!("No live channel for user {}, dropping {}", user_id, live_event.event),
            }
        }

        // no global listener is fine
        let _ = self.global_sender.send(message);
    }
}
