// Shared fixtures for the appointment-cell integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::broadcast::Receiver;
use uuid::Uuid;

use appointment_cell::{
    LiveEvent, LiveNotificationService, SchedulingComponents, SchedulingService, TimeRange,
};
use appointment_cell::InMemoryStore;
use booking_queue_cell::SerialWorkQueue;
use cache_cell::{CacheManager, InMemoryCacheStore};
use shared_config::AppConfig;
use shared_models::auth::AuthContext;

pub struct Harness {
    pub scheduling: Arc<SchedulingService>,
    pub store: Arc<InMemoryStore>,
    pub cache: Arc<CacheManager>,
    pub live: Arc<LiveNotificationService>,
    pub queue: Arc<SerialWorkQueue>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(&AppConfig::default())
    }

    pub fn with_config(config: &AppConfig) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let cache = Arc::new(CacheManager::new(Arc::new(InMemoryCacheStore::new())));
        Self::assemble(store, cache, config)
    }

    pub fn with_cache(cache: Arc<CacheManager>) -> Self {
        Self::assemble(Arc::new(InMemoryStore::new()), cache, &AppConfig::default())
    }

    fn assemble(store: Arc<InMemoryStore>, cache: Arc<CacheManager>, config: &AppConfig) -> Self {
        let live = Arc::new(LiveNotificationService::new());
        let queue = Arc::new(SerialWorkQueue::start());
        let components = SchedulingComponents::from_store(store.clone(), cache.clone(), live.clone());
        let scheduling = Arc::new(SchedulingService::new(components, queue.clone(), config));

        Self {
            scheduling,
            store,
            cache,
            live,
            queue,
        }
    }
}

pub fn doctor() -> AuthContext {
    AuthContext::doctor(Uuid::new_v4())
}

pub fn patient() -> AuthContext {
    AuthContext::patient(Uuid::new_v4())
}

pub fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
}

/// `range("09:00", "09:30")` on 2025-03-01.
pub fn range(start: &str, end: &str) -> TimeRange {
    range_on(day(), start, end)
}

pub fn range_on(date: NaiveDate, start: &str, end: &str) -> TimeRange {
    TimeRange::new(
        date,
        format!("{}:00", start).parse().unwrap(),
        format!("{}:00", end).parse().unwrap(),
    )
}

/// Everything delivered to a live channel so far.
pub fn drain(receiver: &mut Receiver<String>) -> Vec<LiveEvent> {
    let mut events = Vec::new();
    while let Ok(raw) = receiver.try_recv() {
        events.push(serde_json::from_str(&raw).unwrap());
    }
    events
}

pub fn names(events: &[LiveEvent]) -> Vec<&str> {
    events.iter().map(|e| e.event.as_str()).collect()
}
