use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pending units above which the queue reports itself as backlogged.
pub const BACKLOG_THRESHOLD: u64 = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueStats {
    pub queued_jobs: u64,
    pub processing_jobs: u64,
    pub completed_jobs: u64,
    pub aborted_jobs: u64,
    pub queue_health: QueueHealth,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum QueueHealth {
    Healthy,
    Backlogged { pending: u64 },
    Stopped,
}

/// Lock-free counters shared between producers and the consumer task.
#[derive(Debug)]
pub(crate) struct QueueCounters {
    queued: AtomicU64,
    processing: AtomicU64,
    completed: AtomicU64,
    aborted: AtomicU64,
    started_at: DateTime<Utc>,
}

impl QueueCounters {
    pub(crate) fn new() -> Self {
        Self {
            queued: AtomicU64::new(0),
            processing: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            aborted: AtomicU64::new(0),
            started_at: Utc::now(),
        }
    }

    pub(crate) fn enqueued(&self) {
        self.queued.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn dequeued(&self) {
        self.queued.fetch_sub(1, Ordering::SeqCst);
        self.processing.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn finished(&self, aborted: bool) {
        self.processing.fetch_sub(1, Ordering::SeqCst);
        if aborted {
            self.aborted.fetch_add(1, Ordering::SeqCst);
        } else {
            self.completed.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub(crate) fn dropped(&self, pending: u64) {
        self.queued.fetch_sub(pending, Ordering::SeqCst);
        self.aborted.fetch_add(pending, Ordering::SeqCst);
    }

    pub(crate) fn snapshot(&self, accepting: bool) -> QueueStats {
        let queued_jobs = self.queued.load(Ordering::SeqCst);
        let queue_health = if !accepting {
            QueueHealth::Stopped
        } else if queued_jobs > BACKLOG_THRESHOLD {
            QueueHealth::Backlogged { pending: queued_jobs }
        } else {
            QueueHealth::Healthy
        };

        QueueStats {
            queued_jobs,
            processing_jobs: self.processing.load(Ordering::SeqCst),
            completed_jobs: self.completed.load(Ordering::SeqCst),
            aborted_jobs: self.aborted.load(Ordering::SeqCst),
            queue_health,
            started_at: self.started_at,
        }
    }
}
