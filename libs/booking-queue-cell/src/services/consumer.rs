use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::models::QueueCounters;
use crate::services::queue::QueueMessage;

/// The queue's only consumer. Runs each unit to completion before taking the next.
pub(crate) async fn run_consumer(mut receiver: mpsc::UnboundedReceiver<QueueMessage>, counters: Arc<QueueCounters>) {
    debug!("Queue consumer started");

    while let Some(message) = receiver.recv().await {
        match message {
            QueueMessage::Work { job_id, job } => {
                counters.dequeued();
                debug!("Running unit of work {}", job_id);

                // A panicking unit drops its result sender, which the submitter
                // observes as UnitAborted. The consumer keeps going.
                let outcome = AssertUnwindSafe(job()).catch_unwind().await;
                match outcome {
                    Ok(()) => counters.finished(false),
                    Err(_) => {
                        error!("Unit of work {} panicked", job_id);
                        counters.finished(true);
                    }
                }
            }
            QueueMessage::Shutdown => {
                info!("Queue consumer received shutdown marker");
                break;
            }
        }
    }

    receiver.close();
    let mut dropped = 0;
    while let Ok(message) = receiver.try_recv() {
        if let QueueMessage::Work { job_id, .. } = message {
            warn!("Dropping unit of work {} submitted during shutdown", job_id);
            dropped += 1;
        }
    }
    if dropped > 0 {
        counters.dropped(dropped);
    }

    debug!("Queue consumer stopped");
}
