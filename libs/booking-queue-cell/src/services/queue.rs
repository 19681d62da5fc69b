use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::models::QueueCounters;
use crate::services::consumer::run_consumer;
use crate::{BookingQueueError, QueueStats};

pub(crate) type Job = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

pub(crate) enum QueueMessage {
    Work { job_id: u64, job: Job },
    Shutdown,
}

/// Single-consumer FIFO executor.
///
/// Any number of producers may submit units of work; exactly one consumer
/// task runs them, one at a time, in submission order. A unit's result (or
/// failure) is delivered back through the future returned by
/// [`SerialWorkQueue::submit`]. The queue is unbounded and applies no
/// backpressure. Once a unit has been dequeued it always runs to completion,
/// even if its submitter stopped waiting.
pub struct SerialWorkQueue {
    sender: mpsc::UnboundedSender<QueueMessage>,
    counters: Arc<QueueCounters>,
    next_job_id: AtomicU64,
    accepting: AtomicBool,
    consumer: Mutex<Option<JoinHandle<()>>>,
}

impl SerialWorkQueue {
    /// Spawns the consumer task on the current tokio runtime.
    pub fn start() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let counters = Arc::new(QueueCounters::new());

        let consumer = tokio::spawn(run_consumer(receiver, Arc::clone(&counters)));
        info!("Serial work queue started");

        Self {
            sender,
            counters,
            next_job_id: AtomicU64::new(1),
            accepting: AtomicBool::new(true),
            consumer: Mutex::new(Some(consumer)),
        }
    }

    /// Enqueues `work` and waits for its output.
    pub async fn submit<F, Fut, T>(&self, work: F) -> Result<T, BookingQueueError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (job_id, receiver) = self.dispatch(work)?;
        receiver
            .await
            .map_err(|_| BookingQueueError::UnitAborted { job_id })
    }

    /// Like [`SerialWorkQueue::submit`], but stops waiting after `limit`.
    /// The unit itself is not cancelled and still runs when its turn comes.
    pub async fn submit_with_timeout<F, Fut, T>(&self, work: F, limit: Duration) -> Result<T, BookingQueueError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (job_id, receiver) = self.dispatch(work)?;

        match tokio::time::timeout(limit, receiver).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(_)) => Err(BookingQueueError::UnitAborted { job_id }),
            Err(_) => {
                warn!("Stopped waiting for unit of work {} after {:?}", job_id, limit);
                Err(BookingQueueError::WorkerTimeout {
                    job_id,
                    timeout_ms: limit.as_millis() as u64,
                })
            }
        }
    }

    pub fn stats(&self) -> QueueStats {
        self.counters.snapshot(self.is_accepting())
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }

    /// Stops accepting work, lets everything already submitted run, then
    /// waits for the consumer task to exit. Calling it twice is harmless.
    pub async fn shutdown(&self) -> Result<(), BookingQueueError> {
        if !self.accepting.swap(false, Ordering::SeqCst) {
            debug!("Serial work queue already shut down");
            return Ok(());
        }

        info!("Draining serial work queue before shutdown");
        let _ = self.sender.send(QueueMessage::Shutdown);

        if let Some(handle) = self.consumer.lock().await.take() {
            handle
                .await
                .map_err(|e| BookingQueueError::ProcessingError(format!("Consumer task failed: {}", e)))?;
        }

        info!("Serial work queue stopped");
        Ok(())
    }

    // Submission order is fixed here, synchronously, before the caller awaits anything.
    fn dispatch<F, Fut, T>(&self, work: F) -> Result<(u64, oneshot::Receiver<T>), BookingQueueError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        if !self.is_accepting() {
            return Err(BookingQueueError::QueueClosed);
        }

        let job_id = self.next_job_id.fetch_add(1, Ordering::SeqCst);
        let (result_tx, result_rx) = oneshot::channel();

        let job: Job = Box::new(move || {
            Box::pin(async move {
                let output = work().await;
                if result_tx.send(output).is_err() {
                    debug!("Submitter of unit of work {} stopped waiting", job_id);
                }
            })
        });

        self.counters.enqueued();
        if self.sender.send(QueueMessage::Work { job_id, job }).is_err() {
            self.counters.dropped(1);
            return Err(BookingQueueError::QueueClosed);
        }

        debug!("Unit of work {} enqueued", job_id);
        Ok((job_id, result_rx))
    }
}
