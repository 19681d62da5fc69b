use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BookingQueueError {
    #[error("Queue is shut down and no longer accepts work")]
    QueueClosed,

    #[error("Unit of work {job_id} was aborted before producing a result")]
    UnitAborted { job_id: u64 },

    #[error("Gave up waiting for unit of work {job_id} after {timeout_ms} ms")]
    WorkerTimeout { job_id: u64, timeout_ms: u64 },

    #[error("Processing error: {0}")]
    ProcessingError(String),
}
