pub mod queue;
pub mod consumer;

pub use queue::*;
