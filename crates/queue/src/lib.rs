pub mod consumer;
pub mod error;
pub mod memory;
pub mod sqs;

pub use consumer::{QueueConsumer, QueueHealth, QueueMessage, QueueProducer};
pub use error::QueueError;
pub use memory::MemoryQueue;
pub use sqs::SqsQueue;
