use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::TaskMessage;

/// A task handed to one consumer, hidden from others until acknowledged or
/// until its invisibility window lapses.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub message_id: Uuid,
    pub receipt: Uuid,
    /// How many times the broker has handed this message out, this one included.
    pub delivery_count: u32,
    pub task: TaskMessage,
}

/// Durable at-least-once task queue.
#[async_trait]
pub trait BrokerChannel: Send + Sync {
    /// Enqueues the task; it becomes consumable after `delay`.
    async fn publish(&self, task: &TaskMessage, delay: Duration) -> Result<(), BrokerError>;

    /// Waits until a task is visible and claims it.
    async fn consume(&self) -> Result<Delivery, BrokerError>;

    /// Removes the delivered task permanently.
    async fn ack(&self, delivery: &Delivery) -> Result<(), BrokerError>;

    /// Releases the delivered task for redelivery after `delay`.
    async fn nack(&self, delivery: &Delivery, delay: Duration) -> Result<(), BrokerError>;

    async fn ping(&self) -> Result<(), BrokerError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BrokerError {
    #[error("broker unavailable: {0}")]
    Unavailable(String),
    #[error("malformed task payload: {0}")]
    Malformed(String),
    #[error("unknown or expired receipt for message {0}")]
    UnknownReceipt(Uuid),
}
