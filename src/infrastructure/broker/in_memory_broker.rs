use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use uuid::Uuid;

use crate::application::ports::{BrokerChannel, BrokerError, Delivery};
use crate::domain::TaskMessage;

struct QueuedTask {
    task: TaskMessage,
    sequence: u64,
    visible_at: Instant,
    receipt: Option<Uuid>,
    delivery_count: u32,
}

#[derive(Default)]
struct Queue {
    messages: HashMap<Uuid, QueuedTask>,
    next_sequence: u64,
}

impl Queue {
    /// Earliest visible message, FIFO among equals.
    fn next_visible(&self, now: Instant) -> Option<Uuid> {
        self.messages
            .iter()
            .filter(|(_, queued)| queued.visible_at <= now)
            .min_by_key(|(_, queued)| (queued.visible_at, queued.sequence))
            .map(|(id, _)| *id)
    }

    fn next_wakeup(&self) -> Option<Instant> {
        self.messages.values().map(|queued| queued.visible_at).min()
    }
}

/// Process-local broker with invisibility windows and delayed publish.
///
/// A claimed message stays hidden for the visibility timeout; if it is
/// neither acknowledged nor released in that window it becomes consumable
/// again, and the next claim invalidates the earlier receipt.
pub struct InMemoryBroker {
    queue: Mutex<Queue>,
    notify: Notify,
    visibility_timeout: Duration,
}

impl InMemoryBroker {
    pub fn new(visibility_timeout: Duration) -> Self {
        Self {
            queue: Mutex::new(Queue::default()),
            notify: Notify::new(),
            visibility_timeout,
        }
    }

    /// Messages not yet acknowledged, visible or not.
    pub async fn len(&self) -> usize {
        self.queue.lock().await.messages.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn try_claim(&self) -> Result<Delivery, Option<Instant>> {
        let mut queue = self.queue.lock().await;
        let now = Instant::now();

        let Some(message_id) = queue.next_visible(now) else {
            return Err(queue.next_wakeup());
        };
        let Some(queued) = queue.messages.get_mut(&message_id) else {
            return Err(None);
        };

        let receipt = Uuid::new_v4();
        queued.receipt = Some(receipt);
        queued.visible_at = now + self.visibility_timeout;
        queued.delivery_count += 1;

        Ok(Delivery {
            message_id,
            receipt,
            delivery_count: queued.delivery_count,
            task: queued.task.clone(),
        })
    }
}

#[async_trait]
impl BrokerChannel for InMemoryBroker {
    async fn publish(&self, task: &TaskMessage, delay: Duration) -> Result<(), BrokerError> {
        let mut queue = self.queue.lock().await;
        let sequence = queue.next_sequence;
        queue.next_sequence += 1;
        queue.messages.insert(
            Uuid::new_v4(),
            QueuedTask {
                task: task.clone(),
                sequence,
                visible_at: Instant::now() + delay,
                receipt: None,
                delivery_count: 0,
            },
        );
        drop(queue);

        self.notify.notify_waiters();
        Ok(())
    }

    async fn consume(&self) -> Result<Delivery, BrokerError> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match self.try_claim().await {
                Ok(delivery) => return Ok(delivery),
                Err(Some(wake_at)) => {
                    tokio::select! {
                        _ = notified => {}
                        _ = tokio::time::sleep_until(wake_at) => {}
                    }
                }
                Err(None) => notified.await,
            }
        }
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), BrokerError> {
        let mut queue = self.queue.lock().await;
        let holds_receipt = queue
            .messages
            .get(&delivery.message_id)
            .is_some_and(|queued| queued.receipt == Some(delivery.receipt));
        if !holds_receipt {
            return Err(BrokerError::UnknownReceipt(delivery.message_id));
        }
        queue.messages.remove(&delivery.message_id);
        Ok(())
    }

    async fn nack(&self, delivery: &Delivery, delay: Duration) -> Result<(), BrokerError> {
        let mut queue = self.queue.lock().await;
        match queue.messages.get_mut(&delivery.message_id) {
            Some(queued) if queued.receipt == Some(delivery.receipt) => {
                queued.receipt = None;
                queued.visible_at = Instant::now() + delay;
            }
            _ => return Err(BrokerError::UnknownReceipt(delivery.message_id)),
        }
        drop(queue);

        self.notify.notify_waiters();
        Ok(())
    }

    async fn ping(&self) -> Result<(), BrokerError> {
        Ok(())
    }
}
