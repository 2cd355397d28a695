//! # Event publishing onto the tasks exchange.
//!
//! [`EventPublisher`] JSON-encodes a body, acquires a pooled channel,
//! declares the topic exchange if absent (idempotent), and publishes with a
//! per-message priority. Publish is fire-and-forget from the caller's
//! perspective: publisher confirms are not awaited, and failures propagate
//! from the channel acquisition or the publish call itself.

use lapin::options::{BasicPublishOptions, ExchangeDeclareOptions};
use lapin::types::FieldTable;
use lapin::{BasicProperties, ExchangeKind};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::broker::{BrokerConnector, ROUTE_TASK, ROUTE_TASK_CANCELED, TASKS_EXCHANGE};
use crate::error::BrokerError;
use crate::task::{Priority, TaskCancelled, TaskCreated};

/// Publishes task events with per-message priority.
pub struct EventPublisher {
    connector: Arc<BrokerConnector>,
}

impl EventPublisher {
    pub fn new(connector: Arc<BrokerConnector>) -> Self {
        Self { connector }
    }

    /// Publishes `body` as JSON under `routing_key` with the given message
    /// priority, declaring the topic exchange if it does not exist yet.
    pub async fn publish<B: Serialize>(
        &self,
        exchange: &str,
        routing_key: &str,
        priority: u8,
        body: &B,
    ) -> Result<(), BrokerError> {
        let payload = serde_json::to_vec(body)?;
        let channel = self.connector.channel().await?;

        channel
            .exchange_declare(
                exchange,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;

        channel
            .basic_publish(
                exchange,
                routing_key,
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default().with_priority(priority),
            )
            .await?;

        debug!(%exchange, %routing_key, priority, "event published");
        Ok(())
    }

    /// Publishes a "task created" event with the priority's broker weight.
    pub async fn task_created(&self, id: i64, priority: Priority) -> Result<(), BrokerError> {
        self.publish(
            TASKS_EXCHANGE,
            ROUTE_TASK,
            priority.weight(),
            &TaskCreated { id, priority },
        )
        .await
    }

    /// Publishes a "task cancelled" event.
    ///
    /// The cancellation queue is not priority-enabled, so the message
    /// priority is inert; the highest weight is used for uniformity.
    pub async fn task_cancelled(&self, id: i64) -> Result<(), BrokerError> {
        self.publish(
            TASKS_EXCHANGE,
            ROUTE_TASK_CANCELED,
            Priority::High.weight(),
            &TaskCancelled { id },
        )
        .await
    }
}
