//! # Queue consumption and routing-key handler dispatch.
//!
//! [`QueueConsumer`] declares durable queues bound to the topic exchange,
//! then runs one consume loop per queue. Each delivery is decoded to JSON
//! and routed by its routing key through a handler registry.
//!
//! ### Rules
//! - Every delivery is **acked**, regardless of handler outcome: redelivery
//!   of a failed task event would not make it succeed, and poison messages
//!   must not wedge the queue.
//! - A malformed body or an unregistered routing key is logged and dropped.
//! - Registering a handler for an already-registered key replaces it.
//! - `stop_consuming()` stops the loops; in-flight handler calls finish.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::StreamExt;
use lapin::message::Delivery;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicQosOptions, ExchangeDeclareOptions,
    QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::{AMQPValue, FieldTable};
use lapin::ExchangeKind;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::broker::BrokerConnector;
use crate::error::BrokerError;

/// A registered delivery handler: receives the decoded JSON body.
pub type Handler = Arc<dyn Fn(Value) -> BoxFuture<'static, ()> + Send + Sync>;

/// Wraps an async closure into a [`Handler`].
pub fn handler<F, Fut>(f: F) -> Handler
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move |value| Box::pin(f(value)))
}

/// Routing key → handler table.
#[derive(Default)]
pub(crate) struct HandlerRegistry {
    handlers: RwLock<HashMap<String, Handler>>,
}

impl HandlerRegistry {
    /// Registers `handler` for `routing_key`, replacing any previous one.
    async fn register(&self, routing_key: &str, handler: Handler) {
        let mut handlers = self.handlers.write().await;
        if handlers.insert(routing_key.to_string(), handler).is_some() {
            warn!(%routing_key, "handler replaced for routing key");
        }
    }

    /// Decodes `payload` and invokes the handler for `routing_key`.
    async fn dispatch(&self, routing_key: &str, payload: &[u8]) {
        let value: Value = match serde_json::from_slice(payload) {
            Ok(v) => v,
            Err(e) => {
                error!(%routing_key, error = %e, "dropping malformed message body");
                return;
            }
        };

        let handler = self.handlers.read().await.get(routing_key).cloned();
        match handler {
            Some(h) => h(value).await,
            None => warn!(%routing_key, "no handler registered for routing key, dropping"),
        }
    }
}

/// Consumes durable queues and routes deliveries to registered handlers.
pub struct QueueConsumer {
    connector: Arc<BrokerConnector>,
    registry: HandlerRegistry,
    stop: CancellationToken,
    loops: Mutex<Vec<JoinHandle<()>>>,
}

impl QueueConsumer {
    pub fn new(connector: Arc<BrokerConnector>) -> Arc<Self> {
        Arc::new(Self {
            connector,
            registry: HandlerRegistry::default(),
            stop: CancellationToken::new(),
            loops: Mutex::new(Vec::new()),
        })
    }

    /// Declares `queue` and binds it to the topic `exchange` under its own
    /// name as the binding key. Idempotent for matching arguments.
    ///
    /// `durable` applies to both the exchange and the queue; a transient
    /// queue is also auto-deleting. `max_priority` enables per-message
    /// priority on the queue by setting its `x-max-priority` argument;
    /// declaration arguments must then match on every future declaration of
    /// the same queue.
    pub async fn declare_queue(
        &self,
        queue: &str,
        exchange: &str,
        durable: bool,
        max_priority: Option<u8>,
    ) -> Result<(), BrokerError> {
        let channel = self.connector.channel().await?;

        channel
            .exchange_declare(
                exchange,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;

        let mut arguments = FieldTable::default();
        if let Some(max) = max_priority {
            arguments.insert("x-max-priority".into(), AMQPValue::LongInt(max as i32));
        }

        channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable,
                    auto_delete: !durable,
                    ..Default::default()
                },
                arguments,
            )
            .await?;

        channel
            .queue_bind(
                queue,
                exchange,
                queue,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await?;

        debug!(%queue, %exchange, durable, ?max_priority, "queue declared and bound");
        Ok(())
    }

    /// Registers `handler` for deliveries whose routing key is `routing_key`.
    pub async fn set_callback(&self, routing_key: &str, handler: Handler) {
        self.registry.register(routing_key, handler).await;
    }

    /// Runs the consume loop for `queue` until [`stop_consuming`] is called
    /// or the delivery stream ends.
    ///
    /// [`stop_consuming`]: QueueConsumer::stop_consuming
    pub async fn consume(self: Arc<Self>, queue: String, prefetch: u16) -> Result<(), BrokerError> {
        let channel = self.connector.channel().await?;
        channel
            .basic_qos(prefetch, BasicQosOptions::default())
            .await?;

        let mut deliveries = channel
            .basic_consume(
                &queue,
                &format!("{queue}-consumer"),
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;

        info!(%queue, prefetch, "consuming queue");
        loop {
            tokio::select! {
                _ = self.stop.cancelled() => break,
                delivery = deliveries.next() => match delivery {
                    Some(Ok(delivery)) => self.handle_delivery(&queue, delivery).await,
                    Some(Err(e)) => {
                        error!(%queue, error = %e, "delivery stream error");
                    }
                    None => {
                        warn!(%queue, "delivery stream ended");
                        break;
                    }
                },
            }
        }
        info!(%queue, "consume loop stopped");
        Ok(())
    }

    /// Spawns one consume loop per queue name.
    pub async fn consume_multiple(
        self: &Arc<Self>,
        queues: &[&str],
        prefetch: u16,
    ) -> Result<(), BrokerError> {
        let mut loops = self.loops.lock().await;
        for queue in queues {
            let consumer = Arc::clone(self);
            let queue = queue.to_string();
            loops.push(tokio::spawn(async move {
                if let Err(e) = consumer.consume(queue.clone(), prefetch).await {
                    error!(%queue, error = %e, label = e.as_label(), "consume loop failed");
                }
            }));
        }
        Ok(())
    }

    /// Stops every consume loop and waits for them to exit. Idempotent.
    ///
    /// Handlers already running are not interrupted; only intake stops.
    pub async fn stop_consuming(&self) {
        self.stop.cancel();
        let loops = std::mem::take(&mut *self.loops.lock().await);
        for handle in loops {
            let _ = handle.await;
        }
        info!("consumer stopped");
    }

    async fn handle_delivery(&self, queue: &str, delivery: Delivery) {
        let routing_key = delivery.routing_key.as_str().to_string();
        debug!(%queue, %routing_key, "delivery received");

        self.registry.dispatch(&routing_key, &delivery.data).await;

        // Ack always: handler outcome never returns a message to the queue.
        if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
            error!(%queue, %routing_key, error = %e, "failed to ack delivery");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_registry_dispatches_to_registered_handler() {
        let registry = HandlerRegistry::default();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        registry
            .register(
                "task",
                handler(move |value| {
                    let counter = Arc::clone(&counter);
                    async move {
                        assert_eq!(value["id"], 7);
                        counter.fetch_add(1, Ordering::SeqCst);
                    }
                }),
            )
            .await;

        registry.dispatch("task", br#"{"id": 7}"#).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_registry_drops_unknown_routing_key() {
        let registry = HandlerRegistry::default();
        // No handler registered: must not panic, message is dropped.
        registry.dispatch("unknown", br#"{"id": 1}"#).await;
    }

    #[tokio::test]
    async fn test_registry_drops_malformed_body() {
        let registry = HandlerRegistry::default();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        registry
            .register(
                "task",
                handler(move |_| {
                    let counter = Arc::clone(&counter);
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                    }
                }),
            )
            .await;

        registry.dispatch("task", b"not json at all").await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_registering_twice_replaces_handler() {
        let registry = HandlerRegistry::default();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&first);
        registry
            .register(
                "task",
                handler(move |_| {
                    let counter = Arc::clone(&counter);
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                    }
                }),
            )
            .await;

        let counter = Arc::clone(&second);
        registry
            .register(
                "task",
                handler(move |_| {
                    let counter = Arc::clone(&counter);
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                    }
                }),
            )
            .await;

        registry.dispatch("task", b"{}").await;
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }
}
