//! Consume loop for one RabbitMQ connection

use futures::{Stream, StreamExt};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{ConnectionState, DispatchError, JobDispatcher};
use crate::config::Config;
use crate::handlers::HandlerRegistry;
use crate::messaging::{MessageBroker, MessagingError, RabbitMqBroker};
use crate::observability::Metrics;

/// Connect, consume until `shutdown` resolves or the stream ends, then drain
///
/// Deliveries are handled one at a time. Once `shutdown` fires the job in
/// flight is settled, the consumer is cancelled and the connection closed.
/// Every transition is published on `state`.
pub async fn run<F>(
    config: &Config,
    registry: Arc<HandlerRegistry>,
    metrics: Arc<Metrics>,
    state: watch::Sender<ConnectionState>,
    shutdown: F,
) -> Result<(), DispatchError>
where
    F: Future<Output = ()>,
{
    state.send_replace(ConnectionState::Connecting);

    let broker = match RabbitMqBroker::connect(&config.broker, config.topology.clone()).await {
        Ok(broker) => broker,
        Err(err) => {
            error!(error = %err, "Could not connect to RabbitMQ");
            state.send_replace(ConnectionState::Closed);
            return Err(err.into());
        }
    };

    let consumer_tag = format!("{}-{}", config.broker.connection_name, Uuid::new_v4());
    let consumer = match broker.consume(&consumer_tag).await {
        Ok(consumer) => consumer,
        Err(err) => {
            error!(error = %err, "Could not start consuming");
            if let Err(close_err) = broker.close().await {
                warn!(error = %close_err, "Failed to close RabbitMQ connection");
            }
            state.send_replace(ConnectionState::Closed);
            return Err(err.into());
        }
    };

    info!(
        queue = %config.topology.jobs_queue,
        consumer_tag = %consumer_tag,
        handlers = registry.len(),
        "Dispatcher ready, waiting for jobs"
    );

    let deliveries = consumer.map(|delivery| {
        delivery.map(|delivery| (delivery.delivery_tag, delivery.data))
    });
    let dispatcher = JobDispatcher::new(registry, broker, metrics);
    let outcome = process_deliveries(&dispatcher, deliveries, &state, shutdown).await;

    let broker = dispatcher.into_broker();
    if let Err(err) = broker.cancel(&consumer_tag).await {
        warn!(error = %err, "Failed to cancel consumer");
    }
    if let Err(err) = broker.close().await {
        warn!(error = %err, "Failed to close RabbitMQ connection");
    }

    state.send_replace(ConnectionState::Closed);
    info!("Dispatcher stopped");

    outcome
}

/// Settle `(delivery_tag, body)` pairs one at a time until `shutdown`
/// resolves or the stream ends
///
/// Publishes `ready` on entry and `draining` on exit. `shutdown` is only
/// polled between deliveries, so a delivery in flight is always settled.
pub async fn process_deliveries<B, S, E, F>(
    dispatcher: &JobDispatcher<B>,
    deliveries: S,
    state: &watch::Sender<ConnectionState>,
    shutdown: F,
) -> Result<(), DispatchError>
where
    B: MessageBroker,
    S: Stream<Item = Result<(u64, Vec<u8>), E>>,
    E: fmt::Display,
    F: Future<Output = ()>,
{
    state.send_replace(ConnectionState::Ready);
    tokio::pin!(deliveries);
    tokio::pin!(shutdown);

    let outcome = loop {
        tokio::select! {
            biased;

            _ = &mut shutdown => {
                info!("Shutdown requested, draining dispatcher");
                break Ok(());
            }

            next = deliveries.next() => match next {
                Some(Ok((delivery_tag, body))) => {
                    if let Err(err) = dispatcher.handle_delivery(delivery_tag, &body).await {
                        error!(
                            delivery_tag,
                            error = %err,
                            "Could not settle delivery, stopping dispatcher"
                        );
                        break Err(err);
                    }
                }
                Some(Err(err)) => {
                    error!(error = %err, "Consumer stream failed");
                    break Err(DispatchError::Broker(MessagingError::Consume(
                        err.to_string(),
                    )));
                }
                None => {
                    warn!("Consumer stream ended");
                    break Ok(());
                }
            },
        }
    };

    state.send_replace(ConnectionState::Draining);
    outcome
}
