//! # RabbitMQ broker
//!
//! [`MessageBroker`] implementation over AMQP 0.9.1 using `lapin`.
//!
//! ## Topology
//!
//! | Object | Kind | Durable |
//! |--------|------|---------|
//! | jobs exchange | direct | yes |
//! | jobs queue (bound under the jobs routing key) | queue | yes |
//! | results exchange | direct | yes |
//!
//! No results queue is declared; binding one is up to whoever consumes results.
//!
//! The channel runs with prefetch 1, so the broker never hands this consumer
//! a second job before the first is acked or rejected. It is also in confirm
//! mode: a result counts as published only once the broker acks it.

use async_trait::async_trait;
use lapin::options::{
    BasicAckOptions, BasicCancelOptions, BasicConsumeOptions, BasicNackOptions,
    BasicPublishOptions, BasicQosOptions, ConfirmSelectOptions, ExchangeDeclareOptions,
    QueueBindOptions, QueueDeclareOptions,
};
use lapin::publisher_confirm::Confirmation;
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, Consumer, ExchangeKind};
use tracing::{debug, info};

use super::{JobResult, MessageBroker, MessagingError, Result};
use crate::config::{BrokerConfig, TopologyConfig};

/// One job in flight per consumer
pub const PREFETCH_COUNT: u16 = 1;

const PERSISTENT_DELIVERY: u8 = 2;
const CONTENT_TYPE_JSON: &str = "application/json";

/// RabbitMQ connection plus the single channel the dispatcher owns
#[derive(Debug)]
pub struct RabbitMqBroker {
    connection: Connection,
    channel: Channel,
    topology: TopologyConfig,
}

impl RabbitMqBroker {
    /// Connect, open a channel, declare the topology and set prefetch
    ///
    /// Any failure here is fatal to startup and is returned as-is.
    pub async fn connect(broker: &BrokerConfig, topology: TopologyConfig) -> Result<Self> {
        info!(url = %broker.redacted_url(), "Connecting to RabbitMQ");

        let connection = Connection::connect(
            &broker.url,
            ConnectionProperties::default()
                .with_connection_name(broker.connection_name.clone().into()),
        )
        .await
        .map_err(|e| MessagingError::Connection(format!("RabbitMQ connection failed: {}", e)))?;

        let channel = connection.create_channel().await.map_err(|e| {
            MessagingError::Connection(format!("RabbitMQ channel creation failed: {}", e))
        })?;

        let broker = Self {
            connection,
            channel,
            topology,
        };
        broker.declare_topology().await?;

        broker
            .channel
            .basic_qos(PREFETCH_COUNT, BasicQosOptions::default())
            .await
            .map_err(|e| MessagingError::Topology(format!("Failed to set QoS: {}", e)))?;

        broker
            .channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(|e| {
                MessagingError::Topology(format!("Failed to enable publisher confirms: {}", e))
            })?;

        info!(
            jobs_queue = %broker.topology.jobs_queue,
            results_exchange = %broker.topology.results_exchange,
            prefetch = PREFETCH_COUNT,
            "RabbitMQ connection established"
        );

        Ok(broker)
    }

    async fn declare_topology(&self) -> Result<()> {
        let topology = &self.topology;

        for exchange in [&topology.jobs_exchange, &topology.results_exchange] {
            self.channel
                .exchange_declare(
                    exchange,
                    ExchangeKind::Direct,
                    ExchangeDeclareOptions {
                        durable: true,
                        ..Default::default()
                    },
                    FieldTable::default(),
                )
                .await
                .map_err(|e| {
                    MessagingError::Topology(format!(
                        "Exchange '{}' declaration failed: {}",
                        exchange, e
                    ))
                })?;
        }

        self.channel
            .queue_declare(
                &topology.jobs_queue,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| {
                MessagingError::Topology(format!(
                    "Queue '{}' declaration failed: {}",
                    topology.jobs_queue, e
                ))
            })?;

        self.channel
            .queue_bind(
                &topology.jobs_queue,
                &topology.jobs_exchange,
                &topology.jobs_routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| {
                MessagingError::Topology(format!(
                    "Binding '{}' to '{}' failed: {}",
                    topology.jobs_queue, topology.jobs_exchange, e
                ))
            })?;

        debug!("Topology declared");
        Ok(())
    }

    /// Start consuming the jobs queue with manual acknowledgement
    pub async fn consume(&self, consumer_tag: &str) -> Result<Consumer> {
        self.channel
            .basic_consume(
                &self.topology.jobs_queue,
                consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| MessagingError::Consume(format!("basic_consume failed: {}", e)))
    }

    /// Stop receiving new deliveries for `consumer_tag`
    pub async fn cancel(&self, consumer_tag: &str) -> Result<()> {
        self.channel
            .basic_cancel(consumer_tag, BasicCancelOptions::default())
            .await
            .map_err(|e| MessagingError::Consume(format!("basic_cancel failed: {}", e)))
    }

    /// Close channel, then connection
    pub async fn close(self) -> Result<()> {
        self.channel
            .close(200, "dispatcher shutdown")
            .await
            .map_err(|e| MessagingError::Connection(format!("channel close failed: {}", e)))?;
        self.connection
            .close(200, "dispatcher shutdown")
            .await
            .map_err(|e| MessagingError::Connection(format!("connection close failed: {}", e)))?;
        info!("RabbitMQ connection closed");
        Ok(())
    }
}

/// Only a broker ack means the result was taken
fn confirmed(confirmation: Confirmation) -> Result<()> {
    match confirmation {
        Confirmation::Ack(_) => Ok(()),
        Confirmation::Nack(_) => Err(MessagingError::PublishFailed(
            "broker nacked the result".to_string(),
        )),
        Confirmation::NotRequested => Err(MessagingError::PublishFailed(
            "channel is not in confirm mode".to_string(),
        )),
    }
}

#[async_trait]
impl MessageBroker for RabbitMqBroker {
    async fn publish_result(&self, result: &JobResult) -> Result<()> {
        let body = result.to_vec()?;

        let confirm = self
            .channel
            .basic_publish(
                &self.topology.results_exchange,
                &self.topology.results_routing_key,
                BasicPublishOptions::default(),
                &body,
                BasicProperties::default()
                    .with_delivery_mode(PERSISTENT_DELIVERY)
                    .with_content_type(CONTENT_TYPE_JSON.into()),
            )
            .await
            .map_err(|e| MessagingError::PublishFailed(format!("Publish failed: {}", e)))?;

        let confirmation = confirm.await.map_err(|e| {
            MessagingError::PublishFailed(format!("Publish confirmation failed: {}", e))
        })?;
        confirmed(confirmation)?;

        info!(job_id = %result.job_id, status = %result.status, "Result published");
        Ok(())
    }

    async fn ack(&self, delivery_tag: u64) -> Result<()> {
        self.channel
            .basic_ack(delivery_tag, BasicAckOptions::default())
            .await
            .map_err(|e| MessagingError::Ack {
                delivery_tag,
                reason: e.to_string(),
            })
    }

    async fn reject(&self, delivery_tag: u64) -> Result<()> {
        self.channel
            .basic_nack(
                delivery_tag,
                BasicNackOptions {
                    requeue: false,
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| MessagingError::Reject {
                delivery_tag,
                reason: e.to_string(),
            })
    }
}
