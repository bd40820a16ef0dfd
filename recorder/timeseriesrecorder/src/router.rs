use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use rumqttc::{AsyncClient, Event, EventLoop, Incoming, MqttOptions, QoS};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use sensorwire::{channel::sensor_from_topic, parse_inbound, Channel, ParseError};
use timeseriesdb::{RecordId, SensorDocument, StoreError, TimeSeriesStore};

use crate::config::RecorderConfig;

#[derive(thiserror::Error, Debug)]
pub enum RecordError {
    #[error("unparsable payload: {0}")]
    Parse(#[from] ParseError),

    #[error("store write failed: {0}")]
    Store(#[from] StoreError),
}

/// Normalize one inbound message and append it to the partition named
/// by the topic suffix. The payload body never decides the partition.
pub async fn record_message(
    store: &dyn TimeSeriesStore,
    topic: &str,
    payload: &[u8],
    received_at: DateTime<Utc>,
) -> Result<RecordId, RecordError> {
    let record = parse_inbound(payload, received_at)?;
    let sensor = sensor_from_topic(topic);

    let shown = record
        .value
        .map(|v| v.to_string())
        .unwrap_or_else(|| "-".to_string());
    let unit = record.unit.clone().unwrap_or_default();
    let id = store
        .insert(
            sensor,
            SensorDocument {
                timestamp: record.timestamp,
                value: record.value,
                unit: record.unit,
                raw: record.raw,
            },
        )
        .await?;

    info!("{sensor}: {shown} {unit} -> store ({id})");
    Ok(id)
}

/// Subscribing side of the bus: resubscribes on every ConnAck, hands
/// each publish to the persistence sink, drops what it cannot parse.
pub struct SubscriptionRouter {
    client: AsyncClient,
    eventloop: EventLoop,
    store: Arc<dyn TimeSeriesStore>,
    topic_prefix: String,
    cancel: CancellationToken,
}

impl SubscriptionRouter {
    pub fn connect(
        cfg: &RecorderConfig,
        store: Arc<dyn TimeSeriesStore>,
        cancel: CancellationToken,
    ) -> Self {
        let mut opts = MqttOptions::new(&cfg.client_id, &cfg.mqtt_host, cfg.mqtt_port);
        opts.set_keep_alive(cfg.keep_alive);

        let (client, eventloop) = AsyncClient::new(opts, 50);

        Self {
            client,
            eventloop,
            store,
            topic_prefix: cfg.topic_prefix.clone(),
            cancel,
        }
    }

    /// Receive-dispatch loop. Messages are handled one at a time, in
    /// line; backpressure lives in the bus client's own buffering.
    pub async fn run(&mut self) -> Result<()> {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("router shutdown requested");
                    break;
                }
                ev = self.eventloop.poll() => {
                    match ev {
                        Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                            info!("connected to MQTT broker");
                            self.subscribe_all().await;
                        }
                        Ok(Event::Incoming(Incoming::Publish(p))) => {
                            match record_message(
                                self.store.as_ref(),
                                &p.topic,
                                &p.payload,
                                Utc::now(),
                            )
                            .await
                            {
                                Ok(_) => {}
                                // Lost data point; keep receiving.
                                Err(e) => warn!("message on '{}' dropped: {e}", p.topic),
                            }
                        }
                        Ok(_) => {}
                        Err(e) => {
                            warn!("MQTT poll error: {e} (retrying)");
                            tokio::time::sleep(Duration::from_secs(1)).await;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    async fn subscribe_all(&self) {
        for ch in Channel::ALL {
            let topic = ch.subscribe_topic(&self.topic_prefix);
            match self.client.subscribe(&topic, QoS::AtLeastOnce).await {
                Ok(()) => info!("subscribed to topic: {topic}"),
                Err(e) => warn!("subscribe failed for '{topic}': {e}"),
            }
        }
    }

    pub async fn disconnect(&self) -> Result<()> {
        self.client.disconnect().await?;
        Ok(())
    }
}
