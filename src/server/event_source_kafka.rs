use crate::server::{Delivery, EventSource, OffsetTracker};
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::{ClientConfig, Message, Offset, TopicPartitionList};
use std::sync::Mutex;

pub struct KafkaSourceConfig<'a> {
    pub bootstrap_server: &'a str,
    pub client_id: &'a str,
    pub group_id: &'a str,
    pub topic: &'a str,
}

/// Consumer-group member reading one topic with manual offset commits.
///
/// Kafka commits are cumulative, so an acknowledgement is only committed
/// once every earlier message on its partition is acknowledged as well.
pub struct KafkaEventSource {
    consumer: StreamConsumer,
    offsets: Mutex<OffsetTracker>,
}

impl KafkaEventSource {
    pub async fn connect(config: &KafkaSourceConfig<'_>) -> anyhow::Result<Self> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", config.bootstrap_server)
            .set("client.id", config.client_id)
            .set("group.id", config.group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .create()?;

        Self::ensure_topics(config.bootstrap_server, &[config.topic]).await?;
        consumer.subscribe(&[config.topic])?;

        tracing::info!(topic = config.topic, group = config.group_id, "kafka source subscribed");
        Ok(Self {
            consumer,
            offsets: Mutex::new(OffsetTracker::new()),
        })
    }

    async fn ensure_topics(bootstrap: &str, topics: &[&str]) -> anyhow::Result<()> {
        let admin: AdminClient<_> = ClientConfig::new()
            .set("bootstrap.servers", bootstrap)
            .create()?;

        let new_topics: Vec<_> = topics
            .iter()
            .map(|t| NewTopic::new(t, 1, TopicReplication::Fixed(1)))
            .collect();

        // per-topic "already exists" results are fine
        let _ = admin
            .create_topics(&new_topics, &AdminOptions::new())
            .await?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl EventSource for KafkaEventSource {
    async fn next(&self) -> Option<anyhow::Result<Delivery>> {
        let delivery = match self.consumer.recv().await {
            Ok(m) => Delivery {
                topic: m.topic().to_owned(),
                partition: m.partition(),
                offset: m.offset(),
                payload: m.payload().unwrap_or(&[]).to_vec(),
            },
            Err(e) => return Some(Err(e.into())),
        };

        match self.offsets.lock() {
            Ok(mut offsets) => {
                offsets.delivered(&delivery.topic, delivery.partition, delivery.offset)
            }
            Err(e) => return Some(Err(anyhow::anyhow!("offset tracker poisoned: {e}"))),
        }
        Some(Ok(delivery))
    }

    async fn ack(&self, delivery: &Delivery) -> anyhow::Result<()> {
        let position = self
            .offsets
            .lock()
            .map_err(|e| anyhow::anyhow!("offset tracker poisoned: {e}"))?
            .acked(&delivery.topic, delivery.partition, delivery.offset);

        let Some(position) = position else {
            tracing::debug!(
                offset = delivery.offset,
                "commit held back by an earlier unacknowledged event"
            );
            return Ok(());
        };

        let mut tpl = TopicPartitionList::new();
        tpl.add_partition_offset(&delivery.topic, delivery.partition, Offset::Offset(position))?;
        self.consumer.commit(&tpl, CommitMode::Async)?;
        Ok(())
    }
}
