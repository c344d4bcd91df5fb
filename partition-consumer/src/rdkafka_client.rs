use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rdkafka::consumer::base_consumer::PartitionQueue as NativePartitionQueue;
use rdkafka::consumer::{BaseConsumer, CommitMode, Consumer, ConsumerContext, Rebalance};
use rdkafka::error::KafkaResult;
use rdkafka::message::OwnedMessage;
use rdkafka::ClientContext;
use tracing::{error, info};

use crate::client::{ClientEvent, ConsumerClient, PartitionQueue, RebalanceEvent};
use crate::config::ConsumerConfig;
use crate::types::{from_partition_list, to_partition_list, TopicPartition, TopicPartitionCount};

/// Consumer context that queues rebalance outcomes for the next poll.
///
/// librdkafka runs the rebalance callback inside `BaseConsumer::poll`; the
/// outcome is recorded here and handed back by [`RdKafkaClient::poll`] right
/// after, so the consumer applies it on the polling thread.
#[derive(Default)]
pub struct RebalanceRecorder {
    pending: Mutex<VecDeque<RebalanceEvent>>,
}

impl RebalanceRecorder {
    fn record(&self, event: RebalanceEvent) {
        match self.pending.lock() {
            Ok(mut pending) => pending.push_back(event),
            Err(e) => error!(error = ?e, ?event, "Rebalance event lost, recorder poisoned"),
        }
    }

    fn next_event(&self) -> Option<RebalanceEvent> {
        self.pending.lock().ok()?.pop_front()
    }
}

impl ClientContext for RebalanceRecorder {}

impl ConsumerContext for RebalanceRecorder {
    fn pre_rebalance(&self, _base_consumer: &BaseConsumer<Self>, rebalance: &Rebalance) {
        match rebalance {
            Rebalance::Revoke(partitions) => {
                info!("Revoking {} partitions", partitions.count());
                self.record(RebalanceEvent::Revoke(from_partition_list(partitions)));
            }
            Rebalance::Error(e) => {
                self.record(RebalanceEvent::Error(e.to_string()));
            }
            Rebalance::Assign(_) => {}
        }
    }

    fn post_rebalance(&self, _base_consumer: &BaseConsumer<Self>, rebalance: &Rebalance) {
        if let Rebalance::Assign(partitions) = rebalance {
            info!("Assigned {} partitions", partitions.count());
            self.record(RebalanceEvent::Assign(from_partition_list(partitions)));
        }
    }
}

/// [`ConsumerClient`] backed by librdkafka
pub struct RdKafkaClient {
    consumer: Arc<BaseConsumer<RebalanceRecorder>>,
    metadata_timeout: Duration,
}

impl RdKafkaClient {
    pub fn new(consumer: BaseConsumer<RebalanceRecorder>, metadata_timeout: Duration) -> Self {
        Self {
            consumer: Arc::new(consumer),
            metadata_timeout,
        }
    }

    pub fn from_config(config: &ConsumerConfig) -> KafkaResult<Self> {
        let consumer: BaseConsumer<RebalanceRecorder> = config
            .to_client_config()
            .create_with_context(RebalanceRecorder::default())?;

        Ok(Self::new(consumer, config.metadata_timeout()))
    }
}

impl ConsumerClient for RdKafkaClient {
    type Queue = RdKafkaPartitionQueue;

    fn subscribe(&self, topics: &[String]) -> KafkaResult<()> {
        let topics: Vec<&str> = topics.iter().map(String::as_str).collect();
        self.consumer.subscribe(&topics)
    }

    fn unsubscribe(&self) {
        self.consumer.unsubscribe();
    }

    fn has_subscription(&self) -> KafkaResult<bool> {
        Ok(self.consumer.subscription()?.count() > 0)
    }

    fn poll(&self, timeout: Duration) -> Option<ClientEvent> {
        if let Some(event) = self.consumer.context().next_event() {
            return Some(ClientEvent::Rebalance(event));
        }

        match self.consumer.poll(timeout) {
            Some(result) => Some(ClientEvent::Message(result.map(|m| m.detach()))),
            None => self
                .consumer
                .context()
                .next_event()
                .map(ClientEvent::Rebalance),
        }
    }

    fn assign(&self, partitions: &[TopicPartition]) -> KafkaResult<()> {
        self.consumer.assign(&to_partition_list(partitions)?)
    }

    fn partition_queue(&self, partition: &TopicPartition) -> Option<RdKafkaPartitionQueue> {
        self.consumer
            .split_partition_queue(partition.topic(), partition.partition_number())
            .map(|queue| RdKafkaPartitionQueue { queue })
    }

    fn commit(&self, partitions: &[TopicPartition]) -> KafkaResult<()> {
        self.consumer
            .commit(&to_partition_list(partitions)?, CommitMode::Sync)
    }

    fn topic_partition_counts(&self) -> KafkaResult<Vec<TopicPartitionCount>> {
        let metadata = self.consumer.fetch_metadata(None, self.metadata_timeout)?;

        Ok(metadata
            .topics()
            .iter()
            .map(|topic| TopicPartitionCount::new(topic.name(), topic.partitions().len()))
            .collect())
    }

    fn positions(&self) -> KafkaResult<Vec<TopicPartition>> {
        Ok(from_partition_list(&self.consumer.position()?))
    }
}

pub struct RdKafkaPartitionQueue {
    queue: NativePartitionQueue<RebalanceRecorder>,
}

impl PartitionQueue for RdKafkaPartitionQueue {
    fn consume_batch(
        &self,
        max_messages: usize,
        timeout: Duration,
    ) -> Vec<KafkaResult<OwnedMessage>> {
        let deadline = Instant::now() + timeout;
        let mut batch = Vec::with_capacity(max_messages.min(1024));

        while batch.len() < max_messages {
            let remaining = deadline.saturating_duration_since(Instant::now());
            // the first poll always gets a chance, even with a zero timeout
            if remaining.is_zero() && !batch.is_empty() {
                break;
            }

            match self.queue.poll(remaining) {
                Some(Ok(message)) => batch.push(Ok(message.detach())),
                Some(Err(e)) => batch.push(Err(e)),
                None => break,
            }
        }

        batch
    }
}
