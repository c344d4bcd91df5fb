use std::time::Duration;

use rdkafka::error::KafkaResult;
use rdkafka::message::OwnedMessage;

use crate::types::{TopicPartition, TopicPartitionCount};

/// Rebalance outcome reported by the client while polling its main queue
#[derive(Debug, Clone)]
pub enum RebalanceEvent {
    Assign(Vec<TopicPartition>),
    Revoke(Vec<TopicPartition>),
    Error(String),
}

/// One entry polled from the client's main queue.
///
/// Rebalances are returned from the poll instead of being delivered through
/// callbacks, so the consumer applies them synchronously before the poll
/// call that produced them returns.
#[derive(Debug)]
pub enum ClientEvent {
    Rebalance(RebalanceEvent),
    Message(KafkaResult<OwnedMessage>),
}

/// A single partition's queue, detached from the client's main queue
pub trait PartitionQueue {
    /// Pulls up to `max_messages` entries, waiting at most `timeout` in total.
    /// Returning fewer entries than requested is not an error.
    fn consume_batch(
        &self,
        max_messages: usize,
        timeout: Duration,
    ) -> Vec<KafkaResult<OwnedMessage>>;
}

/// The surface of the Kafka consumer handle used by [`crate::PartitionConsumer`]
pub trait ConsumerClient {
    type Queue: PartitionQueue;

    fn subscribe(&self, topics: &[String]) -> KafkaResult<()>;

    fn unsubscribe(&self);

    fn has_subscription(&self) -> KafkaResult<bool>;

    /// Polls the main queue, which carries rebalances and errors
    fn poll(&self, timeout: Duration) -> Option<ClientEvent>;

    /// Replaces the client's assignment with exactly `partitions`
    fn assign(&self, partitions: &[TopicPartition]) -> KafkaResult<()>;

    /// Detaches the queue of an assigned partition from the main queue.
    /// Returns `None` if the client does not know the partition.
    fn partition_queue(&self, partition: &TopicPartition) -> Option<Self::Queue>;

    /// Synchronously commits the given offsets
    fn commit(&self, partitions: &[TopicPartition]) -> KafkaResult<()>;

    /// Partition counts for every topic in the broker metadata
    fn topic_partition_counts(&self) -> KafkaResult<Vec<TopicPartitionCount>>;

    /// Current fetch positions of the assigned partitions
    fn positions(&self) -> KafkaResult<Vec<TopicPartition>>;
}
