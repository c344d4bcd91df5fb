use std::fmt;

use rdkafka::error::KafkaResult;
use rdkafka::topic_partition_list::TopicPartitionListElem;
use rdkafka::{Offset, TopicPartitionList};

/// Raw offset librdkafka uses for `Offset::Invalid`
pub const OFFSET_INVALID: i64 = -1001;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Partition {
    topic: String,
    partition_number: i32,
}

impl Partition {
    pub fn new(topic: impl Into<String>, partition_number: i32) -> Self {
        Self {
            topic: topic.into(),
            partition_number,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn partition_number(&self) -> i32 {
        self.partition_number
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.topic, self.partition_number)
    }
}

/// A partition together with an offset in librdkafka's raw convention:
/// non-negative values are absolute offsets, negative values are the
/// beginning / end / stored / invalid sentinels.
///
/// Ordered by topic, then partition, then offset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TopicPartition {
    partition: Partition,
    offset: i64,
}

impl TopicPartition {
    pub fn new(topic: impl Into<String>, partition_number: i32, offset: i64) -> Self {
        Self {
            partition: Partition::new(topic, partition_number),
            offset,
        }
    }

    pub fn with_offset(topic: impl Into<String>, partition_number: i32, offset: Offset) -> Self {
        Self::new(
            topic,
            partition_number,
            offset.to_raw().unwrap_or(OFFSET_INVALID),
        )
    }

    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    pub fn topic(&self) -> &str {
        self.partition.topic()
    }

    pub fn partition_number(&self) -> i32 {
        self.partition.partition_number()
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    pub fn kafka_offset(&self) -> Offset {
        Offset::from_raw(self.offset)
    }
}

impl fmt::Display for TopicPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.partition, self.offset)
    }
}

impl From<TopicPartitionListElem<'_>> for TopicPartition {
    fn from(elem: TopicPartitionListElem<'_>) -> Self {
        Self::with_offset(elem.topic(), elem.partition(), elem.offset())
    }
}

pub fn from_partition_list(list: &TopicPartitionList) -> Vec<TopicPartition> {
    list.elements()
        .into_iter()
        .map(TopicPartition::from)
        .collect()
}

pub fn to_partition_list(partitions: &[TopicPartition]) -> KafkaResult<TopicPartitionList> {
    let mut list = TopicPartitionList::with_capacity(partitions.len());
    for tp in partitions {
        list.add_partition_offset(tp.topic(), tp.partition_number(), tp.kafka_offset())?;
    }
    Ok(list)
}

/// Number of partitions of one subscribed topic, as reported by broker metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicPartitionCount {
    pub topic: String,
    pub partition_count: usize,
}

impl TopicPartitionCount {
    pub fn new(topic: impl Into<String>, partition_count: usize) -> Self {
        Self {
            topic: topic.into(),
            partition_count,
        }
    }
}

/// Why the last consumption attempt produced no message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StalledStatus {
    #[default]
    NotStalled,
    NoMessagesReturned,
    ConsumerStopped,
    ErrorsReturned,
}

impl StalledStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StalledStatus::NotStalled => "not_stalled",
            StalledStatus::NoMessagesReturned => "no_messages_returned",
            StalledStatus::ConsumerStopped => "consumer_stopped",
            StalledStatus::ErrorsReturned => "errors_returned",
        }
    }
}
