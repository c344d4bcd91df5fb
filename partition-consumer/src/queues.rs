use std::collections::BTreeMap;

use tracing::debug;

use crate::client::ConsumerClient;
use crate::error::ConsumerError;
use crate::types::{Partition, TopicPartition};

/// One detached queue per assigned partition, keyed by topic and partition.
///
/// The table is always rebuilt from a full partition list. Queues must be
/// split off right after the client is assigned, otherwise messages for the
/// partition are delivered on the main queue instead.
pub struct PartitionQueueTable<Q> {
    queues: BTreeMap<Partition, Q>,
}

impl<Q> Default for PartitionQueueTable<Q> {
    fn default() -> Self {
        Self {
            queues: BTreeMap::new(),
        }
    }
}

impl<Q> PartitionQueueTable<Q> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns the client to exactly `partitions` and detaches one queue for each.
    ///
    /// On failure the table is left empty.
    pub fn rebuild<C>(&mut self, client: &C, partitions: &[TopicPartition]) -> Result<(), ConsumerError>
    where
        C: ConsumerClient<Queue = Q>,
    {
        self.queues.clear();

        // the client only detaches queues of partitions it is assigned, and
        // the offsets given here are where fetching starts
        client.assign(partitions)?;

        for tp in partitions {
            let Some(queue) = client.partition_queue(tp) else {
                self.queues.clear();
                return Err(ConsumerError::QueueUnavailable {
                    topic: tp.topic().to_string(),
                    partition: tp.partition_number(),
                });
            };
            self.queues.insert(tp.partition().clone(), queue);
        }

        debug!(queues = self.queues.len(), "Partition queues rebuilt");
        Ok(())
    }

    pub fn clear(&mut self) {
        self.queues.clear();
    }

    pub fn get(&self, partition: &Partition) -> Option<&Q> {
        self.queues.get(partition)
    }

    pub fn partitions(&self) -> impl Iterator<Item = &Partition> {
        self.queues.keys()
    }

    pub fn len(&self) -> usize {
        self.queues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }
}
