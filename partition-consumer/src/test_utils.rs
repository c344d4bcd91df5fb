use std::collections::{HashMap, HashSet, VecDeque};
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rdkafka::error::{KafkaError, KafkaResult, RDKafkaErrorCode};
use rdkafka::message::{OwnedMessage, Timestamp};

use crate::client::{ClientEvent, ConsumerClient, PartitionQueue, RebalanceEvent};
use crate::types::{Partition, TopicPartition, TopicPartitionCount};

/// Builds a message the way the client hands it out after detaching it
pub fn message(topic: &str, partition: i32, offset: i64, payload: &str) -> OwnedMessage {
    OwnedMessage::new(
        Some(payload.as_bytes().to_vec()),
        None,
        topic.to_string(),
        Timestamp::NotAvailable,
        partition,
        offset,
        None,
    )
}

/// A message-level fault as carried by a polled entry
pub fn consume_error() -> KafkaError {
    KafkaError::MessageConsumption(RDKafkaErrorCode::BrokerTransportFailure)
}

/// Scripted stand-in for the Kafka consumer handle.
///
/// Clones share state, so a test can keep one handle to script and inspect
/// the client after moving another into the consumer.
#[derive(Clone, Default)]
pub struct FakeClient {
    state: Arc<FakeState>,
}

#[derive(Default)]
pub struct FakeState {
    main_queue: Mutex<VecDeque<ClientEvent>>,
    batches: Mutex<HashMap<Partition, VecDeque<Vec<KafkaResult<OwnedMessage>>>>>,
    commit_results: Mutex<VecDeque<KafkaResult<()>>>,
    metadata: Mutex<Option<KafkaResult<Vec<TopicPartitionCount>>>>,
    assign_calls: Mutex<Vec<Vec<TopicPartition>>>,
    detached: Mutex<Vec<TopicPartition>>,
    refused_queues: Mutex<HashSet<Partition>>,
    commits: Mutex<Vec<Vec<TopicPartition>>>,
    // flipped while a partition queue poll is in flight
    stop_during_queue_poll: Mutex<Option<Arc<AtomicBool>>>,
    assign_failure_pending: AtomicBool,
    subscribed: AtomicBool,
    poll_calls: AtomicUsize,
    queue_polls: AtomicUsize,
    unsubscribe_calls: AtomicUsize,
}

impl Deref for FakeClient {
    type Target = FakeState;

    fn deref(&self) -> &FakeState {
        &self.state
    }
}

impl FakeClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_event(&self, event: ClientEvent) {
        self.main_queue.lock().unwrap().push_back(event);
    }

    pub fn push_assign(&self, partitions: Vec<TopicPartition>) {
        self.push_event(ClientEvent::Rebalance(RebalanceEvent::Assign(partitions)));
    }

    pub fn push_revoke(&self, partitions: Vec<TopicPartition>) {
        self.push_event(ClientEvent::Rebalance(RebalanceEvent::Revoke(partitions)));
    }

    pub fn push_batch(&self, partition: Partition, batch: Vec<KafkaResult<OwnedMessage>>) {
        self.batches
            .lock()
            .unwrap()
            .entry(partition)
            .or_default()
            .push_back(batch);
    }

    pub fn push_commit_result(&self, result: KafkaResult<()>) {
        self.commit_results.lock().unwrap().push_back(result);
    }

    pub fn set_metadata(&self, result: KafkaResult<Vec<TopicPartitionCount>>) {
        *self.metadata.lock().unwrap() = Some(result);
    }

    pub fn fail_next_assign(&self) {
        self.assign_failure_pending.store(true, Ordering::SeqCst);
    }

    pub fn refuse_queue(&self, partition: Partition) {
        self.refused_queues.lock().unwrap().insert(partition);
    }

    pub fn stop_during_queue_poll(&self, flag: Arc<AtomicBool>) {
        *self.stop_during_queue_poll.lock().unwrap() = Some(flag);
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscribed.load(Ordering::SeqCst)
    }

    pub fn poll_calls(&self) -> usize {
        self.poll_calls.load(Ordering::SeqCst)
    }

    pub fn queue_polls(&self) -> usize {
        self.queue_polls.load(Ordering::SeqCst)
    }

    pub fn unsubscribe_calls(&self) -> usize {
        self.unsubscribe_calls.load(Ordering::SeqCst)
    }

    pub fn assign_calls(&self) -> Vec<Vec<TopicPartition>> {
        self.assign_calls.lock().unwrap().clone()
    }

    pub fn detached_queues(&self) -> Vec<TopicPartition> {
        self.detached.lock().unwrap().clone()
    }

    pub fn commits(&self) -> Vec<Vec<TopicPartition>> {
        self.commits.lock().unwrap().clone()
    }
}

pub struct FakeQueue {
    partition: Partition,
    state: Arc<FakeState>,
}

impl PartitionQueue for FakeQueue {
    fn consume_batch(
        &self,
        max_messages: usize,
        _timeout: Duration,
    ) -> Vec<KafkaResult<OwnedMessage>> {
        self.state.queue_polls.fetch_add(1, Ordering::SeqCst);

        if let Some(flag) = self.state.stop_during_queue_poll.lock().unwrap().as_ref() {
            flag.store(true, Ordering::SeqCst);
        }

        let mut batches = self.state.batches.lock().unwrap();
        let Some(pending) = batches.get_mut(&self.partition) else {
            return Vec::new();
        };
        let Some(mut batch) = pending.pop_front() else {
            return Vec::new();
        };

        if batch.len() > max_messages {
            let rest = batch.split_off(max_messages);
            pending.push_front(rest);
        }
        batch
    }
}

impl ConsumerClient for FakeClient {
    type Queue = FakeQueue;

    fn subscribe(&self, _topics: &[String]) -> KafkaResult<()> {
        self.subscribed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn unsubscribe(&self) {
        self.unsubscribe_calls.fetch_add(1, Ordering::SeqCst);
        self.subscribed.store(false, Ordering::SeqCst);
    }

    fn has_subscription(&self) -> KafkaResult<bool> {
        Ok(self.is_subscribed())
    }

    fn poll(&self, _timeout: Duration) -> Option<ClientEvent> {
        self.poll_calls.fetch_add(1, Ordering::SeqCst);
        self.main_queue.lock().unwrap().pop_front()
    }

    fn assign(&self, partitions: &[TopicPartition]) -> KafkaResult<()> {
        if self.assign_failure_pending.swap(false, Ordering::SeqCst) {
            return Err(KafkaError::SetPartitionOffset(RDKafkaErrorCode::UnknownPartition));
        }
        self.assign_calls.lock().unwrap().push(partitions.to_vec());
        Ok(())
    }

    fn partition_queue(&self, partition: &TopicPartition) -> Option<FakeQueue> {
        if self
            .refused_queues
            .lock()
            .unwrap()
            .contains(partition.partition())
        {
            return None;
        }
        self.detached.lock().unwrap().push(partition.clone());
        Some(FakeQueue {
            partition: partition.partition().clone(),
            state: self.state.clone(),
        })
    }

    fn commit(&self, partitions: &[TopicPartition]) -> KafkaResult<()> {
        self.commits.lock().unwrap().push(partitions.to_vec());
        self.commit_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(()))
    }

    fn topic_partition_counts(&self) -> KafkaResult<Vec<TopicPartitionCount>> {
        self.metadata
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    fn positions(&self) -> KafkaResult<Vec<TopicPartition>> {
        Ok(self.detached_queues())
    }
}
