use std::time::{Duration, Instant};

use metrics::counter;
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::message::{Message, OwnedMessage};
use tracing::{debug, error, info, info_span, trace, warn, Level, Span};

use crate::assignment::AssignmentTracker;
use crate::batch::MessageBatch;
use crate::client::{ClientEvent, ConsumerClient, PartitionQueue, RebalanceEvent};
use crate::config::ConsumerConfig;
use crate::error::ConsumerError;
use crate::metrics_consts::{
    KAFKA_COMMITS, KAFKA_COMMIT_FAILURES, KAFKA_CONSUMER_STALLS, KAFKA_MESSAGES_POLLED,
    KAFKA_QUEUE_REBUILD_FAILURES, KAFKA_REBALANCE_ERRORS, KAFKA_UNEXPECTED_MAIN_QUEUE_MESSAGES,
};
use crate::queues::PartitionQueueTable;
use crate::rdkafka_client::RdKafkaClient;
use crate::stop::StopSignal;
use crate::types::{StalledStatus, TopicPartition, TopicPartitionCount};

const EVENT_POLL_TIMEOUT: Duration = Duration::from_millis(50);
const EVENT_POLL_MAX_TRIES: usize = 5;
const COMMIT_MAX_ATTEMPTS: usize = 5;
const DRAIN_POLL_TIMEOUT: Duration = Duration::from_millis(100);
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Group consumer that reads one assigned partition at a time.
///
/// The broker drives the assignment: rebalances arrive on the main queue and
/// are applied while [`PartitionConsumer::poll_events`] runs. Each assignment
/// gets a fresh set of partition queues, and the owner is expected to push the
/// offsets it wants to resume from through [`PartitionConsumer::update_offsets`]
/// whenever [`PartitionConsumer::needs_offset_update`] is set.
///
/// The consumer is driven by a single worker. Offsets are committed manually,
/// so delivery is at-least-once.
pub struct PartitionConsumer<C: ConsumerClient> {
    client: C,
    span: Span,

    // batch configs - how many messages one partition poll may return
    // and how long it may block
    batch_size: usize,
    poll_timeout: Duration,

    // owned by whoever drives the consumer, only ever read here
    stop: Box<dyn StopSignal>,
    topics: Vec<String>,

    assignment: AssignmentTracker,
    queues: PartitionQueueTable<C::Queue>,
    batch: MessageBatch,
    stalled_status: StalledStatus,
    shut_down: bool,
}

impl PartitionConsumer<RdKafkaClient> {
    /// Builds a librdkafka-backed consumer subscribed to the configured topics
    pub fn from_config(
        config: &ConsumerConfig,
        stop: impl StopSignal + 'static,
    ) -> Result<Self, ConsumerError> {
        let client = RdKafkaClient::from_config(config)?;
        let span = info_span!(
            "partition_consumer",
            group = %config.kafka_consumer_group,
            topics = %config.kafka_consumer_topics,
        );

        Self::new(
            client,
            span,
            config.kafka_max_batch_size,
            config.poll_timeout(),
            stop,
            config.topics(),
        )
    }
}

impl<C: ConsumerClient> PartitionConsumer<C> {
    pub fn new(
        client: C,
        span: Span,
        batch_size: usize,
        poll_timeout: Duration,
        stop: impl StopSignal + 'static,
        topics: Vec<String>,
    ) -> Result<Self, ConsumerError> {
        {
            let _entered = span.enter();
            client.subscribe(&topics)?;
            info!(?topics, batch_size, "Subscribed to topics");
        }

        Ok(Self {
            client,
            span,
            batch_size,
            poll_timeout,
            stop: Box::new(stop),
            topics,
            assignment: AssignmentTracker::new(),
            queues: PartitionQueueTable::new(),
            batch: MessageBatch::new(),
            stalled_status: StalledStatus::NotStalled,
            shut_down: false,
        })
    }

    /// Gives the client a chance to run rebalances without consuming data.
    ///
    /// Polls the main queue a bounded number of times. Only a broken
    /// rebalance sequence is returned as an error, and it is fatal.
    pub fn poll_events(&mut self) -> Result<(), ConsumerError> {
        let _entered = self.span.clone().entered();

        for _ in 0..EVENT_POLL_MAX_TRIES {
            let Some(event) = self.client.poll(EVENT_POLL_TIMEOUT) else {
                return Ok(());
            };

            match event {
                ClientEvent::Rebalance(rebalance) => {
                    if let Err(e) = self.handle_rebalance(rebalance) {
                        error!(
                            error = ?e,
                            error_type = e.error_type(),
                            "Rebalance could not be applied"
                        );
                        return Err(e);
                    }
                }
                ClientEvent::Message(Err(e)) => {
                    error!(
                        code = ?e.rdkafka_error_code(),
                        error = ?e,
                        "Consumer received error while polling events"
                    );
                }
                ClientEvent::Message(Ok(message)) => {
                    // every partition queue is detached, data should never show up here
                    counter!(KAFKA_UNEXPECTED_MAIN_QUEUE_MESSAGES).increment(1);
                    error!(
                        topic = message.topic(),
                        partition = message.partition(),
                        offset = message.offset(),
                        "Consumer returned a message when it was not expected"
                    );
                    return Ok(());
                }
            }
        }

        Ok(())
    }

    /// The current assignment, or `None` while no assignment is held
    pub fn kafka_assignment(&self) -> Option<&[TopicPartition]> {
        self.assignment.assignment()
    }

    pub fn needs_offset_update(&self) -> bool {
        self.assignment.needs_offset_update()
    }

    pub fn stalled_status(&self) -> StalledStatus {
        self.stalled_status
    }

    pub fn is_stalled(&self) -> bool {
        self.stalled_status != StalledStatus::NotStalled
    }

    pub fn has_more_polled_messages(&self) -> bool {
        self.batch.has_remaining()
    }

    /// The message most recently returned by [`PartitionConsumer::consume`]
    pub fn last_message(&self) -> Option<&OwnedMessage> {
        self.batch.last_served()
    }

    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    /// Partition counts of the subscribed topics. Empty if metadata could not be fetched.
    pub fn partition_counts(&self) -> Vec<TopicPartitionCount> {
        let _entered = self.span.enter();

        match self.client.topic_partition_counts() {
            Ok(counts) => counts
                .into_iter()
                .filter(|count| self.topics.contains(&count.topic))
                .collect(),
            Err(e) => {
                warn!(error = ?e, "Failed to fetch topic metadata");
                Vec::new()
            }
        }
    }

    /// Rebuilds every partition queue so consumption resumes from the given offsets.
    ///
    /// Calling it again with the same partitions yields the same queues.
    pub fn update_offsets(&mut self, partitions: &[TopicPartition]) -> Result<(), ConsumerError> {
        let _entered = self.span.clone().entered();

        if let Err(e) = self.rebuild_queues(partitions) {
            error!(
                error = ?e,
                error_type = e.error_type(),
                "Failed to rebuild partition queues for new offsets"
            );
            return Err(e);
        }
        self.assignment.offsets_updated();
        self.stalled_status = StalledStatus::NotStalled;
        Ok(())
    }

    /// Returns the next message of `partition`, polling its queue when the
    /// buffered batch is used up.
    ///
    /// `None` means nothing is available right now; [`PartitionConsumer::stalled_status`]
    /// tells why. Asking for a partition other than the one being read from
    /// also yields `None` until the buffered batch is replaced.
    pub fn consume(
        &mut self,
        partition: &TopicPartition,
        count_hint: Option<usize>,
    ) -> Option<&OwnedMessage> {
        let _entered = self.span.clone().entered();

        if self.stop.is_stopped() {
            self.mark_stalled(StalledStatus::ConsumerStopped);
            return None;
        }

        if self.polled_data_unusable(partition) {
            return None;
        }

        if self.batch.has_remaining() {
            return self.batch.next_message();
        }

        let Some(queue) = self.queues.get(partition.partition()) else {
            debug!(%partition, "No queue for partition, it is not assigned");
            self.mark_stalled(StalledStatus::NoMessagesReturned);
            return None;
        };

        let messages_to_pull = count_hint.unwrap_or(self.batch_size);
        trace!(
            batch_size = messages_to_pull,
            offset = partition.offset(),
            "Polling partition queue"
        );
        let polled = queue.consume_batch(messages_to_pull, self.poll_timeout);

        // the stop flag may have flipped while the poll was blocked
        if self.stop.is_stopped() {
            self.mark_stalled(StalledStatus::ConsumerStopped);
            return None;
        }

        if polled.is_empty() {
            trace!("Stalled");
            self.mark_stalled(StalledStatus::NoMessagesReturned);
            return None;
        }

        let polled_count = polled.len();
        let (batch, skipped) = MessageBatch::from_polled(polled);
        self.batch = batch;
        self.log_positions(polled_count);

        if !self.batch.has_remaining() {
            error!(skipped, "Only errors left");
            self.mark_stalled(StalledStatus::ErrorsReturned);
            return None;
        }

        if !self.batch.belongs_to(partition.partition()) {
            warn!(%partition, "Discarding batch polled for another partition");
            self.batch.clear();
            self.mark_stalled(StalledStatus::NoMessagesReturned);
            return None;
        }

        counter!(KAFKA_MESSAGES_POLLED).increment(self.batch.len() as u64);

        self.stalled_status = StalledStatus::NotStalled;
        self.batch.next_message()
    }

    /// Commits the offset of a single partition, retrying transient failures.
    ///
    /// Returns whether the commit went through. A failed commit is not an
    /// error for the owner: the offsets it keeps elsewhere are authoritative
    /// on restart.
    pub fn commit(&self, partition: &TopicPartition) -> bool {
        let _entered = self.span.enter();

        debug!(%partition, "Trying to commit offset");

        let mut committed = false;
        for attempt in 1..=COMMIT_MAX_ATTEMPTS {
            // the broker may reject commits while the offsets topic is short
            // of replicas, or the connection may blip, so retry
            match self.client.commit(std::slice::from_ref(partition)) {
                Ok(()) => {
                    info!(
                        offset = partition.offset(),
                        topic = partition.topic(),
                        partition = partition.partition_number(),
                        "Committed offset"
                    );
                    committed = true;
                    break;
                }
                Err(e) if e.rdkafka_error_code() == Some(RDKafkaErrorCode::NoOffset) => {
                    // nothing to commit, retrying won't change that
                    debug!(%partition, "No offset to commit");
                    committed = true;
                    break;
                }
                Err(e) => {
                    warn!(attempt, error = ?e, "Commit attempt failed");
                }
            }
        }

        if committed {
            counter!(KAFKA_COMMITS).increment(1);
        } else {
            counter!(KAFKA_COMMIT_FAILURES).increment(1);
            info!(%partition, "All commit attempts failed");
        }
        committed
    }

    /// Unsubscribes and drains the main queue so dropping the client does not hang.
    ///
    /// Runs at most once; also invoked on drop.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        let _entered = self.span.clone().entered();

        match self.client.has_subscription() {
            Ok(true) => {}
            Ok(false) => return,
            Err(e) => {
                error!(error = ?e, "Error while shutting down consumer");
                return;
            }
        }

        self.client.unsubscribe();
        self.drain_consumer_queue();
    }

    // librdkafka keeps queued events and callbacks after unsubscribing and
    // blocks on destruction until they are served, see
    // https://github.com/edenhill/librdkafka/issues/2077
    fn drain_consumer_queue(&mut self) {
        let start = Instant::now();
        let mut last_error: Option<KafkaError> = None;

        loop {
            let Some(event) = self.client.poll(DRAIN_POLL_TIMEOUT) else {
                break;
            };

            match event {
                ClientEvent::Message(Err(e)) => {
                    if matches!(e, KafkaError::PartitionEOF(_))
                        || last_error.as_ref() == Some(&e)
                    {
                        break;
                    }
                    // don't stop on the first error, only if it repeats
                    error!(error = ?e, "Error during draining");
                    last_error = Some(e);
                }
                ClientEvent::Message(Ok(_)) => last_error = None,
                ClientEvent::Rebalance(RebalanceEvent::Revoke(partitions)) => {
                    if let Err(e) = self.revoke(&partitions) {
                        error!(error = ?e, "Revocation during draining failed");
                    }
                    last_error = None;
                }
                ClientEvent::Rebalance(rebalance) => {
                    debug!(?rebalance, "Ignoring rebalance while draining");
                    last_error = None;
                }
            }

            if start.elapsed() > DRAIN_TIMEOUT {
                error!("Timeout during draining");
                break;
            }
        }
    }

    fn handle_rebalance(&mut self, rebalance: RebalanceEvent) -> Result<(), ConsumerError> {
        match rebalance {
            RebalanceEvent::Assign(partitions) => {
                self.assignment.assign(&partitions)?;
                // queues have to be detached right away, otherwise the next
                // main queue poll could return partition data
                if let Err(e) = self.rebuild_queues(&partitions) {
                    // the table stays empty and needs_offset_update stays set,
                    // so the owner's next update_offsets call rebuilds it
                    counter!(KAFKA_QUEUE_REBUILD_FAILURES, "error_type" => e.error_type())
                        .increment(1);
                    error!(
                        error = ?e,
                        error_type = e.error_type(),
                        "Failed to initialize partition queues for assignment"
                    );
                }
            }
            RebalanceEvent::Revoke(partitions) => self.revoke(&partitions)?,
            RebalanceEvent::Error(e) => {
                error!(error = ?e, "Rebalance error");
                counter!(KAFKA_REBALANCE_ERRORS).increment(1);
            }
        }
        Ok(())
    }

    fn revoke(&mut self, partitions: &[TopicPartition]) -> Result<(), ConsumerError> {
        self.assignment.revoke(partitions)?;
        self.queues.clear();
        self.batch.clear();
        Ok(())
    }

    fn mark_stalled(&mut self, status: StalledStatus) {
        self.stalled_status = status;
        counter!(KAFKA_CONSUMER_STALLS, "reason" => status.as_str()).increment(1);
    }

    fn rebuild_queues(&mut self, partitions: &[TopicPartition]) -> Result<(), ConsumerError> {
        self.batch.clear();
        self.queues.rebuild(&self.client, partitions)
    }

    // unread messages from another partition can't be served, the owner
    // has to catch up with the assignment first
    fn polled_data_unusable(&self, partition: &TopicPartition) -> bool {
        self.batch.has_remaining() && !self.batch.belongs_to(partition.partition())
    }

    fn log_positions(&self, polled: usize) {
        if !tracing::enabled!(Level::TRACE) {
            return;
        }
        match self.client.positions() {
            Ok(positions) => trace!(polled, ?positions, "Polled batch of messages"),
            Err(e) => trace!(polled, error = ?e, "Polled batch of messages, positions unknown"),
        }
    }
}

impl<C: ConsumerClient> Drop for PartitionConsumer<C> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
