//! Consumer-group wrapper that reads Kafka one partition at a time.
//!
//! The broker decides which partitions this consumer owns. Every assignment is
//! turned into a set of partition queues detached from the consumer's main
//! queue, so the owner can pull bounded batches per partition, re-offset a
//! partition after an assignment change, and commit offsets one partition at a
//! time. The main queue only carries rebalance and error events and is
//! serviced by [`PartitionConsumer::poll_events`].
//!
//! ## Error logging
//!
//! Errors are logged as structured Debug fields (`error = ?e`), which keep the
//! source of a [`ConsumerError::Kafka`] visible. Display (`%e`) only shows the
//! top-level message. Every line is emitted inside the span the owner hands
//! to [`PartitionConsumer::new`], so it carries the owner's context.
//!
//! Failures that feed metrics also carry `error_type = e.error_type()`.

pub mod assignment;
pub mod batch;
pub mod client;
pub mod config;
pub mod consumer;
pub mod error;
pub mod metrics_consts;
pub mod queues;
pub mod rdkafka_client;
pub mod stop;
pub mod types;

// Used in "mod tests" and by owners testing against a scripted client
pub mod test_utils;

// Public API
pub use client::{ClientEvent, ConsumerClient, PartitionQueue, RebalanceEvent};
pub use config::ConsumerConfig;
pub use consumer::PartitionConsumer;
pub use error::ConsumerError;
pub use rdkafka_client::RdKafkaClient;
pub use stop::StopSignal;
pub use types::{Partition, StalledStatus, TopicPartition, TopicPartitionCount};
