use rdkafka::error::KafkaError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConsumerError {
    #[error("Kafka error: {0}")]
    Kafka(#[from] KafkaError),

    /// The client delivered an assignment before revoking the previous one.
    /// The consumer state can no longer be trusted.
    #[error("assignment of {incoming} partitions received while {held} partitions are still assigned")]
    AssignmentAlreadyHeld { held: usize, incoming: usize },

    /// The client revoked partitions this consumer never held.
    #[error("revocation of {revoked} partitions received while no assignment is held")]
    NoAssignmentHeld { revoked: usize },

    #[error("no partition queue available for {topic}[{partition}]")]
    QueueUnavailable { topic: String, partition: i32 },
}

impl ConsumerError {
    /// Returns true for rebalance-protocol violations the owner must not continue past
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ConsumerError::AssignmentAlreadyHeld { .. } | ConsumerError::NoAssignmentHeld { .. }
        )
    }

    /// Returns the error type tag for metrics/logging
    pub fn error_type(&self) -> &'static str {
        match self {
            ConsumerError::Kafka(_) => "kafka_error",
            ConsumerError::AssignmentAlreadyHeld { .. } => "assignment_already_held",
            ConsumerError::NoAssignmentHeld { .. } => "no_assignment_held",
            ConsumerError::QueueUnavailable { .. } => "queue_unavailable",
        }
    }
}
