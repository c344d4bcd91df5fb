use metrics::{counter, gauge};
use tracing::{debug, info, trace};

use crate::error::ConsumerError;
use crate::metrics_consts::{
    KAFKA_ASSIGNED_PARTITIONS, KAFKA_CONSUMERS_WITH_ASSIGNMENT, KAFKA_REBALANCE_ASSIGNMENTS,
    KAFKA_REBALANCE_REVOCATIONS,
};
use crate::types::TopicPartition;

/// Partitions the broker currently assigns to this consumer.
///
/// Only rebalance events mutate it. An assignment must always be revoked
/// before the next one arrives.
#[derive(Debug, Default)]
pub struct AssignmentTracker {
    assignment: Option<Vec<TopicPartition>>,
    // set on every change, cleared once the owner pushed corrected offsets
    needs_offset_update: bool,
}

impl AssignmentTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assignment(&self) -> Option<&[TopicPartition]> {
        self.assignment.as_deref()
    }

    pub fn needs_offset_update(&self) -> bool {
        self.needs_offset_update
    }

    pub fn assign(&mut self, partitions: &[TopicPartition]) -> Result<(), ConsumerError> {
        if let Some(held) = &self.assignment {
            return Err(ConsumerError::AssignmentAlreadyHeld {
                held: held.len(),
                incoming: partitions.len(),
            });
        }

        gauge!(KAFKA_ASSIGNED_PARTITIONS).increment(partitions.len() as f64);
        counter!(KAFKA_REBALANCE_ASSIGNMENTS).increment(1);

        if partitions.is_empty() {
            info!("Got empty assignment: not enough partitions in the topic for all consumers?");
        } else {
            trace!(?partitions, "Topics/partitions assigned");
            gauge!(KAFKA_CONSUMERS_WITH_ASSIGNMENT).increment(1.0);
        }

        self.assignment = Some(partitions.to_vec());
        self.needs_offset_update = true;
        Ok(())
    }

    pub fn revoke(&mut self, partitions: &[TopicPartition]) -> Result<(), ConsumerError> {
        if self.assignment.is_none() {
            if partitions.is_empty() {
                debug!("Skipping empty revocation without an assignment");
                return Ok(());
            }
            return Err(ConsumerError::NoAssignmentHeld {
                revoked: partitions.len(),
            });
        }

        gauge!(KAFKA_ASSIGNED_PARTITIONS).decrement(partitions.len() as f64);
        counter!(KAFKA_REBALANCE_REVOCATIONS).increment(1);

        trace!(?partitions, "Rebalance initiated. Revoking partitions");

        if !partitions.is_empty() {
            gauge!(KAFKA_CONSUMERS_WITH_ASSIGNMENT).decrement(1.0);
        }

        self.assignment = None;
        self.needs_offset_update = true;
        Ok(())
    }

    pub fn offsets_updated(&mut self) {
        self.needs_offset_update = false;
    }
}
