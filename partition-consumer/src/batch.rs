use metrics::counter;
use rdkafka::error::KafkaResult;
use rdkafka::message::{Message, OwnedMessage};
use tracing::error;

use crate::metrics_consts::KAFKA_CONSUMER_ERRORS;
use crate::types::Partition;

/// Messages pulled from one partition queue, handed out one at a time.
///
/// A batch is never appended to or rewound; the next poll replaces it.
#[derive(Debug, Default)]
pub struct MessageBatch {
    messages: Vec<OwnedMessage>,
    // index of the next message to hand out
    cursor: usize,
}

impl MessageBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a batch from polled entries, dropping the ones that carry an error.
    /// Returns the batch and the number of dropped entries.
    pub fn from_polled(polled: Vec<KafkaResult<OwnedMessage>>) -> (Self, usize) {
        let mut messages = Vec::with_capacity(polled.len());
        let mut skipped = 0;

        for entry in polled {
            match entry {
                Ok(message) => messages.push(message),
                Err(e) => {
                    counter!(KAFKA_CONSUMER_ERRORS).increment(1);
                    error!(error = ?e, "Consumer error");
                    skipped += 1;
                }
            }
        }

        if skipped > 0 {
            error!(skipped, "There were messages with an error");
        }

        (
            Self {
                messages,
                cursor: 0,
            },
            skipped,
        )
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.cursor = 0;
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn has_remaining(&self) -> bool {
        self.cursor < self.messages.len()
    }

    /// The next message to be handed out, without advancing
    pub fn peek(&self) -> Option<&OwnedMessage> {
        self.messages.get(self.cursor)
    }

    pub fn next_message(&mut self) -> Option<&OwnedMessage> {
        let message = self.messages.get(self.cursor)?;
        self.cursor += 1;
        Some(message)
    }

    /// The message most recently handed out by [`MessageBatch::next_message`]
    pub fn last_served(&self) -> Option<&OwnedMessage> {
        self.cursor
            .checked_sub(1)
            .and_then(|index| self.messages.get(index))
    }

    /// True if the unread part of the batch comes from `partition`.
    /// A fully read batch belongs to no partition.
    pub fn belongs_to(&self, partition: &Partition) -> bool {
        self.peek().is_some_and(|message| {
            message.topic() == partition.topic()
                && message.partition() == partition.partition_number()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{consume_error, message};

    fn payload(message: Option<&OwnedMessage>) -> Option<&[u8]> {
        message.and_then(|m| m.payload())
    }

    #[test]
    fn test_errors_are_filtered_in_order() {
        let (mut batch, skipped) = MessageBatch::from_polled(vec![
            Ok(message("events", 0, 1, "one")),
            Err(consume_error()),
            Ok(message("events", 0, 3, "three")),
            Err(consume_error()),
            Ok(message("events", 0, 5, "five")),
        ]);

        assert_eq!(skipped, 2);
        assert_eq!(batch.len(), 3);
        assert_eq!(payload(batch.next_message()), Some(&b"one"[..]));
        assert_eq!(payload(batch.next_message()), Some(&b"three"[..]));
        assert_eq!(payload(batch.next_message()), Some(&b"five"[..]));
        assert!(batch.next_message().is_none());
    }

    #[test]
    fn test_all_errors_leaves_nothing_to_serve() {
        let (batch, skipped) =
            MessageBatch::from_polled(vec![Err(consume_error()), Err(consume_error())]);

        assert_eq!(skipped, 2);
        assert!(batch.is_empty());
        assert!(!batch.has_remaining());
    }

    #[test]
    fn test_cursor_is_not_restartable() {
        let (mut batch, _) = MessageBatch::from_polled(vec![
            Ok(message("events", 0, 1, "one")),
            Ok(message("events", 0, 2, "two")),
        ]);

        assert!(batch.last_served().is_none());
        batch.next_message();
        assert_eq!(batch.last_served().map(|m| m.offset()), Some(1));
        assert_eq!(batch.peek().map(|m| m.offset()), Some(2));
        batch.next_message();
        assert_eq!(batch.last_served().map(|m| m.offset()), Some(2));
        assert!(!batch.has_remaining());
    }

    #[test]
    fn test_belongs_to_checks_unread_messages_only() {
        let (mut batch, _) = MessageBatch::from_polled(vec![Ok(message("events", 4, 1, "one"))]);

        assert!(batch.belongs_to(&Partition::new("events", 4)));
        assert!(!batch.belongs_to(&Partition::new("events", 5)));
        assert!(!batch.belongs_to(&Partition::new("other", 4)));

        batch.next_message();
        assert!(!batch.belongs_to(&Partition::new("events", 4)));
    }
}
