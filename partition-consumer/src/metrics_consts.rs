// ==== Assignment metrics ====
/// Gauge for the number of partitions currently assigned to consumers in this process
pub const KAFKA_ASSIGNED_PARTITIONS: &str = "kafka_assigned_partitions";

/// Gauge for the number of consumers holding a non-empty assignment
pub const KAFKA_CONSUMERS_WITH_ASSIGNMENT: &str = "kafka_consumers_with_assignment";

// ==== Rebalance metrics ====
/// Counter for assignment callbacks received
pub const KAFKA_REBALANCE_ASSIGNMENTS: &str = "kafka_rebalance_assignments_total";

/// Counter for revocation callbacks received
pub const KAFKA_REBALANCE_REVOCATIONS: &str = "kafka_rebalance_revocations_total";

/// Counter for rebalance errors reported by the client
pub const KAFKA_REBALANCE_ERRORS: &str = "kafka_rebalance_errors_total";

// ==== Consumption metrics ====
/// Counter for messages pulled from partition queues (errored entries excluded)
pub const KAFKA_MESSAGES_POLLED: &str = "kafka_messages_polled_total";

/// Counter for polled entries that carried an error instead of a message
pub const KAFKA_CONSUMER_ERRORS: &str = "kafka_consumer_errors_total";

/// Counter for consumption attempts that produced no message, labelled by reason
pub const KAFKA_CONSUMER_STALLS: &str = "kafka_consumer_stalls_total";

/// Counter for partition queue rebuilds the client rejected, labelled by error type
pub const KAFKA_QUEUE_REBUILD_FAILURES: &str = "kafka_queue_rebuild_failures_total";

/// Counter for data messages that surfaced on the main queue
pub const KAFKA_UNEXPECTED_MAIN_QUEUE_MESSAGES: &str = "kafka_unexpected_main_queue_messages_total";

// ==== Commit metrics ====
/// Counter for successful offset commits
pub const KAFKA_COMMITS: &str = "kafka_commits_total";

/// Counter for commits that exhausted every attempt
pub const KAFKA_COMMIT_FAILURES: &str = "kafka_commit_failures_total";
