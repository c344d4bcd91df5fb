use std::time::Duration;

use envconfig::Envconfig;
use rdkafka::ClientConfig;

#[derive(Envconfig, Clone, Debug)]
pub struct ConsumerConfig {
    #[envconfig(default = "localhost:9092")]
    pub kafka_hosts: String,

    #[envconfig(default = "partition-consumer")]
    pub kafka_consumer_group: String,

    // Comma separated, e.g. "events,events_retry"
    pub kafka_consumer_topics: String,

    // We default to "earliest" for this, but if you're bringing up a new service, you probably want "latest"
    #[envconfig(default = "earliest")]
    pub kafka_consumer_offset_reset: String, // earliest, latest

    #[envconfig(default = "false")]
    pub kafka_tls: bool,

    // Upper bound on messages pulled from a partition queue per poll
    #[envconfig(default = "65536")]
    pub kafka_max_batch_size: usize,

    // How long a single partition poll may block
    #[envconfig(default = "5000")]
    pub kafka_poll_timeout_ms: u64,

    #[envconfig(default = "45000")]
    pub kafka_session_timeout_ms: u32,

    #[envconfig(default = "5000")]
    pub kafka_metadata_timeout_ms: u64,
}

impl ConsumerConfig {
    pub fn topics(&self) -> Vec<String> {
        self.kafka_consumer_topics
            .split(',')
            .map(str::trim)
            .filter(|topic| !topic.is_empty())
            .map(String::from)
            .collect()
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.kafka_poll_timeout_ms)
    }

    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_millis(self.kafka_metadata_timeout_ms)
    }

    /// rdkafka settings for a group consumer that stores and commits offsets manually
    pub fn to_client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();

        config
            .set("bootstrap.servers", &self.kafka_hosts)
            .set("group.id", &self.kafka_consumer_group)
            .set("auto.offset.reset", &self.kafka_consumer_offset_reset)
            .set("session.timeout.ms", self.kafka_session_timeout_ms.to_string());

        // offsets are committed explicitly, one partition at a time
        config
            .set("enable.auto.commit", "false")
            .set("enable.auto.offset.store", "false")
            .set("enable.partition.eof", "false");

        if self.kafka_tls {
            config
                .set("security.protocol", "ssl")
                .set("enable.ssl.certificate.verification", "false");
        };

        config
    }
}
