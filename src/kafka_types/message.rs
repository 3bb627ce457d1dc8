use rdkafka::Message as KafkaMessage;
use serde::Serialize;

/// A record consumed from the broker, detached from the client that fetched it.
///
/// Once built it is never mutated: Workers buffer it for inspection only.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Record key, decoded lossily as UTF-8
    pub key: Option<String>,

    /// Record value, decoded lossily as UTF-8
    pub value: Option<String>,

    /// Partition the record was read from
    pub partition: i32,

    /// Offset of the record in its partition
    pub offset: i64,

    /// Broker-recorded timestamp (UTC milliseconds), when the broker provided one
    pub produced_timestamp: Option<i64>,
}

impl Message {
    /// Latency between `now_ms` and when this record was produced, in milliseconds.
    ///
    /// NOTE: no clamping is applied. If producer and consumer clocks drift apart,
    /// this can be negative.
    pub fn latency_ms(&self, now_ms: i64) -> Option<i64> {
        self.produced_timestamp.map(|produced| now_ms - produced)
    }

    /// Builds a [`Message`] out of anything implementing [`rdkafka::Message`].
    pub fn from_kafka<M: KafkaMessage>(m: &M) -> Self {
        Self {
            key: m.key().map(|k| String::from_utf8_lossy(k).into_owned()),
            value: m.payload().map(|v| String::from_utf8_lossy(v).into_owned()),
            partition: m.partition(),
            offset: m.offset(),
            produced_timestamp: m.timestamp().to_millis(),
        }
    }
}
