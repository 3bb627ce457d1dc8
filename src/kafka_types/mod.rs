mod message;
mod topic_partition;

pub use message::Message;
pub use topic_partition::TopicPartition;
