use std::fmt;

use serde::Deserialize;

/// Control command, as delivered by an external transport (e.g. `POST /control`).
///
/// `numberOfPartitions` is meaningful only for the `UPDATE` order, and defaults to `0`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlRequest {
    pub order: String,

    #[serde(default)]
    pub number_of_partitions: i64,
}

/// Command interpreted by [`super::ConsumerPool::control_consumers`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    /// Stop every Worker and shut down the scheduler
    Stop,

    /// Discard every Worker and start the pool afresh
    Start,

    /// Grow the pool to the given number of partitions
    Update(usize),

    /// Any order not listed above: it's never acted upon
    Unrecognized(String),
}

impl From<ControlRequest> for ControlCommand {
    fn from(req: ControlRequest) -> Self {
        match req.order.as_str() {
            "STOP" => ControlCommand::Stop,
            "START" => ControlCommand::Start,
            // Negative counts cannot grow the pool
            "UPDATE" => ControlCommand::Update(usize::try_from(req.number_of_partitions).unwrap_or(0)),
            _ => ControlCommand::Unrecognized(req.order),
        }
    }
}

impl fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlCommand::Stop => write!(f, "STOP"),
            ControlCommand::Start => write!(f, "START"),
            ControlCommand::Update(n) => write!(f, "UPDATE({n})"),
            ControlCommand::Unrecognized(order) => write!(f, "{order:?}"),
        }
    }
}

impl ControlCommand {
    /// Short label for the order, used in metrics.
    pub fn order_label(&self) -> &'static str {
        match self {
            ControlCommand::Stop => "STOP",
            ControlCommand::Start => "START",
            ControlCommand::Update(_) => "UPDATE",
            ControlCommand::Unrecognized(_) => "UNRECOGNIZED",
        }
    }
}

#[cfg(test)]
mod test {
    use super::{ControlCommand, ControlRequest};

    fn parse(json: &str) -> ControlCommand {
        ControlCommand::from(serde_json::from_str::<ControlRequest>(json).unwrap())
    }

    #[test]
    fn test_parse_orders() {
        assert_eq!(parse(r#"{"order":"STOP","numberOfPartitions":0}"#), ControlCommand::Stop);
        assert_eq!(parse(r#"{"order":"START"}"#), ControlCommand::Start);
        assert_eq!(parse(r#"{"order":"UPDATE","numberOfPartitions":5}"#), ControlCommand::Update(5));
    }

    #[test]
    fn test_parse_update_negative_count() {
        assert_eq!(parse(r#"{"order":"UPDATE","numberOfPartitions":-3}"#), ControlCommand::Update(0));
    }

    #[test]
    fn test_parse_unrecognized() {
        assert_eq!(
            parse(r#"{"order":"PAUSE","numberOfPartitions":2}"#),
            ControlCommand::Unrecognized("PAUSE".to_string())
        );

        // Orders are case sensitive
        assert_eq!(parse(r#"{"order":"stop"}"#), ControlCommand::Unrecognized("stop".to_string()));
    }

    #[test]
    fn test_order_label() {
        assert_eq!(ControlCommand::Update(3).order_label(), "UPDATE");
        assert_eq!(ControlCommand::Unrecognized("x".into()).order_label(), "UNRECOGNIZED");
    }
}
