use std::fmt;

use typemq_broker::BrokerError;
use typemq_channel::ChannelError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn broker_error(context: &str, err: BrokerError) -> CliError {
    let code = match &err {
        BrokerError::ConnectionClosed => FAILURE,
        BrokerError::QueueNotDeclared { .. } | BrokerError::DeclareConflict { .. } => {
            TRANSPORT_ERROR
        }
        BrokerError::UnknownDeliveryTag(_) | BrokerError::UnknownConsumerTag(_) => USAGE,
        BrokerError::Callback { .. } => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn channel_error(context: &str, err: ChannelError) -> CliError {
    match err {
        ChannelError::Configuration(_) | ChannelError::UnknownQueue { .. } => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        ChannelError::SchemaMismatch { .. } | ChannelError::Schema(_) => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        ChannelError::Broker(err) => broker_error(context, err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_failures_map_to_data_invalid() {
        let err = ChannelError::SchemaMismatch {
            id: "Q".to_string(),
            expected: "A",
            actual: "B",
        };
        assert_eq!(channel_error("publish failed", err).code, DATA_INVALID);
    }

    #[test]
    fn unknown_queue_maps_to_usage() {
        let err = ChannelError::UnknownQueue {
            id: "Q".to_string(),
        };
        let cli = channel_error("publish failed", err);
        assert_eq!(cli.code, USAGE);
        assert!(cli.message.contains("publish failed"));
    }

    #[test]
    fn declare_conflict_maps_to_transport_error() {
        let err = BrokerError::DeclareConflict {
            queue: "q".to_string(),
            existing: true,
        };
        assert_eq!(broker_error("open failed", err).code, TRANSPORT_ERROR);
    }
}
