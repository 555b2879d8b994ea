//! Delivery configuration.

use std::fmt;
use std::str::FromStr;

use crate::errors::DeliveryError;

/// Default name of the queue index updates are sent to.
pub const DEFAULT_QUEUE_NAME: &str = "entity-index-updates";

/// Recognized delivery implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueImplementation {
    /// Apply updates in-process, before `deliver` returns.
    Local,
    /// Send updates through a durable queue.
    Queued,
}

impl QueueImplementation {
    /// Every recognized implementation, in display order.
    pub const ALL: [QueueImplementation; 2] = [QueueImplementation::Local, QueueImplementation::Queued];

    /// The configuration value naming this implementation.
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueImplementation::Local => "local",
            QueueImplementation::Queued => "queued",
        }
    }

    /// All recognized configuration values, comma-separated.
    pub fn allowed_values() -> String {
        Self::ALL
            .iter()
            .map(QueueImplementation::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for QueueImplementation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueueImplementation {
    type Err = DeliveryError;

    /// The error message never echoes `value`, so each allowed value appears
    /// in it exactly once whatever was configured.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim();
        Self::ALL
            .into_iter()
            .find(|implementation| implementation.as_str().eq_ignore_ascii_case(normalized))
            .ok_or_else(|| {
                DeliveryError::configuration(format!(
                    "unrecognized queue implementation; allowed values are: {}",
                    Self::allowed_values()
                ))
            })
    }
}

/// Settings the strategy selector reads on first use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryConfig {
    /// Raw implementation name, validated when the strategy is first resolved.
    pub queue_implementation: String,
    /// Queue that queued delivery sends to.
    pub queue_name: String,
}

impl DeliveryConfig {
    pub fn new(queue_implementation: impl Into<String>, queue_name: impl Into<String>) -> Self {
        Self {
            queue_implementation: queue_implementation.into(),
            queue_name: queue_name.into(),
        }
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self::new(QueueImplementation::Local.as_str(), DEFAULT_QUEUE_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_recognized_values() {
        assert_eq!("local".parse::<QueueImplementation>().unwrap(), QueueImplementation::Local);
        assert_eq!("queued".parse::<QueueImplementation>().unwrap(), QueueImplementation::Queued);
        assert_eq!(" QUEUED ".parse::<QueueImplementation>().unwrap(), QueueImplementation::Queued);
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        for implementation in QueueImplementation::ALL {
            let parsed: QueueImplementation = implementation.to_string().parse().unwrap();
            assert_eq!(parsed, implementation);
        }
    }

    #[test]
    fn test_allowed_values_has_no_trailing_separator() {
        assert_eq!(QueueImplementation::allowed_values(), "local, queued");
    }

    #[test]
    fn test_unrecognized_value_lists_every_option() {
        let err = "sqs".parse::<QueueImplementation>().unwrap_err();
        let message = err.to_string();

        assert!(matches!(err, DeliveryError::ConfigurationError(_)));
        assert!(!message.contains("sqs"));
        for implementation in QueueImplementation::ALL {
            assert_eq!(message.matches(implementation.as_str()).count(), 1);
        }
        assert!(message.ends_with("local, queued"));
    }

    #[test]
    fn test_value_containing_a_valid_name_lists_each_option_once() {
        for value in ["localx", "queued2", "local,queued", " xLOCALqueued "] {
            let message = value.parse::<QueueImplementation>().unwrap_err().to_string();

            for implementation in QueueImplementation::ALL {
                assert_eq!(
                    message.matches(implementation.as_str()).count(),
                    1,
                    "{:?} produced {:?}",
                    value,
                    message
                );
            }
        }
    }

    #[test]
    fn test_empty_value_is_rejected() {
        assert!("".parse::<QueueImplementation>().is_err());
    }
}
