//! Stream Gateway error types.
//!
//! None of these errors is fatal to the process. A malformed event skips one
//! event, a duplicate subscription becomes an `error` + `complete` pair on
//! the wire, and a closed connection is simply discarded by the caller.
//! Internal details are logged server-side but not exposed to clients.

use thiserror::Error;

/// Stream Gateway error type.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// A known bus event is missing a required field or carries one of the
    /// wrong type.
    #[error("Malformed {event}: {reason}")]
    MalformedEvent { event: String, reason: String },

    /// A single-cardinality operation already has an active subscriber on
    /// this connection.
    #[error("Only one {operation} subscription is allowed")]
    DuplicateSubscription {
        operation: &'static str,
        active_subscriber_id: String,
    },

    /// The connection's outbound channel is gone (disconnect or cancellation).
    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    /// JSON encoding or decoding failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Event bus (Redis) operation failed.
    #[error("Redis error: {0}")]
    Redis(String),
}

impl GatewayError {
    /// Returns a client-safe error message (no internal details).
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            GatewayError::DuplicateSubscription { .. } => self.to_string(),
            GatewayError::MalformedEvent { .. }
            | GatewayError::ConnectionClosed(_)
            | GatewayError::Serialization(_)
            | GatewayError::Redis(_) => "An internal error occurred".to_string(),
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::Serialization(err.to_string())
    }
}

impl From<redis::RedisError> for GatewayError {
    fn from(err: redis::RedisError) -> Self {
        GatewayError::Redis(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_subscription_message_names_operation() {
        let err = GatewayError::DuplicateSubscription {
            operation: "getChatMessageStream",
            active_subscriber_id: "a".to_string(),
        };
        assert_eq!(
            err.client_message(),
            "Only one getChatMessageStream subscription is allowed"
        );
        assert!(!err.client_message().contains("\"a\""));
    }

    #[test]
    fn test_client_messages_hide_internal_details() {
        let redis_err = GatewayError::Redis("connection refused at 10.0.0.7:6379".to_string());
        assert!(!redis_err.client_message().contains("10.0.0.7"));
        assert_eq!(redis_err.client_message(), "An internal error occurred");

        let malformed = GatewayError::MalformedEvent {
            event: "UserMutedVoiceEvtMsg".to_string(),
            reason: "missing field `muted`".to_string(),
        };
        assert_eq!(malformed.client_message(), "An internal error occurred");
    }

    #[test]
    fn test_display_formatting() {
        assert_eq!(
            format!(
                "{}",
                GatewayError::MalformedEvent {
                    event: "UserTalkingVoiceEvtMsg".to_string(),
                    reason: "invalid type: string \"yes\", expected a boolean".to_string(),
                }
            ),
            "Malformed UserTalkingVoiceEvtMsg: invalid type: string \"yes\", expected a boolean"
        );
        assert_eq!(
            format!("{}", GatewayError::ConnectionClosed("conn-1".to_string())),
            "Connection closed: conn-1"
        );
    }

    #[test]
    fn test_serde_error_conversion() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{not json")
            .err()
            .map(GatewayError::from);
        assert!(matches!(parse_err, Some(GatewayError::Serialization(_))));
    }

    #[test]
    fn test_only_duplicate_subscription_reaches_clients_verbatim() {
        let hidden = [
            GatewayError::MalformedEvent {
                event: "e".to_string(),
                reason: "r".to_string(),
            },
            GatewayError::ConnectionClosed("conn-1".to_string()),
            GatewayError::Serialization("bad utf-8".to_string()),
            GatewayError::Redis("timeout".to_string()),
        ];
        for err in &hidden {
            assert_eq!(err.client_message(), "An internal error occurred");
        }
    }
}
