//! Why a session ended.

/// Terminal outcome of a session. Every variant is scoped to one connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, thiserror::Error)]
pub enum TerminationReason {
    /// No successful INIT before the handshake deadline.
    #[error("handshake timed out")]
    HandshakeTimeout,
    /// The resource lookup came back empty or failed.
    #[error("resource token invalid")]
    InvalidToken,
    /// The observer's identity token was rejected.
    #[error("credential invalid")]
    InvalidCredential,
    /// No ping within the heartbeat window.
    #[error("heartbeat timed out")]
    HeartbeatTimeout,
    /// The peer closed the channel.
    #[error("peer closed")]
    PeerClosed,
    /// The peer sent a frame that could not be decoded.
    #[error("malformed message")]
    MalformedMessage,
    /// The registry dropped the observer's subscription.
    #[error("subscription closed")]
    SubscriptionClosed,
    /// The server is shutting down.
    #[error("server shutdown")]
    ServerShutdown,
}

impl TerminationReason {
    /// Text sent to the peer before closing, if any.
    ///
    /// The timeout texts stay fixed when the deadlines are reconfigured.
    pub fn message(self) -> Option<&'static str> {
        match self {
            Self::HandshakeTimeout => Some("Not initialized within 10 seconds"),
            Self::InvalidToken => Some("Token invalid or website not found"),
            Self::InvalidCredential => Some("Invalid auth token"),
            Self::HeartbeatTimeout => Some("Ping not received in 1 minute"),
            Self::PeerClosed
            | Self::MalformedMessage
            | Self::SubscriptionClosed
            | Self::ServerShutdown => None,
        }
    }

    /// Snake-case label for metrics.
    pub fn label(self) -> &'static str {
        match self {
            Self::HandshakeTimeout => "handshake_timeout",
            Self::InvalidToken => "invalid_token",
            Self::InvalidCredential => "invalid_credential",
            Self::HeartbeatTimeout => "heartbeat_timeout",
            Self::PeerClosed => "peer_closed",
            Self::MalformedMessage => "malformed_message",
            Self::SubscriptionClosed => "subscription_closed",
            Self::ServerShutdown => "server_shutdown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [TerminationReason; 8] = [
        TerminationReason::HandshakeTimeout,
        TerminationReason::InvalidToken,
        TerminationReason::InvalidCredential,
        TerminationReason::HeartbeatTimeout,
        TerminationReason::PeerClosed,
        TerminationReason::MalformedMessage,
        TerminationReason::SubscriptionClosed,
        TerminationReason::ServerShutdown,
    ];

    #[test]
    fn peer_facing_messages() {
        assert_eq!(
            TerminationReason::HandshakeTimeout.message(),
            Some("Not initialized within 10 seconds")
        );
        assert_eq!(
            TerminationReason::InvalidToken.message(),
            Some("Token invalid or website not found")
        );
        assert_eq!(
            TerminationReason::InvalidCredential.message(),
            Some("Invalid auth token")
        );
        assert_eq!(
            TerminationReason::HeartbeatTimeout.message(),
            Some("Ping not received in 1 minute")
        );
    }

    #[test]
    fn silent_reasons() {
        assert!(TerminationReason::PeerClosed.message().is_none());
        assert!(TerminationReason::MalformedMessage.message().is_none());
        assert!(TerminationReason::ServerShutdown.message().is_none());
    }

    #[test]
    fn labels_are_snake_case() {
        for reason in ALL {
            let label = reason.label();
            assert!(
                label.chars().all(|c| c.is_ascii_lowercase() || c == '_'),
                "label '{label}' must be snake_case"
            );
        }
    }
}
