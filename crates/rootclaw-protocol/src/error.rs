//! Protocol error taxonomy.

use crate::packet::CorrelationKey;
use thiserror::Error;

/// Failures reported by a [`TransportLink`](crate::link::TransportLink).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LinkError {
    /// The link is not (or no longer) connected.
    #[error("link is disconnected")]
    Disconnected,
    /// The underlying transport rejected the write.
    #[error("link write failed: {0}")]
    Write(String),
}

/// Failures of a single robot command.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// No link available when the command was sent.
    #[error("not connected to the robot")]
    NotConnected,

    /// No matching notification arrived before the deadline.
    #[error("command {key} timed out after {timeout_ms}ms")]
    Timeout {
        key: CorrelationKey,
        timeout_ms: u64,
    },

    /// The link dropped while the command was pending.
    #[error("link closed before the command completed")]
    LinkClosed,

    /// Another command with the same key is still awaiting completion.
    #[error("command {key} is already awaiting completion")]
    DuplicatePending { key: CorrelationKey },

    /// A newer registration for the same key replaced this waiter.
    #[error("command {key} was superseded by a newer command with the same key")]
    Superseded { key: CorrelationKey },

    /// The transport failed while writing the packet.
    #[error(transparent)]
    Link(#[from] LinkError),
}

impl ProtocolError {
    /// Errors caused by the link going away rather than by this command.
    pub fn is_link_loss(&self) -> bool {
        matches!(
            self,
            Self::NotConnected | Self::LinkClosed | Self::Link(LinkError::Disconnected)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_names_key() {
        let err = ProtocolError::Timeout {
            key: CorrelationKey::new(1, 8, 3),
            timeout_ms: 10_000,
        };
        assert_eq!(err.to_string(), "command 1-8-3 timed out after 10000ms");
    }

    #[test]
    fn link_error_is_transparent() {
        let err: ProtocolError = LinkError::Write("gatt busy".into()).into();
        assert_eq!(err.to_string(), "link write failed: gatt busy");
        assert!(!err.is_link_loss());
    }

    #[test]
    fn link_loss_classification() {
        assert!(ProtocolError::NotConnected.is_link_loss());
        assert!(ProtocolError::LinkClosed.is_link_loss());
        assert!(ProtocolError::Link(LinkError::Disconnected).is_link_loss());
        assert!(
            !ProtocolError::DuplicatePending {
                key: CorrelationKey::new(1, 8, 0)
            }
            .is_link_loss()
        );
    }
}
