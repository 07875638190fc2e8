//! Error types for the channel.

/// Errors produced by a [`TransferChannel`](crate::TransferChannel).
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("channel closed")]
    Closed,

    #[error("send rejected: {0}")]
    Send(String),
}
