use thiserror::Error;

/// Failures the relay can hit while forwarding an envelope. None of these
/// are fatal to the service; callers log or report them to the sender.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The addressed client is not, or is no longer, connected.
    #[error("target unavailable")]
    TargetUnavailable,

    /// The target's writer task has gone away; the connection is being
    /// torn down concurrently.
    #[error("transport closed")]
    TransportClosed,
}
