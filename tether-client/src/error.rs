use thiserror::Error;

/// Failures from the direct-connection collaborator. None of these crash
/// the session; the catch path runs the same teardown as an explicit leave.
#[derive(Debug, Error)]
pub enum NegotiationError {
    #[error("peer connection failed: {0}")]
    Connection(String),

    #[error("description could not be applied: {0}")]
    Description(String),

    #[error("candidate could not be applied: {0}")]
    Candidate(String),

    #[error("track could not be attached: {0}")]
    Track(String),
}

/// Local media acquisition failures, surfaced to the UI collaborator.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("media permission denied")]
    PermissionDenied,

    /// Possibly transient (another application holds the device); worth
    /// one automatic retry.
    #[error("media device busy")]
    DeviceBusy,

    #[error("media device unavailable: {0}")]
    DeviceUnavailable(String),
}

impl MediaError {
    pub fn is_transient(&self) -> bool {
        matches!(self, MediaError::DeviceBusy)
    }
}

/// Signaling transport failures, produced by the supervised connect loop.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("signaling server unreachable after {0} attempts")]
    RetriesExhausted(u32),

    #[error("websocket error: {0}")]
    WebSocket(String),
}
