use crate::error::{MediaError, NegotiationError};
use async_trait::async_trait;
use tether_core::{IceCandidate, SessionDescription};
use tokio::sync::mpsc;

/// Connection-state changes surfaced by a [`PeerLink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

/// One asynchronous notification from a live connection object. Carries the
/// epoch of the connection that emitted it so the session can discard
/// events from a connection it has already replaced.
#[derive(Debug, Clone)]
pub struct PeerEvent {
    pub epoch: u64,
    pub kind: PeerEventKind,
}

#[derive(Debug, Clone)]
pub enum PeerEventKind {
    CandidateDiscovered(IceCandidate),
    TrackReceived,
    StateChanged(LinkState),
}

/// The direct-connection collaborator: create/apply descriptions, attach
/// media, feed candidates. The session owns at most one live link at a
/// time.
#[async_trait]
pub trait PeerLink: Send + Sync {
    type Track: Clone + Send + Sync + 'static;

    async fn attach_track(&self, track: Self::Track) -> Result<(), NegotiationError>;
    async fn create_offer(&self) -> Result<SessionDescription, NegotiationError>;
    async fn create_answer(&self) -> Result<SessionDescription, NegotiationError>;
    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), NegotiationError>;
    async fn set_remote_description(&self, desc: SessionDescription)
        -> Result<(), NegotiationError>;
    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), NegotiationError>;

    /// Synchronously stop event delivery. No [`PeerEvent`] may be emitted
    /// after this returns; teardown relies on detach happening before
    /// close.
    fn detach_handlers(&self);

    async fn close(&self);
}

/// Factory side of the platform's real-time primitives: media acquisition
/// and connection creation. The capture lifecycle stays with the platform;
/// the session only attaches and releases track handles.
#[async_trait]
pub trait PeerBackend: Send + Sync {
    type Track: Clone + Send + Sync + 'static;
    type Link: PeerLink<Track = Self::Track>;

    async fn acquire_media(&self) -> Result<Vec<Self::Track>, MediaError>;

    fn release_media(&self, tracks: &[Self::Track]);

    /// Build a fresh connection object that reports its events, stamped
    /// with `epoch`, into `events`.
    async fn create_link(
        &self,
        epoch: u64,
        events: mpsc::UnboundedSender<PeerEvent>,
    ) -> Result<Self::Link, NegotiationError>;
}

/// Outbound signaling envelopes toward the relay. Fire-and-forget, matching
/// the relay's own forwarding discipline.
#[async_trait]
pub trait SignalSink: Send + Sync {
    async fn send_ready(&self, room: &str);
    async fn send_offer(&self, room: &str, offer: SessionDescription);
    async fn send_answer(&self, room: &str, answer: SessionDescription);
    async fn send_candidate(&self, room: &str, candidate: IceCandidate);
    async fn send_leave(&self, room: &str);
}
