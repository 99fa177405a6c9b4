use crate::backoff::ReconnectPolicy;
use crate::error::{MediaError, NegotiationError};
use crate::events::EventBus;
use crate::link::{LinkState, PeerBackend, PeerEvent, PeerEventKind, PeerLink, SignalSink};
use std::sync::Arc;
use tether_core::{IceCandidate, ServerEnvelope, SessionDescription};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

/// Negotiation role, transitioned only through the documented events —
/// never read or written as an ambient flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Undetermined,
    Host,
    Guest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    AwaitingMedia,
    /// Host with media attached, parked until the counterpart's `ready`.
    AwaitingReady,
    /// Guest with media attached, parked until the host's offer.
    AwaitingOffer,
    Negotiating,
    Connected,
    /// After an explicit local leave, a room-full rejection, or a
    /// negotiation fault. A counterpart-leave re-arms to `AwaitingReady`
    /// instead.
    TornDown,
    /// Media acquisition failed permanently; halted pending user action.
    Failed,
}

/// What the session tells its UI collaborator, through the typed event bus.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    RoleAssigned(Role),
    StateChanged(SessionState),
    RemoteTrack,
    PeerLeft,
    RoomFull,
    MediaError(String),
    NegotiationError(String),
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Retry schedule for transient media-acquisition failures.
    pub media_retry: ReconnectPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            media_retry: ReconnectPolicy::media_default(),
        }
    }
}

enum TeardownReason {
    PeerLeft,
    RoomFull,
    LocalLeave,
    Fault,
}

/// Per-client negotiation state machine.
///
/// Single-threaded by construction: every transition takes `&mut self` and
/// runs to completion, so no two transitions interleave on one session.
/// The asynchronous platform calls happen inside a transition; anything
/// completing after the connection object has been replaced is filtered by
/// the epoch check in [`NegotiationSession::on_peer_event`].
pub struct NegotiationSession<B: PeerBackend, S: SignalSink> {
    room: String,
    backend: Arc<B>,
    signals: S,
    bus: EventBus<SessionEvent>,
    state: SessionState,
    role: Role,
    /// Bumped every time a fresh connection object is created; events and
    /// completions carrying an older epoch are stale.
    epoch: u64,
    link: Option<B::Link>,
    local_tracks: Vec<B::Track>,
    remote_applied: bool,
    /// Candidates that arrived before the description they depend on.
    pending_candidates: Vec<IceCandidate>,
    peer_events: mpsc::UnboundedSender<PeerEvent>,
    config: SessionConfig,
}

impl<B: PeerBackend, S: SignalSink> NegotiationSession<B, S> {
    /// Returns the session and the receiver its connection objects report
    /// into; the caller pumps that receiver into
    /// [`NegotiationSession::on_peer_event`].
    pub fn new(
        room: impl Into<String>,
        backend: Arc<B>,
        signals: S,
        config: SessionConfig,
    ) -> (Self, mpsc::UnboundedReceiver<PeerEvent>) {
        let (peer_events, rx) = mpsc::unbounded_channel();
        let session = Self {
            room: room.into(),
            backend,
            signals,
            bus: EventBus::new(),
            state: SessionState::Idle,
            role: Role::Undetermined,
            epoch: 0,
            link: None,
            local_tracks: Vec::new(),
            remote_applied: false,
            pending_candidates: Vec::new(),
            peer_events,
            config,
        };
        (session, rx)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn room(&self) -> &str {
        &self.room
    }

    pub fn events(&mut self) -> &mut EventBus<SessionEvent> {
        &mut self.bus
    }

    pub fn has_live_link(&self) -> bool {
        self.link.is_some()
    }

    /// Dispatch one relayed envelope. Unrecognized control envelopes are
    /// ignored here; the transport layer handles `connection` itself.
    pub async fn handle_signal(&mut self, envelope: ServerEnvelope) {
        match envelope {
            ServerEnvelope::Created => self.on_created().await,
            ServerEnvelope::Joined => self.on_joined().await,
            ServerEnvelope::Ready => self.on_ready().await,
            ServerEnvelope::Offer { offer, .. } => self.on_offer(offer).await,
            ServerEnvelope::Answer { answer, .. } => self.on_answer(answer).await,
            ServerEnvelope::IceCandidate { candidate, .. } => self.on_candidate(candidate).await,
            ServerEnvelope::Leave => self.on_peer_leave().await,
            ServerEnvelope::Full => self.on_room_full().await,
            other => trace!(?other, "envelope not handled by the session"),
        }
    }

    /// Room created with this client as sole member: host-elect. Media is
    /// acquired now; the connection object waits for the counterpart's
    /// `ready` so that every negotiation round starts from a fresh object.
    pub async fn on_created(&mut self) {
        info!(room = %self.room, "room created, electing host");
        self.set_role(Role::Host);
        if self.ensure_media().await {
            self.set_state(SessionState::AwaitingReady);
        }
    }

    /// Second member of an existing room: guest-elect. Announces readiness
    /// once media is attached.
    pub async fn on_joined(&mut self) {
        info!(room = %self.room, "joined room as guest");
        self.set_role(Role::Guest);
        if self.ensure_media().await {
            self.signals.send_ready(&self.room).await;
            self.set_state(SessionState::AwaitingOffer);
        }
    }

    /// Counterpart announced readiness. Host only: builds a fresh
    /// connection, attaches media and sends the offer.
    pub async fn on_ready(&mut self) {
        if self.role != Role::Host {
            debug!("ignoring ready: not the host");
            return;
        }
        // Re-arm after a counterpart leave may have released the media.
        if !self.ensure_media().await {
            return;
        }
        let result = self.initiate_offer().await;
        self.settle(result).await;
    }

    /// Offer from the counterpart. Guest only; a host receiving an offer is
    /// seeing a stale or duplicate message and ignores it.
    pub async fn on_offer(&mut self, offer: SessionDescription) {
        if self.role == Role::Host {
            debug!("ignoring offer: this side is the host");
            return;
        }
        if !self.ensure_media().await {
            return;
        }
        let result = self.answer_offer(offer).await;
        self.settle(result).await;
    }

    /// Answer from the counterpart, host only. With no live connection this
    /// is a stale message after a reset: logged and discarded, never a
    /// fault.
    pub async fn on_answer(&mut self, answer: SessionDescription) {
        let Some(link) = &self.link else {
            warn!("answer received with no live connection, discarding");
            return;
        };
        match link.set_remote_description(answer).await {
            Ok(()) => {
                self.remote_applied = true;
                self.drain_pending_candidates().await;
            }
            Err(e) => self.settle(Err(e)).await,
        }
    }

    /// Connectivity candidate from the counterpart. Buffered whenever the
    /// description it depends on has not been applied yet; dropped only
    /// when no connection exists at all.
    pub async fn on_candidate(&mut self, candidate: IceCandidate) {
        let Some(link) = &self.link else {
            warn!("candidate received with no live connection, dropping");
            return;
        };
        if !self.remote_applied {
            self.pending_candidates.push(candidate);
            return;
        }
        if let Err(e) = link.add_ice_candidate(candidate.clone()).await {
            // The add can fail if the description landed but is not usable
            // yet; keep the candidate for the next drain instead of losing
            // it.
            warn!("candidate apply failed, buffering for retry: {e}");
            self.pending_candidates.push(candidate);
        }
    }

    /// Counterpart left. Tear down and promote this side to host: it is now
    /// the sole room member and the next joiner's `ready` restarts
    /// negotiation cleanly.
    pub async fn on_peer_leave(&mut self) {
        info!(room = %self.room, "counterpart left, re-electing as host");
        self.teardown(TeardownReason::PeerLeft).await;
    }

    pub async fn on_room_full(&mut self) {
        warn!(room = %self.room, "room is full");
        self.teardown(TeardownReason::RoomFull).await;
    }

    /// Explicit local departure.
    pub async fn leave(&mut self) {
        self.signals.send_leave(&self.room).await;
        self.teardown(TeardownReason::LocalLeave).await;
    }

    /// Events from the current (or a replaced) connection object. The epoch
    /// check is the identity guard: completions of a connection that has
    /// since been replaced are discarded wholesale.
    pub async fn on_peer_event(&mut self, event: PeerEvent) {
        if event.epoch != self.epoch {
            trace!(
                stale = event.epoch,
                current = self.epoch,
                "discarding event from replaced connection"
            );
            return;
        }
        match event.kind {
            PeerEventKind::CandidateDiscovered(candidate) => {
                self.signals.send_candidate(&self.room, candidate).await;
            }
            PeerEventKind::TrackReceived => {
                self.bus.emit(&SessionEvent::RemoteTrack);
            }
            PeerEventKind::StateChanged(LinkState::Connected) => {
                info!(room = %self.room, "direct connection established");
                self.set_state(SessionState::Connected);
            }
            PeerEventKind::StateChanged(state) => {
                debug!(?state, "connection state changed");
            }
        }
    }

    async fn initiate_offer(&mut self) -> Result<(), NegotiationError> {
        self.replace_link().await?;
        let Some(link) = &self.link else {
            return Ok(());
        };

        let offer = link.create_offer().await?;
        link.set_local_description(offer.clone()).await?;
        self.signals.send_offer(&self.room, offer).await;
        self.set_state(SessionState::Negotiating);
        Ok(())
    }

    async fn answer_offer(&mut self, offer: SessionDescription) -> Result<(), NegotiationError> {
        self.replace_link().await?;
        let Some(link) = &self.link else {
            return Ok(());
        };

        link.set_remote_description(offer).await?;
        self.remote_applied = true;
        self.drain_pending_candidates().await;

        let Some(link) = &self.link else {
            return Ok(());
        };
        let answer = link.create_answer().await?;
        link.set_local_description(answer.clone()).await?;
        self.signals.send_answer(&self.room, answer).await;
        self.set_state(SessionState::Negotiating);
        Ok(())
    }

    /// At most one live connection object: detach the old one's handlers,
    /// close it, then create the replacement under a new epoch. The
    /// candidate buffer survives — buffered candidates belong to the
    /// negotiation round this new object is for.
    async fn replace_link(&mut self) -> Result<(), NegotiationError> {
        if let Some(old) = self.link.take() {
            old.detach_handlers();
            old.close().await;
        }
        self.remote_applied = false;
        self.epoch += 1;

        let link = self
            .backend
            .create_link(self.epoch, self.peer_events.clone())
            .await?;
        for track in self.local_tracks.clone() {
            link.attach_track(track).await?;
        }
        self.link = Some(link);
        Ok(())
    }

    async fn drain_pending_candidates(&mut self) {
        if self.pending_candidates.is_empty() {
            return;
        }
        let Some(link) = &self.link else { return };
        let buffered = std::mem::take(&mut self.pending_candidates);
        debug!(count = buffered.len(), "applying buffered candidates");
        for candidate in buffered {
            if let Err(e) = link.add_ice_candidate(candidate.clone()).await {
                warn!("buffered candidate apply failed, keeping it: {e}");
                self.pending_candidates.push(candidate);
            }
        }
    }

    /// Acquire local media if not already held, retrying transient failures
    /// per the configured schedule. Returns whether media is attached.
    async fn ensure_media(&mut self) -> bool {
        if !self.local_tracks.is_empty() {
            return true;
        }
        self.set_state(SessionState::AwaitingMedia);

        let mut attempt = 0;
        loop {
            match self.backend.acquire_media().await {
                Ok(tracks) => {
                    self.local_tracks = tracks;
                    return true;
                }
                Err(error) => {
                    let retry_in = error
                        .is_transient()
                        .then(|| self.config.media_retry.delay_for(attempt))
                        .flatten();
                    match retry_in {
                        Some(delay) => {
                            warn!("media acquisition failed ({error}), retrying in {delay:?}");
                            tokio::time::sleep(delay).await;
                            attempt += 1;
                        }
                        None => {
                            self.fail_media(error).await;
                            return false;
                        }
                    }
                }
            }
        }
    }

    async fn fail_media(&mut self, error: MediaError) {
        warn!("media acquisition failed permanently: {error}");
        self.bus.emit(&SessionEvent::MediaError(error.to_string()));
        self.teardown(TeardownReason::Fault).await;
        self.set_state(SessionState::Failed);
    }

    /// Error path for negotiation faults: report, then run the same
    /// teardown as an explicit leave so the connection object is never left
    /// half-configured.
    async fn settle(&mut self, result: Result<(), NegotiationError>) {
        let Err(error) = result else { return };
        warn!("negotiation failed: {error}");
        self.bus
            .emit(&SessionEvent::NegotiationError(error.to_string()));
        self.teardown(TeardownReason::Fault).await;
    }

    async fn teardown(&mut self, reason: TeardownReason) {
        // Detach before close: no event from the discarded object may be
        // observed once teardown has begun.
        if let Some(link) = self.link.take() {
            link.detach_handlers();
            link.close().await;
        }
        self.backend.release_media(&self.local_tracks);
        self.local_tracks.clear();
        self.pending_candidates.clear();
        self.remote_applied = false;

        match reason {
            TeardownReason::PeerLeft => {
                self.bus.emit(&SessionEvent::PeerLeft);
                self.set_role(Role::Host);
                self.set_state(SessionState::AwaitingReady);
            }
            TeardownReason::RoomFull => {
                self.bus.emit(&SessionEvent::RoomFull);
                self.set_state(SessionState::TornDown);
            }
            TeardownReason::LocalLeave => {
                self.role = Role::Undetermined;
                self.set_state(SessionState::Idle);
            }
            TeardownReason::Fault => {
                self.set_state(SessionState::TornDown);
            }
        }
    }

    fn set_role(&mut self, role: Role) {
        if self.role != role {
            self.role = role;
            self.bus.emit(&SessionEvent::RoleAssigned(role));
        }
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state != state {
            self.state = state;
            self.bus.emit(&SessionEvent::StateChanged(state));
        }
    }
}
