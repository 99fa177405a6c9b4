use crate::error::{MediaError, NegotiationError};
use crate::link::{LinkState, PeerBackend, PeerEvent, PeerEventKind, PeerLink};
use async_trait::async_trait;
use std::sync::Arc;
use tether_core::{IceCandidate, IceServerConfig, SdpKind, SessionDescription};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::track::track_local::TrackLocal;

/// Local media handle for the native backend. The capture lifecycle is
/// owned by whoever built the tracks; the session only attaches them.
pub type NativeTrack = Arc<dyn TrackLocal + Send + Sync>;

type MediaProvider = Box<dyn Fn() -> Result<Vec<NativeTrack>, MediaError> + Send + Sync>;

/// [`PeerBackend`] over the `webrtc` crate.
pub struct WebrtcBackend {
    ice_servers: Vec<IceServerConfig>,
    media: MediaProvider,
}

impl WebrtcBackend {
    pub fn new<F>(ice_servers: Vec<IceServerConfig>, media: F) -> Self
    where
        F: Fn() -> Result<Vec<NativeTrack>, MediaError> + Send + Sync + 'static,
    {
        Self {
            ice_servers,
            media: Box::new(media),
        }
    }
}

#[async_trait]
impl PeerBackend for WebrtcBackend {
    type Track = NativeTrack;
    type Link = WebrtcLink;

    async fn acquire_media(&self) -> Result<Vec<NativeTrack>, MediaError> {
        (self.media)()
    }

    fn release_media(&self, tracks: &[NativeTrack]) {
        // Track lifetime belongs to the media provider; nothing to stop
        // here beyond letting the handles go.
        debug!(count = tracks.len(), "releasing local track handles");
    }

    async fn create_link(
        &self,
        epoch: u64,
        events: mpsc::UnboundedSender<PeerEvent>,
    ) -> Result<WebrtcLink, NegotiationError> {
        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .map_err(|e| NegotiationError::Connection(e.to_string()))?;
        let registry = register_default_interceptors(Registry::new(), &mut media_engine)
            .map_err(|e| NegotiationError::Connection(e.to_string()))?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: self
                .ice_servers
                .iter()
                .map(|server| RTCIceServer {
                    urls: server.urls.clone(),
                    username: server.username.clone().unwrap_or_default(),
                    credential: server.credential.clone().unwrap_or_default(),
                })
                .collect(),
            ..Default::default()
        };

        let pc = Arc::new(
            api.new_peer_connection(rtc_config)
                .await
                .map_err(|e| NegotiationError::Connection(e.to_string()))?,
        );

        let link = WebrtcLink { pc, epoch };
        link.install_handlers(events);
        Ok(link)
    }
}

/// One live `RTCPeerConnection`, reporting its callbacks as epoch-stamped
/// [`PeerEvent`]s.
pub struct WebrtcLink {
    pc: Arc<RTCPeerConnection>,
    epoch: u64,
}

impl WebrtcLink {
    fn install_handlers(&self, events: mpsc::UnboundedSender<PeerEvent>) {
        let epoch = self.epoch;

        let ice_tx = events.clone();
        self.pc
            .on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
                let tx = ice_tx.clone();
                Box::pin(async move {
                    let Some(candidate) = candidate else { return };
                    let Ok(init) = candidate.to_json() else {
                        return;
                    };
                    let _ = tx.send(PeerEvent {
                        epoch,
                        kind: PeerEventKind::CandidateDiscovered(IceCandidate {
                            candidate: init.candidate,
                            sdp_mid: init.sdp_mid,
                            sdp_m_line_index: init.sdp_mline_index,
                        }),
                    });
                })
            }));

        let track_tx = events.clone();
        self.pc.on_track(Box::new(move |track, _receiver, _transceiver| {
            let tx = track_tx.clone();
            debug!(id = %track.id(), "remote track received");
            Box::pin(async move {
                let _ = tx.send(PeerEvent {
                    epoch,
                    kind: PeerEventKind::TrackReceived,
                });
            })
        }));

        let state_tx = events;
        self.pc.on_peer_connection_state_change(Box::new(
            move |state: RTCPeerConnectionState| {
                let tx = state_tx.clone();
                Box::pin(async move {
                    let mapped = match state {
                        RTCPeerConnectionState::New => LinkState::New,
                        RTCPeerConnectionState::Connecting => LinkState::Connecting,
                        RTCPeerConnectionState::Connected => LinkState::Connected,
                        RTCPeerConnectionState::Disconnected => LinkState::Disconnected,
                        RTCPeerConnectionState::Failed => LinkState::Failed,
                        _ => LinkState::Closed,
                    };
                    let _ = tx.send(PeerEvent {
                        epoch,
                        kind: PeerEventKind::StateChanged(mapped),
                    });
                })
            },
        ));
    }

    fn to_rtc_description(
        desc: SessionDescription,
    ) -> Result<RTCSessionDescription, NegotiationError> {
        let result = match desc.kind {
            SdpKind::Offer => RTCSessionDescription::offer(desc.sdp),
            SdpKind::Answer => RTCSessionDescription::answer(desc.sdp),
        };
        result.map_err(|e| NegotiationError::Description(e.to_string()))
    }
}

#[async_trait]
impl PeerLink for WebrtcLink {
    type Track = NativeTrack;

    async fn attach_track(&self, track: NativeTrack) -> Result<(), NegotiationError> {
        self.pc
            .add_track(track)
            .await
            .map(|_| ())
            .map_err(|e| NegotiationError::Track(e.to_string()))
    }

    async fn create_offer(&self) -> Result<SessionDescription, NegotiationError> {
        let offer = self
            .pc
            .create_offer(None)
            .await
            .map_err(|e| NegotiationError::Description(e.to_string()))?;
        Ok(SessionDescription::offer(offer.sdp))
    }

    async fn create_answer(&self) -> Result<SessionDescription, NegotiationError> {
        let answer = self
            .pc
            .create_answer(None)
            .await
            .map_err(|e| NegotiationError::Description(e.to_string()))?;
        Ok(SessionDescription::answer(answer.sdp))
    }

    async fn set_local_description(
        &self,
        desc: SessionDescription,
    ) -> Result<(), NegotiationError> {
        let desc = Self::to_rtc_description(desc)?;
        self.pc
            .set_local_description(desc)
            .await
            .map_err(|e| NegotiationError::Description(e.to_string()))
    }

    async fn set_remote_description(
        &self,
        desc: SessionDescription,
    ) -> Result<(), NegotiationError> {
        let desc = Self::to_rtc_description(desc)?;
        self.pc
            .set_remote_description(desc)
            .await
            .map_err(|e| NegotiationError::Description(e.to_string()))
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), NegotiationError> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_m_line_index,
            username_fragment: None,
        };
        self.pc
            .add_ice_candidate(init)
            .await
            .map_err(|e| NegotiationError::Candidate(e.to_string()))
    }

    fn detach_handlers(&self) {
        // Installing no-op handlers severs event delivery synchronously;
        // callbacks already in flight carry a stale epoch and are filtered
        // by the session anyway.
        self.pc
            .on_ice_candidate(Box::new(|_| Box::pin(async {})));
        self.pc
            .on_track(Box::new(|_, _, _| Box::pin(async {})));
        self.pc
            .on_peer_connection_state_change(Box::new(|_| Box::pin(async {})));
    }

    async fn close(&self) {
        if let Err(e) = self.pc.close().await {
            warn!("peer connection close failed: {e}");
        }
    }
}
