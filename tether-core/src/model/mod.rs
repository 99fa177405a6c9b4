mod client;
mod envelope;
mod ice;
mod sdp;

pub use client::ClientId;
pub use envelope::{Address, ClientEnvelope, ServerEnvelope};
pub use ice::{IceServerConfig, DEFAULT_STUN_ADDRS};
pub use sdp::{IceCandidate, SdpKind, SessionDescription};
