pub mod model;

pub use model::{
    Address, ClientEnvelope, ClientId, IceCandidate, IceServerConfig, SdpKind, ServerEnvelope,
    SessionDescription, DEFAULT_STUN_ADDRS,
};
