mod backoff;
mod error;
mod events;
mod link;
mod native;
mod session;
mod transport;

pub use backoff::{ReconnectPolicy, Supervisor};
pub use error::{MediaError, NegotiationError, TransportError};
pub use events::{EventBus, HandlerResult, Subscription};
pub use link::{LinkState, PeerBackend, PeerEvent, PeerEventKind, PeerLink, SignalSink};
pub use native::{NativeTrack, WebrtcBackend, WebrtcLink};
pub use session::{NegotiationSession, Role, SessionConfig, SessionEvent, SessionState};
pub use transport::{run_signal_transport, SignalChannel};
