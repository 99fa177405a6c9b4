use crate::model::client::ClientId;
use crate::model::sdp::{IceCandidate, SessionDescription};
use serde::{Deserialize, Serialize};

/// Where a relayed negotiation message should go: everyone else in a named
/// room, or one specific registered peer. The relay picks its resolution
/// strategy from whichever field the sender supplied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Address {
    Room {
        #[serde(rename = "roomName")]
        room: String,
    },
    Peer {
        target: String,
    },
}

impl Address {
    pub fn room(name: impl Into<String>) -> Self {
        Self::Room { room: name.into() }
    }

    pub fn peer(target: impl Into<String>) -> Self {
        Self::Peer {
            target: target.into(),
        }
    }
}

/// Client → relay envelopes. JSON-text on the wire, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientEnvelope {
    Join {
        #[serde(rename = "roomName")]
        room: String,
    },
    Ready {
        #[serde(rename = "roomName")]
        room: String,
    },
    Offer {
        #[serde(flatten)]
        to: Address,
        payload: SessionDescription,
    },
    Answer {
        #[serde(flatten)]
        to: Address,
        payload: SessionDescription,
    },
    IceCandidate {
        #[serde(flatten)]
        to: Address,
        payload: IceCandidate,
    },
    Leave {
        #[serde(rename = "roomName")]
        room: String,
    },
    /// Bind a human-readable name to this connection (identifier-addressed
    /// flow only).
    Register {
        username: String,
    },
    #[serde(rename = "call_request")]
    CallRequest {
        to: String,
    },
    #[serde(rename = "call_accepted")]
    CallAccepted {
        to: String,
    },
    #[serde(rename = "call_rejected")]
    CallRejected {
        to: String,
    },
}

/// Relay → client envelopes.
///
/// `from` is always resolved server-side from the sending connection,
/// never copied out of the sender's own envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerEnvelope {
    /// Sent once on transport accept, carrying the assigned id.
    Connection {
        #[serde(rename = "clientId")]
        client_id: ClientId,
    },
    /// The sender is the first member of the room: host-elect.
    Created,
    /// The sender is the second member: guest-elect.
    Joined,
    /// Capacity exceeded; no room state changed.
    Full,
    Ready,
    Offer {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<String>,
        offer: SessionDescription,
    },
    Answer {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<String>,
        answer: SessionDescription,
    },
    IceCandidate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<String>,
        candidate: IceCandidate,
    },
    Leave,
    #[serde(rename = "incoming_call")]
    IncomingCall {
        from: String,
    },
    #[serde(rename = "call_accepted")]
    CallAccepted {
        from: String,
    },
    #[serde(rename = "call_rejected")]
    CallRejected {
        from: String,
    },
    Error {
        message: String,
    },
}
