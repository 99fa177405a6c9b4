use crate::backoff::Supervisor;
use crate::error::TransportError;
use crate::link::SignalSink;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tether_core::{Address, ClientEnvelope, IceCandidate, ServerEnvelope, SessionDescription};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

/// Outbound half of the signaling transport. Cloneable; envelopes are
/// queued on an unbounded channel consumed by [`run_signal_transport`], so
/// sending never blocks a session transition.
#[derive(Clone)]
pub struct SignalChannel {
    outbound: mpsc::UnboundedSender<ClientEnvelope>,
}

impl SignalChannel {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ClientEnvelope>) {
        let (outbound, rx) = mpsc::unbounded_channel();
        (Self { outbound }, rx)
    }

    pub fn join(&self, room: &str) {
        self.push(ClientEnvelope::Join {
            room: room.to_string(),
        });
    }

    fn push(&self, envelope: ClientEnvelope) {
        if self.outbound.send(envelope).is_err() {
            warn!("signaling transport is gone, dropping envelope");
        }
    }
}

#[async_trait]
impl SignalSink for SignalChannel {
    async fn send_ready(&self, room: &str) {
        self.push(ClientEnvelope::Ready {
            room: room.to_string(),
        });
    }

    async fn send_offer(&self, room: &str, offer: SessionDescription) {
        self.push(ClientEnvelope::Offer {
            to: Address::room(room),
            payload: offer,
        });
    }

    async fn send_answer(&self, room: &str, answer: SessionDescription) {
        self.push(ClientEnvelope::Answer {
            to: Address::room(room),
            payload: answer,
        });
    }

    async fn send_candidate(&self, room: &str, candidate: IceCandidate) {
        self.push(ClientEnvelope::IceCandidate {
            to: Address::room(room),
            payload: candidate,
        });
    }

    async fn send_leave(&self, room: &str) {
        self.push(ClientEnvelope::Leave {
            room: room.to_string(),
        });
    }
}

/// Supervised WebSocket loop: connect, pump envelopes both ways, and on
/// failure retry on the supervisor's schedule. Inbound envelopes (including
/// the `connection` id envelope after every reconnect) land on `inbound`
/// for the session driver; a rejoining client restarts negotiation from
/// `join`/`ready` rather than replaying history.
pub async fn run_signal_transport(
    url: &str,
    mut outbound: mpsc::UnboundedReceiver<ClientEnvelope>,
    inbound: mpsc::UnboundedSender<ServerEnvelope>,
    mut supervisor: Supervisor,
) -> Result<(), TransportError> {
    loop {
        match connect_async(url).await {
            Ok((stream, _)) => {
                info!(url, "signaling transport connected");
                supervisor.reset();
                pump(stream, &mut outbound, &inbound).await;
                if supervisor.is_cancelled() {
                    return Ok(());
                }
                warn!(url, "signaling transport closed");
            }
            Err(e) => warn!(url, "signaling connect failed: {e}"),
        }

        match supervisor.next_delay() {
            Some(delay) => {
                debug!(attempt = supervisor.attempts(), ?delay, "reconnecting");
                tokio::time::sleep(delay).await;
            }
            None => return Err(TransportError::RetriesExhausted(supervisor.attempts())),
        }
    }
}

async fn pump(
    mut stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    outbound: &mut mpsc::UnboundedReceiver<ClientEnvelope>,
    inbound: &mpsc::UnboundedSender<ServerEnvelope>,
) {
    loop {
        tokio::select! {
            envelope = outbound.recv() => {
                let Some(envelope) = envelope else { return };
                let json = match serde_json::to_string(&envelope) {
                    Ok(json) => json,
                    Err(e) => {
                        warn!("failed to encode envelope: {e}");
                        continue;
                    }
                };
                if stream.send(Message::Text(json)).await.is_err() {
                    return;
                }
            }
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ServerEnvelope>(&text) {
                            Ok(envelope) => {
                                if inbound.send(envelope).is_err() {
                                    return;
                                }
                            }
                            Err(e) => warn!("invalid server envelope, discarding: {e}"),
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => return,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("websocket read failed: {e}");
                        return;
                    }
                }
            }
        }
    }
}
