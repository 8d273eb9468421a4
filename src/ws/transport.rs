//! Transport boundary between the connection manager and the network.
//!
//! A [`Transport`] opens [`Session`]s. A session is a pair of channels: text
//! frames go out through [`Session::send`], and everything the socket does
//! comes back, in order, as [`TransportEvent`]s. Dropping a session closes it.
//!
//! [`WsTransport`] is the production implementation over `tokio-tungstenite`.
//! Tests (and embedders with their own socket) can build sessions with
//! [`Session::channel`] and drive the [`SessionPeer`] end directly.

use futures_util::future::BoxFuture;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::error::{FeedError, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Something that happened on an open session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A text payload from the server.
    Message(String),
    /// The session is gone. No further events follow.
    Closed {
        /// WebSocket close code, when the server sent one.
        code: Option<u16>,
        /// Close reason or a description of why the stream ended.
        reason: String,
    },
    /// A protocol or I/O error that did not by itself end the session.
    Error(String),
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One open connection to the feed.
#[derive(Debug)]
pub struct Session {
    outbound: mpsc::UnboundedSender<String>,
    inbound: mpsc::UnboundedReceiver<TransportEvent>,
}

/// The transport-side end of a [`Session`].
#[derive(Debug)]
pub struct SessionPeer {
    /// Frames the client wrote, in order.
    pub outbound: mpsc::UnboundedReceiver<String>,
    /// Events to deliver to the client.
    pub inbound: mpsc::UnboundedSender<TransportEvent>,
}

impl Session {
    /// Create a connected session/peer pair.
    pub fn channel() -> (Session, SessionPeer) {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        (
            Session {
                outbound: out_tx,
                inbound: in_rx,
            },
            SessionPeer {
                outbound: out_rx,
                inbound: in_tx,
            },
        )
    }

    /// Queue a text frame for writing.
    pub fn send(&self, text: String) -> Result<()> {
        self.outbound
            .send(text)
            .map_err(|_| FeedError::SessionClosed)
    }

    /// Wait for the next event. `None` means the transport side went away.
    pub async fn next_event(&mut self) -> Option<TransportEvent> {
        self.inbound.recv().await
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// Opens sessions to a feed endpoint.
///
/// The returned future resolving is the session's *open* event; resolving to
/// an error is treated exactly like a close.
pub trait Transport: Send + Sync + 'static {
    /// Open a new session to `url`.
    fn open(&self, url: &str) -> BoxFuture<'static, Result<Session>>;
}

/// WebSocket transport backed by `tokio-tungstenite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsTransport;

impl Transport for WsTransport {
    fn open(&self, url: &str) -> BoxFuture<'static, Result<Session>> {
        let url = url.to_owned();
        Box::pin(async move {
            let (ws, _resp) = connect_async(url).await?;
            let (session, peer) = Session::channel();
            tokio::spawn(pump(ws, peer));
            tracing::info!("Connected to trade-feed WebSocket");
            Ok(session)
        })
    }
}

/// Shuttle frames between the socket and the session channels until either
/// side goes away.
async fn pump(ws: WsStream, peer: SessionPeer) {
    let SessionPeer {
        mut outbound,
        inbound,
    } = peer;
    let (mut write, mut read) = ws.split();

    loop {
        tokio::select! {
            out = outbound.recv() => match out {
                Some(text) => {
                    if let Err(e) = write.send(Message::Text(text.into())).await {
                        tracing::warn!(error = %e, "WebSocket send failed");
                        let _ = inbound.send(TransportEvent::Error(e.to_string()));
                    }
                }
                None => {
                    // Session dropped by its owner.
                    let _ = write.send(Message::Close(None)).await;
                    tracing::debug!("WebSocket closed by client");
                    break;
                }
            },
            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    let _ = inbound.send(TransportEvent::Message(text.as_str().to_owned()));
                }
                Some(Ok(Message::Binary(data))) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => {
                        let _ = inbound.send(TransportEvent::Message(text));
                    }
                    Err(_) => {
                        let _ = inbound.send(TransportEvent::Error(
                            "received non-UTF-8 binary frame".into(),
                        ));
                    }
                },
                // Ping/pong frames are answered by tungstenite
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {}
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = match frame {
                        Some(f) => (Some(u16::from(f.code)), f.reason.as_str().to_owned()),
                        None => (None, "closed by server".to_owned()),
                    };
                    tracing::info!(?code, %reason, "WebSocket closed by server");
                    let _ = inbound.send(TransportEvent::Closed { code, reason });
                    break;
                }
                Some(Err(e)) => {
                    tracing::error!(error = %e, "WebSocket error");
                    let _ = inbound.send(TransportEvent::Closed {
                        code: None,
                        reason: e.to_string(),
                    });
                    break;
                }
                None => {
                    tracing::info!("WebSocket stream ended");
                    let _ = inbound.send(TransportEvent::Closed {
                        code: None,
                        reason: "stream ended".into(),
                    });
                    break;
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn session_channel_round_trips() {
        let (mut session, mut peer) = Session::channel();

        session.send("hello".into()).unwrap();
        assert_eq!(peer.outbound.recv().await.as_deref(), Some("hello"));

        peer.inbound
            .send(TransportEvent::Message("world".into()))
            .unwrap();
        assert_eq!(
            session.next_event().await,
            Some(TransportEvent::Message("world".into()))
        );
    }

    #[tokio::test]
    async fn send_fails_once_peer_is_gone() {
        let (mut session, peer) = Session::channel();
        drop(peer);

        assert!(matches!(
            session.send("x".into()),
            Err(FeedError::SessionClosed)
        ));
        assert_eq!(session.next_event().await, None);
    }
}
