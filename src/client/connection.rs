//! WebSocket client for a match server

use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::COOKIE;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use url::Url;

use crate::network::identity::TOKEN_COOKIE;
use crate::network::protocol::{ClientMessage, ServerMessage};

/// Close code reported when the socket dropped without a close frame.
pub const ABNORMAL_CLOSE: u16 = 1006;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Server URL could not be built
    #[error("Invalid server URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// Token is not a valid header value
    #[error("Invalid token")]
    InvalidToken,
    /// WebSocket failure
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    /// Connection already gone
    #[error("Disconnected")]
    Disconnected,
}

/// Something that arrived from the server.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// Protocol message
    Message(ServerMessage),
    /// Connection closed
    Closed {
        /// WebSocket close code
        code: u16,
        /// Close reason text
        reason: String,
    },
}

/// Connected match client.
///
/// Dropping the client closes the socket: the writer task sends a
/// close frame once the outgoing sender is gone.
pub struct MatchClient {
    outgoing: mpsc::UnboundedSender<ClientMessage>,
    incoming: mpsc::UnboundedReceiver<ClientEvent>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl MatchClient {
    /// Connect to `base_url`, joining room `code`.
    pub async fn connect(base_url: &str, code: &str, name: Option<&str>) -> Result<Self, ClientError> {
        Self::connect_with_token(base_url, code, name, None).await
    }

    /// Connect presenting an access token cookie.
    pub async fn connect_with_token(
        base_url: &str,
        code: &str,
        name: Option<&str>,
        token: Option<&str>,
    ) -> Result<Self, ClientError> {
        let url = join_url(base_url, code, name)?;
        info!("Connecting to {}", url);

        let mut request = url.as_str().into_client_request()?;
        if let Some(token) = token {
            let cookie = HeaderValue::from_str(&format!("{}={}", TOKEN_COOKIE, token))
                .map_err(|_| ClientError::InvalidToken)?;
            request.headers_mut().insert(COOKIE, cookie);
        }

        let (ws_stream, _) = connect_async(request).await?;
        let (mut write, mut read) = ws_stream.split();

        let (outgoing_tx, mut outgoing_rx) = mpsc::unbounded_channel::<ClientMessage>();
        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel::<ClientEvent>();

        let reader = tokio::spawn(async move {
            let mut closed = None;
            while let Some(msg_result) = read.next().await {
                match msg_result {
                    Ok(Message::Text(text)) => match ServerMessage::from_json(&text) {
                        Ok(server_msg) => {
                            debug!("Received {}", server_msg.kind());
                            let _ = incoming_tx.send(ClientEvent::Message(server_msg));
                        }
                        Err(e) => {
                            warn!("Failed to parse server message: {} - {}", e, text);
                        }
                    },
                    Ok(Message::Close(frame)) => {
                        closed = Some(match frame {
                            Some(frame) => ClientEvent::Closed {
                                code: u16::from(frame.code),
                                reason: frame.reason.into_owned(),
                            },
                            None => ClientEvent::Closed { code: 1005, reason: String::new() },
                        });
                        break;
                    }
                    Err(e) => {
                        debug!("WebSocket read error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }
            let event = closed.unwrap_or(ClientEvent::Closed {
                code: ABNORMAL_CLOSE,
                reason: String::new(),
            });
            let _ = incoming_tx.send(event);
        });

        let writer = tokio::spawn(async move {
            while let Some(msg) = outgoing_rx.recv().await {
                let json = match msg.to_json() {
                    Ok(json) => json,
                    Err(e) => {
                        warn!("Failed to encode message: {}", e);
                        continue;
                    }
                };
                if write.send(Message::Text(json)).await.is_err() {
                    return;
                }
            }
            let _ = write.send(Message::Close(None)).await;
        });

        Ok(Self {
            outgoing: outgoing_tx,
            incoming: incoming_rx,
            reader,
            writer,
        })
    }

    /// Queue a message for the server.
    pub fn send(&self, msg: ClientMessage) -> Result<(), ClientError> {
        self.outgoing.send(msg).map_err(|_| ClientError::Disconnected)
    }

    /// Next event, waiting for one. `None` once everything has been read.
    pub async fn recv(&mut self) -> Option<ClientEvent> {
        self.incoming.recv().await
    }

    /// Next event if one is already queued.
    pub fn try_recv(&mut self) -> Option<ClientEvent> {
        self.incoming.try_recv().ok()
    }

    /// Close the socket and wait for the writer to flush.
    pub async fn close(self) {
        let MatchClient { outgoing, incoming, reader, writer } = self;
        drop(outgoing);
        let _ = writer.await;
        drop(incoming);
        reader.abort();
    }
}

/// Build the join URL with `code` and optional `name` query parameters.
pub fn join_url(base_url: &str, code: &str, name: Option<&str>) -> Result<Url, ClientError> {
    let mut params = vec![("code", code)];
    if let Some(name) = name {
        params.push(("name", name));
    }
    Ok(Url::parse_with_params(base_url, &params)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_url() {
        let url = join_url("ws://127.0.0.1:8080/", "ab12", Some("Ann Lee")).unwrap();
        assert_eq!(url.as_str(), "ws://127.0.0.1:8080/?code=ab12&name=Ann+Lee");

        let url = join_url("ws://localhost:9000/game", "x", None).unwrap();
        assert_eq!(url.query(), Some("code=x"));
    }

    #[test]
    fn test_join_url_rejects_garbage() {
        assert!(matches!(join_url("not a url", "x", None), Err(ClientError::InvalidUrl(_))));
    }
}
