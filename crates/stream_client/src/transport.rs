use std::fmt;
use std::future::Future;
use std::str::FromStr;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::debug;

use crate::error::StreamError;

/// `host:port` of the snapshot server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn url(&self, path: &str) -> String {
        if self.host.contains(':') {
            format!("ws://[{}]:{}{}", self.host, self.port, path)
        } else {
            format!("ws://{}:{}{}", self.host, self.port, path)
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for Endpoint {
    type Err = StreamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || StreamError::InvalidEndpoint(s.to_string());
        let (host, port) = s.trim().rsplit_once(':').ok_or_else(invalid)?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return Err(invalid());
        }
        let port = port.parse().map_err(|_| invalid())?;
        Ok(Endpoint::new(host, port))
    }
}

/// What a connection yielded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    Text(String),
    /// The peer closed the session.
    Closed(String),
}

/// One open session with the server.
pub trait Connection: Send + 'static {
    fn send_text(&mut self, text: String) -> impl Future<Output = Result<(), StreamError>> + Send;
    fn recv(&mut self) -> impl Future<Output = Result<Incoming, StreamError>> + Send;
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

/// Opens sessions. Implemented for WebSockets and by test doubles.
pub trait Transport: Send + Sync + 'static {
    type Conn: Connection;

    fn connect(&self, url: &str) -> impl Future<Output = Result<Self::Conn, StreamError>> + Send;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketTransport;

impl Transport for WebSocketTransport {
    type Conn = WebSocketConnection;

    async fn connect(&self, url: &str) -> Result<WebSocketConnection, StreamError> {
        let (stream, response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|source| StreamError::Connect {
                url: url.to_string(),
                source,
            })?;
        debug!(url, status = %response.status(), "websocket handshake complete");
        Ok(WebSocketConnection { stream })
    }
}

pub struct WebSocketConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl Connection for WebSocketConnection {
    async fn send_text(&mut self, text: String) -> Result<(), StreamError> {
        self.stream.send(Message::Text(text)).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<Incoming, StreamError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Incoming::Text(text)),
                Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                    Ok(text) => return Ok(Incoming::Text(text)),
                    Err(_) => debug!("ignoring non-utf8 binary frame"),
                },
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame
                        .map(|f| f.reason.to_string())
                        .filter(|r| !r.is_empty())
                        .unwrap_or_else(|| "server closed the connection".to_string());
                    return Ok(Incoming::Closed(reason));
                }
                // Pings are answered by tungstenite itself.
                Some(Ok(_)) => {}
                Some(Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed))
                | None => return Ok(Incoming::Closed("connection ended".to_string())),
                Some(Err(err)) => return Err(err.into()),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(err) = self.stream.close(None).await {
            debug!(error = %err, "websocket close failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_endpoint() {
        let ep: Endpoint = "localhost:8000".parse().unwrap();
        assert_eq!(ep, Endpoint::new("localhost", 8000));
        assert_eq!(ep.url("/ws"), "ws://localhost:8000/ws");
        assert_eq!(ep.to_string(), "localhost:8000");

        let v6: Endpoint = "[::1]:9000".parse().unwrap();
        assert_eq!(v6.host, "::1");
        assert_eq!(v6.url(""), "ws://[::1]:9000");
    }

    #[test]
    fn test_reject_bad_endpoints() {
        for bad in ["localhost", ":8000", "host:http", "host:70000"] {
            assert!(
                matches!(bad.parse::<Endpoint>(), Err(StreamError::InvalidEndpoint(_))),
                "{bad}"
            );
        }
    }
}
