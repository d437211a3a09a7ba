//! WebSocket connector over a plain TCP stream.

use std::io::ErrorKind;
use std::net::TcpStream;
use std::time::Duration;

use tracing::trace;
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Error as WsError, Message as WsMessage, WebSocket};
use url::Url;

use super::{Channel, Connector, Frame};
use crate::error::TransportError;

/// Opens websocket connections with a socket read timeout.
#[derive(Debug, Clone, Copy)]
pub struct WsConnector {
    read_timeout: Duration,
}

impl WsConnector {
    /// `read_timeout` bounds each [`Channel::recv`] call.
    pub const fn new(read_timeout: Duration) -> Self {
        Self { read_timeout }
    }
}

impl Connector for WsConnector {
    type Channel = WsChannel;

    fn open(&mut self, endpoint: &Url) -> Result<WsChannel, TransportError> {
        let (socket, response) =
            tungstenite::connect(endpoint.as_str()).map_err(|source| TransportError::Connect {
                endpoint: endpoint.to_string(),
                source: Box::new(source),
            })?;
        trace!(status = %response.status(), "websocket handshake complete");

        if let MaybeTlsStream::Plain(stream) = socket.get_ref() {
            stream.set_read_timeout(Some(self.read_timeout))?;
        }
        Ok(WsChannel { socket })
    }
}

/// An open websocket.
pub struct WsChannel {
    socket: WebSocket<MaybeTlsStream<TcpStream>>,
}

impl Channel for WsChannel {
    fn recv(&mut self) -> Result<Option<Frame>, TransportError> {
        match self.socket.read() {
            Ok(WsMessage::Text(text)) => Ok(Some(Frame::Text(text))),
            Ok(WsMessage::Binary(bytes)) => Ok(Some(Frame::Binary(bytes))),
            Ok(WsMessage::Close(frame)) => {
                trace!(?frame, "close frame");
                Ok(Some(Frame::Close))
            }
            // Pongs are queued by tungstenite itself
            Ok(WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_)) => Ok(None),
            Err(WsError::Io(e))
                if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
            {
                Ok(None)
            }
            Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => Err(TransportError::Closed),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for WsChannel {
    fn drop(&mut self) {
        if self.socket.can_write() {
            let _ = self.socket.close(None);
            let _ = self.socket.flush();
        }
    }
}
