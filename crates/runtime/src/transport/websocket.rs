//! WebSocket transport over tokio-tungstenite.

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::ORIGIN;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use super::{
	CloseCode, Connector, Endpoint, Frame, TransportError, TransportErrorKind, TransportFuture, TransportParts,
	TransportReceiver, TransportSender,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens `ws://` connections with the `Origin` header set.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

impl Connector for WebSocketConnector {
	fn connect(&self, endpoint: Endpoint) -> TransportFuture<'_, Result<TransportParts, TransportError>> {
		Box::pin(async move {
			let mut request = endpoint.url.as_str().into_client_request().map_err(TransportError::from)?;
			let origin = HeaderValue::from_str(&endpoint.origin)
				.map_err(|e| TransportError::new(TransportErrorKind::Other, format!("invalid Origin header: {e}")))?;
			request.headers_mut().insert(ORIGIN, origin);

			tracing::debug!(url = %endpoint.url, "opening websocket");
			let (stream, _response) = connect_async(request).await.map_err(TransportError::from)?;
			let (sink, stream) = stream.split();

			Ok(TransportParts {
				sender: Box::new(WebSocketSender { sink }),
				receiver: Box::new(WebSocketReceiver { stream }),
			})
		})
	}
}

/// Write half of a websocket connection.
pub struct WebSocketSender {
	sink: SplitSink<WsStream, Message>,
}

impl TransportSender for WebSocketSender {
	fn send_text(&mut self, text: String) -> TransportFuture<'_, Result<(), TransportError>> {
		Box::pin(async move { self.sink.send(Message::Text(text)).await.map_err(TransportError::from) })
	}

	fn close(&mut self, code: CloseCode) -> TransportFuture<'_, Result<(), TransportError>> {
		Box::pin(async move {
			let frame = CloseFrame {
				code: code.as_u16().into(),
				reason: "".into(),
			};
			self.sink
				.send(Message::Close(Some(frame)))
				.await
				.map_err(TransportError::from)
		})
	}
}

/// Read half of a websocket connection.
pub struct WebSocketReceiver {
	stream: SplitStream<WsStream>,
}

impl TransportReceiver for WebSocketReceiver {
	fn recv(&mut self) -> TransportFuture<'_, Option<Result<Frame, TransportError>>> {
		Box::pin(async move {
			loop {
				let message = match self.stream.next().await? {
					Ok(message) => message,
					Err(err) => return Some(Err(TransportError::from(err))),
				};
				match message {
					Message::Text(text) => return Some(Ok(Frame::Text(text))),
					Message::Binary(bytes) => return Some(Ok(Frame::Binary(bytes))),
					Message::Close(frame) => {
						let reason = frame
							.map(|f| format!("host closed the connection ({})", u16::from(f.code)))
							.unwrap_or_else(|| "host closed the connection".to_string());
						return Some(Err(TransportError::closed(reason)));
					}
					// Ping/pong are answered by tungstenite itself.
					Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
				}
			}
		})
	}
}

impl From<WsError> for TransportError {
	fn from(err: WsError) -> Self {
		match err {
			WsError::ConnectionClosed | WsError::AlreadyClosed => TransportError::closed(err.to_string()),
			WsError::Io(io) => TransportError::from(io),
			WsError::Utf8 | WsError::Capacity(_) => TransportError::new(TransportErrorKind::Frame, err.to_string()),
			WsError::Url(_) | WsError::Http(_) | WsError::HttpFormat(_) => {
				TransportError::new(TransportErrorKind::Refused, err.to_string())
			}
			other => TransportError::new(TransportErrorKind::Other, other.to_string()),
		}
	}
}
