// WebSocket transport built on tokio-tungstenite.
//
// Each link runs two tasks: a writer draining the outbound channel into the
// socket, and a reader forwarding text frames into the inbound channel.

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, trace};
use url::Url;

use super::{ConnectFuture, Connector, Link, LinkEvent, TransportError};

#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl Connector for WsConnector {
    fn connect(&self, endpoint: &Url) -> ConnectFuture {
        let endpoint = endpoint.to_string();
        Box::pin(async move {
            let (socket, _response) = connect_async(endpoint.as_str())
                .await
                .map_err(|error| TransportError::Connect(error.to_string()))?;
            let (mut writer, mut reader) = socket.split();

            let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
            let (in_tx, in_rx) = mpsc::unbounded_channel::<LinkEvent>();

            tokio::spawn(async move {
                while let Some(text) = out_rx.recv().await {
                    if let Err(error) = writer.send(Message::Text(text.into())).await {
                        debug!(%error, "websocket write failed");
                        return;
                    }
                }
                // Outbound side dropped: the link was closed locally.
                let _ = writer.close().await;
            });

            let reader_task = tokio::spawn(async move {
                while let Some(frame) = reader.next().await {
                    let event = match frame {
                        Ok(Message::Text(text)) => LinkEvent::Text(text.as_str().to_owned()),
                        Ok(Message::Close(frame)) => {
                            LinkEvent::Closed(frame.map(|f| f.reason.as_str().to_owned()))
                        }
                        Ok(other) => {
                            trace!(?other, "ignoring non-text websocket frame");
                            continue;
                        }
                        Err(error) => LinkEvent::Error(error.to_string()),
                    };
                    let terminal = !matches!(event, LinkEvent::Text(_));
                    if in_tx.send(event).is_err() || terminal {
                        return;
                    }
                }
                let _ = in_tx.send(LinkEvent::Closed(None));
            });

            Ok(Link::new(out_tx, in_rx).abort_on_drop(reader_task))
        })
    }
}
