// Websocket push channel - subscribe to streams, yield decoded messages
use crate::domain::event::PushMessage;
use crate::infrastructure::wire::{decode_push, encode_subscribe};
use anyhow::Context;
use futures::{SinkExt, Stream, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;

/// Open the channel, send one subscribe command per stream, and return the
/// inbound messages. Undecodable frames come through as `Err` items; the
/// stream ends when the socket closes.
pub async fn connect_push_channel(
    url: &str,
    protocol: &str,
    streams: &[String],
) -> anyhow::Result<impl Stream<Item = anyhow::Result<PushMessage>> + Send + use<>> {
    let mut request = url
        .into_client_request()
        .with_context(|| format!("Invalid websocket url {}", url))?;
    request
        .headers_mut()
        .insert("Sec-WebSocket-Protocol", HeaderValue::from_str(protocol)?);

    let (socket, _response) = connect_async(request)
        .await
        .with_context(|| format!("Failed to connect to {}", url))?;
    tracing::info!("Push channel open at {}", url);

    let (mut write, mut read) = socket.split();
    for stream in streams {
        write
            .send(Message::Text(encode_subscribe(stream)?))
            .await
            .with_context(|| format!("Failed to subscribe to {}", stream))?;
        tracing::debug!("Subscribed to {}", stream);
    }

    Ok(async_stream::stream! {
        // the write half must outlive the read loop
        let _write = write;
        while let Some(frame) = read.next().await {
            match frame {
                Ok(Message::Text(text)) => yield decode_push(&text),
                Ok(Message::Close(frame)) => {
                    tracing::info!("Push channel closed by peer: {:?}", frame);
                    break;
                }
                Ok(_) => continue,
                Err(e) => {
                    yield Err(anyhow::Error::new(e).context("Push channel read failed"));
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_failure_outlives_arguments() {
        // arguments are temporaries; the result must not borrow them
        let result = connect_push_channel(
            &format!("ws://127.0.0.1:{}/", 9),
            &"lws-minimal".to_string(),
            &vec!["/ws/uls".to_string()],
        )
        .await;

        let err = result.err().map(|e| e.to_string()).unwrap_or_default();
        assert!(err.contains("Failed to connect"), "unexpected: {}", err);
    }
}
