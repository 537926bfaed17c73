//! `grpc-websockets` transport.
//!
//! # Framing
//! ```text
//! client → server   first message     header block ("name: value\r\n" lines)
//!                   0x00 + bytes      request body chunk (gRPC-web framed)
//!                   0x01              end of request
//! server → client   0x80 + u32 BE len + header block
//!                   response body chunks (gRPC-web framed, trailers last)
//!                   ping every keepAliveInterval
//! ```

use std::convert::Infallible;

use axum::body::Body;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{FromRequestParts, Request};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, Uri};
use axum::response::{IntoResponse, Response};
use bytes::{BufMut, Bytes, BytesMut};
use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use http_body_util::StreamBody;
use hyper::body::Frame;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_stream::wrappers::ReceiverStream;

use super::detect::GRPC_WEBSOCKETS_PROTOCOL;
use super::server::{dispatch, BridgeState};

const HEADER_FRAME_FLAG: u8 = 0x80;
const BODY_CHUNK: u8 = 0x00;
const END_OF_REQUEST: u8 = 0x01;
const DEFAULT_CONTENT_TYPE: &str = "application/grpc-web+proto";
const BODY_BUFFER: usize = 16;

pub(crate) async fn upgrade(state: BridgeState, request: Request) -> Response {
    let (mut parts, _body) = request.into_parts();
    let ws = match WebSocketUpgrade::from_request_parts(&mut parts, &state).await {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };
    let uri = parts.uri;
    ws.protocols([GRPC_WEBSOCKETS_PROTOCOL])
        .on_upgrade(move |socket| session(socket, uri, state))
}

async fn session(socket: WebSocket, uri: Uri, state: BridgeState) {
    let mut stopping = state.sessions.subscribe();
    let (mut sink, mut stream) = socket.split();

    let headers = tokio::select! {
        headers = next_header_block(&mut stream) => match headers {
            Some(headers) => headers,
            None => return,
        },
        _ = stopping.recv() => {
            let _ = sink.send(Message::Close(None)).await;
            return;
        }
    };

    let (body_tx, body_rx) = mpsc::channel::<Result<Frame<Bytes>, Infallible>>(BODY_BUFFER);
    let mut request = Request::new(Body::new(StreamBody::new(ReceiverStream::new(body_rx))));
    *request.method_mut() = Method::POST;
    *request.uri_mut() = uri.clone();
    *request.headers_mut() = headers;
    let pump = tokio::spawn(pump_request_body(stream, body_tx));

    tracing::debug!(%uri, "Websocket call started");
    let mut keep_alive = tokio::time::interval(state.keep_alive);
    keep_alive.set_missed_tick_behavior(MissedTickBehavior::Delay);
    keep_alive.tick().await;

    // Pings and stop notices keep flowing while the call is still pending.
    let call = dispatch(state.service.clone(), request);
    tokio::pin!(call);
    let response = loop {
        tokio::select! {
            response = &mut call => break Some(response),
            _ = keep_alive.tick() => {
                if sink.send(Message::Ping(Bytes::new())).await.is_err() {
                    break None;
                }
            }
            _ = stopping.recv() => break None,
        }
    };
    let Some(response) = response else {
        let _ = sink.send(Message::Close(None)).await;
        pump.abort();
        tracing::debug!(%uri, "Websocket call ended before a response");
        return;
    };

    if sink
        .send(Message::Binary(header_frame(response.headers())))
        .await
        .is_err()
    {
        pump.abort();
        return;
    }

    let mut data = response.into_body().into_data_stream();
    loop {
        tokio::select! {
            chunk = data.next() => match chunk {
                Some(Ok(bytes)) => {
                    if sink.send(Message::Binary(bytes)).await.is_err() {
                        break;
                    }
                }
                Some(Err(e)) => {
                    tracing::warn!(%uri, error = %e, "Websocket response body failed");
                    break;
                }
                None => break,
            },
            _ = keep_alive.tick() => {
                if sink.send(Message::Ping(Bytes::new())).await.is_err() {
                    break;
                }
            }
            _ = stopping.recv() => break,
        }
    }

    let _ = sink.send(Message::Close(None)).await;
    pump.abort();
    tracing::debug!(%uri, "Websocket call finished");
}

/// Read the first message and parse it as a header block.
async fn next_header_block(stream: &mut SplitStream<WebSocket>) -> Option<HeaderMap> {
    loop {
        let block = match stream.next().await? {
            Ok(Message::Text(text)) => Bytes::copy_from_slice(text.as_str().as_bytes()),
            Ok(Message::Binary(data)) => data,
            Ok(Message::Ping(_) | Message::Pong(_)) => continue,
            Ok(Message::Close(_)) | Err(_) => return None,
        };
        return Some(request_headers(&block));
    }
}

/// Forward body chunks until the client ends the request, then keep
/// draining control messages until the socket closes.
async fn pump_request_body(
    mut stream: SplitStream<WebSocket>,
    body_tx: mpsc::Sender<Result<Frame<Bytes>, Infallible>>,
) {
    let mut body_tx = Some(body_tx);
    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Binary(data)) => match data.first() {
                Some(&END_OF_REQUEST) if data.len() == 1 => body_tx = None,
                Some(&BODY_CHUNK) => {
                    let Some(tx) = &body_tx else {
                        tracing::debug!("Body chunk after end of request");
                        continue;
                    };
                    if tx.send(Ok(Frame::data(data.slice(1..)))).await.is_err() {
                        body_tx = None;
                    }
                }
                _ => tracing::debug!(len = data.len(), "Ignoring malformed websocket frame"),
            },
            Ok(Message::Close(_)) | Err(_) => return,
            Ok(_) => {}
        }
    }
}

/// Parse a header block, forcing a gRPC-web content type.
fn request_headers(block: &[u8]) -> HeaderMap {
    let mut headers = parse_header_block(block);
    headers.remove(header::CONTENT_LENGTH);
    let is_grpc_web = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with(super::detect::GRPC_WEB_CONTENT_TYPE));
    if !is_grpc_web {
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(DEFAULT_CONTENT_TYPE));
    }
    headers
}

fn parse_header_block(block: &[u8]) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for line in String::from_utf8_lossy(block).split("\r\n") {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        match (
            HeaderName::from_bytes(name.trim().as_bytes()),
            HeaderValue::from_str(value.trim()),
        ) {
            (Ok(name), Ok(value)) => {
                headers.append(name, value);
            }
            _ => tracing::debug!(line, "Skipping invalid websocket header line"),
        }
    }
    headers
}

fn header_frame(headers: &HeaderMap) -> Bytes {
    let mut block = BytesMut::new();
    for (name, value) in headers {
        block.put_slice(name.as_str().as_bytes());
        block.put_slice(b": ");
        block.put_slice(value.as_bytes());
        block.put_slice(b"\r\n");
    }
    let mut frame = BytesMut::with_capacity(5 + block.len());
    frame.put_u8(HEADER_FRAME_FLAG);
    frame.put_u32(block.len() as u32);
    frame.put_slice(&block);
    frame.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_block_parsing_tolerates_noise() {
        let headers = parse_header_block(b"x-grpc-web: 1\r\nAuthorization: Bearer t\r\nbogus\r\n\r\n");
        assert_eq!(headers.get("x-grpc-web").unwrap(), "1");
        assert_eq!(headers.get("authorization").unwrap(), "Bearer t");
        assert_eq!(headers.len(), 2);
    }

    #[test]
    fn request_headers_default_to_grpc_web() {
        let headers = request_headers(b"content-type: application/json\r\ncontent-length: 9\r\n");
        assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), DEFAULT_CONTENT_TYPE);
        assert!(headers.get(header::CONTENT_LENGTH).is_none());

        let text = request_headers(b"content-type: application/grpc-web-text\r\n");
        assert_eq!(text.get(header::CONTENT_TYPE).unwrap(), "application/grpc-web-text");
    }

    #[test]
    fn header_frame_is_length_prefixed() {
        let mut headers = HeaderMap::new();
        headers.insert("grpc-status", HeaderValue::from_static("0"));
        let frame = header_frame(&headers);
        assert_eq!(frame[0], HEADER_FRAME_FLAG);
        let len = u32::from_be_bytes([frame[1], frame[2], frame[3], frame[4]]) as usize;
        assert_eq!(&frame[5..], b"grpc-status: 0\r\n");
        assert_eq!(len, frame.len() - 5);
    }
}
