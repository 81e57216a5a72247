//! Inbound receive loop with multi-frame reassembly.
//!
//! One loop runs per active connection and exits when the connection is
//! aborted, the client is disposed, or the per-connection scope fires.
//! Frames are read into a reusable fixed buffer; a message split across
//! frames is accumulated with a copy-on-grow buffer allocated lazily on the
//! first non-final frame, so the common single-frame case takes one copy.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, trace};

use crate::error::FeedError;
use crate::live::client::ClientInner;
use crate::live::events::{DisconnectionCause, DisconnectionInfo, ReconnectionCause};
use crate::live::lock::await_cancel;
use crate::live::message::Message;
use crate::live::transport::{CloseInfo, Frame, FrameKind, Transport};

/// Runs the receive loop for one connection until it ends, then triggers a
/// `Lost` reconnection unless the exit stems from a deliberate stop,
/// dispose, in-progress reconnect, or a superseded handle.
pub(crate) async fn run(
    inner: Arc<ClientInner>,
    transport: Arc<dyn Transport>,
    generation: u64,
    mut scope: watch::Receiver<bool>,
) {
    let mut scratch = vec![0u8; inner.config.chunk_size];
    let mut caused_error: Option<FeedError> = None;

    'session: loop {
        // Assemble one complete message, frame by frame.
        let mut kind = FrameKind::Binary;
        let mut accumulated: Option<Vec<u8>> = None;

        let assembled: Vec<u8> = loop {
            let frame = tokio::select! {
                () = await_cancel(&mut scope) => {
                    caused_error = Some(FeedError::Canceled);
                    break 'session;
                }
                received = transport.receive(&mut scratch) => match received {
                    Ok(frame) => frame,
                    Err(e) => {
                        if !matches!(e, FeedError::Canceled) {
                            error!(
                                client = %inner.config.name,
                                error = %e,
                                "error while listening to the feed"
                            );
                        }
                        caused_error = Some(e);
                        break 'session;
                    }
                },
            };

            match frame {
                Frame::Close { code, reason } => {
                    trace!(client = %inner.config.name, "received close frame");

                    if !inner.is_started()
                        || inner.is_stopping()
                        || inner.current_generation() != generation
                    {
                        return;
                    }

                    let close = CloseInfo {
                        code,
                        reason,
                        sub_protocol: transport.close_info().sub_protocol,
                    };
                    let info = Arc::new(DisconnectionInfo::new(
                        DisconnectionCause::ByServer,
                        close,
                        None,
                    ));
                    inner.bus.disconnections.publish(&info);

                    if info.close_canceled() {
                        if inner.config.reconnect_enabled {
                            // The veto refuses the handshake; the connection
                            // is treated as lost below.
                            caused_error = Some(FeedError::Canceled);
                            break 'session;
                        }
                        // Veto with reconnection disabled: keep listening.
                        continue 'session;
                    }

                    let _ = inner.stop_internal(1000, "Closing", false, true).await;

                    // The handshake itself moved the client into the
                    // reconnect-pending state, so only dispose and a
                    // superseded handle suppress the follow-up here.
                    if inner.config.reconnect_enabled
                        && !inner.is_disposed()
                        && inner.current_generation() == generation
                    {
                        let _ = inner
                            .reconnect_synchronized(ReconnectionCause::Lost, false, None, generation)
                            .await;
                    }
                    return;
                }
                Frame::Data {
                    kind: frame_kind,
                    len,
                    end_of_message,
                } => {
                    kind = frame_kind;
                    let chunk = &scratch[..len];
                    if accumulated.is_none() && end_of_message {
                        // Single-frame fast path: one copy, no growth buffer.
                        break chunk.to_vec();
                    }
                    let buffer = accumulated
                        .get_or_insert_with(|| Vec::with_capacity(inner.config.chunk_size * 2));
                    buffer.extend_from_slice(chunk);
                    if end_of_message {
                        break accumulated.take().unwrap_or_default();
                    }
                }
            }
        };

        let message = if kind == FrameKind::Text && inner.config.text_decode_enabled {
            match inner.config.encoding.decode(assembled) {
                Ok(text) => Message::Text(text),
                Err(e) => {
                    error!(
                        client = %inner.config.name,
                        error = %e,
                        "failed to decode text message, dropping it"
                    );
                    continue 'session;
                }
            }
        } else {
            Message::Binary(assembled)
        };

        trace!(client = %inner.config.name, len = message.len(), "message received");
        inner.touch_last_received();
        inner.bus.messages.publish(&message);

        if !transport.is_open() {
            break 'session;
        }
    }

    if inner.should_ignore_reconnection(generation) || !inner.is_started() {
        debug!(client = %inner.config.name, "receive loop exiting without reconnect");
        return;
    }

    let _ = inner
        .reconnect_synchronized(ReconnectionCause::Lost, false, caused_error, generation)
        .await;
}
