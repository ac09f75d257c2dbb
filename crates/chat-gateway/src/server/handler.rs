//! WebSocket handler
//!
//! Authenticates the upgrade, then runs the session's reader and writer
//! loops until either ends.

use crate::broadcast::EventPublisher;
use crate::connection::{Session, SessionState};
use crate::handlers::{HandlerError, InboundDispatcher};
use crate::protocol::{coalesce, CloseCode, FrameError};
use crate::server::auth::authenticate;
use crate::server::{GatewayError, GatewayState};
use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::Response,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use chat_common::{AppError, RealtimeConfig};
use chat_core::UserId;
use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use serde::Deserialize;
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, info_span, trace, warn, Instrument};

/// Hard transport cap as a multiple of the application frame limit
///
/// Frames between the two limits are read and discarded. A frame past the
/// transport cap is a read error: the reader stops and the session closes
/// with `UnknownError`.
const TRANSPORT_LIMIT_FACTOR: usize = 4;

/// Upgrade query parameters
#[derive(Debug, Default, Deserialize)]
pub struct ConnectParams {
    pub token: Option<String>,
}

/// WebSocket gateway handler
///
/// The token comes from `?token=` or an `Authorization: Bearer` header. A
/// missing or bad token is rejected before the upgrade.
pub async fn gateway_handler(
    State(state): State<GatewayState>,
    Query(params): Query<ConnectParams>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    ws: WebSocketUpgrade,
) -> Result<Response, GatewayError> {
    let token = params
        .token
        .filter(|token| !token.is_empty())
        .or_else(|| bearer.map(|TypedHeader(Authorization(b))| b.token().to_string()))
        .ok_or(AppError::MissingAuth)?;

    let user_id = authenticate(state.jwt_service(), &token)?;
    let limit = state
        .config()
        .realtime
        .max_frame_bytes
        .saturating_mul(TRANSPORT_LIMIT_FACTOR);

    Ok(ws
        .max_message_size(limit)
        .on_upgrade(move |socket| handle_socket(state, socket, user_id)))
}

/// Run an authenticated connection to completion
async fn handle_socket(state: GatewayState, socket: WebSocket, user_id: UserId) {
    let config = state.config().realtime.clone();
    let (session, outbound) = Session::new(user_id, config.outbound_queue_capacity);
    session.advance(SessionState::Authenticated);

    let span = info_span!(
        "session",
        session_id = %session.id(),
        user_id = %session.user_id()
    );
    run_session(state.publisher().clone(), socket, session, outbound, config)
        .instrument(span)
        .await;
}

async fn run_session(
    publisher: EventPublisher,
    socket: WebSocket,
    session: Arc<Session>,
    outbound: mpsc::Receiver<Arc<str>>,
    config: RealtimeConfig,
) {
    let router = publisher.router().clone();
    if let Err(e) = router.register(session.clone()).await {
        warn!(error = %e, "Failed to register session");
        return;
    }
    session.advance(SessionState::Active);
    info!("WebSocket session established");

    let (sink, stream) = socket.split();
    let mut reader = tokio::spawn(
        read_loop(stream, session.clone(), publisher, config.clone()).in_current_span(),
    );
    let mut writer = tokio::spawn(
        write_loop(sink, outbound, session.clone(), config.clone()).in_current_span(),
    );

    tokio::select! {
        result = &mut reader => {
            session.advance(SessionState::Terminating);
            session.close(result.unwrap_or(CloseCode::UnknownError));
            // The writer flushes what is queued, sends the close frame and exits.
            if tokio::time::timeout(config.write_wait(), &mut writer).await.is_err() {
                writer.abort();
            }
        }
        _ = &mut writer => {
            session.advance(SessionState::Terminating);
            reader.abort();
        }
    }

    if let Err(e) = router.unregister(session.clone()).await {
        debug!(error = %e, "Unregister skipped");
    }
    session.advance(SessionState::Closed);

    info!(
        close_code = ?session.close_code(),
        duration_ms = session.age().as_millis() as u64,
        "WebSocket session closed"
    );
}

/// Read frames until the peer goes away or misses its liveness deadline
async fn read_loop(
    mut stream: SplitStream<WebSocket>,
    session: Arc<Session>,
    publisher: EventPublisher,
    config: RealtimeConfig,
) -> CloseCode {
    let mut deadline = Instant::now() + config.pong_wait();

    loop {
        let Ok(next) = tokio::time::timeout_at(deadline, stream.next()).await else {
            warn!("No pong within liveness window");
            return CloseCode::SessionTimeout;
        };

        let message = match next {
            Some(Ok(message)) => message,
            Some(Err(e)) => {
                debug!(error = %e, "WebSocket read error");
                return CloseCode::UnknownError;
            }
            None => return CloseCode::Normal,
        };

        match message {
            Message::Text(text) => {
                if let Err(e) = InboundDispatcher::dispatch_text(
                    &session,
                    &publisher,
                    &text,
                    config.max_frame_bytes,
                ) {
                    discard(&e);
                }
            }
            Message::Binary(_) => discard(&HandlerError::from(FrameError::Binary)),
            Message::Pong(_) => {
                trace!("Pong received");
                deadline = Instant::now() + config.pong_wait();
            }
            Message::Ping(_) => {
                // Pong is handled automatically by axum
                trace!("Ping received");
            }
            Message::Close(_) => {
                debug!("Client closed connection");
                return CloseCode::Normal;
            }
        }
    }
}

fn discard(error: &HandlerError) {
    debug!(reason = error.reason(), error = %error, "Discarding inbound frame");
}

#[derive(Debug, Error)]
enum WriteError {
    #[error("Write deadline exceeded")]
    Timeout,

    #[error(transparent)]
    Transport(#[from] axum::Error),
}

async fn send_with_deadline(
    sink: &mut SplitSink<WebSocket, Message>,
    message: Message,
    deadline: Duration,
) -> Result<(), WriteError> {
    tokio::time::timeout(deadline, sink.send(message))
        .await
        .map_err(|_| WriteError::Timeout)??;
    Ok(())
}

/// `first` plus whatever is already queued, at most `max` frames
///
/// Producers can keep refilling the queue while we drain it; the cap keeps a
/// single write bounded.
fn drain_batch(
    first: Arc<str>,
    outbound: &mut mpsc::Receiver<Arc<str>>,
    max: usize,
) -> Vec<Arc<str>> {
    let mut batch = vec![first];
    while batch.len() < max {
        match outbound.try_recv() {
            Ok(frame) => batch.push(frame),
            Err(_) => break,
        }
    }
    batch
}

/// Drain the outbound queue onto the socket and keep the peer pinged
async fn write_loop(
    mut sink: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<Arc<str>>,
    session: Arc<Session>,
    config: RealtimeConfig,
) {
    let period = config.ping_period();
    let mut ping = tokio::time::interval_at(Instant::now() + period, period);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            next = outbound.recv() => {
                let Some(first) = next else {
                    let code = session.close_code().unwrap_or(CloseCode::Normal);
                    let frame = CloseFrame {
                        code: code.as_u16(),
                        reason: Cow::Borrowed(code.name()),
                    };
                    if let Err(e) =
                        send_with_deadline(&mut sink, Message::Close(Some(frame)), config.write_wait()).await
                    {
                        trace!(error = %e, "Close frame not delivered");
                    }
                    return;
                };

                let batch = drain_batch(first, &mut outbound, config.outbound_queue_capacity);
                trace!(count = batch.len(), "Writing frames");

                if let Err(e) =
                    send_with_deadline(&mut sink, Message::Text(coalesce(&batch)), config.write_wait()).await
                {
                    debug!(error = %e, "WebSocket write failed");
                    return;
                }
            }
            _ = ping.tick() => {
                if let Err(e) = send_with_deadline(&mut sink, Message::Ping(Vec::new()), config.write_wait()).await {
                    debug!(error = %e, "Ping failed");
                    return;
                }
            }
        }
    }
}
