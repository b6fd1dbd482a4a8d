//! WebSocket upgrade handler

use std::ops::ControlFlow;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::http::AppError;
use crate::matchmaking::{DuelError, DuelService};
use crate::util::rate_limit::ParticipantRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// Query parameters for WebSocket connection
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Display name the participant joins the lobby with
    pub name: String,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    // Reject bad or taken names before upgrading
    if let Err(e) = state.presence.check_name(&query.name) {
        warn!(name = %query.name, error = %e, "WebSocket join rejected");
        return AppError::BadRequest(e.to_string()).into_response();
    }

    ws.on_upgrade(move |socket| handle_socket(socket, query.name, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, name: String, state: AppState) {
    let (mut ws_sink, ws_stream) = socket.split();

    // The name may have been taken between the check and the upgrade
    let (participant, outbox) = match state.presence.register(&name) {
        Ok(registered) => registered,
        Err(e) => {
            warn!(name = %name, error = %e, "Registration failed after upgrade");
            let msg = ServerMsg::SessionError {
                code: "invalid_name".to_string(),
                message: e.to_string(),
            };
            let _ = send_msg(&mut ws_sink, &msg).await;
            let _ = ws_sink.close().await;
            return;
        }
    };

    info!(participant = %participant, name = %name, "New WebSocket connection");

    state.presence.send(
        participant,
        ServerMsg::Welcome {
            connection_id: participant,
            display_name: name.clone(),
            server_time: unix_millis(),
        },
    );

    let rate_limiter = ParticipantRateLimiter::new(
        state.config.action_rate_limit,
        state.config.lobby_rate_limit,
    );

    run_session(participant, &state.duel, &rate_limiter, ws_sink, ws_stream, outbox).await;

    // Cleanup on disconnect
    state.duel.depart(participant);

    info!(participant = %participant, name = %name, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split
async fn run_session(
    participant: Uuid,
    duel: &DuelService,
    rate_limiter: &ParticipantRateLimiter,
    mut ws_sink: futures::stream::SplitSink<WebSocket, Message>,
    mut ws_stream: futures::stream::SplitStream<WebSocket>,
    mut outbox: mpsc::UnboundedReceiver<ServerMsg>,
) {
    // Spawn writer task: outbox -> WebSocket
    let writer_handle = tokio::spawn(async move {
        while let Some(msg) = outbox.recv().await {
            if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                debug!(participant = %participant, error = %e, "WebSocket send failed");
                break;
            }
        }
        let _ = ws_sink.close().await;
    });

    // Reader loop: WebSocket -> coordinator
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMsg>(&text) {
                Ok(client_msg) => {
                    if handle_client_msg(duel, rate_limiter, participant, client_msg).is_break() {
                        break;
                    }
                }
                Err(e) => {
                    warn!(participant = %participant, error = %e, "Failed to parse client message");
                }
            },
            Ok(Message::Binary(_)) => {
                warn!(participant = %participant, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(participant = %participant, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(participant = %participant, error = %e, "WebSocket error");
                break;
            }
        }
    }

    writer_handle.abort();
}

/// Apply one client message. Failures are reported to the sender as
/// `sessionError`; `Break` means the participant asked to leave.
pub fn handle_client_msg(
    duel: &DuelService,
    rate_limiter: &ParticipantRateLimiter,
    participant: Uuid,
    msg: ClientMsg,
) -> ControlFlow<()> {
    let result = match msg {
        ClientMsg::Move {
            session_id,
            position,
            direction,
        } => {
            if !rate_limiter.check_action() {
                debug!(participant = %participant, "Rate limited move");
                return ControlFlow::Continue(());
            }
            duel.move_player(participant, session_id, position, direction)
        }
        ClientMsg::Shoot {
            session_id,
            position,
            direction,
        } => {
            if !rate_limiter.check_action() {
                debug!(participant = %participant, "Rate limited shot");
                return ControlFlow::Continue(());
            }
            duel.shoot(participant, session_id, position, direction)
        }
        ClientMsg::SendChallenge { target_name } => {
            if !rate_limiter.check_lobby() {
                warn!(participant = %participant, "Rate limited challenge");
                return ControlFlow::Continue(());
            }
            duel.send_challenge(participant, &target_name).map(|_| ())
        }
        ClientMsg::RequestMatch => {
            if !rate_limiter.check_lobby() {
                warn!(participant = %participant, "Rate limited match request");
                return ControlFlow::Continue(());
            }
            duel.request_match(participant).map(|_| ())
        }
        ClientMsg::AcceptChallenge => duel.accept_challenge(participant).map(|_| ()),
        ClientMsg::DeclineChallenge => duel.decline_challenge(participant),
        ClientMsg::LeaveSession { session_id } => duel.leave_session(participant, session_id),
        ClientMsg::Ping { t } => {
            duel.presence().send(participant, ServerMsg::Pong { t });
            Ok(())
        }
        ClientMsg::Departed => return ControlFlow::Break(()),
    };

    if let Err(e) = result {
        report(duel, participant, e);
    }
    ControlFlow::Continue(())
}

fn report(duel: &DuelService, participant: Uuid, error: DuelError) {
    debug!(participant = %participant, code = error.code(), "Request rejected");
    duel.presence().send(
        participant,
        ServerMsg::SessionError {
            code: error.code().to_string(),
            message: error.to_string(),
        },
    );
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
