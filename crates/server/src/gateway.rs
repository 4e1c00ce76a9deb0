//! Broadcast Gateway: one WebSocket connection, bound to at most one session.
//!
//! A writer task owns the socket sink and drains an unbounded outbound queue.
//! Replies and errors for this connection are queued directly; session updates
//! arrive through a forwarder task that copies the session's broadcast into the
//! same queue, so a connection sees its reply before any later update.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use server_api::{
    become_spymaster, create_game, end_turn, handle_disconnect, join_game, join_team,
    remove_player, request_start_game, reveal_card, set_player_name, ApiContext, GameOptions,
    Joined,
};
use shared::{
    domain::{PlayerId, SessionCode},
    error::ApiError,
    protocol::{ClientRequest, ServerEvent},
};
use tokio::{
    sync::{
        broadcast::{self, error::RecvError},
        mpsc,
    },
    task::JoinHandle,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::app_state::AppState;

pub(crate) async fn ws_connection(state: Arc<AppState>, socket: WebSocket) {
    let (mut sink, mut stream) = socket.split();
    let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<ServerEvent>();

    let writer = tokio::spawn(async move {
        while let Some(event) = outbound_rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(v) => v,
                Err(error) => {
                    warn!(%error, "failed to encode server event");
                    continue;
                }
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let mut connection = Connection::new(outbound);
    info!(connection = %connection.id, "connection opened");

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => connection.handle_text(&state.api, &text).await,
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(error) => {
                debug!(connection = %connection.id, %error, "socket read failed");
                break;
            }
        }
    }

    connection.leave(&state.api).await;
    writer.abort();
    info!(connection = %connection.id, "connection closed");
}

struct Membership {
    code: SessionCode,
    player_id: PlayerId,
    forwarder: JoinHandle<()>,
}

struct Connection {
    id: Uuid,
    outbound: mpsc::UnboundedSender<ServerEvent>,
    membership: Option<Membership>,
}

enum Bound {
    Created,
    Joined,
}

impl Connection {
    fn new(outbound: mpsc::UnboundedSender<ServerEvent>) -> Self {
        Self {
            id: Uuid::new_v4(),
            outbound,
            membership: None,
        }
    }

    async fn handle_text(&mut self, api: &ApiContext, text: &str) {
        let request = match serde_json::from_str::<ClientRequest>(text) {
            Ok(request) => request,
            Err(error) => {
                debug!(connection = %self.id, %error, "unparseable request");
                self.send(ServerEvent::Error(ApiError::validation(format!(
                    "invalid message: {error}"
                ))));
                return;
            }
        };
        let session = request.session_code().map(str::to_owned);
        if let Err(error) = self.dispatch(api, request).await {
            debug!(
                connection = %self.id,
                session = session.as_deref(),
                %error,
                "request rejected"
            );
            self.send(ServerEvent::Error(error));
        }
    }

    async fn dispatch(&mut self, api: &ApiContext, request: ClientRequest) -> Result<(), ApiError> {
        match request {
            ClientRequest::CreateGame {
                theme_hint,
                custom_words,
                timer_duration,
                player_name,
            } => {
                let options = GameOptions {
                    theme_hint,
                    custom_words,
                    timer_duration,
                    player_name,
                };
                let joined = create_game(api, options).await?;
                self.bind(api, joined, Bound::Created).await;
                Ok(())
            }
            ClientRequest::JoinGame {
                session_code,
                player_name,
            } => {
                let joined = join_game(api, &session_code, player_name.as_deref()).await?;
                self.bind(api, joined, Bound::Joined).await;
                Ok(())
            }
            ClientRequest::SetPlayerName {
                session_code,
                player_id,
                name,
            } => set_player_name(api, &session_code, player_id, &name).await,
            ClientRequest::JoinTeam {
                session_code,
                player_id,
                team,
            } => join_team(api, &session_code, player_id, team).await,
            ClientRequest::BecomeSpymaster {
                session_code,
                player_id,
            } => become_spymaster(api, &session_code, player_id).await,
            ClientRequest::RequestStartGame { session_code } => {
                request_start_game(api, &session_code).await
            }
            ClientRequest::CardClick {
                session_code,
                card_index,
            } => reveal_card(api, &session_code, grid_index(card_index)).await,
            ClientRequest::EndTurn { session_code } => end_turn(api, &session_code).await,
            ClientRequest::RemovePlayer {
                session_code,
                player_id,
            } => remove_player(api, &session_code, player_id).await,
        }
    }

    /// Associates the connection with a session, replacing any earlier one. The reply
    /// is queued before the forwarder starts.
    async fn bind(&mut self, api: &ApiContext, joined: Joined, how: Bound) {
        self.leave(api).await;

        let Joined {
            session,
            player_id,
            state,
            events,
        } = joined;
        let session_code = session.code().clone();
        let reply = match how {
            Bound::Created => ServerEvent::GameCreated {
                session_code: session_code.clone(),
                state,
                player_id,
            },
            Bound::Joined => ServerEvent::GameJoined {
                session_code: session_code.clone(),
                state,
                player_id,
            },
        };
        self.send(reply);
        let forwarder = forward(events, self.outbound.clone(), session_code.clone());
        debug!(connection = %self.id, session = %session_code, %player_id, "connection bound");
        self.membership = Some(Membership {
            code: session_code,
            player_id,
            forwarder,
        });
    }

    async fn leave(&mut self, api: &ApiContext) {
        if let Some(membership) = self.membership.take() {
            membership.forwarder.abort();
            handle_disconnect(api, &membership.code, membership.player_id).await;
        }
    }

    fn send(&self, event: ServerEvent) {
        let _ = self.outbound.send(event);
    }
}

/// Negative indexes are off the grid like any other out-of-range index.
fn grid_index(raw: i64) -> usize {
    usize::try_from(raw).unwrap_or(usize::MAX)
}

/// Copies session updates into a connection's queue until either side goes away.
/// A lagging receiver skips ahead since every update carries the full state.
pub(crate) fn forward(
    mut events: broadcast::Receiver<ServerEvent>,
    outbound: mpsc::UnboundedSender<ServerEvent>,
    session_code: SessionCode,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if outbound.send(event).is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(
                        session = %session_code,
                        skipped,
                        "connection fell behind session updates"
                    );
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
#[path = "tests/gateway_tests.rs"]
mod tests;
