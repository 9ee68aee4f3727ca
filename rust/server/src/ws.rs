//! WebSocket endpoint: one inbound loop and one outbound pump per
//! connection. The loop deserializes and validates each envelope, then
//! hands it to the owning table's mailbox; nothing here touches engine
//! state directly.

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use warp::ws::{Message, WebSocket};

use felt_engine::player::PlayerId;

use crate::protocol::{validate, ClientMessage, ErrorCode, GameSummary, ServerMessage};
use crate::server::AppContext;
use crate::session::{MessageSender, SessionError};
use crate::table::TableCmd;

pub async fn handle_socket(socket: WebSocket, ctx: AppContext) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    // Outbound pump: serializes and writes until the channel or the
    // socket closes. Rebinding on reconnect drops the session's sender,
    // which ends this task and closes the superseded socket.
    let pump = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            match serde_json::to_string(&message) {
                Ok(text) => {
                    if ws_tx.send(Message::text(text)).await.is_err() {
                        break;
                    }
                }
                Err(err) => {
                    tracing::error!(error = %err, "outbound message not serializable");
                }
            }
        }
        let _ = ws_tx.close().await;
    });

    let mut identity: Option<(PlayerId, u64)> = None;

    while let Some(incoming) = ws_rx.next().await {
        let frame = match incoming {
            Ok(frame) => frame,
            Err(err) => {
                tracing::debug!(error = %err, "websocket read failed");
                break;
            }
        };
        if frame.is_close() {
            break;
        }
        let Ok(text) = frame.to_str() else {
            // Pings and binary frames are not protocol messages.
            continue;
        };

        let parsed: Result<ClientMessage, _> = serde_json::from_str(text);
        let message = match parsed {
            Ok(message) => message,
            Err(err) => {
                tracing::debug!(error = %err, "malformed envelope");
                send(&tx, ServerMessage::error(ErrorCode::InvalidMessage, "malformed message"));
                continue;
            }
        };
        if let Err(reply) = validate(&message) {
            send(&tx, reply);
            continue;
        }

        match (identity, message) {
            (None, ClientMessage::Identify { display_name, reconnect_token }) => {
                identity = identify(&ctx, &tx, display_name, reconnect_token);
            }
            (None, _) => {
                send(
                    &tx,
                    ServerMessage::error(ErrorCode::NotIdentified, "identify first"),
                );
            }
            (Some(_), ClientMessage::Identify { .. }) => {
                send(
                    &tx,
                    ServerMessage::error(ErrorCode::InvalidMessage, "already identified"),
                );
            }
            (Some((player_id, _)), message) => route(&ctx, player_id, message, &tx),
        }
    }

    if let Some((player_id, conn_seq)) = identity {
        if let Some((table_id, _role)) = ctx.sessions.disconnect(player_id, conn_seq) {
            if let Some(handle) = ctx.tables.get(table_id) {
                handle.send(TableCmd::Connected {
                    player_id,
                    connected: false,
                });
            }
        }
    }
    pump.abort();
}

fn identify(
    ctx: &AppContext,
    tx: &MessageSender,
    display_name: String,
    reconnect_token: Option<String>,
) -> Option<(PlayerId, u64)> {
    match ctx
        .sessions
        .identify(display_name, reconnect_token, tx.clone())
    {
        Ok((identified, conn_seq)) => {
            send(
                tx,
                ServerMessage::Identified {
                    player_id: identified.player_id,
                    display_name: identified.display_name,
                    reconnect_token: identified.reconnect_token,
                },
            );
            // A seated reconnect gets a clean resync point rather than a
            // replay of mid-street events.
            if let Some((table_id, _role)) = identified.rejoined {
                if let Some(handle) = ctx.tables.get(table_id) {
                    handle.send(TableCmd::Connected {
                        player_id: identified.player_id,
                        connected: true,
                    });
                    handle.send(TableCmd::Resync {
                        player_id: identified.player_id,
                    });
                }
            }
            Some((identified.player_id, conn_seq))
        }
        Err(SessionError::BadToken) => {
            send(
                tx,
                ServerMessage::error(
                    ErrorCode::InvalidMessage,
                    "reconnect token is invalid; identify again without one",
                ),
            );
            None
        }
    }
}

fn route(ctx: &AppContext, player_id: PlayerId, message: ClientMessage, tx: &MessageSender) {
    match message {
        ClientMessage::Identify { .. } => unreachable!("handled before routing"),
        ClientMessage::ListGames {} => {
            let games: Vec<GameSummary> = ctx
                .registry
                .list_active()
                .into_iter()
                .map(|record| GameSummary {
                    game_id: record.id,
                    name: record.name,
                    status: record.status,
                    players: record.players,
                    bots: record.bots,
                    max_seats: record.config.max_seats,
                    small_blind: record.config.small_blind,
                    big_blind: record.config.big_blind,
                })
                .collect();
            send(tx, ServerMessage::GameList { games });
        }
        ClientMessage::JoinGame { game_id, role } => {
            if ctx.sessions.table_of(player_id).is_some() {
                send(
                    tx,
                    ServerMessage::error(ErrorCode::AlreadyInGame, "leave the current game first"),
                );
                return;
            }
            let Some(handle) = ctx.tables.get(game_id) else {
                send(
                    tx,
                    ServerMessage::error(ErrorCode::GameNotFound, "no such game"),
                );
                return;
            };
            let name = ctx
                .sessions
                .display_name(player_id)
                .unwrap_or_else(|| "anonymous".into());
            handle.send(TableCmd::Join {
                player_id,
                name,
                role,
                is_bot: false,
            });
        }
        other => {
            let Some((table_id, _role)) = ctx.sessions.table_of(player_id) else {
                send(
                    tx,
                    ServerMessage::error(ErrorCode::NotInGame, "join a game first"),
                );
                return;
            };
            let Some(handle) = ctx.tables.get(table_id) else {
                send(
                    tx,
                    ServerMessage::error(ErrorCode::GameNotFound, "game has ended"),
                );
                return;
            };
            let cmd = match other {
                ClientMessage::Ready {} => TableCmd::Ready { player_id },
                ClientMessage::PlayerAction {
                    hand_number,
                    action_type,
                    amount,
                } => TableCmd::Action {
                    player_id,
                    hand_number,
                    action: action_type,
                    amount,
                },
                ClientMessage::RevealCards { hand_number } => TableCmd::Reveal {
                    player_id,
                    hand_number,
                },
                ClientMessage::Chat { message } => TableCmd::Chat { player_id, message },
                ClientMessage::LeaveGame {} => TableCmd::Leave { player_id },
                ClientMessage::Identify { .. }
                | ClientMessage::ListGames {}
                | ClientMessage::JoinGame { .. } => unreachable!("handled above"),
            };
            handle.send(cmd);
        }
    }
}

fn send(tx: &MessageSender, message: ServerMessage) {
    let _ = tx.send(message);
}
