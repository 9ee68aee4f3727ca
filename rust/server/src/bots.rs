//! Bot runner: an internal session that speaks the same protocol a
//! human client does. The strategy sees only its own personalized view,
//! so a bot cannot know more than a player.

use tokio::sync::mpsc;
use uuid::Uuid;

use felt_bot::{create_strategy, TurnView};
use felt_engine::player::{PlayerId, Role};

use crate::protocol::ServerMessage;
use crate::server::AppContext;
use crate::table::{TableCmd, TableHandle};

pub fn spawn_bot(ctx: &AppContext, table: TableHandle, strategy_name: &str) -> PlayerId {
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    let short = Uuid::new_v4().simple().to_string();
    let name = format!("bot-{}", &short[..6]);
    let player_id = ctx.sessions.register_internal(name.clone(), tx);
    let mut strategy = create_strategy(strategy_name);

    table.send(TableCmd::Join {
        player_id,
        name,
        role: Role::Player,
        is_bot: true,
    });

    let sessions = ctx.sessions.clone();
    tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            match message {
                ServerMessage::GameJoined { .. } => {
                    table.send(TableCmd::Ready { player_id });
                }
                ServerMessage::GameState {
                    game_state,
                    action_request: Some(request),
                    ..
                } => {
                    let Some(me) = game_state
                        .players
                        .iter()
                        .find(|p| p.player_id == player_id)
                    else {
                        break;
                    };
                    let Some(hole_cards) = me.hole_cards else {
                        continue;
                    };
                    let view = TurnView {
                        hole_cards,
                        community: game_state.community_cards.clone(),
                        pot: game_state.pot,
                        stack: me.stack,
                        big_blind: game_state.big_blind,
                        legal: request.legal.clone(),
                    };
                    let (action, amount) = strategy.decide(&view);
                    table.send(TableCmd::Action {
                        player_id,
                        hand_number: request.hand_number,
                        action,
                        amount,
                    });
                }
                ServerMessage::GameState { game_state, .. } => {
                    // Busted bots are removed from the table; stop when
                    // our seat disappears.
                    if !game_state
                        .players
                        .iter()
                        .any(|p| p.player_id == player_id)
                    {
                        break;
                    }
                }
                ServerMessage::GameOver { .. } => break,
                _ => {}
            }
        }
        sessions.remove(player_id);
        tracing::debug!(player_id = %player_id, "bot task finished");
    });

    player_id
}
