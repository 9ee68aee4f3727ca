//! Orchestrator behavior through the table mailbox: the ready gate,
//! action timers, error replies, chat fan-out, persistence hooks, and
//! table termination.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;
use uuid::Uuid;

use felt_engine::cards::{full_deck, Card};
use felt_engine::player::Role;
use felt_engine::rules::ActionType;
use felt_engine::state::TableConfig;
use felt_server::admin::AdminApi;
use felt_server::persist::{MemoryHandHistory, MemorySnapshotStore};
use felt_server::projection::{ActionRequest, GameStateView};
use felt_server::protocol::{ErrorCode, GameOverReason, ServerMessage};
use felt_server::registry::InMemoryRegistry;
use felt_server::session::MessageSender;
use felt_server::settings::Timing;
use felt_server::table::TableCmd;
use felt_server::{AppContext, ServerConfig};

const WAIT: Duration = Duration::from_secs(5);

struct Harness {
    ctx: AppContext,
    admin: AdminApi,
    history: Arc<MemoryHandHistory>,
    snapshots: Arc<MemorySnapshotStore>,
}

fn harness(timing: Timing) -> Harness {
    let history = Arc::new(MemoryHandHistory::new());
    let snapshots = Arc::new(MemorySnapshotStore::new());
    let ctx = AppContext::with_collaborators(
        ServerConfig::for_tests(),
        Arc::new(InMemoryRegistry::new()),
        snapshots.clone(),
        history.clone(),
        timing,
    );
    let admin = AdminApi::new(ctx.clone());
    Harness {
        ctx,
        admin,
        history,
        snapshots,
    }
}

fn script_timing() -> Timing {
    // Long action timer so scripted tests never race the default action.
    Timing {
        action_timeout: Duration::from_secs(30),
        hand_delay: Duration::from_millis(10),
        min_players: 2,
    }
}

struct Client {
    id: Uuid,
    rx: mpsc::UnboundedReceiver<ServerMessage>,
    #[allow(dead_code)]
    token: String,
    #[allow(dead_code)]
    conn_seq: u64,
}

fn connect(ctx: &AppContext, name: &str) -> Client {
    let (tx, rx): (MessageSender, _) = mpsc::unbounded_channel();
    let (identified, conn_seq) = ctx
        .sessions
        .identify(name.to_string(), None, tx)
        .expect("identify");
    Client {
        id: identified.player_id,
        rx,
        token: identified.reconnect_token,
        conn_seq,
    }
}

async fn next_message(client: &mut Client) -> ServerMessage {
    timeout(WAIT, client.rx.recv())
        .await
        .expect("timed out waiting for a message")
        .expect("channel closed")
}

/// Skip to the next `gameState` carrying the given event type.
async fn until_event(client: &mut Client, kind: &str) -> (GameStateView, Option<ActionRequest>) {
    loop {
        if let ServerMessage::GameState {
            game_state,
            event,
            action_request,
        } = next_message(client).await
        {
            if event.kind() == kind {
                return (game_state, action_request);
            }
        }
    }
}

/// Skip to this client's next turn.
async fn my_turn(client: &mut Client) -> ActionRequest {
    loop {
        if let ServerMessage::GameState {
            action_request: Some(request),
            ..
        } = next_message(client).await
        {
            return request;
        }
    }
}

#[tokio::test]
async fn ready_gate_starts_a_hand_at_two_ready_players() {
    let h = harness(script_timing());
    let record = h.admin.create_table("t", TableConfig::default());
    let table = h.ctx.tables.get(record.id).unwrap();

    let mut a = connect(&h.ctx, "ada");
    let mut b = connect(&h.ctx, "bea");
    table.send(TableCmd::Join {
        player_id: a.id,
        name: "ada".into(),
        role: Role::Player,
        is_bot: false,
    });
    table.send(TableCmd::Join {
        player_id: b.id,
        name: "bea".into(),
        role: Role::Player,
        is_bot: false,
    });
    table.send(TableCmd::Ready { player_id: a.id });

    // One ready player is not enough.
    assert!(matches!(
        next_message(&mut a).await,
        ServerMessage::GameJoined { .. }
    ));
    table.send(TableCmd::Ready { player_id: b.id });

    let (view, _) = until_event(&mut a, "HAND_START").await;
    assert_eq!(view.hand_number, 1);
    let (view, _) = until_event(&mut b, "DEAL").await;
    assert!(view.hand_in_progress);
    // Each player sees exactly their own hole cards after the deal.
    let me = view.players.iter().find(|p| p.player_id == b.id).unwrap();
    let other = view.players.iter().find(|p| p.player_id == a.id).unwrap();
    assert!(me.hole_cards.is_some());
    assert!(other.hole_cards.is_none());
}

#[tokio::test]
async fn stale_hand_number_and_out_of_turn_are_rejected_precisely() {
    let h = harness(script_timing());
    let record = h.admin.create_table("t", TableConfig::default());
    let table = h.ctx.tables.get(record.id).unwrap();

    let mut a = connect(&h.ctx, "ada");
    let mut b = connect(&h.ctx, "bea");
    for c in [&a, &b] {
        table.send(TableCmd::Join {
            player_id: c.id,
            name: "p".into(),
            role: Role::Player,
            is_bot: false,
        });
        table.send(TableCmd::Ready { player_id: c.id });
    }

    let request = my_turn(&mut a).await;
    assert_eq!(request.hand_number, 1);

    // Stale hand number.
    table.send(TableCmd::Action {
        player_id: a.id,
        hand_number: 99,
        action: ActionType::Call,
        amount: None,
    });
    loop {
        if let ServerMessage::Error { code, .. } = next_message(&mut a).await {
            assert_eq!(code, ErrorCode::InvalidAction);
            break;
        }
    }

    // Out of turn: the big blind acts while the dealer holds the action.
    table.send(TableCmd::Action {
        player_id: b.id,
        hand_number: 1,
        action: ActionType::Call,
        amount: None,
    });
    loop {
        if let ServerMessage::Error { code, .. } = next_message(&mut b).await {
            assert_eq!(code, ErrorCode::OutOfTurn);
            break;
        }
    }
}

#[tokio::test]
async fn action_timer_warns_then_substitutes_the_default() {
    let h = harness(Timing {
        action_timeout: Duration::from_millis(200),
        hand_delay: Duration::from_secs(60),
        min_players: 2,
    });
    let record = h.admin.create_table("t", TableConfig::default());
    let table = h.ctx.tables.get(record.id).unwrap();

    let mut a = connect(&h.ctx, "ada");
    let mut b = connect(&h.ctx, "bea");
    for c in [&a, &b] {
        table.send(TableCmd::Join {
            player_id: c.id,
            name: "p".into(),
            role: Role::Player,
            is_bot: false,
        });
        table.send(TableCmd::Ready { player_id: c.id });
    }

    // The dealer (small blind) never acts: two warnings, then a forced
    // fold because a call is owed.
    let mut warnings = 0;
    loop {
        match next_message(&mut a).await {
            ServerMessage::TimeWarning { .. } => warnings += 1,
            ServerMessage::GameState { event, .. } if event.kind() == "PLAYER_TIMEOUT" => break,
            _ => {}
        }
    }
    assert_eq!(warnings, 2);
    let (view, _) = until_event(&mut b, "PLAYER_ACTION").await;
    assert!(!view.hand_in_progress, "forced fold ends the heads-up hand");
    let me = view.players.iter().find(|p| p.player_id == b.id).unwrap();
    assert_eq!(me.stack, 1_005);
}

#[tokio::test]
async fn submitted_action_cancels_the_pending_timeout() {
    let h = harness(Timing {
        action_timeout: Duration::from_millis(150),
        hand_delay: Duration::from_secs(60),
        min_players: 2,
    });
    let record = h.admin.create_table("t", TableConfig::default());
    let table = h.ctx.tables.get(record.id).unwrap();

    let mut a = connect(&h.ctx, "ada");
    let mut b = connect(&h.ctx, "bea");
    for c in [&a, &b] {
        table.send(TableCmd::Join {
            player_id: c.id,
            name: "p".into(),
            role: Role::Player,
            is_bot: false,
        });
        table.send(TableCmd::Ready { player_id: c.id });
    }

    let request = my_turn(&mut a).await;
    table.send(TableCmd::Action {
        player_id: a.id,
        hand_number: request.hand_number,
        action: ActionType::Call,
        amount: None,
    });

    // Wait past the original deadline: no PLAYER_TIMEOUT may arrive for
    // the already-taken turn.
    tokio::time::sleep(Duration::from_millis(300)).await;
    let mut saw_timeout_for_a = false;
    while let Ok(Some(message)) = timeout(Duration::from_millis(50), b.rx.recv()).await {
        if let ServerMessage::GameState { event, .. } = message {
            if event.kind() == "PLAYER_TIMEOUT" {
                // The big blind's own turn may time out; only a timeout
                // attributed to the caller would be a bug.
                if let felt_engine::events::HandEvent::PlayerTimeout { player_id } = event {
                    saw_timeout_for_a = player_id == a.id;
                    if saw_timeout_for_a {
                        break;
                    }
                }
            }
        }
    }
    assert!(!saw_timeout_for_a);
}

#[tokio::test]
async fn chat_reaches_players_and_spectators_with_roles() {
    let h = harness(script_timing());
    let record = h.admin.create_table("t", TableConfig::default());
    let table = h.ctx.tables.get(record.id).unwrap();

    let mut a = connect(&h.ctx, "ada");
    let mut s = connect(&h.ctx, "spec");
    table.send(TableCmd::Join {
        player_id: a.id,
        name: "ada".into(),
        role: Role::Player,
        is_bot: false,
    });
    table.send(TableCmd::Join {
        player_id: s.id,
        name: "spec".into(),
        role: Role::Spectator,
        is_bot: false,
    });
    table.send(TableCmd::Chat {
        player_id: s.id,
        message: "gl all".into(),
    });

    for client in [&mut a, &mut s] {
        loop {
            if let ServerMessage::ChatMessage {
                role,
                message,
                display_name,
                ..
            } = next_message(client).await
            {
                assert_eq!(role, Role::Spectator);
                assert_eq!(message, "gl all");
                assert_eq!(display_name, "spec");
                break;
            }
        }
    }
}

#[tokio::test]
async fn finished_hands_reach_history_and_snapshot_sinks() {
    let h = harness(script_timing());
    let record = h.admin.create_table("t", TableConfig::default());
    let table = h.ctx.tables.get(record.id).unwrap();

    let mut a = connect(&h.ctx, "ada");
    let mut b = connect(&h.ctx, "bea");
    for c in [&a, &b] {
        table.send(TableCmd::Join {
            player_id: c.id,
            name: "p".into(),
            role: Role::Player,
            is_bot: false,
        });
        table.send(TableCmd::Ready { player_id: c.id });
    }

    let request = my_turn(&mut a).await;
    table.send(TableCmd::Action {
        player_id: a.id,
        hand_number: request.hand_number,
        action: ActionType::Fold,
        amount: None,
    });
    until_event(&mut b, "HAND_END").await;

    // Sinks run on the table task right after the broadcast; give the
    // task a beat to reach them.
    let mut records = h.history.records();
    for _ in 0..100 {
        if !records.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        records = h.history.records();
    }
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].hand_number, 1);
    assert_eq!(records[0].game_id, record.id);
    assert!(records[0]
        .events
        .iter()
        .any(|e| e.kind() == "HAND_END"));
    assert!(h.snapshots.get(record.id).is_some());
}

#[tokio::test]
async fn busted_table_completes_with_standings() {
    // Tiny stacks so one all-in decides the table; the injected deck
    // gives the dealer aces.
    let config = TableConfig {
        starting_stack: 40,
        ..TableConfig::default()
    };
    let h = harness(Timing {
        action_timeout: Duration::from_secs(30),
        hand_delay: Duration::from_millis(10),
        min_players: 2,
    });
    let record = h.admin.create_table("t", config);
    let table = h.ctx.tables.get(record.id).unwrap();

    // Heads-up deal order is big blind first: B, A, B, A.
    let named = ["2c", "Ah", "7d", "As", "Kh", "Kd", "5s", "9c", "3h"];
    let named_cards: Vec<Card> = named.iter().map(|s| s.parse().unwrap()).collect();
    let mut deck = named_cards.clone();
    deck.extend(full_deck().into_iter().filter(|c| !named_cards.contains(c)));
    h.admin.inject_deck(record.id, deck);

    let mut a = connect(&h.ctx, "ada");
    let mut b = connect(&h.ctx, "bea");
    for c in [&a, &b] {
        table.send(TableCmd::Join {
            player_id: c.id,
            name: "p".into(),
            role: Role::Player,
            is_bot: false,
        });
        table.send(TableCmd::Ready { player_id: c.id });
    }

    let request = my_turn(&mut a).await;
    table.send(TableCmd::Action {
        player_id: a.id,
        hand_number: request.hand_number,
        action: ActionType::AllIn,
        amount: None,
    });
    let request = my_turn(&mut b).await;
    table.send(TableCmd::Action {
        player_id: b.id,
        hand_number: request.hand_number,
        action: ActionType::Call,
        amount: None,
    });

    until_event(&mut a, "HAND_END").await;
    loop {
        if let ServerMessage::GameOver {
            game_id,
            reason,
            standings,
        } = next_message(&mut a).await
        {
            assert_eq!(game_id, record.id);
            assert_eq!(reason, GameOverReason::Completed);
            assert_eq!(standings.len(), 1, "the busted player was removed");
            assert_eq!(standings[0].player_id, a.id);
            assert_eq!(standings[0].stack, 80);
            break;
        }
    }
}

#[tokio::test]
async fn a_bot_fills_the_seat_and_plays_back() {
    let h = harness(script_timing());
    let record = h.admin.create_table("t", TableConfig::default());
    let table = h.ctx.tables.get(record.id).unwrap();

    let mut a = connect(&h.ctx, "ada");
    table.send(TableCmd::Join {
        player_id: a.id,
        name: "ada".into(),
        role: Role::Player,
        is_bot: false,
    });
    table.send(TableCmd::Ready { player_id: a.id });
    let bot_id = h.admin.add_bot(record.id, "caller").unwrap();

    // The bot readies itself; the hand starts without intervention.
    let (view, _) = until_event(&mut a, "HAND_START").await;
    let bot_seat = view.players.iter().find(|p| p.player_id == bot_id).unwrap();
    assert!(bot_seat.is_bot);

    // Fold whenever it is our turn; the calling station wins the blinds.
    let request = my_turn(&mut a).await;
    table.send(TableCmd::Action {
        player_id: a.id,
        hand_number: request.hand_number,
        action: ActionType::Fold,
        amount: None,
    });
    let (view, _) = until_event(&mut a, "HAND_END").await;
    let bot_seat = view.players.iter().find(|p| p.player_id == bot_id).unwrap();
    assert!(bot_seat.stack > TableConfig::default().starting_stack);
}
