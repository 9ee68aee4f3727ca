//! The table orchestrator: one tokio task per active table owning the
//! engine state and a command mailbox. Client messages, timer firings,
//! and admin commands all become mailbox items, so the pure engine runs
//! with single-threaded semantics and tables never contend with each
//! other.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

use felt_engine::cards::Card;
use felt_engine::errors::EngineError;
use felt_engine::events::{HandEvent, PotAward};
use felt_engine::player::{PlayerId, Role};
use felt_engine::rules::ActionType;
use felt_engine::state::{TableConfig, TableState, Transition, VisibilityPolicy};

use crate::persist::{HandHistoryRecord, HandHistorySink, SnapshotSink};
use crate::projection::{project, ActionRequest, Viewer};
use crate::protocol::{
    engine_error_reply, ErrorCode, GameOverReason, ServerMessage, Standing,
};
use crate::registry::{GameRegistry, TableStatus};
use crate::session::SessionManager;
use crate::settings::{Timing, WARNING_FRACTIONS};

/// Everything a table task can be asked to do.
#[derive(Debug)]
pub enum TableCmd {
    Join {
        player_id: PlayerId,
        name: String,
        role: Role,
        is_bot: bool,
    },
    Ready {
        player_id: PlayerId,
    },
    Action {
        player_id: PlayerId,
        hand_number: u64,
        action: ActionType,
        amount: Option<u64>,
    },
    Reveal {
        player_id: PlayerId,
        hand_number: u64,
    },
    Chat {
        player_id: PlayerId,
        message: String,
    },
    Leave {
        player_id: PlayerId,
    },
    Connected {
        player_id: PlayerId,
        connected: bool,
    },
    /// Re-send the full current view as a clean resync point.
    Resync {
        player_id: PlayerId,
    },
    /// Admin: treat every seated player as ready and deal.
    ForceStart,
    /// Tests: preload the next hand's deck, consumed exactly once.
    InjectDeck {
        cards: Vec<Card>,
    },
    /// Internal: the inter-hand delay elapsed.
    NextHand,
    /// Internal: the action timer hit a warning mark.
    TurnWarning {
        turn: u64,
        remaining_ms: u64,
    },
    /// Internal: the action timer expired.
    TurnExpired {
        turn: u64,
    },
    /// Terminate. `reason: None` is a server shutdown: flush state,
    /// no gameOver broadcast.
    Shutdown {
        reason: Option<GameOverReason>,
    },
}

/// Cheap cloneable address of a table task.
#[derive(Debug, Clone)]
pub struct TableHandle {
    pub id: Uuid,
    tx: mpsc::UnboundedSender<TableCmd>,
}

impl TableHandle {
    pub fn send(&self, cmd: TableCmd) {
        // A closed mailbox means the table already terminated; callers
        // treat that the same as GAME_NOT_FOUND on their next lookup.
        let _ = self.tx.send(cmd);
    }
}

/// Live handles of every running table task.
#[derive(Debug, Default)]
pub struct Tables {
    inner: std::sync::RwLock<std::collections::HashMap<Uuid, TableHandle>>,
}

impl Tables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, handle: TableHandle) {
        self.inner
            .write()
            .expect("tables lock poisoned")
            .insert(handle.id, handle);
    }

    pub fn get(&self, id: Uuid) -> Option<TableHandle> {
        self.inner
            .read()
            .expect("tables lock poisoned")
            .get(&id)
            .cloned()
    }

    pub fn remove(&self, id: Uuid) -> Option<TableHandle> {
        self.inner
            .write()
            .expect("tables lock poisoned")
            .remove(&id)
    }

    pub fn all(&self) -> Vec<TableHandle> {
        self.inner
            .read()
            .expect("tables lock poisoned")
            .values()
            .cloned()
            .collect()
    }
}

/// Shared collaborators handed to every table task.
#[derive(Clone)]
pub struct TableDeps {
    pub sessions: Arc<SessionManager>,
    pub registry: Arc<dyn GameRegistry>,
    pub snapshots: Arc<dyn SnapshotSink>,
    pub history: Arc<dyn HandHistorySink>,
    pub timing: Timing,
}

pub fn spawn_table(
    id: Uuid,
    config: TableConfig,
    deps: TableDeps,
) -> (TableHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = TableHandle { id, tx: tx.clone() };
    let state = TableState::create(id, config);
    let task = TableTask {
        settled_state: state.clone(),
        state,
        deps,
        self_tx: tx,
        turn: 0,
        armed_for: None,
        deadline: None,
        injected_deck: None,
        played_a_hand: false,
    };
    let join = tokio::spawn(task.run(rx));
    (handle, join)
}

struct TableTask {
    state: TableState,
    /// The state as of the last moment no hand was live: the previous
    /// completed hand's final view, plus any between-hand membership
    /// changes. Served to `delayed` spectators while a hand runs.
    settled_state: TableState,
    deps: TableDeps,
    self_tx: mpsc::UnboundedSender<TableCmd>,
    /// Turn generation; stale timer events carry an older value.
    turn: u64,
    /// Which `(hand_number, player)` the live timer was armed for.
    armed_for: Option<(u64, PlayerId)>,
    deadline: Option<Instant>,
    injected_deck: Option<Vec<Card>>,
    played_a_hand: bool,
}

impl TableTask {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<TableCmd>) {
        let table_id = self.state.table_id;
        tracing::info!(table_id = %table_id, "table task started");
        while let Some(cmd) = rx.recv().await {
            match cmd {
                TableCmd::Join {
                    player_id,
                    name,
                    role,
                    is_bot,
                } => self.handle_join(player_id, name, role, is_bot),
                TableCmd::Ready { player_id } => self.handle_ready(player_id),
                TableCmd::Action {
                    player_id,
                    hand_number,
                    action,
                    amount,
                } => self.handle_action(player_id, hand_number, action, amount),
                TableCmd::Reveal {
                    player_id,
                    hand_number,
                } => self.handle_reveal(player_id, hand_number),
                TableCmd::Chat { player_id, message } => self.handle_chat(player_id, message),
                TableCmd::Leave { player_id } => self.handle_leave(player_id),
                TableCmd::Connected {
                    player_id,
                    connected,
                } => self.handle_connected(player_id, connected),
                TableCmd::Resync { player_id } => self.handle_resync(player_id),
                TableCmd::ForceStart => self.handle_force_start(),
                TableCmd::InjectDeck { cards } => self.injected_deck = Some(cards),
                TableCmd::NextHand => {
                    if self.handle_next_hand() {
                        break;
                    }
                }
                TableCmd::TurnWarning { turn, remaining_ms } => {
                    self.handle_turn_warning(turn, remaining_ms)
                }
                TableCmd::TurnExpired { turn } => self.handle_turn_expired(turn),
                TableCmd::Shutdown { reason } => {
                    self.terminate(reason);
                    break;
                }
            }
        }
        tracing::info!(table_id = %table_id, "table task stopped");
    }

    // ------------------------------------------------------------------
    // Membership
    // ------------------------------------------------------------------

    fn handle_join(&mut self, player_id: PlayerId, name: String, role: Role, is_bot: bool) {
        match self.state.add_player(player_id, name, role, is_bot) {
            Ok(transitions) => {
                self.deps
                    .sessions
                    .set_table(player_id, Some((self.state.table_id, role)));
                // The joiner gets gameJoined with the full view instead
                // of the PLAYER_JOINED broadcast. A `delayed` spectator
                // arriving mid-hand gets the settled view, same as every
                // later broadcast they receive; their own seatless entry
                // is carried by the gameJoined fields.
                self.apply_and_broadcast(transitions, Some(player_id));
                let seat = self.state.player(player_id).and_then(|p| p.seat);
                let view = project(
                    self.view_source(role),
                    Viewer {
                        player_id,
                        role,
                    },
                );
                self.deps.sessions.send_to(
                    player_id,
                    ServerMessage::GameJoined {
                        game_id: self.state.table_id,
                        seat,
                        role,
                        game_state: view,
                    },
                );
                self.update_occupancy();
            }
            Err(err) => self.reply_error(player_id, &err),
        }
    }

    fn handle_leave(&mut self, player_id: PlayerId) {
        match self.state.remove_player(player_id) {
            Ok(transitions) => {
                self.apply_and_broadcast(transitions, None);
                self.deps.sessions.set_table(player_id, None);
                self.update_occupancy();
            }
            Err(err) => self.reply_error(player_id, &err),
        }
    }

    fn handle_connected(&mut self, player_id: PlayerId, connected: bool) {
        let Some(player) = self.state.player(player_id) else {
            return;
        };
        // A dropped spectator is discarded outright; a seated player is
        // only flagged, and their action timer keeps running.
        if player.role == Role::Spectator && !connected {
            self.handle_leave(player_id);
            return;
        }
        match self.state.set_connected(player_id, connected) {
            Ok(next) => self.state = next,
            Err(err) => {
                tracing::debug!(player_id = %player_id, error = %err, "connected flag not applied")
            }
        }
    }

    fn handle_resync(&mut self, player_id: PlayerId) {
        let Some(player) = self.state.player(player_id) else {
            return;
        };
        let role = player.role;
        let synthetic = HandEvent::PlayerJoined {
            player_id,
            name: player.name.clone(),
            seat: player.seat,
            role,
        };
        let view = project(
            self.view_source(role),
            Viewer { player_id, role },
        );
        let action_request = self.action_request_for(player_id);
        self.deps.sessions.send_to(
            player_id,
            ServerMessage::GameState {
                game_state: view,
                event: synthetic,
                action_request,
            },
        );
    }

    // ------------------------------------------------------------------
    // Hand control
    // ------------------------------------------------------------------

    fn handle_ready(&mut self, player_id: PlayerId) {
        match self.state.set_ready(player_id) {
            Ok(next) => {
                self.state = next;
                self.try_start_hand();
            }
            Err(err) => self.reply_error(player_id, &err),
        }
    }

    fn handle_force_start(&mut self) {
        let seated: Vec<PlayerId> = self
            .state
            .players
            .iter()
            .filter(|p| p.is_seated())
            .map(|p| p.id)
            .collect();
        for id in seated {
            if let Ok(next) = self.state.set_ready(id) {
                self.state = next;
            }
        }
        self.try_start_hand();
    }

    /// `true` when the table terminated and the task should stop.
    fn handle_next_hand(&mut self) -> bool {
        if self.state.hand_in_progress {
            return false;
        }
        if self.played_a_hand && self.state.funded_count() < 2 {
            self.terminate(Some(GameOverReason::Completed));
            return true;
        }
        self.try_start_hand();
        false
    }

    fn try_start_hand(&mut self) {
        if self.state.hand_in_progress
            || self.state.dealable_count() < self.deps.timing.min_players
        {
            return;
        }
        let deck = self.injected_deck.take();
        match self.state.start_hand(deck) {
            Ok(transitions) => {
                self.played_a_hand = true;
                self.deps
                    .registry
                    .update_status(self.state.table_id, TableStatus::Active);
                self.apply_and_broadcast(transitions, None);
            }
            Err(err) => tracing::debug!(
                table_id = %self.state.table_id,
                error = %err,
                "hand not started"
            ),
        }
    }

    // ------------------------------------------------------------------
    // Player input
    // ------------------------------------------------------------------

    fn handle_action(
        &mut self,
        player_id: PlayerId,
        hand_number: u64,
        action: ActionType,
        amount: Option<u64>,
    ) {
        if self.state.player(player_id).is_none() {
            self.deps.sessions.send_to(
                player_id,
                ServerMessage::error(ErrorCode::NotInGame, "not at this table"),
            );
            return;
        }
        if !self.state.hand_in_progress || hand_number != self.state.hand_number {
            self.deps.sessions.send_to(
                player_id,
                ServerMessage::error(
                    ErrorCode::InvalidAction,
                    format!(
                        "hand number {hand_number} does not match the live hand {}",
                        self.state.hand_number
                    ),
                ),
            );
            return;
        }
        match self.state.process_action(player_id, action, amount) {
            Ok(transitions) => self.apply_and_broadcast(transitions, None),
            // Rule rejections leave state and the action timer untouched.
            Err(err) => self.reply_error(player_id, &err),
        }
    }

    fn handle_reveal(&mut self, player_id: PlayerId, hand_number: u64) {
        if hand_number != self.state.hand_number {
            self.deps.sessions.send_to(
                player_id,
                ServerMessage::error(ErrorCode::InvalidAction, "reveal for a stale hand"),
            );
            return;
        }
        match self.state.reveal(player_id) {
            Ok(transitions) => self.apply_and_broadcast(transitions, None),
            Err(err) => self.reply_error(player_id, &err),
        }
    }

    fn handle_chat(&mut self, player_id: PlayerId, message: String) {
        let Some(player) = self.state.player(player_id) else {
            self.deps.sessions.send_to(
                player_id,
                ServerMessage::error(ErrorCode::NotInGame, "not at this table"),
            );
            return;
        };
        let broadcast = ServerMessage::ChatMessage {
            player_id,
            display_name: player.name.clone(),
            role: player.role,
            message,
        };
        for id in self.member_ids() {
            self.deps.sessions.send_to(id, broadcast.clone());
        }
    }

    // ------------------------------------------------------------------
    // Timers
    // ------------------------------------------------------------------

    fn handle_turn_warning(&mut self, turn: u64, remaining_ms: u64) {
        if turn != self.turn {
            return;
        }
        if let Some(active) = self.state.active_player {
            self.deps
                .sessions
                .send_to(active, ServerMessage::TimeWarning { remaining_ms });
        }
    }

    fn handle_turn_expired(&mut self, turn: u64) {
        if turn != self.turn {
            return;
        }
        let Some(active) = self.state.active_player else {
            return;
        };
        let default = match self.state.legal_actions(active) {
            Ok(legal) => legal.timeout_default(),
            Err(err) => {
                tracing::error!(player_id = %active, error = %err, "no legal default on timeout");
                return;
            }
        };
        match self.state.record_timeout(active) {
            Ok(transitions) => self.apply_and_broadcast(transitions, None),
            Err(err) => {
                tracing::error!(player_id = %active, error = %err, "timeout not recorded");
                return;
            }
        }
        match self.state.process_action(active, default, None) {
            Ok(transitions) => self.apply_and_broadcast(transitions, None),
            Err(err) => {
                tracing::error!(player_id = %active, error = %err, "default action rejected")
            }
        }
    }

    /// Arm or re-arm the action timer when the turn moved to a new
    /// `(hand, player)`. A submitted action cancels the pending timer by
    /// bumping the generation; its sleepers fire into stale turns.
    fn sync_turn_timer(&mut self) {
        let current = self
            .state
            .active_player
            .filter(|_| self.state.hand_in_progress)
            .map(|p| (self.state.hand_number, p));
        if current == self.armed_for {
            return;
        }
        self.armed_for = current;
        self.turn += 1;
        if current.is_none() {
            self.deadline = None;
            return;
        }

        let timeout = self.deps.timing.action_timeout;
        self.deadline = Some(Instant::now() + timeout);
        let turn = self.turn;
        for fraction in WARNING_FRACTIONS {
            let warn_after = timeout.mul_f64(fraction);
            let remaining_ms = (timeout - warn_after).as_millis() as u64;
            let tx = self.self_tx.clone();
            tokio::spawn(async move {
                tokio::time::sleep(warn_after).await;
                let _ = tx.send(TableCmd::TurnWarning { turn, remaining_ms });
            });
        }
        let tx = self.self_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = tx.send(TableCmd::TurnExpired { turn });
        });
    }

    // ------------------------------------------------------------------
    // Broadcast and post-processing
    // ------------------------------------------------------------------

    fn member_ids(&self) -> Vec<PlayerId> {
        self.state.players.iter().map(|p| p.id).collect()
    }

    /// Which state a one-off view for `role` projects from: `delayed`
    /// spectators see the last settled state while a hand is live,
    /// everyone else the live state.
    fn view_source(&self, role: Role) -> &TableState {
        if role == Role::Spectator
            && self.state.config.visibility == VisibilityPolicy::Delayed
            && self.state.hand_in_progress
        {
            &self.settled_state
        } else {
            &self.state
        }
    }

    fn action_request_for(&self, player_id: PlayerId) -> Option<ActionRequest> {
        if self.state.active_player != Some(player_id) {
            return None;
        }
        let legal = self.state.legal_actions(player_id).ok()?;
        let deadline_ms = self
            .deadline
            .map(|d| d.saturating_duration_since(Instant::now()).as_millis() as u64)
            .unwrap_or(self.deps.timing.action_timeout.as_millis() as u64);
        Some(ActionRequest {
            legal,
            hand_number: self.state.hand_number,
            deadline_ms,
        })
    }

    /// Advance the owned state through a transition batch, fan the
    /// per-viewer projections out, and run the persistence hooks.
    /// `suppress` drops delivery to one member (a joiner who receives
    /// `gameJoined` instead).
    fn apply_and_broadcast(&mut self, transitions: Vec<Transition>, suppress: Option<PlayerId>) {
        if transitions.is_empty() {
            return;
        }
        // Mid-hand leavers vanish from later snapshots but still hear
        // about the hand they abandoned.
        let mut recipients: HashSet<PlayerId> = self.member_ids().into_iter().collect();
        for t in &transitions {
            recipients.extend(t.state.players.iter().map(|p| p.id));
        }

        let delayed_spectators =
            self.state.config.visibility == VisibilityPolicy::Delayed;
        let mut ended_hand: Option<(u64, Vec<PotAward>)> = None;

        for transition in &transitions {
            self.state = transition.state.clone();
            self.sync_turn_timer();
            if let HandEvent::HandEnd {
                hand_number,
                awards,
            } = &transition.event
            {
                ended_hand = Some((*hand_number, awards.clone()));
            }
            for &member in &recipients {
                if suppress == Some(member) {
                    continue;
                }
                let role = transition
                    .state
                    .player(member)
                    .or_else(|| self.state.player(member))
                    .map(|p| p.role)
                    .unwrap_or(Role::Player);
                // Under `delayed`, spectators keep the previous hand's
                // final view until the live hand finishes.
                if delayed_spectators
                    && role == Role::Spectator
                    && transition.state.hand_in_progress
                {
                    continue;
                }
                let view = project(
                    &transition.state,
                    Viewer {
                        player_id: member,
                        role,
                    },
                );
                let action_request = self.action_request_for(member);
                self.deps.sessions.send_to(
                    member,
                    ServerMessage::GameState {
                        game_state: view,
                        event: transition.event.clone(),
                        action_request,
                    },
                );
            }
        }

        if !self.state.hand_in_progress {
            self.settled_state = self.state.clone();
        }
        self.snapshot();
        if let Some((hand_number, winners)) = ended_hand {
            self.after_hand_end(hand_number, winners);
        }
    }

    fn snapshot(&self) {
        match serde_json::to_value(&self.state) {
            Ok(blob) => {
                if let Err(err) = self.deps.snapshots.put(self.state.table_id, blob) {
                    tracing::error!(
                        table_id = %self.state.table_id,
                        error = %err,
                        "snapshot sink failed"
                    );
                }
            }
            Err(err) => tracing::error!(
                table_id = %self.state.table_id,
                error = %err,
                "state not serializable for snapshot"
            ),
        }
    }

    fn after_hand_end(&mut self, hand_number: u64, winners: Vec<PotAward>) {
        let record = HandHistoryRecord {
            game_id: self.state.table_id,
            hand_number,
            ts: None,
            events: self.state.events.clone(),
            winners,
        };
        if let Err(err) = self.deps.history.append(record) {
            tracing::error!(
                table_id = %self.state.table_id,
                error = %err,
                "hand history sink failed"
            );
        }

        // Busted players leave the table before the next deal.
        let busted: Vec<PlayerId> = self
            .state
            .players
            .iter()
            .filter(|p| p.is_seated() && p.stack == 0)
            .map(|p| p.id)
            .collect();
        for id in busted {
            self.handle_leave(id);
        }
        self.update_occupancy();

        let tx = self.self_tx.clone();
        let delay = self.deps.timing.hand_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(TableCmd::NextHand);
        });
    }

    fn update_occupancy(&self) {
        let players = self.state.seated_count();
        let bots = self
            .state
            .players
            .iter()
            .filter(|p| p.is_seated() && p.is_bot)
            .count();
        self.deps
            .registry
            .update_occupancy(self.state.table_id, players, bots);
    }

    fn reply_error(&self, player_id: PlayerId, err: &EngineError) {
        self.deps.sessions.send_to(player_id, engine_error_reply(err));
    }

    fn terminate(&mut self, reason: Option<GameOverReason>) {
        self.snapshot();
        if let Some(reason) = reason {
            let status = match reason {
                GameOverReason::Completed => TableStatus::Completed,
                GameOverReason::Cancelled => TableStatus::Cancelled,
            };
            self.deps.registry.update_status(self.state.table_id, status);
            let standings: Vec<Standing> = self
                .state
                .players
                .iter()
                .filter(|p| p.is_seated())
                .map(|p| Standing {
                    player_id: p.id,
                    display_name: p.name.clone(),
                    stack: p.stack,
                })
                .collect();
            let message = ServerMessage::GameOver {
                game_id: self.state.table_id,
                reason,
                standings,
            };
            for id in self.member_ids() {
                self.deps.sessions.send_to(id, message.clone());
                self.deps.sessions.set_table(id, None);
            }
        }
        tracing::info!(
            table_id = %self.state.table_id,
            reason = ?reason,
            "table terminated"
        );
    }
}
