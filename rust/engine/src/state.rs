//! The table state machine: a pure, referentially transparent core that
//! turns `(state, input)` into an ordered list of transitions. Each
//! transition pairs the state *after* an event with the event itself, so
//! callers own broadcasting and replay is a fold over the event list.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cards::Card;
use crate::deck::Deck;
use crate::errors::EngineError;
use crate::eval::{evaluate_seven, HandStrength};
use crate::events::{Blind, BlindPost, HandEvent, PotAward, PotWinner, ShowdownReveal};
use crate::player::{PlayerId, PlayerState, Role};
use crate::pots::build_pots;
use crate::rules::{ActionType, LegalActions, MAX_AMOUNT};

/// Betting stage of the current hand.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    PreFlop,
    Flop,
    Turn,
    River,
    Showdown,
}

/// What spectators are allowed to see of hole cards. Always a projection
/// concern; the engine holds full ground truth regardless.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisibilityPolicy {
    /// Spectators see only what players see (default).
    Showdown,
    /// Spectators see the previous completed hand until the current one ends.
    Delayed,
    /// Spectators see all hole cards at all times.
    Immediate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableConfig {
    pub small_blind: u64,
    pub big_blind: u64,
    pub starting_stack: u64,
    pub max_seats: usize,
    pub visibility: VisibilityPolicy,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            small_blind: 5,
            big_blind: 10,
            starting_stack: 1_000,
            max_seats: 9,
            visibility: VisibilityPolicy::Showdown,
        }
    }
}

/// A state snapshot paired with the event that produced it.
#[derive(Debug, Clone)]
pub struct Transition {
    pub state: TableState,
    pub event: HandEvent,
}

/// Complete engine-side state of one table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableState {
    pub table_id: Uuid,
    pub config: TableConfig,
    pub players: Vec<PlayerState>,
    pub dealer_seat: usize,
    pub hand_number: u64,
    pub stage: Stage,
    pub community: Vec<Card>,
    /// Undealt cards for the current hand. Never crosses a projection.
    deck: Deck,
    pub pot: u64,
    pub current_high_bet: u64,
    pub last_raise: u64,
    pub active_player: Option<PlayerId>,
    pub hand_in_progress: bool,
    /// Ordered event log of the current hand, cleared on hand start.
    pub events: Vec<HandEvent>,
}

impl TableState {
    pub fn create(table_id: Uuid, config: TableConfig) -> Self {
        // Dealer parks on the last seat so the first advance lands on
        // seat 0 when it is occupied.
        let dealer_seat = config.max_seats.saturating_sub(1);
        Self {
            table_id,
            config,
            players: Vec::new(),
            dealer_seat,
            hand_number: 0,
            stage: Stage::PreFlop,
            community: Vec::new(),
            deck: Deck::from_order(Vec::new()),
            pot: 0,
            current_high_bet: 0,
            last_raise: 0,
            active_player: None,
            hand_in_progress: false,
            events: Vec::new(),
        }
    }

    // ------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------

    pub fn player(&self, id: PlayerId) -> Option<&PlayerState> {
        self.players.iter().find(|p| p.id == id)
    }

    fn player_mut(&mut self, id: PlayerId) -> Option<&mut PlayerState> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    pub fn occupant_of(&self, seat: usize) -> Option<&PlayerState> {
        self.players.iter().find(|p| p.seat == Some(seat))
    }

    /// Seat indices clockwise after `seat`, one full lap.
    fn seats_after(&self, seat: usize) -> impl Iterator<Item = usize> {
        let n = self.config.max_seats;
        (1..=n).map(move |offset| (seat + offset) % n)
    }

    fn next_seat_where(&self, start: usize, pred: impl Fn(&PlayerState) -> bool) -> Option<usize> {
        self.seats_after(start)
            .find(|&s| self.occupant_of(s).map(&pred).unwrap_or(false))
    }

    /// Players still contending for the pot (dealt in and not folded).
    pub fn contenders(&self) -> impl Iterator<Item = &PlayerState> {
        self.players.iter().filter(|p| p.contending())
    }

    /// Contenders who may still act (not all-in).
    fn actors(&self) -> impl Iterator<Item = &PlayerState> {
        self.players.iter().filter(|p| p.can_act())
    }

    /// Seated players eligible to be dealt the next hand.
    fn dealable(&self) -> impl Iterator<Item = &PlayerState> {
        self.players
            .iter()
            .filter(|p| p.is_seated() && p.ready && p.stack > 0)
    }

    pub fn dealable_count(&self) -> usize {
        self.dealable().count()
    }

    pub fn seated_count(&self) -> usize {
        self.players.iter().filter(|p| p.is_seated()).count()
    }

    /// Seated players still holding chips, ready or not.
    pub fn funded_count(&self) -> usize {
        self.players
            .iter()
            .filter(|p| p.is_seated() && p.stack > 0)
            .count()
    }

    // ------------------------------------------------------------------
    // Membership operations
    // ------------------------------------------------------------------

    pub fn add_player(
        &self,
        id: PlayerId,
        name: String,
        role: Role,
        is_bot: bool,
    ) -> Result<Vec<Transition>, EngineError> {
        if self.player(id).is_some() {
            return Err(EngineError::AlreadyInGame);
        }
        let mut next = self.clone();
        let seat = match role {
            Role::Player => {
                let seat = (0..next.config.max_seats)
                    .find(|&s| next.occupant_of(s).is_none())
                    .ok_or(EngineError::GameFull)?;
                Some(seat)
            }
            Role::Spectator => None,
        };
        let stack = match role {
            Role::Player => next.config.starting_stack,
            Role::Spectator => 0,
        };
        let mut player = PlayerState::new(id, name.clone(), role, seat, stack);
        player.is_bot = is_bot;
        next.players.push(player);

        let mut out = Vec::new();
        emit(
            &mut next,
            &mut out,
            HandEvent::PlayerJoined {
                player_id: id,
                name,
                seat,
                role,
            },
        );
        Ok(out)
    }

    /// Remove a participant. A seated player who is still in a live hand
    /// is folded in place and purged at hand end so the chips they
    /// already contributed stay in the pot.
    pub fn remove_player(&self, id: PlayerId) -> Result<Vec<Transition>, EngineError> {
        let Some(player) = self.player(id) else {
            return Ok(Vec::new());
        };
        let live = self.hand_in_progress && player.contending();
        let was_active = self.active_player == Some(id);

        let mut next = self.clone();
        let mut out = Vec::new();
        if live {
            {
                let p = next.player_mut(id).expect("looked up above");
                p.leaving = true;
                p.folded = true;
                p.ready = false;
            }
            emit(&mut next, &mut out, HandEvent::PlayerLeft { player_id: id });
            next.settle_after_fold(id, was_active, &mut out);
        } else {
            next.players.retain(|p| p.id != id);
            emit(&mut next, &mut out, HandEvent::PlayerLeft { player_id: id });
        }
        Ok(out)
    }

    pub fn set_ready(&self, id: PlayerId) -> Result<TableState, EngineError> {
        let mut next = self.clone();
        let p = next.player_mut(id).ok_or(EngineError::UnknownPlayer)?;
        if p.role == Role::Player {
            p.ready = true;
        }
        Ok(next)
    }

    pub fn set_connected(&self, id: PlayerId, connected: bool) -> Result<TableState, EngineError> {
        let mut next = self.clone();
        let p = next.player_mut(id).ok_or(EngineError::UnknownPlayer)?;
        p.connected = connected;
        Ok(next)
    }

    // ------------------------------------------------------------------
    // Hand start
    // ------------------------------------------------------------------

    /// Start the next hand. `deck` injects a fixed permutation for
    /// deterministic play; production passes `None` for a CSPRNG shuffle.
    pub fn start_hand(&self, deck: Option<Vec<Card>>) -> Result<Vec<Transition>, EngineError> {
        if self.hand_in_progress {
            return Err(EngineError::HandInProgress);
        }
        if self.dealable_count() < 2 {
            return Err(EngineError::NotEnoughPlayers { required: 2 });
        }

        let mut next = self.clone();
        let mut out = Vec::new();

        next.events.clear();
        next.hand_number += 1;
        next.stage = Stage::PreFlop;
        next.community.clear();
        next.pot = 0;
        next.deck = match deck {
            Some(cards) => Deck::from_order(cards),
            None => Deck::shuffled(),
        };
        for p in &mut next.players {
            p.street_bet = 0;
            p.total_contributed = 0;
            p.folded = false;
            p.all_in = false;
            p.hole_cards = None;
            p.acted_this_street = false;
            p.revealed = false;
        }

        let heads_up = next.dealable_count() == 2;
        next.dealer_seat = next
            .next_seat_where(next.dealer_seat, |p| p.ready && p.stack > 0)
            .expect("at least two dealable players");
        next.hand_in_progress = true;

        let hand_number = next.hand_number;
        let dealer_seat = next.dealer_seat;
        emit(
            &mut next,
            &mut out,
            HandEvent::HandStart {
                hand_number,
                dealer_seat,
            },
        );

        // Blind seats. Heads-up the dealer posts the small blind and the
        // other player the big blind; otherwise the two seats after the
        // dealer post in order.
        let dealt_seat = |p: &PlayerState| p.ready && p.stack > 0;
        let (sb_seat, bb_seat) = if heads_up {
            let other = next
                .next_seat_where(dealer_seat, dealt_seat)
                .expect("second player");
            (dealer_seat, other)
        } else {
            let sb = next
                .next_seat_where(dealer_seat, dealt_seat)
                .expect("small blind seat");
            let bb = next.next_seat_where(sb, dealt_seat).expect("big blind seat");
            (sb, bb)
        };

        // Deal order fixed before blinds can zero a stack.
        let deal_order: Vec<PlayerId> = next
            .seats_after(dealer_seat)
            .filter_map(|s| next.occupant_of(s))
            .filter(|p| p.ready && p.stack > 0)
            .map(|p| p.id)
            .collect();

        let mut posts = Vec::new();
        for (seat, blind, amount) in [
            (sb_seat, Blind::Small, next.config.small_blind),
            (bb_seat, Blind::Big, next.config.big_blind),
        ] {
            let id = next.occupant_of(seat).expect("blind seat occupied").id;
            let p = next.player_mut(id).expect("blind poster");
            let committed = p.commit(amount);
            let all_in = p.all_in;
            next.pot += committed;
            posts.push(BlindPost {
                player_id: id,
                blind,
                amount: committed,
                all_in,
            });
        }
        next.current_high_bet = next.config.big_blind;
        next.last_raise = next.config.big_blind;
        emit(&mut next, &mut out, HandEvent::BlindsPosted { posts });

        // Two hole cards each, one at a time, starting left of the dealer.
        let mut firsts = Vec::with_capacity(deal_order.len());
        for _ in 0..deal_order.len() {
            firsts.push(next.deck.draw().expect("fresh deck"));
        }
        for (i, &id) in deal_order.iter().enumerate() {
            let second = next.deck.draw().expect("fresh deck");
            let p = next.player_mut(id).expect("dealt player");
            p.hole_cards = Some([firsts[i], second]);
        }

        // First to act pre-flop is the next actor after the big blind,
        // which wraps back to the dealer heads-up.
        next.active_player = next.betting_entry_point(bb_seat);
        emit(&mut next, &mut out, HandEvent::Deal { hand_number });
        if next.active_player.is_none() {
            next.fast_forward(&mut out);
        }

        Ok(out)
    }

    // ------------------------------------------------------------------
    // Actions
    // ------------------------------------------------------------------

    /// Legal moves for the given player right now. Drives both the
    /// per-turn action request sent to clients and timeout substitution.
    pub fn legal_actions(&self, id: PlayerId) -> Result<LegalActions, EngineError> {
        if !self.hand_in_progress {
            return Err(EngineError::NoHandInProgress);
        }
        let p = self.player(id).ok_or(EngineError::UnknownPlayer)?;
        if !p.can_act() {
            return Err(EngineError::InvalidAction(
                "player cannot act in this hand".into(),
            ));
        }

        let to_call = self.current_high_bet.saturating_sub(p.street_bet);
        let mut legal = LegalActions {
            actions: vec![ActionType::Fold],
            to_call,
            min_bet: None,
            max_bet: None,
            min_raise_to: None,
            max_raise_to: None,
        };

        if to_call == 0 {
            legal.actions.push(ActionType::Check);
        } else {
            legal.actions.push(ActionType::Call);
        }
        if self.current_high_bet == 0 && p.stack > 0 {
            legal.actions.push(ActionType::Bet);
            legal.min_bet = Some(self.config.big_blind.min(p.stack));
            legal.max_bet = Some(p.stack);
        }
        let max_raise_to = p.street_bet + p.stack;
        if self.current_high_bet > 0 && !p.acted_this_street && max_raise_to > self.current_high_bet
        {
            legal.actions.push(ActionType::Raise);
            legal.min_raise_to = Some(self.min_raise_to().min(max_raise_to));
            legal.max_raise_to = Some(max_raise_to);
        }
        // An all-in that would top the high bet is a raise in disguise,
        // so it obeys the same reopen gate; a covered all-in is a call.
        if p.stack > 0 && (!p.acted_this_street || max_raise_to <= self.current_high_bet) {
            legal.actions.push(ActionType::AllIn);
        }
        Ok(legal)
    }

    /// Minimum raise-to target: the high bet plus the last full raise
    /// increment, never less than a big blind's worth.
    fn min_raise_to(&self) -> u64 {
        self.current_high_bet + self.last_raise.max(self.config.big_blind)
    }

    pub fn process_action(
        &self,
        id: PlayerId,
        action: ActionType,
        amount: Option<u64>,
    ) -> Result<Vec<Transition>, EngineError> {
        if !self.hand_in_progress {
            return Err(EngineError::NoHandInProgress);
        }
        if self.player(id).is_none() {
            return Err(EngineError::UnknownPlayer);
        }
        if self.active_player != Some(id) {
            return Err(EngineError::OutOfTurn);
        }
        if let Some(a) = amount {
            if a > MAX_AMOUNT {
                return Err(EngineError::InvalidAmount {
                    amount: a,
                    minimum: 0,
                });
            }
        }

        let mut next = self.clone();
        let mut out = Vec::new();
        let street_bet_after = next.apply_action(id, action, amount)?;

        let actor = next.player(id).expect("actor exists");
        let event = HandEvent::PlayerAction {
            player_id: id,
            action,
            amount: street_bet_after,
            all_in: actor.all_in,
        };

        if action == ActionType::Fold {
            emit(&mut next, &mut out, event);
            next.settle_after_fold(id, true, &mut out);
        } else {
            next.advance_or_close(id, &mut out, event);
        }
        Ok(out)
    }

    /// Record the orchestrator's timer expiry for the active player.
    /// Pure log append; the substituted default action follows through
    /// `process_action` on the resulting state.
    pub fn record_timeout(&self, id: PlayerId) -> Result<Vec<Transition>, EngineError> {
        if !self.hand_in_progress {
            return Err(EngineError::NoHandInProgress);
        }
        if self.active_player != Some(id) {
            return Err(EngineError::OutOfTurn);
        }
        let mut next = self.clone();
        let mut out = Vec::new();
        emit(&mut next, &mut out, HandEvent::PlayerTimeout { player_id: id });
        Ok(out)
    }

    /// Validate and book the chip movement for one action, returning the
    /// actor's street bet afterwards. Turn order is untouched here.
    fn apply_action(
        &mut self,
        id: PlayerId,
        action: ActionType,
        amount: Option<u64>,
    ) -> Result<u64, EngineError> {
        let high = self.current_high_bet;
        let min_raise_to = self.min_raise_to();
        let big_blind = self.config.big_blind;
        let (to_call, stack, street_bet, acted) = {
            let p = self.player(id).expect("checked by caller");
            (
                high.saturating_sub(p.street_bet),
                p.stack,
                p.street_bet,
                p.acted_this_street,
            )
        };

        let commit_amount = match action {
            ActionType::Fold => {
                let p = self.player_mut(id).expect("checked by caller");
                p.folded = true;
                p.acted_this_street = true;
                return Ok(street_bet);
            }
            ActionType::Check => {
                if to_call != 0 {
                    return Err(EngineError::InvalidAction(
                        "cannot check facing a bet".into(),
                    ));
                }
                0
            }
            ActionType::Call => to_call,
            ActionType::Bet => {
                if high != 0 {
                    return Err(EngineError::InvalidAction(
                        "cannot bet over a live bet; raise instead".into(),
                    ));
                }
                let target = amount.ok_or(EngineError::InvalidAmount {
                    amount: 0,
                    minimum: big_blind.min(stack),
                })?;
                if target > stack || (target < big_blind && target != stack) {
                    return Err(EngineError::InvalidAmount {
                        amount: target,
                        minimum: big_blind.min(stack),
                    });
                }
                target
            }
            ActionType::Raise => {
                if high == 0 {
                    return Err(EngineError::InvalidAction(
                        "nothing to raise; bet instead".into(),
                    ));
                }
                if acted {
                    return Err(EngineError::InvalidAction(
                        "raising is not reopened for this player".into(),
                    ));
                }
                let max_raise_to = street_bet + stack;
                let target = amount.ok_or(EngineError::InvalidAmount {
                    amount: 0,
                    minimum: min_raise_to.min(max_raise_to),
                })?;
                if target > max_raise_to || target <= high {
                    return Err(EngineError::InvalidAmount {
                        amount: target,
                        minimum: min_raise_to.min(max_raise_to),
                    });
                }
                // Below the minimum is legal only as an all-in for less.
                if target < min_raise_to && target != max_raise_to {
                    return Err(EngineError::InvalidAmount {
                        amount: target,
                        minimum: min_raise_to.min(max_raise_to),
                    });
                }
                target - street_bet
            }
            ActionType::AllIn => {
                if stack == 0 {
                    return Err(EngineError::InvalidAction("no chips to move in".into()));
                }
                if acted && street_bet + stack > high {
                    return Err(EngineError::InvalidAction(
                        "raising is not reopened for this player".into(),
                    ));
                }
                stack
            }
        };

        let committed = {
            let p = self.player_mut(id).expect("checked by caller");
            let committed = p.commit(commit_amount);
            p.acted_this_street = true;
            committed
        };
        self.pot += committed;

        // Aggression bookkeeping: a full raise resets everyone else's
        // acted flag so action reopens; a short all-in moves the high bet
        // without reopening.
        let actor_bet = self.player(id).expect("actor").street_bet;
        if actor_bet > high {
            let increment = actor_bet - high;
            let reopens = increment >= self.last_raise.max(big_blind);
            self.current_high_bet = actor_bet;
            if reopens {
                self.last_raise = increment;
                for other in &mut self.players {
                    if other.id != id && other.can_act() {
                        other.acted_this_street = false;
                    }
                }
            }
        }
        Ok(actor_bet)
    }

    // ------------------------------------------------------------------
    // Flow after an action
    // ------------------------------------------------------------------

    /// True when every player who can still act has acted and matched
    /// the street's high bet.
    fn round_closed(&self) -> bool {
        self.actors()
            .all(|p| p.acted_this_street && p.street_bet == self.current_high_bet)
    }

    /// First player able to act clockwise after `seat`, provided betting
    /// is meaningful: at least two actors, or a lone actor still owing
    /// a call.
    fn betting_entry_point(&self, seat: usize) -> Option<PlayerId> {
        let actors: Vec<&PlayerState> = self.actors().collect();
        let open = match actors.len() {
            0 => false,
            1 => actors[0].street_bet < self.current_high_bet,
            _ => true,
        };
        if !open {
            return None;
        }
        self.next_actor_after(seat)
    }

    fn next_actor_after(&self, seat: usize) -> Option<PlayerId> {
        self.next_seat_where(seat, |p| p.can_act())
            .and_then(|s| self.occupant_of(s))
            .map(|p| p.id)
    }

    /// Turn-order resolution after a non-fold action: emit the action
    /// event with the successor already installed, then close the street
    /// if it is done.
    fn advance_or_close(&mut self, actor: PlayerId, out: &mut Vec<Transition>, event: HandEvent) {
        if self.round_closed() {
            self.active_player = None;
            emit(self, out, event);
            self.close_street(out);
        } else {
            let seat = self
                .player(actor)
                .and_then(|p| p.seat)
                .expect("actor is seated");
            self.active_player = self.next_actor_after(seat);
            emit(self, out, event);
        }
    }

    /// Shared epilogue for voluntary folds and mid-hand leaves. The
    /// triggering event has already been emitted; its snapshot is
    /// refreshed once the turn order settles.
    fn settle_after_fold(&mut self, folder: PlayerId, was_active: bool, out: &mut Vec<Transition>) {
        if self.contenders().count() <= 1 {
            self.active_player = None;
            patch_last(self, out);
            self.award_to_survivor(out);
            return;
        }
        if self.round_closed() {
            self.active_player = None;
            patch_last(self, out);
            self.close_street(out);
            return;
        }
        if was_active {
            let seat = self
                .player(folder)
                .and_then(|p| p.seat)
                .expect("folder is seated");
            self.active_player = self.next_actor_after(seat);
            patch_last(self, out);
        }
    }

    /// Collect street bets, advance the stage, deal, and either reopen
    /// betting or fast-forward to showdown.
    fn close_street(&mut self, out: &mut Vec<Transition>) {
        self.collect_street();
        if self.stage == Stage::River {
            self.stage = Stage::Showdown;
            self.showdown(out);
            return;
        }
        let event = self.deal_next_street();
        self.active_player = self.betting_entry_point(self.dealer_seat);
        emit(self, out, event);
        if self.active_player.is_none() {
            self.fast_forward(out);
        }
    }

    fn collect_street(&mut self) {
        for p in &mut self.players {
            p.street_bet = 0;
            p.acted_this_street = false;
        }
        self.current_high_bet = 0;
        self.last_raise = self.config.big_blind;
    }

    /// Advance one stage and deal its community cards, returning the
    /// street event for the caller to emit.
    fn deal_next_street(&mut self) -> HandEvent {
        match self.stage {
            Stage::PreFlop => {
                self.stage = Stage::Flop;
                let cards = [
                    self.deck.draw().expect("deck has flop"),
                    self.deck.draw().expect("deck has flop"),
                    self.deck.draw().expect("deck has flop"),
                ];
                self.community.extend_from_slice(&cards);
                HandEvent::Flop { cards }
            }
            Stage::Flop => {
                self.stage = Stage::Turn;
                let card = self.deck.draw().expect("deck has turn");
                self.community.push(card);
                HandEvent::Turn { card }
            }
            Stage::Turn => {
                self.stage = Stage::River;
                let card = self.deck.draw().expect("deck has river");
                self.community.push(card);
                HandEvent::River { card }
            }
            Stage::River | Stage::Showdown => unreachable!("no street past the river"),
        }
    }

    /// No further betting possible: run out the board, then show down.
    fn fast_forward(&mut self, out: &mut Vec<Transition>) {
        while self.stage != Stage::River {
            let event = self.deal_next_street();
            emit(self, out, event);
        }
        self.collect_street();
        self.stage = Stage::Showdown;
        self.showdown(out);
    }

    // ------------------------------------------------------------------
    // Resolution
    // ------------------------------------------------------------------

    fn showdown(&mut self, out: &mut Vec<Transition>) {
        let strengths: Vec<(PlayerId, HandStrength)> = self
            .seats_after(self.dealer_seat)
            .filter_map(|s| self.occupant_of(s))
            .filter(|p| p.contending())
            .map(|p| {
                let hole = p.hole_cards.expect("contender was dealt in");
                let mut cards: Vec<Card> = hole.to_vec();
                cards.extend(self.community.iter().copied());
                let seven: [Card; 7] = cards.try_into().expect("two hole plus five community");
                (p.id, evaluate_seven(&seven))
            })
            .collect();

        let reveals: Vec<ShowdownReveal> = strengths
            .iter()
            .map(|(id, strength)| ShowdownReveal {
                player_id: *id,
                hole_cards: self
                    .player(*id)
                    .and_then(|p| p.hole_cards)
                    .expect("contender was dealt in"),
                description: strength.describe(),
            })
            .collect();
        emit(self, out, HandEvent::Showdown { reveals });

        let awards = self.award_pots(&strengths);
        let hand_number = self.hand_number;
        self.finish_hand();
        emit(
            self,
            out,
            HandEvent::HandEnd {
                hand_number,
                awards,
            },
        );
    }

    /// Everyone else folded: the survivor takes every pot, no showdown.
    fn award_to_survivor(&mut self, out: &mut Vec<Transition>) {
        self.collect_street();
        let survivor = self
            .contenders()
            .next()
            .map(|p| p.id)
            .expect("exactly one contender");
        let mut awards = Vec::new();
        for pot in build_pots(&self.players) {
            let p = self.player_mut(survivor).expect("survivor exists");
            p.stack += pot.amount;
            awards.push(PotAward {
                amount: pot.amount,
                winners: vec![PotWinner {
                    player_id: survivor,
                    amount: pot.amount,
                }],
            });
        }
        let hand_number = self.hand_number;
        self.finish_hand();
        emit(
            self,
            out,
            HandEvent::HandEnd {
                hand_number,
                awards,
            },
        );
    }

    /// Split each pot among its best eligible hands. An odd remainder
    /// goes to the tied winner seated closest left of the dealer.
    fn award_pots(&mut self, strengths: &[(PlayerId, HandStrength)]) -> Vec<PotAward> {
        let mut awards = Vec::new();
        for pot in build_pots(&self.players) {
            let best = pot
                .eligible
                .iter()
                .filter_map(|id| strengths.iter().find(|(sid, _)| sid == id))
                .max_by(|a, b| a.1.cmp(&b.1))
                .map(|(_, s)| s.clone())
                .expect("pot has an eligible contender");
            // `strengths` is ordered clockwise from the dealer, so ties
            // already list the odd-chip recipient first.
            let winners: Vec<PlayerId> = strengths
                .iter()
                .filter(|(id, s)| pot.eligible.contains(id) && *s == best)
                .map(|(id, _)| *id)
                .collect();

            let share = pot.amount / winners.len() as u64;
            let remainder = pot.amount % winners.len() as u64;
            let mut winner_shares = Vec::new();
            for (i, id) in winners.iter().enumerate() {
                let amount = share + if i == 0 { remainder } else { 0 };
                let p = self.player_mut(*id).expect("winner exists");
                p.stack += amount;
                winner_shares.push(PotWinner {
                    player_id: *id,
                    amount,
                });
            }
            awards.push(PotAward {
                amount: pot.amount,
                winners: winner_shares,
            });
        }
        awards
    }

    /// Hand teardown: pots settled, contributions cleared, mid-hand
    /// leavers purged. Hole cards stay visible for the reveal window
    /// until the next hand is dealt.
    fn finish_hand(&mut self) {
        self.hand_in_progress = false;
        self.active_player = None;
        self.pot = 0;
        self.current_high_bet = 0;
        self.last_raise = 0;
        for p in &mut self.players {
            p.street_bet = 0;
            p.total_contributed = 0;
        }
        self.players.retain(|p| !p.leaving);
    }

    // ------------------------------------------------------------------
    // Reveal
    // ------------------------------------------------------------------

    /// Voluntarily show hole cards. Accepted from hand end until the
    /// next hand's deal wipes them.
    pub fn reveal(&self, id: PlayerId) -> Result<Vec<Transition>, EngineError> {
        let p = self.player(id).ok_or(EngineError::UnknownPlayer)?;
        let hole_cards = p
            .hole_cards
            .ok_or_else(|| EngineError::InvalidAction("no hole cards to reveal".into()))?;
        if self.hand_in_progress {
            return Err(EngineError::InvalidAction(
                "cannot reveal during a live hand".into(),
            ));
        }
        let mut next = self.clone();
        next.player_mut(id).expect("looked up above").revealed = true;
        let mut out = Vec::new();
        emit(
            &mut next,
            &mut out,
            HandEvent::PlayerRevealed {
                player_id: id,
                hole_cards,
            },
        );
        Ok(out)
    }

    // ------------------------------------------------------------------
    // Diagnostics
    // ------------------------------------------------------------------

    /// Structural invariants checked by tests after every transition.
    pub fn check_invariants(&self) -> Result<(), String> {
        let contributed: u64 = self.players.iter().map(|p| p.total_contributed).sum();
        if self.pot != contributed {
            return Err(format!(
                "pot {} != total contributions {contributed}",
                self.pot
            ));
        }
        let expected_community = match self.stage {
            Stage::PreFlop => 0,
            Stage::Flop => 3,
            Stage::Turn => 4,
            Stage::River => 5,
            Stage::Showdown => self.community.len(),
        };
        if self.hand_in_progress && self.community.len() != expected_community {
            return Err(format!(
                "{} community cards at {:?}",
                self.community.len(),
                self.stage
            ));
        }
        for p in &self.players {
            if p.stack == 0 && p.street_bet > 0 && !p.all_in {
                return Err(format!("player {} broke without all-in flag", p.id));
            }
        }
        let mut seats: Vec<usize> = self.players.iter().filter_map(|p| p.seat).collect();
        seats.sort_unstable();
        let occupied = seats.len();
        seats.dedup();
        if seats.len() != occupied {
            return Err("duplicate seat assignment".into());
        }
        if self.hand_in_progress {
            let mut cards: Vec<Card> = self.community.clone();
            for p in &self.players {
                if let Some(h) = p.hole_cards {
                    cards.extend_from_slice(&h);
                }
            }
            cards.extend_from_slice(self.deck.undealt());
            let total = cards.len();
            cards.sort_unstable();
            cards.dedup();
            if cards.len() != total || total != 52 {
                return Err(format!(
                    "card material is not a 52-card permutation ({total})"
                ));
            }
        }
        Ok(())
    }
}

/// Append the event to the hand log and snapshot the state after it.
fn emit(state: &mut TableState, out: &mut Vec<Transition>, event: HandEvent) {
    state.events.push(event.clone());
    out.push(Transition {
        state: state.clone(),
        event,
    });
}

/// Refresh the most recent transition's snapshot after late turn-order
/// mutations, so a trailing event already carries the next active player.
fn patch_last(state: &TableState, out: &mut Vec<Transition>) {
    if let Some(last) = out.last_mut() {
        last.state = state.clone();
    }
}
