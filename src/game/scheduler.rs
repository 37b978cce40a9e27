//! One async task per live match.
//!
//! Commands and the Decision deadline feed a single queue, so every mutation
//! of a match's state happens on its own actor: single-writer by
//! construction. The resolution engine itself is pure and synchronous; a
//! panic inside it tears down that match only.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use rand_pcg::Pcg64Mcg;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::catalog::{CardCatalog, CardLookup};
use crate::config::settings;
use crate::game::actions::Action;
use crate::game::deck;
use crate::game::events::{EventLog, EventType};
use crate::game::resolve;
use crate::game::types::{MatchId, MatchState, MatchStatus, Phase, PlannedPlay, Seat};
use crate::hub::SessionHub;
use crate::protocol::ClientMsg;
use crate::store::MatchStore;

#[derive(Debug)]
pub enum SchedulerMsg {
    Command(ClientMsg),
    Shutdown,
}

#[derive(Debug, PartialEq, Eq)]
pub enum DispatchError {
    MatchNotFound,
    ChannelClosed,
}

/// Shared collaborators every match actor works against.
#[derive(Clone)]
pub struct SchedulerDeps {
    pub store: Arc<MatchStore>,
    pub catalog: Arc<CardCatalog>,
    pub hub: Arc<SessionHub>,
}

/// Registry of live match actors: match id → input queue.
pub struct Schedulers {
    deps: SchedulerDeps,
    senders: Arc<DashMap<MatchId, mpsc::Sender<SchedulerMsg>>>,
    decision_deadline: Duration,
}

impl Schedulers {
    pub fn new(store: Arc<MatchStore>, catalog: Arc<CardCatalog>, hub: Arc<SessionHub>) -> Self {
        Self::with_deadline(
            store,
            catalog,
            hub,
            Duration::from_secs(settings().decision_deadline_secs),
        )
    }

    /// Same as [`Schedulers::new`] with an explicit Decision deadline;
    /// tests shorten it to milliseconds.
    pub fn with_deadline(
        store: Arc<MatchStore>,
        catalog: Arc<CardCatalog>,
        hub: Arc<SessionHub>,
        decision_deadline: Duration,
    ) -> Self {
        Self {
            deps: SchedulerDeps {
                store,
                catalog,
                hub,
            },
            senders: Arc::new(DashMap::new()),
            decision_deadline,
        }
    }

    /// Spawns the actor for a match already present in the store. A no-op
    /// when the actor is running.
    pub fn start(&self, match_id: &MatchId) -> Result<(), DispatchError> {
        use dashmap::mapref::entry::Entry;

        if !self.deps.store.contains(match_id) {
            return Err(DispatchError::MatchNotFound);
        }
        if let Entry::Vacant(slot) = self.senders.entry(match_id.clone()) {
            let (tx, rx) = mpsc::channel::<SchedulerMsg>(64);
            slot.insert(tx);
            let actor = MatchActor {
                match_id: match_id.clone(),
                deps: self.deps.clone(),
                senders: Arc::clone(&self.senders),
                deadline: None,
                deadline_len: self.decision_deadline,
            };
            tokio::spawn(actor.run(rx));
        }
        Ok(())
    }

    /// Routes a command to the match's actor, reviving it if the match
    /// still exists in the store.
    pub async fn dispatch(&self, match_id: &MatchId, msg: ClientMsg) -> Result<(), DispatchError> {
        if let Some(tx) = self.senders.get(match_id).map(|e| e.value().clone()) {
            return tx
                .send(SchedulerMsg::Command(msg))
                .await
                .map_err(|_| DispatchError::ChannelClosed);
        }
        self.start(match_id)?;
        let tx = self
            .senders
            .get(match_id)
            .map(|e| e.value().clone())
            .ok_or(DispatchError::ChannelClosed)?;
        tx.send(SchedulerMsg::Command(msg))
            .await
            .map_err(|_| DispatchError::ChannelClosed)
    }

    pub async fn shutdown(&self, match_id: &MatchId) {
        if let Some((_, tx)) = self.senders.remove(match_id) {
            let _ = tx.send(SchedulerMsg::Shutdown).await;
        }
    }

    pub fn is_running(&self, match_id: &MatchId) -> bool {
        self.senders.contains_key(match_id)
    }
}

#[derive(PartialEq)]
enum Flow {
    Continue,
    Halt,
}

struct MatchActor {
    match_id: MatchId,
    deps: SchedulerDeps,
    senders: Arc<DashMap<MatchId, mpsc::Sender<SchedulerMsg>>>,
    deadline: Option<Instant>,
    deadline_len: Duration,
}

impl MatchActor {
    async fn run(mut self, mut rx: mpsc::Receiver<SchedulerMsg>) {
        let mut state = match self.deps.store.get(&self.match_id) {
            Ok(state) => state,
            Err(e) => {
                log::error!("scheduler for {} found no state: {e}", self.match_id);
                self.teardown();
                return;
            }
        };
        if state.status == MatchStatus::Finished {
            log::debug!("match {} is already finished", self.match_id);
            self.teardown();
            return;
        }
        let mut rngs = [
            deck::seat_rng(&self.match_id, 0),
            deck::seat_rng(&self.match_id, 1),
        ];
        self.deal_decks(&mut state, &mut rngs);

        if state.status == MatchStatus::Waiting {
            state.status = MatchStatus::InProgress;
        }
        log::info!("match {} started", self.match_id);

        if self.begin_round(&mut state, &mut rngs) == Flow::Halt {
            self.teardown();
            return;
        }

        loop {
            let msg = if let Some(when) = self.deadline {
                tokio::select! {
                    m = rx.recv() => match m {
                        Some(m) => m,
                        None => break,
                    },
                    _ = tokio::time::sleep_until(when) => {
                        log::info!("decision deadline expired for {}", self.match_id);
                        if self.run_resolution(&mut state, &mut rngs, true) == Flow::Halt {
                            break;
                        }
                        continue;
                    }
                }
            } else {
                match rx.recv().await {
                    Some(m) => m,
                    None => break,
                }
            };

            match msg {
                SchedulerMsg::Shutdown => break,
                SchedulerMsg::Command(cmd) => {
                    if self.handle_command(&mut state, &mut rngs, cmd) == Flow::Halt {
                        break;
                    }
                }
            }
        }

        self.teardown();
        log::info!("match {} scheduler stopped", self.match_id);
    }

    fn teardown(&self) {
        self.senders.remove(&self.match_id);
        self.deps.hub.close_match(&self.match_id);
    }

    fn persist(&self, state: &MatchState) {
        if let Err(e) = self.deps.store.update(state.clone()) {
            log::warn!("persisting match {} failed: {e}", self.match_id);
        }
    }

    /// Expands both seats' decks into shuffled draw piles on first start.
    fn deal_decks(&self, state: &mut MatchState, rngs: &mut [Pcg64Mcg; 2]) {
        for seat in 0..2 {
            let ps = &state.seats[seat];
            if !ps.draw_pile.is_empty() || !ps.hand.is_empty() || !ps.discard_pile.is_empty() {
                continue;
            }
            let prebuilt = self.deps.catalog.prebuilt_decks();
            let deck = match self.deps.catalog.deck(&ps.deck_id) {
                Some(deck) => deck,
                None => {
                    let Some(fallback) = prebuilt.get(seat % prebuilt.len().max(1)) else {
                        continue;
                    };
                    log::warn!(
                        "match {}: unknown deck {}, falling back to {}",
                        self.match_id,
                        ps.deck_id,
                        fallback.id
                    );
                    fallback
                }
            };
            state.seats[seat].deck_id = deck.id.clone();
            state.seats[seat].draw_pile = deck::expand_deck(deck, seat, &mut rngs[seat]);
        }
    }

    /// Upkeep for the current round, then open the Decision window.
    fn begin_round(&mut self, state: &mut MatchState, rngs: &mut [Pcg64Mcg; 2]) -> Flow {
        let now = Utc::now();
        state.set_phase(Phase::Upkeep, now);
        self.deps.hub.broadcast(
            &self.match_id,
            crate::protocol::ServerMsg::PhaseChanged {
                phase: Phase::Upkeep,
            },
        );

        let log = resolve::run_upkeep(state, rngs, now);
        state.last_event_log = Some(log.clone());
        self.persist(state);
        self.deps
            .hub
            .broadcast(&self.match_id, crate::protocol::ServerMsg::EventLog { log });

        if state.status == MatchStatus::Finished {
            self.deps.hub.broadcast(
                &self.match_id,
                crate::protocol::ServerMsg::GameOver {
                    winner: state.winner(),
                },
            );
            return Flow::Halt;
        }

        state.set_phase(Phase::Decision, Utc::now());
        self.persist(state);
        self.deps.hub.broadcast(
            &self.match_id,
            crate::protocol::ServerMsg::PhaseChanged {
                phase: Phase::Decision,
            },
        );
        self.deps.hub.broadcast_state(&self.match_id, state);
        self.deadline = Some(Instant::now() + self.deadline_len);
        Flow::Continue
    }

    /// Invokes the engine exactly once per round, then either finishes the
    /// match or rolls into the next round's upkeep.
    fn run_resolution(
        &mut self,
        state: &mut MatchState,
        rngs: &mut [Pcg64Mcg; 2],
        deadline_expired: bool,
    ) -> Flow {
        self.deadline = None;
        let now = Utc::now();
        state.set_phase(Phase::Resolution, now);
        self.deps.hub.broadcast(
            &self.match_id,
            crate::protocol::ServerMsg::PhaseChanged {
                phase: Phase::Resolution,
            },
        );

        let queues = std::mem::take(&mut state.pending_actions);
        let catalog: &dyn CardLookup = self.deps.catalog.as_ref();
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            resolve::resolve_round(state, queues, catalog, now, deadline_expired)
        }));
        let log = match outcome {
            Ok(log) => log,
            Err(_) => {
                log::error!("resolution panicked for match {}; tearing down", self.match_id);
                self.deps
                    .hub
                    .broadcast(&self.match_id, crate::protocol::ServerMsg::GameOver {
                        winner: -1,
                    });
                let _ = self.deps.store.delete(&self.match_id);
                return Flow::Halt;
            }
        };

        state.last_event_log = Some(log.clone());
        self.persist(state);
        self.deps
            .hub
            .broadcast(&self.match_id, crate::protocol::ServerMsg::EventLog { log });
        self.deps.hub.broadcast_state(&self.match_id, state);

        if state.status == MatchStatus::Finished {
            self.deps.hub.broadcast(
                &self.match_id,
                crate::protocol::ServerMsg::GameOver {
                    winner: state.winner(),
                },
            );
            self.persist(state);
            return Flow::Halt;
        }

        state.current_round += 1;
        state.clear_round_inputs();
        self.begin_round(state, rngs)
    }

    fn in_decision(&self, state: &MatchState) -> bool {
        state.current_phase == Phase::Decision
    }

    fn handle_command(
        &mut self,
        state: &mut MatchState,
        rngs: &mut [Pcg64Mcg; 2],
        cmd: ClientMsg,
    ) -> Flow {
        match cmd {
            ClientMsg::SubmitActions { seat, actions } => {
                if seat > 1 || !self.in_decision(state) {
                    log::debug!("submit_actions ignored for {} (phase/seat)", self.match_id);
                    return Flow::Continue;
                }
                let committed: Vec<Action> = actions
                    .into_iter()
                    .map(|draft| {
                        let card_id = draft.card_instance_id.as_ref().and_then(|iid| {
                            state.seats[seat]
                                .hand
                                .iter()
                                .find(|c| &c.instance_id == iid)
                                .map(|c| c.card_id.clone())
                        });
                        let card = card_id.as_ref().and_then(|id| self.deps.catalog.lookup(id));
                        draft.into_action(seat, card)
                    })
                    .collect();
                log::debug!(
                    "seat {seat} submitted {} actions for {}",
                    committed.len(),
                    self.match_id
                );
                state.pending_actions[seat] = committed;
                self.persist(state);
                Flow::Continue
            }

            ClientMsg::PlanPlay {
                seat,
                card_instance_id,
                position,
            } => {
                if seat > 1 || !self.in_decision(state) {
                    return Flow::Continue;
                }
                self.plan_play(state, seat, card_instance_id, position);
                Flow::Continue
            }

            ClientMsg::RemovePlan {
                seat,
                card_instance_id,
            } => {
                if seat > 1 || !self.in_decision(state) {
                    return Flow::Continue;
                }
                self.remove_plan(state, seat, &card_instance_id);
                Flow::Continue
            }

            ClientMsg::MarkDiscard { seat, instance_ids } => {
                if seat > 1 || !self.in_decision(state) {
                    return Flow::Continue;
                }
                state.seats[seat].pending_discards.extend(instance_ids);
                self.persist(state);
                self.deps.hub.broadcast_state(&self.match_id, state);
                Flow::Continue
            }

            ClientMsg::LockChoice { seat } => {
                if seat > 1 || !self.in_decision(state) {
                    log::debug!("lock_choice ignored for {} (phase/seat)", self.match_id);
                    return Flow::Continue;
                }
                if !state.seats_locked[seat] {
                    state.lock_seat(seat);
                    self.persist(state);
                    self.deps
                        .hub
                        .broadcast(&self.match_id, crate::protocol::ServerMsg::PlayerLocked {
                            seat,
                        });
                }
                if state.all_seats_locked() {
                    return self.run_resolution(state, rngs, false);
                }
                Flow::Continue
            }

            // Answered at the connection layer; nothing to do here.
            ClientMsg::GetState {} => Flow::Continue,

            ClientMsg::DealDamage { seat, amount } => {
                if seat > 1 {
                    return Flow::Continue;
                }
                let destroyed = state.command_centers[seat].take_damage(amount);
                let mut log = EventLog::new(state.current_round, Utc::now());
                log.push(
                    EventType::Damage,
                    "debug",
                    serde_json::json!({
                        "targetSeat": seat,
                        "damage": amount,
                        "ccHealth": state.command_centers[seat].health,
                        "ccDestroyed": destroyed,
                    }),
                );
                self.deps
                    .hub
                    .broadcast(&self.match_id, crate::protocol::ServerMsg::EventLog { log });
                if destroyed {
                    state.status = MatchStatus::Finished;
                    self.persist(state);
                    self.deps.hub.broadcast(
                        &self.match_id,
                        crate::protocol::ServerMsg::GameOver {
                            winner: state.winner(),
                        },
                    );
                    return Flow::Halt;
                }
                self.persist(state);
                self.deps.hub.broadcast_state(&self.match_id, state);
                Flow::Continue
            }
        }
    }

    /// Stages a plan: the card stays in hand, its costs are escrowed, and
    /// the tile is reserved against this seat's later plans. Replaces an
    /// existing plan for the same instance.
    fn plan_play(
        &self,
        state: &mut MatchState,
        seat: Seat,
        instance_id: crate::game::types::CardInstanceId,
        position: crate::game::types::Point,
    ) {
        let Some(idx) = state.seats[seat].hand_position(&instance_id) else {
            log::debug!("plan_play: instance {instance_id} not in hand");
            return;
        };
        let card_id = state.seats[seat].hand[idx].card_id.clone();
        let Some(card) = self.deps.catalog.lookup(&card_id) else {
            log::debug!("plan_play: unknown card {card_id}");
            return;
        };
        if card.spawn_stats().is_none() {
            log::debug!("plan_play: {card_id} does not spawn a unit");
            return;
        }

        let existing = state.seats[seat]
            .planned_plays
            .iter()
            .position(|p| p.instance_id == instance_id);
        let tile_taken = state.tile_blocked(position)
            || state.seats[seat]
                .planned_plays
                .iter()
                .enumerate()
                .any(|(i, p)| Some(i) != existing && p.position == position);
        if tile_taken {
            log::debug!("plan_play rejected: tile {position:?} occupied");
            return;
        }

        match existing {
            Some(i) => state.seats[seat].planned_plays[i].position = position,
            None => {
                let cost = card.cost();
                if !state.seats[seat].resources.can_pay(cost) {
                    log::debug!("plan_play rejected: seat {seat} cannot pay for {card_id}");
                    return;
                }
                state.seats[seat].resources.pay(cost);
                state.seats[seat].planned_plays.push(PlannedPlay {
                    instance_id,
                    card_id,
                    position,
                });
            }
        }
        self.persist(state);
        self.deps.hub.broadcast_state(&self.match_id, state);
    }

    /// Withdraws a plan and returns its escrowed costs.
    fn remove_plan(
        &self,
        state: &mut MatchState,
        seat: Seat,
        instance_id: &crate::game::types::CardInstanceId,
    ) {
        let Some(idx) = state.seats[seat]
            .planned_plays
            .iter()
            .position(|p| &p.instance_id == instance_id)
        else {
            return;
        };
        let plan = state.seats[seat].planned_plays.remove(idx);
        if let Some(card) = self.deps.catalog.lookup(&plan.card_id) {
            let max_gold = state.seats[seat].max_gold;
            state.seats[seat].resources.refund(card.cost(), max_gold);
        }
        self.persist(state);
        self.deps.hub.broadcast_state(&self.match_id, state);
    }
}
