//! Per-match subscriber registry and push fan-out.
//!
//! Delivery is best-effort per subscriber: a failed send drops that
//! subscriber and never blocks the rest. Messages for a match go out in the
//! order the scheduler emits them.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;

use crate::game::snapshot::MatchSnapshot;
use crate::game::types::{MatchId, MatchState, Seat};
use crate::protocol::ServerMsg;

struct Subscriber {
    id: u64,
    seat: Option<Seat>,
    tx: mpsc::UnboundedSender<ServerMsg>,
}

/// Returned from `subscribe`; identifies the registration for removal.
#[derive(Clone, Debug)]
pub struct SubscriberHandle {
    match_id: MatchId,
    id: u64,
}

#[derive(Default)]
pub struct SessionHub {
    subscribers: DashMap<MatchId, Vec<Subscriber>>,
    next_id: AtomicU64,
}

impl SessionHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a push channel for a match. `seat` controls hand redaction
    /// in state broadcasts; `None` subscribes as a spectator.
    pub fn subscribe(
        &self,
        match_id: &MatchId,
        seat: Option<Seat>,
    ) -> (SubscriberHandle, mpsc::UnboundedReceiver<ServerMsg>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers
            .entry(match_id.clone())
            .or_default()
            .push(Subscriber {
                id,
                seat,
                tx,
            });
        (
            SubscriberHandle {
                match_id: match_id.clone(),
                id,
            },
            rx,
        )
    }

    pub fn unsubscribe(&self, handle: &SubscriberHandle) {
        if let Some(mut subs) = self.subscribers.get_mut(&handle.match_id) {
            subs.retain(|s| s.id != handle.id);
        }
    }

    /// Sends one message to every subscriber of a match, dropping the ones
    /// whose channel has gone away.
    pub fn broadcast(&self, match_id: &MatchId, msg: ServerMsg) {
        if let Some(mut subs) = self.subscribers.get_mut(match_id) {
            subs.retain(|s| {
                if s.tx.send(msg.clone()).is_err() {
                    log::debug!("dropping dead subscriber {} for match {match_id}", s.id);
                    return false;
                }
                true
            });
        }
    }

    /// Broadcasts a state snapshot, redacted per subscriber seat.
    pub fn broadcast_state(&self, match_id: &MatchId, state: &MatchState) {
        if let Some(mut subs) = self.subscribers.get_mut(match_id) {
            subs.retain(|s| {
                let snapshot = MatchSnapshot::of(state, s.seat);
                if s.tx.send(ServerMsg::State { state: snapshot }).is_err() {
                    log::debug!("dropping dead subscriber {} for match {match_id}", s.id);
                    return false;
                }
                true
            });
        }
    }

    /// Drops every subscriber for a match; their receivers close.
    pub fn close_match(&self, match_id: &MatchId) {
        self.subscribers.remove(match_id);
    }

    pub fn subscriber_count(&self, match_id: &MatchId) -> usize {
        self.subscribers.get(match_id).map_or(0, |s| s.len())
    }
}
