//! # Summary
//!
//! Bully election extended to pick two winners.
//!
//! A round starts with the initiator sending `election` to every higher peer.
//! Each recipient answers OK and forwards the message to its own higher peers,
//! so the wave fans out transitively. A peer that hears no OK within the
//! election timeout declares itself the winner and broadcasts `I won`.
//!
//! The first winner becomes the primary trader. After a settle delay it asks
//! everyone to reset their flags, and the lowest peer reopens a second round in
//! which the primary is excluded; that round's winner becomes the backup.
//! Trading starts once a peer knows both traders.
//!
//! Lost or late messages are tolerated only through timeouts, so a merely
//! delayed OK can produce a spurious winner. The trader list keeps the first
//! two distinct winners and ignores the rest.

use std::thread;

use crate::message::{Identity, Kind, Request, Role};
use crate::peer::Peer;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    /// No round in progress
    Idle,

    /// Sending `election` to higher peers
    Electing,

    /// Waiting out the election timeout
    AwaitingOk,

    /// Declared this peer the winner
    Winner,

    /// A higher peer answered; waiting for its `I won`
    Deferred,
}

/// Per-peer election state. Guarded by a single lock so the round flags are
/// always reset together.
#[derive(Clone, Debug)]
pub struct Election {
    phase: Phase,
    received_ok: bool,
    received_won: bool,
    sent_won: bool,

    /// Primary first, at most two entries
    traders: Vec<Identity>,

    /// Set once this peer has started trading
    trading: bool,
}

impl Default for Election {
    fn default() -> Self {
        Election {
            phase: Phase::Idle,
            received_ok: false,
            received_won: false,
            sent_won: false,
            traders: Vec::with_capacity(2),
            trading: false,
        }
    }
}

impl Election {
    pub fn new() -> Self {
        Election::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn received_ok(&self) -> bool {
        self.received_ok
    }

    pub fn received_won(&self) -> bool {
        self.received_won
    }

    pub fn sent_won(&self) -> bool {
        self.sent_won
    }

    pub fn traders(&self) -> &[Identity] {
        &self.traders
    }

    pub fn primary(&self) -> Option<&Identity> {
        self.traders.first()
    }

    /// The elected trader that is not `peer_id`.
    pub fn other(&self, peer_id: usize) -> Option<&Identity> {
        self.traders.iter().find(|trader| trader.peer_id != peer_id)
    }

    pub fn is_primary(&self, peer_id: usize) -> bool {
        self.primary().map_or(false, |trader| trader.peer_id == peer_id)
    }

    /// Whether this peer already knows of an OK or a winner this round.
    pub fn is_contested(&self) -> bool {
        self.received_ok || self.received_won
    }

    /// Clears every round flag for a fresh round. Known traders are kept.
    pub fn reset(&mut self) {
        self.received_ok = false;
        self.received_won = false;
        self.sent_won = false;
        self.phase = Phase::Idle;
    }

    /// Clears the received flags once trading starts.
    pub fn settle(&mut self) {
        self.received_ok = false;
        self.received_won = false;
        self.phase = Phase::Idle;
    }

    /// Starts a round initiated by this peer.
    pub fn begin(&mut self) {
        self.received_ok = false;
        self.received_won = false;
        self.phase = Phase::Electing;
    }

    /// Starts relaying a round opened by a lower peer. Received flags are
    /// left alone.
    pub fn relay(&mut self) {
        if self.phase == Phase::Idle {
            self.phase = Phase::Electing;
        }
    }

    /// Marks the election messages of this round as sent.
    pub fn awaiting(&mut self) {
        if self.phase == Phase::Electing {
            self.phase = Phase::AwaitingOk;
        }
    }

    pub fn receive_ok(&mut self) {
        self.received_ok = true;
        if self.phase != Phase::Winner {
            self.phase = Phase::Deferred;
        }
    }

    /// Reserves the right to announce a win this round.
    /// Fails if a win was already announced.
    pub fn claim(&mut self) -> bool {
        if self.sent_won {
            return false
        }
        self.sent_won = true;
        true
    }

    /// Records this peer as a winner. Returns the new number of traders, or
    /// `None` if this peer was already a trader or the list is full.
    pub fn declare(&mut self, me: Identity) -> Option<usize> {
        self.sent_won = true;
        self.received_won = true;
        let count = self.record(me)?;
        self.phase = Phase::Winner;
        Some(count)
    }

    /// Records an `I won` from another peer.
    pub fn receive_won(&mut self, sender: Identity) -> Option<usize> {
        self.received_won = true;
        self.record(sender)
    }

    fn record(&mut self, trader: Identity) -> Option<usize> {
        if self.traders.iter().any(|known| known.peer_id == trader.peer_id) {
            return None
        }
        if self.traders.len() >= 2 {
            warn!("ignoring extra winner {}", trader.peer_id);
            return None
        }
        self.traders.push(trader);
        Some(self.traders.len())
    }

    /// Returns true exactly once: when both traders are known.
    pub fn start_trading(&mut self) -> bool {
        if self.traders.len() == 2 && !self.trading {
            self.trading = true;
            return true
        }
        false
    }

    pub fn is_trading(&self) -> bool {
        self.trading
    }
}

impl Peer {
    /// Neighbors with a higher ID, minus the primary trader.
    fn higher_neighbors(&self) -> Vec<Identity> {
        let me = self.id();
        let election = self.election.lock();
        self.config.neighbors
            .iter()
            .map(|neighbor| &neighbor.identity)
            .filter(|neighbor| neighbor.peer_id > me)
            .filter(|neighbor| !election.is_primary(neighbor.peer_id))
            .cloned()
            .collect()
    }

    fn election_request(&self, kind: Kind) -> Request {
        Request::Election {
            kind,
            sender: self.identity().clone(),
        }
    }

    /// Opens an election round from this peer.
    pub fn start_election(&self) {
        info!("[Peer {}]: election proceedings have started", self.id());
        thread::sleep(self.config.timing.election_delay());

        let higher = self.higher_neighbors();
        if higher.is_empty() {
            if self.election.lock().claim() {
                self.declare_winner();
            }
            return
        }

        self.election.lock().begin();
        for neighbor in higher {
            self.send(neighbor, self.election_request(Kind::Election));
        }
        self.election.lock().awaiting();

        thread::sleep(self.config.timing.election_timeout());
        let won = {
            let mut election = self.election.lock();
            !election.is_contested() && election.claim()
        };
        if won {
            self.declare_winner();
        } else {
            debug!("[Peer {}]: deferring to a higher peer", self.id());
        }
    }

    /// Handles one election message from `sender`.
    pub fn election_message(&self, kind: Kind, sender: Identity) {
        debug!("[Peer {}]: received {} from {}", self.id(), kind, sender.peer_id);
        match kind {
        | Kind::Election => self.respond_election(sender),
        | Kind::Ok => self.election.lock().receive_ok(),
        | Kind::Won => self.respond_won(sender),
        }
    }

    fn respond_election(&self, sender: Identity) {
        self.send(sender, self.election_request(Kind::Ok));
        if self.election.lock().is_contested() {
            return
        }

        let higher = self.higher_neighbors();
        if higher.is_empty() {
            if self.election.lock().claim() {
                self.declare_winner();
            }
            return
        }

        self.election.lock().relay();
        for neighbor in higher {
            self.send(neighbor, self.election_request(Kind::Election));
        }
        self.election.lock().awaiting();

        thread::sleep(self.config.timing.election_timeout());
        let won = {
            let mut election = self.election.lock();
            !election.received_ok() && election.claim()
        };
        if won {
            self.declare_winner();
        }
    }

    fn respond_won(&self, sender: Identity) {
        info!("[Peer {}]: peer {} won the election", self.id(), sender.peer_id);
        self.status.lock().insert(sender.peer_id, true);
        let ready = {
            let mut election = self.election.lock();
            election.receive_won(sender);
            election.start_trading()
        };
        if ready {
            self.after("trading", self.config.timing.settle(), |peer| peer.begin_trading());
        }
    }

    /// Takes the trader role and announces it to every neighbor.
    pub fn declare_winner(&self) {
        let me = self.identity().clone();
        let count = match self.election.lock().declare(me.clone()) {
        | Some(count) => count,
        | None => return,
        };

        info!("[Peer {}]: election completed, I am the new coordinator", self.id());
        *self.role.write() = Role::Trader;
        self.status.lock().insert(me.peer_id, true);
        self.broadcast(self.election_request(Kind::Won));

        if count == 1 {
            thread::sleep(self.config.timing.settle());
            self.broadcast(Request::ElectionRestart);
        } else if self.election.lock().start_trading() {
            info!("[Peer {}]: trading begins now", self.id());
            self.spawn("trading", |peer| peer.begin_trading());
        }
    }

    /// Resets the round flags; the lowest peer then reopens the election.
    pub fn election_restart_message(&self) {
        self.election.lock().reset();
        if self.config.restarts_election() {
            debug!("[Peer {}]: restarting election", self.id());
            self.after("election", self.config.timing.settle(), |peer| peer.start_election());
        }
    }
}
