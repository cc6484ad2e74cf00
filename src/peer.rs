//! # Summary
//!
//! A `Peer` owns every piece of per-node state, each behind its own lock, and
//! answers the RPC surface. The protocol itself lives next to the state it
//! drives: `election`, `heartbeat` and `workflow` each add an `impl Peer` block.
//!
//! Outbound fan-out never blocks the sender: every notification to a neighbor
//! is delivered from its own short-lived thread, and delivery failures are
//! dropped after being logged.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use hashbrown::HashMap as Map;
use parking_lot::{Mutex, RwLock};

use crate::clock::LamportClock;
use crate::config::Config;
use crate::directory::TradeDirectory;
use crate::election::Election;
use crate::message::{Identity, Notice, Reply, Request, Role};
use crate::transactions::TransactionLog;
use crate::transport::{Handler, Transport};

/// Thread-safe handle to a peer. All clones refer to the same node.
#[derive(Clone, Debug)]
pub struct Peer(Arc<Inner>);

#[derive(Derivative)]
#[derivative(Debug)]
pub struct Inner {
    pub(crate) config: Config,

    #[derivative(Debug = "ignore")]
    pub(crate) transport: Arc<dyn Transport>,

    /// Flips to `Trader` on winning an election
    pub(crate) role: RwLock<Role>,

    pub(crate) clock: Mutex<LamportClock>,

    /// Round flags and the elected traders
    pub(crate) election: Mutex<Election>,

    /// Liveness of each elected trader, by peer ID
    pub(crate) status: Mutex<Map<usize, bool>>,

    /// Set when the other trader answers a ping
    pub(crate) heartbeat: Mutex<bool>,

    pub(crate) directory: TradeDirectory,

    pub(crate) journal: TransactionLog,

    pub(crate) inventory: Mutex<BTreeMap<String, u32>>,

    pub(crate) shop: Mutex<VecDeque<String>>,

    pub(crate) shipments: AtomicUsize,

    pub(crate) started: Instant,
}

impl std::ops::Deref for Peer {
    type Target = Inner;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Peer {
    pub fn new(config: Config, transport: Arc<dyn Transport>) -> Self {
        let journal = TransactionLog::new(config.log_path(config.identity.peer_id));
        let profile = config.profile.clone();
        Peer(Arc::new(Inner {
            transport,
            role: RwLock::new(profile.role),
            clock: Mutex::new(LamportClock::default()),
            election: Mutex::new(Election::new()),
            status: Mutex::new(Map::default()),
            heartbeat: Mutex::new(false),
            directory: TradeDirectory::new(),
            journal,
            inventory: Mutex::new(profile.inventory),
            shop: Mutex::new(profile.shop.into_iter().collect()),
            shipments: AtomicUsize::new(0),
            started: Instant::now(),
            config,
        }))
    }

    /// Opens the first election if this peer is one of its initiators.
    pub fn start(&self) {
        info!("peer {} starting as {:?} with {} neighbors", self.id(), self.role(), self.config.neighbors.len());
        if self.config.initiates_election() {
            self.spawn("election", |peer| peer.start_election());
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.config.identity
    }

    pub fn id(&self) -> usize {
        self.config.identity.peer_id
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn role(&self) -> Role {
        *self.role.read()
    }

    pub fn clock(&self) -> u64 {
        self.clock.lock().value()
    }

    /// Elected traders, primary first.
    pub fn traders(&self) -> Vec<Identity> {
        self.election.lock().traders().to_vec()
    }

    pub fn trader_status(&self, peer_id: usize) -> Option<bool> {
        self.status.lock().get(&peer_id).cloned()
    }

    pub fn directory(&self) -> &TradeDirectory {
        &self.directory
    }

    pub fn journal(&self) -> &TransactionLog {
        &self.journal
    }

    pub fn inventory(&self) -> BTreeMap<String, u32> {
        self.inventory.lock().clone()
    }

    pub fn shopping_list(&self) -> Vec<String> {
        self.shop.lock().iter().cloned().collect()
    }

    pub fn shipments(&self) -> usize {
        self.shipments.load(Ordering::SeqCst)
    }

    /// Purchases completed per second since this peer started.
    pub fn average_shipments(&self) -> f64 {
        let elapsed = self.started.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.shipments() as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Runs `f` on a fresh thread with its own handle to this peer.
    pub(crate) fn spawn<F>(&self, name: &str, f: F)
        where F: FnOnce(Peer) + Send + 'static
    {
        let peer = self.clone();
        let spawned = thread::Builder::new()
            .name(format!("{}-{}", name, self.id()))
            .spawn(move || f(peer));
        if let Err(err) = spawned {
            error!("[Peer {}]: failed to spawn {}: {}", self.id(), name, err);
        }
    }

    /// Runs `f` on a fresh thread after `delay`.
    pub(crate) fn after<F>(&self, name: &str, delay: Duration, f: F)
        where F: FnOnce(Peer) + Send + 'static
    {
        self.spawn(name, move |peer| {
            thread::sleep(delay);
            f(peer)
        });
    }

    /// Invokes `request` on `to`, blocking. `None` if `to` is unreachable.
    pub(crate) fn call(&self, to: &Identity, request: Request) -> Option<Reply> {
        match self.transport.call(&to.host_addr, request) {
        | Ok(reply) => Some(reply),
        | Err(err) => {
            debug!("[Peer {}]: peer {} unreachable: {}", self.id(), to.peer_id, err);
            None
        }
        }
    }

    /// Delivers `request` to `to` from a separate thread.
    pub(crate) fn send(&self, to: Identity, request: Request) {
        self.spawn("send", move |peer| {
            peer.call(&to, request);
        });
    }

    /// Delivers `request` to every neighbor, each from its own thread.
    pub(crate) fn broadcast(&self, request: Request) {
        for neighbor in &self.config.neighbors {
            self.send(neighbor.identity.clone(), request.clone());
        }
    }

    pub(crate) fn notify_ledger(&self, notice: Notice) {
        if let Some(addr) = &self.config.ledger {
            if let Err(err) = self.transport.notify(addr, notice) {
                debug!("[Peer {}]: ledger unreachable: {}", self.id(), err);
            }
        }
    }
}

impl Handler for Peer {
    fn handle(&self, request: Request) -> Reply {
        trace!("[Peer {}]: received {:?}", self.id(), request);
        match request {
        | Request::Lookup { buyer, product, clock } => self.lookup(buyer, product, clock),
        | Request::Transaction { product, seller, buyer, trader } => {
            self.transaction(&product, &seller, &buyer, trader)
        }
        | Request::Election { kind, sender } => self.election_message(kind, sender),
        | Request::ElectionRestart => self.election_restart_message(),
        | Request::RegisterProducts(listing) => self.register_products(listing),
        | Request::SyncCache(listing) => self.sync_cache(listing),
        | Request::AdjustBuyerClock(clock) => self.adjust_buyer_clock(clock),
        | Request::PingMessage(sender) => self.periodic_ping_message(sender),
        | Request::PingReply(sender) => self.periodic_ping_reply(sender),
        | Request::TraderStatusUpdate { status, trader } => self.trader_status_update(status, &trader),
        | Request::AverageShipments => return Reply::Shipments(self.average_shipments()),
        }
        Reply::Ack
    }
}
