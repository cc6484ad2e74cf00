//! Fixtures for unit tests: a small roster on a `LocalNetwork`, and a
//! recording handler standing in for peers whose behavior is not under test.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::config::{Config, Neighbor, Profile, Timing};
use crate::local::LocalNetwork;
use crate::message::{Identity, Listing, Notice, Reply, Request, Role};
use crate::peer::Peer;
use crate::transport::Handler;

pub const LEDGER: &str = "ledger";

pub fn identity(id: usize) -> Identity {
    Identity::new(id, format!("peer-{}", id))
}

/// Polls `condition` until it holds or `timeout` elapses.
pub fn wait_until<F: FnMut() -> bool>(mut condition: F, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

pub struct Cluster {
    network: Arc<LocalNetwork>,
    dir: tempfile::TempDir,
    roster: Vec<Neighbor>,
    timing: Timing,
}

impl Cluster {
    /// Four-peer roster with a 10ms time unit.
    pub fn new() -> Self {
        Cluster {
            network: LocalNetwork::new(),
            dir: tempfile::tempdir().expect("[TEST ERROR]: could not create scratch directory"),
            roster: (1..=4).map(identity).map(Neighbor::new).collect(),
            timing: Timing::new(Duration::from_millis(10)),
        }
    }

    /// Replaces the roster with one peer per role.
    pub fn with_roles(mut self, roles: Vec<Role>) -> Self {
        self.roster = roles.into_iter()
            .enumerate()
            .map(|(index, role)| Neighbor::new(identity(index + 1)).with_role(role))
            .collect();
        self
    }

    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    pub fn timing(&self) -> Timing {
        self.timing
    }

    pub fn config(&self, id: usize, profile: Profile) -> Config {
        Config::new(id, identity(id).host_addr, profile)
            .with_neighbors(self.roster.clone())
            .with_timing(self.timing)
            .with_ledger(LEDGER)
            .with_log_dir(self.dir.path())
    }

    /// Creates a peer and makes it reachable.
    pub fn peer(&self, id: usize, profile: Profile) -> Peer {
        let peer = Peer::new(self.config(id, profile), self.network.clone());
        self.network.register(identity(id).host_addr, Arc::new(peer.clone()));
        peer
    }

    /// Creates a recorder and makes it reachable in place of peer `id`.
    pub fn recorder(&self, id: usize) -> Arc<Recorder> {
        let recorder = Arc::new(Recorder::default());
        self.network.register(identity(id).host_addr, recorder.clone());
        recorder
    }

    /// Makes an arbitrary handler reachable in place of peer `id`.
    pub fn register(&self, id: usize, handler: Arc<dyn Handler>) {
        self.network.register(identity(id).host_addr, handler);
    }

    pub fn crash(&self, id: usize) {
        self.network.crash(&identity(id).host_addr);
    }

    /// Installs `traders` (primary first) as the outcome of an election.
    pub fn elect(&self, peer: &Peer, traders: &[usize]) {
        for &id in traders {
            peer.status.lock().insert(id, true);
            let mut election = peer.election.lock();
            if id == peer.id() {
                election.declare(identity(id));
                *peer.role.write() = Role::Trader;
            } else {
                election.receive_won(identity(id));
            }
        }
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.network
            .notices()
            .into_iter()
            .map(|(_, notice)| notice)
            .collect()
    }
}

/// Records every request and acknowledges it.
#[derive(Default)]
pub struct Recorder {
    requests: Mutex<Vec<Request>>,
}

impl Handler for Recorder {
    fn handle(&self, request: Request) -> Reply {
        self.requests.lock().push(request);
        Reply::Ack
    }
}

impl Recorder {
    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().clone()
    }

    pub fn transactions(&self) -> Vec<Request> {
        self.requests()
            .into_iter()
            .filter(|request| match request {
                | Request::Transaction { .. } => true,
                | _ => false,
            })
            .collect()
    }

    pub fn registrations(&self) -> Vec<Listing> {
        self.requests()
            .into_iter()
            .filter_map(|request| match request {
                | Request::RegisterProducts(listing) => Some(listing),
                | _ => None,
            })
            .collect()
    }

    pub fn synced(&self) -> Vec<Listing> {
        self.requests()
            .into_iter()
            .filter_map(|request| match request {
                | Request::SyncCache(listing) => Some(listing),
                | _ => None,
            })
            .collect()
    }

    pub fn lookups(&self) -> Vec<(Identity, String, u64)> {
        self.requests()
            .into_iter()
            .filter_map(|request| match request {
                | Request::Lookup { buyer, product, clock } => Some((buyer, product, clock)),
                | _ => None,
            })
            .collect()
    }

    pub fn status_updates(&self) -> Vec<(bool, Identity)> {
        self.requests()
            .into_iter()
            .filter_map(|request| match request {
                | Request::TraderStatusUpdate { status, trader } => Some((status, trader)),
                | _ => None,
            })
            .collect()
    }
}
