//! # Summary
//!
//! Startup configuration for a single peer: its identity, its role document,
//! the static neighbor roster, and the timing of every protocol wait.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde_derive::{Deserialize, Serialize};

use crate::error;
use crate::message::{Identity, Role};

/// Products a seller restocks from.
pub const CATALOG: [&str; 3] = ["Fish", "Salt", "Boar"];

/// Units of a product a seller restocks with.
pub const RESTOCK: u32 = 3;

/// Role document of a peer, in the format the launch scripts use:
/// `{"Role": "Seller", "Inv": {"Fish": 3}, "shop": []}`.
#[derive(Serialize, Deserialize)]
#[derive(Clone, Debug, PartialEq)]
pub struct Profile {
    #[serde(rename = "Role")]
    pub role: Role,

    /// Seller stock
    #[serde(rename = "Inv", default)]
    pub inventory: BTreeMap<String, u32>,

    /// Buyer shopping list, consumed from the front
    #[serde(default)]
    pub shop: Vec<String>,
}

impl Profile {
    pub fn buyer<I, S>(shop: I) -> Self
        where I: IntoIterator<Item = S>, S: Into<String>
    {
        Profile {
            role: Role::Buyer,
            inventory: BTreeMap::new(),
            shop: shop.into_iter().map(Into::into).collect(),
        }
    }

    pub fn seller<I, S>(inventory: I) -> Self
        where I: IntoIterator<Item = (S, u32)>, S: Into<String>
    {
        Profile {
            role: Role::Seller,
            inventory: inventory.into_iter().map(|(p, c)| (p.into(), c)).collect(),
            shop: Vec::new(),
        }
    }

    pub fn trader() -> Self {
        Profile {
            role: Role::Trader,
            inventory: BTreeMap::new(),
            shop: Vec::new(),
        }
    }

    pub fn from_json(json: &str) -> error::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Member of the static roster.
#[derive(Clone, Debug, PartialEq)]
pub struct Neighbor {
    pub identity: Identity,

    /// Configured role, if the launcher knows it
    pub role: Option<Role>,
}

impl Neighbor {
    pub fn new(identity: Identity) -> Self {
        Neighbor { identity, role: None }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    pub fn id(&self) -> usize {
        self.identity.peer_id
    }
}

/// Derives the static roster of `count` peers: peer `i` listens on
/// `host:(base_port + i - 1)`.
pub fn roster(host: &str, base_port: u16, count: usize) -> Vec<Neighbor> {
    (1..=count)
        .map(|id| Identity::new(id, format!("{}:{}", host, base_port as usize + id - 1)))
        .map(Neighbor::new)
        .collect()
}

/// Length of every protocol wait, as multiples of a single time unit.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Timing {
    pub unit: Duration,

    /// Consecutive unanswered pings before the other trader is declared dead
    pub misses: u32,
}

impl Default for Timing {
    fn default() -> Self {
        Timing {
            unit: Duration::from_secs(1),
            misses: 1,
        }
    }
}

impl Timing {
    pub fn new(unit: Duration) -> Self {
        Timing { unit, ..Timing::default() }
    }

    pub fn with_misses(mut self, misses: u32) -> Self {
        self.misses = std::cmp::max(misses, 1);
        self
    }

    /// Pause before an initiated election sends its first message.
    pub fn election_delay(&self) -> Duration {
        self.unit
    }

    /// Wait for an OK before assuming victory.
    pub fn election_timeout(&self) -> Duration {
        self.unit * 2
    }

    /// Pause after a win before the next phase begins.
    pub fn settle(&self) -> Duration {
        self.unit * 3
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        self.unit * 2
    }

    pub fn heartbeat_interval(&self) -> Duration {
        self.unit * 5
    }

    pub fn purchase_delay(&self) -> Duration {
        self.unit * 3
    }

    /// Settle delay plus a per-peer offset that desynchronizes buyers.
    pub fn buyer_start(&self, peer_id: usize) -> Duration {
        self.settle() + self.unit.mul_f64(peer_id as f64 / 10.0)
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    /// Identity of this peer
    pub(crate) identity: Identity,

    /// Initial role, inventory, and shopping list
    pub(crate) profile: Profile,

    /// Static roster minus this peer
    pub(crate) neighbors: Vec<Neighbor>,

    pub(crate) timing: Timing,

    /// Address of the external ledger service
    pub(crate) ledger: Option<String>,

    /// Directory holding every trader's transaction log
    pub(crate) log_dir: PathBuf,

    pub(crate) catalog: Vec<String>,

    pub(crate) restock: u32,
}

impl Config {
    pub fn new<A: Into<String>>(id: usize, host_addr: A, profile: Profile) -> Self {
        Config {
            identity: Identity::new(id, host_addr),
            profile,
            neighbors: Vec::new(),
            timing: Timing::default(),
            ledger: None,
            log_dir: PathBuf::from("."),
            catalog: CATALOG.iter().map(|product| product.to_string()).collect(),
            restock: RESTOCK,
        }
    }

    /// Sets the static roster. This peer's own entry is dropped if present.
    pub fn with_neighbors<I>(mut self, roster: I) -> Self
        where I: IntoIterator<Item = Neighbor>
    {
        let id = self.identity.peer_id;
        self.neighbors = roster.into_iter()
            .filter(|neighbor| neighbor.id() != id)
            .collect();
        self
    }

    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_ledger<A: Into<String>>(mut self, addr: A) -> Self {
        self.ledger = Some(addr.into());
        self
    }

    pub fn with_log_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.log_dir = dir.into();
        self
    }

    pub fn with_catalog<I, S>(mut self, catalog: I, restock: u32) -> Self
        where I: IntoIterator<Item = S>, S: Into<String>
    {
        self.catalog = catalog.into_iter().map(Into::into).collect();
        self.restock = restock;
        self
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn neighbors(&self) -> &[Neighbor] {
        &self.neighbors
    }

    /// The two lowest-numbered peers of the roster open the first election.
    pub fn initiates_election(&self) -> bool {
        let id = self.identity.peer_id;
        self.neighbors.iter().filter(|neighbor| neighbor.id() < id).count() < 2
    }

    /// The lowest-numbered peer of the roster reopens the backup election.
    pub fn restarts_election(&self) -> bool {
        let id = self.identity.peer_id;
        self.neighbors.iter().all(|neighbor| neighbor.id() > id)
    }

    /// Path of the transaction log owned by trader `peer_id`.
    pub fn log_path(&self, peer_id: usize) -> PathBuf {
        self.log_dir.join(format!("transactions_{}.log", peer_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roster_assigns_consecutive_ports() {
        let peers = roster("127.0.0.1", 20090, 3);
        assert_eq!(peers.len(), 3);
        assert_eq!(peers[0].identity, Identity::new(1, "127.0.0.1:20090"));
        assert_eq!(peers[2].identity, Identity::new(3, "127.0.0.1:20092"));
    }

    #[test]
    fn neighbors_exclude_self() {
        let config = Config::new(2, "127.0.0.1:20091", Profile::trader())
            .with_neighbors(roster("127.0.0.1", 20090, 4));
        let ids: Vec<usize> = config.neighbors().iter().map(Neighbor::id).collect();
        assert_eq!(ids, vec![1, 3, 4]);
    }

    #[test]
    fn two_lowest_peers_initiate() {
        let initiators: Vec<usize> = (1..=5)
            .map(|id| Config::new(id, "", Profile::trader())
                .with_neighbors(roster("127.0.0.1", 20090, 5)))
            .filter(Config::initiates_election)
            .map(|config| config.identity.peer_id)
            .collect();
        assert_eq!(initiators, vec![1, 2]);
    }

    #[test]
    fn only_lowest_peer_restarts() {
        let restarters: Vec<usize> = (1..=5)
            .map(|id| Config::new(id, "", Profile::trader())
                .with_neighbors(roster("127.0.0.1", 20090, 5)))
            .filter(Config::restarts_election)
            .map(|config| config.identity.peer_id)
            .collect();
        assert_eq!(restarters, vec![1]);
    }

    #[test]
    fn profile_parses_launch_document() {
        let profile = Profile::from_json(r#"{"Role": "Seller", "Inv": {"Fish": 3, "Salt": 0}}"#).unwrap();
        assert_eq!(profile.role, Role::Seller);
        assert_eq!(profile.inventory.get("Fish"), Some(&3));
        assert!(profile.shop.is_empty());

        let profile = Profile::from_json(r#"{"Role": "Buyer", "shop": ["Fish", "Boar"]}"#).unwrap();
        assert_eq!(profile, Profile::buyer(vec!["Fish", "Boar"]));
    }

    #[test]
    fn buyer_offset_grows_with_id() {
        let timing = Timing::new(Duration::from_millis(100));
        assert_eq!(timing.buyer_start(5), Duration::from_millis(350));
        assert!(timing.buyer_start(2) < timing.buyer_start(3));
    }
}
