use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use bazaar::{Config, LocalNetwork, Notice, Peer, Profile, Reply, Request, Role, Timing, Transport};

const UNIT: Duration = Duration::from_millis(20);

struct Market {
    network: Arc<LocalNetwork>,
    peers: Vec<Peer>,
    _dir: tempfile::TempDir,
}

impl Market {
    /// Peer `i + 1` gets `profiles[i]`. Nothing runs until `start`.
    fn new(profiles: Vec<Profile>) -> Self {
        let network = LocalNetwork::new();
        let dir = tempfile::tempdir().unwrap();
        let roster: Vec<_> = bazaar::roster("market", 1, profiles.len())
            .into_iter()
            .zip(&profiles)
            .map(|(neighbor, profile)| neighbor.with_role(profile.role))
            .collect();

        let peers = roster.iter()
            .zip(profiles)
            .map(|(neighbor, profile)| {
                let config = Config::new(neighbor.id(), neighbor.identity.host_addr.clone(), profile)
                    .with_neighbors(roster.clone())
                    .with_timing(Timing::new(UNIT))
                    .with_ledger("ledger")
                    .with_log_dir(dir.path());
                let peer = Peer::new(config, network.clone());
                network.register(neighbor.identity.host_addr.clone(), Arc::new(peer.clone()));
                peer
            })
            .collect();

        Market { network, peers, _dir: dir }
    }

    fn start(&self) {
        for peer in &self.peers {
            peer.start();
        }
    }

    fn peer(&self, id: usize) -> &Peer {
        &self.peers[id - 1]
    }

    fn crash(&self, id: usize) {
        self.network.crash(&self.peer(id).identity().host_addr);
    }

    fn trader_ids(&self, id: usize) -> Vec<usize> {
        self.peer(id).traders().iter().map(|trader| trader.peer_id).collect()
    }

    fn elected(&self) -> bool {
        self.peers.iter().all(|peer| peer.traders().len() == 2)
    }
}

fn wait_until<F: FnMut() -> bool>(mut condition: F, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

fn bazaar() -> Vec<Profile> {
    vec![
        Profile::buyer(vec!["Fish", "Salt", "Fish"]),
        Profile::seller(vec![("Fish", 5)]),
        Profile::seller(vec![("Salt", 5)]),
        Profile::trader(),
        Profile::trader(),
    ]
}

#[test]
fn highest_peer_wins_first_round() {
    let market = Market::new(vec![
        Profile::buyer(vec!["Fish"]),
        Profile::seller(vec![("Fish", 3)]),
        Profile::trader(),
        Profile::trader(),
    ]);

    let highest = market.peer(4).clone();
    thread::spawn(move || highest.start_election());

    let bound = UNIT * (1 + 2 * 2) + Duration::from_millis(200);
    assert!(wait_until(|| (1..=4).all(|id| market.trader_ids(id).first() == Some(&4)), bound));
    assert_eq!(market.peer(4).role(), Role::Trader);
    assert!((1..=2).all(|id| market.peer(id).role() != Role::Trader));
    assert!((1..=3).all(|id| !market.trader_ids(id).contains(&id)));

    // The second round excludes peer 4 and elects the next highest.
    assert!(wait_until(|| market.elected(), Duration::from_secs(5)));
    for id in 1..=4 {
        assert_eq!(market.trader_ids(id), vec![4, 3]);
    }
}

#[test]
fn start_elects_two_distinct_traders() {
    let market = Market::new(bazaar());
    market.start();

    assert!(wait_until(|| market.elected(), Duration::from_secs(5)));
    for id in 1..=5 {
        assert_eq!(market.trader_ids(id), vec![5, 4]);
    }
    let traders = market.peers.iter().filter(|peer| peer.role() == Role::Trader).count();
    assert_eq!(traders, 2);
}

#[test]
fn buyers_purchase_through_traders() {
    let market = Market::new(bazaar());
    market.start();

    assert!(wait_until(|| market.peer(1).shipments() == 3, Duration::from_secs(10)));
    assert!(market.peer(1).shopping_list().is_empty());
    assert_eq!(market.peer(2).inventory().get("Fish"), Some(&3));
    assert_eq!(market.peer(3).inventory().get("Salt"), Some(&4));

    let mut entries = market.peer(4).journal().entries().unwrap();
    entries.extend(market.peer(5).journal().entries().unwrap());
    assert_eq!(entries.len(), 3);
    assert!(entries.iter().all(|(_, entry)| entry.completed));
    assert!(market.peer(1).clock() >= 3);

    let registered: Vec<usize> = market.network
        .notices()
        .into_iter()
        .filter_map(|(_, notice)| match notice {
            | Notice::RegisterTraders(trader) => Some(trader.peer_id),
            | _ => None,
        })
        .collect();
    assert_eq!(registered.len(), 2);
    assert!(registered.contains(&4) && registered.contains(&5));

    match market.network.call(&market.peer(1).identity().host_addr, Request::AverageShipments) {
    | Ok(Reply::Shipments(rate)) => assert!(rate > 0.0),
    | other => panic!("unexpected reply {:?}", other),
    };
}

#[test]
fn backup_takes_over_when_primary_dies() {
    let mut profiles = bazaar();
    profiles[0] = Profile::buyer(vec!["Fish"; 8]);
    profiles[1] = Profile::seller(vec![("Fish", 20)]);
    let market = Market::new(profiles);
    market.start();

    assert!(wait_until(|| market.peer(1).shipments() >= 1, Duration::from_secs(10)));
    market.crash(5);

    assert!(wait_until(
        || (1..=4).all(|id| market.peer(id).trader_status(5) == Some(false)),
        Duration::from_secs(5),
    ));
    for _ in 0..50 {
        assert_eq!(market.peer(1).active_trader().map(|trader| trader.peer_id), Some(4));
    }
}
