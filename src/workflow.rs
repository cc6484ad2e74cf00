//! # Summary
//!
//! Role-specific behavior once both traders are known.
//!
//! - Sellers register their stock with a trader and restock from the catalog
//!   whenever a product sells out.
//! - Buyers work through their shopping list one request at a time, stamping
//!   each request with their Lamport clock.
//! - Traders match requests against their directory, journal the trade, and
//!   notify both parties.
//!
//! Every request goes to a randomly chosen trader, or to the other one if the
//! chosen trader is known to be dead.

use std::sync::atomic::Ordering;
use std::thread;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::Error;
use crate::message::{Identity, Listing, Notice, Request, Role};
use crate::peer::Peer;
use crate::transactions::Entry;

impl Peer {
    /// Picks the trader to route the next request through.
    pub fn active_trader(&self) -> Option<Identity> {
        let traders = self.traders();
        let choice = match traders.len() {
        | 0 => return None,
        | 1 => 0,
        | _ => rand::thread_rng().gen_range(0..2),
        };
        let status = self.status.lock();
        let alive = |trader: &Identity| status.get(&trader.peer_id).cloned().unwrap_or(true);
        if alive(&traders[choice]) || traders.len() == 1 {
            Some(traders[choice].clone())
        } else {
            Some(traders[1 - choice].clone())
        }
    }

    /// Entry point of the trading phase.
    pub fn begin_trading(&self) {
        self.election.lock().settle();
        let role = self.role();
        if let Err(err) = self.check_roster(role) {
            error!("[Peer {}]: {}", self.id(), err);
            return
        }
        match role {
        | Role::Seller => self.register_stock(),
        | Role::Trader => self.begin_brokering(),
        | Role::Buyer => self.begin_shopping(),
        }
    }

    /// A buyer or seller surrounded only by its own kind has no one to trade with.
    fn check_roster(&self, role: Role) -> Result<(), Error> {
        if role == Role::Trader {
            return Ok(())
        }
        let neighbors = &self.config.neighbors;
        let uniform = !neighbors.is_empty()
            && neighbors.iter().all(|neighbor| neighbor.role == Some(role));
        if uniform {
            Err(Error::UniformRoster(role))
        } else {
            Ok(())
        }
    }

    fn listing(&self, product: String, count: u32) -> Listing {
        Listing {
            seller_id: self.identity().clone(),
            product_name: product,
            product_count: count,
        }
    }

    fn register_stock(&self) {
        let stock = self.inventory
            .lock()
            .iter()
            .find(|(_, count)| **count > 0)
            .map(|(product, count)| (product.clone(), *count));
        match stock {
        | Some((product, count)) => self.register_with_trader(self.listing(product, count)),
        | None => warn!("[Peer {}]: nothing to sell", self.id()),
        }
    }

    fn register_with_trader(&self, listing: Listing) {
        match self.active_trader() {
        | Some(trader) => {
            info!("[Peer {}]: registering {} x{} with trader {}", self.id(), listing.product_name, listing.product_count, trader.peer_id);
            self.call(&trader, Request::RegisterProducts(listing));
        }
        | None => warn!("[Peer {}]: no trader to register {} with", self.id(), listing.product_name),
        }
    }

    fn begin_brokering(&self) {
        let (elected, other) = {
            let election = self.election.lock();
            let elected = election.traders().iter().any(|trader| trader.peer_id == self.id());
            let other = if election.is_primary(self.id()) {
                None
            } else {
                election.other(self.id()).cloned()
            };
            (elected, other)
        };
        if !elected {
            info!("[Peer {}]: not elected, sitting out", self.id());
            return
        }

        self.notify_ledger(Notice::RegisterTraders(self.identity().clone()));
        if let Some(other) = other {
            self.spawn("heartbeat", move |peer| peer.monitor(other));
        }
    }

    fn begin_shopping(&self) {
        thread::sleep(self.config.timing.buyer_start(self.id()));
        if self.shop.lock().is_empty() {
            error!("[Peer {}]: {}", self.id(), Error::EmptyShoppingList);
            return
        }

        loop {
            let item = match self.shop.lock().front().cloned() {
            | Some(item) => item,
            | None => break,
            };

            let stamp = self.clock.lock().forward();
            self.broadcast(Request::AdjustBuyerClock(stamp));

            match self.active_trader() {
            | Some(trader) => {
                info!("[Peer {}]: requesting {} through {} at {}", self.id(), item, trader.peer_id, stamp);
                let lookup = Request::Lookup {
                    buyer: self.identity().clone(),
                    product: item.clone(),
                    clock: stamp,
                };
                if self.call(&trader, lookup).is_none() {
                    warn!("[Peer {}]: request for {} through {} was lost", self.id(), item, trader.peer_id);
                }
            }
            | None => warn!("[Peer {}]: no trader to request {} from", self.id(), item),
            }

            self.shop.lock().pop_front();
            thread::sleep(self.config.timing.purchase_delay());
        }

        info!("[Peer {}]: average shipments per second: {}", self.id(), self.average_shipments());
    }

    /// Resolves a buyer's request against the trade directory.
    pub fn lookup(&self, buyer: Identity, product: String, buyer_clock: u64) {
        let key = self.clock.lock().stamp(buyer_clock);
        let seller = match self.directory.lookup(&product).into_iter().next() {
        | Some(seller) => seller,
        | None => {
            debug!("[Peer {}]: no seller for {} requested by {}", self.id(), product, buyer.peer_id);
            return
        }
        };

        let entry = Entry {
            product_name: product.clone(),
            buyer_id: buyer.clone(),
            seller_id: seller.seller_id.clone(),
            completed: false,
        };
        if let Err(err) = self.journal.append(key, &entry) {
            error!("[Peer {}]: failed to log transaction {}: {}", self.id(), key, err);
            return
        }

        if let Some(updated) = self.directory.record_sale(seller.seller_id.peer_id) {
            self.sync_other_trader(updated);
        }
        self.notify_ledger(Notice::Transaction {
            product: product.clone(),
            listing: seller.clone(),
        });

        let transaction = Request::Transaction {
            product,
            seller: seller.seller_id.clone(),
            buyer: buyer.clone(),
            trader: self.id(),
        };
        self.call(&buyer, transaction.clone());
        self.call(&seller.seller_id, transaction);

        match self.journal.mark_complete(key) {
        | Ok(true) => (),
        | Ok(false) => warn!("[Peer {}]: transaction {} vanished from the log", self.id(), key),
        | Err(err) => error!("[Peer {}]: failed to complete transaction {}: {}", self.id(), key, err),
        }
    }

    /// Notification that a trade this peer took part in went through.
    pub fn transaction(&self, product: &str, seller: &Identity, _buyer: &Identity, trader: usize) {
        match self.role() {
        | Role::Buyer => {
            info!("[Peer {}]: purchased {} from peer {} through {}", self.id(), product, seller.peer_id, trader);
            self.shipments.fetch_add(1, Ordering::SeqCst);
        }
        | Role::Seller => self.sell(product),
        | Role::Trader => (),
        }
    }

    fn sell(&self, product: &str) {
        let restocked = {
            let mut inventory = self.inventory.lock();
            let remaining = match inventory.get_mut(product) {
            | Some(count) if *count > 0 => {
                *count -= 1;
                *count
            }
            | _ => {
                warn!("[Peer {}]: sold {} without stock", self.id(), product);
                return
            }
            };
            if remaining > 0 {
                None
            } else {
                inventory.remove(product);
                let restock = self.config.restock;
                let choice = self.config.catalog.choose(&mut rand::thread_rng()).cloned();
                if let Some(choice) = &choice {
                    inventory.insert(choice.clone(), restock);
                }
                choice.map(|choice| self.listing(choice, restock))
            }
        };

        if let Some(listing) = restocked {
            info!("[Peer {}]: sold out of {}, restocked with {}", self.id(), product, listing.product_name);
            self.register_with_trader(listing);
        }
    }

    /// Adds a seller's listing to this trader's directory.
    pub fn register_products(&self, listing: Listing) {
        self.directory.register(listing.clone());
        self.notify_ledger(Notice::RegisterProducts {
            listing: listing.clone(),
            requester: self.identity().clone(),
        });
        self.sync_other_trader(listing);
    }

    /// Applies a listing pushed by the other trader.
    pub fn sync_cache(&self, listing: Listing) {
        self.directory.sync(listing);
    }

    /// Pushes `listing` to the other trader and waits for it to land, so a
    /// later registration by the same seller cannot be overtaken.
    fn sync_other_trader(&self, listing: Listing) {
        let other = self.election.lock().other(self.id()).cloned();
        if let Some(other) = other {
            if self.trader_status(other.peer_id) != Some(false) {
                self.call(&other, Request::SyncCache(listing));
            }
        }
    }

    /// Merges a buyer's broadcast clock. Traders only merge on lookup.
    pub fn adjust_buyer_clock(&self, clock: u64) {
        if self.role() != Role::Trader {
            self.clock.lock().adjust(clock);
        }
    }
}
