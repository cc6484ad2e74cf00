//! # Summary
//!
//! Failure detection between the two traders. The backup trader pings the
//! primary, waits out the heartbeat timeout, and either sleeps until the next
//! probe or, after too many unanswered pings, declares the primary dead.
//!
//! Failover tells every neighbor to stop routing through the dead trader and
//! replays the dead trader's most recent unserved request from its journal.
//! Older unserved requests are not recovered.

use std::thread;

use crate::message::{Identity, Request};
use crate::peer::Peer;
use crate::transactions::TransactionLog;

impl Peer {
    /// Probes `other` until it stops answering, then fails over.
    pub fn monitor(&self, other: Identity) {
        info!("[Peer {}]: monitoring trader {}", self.id(), other.peer_id);
        let timing = self.config.timing;
        let mut missed = 0;
        while missed < timing.misses {
            *self.heartbeat.lock() = false;
            self.call(&other, Request::PingMessage(self.identity().clone()));
            thread::sleep(timing.heartbeat_timeout());
            if *self.heartbeat.lock() {
                missed = 0;
                thread::sleep(timing.heartbeat_interval());
            } else {
                missed += 1;
                debug!("[Peer {}]: trader {} missed {} ping(s)", self.id(), other.peer_id, missed);
            }
        }
        self.fail_over(other);
    }

    fn fail_over(&self, dead: Identity) {
        warn!("[Peer {}]: trader {} is down", self.id(), dead.peer_id);
        self.trader_status_update(false, &dead);
        for neighbor in &self.config.neighbors {
            let update = Request::TraderStatusUpdate {
                status: false,
                trader: dead.clone(),
            };
            self.call(&neighbor.identity, update);
        }
        self.recover(&dead);
    }

    /// Replays the dead trader's last request if it never completed.
    fn recover(&self, dead: &Identity) {
        let journal = TransactionLog::new(self.config.log_path(dead.peer_id));
        match journal.get_unserved() {
        | Ok(Some((clock, entry))) => {
            info!(
                "[Peer {}]: replaying {} for peer {} at {} from trader {}",
                self.id(),
                entry.product_name,
                entry.buyer_id.peer_id,
                clock,
                dead.peer_id,
            );
            self.lookup(entry.buyer_id, entry.product_name, clock);
        }
        | Ok(None) => debug!("[Peer {}]: trader {} left nothing unserved", self.id(), dead.peer_id),
        | Err(err) => error!("[Peer {}]: failed to read journal of {}: {}", self.id(), dead.peer_id, err),
        }
    }

    /// Answers a ping from the other trader.
    pub fn periodic_ping_message(&self, sender: Identity) {
        self.call(&sender, Request::PingReply(self.identity().clone()));
    }

    pub fn periodic_ping_reply(&self, _sender: Identity) {
        *self.heartbeat.lock() = true;
    }

    pub fn trader_status_update(&self, status: bool, trader: &Identity) {
        self.status.lock().insert(trader.peer_id, status);
        info!("[Peer {}]: status of trader {} is {}", self.id(), trader.peer_id, status);
    }
}
