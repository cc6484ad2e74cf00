//! # Summary
//!
//! A peer-to-peer commodity bazaar. Every peer is a Buyer, a Seller, or a
//! trader candidate; the peers elect two traders with a bully election, and
//! the traders broker purchases between buyers and sellers. Buyer requests are
//! ordered with Lamport clocks, trades are journaled per trader, and the
//! backup trader takes over (replaying the last unserved request) when the
//! primary stops answering heartbeats.

#[macro_use] extern crate derivative;
#[macro_use] extern crate log;

mod clock;
mod config;
mod directory;
mod election;
mod error;
mod heartbeat;
mod local;
mod message;
mod peer;
mod transactions;
mod transport;
mod workflow;

pub use crate::clock::LamportClock;
pub use crate::config::{roster, Config, Neighbor, Profile, Timing};
pub use crate::directory::TradeDirectory;
pub use crate::election::{Election, Phase};
pub use crate::error::{Error, Result};
pub use crate::local::LocalNetwork;
pub use crate::message::{Identity, Kind, Listing, Notice, Reply, Request, Role};
pub use crate::peer::Peer;
pub use crate::transactions::{Entry, TransactionLog};
pub use crate::transport::{serve, Handler, TcpTransport, Transport};

#[cfg(test)]
pub(crate) mod testing;
