//! # Summary
//!
//! Wire types shared by every peer: identities, seller listings, the RPC
//! surface (`Request` / `Reply`) and the notices sent to the ledger service.

use serde_derive::{Deserialize, Serialize};

/// Network-visible identity of a peer.
#[derive(Serialize, Deserialize)]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Identity {
    pub peer_id: usize,
    pub host_addr: String,
}

impl Identity {
    pub fn new<A: Into<String>>(peer_id: usize, host_addr: A) -> Self {
        Identity { peer_id, host_addr: host_addr.into() }
    }
}

#[derive(Serialize, Deserialize)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    Buyer,
    Seller,
    Trader,
}

/// A seller's offer as kept in the trade directory.
#[derive(Serialize, Deserialize)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Listing {
    pub seller_id: Identity,
    pub product_name: String,
    pub product_count: u32,
}

/// Election message kinds.
#[derive(Serialize, Deserialize)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Kind {
    /// Sent to every higher peer to contest the round
    Election,

    /// Sent back by a higher peer: stop trying to win
    Ok,

    /// Announces the sender as a trader
    Won,
}

impl std::fmt::Display for Kind {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
        | Kind::Election => write!(fmt, "election"),
        | Kind::Ok => write!(fmt, "OK"),
        | Kind::Won => write!(fmt, "I won"),
        }
    }
}

/// Operations a peer exposes to its neighbors.
#[derive(Serialize, Deserialize)]
#[derive(Clone, Debug, PartialEq)]
pub enum Request {
    Lookup {
        buyer: Identity,
        product: String,
        clock: u64,
    },
    Transaction {
        product: String,
        seller: Identity,
        buyer: Identity,
        trader: usize,
    },
    Election {
        kind: Kind,
        sender: Identity,
    },
    ElectionRestart,
    RegisterProducts(Listing),
    SyncCache(Listing),
    AdjustBuyerClock(u64),
    PingMessage(Identity),
    PingReply(Identity),
    TraderStatusUpdate {
        status: bool,
        trader: Identity,
    },
    AverageShipments,
}

#[derive(Serialize, Deserialize)]
#[derive(Clone, Debug, PartialEq)]
pub enum Reply {
    Ack,
    Shipments(f64),
}

/// Best-effort notifications to the external ledger service.
#[derive(Serialize, Deserialize)]
#[derive(Clone, Debug, PartialEq)]
pub enum Notice {
    RegisterTraders(Identity),
    RegisterProducts {
        listing: Listing,
        requester: Identity,
    },
    Transaction {
        product: String,
        listing: Listing,
    },
}
