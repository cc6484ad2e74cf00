//! # Summary
//!
//! Seller registry kept by each trader. Listings are keyed by seller and
//! replaced wholesale on every registration (last write wins). The two traders
//! push listings to each other, so the directory is only eventually
//! consistent between them.

use std::collections::BTreeMap;

use parking_lot::Mutex;

use crate::message::Listing;

#[derive(Debug, Default)]
pub struct TradeDirectory {
    listings: Mutex<BTreeMap<usize, Listing>>,
}

impl TradeDirectory {
    pub fn new() -> Self {
        TradeDirectory::default()
    }

    /// Upserts a listing received from a seller.
    pub fn register(&self, listing: Listing) {
        debug!("registering {} x{} from {}", listing.product_name, listing.product_count, listing.seller_id.peer_id);
        self.listings
            .lock()
            .insert(listing.seller_id.peer_id, listing);
    }

    /// Upserts a listing pushed by the other trader.
    pub fn sync(&self, listing: Listing) {
        debug!("syncing {} x{} from {}", listing.product_name, listing.product_count, listing.seller_id.peer_id);
        self.listings
            .lock()
            .insert(listing.seller_id.peer_id, listing);
    }

    /// Every listing of `product` that still has stock, lowest seller first.
    pub fn lookup(&self, product: &str) -> Vec<Listing> {
        self.listings
            .lock()
            .values()
            .filter(|listing| listing.product_name == product && listing.product_count > 0)
            .cloned()
            .collect()
    }

    /// Takes one unit off a seller's listing and returns the updated listing.
    pub fn record_sale(&self, seller_id: usize) -> Option<Listing> {
        let mut listings = self.listings.lock();
        let listing = listings.get_mut(&seller_id)?;
        listing.product_count = listing.product_count.saturating_sub(1);
        Some(listing.clone())
    }

    pub fn get(&self, seller_id: usize) -> Option<Listing> {
        self.listings.lock().get(&seller_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.listings.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
