//! # Summary
//!
//! In-process transport. Handlers register under an address; a call runs the
//! handler directly on the calling thread, which is exactly what a blocking
//! RPC looks like from the caller's side. Addresses can be crashed to simulate
//! a dead peer, and ledger notices are recorded instead of delivered.

use std::sync::Arc;

use hashbrown::HashMap as Map;
use hashbrown::HashSet as Set;
use parking_lot::{Mutex, RwLock};

use crate::error::{Error, Result};
use crate::message::{Notice, Reply, Request};
use crate::transport::{Handler, Transport};

#[derive(Default)]
pub struct LocalNetwork {
    handlers: RwLock<Map<String, Arc<dyn Handler>>>,
    crashed: RwLock<Set<String>>,
    notices: Mutex<Vec<(String, Notice)>>,
}

impl LocalNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(LocalNetwork::default())
    }

    /// Makes `handler` reachable at `addr`.
    pub fn register<A: Into<String>>(&self, addr: A, handler: Arc<dyn Handler>) {
        let addr = addr.into();
        self.crashed.write().remove(&addr);
        self.handlers.write().insert(addr, handler);
    }

    /// Makes `addr` unreachable from now on.
    pub fn crash(&self, addr: &str) {
        info!("crashing {}", addr);
        self.crashed.write().insert(addr.to_string());
        self.handlers.write().remove(addr);
    }

    pub fn is_crashed(&self, addr: &str) -> bool {
        self.crashed.read().contains(addr)
    }

    /// Every notice sent to a ledger so far, with the ledger's address.
    pub fn notices(&self) -> Vec<(String, Notice)> {
        self.notices.lock().clone()
    }
}

impl Transport for LocalNetwork {
    fn call(&self, addr: &str, request: Request) -> Result<Reply> {
        let handler = self.handlers
            .read()
            .get(addr)
            .cloned()
            .ok_or_else(|| Error::Unknown(addr.to_string()))?;
        Ok(handler.handle(request))
    }

    fn notify(&self, addr: &str, notice: Notice) -> Result<()> {
        if self.is_crashed(addr) {
            return Err(Error::Unknown(addr.to_string()))
        }
        self.notices.lock().push((addr.to_string(), notice));
        Ok(())
    }
}
