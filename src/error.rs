//! # Summary
//!
//! Error taxonomy for the bazaar. Transport failures are normally swallowed at
//! the call site; everything else is surfaced to the caller of the operation
//! that failed.

use crate::message::Role;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("peer at {addr} is unreachable")]
    Unreachable {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no peer is listening at {0}")]
    Unknown(String),

    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode or decode message: {0}")]
    Codec(#[from] bincode::Error),

    #[error("failed to encode or decode JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to replace transaction log: {0}")]
    Persist(#[from] tempfile::PersistError),

    #[error("corrupt transaction log record: {0}")]
    CorruptLog(String),

    #[error("shopping list is empty")]
    EmptyShoppingList,

    #[error("every neighbor is a {0:?}")]
    UniformRoster(Role),
}
