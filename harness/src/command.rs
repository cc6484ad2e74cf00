use serde_derive::{Serialize, Deserialize};

#[derive(Serialize, Deserialize)]
pub struct Execution(pub Vec<Command>);

#[derive(Serialize, Deserialize)]
#[serde(tag = "type")]
#[derive(Clone, Debug)]
pub enum Command {
    /// Start a peer with the given role document
    Start {
        id: usize,
        count: usize,
        db: serde_json::Value,
    },

    /// Kill the specified peer
    Crash {
        id: usize,
    },

    /// Sleep the test harness for `ms` milliseconds
    Sleep {
        ms: u64,
    },

    /// Ask the specified peer for its purchase rate
    Shipments {
        id: usize,
    },
}
