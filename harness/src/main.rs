use std::collections::HashMap as Map;
use std::path::PathBuf;
use std::time::Duration;

use structopt::StructOpt;

use bazaar::{Reply, Request, TcpTransport, Transport};

mod command;
mod server;

use crate::command::{Command, Execution};
use crate::server::{Launch, Server};

#[derive(StructOpt)]
#[structopt(name = "harness")]
struct Opt {
    /// Path to the market-peer binary
    #[structopt(short = "s", long = "server", parse(from_os_str))]
    server: PathBuf,

    /// JSON execution to run
    #[structopt(short = "f", long = "file", parse(from_os_str))]
    file: PathBuf,

    #[structopt(long = "base-port", default_value = "20090")]
    base_port: u16,

    /// Protocol time unit handed to every peer (in milliseconds)
    #[structopt(short = "u", long = "unit", default_value = "1000")]
    unit: u64,

    #[structopt(long = "log-dir", default_value = ".", parse(from_os_str))]
    log_dir: PathBuf,

    #[structopt(short = "v", parse(from_occurrences))]
    verbose: u8,
}

fn main() {
    let opt = Opt::from_args();

    // Test execution
    let execution: Execution = std::fs::File::open(&opt.file)
        .map(serde_json::from_reader)
        .expect("[INTERNAL ERROR]: could not find file")
        .expect("[INTERNAL ERROR]: could not parse test");

    let launch = Launch {
        path: &opt.server,
        base_port: opt.base_port,
        unit: opt.unit,
        log_dir: &opt.log_dir,
        verbose: opt.verbose,
    };

    let transport = TcpTransport::new().with_timeout(Duration::from_secs(5));

    // Running peers and their addresses
    let mut servers: Map<usize, Server> = Map::default();
    let mut addrs: Map<usize, String> = Map::default();

    for command in execution.0 {
        println!("Executing command {:?}", command);
        match command {
        | Command::Start { id, count, db } => {
            let server = Server::new(&launch, id, count, &db.to_string())
                .expect("[INTERNAL ERROR]: could not spawn peer");
            let addr = bazaar::roster("127.0.0.1", opt.base_port, count)
                .into_iter()
                .find(|neighbor| neighbor.id() == id)
                .map(|neighbor| neighbor.identity.host_addr)
                .expect("[INTERNAL ERROR]: peer ID outside of roster");
            servers.insert(id, server);
            addrs.insert(id, addr);
        }
        | Command::Crash { id } => {
            servers.remove(&id);
        }
        | Command::Sleep { ms } => {
            std::thread::sleep(Duration::from_millis(ms))
        }
        | Command::Shipments { id } => {
            let addr = match addrs.get(&id) {
            | Some(addr) => addr,
            | None => {
                println!("[ERROR]: peer {} was never started", id);
                continue
            }
            };
            match transport.call(addr, Request::AverageShipments) {
            | Ok(Reply::Shipments(rate)) => println!("Peer {} averages {:.3} shipments per second", id, rate),
            | Ok(reply) => println!("[ERROR]: unexpected reply {:?}", reply),
            | Err(err) => println!("[ERROR]: {}", err),
            }
        }
        }
    }
}
