#[macro_use]
extern crate log;

use std::error::Error;
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use structopt::StructOpt;

use bazaar::{Config, Peer, Profile, TcpTransport, Timing};

#[derive(StructOpt)]
#[structopt(name = "market-peer")]
struct Opt {
    /// Unique peer ID, starting from 1
    #[structopt(short = "i", long = "id")]
    id: usize,

    /// Total number of peers
    #[structopt(short = "c", long = "count")]
    count: usize,

    /// Role document, e.g. {"Role": "Buyer", "shop": ["Fish"]}
    #[structopt(short = "d", long = "db")]
    db: String,

    #[structopt(long = "host", default_value = "127.0.0.1")]
    host: String,

    /// Port of peer 1; peer i listens on base-port + i - 1
    #[structopt(long = "base-port", default_value = "20090")]
    base_port: u16,

    /// Address of the ledger service
    #[structopt(long = "ledger")]
    ledger: Option<String>,

    /// Directory holding every trader's transaction log
    #[structopt(long = "log-dir", default_value = ".", parse(from_os_str))]
    log_dir: PathBuf,

    /// Protocol time unit (in milliseconds)
    #[structopt(short = "u", long = "unit", default_value = "1000")]
    unit: u64,

    /// Unanswered pings before the other trader is declared dead
    #[structopt(long = "misses", default_value = "1")]
    misses: u32,

    /// Log verbosity: -v for debug, -vv for trace
    #[structopt(short = "v", parse(from_occurrences))]
    verbose: u8,
}

fn logging(id: usize, verbose: u8, dir: &Path) -> Result<(), Box<dyn Error>> {
    let level = match verbose {
    | 0 => log::LevelFilter::Info,
    | 1 => log::LevelFilter::Debug,
    | _ => log::LevelFilter::Trace,
    };
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}][{}][{}] {}",
                chrono::Local::now().format("%H:%M:%S%.3f"),
                record.level(),
                record.target(),
                message,
            ))
        })
        .level(level)
        .chain(std::io::stderr())
        .chain(fern::log_file(dir.join(format!("peer_{}.log", id)))?)
        .apply()?;
    Ok(())
}

fn run(opt: Opt) -> Result<(), Box<dyn Error>> {
    logging(opt.id, opt.verbose, &opt.log_dir)?;

    let profile = Profile::from_json(&opt.db)?;
    let roster = bazaar::roster(&opt.host, opt.base_port, opt.count);
    let addr = roster.iter()
        .find(|neighbor| neighbor.id() == opt.id)
        .map(|neighbor| neighbor.identity.host_addr.clone())
        .ok_or_else(|| format!("peer {} is outside a roster of {}", opt.id, opt.count))?;

    let unit = Duration::from_millis(opt.unit);
    let mut config = Config::new(opt.id, addr.clone(), profile)
        .with_neighbors(roster)
        .with_timing(Timing::new(unit).with_misses(opt.misses))
        .with_log_dir(opt.log_dir);
    if let Some(ledger) = opt.ledger {
        config = config.with_ledger(ledger);
    }

    // Calls can block for a whole election wave on the far side.
    let transport = TcpTransport::new().with_timeout(unit * 20);
    let peer = Peer::new(config, Arc::new(transport));

    let listener = TcpListener::bind(&addr)?;
    let server = bazaar::serve(listener, Arc::new(peer.clone()))?;
    peer.start();

    server.join().map_err(|_| "server thread panicked")?;
    warn!("peer {} stopped serving", opt.id);
    Ok(())
}

fn main() {
    let opt = Opt::from_args();
    if let Err(err) = run(opt) {
        eprintln!("[ERROR]: {}", err);
        std::process::exit(1);
    }
}
