//! # Summary
//!
//! Append-only transaction journal kept by every trader. Each line holds one
//! JSON record `{"<clock>": {product_name, buyer_id, seller_id, completed}}`.
//!
//! Marking a record complete rewrites the whole file: every other line is
//! copied verbatim into a temporary file next to the log, which then replaces
//! the log atomically. A crash mid-rewrite leaves the old log in place.

use std::collections::BTreeMap;
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde_derive::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::message::Identity;

#[derive(Serialize, Deserialize)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    pub product_name: String,
    pub buyer_id: Identity,
    pub seller_id: Identity,
    pub completed: bool,
}

#[derive(Debug)]
pub struct TransactionLog {
    path: PathBuf,

    /// Serializes appends against rewrites
    lock: Mutex<()>,
}

impl TransactionLog {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        TransactionLog {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends a record. The caller guarantees `key` has not been used.
    pub fn append(&self, key: u64, entry: &Entry) -> Result<()> {
        let line = encode(key, entry)?;
        let _guard = self.lock.lock();
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)?;
        file.sync_data()?;
        Ok(())
    }

    /// Sets `completed` on the record stored under `key`.
    /// Returns whether such a record exists.
    pub fn mark_complete(&self, key: u64) -> Result<bool> {
        let key = key.to_string();
        let _guard = self.lock.lock();
        let lines = read_lines(&self.path)?;
        let dir = match self.path.parent() {
        | Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        | _ => PathBuf::from("."),
        };

        let mut found = false;
        let mut temp = tempfile::NamedTempFile::new_in(dir)?;
        for line in lines {
            let (k, mut entry) = decode(&line)?;
            if k == key {
                found = true;
                entry.completed = true;
                writeln!(temp, "{}", encode_raw(&k, &entry)?)?;
            } else {
                writeln!(temp, "{}", line)?;
            }
        }
        temp.as_file().sync_data()?;
        temp.persist(&self.path)?;
        Ok(found)
    }

    /// Returns the most recent record if it has not been completed.
    /// A missing or empty log has nothing unserved.
    pub fn get_unserved(&self) -> Result<Option<(u64, Entry)>> {
        let _guard = self.lock.lock();
        let last = match read_lines(&self.path)?.pop() {
        | Some(last) => last,
        | None => return Ok(None),
        };
        let (key, entry) = decode(&last)?;
        if entry.completed {
            return Ok(None)
        }
        let key = key.parse::<u64>()
            .map_err(|_| Error::CorruptLog(last.clone()))?;
        Ok(Some((key, entry)))
    }

    /// Every record in append order.
    pub fn entries(&self) -> Result<Vec<(String, Entry)>> {
        let _guard = self.lock.lock();
        read_lines(&self.path)?
            .iter()
            .map(|line| decode(line))
            .collect()
    }
}

fn read_lines(path: &Path) -> Result<Vec<String>> {
    let file = match fs::File::open(path) {
    | Ok(file) => file,
    | Err(ref err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
    | Err(err) => return Err(err.into()),
    };
    let mut lines = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        if !line.trim().is_empty() {
            lines.push(line);
        }
    }
    Ok(lines)
}

fn encode(key: u64, entry: &Entry) -> Result<String> {
    encode_raw(&key.to_string(), entry)
}

fn encode_raw(key: &str, entry: &Entry) -> Result<String> {
    let mut record = BTreeMap::new();
    record.insert(key, entry);
    Ok(serde_json::to_string(&record)?)
}

fn decode(line: &str) -> Result<(String, Entry)> {
    let record: BTreeMap<String, Entry> = serde_json::from_str(line)?;
    let mut record = record.into_iter();
    match (record.next(), record.next()) {
    | (Some(pair), None) => Ok(pair),
    | _ => Err(Error::CorruptLog(line.to_string())),
    }
}
