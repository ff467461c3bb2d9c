//! Persistence gateway over an embedded LMDB database (via heed).
//!
//! The store holds one named database containing the root collection of
//! class records. `flush` rewrites the whole root in a single write
//! transaction, so the persisted root always mirrors the in-memory
//! collection, including removals.

use anyhow::{Context, Result};
use heed::types::Str;
use heed::{Database, Env, EnvFlags, EnvOpenOptions, RoTxn};
use std::path::PathBuf;
use std::sync::Arc;

use crate::record::ClassRecord;

pub const RECORDS_DB: &str = "records";

const DEFAULT_MAP_SIZE: usize = 256 * 1024 * 1024;
const DEFAULT_MAX_DBS: u32 = 4;

type StrDb = Database<Str, Str>;

#[derive(Debug)]
pub struct RecordStore {
    env: Arc<Env>,
    db_path: PathBuf,
    records: StrDb,
}

impl RecordStore {
    pub fn open(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create store directory: {}", parent.display())
            })?;
        }

        let env = open_env(&db_path)?;
        let env = Arc::new(env);

        let mut wtxn = env.write_txn()?;
        let records = env.create_database::<Str, Str>(&mut wtxn, Some(RECORDS_DB))?;
        wtxn.commit()?;

        Ok(Self {
            env,
            db_path,
            records,
        })
    }

    /// Replaces the persisted root collection with `root`, preserving order.
    ///
    /// Records are keyed by a zero-padded sequence number so lexicographic
    /// iteration returns insertion order. Returns the number of records
    /// written. Failures surface to the caller; the store never logs and
    /// swallows them itself.
    pub fn flush(&self, root: &[ClassRecord]) -> Result<usize> {
        let mut wtxn = self.env.write_txn()?;
        self.records.clear(&mut wtxn)?;
        for (seq, record) in root.iter().enumerate() {
            let key = sequence_key(seq);
            let value = serde_json::to_string(record)
                .with_context(|| format!("failed to encode record: {}", record.name))?;
            self.records.put(&mut wtxn, key.as_str(), value.as_str())?;
        }
        wtxn.commit()?;
        Ok(root.len())
    }

    /// Reads the persisted root collection back in insertion order.
    pub fn records(&self) -> Result<Vec<ClassRecord>> {
        let rtxn = self.env.read_txn()?;
        let mut out = Vec::new();
        for item in self.records.iter(&rtxn)? {
            let (key, value) = item?;
            let record: ClassRecord = serde_json::from_str(value)
                .with_context(|| format!("corrupt record row at key {key}"))?;
            out.push(record);
        }
        Ok(out)
    }

    pub fn len(&self) -> Result<u64> {
        let rtxn = self.env.read_txn()?;
        table_len(&self.records, &rtxn)
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let records = self.records()?;
        let interfaces = records.iter().filter(|r| r.is_interface).count() as u64;
        let total_lines = records.iter().map(|r| r.line_count).sum();
        Ok(StoreStats {
            db_path: self.db_path.to_string_lossy().to_string(),
            record_count: records.len() as u64,
            interfaces,
            classes: records.len() as u64 - interfaces,
            total_lines,
        })
    }

    /// Syncs outstanding writes to disk and releases the environment.
    pub fn shutdown(self) -> Result<()> {
        self.env.force_sync()?;
        Ok(())
    }
}

fn sequence_key(seq: usize) -> String {
    format!("{seq:08}")
}

fn open_env(db_path: &PathBuf) -> Result<Env> {
    let mut options = EnvOpenOptions::new();
    options.map_size(DEFAULT_MAP_SIZE);
    options.max_dbs(DEFAULT_MAX_DBS);
    // SAFETY: default LMDB locking is kept; NO_SUB_DIR stores the database
    // at the exact --db path instead of a directory.
    unsafe {
        options.flags(EnvFlags::NO_SUB_DIR);
        options
            .open(db_path)
            .with_context(|| format!("failed to create/open db env: {}", db_path.display()))
    }
}

fn table_len(db: &StrDb, rtxn: &RoTxn<'_>) -> Result<u64> {
    let mut count = 0u64;
    for item in db.iter(rtxn)? {
        let _ = item?;
        count += 1;
    }
    Ok(count)
}

#[derive(Debug, serde::Serialize)]
pub struct StoreStats {
    pub db_path: String,
    pub record_count: u64,
    pub classes: u64,
    pub interfaces: u64,
    pub total_lines: u64,
}
