//! The session collection: the ordered set of records a user is looking at,
//! kept in lockstep with the persisted root.

use anyhow::Result;
use log::warn;
use serde::Serialize;

use crate::record::ClassRecord;
use crate::scan::Scanner;
use crate::store::RecordStore;

/// Outcome of one archive pass through [`Session::process`].
#[derive(Debug, Default, Serialize)]
pub struct ScanReport {
    pub records_added: usize,
    pub skipped_entries: usize,
    pub flush_failures: usize,
}

/// Ordered in-memory root collection backed by a [`RecordStore`].
///
/// Appends happen one record at a time during a scan, and every append is
/// followed by a synchronous flush of the whole root, so each record is
/// durable before the next archive entry is processed. Flush failures never
/// abort a scan; they are logged and surfaced in the [`ScanReport`] so the
/// caller can decide what to do.
pub struct Session {
    records: Vec<ClassRecord>,
    store: RecordStore,
}

impl Session {
    /// Starts an empty session.
    pub fn new(store: RecordStore) -> Self {
        Self {
            records: Vec::new(),
            store,
        }
    }

    /// Starts a session pre-populated with the persisted root, so records
    /// accumulate across program runs.
    pub fn resume(store: RecordStore) -> Result<Self> {
        let records = store.records()?;
        Ok(Self { records, store })
    }

    pub fn records(&self) -> &[ClassRecord] {
        &self.records
    }

    /// Runs one scan pass, appending and flushing record by record.
    ///
    /// A fatal archive-open error propagates and leaves the session
    /// unchanged; per-entry and per-flush failures are counted instead.
    pub fn process(&mut self, scanner: &Scanner) -> Result<ScanReport> {
        let mut iter = scanner.scan()?;
        let mut report = ScanReport::default();

        for record in iter.by_ref() {
            self.records.push(record);
            report.records_added += 1;
            if let Err(err) = self.store.flush(&self.records) {
                warn!("persistence flush failed, continuing scan: {err:#}");
                report.flush_failures += 1;
            }
        }

        report.skipped_entries = iter.skipped();
        Ok(report)
    }

    /// Removes the record at `index`, keeping the order of the rest, and
    /// flushes so the persisted root reflects the removal. Out-of-range
    /// indices return `None` and change nothing.
    pub fn remove(&mut self, index: usize) -> Option<ClassRecord> {
        if index >= self.records.len() {
            return None;
        }
        let removed = self.records.remove(index);
        if let Err(err) = self.store.flush(&self.records) {
            warn!("persistence flush after removal failed: {err:#}");
        }
        Some(removed)
    }

    pub fn shutdown(self) -> Result<()> {
        self.store.shutdown()
    }
}
