//! Archive scanning: one jar in, a lazy sequence of class records out.

use anyhow::{Context, Result};
use log::warn;
use memmap2::Mmap;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use zip::ZipArchive;
use zip::read::ZipFile;

use crate::classfile::ClassMetadata;
use crate::record::ClassRecord;

const CLASS_SUFFIX: &str = ".class";

/// Scans one jar archive for compiled classes.
///
/// A `Scanner` only holds the archive path; every call to [`Scanner::scan`]
/// reopens the archive from the start, so scans are restartable and the
/// archive handle lives exactly as long as one pass.
#[derive(Debug, Clone)]
pub struct Scanner {
    archive_path: PathBuf,
}

impl Scanner {
    pub fn new(archive_path: impl Into<PathBuf>) -> Self {
        Self {
            archive_path: archive_path.into(),
        }
    }

    pub fn archive_path(&self) -> &Path {
        &self.archive_path
    }

    /// Opens the archive and returns a lazy iterator over its class records.
    ///
    /// Failing to open or parse the archive container is fatal and reported
    /// here. Per-entry failures (unreadable entry stream, malformed class
    /// file) are logged, counted and skipped by the iterator.
    pub fn scan(&self) -> Result<ScanIter> {
        let file = File::open(&self.archive_path)
            .with_context(|| format!("failed to open archive: {}", self.archive_path.display()))?;
        // SAFETY: the file is opened read-only and the mmap is owned by the
        // returned iterator, so it cannot outlive the mapping.
        let mmap = unsafe { Mmap::map(&file) }
            .with_context(|| format!("failed to mmap archive: {}", self.archive_path.display()))?;
        let archive = ZipArchive::new(Cursor::new(mmap)).with_context(|| {
            format!(
                "not a valid jar/zip archive: {}",
                self.archive_path.display()
            )
        })?;

        Ok(ScanIter {
            archive,
            next_index: 0,
            skipped: 0,
        })
    }
}

/// Lazy, finite iterator over the class records of one archive pass.
///
/// Entries that are not class files are silently skipped; class-file entries
/// that cannot be read or parsed are logged, added to [`ScanIter::skipped`]
/// and skipped. The archive handle is released when the iterator is dropped,
/// however the pass ends.
#[derive(Debug)]
pub struct ScanIter {
    archive: ZipArchive<Cursor<Mmap>>,
    next_index: usize,
    skipped: usize,
}

impl ScanIter {
    /// Class-file entries dropped so far because of a per-entry failure.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    fn read_record(entry: &mut ZipFile<'_>) -> Result<ClassRecord> {
        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut bytes)
            .context("failed to read entry stream")?;

        let meta = ClassMetadata::parse(&bytes)?;
        // The original tool counted "source lines" by reading the raw class
        // bytes as text; counting newline bytes reproduces that.
        let line_count = bytes.iter().filter(|&&b| b == b'\n').count() as u64;

        Ok(ClassRecord::from_metadata(meta, line_count))
    }
}

impl Iterator for ScanIter {
    type Item = ClassRecord;

    fn next(&mut self) -> Option<ClassRecord> {
        while self.next_index < self.archive.len() {
            let index = self.next_index;
            self.next_index += 1;

            let mut entry = match self.archive.by_index(index) {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("skipping unreadable archive entry #{index}: {err}");
                    self.skipped += 1;
                    continue;
                }
            };

            let entry_name = entry.name().to_string();
            if !entry_name.ends_with(CLASS_SUFFIX) {
                continue;
            }

            match Self::read_record(&mut entry) {
                Ok(record) => return Some(record),
                Err(err) => {
                    warn!("skipping entry {entry_name}: {err:#}");
                    self.skipped += 1;
                }
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::testdata::minimal_class;
    use std::io::Write;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_jar(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!(
            "jarscan_test_{}_{}_{}.jar",
            std::process::id(),
            nanos,
            name
        ))
    }

    fn write_jar(path: &Path, entries: &[(&str, &[u8])]) {
        use zip::write::FileOptions;

        let file = File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        for (name, content) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(content).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn scan_emits_records_in_archive_order() {
        let widget = minimal_class("com/acme/Widget", false, 50);
        let tool = minimal_class("com/acme/Tool", true, 12);
        let jar = temp_jar("ordered");
        write_jar(
            &jar,
            &[
                ("com/acme/Widget.class", &widget),
                ("com/acme/Tool.class", &tool),
                ("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\n"),
            ],
        );

        let scanner = Scanner::new(&jar);
        let records: Vec<ClassRecord> = scanner.scan().unwrap().collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "com.acme.Widget");
        assert_eq!(records[0].package, "com.acme");
        assert!(!records[0].is_interface);
        assert_eq!(records[0].line_count, 50);
        assert_eq!(records[1].name, "com.acme.Tool");
        assert!(records[1].is_interface);
        assert_eq!(records[1].line_count, 12);

        let _ = std::fs::remove_file(jar);
    }

    #[test]
    fn malformed_class_entry_is_skipped_not_fatal() {
        let good = minimal_class("org/example/Ok", false, 3);
        let jar = temp_jar("malformed");
        write_jar(
            &jar,
            &[
                ("org/example/Broken.class", b"not a class file"),
                ("org/example/Ok.class", &good),
            ],
        );

        let scanner = Scanner::new(&jar);
        let mut iter = scanner.scan().unwrap();
        let records: Vec<ClassRecord> = iter.by_ref().collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "org.example.Ok");
        assert_eq!(iter.skipped(), 1);

        let _ = std::fs::remove_file(jar);
    }

    #[test]
    fn archive_without_classes_yields_empty_sequence() {
        let jar = temp_jar("no_classes");
        write_jar(&jar, &[("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\n")]);

        let scanner = Scanner::new(&jar);
        let mut iter = scanner.scan().unwrap();
        assert!(iter.next().is_none());
        assert_eq!(iter.skipped(), 0);

        let _ = std::fs::remove_file(jar);
    }

    #[test]
    fn missing_archive_is_a_fatal_open_error() {
        let scanner = Scanner::new("/definitely/not/here.jar");
        let err = scanner.scan().unwrap_err();
        assert!(err.to_string().contains("failed to open archive"));
    }

    #[test]
    fn repeated_scans_are_deterministic() {
        let widget = minimal_class("com/acme/Widget", false, 7);
        let jar = temp_jar("repeat");
        write_jar(&jar, &[("com/acme/Widget.class", &widget)]);

        let scanner = Scanner::new(&jar);
        let first: Vec<ClassRecord> = scanner.scan().unwrap().collect();
        let second: Vec<ClassRecord> = scanner.scan().unwrap().collect();
        assert_eq!(first, second);
        assert_eq!(first[0].line_count, 7);

        let _ = std::fs::remove_file(jar);
    }
}
