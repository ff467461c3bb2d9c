//! # jarscan
//!
//! Scan a JAR archive for compiled classes and persist class records to an
//! embedded database.
//!
//! ## Architecture
//!
//! - **record**: `ClassRecord` immutable value object
//! - **classfile**: static class-file metadata extraction (name, package, interface flag)
//! - **scan**: lazy, restartable scan of one jar archive
//! - **session**: ordered root collection, append-on-scan and remove-on-request
//! - **store**: persistent root collection using LMDB (via heed)
//! - **cli**: command-line interface
//! - **config**: database path resolution and cleanup

pub mod classfile;
pub mod cli;
pub mod config;
pub mod record;
pub mod scan;
pub mod session;
pub mod store;
