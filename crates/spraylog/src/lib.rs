//! `spraylog` - A small record-keeping service for crop spraying events
//!
//! This library provides payload validation, `SQLite` persistence and the
//! HTTP/JSON API for submitting, listing and deleting spraying log records.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod record;
pub mod storage;

pub use config::Config;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use record::{NewRecord, Record, ValidationError};
pub use storage::{Storage, StorageHandle};
