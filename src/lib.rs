//! iploc - In-memory IPv4 Location Database
//!
//! iploc answers "where is this IPv4 address?" from a compact binary
//! database of sorted address ranges, each pointing at a tab-separated
//! location record. Lookups are two-level: a 256-bucket prefix index on the
//! first octet, then a binary search inside the bucket.
//!
//! The database can be swapped at runtime. A [`LocatorRegistry`] publishes
//! each new generation atomically; readers never block and never observe a
//! half-built database.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use iploc::{Locator, LocatorRegistry};
//!
//! // One-off: open a database and query it
//! let locator = Locator::open("17monipdb.dat")?;
//! let record = locator.find("8.8.8.8")?;
//! println!("{} {} {} ({})", record.country, record.region, record.city, record.isp);
//!
//! // Long-running service: hold the database in a reloadable registry
//! let registry = LocatorRegistry::new();
//! registry.initialize("17monipdb.dat")?;
//! let record = registry.lookup("1.2.3.4")?;
//! registry.reload("17monipdb.dat")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │  Database File Format                │
//! ├──────────────────────────────────────┤
//! │  1. Text offset (u32 BE)             │
//! │  2. Prefix index (256 x u32 LE)      │
//! │  3. Range entries (8 bytes each)     │
//! │  4. Text blob (records, tab fields)  │
//! └──────────────────────────────────────┘
//!          ↓ decode (tables owned)
//! ┌──────────────────────────────────────┐
//! │  Locator (immutable generation)      │
//! └──────────────────────────────────────┘
//!          ↓ Arc swap on reload
//! ┌──────────────────────────────────────┐
//! │  LocatorRegistry (lock-free reads)   │
//! └──────────────────────────────────────┘
//! ```
//!
//! # Features
//!
//! - `watch` (default): [`ReloadWatcher`], which reloads a registry when its
//!   database file changes on disk.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Error types
pub mod error;
/// Binary layout and table decoding
pub mod format;
/// Process-wide default registry
pub mod global;
pub mod locator;
pub mod record;
pub mod registry;
mod search;
/// Loading database bytes from files and memory
pub mod source;
/// Database validation for untrusted files
pub mod validation;
#[cfg(feature = "watch")]
pub mod watch;

// Re-exports for Rust consumers

pub use crate::error::{
    DecodeError, InitError, InvalidAddressError, LookupError, ParseError, ReloadError,
};
pub use crate::locator::{Locator, LocatorOpener, LocatorOptions, LocatorStats, RangeInfo};
pub use crate::record::{LocationRecord, Schema, NOT_AVAILABLE};
pub use crate::registry::{LocatorRegistry, RegistryBuilder, ReloadCallback, ReloadEvent};
pub use crate::source::DatabaseSource;
pub use crate::validation::{ValidationLevel, ValidationReport};
#[cfg(feature = "watch")]
pub use crate::watch::{ReloadWatcher, WatchError};

// Version information
/// Library version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
