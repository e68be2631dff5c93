//! Data Snapshot Module
//!
//! Point-in-time fingerprints of every user table and the engine that
//! compares two of them:
//! - Table fingerprints and the snapshot map
//! - Order-independent content checksum
//! - Snapshot diff engine (before vs. after)
//! - JSON snapshot file store

pub mod checksum;
pub mod diff;
pub mod store;
pub mod types;

pub use checksum::ContentChecksum;
pub use diff::{DiffEngine, DiffRecord};
pub use store::SnapshotStore;
pub use types::{quote_ident, Snapshot, TableFingerprint, TableIdentity};
