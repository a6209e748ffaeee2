//! muster-store — Durable state for the attendance pipeline.
//!
//! Owns the on-disk face sample store (one directory of grayscale PNGs per
//! identity) and the append-only, per-day-deduplicated attendance ledger.

pub mod identity;
pub mod ledger;
pub mod samples;

pub use identity::Identity;
pub use ledger::{AttendanceLedger, AttendanceRecord, LedgerError, MarkOutcome};
pub use samples::{SampleIter, SampleStore, StoreError};
