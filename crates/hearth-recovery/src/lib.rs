//! # Hearth Recovery
//!
//! Crash recovery for open homes: periodic background snapshots and
//! adoption of snapshots abandoned by a crashed process.
//!
//! ## Overview
//!
//! Every open document may be shadowed by one recovery file in a dedicated
//! directory. A held advisory lock on that file means a running process
//! owns it. At startup, unlocked files left behind are read back and
//! offered to the user.
//!
//! ## Key Properties
//!
//! - **Off the interactive thread**: documents are cloned on the timer tick
//!   and written by a single background worker, one job at a time
//! - **Cooldown**: no snapshot round starts within 30 seconds of the last one
//! - **Incremental**: only temporary content is stored; content already
//!   persisted in user files is referenced
//! - **Quiet**: snapshot failures are logged, never surfaced
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Instant;
//! use hearth_core::ContentDigests;
//! use hearth_recovery::{AutoRecovery, DocumentKey, RecoveryConfig};
//! # use hearth_testkit::SampleHome;
//!
//! # fn example(handle: tokio::runtime::Handle, home: SampleHome) {
//! let recovery: AutoRecovery<SampleHome> =
//!     AutoRecovery::new(RecoveryConfig::new("/data/recovery"), Arc::new(ContentDigests::new()), handle);
//!
//! for recovered in recovery.recover().unwrap() {
//!     // Offer to the user, then adopt or discard.
//!     recovery.adopt(DocumentKey(1), &recovered);
//! }
//!
//! // On every timer tick:
//! recovery.on_timer(Instant::now(), &[(DocumentKey(1), &home)]);
//! # }
//! ```
//!
//! ## Snapshot Flow
//!
//! ```text
//! timer tick ──> cooldown gate ──> clone ──> queue ──> worker
//!                                                        │
//!        unmodified: delete file, forget record  <───────┤
//!        same revision: skip                     <───────┤
//!        otherwise: unlock, write, relock        <───────┘
//! ```

pub mod config;
pub mod error;
pub mod lock;
pub mod record;
pub mod scheduler;

pub use config::{RecoveryConfig, MIN_COOLDOWN};
pub use error::{RecoveryError, Result};
pub use lock::{is_locked_elsewhere, RecoveryLock};
pub use record::{DocumentKey, RecoveredDocument, RecoveryEvent, RECOVERED_SUFFIX, UNRECOVERABLE_SUFFIX};
pub use scheduler::AutoRecovery;
