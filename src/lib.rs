//! # Outrider - Asynchronous Table Lookahead
//!
//! Outrider reads chunked tabular datasets one or more steps ahead of the
//! code consuming them. A dedicated worker thread sweeps the dataset with
//! its own cursor, packs each subchunk's prefetched columns into an owned
//! batch, and hands the batches through a small bounded ring to the
//! foreground, which iterates them with the ordinary chunk/subchunk
//! protocol and never touches the dataset itself.
//!
//! ## Features
//!
//! - **Bounded lookahead ring**: Filled batches queue FIFO in a fixed number
//!   of slots; the worker throttles when the consumer falls behind
//! - **Ownership hand-off**: Batches move out of the ring, so the consumer
//!   reads column data without locks or copies
//! - **Deferred writes**: Mutations queue as commands and are replayed by
//!   the worker on a second cursor, in order, before any rewind or shutdown
//! - **Sweep modifiers**: Channel and velocity selections queue without
//!   blocking and take effect at the start of the next sweep
//! - **Reset protocol**: Rewinding abandons the sweep in flight, drains the
//!   ring and restarts from the first subchunk
//! - **Failure propagation**: A dataset error on the worker surfaces as an
//!   ordinary error on the foreground call that would otherwise block
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────┐        ┌──────────────────────┐
//! │  Foreground consumer │        │  Sweep worker thread │
//! │  LookaheadCursor     │        │  read + write cursor │
//! └──────────┬───────────┘        └──────────┬───────────┘
//!            │  read / complete              │  fill / drain
//!            ▼                               ▼
//! ┌─────────────────────────────────────────────────────┐
//! │                    Interchange                      │
//! │  batch ring │ horizons │ write queue │ modifier log │
//! │          (one mutex, one condition variable)        │
//! └─────────────────────────────────────────────────────┘
//! ```

// Core modules
pub mod batch;
pub mod columns;
pub mod config;
pub mod cursor;
pub mod error;
pub mod interchange;
pub mod lookahead;
pub mod modifier;
pub mod position;
pub mod ring;
pub mod selection;
pub mod stats;
pub mod write;

// Worker-side sweep loop
pub mod worker;

// Main API re-exports
pub use batch::{BatchShape, Complex, RowBatch};
pub use columns::{ColumnId, ColumnSet, DataKind};
pub use config::{LookaheadConfig, LookaheadConfigBuilder};
pub use cursor::{SyntheticCursor, SyntheticTable, TableCursor, WritableCursor};
pub use error::{OutriderError, Result};
pub use lookahead::{LookaheadBuilder, LookaheadCursor, WritableLookaheadCursor};
pub use modifier::Modifier;
pub use position::SubchunkPosition;
pub use selection::{ChannelSelection, DopplerKind, VelocityFrame, VelocitySelection};
pub use stats::SweepStats;
pub use worker::WorkerHandle;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const VERSION_MAJOR: u32 = 0;
pub const VERSION_MINOR: u32 = 1;
pub const VERSION_PATCH: u32 = 0;
