//! The shared meeting point of the worker and consumer threads
//!
//! One mutex guards the ring, the write queue, the modifier log and all four
//! control flags; one condition variable carries every wakeup. Notifies are
//! always broadcasts, so every blocking operation re-checks its own predicate
//! in a loop. No lock is ever held across a call that leaves this subsystem.
//!
//! The worker's terminal failure, if any, is recorded here; a consumer call
//! that would otherwise block forever returns it as an error instead.

use std::sync::{Condvar, Mutex};

use tracing::{debug, error, trace};

use crate::batch::RowBatch;
use crate::columns::ColumnId;
use crate::config::LookaheadConfig;
use crate::error::{OutriderError, Result};
use crate::modifier::{Modifier, ModifierLog};
use crate::position::SubchunkPosition;
use crate::ring::{RingCore, Slot};
use crate::selection::ChannelSelection;
use crate::stats::{SweepStats, ThreadTimes};
use crate::write::{WriteCommand, WriteQueue};

/// What the worker should do between sweeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepDirective {
    /// Writes are pending; drain them, then ask again
    DrainWrites,
    /// A rewind was requested; accept it and start a fresh sweep
    Reset,
    /// The session is shutting down; exit the sweep loop
    Terminate,
}

#[derive(Debug, Clone)]
struct WorkerFailure {
    column: Option<ColumnId>,
    message: String,
}

impl WorkerFailure {
    fn to_error(&self) -> OutriderError {
        OutriderError::worker_failed(self.column, self.message.clone())
    }
}

#[derive(Debug)]
struct Shared {
    ring: RingCore,
    writes: WriteQueue,
    modifiers: ModifierLog,
    stats: SweepStats,
    sweep_stop: bool,
    lookahead_stop: bool,
    reset_requested: bool,
    reset_complete: bool,
    failure: Option<WorkerFailure>,
}

/// Owner of the single mutex, the single condition variable and every piece
/// of state the two threads exchange.
#[derive(Debug)]
pub struct Interchange {
    shared: Mutex<Shared>,
    changed: Condvar,
}

impl Interchange {
    /// Create the interchange for one session
    pub fn new(config: &LookaheadConfig) -> Self {
        Self {
            shared: Mutex::new(Shared {
                ring: RingCore::new(config.ring_buffers),
                writes: WriteQueue::new(),
                modifiers: ModifierLog::new(),
                stats: SweepStats::new(config.collect_stats),
                sweep_stop: false,
                lookahead_stop: false,
                reset_requested: false,
                reset_complete: false,
                failure: None,
            }),
            changed: Condvar::new(),
        }
    }

    // Producer side.

    /// Whether a fill could begin right now without blocking
    pub fn fill_can_start(&self) -> bool {
        self.shared.lock().unwrap().ring.fill_can_start()
    }

    /// Wait for ring capacity, then open a fill at `position`.
    ///
    /// Returns `None` when sweep termination was requested, either instead of
    /// capacity or immediately after the coordinate was committed. In the
    /// latter case the horizon entries are kept: a consumer already waiting
    /// on this coordinate must still observe that it was attempted.
    ///
    /// `wait_begin` is the worker's timestamp from just before this call,
    /// used to attribute the capacity wait in the statistics.
    pub fn fill_start(&self, position: SubchunkPosition, wait_begin: &ThreadTimes) -> Option<Slot> {
        let mut shared = self.shared.lock().unwrap();
        loop {
            if shared.sweep_stop {
                trace!(%position, "fill abandoned before start");
                return None;
            }
            if shared.ring.fill_can_start() {
                break;
            }
            shared = self.changed.wait(shared).unwrap();
        }
        shared.stats.record_fill_wait(wait_begin);
        let slot = shared.ring.begin_fill(position);
        self.changed.notify_all();
        if shared.sweep_stop {
            trace!(%position, "fill abandoned after horizon commit");
            return None;
        }
        trace!(%position, occupancy = shared.ring.occupancy(), "fill started");
        Some(slot)
    }

    /// Queue a filled slot for the consumer
    pub fn fill_complete(&self, slot: Slot) {
        let mut shared = self.shared.lock().unwrap();
        let started = *slot.fill_started();
        trace!(position = %slot.position(), "fill complete");
        shared.ring.complete_fill(slot);
        shared.stats.record_fill_cycle(&started);
        self.changed.notify_all();
    }

    /// Commit the end-of-sweep sentinel to both horizons
    pub fn set_no_more_data(&self) {
        let mut shared = self.shared.lock().unwrap();
        debug!("sweep exhausted, sentinel committed");
        shared.ring.set_no_more_data();
        self.changed.notify_all();
    }

    /// Publish the effective channel selection for consumer queries
    pub fn store_channel_selection(&self, selection: ChannelSelection) {
        self.shared.lock().unwrap().ring.store_channel_selection(selection);
    }

    // Consumer side.

    /// Wait for the batch filled at exactly `position` and take ownership.
    ///
    /// The consumer must request coordinates in fill order; a mismatch with
    /// the ring front is fatal. If the worker has died and the batch will
    /// never arrive, the worker's failure is returned instead of hanging.
    pub fn read_start(&self, position: SubchunkPosition) -> Result<RowBatch> {
        let mut shared = self.shared.lock().unwrap();
        let wait_begin = ThreadTimes::now();
        loop {
            if shared.ring.read_can_start() {
                break;
            }
            if let Some(failure) = &shared.failure {
                return Err(failure.to_error());
            }
            if shared.lookahead_stop {
                return Err(OutriderError::Terminated);
            }
            shared = self.changed.wait(shared).unwrap();
        }
        shared.stats.record_read_wait(&wait_begin);
        let slot = shared.ring.take_front(position);
        self.changed.notify_all();
        trace!(%position, "read delivered");
        Ok(slot.release())
    }

    /// Close the consumer's use of the batch delivered for `position`;
    /// statistics only, never blocks
    pub fn read_complete(&self, position: SubchunkPosition) {
        let mut shared = self.shared.lock().unwrap();
        shared.stats.record_read_complete();
        trace!(%position, "read complete");
    }

    /// Block until the chunk horizon can say whether `chunk` will ever start
    pub fn is_valid_chunk(&self, chunk: u64) -> Result<bool> {
        let mut shared = self.shared.lock().unwrap();
        loop {
            if let Some(answer) = shared.ring.chunk_horizon_answer(chunk) {
                return Ok(answer);
            }
            if let Some(failure) = &shared.failure {
                return Err(failure.to_error());
            }
            if shared.lookahead_stop {
                return Err(OutriderError::Terminated);
            }
            shared = self.changed.wait(shared).unwrap();
        }
    }

    /// Block until the subchunk horizon can say whether `position` will ever
    /// appear
    pub fn is_valid_subchunk(&self, position: SubchunkPosition) -> Result<bool> {
        let mut shared = self.shared.lock().unwrap();
        loop {
            if let Some(answer) = shared.ring.subchunk_horizon_answer(position) {
                return Ok(answer);
            }
            if let Some(failure) = &shared.failure {
                return Err(failure.to_error());
            }
            if shared.lookahead_stop {
                return Err(OutriderError::Terminated);
            }
            shared = self.changed.wait(shared).unwrap();
        }
    }

    /// Copy out the last published channel selection
    pub fn channel_selection(&self) -> ChannelSelection {
        self.shared.lock().unwrap().ring.channel_selection()
    }

    /// Drop all queued slots and both horizons; idempotent
    pub fn reset_buffer_data(&self) {
        self.shared.lock().unwrap().ring.reset_data();
    }

    // Cross-thread requests.

    /// Ask the worker to abandon its sweep and rewind, and block until it
    /// has cleared the ring and is about to start fresh
    pub fn request_sweep_reset(&self) -> Result<()> {
        let mut shared = self.shared.lock().unwrap();
        debug!("sweep reset requested");
        shared.reset_requested = true;
        shared.reset_complete = false;
        shared.sweep_stop = true;
        self.changed.notify_all();
        loop {
            if shared.reset_complete {
                return Ok(());
            }
            if let Some(failure) = &shared.failure {
                return Err(failure.to_error());
            }
            if shared.lookahead_stop {
                return Err(OutriderError::Terminated);
            }
            shared = self.changed.wait(shared).unwrap();
        }
    }

    /// Request full shutdown; never blocks. The OS-level join happens in the
    /// worker handle, not here.
    pub fn terminate_lookahead(&self) {
        let mut shared = self.shared.lock().unwrap();
        debug!("lookahead termination requested");
        shared.lookahead_stop = true;
        shared.sweep_stop = true;
        self.changed.notify_all();
    }

    /// Append a configuration change for the worker's next sweep
    pub fn add_modifier(&self, modifier: Modifier) {
        let mut shared = self.shared.lock().unwrap();
        debug!(%modifier, "modifier queued");
        shared.modifiers.add(modifier);
    }

    /// Take every pending modifier, leaving the log empty
    pub fn take_modifiers(&self) -> Vec<Modifier> {
        self.shared.lock().unwrap().modifiers.take_all()
    }

    /// Queue one deferred write for the worker to apply
    pub fn enqueue_write(&self, command: WriteCommand) {
        let mut shared = self.shared.lock().unwrap();
        trace!(%command, "write queued");
        shared.writes.enqueue(command);
        self.changed.notify_all();
    }

    /// Pop the oldest deferred write, if any; never blocks
    pub fn dequeue_write(&self) -> Option<WriteCommand> {
        self.shared.lock().unwrap().writes.dequeue()
    }

    /// The worker's between-sweeps wait.
    ///
    /// Pending writes always win, so nothing is left stranded ahead of a
    /// rewind or a shutdown; termination wins over reset.
    pub fn sweep_directive(&self) -> SweepDirective {
        let mut shared = self.shared.lock().unwrap();
        loop {
            if !shared.writes.is_empty() {
                return SweepDirective::DrainWrites;
            }
            if shared.lookahead_stop {
                return SweepDirective::Terminate;
            }
            if shared.reset_requested {
                return SweepDirective::Reset;
            }
            shared = self.changed.wait(shared).unwrap();
        }
    }

    /// Complete a requested reset: clear the ring, re-arm the sweep flag and
    /// release the consumer blocked in [`request_sweep_reset`](Self::request_sweep_reset).
    ///
    /// The caller has drained the write queue and the consumer is still
    /// blocked, so the queue being non-empty here is a protocol violation.
    pub fn accept_reset(&self) {
        let mut shared = self.shared.lock().unwrap();
        assert!(
            shared.writes.is_empty(),
            "reset accepted with {} writes still queued",
            shared.writes.len()
        );
        shared.ring.reset_data();
        shared.reset_complete = true;
        shared.reset_requested = false;
        shared.sweep_stop = false;
        debug!("sweep reset complete");
        self.changed.notify_all();
    }

    /// Record the worker's terminal failure and wake every blocked consumer
    /// call so it can return the error
    pub fn record_worker_failure(&self, column: Option<ColumnId>, message: impl Into<String>) {
        let mut shared = self.shared.lock().unwrap();
        let failure = WorkerFailure {
            column,
            message: message.into(),
        };
        error!(
            column = failure.column.map(|c| c.name()),
            message = %failure.message,
            "lookahead worker failed"
        );
        shared.failure = Some(failure);
        self.changed.notify_all();
    }

    /// The recorded worker failure, if any
    pub fn worker_failure(&self) -> Option<OutriderError> {
        self.shared
            .lock()
            .unwrap()
            .failure
            .as_ref()
            .map(WorkerFailure::to_error)
    }

    // Flag observers used at the worker's checkpoints.

    /// Whether the current sweep should stop at the next checkpoint
    pub fn sweep_termination_requested(&self) -> bool {
        self.shared.lock().unwrap().sweep_stop
    }

    /// Whether the whole session is shutting down
    pub fn lookahead_termination_requested(&self) -> bool {
        self.shared.lock().unwrap().lookahead_stop
    }

    // Introspection.

    /// Slots currently queued in the ring
    pub fn occupancy(&self) -> usize {
        self.shared.lock().unwrap().ring.occupancy()
    }

    /// Deferred writes currently queued
    pub fn write_queue_len(&self) -> usize {
        self.shared.lock().unwrap().writes.len()
    }

    /// Whether statistics are being collected
    pub fn stats_enabled(&self) -> bool {
        self.shared.lock().unwrap().stats.is_enabled()
    }

    /// Snapshot of the accumulated statistics
    pub fn stats_snapshot(&self) -> SweepStats {
        self.shared.lock().unwrap().stats.clone()
    }

    /// Human-readable statistics summary
    pub fn stats_report(&self) -> String {
        self.shared.lock().unwrap().stats.report()
    }
}
