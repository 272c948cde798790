//! The lookahead sweep thread
//!
//! The worker owns a private read cursor (and, for writable sessions, a
//! private write cursor over the same dataset) and sweeps it from origin to
//! exhaustion, filling one batch per subchunk and draining deferred writes.
//! The consumer never touches these cursors; all communication goes through
//! the interchange.
//!
//! Cancellation is cooperative: termination and reset requests are observed
//! only at the checkpoints in the sweep loop and inside the blocking waits.
//! A worker blocked inside a slow cursor call cannot be preempted, so
//! termination latency is bounded by the collaborator's own latency. That is
//! a deliberate constraint of the design, not an oversight.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, error, warn};

use crate::columns::{ColumnId, ColumnSet};
use crate::cursor::{TableCursor, WritableCursor};
use crate::error::{OutriderError, Result};
use crate::interchange::{Interchange, SweepDirective};
use crate::position::SubchunkPosition;
use crate::stats::ThreadTimes;
use crate::write::WriteCommand;

/// How one sweep ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SweepOutcome {
    /// The cursor ran out of data; the sentinel was committed
    Exhausted,
    /// A termination or reset request stopped the sweep early; no sentinel
    Terminated,
}

/// A worker failure with the column being filled when it happened, if any.
struct WorkerError {
    column: Option<ColumnId>,
    error: OutriderError,
}

impl From<OutriderError> for WorkerError {
    fn from(error: OutriderError) -> Self {
        Self {
            column: None,
            error,
        }
    }
}

type WorkerResult<T> = std::result::Result<T, WorkerError>;

pub(crate) struct Worker {
    interchange: Arc<Interchange>,
    read: Box<dyn TableCursor>,
    write: Option<Box<dyn WritableCursor>>,
    columns: ColumnSet,
    /// Coordinate the write cursor currently sits at
    write_position: SubchunkPosition,
}

impl Worker {
    pub(crate) fn new(
        interchange: Arc<Interchange>,
        read: Box<dyn TableCursor>,
        write: Option<Box<dyn WritableCursor>>,
        columns: ColumnSet,
    ) -> Self {
        Self {
            interchange,
            read,
            write,
            columns,
            write_position: SubchunkPosition::ORIGIN,
        }
    }

    /// Thread body: sweep until told to stop, then drain and flush
    pub(crate) fn run(mut self) {
        debug!("lookahead worker started");
        match self.run_inner() {
            Ok(()) => debug!("lookahead worker exiting"),
            Err(failure) => {
                let pending = self.interchange.write_queue_len();
                if pending > 0 {
                    warn!(pending, "deferred writes abandoned by worker failure");
                }
                self.interchange
                    .record_worker_failure(failure.column, failure.error.to_string());
            }
        }
    }

    fn run_inner(&mut self) -> WorkerResult<()> {
        loop {
            self.sweep_once()?;
            if !self.wait_for_reset_or_termination()? {
                break;
            }
        }
        // Final drain so no write is stranded behind the shutdown
        self.drain_writes()?;
        if let Some(write) = self.write.as_mut() {
            write.flush()?;
        }
        Ok(())
    }

    /// One full sweep from origin to exhaustion, or until interrupted
    fn sweep_once(&mut self) -> WorkerResult<SweepOutcome> {
        let modifiers = self.interchange.take_modifiers();
        for modifier in &modifiers {
            debug!(%modifier, "applying modifier");
            modifier.apply(self.read.as_mut())?;
            if let Some(write) = self.write.as_mut() {
                modifier.apply(write.as_mut())?;
            }
        }
        self.interchange
            .store_channel_selection(self.read.channel_selection());

        for column in &self.columns {
            if !self.read.exists_column(column) {
                return Err(OutriderError::column_missing(column).into());
            }
        }

        if let Some(write) = self.write.as_mut() {
            write.origin_chunks(true)?;
            write.origin()?;
        }
        self.write_position = SubchunkPosition::ORIGIN;

        debug!("starting sweep");
        self.read.origin_chunks(true)?;
        let mut position = SubchunkPosition::ORIGIN;
        while self.read.has_more_chunks() {
            if self.interchange.sweep_termination_requested() {
                return Ok(SweepOutcome::Terminated);
            }
            self.read.origin()?;
            while self.read.has_more_in_chunk() {
                if self.interchange.sweep_termination_requested() {
                    return Ok(SweepOutcome::Terminated);
                }
                if !self.fill_one(position)? {
                    return Ok(SweepOutcome::Terminated);
                }
                self.drain_writes()?;
                self.read.advance()?;
                position = position.next_subchunk();
            }
            self.read.next_chunk()?;
            position = position.next_chunk();
        }
        self.interchange.set_no_more_data();
        debug!("sweep exhausted");
        Ok(SweepOutcome::Exhausted)
    }

    /// Fill and queue the batch for one subchunk; false means termination
    /// raced in during the capacity wait
    fn fill_one(&mut self, position: SubchunkPosition) -> WorkerResult<bool> {
        let wait_begin = ThreadTimes::now();
        let Some(mut slot) = self.interchange.fill_start(position, &wait_begin) else {
            return Ok(false);
        };

        let batch = slot.batch_mut();
        self.read.fill_shape(batch)?;
        for column in &self.columns {
            if let Err(error) = self.read.fill_column(column, batch) {
                error!(column = column.name(), %position, "filler failed");
                return Err(WorkerError {
                    column: Some(column),
                    error,
                });
            }
        }
        self.read.fill_extras(batch)?;

        self.interchange.fill_complete(slot);
        Ok(true)
    }

    /// Between-sweeps wait; true means a reset was accepted and a fresh sweep
    /// should start, false means the session is terminating
    fn wait_for_reset_or_termination(&mut self) -> WorkerResult<bool> {
        loop {
            match self.interchange.sweep_directive() {
                SweepDirective::DrainWrites => self.drain_writes()?,
                SweepDirective::Terminate => {
                    debug!("termination accepted");
                    return Ok(false);
                }
                SweepDirective::Reset => {
                    self.interchange.accept_reset();
                    debug!("reset accepted, rewinding");
                    return Ok(true);
                }
            }
        }
    }

    fn drain_writes(&mut self) -> WorkerResult<()> {
        while let Some(command) = self.interchange.dequeue_write() {
            self.handle_write(command)?;
        }
        Ok(())
    }

    /// Reposition the write cursor forward to the command's target and apply
    /// it. A target behind the cursor or not present in the dataset is a
    /// protocol violation.
    fn handle_write(&mut self, command: WriteCommand) -> WorkerResult<()> {
        let write = self
            .write
            .as_mut()
            .unwrap_or_else(|| panic!("deferred write {} on a read-only session", command));

        let target = command.position;
        assert!(
            self.write_position <= target,
            "backward write target: cursor at {}, command targets {}",
            self.write_position,
            target
        );
        while self.write_position < target {
            write.advance()?;
            self.write_position = self.write_position.next_subchunk();
            if !write.has_more_in_chunk() {
                write.next_chunk()?;
                assert!(
                    write.has_more_chunks(),
                    "unreachable write target {} beyond the dataset",
                    target
                );
                write.origin()?;
                self.write_position = self.write_position.next_chunk();
            }
        }
        assert!(
            self.write_position == target,
            "unreachable write target {}: repositioning landed at {}",
            target,
            self.write_position
        );

        command.op.apply(write.as_mut())?;
        debug!(%command, "applied deferred write");
        Ok(())
    }
}

/// Owner of the worker's OS thread.
///
/// `terminate` requests cooperative shutdown and joins; a worker panic (a
/// protocol violation) is re-raised on the joining thread. Dropping the
/// handle shuts down best-effort without re-raising, so an unwind in the
/// owner cannot turn into a double panic.
#[derive(Debug)]
pub struct WorkerHandle {
    interchange: Arc<Interchange>,
    handle: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    pub(crate) fn spawn(
        interchange: Arc<Interchange>,
        read: Box<dyn TableCursor>,
        write: Option<Box<dyn WritableCursor>>,
        columns: ColumnSet,
    ) -> Result<Self> {
        let worker = Worker::new(Arc::clone(&interchange), read, write, columns);
        let handle = thread::Builder::new()
            .name("outrider-sweep".to_string())
            .spawn(move || worker.run())
            .map_err(|e| OutriderError::from_io(e, "spawning lookahead worker"))?;
        Ok(Self {
            interchange,
            handle: Some(handle),
        })
    }

    /// Whether the worker thread has not been joined yet
    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Request termination and join the worker thread
    pub fn terminate(&mut self) {
        self.interchange.terminate_lookahead();
        if let Some(handle) = self.handle.take() {
            if let Err(panic) = handle.join() {
                std::panic::resume_unwind(panic);
            }
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.interchange.terminate_lookahead();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("lookahead worker panicked during shutdown");
            }
        }
    }
}
