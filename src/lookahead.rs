//! The consumer-facing cursor over a lookahead session
//!
//! `LookaheadCursor` presents the ordinary sequential-iterator protocol
//! (`origin_chunks` / `more_chunks` / `origin` / `more` / `advance` /
//! `next_chunk`) while the actual dataset access happens one or more
//! subchunks ahead on the worker thread. `WritableLookaheadCursor` adds the
//! mutators, each of which becomes one deferred write command.
//!
//! The facade tracks the consumer's coordinate and always confirms it
//! against the subchunk horizon before asking the ring for a batch, so a
//! position the sweep will never produce (an exhausted chunk, the end of the
//! dataset) leaves the cursor detached instead of blocking forever.
//!
//! Within one sweep each coordinate can be fetched once: delivery moves the
//! batch out of the ring. Re-fetching an already-delivered coordinate is a
//! protocol violation, exactly as reading ahead of the sweep would be.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use tracing::debug;

use crate::batch::{Complex, RowBatch};
use crate::columns::{ColumnId, ColumnSet, DataKind};
use crate::config::LookaheadConfig;
use crate::cursor::{TableCursor, WritableCursor};
use crate::error::{OutriderError, Result};
use crate::interchange::Interchange;
use crate::modifier::Modifier;
use crate::position::SubchunkPosition;
use crate::selection::{ChannelSelection, VelocitySelection};
use crate::stats::SweepStats;
use crate::worker::WorkerHandle;
use crate::write::{WriteCommand, WriteOp};

/// Values copied out of the first batch of each sweep.
#[derive(Debug, Clone, Copy, Default)]
struct DerivedValues {
    antenna_count: Option<usize>,
    phase_center: Option<(f64, f64)>,
}

/// Builder for a lookahead session.
///
/// The prefetch columns must be declared here, before the worker starts;
/// they cannot be augmented later.
#[derive(Debug)]
pub struct LookaheadBuilder {
    config: LookaheadConfig,
    columns: ColumnSet,
}

impl LookaheadBuilder {
    fn new() -> Self {
        Self {
            config: LookaheadConfig::default(),
            columns: ColumnSet::new(),
        }
    }

    /// Use this configuration instead of the defaults
    pub fn config(mut self, config: LookaheadConfig) -> Self {
        self.config = config;
        self
    }

    /// Declare one column for prefetch
    pub fn prefetch(mut self, column: ColumnId) -> Self {
        self.columns.insert(column);
        self
    }

    /// Declare several columns for prefetch
    pub fn prefetch_columns(mut self, columns: impl IntoIterator<Item = ColumnId>) -> Self {
        for column in columns {
            self.columns.insert(column);
        }
        self
    }

    fn validate(&self, read: &dyn TableCursor) -> Result<()> {
        self.config.validate()?;
        if !self.config.enabled {
            return Err(OutriderError::invalid_parameter(
                "enabled",
                "asynchronous lookahead is disabled by configuration",
            ));
        }
        for column in &self.columns {
            if !read.exists_column(column) {
                return Err(OutriderError::column_missing(column));
            }
        }
        Ok(())
    }

    fn start(
        self,
        read: Box<dyn TableCursor>,
        write: Option<Box<dyn WritableCursor>>,
    ) -> Result<LookaheadCursor> {
        self.validate(read.as_ref())?;
        let interchange = Arc::new(Interchange::new(&self.config));
        let worker = WorkerHandle::spawn(
            Arc::clone(&interchange),
            read,
            write,
            self.columns.clone(),
        )?;
        debug!(
            buffers = self.config.ring_buffers,
            columns = self.columns.len(),
            "lookahead session started"
        );
        Ok(LookaheadCursor {
            interchange,
            worker,
            columns: self.columns,
            position: SubchunkPosition::ORIGIN,
            attached: None,
            refresh_derived: true,
            derived: DerivedValues::default(),
        })
    }

    /// Spawn the worker over a read-only cursor
    pub fn build<R>(self, read: R) -> Result<LookaheadCursor>
    where
        R: TableCursor + 'static,
    {
        self.start(Box::new(read), None)
    }

    /// Spawn the worker over a read cursor plus a write cursor aligned to
    /// the same dataset
    pub fn build_writable<R, W>(self, read: R, write: W) -> Result<WritableLookaheadCursor>
    where
        R: TableCursor + 'static,
        W: WritableCursor + 'static,
    {
        let inner = self.start(Box::new(read), Some(Box::new(write)))?;
        Ok(WritableLookaheadCursor { inner })
    }
}

/// Read-only foreground cursor over an asynchronous sweep.
#[derive(Debug)]
pub struct LookaheadCursor {
    interchange: Arc<Interchange>,
    worker: WorkerHandle,
    columns: ColumnSet,
    position: SubchunkPosition,
    attached: Option<RowBatch>,
    refresh_derived: bool,
    derived: DerivedValues,
}

impl LookaheadCursor {
    /// Start declaring a new session
    pub fn builder() -> LookaheadBuilder {
        LookaheadBuilder::new()
    }

    /// The coordinate the cursor currently points at
    pub fn position(&self) -> SubchunkPosition {
        self.position
    }

    /// The columns declared for prefetch
    pub fn prefetched_columns(&self) -> &ColumnSet {
        &self.columns
    }

    /// Always true; lets generic code distinguish this from a plain
    /// synchronous cursor without a type check
    pub fn is_asynchronous(&self) -> bool {
        true
    }

    /// Rewind to the start of the dataset.
    ///
    /// Blocks until the worker has abandoned its sweep, cleared the ring and
    /// is about to start fresh, so pending modifiers are guaranteed to be in
    /// effect for everything fetched afterwards.
    pub fn origin_chunks(&mut self) -> Result<()> {
        self.complete_outstanding();
        self.position = SubchunkPosition::ORIGIN;
        self.refresh_derived = true;
        self.interchange.request_sweep_reset()
    }

    /// Whether the current chunk will ever start; may block
    pub fn more_chunks(&self) -> Result<bool> {
        self.interchange.is_valid_chunk(self.position.chunk)
    }

    /// Move to the first subchunk of the current chunk and fetch it if the
    /// sweep produces it
    pub fn origin(&mut self) -> Result<()> {
        self.complete_outstanding();
        self.position = SubchunkPosition::new(self.position.chunk, 0);
        self.fetch_if_produced()
    }

    /// Whether the current subchunk position exists in this sweep; may block
    pub fn more(&self) -> Result<bool> {
        self.interchange.is_valid_subchunk(self.position)
    }

    /// Move to the next subchunk and fetch it if the sweep produces it
    pub fn advance(&mut self) -> Result<()> {
        self.complete_outstanding();
        self.position = self.position.next_subchunk();
        self.fetch_if_produced()
    }

    /// Move to the first subchunk of the next chunk, without fetching
    pub fn next_chunk(&mut self) -> Result<()> {
        self.complete_outstanding();
        self.position = self.position.next_chunk();
        Ok(())
    }

    /// The batch fetched for the current position
    pub fn batch(&self) -> Result<&RowBatch> {
        self.attached
            .as_ref()
            .ok_or_else(|| OutriderError::no_current_buffer(self.position))
    }

    /// Antenna count cached from the first batch of the sweep
    pub fn antenna_count(&self) -> Option<usize> {
        self.derived.antenna_count
    }

    /// Phase center cached from the first batch of the sweep
    pub fn phase_center(&self) -> Option<(f64, f64)> {
        self.derived.phase_center
    }

    /// The channel selection currently in effect on the worker's cursor
    pub fn channel_selection(&self) -> ChannelSelection {
        self.interchange.channel_selection()
    }

    /// Queue a channel selection for the worker's next sweep
    pub fn select_channels(&self, selection: ChannelSelection) -> Result<()> {
        selection.validate()?;
        self.interchange
            .add_modifier(Modifier::SelectChannels(selection));
        Ok(())
    }

    /// Queue a velocity selection for the worker's next sweep
    pub fn select_velocity(&self, selection: VelocitySelection) -> Result<()> {
        selection.validate()?;
        self.interchange
            .add_modifier(Modifier::SelectVelocity(selection));
        Ok(())
    }

    /// Queue a row-blocking change for the worker's next sweep
    pub fn set_row_blocking(&self, rows: u64) -> Result<()> {
        self.interchange.add_modifier(Modifier::SetRowBlocking(rows));
        Ok(())
    }

    /// Queue an averaging-interval change for the worker's next sweep
    pub fn set_interval(&self, seconds: f64) -> Result<()> {
        if seconds < 0.0 {
            return Err(OutriderError::invalid_parameter(
                "seconds",
                "averaging interval cannot be negative",
            ));
        }
        self.interchange.add_modifier(Modifier::SetInterval(seconds));
        Ok(())
    }

    /// Human-readable statistics summary
    pub fn stats_report(&self) -> String {
        self.interchange.stats_report()
    }

    /// Snapshot of the accumulated statistics
    pub fn stats(&self) -> SweepStats {
        self.interchange.stats_snapshot()
    }

    /// Shut the session down and join the worker thread.
    ///
    /// A worker panic is re-raised here. If the worker had already died of a
    /// dataset failure, that failure is returned so a consumer who never
    /// blocked on it still sees it.
    pub fn terminate(&mut self) -> Result<()> {
        self.complete_outstanding();
        self.worker.terminate();
        match self.interchange.worker_failure() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn complete_outstanding(&mut self) {
        if self.attached.take().is_some() {
            self.interchange.read_complete(self.position);
        }
    }

    /// Fetch the batch for the current position if the horizon confirms the
    /// sweep produces it; otherwise detach.
    fn fetch_if_produced(&mut self) -> Result<()> {
        if self.interchange.is_valid_subchunk(self.position)? {
            let batch = self.interchange.read_start(self.position)?;
            if self.refresh_derived {
                self.derived.antenna_count = batch.antenna_count();
                self.derived.phase_center = batch.phase_center();
                self.refresh_derived = false;
            }
            self.attached = Some(batch);
        } else {
            self.attached = None;
        }
        Ok(())
    }

    fn enqueue_write(&self, op: WriteOp) -> Result<()> {
        if self.attached.is_none() {
            return Err(OutriderError::no_current_buffer(self.position));
        }
        self.interchange
            .enqueue_write(WriteCommand::new(self.position, op));
        Ok(())
    }
}

/// Foreground cursor whose session also owns a write cursor.
///
/// Mutators never block and never touch the worker's cursors directly; each
/// one queues a deferred write at the current coordinate, applied by the
/// worker strictly in enqueue order.
#[derive(Debug)]
pub struct WritableLookaheadCursor {
    inner: LookaheadCursor,
}

impl WritableLookaheadCursor {
    /// Queue new row flags for the current subchunk
    pub fn set_flag_row(&self, values: Vec<bool>) -> Result<()> {
        self.inner.enqueue_write(WriteOp::FlagRow(values))
    }

    /// Queue a new flag cube for the current subchunk
    pub fn set_flags(&self, values: Vec<bool>) -> Result<()> {
        self.inner.enqueue_write(WriteOp::Flags(values))
    }

    /// Queue one new visibility cube for the current subchunk
    pub fn set_data(&self, kind: DataKind, values: Vec<Complex>) -> Result<()> {
        self.inner.enqueue_write(WriteOp::Data(kind, values))
    }

    /// Queue new weights for the current subchunk
    pub fn set_weight(&self, values: Vec<f32>) -> Result<()> {
        self.inner.enqueue_write(WriteOp::Weight(values))
    }

    /// Queue new sigmas for the current subchunk
    pub fn set_sigma(&self, values: Vec<f32>) -> Result<()> {
        self.inner.enqueue_write(WriteOp::Sigma(values))
    }
}

impl Deref for WritableLookaheadCursor {
    type Target = LookaheadCursor;

    fn deref(&self) -> &LookaheadCursor {
        &self.inner
    }
}

impl DerefMut for WritableLookaheadCursor {
    fn deref_mut(&mut self) -> &mut LookaheadCursor {
        &mut self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::SyntheticTable;

    #[test]
    fn test_builder_rejects_disabled_configuration() {
        let table = SyntheticTable::new(&[1]);
        let err = LookaheadCursor::builder()
            .config(LookaheadConfig::default().with_enabled(false))
            .prefetch(ColumnId::Time)
            .build(table.cursor())
            .err()
            .unwrap();
        assert!(matches!(err, OutriderError::InvalidParameter { .. }));
    }

    #[test]
    fn test_builder_rejects_zero_buffers() {
        let table = SyntheticTable::new(&[1]);
        let err = LookaheadCursor::builder()
            .config(LookaheadConfig::default().with_ring_buffers(0))
            .build(table.cursor())
            .err()
            .unwrap();
        assert!(err.to_string().contains("ring_buffers"));
    }

    #[test]
    fn test_builder_rejects_missing_prefetch_column() {
        let table = SyntheticTable::new(&[1]);
        table.mark_missing(ColumnId::Model);
        let err = LookaheadCursor::builder()
            .prefetch(ColumnId::Time)
            .prefetch(ColumnId::Model)
            .build(table.cursor())
            .err()
            .unwrap();
        assert!(matches!(
            err,
            OutriderError::ColumnMissing {
                column: ColumnId::Model
            }
        ));
    }

    #[test]
    fn test_batch_before_any_fetch_is_an_error() {
        let table = SyntheticTable::new(&[1]);
        let mut cursor = LookaheadCursor::builder()
            .prefetch(ColumnId::Time)
            .build(table.cursor())
            .unwrap();
        let err = cursor.batch().err().unwrap();
        assert!(matches!(err, OutriderError::NoCurrentBuffer { .. }));
        assert!(cursor.is_asynchronous());
        cursor.terminate().unwrap();
    }

    #[test]
    fn test_smoke_sweep_single_chunk() {
        let table = SyntheticTable::new(&[2]);
        let mut cursor = LookaheadCursor::builder()
            .prefetch_columns([ColumnId::Time, ColumnId::FlagRow])
            .build(table.cursor())
            .unwrap();

        cursor.origin_chunks().unwrap();
        assert!(cursor.more_chunks().unwrap());
        cursor.origin().unwrap();
        let mut seen = Vec::new();
        while cursor.more().unwrap() {
            seen.push(cursor.batch().unwrap().time().unwrap().to_vec());
            cursor.advance().unwrap();
        }
        cursor.next_chunk().unwrap();
        assert!(!cursor.more_chunks().unwrap());

        assert_eq!(seen.len(), 2);
        assert_eq!(
            seen[0],
            SyntheticTable::time_values(SubchunkPosition::new(0, 0), 4)
        );
        assert_eq!(
            seen[1],
            SyntheticTable::time_values(SubchunkPosition::new(0, 1), 4)
        );
        cursor.terminate().unwrap();
    }
}
