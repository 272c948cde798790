//! Cursor trait definitions

use crate::batch::{Complex, RowBatch};
use crate::columns::{ColumnId, DataKind};
use crate::error::Result;
use crate::selection::{ChannelSelection, VelocitySelection};

/// Sequential access to a chunked dataset.
///
/// A cursor walks the dataset chunk by chunk and subchunk by subchunk. The
/// worker thread owns its cursor exclusively; nothing here needs interior
/// synchronization, but the cursor must be movable into the worker thread.
///
/// Position protocol: `origin_chunks` rewinds to the first chunk,
/// `has_more_chunks` reports whether the current chunk exists, `origin`
/// moves to the first subchunk of the current chunk, `has_more_in_chunk`
/// reports whether the current subchunk exists, `advance` steps one
/// subchunk, `next_chunk` steps one chunk. Fill operations read the current
/// subchunk into the supplied batch.
pub trait TableCursor: Send {
    /// Rewind to the first chunk of the sweep
    fn origin_chunks(&mut self, force_rewind: bool) -> Result<()>;

    /// Move to the next chunk
    fn next_chunk(&mut self) -> Result<()>;

    /// Move to the first subchunk of the current chunk
    fn origin(&mut self) -> Result<()>;

    /// Move to the next subchunk of the current chunk
    fn advance(&mut self) -> Result<()>;

    /// Whether the current chunk position refers to an existing chunk
    fn has_more_chunks(&self) -> bool;

    /// Whether the current subchunk position exists within the current chunk
    fn has_more_in_chunk(&self) -> bool;

    /// Whether the dataset provides the given column
    fn exists_column(&self, column: ColumnId) -> bool;

    /// Record the dimensions of the current subchunk into the batch
    fn fill_shape(&mut self, batch: &mut RowBatch) -> Result<()>;

    /// Copy one column of the current subchunk into the batch
    fn fill_column(&mut self, column: ColumnId, batch: &mut RowBatch) -> Result<()>;

    /// Record derived bookkeeping (antenna count, epoch, phase center,
    /// reference frequency) into the batch
    fn fill_extras(&mut self, batch: &mut RowBatch) -> Result<()>;

    /// Restrict subsequent fills to the given channel selection
    fn select_channels(&mut self, selection: &ChannelSelection) -> Result<()>;

    /// Regrid subsequent fills onto a velocity ladder
    fn select_velocity(&mut self, selection: &VelocitySelection) -> Result<()>;

    /// Group this many rows into each subchunk
    fn set_row_blocking(&mut self, rows: u64) -> Result<()>;

    /// Time-average subsequent fills over this interval, in seconds
    fn set_interval(&mut self, seconds: f64) -> Result<()>;

    /// The channel selection currently in effect
    fn channel_selection(&self) -> ChannelSelection;
}

/// A cursor that can also write columns back at its current position.
pub trait WritableCursor: TableCursor {
    /// Overwrite the row flags of the current subchunk
    fn write_flag_row(&mut self, values: &[bool]) -> Result<()>;

    /// Overwrite the flag cube of the current subchunk
    fn write_flags(&mut self, values: &[bool]) -> Result<()>;

    /// Overwrite one visibility cube of the current subchunk
    fn write_data(&mut self, kind: DataKind, values: &[Complex]) -> Result<()>;

    /// Overwrite the weights of the current subchunk
    fn write_weight(&mut self, values: &[f32]) -> Result<()>;

    /// Overwrite the sigmas of the current subchunk
    fn write_sigma(&mut self, values: &[f32]) -> Result<()>;

    /// Push any buffered writes down to the dataset
    fn flush(&mut self) -> Result<()>;
}
