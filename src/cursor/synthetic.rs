//! In-memory reference dataset
//!
//! `SyntheticTable` generates a deterministic dataset from a chunk layout so
//! tests and benches can verify delivery order and payload identity, not just
//! counts. All cursors opened from one table share the same backing store;
//! writes made through one cursor are immediately visible to every other.

use std::sync::{Arc, Mutex};

use crate::batch::{BatchShape, Complex, RowBatch};
use crate::columns::{ColumnId, DataKind};
use crate::error::{OutriderError, Result};
use crate::position::SubchunkPosition;
use crate::selection::{ChannelSelection, VelocitySelection};

use super::traits::{TableCursor, WritableCursor};

const ANTENNAS: usize = 4;

#[derive(Debug, Clone)]
struct SubchunkData {
    shape: BatchShape,
    time: Vec<f64>,
    exposure: Vec<f64>,
    antenna1: Vec<u32>,
    antenna2: Vec<u32>,
    feed1: Vec<u32>,
    feed2: Vec<u32>,
    scan: Vec<u32>,
    field_id: Vec<u32>,
    uvw: Vec<[f64; 3]>,
    flag_row: Vec<bool>,
    flags: Vec<bool>,
    weight: Vec<f32>,
    sigma: Vec<f32>,
    observed: Vec<Complex>,
    model: Vec<Complex>,
    corrected: Vec<Complex>,
}

impl SubchunkData {
    fn generate(chunk: usize, subchunk: usize, shape: BatchShape) -> Self {
        let base = (chunk * 1000 + subchunk * 10) as f64;
        let rows = shape.rows;
        let observed: Vec<Complex> = (0..shape.cube_len())
            .map(|i| Complex::new(base as f32 + i as f32, -(i as f32)))
            .collect();
        Self {
            shape,
            time: SyntheticTable::time_values(
                SubchunkPosition::new(chunk as u64, subchunk as u64),
                rows,
            ),
            exposure: vec![1.5; rows],
            antenna1: (0..rows).map(|r| (r % ANTENNAS) as u32).collect(),
            antenna2: (0..rows).map(|r| ((r + 1) % ANTENNAS) as u32).collect(),
            feed1: vec![0; rows],
            feed2: vec![0; rows],
            scan: vec![chunk as u32 + 1; rows],
            field_id: vec![0; rows],
            uvw: (0..rows)
                .map(|r| [chunk as f64, subchunk as f64, r as f64])
                .collect(),
            flag_row: vec![false; rows],
            flags: vec![false; shape.cube_len()],
            weight: vec![1.0; shape.weight_len()],
            sigma: vec![1.0; shape.weight_len()],
            corrected: observed.clone(),
            observed,
            model: vec![Complex::default(); shape.cube_len()],
        }
    }
}

#[derive(Debug, Clone)]
struct FillError {
    column: ColumnId,
    position: SubchunkPosition,
    message: String,
}

#[derive(Debug)]
struct TableStore {
    layout: Vec<usize>,
    chunks: Vec<Vec<SubchunkData>>,
    selection: ChannelSelection,
    velocity: Option<VelocitySelection>,
    row_blocking: u64,
    interval: f64,
    applied: Vec<String>,
    flush_count: u64,
    missing: Vec<ColumnId>,
    fill_error: Option<FillError>,
}

impl TableStore {
    fn subchunk(&self, chunk: usize, subchunk: usize) -> Result<&SubchunkData> {
        self.chunks
            .get(chunk)
            .and_then(|c| c.get(subchunk))
            .ok_or_else(|| {
                OutriderError::io(format!(
                    "cursor position ({}, {}) is outside the table",
                    chunk, subchunk
                ))
            })
    }

    fn subchunk_mut(&mut self, chunk: usize, subchunk: usize) -> Result<&mut SubchunkData> {
        self.chunks
            .get_mut(chunk)
            .and_then(|c| c.get_mut(subchunk))
            .ok_or_else(|| {
                OutriderError::io(format!(
                    "cursor position ({}, {}) is outside the table",
                    chunk, subchunk
                ))
            })
    }
}

/// A deterministic in-memory dataset shared by every cursor opened from it.
#[derive(Debug, Clone)]
pub struct SyntheticTable {
    store: Arc<Mutex<TableStore>>,
}

impl SyntheticTable {
    /// Create a table with the given number of subchunks per chunk and a
    /// default subchunk shape
    pub fn new(subchunks_per_chunk: &[usize]) -> Self {
        Self::with_shape(
            subchunks_per_chunk,
            BatchShape {
                rows: 4,
                channels: 8,
                correlations: 2,
            },
        )
    }

    /// Create a table with an explicit subchunk shape
    pub fn with_shape(subchunks_per_chunk: &[usize], shape: BatchShape) -> Self {
        let chunks = subchunks_per_chunk
            .iter()
            .enumerate()
            .map(|(c, &count)| {
                (0..count)
                    .map(|s| SubchunkData::generate(c, s, shape))
                    .collect()
            })
            .collect();
        Self {
            store: Arc::new(Mutex::new(TableStore {
                layout: subchunks_per_chunk.to_vec(),
                chunks,
                selection: ChannelSelection::new(),
                velocity: None,
                row_blocking: 0,
                interval: 0.0,
                applied: Vec::new(),
                flush_count: 0,
                missing: Vec::new(),
                fill_error: None,
            })),
        }
    }

    /// The deterministic time column of one subchunk, usable by tests to
    /// check payload identity
    pub fn time_values(position: SubchunkPosition, rows: usize) -> Vec<f64> {
        let base = (position.chunk * 1000 + position.subchunk * 10) as f64;
        (0..rows).map(|r| base + r as f64).collect()
    }

    /// Open a cursor positioned at the origin
    pub fn cursor(&self) -> SyntheticCursor {
        SyntheticCursor {
            store: Arc::clone(&self.store),
            chunk: 0,
            subchunk: 0,
        }
    }

    pub fn chunk_count(&self) -> usize {
        self.store.lock().unwrap().layout.len()
    }

    /// Current row flags of one subchunk
    pub fn flag_row_at(&self, position: SubchunkPosition) -> Vec<bool> {
        let store = self.store.lock().unwrap();
        store.chunks[position.chunk as usize][position.subchunk as usize]
            .flag_row
            .clone()
    }

    /// Current flag cube of one subchunk
    pub fn flags_at(&self, position: SubchunkPosition) -> Vec<bool> {
        let store = self.store.lock().unwrap();
        store.chunks[position.chunk as usize][position.subchunk as usize]
            .flags
            .clone()
    }

    /// Current weights of one subchunk
    pub fn weight_at(&self, position: SubchunkPosition) -> Vec<f32> {
        let store = self.store.lock().unwrap();
        store.chunks[position.chunk as usize][position.subchunk as usize]
            .weight
            .clone()
    }

    /// Current visibility cube of one subchunk
    pub fn data_at(&self, kind: DataKind, position: SubchunkPosition) -> Vec<Complex> {
        let store = self.store.lock().unwrap();
        let data = &store.chunks[position.chunk as usize][position.subchunk as usize];
        match kind {
            DataKind::Observed => data.observed.clone(),
            DataKind::Model => data.model.clone(),
            DataKind::Corrected => data.corrected.clone(),
        }
    }

    /// Configuration calls applied through any cursor, in order
    pub fn applied_configuration(&self) -> Vec<String> {
        self.store.lock().unwrap().applied.clone()
    }

    /// How many times a write cursor has been flushed
    pub fn flush_count(&self) -> u64 {
        self.store.lock().unwrap().flush_count
    }

    /// Pretend the given column does not exist in the dataset
    pub fn mark_missing(&self, column: ColumnId) {
        self.store.lock().unwrap().missing.push(column);
    }

    /// Make every fill of `column` at `position` fail with an I/O error
    pub fn inject_fill_error(
        &self,
        column: ColumnId,
        position: SubchunkPosition,
        message: impl Into<String>,
    ) {
        self.store.lock().unwrap().fill_error = Some(FillError {
            column,
            position,
            message: message.into(),
        });
    }
}

/// A cursor over a [`SyntheticTable`], readable and writable.
#[derive(Debug)]
pub struct SyntheticCursor {
    store: Arc<Mutex<TableStore>>,
    chunk: usize,
    subchunk: usize,
}

impl SyntheticCursor {
    fn position(&self) -> SubchunkPosition {
        SubchunkPosition::new(self.chunk as u64, self.subchunk as u64)
    }
}

impl TableCursor for SyntheticCursor {
    fn origin_chunks(&mut self, _force_rewind: bool) -> Result<()> {
        self.chunk = 0;
        self.subchunk = 0;
        Ok(())
    }

    fn next_chunk(&mut self) -> Result<()> {
        self.chunk += 1;
        self.subchunk = 0;
        Ok(())
    }

    fn origin(&mut self) -> Result<()> {
        self.subchunk = 0;
        Ok(())
    }

    fn advance(&mut self) -> Result<()> {
        self.subchunk += 1;
        Ok(())
    }

    fn has_more_chunks(&self) -> bool {
        let store = self.store.lock().unwrap();
        self.chunk < store.layout.len()
    }

    fn has_more_in_chunk(&self) -> bool {
        let store = self.store.lock().unwrap();
        store
            .layout
            .get(self.chunk)
            .is_some_and(|&count| self.subchunk < count)
    }

    fn exists_column(&self, column: ColumnId) -> bool {
        !self.store.lock().unwrap().missing.contains(&column)
    }

    fn fill_shape(&mut self, batch: &mut RowBatch) -> Result<()> {
        let store = self.store.lock().unwrap();
        batch.set_shape(store.subchunk(self.chunk, self.subchunk)?.shape);
        Ok(())
    }

    fn fill_column(&mut self, column: ColumnId, batch: &mut RowBatch) -> Result<()> {
        let store = self.store.lock().unwrap();
        if let Some(err) = &store.fill_error {
            if err.column == column && err.position == self.position() {
                return Err(OutriderError::io(err.message.clone()));
            }
        }
        let data = store.subchunk(self.chunk, self.subchunk)?;
        match column {
            ColumnId::Time => batch.set_time(data.time.clone()),
            ColumnId::Exposure => batch.set_exposure(data.exposure.clone()),
            ColumnId::Antenna1 => batch.set_antenna1(data.antenna1.clone()),
            ColumnId::Antenna2 => batch.set_antenna2(data.antenna2.clone()),
            ColumnId::Feed1 => batch.set_feed1(data.feed1.clone()),
            ColumnId::Feed2 => batch.set_feed2(data.feed2.clone()),
            ColumnId::Scan => batch.set_scan(data.scan.clone()),
            ColumnId::FieldId => batch.set_field_id(data.field_id.clone()),
            ColumnId::Uvw => batch.set_uvw(data.uvw.clone()),
            ColumnId::FlagRow => batch.set_flag_row(data.flag_row.clone()),
            ColumnId::Flags => batch.set_flags(data.flags.clone()),
            ColumnId::Weight => batch.set_weight(data.weight.clone()),
            ColumnId::Sigma => batch.set_sigma(data.sigma.clone()),
            ColumnId::Observed => batch.set_data(DataKind::Observed, data.observed.clone()),
            ColumnId::Model => batch.set_data(DataKind::Model, data.model.clone()),
            ColumnId::Corrected => batch.set_data(DataKind::Corrected, data.corrected.clone()),
        }
        Ok(())
    }

    fn fill_extras(&mut self, batch: &mut RowBatch) -> Result<()> {
        let store = self.store.lock().unwrap();
        let data = store.subchunk(self.chunk, self.subchunk)?;
        batch.set_antenna_count(ANTENNAS);
        batch.set_epoch(data.time.first().copied().unwrap_or(0.0));
        batch.set_phase_center((0.5, -0.3));
        batch.set_reference_frequency(1.42e9);
        Ok(())
    }

    fn select_channels(&mut self, selection: &ChannelSelection) -> Result<()> {
        let mut store = self.store.lock().unwrap();
        store.selection = selection.clone();
        store.applied.push(format!("select_channels: {}", selection));
        Ok(())
    }

    fn select_velocity(&mut self, selection: &VelocitySelection) -> Result<()> {
        let mut store = self.store.lock().unwrap();
        store.velocity = Some(selection.clone());
        store.applied.push(format!("select_velocity: {}", selection));
        Ok(())
    }

    fn set_row_blocking(&mut self, rows: u64) -> Result<()> {
        let mut store = self.store.lock().unwrap();
        store.row_blocking = rows;
        store.applied.push(format!("set_row_blocking: {} rows", rows));
        Ok(())
    }

    fn set_interval(&mut self, seconds: f64) -> Result<()> {
        let mut store = self.store.lock().unwrap();
        store.interval = seconds;
        store.applied.push(format!("set_interval: {} s", seconds));
        Ok(())
    }

    fn channel_selection(&self) -> ChannelSelection {
        self.store.lock().unwrap().selection.clone()
    }
}

impl WritableCursor for SyntheticCursor {
    fn write_flag_row(&mut self, values: &[bool]) -> Result<()> {
        let mut store = self.store.lock().unwrap();
        store.subchunk_mut(self.chunk, self.subchunk)?.flag_row = values.to_vec();
        Ok(())
    }

    fn write_flags(&mut self, values: &[bool]) -> Result<()> {
        let mut store = self.store.lock().unwrap();
        store.subchunk_mut(self.chunk, self.subchunk)?.flags = values.to_vec();
        Ok(())
    }

    fn write_data(&mut self, kind: DataKind, values: &[Complex]) -> Result<()> {
        let mut store = self.store.lock().unwrap();
        let data = store.subchunk_mut(self.chunk, self.subchunk)?;
        match kind {
            DataKind::Observed => data.observed = values.to_vec(),
            DataKind::Model => data.model = values.to_vec(),
            DataKind::Corrected => data.corrected = values.to_vec(),
        }
        Ok(())
    }

    fn write_weight(&mut self, values: &[f32]) -> Result<()> {
        let mut store = self.store.lock().unwrap();
        store.subchunk_mut(self.chunk, self.subchunk)?.weight = values.to_vec();
        Ok(())
    }

    fn write_sigma(&mut self, values: &[f32]) -> Result<()> {
        let mut store = self.store.lock().unwrap();
        store.subchunk_mut(self.chunk, self.subchunk)?.sigma = values.to_vec();
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.store.lock().unwrap().flush_count += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sweep_positions(cursor: &mut SyntheticCursor) -> Vec<SubchunkPosition> {
        let mut seen = Vec::new();
        cursor.origin_chunks(false).unwrap();
        while cursor.has_more_chunks() {
            cursor.origin().unwrap();
            while cursor.has_more_in_chunk() {
                seen.push(cursor.position());
                cursor.advance().unwrap();
            }
            cursor.next_chunk().unwrap();
        }
        seen
    }

    #[test]
    fn test_cursor_walks_layout() {
        let table = SyntheticTable::new(&[2, 1, 3]);
        let mut cursor = table.cursor();
        let seen = sweep_positions(&mut cursor);
        let expected = vec![
            SubchunkPosition::new(0, 0),
            SubchunkPosition::new(0, 1),
            SubchunkPosition::new(1, 0),
            SubchunkPosition::new(2, 0),
            SubchunkPosition::new(2, 1),
            SubchunkPosition::new(2, 2),
        ];
        assert_eq!(seen, expected);
        // A rewind walks the same positions again
        assert_eq!(sweep_positions(&mut cursor), expected);
    }

    #[test]
    fn test_deterministic_distinct_payloads() {
        let table = SyntheticTable::new(&[1, 1]);
        let mut cursor = table.cursor();
        cursor.origin_chunks(false).unwrap();
        cursor.origin().unwrap();

        let mut first = RowBatch::new();
        cursor.fill_shape(&mut first).unwrap();
        cursor.fill_column(ColumnId::Time, &mut first).unwrap();

        cursor.next_chunk().unwrap();
        cursor.origin().unwrap();
        let mut second = RowBatch::new();
        cursor.fill_column(ColumnId::Time, &mut second).unwrap();

        assert_eq!(
            first.time().unwrap(),
            SyntheticTable::time_values(SubchunkPosition::new(0, 0), 4).as_slice()
        );
        assert_ne!(first.time().unwrap(), second.time().unwrap());
    }

    #[test]
    fn test_writes_visible_through_other_cursors() {
        let table = SyntheticTable::new(&[1]);
        let mut writer = table.cursor();
        writer.origin_chunks(false).unwrap();
        writer.origin().unwrap();
        writer.write_flag_row(&[true, true, false, true]).unwrap();
        writer.flush().unwrap();

        assert_eq!(
            table.flag_row_at(SubchunkPosition::ORIGIN),
            vec![true, true, false, true]
        );
        assert_eq!(table.flush_count(), 1);

        let mut reader = table.cursor();
        reader.origin_chunks(false).unwrap();
        reader.origin().unwrap();
        let mut batch = RowBatch::new();
        reader.fill_column(ColumnId::FlagRow, &mut batch).unwrap();
        assert_eq!(batch.flag_row().unwrap(), &[true, true, false, true]);
    }

    #[test]
    fn test_injected_fill_error() {
        let table = SyntheticTable::new(&[1]);
        table.inject_fill_error(ColumnId::Weight, SubchunkPosition::ORIGIN, "disk gone");
        let mut cursor = table.cursor();
        cursor.origin_chunks(false).unwrap();
        cursor.origin().unwrap();

        let mut batch = RowBatch::new();
        // Other columns still fill
        cursor.fill_column(ColumnId::Time, &mut batch).unwrap();
        let err = cursor.fill_column(ColumnId::Weight, &mut batch).unwrap_err();
        assert!(err.to_string().contains("disk gone"));
    }

    #[test]
    fn test_missing_column() {
        let table = SyntheticTable::new(&[1]);
        let cursor = table.cursor();
        assert!(cursor.exists_column(ColumnId::Corrected));
        table.mark_missing(ColumnId::Corrected);
        assert!(!cursor.exists_column(ColumnId::Corrected));
    }

    #[test]
    fn test_configuration_recorded_in_order() {
        let table = SyntheticTable::new(&[1]);
        let mut cursor = table.cursor();
        cursor.set_row_blocking(64).unwrap();
        let mut sel = ChannelSelection::new();
        sel.add_window(0, 0, 4, 4, 2);
        cursor.select_channels(&sel).unwrap();

        let applied = table.applied_configuration();
        assert_eq!(applied.len(), 2);
        assert!(applied[0].starts_with("set_row_blocking"));
        assert!(applied[1].starts_with("select_channels"));
        assert_eq!(cursor.channel_selection(), sel);
    }
}
