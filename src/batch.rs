//! Row batch payload carried through the ring
//!
//! A `RowBatch` is the unit of data handed from the worker to the consumer:
//! the rows of one subchunk, with one typed array per prefetched column plus
//! shape and derived bookkeeping. It is strictly value-semantic (owned `Vec`s
//! and `Copy` scalars, no shared substate), so moving a batch across the
//! thread boundary transfers everything it refers to.

use crate::columns::{ColumnId, DataKind};
use crate::error::{OutriderError, Result};

/// One complex visibility sample.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Complex {
    pub re: f32,
    pub im: f32,
}

impl Complex {
    pub fn new(re: f32, im: f32) -> Self {
        Self { re, im }
    }
}

/// Dimensions of the visibility cube held by a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchShape {
    /// Rows in this subchunk
    pub rows: usize,
    /// Frequency channels per row
    pub channels: usize,
    /// Correlation products per channel
    pub correlations: usize,
}

impl BatchShape {
    /// Flat length of a per-row array
    pub fn row_len(&self) -> usize {
        self.rows
    }

    /// Flat length of a rows x correlations array (weight, sigma)
    pub fn weight_len(&self) -> usize {
        self.rows * self.correlations
    }

    /// Flat length of a rows x channels x correlations cube (flags, data)
    pub fn cube_len(&self) -> usize {
        self.rows * self.channels * self.correlations
    }
}

/// The payload filled by the worker and consumed by the foreground cursor.
///
/// Every column array is optional; an accessor for an unfilled column fails
/// with [`OutriderError::ColumnNotPrefetched`] so a mistaken access surfaces
/// immediately instead of producing silently empty data. Flat arrays are laid
/// out with correlation fastest, then channel, then row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowBatch {
    shape: Option<BatchShape>,
    filling: bool,

    time: Option<Vec<f64>>,
    exposure: Option<Vec<f64>>,
    antenna1: Option<Vec<u32>>,
    antenna2: Option<Vec<u32>>,
    feed1: Option<Vec<u32>>,
    feed2: Option<Vec<u32>>,
    scan: Option<Vec<u32>>,
    field_id: Option<Vec<u32>>,
    uvw: Option<Vec<[f64; 3]>>,
    flag_row: Option<Vec<bool>>,
    flags: Option<Vec<bool>>,
    weight: Option<Vec<f32>>,
    sigma: Option<Vec<f32>>,
    observed: Option<Vec<Complex>>,
    model: Option<Vec<Complex>>,
    corrected: Option<Vec<Complex>>,

    antenna_count: Option<usize>,
    epoch: Option<f64>,
    phase_center: Option<(f64, f64)>,
    reference_frequency: Option<f64>,
}

impl RowBatch {
    /// Create an empty batch with nothing filled
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset to the freshly-constructed state
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Mark the batch as currently being filled by the worker
    pub fn set_filling(&mut self, filling: bool) {
        self.filling = filling;
    }

    /// Whether the worker is mid-fill on this batch
    pub fn is_filling(&self) -> bool {
        self.filling
    }

    /// Whether the given column has been filled
    pub fn has_column(&self, column: ColumnId) -> bool {
        match column {
            ColumnId::Time => self.time.is_some(),
            ColumnId::Exposure => self.exposure.is_some(),
            ColumnId::Antenna1 => self.antenna1.is_some(),
            ColumnId::Antenna2 => self.antenna2.is_some(),
            ColumnId::Feed1 => self.feed1.is_some(),
            ColumnId::Feed2 => self.feed2.is_some(),
            ColumnId::Scan => self.scan.is_some(),
            ColumnId::FieldId => self.field_id.is_some(),
            ColumnId::Uvw => self.uvw.is_some(),
            ColumnId::FlagRow => self.flag_row.is_some(),
            ColumnId::Flags => self.flags.is_some(),
            ColumnId::Weight => self.weight.is_some(),
            ColumnId::Sigma => self.sigma.is_some(),
            ColumnId::Observed => self.observed.is_some(),
            ColumnId::Model => self.model.is_some(),
            ColumnId::Corrected => self.corrected.is_some(),
        }
    }

    // Shape and derived bookkeeping, set once per fill before the columns.

    pub fn set_shape(&mut self, shape: BatchShape) {
        self.shape = Some(shape);
    }

    pub fn shape(&self) -> Option<BatchShape> {
        self.shape
    }

    pub fn set_antenna_count(&mut self, count: usize) {
        self.antenna_count = Some(count);
    }

    pub fn antenna_count(&self) -> Option<usize> {
        self.antenna_count
    }

    pub fn set_epoch(&mut self, epoch: f64) {
        self.epoch = Some(epoch);
    }

    pub fn epoch(&self) -> Option<f64> {
        self.epoch
    }

    pub fn set_phase_center(&mut self, direction: (f64, f64)) {
        self.phase_center = Some(direction);
    }

    pub fn phase_center(&self) -> Option<(f64, f64)> {
        self.phase_center
    }

    pub fn set_reference_frequency(&mut self, hz: f64) {
        self.reference_frequency = Some(hz);
    }

    pub fn reference_frequency(&self) -> Option<f64> {
        self.reference_frequency
    }

    // Column setters, one per prefetchable column. Each takes ownership of
    // the caller's array.

    pub fn set_time(&mut self, values: Vec<f64>) {
        self.time = Some(values);
    }

    pub fn set_exposure(&mut self, values: Vec<f64>) {
        self.exposure = Some(values);
    }

    pub fn set_antenna1(&mut self, values: Vec<u32>) {
        self.antenna1 = Some(values);
    }

    pub fn set_antenna2(&mut self, values: Vec<u32>) {
        self.antenna2 = Some(values);
    }

    pub fn set_feed1(&mut self, values: Vec<u32>) {
        self.feed1 = Some(values);
    }

    pub fn set_feed2(&mut self, values: Vec<u32>) {
        self.feed2 = Some(values);
    }

    pub fn set_scan(&mut self, values: Vec<u32>) {
        self.scan = Some(values);
    }

    pub fn set_field_id(&mut self, values: Vec<u32>) {
        self.field_id = Some(values);
    }

    pub fn set_uvw(&mut self, values: Vec<[f64; 3]>) {
        self.uvw = Some(values);
    }

    pub fn set_flag_row(&mut self, values: Vec<bool>) {
        self.flag_row = Some(values);
    }

    pub fn set_flags(&mut self, values: Vec<bool>) {
        self.flags = Some(values);
    }

    pub fn set_weight(&mut self, values: Vec<f32>) {
        self.weight = Some(values);
    }

    pub fn set_sigma(&mut self, values: Vec<f32>) {
        self.sigma = Some(values);
    }

    pub fn set_data(&mut self, kind: DataKind, values: Vec<Complex>) {
        match kind {
            DataKind::Observed => self.observed = Some(values),
            DataKind::Model => self.model = Some(values),
            DataKind::Corrected => self.corrected = Some(values),
        }
    }

    // Fail-fast accessors.

    pub fn time(&self) -> Result<&[f64]> {
        Self::filled(&self.time, ColumnId::Time)
    }

    pub fn exposure(&self) -> Result<&[f64]> {
        Self::filled(&self.exposure, ColumnId::Exposure)
    }

    pub fn antenna1(&self) -> Result<&[u32]> {
        Self::filled(&self.antenna1, ColumnId::Antenna1)
    }

    pub fn antenna2(&self) -> Result<&[u32]> {
        Self::filled(&self.antenna2, ColumnId::Antenna2)
    }

    pub fn feed1(&self) -> Result<&[u32]> {
        Self::filled(&self.feed1, ColumnId::Feed1)
    }

    pub fn feed2(&self) -> Result<&[u32]> {
        Self::filled(&self.feed2, ColumnId::Feed2)
    }

    pub fn scan(&self) -> Result<&[u32]> {
        Self::filled(&self.scan, ColumnId::Scan)
    }

    pub fn field_id(&self) -> Result<&[u32]> {
        Self::filled(&self.field_id, ColumnId::FieldId)
    }

    pub fn uvw(&self) -> Result<&[[f64; 3]]> {
        Self::filled(&self.uvw, ColumnId::Uvw)
    }

    pub fn flag_row(&self) -> Result<&[bool]> {
        Self::filled(&self.flag_row, ColumnId::FlagRow)
    }

    pub fn flags(&self) -> Result<&[bool]> {
        Self::filled(&self.flags, ColumnId::Flags)
    }

    pub fn weight(&self) -> Result<&[f32]> {
        Self::filled(&self.weight, ColumnId::Weight)
    }

    pub fn sigma(&self) -> Result<&[f32]> {
        Self::filled(&self.sigma, ColumnId::Sigma)
    }

    pub fn data(&self, kind: DataKind) -> Result<&[Complex]> {
        let storage = match kind {
            DataKind::Observed => &self.observed,
            DataKind::Model => &self.model,
            DataKind::Corrected => &self.corrected,
        };
        Self::filled(storage, kind.column())
    }

    fn filled<T>(storage: &Option<Vec<T>>, column: ColumnId) -> Result<&[T]> {
        storage
            .as_deref()
            .ok_or_else(|| OutriderError::column_not_prefetched(column))
    }
}
