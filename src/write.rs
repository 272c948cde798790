//! Deferred writes replayed by the worker
//!
//! A mutation made on the foreground cursor does not touch the dataset
//! directly; it becomes a command carrying an independently-owned copy of the
//! data, queued for the worker to apply against its private write cursor.
//! Copies are mandatory: the consumer's batch may be mutated or dropped long
//! before the queue drains.

use std::collections::VecDeque;
use std::fmt;

use crate::batch::Complex;
use crate::columns::DataKind;
use crate::cursor::WritableCursor;
use crate::error::Result;
use crate::position::SubchunkPosition;

/// The setter to invoke, with its owned payload.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    FlagRow(Vec<bool>),
    Flags(Vec<bool>),
    Data(DataKind, Vec<Complex>),
    Weight(Vec<f32>),
    Sigma(Vec<f32>),
}

impl WriteOp {
    /// Apply this operation to a write cursor already positioned at the
    /// command's target coordinate
    pub fn apply<W: WritableCursor + ?Sized>(&self, cursor: &mut W) -> Result<()> {
        match self {
            WriteOp::FlagRow(values) => cursor.write_flag_row(values),
            WriteOp::Flags(values) => cursor.write_flags(values),
            WriteOp::Data(kind, values) => cursor.write_data(*kind, values),
            WriteOp::Weight(values) => cursor.write_weight(values),
            WriteOp::Sigma(values) => cursor.write_sigma(values),
        }
    }
}

impl fmt::Display for WriteOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteOp::FlagRow(values) => write!(f, "flag_row ({} rows)", values.len()),
            WriteOp::Flags(values) => write!(f, "flags ({} samples)", values.len()),
            WriteOp::Data(kind, values) => write!(f, "{} ({} samples)", kind, values.len()),
            WriteOp::Weight(values) => write!(f, "weight ({} values)", values.len()),
            WriteOp::Sigma(values) => write!(f, "sigma ({} values)", values.len()),
        }
    }
}

/// One deferred write: where, and what.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteCommand {
    pub position: SubchunkPosition,
    pub op: WriteOp,
}

impl WriteCommand {
    pub fn new(position: SubchunkPosition, op: WriteOp) -> Self {
        Self { position, op }
    }
}

impl fmt::Display for WriteCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "write {} at {}", self.op, self.position)
    }
}

/// FIFO of deferred writes, drained strictly in enqueue order.
#[derive(Debug, Default)]
pub struct WriteQueue {
    entries: VecDeque<WriteCommand>,
}

impl WriteQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one command
    pub fn enqueue(&mut self, command: WriteCommand) {
        self.entries.push_back(command);
    }

    /// Pop the oldest command, if any; never blocks
    pub fn dequeue(&mut self) -> Option<WriteCommand> {
        self.entries.pop_front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
