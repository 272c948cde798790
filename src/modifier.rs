//! One-shot configuration changes applied at sweep start
//!
//! The consumer may enqueue these at any time; they take effect only when the
//! worker begins its next sweep, which atomically takes the whole log. They
//! are one-shot: applied once, in insertion order, then discarded.

use std::fmt;

use crate::cursor::TableCursor;
use crate::error::Result;
use crate::selection::{ChannelSelection, VelocitySelection};

/// A queued cursor-configuration change.
#[derive(Debug, Clone, PartialEq)]
pub enum Modifier {
    /// Restrict fills to a channel selection
    SelectChannels(ChannelSelection),
    /// Group this many rows per subchunk
    SetRowBlocking(u64),
    /// Time-average over this many seconds
    SetInterval(f64),
    /// Regrid onto a radial-velocity ladder
    SelectVelocity(VelocitySelection),
}

impl Modifier {
    /// Apply this change to a cursor
    pub fn apply<C: TableCursor + ?Sized>(&self, cursor: &mut C) -> Result<()> {
        match self {
            Modifier::SelectChannels(selection) => cursor.select_channels(selection),
            Modifier::SetRowBlocking(rows) => cursor.set_row_blocking(*rows),
            Modifier::SetInterval(seconds) => cursor.set_interval(*seconds),
            Modifier::SelectVelocity(selection) => cursor.select_velocity(selection),
        }
    }
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Modifier::SelectChannels(selection) => write!(f, "select channels: {}", selection),
            Modifier::SetRowBlocking(rows) => write!(f, "set row blocking: {} rows", rows),
            Modifier::SetInterval(seconds) => write!(f, "set interval: {} s", seconds),
            Modifier::SelectVelocity(selection) => write!(f, "select velocity: {}", selection),
        }
    }
}

/// Insertion-ordered log of pending modifiers.
#[derive(Debug, Default)]
pub struct ModifierLog {
    entries: Vec<Modifier>,
}

impl ModifierLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one modifier
    pub fn add(&mut self, modifier: Modifier) {
        self.entries.push(modifier);
    }

    /// Take the whole log, leaving it empty
    pub fn take_all(&mut self) -> Vec<Modifier> {
        std::mem::take(&mut self.entries)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::{SyntheticTable, TableCursor};

    #[test]
    fn test_take_all_clears_the_log() {
        let mut log = ModifierLog::new();
        log.add(Modifier::SetRowBlocking(32));
        log.add(Modifier::SetInterval(10.0));
        assert_eq!(log.len(), 2);

        let taken = log.take_all();
        assert_eq!(taken.len(), 2);
        assert!(log.is_empty());
        assert!(log.take_all().is_empty());
    }

    #[test]
    fn test_apply_dispatches_to_the_cursor() {
        let table = SyntheticTable::new(&[1]);
        let mut cursor = table.cursor();

        let mut selection = ChannelSelection::new();
        selection.add_window(0, 0, 8, 8, 1);
        let modifiers = vec![
            Modifier::SetRowBlocking(16),
            Modifier::SelectChannels(selection.clone()),
        ];
        for modifier in &modifiers {
            modifier.apply(&mut cursor).unwrap();
        }

        let applied = table.applied_configuration();
        assert_eq!(applied.len(), 2);
        assert!(applied[0].starts_with("set_row_blocking"));
        assert_eq!(cursor.channel_selection(), selection);
    }

    #[test]
    fn test_display() {
        assert_eq!(
            Modifier::SetRowBlocking(64).to_string(),
            "set row blocking: 64 rows"
        );
        assert_eq!(Modifier::SetInterval(2.5).to_string(), "set interval: 2.5 s");
        assert_eq!(
            Modifier::SelectChannels(ChannelSelection::new()).to_string(),
            "select channels: all channels"
        );
    }
}
