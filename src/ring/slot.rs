//! One occupied position of the buffer ring

use crate::batch::RowBatch;
use crate::position::SubchunkPosition;
use crate::stats::ThreadTimes;

/// A batch in flight through the ring, tagged with the coordinate it was
/// filled from.
///
/// A slot is created empty by `fill_start`, filled by the worker, queued by
/// `fill_complete` and destroyed by `read_start`, which moves the payload out
/// to the consumer. Nothing ever holds a reference into a slot across the
/// thread boundary; the whole value changes hands.
#[derive(Debug)]
pub struct Slot {
    position: SubchunkPosition,
    fill_started: ThreadTimes,
    batch: RowBatch,
}

impl Slot {
    pub(crate) fn new(position: SubchunkPosition) -> Self {
        let mut batch = RowBatch::new();
        batch.set_filling(true);
        Self {
            position,
            fill_started: ThreadTimes::now(),
            batch,
        }
    }

    /// The coordinate this slot was filled from
    pub fn position(&self) -> SubchunkPosition {
        self.position
    }

    /// When the worker began filling this slot, for cycle statistics
    pub fn fill_started(&self) -> &ThreadTimes {
        &self.fill_started
    }

    /// The payload, for the worker to fill
    pub fn batch_mut(&mut self) -> &mut RowBatch {
        &mut self.batch
    }

    /// Mark the fill finished
    pub(crate) fn finish_fill(&mut self) {
        self.batch.set_filling(false);
    }

    /// Consume the slot, transferring the payload to the caller
    pub fn release(self) -> RowBatch {
        self.batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_lifecycle() {
        let mut slot = Slot::new(SubchunkPosition::new(1, 2));
        assert_eq!(slot.position(), SubchunkPosition::new(1, 2));
        assert!(slot.batch_mut().is_filling());

        slot.batch_mut().set_time(vec![42.0]);
        slot.finish_fill();

        let batch = slot.release();
        assert!(!batch.is_filling());
        assert_eq!(batch.time().unwrap(), &[42.0]);
    }
}
