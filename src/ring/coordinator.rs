//! Ring occupancy, horizon queues and the selection snapshot
//!
//! `RingCore` is the pure state of the producer/consumer handoff. It does no
//! locking or waiting of its own; the interchange owns one instance behind
//! its single mutex and drives these operations from inside its predicate
//! loops. Keeping the state transitions lock-free here is what makes them
//! testable without threads.
//!
//! Capacity and ordering violations are protocol bugs, never environmental
//! failures, and abort via assertion.

use std::collections::VecDeque;

use crate::position::SubchunkPosition;
use crate::selection::ChannelSelection;

use super::slot::Slot;

/// Reserved chunk-horizon entry meaning "no more chunks".
const NO_MORE_CHUNKS: u64 = u64::MAX;

/// State of the bounded handoff ring.
///
/// Besides the slot FIFO itself, the core keeps the two "horizon" queues:
/// every coordinate the worker has committed to produce, in production order.
/// The consumer uses them to ask "will chunk N ever start" one step ahead of
/// the bulk data, which is how chunk and sweep boundaries become knowable
/// before the corresponding batch has been pulled through the ring.
#[derive(Debug)]
pub struct RingCore {
    max_buffers: usize,
    queue: VecDeque<Slot>,
    valid_chunks: VecDeque<u64>,
    valid_subchunks: VecDeque<SubchunkPosition>,
    channel_selection: ChannelSelection,
}

impl RingCore {
    /// Create a ring bounded at `max_buffers` slots
    pub fn new(max_buffers: usize) -> Self {
        assert!(max_buffers >= 1, "ring needs at least one buffer");
        Self {
            max_buffers,
            queue: VecDeque::with_capacity(max_buffers),
            valid_chunks: VecDeque::new(),
            valid_subchunks: VecDeque::new(),
            channel_selection: ChannelSelection::new(),
        }
    }

    /// The configured capacity
    pub fn max_buffers(&self) -> usize {
        self.max_buffers
    }

    /// Slots currently queued
    pub fn occupancy(&self) -> usize {
        self.queue.len()
    }

    /// Whether a fill may begin without violating the bound
    pub fn fill_can_start(&self) -> bool {
        self.queue.len() < self.max_buffers
    }

    /// Create an empty slot for `position` and commit the coordinate to both
    /// horizon queues.
    ///
    /// The caller must have established capacity through the wait protocol;
    /// this re-asserts it as a fatal check. The horizon entries stay even if
    /// the caller subsequently discards the slot, so a consumer already
    /// waiting on this coordinate still observes that it was attempted.
    pub fn begin_fill(&mut self, position: SubchunkPosition) -> Slot {
        assert!(
            self.fill_can_start(),
            "ring overflow: fill started at {} with {} of {} slots occupied",
            position,
            self.queue.len(),
            self.max_buffers
        );
        if position.is_chunk_origin() {
            self.valid_chunks.push_back(position.chunk);
        }
        self.valid_subchunks.push_back(position);
        Slot::new(position)
    }

    /// Queue a filled slot
    pub fn complete_fill(&mut self, mut slot: Slot) {
        slot.finish_fill();
        self.queue.push_back(slot);
        assert!(
            self.queue.len() <= self.max_buffers,
            "ring overflow: {} slots queued, capacity {}",
            self.queue.len(),
            self.max_buffers
        );
    }

    /// Whether a queued slot is available to read
    pub fn read_can_start(&self) -> bool {
        !self.queue.is_empty()
    }

    /// Pop the front slot, which must carry exactly `position`.
    ///
    /// The consumer requests coordinates in the exact order the worker filled
    /// them; a mismatch means the protocol itself is broken.
    pub fn take_front(&mut self, position: SubchunkPosition) -> Slot {
        let slot = self
            .queue
            .pop_front()
            .unwrap_or_else(|| panic!("read started at {} on an empty ring", position));
        assert!(
            slot.position() == position,
            "out-of-order read: ring front is {}, consumer asked for {}",
            slot.position(),
            position
        );
        slot
    }

    /// Answer "will chunk `chunk` ever start", if the horizon can say yet.
    ///
    /// Entries below the query are consumed; the horizon only moves forward.
    /// `None` means the caller must wait for the worker to commit more
    /// coordinates (possibly because the discard emptied the queue).
    pub fn chunk_horizon_answer(&mut self, chunk: u64) -> Option<bool> {
        while self
            .valid_chunks
            .front()
            .is_some_and(|&front| front < chunk)
        {
            self.valid_chunks.pop_front();
        }
        self.valid_chunks.front().map(|&front| front == chunk)
    }

    /// Answer "will subchunk `position` ever appear", if the horizon can say
    /// yet. Same discard semantics as [`chunk_horizon_answer`](Self::chunk_horizon_answer).
    pub fn subchunk_horizon_answer(&mut self, position: SubchunkPosition) -> Option<bool> {
        while self
            .valid_subchunks
            .front()
            .is_some_and(|&front| front < position)
        {
            self.valid_subchunks.pop_front();
        }
        self.valid_subchunks.front().map(|&front| front == position)
    }

    /// Commit the end-of-sweep sentinel to both horizons
    pub fn set_no_more_data(&mut self) {
        self.valid_chunks.push_back(NO_MORE_CHUNKS);
        self.valid_subchunks.push_back(SubchunkPosition::NO_MORE_DATA);
    }

    /// Drop every queued slot and both horizons; idempotent
    pub fn reset_data(&mut self) {
        self.queue.clear();
        self.valid_chunks.clear();
        self.valid_subchunks.clear();
    }

    /// Store the selection snapshot published by the worker
    pub fn store_channel_selection(&mut self, selection: ChannelSelection) {
        self.channel_selection = selection;
    }

    /// Copy out the last published selection snapshot
    pub fn channel_selection(&self) -> ChannelSelection {
        self.channel_selection.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill(core: &mut RingCore, chunk: u64, subchunk: u64) {
        let slot = core.begin_fill(SubchunkPosition::new(chunk, subchunk));
        core.complete_fill(slot);
    }

    #[test]
    fn test_fifo_delivery_in_fill_order() {
        let mut core = RingCore::new(3);
        fill(&mut core, 0, 0);
        fill(&mut core, 0, 1);
        fill(&mut core, 1, 0);
        assert_eq!(core.occupancy(), 3);
        assert!(!core.fill_can_start());

        for expected in [
            SubchunkPosition::new(0, 0),
            SubchunkPosition::new(0, 1),
            SubchunkPosition::new(1, 0),
        ] {
            let slot = core.take_front(expected);
            assert_eq!(slot.position(), expected);
        }
        assert_eq!(core.occupancy(), 0);
        assert!(!core.read_can_start());
    }

    #[test]
    #[should_panic(expected = "ring overflow")]
    fn test_overflow_is_fatal() {
        let mut core = RingCore::new(1);
        fill(&mut core, 0, 0);
        // Second fill without a read violates the bound
        core.begin_fill(SubchunkPosition::new(0, 1));
    }

    #[test]
    #[should_panic(expected = "out-of-order read")]
    fn test_coordinate_mismatch_is_fatal() {
        let mut core = RingCore::new(2);
        fill(&mut core, 0, 0);
        fill(&mut core, 0, 1);
        core.take_front(SubchunkPosition::new(0, 1));
    }

    #[test]
    fn test_chunk_horizon_only_records_chunk_origins() {
        let mut core = RingCore::new(8);
        fill(&mut core, 0, 0);
        fill(&mut core, 0, 1);
        fill(&mut core, 1, 0);
        assert_eq!(core.chunk_horizon_answer(0), Some(true));
        assert_eq!(core.chunk_horizon_answer(1), Some(true));
        // Chunk 0's entry was consumed by the query for 1
        assert_eq!(core.chunk_horizon_answer(2), None);
    }

    #[test]
    fn test_subchunk_horizon_discards_lesser_entries() {
        let mut core = RingCore::new(8);
        fill(&mut core, 0, 0);
        fill(&mut core, 0, 1);
        fill(&mut core, 0, 2);

        // Query ahead pops everything below it
        assert_eq!(
            core.subchunk_horizon_answer(SubchunkPosition::new(0, 2)),
            Some(true)
        );
        // Monotonic: the same query keeps answering without new entries
        assert_eq!(
            core.subchunk_horizon_answer(SubchunkPosition::new(0, 2)),
            Some(true)
        );
        // Beyond the horizon there is no answer yet
        assert_eq!(
            core.subchunk_horizon_answer(SubchunkPosition::new(0, 3)),
            None
        );
    }

    #[test]
    fn test_sentinel_answers_no_to_real_coordinates() {
        let mut core = RingCore::new(2);
        fill(&mut core, 0, 0);
        core.set_no_more_data();

        assert_eq!(
            core.subchunk_horizon_answer(SubchunkPosition::new(0, 0)),
            Some(true)
        );
        // After the real entries are consumed, the sentinel says "never"
        assert_eq!(
            core.subchunk_horizon_answer(SubchunkPosition::new(0, 1)),
            Some(false)
        );
        assert_eq!(core.chunk_horizon_answer(1), Some(false));
        // The sentinel itself remains queryable
        assert_eq!(
            core.subchunk_horizon_answer(SubchunkPosition::NO_MORE_DATA),
            Some(true)
        );
    }

    #[test]
    fn test_reset_clears_everything_and_is_idempotent() {
        let mut core = RingCore::new(2);
        fill(&mut core, 0, 0);
        fill(&mut core, 0, 1);
        core.set_no_more_data();

        core.reset_data();
        assert_eq!(core.occupancy(), 0);
        assert_eq!(core.chunk_horizon_answer(0), None);
        assert_eq!(
            core.subchunk_horizon_answer(SubchunkPosition::ORIGIN),
            None
        );

        core.reset_data();
        assert_eq!(core.occupancy(), 0);
        assert!(core.fill_can_start());
    }

    #[test]
    fn test_discarded_slot_keeps_horizon_entries() {
        let mut core = RingCore::new(1);
        let slot = core.begin_fill(SubchunkPosition::ORIGIN);
        // Fill abandoned (termination observed); the slot is dropped without
        // complete_fill but the coordinate stays answerable
        drop(slot);
        assert_eq!(
            core.subchunk_horizon_answer(SubchunkPosition::ORIGIN),
            Some(true)
        );
        assert_eq!(core.occupancy(), 0);
    }

    #[test]
    fn test_selection_snapshot_round_trip() {
        let mut core = RingCore::new(1);
        assert!(core.channel_selection().is_empty());
        let mut sel = ChannelSelection::new();
        sel.add_window(1, 4, 8, 8, 2);
        core.store_channel_selection(sel.clone());
        assert_eq!(core.channel_selection(), sel);
    }
}
