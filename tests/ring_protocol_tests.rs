//! Cross-thread tests for the interchange protocol
//! Tests focused on FIFO hand-off, backpressure, horizon answers and the
//! failure/termination/reset paths between a producer and a consumer thread

use std::{
    sync::{Arc, Barrier, Mutex},
    thread,
    time::Duration,
};

use outrider::{
    columns::ColumnId,
    config::LookaheadConfig,
    error::OutriderError,
    interchange::{Interchange, SweepDirective},
    position::SubchunkPosition,
    stats::ThreadTimes,
    write::{WriteCommand, WriteOp},
};

#[cfg(test)]
mod ring_protocol_tests {
    use super::*;

    fn interchange_with(buffers: usize) -> Arc<Interchange> {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let config = LookaheadConfig::default().with_ring_buffers(buffers);
        Arc::new(Interchange::new(&config))
    }

    /// Fill one slot with a time payload derived from its position
    fn produce(interchange: &Interchange, position: SubchunkPosition) -> bool {
        let wait_begin = ThreadTimes::now();
        let Some(mut slot) = interchange.fill_start(position, &wait_begin) else {
            return false;
        };
        let stamp = (position.chunk * 1000 + position.subchunk) as f64;
        slot.batch_mut().set_time(vec![stamp]);
        interchange.fill_complete(slot);
        true
    }

    /// Test: batches cross threads strictly FIFO with their payloads intact
    #[test]
    fn fifo_handoff_across_threads() {
        let interchange = interchange_with(2);
        let positions = [
            SubchunkPosition::new(0, 0),
            SubchunkPosition::new(0, 1),
            SubchunkPosition::new(0, 2),
            SubchunkPosition::new(1, 0),
            SubchunkPosition::new(1, 1),
        ];

        let producer = {
            let interchange = interchange.clone();
            thread::spawn(move || {
                for position in positions {
                    if !produce(&interchange, position) {
                        return;
                    }
                }
                interchange.set_no_more_data();
            })
        };

        for position in positions {
            assert!(interchange.is_valid_subchunk(position).unwrap());
            let batch = interchange.read_start(position).unwrap();
            let stamp = (position.chunk * 1000 + position.subchunk) as f64;
            assert_eq!(batch.time().unwrap(), &[stamp]);
            interchange.read_complete(position);
        }

        // Past the sentinel nothing is valid
        assert!(!interchange
            .is_valid_subchunk(SubchunkPosition::new(1, 2))
            .unwrap());
        assert!(!interchange.is_valid_chunk(2).unwrap());
        producer.join().unwrap();
    }

    /// Test: a fast producer never holds more slots than the ring allows
    #[test]
    fn occupancy_stays_within_capacity() {
        let capacity = 3;
        let interchange = interchange_with(capacity);
        let total = 24;
        let barrier = Arc::new(Barrier::new(2));

        let producer = {
            let interchange = interchange.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                for subchunk in 0..total {
                    if !produce(&interchange, SubchunkPosition::new(0, subchunk)) {
                        return;
                    }
                }
                interchange.set_no_more_data();
            })
        };

        barrier.wait();
        for subchunk in 0..total {
            let position = SubchunkPosition::new(0, subchunk);
            assert!(interchange.is_valid_subchunk(position).unwrap());
            assert!(interchange.occupancy() <= capacity);
            let batch = interchange.read_start(position).unwrap();
            assert!(batch.time().is_ok());
            interchange.read_complete(position);
            // Let the producer run ahead so backpressure actually engages
            if subchunk % 5 == 0 {
                thread::sleep(Duration::from_millis(1));
            }
        }
        producer.join().unwrap();
    }

    /// Test: a single-slot ring alternates one fill, one read
    #[test]
    fn capacity_one_ring_alternates() {
        let interchange = interchange_with(1);
        let total = 8;

        let producer = {
            let interchange = interchange.clone();
            thread::spawn(move || {
                for subchunk in 0..total {
                    if !produce(&interchange, SubchunkPosition::new(0, subchunk)) {
                        return;
                    }
                }
                interchange.set_no_more_data();
            })
        };

        for subchunk in 0..total {
            let position = SubchunkPosition::new(0, subchunk);
            assert!(interchange.is_valid_subchunk(position).unwrap());
            assert!(interchange.occupancy() <= 1);
            let batch = interchange.read_start(position).unwrap();
            let stamp = subchunk as f64;
            assert_eq!(batch.time().unwrap(), &[stamp]);
            interchange.read_complete(position);
        }
        assert!(!interchange
            .is_valid_subchunk(SubchunkPosition::new(0, total))
            .unwrap());
        producer.join().unwrap();
    }

    /// Test: horizon queries answer without consuming ring slots
    #[test]
    fn horizon_answers_leave_slots_queued() {
        let interchange = interchange_with(4);
        produce(&interchange, SubchunkPosition::new(0, 0));
        produce(&interchange, SubchunkPosition::new(0, 1));
        produce(&interchange, SubchunkPosition::new(1, 0));
        interchange.set_no_more_data();

        // Ask far ahead first; earlier entries are discarded, slots are not
        assert!(interchange
            .is_valid_subchunk(SubchunkPosition::new(1, 0))
            .unwrap());
        assert!(interchange.is_valid_chunk(1).unwrap());
        assert!(!interchange.is_valid_chunk(7).unwrap());
        assert_eq!(interchange.occupancy(), 3);

        // The slot queue still delivers everything in fill order
        for position in [
            SubchunkPosition::new(0, 0),
            SubchunkPosition::new(0, 1),
            SubchunkPosition::new(1, 0),
        ] {
            let batch = interchange.read_start(position).unwrap();
            assert!(batch.time().is_ok());
            interchange.read_complete(position);
        }
        assert_eq!(interchange.occupancy(), 0);
    }

    /// Test: a recorded worker failure wakes a reader blocked on an empty ring
    #[test]
    fn worker_failure_wakes_blocked_reader() {
        let interchange = interchange_with(2);
        let barrier = Arc::new(Barrier::new(2));

        let consumer = {
            let interchange = interchange.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                interchange.read_start(SubchunkPosition::new(0, 0))
            })
        };

        barrier.wait();
        // Give the consumer time to actually block
        thread::sleep(Duration::from_millis(20));
        interchange.record_worker_failure(Some(ColumnId::Observed), "disk vanished");

        let result = consumer.join().unwrap();
        let err = result.err().expect("reader should fail, not deliver");
        assert!(matches!(
            err,
            OutriderError::WorkerFailed {
                column: Some(ColumnId::Observed),
                ..
            }
        ));
        assert!(err.to_string().contains("observed"));
    }

    /// Test: terminating the session fails a blocked reader with Terminated
    #[test]
    fn termination_fails_blocked_reader() {
        let interchange = interchange_with(2);
        let barrier = Arc::new(Barrier::new(2));

        let consumer = {
            let interchange = interchange.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                interchange.read_start(SubchunkPosition::new(0, 0))
            })
        };

        barrier.wait();
        thread::sleep(Duration::from_millis(20));
        interchange.terminate_lookahead();

        let result = consumer.join().unwrap();
        assert!(matches!(result, Err(OutriderError::Terminated)));
    }

    /// Test: the reset handshake drains every queued write before completing
    #[test]
    fn reset_handshake_drains_writes_first() {
        let interchange = interchange_with(2);
        produce(&interchange, SubchunkPosition::new(0, 0));
        interchange.enqueue_write(WriteCommand::new(
            SubchunkPosition::new(0, 0),
            WriteOp::FlagRow(vec![true, false]),
        ));
        interchange.enqueue_write(WriteCommand::new(
            SubchunkPosition::new(0, 0),
            WriteOp::Weight(vec![0.5, 0.25]),
        ));

        let drained = Arc::new(Mutex::new(Vec::new()));
        let barrier = Arc::new(Barrier::new(2));

        // Stand-in for the worker's directive loop
        let worker = {
            let interchange = interchange.clone();
            let drained = drained.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                loop {
                    match interchange.sweep_directive() {
                        SweepDirective::DrainWrites => {
                            while let Some(command) = interchange.dequeue_write() {
                                drained.lock().unwrap().push(command.to_string());
                            }
                        }
                        SweepDirective::Reset => {
                            interchange.accept_reset();
                            return;
                        }
                        SweepDirective::Terminate => return,
                    }
                }
            })
        };

        barrier.wait();
        interchange.request_sweep_reset().unwrap();
        worker.join().unwrap();

        // Writes went out before the reset was accepted, and the ring is clean
        assert_eq!(drained.lock().unwrap().len(), 2);
        assert_eq!(interchange.write_queue_len(), 0);
        assert_eq!(interchange.occupancy(), 0);
        assert!(!interchange.sweep_termination_requested());
    }
}
