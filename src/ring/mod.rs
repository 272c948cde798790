//! Bounded buffer ring between the sweep worker and the consumer

pub mod coordinator;
pub mod slot;

pub use coordinator::RingCore;
pub use slot::Slot;
