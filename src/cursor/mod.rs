//! Sequential dataset cursor contracts and the in-memory reference table

pub mod synthetic;
pub mod traits;

pub use synthetic::{SyntheticCursor, SyntheticTable};
pub use traits::{TableCursor, WritableCursor};
