//! Infrastructure adapters: clocks and the storage backends.

pub mod clock;
pub mod db;
pub mod memory;

pub use clock::{Clock, FixedClock, SystemClock};
pub use db::PostgresStore;
pub use memory::MemoryStore;
