//! Deterministic in-memory backends.
//!
//! Scripted [`Net`](crate::net::Net) and [`Fs`](crate::fs::Fs)
//! implementations used by the test suite, and usable as embedded backends
//! where a real transport or filesystem is overkill. Every would-block,
//! short read, short write, and error is scripted, so partial-I/O schedules
//! replay exactly.

mod fs;
mod net;

pub use fs::{MockCwd, MockDirIter, MockFileRead, MockFileWrite, MockFs};
pub use net::{addr, MockConn, MockListener, MockNet, MockPasvListener};
