//! Buffer sizing constants.
//!
//! The engine runs entirely out of four caller-owned byte regions (see
//! [`crate::storage::Storage`]). These constants are the minimum and default
//! sizes for each region.

/// Minimum length of the command-line staging buffer.
pub const COMMAND_MIN: usize = 1024;
/// Minimum length of the reply formatting buffer.
pub const REPLY_MIN: usize = 1024;
/// Minimum length of the transfer chunk buffer.
pub const TRANSFER_MIN: usize = 4096;
/// Minimum length of the scratch region.
pub const SCRATCH_MIN: usize = 1024;

/// Default command buffer size.
pub const COMMAND_DEFAULT: usize = 1024;
/// Default reply buffer size.
pub const REPLY_DEFAULT: usize = 1024;
/// Default transfer buffer size.
pub const TRANSFER_DEFAULT: usize = 8192;
/// Default scratch size.
pub const SCRATCH_DEFAULT: usize = 1024;

/// Longest path the session will hold on to (pending `RNFR` argument).
pub const PATH_MAX: usize = 512;
