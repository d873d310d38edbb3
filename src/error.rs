//! Error types consumed and produced by the engine.
//!
//! Transport and filesystem backends report failures through [`NetError`] and
//! [`FsError`]; the engine converts them into FTP replies at the handler that
//! owns the relevant protocol context. The uniform filesystem mapping lives
//! in [`fs_reply`].

use thiserror::Error;

/// Transport error kinds the engine consumes.
///
/// `WouldBlock` is the cooperative-retry signal and is never surfaced to the
/// client; `Closed` tears down the owning scope.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum NetError {
    #[error("operation would block")]
    WouldBlock,
    #[error("connection closed")]
    Closed,
    #[error("operation timed out")]
    Timeout,
    #[error("address unavailable")]
    AddrUnavailable,
    #[error("network I/O error")]
    Io,
}

/// Filesystem error kinds the engine consumes.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    #[error("file not found")]
    NotFound,
    #[error("not a directory")]
    NotDir,
    #[error("is a directory")]
    IsDir,
    #[error("file exists")]
    Exists,
    #[error("permission denied")]
    PermissionDenied,
    #[error("invalid path")]
    InvalidPath,
    #[error("insufficient storage space")]
    NoSpace,
    #[error("read-only filesystem")]
    ReadOnly,
    #[error("filesystem I/O error")]
    Io,
    #[error("operation not supported by backend")]
    Unsupported,
}

/// Reply-formatting failures.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ReplyError {
    /// A reply is already staged and not yet fully flushed.
    #[error("a reply is already pending")]
    Busy,
    /// The formatted reply did not fit the reply buffer.
    #[error("reply too long for buffer")]
    Overflow,
}

/// Construction-time failures of [`crate::Server`].
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("{region} buffer too small: {got} bytes, need at least {min}")]
    BufferTooSmall {
        region: &'static str,
        got: usize,
        min: usize,
    },
    #[error("control listener: {0}")]
    Listen(#[from] NetError),
}

/// Maps a filesystem error onto the reply that every path-based command and
/// transfer abort uses for it.
pub fn fs_reply(err: FsError) -> (u16, &'static str) {
    match err {
        FsError::InvalidPath => (553, "Requested action not taken. File name not allowed"),
        FsError::NoSpace => (452, "Insufficient storage space"),
        FsError::Io => (451, "Requested action aborted: local error in processing"),
        FsError::PermissionDenied | FsError::ReadOnly => (550, "Permission denied"),
        FsError::NotFound => (550, "File not found"),
        FsError::Exists => (550, "File exists"),
        FsError::Unsupported => (502, "Command not implemented"),
        FsError::NotDir | FsError::IsDir => (550, "Requested action not taken"),
    }
}
