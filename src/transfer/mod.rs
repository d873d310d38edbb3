//! Streaming transfer engines.
//!
//! One state machine per transfer command: directory listing, download,
//! upload. Each owns its filesystem stream and its slice of the transfer
//! buffer, advances by at most one chunk per tick, and survives partial
//! reads and writes on both sides by keeping chunk offsets in the record.
//!
//! All three follow the same protocol shape: the stream is opened before
//! anything is promised to the client, `150` is queued only once the data
//! connection is accepted, and completion or abort closes the stream and
//! the passive resources before queueing the final reply.

mod list;
mod retr;
mod stor;

pub use list::ListTransfer;
pub use retr::RetrTransfer;
pub use stor::StorTransfer;

pub(crate) use list::{check_timeout as check_list_timeout, drive as drive_list};
pub(crate) use retr::{check_timeout as check_retr_timeout, drive as drive_retr};
pub(crate) use stor::{check_timeout as check_stor_timeout, drive as drive_stor};

use crate::data_channel::{DataChannel, PasvPhase};
use crate::error::NetError;
use crate::net::Net;

/// Lifecycle of one transfer record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TransferPhase {
    Idle,
    /// Stream opened; waiting for the client's data connection.
    WaitingAccept,
    /// `150` queued; bytes are moving.
    Streaming,
}

/// What the passive ensemble looks like to a transfer waiting for its data
/// connection.
pub(crate) enum AcceptState {
    /// Listener still open, client not connected yet.
    Wait,
    /// Data connection available.
    Ready,
    /// Passive resources are gone; the transfer cannot proceed.
    Gone,
}

pub(crate) fn accept_state<N: Net>(chan: &DataChannel<N>) -> AcceptState {
    if chan.has_conn() {
        AcceptState::Ready
    } else if chan.phase == PasvPhase::Listening {
        AcceptState::Wait
    } else {
        AcceptState::Gone
    }
}

/// Outcome of one non-blocking write attempt on the data connection.
pub(crate) enum WriteStep {
    /// `off` advanced (possibly a short write).
    Progress,
    /// Transport would block; retry next tick.
    Blocked,
    /// The data connection is gone.
    Closed,
}

/// One `Net::write` attempt of `buf[*off..len]` on the data connection.
pub(crate) fn write_some<N: Net>(
    net: &mut N,
    chan: &mut DataChannel<N>,
    buf: &[u8],
    off: &mut usize,
    len: usize,
) -> WriteStep {
    let Some(conn) = chan.conn_mut() else {
        return WriteStep::Closed;
    };
    match net.write(conn, &buf[*off..len]) {
        Ok(0) => WriteStep::Closed,
        Ok(n) => {
            *off += n;
            WriteStep::Progress
        }
        Err(NetError::WouldBlock) => WriteStep::Blocked,
        Err(_) => WriteStep::Closed,
    }
}
