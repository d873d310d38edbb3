//! Directory listing transfer.

use std::fmt::Write as _;

use log::{info, warn};

use crate::data_channel::DataChannel;
use crate::error::{fs_reply, FsError};
use crate::fs::{DirEntry, EntryKind, Fs};
use crate::net::Net;
use crate::reply::ReplyWriter;
use crate::transfer::{accept_state, write_some, AcceptState, TransferPhase, WriteStep};
use crate::util::BufCursor;

/// State of an in-flight `LIST`.
pub struct ListTransfer<F: Fs> {
    phase: TransferPhase,
    iter: Option<F::DirIter>,
    line_len: usize,
    line_off: usize,
    exhausted: bool,
    pub(crate) last_activity_ms: u64,
}

impl<F: Fs> Default for ListTransfer<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Fs> ListTransfer<F> {
    pub fn new() -> Self {
        Self {
            phase: TransferPhase::Idle,
            iter: None,
            line_len: 0,
            line_off: 0,
            exhausted: false,
            last_activity_ms: 0,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.phase == TransferPhase::Idle
    }

    /// Arms the record with an opened directory iteration.
    pub(crate) fn begin(&mut self, iter: F::DirIter, now_ms: u64) {
        self.phase = TransferPhase::WaitingAccept;
        self.iter = Some(iter);
        self.line_len = 0;
        self.line_off = 0;
        self.exhausted = false;
        self.last_activity_ms = now_ms;
    }

    /// Releases the stream without touching the control channel, for
    /// session teardown.
    pub(crate) fn abandon(&mut self, fs: &mut F) {
        if let Some(iter) = self.iter.take() {
            fs.dir_close(iter);
        }
        self.clear();
    }

    fn clear(&mut self) {
        self.phase = TransferPhase::Idle;
        self.line_len = 0;
        self.line_off = 0;
        self.exhausted = false;
    }
}

/// Formats one listing line:
/// `<mode> 1 owner group <size> Jan 01 00:00 <name>\r\n`.
fn format_entry(entry: &DirEntry<'_>, buf: &mut [u8]) -> Result<usize, FsError> {
    let mode = match entry.kind {
        EntryKind::Dir => "drwxr-xr-x",
        EntryKind::File => "-rw-r--r--",
    };
    let size = entry.size.unwrap_or(0);
    let mut w = BufCursor::new(buf);
    write!(w, "{mode} 1 owner group {size} Jan 01 00:00 ")
        .and_then(|()| w.push_bytes(entry.name))
        .and_then(|()| w.push_bytes(b"\r\n"))
        .map_err(|_| FsError::Io)?;
    Ok(w.len())
}

enum IterStep {
    Staged(usize),
    Exhausted,
    Fail(FsError),
}

/// Advances an active `LIST` by at most one chunk.
pub(crate) fn drive<N: Net, F: Fs>(
    t: &mut ListTransfer<F>,
    net: &mut N,
    fs: &mut F,
    chan: &mut DataChannel<N>,
    reply: &mut ReplyWriter<'_>,
    buf: &mut [u8],
    now_ms: u64,
) {
    if t.phase == TransferPhase::Idle || reply.pending() {
        return;
    }
    match t.phase {
        TransferPhase::WaitingAccept => match accept_state(chan) {
            AcceptState::Wait => {}
            AcceptState::Gone => {
                abort(t, net, fs, chan, reply, 425, "Can't open data connection");
            }
            AcceptState::Ready => {
                reply.queue(150, "Here comes the directory listing");
                chan.begin_transfer();
                t.phase = TransferPhase::Streaming;
                t.last_activity_ms = now_ms;
            }
        },
        TransferPhase::Streaming => stream(t, net, fs, chan, reply, buf, now_ms),
        TransferPhase::Idle => {}
    }
}

fn stream<N: Net, F: Fs>(
    t: &mut ListTransfer<F>,
    net: &mut N,
    fs: &mut F,
    chan: &mut DataChannel<N>,
    reply: &mut ReplyWriter<'_>,
    buf: &mut [u8],
    now_ms: u64,
) {
    if t.line_off < t.line_len {
        match write_some(net, chan, buf, &mut t.line_off, t.line_len) {
            WriteStep::Progress => {
                t.last_activity_ms = now_ms;
                if t.line_off == t.line_len {
                    t.line_off = 0;
                    t.line_len = 0;
                }
            }
            WriteStep::Blocked => {}
            WriteStep::Closed => {
                abort(t, net, fs, chan, reply, 426, "Connection closed; transfer aborted");
            }
        }
        return;
    }

    if !t.exhausted {
        let step = match t.iter.as_mut() {
            Some(iter) => match fs.dir_next(iter) {
                Ok(Some(entry)) => match format_entry(&entry, buf) {
                    Ok(n) => IterStep::Staged(n),
                    Err(e) => IterStep::Fail(e),
                },
                Ok(None) => IterStep::Exhausted,
                Err(e) => IterStep::Fail(e),
            },
            None => IterStep::Fail(FsError::Io),
        };
        match step {
            IterStep::Staged(n) => {
                t.line_len = n;
                t.line_off = 0;
                t.last_activity_ms = now_ms;
                return;
            }
            IterStep::Exhausted => t.exhausted = true,
            IterStep::Fail(e) => {
                let (code, text) = fs_reply(e);
                abort(t, net, fs, chan, reply, code, text);
                return;
            }
        }
    }

    // Exhausted with nothing left to flush.
    if let Some(iter) = t.iter.take() {
        fs.dir_close(iter);
    }
    chan.close_all(net);
    reply.queue(226, "Directory send OK");
    t.clear();
    info!("directory listing sent");
}

/// Aborts the transfer when its idle limit is exceeded: 425 while still
/// waiting for the data connection, 426 once streaming.
#[allow(clippy::too_many_arguments)]
pub(crate) fn check_timeout<N: Net, F: Fs>(
    t: &mut ListTransfer<F>,
    net: &mut N,
    fs: &mut F,
    chan: &mut DataChannel<N>,
    reply: &mut ReplyWriter<'_>,
    now_ms: u64,
    pasv_limit: Option<u64>,
    transfer_limit: Option<u64>,
) {
    let (limit, code, text) = match t.phase {
        TransferPhase::Idle => return,
        TransferPhase::WaitingAccept => (pasv_limit, 425, "Can't open data connection"),
        TransferPhase::Streaming => {
            (transfer_limit, 426, "Connection closed; transfer aborted")
        }
    };
    if let Some(limit) = limit {
        if now_ms.saturating_sub(t.last_activity_ms) >= limit {
            abort(t, net, fs, chan, reply, code, text);
        }
    }
}

fn abort<N: Net, F: Fs>(
    t: &mut ListTransfer<F>,
    net: &mut N,
    fs: &mut F,
    chan: &mut DataChannel<N>,
    reply: &mut ReplyWriter<'_>,
    code: u16,
    text: &str,
) {
    warn!("LIST aborted: {code} {text}");
    if let Some(iter) = t.iter.take() {
        fs.dir_close(iter);
    }
    chan.close_all(net);
    reply.queue(code, text);
    t.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_line_for_directory() {
        let mut buf = [0u8; 128];
        let entry = DirEntry {
            name: b"docs",
            kind: EntryKind::Dir,
            size: None,
            mtime: None,
        };
        let n = format_entry(&entry, &mut buf).unwrap();
        assert_eq!(&buf[..n], b"drwxr-xr-x 1 owner group 0 Jan 01 00:00 docs\r\n");
    }

    #[test]
    fn entry_line_for_file_with_size() {
        let mut buf = [0u8; 128];
        let entry = DirEntry {
            name: b"readme.txt",
            kind: EntryKind::File,
            size: Some(123),
            mtime: None,
        };
        let n = format_entry(&entry, &mut buf).unwrap();
        assert_eq!(
            &buf[..n],
            b"-rw-r--r-- 1 owner group 123 Jan 01 00:00 readme.txt\r\n"
        );
    }

    #[test]
    fn entry_line_overflow_is_io() {
        let mut buf = [0u8; 16];
        let entry = DirEntry {
            name: b"a-rather-long-name.bin",
            kind: EntryKind::File,
            size: Some(1),
            mtime: None,
        };
        assert_eq!(format_entry(&entry, &mut buf), Err(FsError::Io));
    }
}
