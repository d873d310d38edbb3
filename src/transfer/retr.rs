//! File download transfer.

use log::{info, warn};

use crate::data_channel::DataChannel;
use crate::error::{fs_reply, FsError};
use crate::fs::Fs;
use crate::net::Net;
use crate::reply::ReplyWriter;
use crate::transfer::{accept_state, write_some, AcceptState, TransferPhase, WriteStep};

/// State of an in-flight `RETR`.
pub struct RetrTransfer<F: Fs> {
    phase: TransferPhase,
    file: Option<F::FileRead>,
    chunk_len: usize,
    chunk_off: usize,
    eof: bool,
    pub(crate) last_activity_ms: u64,
}

impl<F: Fs> Default for RetrTransfer<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Fs> RetrTransfer<F> {
    pub fn new() -> Self {
        Self {
            phase: TransferPhase::Idle,
            file: None,
            chunk_len: 0,
            chunk_off: 0,
            eof: false,
            last_activity_ms: 0,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.phase == TransferPhase::Idle
    }

    /// Arms the record with an opened read stream.
    pub(crate) fn begin(&mut self, file: F::FileRead, now_ms: u64) {
        self.phase = TransferPhase::WaitingAccept;
        self.file = Some(file);
        self.chunk_len = 0;
        self.chunk_off = 0;
        self.eof = false;
        self.last_activity_ms = now_ms;
    }

    /// Releases the stream without touching the control channel.
    pub(crate) fn abandon(&mut self, fs: &mut F) {
        if let Some(file) = self.file.take() {
            fs.close_read(file);
        }
        self.clear();
    }

    fn clear(&mut self) {
        self.phase = TransferPhase::Idle;
        self.chunk_len = 0;
        self.chunk_off = 0;
        self.eof = false;
    }
}

/// Advances an active `RETR` by at most one read/write pair.
pub(crate) fn drive<N: Net, F: Fs>(
    t: &mut RetrTransfer<F>,
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
                reply.queue(150, "Opening data connection");
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
    t: &mut RetrTransfer<F>,
    net: &mut N,
    fs: &mut F,
    chan: &mut DataChannel<N>,
    reply: &mut ReplyWriter<'_>,
    buf: &mut [u8],
    now_ms: u64,
) {
    // Stage the next chunk from the file when nothing is in flight.
    if t.chunk_off == t.chunk_len && !t.eof {
        let read = match t.file.as_mut() {
            Some(file) => fs.read_file(file, buf),
            None => Err(FsError::Io),
        };
        match read {
            Ok(0) => t.eof = true,
            Ok(n) => {
                t.chunk_len = n;
                t.chunk_off = 0;
                t.last_activity_ms = now_ms;
            }
            Err(e) => {
                let (code, text) = fs_reply(e);
                abort(t, net, fs, chan, reply, code, text);
                return;
            }
        }
    }

    // One write attempt for whatever is staged.
    if t.chunk_off < t.chunk_len {
        match write_some(net, chan, buf, &mut t.chunk_off, t.chunk_len) {
            WriteStep::Progress => {
                t.last_activity_ms = now_ms;
                if t.chunk_off == t.chunk_len {
                    t.chunk_off = 0;
                    t.chunk_len = 0;
                }
            }
            WriteStep::Blocked => {}
            WriteStep::Closed => {
                abort(t, net, fs, chan, reply, 426, "Connection closed; transfer aborted");
            }
        }
        return;
    }

    if t.eof {
        if let Some(file) = t.file.take() {
            fs.close_read(file);
        }
        chan.close_all(net);
        reply.queue(226, "Closing data connection");
        t.clear();
        info!("file sent");
    }
}

/// Aborts the transfer when its idle limit is exceeded: 425 while still
/// waiting for the data connection, 426 once streaming.
#[allow(clippy::too_many_arguments)]
pub(crate) fn check_timeout<N: Net, F: Fs>(
    t: &mut RetrTransfer<F>,
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
    t: &mut RetrTransfer<F>,
    net: &mut N,
    fs: &mut F,
    chan: &mut DataChannel<N>,
    reply: &mut ReplyWriter<'_>,
    code: u16,
    text: &str,
) {
    warn!("RETR aborted: {code} {text}");
    if let Some(file) = t.file.take() {
        fs.close_read(file);
    }
    chan.close_all(net);
    reply.queue(code, text);
    t.clear();
}
