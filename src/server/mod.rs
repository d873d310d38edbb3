//! The server driver.
//!
//! [`Server`] owns the control listener, the single control connection, and
//! all protocol state, and advances everything by bounded steps from
//! [`Server::tick`]. Per tick it accepts (or rejects) a control connection,
//! flushes any pending reply, maintains the passive ensemble, drives at most
//! one step of each active transfer, and finally reads and dispatches at
//! most one command line (only when no reply is pending and no transfer is
//! in flight).

mod config;
mod handlers;

pub use config::ServerConfig;

use log::{debug, info, warn};

use crate::command;
use crate::data_channel::{DataChannel, PasvPhase};
use crate::error::{NetError, SetupError};
use crate::fs::Fs;
use crate::net::Net;
use crate::reader::{LineEvent, LineReader};
use crate::reply::ReplyWriter;
use crate::session::{AuthPhase, Session};
use crate::storage::Storage;
use crate::transfer::{self, ListTransfer, RetrTransfer, StorTransfer};

/// Everything the command handlers and transfer engines operate on. Split
/// from [`Server`] so a command line borrowed from the line reader can be
/// dispatched without aliasing the rest of the state.
struct Engine<'buf, N: Net, F: Fs> {
    net: N,
    fs: F,
    config: ServerConfig,
    bind_addr: N::Addr,
    session: Session,
    cwd: Option<F::Cwd>,
    reply: ReplyWriter<'buf>,
    chan: DataChannel<N>,
    list: ListTransfer<F>,
    retr: RetrTransfer<F>,
    stor: StorTransfer<F>,
    transfer_buf: &'buf mut [u8],
    scratch: &'buf mut [u8],
    last_control_ms: u64,
    pasv_activity_ms: u64,
}

/// Single-session, passive-mode FTP protocol engine.
///
/// Parameterised over a transport and a filesystem backend and driven by
/// repeated [`Server::tick`] calls; it never blocks and owns no threads.
pub struct Server<'buf, N: Net, F: Fs> {
    listener: N::Listener,
    control: Option<N::Conn>,
    reader: LineReader<'buf>,
    engine: Engine<'buf, N, F>,
}

impl<'buf, N: Net, F: Fs> Server<'buf, N, F> {
    /// Opens the control listener on `addr` and assembles the engine around
    /// the caller-lent [`Storage`] regions.
    pub fn new(
        mut net: N,
        fs: F,
        addr: N::Addr,
        config: ServerConfig,
        storage: Storage<'buf>,
    ) -> Result<Self, SetupError> {
        storage.validate()?;
        let Storage {
            command,
            reply,
            transfer,
            scratch,
        } = storage;
        let listener = net.listen(addr)?;
        Ok(Self {
            listener,
            control: None,
            reader: LineReader::new(command),
            engine: Engine {
                net,
                fs,
                config,
                bind_addr: addr,
                session: Session::new(),
                cwd: None,
                reply: ReplyWriter::new(reply),
                chan: DataChannel::new(),
                list: ListTransfer::new(),
                retr: RetrTransfer::new(),
                stor: StorTransfer::new(),
                transfer_buf: transfer,
                scratch,
                last_control_ms: 0,
                pasv_activity_ms: 0,
            },
        })
    }

    /// True while a control connection is open.
    pub fn has_session(&self) -> bool {
        self.control.is_some()
    }

    /// The transport backend, e.g. for shutdown or inspection.
    pub fn net(&self) -> &N {
        &self.engine.net
    }

    /// The filesystem backend, e.g. for shutdown or inspection.
    pub fn fs(&self) -> &F {
        &self.engine.fs
    }

    /// One bounded unit of progress. `now_ms` must be monotonically
    /// non-decreasing and is only used for idle-timeout decisions.
    pub fn tick(&mut self, now_ms: u64) {
        self.accept_control(now_ms);
        self.check_control_timeout(now_ms);

        // Flush before anything else so the client sees each reply (or its
        // tail) before the next one is produced.
        if let Some(conn) = self.control.as_mut() {
            match self.engine.reply.flush(&mut self.engine.net, conn) {
                Ok(true) => {
                    if self.engine.session.auth == AuthPhase::Closing {
                        self.teardown_session();
                    }
                }
                Ok(false) => {}
                Err(e) => {
                    debug!("control write failed: {e}");
                    self.teardown_session();
                }
            }
        }
        if self.control.is_none() {
            return;
        }

        {
            let e = &mut self.engine;
            if e.chan.phase == PasvPhase::Closing {
                e.chan.close_all(&mut e.net);
            }
            e.check_idle(now_ms);

            let had_conn = e.chan.has_conn();
            e.chan.poll_accept(&mut e.net);
            if !had_conn && e.chan.has_conn() {
                e.pasv_activity_ms = now_ms;
            }

            transfer::drive_list(
                &mut e.list,
                &mut e.net,
                &mut e.fs,
                &mut e.chan,
                &mut e.reply,
                e.transfer_buf,
                now_ms,
            );
            transfer::drive_retr(
                &mut e.retr,
                &mut e.net,
                &mut e.fs,
                &mut e.chan,
                &mut e.reply,
                e.transfer_buf,
                now_ms,
            );
            transfer::drive_stor(
                &mut e.stor,
                &mut e.net,
                &mut e.fs,
                &mut e.chan,
                &mut e.reply,
                e.transfer_buf,
                now_ms,
            );

            if e.reply.pending() || !e.transfers_idle() {
                return;
            }
        }

        let Some(conn) = self.control.as_mut() else {
            return;
        };
        match self.reader.poll(&mut self.engine.net, conn) {
            Ok(Some(LineEvent::Line(line))) => {
                let cmd = command::parse(line);
                self.engine.last_control_ms = now_ms;
                self.engine.handle_command(cmd, now_ms);
            }
            Ok(Some(LineEvent::TooLong)) => {
                self.engine.last_control_ms = now_ms;
                self.engine.reply.queue(500, "Line too long");
            }
            Ok(None) => {}
            Err(e) => {
                debug!("control read failed: {e}");
                self.teardown_session();
            }
        }
    }

    /// One accept attempt: adopt a connection when idle, or turn a surplus
    /// one away without disturbing the live session.
    fn accept_control(&mut self, now_ms: u64) {
        match self.engine.net.accept_control(&mut self.listener) {
            Ok(conn) => {
                if self.control.is_some() {
                    warn!("rejecting surplus control connection");
                    let mut conn = conn;
                    let _ = self.engine.net.write(&mut conn, b"421 Too many users\r\n");
                    self.engine.net.close_conn(conn);
                } else {
                    info!("control connection accepted");
                    self.control = Some(conn);
                    self.reader.reset();
                    self.engine.start_session(now_ms);
                }
            }
            Err(NetError::WouldBlock) => {}
            Err(e) => debug!("control accept failed: {e}"),
        }
    }

    fn check_control_timeout(&mut self, now_ms: u64) {
        let Some(limit) = self.engine.config.control_idle_ms else {
            return;
        };
        if self.control.is_none()
            || now_ms.saturating_sub(self.engine.last_control_ms) < limit
        {
            return;
        }
        info!("control connection idle for {limit} ms, closing");
        if let Some(conn) = self.control.as_mut() {
            let _ = self.engine.net.write(conn, b"421 Timeout\r\n");
        }
        self.teardown_session();
    }

    /// Releases everything bound to the current control connection.
    fn teardown_session(&mut self) {
        info!("closing control session");
        if let Some(conn) = self.control.take() {
            self.engine.net.close_conn(conn);
        }
        self.reader.reset();
        let e = &mut self.engine;
        e.reply.reset();
        e.list.abandon(&mut e.fs);
        e.retr.abandon(&mut e.fs);
        e.stor.abandon(&mut e.fs);
        e.chan.close_all(&mut e.net);
        e.session.reset();
        e.cwd = None;
    }
}

impl<'buf, N: Net, F: Fs> Engine<'buf, N, F> {
    /// Fresh session state plus the `220` greeting for a just-accepted
    /// control connection.
    fn start_session(&mut self, now_ms: u64) {
        self.session.reset();
        self.cwd = None;
        self.reply.reset();
        self.last_control_ms = now_ms;
        self.reply.queue_fmt(220, format_args!("{}", self.config.banner));
    }

    fn transfers_idle(&self) -> bool {
        self.list.is_idle() && self.retr.is_idle() && self.stor.is_idle()
    }

    /// Idle-timeout checks for passive resources and in-flight transfers.
    /// Control-channel idleness is handled by the outer driver.
    fn check_idle(&mut self, now_ms: u64) {
        if self.reply.pending() {
            return;
        }
        let pasv_limit = self.config.pasv_idle_ms;
        let transfer_limit = self.config.transfer_idle_ms;
        transfer::check_list_timeout(
            &mut self.list,
            &mut self.net,
            &mut self.fs,
            &mut self.chan,
            &mut self.reply,
            now_ms,
            pasv_limit,
            transfer_limit,
        );
        transfer::check_retr_timeout(
            &mut self.retr,
            &mut self.net,
            &mut self.fs,
            &mut self.chan,
            &mut self.reply,
            now_ms,
            pasv_limit,
            transfer_limit,
        );
        transfer::check_stor_timeout(
            &mut self.stor,
            &mut self.net,
            &mut self.fs,
            &mut self.chan,
            &mut self.reply,
            now_ms,
            pasv_limit,
            transfer_limit,
        );

        if let Some(limit) = pasv_limit {
            if matches!(
                self.chan.phase,
                PasvPhase::Listening | PasvPhase::DataConnected
            ) && self.transfers_idle()
                && now_ms.saturating_sub(self.pasv_activity_ms) >= limit
            {
                info!("idle passive resources, closing");
                self.chan.begin_teardown();
            }
        }
    }
}
