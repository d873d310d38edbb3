//! Command dispatch and per-command handlers.
//!
//! Handlers run only when no reply is pending and no transfer is in flight,
//! so each queues exactly one reply (or arms a transfer record that will).

use std::str;

use chrono::DateTime;
use log::{debug, info, warn};

use super::Engine;
use crate::command::{Command, Verb};
use crate::data_channel::PasvPhase;
use crate::error::fs_reply;
use crate::fs::Fs;
use crate::net::Net;
use crate::session::{AuthPhase, TransferType};
use crate::util::ct_eq;

const SYNTAX_ERROR: &str = "Syntax error in parameters or arguments";
const LOCAL_ERROR: &str = "Requested action aborted: local error in processing";
const BAD_SEQUENCE: &str = "Bad sequence of commands";

impl<N: Net, F: Fs> Engine<'_, N, F> {
    /// Routes one parsed command through the auth state machine.
    pub(super) fn handle_command(&mut self, cmd: Command<'_>, now_ms: u64) {
        debug!("dispatching {:?}", cmd.verb);
        // QUIT is honoured in every phase, including mid-rename.
        if cmd.verb == Verb::Quit {
            self.cmd_quit();
            return;
        }
        match self.session.auth {
            AuthPhase::NeedUser => match cmd.verb {
                Verb::User => self.cmd_user(cmd.arg),
                _ => self.reply.queue(530, "Not logged in"),
            },
            AuthPhase::NeedPass => match cmd.verb {
                Verb::User => self.cmd_user(cmd.arg),
                Verb::Pass => self.cmd_pass(cmd.arg),
                _ => self.reply.queue(530, "Not logged in"),
            },
            AuthPhase::Authed => self.dispatch_authed(cmd, now_ms),
            // Farewell already queued; the connection closes once it flushes.
            AuthPhase::Closing => {}
        }
    }

    fn dispatch_authed(&mut self, cmd: Command<'_>, now_ms: u64) {
        if self.session.rename_pending() && cmd.verb != Verb::Rnto {
            self.reply.queue(503, BAD_SEQUENCE);
            return;
        }
        match cmd.verb {
            Verb::User | Verb::Pass => self.reply.queue(503, BAD_SEQUENCE),
            Verb::Noop => self.reply.queue(200, "OK"),
            Verb::Syst => self.reply.queue(215, "UNIX Type: L8"),
            Verb::Type => self.cmd_type(cmd.arg),
            Verb::Feat => self.cmd_feat(),
            Verb::Pasv => self.cmd_pasv(now_ms),
            Verb::List => self.cmd_list(cmd.arg, now_ms),
            Verb::Retr => self.cmd_retr(cmd.arg, now_ms),
            Verb::Stor => self.cmd_stor(cmd.arg, now_ms),
            Verb::Pwd => self.cmd_pwd(),
            Verb::Cwd => self.cmd_cwd(cmd.arg),
            Verb::Cdup => self.cmd_cdup(),
            Verb::Dele => self.cmd_dele(cmd.arg),
            Verb::Rnfr => self.cmd_rnfr(cmd.arg),
            Verb::Rnto => self.cmd_rnto(cmd.arg),
            Verb::Mkd => self.cmd_mkd(cmd.arg),
            Verb::Rmd => self.cmd_rmd(cmd.arg),
            Verb::Size => self.cmd_size(cmd.arg),
            Verb::Mdtm => self.cmd_mdtm(cmd.arg),
            Verb::Quit => {}
            Verb::Unknown => self.reply.queue(502, "Command not implemented"),
        }
    }

    // ---- authentication -------------------------------------------------

    fn cmd_user(&mut self, arg: &[u8]) {
        if arg.is_empty() {
            self.reply.queue(501, SYNTAX_ERROR);
            return;
        }
        if arg == self.config.user.as_bytes() {
            self.session.auth = AuthPhase::NeedPass;
            self.reply.queue(331, "User name okay, need password");
        } else {
            warn!("rejected unknown user");
            self.session.auth = AuthPhase::NeedUser;
            self.reply.queue(530, "Login incorrect");
        }
    }

    fn cmd_pass(&mut self, arg: &[u8]) {
        if arg.is_empty() {
            self.reply.queue(501, SYNTAX_ERROR);
            return;
        }
        if !ct_eq(arg, self.config.password.as_bytes()) {
            warn!("rejected bad password");
            self.session.auth = AuthPhase::NeedUser;
            self.reply.queue(530, "Login incorrect");
            return;
        }
        match self.fs.cwd_init() {
            Ok(cwd) => {
                self.cwd = Some(cwd);
                self.session.cwd_ready = true;
                self.session.auth = AuthPhase::Authed;
                info!("user {} logged in", self.config.user);
                self.reply.queue(230, "User logged in");
            }
            Err(e) => {
                warn!("login failed acquiring working directory: {e}");
                self.session.auth = AuthPhase::NeedUser;
                self.fs_fail(e);
            }
        }
    }

    fn cmd_quit(&mut self) {
        info!("client quit");
        self.session.auth = AuthPhase::Closing;
        self.reply.queue(221, "Bye");
    }

    // ---- session plumbing ----------------------------------------------

    fn cmd_type(&mut self, arg: &[u8]) {
        if arg.eq_ignore_ascii_case(b"I") {
            self.session.transfer_type = TransferType::Binary;
            self.reply.queue(200, "Type set to I");
        } else if arg.eq_ignore_ascii_case(b"A") {
            // Accepted for client compatibility; transfers stay binary.
            self.session.transfer_type = TransferType::Binary;
            self.reply.queue(200, "Type set to A");
        } else {
            self.reply.queue(504, "Command not implemented for that parameter");
        }
    }

    fn cmd_feat(&mut self) {
        let caps = self.fs.features();
        let mut features = [""; 4];
        let mut n = 0;
        features[n] = "TYPE I";
        n += 1;
        features[n] = "PASV";
        n += 1;
        if caps.size {
            features[n] = "SIZE";
            n += 1;
        }
        if caps.mtime {
            features[n] = "MDTM";
            n += 1;
        }
        if self.reply.try_feat(&features[..n]).is_err() {
            self.reply.queue(451, LOCAL_ERROR);
        }
    }

    fn cmd_pasv(&mut self, now_ms: u64) {
        let addr = match self.chan.open(&mut self.net, self.bind_addr) {
            Ok(addr) => addr,
            Err(e) => {
                warn!("PASV listener failed: {e}");
                self.reply.queue(425, "Can't open data connection");
                return;
            }
        };
        let tuple_len = N::format_pasv_addr(&addr, self.scratch).ok();
        let formatted = tuple_len.and_then(|n| str::from_utf8(&self.scratch[..n]).ok());
        match formatted {
            Some(tuple) => {
                self.reply
                    .queue_fmt(227, format_args!("Entering Passive Mode ({tuple})"));
            }
            None => {
                self.chan.close_all(&mut self.net);
                self.reply.queue(425, "Can't open data connection");
                return;
            }
        }
        self.pasv_activity_ms = now_ms;
    }

    // ---- transfers ------------------------------------------------------

    fn cmd_list(&mut self, arg: &[u8], now_ms: u64) {
        if !self.pasv_ready() {
            self.reply.queue(425, "Use PASV first");
            return;
        }
        let Some(cwd) = self.cwd.as_ref() else {
            self.local_error();
            return;
        };
        let path = (!arg.is_empty()).then_some(arg);
        match self.fs.dir_open(cwd, path) {
            Ok(iter) => {
                debug!("LIST started");
                self.list.begin(iter, now_ms);
            }
            Err(e) => self.fs_fail(e),
        }
    }

    fn cmd_retr(&mut self, arg: &[u8], now_ms: u64) {
        if !self.pasv_ready() {
            self.reply.queue(425, "Use PASV first");
            return;
        }
        if !self.require_arg(arg) {
            return;
        }
        let Some(cwd) = self.cwd.as_ref() else {
            self.local_error();
            return;
        };
        match self.fs.open_read(cwd, arg) {
            Ok(file) => {
                debug!("RETR started");
                self.retr.begin(file, now_ms);
            }
            Err(e) => self.fs_fail(e),
        }
    }

    fn cmd_stor(&mut self, arg: &[u8], now_ms: u64) {
        if !self.pasv_ready() {
            self.reply.queue(425, "Use PASV first");
            return;
        }
        if !self.require_arg(arg) {
            return;
        }
        let Some(cwd) = self.cwd.as_ref() else {
            self.local_error();
            return;
        };
        match self.fs.open_write(cwd, arg) {
            Ok(file) => {
                debug!("STOR started");
                self.stor.begin(file, now_ms);
            }
            Err(e) => self.fs_fail(e),
        }
    }

    // ---- directory and file commands ------------------------------------

    fn cmd_pwd(&mut self) {
        let Some(cwd) = self.cwd.as_ref() else {
            self.local_error();
            return;
        };
        match self.fs.cwd_pwd(cwd, self.scratch) {
            Ok(path) => match str::from_utf8(path) {
                Ok(path) => {
                    if self
                        .reply
                        .try_fmt(257, format_args!("\"{path}\""))
                        .is_err()
                    {
                        self.reply.queue(451, LOCAL_ERROR);
                    }
                }
                Err(_) => self.reply.queue(451, LOCAL_ERROR),
            },
            Err(e) => self.fs_fail(e),
        }
    }

    fn cmd_cwd(&mut self, arg: &[u8]) {
        if !self.require_arg(arg) {
            return;
        }
        let Some(cwd) = self.cwd.as_mut() else {
            self.local_error();
            return;
        };
        match self.fs.cwd_change(cwd, arg) {
            Ok(()) => self.reply.queue(250, "Directory successfully changed"),
            Err(e) => self.fs_fail(e),
        }
    }

    fn cmd_cdup(&mut self) {
        let Some(cwd) = self.cwd.as_mut() else {
            self.local_error();
            return;
        };
        match self.fs.cwd_up(cwd) {
            Ok(()) => self.reply.queue(250, "Directory successfully changed"),
            Err(e) => self.fs_fail(e),
        }
    }

    fn cmd_dele(&mut self, arg: &[u8]) {
        if !self.require_arg(arg) {
            return;
        }
        let Some(cwd) = self.cwd.as_ref() else {
            self.local_error();
            return;
        };
        match self.fs.remove(cwd, arg) {
            Ok(()) => self.reply.queue(250, "Delete operation successful"),
            Err(e) => self.fs_fail(e),
        }
    }

    fn cmd_rnfr(&mut self, arg: &[u8]) {
        if !self.require_arg(arg) {
            return;
        }
        match self.session.set_rename_from(arg) {
            Ok(()) => self.reply.queue(350, "Ready for RNTO"),
            Err(()) => self
                .reply
                .queue(553, "Requested action not taken. File name not allowed"),
        }
    }

    fn cmd_rnto(&mut self, arg: &[u8]) {
        if !self.session.rename_pending() {
            self.reply.queue(503, BAD_SEQUENCE);
            return;
        }
        // A missing argument is a syntax error, not a sequencing error: the
        // pending rename survives it.
        if arg.is_empty() {
            self.reply.queue(501, SYNTAX_ERROR);
            return;
        }
        let Some(cwd) = self.cwd.as_ref() else {
            self.local_error();
            return;
        };
        let renamed = self.fs.rename(cwd, self.session.rename_from(), arg);
        self.session.clear_rename();
        match renamed {
            Ok(()) => self.reply.queue(250, "Rename successful"),
            Err(e) => self.fs_fail(e),
        }
    }

    fn cmd_mkd(&mut self, arg: &[u8]) {
        if !self.fs.features().make_dir {
            self.reply.queue(502, "Command not implemented");
            return;
        }
        if !self.require_arg(arg) {
            return;
        }
        let Some(cwd) = self.cwd.as_ref() else {
            self.local_error();
            return;
        };
        match self.fs.make_dir(cwd, arg) {
            Ok(()) => {
                let path = String::from_utf8_lossy(arg);
                self.reply.queue_fmt(257, format_args!("\"{path}\""));
            }
            Err(e) => self.fs_fail(e),
        }
    }

    fn cmd_rmd(&mut self, arg: &[u8]) {
        if !self.fs.features().remove_dir {
            self.reply.queue(502, "Command not implemented");
            return;
        }
        if !self.require_arg(arg) {
            return;
        }
        let Some(cwd) = self.cwd.as_ref() else {
            self.local_error();
            return;
        };
        match self.fs.remove_dir(cwd, arg) {
            Ok(()) => self.reply.queue(250, "Directory removed"),
            Err(e) => self.fs_fail(e),
        }
    }

    fn cmd_size(&mut self, arg: &[u8]) {
        if !self.fs.features().size {
            self.reply.queue(502, "Command not implemented");
            return;
        }
        if !self.require_arg(arg) {
            return;
        }
        let Some(cwd) = self.cwd.as_ref() else {
            self.local_error();
            return;
        };
        match self.fs.file_size(cwd, arg) {
            Ok(size) => self.reply.queue_fmt(213, format_args!("{size}")),
            Err(e) => self.fs_fail(e),
        }
    }

    fn cmd_mdtm(&mut self, arg: &[u8]) {
        if !self.fs.features().mtime {
            self.reply.queue(502, "Command not implemented");
            return;
        }
        if !self.require_arg(arg) {
            return;
        }
        let Some(cwd) = self.cwd.as_ref() else {
            self.local_error();
            return;
        };
        match self.fs.file_mtime(cwd, arg) {
            Ok(secs) => match DateTime::from_timestamp(secs, 0).filter(|_| secs >= 0) {
                Some(when) => self
                    .reply
                    .queue_fmt(213, format_args!("{}", when.format("%Y%m%d%H%M%S"))),
                None => self.reply.queue(451, LOCAL_ERROR),
            },
            Err(e) => self.fs_fail(e),
        }
    }

    // ---- shared bits -----------------------------------------------------

    fn pasv_ready(&self) -> bool {
        !matches!(self.chan.phase, PasvPhase::Idle | PasvPhase::Closing)
    }

    fn require_arg(&mut self, arg: &[u8]) -> bool {
        if arg.is_empty() {
            self.reply.queue(501, SYNTAX_ERROR);
            return false;
        }
        true
    }

    fn fs_fail(&mut self, e: crate::error::FsError) {
        let (code, text) = fs_reply(e);
        debug!("filesystem operation failed: {e} -> {code}");
        self.reply.queue(code, text);
    }

    fn local_error(&mut self) {
        self.reply.queue(451, LOCAL_ERROR);
    }
}
