//! Per-connection session state.
//!
//! Created when a control connection is accepted, reset when it goes away.
//! Only the server driver mutates it.

use crate::limits::PATH_MAX;

/// Where the session is in the login conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPhase {
    /// Waiting for `USER`.
    NeedUser,
    /// Username accepted, waiting for `PASS`.
    NeedPass,
    /// Logged in.
    Authed,
    /// `QUIT` accepted; the connection closes once the farewell is flushed.
    Closing,
}

/// Representation type for transfers. Binary only; `TYPE A` is accepted for
/// client compatibility but transfers stay image-mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferType {
    Binary,
}

/// Session state for the single control connection.
pub struct Session {
    pub auth: AuthPhase,
    pub transfer_type: TransferType,
    /// True once a current-directory handle has been acquired.
    pub cwd_ready: bool,
    rename_from: [u8; PATH_MAX],
    rename_from_len: usize,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            auth: AuthPhase::NeedUser,
            transfer_type: TransferType::Binary,
            cwd_ready: false,
            rename_from: [0; PATH_MAX],
            rename_from_len: 0,
        }
    }

    /// Back to the initial state, dropping any pending rename.
    pub fn reset(&mut self) {
        self.auth = AuthPhase::NeedUser;
        self.transfer_type = TransferType::Binary;
        self.cwd_ready = false;
        self.rename_from_len = 0;
    }

    /// True between an accepted `RNFR` and the `RNTO` that consumes it.
    pub fn rename_pending(&self) -> bool {
        self.rename_from_len > 0
    }

    /// Stores the `RNFR` argument. Fails when the path exceeds the bounded
    /// rename buffer.
    pub fn set_rename_from(&mut self, path: &[u8]) -> Result<(), ()> {
        if path.is_empty() || path.len() > PATH_MAX {
            return Err(());
        }
        self.rename_from[..path.len()].copy_from_slice(path);
        self.rename_from_len = path.len();
        Ok(())
    }

    /// The pending rename source, empty when none is pending.
    pub fn rename_from(&self) -> &[u8] {
        &self.rename_from[..self.rename_from_len]
    }

    pub fn clear_rename(&mut self) {
        self.rename_from_len = 0;
    }
}
