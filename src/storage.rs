//! Caller-owned working memory.
//!
//! The engine performs no allocation of its own: the embedder lends four
//! disjoint byte regions for the server's lifetime. Each region has a
//! minimum size (see [`crate::limits`]) checked at construction.

use crate::error::SetupError;
use crate::limits;

/// The four byte regions the engine works out of.
///
/// `command` stages inbound control lines, `reply` stages outbound replies,
/// `transfer` shuttles payload bytes between the filesystem and the data
/// connection, and `scratch` holds per-command temporaries (nothing staged
/// in scratch survives the command handler that produced it).
pub struct Storage<'a> {
    pub command: &'a mut [u8],
    pub reply: &'a mut [u8],
    pub transfer: &'a mut [u8],
    pub scratch: &'a mut [u8],
}

impl<'a> Storage<'a> {
    /// Checks every region against its minimum size.
    pub fn validate(&self) -> Result<(), SetupError> {
        check("command", self.command.len(), limits::COMMAND_MIN)?;
        check("reply", self.reply.len(), limits::REPLY_MIN)?;
        check("transfer", self.transfer.len(), limits::TRANSFER_MIN)?;
        check("scratch", self.scratch.len(), limits::SCRATCH_MIN)?;
        Ok(())
    }
}

fn check(region: &'static str, got: usize, min: usize) -> Result<(), SetupError> {
    if got < min {
        return Err(SetupError::BufferTooSmall { region, got, min });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_sizes_validate() {
        let mut command = vec![0u8; limits::COMMAND_DEFAULT];
        let mut reply = vec![0u8; limits::REPLY_DEFAULT];
        let mut transfer = vec![0u8; limits::TRANSFER_DEFAULT];
        let mut scratch = vec![0u8; limits::SCRATCH_DEFAULT];
        let storage = Storage {
            command: &mut command,
            reply: &mut reply,
            transfer: &mut transfer,
            scratch: &mut scratch,
        };
        assert!(storage.validate().is_ok());
    }

    #[test]
    fn undersized_region_is_rejected() {
        let mut command = vec![0u8; limits::COMMAND_MIN];
        let mut reply = vec![0u8; limits::REPLY_MIN];
        let mut transfer = vec![0u8; 16];
        let mut scratch = vec![0u8; limits::SCRATCH_MIN];
        let storage = Storage {
            command: &mut command,
            reply: &mut reply,
            transfer: &mut transfer,
            scratch: &mut scratch,
        };
        let err = storage.validate().unwrap_err();
        assert!(matches!(
            err,
            SetupError::BufferTooSmall { region: "transfer", .. }
        ));
    }
}
