//! Filesystem contract.
//!
//! The engine performs every filesystem side effect through this trait.
//! Paths cross the boundary as raw bytes, exactly as they arrived on the
//! wire; the backend is responsible for sandboxing and for rejecting NUL
//! bytes. Optional operations have default bodies returning
//! [`FsError::Unsupported`] and are advertised through [`Fs::features`].

use crate::error::FsError;

/// What kind of entry a directory iterator yielded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
}

/// One directory entry. Borrows from the iterator and is valid only until
/// the next `dir_next` call.
#[derive(Debug, Clone, Copy)]
pub struct DirEntry<'a> {
    pub name: &'a [u8],
    pub kind: EntryKind,
    pub size: Option<u64>,
    /// Seconds since the Unix epoch, when the backend tracks it.
    pub mtime: Option<i64>,
}

/// Optional capabilities a backend may expose.
///
/// Drives `FEAT` advertising and the 502 gating of `MKD`/`RMD`/`SIZE`/`MDTM`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FsFeatures {
    pub make_dir: bool,
    pub remove_dir: bool,
    pub size: bool,
    pub mtime: bool,
}

/// Capability contract for the filesystem backend.
pub trait Fs {
    /// Handle on the session's current directory.
    type Cwd;
    /// An open directory iteration.
    type DirIter;
    /// An open file read stream.
    type FileRead;
    /// An open truncating file write stream.
    type FileWrite;

    /// Acquires a current-directory handle rooted at the backend's root.
    fn cwd_init(&mut self) -> Result<Self::Cwd, FsError>;

    /// Writes the absolute current-directory path into `out` and returns the
    /// filled prefix.
    fn cwd_pwd<'a>(
        &mut self,
        cwd: &Self::Cwd,
        out: &'a mut [u8],
    ) -> Result<&'a [u8], FsError>;

    /// Changes the current directory; `path` may be relative or absolute.
    fn cwd_change(&mut self, cwd: &mut Self::Cwd, path: &[u8]) -> Result<(), FsError>;

    /// Moves the current directory one level up.
    fn cwd_up(&mut self, cwd: &mut Self::Cwd) -> Result<(), FsError>;

    /// Opens a directory iteration at the current directory, or at `path`
    /// when given.
    fn dir_open(
        &mut self,
        cwd: &Self::Cwd,
        path: Option<&[u8]>,
    ) -> Result<Self::DirIter, FsError>;

    /// Yields the next entry, or `None` when exhausted. The entry is valid
    /// only until the next call on the same iterator.
    fn dir_next<'a>(
        &mut self,
        iter: &'a mut Self::DirIter,
    ) -> Result<Option<DirEntry<'a>>, FsError>;

    /// Releases a directory iteration.
    fn dir_close(&mut self, iter: Self::DirIter);

    /// Opens `path` for reading.
    fn open_read(&mut self, cwd: &Self::Cwd, path: &[u8]) -> Result<Self::FileRead, FsError>;

    /// Opens `path` for writing, truncating any existing file.
    fn open_write(&mut self, cwd: &Self::Cwd, path: &[u8])
        -> Result<Self::FileWrite, FsError>;

    /// Reads into `buf`. `Ok(0)` means end of file.
    fn read_file(&mut self, file: &mut Self::FileRead, buf: &mut [u8])
        -> Result<usize, FsError>;

    /// Writes from `data`. Short writes are permitted; callers treat `Ok(0)`
    /// as a local error.
    fn write_file(&mut self, file: &mut Self::FileWrite, data: &[u8])
        -> Result<usize, FsError>;

    /// Releases a read stream.
    fn close_read(&mut self, file: Self::FileRead);

    /// Releases a write stream. Whether a partially-written file is kept,
    /// truncated, or removed is backend policy.
    fn close_write(&mut self, file: Self::FileWrite);

    /// Deletes a file.
    fn remove(&mut self, cwd: &Self::Cwd, path: &[u8]) -> Result<(), FsError>;

    /// Renames `from` to `to`.
    fn rename(&mut self, cwd: &Self::Cwd, from: &[u8], to: &[u8]) -> Result<(), FsError>;

    /// Reports which optional operations the backend implements.
    fn features(&self) -> FsFeatures {
        FsFeatures::default()
    }

    /// Creates a directory. Optional.
    fn make_dir(&mut self, _cwd: &Self::Cwd, _path: &[u8]) -> Result<(), FsError> {
        Err(FsError::Unsupported)
    }

    /// Removes an empty directory. Optional.
    fn remove_dir(&mut self, _cwd: &Self::Cwd, _path: &[u8]) -> Result<(), FsError> {
        Err(FsError::Unsupported)
    }

    /// Reports a file's size in bytes. Optional.
    fn file_size(&mut self, _cwd: &Self::Cwd, _path: &[u8]) -> Result<u64, FsError> {
        Err(FsError::Unsupported)
    }

    /// Reports a file's modification time in seconds since the Unix epoch.
    /// Optional.
    fn file_mtime(&mut self, _cwd: &Self::Cwd, _path: &[u8]) -> Result<i64, FsError> {
        Err(FsError::Unsupported)
    }
}
