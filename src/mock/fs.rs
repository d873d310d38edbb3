//! In-memory filesystem double.

use std::collections::BTreeMap;

use crate::error::FsError;
use crate::fs::{DirEntry, EntryKind, Fs, FsFeatures};

#[derive(Debug, Clone)]
enum Node {
    File { data: Vec<u8>, mtime: i64 },
    Dir,
}

/// Current-directory handle: an absolute, normalized path.
#[derive(Debug, Clone)]
pub struct MockCwd {
    path: String,
}

struct OwnedEntry {
    name: String,
    kind: EntryKind,
    size: Option<u64>,
    mtime: Option<i64>,
}

/// Directory iteration: a sorted snapshot taken at open time.
pub struct MockDirIter {
    entries: Vec<OwnedEntry>,
    at: usize,
}

#[derive(Debug, PartialEq)]
pub struct MockFileRead {
    data: Vec<u8>,
    pos: usize,
}

pub struct MockFileWrite {
    path: String,
}

/// In-memory tree with per-path error injection and byte-capped streaming.
///
/// Bytes written through an open write stream land in the tree immediately,
/// so a transfer aborted mid-upload leaves the prefix written so far (the
/// "release the handle only" cleanup policy).
pub struct MockFs {
    nodes: BTreeMap<String, Node>,
    errors: BTreeMap<String, FsError>,
    read_cap: usize,
    write_cap: usize,
    features: FsFeatures,
    cwd_init_error: Option<FsError>,
}

impl Default for MockFs {
    fn default() -> Self {
        Self::new()
    }
}

impl MockFs {
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert("/".to_string(), Node::Dir);
        Self {
            nodes,
            errors: BTreeMap::new(),
            read_cap: 0,
            write_cap: 0,
            features: FsFeatures {
                make_dir: true,
                remove_dir: true,
                size: true,
                mtime: true,
            },
            cwd_init_error: None,
        }
    }

    /// Adds a file (and any missing parent directories).
    pub fn file(mut self, path: &str, data: &[u8]) -> Self {
        self.ensure_parents(path);
        self.nodes.insert(
            path.to_string(),
            Node::File {
                data: data.to_vec(),
                mtime: 0,
            },
        );
        self
    }

    /// Adds a directory (and any missing parents).
    pub fn dir(mut self, path: &str) -> Self {
        self.ensure_parents(path);
        self.nodes.insert(path.to_string(), Node::Dir);
        self
    }

    /// Any operation resolving to `path` fails with `error`.
    pub fn error(mut self, path: &str, error: FsError) -> Self {
        self.errors.insert(path.to_string(), error);
        self
    }

    /// Caps how many bytes each `read_file` call returns.
    pub fn read_cap(mut self, cap: usize) -> Self {
        self.read_cap = cap;
        self
    }

    /// Caps how many bytes each `write_file` call accepts.
    pub fn write_cap(mut self, cap: usize) -> Self {
        self.write_cap = cap;
        self
    }

    /// Drops every optional capability (`MKD`/`RMD`/`SIZE`/`MDTM`).
    pub fn without_optional(mut self) -> Self {
        self.features = FsFeatures::default();
        self
    }

    /// Makes `cwd_init` fail, for login-failure tests.
    pub fn fail_cwd_init(mut self, error: FsError) -> Self {
        self.cwd_init_error = Some(error);
        self
    }

    /// Sets a file's modification time.
    pub fn mtime(mut self, path: &str, secs: i64) -> Self {
        if let Some(Node::File { mtime, .. }) = self.nodes.get_mut(path) {
            *mtime = secs;
        }
        self
    }

    /// Current content of a file, for assertions.
    pub fn file_contents(&self, path: &str) -> Option<Vec<u8>> {
        match self.nodes.get(path) {
            Some(Node::File { data, .. }) => Some(data.clone()),
            _ => None,
        }
    }

    /// Whether any node exists at `path`.
    pub fn contains(&self, path: &str) -> bool {
        self.nodes.contains_key(path)
    }

    fn ensure_parents(&mut self, path: &str) {
        let mut at = String::new();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            let parent = if at.is_empty() { "/".to_string() } else { at.clone() };
            self.nodes.entry(parent).or_insert(Node::Dir);
            at.push('/');
            at.push_str(segment);
        }
    }

    /// Resolves `path` against `base` into an absolute normalized path.
    /// `..` never escapes the root.
    fn resolve(&self, base: &str, path: &[u8]) -> Result<String, FsError> {
        if path.contains(&0) {
            return Err(FsError::InvalidPath);
        }
        let path = std::str::from_utf8(path).map_err(|_| FsError::InvalidPath)?;
        let mut segments: Vec<&str> = if path.starts_with('/') {
            Vec::new()
        } else {
            base.split('/').filter(|s| !s.is_empty()).collect()
        };
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            match segment {
                "." => {}
                ".." => {
                    segments.pop();
                }
                other => segments.push(other),
            }
        }
        if segments.is_empty() {
            return Ok("/".to_string());
        }
        let mut resolved = String::new();
        for segment in segments {
            resolved.push('/');
            resolved.push_str(segment);
        }
        Ok(resolved)
    }

    fn checked(&self, base: &str, path: &[u8]) -> Result<String, FsError> {
        let resolved = self.resolve(base, path)?;
        if let Some(e) = self.errors.get(&resolved) {
            return Err(*e);
        }
        Ok(resolved)
    }

    fn parent_of(path: &str) -> &str {
        match path.rfind('/') {
            Some(0) | None => "/",
            Some(at) => &path[..at],
        }
    }

    fn children(&self, dir: &str) -> Vec<(String, &Node)> {
        self.nodes
            .iter()
            .filter(|(path, _)| path.as_str() != "/" && Self::parent_of(path) == dir)
            .map(|(path, node)| {
                let name = path.rsplit('/').next().unwrap_or(path).to_string();
                (name, node)
            })
            .collect()
    }
}

impl Fs for MockFs {
    type Cwd = MockCwd;
    type DirIter = MockDirIter;
    type FileRead = MockFileRead;
    type FileWrite = MockFileWrite;

    fn cwd_init(&mut self) -> Result<MockCwd, FsError> {
        if let Some(e) = self.cwd_init_error {
            return Err(e);
        }
        Ok(MockCwd {
            path: "/".to_string(),
        })
    }

    fn cwd_pwd<'a>(&mut self, cwd: &MockCwd, out: &'a mut [u8]) -> Result<&'a [u8], FsError> {
        let bytes = cwd.path.as_bytes();
        if bytes.len() > out.len() {
            return Err(FsError::Io);
        }
        out[..bytes.len()].copy_from_slice(bytes);
        Ok(&out[..bytes.len()])
    }

    fn cwd_change(&mut self, cwd: &mut MockCwd, path: &[u8]) -> Result<(), FsError> {
        let resolved = self.checked(&cwd.path, path)?;
        match self.nodes.get(&resolved) {
            Some(Node::Dir) => {
                cwd.path = resolved;
                Ok(())
            }
            Some(Node::File { .. }) => Err(FsError::NotDir),
            None => Err(FsError::NotFound),
        }
    }

    fn cwd_up(&mut self, cwd: &mut MockCwd) -> Result<(), FsError> {
        cwd.path = Self::parent_of(&cwd.path.clone()).to_string();
        Ok(())
    }

    fn dir_open(&mut self, cwd: &MockCwd, path: Option<&[u8]>) -> Result<MockDirIter, FsError> {
        let resolved = match path {
            Some(path) => self.checked(&cwd.path, path)?,
            None => {
                if let Some(e) = self.errors.get(&cwd.path) {
                    return Err(*e);
                }
                cwd.path.clone()
            }
        };
        match self.nodes.get(&resolved) {
            Some(Node::Dir) => {}
            Some(Node::File { .. }) => return Err(FsError::NotDir),
            None => return Err(FsError::NotFound),
        }
        let entries = self
            .children(&resolved)
            .into_iter()
            .map(|(name, node)| match node {
                Node::File { data, mtime } => OwnedEntry {
                    name,
                    kind: EntryKind::File,
                    size: Some(data.len() as u64),
                    mtime: Some(*mtime),
                },
                Node::Dir => OwnedEntry {
                    name,
                    kind: EntryKind::Dir,
                    size: None,
                    mtime: None,
                },
            })
            .collect();
        Ok(MockDirIter { entries, at: 0 })
    }

    fn dir_next<'a>(&mut self, iter: &'a mut MockDirIter) -> Result<Option<DirEntry<'a>>, FsError> {
        let Some(entry) = iter.entries.get(iter.at) else {
            return Ok(None);
        };
        iter.at += 1;
        Ok(Some(DirEntry {
            name: entry.name.as_bytes(),
            kind: entry.kind,
            size: entry.size,
            mtime: entry.mtime,
        }))
    }

    fn dir_close(&mut self, _iter: MockDirIter) {}

    fn open_read(&mut self, cwd: &MockCwd, path: &[u8]) -> Result<MockFileRead, FsError> {
        let resolved = self.checked(&cwd.path, path)?;
        match self.nodes.get(&resolved) {
            Some(Node::File { data, .. }) => Ok(MockFileRead {
                data: data.clone(),
                pos: 0,
            }),
            Some(Node::Dir) => Err(FsError::IsDir),
            None => Err(FsError::NotFound),
        }
    }

    fn open_write(&mut self, cwd: &MockCwd, path: &[u8]) -> Result<MockFileWrite, FsError> {
        let resolved = self.checked(&cwd.path, path)?;
        match self.nodes.get(&resolved) {
            Some(Node::Dir) => return Err(FsError::IsDir),
            Some(Node::File { .. }) | None => {}
        }
        match self.nodes.get(Self::parent_of(&resolved)) {
            Some(Node::Dir) => {}
            Some(Node::File { .. }) => return Err(FsError::NotDir),
            None => return Err(FsError::NotFound),
        }
        // Truncate on open.
        self.nodes.insert(
            resolved.clone(),
            Node::File {
                data: Vec::new(),
                mtime: 0,
            },
        );
        Ok(MockFileWrite { path: resolved })
    }

    fn read_file(&mut self, file: &mut MockFileRead, buf: &mut [u8]) -> Result<usize, FsError> {
        let remaining = file.data.len() - file.pos;
        let mut n = remaining.min(buf.len());
        if self.read_cap > 0 {
            n = n.min(self.read_cap);
        }
        buf[..n].copy_from_slice(&file.data[file.pos..file.pos + n]);
        file.pos += n;
        Ok(n)
    }

    fn write_file(&mut self, file: &mut MockFileWrite, data: &[u8]) -> Result<usize, FsError> {
        let mut n = data.len();
        if self.write_cap > 0 {
            n = n.min(self.write_cap);
        }
        match self.nodes.get_mut(&file.path) {
            Some(Node::File { data: stored, .. }) => {
                stored.extend_from_slice(&data[..n]);
                Ok(n)
            }
            _ => Err(FsError::Io),
        }
    }

    fn close_read(&mut self, _file: MockFileRead) {}

    fn close_write(&mut self, _file: MockFileWrite) {}

    fn remove(&mut self, cwd: &MockCwd, path: &[u8]) -> Result<(), FsError> {
        let resolved = self.checked(&cwd.path, path)?;
        match self.nodes.get(&resolved) {
            Some(Node::File { .. }) => {
                self.nodes.remove(&resolved);
                Ok(())
            }
            Some(Node::Dir) => Err(FsError::IsDir),
            None => Err(FsError::NotFound),
        }
    }

    fn rename(&mut self, cwd: &MockCwd, from: &[u8], to: &[u8]) -> Result<(), FsError> {
        let from = self.checked(&cwd.path, from)?;
        let to = self.checked(&cwd.path, to)?;
        if !self.nodes.contains_key(&from) {
            return Err(FsError::NotFound);
        }
        if self.nodes.contains_key(&to) {
            return Err(FsError::Exists);
        }
        match self.nodes.get(Self::parent_of(&to)) {
            Some(Node::Dir) => {}
            _ => return Err(FsError::NotFound),
        }
        // Move the node plus, for directories, everything below it.
        let moved: Vec<(String, Node)> = self
            .nodes
            .iter()
            .filter(|(path, _)| {
                path.as_str() == from || path.starts_with(&format!("{from}/"))
            })
            .map(|(path, node)| (path.clone(), node.clone()))
            .collect();
        for (path, node) in moved {
            self.nodes.remove(&path);
            let renamed = format!("{to}{}", &path[from.len()..]);
            self.nodes.insert(renamed, node);
        }
        Ok(())
    }

    fn features(&self) -> FsFeatures {
        self.features
    }

    fn make_dir(&mut self, cwd: &MockCwd, path: &[u8]) -> Result<(), FsError> {
        if !self.features.make_dir {
            return Err(FsError::Unsupported);
        }
        let resolved = self.checked(&cwd.path, path)?;
        if self.nodes.contains_key(&resolved) {
            return Err(FsError::Exists);
        }
        match self.nodes.get(Self::parent_of(&resolved)) {
            Some(Node::Dir) => {}
            _ => return Err(FsError::NotFound),
        }
        self.nodes.insert(resolved, Node::Dir);
        Ok(())
    }

    fn remove_dir(&mut self, cwd: &MockCwd, path: &[u8]) -> Result<(), FsError> {
        if !self.features.remove_dir {
            return Err(FsError::Unsupported);
        }
        let resolved = self.checked(&cwd.path, path)?;
        match self.nodes.get(&resolved) {
            Some(Node::Dir) => {}
            Some(Node::File { .. }) => return Err(FsError::NotDir),
            None => return Err(FsError::NotFound),
        }
        if !self.children(&resolved).is_empty() {
            return Err(FsError::IsDir);
        }
        self.nodes.remove(&resolved);
        Ok(())
    }

    fn file_size(&mut self, cwd: &MockCwd, path: &[u8]) -> Result<u64, FsError> {
        if !self.features.size {
            return Err(FsError::Unsupported);
        }
        let resolved = self.checked(&cwd.path, path)?;
        match self.nodes.get(&resolved) {
            Some(Node::File { data, .. }) => Ok(data.len() as u64),
            Some(Node::Dir) => Err(FsError::IsDir),
            None => Err(FsError::NotFound),
        }
    }

    fn file_mtime(&mut self, cwd: &MockCwd, path: &[u8]) -> Result<i64, FsError> {
        if !self.features.mtime {
            return Err(FsError::Unsupported);
        }
        let resolved = self.checked(&cwd.path, path)?;
        match self.nodes.get(&resolved) {
            Some(Node::File { mtime, .. }) => Ok(*mtime),
            Some(Node::Dir) => Err(FsError::IsDir),
            None => Err(FsError::NotFound),
        }
    }
}
