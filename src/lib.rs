//! Embeddable single-session FTP server engine.
//!
//! The engine speaks the FTP control protocol over one passive-mode session
//! and advances by repeated calls to [`Server::tick`]: it never blocks,
//! tolerates short reads and writes everywhere, and owns no threads. All
//! I/O goes through two capability contracts ([`Net`] for the transport,
//! [`Fs`] for the filesystem) and all working memory is lent by the caller
//! through [`Storage`].
//!
//! ```
//! use tickftp::mock::{addr, MockFs, MockNet};
//! use tickftp::{Server, ServerConfig, Storage};
//!
//! let mut command = [0u8; 1024];
//! let mut reply = [0u8; 1024];
//! let mut transfer = [0u8; 4096];
//! let mut scratch = [0u8; 1024];
//! let storage = Storage {
//!     command: &mut command,
//!     reply: &mut reply,
//!     transfer: &mut transfer,
//!     scratch: &mut scratch,
//! };
//!
//! let fs = MockFs::new().file("/readme.txt", b"hello");
//! let mut server = Server::new(
//!     MockNet::new(),
//!     fs,
//!     addr(127, 0, 0, 1, 2121),
//!     ServerConfig::new("test", "secret"),
//!     storage,
//! )
//! .unwrap();
//!
//! // The embedder calls tick from its event loop with a monotonic clock.
//! server.tick(0);
//! ```

pub mod command;
pub mod data_channel;
pub mod error;
pub mod fs;
pub mod limits;
pub mod mock;
pub mod net;
pub mod reader;
pub mod reply;
pub mod session;
mod server;
pub mod storage;
pub mod transfer;
mod util;

pub use error::{FsError, NetError, ReplyError, SetupError};
pub use fs::{DirEntry, EntryKind, Fs, FsFeatures};
pub use net::Net;
pub use server::{Server, ServerConfig};
pub use storage::Storage;
