//! Transport contract.
//!
//! The engine never touches OS sockets directly; it drives a backend through
//! this trait. Every operation is expected to be non-blocking: an operation
//! that cannot proceed returns [`NetError::WouldBlock`] and the engine retries
//! on a later tick. Short reads and writes are normal.

use crate::error::NetError;

/// Capability contract for the control and data transports.
///
/// Backends declare the concrete listener, connection, and address types.
/// Closing takes resources by value, so a close cannot be repeated on the
/// same handle and drop-based cleanup stays possible.
pub trait Net {
    /// Listener for inbound control connections.
    type Listener;
    /// Listener for passive-mode data connections.
    type PasvListener;
    /// An established connection, control or data.
    type Conn;
    /// A transport address. `Copy` so the engine can stash the bind address
    /// and reuse it as the PASV bind hint.
    type Addr: Copy;

    /// Opens the control listener on a caller-chosen address.
    fn listen(&mut self, addr: Self::Addr) -> Result<Self::Listener, NetError>;

    /// Accepts one control connection, without blocking.
    fn accept_control(&mut self, listener: &mut Self::Listener) -> Result<Self::Conn, NetError>;

    /// Opens a passive-mode listener. `hint` carries the local control
    /// address when the backend wants to bind the same interface.
    fn pasv_listen(&mut self, hint: Option<Self::Addr>)
        -> Result<Self::PasvListener, NetError>;

    /// Reports the local address a passive listener is bound to, for the
    /// `227` reply.
    fn pasv_local_addr(&mut self, listener: &Self::PasvListener)
        -> Result<Self::Addr, NetError>;

    /// Accepts one data connection, without blocking.
    fn accept_data(&mut self, listener: &mut Self::PasvListener)
        -> Result<Self::Conn, NetError>;

    /// Reads into `buf`. `Ok(0)` on an open connection means the peer shut
    /// down its write side and is treated as end-of-stream by callers.
    fn read(&mut self, conn: &mut Self::Conn, buf: &mut [u8]) -> Result<usize, NetError>;

    /// Writes from `buf`. Short writes are permitted; `Ok(0)` is treated as
    /// a closed connection by callers.
    fn write(&mut self, conn: &mut Self::Conn, buf: &[u8]) -> Result<usize, NetError>;

    /// Closes a connection.
    fn close_conn(&mut self, conn: Self::Conn);

    /// Closes a passive listener.
    fn close_pasv_listener(&mut self, listener: Self::PasvListener);

    /// Formats `addr` as the `h1,h2,h3,h4,p1,p2` ASCII tuple of the `227`
    /// reply (`p1` is the high byte of the port). Returns the number of
    /// bytes written into `out`.
    fn format_pasv_addr(addr: &Self::Addr, out: &mut [u8]) -> Result<usize, NetError>;
}
