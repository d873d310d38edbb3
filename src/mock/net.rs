//! Scripted transport double.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt::Write as _;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::rc::Rc;

use crate::error::NetError;
use crate::net::Net;
use crate::util::BufCursor;

/// Shorthand for building test addresses.
pub fn addr(a: u8, b: u8, c: u8, d: u8, port: u16) -> SocketAddrV4 {
    SocketAddrV4::new(Ipv4Addr::new(a, b, c, d), port)
}

#[derive(Debug)]
enum RecvStep {
    Data(Vec<u8>),
    WouldBlock,
    /// Would-block forever (sticky).
    Stall,
    Eof,
}

#[derive(Debug)]
enum SendStep {
    /// Accept at most this many bytes.
    Limit(usize),
    WouldBlock,
    /// Would-block forever (sticky).
    Stall,
    Closed,
}

/// A scripted connection. Reads consume the receive script in order; writes
/// land in a shared capture buffer the test keeps a handle on.
pub struct MockConn {
    rx: VecDeque<RecvStep>,
    tx: Rc<RefCell<Vec<u8>>>,
    send_script: VecDeque<SendStep>,
}

impl Default for MockConn {
    fn default() -> Self {
        Self::new()
    }
}

impl MockConn {
    pub fn new() -> Self {
        Self {
            rx: VecDeque::new(),
            tx: Rc::new(RefCell::new(Vec::new())),
            send_script: VecDeque::new(),
        }
    }

    /// Queues inbound bytes. Reads drain a chunk across as many calls as
    /// the caller's buffer requires, so one chunk is also how tests shape
    /// partial reads.
    pub fn recv(mut self, bytes: &[u8]) -> Self {
        self.rx.push_back(RecvStep::Data(bytes.to_vec()));
        self
    }

    /// Queues one would-block read result.
    pub fn recv_would_block(mut self) -> Self {
        self.rx.push_back(RecvStep::WouldBlock);
        self
    }

    /// Makes the read side report end-of-stream once the script is drained
    /// to this point (sticky).
    pub fn recv_eof(mut self) -> Self {
        self.rx.push_back(RecvStep::Eof);
        self
    }

    /// Makes the read side would-block forever from this point on.
    pub fn recv_stalled(mut self) -> Self {
        self.rx.push_back(RecvStep::Stall);
        self
    }

    /// Makes the write side would-block forever from this point on.
    pub fn write_stalled(mut self) -> Self {
        self.send_script.push_back(SendStep::Stall);
        self
    }

    /// Caps the next write at `n` bytes.
    pub fn write_limit(mut self, n: usize) -> Self {
        self.send_script.push_back(SendStep::Limit(n));
        self
    }

    /// Queues one would-block write result.
    pub fn write_would_block(mut self) -> Self {
        self.send_script.push_back(SendStep::WouldBlock);
        self
    }

    /// Makes the write side report the connection closed (sticky).
    pub fn write_closed(mut self) -> Self {
        self.send_script.push_back(SendStep::Closed);
        self
    }

    /// Handle on everything written to this connection.
    pub fn written(&self) -> Rc<RefCell<Vec<u8>>> {
        Rc::clone(&self.tx)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, NetError> {
        match self.rx.front_mut() {
            Some(RecvStep::Data(bytes)) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                bytes.drain(..n);
                if bytes.is_empty() {
                    self.rx.pop_front();
                }
                Ok(n)
            }
            Some(RecvStep::WouldBlock) => {
                self.rx.pop_front();
                Err(NetError::WouldBlock)
            }
            Some(RecvStep::Stall) => Err(NetError::WouldBlock),
            Some(RecvStep::Eof) => Ok(0),
            None => Err(NetError::WouldBlock),
        }
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, NetError> {
        match self.send_script.front() {
            Some(SendStep::Limit(limit)) => {
                let n = buf.len().min(*limit);
                self.send_script.pop_front();
                self.tx.borrow_mut().extend_from_slice(&buf[..n]);
                Ok(n)
            }
            Some(SendStep::WouldBlock) => {
                self.send_script.pop_front();
                Err(NetError::WouldBlock)
            }
            Some(SendStep::Stall) => Err(NetError::WouldBlock),
            Some(SendStep::Closed) => Err(NetError::Closed),
            None => {
                self.tx.borrow_mut().extend_from_slice(buf);
                Ok(buf.len())
            }
        }
    }
}

/// Control listener marker; the backlog lives in [`MockNet`].
pub struct MockListener;

/// A scripted passive listener: reports its scripted address and hands out
/// the next scripted data connection after a configurable number of polls.
pub struct MockPasvListener {
    addr: SocketAddrV4,
    accept_after: usize,
}

/// Scripted transport backend.
pub struct MockNet {
    control_backlog: VecDeque<MockConn>,
    data_backlog: VecDeque<MockConn>,
    pasv_addr: SocketAddrV4,
    pasv_accept_after: usize,
    fail_pasv_listen: bool,
    closed_conns: usize,
    closed_listeners: usize,
}

impl Default for MockNet {
    fn default() -> Self {
        Self::new()
    }
}

impl MockNet {
    pub fn new() -> Self {
        Self {
            control_backlog: VecDeque::new(),
            data_backlog: VecDeque::new(),
            pasv_addr: addr(127, 0, 0, 1, 2121),
            pasv_accept_after: 0,
            fail_pasv_listen: false,
            closed_conns: 0,
            closed_listeners: 0,
        }
    }

    /// Address every passive listener reports.
    pub fn pasv_addr(mut self, addr: SocketAddrV4) -> Self {
        self.pasv_addr = addr;
        self
    }

    /// Each passive listener returns would-block this many times before
    /// accepting.
    pub fn pasv_accept_after(mut self, polls: usize) -> Self {
        self.pasv_accept_after = polls;
        self
    }

    /// Makes `pasv_listen` fail with `AddrUnavailable`.
    pub fn fail_pasv_listen(mut self) -> Self {
        self.fail_pasv_listen = true;
        self
    }

    /// Queues an inbound control connection.
    pub fn push_control_conn(&mut self, conn: MockConn) {
        self.control_backlog.push_back(conn);
    }

    /// Queues the data connection the next passive accept hands out.
    pub fn push_data_conn(&mut self, conn: MockConn) {
        self.data_backlog.push_back(conn);
    }

    pub fn closed_conns(&self) -> usize {
        self.closed_conns
    }

    pub fn closed_listeners(&self) -> usize {
        self.closed_listeners
    }
}

impl Net for MockNet {
    type Listener = MockListener;
    type PasvListener = MockPasvListener;
    type Conn = MockConn;
    type Addr = SocketAddrV4;

    fn listen(&mut self, _addr: SocketAddrV4) -> Result<MockListener, NetError> {
        Ok(MockListener)
    }

    fn accept_control(&mut self, _listener: &mut MockListener) -> Result<MockConn, NetError> {
        self.control_backlog.pop_front().ok_or(NetError::WouldBlock)
    }

    fn pasv_listen(
        &mut self,
        _hint: Option<SocketAddrV4>,
    ) -> Result<MockPasvListener, NetError> {
        if self.fail_pasv_listen {
            return Err(NetError::AddrUnavailable);
        }
        Ok(MockPasvListener {
            addr: self.pasv_addr,
            accept_after: self.pasv_accept_after,
        })
    }

    fn pasv_local_addr(
        &mut self,
        listener: &MockPasvListener,
    ) -> Result<SocketAddrV4, NetError> {
        Ok(listener.addr)
    }

    fn accept_data(&mut self, listener: &mut MockPasvListener) -> Result<MockConn, NetError> {
        if listener.accept_after > 0 {
            listener.accept_after -= 1;
            return Err(NetError::WouldBlock);
        }
        self.data_backlog.pop_front().ok_or(NetError::WouldBlock)
    }

    fn read(&mut self, conn: &mut MockConn, buf: &mut [u8]) -> Result<usize, NetError> {
        conn.read(buf)
    }

    fn write(&mut self, conn: &mut MockConn, buf: &[u8]) -> Result<usize, NetError> {
        conn.write(buf)
    }

    fn close_conn(&mut self, _conn: MockConn) {
        self.closed_conns += 1;
    }

    fn close_pasv_listener(&mut self, _listener: MockPasvListener) {
        self.closed_listeners += 1;
    }

    fn format_pasv_addr(addr: &SocketAddrV4, out: &mut [u8]) -> Result<usize, NetError> {
        let [h1, h2, h3, h4] = addr.ip().octets();
        let port = addr.port();
        let mut w = BufCursor::new(out);
        write!(w, "{h1},{h2},{h3},{h4},{},{}", port >> 8, port & 0xff)
            .map_err(|_| NetError::Io)?;
        Ok(w.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pasv_tuple_uses_high_byte_first_port() {
        let mut out = [0u8; 32];
        let n =
            MockNet::format_pasv_addr(&addr(10, 11, 12, 13, 2125), &mut out).unwrap();
        assert_eq!(&out[..n], b"10,11,12,13,8,77");
    }

    #[test]
    fn scripted_reads_respect_chunks() {
        let mut net = MockNet::new();
        let mut conn = MockConn::new()
            .recv(b"abc")
            .recv_would_block()
            .recv(b"defgh")
            .recv_eof();
        let mut buf = [0u8; 4];

        assert_eq!(net.read(&mut conn, &mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], b"abc");
        assert_eq!(net.read(&mut conn, &mut buf), Err(NetError::WouldBlock));
        assert_eq!(net.read(&mut conn, &mut buf).unwrap(), 4);
        assert_eq!(net.read(&mut conn, &mut buf).unwrap(), 1);
        assert_eq!(net.read(&mut conn, &mut buf).unwrap(), 0);
        // End-of-stream is sticky.
        assert_eq!(net.read(&mut conn, &mut buf).unwrap(), 0);
    }

    #[test]
    fn scripted_writes_cap_and_capture() {
        let mut net = MockNet::new();
        let mut conn = MockConn::new().write_limit(2).write_would_block();
        let out = conn.written();

        assert_eq!(net.write(&mut conn, b"hello").unwrap(), 2);
        assert_eq!(net.write(&mut conn, b"llo"), Err(NetError::WouldBlock));
        assert_eq!(net.write(&mut conn, b"llo").unwrap(), 3);
        assert_eq!(&*out.borrow(), b"hello");
    }
}
