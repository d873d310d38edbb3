//! Reply formatting and resumable flushing.
//!
//! Replies are staged into the caller-owned reply buffer and pushed to the
//! control connection in as many partial writes as the transport needs.
//! While a reply is pending the driver queues nothing else and reads no
//! command line, so the client always sees complete, ordered reply lines.

use std::fmt::{self, Write as _};

use log::error;

use crate::error::{NetError, ReplyError};
use crate::net::Net;
use crate::util::BufCursor;

/// Reply formatter over the caller-owned reply buffer.
pub struct ReplyWriter<'buf> {
    buf: &'buf mut [u8],
    len: usize,
    off: usize,
}

impl<'buf> ReplyWriter<'buf> {
    pub fn new(buf: &'buf mut [u8]) -> Self {
        Self { buf, len: 0, off: 0 }
    }

    /// True while staged bytes have not all been written out.
    pub fn pending(&self) -> bool {
        self.off < self.len
    }

    /// Drops any staged reply, e.g. on control teardown.
    pub fn reset(&mut self) {
        self.len = 0;
        self.off = 0;
    }

    /// Stages a single-line reply `"<code> <text>\r\n"`.
    pub fn try_single(&mut self, code: u16, text: &str) -> Result<(), ReplyError> {
        self.try_fmt(code, format_args!("{text}"))
    }

    /// Stages a single-line reply with formatted text.
    pub fn try_fmt(&mut self, code: u16, text: fmt::Arguments<'_>) -> Result<(), ReplyError> {
        if self.pending() {
            return Err(ReplyError::Busy);
        }
        self.len = 0;
        self.off = 0;
        let mut w = BufCursor::new(self.buf);
        let staged = write!(w, "{code} ")
            .and_then(|()| w.write_fmt(text))
            .and_then(|()| w.push_bytes(b"\r\n"));
        match staged {
            Ok(()) => {
                self.len = w.len();
                Ok(())
            }
            Err(_) => Err(ReplyError::Overflow),
        }
    }

    /// Stages the multiline `FEAT` reply: `211-Features:`, one indented
    /// line per feature, `211 End`.
    pub fn try_feat(&mut self, features: &[&str]) -> Result<(), ReplyError> {
        if self.pending() {
            return Err(ReplyError::Busy);
        }
        self.len = 0;
        self.off = 0;
        let mut w = BufCursor::new(self.buf);
        let mut staged = w.push_bytes(b"211-Features:\r\n");
        for feature in features {
            staged = staged.and_then(|()| write!(w, " {feature}\r\n"));
        }
        staged = staged.and_then(|()| w.push_bytes(b"211 End\r\n"));
        match staged {
            Ok(()) => {
                self.len = w.len();
                Ok(())
            }
            Err(_) => Err(ReplyError::Overflow),
        }
    }

    /// Stages a single-line reply, downgrading an overflow to the local
    /// processing error the client is owed instead.
    pub fn queue(&mut self, code: u16, text: &str) {
        self.queue_fmt(code, format_args!("{text}"));
    }

    /// [`ReplyWriter::queue`] with formatted text.
    pub fn queue_fmt(&mut self, code: u16, text: fmt::Arguments<'_>) {
        match self.try_fmt(code, text) {
            Ok(()) => {}
            Err(ReplyError::Overflow) => {
                error!("reply {code} overflowed the reply buffer");
                // A short fixed line always fits a minimum-size buffer.
                let _ = self.try_single(
                    451,
                    "Requested action aborted: local error in processing",
                );
            }
            Err(ReplyError::Busy) => {
                error!("reply {code} dropped: another reply is pending");
            }
        }
    }

    /// Writes staged bytes until empty or the transport pushes back.
    ///
    /// Returns `Ok(true)` once the reply is fully flushed, `Ok(false)` when
    /// the transport would block. A zero-byte write is a closed connection.
    pub fn flush<N: Net>(
        &mut self,
        net: &mut N,
        conn: &mut N::Conn,
    ) -> Result<bool, NetError> {
        while self.pending() {
            match net.write(conn, &self.buf[self.off..self.len]) {
                Ok(0) => return Err(NetError::Closed),
                Ok(n) => self.off += n,
                Err(NetError::WouldBlock) => return Ok(false),
                Err(e) => return Err(e),
            }
        }
        self.len = 0;
        self.off = 0;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockConn, MockNet};

    #[test]
    fn formats_single_line() {
        let mut buf = [0u8; 64];
        let mut reply = ReplyWriter::new(&mut buf);
        let mut net = MockNet::new();
        let mut conn = MockConn::new();
        let out = conn.written();

        reply.try_single(220, "FTP Server Ready").unwrap();
        assert!(reply.pending());
        assert!(reply.flush(&mut net, &mut conn).unwrap());
        assert_eq!(&*out.borrow(), b"220 FTP Server Ready\r\n");
        assert!(!reply.pending());
    }

    #[test]
    fn refuses_queue_while_pending() {
        let mut buf = [0u8; 64];
        let mut reply = ReplyWriter::new(&mut buf);

        reply.try_single(200, "OK").unwrap();
        assert_eq!(reply.try_single(200, "again"), Err(ReplyError::Busy));
    }

    #[test]
    fn resumes_after_partial_writes() {
        let mut buf = [0u8; 64];
        let mut reply = ReplyWriter::new(&mut buf);
        let mut net = MockNet::new();
        let mut conn = MockConn::new()
            .write_limit(3)
            .write_would_block()
            .write_limit(4)
            .write_would_block();
        let out = conn.written();

        reply.try_single(230, "User logged in").unwrap();
        assert!(!reply.flush(&mut net, &mut conn).unwrap());
        assert!(!reply.flush(&mut net, &mut conn).unwrap());
        assert!(reply.flush(&mut net, &mut conn).unwrap());
        assert_eq!(&*out.borrow(), b"230 User logged in\r\n");
    }

    #[test]
    fn zero_byte_write_is_closed() {
        let mut buf = [0u8; 64];
        let mut reply = ReplyWriter::new(&mut buf);
        let mut net = MockNet::new();
        let mut conn = MockConn::new().write_closed();

        reply.try_single(200, "OK").unwrap();
        assert_eq!(reply.flush(&mut net, &mut conn), Err(NetError::Closed));
    }

    #[test]
    fn feat_block_shape() {
        let mut buf = [0u8; 128];
        let mut reply = ReplyWriter::new(&mut buf);
        let mut net = MockNet::new();
        let mut conn = MockConn::new();
        let out = conn.written();

        reply.try_feat(&["TYPE I", "PASV", "SIZE", "MDTM"]).unwrap();
        reply.flush(&mut net, &mut conn).unwrap();
        assert_eq!(
            &*out.borrow(),
            b"211-Features:\r\n TYPE I\r\n PASV\r\n SIZE\r\n MDTM\r\n211 End\r\n"
        );
    }

    #[test]
    fn overflow_downgrades_to_local_error() {
        let mut buf = [0u8; 64];
        let mut reply = ReplyWriter::new(&mut buf);
        let long = "x".repeat(100);
        assert_eq!(reply.try_single(257, &long), Err(ReplyError::Overflow));
        assert!(!reply.pending());

        reply.queue(257, &long);
        let mut net = MockNet::new();
        let mut conn = MockConn::new();
        let out = conn.written();
        reply.flush(&mut net, &mut conn).unwrap();
        assert_eq!(
            &*out.borrow(),
            b"451 Requested action aborted: local error in processing\r\n"
        );
    }
}
