//! Non-blocking CRLF line framing for the control connection.
//!
//! The reader stages inbound bytes in the caller-owned command buffer and
//! yields at most one event per poll. A yielded line slice stays valid until
//! the next poll: consumption of the line (and its CRLF) is deferred and the
//! buffer is only shifted on the following call.

use log::debug;

use crate::error::NetError;
use crate::net::Net;

/// What one poll of the reader produced.
#[derive(Debug, PartialEq, Eq)]
pub enum LineEvent<'a> {
    /// One complete line, CRLF excluded. Valid until the next poll.
    Line(&'a [u8]),
    /// A line longer than the staging buffer was received and discarded
    /// through its terminating CRLF.
    TooLong,
}

/// CRLF framer over the command buffer.
pub struct LineReader<'buf> {
    buf: &'buf mut [u8],
    /// Valid bytes staged at the front of `buf`.
    len: usize,
    /// Prefix to drop on the next poll (the previously yielded line + CRLF).
    consume: usize,
    /// Set while skipping an overlong line up to its CRLF.
    discarding: bool,
}

fn find_crlf(bytes: &[u8]) -> Option<usize> {
    bytes.windows(2).position(|w| w == b"\r\n")
}

impl<'buf> LineReader<'buf> {
    pub fn new(buf: &'buf mut [u8]) -> Self {
        Self {
            buf,
            len: 0,
            consume: 0,
            discarding: false,
        }
    }

    /// Drops all staged state, e.g. when the control connection goes away.
    pub fn reset(&mut self) {
        self.len = 0;
        self.consume = 0;
        self.discarding = false;
    }

    /// Advances the framer by at most one buffered line or one transport
    /// read.
    ///
    /// Returns `Ok(None)` when nothing is available without blocking. A
    /// closed connection surfaces as `Err(NetError::Closed)`; a zero-length
    /// read is treated the same way.
    pub fn poll<N: Net>(
        &mut self,
        net: &mut N,
        conn: &mut N::Conn,
    ) -> Result<Option<LineEvent<'_>>, NetError> {
        if self.consume > 0 {
            self.buf.copy_within(self.consume..self.len, 0);
            self.len -= self.consume;
            self.consume = 0;
        }

        if self.discarding {
            return self.poll_discard(net, conn);
        }

        if let Some(at) = find_crlf(&self.buf[..self.len]) {
            self.consume = at + 2;
            return Ok(Some(LineEvent::Line(&self.buf[..at])));
        }

        if self.len == self.buf.len() {
            debug!("command line exceeds {} bytes, discarding", self.buf.len());
            self.discarding = true;
            self.keep_trailing_cr();
            return Ok(None);
        }

        match net.read(conn, &mut self.buf[self.len..]) {
            Ok(0) => Err(NetError::Closed),
            Ok(n) => {
                self.len += n;
                if let Some(at) = find_crlf(&self.buf[..self.len]) {
                    self.consume = at + 2;
                    return Ok(Some(LineEvent::Line(&self.buf[..at])));
                }
                if self.len == self.buf.len() {
                    debug!("command line exceeds {} bytes, discarding", self.buf.len());
                    self.discarding = true;
                    self.keep_trailing_cr();
                }
                Ok(None)
            }
            Err(NetError::WouldBlock) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn poll_discard<N: Net>(
        &mut self,
        net: &mut N,
        conn: &mut N::Conn,
    ) -> Result<Option<LineEvent<'_>>, NetError> {
        if self.skip_through_crlf() {
            return Ok(Some(LineEvent::TooLong));
        }
        match net.read(conn, &mut self.buf[self.len..]) {
            Ok(0) => Err(NetError::Closed),
            Ok(n) => {
                self.len += n;
                if self.skip_through_crlf() {
                    return Ok(Some(LineEvent::TooLong));
                }
                self.keep_trailing_cr();
                Ok(None)
            }
            Err(NetError::WouldBlock) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// In discard mode: if the terminating CRLF is staged, drop everything
    /// through it and leave discard mode.
    fn skip_through_crlf(&mut self) -> bool {
        match find_crlf(&self.buf[..self.len]) {
            Some(at) => {
                let end = at + 2;
                self.buf.copy_within(end..self.len, 0);
                self.len -= end;
                self.discarding = false;
                true
            }
            None => false,
        }
    }

    /// Keeps only a trailing `\r` so a CRLF split across reads is still
    /// detected.
    fn keep_trailing_cr(&mut self) {
        let keep = self.len > 0 && self.buf[self.len - 1] == b'\r';
        if keep {
            self.buf[0] = b'\r';
        }
        self.len = usize::from(keep);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockConn, MockNet};

    fn poll_line(
        reader: &mut LineReader<'_>,
        net: &mut MockNet,
        conn: &mut MockConn,
    ) -> Option<Vec<u8>> {
        match reader.poll(net, conn).unwrap() {
            Some(LineEvent::Line(line)) => Some(line.to_vec()),
            _ => None,
        }
    }

    #[test]
    fn frames_single_line() {
        let mut buf = [0u8; 64];
        let mut reader = LineReader::new(&mut buf);
        let mut net = MockNet::new();
        let mut conn = MockConn::new().recv(b"NOOP\r\n");

        assert_eq!(poll_line(&mut reader, &mut net, &mut conn).unwrap(), b"NOOP");
    }

    #[test]
    fn buffered_lines_come_out_across_polls() {
        let mut buf = [0u8; 64];
        let mut reader = LineReader::new(&mut buf);
        let mut net = MockNet::new();
        let mut conn = MockConn::new().recv(b"USER a\r\nPASS b\r\n");

        assert_eq!(poll_line(&mut reader, &mut net, &mut conn).unwrap(), b"USER a");
        // Second line was already staged; no further read needed.
        assert_eq!(poll_line(&mut reader, &mut net, &mut conn).unwrap(), b"PASS b");
        assert_eq!(reader.poll(&mut net, &mut conn).unwrap(), None);
    }

    #[test]
    fn reassembles_split_crlf() {
        let mut buf = [0u8; 64];
        let mut reader = LineReader::new(&mut buf);
        let mut net = MockNet::new();
        let mut conn = MockConn::new()
            .recv(b"SYST\r")
            .recv_would_block()
            .recv(b"\n");

        assert_eq!(reader.poll(&mut net, &mut conn).unwrap(), None);
        assert_eq!(reader.poll(&mut net, &mut conn).unwrap(), None);
        assert_eq!(poll_line(&mut reader, &mut net, &mut conn).unwrap(), b"SYST");
    }

    #[test]
    fn would_block_yields_none() {
        let mut buf = [0u8; 64];
        let mut reader = LineReader::new(&mut buf);
        let mut net = MockNet::new();
        let mut conn = MockConn::new().recv_would_block();

        assert_eq!(reader.poll(&mut net, &mut conn).unwrap(), None);
    }

    #[test]
    fn zero_read_is_closed() {
        let mut buf = [0u8; 64];
        let mut reader = LineReader::new(&mut buf);
        let mut net = MockNet::new();
        let mut conn = MockConn::new().recv_eof();

        assert_eq!(reader.poll(&mut net, &mut conn), Err(NetError::Closed));
    }

    #[test]
    fn overlong_line_is_discarded_then_reported() {
        let mut buf = [0u8; 8];
        let mut reader = LineReader::new(&mut buf);
        let mut net = MockNet::new();
        let mut conn = MockConn::new()
            .recv(b"0123456789abcdef")
            .recv(b"ghij\r\nNOOP\r\n");

        // Fill, enter discard mode, then swallow through the CRLF.
        let mut too_long = 0;
        let mut lines = Vec::new();
        for _ in 0..16 {
            match reader.poll(&mut net, &mut conn).unwrap() {
                Some(LineEvent::TooLong) => too_long += 1,
                Some(LineEvent::Line(line)) => lines.push(line.to_vec()),
                None => {}
            }
        }
        assert_eq!(too_long, 1);
        assert_eq!(lines, vec![b"NOOP".to_vec()]);
    }

    #[test]
    fn overlong_line_with_split_crlf() {
        let mut buf = [0u8; 8];
        let mut reader = LineReader::new(&mut buf);
        let mut net = MockNet::new();
        let mut conn = MockConn::new()
            .recv(b"01234567")
            .recv(b"89abcde\r")
            .recv(b"\nQUIT\r\n");

        let mut too_long = 0;
        let mut lines = Vec::new();
        for _ in 0..16 {
            match reader.poll(&mut net, &mut conn).unwrap() {
                Some(LineEvent::TooLong) => too_long += 1,
                Some(LineEvent::Line(line)) => lines.push(line.to_vec()),
                None => {}
            }
        }
        assert_eq!(too_long, 1);
        assert_eq!(lines, vec![b"QUIT".to_vec()]);
    }

    #[test]
    fn emitted_lines_never_exceed_buffer_minus_crlf() {
        let cap = 16;
        let mut buf = vec![0u8; cap];
        let mut reader = LineReader::new(&mut buf);
        let mut net = MockNet::new();
        let mut conn = MockConn::new()
            .recv(b"a\r\n")
            .recv(b"bbbbbbbbbbbbbb\r\n") // exactly cap bytes with CRLF
            .recv(b"ccccccccccccccc\r\n"); // one over

        let mut max_len = 0;
        let mut too_long = 0;
        for _ in 0..32 {
            match reader.poll(&mut net, &mut conn) {
                Ok(Some(LineEvent::Line(line))) => max_len = max_len.max(line.len()),
                Ok(Some(LineEvent::TooLong)) => too_long += 1,
                _ => {}
            }
        }
        assert!(max_len <= cap - 2);
        assert_eq!(too_long, 1);
    }
}
