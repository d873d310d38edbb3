//! Passive-mode data channel lifecycle.
//!
//! Owns the passive listener and the accepted data connection. A `PASV`
//! command opens a fresh listener (tearing down any previous passive
//! resources first); each tick then polls the listener until the client
//! connects; transfers borrow the connection and the whole ensemble is
//! closed when the transfer finishes or the session ends.

use log::{debug, info, warn};

use crate::error::NetError;
use crate::net::Net;

/// Lifecycle phase of the passive ensemble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasvPhase {
    /// No listener and no data connection exist.
    Idle,
    /// Listener open, waiting for the client's data connection.
    Listening,
    /// Data connection accepted, no transfer running yet.
    DataConnected,
    /// A transfer is streaming over the data connection.
    Transferring,
    /// Marked for teardown; resources are released on the next tick.
    Closing,
}

/// Passive listener plus (eventually) the accepted data connection.
pub struct DataChannel<N: Net> {
    pub phase: PasvPhase,
    listener: Option<N::PasvListener>,
    conn: Option<N::Conn>,
}

impl<N: Net> Default for DataChannel<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: Net> DataChannel<N> {
    pub fn new() -> Self {
        Self {
            phase: PasvPhase::Idle,
            listener: None,
            conn: None,
        }
    }

    /// Opens a fresh passive listener, closing any previous passive
    /// resources first. Returns the listener's local address for the `227`
    /// reply.
    pub fn open(&mut self, net: &mut N, hint: N::Addr) -> Result<N::Addr, NetError> {
        self.close_all(net);
        let listener = net.pasv_listen(Some(hint))?;
        match net.pasv_local_addr(&listener) {
            Ok(addr) => {
                self.listener = Some(listener);
                self.phase = PasvPhase::Listening;
                info!("passive listener open");
                Ok(addr)
            }
            Err(e) => {
                net.close_pasv_listener(listener);
                Err(e)
            }
        }
    }

    /// One non-blocking accept attempt while listening.
    pub fn poll_accept(&mut self, net: &mut N) {
        if self.phase != PasvPhase::Listening || self.conn.is_some() {
            return;
        }
        let Some(listener) = self.listener.as_mut() else {
            return;
        };
        match net.accept_data(listener) {
            Ok(conn) => {
                debug!("data connection accepted");
                self.conn = Some(conn);
                self.phase = PasvPhase::DataConnected;
            }
            Err(NetError::WouldBlock) => {}
            Err(e) => {
                warn!("passive accept failed: {e}");
                self.close_all(net);
            }
        }
    }

    pub fn has_conn(&self) -> bool {
        self.conn.is_some()
    }

    pub fn conn_mut(&mut self) -> Option<&mut N::Conn> {
        self.conn.as_mut()
    }

    /// Marks the ensemble as carrying an active transfer.
    pub fn begin_transfer(&mut self) {
        self.phase = PasvPhase::Transferring;
    }

    /// Defers teardown to the next tick's passive step.
    pub fn begin_teardown(&mut self) {
        if self.phase != PasvPhase::Idle {
            self.phase = PasvPhase::Closing;
        }
    }

    /// Closes the data connection and the listener, returning to `Idle`.
    pub fn close_all(&mut self, net: &mut N) {
        if let Some(conn) = self.conn.take() {
            net.close_conn(conn);
        }
        if let Some(listener) = self.listener.take() {
            net.close_pasv_listener(listener);
        }
        self.phase = PasvPhase::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{addr, MockConn, MockNet};

    #[test]
    fn open_reports_listener_address() {
        let mut net = MockNet::new().pasv_addr(addr(10, 11, 12, 13, 2125));
        net.push_data_conn(MockConn::new());
        let mut chan: DataChannel<MockNet> = DataChannel::new();

        let got = chan.open(&mut net, addr(127, 0, 0, 1, 21)).unwrap();
        assert_eq!(got, addr(10, 11, 12, 13, 2125));
        assert_eq!(chan.phase, PasvPhase::Listening);
    }

    #[test]
    fn accept_waits_out_would_block() {
        let mut net = MockNet::new().pasv_accept_after(2);
        net.push_data_conn(MockConn::new());
        let mut chan: DataChannel<MockNet> = DataChannel::new();
        chan.open(&mut net, addr(127, 0, 0, 1, 21)).unwrap();

        chan.poll_accept(&mut net);
        assert_eq!(chan.phase, PasvPhase::Listening);
        chan.poll_accept(&mut net);
        assert_eq!(chan.phase, PasvPhase::Listening);
        chan.poll_accept(&mut net);
        assert_eq!(chan.phase, PasvPhase::DataConnected);
        assert!(chan.has_conn());
    }

    #[test]
    fn reopen_closes_previous_resources() {
        let mut net = MockNet::new();
        net.push_data_conn(MockConn::new());
        net.push_data_conn(MockConn::new());
        let mut chan: DataChannel<MockNet> = DataChannel::new();

        chan.open(&mut net, addr(127, 0, 0, 1, 21)).unwrap();
        chan.poll_accept(&mut net);
        assert!(chan.has_conn());

        chan.open(&mut net, addr(127, 0, 0, 1, 21)).unwrap();
        assert!(!chan.has_conn());
        assert_eq!(net.closed_conns(), 1);
        assert_eq!(net.closed_listeners(), 1);
    }

    #[test]
    fn listen_failure_leaves_idle() {
        let mut net = MockNet::new().fail_pasv_listen();
        let mut chan: DataChannel<MockNet> = DataChannel::new();

        assert!(chan.open(&mut net, addr(127, 0, 0, 1, 21)).is_err());
        assert_eq!(chan.phase, PasvPhase::Idle);
    }

    #[test]
    fn close_all_is_idempotent() {
        let mut net = MockNet::new();
        net.push_data_conn(MockConn::new());
        let mut chan: DataChannel<MockNet> = DataChannel::new();
        chan.open(&mut net, addr(127, 0, 0, 1, 21)).unwrap();
        chan.poll_accept(&mut net);

        chan.close_all(&mut net);
        chan.close_all(&mut net);
        assert_eq!(chan.phase, PasvPhase::Idle);
        assert_eq!(net.closed_conns(), 1);
        assert_eq!(net.closed_listeners(), 1);
    }
}
