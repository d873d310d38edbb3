//! Shared harness: builds a server over the scripted backends and runs the
//! tick loop against scripted client traffic.

// Not every test binary uses every helper.
#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use tickftp::mock::{addr, MockConn, MockFs, MockNet};
use tickftp::{Server, ServerConfig, Storage};

/// Enough ticks for any scripted exchange in this suite to drain.
pub const TICKS: u64 = 600;

/// Backing memory for one server instance.
pub struct Buffers {
    command: Vec<u8>,
    reply: Vec<u8>,
    transfer: Vec<u8>,
    scratch: Vec<u8>,
}

impl Default for Buffers {
    fn default() -> Self {
        Self::new()
    }
}

impl Buffers {
    pub fn new() -> Self {
        Self {
            command: vec![0; 1024],
            reply: vec![0; 1024],
            transfer: vec![0; 4096],
            scratch: vec![0; 1024],
        }
    }
}

pub fn server_with_config<'a>(
    bufs: &'a mut Buffers,
    net: MockNet,
    fs: MockFs,
    config: ServerConfig,
) -> Server<'a, MockNet, MockFs> {
    let _ = env_logger::builder().is_test(true).try_init();
    let storage = Storage {
        command: &mut bufs.command,
        reply: &mut bufs.reply,
        transfer: &mut bufs.transfer,
        scratch: &mut bufs.scratch,
    };
    Server::new(net, fs, addr(127, 0, 0, 1, 21), config, storage).expect("server setup")
}

pub fn server<'a>(
    bufs: &'a mut Buffers,
    net: MockNet,
    fs: MockFs,
) -> Server<'a, MockNet, MockFs> {
    server_with_config(bufs, net, fs, ServerConfig::new("test", "secret"))
}

/// A control connection scripted with one CRLF line per `lines` entry.
pub fn client(lines: &[&str]) -> MockConn {
    let mut conn = MockConn::new();
    for line in lines {
        conn = conn.recv(format!("{line}\r\n").as_bytes());
    }
    conn
}

/// Ticks with a 1 ms clock step.
pub fn run(server: &mut Server<'_, MockNet, MockFs>, ticks: u64) {
    for now in 0..ticks {
        server.tick(now);
    }
}

/// The captured stream split into CRLF-terminated lines.
pub fn lines(captured: &Rc<RefCell<Vec<u8>>>) -> Vec<String> {
    String::from_utf8_lossy(&captured.borrow())
        .split("\r\n")
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Reply codes seen on the control channel, in order.
pub fn codes(captured: &Rc<RefCell<Vec<u8>>>) -> Vec<u16> {
    lines(captured)
        .iter()
        .filter_map(|line| line.split([' ', '-']).next()?.parse().ok())
        .collect()
}
