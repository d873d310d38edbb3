//! End-to-end wire scenarios: literal client input against expected control
//! and data channel bytes.

mod common;

use common::{client, lines, run, server, Buffers, TICKS};
use tickftp::mock::{addr, MockConn, MockFs, MockNet};
use tickftp::FsError;

#[test]
fn login_feature_probe_and_quit() {
    let mut net = MockNet::new();
    let conn = client(&["USER test", "PASS secret", "SYST", "TYPE I", "FEAT", "QUIT"]);
    let out = conn.written();
    net.push_control_conn(conn);

    let mut bufs = Buffers::new();
    let mut srv = server(&mut bufs, net, MockFs::new());
    run(&mut srv, TICKS);

    assert_eq!(
        lines(&out),
        vec![
            "220 FTP Server Ready",
            "331 User name okay, need password",
            "230 User logged in",
            "215 UNIX Type: L8",
            "200 Type set to I",
            "211-Features:",
            " TYPE I",
            " PASV",
            " SIZE",
            " MDTM",
            "211 End",
            "221 Bye",
        ]
    );
    assert!(!srv.has_session());
}

#[test]
fn repeated_pasv_reuses_the_advertised_tuple() {
    let mut net = MockNet::new().pasv_addr(addr(10, 11, 12, 13, 2125));
    net.push_data_conn(MockConn::new());
    net.push_data_conn(MockConn::new());
    let conn = client(&["USER test", "PASS secret", "PASV", "PASV", "QUIT"]);
    let out = conn.written();
    net.push_control_conn(conn);

    let mut bufs = Buffers::new();
    let mut srv = server(&mut bufs, net, MockFs::new());
    run(&mut srv, TICKS);

    assert_eq!(
        lines(&out),
        vec![
            "220 FTP Server Ready",
            "331 User name okay, need password",
            "230 User logged in",
            "227 Entering Passive Mode (10,11,12,13,8,77)",
            "227 Entering Passive Mode (10,11,12,13,8,77)",
            "221 Bye",
        ]
    );
    // The first listener (and any stray data connection) went away before
    // the second 227.
    assert_eq!(srv.net().closed_listeners(), 2);
}

#[test]
fn list_directory_wire_format() {
    let mut net = MockNet::new();
    let data = MockConn::new();
    let data_out = data.written();
    net.push_data_conn(data);
    let conn = client(&["USER test", "PASS secret", "PASV", "LIST", "QUIT"]);
    let out = conn.written();
    net.push_control_conn(conn);

    let mut bufs = Buffers::new();
    let fs = MockFs::new()
        .dir("/docs")
        .dir("/pub")
        .file("/readme.txt", &[b'r'; 123]);
    let mut srv = server(&mut bufs, net, fs);
    run(&mut srv, TICKS);

    let control = lines(&out);
    assert!(control.contains(&"230 User logged in".to_string()));
    assert!(control
        .iter()
        .any(|l| l == "150 Here comes the directory listing"));
    assert!(control.iter().any(|l| l == "226 Directory send OK"));
    assert_eq!(*control.last().unwrap(), "221 Bye");

    assert_eq!(
        &*data_out.borrow(),
        b"drwxr-xr-x 1 owner group 0 Jan 01 00:00 docs\r\n\
          drwxr-xr-x 1 owner group 0 Jan 01 00:00 pub\r\n\
          -rw-r--r-- 1 owner group 123 Jan 01 00:00 readme.txt\r\n"
            .as_slice()
    );
}

#[test]
fn retr_delivers_file_content_exactly() {
    let mut net = MockNet::new();
    let data = MockConn::new()
        .write_limit(1)
        .write_would_block()
        .write_limit(7)
        .write_would_block()
        .write_limit(2);
    let data_out = data.written();
    net.push_data_conn(data);
    let conn = client(&["USER test", "PASS secret", "PASV", "RETR readme.txt", "QUIT"]);
    let out = conn.written();
    net.push_control_conn(conn);

    let mut bufs = Buffers::new();
    let fs = MockFs::new().file("/readme.txt", b"mock-readme-bytes\n");
    let mut srv = server(&mut bufs, net, fs);
    run(&mut srv, TICKS);

    let control = lines(&out);
    assert!(control.iter().any(|l| l == "150 Opening data connection"));
    assert!(control.iter().any(|l| l == "226 Closing data connection"));
    assert_eq!(&*data_out.borrow(), b"mock-readme-bytes\n");
}

#[test]
fn stor_reassembles_the_client_payload() {
    let mut net = MockNet::new();
    let data = MockConn::new()
        .recv(b"hello ")
        .recv_would_block()
        .recv(b"world")
        .recv_eof();
    net.push_data_conn(data);
    let conn = client(&["USER test", "PASS secret", "PASV", "STOR upload.bin", "QUIT"]);
    let out = conn.written();
    net.push_control_conn(conn);

    let mut bufs = Buffers::new();
    let fs = MockFs::new().write_cap(3);
    let mut srv = server(&mut bufs, net, fs);
    run(&mut srv, TICKS);

    let control = lines(&out);
    assert!(control.iter().any(|l| l == "150 Opening data connection"));
    assert!(control.iter().any(|l| l == "226 Closing data connection"));
    assert_eq!(srv.fs().file_contents("/upload.bin").unwrap(), b"hello world");
}

#[test]
fn cwd_failures_map_through_the_error_table() {
    let mut net = MockNet::new();
    let conn = client(&[
        "USER test",
        "PASS secret",
        "CWD missing",
        "CWD locked",
        "CWD ioerr",
        "QUIT",
    ]);
    let out = conn.written();
    net.push_control_conn(conn);

    let mut bufs = Buffers::new();
    let fs = MockFs::new()
        .error("/locked", FsError::PermissionDenied)
        .error("/ioerr", FsError::Io);
    let mut srv = server(&mut bufs, net, fs);
    run(&mut srv, TICKS);

    assert_eq!(
        lines(&out),
        vec![
            "220 FTP Server Ready",
            "331 User name okay, need password",
            "230 User logged in",
            "550 File not found",
            "550 Permission denied",
            "451 Requested action aborted: local error in processing",
            "221 Bye",
        ]
    );
}
