use std::io::Write as _;
use std::net::TcpListener;
use std::thread;
use std::time::Duration;

use libmqtt::network::tcp::TcpConnector;
use libmqtt::network::{Close, Connect, Connection, Error, Read, Write};

fn listener() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let address = listener.local_addr().unwrap().to_string();
    (listener, address)
}

#[test]
fn test_connect_write_and_read() {
    let (listener, address) = listener();
    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut buf = [0u8; 4];
        std::io::Read::read_exact(&mut stream, &mut buf).unwrap();
        stream.write_all(&buf).unwrap();
    });

    let mut connector = TcpConnector::with_timeout(Duration::from_secs(2));
    let mut conn = connector.connect(&address).unwrap();
    conn.write_all(&[1, 2, 3, 4]).unwrap();
    conn.flush().unwrap();

    let mut reader = conn.try_clone_reader().unwrap();
    let mut buf = [0u8; 4];
    let mut filled = 0;
    while filled < buf.len() {
        filled += reader.read(&mut buf[filled..]).unwrap();
    }
    assert_eq!(buf, [1, 2, 3, 4]);
    server.join().unwrap();

    // The server hung up.
    assert_eq!(conn.read(&mut buf).unwrap(), 0);
}

#[test]
fn test_read_deadline_reports_timeout() {
    let (listener, address) = listener();
    let mut conn = TcpConnector::new().connect(&address).unwrap();
    let _accepted = listener.accept().unwrap();

    conn.set_read_timeout(Some(Duration::from_millis(50))).unwrap();
    let err = conn.read(&mut [0u8; 8]).unwrap_err();
    assert!(err.is_timeout(), "{err}");
}

#[test]
fn test_close_is_idempotent_and_unblocks_reader() {
    let (listener, address) = listener();
    let mut conn = TcpConnector::new().connect(&address).unwrap();
    let _accepted = listener.accept().unwrap();

    let mut reader = conn.try_clone_reader().unwrap();
    let blocked = thread::spawn(move || reader.read(&mut [0u8; 8]));
    thread::sleep(Duration::from_millis(50));

    conn.close().unwrap();
    conn.close().unwrap();
    assert!(matches!(blocked.join().unwrap(), Ok(0) | Err(_)));

    assert!(matches!(conn.read(&mut [0u8; 1]), Err(Error::NotOpen)));
    assert!(matches!(conn.write(&[0]), Err(Error::NotOpen)));
}

#[test]
fn test_invalid_address() {
    let mut connector = TcpConnector::with_timeout(Duration::from_millis(100));
    assert!(matches!(
        connector.connect("not an address"),
        Err(Error::InvalidAddress(_))
    ));
}
