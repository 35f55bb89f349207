//! End-to-end tests exercising the socket engine over real TCP connections.

use crate::{Event, Frame, Socket, SocketError};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};

const RECV_DEADLINE: Duration = Duration::from_secs(5);

async fn recv_event(socket: &mut Socket) -> Event {
    timeout(RECV_DEADLINE, socket.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("event channel closed unexpectedly")
}

async fn accept_one(listener: &mut Socket) -> Socket {
    match recv_event(listener).await {
        Event::NewConnection(conn) => conn,
        other => panic!("expected NewConnection, got {other:?}"),
    }
}

async fn recv_frame(socket: &mut Socket) -> Frame {
    match recv_event(socket).await {
        Event::Frame(frame) => frame,
        other => panic!("expected Frame, got {other:?}"),
    }
}

#[tokio::test]
async fn echo_roundtrip() {
    let mut listener = Socket::bind("tcp://127.0.0.1:7458").await.unwrap();
    let mut client = Socket::connect("tcp://127.0.0.1:7458").await.unwrap();

    let mut conn = accept_one(&mut listener).await;

    client.send_bytes(b"hello").unwrap();
    let inbound = recv_frame(&mut conn).await;
    assert_eq!(inbound.payload(), b"hello");

    // Echo it back.
    conn.send_bytes(b"hello").unwrap();
    let echoed = recv_frame(&mut client).await;
    assert_eq!(echoed.payload(), b"hello");
}

#[tokio::test]
async fn peer_close_emits_frame_then_closed() {
    let mut listener = Socket::bind("tcp://127.0.0.1:7459").await.unwrap();

    let mut raw = TcpStream::connect("127.0.0.1:7459").await.unwrap();
    let mut conn = accept_one(&mut listener).await;

    raw.write_all(&Frame::from_slice(b"x").unwrap().to_bytes())
        .await
        .unwrap();
    drop(raw);

    let frame = recv_frame(&mut conn).await;
    assert_eq!(frame.payload(), b"x");

    match recv_event(&mut conn).await {
        Event::Closed => {}
        other => panic!("expected Closed, got {other:?}"),
    }
    assert!(conn.is_dead());
}

#[tokio::test]
async fn burst_of_frames_arrives_in_order() {
    let mut listener = Socket::bind("tcp://127.0.0.1:7460").await.unwrap();
    let client = Socket::connect("tcp://127.0.0.1:7460").await.unwrap();

    let mut conn = accept_one(&mut listener).await;

    for i in 0..1000 {
        client.send_bytes(format!("{i:04}").as_bytes()).unwrap();
    }

    for i in 0..1000 {
        let frame = recv_frame(&mut conn).await;
        assert_eq!(frame.payload(), format!("{i:04}").as_bytes());
    }
}

#[tokio::test]
async fn invalid_addresses_are_rejected() {
    assert!(matches!(
        Socket::bind("http://x").await,
        Err(SocketError::InvalidAddress(_))
    ));
    assert!(matches!(
        Socket::bind("tcp://host:0").await,
        Err(SocketError::InvalidAddress(_))
    ));
    assert!(matches!(
        Socket::connect("not-an-address").await,
        Err(SocketError::InvalidAddress(_))
    ));
}

#[tokio::test]
async fn unix_transport_is_unsupported() {
    assert!(matches!(
        Socket::bind("unix:///tmp/fsock-test.sock").await,
        Err(SocketError::Unsupported(_))
    ));
    assert!(matches!(
        Socket::connect("unix:///tmp/fsock-test.sock").await,
        Err(SocketError::Unsupported(_))
    ));
}

#[tokio::test]
async fn slow_consumer_drops_nothing() {
    let mut listener = Socket::bind("tcp://127.0.0.1:7461").await.unwrap();
    let client = Socket::connect("tcp://127.0.0.1:7461").await.unwrap();

    let mut conn = accept_one(&mut listener).await;

    for i in 0..50 {
        client.send_bytes(format!("msg-{i}").as_bytes()).unwrap();
    }

    // Leave the event channel unread; the framer suspends on it rather
    // than dropping parsed frames.
    sleep(Duration::from_millis(300)).await;

    for i in 0..50 {
        let frame = recv_frame(&mut conn).await;
        assert_eq!(frame.payload(), format!("msg-{i}").as_bytes());
    }
    assert!(!conn.is_dead());
}

#[tokio::test]
async fn send_after_idle_wakes_the_sender() {
    let mut listener = Socket::bind("tcp://127.0.0.1:7462").await.unwrap();
    let client = Socket::connect("tcp://127.0.0.1:7462").await.unwrap();

    let mut conn = accept_one(&mut listener).await;

    // Let the sender park with an empty queue, then wake it twice in
    // quick succession.
    sleep(Duration::from_millis(200)).await;
    client.send_bytes(b"first").unwrap();
    client.send_bytes(b"second").unwrap();

    assert_eq!(recv_frame(&mut conn).await.payload(), b"first");
    assert_eq!(recv_frame(&mut conn).await.payload(), b"second");

    // And again after another idle period.
    sleep(Duration::from_millis(200)).await;
    client.send_bytes(b"third").unwrap();
    assert_eq!(recv_frame(&mut conn).await.payload(), b"third");
}

#[tokio::test]
async fn send_bytes_matches_prebuilt_frames() {
    let mut listener = Socket::bind("tcp://127.0.0.1:7463").await.unwrap();
    let client = Socket::connect("tcp://127.0.0.1:7463").await.unwrap();

    let mut conn = accept_one(&mut listener).await;

    client.send(Frame::from_slice(b"payload").unwrap()).unwrap();
    client.send_bytes(b"payload").unwrap();

    let first = recv_frame(&mut conn).await;
    let second = recv_frame(&mut conn).await;
    assert_eq!(first, second);
    assert_eq!(first.payload(), b"payload");
}

#[tokio::test]
async fn parse_error_leaves_connection_open() {
    let mut listener = Socket::bind("tcp://127.0.0.1:7464").await.unwrap();

    let mut raw = TcpStream::connect("127.0.0.1:7464").await.unwrap();
    let mut conn = accept_one(&mut listener).await;

    // A length prefix far beyond the frame size limit. The bytes are
    // discarded but the connection survives.
    raw.write_all(b"\xff\xff\xff\xff").await.unwrap();
    sleep(Duration::from_millis(200)).await;
    assert!(!conn.is_dead());

    raw.write_all(&Frame::from_slice(b"still here").unwrap().to_bytes())
        .await
        .unwrap();
    let frame = recv_frame(&mut conn).await;
    assert_eq!(frame.payload(), b"still here");
    assert!(!conn.is_dead());
}

#[tokio::test]
async fn eof_mid_frame_emits_no_frame_event() {
    let mut listener = Socket::bind("tcp://127.0.0.1:7465").await.unwrap();

    let mut raw = TcpStream::connect("127.0.0.1:7465").await.unwrap();
    let mut conn = accept_one(&mut listener).await;

    // Header promises ten bytes; deliver three, then close.
    raw.write_all(b"\x00\x00\x00\x0aabc").await.unwrap();
    drop(raw);

    match recv_event(&mut conn).await {
        Event::Closed => {}
        other => panic!("expected Closed, got {other:?}"),
    }
    assert!(conn.is_dead());
}

#[tokio::test]
async fn close_marks_dead_without_a_closed_event() {
    let mut listener = Socket::bind("tcp://127.0.0.1:7466").await.unwrap();
    let client = Socket::connect("tcp://127.0.0.1:7466").await.unwrap();

    let conn = accept_one(&mut listener).await;

    client.close();
    assert!(client.is_dead());
    assert!(matches!(
        client.send_bytes(b"too late"),
        Err(SocketError::Closed)
    ));

    drop(conn);
}

#[tokio::test]
async fn listener_rejects_send() {
    let listener = Socket::bind("tcp://127.0.0.1:7467").await.unwrap();
    assert!(matches!(
        listener.send_bytes(b"nope"),
        Err(SocketError::NotConnected)
    ));
    assert!(!listener.is_dead());
    listener.close();
    assert!(listener.is_dead());
}

#[tokio::test]
async fn large_frame_survives_chunked_reads() {
    let mut listener = Socket::bind("tcp://127.0.0.1:7468").await.unwrap();
    let client = Socket::connect("tcp://127.0.0.1:7468").await.unwrap();

    let mut conn = accept_one(&mut listener).await;

    // Much larger than a single 1400-byte read chunk.
    let payload: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();
    client.send_bytes(&payload).unwrap();

    let frame = recv_frame(&mut conn).await;
    assert_eq!(frame.payload(), payload.as_slice());
}

#[tokio::test]
async fn zero_length_frame_roundtrip() {
    let mut listener = Socket::bind("tcp://127.0.0.1:7469").await.unwrap();
    let client = Socket::connect("tcp://127.0.0.1:7469").await.unwrap();

    let mut conn = accept_one(&mut listener).await;

    client.send_bytes(b"").unwrap();
    client.send_bytes(b"after").unwrap();

    let empty = recv_frame(&mut conn).await;
    assert!(empty.is_empty());
    assert_eq!(recv_frame(&mut conn).await.payload(), b"after");
}

#[tokio::test]
async fn accepts_multiple_connections_in_order() {
    let mut listener = Socket::bind("tcp://127.0.0.1:7470").await.unwrap();

    let a = Socket::connect("tcp://127.0.0.1:7470").await.unwrap();
    let mut conn_a = accept_one(&mut listener).await;
    a.send_bytes(b"from-a").unwrap();

    let b = Socket::connect("tcp://127.0.0.1:7470").await.unwrap();
    let mut conn_b = accept_one(&mut listener).await;
    b.send_bytes(b"from-b").unwrap();

    assert_eq!(recv_frame(&mut conn_a).await.payload(), b"from-a");
    assert_eq!(recv_frame(&mut conn_b).await.payload(), b"from-b");
}
