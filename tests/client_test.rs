//! Integration tests for the client against a running server.

use std::time::Duration;

use bytes::Bytes;
use dualconn::{BoxConn, Client, ClientError, Server};
use tokio::sync::mpsc;
use tokio_util::codec::{BytesCodec, LinesCodec};

const WAIT: Duration = Duration::from_secs(5);

async fn echo(conn: BoxConn) {
    let (mut reader, mut writer) = tokio::io::split(conn);
    let _ = tokio::io::copy(&mut reader, &mut writer).await;
}

async fn echo_server(network: &str) -> (Server, String) {
    let server = Server::new(network, "127.0.0.1:0", echo).unwrap();
    server.start().await.unwrap();
    let address = server.local_addr().await.unwrap().to_string();
    (server, address)
}

async fn recv(rx: &mut mpsc::UnboundedReceiver<Bytes>) -> Bytes {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for a token")
        .expect("callback dropped")
}

#[tokio::test]
async fn test_udp_client_round_trip() {
    let (server, address) = echo_server("udp").await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let client = Client::new("udp", address, BytesCodec::new(), move |data| {
        let _ = tx.send(data);
    });
    client.start().await.unwrap();

    client.send(b"ping").await.unwrap();
    assert_eq!(&recv(&mut rx).await[..], b"ping");

    client.send(b"pong").await.unwrap();
    assert_eq!(&recv(&mut rx).await[..], b"pong");

    client.stop().await.unwrap();
    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_tcp_client_line_tokens() {
    let (server, address) = echo_server("tcp").await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let client = Client::new("tcp", address, LinesCodec::new(), move |line| {
        let _ = tx.send(line);
    });
    client.start().await.unwrap();

    client.send(b"one\ntwo\nthr").await.unwrap();
    client.send(b"ee\n").await.unwrap();

    for expected in ["one", "two", "three"] {
        assert_eq!(&recv(&mut rx).await[..], expected.as_bytes());
    }

    client.stop().await.unwrap();
    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_client_restart() {
    let (server, address) = echo_server("tcp").await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let client = Client::new("tcp", address, BytesCodec::new(), move |data| {
        let _ = tx.send(data);
    });

    client.start().await.unwrap();
    client.stop().await.unwrap();
    assert!(matches!(client.stop().await, Err(ClientError::NotStarted)));

    client.start().await.unwrap();
    client.send(b"again").await.unwrap();
    assert_eq!(&recv(&mut rx).await[..], b"again");

    client.stop().await.unwrap();
    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_client_dial_failure() {
    let client = Client::new("tcp", "127.0.0.1:1", BytesCodec::new(), |_| {});
    let err = client.start().await.unwrap_err();
    assert!(matches!(err, ClientError::Dial { .. }));
}
