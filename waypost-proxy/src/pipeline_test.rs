use std::time::Duration;

use assert_matches::assert_matches;
use tokio::io::AsyncWriteExt;
use waypost_net::{Limits, ParseErrorKind};

use crate::error::ProxyError;
use crate::events::event_channel;
use crate::pipeline::{ConnectionState, ConnectionTrace, read_request};

#[tokio::test]
async fn reads_request_delivered_in_small_writes() {
    let (sink, _events) = event_channel();
    let mut trace = ConnectionTrace::new(&sink);
    let (mut client, mut server) = tokio::io::duplex(8);

    let writer = tokio::spawn(async move {
        let input = b"POST http://origin:8080/upload HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello";
        for chunk in input.chunks(3) {
            client.write_all(chunk).await.unwrap();
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        client
    });

    let request = read_request(&mut server, Limits::default(), &mut trace)
        .await
        .unwrap();
    let _client = writer.await.unwrap();

    assert_eq!(request.line.target, "/upload");
    assert_eq!(request.host.as_deref(), Some("origin"));
    assert_eq!(request.port, 8080);
    assert_eq!(request.body(), b"hello");
    assert_eq!(trace.state, ConnectionState::ParsingBody);
}

#[tokio::test]
async fn header_only_request_ends_in_header_only_state() {
    let (sink, _events) = event_channel();
    let mut trace = ConnectionTrace::new(&sink);
    let mut input: &[u8] = b"GET / HTTP/1.1\r\nHost: a\r\n\r\n";

    let request = read_request(&mut input, Limits::default(), &mut trace)
        .await
        .unwrap();

    assert_eq!(request.body, None);
    assert_eq!(trace.state, ConnectionState::HeaderOnly);
}

#[tokio::test]
async fn eof_inside_body_is_incomplete_body() {
    let (sink, _events) = event_channel();
    let mut trace = ConnectionTrace::new(&sink);
    let mut input: &[u8] = b"POST / HTTP/1.1\r\nContent-Length: 10\r\n\r\nshort";

    let err = read_request(&mut input, Limits::default(), &mut trace)
        .await
        .unwrap_err();

    assert_matches!(err, ProxyError::Parse(error) if error.kind == ParseErrorKind::IncompleteBody);
    assert_eq!(trace.state, ConnectionState::ParsingBody);
}

#[tokio::test]
async fn eof_before_terminator_is_incomplete_header() {
    let (sink, _events) = event_channel();
    let mut trace = ConnectionTrace::new(&sink);
    let mut input: &[u8] = b"GET / HTTP/1.1\r\nHost: a\r\n";

    let err = read_request(&mut input, Limits::default(), &mut trace)
        .await
        .unwrap_err();

    assert_matches!(err, ProxyError::Parse(error) if error.kind == ParseErrorKind::IncompleteHeader);
    assert_eq!(trace.state, ConnectionState::ParsingHeader);
}

#[tokio::test]
async fn never_reads_past_header_capacity() {
    let (sink, _events) = event_channel();
    let mut trace = ConnectionTrace::new(&sink);
    let limits = Limits {
        max_header_bytes: 32,
        max_body_bytes: None,
    };
    let mut input: &[u8] = &[b'a'; 100];

    let err = read_request(&mut input, limits, &mut trace).await.unwrap_err();

    assert_matches!(
        err,
        ProxyError::Parse(error)
            if error.kind == ParseErrorKind::IncompleteHeader && error.offset == 32
    );
    assert_eq!(input.len(), 68);
}
