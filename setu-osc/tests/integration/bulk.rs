//! Bulk-transfer scenarios over TCP

use crate::harness::Harness;
use setu_osc::BulkPayload;
use setu_osc::transport::tcp::{read_frame, request};
use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::{Duration, Instant};

fn connect(h: &Harness) -> TcpStream {
    let stream = TcpStream::connect(h.gateway.bulk_addr()).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_secs(3)))
        .unwrap();
    stream
}

#[test]
fn test_unknown_token_returns_error_and_closes() {
    let h = Harness::new();
    let mut stream = connect(&h);
    stream.write_all(b"GET_NOTHING").unwrap();

    let body = read_frame(&mut stream).unwrap();
    let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(value.get("error").is_some());

    let mut rest = Vec::new();
    assert_eq!(stream.read_to_end(&mut rest).unwrap(), 0);
}

#[test]
fn test_get_items_returns_framed_json_array() {
    let h = Harness::new();
    h.handle.add_tcp_handler("GET_ITEMS", || {
        Ok(BulkPayload::Json(serde_json::json!([
            {"name": "Drums", "is_folder": true},
            {"name": "Instruments", "is_folder": true},
            {"name": "Audio Effects", "is_folder": true}
        ])))
    });

    let mut stream = connect(&h);
    stream.write_all(b"GET_ITEMS").unwrap();

    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf).unwrap();
    let len = u32::from_be_bytes(len_buf) as usize;

    let mut body = Vec::new();
    stream.read_to_end(&mut body).unwrap();
    assert_eq!(body.len(), len);

    let items: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(items.as_array().unwrap().len(), 3);
}

#[test]
fn test_failing_handler_still_answers() {
    let h = Harness::new();
    h.handle.add_tcp_handler("GET_BROKEN", || {
        Err(setu_osc::HandlerError::Failed("browser unavailable".into()))
    });

    let text = request(h.gateway.bulk_addr(), "GET_BROKEN", Duration::from_secs(3)).unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value["error"], "browser unavailable");
}

#[test]
fn test_invalid_utf8_request() {
    let h = Harness::new();
    let mut stream = connect(&h);
    stream.write_all(&[0xff, 0xfe, 0xfd]).unwrap();

    let body = read_frame(&mut stream).unwrap();
    let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value["error"], "Invalid request encoding");
}

#[test]
fn test_silent_client_does_not_block_others() {
    let h = Harness::new();
    h.handle
        .add_tcp_handler("PING", || Ok(BulkPayload::Text("PONG".into())));

    // Connected but never sends; its worker waits on the read timeout
    let connected = Instant::now();
    let mut idle = connect(&h);
    idle.set_read_timeout(Some(Duration::from_secs(5))).unwrap();

    let text = request(h.gateway.bulk_addr(), "PING", Duration::from_secs(3)).unwrap();
    assert_eq!(text, "PONG");

    // The server gives up after its 2s read timeout and closes without a reply
    let mut rest = Vec::new();
    assert_eq!(idle.read_to_end(&mut rest).unwrap(), 0);
    let waited = connected.elapsed();
    assert!(waited >= Duration::from_millis(1500), "closed early: {:?}", waited);
    assert!(waited < Duration::from_secs(4), "closed late: {:?}", waited);
}
