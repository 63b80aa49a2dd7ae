//! Command/reply scenarios over UDP

use crate::harness::Harness;
use parking_lot::Mutex;
use setu_osc::OscType;
use setu_osc::codec::{self, OscBundle, OscMessage};
use std::sync::Arc;
use std::time::Duration;

#[test]
fn test_reply_reaches_reply_port() {
    let mut h = Harness::new();
    h.handle.add_handler("/test", |_| {
        Ok(Some(vec![OscType::Int(1), OscType::Int(2), OscType::Int(3)]))
    });

    h.send("/test", &[]);
    assert_eq!(h.pump(1), 1);

    let reply = h.recv();
    assert_eq!(reply.address, "/test");
    assert_eq!(
        reply.args,
        vec![OscType::Int(1), OscType::Int(2), OscType::Int(3)]
    );
}

#[test]
fn test_bundle_dispatched_in_order() {
    let mut h = Harness::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    for address in ["/a", "/b"] {
        let seen = Arc::clone(&seen);
        h.handle.add_handler(address, move |_| {
            seen.lock().push(address);
            Ok(None)
        });
    }

    let bundle = OscBundle::new(vec![
        OscMessage::new("/a", vec![]).into(),
        OscMessage::new("/b", vec![]).into(),
    ]);
    h.send_raw(&codec::encode_bundle(&bundle).unwrap());
    assert_eq!(h.pump(1), 1);

    assert_eq!(*seen.lock(), vec!["/a", "/b"]);
}

#[test]
fn test_wildcard_replies_use_matched_addresses() {
    let mut h = Harness::new();
    h.handle
        .add_handler("/live/song/get/name", |_| Ok(Some(vec![OscType::from("Demo")])));
    h.handle.add_handler("/live/track/get/name", |args| {
        let index = setu_osc::dispatch::args::int(args, 0)?;
        Ok(Some(vec![OscType::Long(index), OscType::from("Bass")]))
    });

    h.send("/live/*/get/name", &[]);
    assert_eq!(h.pump(1), 1);

    // The track handler needs an index argument and is skipped
    let reply = h.recv();
    assert_eq!(reply.address, "/live/song/get/name");
    assert!(h.try_recv(Duration::from_millis(200)).is_none());
}

#[test]
fn test_malformed_datagram_does_not_stop_processing() {
    let mut h = Harness::new();
    h.handle
        .add_handler("/ping", |_| Ok(Some(vec![OscType::from("pong")])));

    h.send_raw(b"not osc!");
    h.send("/ping", &[]);
    assert_eq!(h.pump(2), 2);

    assert_eq!(h.recv().address, "/ping");
}

#[test]
fn test_unknown_address_sends_nothing() {
    let mut h = Harness::new();
    h.send("/nobody/home", &[]);
    assert_eq!(h.pump(1), 1);
    assert!(h.try_recv(Duration::from_millis(200)).is_none());
}

#[test]
fn test_shutdown_sends_disconnect() {
    let mut h = Harness::new();
    h.handle.add_handler("/hello", |_| Ok(None));
    h.send("/hello", &[]);
    assert_eq!(h.pump(1), 1);

    let notice = h.shutdown();
    assert_eq!(notice.address, "/live/connection/disconnected");
    assert_eq!(notice.args, vec![OscType::Bool(true)]);
}
