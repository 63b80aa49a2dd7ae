//! Subscription scenarios driven through the component addresses

use crate::harness::Harness;
use setu_osc::host::MockObject;
use setu_osc::{Access, ComponentApi, HostObject, OscType};
use std::sync::Arc;
use std::time::Duration;

fn song_harness() -> (Harness, Arc<MockObject>) {
    let h = Harness::new();
    let song = Arc::new(MockObject::new("song").with_property("tempo", 120.0f32));
    ComponentApi::new(h.handle.clone(), "song").expose_property(
        song.clone(),
        "tempo",
        Access::ReadWrite,
    );
    (h, song)
}

#[test]
fn test_double_subscribe_installs_one_hook() {
    let (mut h, song) = song_harness();

    h.send("/live/song/start_listen/tempo", &[]);
    h.send("/live/song/start_listen/tempo", &[]);
    assert_eq!(h.pump(2), 2);

    // One immediate emission per subscribe request
    for _ in 0..2 {
        let msg = h.recv();
        assert_eq!(msg.address, "/live/song/get/tempo");
        assert_eq!(msg.args, vec![OscType::Float(120.0)]);
    }
    assert_eq!(song.hook_count("tempo"), 1);

    // A change produces exactly one emission
    h.send("/live/song/set/tempo", &[OscType::Float(140.0)]);
    assert_eq!(h.pump(1), 1);
    assert_eq!(h.recv().args, vec![OscType::Float(140.0)]);
    assert!(h.try_recv(Duration::from_millis(200)).is_none());
}

#[test]
fn test_stop_listen_unknown_key_is_silent() {
    let (mut h, song) = song_harness();

    h.send("/live/song/stop_listen/tempo", &[]);
    assert_eq!(h.pump(1), 1);
    assert!(h.try_recv(Duration::from_millis(200)).is_none());
    assert_eq!(song.hook_count("tempo"), 0);
}

#[test]
fn test_stop_listen_ends_emissions() {
    let (mut h, song) = song_harness();

    h.send("/live/song/start_listen/tempo", &[]);
    assert_eq!(h.pump(1), 1);
    let _initial = h.recv();

    h.send("/live/song/stop_listen/tempo", &[]);
    assert_eq!(h.pump(1), 1);
    song.set_property("tempo", &OscType::Float(90.0)).unwrap();
    assert!(h.try_recv(Duration::from_millis(200)).is_none());
}

#[test]
fn test_destroyed_target_stop_listen_is_benign() {
    let (mut h, song) = song_harness();

    h.send("/live/song/start_listen/tempo", &[]);
    assert_eq!(h.pump(1), 1);
    let _initial = h.recv();

    song.destroy();
    h.send("/live/song/stop_listen/tempo", &[]);
    assert_eq!(h.pump(1), 1);
    assert!(h.handle.listeners().is_empty());
}
