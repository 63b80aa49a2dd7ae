//! Demo session model served by the daemon
//!
//! A song with transport state and a growable list of tracks. Stands in for
//! the real host object graph so the daemon can be exercised end to end.

use parking_lot::Mutex;
use serde::Serialize;
use setu_osc::codec::OscType;
use setu_osc::host::{ChangeHook, HookId, HookSet, MockObject, PropertyTable};
use setu_osc::{HandlerError, HostError, HostObject, PropertyValue};
use std::sync::Arc;

const MIN_TEMPO: f64 = 20.0;
const MAX_TEMPO: f64 = 999.0;

struct SongState {
    tempo: f32,
    is_playing: bool,
    metronome: bool,
    tracks: Vec<Arc<MockObject>>,
}

/// Top-level song object
pub struct Song {
    state: Mutex<SongState>,
    properties: PropertyTable<Mutex<SongState>>,
    hooks: HookSet,
}

#[derive(Serialize)]
struct TrackSummary {
    index: usize,
    name: String,
    volume: f64,
    mute: bool,
}

#[derive(Serialize)]
struct SongStructure {
    tempo: f32,
    is_playing: bool,
    tracks: Vec<TrackSummary>,
}

impl Song {
    pub fn new(track_count: usize) -> Self {
        let tracks = (0..track_count).map(new_track).collect();
        Self {
            state: Mutex::new(SongState {
                tempo: 120.0,
                is_playing: false,
                metronome: false,
                tracks,
            }),
            properties: song_properties(),
            hooks: HookSet::new(),
        }
    }

    pub fn track(&self, index: usize) -> Option<Arc<MockObject>> {
        self.state.lock().tracks.get(index).cloned()
    }

    /// Snapshot of the song for the bulk channel
    pub fn structure(&self) -> Result<serde_json::Value, HandlerError> {
        let (tempo, is_playing, tracks) = {
            let state = self.state.lock();
            (state.tempo, state.is_playing, state.tracks.clone())
        };

        let mut summaries = Vec::with_capacity(tracks.len());
        for (index, track) in tracks.iter().enumerate() {
            let name = read(track, "name")?;
            let volume = read(track, "volume")?;
            let mute = read(track, "mute")?;
            summaries.push(TrackSummary {
                index,
                name: name.as_str().unwrap_or_default().to_string(),
                volume: volume.as_float().unwrap_or_default(),
                mute: mute.as_bool().unwrap_or_default(),
            });
        }

        serde_json::to_value(SongStructure {
            tempo,
            is_playing,
            tracks: summaries,
        })
        .map_err(|e| HandlerError::Failed(e.to_string()))
    }

    fn set_playing(&self, playing: bool) {
        self.state.lock().is_playing = playing;
        self.hooks.fire("is_playing");
    }
}

fn new_track(index: usize) -> Arc<MockObject> {
    Arc::new(
        MockObject::new(format!("track {}", index))
            .with_property("name", format!("{} Audio", index + 1))
            .with_property("volume", 0.85f32)
            .with_property("mute", false),
    )
}

fn read(track: &MockObject, property: &str) -> Result<OscType, HandlerError> {
    match track.get_property(property)? {
        PropertyValue::Scalar(value) => Ok(value),
        PropertyValue::Tuple(mut values) if !values.is_empty() => Ok(values.remove(0)),
        PropertyValue::Tuple(_) => Ok(OscType::Nil),
    }
}

fn song_properties() -> PropertyTable<Mutex<SongState>> {
    PropertyTable::new()
        .writable(
            "tempo",
            |s: &Mutex<SongState>| Ok(PropertyValue::scalar(s.lock().tempo)),
            |s: &Mutex<SongState>, value: &OscType| {
                let tempo = value
                    .as_float()
                    .ok_or_else(|| HostError::InvalidValue("tempo must be a number".into()))?;
                if !(MIN_TEMPO..=MAX_TEMPO).contains(&tempo) {
                    return Err(HostError::InvalidValue(format!("tempo out of range: {}", tempo)));
                }
                s.lock().tempo = tempo as f32;
                Ok(())
            },
        )
        .writable(
            "metronome",
            |s: &Mutex<SongState>| Ok(PropertyValue::scalar(s.lock().metronome)),
            |s: &Mutex<SongState>, value: &OscType| {
                let on = value
                    .as_bool()
                    .ok_or_else(|| HostError::InvalidValue("metronome must be a boolean".into()))?;
                s.lock().metronome = on;
                Ok(())
            },
        )
        .readable("is_playing", |s: &Mutex<SongState>| {
            Ok(PropertyValue::scalar(s.lock().is_playing))
        })
        .readable("num_tracks", |s: &Mutex<SongState>| {
            let count = i32::try_from(s.lock().tracks.len()).unwrap_or(i32::MAX);
            Ok(PropertyValue::scalar(count))
        })
}

impl HostObject for Song {
    fn get_property(&self, property: &str) -> Result<PropertyValue, HostError> {
        self.properties.get(&self.state, property)
    }

    fn set_property(&self, property: &str, value: &OscType) -> Result<(), HostError> {
        self.properties.set(&self.state, property, value)?;
        self.hooks.fire(property);
        Ok(())
    }

    fn call_method(&self, method: &str, _args: &[OscType]) -> Result<Option<Vec<OscType>>, HostError> {
        match method {
            "start_playing" | "continue_playing" => self.set_playing(true),
            "stop_playing" => self.set_playing(false),
            "create_track" => {
                let index = {
                    let mut state = self.state.lock();
                    let index = state.tracks.len();
                    state.tracks.push(new_track(index));
                    index
                };
                log::info!("Created track {}", index);
                self.hooks.fire("num_tracks");
                return Ok(Some(vec![OscType::Int(i32::try_from(index).unwrap_or(i32::MAX))]));
            }
            _ => return Err(HostError::UnknownMethod(method.to_string())),
        }
        Ok(None)
    }

    fn supports_listenable(&self, property: &str) -> bool {
        self.properties.contains(property)
    }

    fn add_change_hook(&self, property: &str, hook: ChangeHook) -> Result<HookId, HostError> {
        if !self.supports_listenable(property) {
            return Err(HostError::NotListenable(property.to_string()));
        }
        Ok(self.hooks.add(property, hook))
    }

    fn remove_change_hook(&self, property: &str, id: HookId) -> Result<(), HostError> {
        self.hooks.remove(property, id)
    }
}
