//! OSC data model: typed arguments, messages, bundles

/// A single typed OSC argument
///
/// | Variant | Tag | Wire size |
/// |---------|-----|-----------|
/// | `Int` | `i` | 4 bytes, big-endian |
/// | `Long` | `h` | 8 bytes, big-endian |
/// | `Float` | `f` | 4 bytes, IEEE 754 |
/// | `Double` | `d` | 8 bytes, IEEE 754 |
/// | `String` | `s` | NUL-terminated, padded to 4 |
/// | `Blob` | `b` | u32 size + bytes, padded to 4 |
/// | `Bool` | `T`/`F` | none |
/// | `Nil` | `N` | none |
#[derive(Debug, Clone, PartialEq)]
pub enum OscType {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    Blob(Vec<u8>),
    Bool(bool),
    Nil,
}

impl OscType {
    /// Type tag character for this argument
    pub fn tag(&self) -> char {
        match self {
            OscType::Int(_) => 'i',
            OscType::Long(_) => 'h',
            OscType::Float(_) => 'f',
            OscType::Double(_) => 'd',
            OscType::String(_) => 's',
            OscType::Blob(_) => 'b',
            OscType::Bool(true) => 'T',
            OscType::Bool(false) => 'F',
            OscType::Nil => 'N',
        }
    }

    /// Integer view (booleans count as 0/1, as OSC clients often send them that way)
    pub fn as_int(&self) -> Option<i64> {
        match self {
            OscType::Int(v) => Some(i64::from(*v)),
            OscType::Long(v) => Some(*v),
            OscType::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    /// Numeric view, widening integers
    pub fn as_float(&self) -> Option<f64> {
        match self {
            OscType::Float(v) => Some(f64::from(*v)),
            OscType::Double(v) => Some(*v),
            OscType::Int(v) => Some(f64::from(*v)),
            OscType::Long(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            OscType::String(s) => Some(s),
            _ => None,
        }
    }

    /// Truthiness view (non-zero integers are true)
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            OscType::Bool(b) => Some(*b),
            OscType::Int(v) => Some(*v != 0),
            OscType::Long(v) => Some(*v != 0),
            _ => None,
        }
    }
}

impl From<i32> for OscType {
    fn from(v: i32) -> Self {
        OscType::Int(v)
    }
}

impl From<i64> for OscType {
    fn from(v: i64) -> Self {
        OscType::Long(v)
    }
}

impl From<f32> for OscType {
    fn from(v: f32) -> Self {
        OscType::Float(v)
    }
}

impl From<f64> for OscType {
    fn from(v: f64) -> Self {
        OscType::Double(v)
    }
}

impl From<bool> for OscType {
    fn from(v: bool) -> Self {
        OscType::Bool(v)
    }
}

impl From<&str> for OscType {
    fn from(v: &str) -> Self {
        OscType::String(v.to_string())
    }
}

impl From<String> for OscType {
    fn from(v: String) -> Self {
        OscType::String(v)
    }
}

impl From<Vec<u8>> for OscType {
    fn from(v: Vec<u8>) -> Self {
        OscType::Blob(v)
    }
}

/// 64-bit NTP timetag carried by bundles
///
/// Bundles are always processed on receipt; the tag is preserved for
/// round-tripping but never used for scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeTag(pub u64);

impl TimeTag {
    /// The special "immediately" timetag (seconds 0, fraction 1)
    pub const IMMEDIATE: TimeTag = TimeTag(1);
}

impl Default for TimeTag {
    fn default() -> Self {
        TimeTag::IMMEDIATE
    }
}

/// Address plus ordered arguments
#[derive(Debug, Clone, PartialEq)]
pub struct OscMessage {
    pub address: String,
    pub args: Vec<OscType>,
}

impl OscMessage {
    pub fn new(address: impl Into<String>, args: Vec<OscType>) -> Self {
        Self {
            address: address.into(),
            args,
        }
    }
}

/// Timetagged container of messages and nested bundles
#[derive(Debug, Clone, PartialEq)]
pub struct OscBundle {
    pub timetag: TimeTag,
    pub content: Vec<OscPacket>,
}

impl OscBundle {
    pub fn new(content: Vec<OscPacket>) -> Self {
        Self {
            timetag: TimeTag::IMMEDIATE,
            content,
        }
    }
}

/// Anything that can arrive in a single datagram
#[derive(Debug, Clone, PartialEq)]
pub enum OscPacket {
    Message(OscMessage),
    Bundle(OscBundle),
}

impl OscPacket {
    /// Flatten into the processing sequence: messages in encoded order,
    /// nested bundles expanded depth-first in place.
    pub fn into_messages(self) -> Vec<OscMessage> {
        let mut out = Vec::new();
        self.flatten_into(&mut out);
        out
    }

    fn flatten_into(self, out: &mut Vec<OscMessage>) {
        match self {
            OscPacket::Message(msg) => out.push(msg),
            OscPacket::Bundle(bundle) => {
                for item in bundle.content {
                    item.flatten_into(out);
                }
            }
        }
    }
}

impl From<OscMessage> for OscPacket {
    fn from(msg: OscMessage) -> Self {
        OscPacket::Message(msg)
    }
}

impl From<OscBundle> for OscPacket {
    fn from(bundle: OscBundle) -> Self {
        OscPacket::Bundle(bundle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags() {
        assert_eq!(OscType::Int(1).tag(), 'i');
        assert_eq!(OscType::Bool(true).tag(), 'T');
        assert_eq!(OscType::Bool(false).tag(), 'F');
        assert_eq!(OscType::Nil.tag(), 'N');
    }

    #[test]
    fn test_numeric_views() {
        assert_eq!(OscType::Int(3).as_int(), Some(3));
        assert_eq!(OscType::Bool(true).as_int(), Some(1));
        assert_eq!(OscType::Int(2).as_float(), Some(2.0));
        assert_eq!(OscType::Float(0.5).as_float(), Some(0.5));
        assert_eq!(OscType::from("x").as_int(), None);
        assert_eq!(OscType::Int(0).as_bool(), Some(false));
    }

    #[test]
    fn test_flatten_depth_first() {
        let inner = OscBundle::new(vec![
            OscMessage::new("/b", vec![]).into(),
            OscMessage::new("/c", vec![]).into(),
        ]);
        let outer = OscPacket::Bundle(OscBundle::new(vec![
            OscMessage::new("/a", vec![]).into(),
            inner.into(),
            OscMessage::new("/d", vec![]).into(),
        ]));

        let order: Vec<String> = outer.into_messages().into_iter().map(|m| m.address).collect();
        assert_eq!(order, vec!["/a", "/b", "/c", "/d"]);
    }
}
