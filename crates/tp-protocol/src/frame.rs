//! Frame header and out-of-band properties
//!
//! On the wire a header is a msgpack map:
//!
//! ```text
//! { "proto": <int>, "typ": <str|nil>, "sid": <str|nil>, "props": <map|nil> }
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use serde_bytes::ByteBuf;

use crate::message::{MessageType, ProtoType, TerminalSize};
use crate::session::SessionId;

/// Default upper bound for one encoded frame (1 MiB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Property key carrying the reply status
pub const PROP_STATUS: &str = "status";
/// Property key carrying the terminal width in columns
pub const PROP_TERMINAL_WIDTH: &str = "terminal_width";
/// Property key carrying the terminal height in rows
pub const PROP_TERMINAL_HEIGHT: &str = "terminal_height";
/// Property key carrying the requesting user
pub const PROP_USER_ID: &str = "user_id";

/// Reply status distinguishing normal replies from application rejections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    /// Request succeeded
    Normal = 1,
    /// Request was rejected by the peer
    Error = 2,
}

impl Status {
    /// Convert to the wire integer
    pub fn as_i64(&self) -> i64 {
        *self as i64
    }

    /// Convert from the wire integer
    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            1 => Some(Self::Normal),
            2 => Some(Self::Error),
            _ => None,
        }
    }
}

/// A single property value.
///
/// Mirrors the msgpack value space the peer may put into `props`. `bin` and
/// `str` stay distinct in both directions.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PropValue {
    Nil,
    Bool(bool),
    Int(i64),
    /// Unsigned integer above `i64::MAX`
    UInt(u64),
    Float(f64),
    Str(String),
    List(Vec<PropValue>),
    Bytes(ByteBuf),
    Map(BTreeMap<String, PropValue>),
}

impl<'de> Deserialize<'de> for PropValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(PropValueVisitor)
    }
}

struct PropValueVisitor;

impl<'de> Visitor<'de> for PropValueVisitor {
    type Value = PropValue;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a msgpack value with string map keys")
    }

    fn visit_unit<E: de::Error>(self) -> Result<PropValue, E> {
        Ok(PropValue::Nil)
    }

    fn visit_none<E: de::Error>(self) -> Result<PropValue, E> {
        Ok(PropValue::Nil)
    }

    fn visit_some<D>(self, deserializer: D) -> Result<PropValue, D::Error>
    where
        D: Deserializer<'de>,
    {
        PropValue::deserialize(deserializer)
    }

    fn visit_bool<E: de::Error>(self, value: bool) -> Result<PropValue, E> {
        Ok(PropValue::Bool(value))
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<PropValue, E> {
        Ok(PropValue::Int(value))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<PropValue, E> {
        Ok(i64::try_from(value)
            .map(PropValue::Int)
            .unwrap_or(PropValue::UInt(value)))
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> Result<PropValue, E> {
        Ok(PropValue::Float(value))
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<PropValue, E> {
        Ok(PropValue::Str(value.to_string()))
    }

    fn visit_string<E: de::Error>(self, value: String) -> Result<PropValue, E> {
        Ok(PropValue::Str(value))
    }

    fn visit_bytes<E: de::Error>(self, value: &[u8]) -> Result<PropValue, E> {
        Ok(PropValue::Bytes(ByteBuf::from(value)))
    }

    fn visit_byte_buf<E: de::Error>(self, value: Vec<u8>) -> Result<PropValue, E> {
        Ok(PropValue::Bytes(ByteBuf::from(value)))
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<PropValue, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(PropValue::List(items))
    }

    fn visit_map<A>(self, mut map: A) -> Result<PropValue, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut entries = BTreeMap::new();
        while let Some((key, value)) = map.next_entry::<String, PropValue>()? {
            entries.insert(key, value);
        }
        Ok(PropValue::Map(entries))
    }
}

impl PropValue {
    /// Integer value, if this is an integer
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PropValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// String value, if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl From<i64> for PropValue {
    fn from(value: i64) -> Self {
        PropValue::Int(value)
    }
}

impl From<u16> for PropValue {
    fn from(value: u16) -> Self {
        PropValue::Int(i64::from(value))
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        PropValue::Bool(value)
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        PropValue::Str(value.to_string())
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        PropValue::Str(value)
    }
}

impl From<Status> for PropValue {
    fn from(status: Status) -> Self {
        PropValue::Int(status.as_i64())
    }
}

/// Out-of-band metadata attached to a frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Properties(BTreeMap<String, PropValue>);

impl From<BTreeMap<String, PropValue>> for Properties {
    fn from(map: BTreeMap<String, PropValue>) -> Self {
        Self(map)
    }
}

impl Properties {
    /// Create an empty property map
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Property map holding only a status
    pub fn with_status(status: Status) -> Self {
        let mut props = Self::new();
        props.insert(PROP_STATUS, status);
        props
    }

    /// Property map holding terminal dimensions
    pub fn with_terminal_size(size: TerminalSize) -> Self {
        let mut props = Self::new();
        props.insert(PROP_TERMINAL_HEIGHT, size.rows);
        props.insert(PROP_TERMINAL_WIDTH, size.cols);
        props
    }

    pub fn get(&self, key: &str) -> Option<&PropValue> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<PropValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PropValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Reply status, if present and recognised
    pub fn status(&self) -> Option<Status> {
        self.get(PROP_STATUS)
            .and_then(PropValue::as_i64)
            .and_then(Status::from_i64)
    }

    /// Terminal dimensions, if both are present and fit in a `u16`
    pub fn terminal_size(&self) -> Option<TerminalSize> {
        let rows = self.get(PROP_TERMINAL_HEIGHT)?.as_i64()?;
        let cols = self.get(PROP_TERMINAL_WIDTH)?.as_i64()?;
        Some(TerminalSize::new(
            u16::try_from(rows).ok()?,
            u16::try_from(cols).ok()?,
        ))
    }

    pub fn user_id(&self) -> Option<&str> {
        self.get(PROP_USER_ID).and_then(PropValue::as_str)
    }
}

/// Frame header
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameHeader {
    /// Sub-protocol this frame belongs to
    #[serde(rename = "proto")]
    pub protocol: ProtoType,
    /// Operation tag
    #[serde(rename = "typ")]
    pub message_type: Option<MessageType>,
    /// Session this frame belongs to, absent until the peer assigns one
    #[serde(rename = "sid")]
    pub session_id: Option<SessionId>,
    /// Out-of-band metadata
    #[serde(rename = "props")]
    pub properties: Option<Properties>,
}

impl FrameHeader {
    /// Create a header with no session and no properties
    pub fn new(protocol: ProtoType, message_type: MessageType) -> Self {
        Self {
            protocol,
            message_type: Some(message_type),
            session_id: None,
            properties: None,
        }
    }

    pub fn with_session(mut self, session_id: Option<SessionId>) -> Self {
        self.session_id = session_id;
        self
    }

    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = Some(properties);
        self
    }

    /// Set the status property, keeping any other properties
    pub fn with_status(mut self, status: Status) -> Self {
        self.properties
            .get_or_insert_with(Properties::new)
            .insert(PROP_STATUS, status);
        self
    }

    /// Reply status carried in the properties
    pub fn status(&self) -> Option<Status> {
        self.properties.as_ref().and_then(Properties::status)
    }

    /// Whether the peer flagged this frame as an application-level rejection
    pub fn is_error(&self) -> bool {
        self.status() == Some(Status::Error)
    }

    /// Whether the frame carries the given operation tag
    pub fn is(&self, message_type: &MessageType) -> bool {
        self.message_type.as_ref() == Some(message_type)
    }
}
