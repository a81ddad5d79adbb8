//! Msgpack codec for protocol frames
//!
//! The transport delivers one complete encoded frame per message, so there is
//! no length prefix beyond what msgpack itself carries.

use std::borrow::Cow;
use std::collections::BTreeMap;

use std::fmt;

use bytes::Bytes;
use serde::de::{IgnoredAny, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use serde_bytes::ByteBuf;

use crate::error::ProtocolError;
use crate::frame::{FrameHeader, PropValue, Properties, Status, DEFAULT_MAX_FRAME_SIZE};
use crate::message::{MessageType, ProtoType};
use crate::session::SessionId;

/// A complete frame with header and body
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Routing and status metadata
    pub header: FrameHeader,
    /// Opaque payload; `None` is encoded as msgpack nil
    pub body: Option<Bytes>,
}

impl Frame {
    /// Create a frame carrying a body
    pub fn new(header: FrameHeader, body: impl Into<Bytes>) -> Self {
        Self {
            header,
            body: Some(body.into()),
        }
    }

    /// Create a frame with a nil body
    pub fn empty(header: FrameHeader) -> Self {
        Self { header, body: None }
    }

    pub fn message_type(&self) -> Option<&MessageType> {
        self.header.message_type.as_ref()
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.header.session_id.as_ref()
    }

    pub fn properties(&self) -> Option<&Properties> {
        self.header.properties.as_ref()
    }

    pub fn status(&self) -> Option<Status> {
        self.header.status()
    }

    /// Body bytes, empty when the body is nil
    pub fn body_bytes(&self) -> &[u8] {
        self.body.as_deref().unwrap_or_default()
    }

    /// Body decoded as UTF-8, replacing invalid sequences
    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.body_bytes())
    }
}

#[derive(Serialize)]
struct WireFrameRef<'a> {
    hdr: &'a FrameHeader,
    #[serde(with = "serde_bytes")]
    body: Option<&'a [u8]>,
}

/// Top level of a received frame; only a mapping is a frame
#[derive(Deserialize)]
#[serde(untagged)]
enum RawFrame {
    Map(WireFrame),
    Other(IgnoredAny),
}

struct WireFrame {
    hdr: Option<RawHeader>,
    body: Option<ByteBuf>,
}

impl<'de> Deserialize<'de> for WireFrame {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(WireFrameVisitor)
    }
}

struct WireFrameVisitor;

impl<'de> Visitor<'de> for WireFrameVisitor {
    type Value = WireFrame;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a mapping with keys hdr and body")
    }

    fn visit_map<A>(self, mut map: A) -> Result<WireFrame, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut frame = WireFrame {
            hdr: None,
            body: None,
        };
        while let Some(key) = map.next_key::<String>()? {
            match key.as_str() {
                "hdr" => frame.hdr = map.next_value()?,
                "body" => frame.body = map.next_value()?,
                _ => {
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }
        Ok(frame)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawHeader {
    Map(BTreeMap<String, PropValue>),
    Other(IgnoredAny),
}

impl RawHeader {
    fn into_header(self) -> Result<FrameHeader, ProtocolError> {
        let mut fields = match self {
            RawHeader::Map(fields) => fields,
            RawHeader::Other(_) => {
                return Err(ProtocolError::MalformedHeader(
                    "header is not a mapping".to_string(),
                ))
            }
        };

        let protocol = match take_field(&mut fields, "proto") {
            Some(PropValue::Int(value)) => u16::try_from(value).map(ProtoType).map_err(|_| {
                ProtocolError::MalformedHeader(format!("proto {} out of range", value))
            })?,
            Some(PropValue::UInt(value)) => {
                return Err(ProtocolError::MalformedHeader(format!(
                    "proto {} out of range",
                    value
                )))
            }
            Some(_) => return Err(malformed_field("proto", "an integer")),
            None => return Err(ProtocolError::MalformedHeader("missing proto".to_string())),
        };

        let message_type = match take_field(&mut fields, "typ") {
            Some(PropValue::Str(tag)) => Some(MessageType::from(tag)),
            Some(_) => return Err(malformed_field("typ", "a string")),
            None => None,
        };

        let session_id = match take_field(&mut fields, "sid") {
            Some(PropValue::Str(sid)) => Some(SessionId::from(sid)),
            Some(_) => return Err(malformed_field("sid", "a string")),
            None => None,
        };

        let properties = match take_field(&mut fields, "props") {
            Some(PropValue::Map(props)) => Some(Properties::from(props)),
            Some(_) => return Err(malformed_field("props", "a mapping")),
            None => None,
        };

        Ok(FrameHeader {
            protocol,
            message_type,
            session_id,
            properties,
        })
    }
}

/// Remove a header field, treating nil as absent
fn take_field(fields: &mut BTreeMap<String, PropValue>, key: &str) -> Option<PropValue> {
    fields.remove(key).filter(|value| *value != PropValue::Nil)
}

fn malformed_field(field: &str, expected: &str) -> ProtocolError {
    ProtocolError::MalformedHeader(format!("{} is not {}", field, expected))
}

/// Codec bound to a single sub-protocol
#[derive(Debug, Clone)]
pub struct FrameCodec {
    protocol: ProtoType,
    max_frame_size: usize,
}

impl FrameCodec {
    /// Create a codec for the given protocol
    pub fn new(protocol: ProtoType) -> Self {
        Self {
            protocol,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    pub fn with_max_frame_size(mut self, max_frame_size: usize) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }

    pub fn protocol(&self) -> ProtoType {
        self.protocol
    }

    /// Header for this codec's protocol
    pub fn header(&self, message_type: MessageType) -> FrameHeader {
        FrameHeader::new(self.protocol, message_type)
    }

    /// Encode a frame into one msgpack blob
    pub fn encode(&self, frame: &Frame) -> Result<Vec<u8>, ProtocolError> {
        self.check_protocol(frame.header.protocol)?;

        let wire = WireFrameRef {
            hdr: &frame.header,
            body: frame.body.as_deref(),
        };
        let buf = rmp_serde::to_vec_named(&wire)?;
        self.check_size(buf.len())?;

        tracing::trace!(
            "Encoded {:?} frame ({} bytes)",
            frame.header.message_type,
            buf.len()
        );
        Ok(buf)
    }

    /// Decode one msgpack blob into a frame
    pub fn decode(&self, data: &[u8]) -> Result<Frame, ProtocolError> {
        self.check_size(data.len())?;

        let wire = match rmp_serde::from_slice(data)? {
            RawFrame::Map(wire) => wire,
            RawFrame::Other(_) => {
                return Err(ProtocolError::MalformedHeader(
                    "frame is not a mapping".to_string(),
                ))
            }
        };
        let header = wire
            .hdr
            .ok_or_else(|| ProtocolError::MalformedHeader("missing header".to_string()))?
            .into_header()?;
        self.check_protocol(header.protocol)?;

        tracing::trace!(
            "Decoded {:?} frame ({} bytes)",
            header.message_type,
            data.len()
        );
        Ok(Frame {
            header,
            body: wire.body.map(|body| Bytes::from(body.into_vec())),
        })
    }

    fn check_protocol(&self, actual: ProtoType) -> Result<(), ProtocolError> {
        if actual != self.protocol {
            return Err(ProtocolError::ProtocolMismatch {
                expected: self.protocol,
                actual,
            });
        }
        Ok(())
    }

    fn check_size(&self, size: usize) -> Result<(), ProtocolError> {
        if size > self.max_frame_size {
            return Err(ProtocolError::FrameTooLarge {
                size,
                max: self.max_frame_size,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::PROP_USER_ID;

    fn shell_codec() -> FrameCodec {
        FrameCodec::new(ProtoType::SHELL)
    }

    #[test]
    fn test_codec_roundtrip() {
        let codec = shell_codec();

        let mut props = Properties::with_status(Status::Normal);
        props.insert(PROP_USER_ID, "tester");
        let header = codec
            .header(MessageType::Shell)
            .with_session(Some(SessionId::from("5c3b2a")))
            .with_properties(props);
        let frame = Frame::new(header, Bytes::from_static(b"\x00\xffls -la\n"));

        let buf = codec.encode(&frame).unwrap();
        let decoded = codec.decode(&buf).unwrap();

        assert_eq!(decoded, frame);
        assert_eq!(decoded.body_bytes(), b"\x00\xffls -la\n");
        assert_eq!(decoded.status(), Some(Status::Normal));
        assert_eq!(decoded.session_id(), Some(&SessionId::from("5c3b2a")));
    }

    #[test]
    fn test_nil_body_stays_nil() {
        let codec = shell_codec();
        let frame = Frame::empty(codec.header(MessageType::Stop));

        let decoded = codec.decode(&codec.encode(&frame).unwrap()).unwrap();
        assert!(decoded.body.is_none());
        assert!(decoded.body_bytes().is_empty());
    }

    #[test]
    fn test_wire_layout_is_named_map() {
        let codec = shell_codec();
        let frame = Frame::empty(codec.header(MessageType::Stop));

        let expected: &[u8] = &[
            0x82, // map(2)
            0xa3, b'h', b'd', b'r', 0x84, // "hdr": map(4)
            0xa5, b'p', b'r', b'o', b't', b'o', 0x01, // "proto": 1
            0xa3, b't', b'y', b'p', 0xa4, b's', b't', b'o', b'p', // "typ": "stop"
            0xa3, b's', b'i', b'd', 0xc0, // "sid": nil
            0xa5, b'p', b'r', b'o', b'p', b's', 0xc0, // "props": nil
            0xa4, b'b', b'o', b'd', b'y', 0xc0, // "body": nil
        ];
        assert_eq!(codec.encode(&frame).unwrap(), expected);
        assert_eq!(codec.decode(expected).unwrap(), frame);
    }

    #[derive(Serialize)]
    struct PeerHeader {
        proto: u16,
        typ: &'static str,
        sid: &'static str,
        props: BTreeMap<&'static str, i64>,
    }

    #[derive(Serialize)]
    struct PeerFrame<H> {
        hdr: H,
        body: ByteBuf,
    }

    #[test]
    fn test_decodes_peer_encoded_frame() {
        let peer = PeerFrame {
            hdr: PeerHeader {
                proto: 1,
                typ: "new",
                sid: "c0ffee",
                props: BTreeMap::from([("status", 2)]),
            },
            body: ByteBuf::from(b"shell is already running".to_vec()),
        };
        let buf = rmp_serde::to_vec_named(&peer).unwrap();

        let frame = shell_codec().decode(&buf).unwrap();
        assert_eq!(frame.message_type(), Some(&MessageType::New));
        assert_eq!(frame.session_id().map(SessionId::as_str), Some("c0ffee"));
        assert!(frame.header.is_error());
        assert_eq!(frame.body_text(), "shell is already running");
    }

    #[test]
    fn test_string_body_is_accepted() {
        #[derive(Serialize)]
        struct TextFrame {
            hdr: BTreeMap<&'static str, PropValue>,
            body: &'static str,
        }

        let text = TextFrame {
            hdr: BTreeMap::from([("proto", PropValue::Int(1)), ("typ", "shell".into())]),
            body: "hi\n",
        };
        let frame = shell_codec()
            .decode(&rmp_serde::to_vec_named(&text).unwrap())
            .unwrap();
        assert_eq!(frame.body_bytes(), b"hi\n");
        assert!(frame.session_id().is_none());
    }

    #[test]
    fn test_protocol_mismatch() {
        let sender = FrameCodec::new(ProtoType::PORT_FORWARD);
        let frame = Frame::new(sender.header(MessageType::New), Bytes::from_static(b"x"));
        let buf = sender.encode(&frame).unwrap();

        let result = shell_codec().decode(&buf);
        assert!(matches!(
            result,
            Err(ProtocolError::ProtocolMismatch {
                expected: ProtoType::SHELL,
                actual: ProtoType::PORT_FORWARD,
            })
        ));
    }

    #[test]
    fn test_encode_rejects_foreign_header() {
        let frame = Frame::empty(FrameHeader::new(ProtoType::CONTROL, MessageType::Ping));
        assert!(matches!(
            shell_codec().encode(&frame),
            Err(ProtocolError::ProtocolMismatch { .. })
        ));
    }

    #[test]
    fn test_missing_header() {
        #[derive(Serialize)]
        struct NoHeader {
            body: ByteBuf,
        }

        let buf = rmp_serde::to_vec_named(&NoHeader {
            body: ByteBuf::from(vec![1, 2, 3]),
        })
        .unwrap();
        assert!(matches!(
            shell_codec().decode(&buf),
            Err(ProtocolError::MalformedHeader(_))
        ));
    }

    #[test]
    fn test_positional_array_frame_rejected() {
        let hdr = BTreeMap::from([("proto", PropValue::Int(1)), ("typ", "new".into())]);
        let buf = rmp_serde::to_vec(&(hdr, ByteBuf::from(b"x".to_vec()))).unwrap();
        assert!(matches!(
            shell_codec().decode(&buf),
            Err(ProtocolError::MalformedHeader(_))
        ));
    }

    #[test]
    fn test_binary_props_survive_roundtrip() {
        let codec = shell_codec();
        let mut props = Properties::with_status(Status::Normal);
        props.insert("blob", PropValue::Bytes(ByteBuf::from(b"abc".to_vec())));
        let frame = Frame::empty(codec.header(MessageType::Resize).with_properties(props));

        let decoded = codec.decode(&codec.encode(&frame).unwrap()).unwrap();
        assert_eq!(decoded, frame);
        assert!(matches!(
            decoded.properties().and_then(|p| p.get("blob")),
            Some(PropValue::Bytes(_))
        ));
    }

    #[test]
    fn test_binary_session_id_rejected() {
        let hdr = BTreeMap::from([
            ("proto".to_string(), PropValue::Int(1)),
            ("sid".to_string(), PropValue::Bytes(ByteBuf::from(b"abc".to_vec()))),
        ]);
        let buf =
            rmp_serde::to_vec_named(&BTreeMap::from([("hdr", PropValue::Map(hdr))])).unwrap();
        assert!(matches!(
            shell_codec().decode(&buf),
            Err(ProtocolError::MalformedHeader(_))
        ));
    }

    #[test]
    fn test_header_not_a_mapping() {
        for hdr in [
            PropValue::Int(5),
            PropValue::Str("hdr".to_string()),
            PropValue::List(vec![PropValue::Int(1), PropValue::Str("new".to_string())]),
        ] {
            let buf = rmp_serde::to_vec_named(&BTreeMap::from([("hdr", hdr)])).unwrap();
            assert!(matches!(
                shell_codec().decode(&buf),
                Err(ProtocolError::MalformedHeader(_))
            ));
        }
    }

    #[test]
    fn test_header_field_types() {
        let bad_proto = BTreeMap::from([("proto", PropValue::Str("1".to_string()))]);
        let bad_sid = BTreeMap::from([("proto", PropValue::Int(1)), ("sid", PropValue::Int(9))]);

        for hdr in [bad_proto, bad_sid] {
            let buf =
                rmp_serde::to_vec_named(&BTreeMap::from([("hdr", PropValue::Map(to_owned(hdr)))]))
                    .unwrap();
            assert!(matches!(
                shell_codec().decode(&buf),
                Err(ProtocolError::MalformedHeader(_))
            ));
        }
    }

    fn to_owned(map: BTreeMap<&str, PropValue>) -> BTreeMap<String, PropValue> {
        map.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn test_top_level_garbage() {
        let buf = rmp_serde::to_vec(&42u8).unwrap();
        assert!(matches!(
            shell_codec().decode(&buf),
            Err(ProtocolError::MalformedHeader(_))
        ));

        assert!(matches!(
            shell_codec().decode(b"\xc1"),
            Err(ProtocolError::Decode(_))
        ));
    }

    #[test]
    fn test_frame_size_limit() {
        let codec = shell_codec().with_max_frame_size(64);
        let frame = Frame::new(codec.header(MessageType::Shell), vec![b'a'; 128]);
        assert!(matches!(
            codec.encode(&frame),
            Err(ProtocolError::FrameTooLarge { max: 64, .. })
        ));
    }
}
