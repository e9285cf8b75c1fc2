//! Binary wire format.
//!
//! ```text
//! [ MessageType: i32 ]
//! [ PropertyCount: i32 ]
//!   repeated { KeyLength: i32, Key: utf8, ValuePresent: u8, ValueLength: i32, Value: utf8 }
//! [ AttachmentCount: i32 ]
//!   repeated { Length: i32, Bytes }
//! ```
//!
//! All integers are little-endian. An absent value is written as
//! `ValuePresent = 0, ValueLength = 0` with no bytes.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::ProtocolError;
use crate::message_type::MessageType;
use crate::properties::{PropertyBag, keys};
use crate::proxy_message::{Message, ProxyMessage};
use crate::registry;

/// Encodes a message for the wire.
///
/// Fails with [`ProtocolError::Malformed`] when a length does not fit the
/// wire's `i32` length fields.
pub fn serialize(message: &dyn Message) -> Result<Vec<u8>, ProtocolError> {
    encode_envelope(message.envelope())
}

pub fn encode_envelope(envelope: &ProxyMessage) -> Result<Vec<u8>, ProtocolError> {
    let mut buf = BytesMut::with_capacity(64);
    buf.put_i32_le(envelope.message_type().code());

    put_len(&mut buf, envelope.properties.len(), "property count")?;
    for (key, value) in envelope.properties.iter() {
        put_len(&mut buf, key.len(), "property key")?;
        buf.put_slice(key.as_bytes());
        match value {
            Some(value) => {
                buf.put_u8(1);
                put_len(&mut buf, value.len(), "property value")?;
                buf.put_slice(value.as_bytes());
            }
            None => {
                buf.put_u8(0);
                buf.put_i32_le(0);
            }
        }
    }

    put_len(&mut buf, envelope.attachments.len(), "attachment count")?;
    for attachment in &envelope.attachments {
        put_len(&mut buf, attachment.len(), "attachment")?;
        buf.put_slice(attachment);
    }

    Ok(buf.to_vec())
}

/// Decodes a message into its concrete type.
///
/// The type code is checked before anything else is read, so an unknown
/// code fails with [`ProtocolError::UnknownMessageType`] regardless of what
/// follows it. Code 0 is only accepted on a well-formed generic error reply.
pub fn deserialize(bytes: &[u8]) -> Result<Box<dyn Message>, ProtocolError> {
    registry::from_envelope(decode_envelope(bytes)?)
}

pub fn decode_envelope(bytes: &[u8]) -> Result<ProxyMessage, ProtocolError> {
    let mut buf = bytes;
    let code = get_i32(&mut buf, "message type")?;
    let message_type = MessageType::from_code(code).ok_or(ProtocolError::UnknownMessageType(code))?;
    let (properties, attachments) = match decode_body(&mut buf) {
        Ok(body) => body,
        Err(_) if message_type == MessageType::Unspecified => {
            return Err(ProtocolError::UnknownMessageType(code));
        }
        Err(err) => return Err(err),
    };
    Ok(ProxyMessage::with_parts(message_type, properties, attachments))
}

/// Best-effort extraction of `RequestId` from a frame, ignoring its type
/// code. Lets the caller address an error reply to a message it could not
/// decode.
pub fn peek_request_id(bytes: &[u8]) -> Option<i64> {
    let mut buf = bytes;
    get_i32(&mut buf, "message type").ok()?;
    let (properties, _) = decode_body(&mut buf).ok()?;
    properties.raw(keys::REQUEST_ID)??.parse().ok()
}

fn decode_body(buf: &mut &[u8]) -> Result<(PropertyBag, Vec<Vec<u8>>), ProtocolError> {
    let property_count = get_len(buf, "property count")?;
    let mut properties = PropertyBag::new();
    for _ in 0..property_count {
        let key = get_string(buf, "property key")?;
        let present = get_u8(buf, "value flag")?;
        let value_len = get_len(buf, "value length")?;
        let value = match present {
            0 if value_len == 0 => None,
            0 => {
                return Err(ProtocolError::malformed(format!(
                    "absent value for '{key}' has length {value_len}"
                )));
            }
            1 => Some(get_utf8(buf, value_len, "property value")?),
            other => {
                return Err(ProtocolError::malformed(format!(
                    "invalid value flag {other} for '{key}'"
                )));
            }
        };
        properties.set_raw(key, value);
    }

    let attachment_count = get_len(buf, "attachment count")?;
    let mut attachments = Vec::new();
    for _ in 0..attachment_count {
        let len = get_len(buf, "attachment length")?;
        attachments.push(take(buf, len, "attachment")?.to_vec());
    }

    if buf.has_remaining() {
        return Err(ProtocolError::malformed(format!("{} trailing bytes", buf.remaining())));
    }
    Ok((properties, attachments))
}

fn put_len(buf: &mut BytesMut, len: usize, what: &str) -> Result<(), ProtocolError> {
    let len = i32::try_from(len).map_err(|_| {
        ProtocolError::malformed(format!("{what} length {len} exceeds the wire limit"))
    })?;
    buf.put_i32_le(len);
    Ok(())
}

fn get_i32(buf: &mut &[u8], what: &str) -> Result<i32, ProtocolError> {
    if buf.remaining() < 4 {
        return Err(ProtocolError::malformed(format!("truncated {what}")));
    }
    Ok(buf.get_i32_le())
}

fn get_u8(buf: &mut &[u8], what: &str) -> Result<u8, ProtocolError> {
    if !buf.has_remaining() {
        return Err(ProtocolError::malformed(format!("truncated {what}")));
    }
    Ok(buf.get_u8())
}

fn get_len(buf: &mut &[u8], what: &str) -> Result<usize, ProtocolError> {
    let len = get_i32(buf, what)?;
    usize::try_from(len).map_err(|_| ProtocolError::malformed(format!("negative {what} {len}")))
}

fn take<'a>(buf: &mut &'a [u8], len: usize, what: &str) -> Result<&'a [u8], ProtocolError> {
    if buf.remaining() < len {
        return Err(ProtocolError::malformed(format!(
            "truncated {what}: need {len} bytes, have {}",
            buf.remaining()
        )));
    }
    let (head, tail) = buf.split_at(len);
    *buf = tail;
    Ok(head)
}

fn get_utf8(buf: &mut &[u8], len: usize, what: &str) -> Result<String, ProtocolError> {
    let raw = take(buf, len, what)?;
    String::from_utf8(raw.to_vec())
        .map_err(|_| ProtocolError::malformed(format!("{what} is not valid utf-8")))
}

fn get_string(buf: &mut &[u8], what: &str) -> Result<String, ProtocolError> {
    let len = get_len(buf, what)?;
    get_utf8(buf, len, what)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::global::HeartbeatRequest;
    use crate::HasRequestId;

    fn frame(code: i32, rest: &[u8]) -> Vec<u8> {
        let mut bytes = code.to_le_bytes().to_vec();
        bytes.extend_from_slice(rest);
        bytes
    }

    #[test]
    fn empty_message_layout() {
        let bytes = encode_envelope(&ProxyMessage::new(MessageType::PingRequest)).unwrap();
        assert_eq!(bytes, [21, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn absent_value_layout() {
        let mut envelope = ProxyMessage::new(MessageType::PingRequest);
        envelope.properties.set_raw("K", None);
        let bytes = encode_envelope(&envelope).unwrap();
        assert_eq!(
            bytes,
            [21, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0, b'K', 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]
        );
        let back = decode_envelope(&bytes).unwrap();
        assert_eq!(back.properties.raw("K"), Some(None));
    }

    #[test]
    fn unknown_code_fails_before_body() {
        // garbage after the type code must not matter
        let bytes = frame(9999, &[0xff, 0xff]);
        assert_eq!(deserialize(&bytes).unwrap_err(), ProtocolError::UnknownMessageType(9999));
        let bytes = frame(0, &[]);
        assert_eq!(deserialize(&bytes).unwrap_err(), ProtocolError::UnknownMessageType(0));
    }

    #[test]
    fn malformed_inputs() {
        // truncated type code
        assert!(matches!(deserialize(&[1, 0]), Err(ProtocolError::Malformed(_))));
        // negative property count
        let bytes = frame(21, &(-1i32).to_le_bytes());
        assert!(matches!(deserialize(&bytes), Err(ProtocolError::Malformed(_))));
        // trailing byte
        let mut bytes = encode_envelope(&ProxyMessage::new(MessageType::PingRequest)).unwrap();
        bytes.push(0);
        assert!(matches!(deserialize(&bytes), Err(ProtocolError::Malformed(_))));
        // invalid utf-8 key
        let mut body = 1i32.to_le_bytes().to_vec();
        body.extend_from_slice(&1i32.to_le_bytes());
        body.push(0xff);
        body.push(0);
        body.extend_from_slice(&0i32.to_le_bytes());
        body.extend_from_slice(&0i32.to_le_bytes());
        assert!(matches!(deserialize(&frame(21, &body)), Err(ProtocolError::Malformed(_))));
    }

    #[test]
    fn lengths_beyond_i32_are_rejected_on_encode() {
        let mut buf = BytesMut::new();
        put_len(&mut buf, i32::MAX as usize, "attachment").unwrap();
        assert_eq!(buf.as_ref(), i32::MAX.to_le_bytes());

        let err = put_len(&mut buf, i32::MAX as usize + 1, "attachment").unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed(ref m) if m.contains("attachment")));
        // nothing is written for a rejected length
        assert_eq!(buf.len(), 4);
    }

    #[test]
    fn peek_request_id_ignores_type() {
        let mut request = HeartbeatRequest::new();
        request.set_request_id(77);
        let mut bytes = serialize(&request).unwrap();
        bytes[..4].copy_from_slice(&4242i32.to_le_bytes());
        assert!(deserialize(&bytes).is_err());
        assert_eq!(peek_request_id(&bytes), Some(77));
        assert_eq!(peek_request_id(&[1, 2]), None);
    }
}
