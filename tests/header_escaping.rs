//! Header escaping per STOMP 1.1: `\\` → backslash, `\n` → line feed,
//! `\c` → colon. 1.0 has no escaping; CONNECT/CONNECTED are exempt.

use bytes::BytesMut;
use stomp_core::{Frame, StompCodec, StompError, StompItem, Version};
use tokio_util::codec::{Decoder, Encoder};

fn decode_frame(version: Version, raw: &[u8]) -> Frame {
    let mut codec = StompCodec::new(version);
    let mut buf = BytesMut::from(raw);
    match codec.decode(&mut buf).expect("decode failed") {
        Some(StompItem::Frame(frame)) => frame,
        other => panic!("unexpected item: {:?}", other),
    }
}

fn encode_frame(version: Version, frame: Frame) -> Vec<u8> {
    let mut codec = StompCodec::new(version);
    let mut buf = BytesMut::new();
    codec.encode(frame.into(), &mut buf).expect("encode failed");
    buf.to_vec()
}

// ============================================================================
// Decoding (unescape)
// ============================================================================

#[test]
fn unescape_backslash() {
    let frame = decode_frame(Version::V1_1, b"RECEIPT\nreceipt-id:a\\\\b\n\n\0");
    assert_eq!(frame.get_header("receipt-id"), Some("a\\b"));
}

#[test]
fn unescape_newline() {
    let frame = decode_frame(Version::V1_1, b"RECEIPT\nreceipt-id:line1\\nline2\n\n\0");
    assert_eq!(frame.get_header("receipt-id"), Some("line1\nline2"));
}

#[test]
fn unescape_colon() {
    let frame = decode_frame(Version::V1_1, b"RECEIPT\nreceipt-id:key\\cvalue\n\n\0");
    assert_eq!(frame.get_header("receipt-id"), Some("key:value"));
}

#[test]
fn unescape_multiple_sequences() {
    let frame = decode_frame(Version::V1_1, b"RECEIPT\nreceipt-id:a\\nb\\\\c\\cd\n\n\0");
    assert_eq!(frame.get_header("receipt-id"), Some("a\nb\\c:d"));
}

#[test]
fn invalid_escape_is_a_parse_error() {
    let mut codec = StompCodec::new(Version::V1_1);
    let mut buf = BytesMut::from(&b"RECEIPT\nreceipt-id:bad\\tescape\n\n\0"[..]);
    match codec.decode(&mut buf) {
        Err(StompError::Parse { message, .. }) => {
            assert!(message.contains("escape"), "unexpected message: {}", message)
        }
        other => panic!("expected parse error, got {:?}", other),
    }
}

#[test]
fn no_unescaping_under_1_0() {
    let frame = decode_frame(Version::V1_0, b"RECEIPT\nreceipt-id:a\\nb\n\n\0");
    assert_eq!(frame.get_header("receipt-id"), Some("a\\nb"));
}

// ============================================================================
// Encoding (escape)
// ============================================================================

#[test]
fn escape_roundtrip_1_1() {
    for value in ["plain", "with:colon", "with\nnewline", "with\\backslash", ":\n\\"] {
        let frame = Frame::new("SEND")
            .header("destination", "/q")
            .header("note", value);
        let bytes = encode_frame(Version::V1_1, frame);
        let back = decode_frame(Version::V1_1, &bytes);
        assert_eq!(back.get_header("note"), Some(value), "value {:?}", value);
    }
}

#[test]
fn escaped_bytes_on_the_wire() {
    let frame = Frame::new("SEND")
        .header("destination", "/q")
        .header("note", "a:b");
    let bytes = encode_frame(Version::V1_1, frame);
    assert_eq!(bytes, b"SEND\ndestination:/q\nnote:a\\cb\n\n\0");
}

#[test]
fn emit_rejects_colon_value_under_1_0() {
    let mut codec = StompCodec::new(Version::V1_0);
    let frame = Frame::new("SEND")
        .header("destination", "/q")
        .header("note", "a:b");
    let mut buf = BytesMut::new();
    match codec.encode(frame.into(), &mut buf) {
        Err(StompError::Protocol(_)) => {}
        other => panic!("expected protocol error, got {:?}", other),
    }
}

#[test]
fn emit_rejects_newline_value_under_1_0() {
    let mut codec = StompCodec::new(Version::V1_0);
    let frame = Frame::new("SEND")
        .header("destination", "/q")
        .header("note", "a\nb");
    let mut buf = BytesMut::new();
    assert!(codec.encode(frame.into(), &mut buf).is_err());
}

#[test]
fn emit_rejects_bad_header_names() {
    for name in ["a:b", "a\nb"] {
        let mut codec = StompCodec::new(Version::V1_1);
        let frame = Frame::new("SEND")
            .header("destination", "/q")
            .header(name, "v");
        let mut buf = BytesMut::new();
        assert!(codec.encode(frame.into(), &mut buf).is_err(), "name {:?}", name);
    }
}

// ============================================================================
// CONNECT / CONNECTED exemption
// ============================================================================

#[test]
fn connect_headers_are_not_escaped() {
    let frame = Frame::new("CONNECT")
        .header("login", "admin")
        .header("passcode", "pa:ss");
    let bytes = encode_frame(Version::V1_1, frame);
    assert_eq!(bytes, b"CONNECT\nlogin:admin\npasscode:pa:ss\n\n\0");
}

#[test]
fn connected_headers_are_not_unescaped() {
    let frame = decode_frame(Version::V1_1, b"CONNECTED\nserver:x\\cy\n\n\0");
    assert_eq!(frame.get_header("server"), Some("x\\cy"));
}
