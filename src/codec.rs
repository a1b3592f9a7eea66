use std::collections::VecDeque;

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::StompError;
use crate::frame::Frame;
use crate::parser::{self, Scan};
use crate::spec::{self, header, Version};

/// Items produced or consumed by the codec.
///
/// A `StompItem` is either a complete `Frame` or a `Heartbeat` marker for a
/// single inter-frame newline (STOMP 1.1 keep-alive).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StompItem {
    /// A decoded STOMP frame (command + headers + body)
    Frame(Frame),
    /// A single heartbeat pulse (LF)
    Heartbeat,
}

impl From<Frame> for StompItem {
    fn from(frame: Frame) -> Self {
        StompItem::Frame(frame)
    }
}

/// `StompCodec` implements `tokio_util::codec::{Decoder, Encoder}` for the
/// STOMP wire protocol at a fixed negotiated version.
///
/// Responsibilities:
/// - Decode incoming bytes into `StompItem::Frame` or `StompItem::Heartbeat`,
///   validating commands and bodies against the version tables and decoding
///   1.1 header escape sequences.
/// - Support both NUL-terminated frames and frames using the
///   `content-length` header for binary bodies containing NUL bytes.
/// - Encode `StompItem` back into wire bytes, escaping headers and emitting
///   `content-length` when necessary.
///
/// Decoding is strict: the first error poisons the codec and every later
/// call returns the same error. The caller is expected to drop it and open
/// a fresh connection.
pub struct StompCodec {
    version: Version,
    /// Absolute offset of the next unconsumed byte, from the start of the
    /// stream. Parse errors report positions on this scale.
    offset: u64,
    poisoned: Option<(u64, String)>,
}

impl StompCodec {
    pub fn new(version: Version) -> Self {
        Self {
            version,
            offset: 0,
            poisoned: None,
        }
    }

    pub fn version(&self) -> Version {
        self.version
    }

    fn poison(&mut self, offset: u64, message: String) -> StompError {
        self.poisoned = Some((offset, message.clone()));
        StompError::Parse { offset, message }
    }

    /// Turn a structural scan result into a validated `Frame`.
    fn build_frame(
        &self,
        command: Vec<u8>,
        raw_headers: parser::RawHeaders,
        body: Vec<u8>,
    ) -> Result<Frame, String> {
        let command = String::from_utf8(command)
            .map_err(|_| "command is not valid utf8".to_string())?;
        if !spec::is_valid_command(self.version, &command) {
            return Err(format!(
                "invalid command (version {}): {}",
                self.version, command
            ));
        }

        let exempt = spec::escape_exempt(&command);
        let mut headers = Vec::with_capacity(raw_headers.len());
        for (name, value) in raw_headers {
            let (name, value) = if exempt {
                (name, value)
            } else {
                (
                    parser::unescape(self.version, &name)?,
                    parser::unescape(self.version, &value)?,
                )
            };
            let name = String::from_utf8(name)
                .map_err(|_| "header name is not valid utf8".to_string())?;
            let value = String::from_utf8(value)
                .map_err(|_| "header value is not valid utf8".to_string())?;
            headers.push((name, value));
        }

        if !body.is_empty() && !spec::body_allowed(&command) {
            return Err(format!(
                "no body allowed for this command (version {}): {}",
                self.version, command
            ));
        }

        Ok(Frame {
            command,
            headers,
            body,
        })
    }
}

impl Default for StompCodec {
    fn default() -> Self {
        Self::new(Version::DEFAULT)
    }
}

impl Decoder for StompCodec {
    type Item = StompItem;
    type Error = StompError;

    /// Decode the next item from `src`, consuming its bytes.
    ///
    /// Returns `Ok(None)` when more bytes are required; `src` is left
    /// untouched in that case so a frame split across any number of reads
    /// decodes identically to one delivered whole. Inter-frame newlines are
    /// surfaced as `Heartbeat` under 1.1 and swallowed under 1.0, which has
    /// no heart-beats.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some((offset, message)) = &self.poisoned {
            return Err(StompError::Parse {
                offset: *offset,
                message: message.clone(),
            });
        }
        loop {
            match parser::scan(src.as_ref()) {
                Ok(Scan::Partial) => return Ok(None),
                Ok(Scan::Heartbeat { consumed }) => {
                    src.advance(consumed);
                    self.offset += consumed as u64;
                    if self.version == Version::V1_0 {
                        continue;
                    }
                    return Ok(Some(StompItem::Heartbeat));
                }
                Ok(Scan::Frame {
                    command,
                    headers,
                    body,
                    consumed,
                }) => {
                    let frame_start = self.offset;
                    return match self.build_frame(command, headers, body) {
                        Ok(frame) => {
                            src.advance(consumed);
                            self.offset += consumed as u64;
                            Ok(Some(StompItem::Frame(frame)))
                        }
                        Err(message) => Err(self.poison(frame_start, message)),
                    };
                }
                Err(scan_error) => {
                    let offset = self.offset + scan_error.offset as u64;
                    return Err(self.poison(offset, scan_error.message));
                }
            }
        }
    }
}

impl Encoder<StompItem> for StompCodec {
    type Error = StompError;

    /// Append the wire bytes of `item` to `dst`.
    ///
    /// Headers are written in insertion order and escaped per the version
    /// tables (CONNECT is exempt, as on decode). A `content-length` header
    /// is appended for any non-empty body the caller did not size
    /// explicitly, which keeps NUL bytes in bodies unambiguous.
    fn encode(&mut self, item: StompItem, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let frame = match item {
            StompItem::Heartbeat => {
                if self.version == Version::V1_0 {
                    return Err(StompError::Protocol(
                        "heart-beats are not available in version 1.0".to_string(),
                    ));
                }
                dst.put_u8(spec::LINE_DELIMITER);
                return Ok(());
            }
            StompItem::Frame(frame) => frame,
        };

        if frame.command.is_empty() {
            return Err(StompError::Protocol("empty command".to_string()));
        }
        if !spec::is_valid_command(self.version, &frame.command) {
            return Err(StompError::Protocol(format!(
                "invalid command (version {}): {}",
                self.version, frame.command
            )));
        }
        if !frame.body.is_empty() && !spec::body_allowed(&frame.command) {
            return Err(StompError::Protocol(format!(
                "no body allowed for this command (version {}): {}",
                self.version, frame.command
            )));
        }

        let escaping = !spec::escaped_characters(self.version).is_empty()
            && !spec::escape_exempt(&frame.command);
        for (name, value) in &frame.headers {
            // Names must stay splittable on the first colon; values only
            // need to survive the line structure.
            if name.contains(&[':', '\n', '\r'][..]) {
                return Err(StompError::Protocol(format!(
                    "header name not allowed on the wire [{}]",
                    name.escape_default()
                )));
            }
            // 1.1 escaping covers backslash, LF and colon; everything the
            // active rules cannot represent is refused outright.
            let forbidden: &[char] = if escaping {
                &['\r']
            } else if self.version == Version::V1_0 {
                &[':', '\n', '\r']
            } else {
                &['\n', '\r']
            };
            if value.contains(forbidden) {
                return Err(StompError::Protocol(format!(
                    "header value not representable (version {}) [{}]",
                    self.version,
                    value.escape_default()
                )));
            }
        }

        dst.extend_from_slice(frame.command.as_bytes());
        dst.put_u8(spec::LINE_DELIMITER);

        let mut headers = frame.headers;
        let has_length = headers
            .iter()
            .any(|(k, _)| k.eq_ignore_ascii_case(header::CONTENT_LENGTH));
        if !has_length && !frame.body.is_empty() {
            headers.push((
                header::CONTENT_LENGTH.to_string(),
                frame.body.len().to_string(),
            ));
        }

        for (name, value) in headers {
            let (name, value) = if escaping {
                (
                    parser::escape(self.version, &name),
                    parser::escape(self.version, &value),
                )
            } else {
                (name, value)
            };
            dst.extend_from_slice(name.as_bytes());
            dst.put_u8(spec::HEADER_SEPARATOR);
            dst.extend_from_slice(value.as_bytes());
            dst.put_u8(spec::LINE_DELIMITER);
        }

        dst.put_u8(spec::LINE_DELIMITER);
        dst.extend_from_slice(&frame.body);
        dst.put_u8(spec::FRAME_DELIMITER);
        Ok(())
    }
}

/// Push-style incremental parser over a [`StompCodec`].
///
/// The transport feeds arbitrary byte chunks with [`StompParser::add`] and
/// drains decoded items with [`StompParser::get`]. The parser owns its
/// buffer; a frame split across any number of `add` calls parses the same
/// as one delivered whole.
pub struct StompParser {
    codec: StompCodec,
    buffer: BytesMut,
    items: VecDeque<StompItem>,
}

impl StompParser {
    pub fn new(version: Version) -> Self {
        Self {
            codec: StompCodec::new(version),
            buffer: BytesMut::new(),
            items: VecDeque::new(),
        }
    }

    pub fn version(&self) -> Version {
        self.codec.version()
    }

    /// Add a chunk of wire bytes and decode as far as possible.
    ///
    /// On error the parser is poisoned: the same error comes back from
    /// every later `add` until [`StompParser::reset`]. Items decoded before
    /// the error remain readable through [`StompParser::get`].
    pub fn add(&mut self, data: &[u8]) -> Result<(), StompError> {
        self.buffer.extend_from_slice(data);
        while let Some(item) = self.codec.decode(&mut self.buffer)? {
            self.items.push_back(item);
        }
        Ok(())
    }

    /// Whether a decoded item is waiting.
    pub fn can_read(&self) -> bool {
        !self.items.is_empty()
    }

    /// Next decoded item, if any.
    pub fn get(&mut self) -> Option<StompItem> {
        self.items.pop_front()
    }

    /// Discard all state, including partially and fully decoded frames,
    /// and start a fresh stream at the same version.
    pub fn reset(&mut self) {
        self.codec = StompCodec::new(self.codec.version());
        self.buffer.clear();
        self.items.clear();
    }
}
