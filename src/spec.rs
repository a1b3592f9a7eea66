//! Per-version protocol tables.
//!
//! Single source of truth for the commands, headers, escape rules and wire
//! bytes of STOMP 1.0 and 1.1. The codec, the command factory and the
//! session all consult these tables instead of hard-coding verb strings.

use std::fmt;

use crate::error::StompError;

/// Wire versions spoken by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Version {
    V1_0,
    V1_1,
}

impl Version {
    /// All versions this crate supports, ascending.
    pub const SUPPORTED: [Version; 2] = [Version::V1_0, Version::V1_1];

    /// The version assumed when a CONNECTED frame carries no `version`
    /// header.
    pub const DEFAULT: Version = Version::V1_0;

    pub fn as_str(&self) -> &'static str {
        match self {
            Version::V1_0 => "1.0",
            Version::V1_1 => "1.1",
        }
    }

    /// Parse a `version` header value.
    pub fn parse(value: &str) -> Result<Version, StompError> {
        match value.trim() {
            "1.0" => Ok(Version::V1_0),
            "1.1" => Ok(Version::V1_1),
            other => Err(StompError::UnsupportedVersion(other.to_string())),
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wire byte constants.
pub const LINE_DELIMITER: u8 = b'\n';
pub const CARRIAGE_RETURN: u8 = b'\r';
pub const FRAME_DELIMITER: u8 = 0x00;
pub const HEADER_SEPARATOR: u8 = b':';
pub const ESCAPE_CHARACTER: u8 = b'\\';

/// Protocol command names.
pub mod command {
    pub const CONNECT: &str = "CONNECT";
    pub const STOMP: &str = "STOMP";
    pub const SEND: &str = "SEND";
    pub const SUBSCRIBE: &str = "SUBSCRIBE";
    pub const UNSUBSCRIBE: &str = "UNSUBSCRIBE";
    pub const ACK: &str = "ACK";
    pub const NACK: &str = "NACK";
    pub const BEGIN: &str = "BEGIN";
    pub const COMMIT: &str = "COMMIT";
    pub const ABORT: &str = "ABORT";
    pub const DISCONNECT: &str = "DISCONNECT";

    pub const CONNECTED: &str = "CONNECTED";
    pub const MESSAGE: &str = "MESSAGE";
    pub const RECEIPT: &str = "RECEIPT";
    pub const ERROR: &str = "ERROR";
}

/// Protocol header names.
pub mod header {
    pub const ACCEPT_VERSION: &str = "accept-version";
    pub const VERSION: &str = "version";
    pub const HOST: &str = "host";
    pub const LOGIN: &str = "login";
    pub const PASSCODE: &str = "passcode";
    pub const SESSION: &str = "session";
    pub const SERVER: &str = "server";
    pub const HEART_BEAT: &str = "heart-beat";
    pub const DESTINATION: &str = "destination";
    pub const ID: &str = "id";
    pub const ACK: &str = "ack";
    pub const SUBSCRIPTION: &str = "subscription";
    pub const MESSAGE_ID: &str = "message-id";
    pub const RECEIPT: &str = "receipt";
    pub const RECEIPT_ID: &str = "receipt-id";
    pub const TRANSACTION: &str = "transaction";
    pub const CONTENT_LENGTH: &str = "content-length";
    pub const MESSAGE: &str = "message";
}

use command::*;

const CLIENT_COMMANDS_1_0: &[&str] = &[
    CONNECT,
    SEND,
    SUBSCRIBE,
    UNSUBSCRIBE,
    ACK,
    BEGIN,
    COMMIT,
    ABORT,
    DISCONNECT,
];

const CLIENT_COMMANDS_1_1: &[&str] = &[
    CONNECT,
    STOMP,
    SEND,
    SUBSCRIBE,
    UNSUBSCRIBE,
    ACK,
    NACK,
    BEGIN,
    COMMIT,
    ABORT,
    DISCONNECT,
];

const SERVER_COMMANDS: &[&str] = &[CONNECTED, MESSAGE, RECEIPT, ERROR];

/// Commands a client may put on the wire under `version`.
pub fn client_commands(version: Version) -> &'static [&'static str] {
    match version {
        Version::V1_0 => CLIENT_COMMANDS_1_0,
        Version::V1_1 => CLIENT_COMMANDS_1_1,
    }
}

/// Commands a broker may put on the wire. Identical for both versions.
pub fn server_commands(_version: Version) -> &'static [&'static str] {
    SERVER_COMMANDS
}

/// Whether `command` is a recognized wire command (either direction) under
/// `version`.
pub fn is_valid_command(version: Version, command: &str) -> bool {
    client_commands(version).contains(&command) || server_commands(version).contains(&command)
}

/// Commands that may carry a body. Everything else must have an empty body.
pub fn body_allowed(command: &str) -> bool {
    matches!(command, SEND | MESSAGE | ERROR)
}

/// Header escape table for `version`: `(character, escape letter)` pairs.
/// A character `c` with letter `l` is written `\l` on the wire. Empty under
/// 1.0, which has no escaping.
pub fn escaped_characters(version: Version) -> &'static [(u8, u8)] {
    match version {
        Version::V1_0 => &[],
        Version::V1_1 => &[(b'\\', b'\\'), (b'\n', b'n'), (b':', b'c')],
    }
}

/// Commands exempt from header escaping under 1.1. The 1.1 specification
/// keeps CONNECT and CONNECTED byte-compatible with 1.0 brokers.
pub fn escape_exempt(command: &str) -> bool {
    matches!(command, CONNECT | CONNECTED)
}

/// Headers that must be present on `command` under `version`. Consulted by
/// the builders and validators in [`crate::commands`].
pub fn required_headers(version: Version, command: &str) -> &'static [&'static str] {
    match (command, version) {
        (SEND, _) => &[header::DESTINATION],
        (SUBSCRIBE, Version::V1_0) => &[header::DESTINATION],
        (SUBSCRIBE, Version::V1_1) => &[header::DESTINATION, header::ID],
        (UNSUBSCRIBE, Version::V1_1) => &[header::ID],
        (ACK, Version::V1_0) => &[header::MESSAGE_ID],
        (ACK, Version::V1_1) => &[header::MESSAGE_ID, header::SUBSCRIPTION],
        (NACK, Version::V1_1) => &[header::MESSAGE_ID, header::SUBSCRIPTION],
        (BEGIN, _) | (COMMIT, _) | (ABORT, _) => &[header::TRANSACTION],
        (MESSAGE, Version::V1_0) => &[header::MESSAGE_ID, header::DESTINATION],
        (MESSAGE, Version::V1_1) => {
            &[header::MESSAGE_ID, header::DESTINATION, header::SUBSCRIPTION]
        }
        (RECEIPT, _) => &[header::RECEIPT_ID],
        _ => &[],
    }
}
