//! Stateless builders for client frames and validators for broker frames.
//!
//! Every function here is pure: the caller passes the negotiated (or
//! requested) version explicitly, and nothing in this module touches
//! session state. The [`crate::session::Session`] wraps these with its
//! registries; broker-side code can reuse them directly.

use crate::codec::StompItem;
use crate::error::StompError;
use crate::frame::Frame;
use crate::spec::{self, command, header, Version};

/// Append caller-supplied extension headers, refusing the ones the builder
/// owns.
fn merge(
    mut frame: Frame,
    extras: &[(String, String)],
    reserved: &[&str],
) -> Result<Frame, StompError> {
    for (name, value) in extras {
        if reserved.iter().any(|r| r == name) {
            return Err(StompError::Protocol(format!(
                "reserved header [{}] must not be set on {}",
                name, frame.command
            )));
        }
        frame = frame.header(name, value);
    }
    Ok(frame)
}

/// Check the version table of required headers against a built frame.
fn require_headers(frame: &Frame, version: Version) -> Result<(), StompError> {
    for name in spec::required_headers(version, &frame.command) {
        if !frame.has_header(name) {
            return Err(StompError::Protocol(format!(
                "missing required header [{}] in {} frame (version {})",
                name, frame.command, version
            )));
        }
    }
    Ok(())
}

fn missing_header(frame: &Frame, name: &str, version: Version) -> StompError {
    StompError::Protocol(format!(
        "missing required header [{}] in {} frame (version {})",
        name, frame.command, version
    ))
}

fn expect_command(frame: &Frame, expected: &str) -> Result<(), StompError> {
    if frame.command != expected {
        return Err(StompError::Protocol(format!(
            "expected {} frame, got [{}]",
            expected, frame.command
        )));
    }
    Ok(())
}

/// Build a CONNECT frame for the given requested version set.
///
/// A 1.0-only request stays byte-compatible with 1.0 brokers: no
/// `accept-version`, no `host`, no `heart-beat`. Otherwise
/// `accept-version` lists the requested versions ascending and the virtual
/// host and heart-beat intent are included when given.
pub fn connect(
    versions: &[Version],
    host: Option<&str>,
    login: Option<&str>,
    passcode: Option<&str>,
    heart_beat: Option<(u64, u64)>,
    headers: &[(String, String)],
) -> Result<Frame, StompError> {
    if versions.is_empty() {
        return Err(StompError::Protocol(
            "at least one version must be requested".to_string(),
        ));
    }
    let mut requested = versions.to_vec();
    requested.sort();
    requested.dedup();
    let one_zero_only = requested == [Version::V1_0];

    let mut frame = Frame::new(command::CONNECT);
    if !one_zero_only {
        let accepted = requested
            .iter()
            .map(|v| v.as_str())
            .collect::<Vec<_>>()
            .join(",");
        frame = frame.header(header::ACCEPT_VERSION, accepted);
        if let Some(host) = host {
            frame = frame.header(header::HOST, host);
        }
    }
    if let Some(login) = login {
        frame = frame.header(header::LOGIN, login);
    }
    if let Some(passcode) = passcode {
        frame = frame.header(header::PASSCODE, passcode);
    }
    if let Some((cx, cy)) = heart_beat {
        if one_zero_only {
            return Err(StompError::Protocol(
                "heart-beats are not available in version 1.0".to_string(),
            ));
        }
        frame = frame.header(header::HEART_BEAT, format!("{},{}", cx, cy));
    }
    merge(
        frame,
        headers,
        &[
            header::ACCEPT_VERSION,
            header::HOST,
            header::LOGIN,
            header::PASSCODE,
            header::HEART_BEAT,
            header::RECEIPT,
        ],
    )
}

/// Build a SEND frame. The broker assigns `message-id` on delivery, so the
/// caller must not set it here.
pub fn send(
    destination: &str,
    body: impl Into<Vec<u8>>,
    headers: &[(String, String)],
) -> Result<Frame, StompError> {
    let frame = Frame::new(command::SEND)
        .header(header::DESTINATION, destination)
        .set_body(body);
    merge(frame, headers, &[header::DESTINATION, header::MESSAGE_ID])
}

/// Build a SUBSCRIBE frame. Under 1.1 the caller must supply the `id`
/// header (the subscription token) in `headers`.
pub fn subscribe(
    destination: &str,
    headers: &[(String, String)],
    version: Version,
) -> Result<Frame, StompError> {
    let frame = Frame::new(command::SUBSCRIBE).header(header::DESTINATION, destination);
    let frame = merge(frame, headers, &[header::DESTINATION])?;
    require_headers(&frame, version)?;
    Ok(frame)
}

/// Build an UNSUBSCRIBE frame, by token id or by destination (the 1.0
/// fallback when the subscription never carried an id on the wire).
pub fn unsubscribe(
    id: Option<&str>,
    destination: Option<&str>,
    version: Version,
    headers: &[(String, String)],
) -> Result<Frame, StompError> {
    let frame = match (id, destination) {
        (Some(id), _) => Frame::new(command::UNSUBSCRIBE).header(header::ID, id),
        (None, Some(destination)) => {
            if version != Version::V1_0 {
                return Err(StompError::Protocol(format!(
                    "missing required header [{}] in {} frame (version {})",
                    header::ID,
                    command::UNSUBSCRIBE,
                    version
                )));
            }
            Frame::new(command::UNSUBSCRIBE).header(header::DESTINATION, destination)
        }
        (None, None) => {
            return Err(StompError::Protocol(
                "unsubscribe needs a token id or a destination".to_string(),
            ))
        }
    };
    merge(frame, headers, &[header::ID, header::DESTINATION])
}

fn acknowledgement(
    verb: &'static str,
    message_id: &str,
    subscription: Option<&str>,
    version: Version,
    headers: &[(String, String)],
) -> Result<Frame, StompError> {
    let mut frame = Frame::new(verb).header(header::MESSAGE_ID, message_id);
    if version == Version::V1_1 {
        let subscription = subscription.ok_or_else(|| {
            StompError::Protocol(format!(
                "missing required header [{}] in {} frame (version {})",
                header::SUBSCRIPTION,
                verb,
                version
            ))
        })?;
        frame = frame.header(header::SUBSCRIPTION, subscription);
    }
    let frame = merge(frame, headers, &[header::MESSAGE_ID, header::SUBSCRIPTION])?;
    require_headers(&frame, version)?;
    Ok(frame)
}

/// Build an ACK frame. Under 1.1 the subscription token is mandatory.
pub fn ack(
    message_id: &str,
    subscription: Option<&str>,
    version: Version,
    headers: &[(String, String)],
) -> Result<Frame, StompError> {
    acknowledgement(command::ACK, message_id, subscription, version, headers)
}

/// Build a NACK frame. NACK does not exist in 1.0.
pub fn nack(
    message_id: &str,
    subscription: Option<&str>,
    version: Version,
    headers: &[(String, String)],
) -> Result<Frame, StompError> {
    if version == Version::V1_0 {
        return Err(StompError::Protocol(
            "NACK is not available in version 1.0".to_string(),
        ));
    }
    acknowledgement(command::NACK, message_id, subscription, version, headers)
}

fn transaction_frame(
    verb: &'static str,
    transaction: &str,
    headers: &[(String, String)],
) -> Result<Frame, StompError> {
    let frame = Frame::new(verb).header(header::TRANSACTION, transaction);
    merge(frame, headers, &[header::TRANSACTION])
}

pub fn begin(transaction: &str, headers: &[(String, String)]) -> Result<Frame, StompError> {
    transaction_frame(command::BEGIN, transaction, headers)
}

pub fn commit(transaction: &str, headers: &[(String, String)]) -> Result<Frame, StompError> {
    transaction_frame(command::COMMIT, transaction, headers)
}

pub fn abort(transaction: &str, headers: &[(String, String)]) -> Result<Frame, StompError> {
    transaction_frame(command::ABORT, transaction, headers)
}

/// Build a DISCONNECT frame, optionally asking for a closing receipt.
pub fn disconnect(
    receipt: Option<&str>,
    headers: &[(String, String)],
) -> Result<Frame, StompError> {
    let mut frame = Frame::new(command::DISCONNECT);
    if let Some(receipt) = receipt {
        frame = frame.receipt(receipt);
    }
    merge(frame, headers, &[header::RECEIPT])
}

/// A heart-beat pulse. Heart-beats do not exist in 1.0.
pub fn beat(version: Version) -> Result<StompItem, StompError> {
    if version == Version::V1_0 {
        return Err(StompError::Protocol(
            "heart-beats are not available in version 1.0".to_string(),
        ));
    }
    Ok(StompItem::Heartbeat)
}

/// Outcome of validating a CONNECTED frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connected {
    /// The version the broker settled on.
    pub version: Version,
    /// Broker-assigned session id, if any.
    pub session: Option<String>,
    /// Broker product string, if any.
    pub server: Option<String>,
    /// The broker's raw `heart-beat` header, if any.
    pub heart_beat: Option<String>,
}

/// Validate a CONNECTED frame against the requested version set.
///
/// A missing `version` header means the broker speaks 1.0. Whatever the
/// broker names must be a member of `requested`.
pub fn connected(frame: &Frame, requested: &[Version]) -> Result<Connected, StompError> {
    expect_command(frame, command::CONNECTED)?;
    let version = match frame.get_header(header::VERSION) {
        Some(value) => Version::parse(value)?,
        None => Version::DEFAULT,
    };
    if !requested.contains(&version) {
        return Err(StompError::UnsupportedVersion(version.as_str().to_string()));
    }
    Ok(Connected {
        version,
        session: frame.get_header(header::SESSION).map(str::to_string),
        server: frame.get_header(header::SERVER).map(str::to_string),
        heart_beat: frame.get_header(header::HEART_BEAT).map(str::to_string),
    })
}

/// Identifying headers of a validated MESSAGE frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub message_id: String,
    pub destination: String,
    /// Subscription token; always present under 1.1.
    pub subscription: Option<String>,
}

/// Validate a MESSAGE frame and extract its identifying headers.
pub fn message(frame: &Frame, version: Version) -> Result<Message, StompError> {
    expect_command(frame, command::MESSAGE)?;
    require_headers(frame, version)?;
    let message_id = frame
        .get_header(header::MESSAGE_ID)
        .ok_or_else(|| missing_header(frame, header::MESSAGE_ID, version))?;
    let destination = frame
        .get_header(header::DESTINATION)
        .ok_or_else(|| missing_header(frame, header::DESTINATION, version))?;
    Ok(Message {
        message_id: message_id.to_string(),
        destination: destination.to_string(),
        subscription: frame.get_header(header::SUBSCRIPTION).map(str::to_string),
    })
}

/// Validate a RECEIPT frame and return its `receipt-id`.
pub fn receipt(frame: &Frame, version: Version) -> Result<String, StompError> {
    expect_command(frame, command::RECEIPT)?;
    require_headers(frame, version)?;
    let receipt_id = frame
        .get_header(header::RECEIPT_ID)
        .ok_or_else(|| missing_header(frame, header::RECEIPT_ID, version))?;
    Ok(receipt_id.to_string())
}

/// Validate an ERROR frame and return its `message` header, when present.
/// Details beyond that stay in the frame body for the caller.
pub fn error(frame: &Frame) -> Result<Option<String>, StompError> {
    expect_command(frame, command::ERROR)?;
    Ok(frame.get_header(header::MESSAGE).map(str::to_string))
}
