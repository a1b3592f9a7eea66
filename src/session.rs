//! Session state machine: connection lifecycle, subscriptions,
//! transactions, receipts and replay after reconnect.
//!
//! A `Session` is a plain synchronous data structure. It performs no I/O
//! and schedules nothing; the surrounding transport feeds broker frames in
//! and puts the returned frames on the wire.

use std::fmt;
use std::mem;
use std::time::{Duration, Instant};

use crate::commands;
use crate::config::Config;
use crate::error::StompError;
use crate::frame::Frame;
use crate::spec::{header, Version};

/// Lifecycle states of a [`Session`].
///
/// `Disconnected` is terminal for the connection; [`Session::reset`]
/// starts the next connection attempt over from `Initial`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Initial,
    Connecting,
    Connected,
    Disconnecting,
    Disconnected,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SessionState::Initial => "initial",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
            SessionState::Disconnecting => "disconnecting",
            SessionState::Disconnected => "disconnected",
        })
    }
}

/// Handle identifying one subscription within a session.
///
/// Under 1.1 the caller always names the subscription with the `id`
/// header, giving an `Id` token. Under 1.0 a subscription without an id
/// gets a `Destination` token, which never appears on the wire; the
/// matching UNSUBSCRIBE falls back to the destination header.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SubscriptionToken {
    Id(String),
    Destination(String),
}

impl fmt::Display for SubscriptionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubscriptionToken::Id(id) => write!(f, "id={}", id),
            SubscriptionToken::Destination(destination) => {
                write!(f, "destination={}", destination)
            }
        }
    }
}

/// One entry of the subscription registry.
///
/// `context` is an opaque handle owned by the caller. The session stores
/// it untouched and hands it back from [`Session::replay`] so upper layers
/// can re-bind their handlers after a reconnect.
#[derive(Debug, Clone)]
pub struct Subscription<C> {
    pub token: SubscriptionToken,
    pub destination: String,
    /// The extension headers originally passed to SUBSCRIBE.
    pub headers: Vec<(String, String)>,
    pub context: C,
}

/// Bookkeeping dropped by [`Session::reset`]: in-flight work that cannot
/// survive a reconnect and is reported back instead of replayed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Discarded {
    pub transactions: Vec<String>,
    pub receipts: Vec<String>,
}

/// Parse a STOMP `heart-beat` header value (format: "cx,cy").
///
/// The values represent milliseconds. Missing or invalid fields default
/// to `0` (no heart-beats in that direction).
pub fn parse_heart_beat_header(value: &str) -> (u64, u64) {
    let mut parts = value.split(',');
    let cx = parts
        .next()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .unwrap_or(0);
    let cy = parts
        .next()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .unwrap_or(0);
    (cx, cy)
}

/// Negotiate heart-beat intervals between client and server.
///
/// Returns `(outgoing, incoming)` where each element is `Some(Duration)`
/// if heart-beats are enabled in that direction. The negotiated interval
/// uses the STOMP rule of taking the maximum of the corresponding client
/// and server values; `0` on either side disables the direction.
pub fn negotiate_heart_beats(
    client_out: u64,
    client_in: u64,
    server_out: u64,
    server_in: u64,
) -> (Option<Duration>, Option<Duration>) {
    let out_ms = if client_out == 0 || server_in == 0 {
        0
    } else {
        client_out.max(server_in)
    };
    let in_ms = if client_in == 0 || server_out == 0 {
        0
    } else {
        client_in.max(server_out)
    };
    let outgoing = (out_ms != 0).then(|| Duration::from_millis(out_ms));
    let incoming = (in_ms != 0).then(|| Duration::from_millis(in_ms));
    (outgoing, incoming)
}

/// Client-side protocol session.
///
/// The type parameter `C` is the caller's subscription context, stored by
/// value and never inspected. Every method is synchronous and updates
/// state atomically per call; the caller serializes access.
pub struct Session<C = ()> {
    config: Config,
    state: SessionState,
    requested: Vec<Version>,
    negotiated: Option<Version>,
    server: Option<String>,
    session_id: Option<String>,
    subscriptions: Vec<Subscription<C>>,
    transactions: Vec<String>,
    receipts: Vec<String>,
    disconnect_receipt: Option<String>,
    /// Subscription token of the last MESSAGE fed in, used to resolve
    /// ACK/NACK when the frame itself lacks the header.
    last_subscription: Option<String>,
    beats: (Option<Duration>, Option<Duration>),
    last_sent: Option<Instant>,
    last_received: Option<Instant>,
}

impl<C> Session<C> {
    pub fn new(config: Config) -> Self {
        let mut requested = config.versions.clone();
        requested.sort();
        requested.dedup();
        Self {
            config,
            state: SessionState::Initial,
            requested,
            negotiated: None,
            server: None,
            session_id: None,
            subscriptions: Vec::new(),
            transactions: Vec::new(),
            receipts: Vec::new(),
            disconnect_receipt: None,
            last_subscription: None,
            beats: (None, None),
            last_sent: None,
            last_received: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The negotiated wire version. Before CONNECTED this is the protocol
    /// default.
    pub fn version(&self) -> Version {
        self.negotiated.unwrap_or(Version::DEFAULT)
    }

    /// Broker product string from CONNECTED, if the broker sent one.
    pub fn server(&self) -> Option<&str> {
        self.server.as_deref()
    }

    /// Broker-assigned session id from CONNECTED, if any.
    pub fn id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Negotiated heart-beat intervals `(outgoing, incoming)`. The session
    /// keeps no timers; the transport is expected to act on these together
    /// with [`Session::last_sent`] and [`Session::last_received`].
    pub fn beat_intervals(&self) -> (Option<Duration>, Option<Duration>) {
        self.beats
    }

    /// When the session last produced an outbound frame.
    pub fn last_sent(&self) -> Option<Instant> {
        self.last_sent
    }

    /// When the session last accepted an inbound frame.
    pub fn last_received(&self) -> Option<Instant> {
        self.last_received
    }

    /// Active subscriptions in SUBSCRIBE order.
    pub fn subscriptions(&self) -> &[Subscription<C>] {
        &self.subscriptions
    }

    /// Receipt ids awaiting a RECEIPT frame, in request order.
    pub fn outstanding_receipts(&self) -> &[String] {
        &self.receipts
    }

    /// Transaction ids begun and not yet committed or aborted.
    pub fn active_transactions(&self) -> &[String] {
        &self.transactions
    }

    fn check_state(&self, allowed: &[SessionState], action: &str) -> Result<(), StompError> {
        if allowed.contains(&self.state) {
            return Ok(());
        }
        Err(StompError::State {
            state: self.state,
            message: format!("{} not allowed", action),
        })
    }

    fn state_error(&self, message: String) -> StompError {
        StompError::State {
            state: self.state,
            message,
        }
    }

    /// Check an outbound frame for a `receipt` header without recording
    /// anything yet.
    fn receipt_of(&self, frame: &Frame) -> Result<Option<String>, StompError> {
        match frame.get_header(header::RECEIPT) {
            Some(id) => {
                if self.receipts.iter().any(|r| r == id) {
                    return Err(
                        self.state_error(format!("receipt already outstanding [{}]", id))
                    );
                }
                Ok(Some(id.to_string()))
            }
            None => Ok(None),
        }
    }

    /// Record an outbound frame: receipt slot and send timestamp.
    fn track_outbound(&mut self, receipt: Option<String>) {
        if let Some(id) = receipt {
            self.receipts.push(id);
        }
        self.last_sent = Some(Instant::now());
    }

    /// Build the CONNECT frame and move to `Connecting`.
    ///
    /// Records the requested version set for the later negotiation in
    /// [`Session::connected`].
    pub fn connect(&mut self, headers: &[(String, String)]) -> Result<Frame, StompError> {
        self.check_state(&[SessionState::Initial], "CONNECT")?;
        let frame = commands::connect(
            &self.requested,
            self.config.host.as_deref(),
            self.config.login.as_deref(),
            self.config.passcode.as_deref(),
            self.config.heart_beat,
            headers,
        )?;
        self.state = SessionState::Connecting;
        self.track_outbound(None);
        Ok(frame)
    }

    /// Feed the broker's CONNECTED frame back and finish negotiation.
    ///
    /// A version outside the requested set (or any other violation) moves
    /// the session to `Disconnected` and surfaces the error.
    pub fn connected(&mut self, frame: &Frame) -> Result<(), StompError> {
        self.check_state(&[SessionState::Connecting], "CONNECTED")?;
        match commands::connected(frame, &self.requested) {
            Ok(outcome) => {
                self.state = SessionState::Connected;
                self.negotiated = Some(outcome.version);
                self.server = outcome.server;
                self.session_id = outcome.session;
                let (cx, cy) = self.config.heart_beat.unwrap_or((0, 0));
                let (sx, sy) = outcome
                    .heart_beat
                    .as_deref()
                    .map(parse_heart_beat_header)
                    .unwrap_or((0, 0));
                self.beats = negotiate_heart_beats(cx, cy, sx, sy);
                self.last_received = Some(Instant::now());
                Ok(())
            }
            Err(error) => {
                self.state = SessionState::Disconnected;
                Err(error)
            }
        }
    }

    /// Build a SEND frame for `destination`.
    pub fn send(
        &mut self,
        destination: &str,
        body: impl Into<Vec<u8>>,
        headers: &[(String, String)],
    ) -> Result<Frame, StompError> {
        self.check_state(&[SessionState::Connected], "SEND")?;
        let frame = commands::send(destination, body, headers)?;
        let receipt = self.receipt_of(&frame)?;
        self.track_outbound(receipt);
        Ok(frame)
    }

    /// Build a SUBSCRIBE frame and register the subscription.
    ///
    /// Returns the frame together with the token that identifies the
    /// subscription from now on. Duplicate tokens are refused with the
    /// registry unchanged.
    pub fn subscribe(
        &mut self,
        destination: &str,
        headers: &[(String, String)],
        context: C,
    ) -> Result<(Frame, SubscriptionToken), StompError> {
        self.check_state(&[SessionState::Connected], "SUBSCRIBE")?;
        let frame = commands::subscribe(destination, headers, self.version())?;
        let token = match frame.get_header(header::ID) {
            Some(id) => SubscriptionToken::Id(id.to_string()),
            None => SubscriptionToken::Destination(destination.to_string()),
        };
        if self.subscriptions.iter().any(|s| s.token == token) {
            return Err(self.state_error(format!("subscription already active [{}]", token)));
        }
        let receipt = self.receipt_of(&frame)?;
        self.subscriptions.push(Subscription {
            token: token.clone(),
            destination: destination.to_string(),
            headers: headers.to_vec(),
            context,
        });
        self.track_outbound(receipt);
        Ok((frame, token))
    }

    /// Build an UNSUBSCRIBE frame and drop the registry entry.
    pub fn unsubscribe(
        &mut self,
        token: &SubscriptionToken,
        headers: &[(String, String)],
    ) -> Result<Frame, StompError> {
        self.check_state(&[SessionState::Connected], "UNSUBSCRIBE")?;
        let position = self
            .subscriptions
            .iter()
            .position(|s| s.token == *token)
            .ok_or_else(|| self.state_error(format!("no such subscription [{}]", token)))?;
        let frame = match token {
            SubscriptionToken::Id(id) => {
                commands::unsubscribe(Some(id.as_str()), None, self.version(), headers)?
            }
            SubscriptionToken::Destination(destination) => {
                commands::unsubscribe(None, Some(destination.as_str()), self.version(), headers)?
            }
        };
        let receipt = self.receipt_of(&frame)?;
        self.subscriptions.remove(position);
        self.track_outbound(receipt);
        Ok(frame)
    }

    fn resolve_acknowledgement(
        &self,
        message: &Frame,
    ) -> Result<(String, Option<String>), StompError> {
        let message_id = message
            .get_header(header::MESSAGE_ID)
            .ok_or_else(|| {
                StompError::Protocol(format!(
                    "missing required header [{}] in {} frame (version {})",
                    header::MESSAGE_ID,
                    message.command,
                    self.version()
                ))
            })?
            .to_string();
        let subscription = message
            .get_header(header::SUBSCRIPTION)
            .map(str::to_string)
            .or_else(|| self.last_subscription.clone());
        Ok((message_id, subscription))
    }

    /// Build an ACK for a received MESSAGE frame.
    ///
    /// The subscription token comes from the frame itself, falling back to
    /// the last MESSAGE observed through [`Session::message`].
    pub fn ack(
        &mut self,
        message: &Frame,
        headers: &[(String, String)],
    ) -> Result<Frame, StompError> {
        self.check_state(&[SessionState::Connected], "ACK")?;
        let (message_id, subscription) = self.resolve_acknowledgement(message)?;
        let frame = commands::ack(&message_id, subscription.as_deref(), self.version(), headers)?;
        let receipt = self.receipt_of(&frame)?;
        self.track_outbound(receipt);
        Ok(frame)
    }

    /// Build a NACK for a received MESSAGE frame (1.1 only).
    pub fn nack(
        &mut self,
        message: &Frame,
        headers: &[(String, String)],
    ) -> Result<Frame, StompError> {
        self.check_state(&[SessionState::Connected], "NACK")?;
        let (message_id, subscription) = self.resolve_acknowledgement(message)?;
        let frame = commands::nack(&message_id, subscription.as_deref(), self.version(), headers)?;
        let receipt = self.receipt_of(&frame)?;
        self.track_outbound(receipt);
        Ok(frame)
    }

    /// Build a BEGIN frame and register the transaction id.
    pub fn begin(
        &mut self,
        transaction: &str,
        headers: &[(String, String)],
    ) -> Result<Frame, StompError> {
        self.check_state(&[SessionState::Connected], "BEGIN")?;
        if self.transactions.iter().any(|t| t == transaction) {
            return Err(
                self.state_error(format!("transaction already active [{}]", transaction))
            );
        }
        let frame = commands::begin(transaction, headers)?;
        let receipt = self.receipt_of(&frame)?;
        self.transactions.push(transaction.to_string());
        self.track_outbound(receipt);
        Ok(frame)
    }

    fn finish_transaction(&mut self, transaction: &str) -> Result<(), StompError> {
        let position = self
            .transactions
            .iter()
            .position(|t| t == transaction)
            .ok_or_else(|| {
                self.state_error(format!("no such transaction [{}]", transaction))
            })?;
        self.transactions.remove(position);
        Ok(())
    }

    /// Build a COMMIT frame and drop the transaction id.
    pub fn commit(
        &mut self,
        transaction: &str,
        headers: &[(String, String)],
    ) -> Result<Frame, StompError> {
        self.check_state(&[SessionState::Connected], "COMMIT")?;
        let frame = commands::commit(transaction, headers)?;
        let receipt = self.receipt_of(&frame)?;
        self.finish_transaction(transaction)?;
        self.track_outbound(receipt);
        Ok(frame)
    }

    /// Build an ABORT frame and drop the transaction id.
    pub fn abort(
        &mut self,
        transaction: &str,
        headers: &[(String, String)],
    ) -> Result<Frame, StompError> {
        self.check_state(&[SessionState::Connected], "ABORT")?;
        let frame = commands::abort(transaction, headers)?;
        let receipt = self.receipt_of(&frame)?;
        self.finish_transaction(transaction)?;
        self.track_outbound(receipt);
        Ok(frame)
    }

    /// Build a DISCONNECT frame.
    ///
    /// Without a receipt the session is done immediately and forgets its
    /// subscriptions. With one it moves to `Disconnecting` and completes
    /// when the matching RECEIPT arrives through [`Session::receipt`].
    pub fn disconnect(
        &mut self,
        receipt: Option<&str>,
        headers: &[(String, String)],
    ) -> Result<Frame, StompError> {
        self.check_state(&[SessionState::Connected], "DISCONNECT")?;
        let frame = commands::disconnect(receipt, headers)?;
        let receipt_id = self.receipt_of(&frame)?;
        match receipt_id {
            Some(id) => {
                self.disconnect_receipt = Some(id.clone());
                self.track_outbound(Some(id));
                self.state = SessionState::Disconnecting;
            }
            None => {
                self.track_outbound(None);
                self.state = SessionState::Disconnected;
                self.subscriptions.clear();
            }
        }
        Ok(frame)
    }

    /// Feed an inbound MESSAGE frame.
    ///
    /// Validates it against the tables and remembers its subscription
    /// token for later ACK/NACK resolution.
    pub fn message(&mut self, frame: &Frame) -> Result<(), StompError> {
        self.check_state(
            &[SessionState::Connected, SessionState::Disconnecting],
            "MESSAGE",
        )?;
        let message = commands::message(frame, self.version())?;
        self.last_subscription = message.subscription;
        self.last_received = Some(Instant::now());
        Ok(())
    }

    /// Feed an inbound RECEIPT frame.
    ///
    /// Clears exactly one outstanding slot; a receipt id that was never
    /// requested (or already cleared) is a protocol error. The receipt
    /// that was requested on DISCONNECT completes the shutdown.
    pub fn receipt(&mut self, frame: &Frame) -> Result<(), StompError> {
        self.check_state(
            &[SessionState::Connected, SessionState::Disconnecting],
            "RECEIPT",
        )?;
        let id = commands::receipt(frame, self.version())?;
        let position = self
            .receipts
            .iter()
            .position(|r| *r == id)
            .ok_or_else(|| StompError::Protocol(format!("unexpected receipt [{}]", id)))?;
        self.receipts.remove(position);
        if self.disconnect_receipt.as_deref() == Some(id.as_str()) {
            self.disconnect_receipt = None;
            self.state = SessionState::Disconnected;
            self.subscriptions.clear();
        }
        self.last_received = Some(Instant::now());
        Ok(())
    }

    /// Feed an inbound ERROR frame. The broker closes the connection after
    /// an ERROR, so the session moves to `Disconnected`; the frame's
    /// message and body stay with the caller.
    pub fn error(&mut self, frame: &Frame) -> Result<(), StompError> {
        self.check_state(
            &[
                SessionState::Connecting,
                SessionState::Connected,
                SessionState::Disconnecting,
            ],
            "ERROR",
        )?;
        commands::error(frame)?;
        self.state = SessionState::Disconnected;
        self.last_received = Some(Instant::now());
        Ok(())
    }

    /// Note a transport loss or timeout. Subscriptions are kept so a
    /// following [`Session::reset`] and [`Session::replay`] can restore
    /// the session shape on a new connection.
    pub fn close(&mut self) {
        self.state = SessionState::Disconnected;
    }

    /// Start over from `Initial` for the next connection attempt.
    ///
    /// Transactions and outstanding receipts cannot survive a reconnect;
    /// they are dropped and returned for reporting. Subscriptions stay
    /// registered until [`Session::replay`] drains them.
    pub fn reset(&mut self) -> Discarded {
        let discarded = Discarded {
            transactions: mem::take(&mut self.transactions),
            receipts: mem::take(&mut self.receipts),
        };
        self.state = SessionState::Initial;
        self.negotiated = None;
        self.server = None;
        self.session_id = None;
        self.disconnect_receipt = None;
        self.last_subscription = None;
        self.beats = (None, None);
        self.last_sent = None;
        self.last_received = None;
        discarded
    }

    /// Drain the subscription registry as a replay plan, in original
    /// SUBSCRIBE order. The reconnect logic re-issues each entry with
    /// [`Session::subscribe`] after the new CONNECTED, re-registering it.
    pub fn replay(&mut self) -> Vec<Subscription<C>> {
        mem::take(&mut self.subscriptions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heart_beat_header_parsing() {
        assert_eq!(parse_heart_beat_header("10000,20000"), (10000, 20000));
        assert_eq!(parse_heart_beat_header(" 500 , 0 "), (500, 0));
        assert_eq!(parse_heart_beat_header("bogus"), (0, 0));
        assert_eq!(parse_heart_beat_header(""), (0, 0));
    }

    #[test]
    fn heart_beat_negotiation_takes_maximum() {
        let (out, incoming) = negotiate_heart_beats(1000, 2000, 3000, 500);
        assert_eq!(out, Some(Duration::from_millis(1000)));
        assert_eq!(incoming, Some(Duration::from_millis(3000)));
    }

    #[test]
    fn heart_beat_negotiation_zero_disables() {
        assert_eq!(negotiate_heart_beats(0, 0, 5000, 5000), (None, None));
        let (out, incoming) = negotiate_heart_beats(1000, 0, 0, 1000);
        assert_eq!(out, Some(Duration::from_millis(1000)));
        assert_eq!(incoming, None);
    }
}
