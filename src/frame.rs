use std::fmt;

/// Ordered header list of a STOMP frame, as `(name, value)` pairs.
pub type Headers = Vec<(String, String)>;

/// A single STOMP frame.
///
/// `Frame` contains the command (e.g. "SEND", "MESSAGE"), an ordered list
/// of headers and the raw body bytes. Headers keep their wire order and may
/// contain duplicates; [`Frame::get_header`] applies the STOMP 1.1 rule
/// that the first occurrence of a name is authoritative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// STOMP command (e.g. CONNECT, SEND, SUBSCRIBE)
    pub command: String,
    /// Ordered headers as (name, value) pairs
    pub headers: Headers,
    /// Raw body bytes
    pub body: Vec<u8>,
}

impl Frame {
    /// Create a new frame with the given command and empty headers/body.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Add a header (builder style).
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the frame body (builder style).
    pub fn set_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Request a receipt for this frame (builder style).
    ///
    /// The broker answers with a RECEIPT frame carrying the same id. The
    /// session records the id as outstanding when the frame passes through
    /// it.
    pub fn receipt(self, id: impl Into<String>) -> Self {
        self.header(crate::spec::header::RECEIPT, id)
    }

    /// Value of the first header named `name`, or `None`.
    ///
    /// First occurrence wins, per STOMP 1.1. Use [`Frame::header_values`]
    /// to inspect repeated headers.
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// All values carried under `name`, in wire order.
    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> {
        self.headers
            .iter()
            .filter(move |(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Whether any header named `name` is present.
    pub fn has_header(&self, name: &str) -> bool {
        self.get_header(name).is_some()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Command: {}", self.command)?;
        for (k, v) in &self.headers {
            writeln!(f, "{}: {}", k, v)?;
        }
        writeln!(f, "Body ({} bytes)", self.body.len())
    }
}
