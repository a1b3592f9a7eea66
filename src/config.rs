use crate::spec::Version;

/// Connection configuration handed to [`crate::session::Session::new`].
///
/// `uri` may name a single `tcp://host:port` endpoint or a full failover
/// URI; the transport parses it with [`crate::failover::FailoverUri`]. The
/// remaining fields feed the CONNECT frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub uri: String,
    /// Requested wire versions. Defaults to everything this crate speaks.
    pub versions: Vec<Version>,
    pub login: Option<String>,
    pub passcode: Option<String>,
    /// Virtual host for the 1.1 `host` header.
    pub host: Option<String>,
    /// Client heart-beat intent `(cx, cy)` in milliseconds (1.1 only).
    pub heart_beat: Option<(u64, u64)>,
}

impl Config {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            versions: Version::SUPPORTED.to_vec(),
            login: None,
            passcode: None,
            host: None,
            heart_beat: None,
        }
    }

    pub fn versions(mut self, versions: &[Version]) -> Self {
        self.versions = versions.to_vec();
        self
    }

    pub fn login(mut self, login: impl Into<String>) -> Self {
        self.login = Some(login.into());
        self
    }

    pub fn passcode(mut self, passcode: impl Into<String>) -> Self {
        self.passcode = Some(passcode.into());
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn heart_beat(mut self, cx: u64, cy: u64) -> Self {
        self.heart_beat = Some((cx, cy));
        self
    }
}
