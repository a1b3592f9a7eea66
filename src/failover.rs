//! Failover URIs and the reconnect schedule they describe.
//!
//! A failover URI enumerates broker endpoints plus retry policy, in the
//! ActiveMQ failover-transport syntax:
//!
//! ```text
//! failover:(tcp://primary:61613,tcp://secondary:61613)?randomize=false
//! ```
//!
//! [`Failover`] turns the parsed URI into a lazy schedule of connection
//! attempts. The transport asks for the next `(broker, delay)` whenever an
//! attempt is needed, sleeps for the delay itself, and calls
//! [`Failover::reset`] once a connection succeeds.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::error::StompError;

const FAILOVER_PREFIX: &str = "failover:";
const ENDPOINT_SCHEME: &str = "tcp://";

/// One broker endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Broker {
    pub host: String,
    pub port: u16,
}

impl fmt::Display for Broker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}:{}", ENDPOINT_SCHEME, self.host, self.port)
    }
}

/// Retry policy options of a failover URI.
///
/// Field names follow the URI option names; all delays are milliseconds.
#[derive(Debug, Clone, PartialEq)]
pub struct FailoverOptions {
    /// Delay before the first retry.
    pub initial_reconnect_delay: u64,
    /// Cap on any single delay.
    pub max_reconnect_delay: u64,
    /// Multiply the delay by `back_off_multiplier` after each attempt.
    pub use_exponential_back_off: bool,
    pub back_off_multiplier: f64,
    /// Retries permitted after an initial success; `-1` is unlimited.
    pub max_reconnect_attempts: i64,
    /// Retries permitted before any successful connect; `0` defers to
    /// `max_reconnect_attempts`.
    pub startup_max_reconnect_attempts: i64,
    /// Shuffle the endpoint order on each full cycle.
    pub randomize: bool,
}

impl Default for FailoverOptions {
    fn default() -> Self {
        Self {
            initial_reconnect_delay: 10,
            max_reconnect_delay: 30_000,
            use_exponential_back_off: true,
            back_off_multiplier: 2.0,
            max_reconnect_attempts: -1,
            startup_max_reconnect_attempts: 0,
            randomize: true,
        }
    }
}

/// A parsed failover URI: endpoint list plus options.
///
/// Accepted forms, with whitespace tolerated around commas:
///
/// - `failover:(tcp://a:1,tcp://b:2)?opt=value&...`
/// - `failover://(tcp://a:1,tcp://b:2)?opt=value&...`
/// - `failover:tcp://a:1,tcp://b:2`
/// - `tcp://a:1` (a single endpoint with default policy)
#[derive(Debug, Clone, PartialEq)]
pub struct FailoverUri {
    pub brokers: Vec<Broker>,
    pub options: FailoverOptions,
}

impl FailoverUri {
    /// A fresh schedule over this URI.
    pub fn schedule(&self) -> Failover {
        Failover::new(self.clone())
    }
}

fn invalid(uri: &str, reason: impl fmt::Display) -> StompError {
    StompError::InvalidUri(format!("{} [{}]", reason, uri))
}

fn parse_broker(uri: &str, endpoint: &str) -> Result<Broker, StompError> {
    let rest = endpoint
        .strip_prefix(ENDPOINT_SCHEME)
        .ok_or_else(|| invalid(uri, format!("unsupported endpoint [{}]", endpoint)))?;
    let (host, port) = rest
        .rsplit_once(':')
        .ok_or_else(|| invalid(uri, format!("missing port in endpoint [{}]", endpoint)))?;
    if host.is_empty() {
        return Err(invalid(uri, format!("missing host in endpoint [{}]", endpoint)));
    }
    let port = port
        .parse::<u16>()
        .map_err(|_| invalid(uri, format!("invalid port in endpoint [{}]", endpoint)))?;
    Ok(Broker {
        host: host.to_string(),
        port,
    })
}

fn parse_bool(uri: &str, name: &str, value: &str) -> Result<bool, StompError> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(invalid(uri, format!("invalid value for option {} [{}]", name, value))),
    }
}

fn parse_number<T: FromStr>(uri: &str, name: &str, value: &str) -> Result<T, StompError> {
    value
        .parse::<T>()
        .map_err(|_| invalid(uri, format!("invalid value for option {} [{}]", name, value)))
}

impl FromStr for FailoverUri {
    type Err = StompError;

    fn from_str(input: &str) -> Result<Self, StompError> {
        let trimmed = input.trim();
        let (endpoints, query) = match trimmed.split_once('?') {
            Some((endpoints, query)) => (endpoints, Some(query)),
            None => (trimmed, None),
        };

        let endpoints = endpoints
            .strip_prefix(FAILOVER_PREFIX)
            .map(|rest| rest.strip_prefix("//").unwrap_or(rest))
            .unwrap_or(endpoints)
            .trim();
        let endpoints = match endpoints.strip_prefix('(') {
            Some(inner) => inner
                .strip_suffix(')')
                .ok_or_else(|| invalid(input, "unbalanced parentheses"))?,
            None => endpoints,
        };

        let mut brokers = Vec::new();
        for endpoint in endpoints.split(',') {
            brokers.push(parse_broker(input, endpoint.trim())?);
        }
        if brokers.is_empty() {
            return Err(invalid(input, "no endpoints"));
        }

        let mut options = FailoverOptions::default();
        if let Some(query) = query {
            for pair in query.split('&') {
                let (name, value) = pair
                    .split_once('=')
                    .ok_or_else(|| invalid(input, format!("malformed option [{}]", pair)))?;
                let (name, value) = (name.trim(), value.trim());
                match name {
                    "initialReconnectDelay" => {
                        options.initial_reconnect_delay = parse_number(input, name, value)?
                    }
                    "maxReconnectDelay" => {
                        options.max_reconnect_delay = parse_number(input, name, value)?
                    }
                    "useExponentialBackOff" => {
                        options.use_exponential_back_off = parse_bool(input, name, value)?
                    }
                    "backOffMultiplier" => {
                        options.back_off_multiplier = parse_number(input, name, value)?
                    }
                    "maxReconnectAttempts" => {
                        options.max_reconnect_attempts = parse_number(input, name, value)?
                    }
                    "startupMaxReconnectAttempts" => {
                        options.startup_max_reconnect_attempts = parse_number(input, name, value)?
                    }
                    "randomize" => options.randomize = parse_bool(input, name, value)?,
                    _ => return Err(invalid(input, format!("unknown option [{}]", name))),
                }
            }
        }

        Ok(FailoverUri { brokers, options })
    }
}

/// Lazy, possibly infinite schedule of connection attempts.
///
/// Every call to [`Failover::next`] yields the next `(broker, delay)`
/// pair, where the delay is to be slept before the attempt. The first
/// yield after construction or [`Failover::reset`] always has delay zero;
/// from then on the delay grows per attempt (when exponential back-off is
/// on) up to `max_reconnect_delay`. When the permitted attempts run out,
/// `next` returns [`StompError::FailoverExhausted`].
pub struct Failover {
    uri: FailoverUri,
    order: Vec<Broker>,
    cursor: usize,
    /// Attempts handed out since the last reset; `-1` means the free
    /// initial attempt has not happened yet.
    attempts: i64,
    current_delay: f64,
    connected_once: bool,
    rng: StdRng,
}

impl Failover {
    pub fn new(uri: FailoverUri) -> Self {
        Self::with_rng(uri, StdRng::from_entropy())
    }

    /// Like [`Failover::new`] with a caller-provided RNG, so randomized
    /// endpoint order is reproducible in tests.
    pub fn with_rng(uri: FailoverUri, rng: StdRng) -> Self {
        let initial = uri.options.initial_reconnect_delay as f64;
        Self {
            uri,
            order: Vec::new(),
            cursor: 0,
            attempts: -1,
            current_delay: initial,
            connected_once: false,
            rng,
        }
    }

    /// Signal that a connection attempt succeeded.
    ///
    /// Resets the delay and attempt counters and starts a fresh endpoint
    /// cycle, so the next failure begins retrying from scratch under
    /// `max_reconnect_attempts` rather than the startup cap.
    pub fn reset(&mut self) {
        self.connected_once = true;
        self.attempts = -1;
        self.current_delay = self.uri.options.initial_reconnect_delay as f64;
        self.order.clear();
        self.cursor = 0;
    }

    fn attempt_cap(&self) -> i64 {
        if !self.connected_once && self.uri.options.startup_max_reconnect_attempts != 0 {
            self.uri.options.startup_max_reconnect_attempts
        } else {
            self.uri.options.max_reconnect_attempts
        }
    }

    fn next_delay(&mut self) -> Result<u64, StompError> {
        self.attempts += 1;
        if self.attempts == 0 {
            return Ok(0);
        }
        let cap = self.attempt_cap();
        if cap != -1 && self.attempts > cap {
            return Err(StompError::FailoverExhausted {
                attempts: cap.max(0) as u64,
            });
        }
        let delay = self
            .current_delay
            .min(self.uri.options.max_reconnect_delay as f64);
        if self.uri.options.use_exponential_back_off {
            self.current_delay *= self.uri.options.back_off_multiplier;
        }
        Ok(delay as u64)
    }

    /// The next `(broker, delay)` to try, or
    /// [`StompError::FailoverExhausted`].
    pub fn next(&mut self) -> Result<(Broker, Duration), StompError> {
        if self.cursor >= self.order.len() {
            self.order = self.uri.brokers.clone();
            if self.uri.options.randomize {
                self.order.shuffle(&mut self.rng);
            }
            self.cursor = 0;
        }
        let delay = self.next_delay()?;
        let broker = self.order[self.cursor].clone();
        self.cursor += 1;
        Ok((broker, Duration::from_millis(delay)))
    }
}
