//! Transport-agnostic STOMP 1.0/1.1 protocol engine.
//!
//! Four pieces, all plain synchronous data structures: the wire codec
//! ([`StompCodec`]/[`StompParser`]), the stateless command factory
//! ([`commands`]), the session state machine ([`Session`]) and the
//! failover reconnect schedule ([`Failover`]). No I/O happens here; a
//! transport feeds bytes in, puts the produced frames on the wire and
//! drives the session at its transition points.

pub mod codec;
pub mod commands;
pub mod config;
pub mod error;
pub mod failover;
pub mod frame;
mod parser;
pub mod session;
pub mod spec;

pub use codec::{StompCodec, StompItem, StompParser};
pub use config::Config;
pub use error::StompError;
pub use failover::{Broker, Failover, FailoverOptions, FailoverUri};
pub use frame::{Frame, Headers};
pub use session::{Discarded, Session, SessionState, Subscription, SubscriptionToken};
pub use spec::Version;
