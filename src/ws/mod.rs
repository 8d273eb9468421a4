//! WebSocket plumbing for the live trade feed.
//!
//! ## [`manager`] — Connection lifecycle
//!
//! Owns the single session, drives the `Disconnected → Connecting →
//! Connected → Reconnecting → … → Failed` state machine, enforces the
//! connection deadline and the fixed-delay, bounded retry policy, and
//! replays subscriptions after every successful open.
//!
//! ## [`processor`] — Inbound dispatch
//!
//! Decodes trade, ping, and unrecognized frames; writes valid trades into the
//! store and asks for a `pong` on pings.
//!
//! ## [`protocol`] — Wire frames
//!
//! JSON shapes sent to and received from the feed.
//!
//! ## [`transport`] — Network boundary
//!
//! The [`Transport`](transport::Transport) trait, channel-backed
//! [`Session`](transport::Session)s, and the `tokio-tungstenite`
//! implementation.

pub mod manager;
pub mod processor;
pub mod protocol;
pub mod transport;
