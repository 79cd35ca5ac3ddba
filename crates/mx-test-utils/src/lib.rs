//! # MX Test Utilities
//!
//! Shared test utilities for the Parley Mix Controller.
//!
//! This crate lets session tests run without sockets: a
//! [`ScriptedTransport`] plays the role of the UDP source watcher, driving
//! the conference actor's event channel and the shared per-source
//! statistics table from test code.
//!
//! ## Modules
//!
//! - [`scripted`] - Scripted transport standing in for the UDP watcher
//! - [`fixtures`] - Primary-graph and RTP datagram builders
//!
//! ## Usage
//!
//! ```rust,ignore
//! use mx_test_utils::ScriptedTransport;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let (script, stats, events) = ScriptedTransport::new();
//!     // wire `stats` + `events` into ConferenceActor::spawn(...)
//!     script.join_from(handle, "10.0.0.1:5004".parse().unwrap()).await;
//!     script.leave(handle).await;
//! }
//! ```

pub mod fixtures;
pub mod scripted;

pub use scripted::ScriptedTransport;
