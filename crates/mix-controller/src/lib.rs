//! Mix Controller (MX) Service Library
//!
//! This library provides the core functionality for the Parley Mix
//! Controller - the server-side session manager of a multi-party audio
//! conference. Remote peers send RTP to a single listen port; each active
//! source gets its own decode chain into a shared mix bus, and in mesh mode
//! the mix is encoded and fanned back out to every known peer host.
//!
//! # Architecture
//!
//! The hard problem is mutating a *running* processing graph as peers come
//! and go. The pieces:
//!
//! ```text
//! ConferenceActor (singleton per instance)
//! ├── owns the processing Graph and mutates it under pause brackets
//! ├── owns the EndpointRegistry (handle -> Connection)
//! ├── owns the MixStage (lazily created shared mix bus)
//! └── consumes TransportEvents one at a time (single-threaded discipline)
//! ```
//!
//! # Key Design Decisions
//!
//! - **Pause-mutate-resume**: the graph engine rejects structural edits
//!   while running; every join/leave brackets its edits with pause/resume
//! - **Mix bus lifetime is derived**: created on the first join after empty,
//!   destroyed synchronously when the last peer leaves, never kept warm
//! - **Registry keys on handle, dedup keys on address**: a second handle
//!   resolving to an already-active host joins as a redundant path (mixed
//!   in, but no return chain and no address ownership)
//! - **Fail fast**: a half-attached subgraph is worse than a dead process;
//!   every topology error terminates the service with a distinct exit code
//!
//! # Modules
//!
//! - [`session`] - Conference actor, endpoint registry, metrics
//! - [`pipeline`] - Subgraph factories, mix stage, topology bracket
//! - [`transport`] - UDP/RTP source watcher and per-source statistics
//! - [`config`] - Service configuration from environment and CLI
//! - [`errors`] - Error taxonomy with per-class exit codes

#![warn(clippy::pedantic)]

pub mod config;
pub mod errors;
pub mod pipeline;
pub mod session;
pub mod transport;
