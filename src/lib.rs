//! CMake Mux library - register CMake build roots, switch the active one, and
//! auto-enable the host's build profiles by pattern.
//!
//! This library exposes the core of the `cmux` CLI for use in tests and
//! other front ends.
//!
//! # Modules
//!
//! - `entry`: Entry type and path normalization
//! - `store`: Ordered, persisted entry collection
//! - `selection`: Active build-root tracker
//! - `bus`: Change notifications
//! - `dispatch`: Single-threaded "invoke later" loop
//! - `host`: Host build-configuration capabilities and adapters
//! - `engine`: Pattern-driven profile enabling
//! - `activation`: Activation orchestrator
//! - `detect`: Startup detection of the loaded build root
//! - `pick`: Ordinal quick-pick
//! - `session`: Per-workspace service wiring
//! - `config`: Configuration file handling
//! - `error`: Error types with user-recoverable hints
#![forbid(unsafe_code)]

pub mod activation;
pub mod bus;
pub mod cli;
pub mod config;
pub mod detect;
pub mod dispatch;
pub mod engine;
pub mod entry;
pub mod error;
pub mod host;
pub mod logging;
pub mod pick;
pub mod selection;
pub mod session;
pub mod store;
