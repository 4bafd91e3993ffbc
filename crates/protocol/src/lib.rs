//! Data types for fingerprint capture sessions.
//!
//! This crate contains the serde-serializable types shared between the
//! session runtime and whatever presents its progress (console, log, UI).
//! These types are the "reporting layer": the shapes of values as they leave
//! the core.
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! * Pure data: No behavior beyond serialization/deserialization and display
//! * Driver-agnostic: Nothing here knows how a capture or a match is performed
//! * Stable: Changes only when the reported values change
//!
//! Device handles, controllers and the supervisor are built on top of these
//! types in `fprint-runtime` and `fprint-rs`.

pub mod events;
pub mod types;

pub use events::*;
pub use types::*;
