//! Errors surfaced by session control. Shared with the device runtime.

pub use fprint_runtime::error::{Error, Result};
