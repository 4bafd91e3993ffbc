//! Error type shared by the device runtime and the session core.

use thiserror::Error;

/// Errors raised by device handles, discovery, and session control.
///
/// Poor-quality samples, verification mismatches and identification misses
/// are not errors; they are ordinary capture outcomes.
#[derive(Debug, Error)]
pub enum Error {
	/// The peripheral could not be claimed.
	#[error("device {device} unavailable: {reason}")]
	DeviceUnavailable { device: String, reason: String },

	#[error("device manager used before initialize()")]
	NotInitialized,

	#[error("device backend failed to initialize: {0}")]
	Init(String),

	#[error("device {device} is not open")]
	NotOpen { device: String },

	/// The handle was released, possibly out from under an in-flight capture.
	#[error("device {device} has been disposed")]
	Disposed { device: String },

	/// The driver abandoned a capture after an interrupt hint.
	#[error("capture on device {device} was interrupted")]
	Interrupted { device: String },

	#[error("session cancelled")]
	Cancelled,

	#[error("driver error on device {device}: {message}")]
	Driver { device: String, message: String },

	#[error("invalid session configuration: {0}")]
	InvalidConfig(String),

	#[error(transparent)]
	Io(#[from] std::io::Error),
}

impl Error {
	/// Returns `true` when the error means the session must stop issuing device calls.
	pub fn ends_session(&self) -> bool {
		matches!(self, Error::Disposed { .. } | Error::Cancelled | Error::NotOpen { .. })
	}
}

pub type Result<T> = std::result::Result<T, Error>;
