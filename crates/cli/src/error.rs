use std::path::PathBuf;

use thiserror::Error;

use crate::output::ErrorCode;

#[derive(Debug, Error)]
pub enum CliError {
	#[error(transparent)]
	Session(#[from] fprint::Error),

	#[error("failed to read config file {path}: {source}")]
	ConfigRead {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("invalid config file {path}: {source}")]
	ConfigParse {
		path: PathBuf,
		#[source]
		source: serde_json::Error,
	},

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),

	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Other(#[from] anyhow::Error),
}

impl CliError {
	pub fn code(&self) -> ErrorCode {
		match self {
			CliError::Session(err) => match err {
				fprint::Error::DeviceUnavailable { .. } => ErrorCode::DeviceUnavailable,
				fprint::Error::Init(_) | fprint::Error::NotInitialized => ErrorCode::InitFailed,
				fprint::Error::InvalidConfig(_) => ErrorCode::InvalidConfig,
				fprint::Error::Io(_) => ErrorCode::IoError,
				_ => ErrorCode::SessionError,
			},
			CliError::ConfigRead { .. } | CliError::ConfigParse { .. } => ErrorCode::InvalidConfig,
			CliError::Io(_) => ErrorCode::IoError,
			CliError::Json(_) | CliError::Other(_) => ErrorCode::InternalError,
		}
	}

	/// Structured context for the error envelope, when there is any.
	pub fn details(&self) -> Option<serde_json::Value> {
		match self {
			CliError::Session(fprint::Error::DeviceUnavailable { device, reason }) => {
				Some(serde_json::json!({ "device": device, "reason": reason }))
			}
			CliError::ConfigRead { path, .. } | CliError::ConfigParse { path, .. } => Some(serde_json::json!({ "path": path })),
			_ => None,
		}
	}
}

pub type Result<T> = std::result::Result<T, CliError>;
