use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity and capabilities of one physical scanner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
	/// Short driver name (e.g. `uru4000`).
	pub driver: String,
	/// Human-readable driver description.
	pub full_name: String,
	/// Number of captures the driver combines into one enrolled template.
	pub enroll_stages: u32,
	pub supports_imaging: bool,
	pub supports_identification: bool,
	/// Image width in pixels, `0` when the device does not report one.
	pub image_width: u32,
	/// Image height in pixels, `0` when the device does not report one.
	pub image_height: u32,
}

impl DeviceInfo {
	/// Creates a description with a single enroll stage and no imaging/identification support.
	pub fn new(driver: impl Into<String>, full_name: impl Into<String>) -> Self {
		Self {
			driver: driver.into(),
			full_name: full_name.into(),
			enroll_stages: 1,
			supports_imaging: false,
			supports_identification: false,
			image_width: 0,
			image_height: 0,
		}
	}

	pub fn with_enroll_stages(mut self, stages: u32) -> Self {
		self.enroll_stages = stages;
		self
	}

	pub fn with_imaging(mut self, width: u32, height: u32) -> Self {
		self.supports_imaging = true;
		self.image_width = width;
		self.image_height = height;
		self
	}

	pub fn with_identification(mut self, supported: bool) -> Self {
		self.supports_identification = supported;
		self
	}
}

impl fmt::Display for DeviceInfo {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} - {}", self.driver, self.full_name)
	}
}

/// Lifecycle of a device handle.
///
/// Transitions are `Closed -> Open -> Disposed` or `Closed -> Disposed`;
/// `Disposed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum DeviceState {
	Closed = 0,
	Open = 1,
	Disposed = 2,
}

impl DeviceState {
	/// Decodes the value stored in an atomic lifecycle field.
	///
	/// Unknown values decode as `Disposed` so a corrupted field never permits device calls.
	pub fn from_u8(value: u8) -> Self {
		match value {
			0 => DeviceState::Closed,
			1 => DeviceState::Open,
			_ => DeviceState::Disposed,
		}
	}
}

impl fmt::Display for DeviceState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			DeviceState::Closed => write!(f, "closed"),
			DeviceState::Open => write!(f, "open"),
			DeviceState::Disposed => write!(f, "disposed"),
		}
	}
}

/// Outcome class of one enrollment capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollStatus {
	Complete,
	Incomplete,
}

/// Result code reported by the scanner for an enrollment capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnrollResultCode {
	Complete,
	Fail,
	Pass,
	Retry,
	RetryTooShort,
	RetryCenterFinger,
	RetryRemoveFinger,
	/// Driver-specific code with no standard meaning.
	Other(i32),
}

impl EnrollResultCode {
	pub fn code(self) -> i32 {
		match self {
			EnrollResultCode::Complete => 1,
			EnrollResultCode::Fail => 2,
			EnrollResultCode::Pass => 3,
			EnrollResultCode::Retry => 100,
			EnrollResultCode::RetryTooShort => 101,
			EnrollResultCode::RetryCenterFinger => 102,
			EnrollResultCode::RetryRemoveFinger => 103,
			EnrollResultCode::Other(code) => code,
		}
	}

	/// Default human-readable description of the code.
	pub fn message(self) -> &'static str {
		match self {
			EnrollResultCode::Complete => "enrollment complete",
			EnrollResultCode::Fail => "enrollment failed",
			EnrollResultCode::Pass => "enroll stage passed",
			EnrollResultCode::Retry => "scan failed, try again",
			EnrollResultCode::RetryTooShort => "swipe was too short, try again",
			EnrollResultCode::RetryCenterFinger => "finger was not centered, try again",
			EnrollResultCode::RetryRemoveFinger => "remove finger and try again",
			EnrollResultCode::Other(_) => "unrecognized scanner result",
		}
	}
}

impl From<i32> for EnrollResultCode {
	fn from(code: i32) -> Self {
		match code {
			1 => EnrollResultCode::Complete,
			2 => EnrollResultCode::Fail,
			3 => EnrollResultCode::Pass,
			100 => EnrollResultCode::Retry,
			101 => EnrollResultCode::RetryTooShort,
			102 => EnrollResultCode::RetryCenterFinger,
			103 => EnrollResultCode::RetryRemoveFinger,
			other => EnrollResultCode::Other(other),
		}
	}
}

impl fmt::Display for EnrollResultCode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.code())
	}
}

impl Serialize for EnrollResultCode {
	fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_i32(self.code())
	}
}

impl<'de> Deserialize<'de> for EnrollResultCode {
	fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		i32::deserialize(deserializer).map(EnrollResultCode::from)
	}
}

/// Lifecycle of one capture session (device + gallery + cancellation flag).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum SessionState {
	Running = 0,
	CancelRequested = 1,
	Terminated = 2,
}

impl SessionState {
	pub fn from_u8(value: u8) -> Self {
		match value {
			0 => SessionState::Running,
			1 => SessionState::CancelRequested,
			_ => SessionState::Terminated,
		}
	}
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationKind {
	/// The worker observed the cancellation signal and exited on its own.
	Cancelled,
	/// The deadline elapsed and the supervisor disposed the device out from under the worker.
	ForcedTimeout,
	/// The device could not be opened or failed unrecoverably.
	Failed,
	/// Enrollment finished but the device cannot run identification.
	IdentificationUnsupported,
}

impl fmt::Display for TerminationKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			TerminationKind::Cancelled => write!(f, "cancelled"),
			TerminationKind::ForcedTimeout => write!(f, "forced_timeout"),
			TerminationKind::Failed => write!(f, "failed"),
			TerminationKind::IdentificationUnsupported => write!(f, "identification_unsupported"),
		}
	}
}
