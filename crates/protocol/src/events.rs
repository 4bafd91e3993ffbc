//! Progress and outcome values emitted while a session runs.
//!
//! The core only produces these; formatting them for a console, log or UI is
//! the consumer's concern.

use serde::{Deserialize, Serialize};

use crate::types::{DeviceInfo, EnrollResultCode, TerminationKind};

/// Which kind of capture a device call performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureStage {
	Enroll,
	Verify,
	Identify,
}

/// One reportable step of a capture session.
///
/// Every variant carries the driver name of the device it concerns so events
/// from concurrent sessions can share one sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
	DeviceOpened {
		info: DeviceInfo,
	},
	DeviceUnavailable {
		device: String,
		reason: String,
	},
	/// A new enrollment capture is about to start.
	EnrollPrompt {
		device: String,
		verified: usize,
		target: usize,
	},
	/// The scanner rejected the sample; the device was reset.
	EnrollIncomplete {
		device: String,
		code: EnrollResultCode,
		message: String,
	},
	VerifyPrompt {
		device: String,
	},
	/// The verification capture did not match the fresh template; the attempt was discarded.
	VerifyFailed {
		device: String,
	},
	Enrolled {
		device: String,
		label: String,
		verified: usize,
		target: usize,
	},
	EnrollmentComplete {
		device: String,
		gallery_size: usize,
	},
	IdentifyPrompt {
		device: String,
	},
	Identified {
		device: String,
		label: String,
	},
	NoMatch {
		device: String,
	},
	/// A driver error was absorbed by the controller.
	CaptureFailed {
		device: String,
		stage: CaptureStage,
		error: String,
	},
	CancelRequested {
		device: String,
	},
	WaitingForTermination {
		device: String,
		remaining_ms: u64,
	},
	ForcedTermination {
		device: String,
		elapsed_ms: u64,
	},
	SessionEnded {
		device: String,
		termination: TerminationKind,
	},
}

impl SessionEvent {
	/// Driver name of the device this event concerns.
	pub fn device(&self) -> &str {
		match self {
			SessionEvent::DeviceOpened { info } => &info.driver,
			SessionEvent::DeviceUnavailable { device, .. }
			| SessionEvent::EnrollPrompt { device, .. }
			| SessionEvent::EnrollIncomplete { device, .. }
			| SessionEvent::VerifyPrompt { device }
			| SessionEvent::VerifyFailed { device }
			| SessionEvent::Enrolled { device, .. }
			| SessionEvent::EnrollmentComplete { device, .. }
			| SessionEvent::IdentifyPrompt { device }
			| SessionEvent::Identified { device, .. }
			| SessionEvent::NoMatch { device }
			| SessionEvent::CaptureFailed { device, .. }
			| SessionEvent::CancelRequested { device }
			| SessionEvent::WaitingForTermination { device, .. }
			| SessionEvent::ForcedTermination { device, .. }
			| SessionEvent::SessionEnded { device, .. } => device,
		}
	}

	/// Short human-readable rendering used by text output.
	pub fn summary(&self) -> String {
		match self {
			SessionEvent::DeviceOpened { info } => format!(
				"Device {} - {} (enroll stages: {}, imaging: {}, identification: {}, image: {}x{})",
				info.driver,
				info.full_name,
				info.enroll_stages,
				info.supports_imaging,
				info.supports_identification,
				info.image_width,
				info.image_height
			),
			SessionEvent::DeviceUnavailable { device, reason } => format!("[{device}] device unavailable: {reason}"),
			SessionEvent::EnrollPrompt { device, verified, target } => {
				format!("[{device}] ENROLL: {verified}/{target} enrolled. Enroll a new finger now")
			}
			SessionEvent::EnrollIncomplete { device, code, message } => format!("[{device}] try again, error code {code} - {message}"),
			SessionEvent::VerifyPrompt { device } => format!("[{device}] VERIFY: scan the same finger again"),
			SessionEvent::VerifyFailed { device } => format!("[{device}] could not verify, try again"),
			SessionEvent::Enrolled { device, label, verified, target } => format!("[{device}] enrolled {label} ({verified}/{target})"),
			SessionEvent::EnrollmentComplete { device, gallery_size } => format!("[{device}] enrollment complete, {gallery_size} prints in gallery"),
			SessionEvent::IdentifyPrompt { device } => format!("[{device}] IDENTIFY: press finger against scanner"),
			SessionEvent::Identified { device, label } => format!("[{device}] fingerprint identified: {label}"),
			SessionEvent::NoMatch { device } => format!("[{device}] could not identify"),
			SessionEvent::CaptureFailed { device, stage, error } => format!("[{device}] {stage:?} capture failed: {error}"),
			SessionEvent::CancelRequested { device } => format!("[{device}] cancellation requested"),
			SessionEvent::WaitingForTermination { device, remaining_ms } => format!(
				"[{device}] waiting for session termination, {:.2} seconds to terminate forcefully",
				*remaining_ms as f64 / 1000.0
			),
			SessionEvent::ForcedTermination { device, elapsed_ms } => {
				format!("[{device}] termination timeout reached after {elapsed_ms}ms, forcefully disposed the device")
			}
			SessionEvent::SessionEnded { device, termination } => format!("[{device}] session ended: {termination}"),
		}
	}
}

/// Final record of one device session, produced by the supervisor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionReport {
	pub device: String,
	pub termination: TerminationKind,
	/// Verified prints the session held when it ended.
	pub gallery_size: usize,
	/// Time from the cancel request to termination, if a cancel was requested.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub shutdown_ms: Option<u64>,
}

impl SessionReport {
	pub fn was_forced(&self) -> bool {
		self.termination == TerminationKind::ForcedTimeout
	}
}
