use fprint_protocol::{DeviceInfo, SessionReport};
use serde::{Deserialize, Serialize};

/// Result data for the devices command.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevicesData {
	pub backend: String,
	pub count: usize,
	pub devices: Vec<DeviceInfo>,
}

/// What made the CLI stop a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelTrigger {
	Keypress,
	Interrupt,
	Timer,
	/// The session ended without being asked to.
	SessionEnded,
}

/// Outcome for one device's session.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSessionData {
	pub trigger: CancelTrigger,
	#[serde(flatten)]
	pub report: SessionReport,
}

/// Result data for the session command.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionData {
	pub sessions: Vec<DeviceSessionData>,
	pub forced: usize,
}
