//! JSON config file.
//!
//! ```json
//! {
//!   "session": { "enrollTarget": 5, "pollIntervalMs": 1000, "terminationDeadlineMs": 10000, "captureDir": "captures" },
//!   "devices": [{ "driver": "sim", "captures": [{ "accept": { "finger": 1 } }, "block"] }]
//! }
//! ```
//!
//! Every key is optional. Command-line flags win over file values.

use std::path::{Path, PathBuf};
use std::time::Duration;

use fprint::{SessionConfig, SimulatedDeviceSpec};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cli::SessionArgs;
use crate::error::{CliError, Result};
use crate::output::{DeviceSource, EffectiveConfig};

pub const DEFAULT_CONFIG_FILE: &str = "fprint.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FileConfig {
	pub session: SessionSection,
	pub devices: Vec<SimulatedDeviceSpec>,
	#[serde(skip)]
	pub source: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSection {
	pub enroll_target: Option<usize>,
	pub poll_interval_ms: Option<u64>,
	pub termination_deadline_ms: Option<u64>,
	pub capture_dir: Option<PathBuf>,
}

impl FileConfig {
	/// Loads `explicit`, or [`DEFAULT_CONFIG_FILE`] from `cwd` if it exists.
	///
	/// An explicit path that cannot be read is an error; a missing default file is not.
	pub fn load(explicit: Option<&Path>, cwd: &Path) -> Result<Self> {
		let path = match explicit {
			Some(path) => path.to_path_buf(),
			None => {
				let candidate = cwd.join(DEFAULT_CONFIG_FILE);
				if !candidate.is_file() {
					return Ok(Self::default());
				}
				candidate
			}
		};

		let raw = std::fs::read_to_string(&path).map_err(|source| CliError::ConfigRead { path: path.clone(), source })?;
		let mut config: FileConfig = serde_json::from_str(&raw).map_err(|source| CliError::ConfigParse { path: path.clone(), source })?;
		debug!(target = "fprint.cli", path = %path.display(), devices = config.devices.len(), "loaded config file");
		config.source = Some(path);
		Ok(config)
	}

	/// Session settings after applying defaults, file values, then flags.
	pub fn session_config(&self, args: &SessionArgs) -> SessionConfig {
		let mut config = SessionConfig::default();
		if let Some(target) = args.enroll_target.or(self.session.enroll_target) {
			config = config.with_enroll_target(target);
		}
		if let Some(ms) = args.poll_interval_ms.or(self.session.poll_interval_ms) {
			config = config.with_poll_interval(Duration::from_millis(ms));
		}
		if let Some(ms) = args.termination_deadline_ms.or(self.session.termination_deadline_ms) {
			config = config.with_termination_deadline(Duration::from_millis(ms));
		}
		config.with_capture_dir(args.capture_dir.clone().or_else(|| self.session.capture_dir.clone()))
	}

	/// Configured scanners, or the scripted demo scanner when none are listed.
	pub fn device_specs(&self) -> (Vec<SimulatedDeviceSpec>, DeviceSource) {
		if self.devices.is_empty() {
			(vec![SimulatedDeviceSpec::demo()], DeviceSource::Demo)
		} else {
			(self.devices.clone(), DeviceSource::ConfigFile)
		}
	}
}

/// Echo of the settings a session ran with.
pub fn effective_config(config: &SessionConfig, device_source: DeviceSource) -> EffectiveConfig {
	EffectiveConfig {
		enroll_target: config.enroll_target,
		poll_interval_ms: u64::try_from(config.poll_interval.as_millis()).unwrap_or(u64::MAX),
		termination_deadline_ms: u64::try_from(config.termination_deadline.as_millis()).unwrap_or(u64::MAX),
		capture_dir: config.capture_dir.clone(),
		device_source,
	}
}
