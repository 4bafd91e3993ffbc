//! Session tuning knobs.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Verified enrollments collected before identification starts.
pub const DEFAULT_ENROLL_TARGET: usize = 5;
/// How often the supervisor re-issues cancellation while a worker is alive.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
/// How long the supervisor waits after a cancel request before forcing disposal.
pub const DEFAULT_TERMINATION_DEADLINE: Duration = Duration::from_secs(10);

/// Configuration shared by the workers of one supervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
	pub enroll_target: usize,
	pub poll_interval: Duration,
	pub termination_deadline: Duration,
	/// Directory receiving raw capture images, if any.
	pub capture_dir: Option<PathBuf>,
}

impl Default for SessionConfig {
	fn default() -> Self {
		Self {
			enroll_target: DEFAULT_ENROLL_TARGET,
			poll_interval: DEFAULT_POLL_INTERVAL,
			termination_deadline: DEFAULT_TERMINATION_DEADLINE,
			capture_dir: None,
		}
	}
}

impl SessionConfig {
	pub fn with_enroll_target(mut self, target: usize) -> Self {
		self.enroll_target = target;
		self
	}

	pub fn with_poll_interval(mut self, interval: Duration) -> Self {
		self.poll_interval = interval;
		self
	}

	pub fn with_termination_deadline(mut self, deadline: Duration) -> Self {
		self.termination_deadline = deadline;
		self
	}

	pub fn with_capture_dir(mut self, dir: Option<PathBuf>) -> Self {
		self.capture_dir = dir;
		self
	}

	pub fn validate(&self) -> Result<()> {
		if self.enroll_target == 0 {
			return Err(Error::InvalidConfig("enroll target must be at least 1".to_string()));
		}
		if self.poll_interval.is_zero() {
			return Err(Error::InvalidConfig("poll interval must be greater than zero".to_string()));
		}
		if self.termination_deadline.is_zero() {
			return Err(Error::InvalidConfig("termination deadline must be greater than zero".to_string()));
		}
		Ok(())
	}

	pub fn capture_targets(&self) -> CaptureTargets {
		CaptureTargets::in_dir(self.capture_dir.as_deref())
	}
}

/// Destinations for the raw image of each capture kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureTargets {
	enroll: Option<PathBuf>,
	verify: Option<PathBuf>,
	identify: Option<PathBuf>,
}

impl CaptureTargets {
	/// Targets named `enroll.pgm`, `verify.pgm` and `identify.pgm` inside `dir`.
	pub fn in_dir(dir: Option<&Path>) -> Self {
		match dir {
			Some(dir) => Self {
				enroll: Some(dir.join("enroll.pgm")),
				verify: Some(dir.join("verify.pgm")),
				identify: Some(dir.join("identify.pgm")),
			},
			None => Self::default(),
		}
	}

	pub fn enroll(&self) -> Option<&Path> {
		self.enroll.as_deref()
	}

	pub fn verify(&self) -> Option<&Path> {
		self.verify.as_deref()
	}

	pub fn identify(&self) -> Option<&Path> {
		self.identify.as_deref()
	}
}
