//! Driver seam between session control and the native capture/matching code.
//!
//! Feature extraction and matching happen inside a [`Driver`]; the runtime only
//! sequences calls and guards the handle lifecycle around them.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use fprint_protocol::{DeviceInfo, EnrollResultCode, EnrollStatus};

use crate::error::Result;

/// Opaque biometric payload produced by a successful enrollment.
///
/// Cloning is cheap; the payload bytes are shared.
#[derive(Clone, PartialEq, Eq)]
pub struct Template {
	driver: Arc<str>,
	data: Arc<[u8]>,
}

impl Template {
	pub fn new(driver: impl Into<Arc<str>>, data: impl Into<Arc<[u8]>>) -> Self {
		Self {
			driver: driver.into(),
			data: data.into(),
		}
	}

	/// Driver that produced the payload; templates only match on the same driver.
	pub fn driver(&self) -> &str {
		&self.driver
	}

	pub fn data(&self) -> &[u8] {
		&self.data
	}
}

impl fmt::Debug for Template {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Template")
			.field("driver", &self.driver)
			.field("len", &self.data.len())
			.finish()
	}
}

/// Result of one enrollment capture.
///
/// Produced once per attempt and immutable afterwards; the template is only
/// present when the capture completed.
#[derive(Debug, Clone)]
pub struct EnrollmentAttempt {
	code: EnrollResultCode,
	message: String,
	template: Option<Template>,
}

impl EnrollmentAttempt {
	pub fn complete(template: Template) -> Self {
		Self {
			code: EnrollResultCode::Complete,
			message: EnrollResultCode::Complete.message().to_string(),
			template: Some(template),
		}
	}

	pub fn incomplete(code: EnrollResultCode, message: impl Into<String>) -> Self {
		Self {
			code,
			message: message.into(),
			template: None,
		}
	}

	pub fn status(&self) -> EnrollStatus {
		if self.template.is_some() {
			EnrollStatus::Complete
		} else {
			EnrollStatus::Incomplete
		}
	}

	pub fn code(&self) -> EnrollResultCode {
		self.code
	}

	pub fn message(&self) -> &str {
		&self.message
	}

	pub fn into_template(self) -> Option<Template> {
		self.template
	}
}

/// Native scanner operations.
///
/// Methods take `&self` because a release may arrive from the supervisor
/// while a capture is blocking on another thread; implementations synchronize
/// internally. Capture methods block for one physical interaction.
///
/// `target` is an optional destination for a raw image of the capture.
/// Writing it is best-effort: failures must not change the capture outcome.
pub trait Driver: Send + Sync {
	fn info(&self) -> &DeviceInfo;

	/// Claims the peripheral.
	fn open(&self) -> Result<()>;

	/// Runs one enrollment capture. Poor samples are reported through
	/// [`EnrollmentAttempt::incomplete`], never as an error.
	fn enroll(&self, target: Option<&Path>) -> Result<EnrollmentAttempt>;

	/// Captures once and reports whether the sample matches `template`.
	fn verify(&self, template: &Template, target: Option<&Path>) -> Result<bool>;

	/// Captures once and returns the index of the matching candidate, if any.
	fn identify(&self, candidates: &[&Template], target: Option<&Path>) -> Result<Option<usize>>;

	/// Clears device-internal error state after a failed enrollment capture.
	fn reset(&self) -> Result<()>;

	/// Best-effort request to abandon a capture that is waiting for a finger.
	fn interrupt(&self) {}

	/// Releases the native handle. Called at most once, possibly during a capture.
	///
	/// [`Device`](crate::Device) issues no call once it has observed the
	/// release, but a call registered just before it may still be entering the
	/// driver. After `release` returns, such a call must fail without touching
	/// the hardware.
	fn release(&self);
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn attempt_status_follows_template_presence() {
		let complete = EnrollmentAttempt::complete(Template::new("sim", vec![1, 0, 0, 0]));
		assert_eq!(complete.status(), EnrollStatus::Complete);
		assert_eq!(complete.code(), EnrollResultCode::Complete);
		assert!(complete.into_template().is_some());

		let retry = EnrollmentAttempt::incomplete(EnrollResultCode::RetryTooShort, "Swipe was too short");
		assert_eq!(retry.status(), EnrollStatus::Incomplete);
		assert_eq!(retry.message(), "Swipe was too short");
		assert!(retry.into_template().is_none());
	}
}
