//! Enrollment state machine: capture, verify, then commit or retry.
//!
//! | attempt | condition                 | action                                   | next       |
//! |---------|---------------------------|------------------------------------------|------------|
//! | capture | enroll is incomplete      | report, `reset()` the device             | capture    |
//! | capture | enroll is complete        | verify against the fresh template        | verify     |
//! | verify  | verify matches            | `verified += 1`, add to gallery          | capture or done |
//! | verify  | verify does not match     | discard, report                          | capture    |
//!
//! Done is reached exactly when `verified == target`.

use fprint_protocol::{CaptureStage, EnrollResultCode, SessionEvent};
use fprint_runtime::{Device, Error, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::CaptureTargets;
use crate::events::EventSink;
use crate::gallery::{Gallery, enrollment_label};

/// What one call to [`EnrollmentController::attempt`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
	/// Captured, verified and stored under `label`.
	Enrolled { label: String },
	/// The scanner rejected the sample; the device was reset.
	Incomplete { code: EnrollResultCode, message: String },
	/// The verification capture did not match; the attempt was discarded.
	VerifyFailed,
	/// A driver error was absorbed; `stage` says which capture failed.
	CaptureError { stage: CaptureStage },
}

/// Counters describing how enrollment went.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrollmentSummary {
	pub verified: usize,
	pub attempts: usize,
	pub incomplete: usize,
	pub mismatches: usize,
	pub capture_errors: usize,
}

/// Drives a device through enroll+verify attempts until the gallery holds
/// `target` verified templates.
///
/// The controller owns the gallery it builds; hand it to identification with
/// [`EnrollmentController::into_gallery`].
pub struct EnrollmentController<'a> {
	device: &'a Device,
	events: &'a EventSink,
	cancel: &'a CancellationToken,
	targets: &'a CaptureTargets,
	target: usize,
	gallery: Gallery,
	summary: EnrollmentSummary,
}

impl<'a> EnrollmentController<'a> {
	pub fn new(device: &'a Device, events: &'a EventSink, cancel: &'a CancellationToken, targets: &'a CaptureTargets, target: usize) -> Self {
		Self {
			device,
			events,
			cancel,
			targets,
			target,
			gallery: Gallery::new(),
			summary: EnrollmentSummary::default(),
		}
	}

	pub fn verified_count(&self) -> usize {
		self.summary.verified
	}

	pub fn is_complete(&self) -> bool {
		self.summary.verified >= self.target
	}

	pub fn gallery(&self) -> &Gallery {
		&self.gallery
	}

	pub fn summary(&self) -> EnrollmentSummary {
		self.summary
	}

	pub fn into_gallery(self) -> Gallery {
		self.gallery
	}

	/// Runs attempts until the target is reached.
	///
	/// Returns [`Error::Cancelled`] when the cancellation token fires first, or
	/// [`Error::Disposed`] when the device is released underneath the loop.
	pub fn run(&mut self) -> Result<EnrollmentSummary> {
		while !self.is_complete() {
			self.attempt()?;
		}
		Ok(self.finish())
	}

	/// Reports completion and returns the summary.
	pub fn finish(&mut self) -> EnrollmentSummary {
		info!(
			target = "fprint.enroll",
			device = %self.device.name(),
			verified = self.summary.verified,
			attempts = self.summary.attempts,
			"enrollment complete"
		);
		self.events.emit(SessionEvent::EnrollmentComplete {
			device: self.device.name().to_string(),
			gallery_size: self.gallery.len(),
		});
		self.summary
	}

	/// Performs one capture (and, if it completed, one verification capture).
	pub fn attempt(&mut self) -> Result<AttemptOutcome> {
		self.checkpoint()?;
		self.events.emit(SessionEvent::EnrollPrompt {
			device: self.device.name().to_string(),
			verified: self.summary.verified,
			target: self.target,
		});

		let attempt = match self.device.enroll(self.targets.enroll()) {
			Ok(attempt) => attempt,
			Err(err) => {
				self.absorb(CaptureStage::Enroll, err)?;
				self.reset_device()?;
				return Ok(AttemptOutcome::CaptureError {
					stage: CaptureStage::Enroll,
				});
			}
		};
		self.summary.attempts += 1;

		let status = attempt.status();
		let code = attempt.code();
		let message = attempt.message().to_string();
		let Some(template) = attempt.into_template() else {
			self.summary.incomplete += 1;
			debug!(target = "fprint.enroll", device = %self.device.name(), ?status, %code, %message, "enroll capture incomplete");
			self.events.emit(SessionEvent::EnrollIncomplete {
				device: self.device.name().to_string(),
				code,
				message: message.clone(),
			});
			self.reset_device()?;
			return Ok(AttemptOutcome::Incomplete { code, message });
		};

		self.checkpoint()?;
		self.events.emit(SessionEvent::VerifyPrompt {
			device: self.device.name().to_string(),
		});

		let matched = match self.device.verify(&template, self.targets.verify()) {
			Ok(matched) => matched,
			Err(err) => {
				self.absorb(CaptureStage::Verify, err)?;
				return Ok(AttemptOutcome::CaptureError {
					stage: CaptureStage::Verify,
				});
			}
		};

		if !matched {
			self.summary.mismatches += 1;
			debug!(target = "fprint.enroll", device = %self.device.name(), "verification mismatch; attempt discarded");
			self.events.emit(SessionEvent::VerifyFailed {
				device: self.device.name().to_string(),
			});
			return Ok(AttemptOutcome::VerifyFailed);
		}

		self.summary.verified += 1;
		let label = enrollment_label(self.summary.verified);
		self.gallery.add(label.clone(), template);
		debug_assert_eq!(self.gallery.len(), self.summary.verified);

		info!(
			target = "fprint.enroll",
			device = %self.device.name(),
			%label,
			verified = self.summary.verified,
			target_count = self.target,
			"fingerprint enrolled"
		);
		self.events.emit(SessionEvent::Enrolled {
			device: self.device.name().to_string(),
			label: label.clone(),
			verified: self.summary.verified,
			target: self.target,
		});
		Ok(AttemptOutcome::Enrolled { label })
	}

	fn checkpoint(&self) -> Result<()> {
		if self.cancel.is_cancelled() {
			return Err(Error::Cancelled);
		}
		Ok(())
	}

	fn reset_device(&self) -> Result<()> {
		match self.device.reset() {
			Ok(()) => Ok(()),
			Err(err) if err.ends_session() => Err(err),
			Err(err) => {
				warn!(target = "fprint.enroll", device = %self.device.name(), error = %err, "device reset failed");
				Ok(())
			}
		}
	}

	/// Swallows per-capture failures; re-raises anything that must end the session.
	fn absorb(&mut self, stage: CaptureStage, err: Error) -> Result<()> {
		match err {
			err if err.ends_session() => Err(err),
			Error::Interrupted { .. } if self.cancel.is_cancelled() => Err(Error::Cancelled),
			err => {
				self.summary.capture_errors += 1;
				warn!(target = "fprint.enroll", device = %self.device.name(), ?stage, error = %err, "capture failed");
				self.events.emit(SessionEvent::CaptureFailed {
					device: self.device.name().to_string(),
					stage,
					error: err.to_string(),
				});
				Ok(())
			}
		}
	}
}
