//! Continuous 1:N identification against an enrolled gallery.

use fprint_protocol::{CaptureStage, SessionEvent};
use fprint_runtime::{Device, Error, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::CaptureTargets;
use crate::events::EventSink;
use crate::gallery::Gallery;

/// Result of one identification capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentifyOutcome {
	/// The sample matched the gallery entry with this label.
	Identified(String),
	NoMatch,
	/// A driver error was absorbed and reported.
	CaptureError,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IdentificationStats {
	pub captures: usize,
	pub matches: usize,
	pub misses: usize,
	pub capture_errors: usize,
}

/// Repeatedly captures and matches against a borrowed gallery.
///
/// There is no natural end: [`IdentificationController::run`] only returns
/// when the cancellation token fires or the device is disposed.
pub struct IdentificationController<'a> {
	device: &'a Device,
	gallery: &'a Gallery,
	events: &'a EventSink,
	cancel: &'a CancellationToken,
	targets: &'a CaptureTargets,
	stats: IdentificationStats,
}

impl<'a> IdentificationController<'a> {
	pub fn new(device: &'a Device, gallery: &'a Gallery, events: &'a EventSink, cancel: &'a CancellationToken, targets: &'a CaptureTargets) -> Self {
		Self {
			device,
			gallery,
			events,
			cancel,
			targets,
			stats: IdentificationStats::default(),
		}
	}

	pub fn stats(&self) -> IdentificationStats {
		self.stats
	}

	/// Loops until cancelled.
	///
	/// Cancellation yields `Ok` with the accumulated stats; disposal of the
	/// device yields [`Error::Disposed`].
	pub fn run(&mut self) -> Result<IdentificationStats> {
		loop {
			match self.identify_once() {
				Ok(_) => {}
				Err(Error::Cancelled) => return Ok(self.stats),
				Err(err) => return Err(err),
			}
		}
	}

	pub fn identify_once(&mut self) -> Result<IdentifyOutcome> {
		if self.cancel.is_cancelled() {
			return Err(Error::Cancelled);
		}
		self.events.emit(SessionEvent::IdentifyPrompt {
			device: self.device.name().to_string(),
		});

		let snapshot = self.gallery.snapshot();
		let matched = match self.device.identify(&snapshot, self.targets.identify()) {
			Ok(matched) => matched,
			Err(err) if err.ends_session() => return Err(err),
			Err(Error::Interrupted { .. }) if self.cancel.is_cancelled() => return Err(Error::Cancelled),
			Err(err) => {
				self.stats.capture_errors += 1;
				warn!(target = "fprint.identify", device = %self.device.name(), error = %err, "identify capture failed");
				self.events.emit(SessionEvent::CaptureFailed {
					device: self.device.name().to_string(),
					stage: CaptureStage::Identify,
					error: err.to_string(),
				});
				return Ok(IdentifyOutcome::CaptureError);
			}
		};
		self.stats.captures += 1;

		Ok(match matched {
			Some(label) => {
				self.stats.matches += 1;
				info!(target = "fprint.identify", device = %self.device.name(), label, "fingerprint identified");
				self.events.emit(SessionEvent::Identified {
					device: self.device.name().to_string(),
					label: label.to_string(),
				});
				IdentifyOutcome::Identified(label.to_string())
			}
			None => {
				self.stats.misses += 1;
				info!(target = "fprint.identify", device = %self.device.name(), "no match");
				self.events.emit(SessionEvent::NoMatch {
					device: self.device.name().to_string(),
				});
				IdentifyOutcome::NoMatch
			}
		})
	}
}
