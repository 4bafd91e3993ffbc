//! One device session on its own thread.
//!
//! Captures block the calling thread for as long as the user takes to touch
//! the scanner, so each worker gets a dedicated OS thread instead of a task on
//! the async runtime. The supervisor talks to it through a [`WorkerHandle`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::thread::JoinHandle;
use std::time::Instant;

use fprint_protocol::{SessionEvent, SessionState, TerminationKind};
use fprint_runtime::{Device, DisposeHandle, Error, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::SessionConfig;
use crate::enroll::EnrollmentController;
use crate::events::EventSink;
use crate::identify::IdentificationController;

/// Why a worker's loop ended.
#[derive(Debug)]
pub enum WorkerExit {
	/// Observed the cancellation token and stopped between captures.
	Cancelled,
	/// The device was released out from under the session.
	Disposed,
	/// Open failed or the device reported an unrecoverable error.
	Failed(Error),
	/// Enrollment finished on a device that cannot identify.
	IdentificationUnsupported,
	Panicked,
}

impl WorkerExit {
	pub fn termination(&self) -> TerminationKind {
		match self {
			WorkerExit::Cancelled => TerminationKind::Cancelled,
			WorkerExit::Disposed => TerminationKind::ForcedTimeout,
			WorkerExit::Failed(_) | WorkerExit::Panicked => TerminationKind::Failed,
			WorkerExit::IdentificationUnsupported => TerminationKind::IdentificationUnsupported,
		}
	}

	fn from_error(err: Error) -> Self {
		match err {
			Error::Cancelled => WorkerExit::Cancelled,
			Error::Disposed { .. } => WorkerExit::Disposed,
			other => WorkerExit::Failed(other),
		}
	}
}

/// State shared between the worker thread and its handle.
#[derive(Default)]
struct WorkerStatus {
	state: AtomicU8,
	gallery_size: AtomicUsize,
	/// Set by whichever side reports the end of the session first.
	ended: AtomicBool,
}

impl WorkerStatus {
	fn state(&self) -> SessionState {
		SessionState::from_u8(self.state.load(Ordering::Acquire))
	}

	fn set_state(&self, state: SessionState) {
		self.state.store(state as u8, Ordering::Release);
	}

	fn request_cancel(&self) -> bool {
		self.state
			.compare_exchange(
				SessionState::Running as u8,
				SessionState::CancelRequested as u8,
				Ordering::AcqRel,
				Ordering::Acquire,
			)
			.is_ok()
	}

	fn claim_end(&self) -> bool {
		!self.ended.swap(true, Ordering::AcqRel)
	}
}

/// Enrollment followed by identification for one device.
pub struct SessionWorker {
	device: Device,
	config: SessionConfig,
	events: EventSink,
	cancel: CancellationToken,
	status: Arc<WorkerStatus>,
}

impl SessionWorker {
	pub fn new(device: Device, config: SessionConfig, events: EventSink) -> Self {
		Self {
			device,
			config,
			events,
			cancel: CancellationToken::new(),
			status: Arc::new(WorkerStatus::default()),
		}
	}

	pub fn device(&self) -> &Device {
		&self.device
	}

	/// Runs the session on the current thread until it ends.
	///
	/// The device is disposed before this returns, whatever the exit path.
	pub fn run(self) -> WorkerExit {
		info!(target = "fprint.session", device = %self.device.name(), "session started");
		let exit = self.drive();

		self.device.dispose();
		self.status.set_state(SessionState::Terminated);

		if self.status.claim_end() {
			let termination = exit.termination();
			info!(target = "fprint.session", device = %self.device.name(), %termination, "session ended");
			self.events.emit(SessionEvent::SessionEnded {
				device: self.device.name().to_string(),
				termination,
			});
		} else {
			debug!(target = "fprint.session", device = %self.device.name(), "session already reported as forcibly terminated");
		}
		exit
	}

	/// Moves the session onto a named thread.
	pub fn spawn(self) -> Result<WorkerHandle> {
		let device = self.device.name().to_string();
		let dispose = self.device.dispose_handle();
		let cancel = self.cancel.clone();
		let status = Arc::clone(&self.status);
		let events = self.events.clone();
		let finished = CancellationToken::new();

		let thread = std::thread::Builder::new().name(format!("fprint-{device}")).spawn({
			let finished = finished.clone();
			move || {
				let _finished = finished.drop_guard();
				self.run()
			}
		})?;

		Ok(WorkerHandle {
			device,
			dispose,
			cancel,
			status,
			events,
			finished,
			cancel_requested_at: None,
			thread: Some(thread),
		})
	}

	fn drive(&self) -> WorkerExit {
		if let Err(err) = self.device.open() {
			if let Error::DeviceUnavailable { device, reason } = &err {
				self.events.emit(SessionEvent::DeviceUnavailable {
					device: device.clone(),
					reason: reason.clone(),
				});
			}
			return WorkerExit::from_error(err);
		}
		self.events.emit(SessionEvent::DeviceOpened {
			info: self.device.info().clone(),
		});

		let targets = self.config.capture_targets();
		let mut enrollment = EnrollmentController::new(&self.device, &self.events, &self.cancel, &targets, self.config.enroll_target);
		while !enrollment.is_complete() {
			if let Err(err) = enrollment.attempt() {
				return WorkerExit::from_error(err);
			}
			self.status.gallery_size.store(enrollment.gallery().len(), Ordering::Release);
		}
		enrollment.finish();
		let gallery = enrollment.into_gallery();

		if !self.device.info().supports_identification {
			info!(target = "fprint.session", device = %self.device.name(), "device cannot identify; ending after enrollment");
			return WorkerExit::IdentificationUnsupported;
		}

		let mut identification = IdentificationController::new(&self.device, &gallery, &self.events, &self.cancel, &targets);
		match identification.run() {
			Ok(stats) => {
				debug!(
					target = "fprint.identify",
					device = %self.device.name(),
					captures = stats.captures,
					matches = stats.matches,
					"identification stopped"
				);
				WorkerExit::Cancelled
			}
			Err(err) => WorkerExit::from_error(err),
		}
	}
}

/// Supervisor-side view of a running [`SessionWorker`].
pub struct WorkerHandle {
	device: String,
	dispose: DisposeHandle,
	cancel: CancellationToken,
	status: Arc<WorkerStatus>,
	events: EventSink,
	finished: CancellationToken,
	cancel_requested_at: Option<Instant>,
	thread: Option<JoinHandle<WorkerExit>>,
}

impl WorkerHandle {
	pub fn device(&self) -> &str {
		&self.device
	}

	pub fn state(&self) -> SessionState {
		self.status.state()
	}

	/// Verified prints collected so far.
	pub fn gallery_size(&self) -> usize {
		self.status.gallery_size.load(Ordering::Acquire)
	}

	/// `true` once the session has returned, even if the thread is still unwinding.
	pub fn is_finished(&self) -> bool {
		self.finished.is_cancelled() || self.thread.as_ref().is_none_or(JoinHandle::is_finished)
	}

	/// Token cancelled when the worker thread exits, including by panic.
	pub fn finished(&self) -> CancellationToken {
		self.finished.clone()
	}

	/// When this worker was first asked to stop.
	pub fn cancel_requested_at(&self) -> Option<Instant> {
		self.cancel_requested_at
	}

	/// Sets the cancellation token and nudges a waiting capture.
	///
	/// Safe to repeat; only the first call for a running session emits
	/// [`SessionEvent::CancelRequested`]. Returns `true` for that call.
	pub fn signal_cancel(&mut self) -> bool {
		let first = self.status.request_cancel();
		if first {
			self.cancel_requested_at = Some(Instant::now());
			self.events.emit(SessionEvent::CancelRequested { device: self.device.clone() });
		}
		self.cancel.cancel();
		self.dispose.interrupt();
		first
	}

	/// Releases the device out from under the worker.
	///
	/// Returns `false` if the worker reported its own end first, in which case
	/// nothing is disposed here and the caller should join it instead.
	pub fn force_dispose(&self) -> bool {
		if !self.status.claim_end() {
			return false;
		}
		self.dispose.dispose();
		self.status.set_state(SessionState::Terminated);
		true
	}

	/// Waits for the thread to exit. Returns `None` if it was already joined or detached.
	pub fn join(&mut self) -> Option<WorkerExit> {
		let thread = self.thread.take()?;
		Some(thread.join().unwrap_or_else(|_| {
			error!(target = "fprint.session", device = %self.device, "session worker panicked");
			WorkerExit::Panicked
		}))
	}

	/// Stops tracking the thread without waiting for it.
	///
	/// Used after a forced disposal: the worker is left to unwind on its own
	/// and will find its device disposed if it ever resumes.
	pub fn detach(&mut self) {
		if self.thread.take().is_some() {
			debug!(target = "fprint.session", device = %self.device, "detached session worker");
		}
	}
}

impl std::fmt::Debug for WorkerHandle {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("WorkerHandle")
			.field("device", &self.device)
			.field("state", &self.state())
			.field("gallery_size", &self.gallery_size())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use fprint_protocol::DeviceState;
	use fprint_runtime::{DriverCall, SimulatedCapture, SimulatedDriver, SimulatedProbe};

	use super::*;

	fn device(identification: bool, captures: Vec<SimulatedCapture>) -> (Device, SimulatedProbe) {
		let (driver, probe) = SimulatedDriver::builder("sim").identification(identification).captures(captures).build();
		(Device::new(Box::new(driver)), probe)
	}

	fn enrolled(fingers: u32) -> Vec<SimulatedCapture> {
		(1..=fingers).flat_map(|finger| [SimulatedCapture::accept(finger), SimulatedCapture::accept(finger)]).collect()
	}

	fn config(target: usize) -> SessionConfig {
		SessionConfig::default().with_enroll_target(target)
	}

	#[test]
	fn unavailable_device_fails_without_release() {
		let (driver, probe) = SimulatedDriver::builder("busy").unavailable().build();
		let (events, mut rx) = EventSink::channel();
		let worker = SessionWorker::new(Device::new(Box::new(driver)), config(1), events);

		let exit = worker.run();
		assert!(matches!(exit, WorkerExit::Failed(Error::DeviceUnavailable { .. })));
		assert_eq!(exit.termination(), TerminationKind::Failed);
		assert_eq!(probe.release_count(), 0);
		assert!(matches!(rx.try_recv(), Ok(SessionEvent::DeviceUnavailable { .. })));
		assert!(matches!(
			rx.try_recv(),
			Ok(SessionEvent::SessionEnded {
				termination: TerminationKind::Failed,
				..
			})
		));
	}

	#[test]
	fn enrollment_only_device_ends_after_gallery_is_full() {
		let (device, probe) = device(false, enrolled(2));
		let worker = SessionWorker::new(device, config(2), EventSink::discard());

		assert!(matches!(worker.run(), WorkerExit::IdentificationUnsupported));
		assert!(!probe.calls().contains(&DriverCall::Identify));
		assert_eq!(probe.release_count(), 1);
	}

	#[test]
	fn cancelled_worker_releases_device_once() {
		let (device, probe) = device(true, enrolled(1));
		let worker = SessionWorker::new(device, config(1), EventSink::discard());
		let mut handle = worker.spawn().unwrap();

		assert!(probe.wait_until_waiting(Duration::from_secs(2)));
		assert_eq!(handle.gallery_size(), 1);
		assert!(handle.signal_cancel());
		assert!(!handle.signal_cancel());

		let exit = handle.join().unwrap();
		assert!(matches!(exit, WorkerExit::Cancelled));
		assert!(handle.finished().is_cancelled());
		assert_eq!(handle.state(), SessionState::Terminated);
		assert_eq!(probe.release_count(), 1);
		let captures_at_exit = probe.capture_count();
		probe.push(SimulatedCapture::accept(1));
		assert_eq!(probe.capture_count(), captures_at_exit);
	}

	#[test]
	fn forced_dispose_suppresses_worker_report() {
		let (device, probe) = device(true, vec![SimulatedCapture::Block]);
		let dispose = device.dispose_handle();
		let (events, mut rx) = EventSink::channel();
		let mut handle = SessionWorker::new(device, config(1), events).spawn().unwrap();

		assert!(probe.wait_until_waiting(Duration::from_secs(2)));
		handle.signal_cancel();
		assert!(!handle.is_finished());
		assert!(handle.force_dispose());
		assert!(!handle.force_dispose());

		assert!(matches!(handle.join().unwrap(), WorkerExit::Disposed));
		assert_eq!(dispose.state(), DeviceState::Disposed);
		assert_eq!(probe.release_count(), 1);
		while let Ok(event) = rx.try_recv() {
			assert!(!matches!(event, SessionEvent::SessionEnded { .. }), "worker reported after forced disposal");
		}
	}

	#[test]
	fn worker_reports_end_before_a_late_force() {
		let (device, _probe) = device(false, enrolled(1));
		let mut handle = SessionWorker::new(device, config(1), EventSink::discard()).spawn().unwrap();

		assert!(matches!(handle.join().unwrap(), WorkerExit::IdentificationUnsupported));
		assert!(!handle.force_dispose());
		assert!(handle.join().is_none());
	}
}
