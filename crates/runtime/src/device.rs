//! Capability-described handle to one physical scanner.
//!
//! A [`Device`] is exclusively owned by the worker that opened it. The single
//! sanctioned exception is the [`DisposeHandle`], which lets a supervisor
//! release the hardware from another thread. A worker resuming after such a
//! release observes `Disposed` and stops.
//!
//! Checking that the handle is open and registering a driver call happen under
//! the same lock as the swap to `Disposed`, so every call either registered
//! before the release or is rejected without reaching the driver.
//!
//! # Forced release hazard
//!
//! Disposal may happen while a registered call is blocked inside the driver.
//! What the driver does with an in-flight capture when its handle is released
//! is driver-specific; see [`Driver::release`]. The handle only guarantees that
//! the result of such a call is discarded and reported as [`Error::Disposed`],
//! and that no further driver call is issued through it.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use fprint_protocol::{DeviceInfo, DeviceState};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::driver::{Driver, EnrollmentAttempt, Template};
use crate::error::{Error, Result};

struct DeviceShared {
	info: DeviceInfo,
	driver: Box<dyn Driver>,
	state: AtomicU8,
	/// Driver calls that passed the open check and have not returned.
	/// Lifecycle transitions hold this lock.
	in_flight: Mutex<usize>,
}

impl DeviceShared {
	fn state(&self) -> DeviceState {
		DeviceState::from_u8(self.state.load(Ordering::Acquire))
	}

	fn disposed_error(&self) -> Error {
		Error::Disposed {
			device: self.info.driver.clone(),
		}
	}

	fn ensure_open(&self) -> Result<()> {
		match self.state() {
			DeviceState::Open => Ok(()),
			DeviceState::Closed => Err(Error::NotOpen {
				device: self.info.driver.clone(),
			}),
			DeviceState::Disposed => Err(self.disposed_error()),
		}
	}

	/// Registers a driver call if the handle is open.
	fn enter(&self) -> Result<CallGuard<'_>> {
		let mut in_flight = self.in_flight.lock();
		self.ensure_open()?;
		*in_flight += 1;
		Ok(CallGuard { shared: self })
	}

	/// Moves the handle to `Disposed`, releasing the driver if it was open.
	///
	/// Returns `true` only for the call that performed the transition.
	fn dispose(&self, origin: &'static str) -> bool {
		let in_flight = self.in_flight.lock();
		let previous = DeviceState::from_u8(self.state.swap(DeviceState::Disposed as u8, Ordering::AcqRel));
		match previous {
			DeviceState::Disposed => false,
			DeviceState::Open => {
				self.driver.release();
				info!(
					target = "fprint.device",
					device = %self.info.driver,
					origin,
					in_flight = *in_flight,
					"device released"
				);
				true
			}
			DeviceState::Closed => {
				debug!(target = "fprint.device", device = %self.info.driver, origin, "disposed unopened device");
				true
			}
		}
	}

	fn interrupt(&self) {
		if self.state() == DeviceState::Open {
			self.driver.interrupt();
		}
	}
}

struct CallGuard<'a> {
	shared: &'a DeviceShared,
}

impl Drop for CallGuard<'_> {
	fn drop(&mut self) {
		*self.shared.in_flight.lock() -= 1;
	}
}

/// Handle to one scanner. Dropping it disposes the device.
pub struct Device {
	shared: Arc<DeviceShared>,
}

impl Device {
	pub fn new(driver: Box<dyn Driver>) -> Self {
		let info = driver.info().clone();
		Self {
			shared: Arc::new(DeviceShared {
				info,
				driver,
				state: AtomicU8::new(DeviceState::Closed as u8),
				in_flight: Mutex::new(0),
			}),
		}
	}

	pub fn info(&self) -> &DeviceInfo {
		&self.shared.info
	}

	/// Driver name used to label logs and events.
	pub fn name(&self) -> &str {
		&self.shared.info.driver
	}

	pub fn state(&self) -> DeviceState {
		self.shared.state()
	}

	/// Transitions `Closed -> Open`.
	///
	/// Fails with [`Error::DeviceUnavailable`] when the driver cannot claim the
	/// peripheral, or [`Error::Disposed`] when the handle is already released.
	pub fn open(&self) -> Result<()> {
		match self.state() {
			DeviceState::Open => return Ok(()),
			DeviceState::Disposed => return Err(self.shared.disposed_error()),
			DeviceState::Closed => {}
		}

		if let Err(err) = self.shared.driver.open() {
			warn!(target = "fprint.device", device = %self.name(), error = %err, "failed to open device");
			return Err(match err {
				Error::DeviceUnavailable { .. } => err,
				other => Error::DeviceUnavailable {
					device: self.name().to_string(),
					reason: other.to_string(),
				},
			});
		}

		let gate = self.shared.in_flight.lock();
		let claimed = self.shared.state.compare_exchange(
			DeviceState::Closed as u8,
			DeviceState::Open as u8,
			Ordering::AcqRel,
			Ordering::Acquire,
		);
		match claimed.map_err(DeviceState::from_u8) {
			Ok(_) | Err(DeviceState::Open) => {
				info!(target = "fprint.device", device = %self.name(), "device opened");
				Ok(())
			}
			Err(_) => {
				drop(gate);
				// Disposed while the driver was opening; nobody else will release it.
				self.shared.driver.release();
				Err(self.shared.disposed_error())
			}
		}
	}

	/// Runs one enrollment capture.
	pub fn enroll(&self, target: Option<&Path>) -> Result<EnrollmentAttempt> {
		self.call("enroll", |driver| driver.enroll(target))
	}

	/// Captures once and checks the sample against `template` (1:1).
	pub fn verify(&self, template: &Template, target: Option<&Path>) -> Result<bool> {
		self.call("verify", |driver| driver.verify(template, target))
	}

	/// Captures once and matches the sample against labelled candidates (1:N).
	///
	/// The returned label always borrows from `candidates`, so a match can
	/// never name a label outside the snapshot used for the call.
	pub fn identify<'g>(&self, candidates: &[(&'g str, &'g Template)], target: Option<&Path>) -> Result<Option<&'g str>> {
		let templates: Vec<&Template> = candidates.iter().map(|(_, template)| *template).collect();
		let matched = self.call("identify", |driver| driver.identify(&templates, target))?;

		Ok(match matched {
			Some(index) => match candidates.get(index) {
				Some((label, _)) => Some(*label),
				None => {
					warn!(
						target = "fprint.device",
						device = %self.name(),
						index,
						candidates = candidates.len(),
						"driver matched an index outside the gallery; treating as no match"
					);
					None
				}
			},
			None => None,
		})
	}

	/// Clears device-internal error state after an incomplete enrollment.
	pub fn reset(&self) -> Result<()> {
		self.call("reset", |driver| driver.reset())
	}

	/// Forwards an interrupt hint to a capture waiting for a finger.
	pub fn interrupt(&self) {
		self.shared.interrupt();
	}

	/// Releases the device. Idempotent; returns `true` for the call that released it.
	pub fn dispose(&self) -> bool {
		self.shared.dispose("owner")
	}

	/// Returns a handle that can dispose this device from another thread.
	pub fn dispose_handle(&self) -> DisposeHandle {
		DisposeHandle {
			shared: Arc::clone(&self.shared),
		}
	}

	fn call<T>(&self, op: &'static str, f: impl FnOnce(&dyn Driver) -> Result<T>) -> Result<T> {
		let guard = self.shared.enter()?;
		let result = f(self.shared.driver.as_ref());
		drop(guard);

		if self.state() == DeviceState::Disposed {
			debug!(target = "fprint.device", device = %self.name(), op, "device disposed during call; result discarded");
			return Err(self.shared.disposed_error());
		}
		result
	}
}

impl Drop for Device {
	fn drop(&mut self) {
		self.shared.dispose("drop");
	}
}

impl std::fmt::Debug for Device {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Device")
			.field("driver", &self.shared.info.driver)
			.field("state", &self.state())
			.finish()
	}
}

/// Out-of-band access to a device owned by someone else.
///
/// Only disposal and interrupt hints are exposed; capture calls stay with the owner.
#[derive(Clone)]
pub struct DisposeHandle {
	shared: Arc<DeviceShared>,
}

impl DisposeHandle {
	pub fn device(&self) -> &str {
		&self.shared.info.driver
	}

	pub fn state(&self) -> DeviceState {
		self.shared.state()
	}

	pub fn interrupt(&self) {
		self.shared.interrupt();
	}

	/// Releases the device regardless of what its owner is doing.
	///
	/// See the module docs for what happens to a capture in flight.
	pub fn dispose(&self) -> bool {
		self.shared.dispose("supervisor")
	}
}
