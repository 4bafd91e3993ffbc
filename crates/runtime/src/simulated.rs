//! Simulated scanner for tests and hardware-free runs.
//!
//! Provides a scripted in-memory [`Driver`] plus a [`SimulatedProbe`] for
//! injecting captures and inspecting the calls a session made.
//!
//! # Example
//!
//! ```ignore
//! let (driver, probe) = SimulatedDriver::builder("sim")
//!     .identification(true)
//!     .captures([SimulatedCapture::accept(1), SimulatedCapture::accept(1)])
//!     .build();
//! let device = Device::new(Box::new(driver));
//!
//! device.open()?;
//! let attempt = device.enroll(None)?;
//! probe.push(SimulatedCapture::reject(101));
//! assert_eq!(probe.capture_count(), 1);
//! ```
//!
//! A finger is modelled as a number: a template enrolled from finger `n`
//! matches any later capture of finger `n` on the same driver.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use fprint_protocol::{DeviceInfo, EnrollResultCode};
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::driver::{Driver, EnrollmentAttempt, Template};
use crate::error::{Error, Result};
use crate::image;
use crate::manager::DeviceBackend;

/// One scripted physical interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SimulatedCapture {
	/// A good sample of `finger`.
	Accept { finger: u32 },
	/// A sample the scanner rejects with `code`.
	Reject {
		code: i32,
		#[serde(default, skip_serializing_if = "Option::is_none")]
		message: Option<String>,
	},
	/// Hangs until the handle is released, ignoring interrupts.
	Block,
	/// Simulates processing time before the next scripted entry.
	Pause { ms: u64 },
}

impl SimulatedCapture {
	pub fn accept(finger: u32) -> Self {
		SimulatedCapture::Accept { finger }
	}

	pub fn reject(code: i32) -> Self {
		SimulatedCapture::Reject { code, message: None }
	}

	pub fn pause(duration: Duration) -> Self {
		SimulatedCapture::Pause {
			ms: duration.as_millis() as u64,
		}
	}
}

/// Driver calls recorded by the simulator, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverCall {
	Open,
	Enroll,
	Verify,
	Identify,
	Reset,
	Interrupt,
	Release,
}

impl DriverCall {
	pub fn is_capture(self) -> bool {
		matches!(self, DriverCall::Enroll | DriverCall::Verify | DriverCall::Identify)
	}
}

enum Sample {
	Finger(u32),
	Rejected { code: EnrollResultCode, message: Option<String> },
}

#[derive(Default)]
struct SimState {
	queue: VecDeque<SimulatedCapture>,
	calls: Vec<DriverCall>,
	open: bool,
	released: bool,
	interrupted: bool,
	waiting: bool,
}

#[derive(Default)]
struct SimShared {
	state: Mutex<SimState>,
	wake: Condvar,
}

/// Scripted in-memory scanner.
///
/// When the script runs out, captures wait for [`SimulatedProbe::push`], an
/// interrupt, or a release, the way a real scanner waits for a finger.
pub struct SimulatedDriver {
	info: DeviceInfo,
	unavailable: bool,
	shared: Arc<SimShared>,
}

impl SimulatedDriver {
	pub fn builder(driver: impl Into<String>) -> SimulatedDriverBuilder {
		SimulatedDriverBuilder {
			info: DeviceInfo::new(driver, "Simulated fingerprint scanner").with_enroll_stages(5),
			unavailable: false,
			captures: Vec::new(),
		}
	}

	fn released_error(&self) -> Error {
		Error::Driver {
			device: self.info.driver.clone(),
			message: "handle released during capture".to_string(),
		}
	}

	fn next_sample(&self, call: DriverCall) -> Result<Sample> {
		let mut state = self.shared.state.lock();
		state.calls.push(call);

		loop {
			if state.released {
				return Err(self.released_error());
			}

			match state.queue.pop_front() {
				Some(SimulatedCapture::Accept { finger }) => return Ok(Sample::Finger(finger)),
				Some(SimulatedCapture::Reject { code, message }) => {
					return Ok(Sample::Rejected {
						code: EnrollResultCode::from(code),
						message,
					});
				}
				Some(SimulatedCapture::Pause { ms }) => {
					let until = Instant::now() + Duration::from_millis(ms);
					while !state.released && Instant::now() < until {
						self.shared.wake.wait_until(&mut state, until);
					}
				}
				Some(SimulatedCapture::Block) => {
					state.waiting = true;
					self.shared.wake.notify_all();
					while !state.released {
						self.shared.wake.wait(&mut state);
					}
					state.waiting = false;
				}
				None => {
					if state.interrupted {
						state.interrupted = false;
						return Err(Error::Interrupted {
							device: self.info.driver.clone(),
						});
					}
					state.waiting = true;
					self.shared.wake.notify_all();
					self.shared.wake.wait(&mut state);
					state.waiting = false;
				}
			}
		}
	}

	fn write_artifact(&self, target: Option<&Path>, sample: &Sample) {
		let Some(path) = target else {
			return;
		};
		if !self.info.supports_imaging {
			return;
		}

		let finger = match sample {
			Sample::Finger(finger) => Some(*finger),
			Sample::Rejected { .. } => None,
		};
		let pixels = image::synthetic_print(finger, self.info.image_width, self.info.image_height);
		if let Err(err) = image::write_pgm(path, self.info.image_width, self.info.image_height, &pixels) {
			warn!(
				target = "fprint.device",
				device = %self.info.driver,
				path = %path.display(),
				error = %err,
				"failed to write capture image"
			);
		}
	}

	fn template_for(&self, finger: u32) -> Template {
		Template::new(self.info.driver.as_str(), finger.to_le_bytes().to_vec())
	}

	fn finger_of(&self, template: &Template) -> Option<u32> {
		if template.driver() != self.info.driver {
			return None;
		}
		let bytes: [u8; 4] = template.data().try_into().ok()?;
		Some(u32::from_le_bytes(bytes))
	}
}

impl Driver for SimulatedDriver {
	fn info(&self) -> &DeviceInfo {
		&self.info
	}

	fn open(&self) -> Result<()> {
		let mut state = self.shared.state.lock();
		state.calls.push(DriverCall::Open);
		if self.unavailable {
			return Err(Error::DeviceUnavailable {
				device: self.info.driver.clone(),
				reason: "simulated device is claimed by another process".to_string(),
			});
		}
		state.open = true;
		Ok(())
	}

	fn enroll(&self, target: Option<&Path>) -> Result<EnrollmentAttempt> {
		let sample = self.next_sample(DriverCall::Enroll)?;
		self.write_artifact(target, &sample);
		trace!(target = "fprint.device", device = %self.info.driver, "simulated enroll capture");

		Ok(match sample {
			Sample::Finger(finger) => EnrollmentAttempt::complete(self.template_for(finger)),
			Sample::Rejected { code, message } => {
				let message = message.unwrap_or_else(|| code.message().to_string());
				EnrollmentAttempt::incomplete(code, message)
			}
		})
	}

	fn verify(&self, template: &Template, target: Option<&Path>) -> Result<bool> {
		let sample = self.next_sample(DriverCall::Verify)?;
		self.write_artifact(target, &sample);

		Ok(match sample {
			Sample::Finger(finger) => self.finger_of(template) == Some(finger),
			Sample::Rejected { .. } => false,
		})
	}

	fn identify(&self, candidates: &[&Template], target: Option<&Path>) -> Result<Option<usize>> {
		let sample = self.next_sample(DriverCall::Identify)?;
		self.write_artifact(target, &sample);

		Ok(match sample {
			Sample::Finger(finger) => candidates.iter().position(|template| self.finger_of(template) == Some(finger)),
			Sample::Rejected { .. } => None,
		})
	}

	fn reset(&self) -> Result<()> {
		let mut state = self.shared.state.lock();
		state.calls.push(DriverCall::Reset);
		if state.released {
			return Err(self.released_error());
		}
		Ok(())
	}

	fn interrupt(&self) {
		let mut state = self.shared.state.lock();
		state.calls.push(DriverCall::Interrupt);
		state.interrupted = true;
		self.shared.wake.notify_all();
	}

	fn release(&self) {
		let mut state = self.shared.state.lock();
		state.calls.push(DriverCall::Release);
		state.released = true;
		state.open = false;
		self.shared.wake.notify_all();
	}
}

/// Builder for [`SimulatedDriver`].
pub struct SimulatedDriverBuilder {
	info: DeviceInfo,
	unavailable: bool,
	captures: Vec<SimulatedCapture>,
}

impl SimulatedDriverBuilder {
	pub fn full_name(mut self, full_name: impl Into<String>) -> Self {
		self.info.full_name = full_name.into();
		self
	}

	pub fn enroll_stages(mut self, stages: u32) -> Self {
		self.info.enroll_stages = stages;
		self
	}

	pub fn imaging(mut self, width: u32, height: u32) -> Self {
		self.info = self.info.with_imaging(width, height);
		self
	}

	pub fn identification(mut self, supported: bool) -> Self {
		self.info.supports_identification = supported;
		self
	}

	/// Makes `open()` fail as if another process held the scanner.
	pub fn unavailable(mut self) -> Self {
		self.unavailable = true;
		self
	}

	pub fn captures(mut self, captures: impl IntoIterator<Item = SimulatedCapture>) -> Self {
		self.captures.extend(captures);
		self
	}

	/// Build the driver and return it with a probe sharing its state.
	pub fn build(self) -> (SimulatedDriver, SimulatedProbe) {
		let shared = Arc::new(SimShared::default());
		shared.state.lock().queue.extend(self.captures);

		let driver = SimulatedDriver {
			info: self.info,
			unavailable: self.unavailable,
			shared: Arc::clone(&shared),
		};
		(driver, SimulatedProbe { shared })
	}
}

/// Test-side view of a [`SimulatedDriver`].
#[derive(Clone)]
pub struct SimulatedProbe {
	shared: Arc<SimShared>,
}

impl SimulatedProbe {
	/// Appends a capture to the script, waking a capture that waits for a finger.
	pub fn push(&self, capture: SimulatedCapture) {
		let mut state = self.shared.state.lock();
		state.queue.push_back(capture);
		self.shared.wake.notify_all();
	}

	pub fn calls(&self) -> Vec<DriverCall> {
		self.shared.state.lock().calls.clone()
	}

	pub fn capture_count(&self) -> usize {
		self.count(DriverCall::is_capture)
	}

	pub fn reset_count(&self) -> usize {
		self.count(|call| call == DriverCall::Reset)
	}

	pub fn release_count(&self) -> usize {
		self.count(|call| call == DriverCall::Release)
	}

	pub fn is_released(&self) -> bool {
		self.shared.state.lock().released
	}

	/// Scripted captures not yet consumed.
	pub fn pending(&self) -> usize {
		self.shared.state.lock().queue.len()
	}

	/// Blocks until a capture is waiting for input, or `timeout` passes.
	pub fn wait_until_waiting(&self, timeout: Duration) -> bool {
		let deadline = Instant::now() + timeout;
		let mut state = self.shared.state.lock();
		while !state.waiting {
			if self.shared.wake.wait_until(&mut state, deadline).timed_out() {
				return state.waiting;
			}
		}
		true
	}

	fn count(&self, predicate: impl Fn(DriverCall) -> bool) -> usize {
		self.shared.state.lock().calls.iter().filter(|call| predicate(**call)).count()
	}
}

/// Declarative description of a simulated scanner, as found in config files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SimulatedDeviceSpec {
	pub driver: String,
	pub full_name: String,
	pub enroll_stages: u32,
	pub supports_imaging: bool,
	pub supports_identification: bool,
	pub image_width: u32,
	pub image_height: u32,
	pub unavailable: bool,
	pub captures: Vec<SimulatedCapture>,
}

impl Default for SimulatedDeviceSpec {
	fn default() -> Self {
		Self {
			driver: "sim".to_string(),
			full_name: "Simulated fingerprint scanner".to_string(),
			enroll_stages: 5,
			supports_imaging: true,
			supports_identification: true,
			image_width: 192,
			image_height: 256,
			unavailable: false,
			captures: Vec::new(),
		}
	}
}

impl SimulatedDeviceSpec {
	/// A scanner scripted to enroll five fingers (with one rejected sample and
	/// one failed verification along the way) and then identify two captures.
	pub fn demo() -> Self {
		let mut captures = vec![
			SimulatedCapture::accept(1),
			SimulatedCapture::accept(1),
			SimulatedCapture::reject(EnrollResultCode::RetryTooShort.code()),
			SimulatedCapture::accept(2),
			SimulatedCapture::accept(2),
			SimulatedCapture::accept(3),
			SimulatedCapture::accept(7),
		];
		for finger in 3..=5 {
			captures.push(SimulatedCapture::accept(finger));
			captures.push(SimulatedCapture::accept(finger));
		}
		captures.push(SimulatedCapture::accept(4));
		captures.push(SimulatedCapture::accept(9));

		Self { captures, ..Self::default() }
	}

	pub fn build(&self) -> (SimulatedDriver, SimulatedProbe) {
		let mut builder = SimulatedDriver::builder(self.driver.as_str())
			.full_name(self.full_name.as_str())
			.enroll_stages(self.enroll_stages)
			.identification(self.supports_identification)
			.captures(self.captures.iter().cloned());
		if self.supports_imaging {
			builder = builder.imaging(self.image_width, self.image_height);
		}
		if self.unavailable {
			builder = builder.unavailable();
		}
		builder.build()
	}
}

/// Discovery backend yielding one simulated scanner per spec.
pub struct SimulatedBackend {
	specs: Vec<SimulatedDeviceSpec>,
	probes: Vec<SimulatedProbe>,
	initialized: bool,
}

impl SimulatedBackend {
	pub fn new(specs: Vec<SimulatedDeviceSpec>) -> Self {
		Self {
			specs,
			probes: Vec::new(),
			initialized: false,
		}
	}

	/// Probes for every driver handed out by `discover`, in discovery order.
	pub fn probes(&self) -> &[SimulatedProbe] {
		&self.probes
	}
}

impl DeviceBackend for SimulatedBackend {
	fn name(&self) -> &str {
		"simulated"
	}

	fn initialize(&mut self) -> Result<()> {
		self.initialized = true;
		Ok(())
	}

	fn discover(&mut self) -> Result<Vec<Box<dyn Driver>>> {
		if !self.initialized {
			return Err(Error::NotInitialized);
		}

		let mut drivers: Vec<Box<dyn Driver>> = Vec::with_capacity(self.specs.len());
		for spec in &self.specs {
			let (driver, probe) = spec.build();
			self.probes.push(probe);
			drivers.push(Box::new(driver));
		}
		Ok(drivers)
	}
}
