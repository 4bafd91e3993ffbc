//! Device discovery.
//!
//! [`DeviceManager`] is an explicit context object: construct one at process
//! start and pass it to whatever performs discovery. Enumeration itself is
//! delegated to a [`DeviceBackend`].

use tracing::{debug, info};

use crate::device::Device;
use crate::driver::Driver;
use crate::error::{Error, Result};

/// Enumerates scanners for a [`DeviceManager`].
pub trait DeviceBackend: Send {
	fn name(&self) -> &str;

	/// Prepares the native library. Called once before discovery.
	fn initialize(&mut self) -> Result<()>;

	/// Returns drivers for every scanner currently attached. One-shot per call.
	fn discover(&mut self) -> Result<Vec<Box<dyn Driver>>>;
}

/// Discovers devices through a backend.
pub struct DeviceManager {
	backend: Box<dyn DeviceBackend>,
	initialized: bool,
}

impl DeviceManager {
	pub fn new(backend: impl DeviceBackend + 'static) -> Self {
		Self {
			backend: Box::new(backend),
			initialized: false,
		}
	}

	pub fn backend_name(&self) -> &str {
		self.backend.name()
	}

	pub fn is_initialized(&self) -> bool {
		self.initialized
	}

	/// Initializes the backend. Idempotent.
	pub fn initialize(&mut self) -> Result<()> {
		if self.initialized {
			return Ok(());
		}

		self.backend.initialize().map_err(|err| match err {
			Error::Init(_) => err,
			other => Error::Init(other.to_string()),
		})?;
		self.initialized = true;
		info!(target = "fprint.device", backend = %self.backend.name(), "device manager initialized");
		Ok(())
	}

	/// Returns a closed [`Device`] for every attached scanner.
	pub fn discover_devices(&mut self) -> Result<Vec<Device>> {
		if !self.initialized {
			return Err(Error::NotInitialized);
		}

		let devices: Vec<Device> = self.backend.discover()?.into_iter().map(Device::new).collect();
		debug!(
			target = "fprint.device",
			backend = %self.backend.name(),
			count = devices.len(),
			"discovered devices"
		);
		Ok(devices)
	}
}
