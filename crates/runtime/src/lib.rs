//! Scanner lifecycle, discovery, and the driver seam.
//!
//! Native capture and matching live behind [`Driver`]. This crate wraps
//! drivers in [`Device`] handles whose lifecycle can be torn down safely from
//! another thread, and discovers them through a [`DeviceManager`].

pub mod device;
pub mod driver;
pub mod error;
pub mod image;
pub mod manager;
pub mod simulated;

pub use device::{Device, DisposeHandle};
pub use driver::{Driver, EnrollmentAttempt, Template};
pub use error::{Error, Result};
pub use manager::{DeviceBackend, DeviceManager};
pub use simulated::{DriverCall, SimulatedBackend, SimulatedCapture, SimulatedDeviceSpec, SimulatedDriver, SimulatedProbe};
