//! Fingerprint enrollment and identification sessions.
//!
//! A session takes one scanner through enrollment until the gallery holds the
//! configured number of verified prints, then identifies captures against
//! that gallery until cancelled. Sessions run on their own threads; a
//! [`SessionSupervisor`] owns them and guarantees every device is released
//! within a bounded time after cancellation.
//!
//! # Example
//!
//! ```ignore
//! use fprint::{DeviceManager, EventSink, SessionConfig, SessionSupervisor, SimulatedBackend, SimulatedDeviceSpec};
//!
//! let mut manager = DeviceManager::new(SimulatedBackend::new(vec![SimulatedDeviceSpec::demo()]));
//! manager.initialize()?;
//!
//! let (events, mut rx) = EventSink::channel();
//! let mut supervisor = SessionSupervisor::new(SessionConfig::default(), events)?;
//! for device in manager.discover_devices()? {
//!     supervisor.start(device)?;
//! }
//!
//! tokio::signal::ctrl_c().await?;
//! for report in supervisor.cancel_and_wait().await {
//!     println!("{}: {}", report.device, report.termination);
//! }
//! ```

pub mod config;
pub mod enroll;
pub mod error;
pub mod events;
pub mod gallery;
pub mod identify;
pub mod supervisor;
pub mod worker;

pub use config::{CaptureTargets, DEFAULT_ENROLL_TARGET, DEFAULT_POLL_INTERVAL, DEFAULT_TERMINATION_DEADLINE, SessionConfig};
pub use enroll::{AttemptOutcome, EnrollmentController, EnrollmentSummary};
pub use error::{Error, Result};
pub use events::EventSink;
pub use fprint_protocol::{
	CaptureStage, DeviceInfo, DeviceState, EnrollResultCode, EnrollStatus, SessionEvent, SessionReport, SessionState, TerminationKind,
};
pub use fprint_runtime::{
	Device, DeviceBackend, DeviceManager, DisposeHandle, Driver, DriverCall, EnrollmentAttempt, SimulatedBackend, SimulatedCapture,
	SimulatedDeviceSpec, SimulatedDriver, SimulatedProbe, Template,
};
pub use gallery::{Gallery, enrollment_label};
pub use identify::{IdentificationController, IdentificationStats, IdentifyOutcome};
pub use supervisor::SessionSupervisor;
pub use worker::{SessionWorker, WorkerExit, WorkerHandle};
