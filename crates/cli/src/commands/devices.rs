use fprint::{DeviceManager, SimulatedBackend};
use tracing::info;

use crate::config::FileConfig;
use crate::error::Result;
use crate::output::{CommandInputs, CommandResult, DevicesData, ResultBuilder};

/// Initializes discovery and lists every scanner without opening any of them.
pub async fn run(file: &FileConfig) -> Result<CommandResult<DevicesData>> {
	let (specs, _) = file.device_specs();
	let mut manager = DeviceManager::new(SimulatedBackend::new(specs));
	manager.initialize()?;

	let devices: Vec<_> = manager.discover_devices()?.iter().map(|device| device.info().clone()).collect();
	info!(target = "fprint.cli", count = devices.len(), "listed devices");

	Ok(ResultBuilder::new("devices")
		.inputs(CommandInputs {
			config_file: file.source.clone(),
			..CommandInputs::default()
		})
		.data(DevicesData {
			backend: manager.backend_name().to_string(),
			count: devices.len(),
			devices,
		})
		.build())
}
