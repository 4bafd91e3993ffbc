//! Interactive capture sessions.
//!
//! Each discovered scanner gets its own supervised session, one after the
//! other. A session ends when the user types `a` and Enter, presses Ctrl-C,
//! the `--cancel-after-ms` timer fires, or the session stops by itself.

use std::io::BufRead;
use std::time::Duration;

use anyhow::Context;
use fprint::{DeviceManager, EventSink, SessionSupervisor, SimulatedBackend, TerminationKind};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::cli::SessionArgs;
use crate::config::{FileConfig, effective_config};
use crate::error::Result;
use crate::output::{
	Artifact, ArtifactType, CancelTrigger, CommandInputs, CommandResult, DeviceSessionData, DeviceSource, DiagnosticLevel, OutputFormat, ResultBuilder,
	SessionData, print_event,
};

/// Line typed on stdin to stop the current session.
const CANCEL_KEY: &str = "a";

pub async fn run(args: &SessionArgs, file: &FileConfig, format: OutputFormat) -> Result<CommandResult<SessionData>> {
	let config = file.session_config(args);
	config.validate()?;
	let (specs, device_source) = file.device_specs();

	let mut manager = DeviceManager::new(SimulatedBackend::new(specs));
	manager.initialize()?;
	let devices = manager.discover_devices()?;
	info!(target = "fprint.cli", count = devices.len(), "starting sessions");

	let (events, mut rx) = EventSink::channel();
	let mut keys = spawn_key_reader()?;
	let mut sessions = Vec::with_capacity(devices.len());

	for device in devices {
		let mut supervisor = SessionSupervisor::new(config.clone(), events.clone())?;
		supervisor.start(device)?;

		let trigger = {
			let idle = supervisor.wait_idle();
			let interrupt = tokio::signal::ctrl_c();
			let timer = cancel_timer(args.cancel_after_ms);
			tokio::pin!(idle, interrupt, timer);

			loop {
				tokio::select! {
					Some(event) = rx.recv() => print_event(&event, format),
					_ = &mut idle => break CancelTrigger::SessionEnded,
					Some(()) = keys.recv() => break CancelTrigger::Keypress,
					_ = &mut interrupt => break CancelTrigger::Interrupt,
					_ = &mut timer => break CancelTrigger::Timer,
				}
			}
		};
		info!(target = "fprint.cli", ?trigger, "stopping session");

		let reports = {
			let shutdown = supervisor.cancel_and_wait();
			tokio::pin!(shutdown);
			loop {
				tokio::select! {
					reports = &mut shutdown => break reports,
					Some(event) = rx.recv() => print_event(&event, format),
				}
			}
		};
		while let Ok(event) = rx.try_recv() {
			print_event(&event, format);
		}

		sessions.extend(reports.into_iter().map(|report| DeviceSessionData { trigger, report }));
	}

	let mut builder: ResultBuilder<SessionData> = ResultBuilder::new("session")
		.inputs(CommandInputs {
			config_file: file.source.clone(),
			cancel_after_ms: args.cancel_after_ms,
		})
		.config(effective_config(&config, device_source));
	if device_source == DeviceSource::Demo {
		builder = builder.diagnostic(DiagnosticLevel::Info, "no scanners configured; using the scripted demo scanner");
	}

	for session in &sessions {
		builder = match session.report.termination {
			TerminationKind::ForcedTimeout => builder.diagnostic_with_source(
				DiagnosticLevel::Warning,
				format!(
					"session did not stop within {}ms; device was disposed forcefully",
					config.termination_deadline.as_millis()
				),
				session.report.device.clone(),
			),
			TerminationKind::Failed => {
				builder.diagnostic_with_source(DiagnosticLevel::Error, "session failed; see the event log", session.report.device.clone())
			}
			TerminationKind::Cancelled | TerminationKind::IdentificationUnsupported => builder,
		};
	}

	if let Some(dir) = &config.capture_dir {
		for name in ["enroll.pgm", "verify.pgm", "identify.pgm"] {
			let path = dir.join(name);
			if let Ok(meta) = std::fs::metadata(&path) {
				builder = builder.artifact(Artifact {
					artifact_type: ArtifactType::Capture,
					path,
					size_bytes: Some(meta.len()),
				});
			}
		}
	}

	let forced = sessions.iter().filter(|session| session.report.was_forced()).count();
	if forced > 0 {
		warn!(target = "fprint.cli", forced, "some sessions were terminated forcefully");
	}
	Ok(builder.data(SessionData { sessions, forced }).build())
}

/// Forwards each `a` line typed on stdin.
///
/// The reader is a detached thread so a terminal that never sends input
/// cannot hold the process open. The channel closes at end of input.
fn spawn_key_reader() -> Result<mpsc::UnboundedReceiver<()>> {
	let (tx, rx) = mpsc::unbounded_channel();
	std::thread::Builder::new()
		.name("fprint-stdin".to_string())
		.spawn(move || {
			for line in std::io::stdin().lock().lines() {
				let Ok(line) = line else {
					break;
				};
				if line.trim().eq_ignore_ascii_case(CANCEL_KEY) && tx.send(()).is_err() {
					break;
				}
			}
		})
		.context("failed to spawn stdin reader")?;
	Ok(rx)
}

async fn cancel_timer(after_ms: Option<u64>) {
	match after_ms {
		Some(ms) => tokio::time::sleep(Duration::from_millis(ms)).await,
		None => std::future::pending().await,
	}
}

