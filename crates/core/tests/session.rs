//! End-to-end sessions against the simulated scanner.

use std::time::{Duration, Instant};

use fprint::{
	Device, DeviceManager, DriverCall, EnrollmentController, EventSink, SessionConfig, SessionEvent, SessionSupervisor, SimulatedBackend,
	SimulatedCapture, SimulatedDeviceSpec, SimulatedDriver, SimulatedProbe, TerminationKind,
};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;

fn init_tracing() {
	let _ = tracing_subscriber::fmt().with_test_writer().with_max_level(tracing::Level::DEBUG).try_init();
}

fn fast_config() -> SessionConfig {
	SessionConfig::default()
		.with_poll_interval(Duration::from_millis(25))
		.with_termination_deadline(Duration::from_millis(300))
}

fn spec_device(spec: &SimulatedDeviceSpec) -> (Device, SimulatedProbe) {
	let (driver, probe) = spec.build();
	(Device::new(Box::new(driver)), probe)
}

fn drain(rx: &mut UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
	let mut events = Vec::new();
	while let Ok(event) = rx.try_recv() {
		events.push(event);
	}
	events
}

#[tokio::test]
async fn demo_session_enrolls_five_then_identifies() {
	init_tracing();
	let (device, probe) = spec_device(&SimulatedDeviceSpec::demo());
	let (events, mut rx) = EventSink::channel();
	let mut supervisor = SessionSupervisor::new(fast_config(), events).unwrap();
	supervisor.start(device).unwrap();

	assert!(probe.wait_until_waiting(Duration::from_secs(5)));
	assert_eq!(probe.pending(), 0);
	let reports = supervisor.cancel_and_wait().await;

	assert_eq!(reports.len(), 1);
	assert_eq!(reports[0].termination, TerminationKind::Cancelled);
	assert_eq!(reports[0].gallery_size, 5);
	assert_eq!(probe.reset_count(), 1);
	assert_eq!(probe.release_count(), 1);

	let events = drain(&mut rx);
	assert!(matches!(events.first(), Some(SessionEvent::DeviceOpened { info }) if info.driver == "sim"));

	let enrolled: Vec<&str> = events
		.iter()
		.filter_map(|event| match event {
			SessionEvent::Enrolled { label, .. } => Some(label.as_str()),
			_ => None,
		})
		.collect();
	assert_eq!(enrolled, vec!["print-1", "print-2", "print-3", "print-4", "print-5"]);
	assert_eq!(events.iter().filter(|event| matches!(event, SessionEvent::EnrollIncomplete { .. })).count(), 1);
	assert_eq!(events.iter().filter(|event| matches!(event, SessionEvent::VerifyFailed { .. })).count(), 1);
	assert!(events.contains(&SessionEvent::Identified {
		device: "sim".to_string(),
		label: "print-4".to_string(),
	}));
	assert!(events.contains(&SessionEvent::NoMatch { device: "sim".to_string() }));
	assert!(events.contains(&SessionEvent::SessionEnded {
		device: "sim".to_string(),
		termination: TerminationKind::Cancelled,
	}));

	let complete_at = events.iter().position(|event| matches!(event, SessionEvent::EnrollmentComplete { .. })).unwrap();
	let first_identify = events.iter().position(|event| matches!(event, SessionEvent::IdentifyPrompt { .. })).unwrap();
	assert!(complete_at < first_identify);
}

#[test]
fn gallery_tracks_verified_count_through_mixed_outcomes() {
	// Deterministic mix of accepted pairs, mismatches and rejected samples.
	let mut seed: u32 = 0x2545_f491;
	let mut captures = Vec::new();
	for _ in 0..40 {
		seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
		let finger = (seed >> 16) % 4 + 1;
		match (seed >> 8) % 3 {
			0 => captures.push(SimulatedCapture::reject(100 + (seed % 4) as i32)),
			1 => captures.extend([SimulatedCapture::accept(finger), SimulatedCapture::accept(finger)]),
			_ => captures.extend([SimulatedCapture::accept(finger), SimulatedCapture::accept(finger + 10)]),
		}
	}
	for finger in 1..=5 {
		captures.extend([SimulatedCapture::accept(finger), SimulatedCapture::accept(finger)]);
	}

	let (driver, probe) = SimulatedDriver::builder("sim").captures(captures).build();
	let device = Device::new(Box::new(driver));
	device.open().unwrap();
	let (events, cancel, targets) = (EventSink::discard(), CancellationToken::new(), SessionConfig::default().capture_targets());
	let mut controller = EnrollmentController::new(&device, &events, &cancel, &targets, 5);

	let mut resets_seen = 0;
	while !controller.is_complete() {
		let verified_before = controller.verified_count();
		let outcome = controller.attempt().unwrap();
		assert_eq!(controller.gallery().len(), controller.verified_count());

		match outcome {
			fprint::AttemptOutcome::Enrolled { .. } => assert_eq!(controller.verified_count(), verified_before + 1),
			fprint::AttemptOutcome::Incomplete { .. } => {
				resets_seen += 1;
				assert_eq!(controller.verified_count(), verified_before);
			}
			_ => assert_eq!(controller.verified_count(), verified_before),
		}
		assert_eq!(probe.reset_count(), resets_seen);
	}

	assert_eq!(controller.gallery().len(), 5);
	assert_eq!(controller.verified_count(), 5);
}

#[tokio::test]
async fn cancel_while_waiting_for_an_enroll_finger() {
	let (driver, probe) = SimulatedDriver::builder("sim").identification(true).build();
	let mut supervisor = SessionSupervisor::new(fast_config(), EventSink::discard()).unwrap();
	supervisor.start(Device::new(Box::new(driver))).unwrap();
	assert!(probe.wait_until_waiting(Duration::from_secs(2)));

	let started = Instant::now();
	let reports = supervisor.cancel_and_wait().await;

	assert!(started.elapsed() < Duration::from_millis(300));
	assert_eq!(reports[0].termination, TerminationKind::Cancelled);
	assert_eq!(reports[0].gallery_size, 0);

	let calls = probe.calls();
	let released = calls.iter().position(|call| *call == DriverCall::Release).unwrap();
	assert!(calls[released..].iter().all(|call| !call.is_capture()));
}

#[tokio::test]
async fn blocked_capture_forces_disposal_within_one_poll_of_the_deadline() {
	init_tracing();
	let config = fast_config().with_enroll_target(1);
	let (driver, probe) = SimulatedDriver::builder("stuck")
		.identification(true)
		.captures([SimulatedCapture::accept(1), SimulatedCapture::accept(1), SimulatedCapture::Block])
		.build();
	let (events, mut rx) = EventSink::channel();
	let mut supervisor = SessionSupervisor::new(config.clone(), events).unwrap();
	supervisor.start(Device::new(Box::new(driver))).unwrap();
	assert!(probe.wait_until_waiting(Duration::from_secs(2)));

	let started = Instant::now();
	let reports = supervisor.cancel_and_wait().await;
	let waited = started.elapsed();

	assert!(waited >= config.termination_deadline, "forced after {waited:?}");
	assert!(waited <= config.termination_deadline + config.poll_interval + Duration::from_millis(250));
	assert_eq!(reports[0].termination, TerminationKind::ForcedTimeout);
	assert_eq!(reports[0].gallery_size, 1);
	assert!(probe.is_released());
	assert_eq!(probe.release_count(), 1);

	let events = drain(&mut rx);
	let countdowns = events
		.iter()
		.filter(|event| matches!(event, SessionEvent::WaitingForTermination { .. }))
		.count();
	assert!(countdowns >= 2);
	assert_eq!(
		events.iter().filter(|event| matches!(event, SessionEvent::SessionEnded { .. })).count(),
		1
	);
	assert!(events.iter().any(|event| matches!(event, SessionEvent::ForcedTermination { device, .. } if device == "stuck")));
}

#[tokio::test]
async fn enrollment_only_scanner_ends_without_identifying() {
	let spec = SimulatedDeviceSpec {
		supports_identification: false,
		captures: vec![SimulatedCapture::accept(1), SimulatedCapture::accept(1)],
		..SimulatedDeviceSpec::default()
	};
	let (device, probe) = spec_device(&spec);
	let mut supervisor = SessionSupervisor::new(fast_config().with_enroll_target(1), EventSink::discard()).unwrap();
	supervisor.start(device).unwrap();

	tokio::time::timeout(Duration::from_secs(2), supervisor.wait_idle()).await.unwrap();
	let reports = supervisor.cancel_and_wait().await;

	assert_eq!(reports[0].termination, TerminationKind::IdentificationUnsupported);
	assert_eq!(reports[0].gallery_size, 1);
	assert!(!probe.calls().contains(&DriverCall::Identify));
}

#[tokio::test]
async fn capture_images_land_in_the_capture_dir() {
	let dir = tempfile::tempdir().unwrap();
	let spec = SimulatedDeviceSpec {
		image_width: 16,
		image_height: 8,
		captures: vec![SimulatedCapture::accept(2), SimulatedCapture::accept(2), SimulatedCapture::accept(2)],
		..SimulatedDeviceSpec::default()
	};
	let (device, probe) = spec_device(&spec);
	let config = fast_config().with_enroll_target(1).with_capture_dir(Some(dir.path().to_path_buf()));
	let mut supervisor = SessionSupervisor::new(config, EventSink::discard()).unwrap();
	supervisor.start(device).unwrap();

	assert!(probe.wait_until_waiting(Duration::from_secs(2)));
	supervisor.cancel_and_wait().await;

	for name in ["enroll.pgm", "verify.pgm", "identify.pgm"] {
		let bytes = std::fs::read(dir.path().join(name)).unwrap();
		assert!(bytes.starts_with(b"P5\n16 8\n255\n"), "{name} has no PGM header");
	}
}

#[tokio::test]
async fn discovered_devices_run_one_session_each() {
	let busy = SimulatedDeviceSpec {
		driver: "busy".to_string(),
		unavailable: true,
		..SimulatedDeviceSpec::default()
	};
	let mut manager = DeviceManager::new(SimulatedBackend::new(vec![SimulatedDeviceSpec::default(), busy]));
	manager.initialize().unwrap();
	let devices = manager.discover_devices().unwrap();
	assert_eq!(devices.len(), 2);

	let mut reports = Vec::new();
	for device in devices {
		let mut supervisor = SessionSupervisor::new(fast_config(), EventSink::discard()).unwrap();
		supervisor.start(device).unwrap();
		tokio::time::sleep(Duration::from_millis(50)).await;
		reports.extend(supervisor.cancel_and_wait().await);
	}

	assert_eq!(reports[0].device, "sim");
	assert_eq!(reports[0].termination, TerminationKind::Cancelled);
	assert_eq!(reports[1].device, "busy");
	assert_eq!(reports[1].termination, TerminationKind::Failed);
}
