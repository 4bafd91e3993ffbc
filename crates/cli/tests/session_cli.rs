use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde_json::{Value, json};
use tempfile::TempDir;

fn fprint_binary() -> PathBuf {
	let mut path = std::env::current_exe().expect("current_exe should resolve");
	path.pop();
	path.pop();
	path.push("fprint");
	path
}

fn run_fprint(workdir: &Path, args: &[&str]) -> (bool, String, String) {
	let output = Command::new(fprint_binary())
		.current_dir(workdir)
		.args(args)
		.stdin(Stdio::null())
		.output()
		.expect("failed to execute fprint");

	let stdout = String::from_utf8_lossy(&output.stdout).to_string();
	let stderr = String::from_utf8_lossy(&output.stderr).to_string();
	(output.status.success(), stdout, stderr)
}

fn write_config(dir: &Path, config: Value) {
	std::fs::write(dir.join("fprint.json"), config.to_string()).expect("config should be written");
}

/// Runs `session` with NDJSON output and splits the stream into events and the final envelope.
fn run_session(workdir: &Path, extra: &[&str]) -> (bool, Vec<Value>, Value, String) {
	let mut args = vec!["-f", "ndjson", "session"];
	args.extend_from_slice(extra);
	let (success, stdout, stderr) = run_fprint(workdir, &args);

	let mut lines: Vec<Value> = stdout
		.lines()
		.filter(|line| !line.trim().is_empty())
		.map(|line| serde_json::from_str(line).unwrap_or_else(|_| json!({ "raw": line })))
		.collect();
	let result = lines.pop().unwrap_or(Value::Null);
	(success, lines, result, stderr)
}

fn event_names(events: &[Value]) -> Vec<&str> {
	events.iter().filter_map(|event| event["event"].as_str()).collect()
}

#[test]
fn devices_lists_demo_scanner_without_config() {
	let tmp = TempDir::new().expect("temp dir should be created");
	let (success, stdout, stderr) = run_fprint(tmp.path(), &["-f", "json", "devices"]);
	assert!(success, "devices failed: {stderr}");

	let json: Value = serde_json::from_str(&stdout).expect("devices output should be JSON");
	assert_eq!(json["ok"], true);
	assert_eq!(json["data"]["backend"], "simulated");
	assert_eq!(json["data"]["count"], 1);
	assert_eq!(json["data"]["devices"][0]["driver"], "sim");
	assert_eq!(json["data"]["devices"][0]["enrollStages"], 5);
}

#[test]
fn timer_cancels_session_after_enrollment() {
	let tmp = TempDir::new().expect("temp dir should be created");
	write_config(
		tmp.path(),
		json!({
			"session": { "enrollTarget": 2, "pollIntervalMs": 20 },
			"devices": [{
				"driver": "sim",
				"captures": [
					{ "accept": { "finger": 1 } }, { "accept": { "finger": 1 } },
					{ "reject": { "code": 102 } },
					{ "accept": { "finger": 2 } }, { "accept": { "finger": 2 } },
					{ "accept": { "finger": 2 } }
				]
			}]
		}),
	);

	let (success, events, result, stderr) = run_session(tmp.path(), &["--cancel-after-ms", "400"]);
	assert!(success, "session failed: {stderr}");
	assert_eq!(result["ok"], true, "unexpected result: {result}");

	let session = &result["data"]["sessions"][0];
	assert_eq!(session["device"], "sim");
	assert_eq!(session["trigger"], "timer");
	assert_eq!(session["termination"], "cancelled");
	assert_eq!(session["gallerySize"], 2);
	assert_eq!(result["config"]["enrollTarget"], 2);
	assert_eq!(result["config"]["deviceSource"], "config_file");

	let names = event_names(&events);
	assert_eq!(names.first(), Some(&"device_opened"));
	assert!(names.contains(&"enroll_incomplete"));
	assert!(names.contains(&"enrollment_complete"));
	assert!(names.contains(&"identified"));
	assert!(names.contains(&"session_ended"));
}

#[test]
fn blocked_scanner_is_disposed_forcefully_with_warning() {
	let tmp = TempDir::new().expect("temp dir should be created");
	write_config(
		tmp.path(),
		json!({
			"devices": [{ "driver": "stuck", "captures": ["block"] }]
		}),
	);

	let (success, events, result, stderr) = run_session(
		tmp.path(),
		&["--cancel-after-ms", "50", "--poll-interval-ms", "40", "--deadline-ms", "300"],
	);
	assert!(success, "forced termination must not fail the command: {stderr}");

	let session = &result["data"]["sessions"][0];
	assert_eq!(session["termination"], "forced_timeout");
	assert_eq!(result["data"]["forced"], 1);
	assert_eq!(result["diagnostics"][0]["level"], "warning");
	assert_eq!(result["diagnostics"][0]["source"], "stuck");

	let names = event_names(&events);
	assert!(names.contains(&"cancel_requested"));
	assert!(names.contains(&"waiting_for_termination"));
	assert!(names.contains(&"forced_termination"));
	assert_eq!(names.iter().filter(|name| **name == "session_ended").count(), 1);
}

#[test]
fn unavailable_scanner_reports_failed_session() {
	let tmp = TempDir::new().expect("temp dir should be created");
	write_config(
		tmp.path(),
		json!({
			"devices": [{ "driver": "busy", "unavailable": true }]
		}),
	);

	let (success, events, result, stderr) = run_session(tmp.path(), &[]);
	assert!(success, "session failed: {stderr}");

	let session = &result["data"]["sessions"][0];
	assert_eq!(session["trigger"], "session_ended");
	assert_eq!(session["termination"], "failed");
	assert!(session.get("shutdownMs").is_none());
	assert_eq!(result["diagnostics"][0]["level"], "error");
	assert_eq!(result["diagnostics"][0]["source"], "busy");
	assert_eq!(event_names(&events), vec!["device_unavailable", "session_ended"]);
}

#[test]
fn enrollment_only_scanner_ends_without_a_trigger() {
	let tmp = TempDir::new().expect("temp dir should be created");
	let captures = tmp.path().join("captures");
	write_config(
		tmp.path(),
		json!({
			"session": { "enrollTarget": 1 },
			"devices": [{
				"driver": "swipe",
				"supportsIdentification": false,
				"imageWidth": 4,
				"imageHeight": 4,
				"captures": [{ "accept": { "finger": 3 } }, { "accept": { "finger": 3 } }]
			}]
		}),
	);

	let capture_dir = captures.to_string_lossy().to_string();
	let (success, _events, result, stderr) = run_session(tmp.path(), &["--capture-dir", &capture_dir]);
	assert!(success, "session failed: {stderr}");

	let session = &result["data"]["sessions"][0];
	assert_eq!(session["trigger"], "session_ended");
	assert_eq!(session["termination"], "identification_unsupported");
	assert_eq!(session["gallerySize"], 1);

	let artifacts = result["artifacts"].as_array().expect("capture artifacts should be listed");
	assert_eq!(artifacts.len(), 2);
	assert_eq!(artifacts[0]["type"], "capture");
	assert!(captures.join("enroll.pgm").is_file());
	assert!(captures.join("verify.pgm").is_file());
}

#[test]
fn demo_scanner_is_noted_in_diagnostics() {
	let tmp = TempDir::new().expect("temp dir should be created");
	let (success, _events, result, stderr) = run_session(tmp.path(), &["--cancel-after-ms", "200", "--poll-interval-ms", "20"]);
	assert!(success, "session failed: {stderr}");

	assert_eq!(result["config"]["deviceSource"], "demo");
	assert_eq!(result["diagnostics"][0]["level"], "info");
	assert!(result["diagnostics"][0].get("source").is_none());
}

#[test]
fn zero_deadline_is_rejected() {
	let tmp = TempDir::new().expect("temp dir should be created");
	let (success, events, result, _stderr) = run_session(tmp.path(), &["--deadline-ms", "0"]);

	assert!(!success);
	assert!(events.is_empty());
	assert_eq!(result["error"]["code"], "INVALID_CONFIG");
}

#[test]
fn malformed_config_fails_with_invalid_config_code() {
	let tmp = TempDir::new().expect("temp dir should be created");
	std::fs::write(tmp.path().join("fprint.json"), "{ not json").expect("config should be written");

	let (success, stdout, _stderr) = run_fprint(tmp.path(), &["-f", "json", "devices"]);
	assert!(!success);

	let json: Value = serde_json::from_str(&stdout).expect("error output should be JSON");
	assert_eq!(json["ok"], false);
	assert_eq!(json["command"], "config");
	assert_eq!(json["error"]["code"], "INVALID_CONFIG");
}

#[test]
fn zero_enroll_target_is_rejected() {
	let tmp = TempDir::new().expect("temp dir should be created");
	let (success, events, result, _stderr) = run_session(tmp.path(), &["--enroll-target", "0"]);

	assert!(!success);
	assert!(events.is_empty());
	assert_eq!(result["ok"], false);
	assert_eq!(result["error"]["code"], "INVALID_CONFIG");
}
