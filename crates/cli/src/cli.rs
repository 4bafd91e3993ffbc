use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "fprint")]
#[command(about = "Fingerprint enrollment and identification sessions")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Output format
	#[arg(short = 'f', long, global = true, value_enum, default_value_t = OutputFormat::Toon)]
	pub format: OutputFormat,

	/// Config file (defaults to ./fprint.json when present)
	#[arg(long, global = true, value_name = "FILE")]
	pub config: Option<PathBuf>,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// List attached scanners and their capabilities
	#[command(alias = "ls")]
	Devices,

	/// Enroll prints on each scanner, then identify until cancelled
	Session(SessionArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct SessionArgs {
	/// Verified enrollments before identification starts
	#[arg(long, value_name = "N")]
	pub enroll_target: Option<usize>,

	/// Interval between cancellation signals while a session winds down (ms)
	#[arg(long, value_name = "MS")]
	pub poll_interval_ms: Option<u64>,

	/// Time after cancellation before the device is disposed forcefully (ms)
	#[arg(long = "deadline-ms", value_name = "MS")]
	pub termination_deadline_ms: Option<u64>,

	/// Directory receiving raw capture images
	#[arg(long, value_name = "DIR")]
	pub capture_dir: Option<PathBuf>,

	/// Cancel each session automatically after this long (ms)
	#[arg(long, value_name = "MS")]
	pub cancel_after_ms: Option<u64>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parse_session_overrides() {
		let args = vec![
			"fprint",
			"-f",
			"ndjson",
			"session",
			"--enroll-target",
			"3",
			"--deadline-ms",
			"500",
			"--cancel-after-ms",
			"100",
		];
		let cli = Cli::try_parse_from(args).unwrap();

		assert_eq!(cli.format, OutputFormat::Ndjson);
		match cli.command {
			Commands::Session(args) => {
				assert_eq!(args.enroll_target, Some(3));
				assert_eq!(args.termination_deadline_ms, Some(500));
				assert_eq!(args.cancel_after_ms, Some(100));
				assert_eq!(args.poll_interval_ms, None);
			}
			_ => panic!("Expected Session command"),
		}
	}

	#[test]
	fn global_flags_follow_the_subcommand() {
		let cli = Cli::try_parse_from(["fprint", "devices", "-vv", "--config", "scanners.json"]).unwrap();
		assert!(matches!(cli.command, Commands::Devices));
		assert_eq!(cli.verbose, 2);
		assert_eq!(cli.config, Some(PathBuf::from("scanners.json")));
		assert_eq!(cli.format, OutputFormat::Toon);
	}
}
