use clap::ValueEnum;
use fprint_protocol::SessionEvent;

/// Output format for command results and session progress.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
	/// TOON result envelope; progress goes to stderr
	#[default]
	Toon,
	/// Pretty JSON result envelope; progress goes to stderr
	Json,
	/// One JSON object per line: every session event, then the result envelope
	Ndjson,
	/// Human-readable lines on stdout
	Text,
}

impl OutputFormat {
	/// Renders one progress event, returning the line and whether it belongs on stdout.
	pub fn event_line(self, event: &SessionEvent) -> (String, bool) {
		match self {
			OutputFormat::Ndjson => match serde_json::to_string(event) {
				Ok(json) => (json, true),
				Err(_) => (event.summary(), false),
			},
			OutputFormat::Text => (event.summary(), true),
			OutputFormat::Toon | OutputFormat::Json => (event.summary(), false),
		}
	}
}

impl std::str::FromStr for OutputFormat {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_lowercase().as_str() {
			"toon" => Ok(OutputFormat::Toon),
			"json" => Ok(OutputFormat::Json),
			"ndjson" => Ok(OutputFormat::Ndjson),
			"text" => Ok(OutputFormat::Text),
			_ => Err(format!("unknown format: {s}")),
		}
	}
}

impl std::fmt::Display for OutputFormat {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			OutputFormat::Toon => write!(f, "toon"),
			OutputFormat::Json => write!(f, "json"),
			OutputFormat::Ndjson => write!(f, "ndjson"),
			OutputFormat::Text => write!(f, "text"),
		}
	}
}
