mod devices;
mod session;

use std::future::Future;

use serde::Serialize;
use tracing::error;

use crate::cli::{Cli, Commands};
use crate::config::FileConfig;
use crate::error::{CliError, Result};
use crate::output::{CommandResult, EmptyResult, OutputFormat, ResultBuilder, print_error_stderr, print_result};

pub async fn dispatch(cli: Cli) -> Result<()> {
	let cwd = std::env::current_dir()?;
	let file = match FileConfig::load(cli.config.as_deref(), &cwd) {
		Ok(file) => file,
		Err(err) => return fail("config", err, cli.format),
	};

	match cli.command {
		Commands::Devices => finish("devices", cli.format, devices::run(&file)).await,
		Commands::Session(args) => finish("session", cli.format, session::run(&args, &file, cli.format)).await,
	}
}

async fn finish<T: Serialize>(command: &str, format: OutputFormat, run: impl Future<Output = Result<CommandResult<T>>>) -> Result<()> {
	match run.await {
		Ok(result) => {
			print_result(&result, format);
			Ok(())
		}
		Err(err) => fail(command, err, format),
	}
}

fn fail(command: &str, err: CliError, format: OutputFormat) -> Result<()> {
	error!(target = "fprint.cli", command, error = %err, "command failed");
	let builder = ResultBuilder::<()>::new(command);
	let result: EmptyResult = match err.details() {
		Some(details) => builder.error_with_details(err.code(), err.to_string(), details),
		None => builder.error(err.code(), err.to_string()),
	}
	.build();

	if format == OutputFormat::Text {
		if let Some(error) = &result.error {
			print_error_stderr(error);
		}
	} else {
		print_result(&result, format);
	}
	Err(err)
}
