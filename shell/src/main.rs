mod builtin;
mod error;
mod eval;
mod global;
mod job;
mod launch;
mod parser;
mod redirect;
mod shell;
mod types;

use std::io;
use std::process::ExitCode;

use clap::Parser;
use tracing::level_filters::LevelFilter;

const PROMPT: &str = "pipesh> ";

/// A small interactive shell: pipelines, redirections and background jobs.
#[derive(Parser, Debug)]
#[command(name = "pipesh", version, about)]
struct CommandLineArgs {
	/// Prompt printed before each command line.
	#[arg(long, default_value = PROMPT)]
	prompt: String,

	/// Execute the provided command line and then exit.
	#[arg(short = 'c', value_name = "COMMAND")]
	command: Option<String>,

	/// Most verbose diagnostics to print on standard error.
	#[arg(long, value_name = "LEVEL", default_value = "warn")]
	log_level: LevelFilter,
}

fn main() -> ExitCode {
	let args = CommandLineArgs::parse();

	tracing_subscriber::fmt()
		.with_writer(io::stderr)
		.without_time()
		.with_target(false)
		.with_max_level(args.log_level)
		.init();

	let mut shell = shell::Shell::new(args.prompt);
	if let Some(command) = args.command {
		shell.run_line(&command);
		shell.reap();
	} else if let Err(e) = shell.run(&mut io::stdin().lock()) {
		tracing::error!("failed to read input: {}", e);
	}
	ExitCode::SUCCESS
}
