use std::io;

use nix::unistd::Pid;

/// Every failure the interpreter can report. The `Display` form is the
/// single diagnostic line printed to standard error.
#[derive(thiserror::Error, Debug)]
pub enum Error {
	/// The line held no tokens at all.
	#[error("Error: No command entered.")]
	EmptyCommand,

	/// A pipeline segment between two pipe tokens (or at either end) was vacant.
	#[error("Error: empty command in pipeline stage {0}.")]
	EmptyStage(usize),

	/// A redirection operator was the last token of its stage.
	#[error("Error: missing file name after '{0}'.")]
	MissingRedirectionTarget(&'static str),

	/// A stage gave the same stream more than one redirection.
	#[error("Error: ambiguous redirection: '{0}' conflicts with an earlier '{1}'.")]
	AmbiguousRedirection(&'static str, &'static str),

	/// A redirection target could not be opened.
	#[error("{0}: {1}")]
	RedirectionOpenFailure(String, #[source] io::Error),

	#[error("Fork failed: {0}")]
	ForkFailure(#[source] nix::Error),

	#[error("Pipe creation failed: {0}")]
	PipeCreationFailure(#[source] nix::Error),

	#[error("Wait error for PID {0}: {1}")]
	WaitError(Pid, #[source] nix::Error),

	/// Image replacement failed in a child.
	#[error("{0}: command not found.")]
	ProgramNotFound(String),

	/// A stream could not be rebound in a child.
	#[error("Failed to bind descriptor: {0}")]
	DescriptorBinding(#[source] nix::Error),

	#[error("Error: argument contains a NUL byte: {0}")]
	NulByte(#[from] std::ffi::NulError),

	#[error("Error: No directory specified for cd command.")]
	MissingDirectory,

	#[error("Error: Failed to change directory to {0}: {1}")]
	ChangeDirectory(String, #[source] nix::Error),

	#[error("Error: {0}: expected no arguments, {1} given.")]
	UnexpectedArguments(&'static str, usize),

	#[error(transparent)]
	Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;

	#[test]
	fn program_not_found_message() {
		let e = Error::ProgramNotFound("frobnicate".to_string());
		assert_eq!(e.to_string(), "frobnicate: command not found.");
	}

	#[test]
	fn open_failure_names_file() {
		let e = Error::RedirectionOpenFailure(
			"missing.txt".to_string(),
			io::Error::from(io::ErrorKind::NotFound),
		);
		assert!(e.to_string().starts_with("missing.txt: "));
	}
}
