use std::io;

use nix::unistd;

use crate::error::{Error, Result};
use crate::global;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Flow { Continue, Exit }

pub type Builtin = fn(&mut global::State, &[String]) -> Result<Flow>;

pub fn builtin_cd(_: &mut global::State, args: &[String]) -> Result<Flow> {
	let dir = args.first().ok_or(Error::MissingDirectory)?;
	unistd::chdir(dir.as_str()).map_err(|e| Error::ChangeDirectory(dir.clone(), e))?;
	Ok(Flow::Continue)
}

pub fn builtin_myjobs(state: &mut global::State, args: &[String]) -> Result<Flow> {
	if !args.is_empty() {
		return Err(Error::UnexpectedArguments("myjobs", args.len()));
	}
	state.job_table.list(&mut io::stdout().lock())?;
	Ok(Flow::Continue)
}

pub fn builtin_exit(_: &mut global::State, _: &[String]) -> Result<Flow> {
	Ok(Flow::Exit)
}

pub fn match_builtin(name: &str) -> Option<Builtin> {
	match name {
		"cd" => Some(builtin_cd),
		"myjobs" | "jobs" => Some(builtin_myjobs),
		"exit" => Some(builtin_exit),
		_ => None,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn args(s: &[&str]) -> Vec<String> {
		s.iter().map(|w| w.to_string()).collect()
	}

	#[test]
	fn lookup() {
		assert!(match_builtin("cd").is_some());
		assert!(match_builtin("jobs").is_some());
		assert!(match_builtin("ls").is_none());
	}

	#[test]
	fn cd_needs_a_directory() {
		let mut state = global::State::new();
		assert!(matches!(builtin_cd(&mut state, &[]), Err(Error::MissingDirectory)));
	}

	#[test]
	fn cd_into_missing_directory_fails() {
		let mut state = global::State::new();
		let r = builtin_cd(&mut state, &args(&["/nonexistent/pipesh-dir"]));
		assert!(matches!(r, Err(Error::ChangeDirectory(ref d, _)) if d == "/nonexistent/pipesh-dir"));
	}

	#[test]
	fn myjobs_rejects_arguments() {
		let mut state = global::State::new();
		let r = builtin_myjobs(&mut state, &args(&["-l"]));
		assert!(matches!(r, Err(Error::UnexpectedArguments("myjobs", 1))));
	}

	#[test]
	fn exit_stops_the_loop() -> anyhow::Result<()> {
		let mut state = global::State::new();
		assert_eq!(builtin_exit(&mut state, &args(&["0"]))?, Flow::Exit);
		Ok(())
	}
}
