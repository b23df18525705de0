use std::convert::Infallible;
use std::ffi::CString;
use std::io::{self, Write};
use std::os::fd::{AsRawFd, OwnedFd, RawFd};

use nix::unistd::{self, ForkResult, Pid};

use crate::error::{Error, Result};
use crate::redirect::ResolvedStage;
use crate::types::Redirect;

/// Both ends of one inter-stage pipe, owned by the interpreter until dropped.
#[derive(Debug)]
pub struct Pipe {
	pub read: OwnedFd,
	pub write: OwnedFd,
}

/// What a child's standard stream is wired to.
#[derive(Debug, Clone, Copy)]
pub enum Binding<'a> {
	Inherit,
	Pipe(RawFd),
	Redirect(&'a Redirect),
}

impl<'a> Binding<'a> {
	/// A stage's own redirection wins over the pipe it would otherwise use.
	pub fn choose(redirect: Option<&'a Redirect>, pipe: Option<&Pipe>, read_end: bool) -> Binding<'a> {
		match (redirect, pipe) {
			(Some(r), _) => Binding::Redirect(r),
			(None, Some(p)) if read_end => Binding::Pipe(p.read.as_raw_fd()),
			(None, Some(p)) => Binding::Pipe(p.write.as_raw_fd()),
			(None, None) => Binding::Inherit,
		}
	}
}

/// A stage ready to fork: argv is converted before the fork so that a bad
/// argument is reported by the interpreter, not by a child.
#[derive(Debug)]
pub struct Launch<'a> {
	pub stage: &'a ResolvedStage,
	argv: Vec<CString>,
}

impl<'a> Launch<'a> {
	pub fn new(stage: &'a ResolvedStage) -> Result<Launch<'a>> {
		let argv = stage.arguments.iter()
			.map(|a| CString::new(a.as_bytes()))
			.collect::<std::result::Result<Vec<_>, _>>()?;
		Ok(Launch { stage, argv })
	}
}

fn bind(binding: Binding<'_>, target: RawFd) -> Result<()> {
	match binding {
		Binding::Inherit => {},
		Binding::Pipe(fd) => {
			unistd::dup2(fd, target).map_err(Error::DescriptorBinding)?;
		},
		Binding::Redirect(redirect) => {
			let file = redirect.open()?;
			unistd::dup2(file.as_raw_fd(), target).map_err(Error::DescriptorBinding)?;
		},
	}
	Ok(())
}

fn do_exec_stage(launch: &Launch<'_>, stdin: Binding<'_>, stdout: Binding<'_>, pipes: Vec<Pipe>) -> Result<Infallible> {
	bind(stdin, libc::STDIN_FILENO)?;
	bind(stdout, libc::STDOUT_FILENO)?;
	drop(pipes);

	let errno = match unistd::execvp(&launch.argv[0], &launch.argv) {
		Ok(never) => match never {},
		Err(errno) => errno,
	};
	tracing::debug!("execvp {} failed: {}", launch.stage.name(), errno);
	Err(Error::ProgramNotFound(launch.stage.name().to_string()))
}

fn exec_stage(launch: &Launch<'_>, stdin: Binding<'_>, stdout: Binding<'_>, pipes: Vec<Pipe>) -> ! {
	let e = match do_exec_stage(launch, stdin, stdout, pipes) {
		Ok(never) => match never {},
		Err(e) => e,
	};
	let _ = writeln!(io::stderr(), "{}", e);
	unsafe { libc::_exit(1) }
}

/// Forks one process for `launch`. The child wires its streams, closes its
/// copy of every pipe in `pipes` and replaces its image; it never returns
/// into the caller. The parent gets the child's pid back.
pub fn spawn(launch: &Launch<'_>, stdin: Binding<'_>, stdout: Binding<'_>, pipes: &mut Vec<Pipe>) -> Result<Pid> {
	// SAFETY: the interpreter runs on a single thread, and the child only
	// touches memory it copied from the parent before exec or _exit.
	match unsafe { unistd::fork() }.map_err(Error::ForkFailure)? {
		ForkResult::Parent { child } => {
			tracing::debug!("forked {} for {}", child, launch.stage.name());
			Ok(child)
		},
		ForkResult::Child => exec_stage(launch, stdin, stdout, std::mem::take(pipes)),
	}
}
