use std::io::{self, Write};

use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::sys::wait::{self, WaitStatus};
use nix::unistd::{self, Pid};

use crate::error::{Error, Result};
use crate::global;
use crate::launch::{self, Binding, Launch, Pipe};
use crate::redirect::{self, ResolvedStage};
use crate::types::Pipeline;

#[derive(Debug, PartialEq, Eq)]
pub enum EvalResult {
	/// A foreground pipeline ran to completion; holds its last stage's status.
	Done(Option<WaitStatus>),
	/// A background pipeline was registered under this pid.
	Running(Pid),
}

fn allocate_pipes(count: usize) -> Result<Vec<Pipe>> {
	(0 .. count)
		.map(|_| -> Result<Pipe> {
			let (read, write) = unistd::pipe2(OFlag::O_CLOEXEC).map_err(Error::PipeCreationFailure)?;
			Ok(Pipe { read, write })
		})
		.collect()
}

fn spawn_commands(launches: &[Launch<'_>], pipes: &mut Vec<Pipe>, pids: &mut Vec<Pid>) -> Result<()> {
	for (i, launch) in launches.iter().enumerate() {
		let redirects = &launch.stage.redirects;
		let upstream = i.checked_sub(1).and_then(|j| pipes.get(j));
		let stdin = Binding::choose(redirects.input.as_ref(), upstream, true);
		let stdout = Binding::choose(redirects.output.as_ref(), pipes.get(i), false);
		pids.push(launch::spawn(launch, stdin, stdout, pipes)?);
	}
	Ok(())
}

/// Blocks until each pid has exited. A failed wait is reported and skipped.
fn wait_all(pids: &[Pid]) -> Option<WaitStatus> {
	let mut last = None;
	for &pid in pids {
		last = loop {
			match wait::waitpid(pid, None) {
				Err(Errno::EINTR) => continue,
				Ok(status) => break Some(status),
				Err(e) => {
					let _ = writeln!(io::stderr(), "{}", Error::WaitError(pid, e));
					break None;
				},
			}
		};
		tracing::debug!("pid {} finished: {:?}", pid, last);
	}
	last
}

/// Launches every stage left to right, wired through `stages.len() - 1` pipes.
/// On return the interpreter holds no pipe descriptor; on error the stages
/// already launched are returned alongside it.
fn spawn_pipeline(stages: &[ResolvedStage]) -> std::result::Result<Vec<Pid>, (Error, Vec<Pid>)> {
	let launches = stages.iter().map(Launch::new).collect::<Result<Vec<_>>>().map_err(|e| (e, vec![]))?;
	let mut pipes = allocate_pipes(launches.len().saturating_sub(1)).map_err(|e| (e, vec![]))?;
	tracing::debug!("allocated {} pipes for {} stages", pipes.len(), launches.len());

	let mut pids = Vec::with_capacity(launches.len());
	let r = spawn_commands(&launches, &mut pipes, &mut pids);
	drop(pipes);
	match r {
		Ok(()) => Ok(pids),
		Err(e) => Err((e, pids)),
	}
}

pub fn eval(state: &mut global::State, pipeline: &Pipeline) -> Result<EvalResult> {
	let stages = pipeline.stages.iter()
		.enumerate()
		.map(|(i, stage)| redirect::resolve(i, stage))
		.collect::<Result<Vec<_>>>()?;

	let pids = match spawn_pipeline(&stages) {
		Ok(pids) => pids,
		Err((e, pids)) => {
			// Stages that did start still need an owner.
			if !pids.is_empty() {
				if pipeline.is_background {
					state.job_table.register(&pids, &pipeline.text);
				} else {
					let _ = wait_all(&pids);
				}
			}
			return Err(e);
		},
	};

	if pipeline.is_background {
		Ok(EvalResult::Running(state.job_table.register(&pids, &pipeline.text)))
	} else {
		Ok(EvalResult::Done(wait_all(&pids)))
	}
}
