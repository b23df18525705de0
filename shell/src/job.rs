use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Write};
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::sys::signal::Signal;
use nix::sys::wait::{self, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub enum State { Active, Terminated }

trait WaitStatusExt {
	fn state(self) -> State;
}

impl WaitStatusExt for WaitStatus {
	fn state(self) -> State {
		match self {
			WaitStatus::Exited(..) | WaitStatus::Signaled(..) => State::Terminated,
			_ => State::Active,
		}
	}
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Outcome {
	Running,
	Finished(WaitStatus),
	/// The pid is no longer a child of ours, so its status is lost.
	Lost,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Process {
	pub pid: Pid,
	pub outcome: Outcome,
}

impl Process {
	fn state(&self) -> State {
		match self.outcome {
			Outcome::Running => State::Active,
			Outcome::Finished(status) => status.state(),
			Outcome::Lost => State::Terminated,
		}
	}

	fn poll(&mut self) {
		match wait::waitpid(self.pid, Some(WaitPidFlag::WNOHANG)) {
			Ok(WaitStatus::StillAlive) => {},
			Ok(status) if status.state() == State::Terminated => self.outcome = Outcome::Finished(status),
			Ok(_) | Err(Errno::EINTR) => {},
			Err(Errno::ECHILD) => {
				tracing::warn!("pid {} is not a child of this shell", self.pid);
				self.outcome = Outcome::Lost;
			},
			Err(e) => tracing::warn!("waitpid({}) failed: {}", self.pid, e),
		}
	}
}

/// How a job's last stage ended.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ExitReport {
	Code(i32),
	Signal(Signal),
	Unknown,
}

impl From<Outcome> for ExitReport {
	fn from(outcome: Outcome) -> ExitReport {
		match outcome {
			Outcome::Finished(WaitStatus::Exited(_, code)) => ExitReport::Code(code),
			Outcome::Finished(WaitStatus::Signaled(_, sig, _)) => ExitReport::Signal(sig),
			_ => ExitReport::Unknown,
		}
	}
}

impl fmt::Display for ExitReport {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match *self {
			ExitReport::Code(code) => write!(f, "{}", code),
			ExitReport::Signal(sig) => write!(f, "killed by {}", sig.as_str()),
			ExitReport::Unknown => write!(f, "unknown"),
		}
	}
}

/// A detached pipeline: one process per stage, in stage order.
#[derive(Debug)]
pub struct Job {
	pub processes: Vec<Process>,
	pub command: String,
	pub started: Instant,
}

impl Job {
	pub fn leader(&self) -> Pid {
		self.processes[0].pid
	}

	pub fn state(&self) -> State {
		self.processes.iter().map(Process::state).min().unwrap_or(State::Terminated)
	}

	fn elapsed(&self) -> Duration {
		self.started.elapsed()
	}

	fn exit_report(&self) -> ExitReport {
		self.processes.last().map_or(ExitReport::Unknown, |pr| pr.outcome.into())
	}

	/// Collects every stage that has exited since the last poll, never blocking.
	fn poll(&mut self) {
		for pr in self.processes.iter_mut().filter(|pr| pr.state() == State::Active) {
			pr.poll();
		}
	}
}

/// Registry of background jobs. Jobs are keyed by a job number that is never
/// reused, since a reaped leader's pid can come back for a new job while the
/// rest of its pipeline is still running.
#[derive(Debug, Default)]
pub struct JobTable {
	jobs: BTreeMap<usize, Job>,
	next_id: usize,
}

impl JobTable {
	pub fn new() -> JobTable {
		JobTable::default()
	}

	pub fn is_empty(&self) -> bool {
		self.jobs.is_empty()
	}

	#[cfg(test)]
	pub fn contains(&self, pid: Pid) -> bool {
		self.jobs.values().any(|job| job.leader() == pid)
	}

	/// Tracks a newly launched pipeline. `pids` must be non-empty and in stage order.
	pub fn register(&mut self, pids: &[Pid], command: &str) -> Pid {
		let job = Job {
			processes: pids.iter().map(|&pid| Process { pid, outcome: Outcome::Running }).collect(),
			command: command.to_string(),
			started: Instant::now(),
		};
		let leader = job.leader();
		let id = self.next_id;
		self.next_id += 1;
		tracing::debug!("registered job {} as pid {} ({} processes): {}", id, leader, pids.len(), command);
		self.jobs.insert(id, job);
		leader
	}

	/// Reports and removes every job whose processes have all exited.
	pub fn reap_finished(&mut self, out: &mut dyn Write) -> io::Result<()> {
		let mut finished = vec![];
		for (&id, job) in self.jobs.iter_mut() {
			job.poll();
			if job.state() == State::Terminated {
				finished.push(id);
			}
		}
		for id in finished {
			if let Some(job) = self.jobs.remove(&id) {
				tracing::debug!("reaped job {}", id);
				writeln!(out, "PID: {} | Command: {} | exit status: {} | time running: {} seconds",
				         job.leader(), job.command, job.exit_report(), job.elapsed().as_secs())?;
			}
		}
		Ok(())
	}

	pub fn list(&self, out: &mut dyn Write) -> io::Result<()> {
		if self.jobs.is_empty() {
			return writeln!(out, "No background processes running");
		}
		for job in self.jobs.values() {
			writeln!(out, "PID: {} | Command: {} | time running: {} seconds",
			         job.leader(), job.command, job.elapsed().as_secs())?;
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;
	use std::process::Command;
	use std::thread::sleep;

	fn spawn(program: &str, args: &[&str]) -> anyhow::Result<Pid> {
		let child = Command::new(program).args(args).spawn()?;
		Ok(Pid::from_raw(child.id() as i32))
	}

	fn reap_until_empty(table: &mut JobTable) -> anyhow::Result<String> {
		let mut out: Vec<u8> = vec![];
		for _ in 0..200 {
			table.reap_finished(&mut out)?;
			if table.is_empty() {
				break;
			}
			sleep(Duration::from_millis(25));
		}
		Ok(String::from_utf8(out)?)
	}

	#[test]
	fn empty_listing() -> anyhow::Result<()> {
		let mut out: Vec<u8> = vec![];
		JobTable::new().list(&mut out)?;
		assert_eq!(String::from_utf8(out)?, "No background processes running\n");
		Ok(())
	}

	#[test]
	fn registered_job_is_listed() -> anyhow::Result<()> {
		let mut table = JobTable::new();
		table.register(&[Pid::from_raw(123)], "sleep 100 &");
		let mut out: Vec<u8> = vec![];
		table.list(&mut out)?;
		assert_eq!(String::from_utf8(out)?, "PID: 123 | Command: sleep 100 & | time running: 0 seconds\n");
		Ok(())
	}

	#[test]
	fn reused_leader_pid_keeps_both_jobs() -> anyhow::Result<()> {
		let mut table = JobTable::new();
		table.register(&[Pid::from_raw(123), Pid::from_raw(124)], "a | b &");
		table.register(&[Pid::from_raw(123)], "c &");
		assert_eq!(table.jobs.len(), 2);
		let mut out: Vec<u8> = vec![];
		table.list(&mut out)?;
		assert_eq!(String::from_utf8(out)?, "PID: 123 | Command: a | b & | time running: 0 seconds\n\
		                                      PID: 123 | Command: c & | time running: 0 seconds\n");
		Ok(())
	}

	#[test]
	fn finished_job_is_reported_once() -> anyhow::Result<()> {
		let mut table = JobTable::new();
		let pid = spawn("sh", &["-c", "exit 3"])?;
		table.register(&[pid], "sh -c exit 3 &");
		let report = reap_until_empty(&mut table)?;
		assert_eq!(report, format!("PID: {} | Command: sh -c exit 3 & | exit status: 3 | time running: 0 seconds\n", pid));

		let mut out: Vec<u8> = vec![];
		table.reap_finished(&mut out)?;
		table.list(&mut out)?;
		assert_eq!(String::from_utf8(out)?, "No background processes running\n");
		Ok(())
	}

	#[test]
	fn running_job_stays_listed() -> anyhow::Result<()> {
		let mut table = JobTable::new();
		let pid = spawn("sleep", &["1"])?;
		table.register(&[pid], "sleep 1 &");
		let mut out: Vec<u8> = vec![];
		table.reap_finished(&mut out)?;
		assert!(out.is_empty());
		assert!(table.contains(pid));
		reap_until_empty(&mut table)?;
		assert!(!table.contains(pid));
		Ok(())
	}

	#[test]
	fn multi_stage_job_waits_for_every_stage() -> anyhow::Result<()> {
		let mut table = JobTable::new();
		let fast = spawn("true", &[])?;
		let slow = spawn("sleep", &["1"])?;
		table.register(&[fast, slow], "true | sleep 1 &");
		sleep(Duration::from_millis(200));
		table.reap_finished(&mut io::sink())?;
		assert_eq!(table.jobs.len(), 1);
		let report = reap_until_empty(&mut table)?;
		assert!(report.starts_with(&format!("PID: {} | Command: true | sleep 1 & | exit status: 0", fast)));
		Ok(())
	}

	#[test]
	fn foreign_pid_is_dropped_as_unknown() -> anyhow::Result<()> {
		let mut table = JobTable::new();
		// pid 1 is never our child.
		table.register(&[Pid::from_raw(1)], "init");
		let mut out: Vec<u8> = vec![];
		table.reap_finished(&mut out)?;
		assert!(String::from_utf8(out)?.contains("exit status: unknown"));
		assert!(table.is_empty());
		Ok(())
	}

	#[test]
	fn signal_report() {
		let report = ExitReport::from(Outcome::Finished(WaitStatus::Signaled(Pid::from_raw(9), Signal::SIGKILL, false)));
		assert_eq!(report.to_string(), "killed by SIGKILL");
	}
}
