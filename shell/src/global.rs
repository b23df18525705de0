use crate::job;

/// Everything the interpreter keeps between command lines.
#[derive(Debug)]
pub struct State {
	pub job_table: job::JobTable,
}

impl State {
	pub fn new() -> State {
		State { job_table: job::JobTable::new() }
	}
}
