use std::io::{self, BufRead, Write};

use crate::builtin::{self, Flow};
use crate::error::Result;
use crate::eval::{self, EvalResult};
use crate::global;
use crate::parser;
use crate::types::RedirectType;

pub struct Shell {
	state: global::State,
	prompt: String,
}

impl Shell {
	pub fn new(prompt: String) -> Shell {
		Shell { state: global::State::new(), prompt }
	}

	fn eval_line(&mut self, line: &str) -> Result<Flow> {
		let pipeline = parser::parse(line)?;

		// Built-ins only run on their own, without redirections.
		if let [stage] = pipeline.stages.as_slice() {
			if let Some(func) = builtin::match_builtin(&stage.tokens[0]) {
				if stage.tokens.iter().all(|t| RedirectType::from_token(t).is_none()) {
					return func(&mut self.state, &stage.tokens[1 ..]);
				}
			}
		}

		match eval::eval(&mut self.state, &pipeline)? {
			EvalResult::Running(pid) => {
				println!("Process running in the background with PID: {}", pid);
			},
			EvalResult::Done(status) => {
				tracing::debug!("foreground pipeline done: {:?}", status);
			},
		}
		Ok(Flow::Continue)
	}

	/// Runs one command line, reporting any failure on standard error.
	pub fn run_line(&mut self, line: &str) -> Flow {
		match self.eval_line(line) {
			Ok(flow) => flow,
			Err(e) => {
				let _ = writeln!(io::stderr(), "{}", e);
				Flow::Continue
			},
		}
	}

	pub fn reap(&mut self) {
		if self.state.job_table.is_empty() {
			return;
		}
		if let Err(e) = self.state.job_table.reap_finished(&mut io::stdout().lock()) {
			tracing::warn!("failed to report finished jobs: {}", e);
		}
	}

	/// The read-eval loop. Returns when `exit` is entered or input ends.
	pub fn run(&mut self, input: &mut dyn BufRead) -> io::Result<()> {
		let mut stdout = io::stdout();
		let mut line = String::new();
		loop {
			self.reap();
			stdout.write_all(self.prompt.as_bytes())?;
			stdout.flush()?;

			line.clear();
			match input.read_line(&mut line) {
				Ok(0) => break,
				Ok(_) => {},
				Err(ref e) if e.kind() == io::ErrorKind::InvalidData => {
					let _ = writeln!(io::stderr(), "Error: input is not valid UTF-8.");
					continue;
				},
				Err(e) => return Err(e),
			}
			if self.run_line(&line) == Flow::Exit {
				break;
			}
		}
		Ok(())
	}
}
