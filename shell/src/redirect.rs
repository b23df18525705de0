use std::fs;
use std::os::unix::fs::OpenOptionsExt;

use crate::error::{Error, Result};
use crate::types::*;

const CREATE_MODE: u32 = 0o644;

/// A stage's redirections after validation. Truncating and appending output
/// both target standard output, so they share one slot.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct Redirections {
	pub input: Option<Redirect>,
	pub output: Option<Redirect>,
}

/// A stage split into the words handed to the program and its redirections.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ResolvedStage {
	pub arguments: Vec<String>,
	pub redirects: Redirections,
}

impl ResolvedStage {
	pub fn name(&self) -> &str {
		&self.arguments[0]
	}
}

impl Redirect {
	pub fn open(&self) -> Result<fs::File> {
		let mut oopt = fs::OpenOptions::new();
		let _ = match self.typ {
			RedirectType::Input => oopt.read(true),
			RedirectType::Output => oopt.write(true).create(true).truncate(true).mode(CREATE_MODE),
			RedirectType::Append => oopt.append(true).create(true).mode(CREATE_MODE),
		};
		oopt.open(&self.target)
			.map_err(|e| Error::RedirectionOpenFailure(self.target.clone(), e))
	}
}

fn set_slot(slot: &mut Option<Redirect>, redirect: Redirect) -> Result<()> {
	if let Some(ref prev) = *slot {
		return Err(Error::AmbiguousRedirection(redirect.typ.operator(), prev.typ.operator()));
	}
	*slot = Some(redirect);
	Ok(())
}

/// Pulls `<`, `>` and `>>` with their file names out of a stage. Files are not
/// opened here; that happens in the child that needs them.
pub fn resolve(index: usize, stage: &Stage) -> Result<ResolvedStage> {
	let mut arguments = Vec::with_capacity(stage.tokens.len());
	let mut redirects = Redirections::default();

	let mut tokens = stage.tokens.iter();
	while let Some(token) = tokens.next() {
		let typ = match RedirectType::from_token(token) {
			Some(typ) => typ,
			None => {
				arguments.push(token.clone());
				continue;
			},
		};
		let target = tokens.next().ok_or(Error::MissingRedirectionTarget(typ.operator()))?;
		let redirect = Redirect { target: target.clone(), typ };
		match typ {
			RedirectType::Input => set_slot(&mut redirects.input, redirect)?,
			RedirectType::Output | RedirectType::Append => set_slot(&mut redirects.output, redirect)?,
		}
	}

	if arguments.is_empty() {
		return Err(Error::EmptyStage(index));
	}
	Ok(ResolvedStage { arguments, redirects })
}
