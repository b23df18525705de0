use crate::error::{Error, Result};
use crate::types::*;

struct Parser<'a> {
	line: &'a str,
	i: usize,
}

impl<'a> Parser<'a> {
	fn proceed_while<F>(&mut self, f: F) where F: Fn(u8) -> bool {
		while let Some(c) = self.line.as_bytes().get(self.i) {
			if !f(*c) { break; }
			self.i += 1;
		}
	}

	fn is_whitespace(c: u8) -> bool {
		matches!(c, b' ' | b'\t' | b'\n' | b'\r' | b'\x0b' | b'\x0c')
	}

	fn is_letter(c: u8) -> bool {
		!Parser::is_whitespace(c)
	}

	fn skip_whitespaces(&mut self) {
		self.proceed_while(Parser::is_whitespace);
	}

	// Splitting only at ASCII bytes keeps every slice on a char boundary.
	fn read_word(&mut self) -> &'a str {
		let orig = self.i;
		self.proceed_while(Parser::is_letter);
		&self.line[orig .. self.i]
	}

	fn read_tokens(&mut self) -> Vec<String> {
		let mut tokens = vec![];
		loop {
			self.skip_whitespaces();
			let word = self.read_word();
			if word.is_empty() {
				break;
			}
			tokens.push(word.to_string());
		}
		tokens
	}
}

/// Splits `line` on whitespace and consumes a trailing background marker,
/// either as a token of its own or glued to the end of the last token.
pub fn tokenize(line: &str) -> Result<(Vec<String>, bool)> {
	let mut parser = Parser { line, i: 0 };
	let mut tokens = parser.read_tokens();

	let mut is_background = false;
	if let Some(last) = tokens.last_mut() {
		if last.as_str() == BACKGROUND {
			tokens.pop();
			is_background = true;
		} else if last.ends_with(BACKGROUND) {
			last.truncate(last.len() - BACKGROUND.len());
			is_background = true;
		}
	}

	if tokens.is_empty() {
		return Err(Error::EmptyCommand);
	}
	Ok((tokens, is_background))
}

/// Groups tokens into stages separated by the pipe token. A vacant segment
/// is rejected here rather than at launch time.
pub fn split_pipeline(tokens: Vec<String>) -> Result<Vec<Stage>> {
	let mut stages = vec![Stage::default()];
	for token in tokens {
		if token == PIPE {
			if stages.last().map_or(true, |s| s.tokens.is_empty()) {
				return Err(Error::EmptyStage(stages.len() - 1));
			}
			stages.push(Stage::default());
		} else if let Some(stage) = stages.last_mut() {
			stage.tokens.push(token);
		}
	}
	if stages.last().map_or(true, |s| s.tokens.is_empty()) {
		return Err(Error::EmptyStage(stages.len() - 1));
	}
	Ok(stages)
}

pub fn parse(line: &str) -> Result<Pipeline> {
	let (tokens, is_background) = tokenize(line)?;
	let stages = split_pipeline(tokens)?;
	Ok(Pipeline { stages, is_background, text: line.trim_end_matches(['\n', '\r']).to_string() })
}
