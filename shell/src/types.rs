pub const PIPE: &str = "|";
pub const BACKGROUND: &str = "&";

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum RedirectType { Input, Output, Append }

impl RedirectType {
	pub fn from_token(token: &str) -> Option<RedirectType> {
		match token {
			"<" => Some(RedirectType::Input),
			">" => Some(RedirectType::Output),
			">>" => Some(RedirectType::Append),
			_ => None,
		}
	}

	pub fn operator(self) -> &'static str {
		match self {
			RedirectType::Input => "<",
			RedirectType::Output => ">",
			RedirectType::Append => ">>",
		}
	}
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Redirect {
	pub target: String,
	pub typ: RedirectType,
}

/// One program invocation, still holding its redirection tokens.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct Stage {
	pub tokens: Vec<String>,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Pipeline {
	pub stages: Vec<Stage>,
	pub is_background: bool,
	/// The line as the operator typed it, before any parsing.
	pub text: String,
}
