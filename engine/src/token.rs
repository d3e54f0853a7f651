//! Argument vector tokenizer.
//!
//! Classifies each argument without knowing anything about the tree:
//!
//! - `--name` / `--name=value` → [`Token::Long`] (split eagerly on the first `=`)
//! - `-x` / `-abc` → [`Token::Short`] holding the unexpanded cluster; the
//!   binder expands it once it knows each letter's arity
//! - `--` → [`Token::Separator`]; every later argument is positional
//! - `-`, negative numbers and everything else → [`Token::Positional`]
//!
//! Tokenization never fails.

use command_dispatch_core::{HELP_LONG, HELP_SHORT};

/// A classified argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Positional(String),
    Long { name: String, value: Option<String> },
    /// Letters following a single dash, not yet expanded.
    Short(String),
    Separator,
}

impl Token {
    /// Text of a positional token.
    pub fn as_positional(&self) -> Option<&str> {
        match self {
            Token::Positional(text) => Some(text),
            _ => None,
        }
    }

    /// Returns `true` for `--help` and `-h`.
    pub fn is_help(&self) -> bool {
        match self {
            Token::Long { name, .. } => name == HELP_LONG,
            Token::Short(cluster) => cluster.len() == 1 && cluster.starts_with(HELP_SHORT),
            _ => false,
        }
    }

    /// The argument as the user typed it.
    pub fn raw(&self) -> String {
        match self {
            Token::Positional(text) => text.clone(),
            Token::Long { name, value: None } => format!("--{name}"),
            Token::Long {
                name,
                value: Some(value),
            } => format!("--{name}={value}"),
            Token::Short(cluster) => format!("-{cluster}"),
            Token::Separator => "--".to_string(),
        }
    }
}

/// Splits an argument vector into tokens.
///
/// # Examples
///
/// ```
/// use command_dispatch::{Token, tokenize};
///
/// let tokens = tokenize(["add", "--port=80", "-vq", "-", "--", "--raw"]);
/// assert_eq!(
///     tokens,
///     vec![
///         Token::Positional("add".into()),
///         Token::Long { name: "port".into(), value: Some("80".into()) },
///         Token::Short("vq".into()),
///         Token::Positional("-".into()),
///         Token::Separator,
///         Token::Positional("--raw".into()),
///     ]
/// );
/// ```
pub fn tokenize<I, S>(args: I) -> Vec<Token>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut tokens = Vec::new();
    let mut literal = false;

    for arg in args {
        let arg: String = arg.into();
        if literal {
            tokens.push(Token::Positional(arg));
            continue;
        }
        tokens.push(classify(arg));
        if tokens.last() == Some(&Token::Separator) {
            literal = true;
        }
    }

    tokens
}

fn classify(arg: String) -> Token {
    if arg == "--" {
        return Token::Separator;
    }

    if let Some(body) = arg.strip_prefix("--") {
        return match body.split_once('=') {
            Some((name, value)) => Token::Long {
                name: name.to_string(),
                value: Some(value.to_string()),
            },
            None => Token::Long {
                name: body.to_string(),
                value: None,
            },
        };
    }

    if let Some(body) = arg.strip_prefix('-') {
        if body.chars().next().is_some_and(|c| c.is_ascii_alphabetic()) {
            return Token::Short(body.to_string());
        }
    }

    Token::Positional(arg)
}
