//! Command resolution.
//!
//! Walks the tree greedily: while the next token is positional and names a
//! child of the current node, descend. The token after the deepest match is
//! tried as an action name, falling back to the node's primary action
//! without consuming anything.

use command_dispatch_core::{ActionDescriptor, CommandNode, CommandTree};
use tracing::debug;

use crate::error::ResolveError;
use crate::token::Token;

/// A selected action and the tokens left for the binder.
#[derive(Debug, Clone)]
pub struct Resolution<'t> {
    /// Matched nodes, root first.
    pub path: Vec<&'t CommandNode>,
    pub action: &'t ActionDescriptor,
    pub remaining: Vec<Token>,
}

impl<'t> Resolution<'t> {
    /// Canonical command names below the root.
    pub fn command_names(&self) -> Vec<&'t str> {
        self.path.iter().skip(1).map(|n| n.name.as_str()).collect()
    }

    /// Space-joined command names plus the action name, e.g. `remote add`.
    /// This is the key handlers are registered under.
    pub fn action_path(&self) -> String {
        let mut parts = self.command_names();
        parts.push(&self.action.name);
        parts.join(" ")
    }

    /// The deepest matched node.
    pub fn command(&self) -> &'t CommandNode {
        self.path[self.path.len() - 1]
    }
}

/// What a help request refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelpTarget {
    /// Canonical command names below the root.
    pub path: Vec<String>,
    /// The action named on the command line, if any.
    pub action: Option<String>,
}

/// Result of resolving a token list.
#[derive(Debug, Clone)]
pub enum Resolved<'t> {
    Action(Resolution<'t>),
    /// `--help` or `-h` appeared before any `--` separator.
    Help(HelpTarget),
}

/// Resolves `tokens` against `tree`.
///
/// # Errors
///
/// [`ResolveError::UnknownCommand`] when nothing below the root matches and
/// the root has no primary action; [`ResolveError::UnknownAction`] when a
/// command matched but none of its actions did.
///
/// # Examples
///
/// ```
/// use command_dispatch::{Resolved, resolve, tokenize};
/// use command_dispatch_core::*;
///
/// let tree = CommandTree::new("app").with_command(
///     CommandNode::new("remote")
///         .with_alias("r")
///         .with_action(ActionDescriptor::new("list").primary())
///         .with_action(ActionDescriptor::new("add")),
/// );
///
/// let Ok(Resolved::Action(res)) = resolve(&tree, &tokenize(["r", "add", "origin"])) else {
///     panic!("expected an action");
/// };
/// assert_eq!(res.action_path(), "remote add");
/// assert_eq!(res.remaining.len(), 1);
///
/// let Ok(Resolved::Action(res)) = resolve(&tree, &tokenize(["remote"])) else {
///     panic!("expected the primary action");
/// };
/// assert_eq!(res.action.name, "list");
/// ```
pub fn resolve<'t>(tree: &'t CommandTree, tokens: &[Token]) -> Result<Resolved<'t>, ResolveError> {
    let help = tokens
        .iter()
        .take_while(|t| **t != Token::Separator)
        .any(Token::is_help);

    let mut node = tree.root();
    let mut path = vec![node];
    let mut cursor = 0;

    while let Some(child) = tokens
        .get(cursor)
        .and_then(Token::as_positional)
        .and_then(move |name| node.find_child(name))
    {
        node = child;
        path.push(child);
        cursor += 1;
    }

    let next = tokens.get(cursor).and_then(Token::as_positional);
    let named = next.and_then(|name| node.find_action(name));

    if help {
        let target = HelpTarget {
            path: path.iter().skip(1).map(|n| n.name.clone()).collect(),
            action: named.map(|a| a.name.clone()),
        };
        debug!(command = ?target.path, action = ?target.action, "help requested");
        return Ok(Resolved::Help(target));
    }

    let action = match named {
        Some(action) => {
            cursor += 1;
            action
        }
        None => match node.primary_action() {
            Some(primary) => primary,
            None => return Err(unmatched(tree, &path, tokens.get(cursor))),
        },
    };

    let resolution = Resolution {
        path,
        action,
        remaining: tokens[cursor..].to_vec(),
    };
    debug!(
        command = ?resolution.command_names(),
        action = %action.name,
        remaining = resolution.remaining.len(),
        "resolved"
    );
    Ok(Resolved::Action(resolution))
}

fn unmatched(tree: &CommandTree, path: &[&CommandNode], token: Option<&Token>) -> ResolveError {
    let token = token.map(Token::raw);
    if path.len() == 1 {
        return ResolveError::UnknownCommand { token };
    }
    let mut names = vec![tree.name()];
    names.extend(path.iter().skip(1).map(|n| n.name.as_str()));
    ResolveError::UnknownAction {
        command: names.join(" "),
        token,
    }
}
