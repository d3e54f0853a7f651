//! Command tree definition checks.
//!
//! Validates the structural invariants a tree must hold before the engine
//! dispatches against it: unique names within a node, at most one primary
//! action, positional ordering, unique option names, reserved help names,
//! and well-formed validation rules.
//!
//! # Examples
//!
//! ```
//! use command_dispatch_core::*;
//!
//! let tree = CommandTree::new("app").with_command(
//!     CommandNode::new("serve").with_action(
//!         ActionDescriptor::new("start")
//!             .with_parameter(ParameterDescriptor::switch("verbose").short('v')),
//!     ),
//! );
//! assert!(validate_tree(&tree).is_empty());
//!
//! // Invalid: `-h` is reserved for help
//! let bad = CommandTree::new("app").with_action(
//!     ActionDescriptor::new("run")
//!         .with_parameter(ParameterDescriptor::switch("host").short('h')),
//! );
//! assert!(!validate_tree(&bad).is_empty());
//! ```

use std::collections::HashSet;

use regex::Regex;
use thiserror::Error;

use crate::{
    ActionDescriptor, CommandNode, CommandTree, ParameterDescriptor, ParameterKind,
    TreeDocument, ValidationRule, HELP_LONG, HELP_SHORT,
};

/// Tree definition errors.
///
/// Each variant names the offending command path, action, or parameter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    /// Document version string is empty.
    #[error("document version cannot be empty")]
    EmptyDocumentVersion,
    /// A command, action or parameter name is empty or whitespace-only.
    #[error("empty name under '{0}'")]
    EmptyName(String),
    /// Two children of one node share a name or alias.
    #[error("duplicate command '{name}' under '{path}'")]
    DuplicateCommand { path: String, name: String },
    /// Two actions of one node share a name or alias.
    #[error("duplicate action '{name}' under '{path}'")]
    DuplicateAction { path: String, name: String },
    /// More than one action of a node is marked primary.
    #[error("command '{path}' declares more than one primary action")]
    MultiplePrimaryActions { path: String },
    /// A required positional argument follows an optional one.
    #[error("action '{action}': required argument '{parameter}' follows an optional argument")]
    RequiredAfterOptional { action: String, parameter: String },
    /// A collection positional argument is not the last positional.
    #[error("action '{action}': collection argument '{parameter}' must be the last argument")]
    CollectionNotLast { action: String, parameter: String },
    /// A named option has neither long nor short name.
    #[error("action '{action}': option '{parameter}' must define a long or short name")]
    MissingOptionName { action: String, parameter: String },
    /// Two options of one action share a long or short name.
    #[error("action '{action}': duplicate option name '{option}'")]
    DuplicateOption { action: String, option: String },
    /// Two leaf parameters of one action share a binding name.
    #[error("action '{action}': duplicate parameter '{parameter}'")]
    DuplicateParameter { action: String, parameter: String },
    /// An option claims `--help` or `-h`.
    #[error("action '{action}': option name '{option}' is reserved for help")]
    ReservedOption { action: String, option: String },
    /// A container parameter declares no members.
    #[error("action '{action}': container '{parameter}' has no members")]
    EmptyContainer { action: String, parameter: String },
    /// An injected parameter has no context type.
    #[error("action '{action}': injected parameter '{parameter}' has no context type")]
    MissingContextType { action: String, parameter: String },
    /// A `Pattern` rule does not compile.
    #[error("parameter '{parameter}': invalid pattern '{pattern}': {reason}")]
    InvalidPattern {
        parameter: String,
        pattern: String,
        reason: String,
    },
    /// A `Range` rule has `min > max` or a NaN bound.
    #[error("parameter '{parameter}': invalid range [{min}, {max}]")]
    InvalidRange {
        parameter: String,
        min: String,
        max: String,
    },
}

/// Validates a tree document.
///
/// Checks for an empty version string, then validates the tree.
///
/// # Examples
///
/// ```
/// use command_dispatch_core::*;
///
/// let doc = TreeDocument::new("1.0.0", "2024-01-01T00:00:00Z", CommandTree::new("app"));
/// assert!(validate_document(&doc).is_empty());
///
/// let doc = TreeDocument::new(" ", "2024-01-01T00:00:00Z", CommandTree::new("app"));
/// assert_eq!(validate_document(&doc), vec![DefinitionError::EmptyDocumentVersion]);
/// ```
pub fn validate_document(document: &TreeDocument) -> Vec<DefinitionError> {
    if document.version.trim().is_empty() {
        return vec![DefinitionError::EmptyDocumentVersion];
    }
    validate_tree(&document.tree)
}

/// Validates a command tree.
///
/// Every node is checked; all errors are collected, parents before children.
///
/// # Examples
///
/// ```
/// use command_dispatch_core::*;
///
/// let tree = CommandTree::new("app").with_command(
///     CommandNode::new("remote")
///         .with_action(ActionDescriptor::new("list").primary())
///         .with_action(ActionDescriptor::new("show").primary()),
/// );
/// let errors = validate_tree(&tree);
/// assert!(errors
///     .iter()
///     .any(|e| matches!(e, DefinitionError::MultiplePrimaryActions { .. })));
/// ```
pub fn validate_tree(tree: &CommandTree) -> Vec<DefinitionError> {
    let mut errors = Vec::new();
    tree.walk(&mut |path, node| {
        let label = if path.is_empty() {
            tree.name().to_string()
        } else {
            format!("{} {}", tree.name(), path.join(" "))
        };
        errors.extend(validate_node(&label, node));
    });
    errors
}

fn validate_node(path: &str, node: &CommandNode) -> Vec<DefinitionError> {
    let mut errors = Vec::new();

    let mut seen_children: HashSet<&str> = HashSet::new();
    for child in &node.children {
        if child.name.trim().is_empty() {
            errors.push(DefinitionError::EmptyName(path.to_string()));
            continue;
        }
        for name in std::iter::once(&child.name).chain(child.aliases.iter()) {
            if !seen_children.insert(name) {
                errors.push(DefinitionError::DuplicateCommand {
                    path: path.to_string(),
                    name: name.clone(),
                });
            }
        }
    }

    let mut seen_actions: HashSet<&str> = HashSet::new();
    let mut primaries = 0usize;
    for action in &node.actions {
        if action.name.trim().is_empty() {
            errors.push(DefinitionError::EmptyName(path.to_string()));
            continue;
        }
        for name in std::iter::once(&action.name).chain(action.aliases.iter()) {
            if !seen_actions.insert(name) {
                errors.push(DefinitionError::DuplicateAction {
                    path: path.to_string(),
                    name: name.clone(),
                });
            }
        }
        if action.primary {
            primaries += 1;
        }
        errors.extend(validate_action(path, action));
    }

    if primaries > 1 {
        errors.push(DefinitionError::MultiplePrimaryActions {
            path: path.to_string(),
        });
    }

    errors
}

fn validate_action(path: &str, action: &ActionDescriptor) -> Vec<DefinitionError> {
    let mut errors = Vec::new();
    let label = format!("{path} {}", action.name);

    check_containers(&label, &action.parameters, &mut errors);

    let leaves = action.leaf_parameters();
    let mut seen_names: HashSet<&str> = HashSet::new();
    let mut seen_options: HashSet<String> = HashSet::new();
    let mut optional_seen = false;
    let mut collection_seen: Option<&str> = None;

    for param in &leaves {
        if param.name.trim().is_empty() {
            errors.push(DefinitionError::EmptyName(label.clone()));
            continue;
        }
        if !seen_names.insert(&param.name) {
            errors.push(DefinitionError::DuplicateParameter {
                action: label.clone(),
                parameter: param.name.clone(),
            });
        }

        match param.kind {
            ParameterKind::PositionalArgument => {
                if let Some(collection) = collection_seen {
                    errors.push(DefinitionError::CollectionNotLast {
                        action: label.clone(),
                        parameter: collection.to_string(),
                    });
                    collection_seen = None;
                }
                if param.required && optional_seen {
                    errors.push(DefinitionError::RequiredAfterOptional {
                        action: label.clone(),
                        parameter: param.name.clone(),
                    });
                }
                if !param.required {
                    optional_seen = true;
                }
                if param.shape.is_collection() {
                    collection_seen = Some(param.name.as_str());
                }
            }
            ParameterKind::NamedOption => {
                errors.extend(check_option_names(&label, param, &mut seen_options));
            }
            ParameterKind::InjectedContext => {
                if param.context_type.as_deref().is_none_or(|t| t.trim().is_empty()) {
                    errors.push(DefinitionError::MissingContextType {
                        action: label.clone(),
                        parameter: param.name.clone(),
                    });
                }
            }
            ParameterKind::ContainerObject | ParameterKind::GlobalOptionsObject => {}
        }

        errors.extend(validate_rules(param));
    }

    errors
}

fn check_containers(label: &str, params: &[ParameterDescriptor], errors: &mut Vec<DefinitionError>) {
    for param in params.iter().filter(|p| p.kind.is_container()) {
        if param.members.is_empty() {
            errors.push(DefinitionError::EmptyContainer {
                action: label.to_string(),
                parameter: param.name.clone(),
            });
        }
        check_containers(label, &param.members, errors);
    }
}

fn check_option_names(
    label: &str,
    param: &ParameterDescriptor,
    seen: &mut HashSet<String>,
) -> Vec<DefinitionError> {
    let mut errors = Vec::new();

    if param.long_name.is_none() && param.short_name.is_none() {
        errors.push(DefinitionError::MissingOptionName {
            action: label.to_string(),
            parameter: param.name.clone(),
        });
        return errors;
    }

    if let Some(long) = &param.long_name {
        let option = format!("--{long}");
        if long == HELP_LONG {
            errors.push(DefinitionError::ReservedOption {
                action: label.to_string(),
                option,
            });
        } else if !seen.insert(option.clone()) {
            errors.push(DefinitionError::DuplicateOption {
                action: label.to_string(),
                option,
            });
        }
    }

    if let Some(short) = param.short_name {
        let option = format!("-{short}");
        if short == HELP_SHORT {
            errors.push(DefinitionError::ReservedOption {
                action: label.to_string(),
                option,
            });
        } else if !seen.insert(option.clone()) {
            errors.push(DefinitionError::DuplicateOption {
                action: label.to_string(),
                option,
            });
        }
    }

    errors
}

fn validate_rules(param: &ParameterDescriptor) -> Vec<DefinitionError> {
    let mut errors = Vec::new();
    for rule in &param.validators {
        match rule {
            ValidationRule::Range { min, max } => {
                if min.is_nan() || max.is_nan() || min > max {
                    errors.push(DefinitionError::InvalidRange {
                        parameter: param.name.clone(),
                        min: min.to_string(),
                        max: max.to_string(),
                    });
                }
            }
            ValidationRule::Pattern { regex, .. } => {
                if let Err(err) = Regex::new(regex) {
                    errors.push(DefinitionError::InvalidPattern {
                        parameter: param.name.clone(),
                        pattern: regex.clone(),
                        reason: err.to_string(),
                    });
                }
            }
            ValidationRule::PathExists { .. } => {}
        }
    }
    errors
}
