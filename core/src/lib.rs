//! Command tree metadata for the command-dispatch engine.
//!
//! This crate defines the static, read-only description the engine resolves
//! and binds against:
//!
//! - [`CommandTree`] / [`CommandNode`]: nested commands with aliases.
//! - [`ActionDescriptor`]: a leaf operation, optionally the node's primary
//!   action, with hooks and an error-kind to exit-code map.
//! - [`ParameterDescriptor`]: a positional argument, named option,
//!   container object or injected context, with its [`ValueShape`] and
//!   [`ValidationRule`]s.
//! - [`TreeDocument`]: a versioned wrapper for shipping a tree to help or
//!   completion tools.
//!
//! Definition checks ([`validate_tree`], [`validate_document`]) catch
//! structural errors such as duplicate names, misordered positionals and
//! reserved option names before the tree is used.
//!
//! # Example
//!
//! ```
//! use command_dispatch_core::*;
//!
//! let tree = CommandTree::new("gitcli").with_command(
//!     CommandNode::new("remote").with_action(
//!         ActionDescriptor::new("add")
//!             .with_parameter(ParameterDescriptor::argument("name", ValueShape::default()))
//!             .with_parameter(ParameterDescriptor::argument(
//!                 "url",
//!                 ValueShape::Scalar(ScalarType::Uri),
//!             )),
//!     ),
//! );
//!
//! assert!(tree.find_path(&["remote"]).unwrap().find_action("add").is_some());
//! assert!(validate_tree(&tree).is_empty());
//! ```

mod package;
mod types;
mod validate;

pub use package::TreeDocument;
pub use types::*;
pub use validate::{DefinitionError, validate_document, validate_tree};
