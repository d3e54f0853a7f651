use serde::{Deserialize, Serialize};

use crate::CommandTree;

/// A command tree as it travels between processes.
///
/// Help printers and completion scripts read this instead of linking the
/// engine. `describe` in the probe binary writes one; `check` accepts one in
/// place of a bare tree.
///
/// # Examples
///
/// ```
/// use command_dispatch_core::*;
///
/// let tree = CommandTree::new("gitcli").with_command(CommandNode::new("remote"));
/// let mut doc = TreeDocument::new("1.0.0", "2024-01-15T10:30:00Z", tree);
/// doc.description = Some("A git-like demo".into());
///
/// assert_eq!(doc.command_count(), 1);
/// assert_eq!(doc.version, "1.0.0");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeDocument {
    /// Layout of the `tree` field. Older documents omit it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<String>,
    /// Release of the program whose commands are described.
    pub version: String,
    pub name: Option<String>,
    pub description: Option<String>,
    /// RFC 3339 time the document was written.
    pub generated_at: String,
    /// Hex SHA-256 of the tree's JSON, for cache invalidation.
    pub bundle_hash: Option<String>,
    pub tree: CommandTree,
}

impl TreeDocument {
    /// Stamps the current [`TREE_CONTRACT_VERSION`](crate::TREE_CONTRACT_VERSION);
    /// name, description and hash start empty.
    pub fn new(
        version: impl Into<String>,
        generated_at: impl Into<String>,
        tree: CommandTree,
    ) -> Self {
        Self {
            schema_version: Some(crate::TREE_CONTRACT_VERSION.to_string()),
            version: version.into(),
            name: None,
            description: None,
            generated_at: generated_at.into(),
            bundle_hash: None,
            tree,
        }
    }

    /// Commands directly under the root.
    pub fn command_count(&self) -> usize {
        self.tree.root().children.len()
    }
}
