//! Command tree type definitions.
//!
//! This module defines the static metadata the dispatch engine walks: a tree
//! of [`CommandNode`]s carrying [`ActionDescriptor`]s, each with an ordered
//! list of [`ParameterDescriptor`]s. The types serialize with [`serde`] so a
//! tree can be shipped as JSON or YAML and handed to help or completion
//! collaborators without any handler code attached.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Version of the tree contract (semver).
///
/// Embedded in every [`TreeDocument`](crate::TreeDocument) to track
/// compatibility between producers and consumers of tree metadata.
pub const TREE_CONTRACT_VERSION: &str = "1.0.0";

/// Long option name reserved for the help sentinel.
pub const HELP_LONG: &str = "help";

/// Short option name reserved for the help sentinel.
pub const HELP_SHORT: char = 'h';

/// Built-in scalar types the binder knows how to convert.
///
/// # Examples
///
/// ```
/// use command_dispatch_core::ScalarType;
///
/// assert!(ScalarType::Bool.is_switch());
/// assert!(ScalarType::U16.is_numeric());
/// assert!(!ScalarType::Path.is_numeric());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarType {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Char,
    String,
    Path,
    Uri,
    DateTime,
    Date,
    Duration,
    Uuid,
}

impl ScalarType {
    /// Returns `true` for the plain boolean switch type.
    pub fn is_switch(self) -> bool {
        matches!(self, ScalarType::Bool)
    }

    /// Returns `true` for integer and floating-point types.
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            ScalarType::I8
                | ScalarType::I16
                | ScalarType::I32
                | ScalarType::I64
                | ScalarType::U8
                | ScalarType::U16
                | ScalarType::U32
                | ScalarType::U64
                | ScalarType::F32
                | ScalarType::F64
        )
    }
}

/// One member of an enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumMember {
    /// Member name as typed on the command line (matched case-insensitively).
    pub name: String,
    /// Underlying integer value. For flags enums this is the member's bit.
    pub value: i64,
}

/// An enumeration a parameter value is drawn from.
///
/// # Examples
///
/// ```
/// use command_dispatch_core::EnumSpec;
///
/// let level = EnumSpec::new("Level", [("Low", 1), ("High", 2)]);
/// assert_eq!(level.find("high").unwrap().value, 2);
/// assert_eq!(level.find("1").unwrap().name, "Low");
/// assert!(level.find("medium").is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumSpec {
    /// Type name, used in messages.
    pub name: String,
    /// Members in declaration order.
    pub members: Vec<EnumMember>,
}

impl EnumSpec {
    /// Creates an enum from `(name, value)` pairs.
    pub fn new<'a>(name: &str, members: impl IntoIterator<Item = (&'a str, i64)>) -> Self {
        Self {
            name: name.to_string(),
            members: members
                .into_iter()
                .map(|(name, value)| EnumMember {
                    name: name.to_string(),
                    value,
                })
                .collect(),
        }
    }

    /// Finds a member by case-insensitive name, or by its underlying value
    /// written as an integer.
    pub fn find(&self, raw: &str) -> Option<&EnumMember> {
        let raw = raw.trim();
        if let Some(member) = self
            .members
            .iter()
            .find(|m| m.name.eq_ignore_ascii_case(raw))
        {
            return Some(member);
        }
        let value: i64 = raw.parse().ok()?;
        self.members.iter().find(|m| m.value == value)
    }

    /// Member names in declaration order.
    pub fn member_names(&self) -> Vec<&str> {
        self.members.iter().map(|m| m.name.as_str()).collect()
    }
}

/// Element type of a collection-shaped parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementShape {
    Scalar(ScalarType),
    Enum(EnumSpec),
}

/// Shape of the value a parameter binds to.
///
/// # Examples
///
/// ```
/// use command_dispatch_core::{ElementShape, ScalarType, ValueShape};
///
/// assert!(ValueShape::Scalar(ScalarType::Bool).is_switch());
/// assert!(ValueShape::Collection(ElementShape::Scalar(ScalarType::String)).is_collection());
/// assert!(!ValueShape::default().is_switch());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueShape {
    /// A single built-in scalar.
    Scalar(ScalarType),
    /// A single enum member.
    Enum(EnumSpec),
    /// Bit-combinable enum members, accepted as a comma-separated list.
    FlagsEnum(EnumSpec),
    /// Any number of scalar or enum elements.
    Collection(ElementShape),
    /// Delegates conversion to a converter registered under `converter`.
    Custom { converter: String },
}

impl Default for ValueShape {
    fn default() -> Self {
        ValueShape::Scalar(ScalarType::String)
    }
}

impl ValueShape {
    /// Returns `true` when presence alone binds the value (`--verbose`).
    pub fn is_switch(&self) -> bool {
        matches!(self, ValueShape::Scalar(ScalarType::Bool))
    }

    /// Returns `true` for collection shapes.
    pub fn is_collection(&self) -> bool {
        matches!(self, ValueShape::Collection(_))
    }
}

/// How a parameter receives its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKind {
    /// Bound from positional tokens in declaration order.
    PositionalArgument,
    /// Bound from `--long` / `-s` option tokens.
    NamedOption,
    /// An object whose members are themselves bindable parameters.
    ContainerObject,
    /// Like [`ContainerObject`](ParameterKind::ContainerObject), shared by
    /// every action of an application.
    GlobalOptionsObject,
    /// Supplied by the host at invocation time; consumes no tokens.
    InjectedContext,
}

impl ParameterKind {
    /// Returns `true` for the two object kinds whose members are flattened
    /// into the enclosing option pool.
    pub fn is_container(self) -> bool {
        matches!(
            self,
            ParameterKind::ContainerObject | ParameterKind::GlobalOptionsObject
        )
    }
}

/// Path kind checked by [`ValidationRule::PathExists`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathKind {
    File,
    Directory,
}

/// A check applied to a bound value after binding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationRule {
    /// Inclusive numeric bounds, compared as `f64`.
    Range { min: f64, max: f64 },
    /// The value's string form must match the whole pattern.
    Pattern {
        regex: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    /// The value must name an existing file or directory.
    PathExists {
        kind: PathKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

impl ValidationRule {
    pub fn range(min: f64, max: f64) -> Self {
        ValidationRule::Range { min, max }
    }

    pub fn pattern(regex: &str) -> Self {
        ValidationRule::Pattern {
            regex: regex.to_string(),
            message: None,
        }
    }

    pub fn file_exists() -> Self {
        ValidationRule::PathExists {
            kind: PathKind::File,
            message: None,
        }
    }

    pub fn directory_exists() -> Self {
        ValidationRule::PathExists {
            kind: PathKind::Directory,
            message: None,
        }
    }

    /// Replaces the generated failure message. No effect on `Range`.
    pub fn with_message(mut self, text: &str) -> Self {
        match &mut self {
            ValidationRule::Pattern { message, .. } | ValidationRule::PathExists { message, .. } => {
                *message = Some(text.to_string());
            }
            ValidationRule::Range { .. } => {}
        }
        self
    }
}

/// Declared parameter of an action.
///
/// Use [`argument`](ParameterDescriptor::argument) and
/// [`option`](ParameterDescriptor::option) for the common cases, then chain
/// builder methods.
///
/// # Examples
///
/// ```
/// use command_dispatch_core::{ParameterDescriptor, ScalarType, ValidationRule, ValueShape};
///
/// let port = ParameterDescriptor::option("port", ValueShape::Scalar(ScalarType::U16))
///     .short('p')
///     .with_default("8080")
///     .with_env("APP_PORT")
///     .with_rule(ValidationRule::range(1.0, 65535.0));
///
/// assert_eq!(port.long_name.as_deref(), Some("port"));
/// assert!(!port.required);
///
/// let file = ParameterDescriptor::argument("file", ValueShape::Scalar(ScalarType::Path));
/// assert!(file.required);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    /// Binding key; unique within the action once containers are flattened.
    pub name: String,
    pub kind: ParameterKind,
    #[serde(default)]
    pub shape: ValueShape,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_name: Option<char>,
    #[serde(default)]
    pub required: bool,
    /// Raw default text, converted with the parameter's own shape.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_var: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default)]
    pub secure_prompt: bool,
    /// Name of the mutually exclusive set this parameter belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclusive_set: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validators: Vec<ValidationRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Sub-parameters of container kinds.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<ParameterDescriptor>,
    /// Type key of an injected context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_type: Option<String>,
}

impl ParameterDescriptor {
    fn bare(name: &str, kind: ParameterKind, shape: ValueShape) -> Self {
        Self {
            name: name.to_string(),
            kind,
            shape,
            long_name: None,
            short_name: None,
            required: false,
            default_value: None,
            env_var: None,
            prompt: None,
            secure_prompt: false,
            exclusive_set: None,
            validators: Vec::new(),
            description: None,
            members: Vec::new(),
            context_type: None,
        }
    }

    /// Creates a required positional argument.
    pub fn argument(name: &str, shape: ValueShape) -> Self {
        let mut param = Self::bare(name, ParameterKind::PositionalArgument, shape);
        param.required = true;
        param
    }

    /// Creates an optional named option whose long name is `name`.
    pub fn option(name: &str, shape: ValueShape) -> Self {
        let mut param = Self::bare(name, ParameterKind::NamedOption, shape);
        param.long_name = Some(name.to_string());
        param
    }

    /// Creates a boolean switch option.
    pub fn switch(name: &str) -> Self {
        Self::option(name, ValueShape::Scalar(ScalarType::Bool))
    }

    /// Creates a container object whose members bind as if declared inline.
    pub fn container(name: &str, members: Vec<ParameterDescriptor>) -> Self {
        let mut param = Self::bare(name, ParameterKind::ContainerObject, ValueShape::default());
        param.members = members;
        param
    }

    /// Creates a global options object.
    pub fn global_options(name: &str, members: Vec<ParameterDescriptor>) -> Self {
        let mut param = Self::bare(
            name,
            ParameterKind::GlobalOptionsObject,
            ValueShape::default(),
        );
        param.members = members;
        param
    }

    /// Creates a parameter supplied by the host under `context_type`.
    pub fn injected(name: &str, context_type: &str) -> Self {
        let mut param = Self::bare(name, ParameterKind::InjectedContext, ValueShape::default());
        param.context_type = Some(context_type.to_string());
        param
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn long(mut self, long: &str) -> Self {
        self.long_name = Some(long.to_string());
        self
    }

    pub fn short(mut self, short: char) -> Self {
        self.short_name = Some(short);
        self
    }

    /// Sets the default. Implies the parameter is optional.
    pub fn with_default(mut self, raw: &str) -> Self {
        self.default_value = Some(raw.to_string());
        self.required = false;
        self
    }

    pub fn with_env(mut self, var: &str) -> Self {
        self.env_var = Some(var.to_string());
        self
    }

    pub fn with_prompt(mut self, text: &str) -> Self {
        self.prompt = Some(text.to_string());
        self
    }

    /// Masks prompted input.
    pub fn secure(mut self) -> Self {
        self.secure_prompt = true;
        self
    }

    pub fn exclusive_in(mut self, set: &str) -> Self {
        self.exclusive_set = Some(set.to_string());
        self
    }

    pub fn with_rule(mut self, rule: ValidationRule) -> Self {
        self.validators.push(rule);
        self
    }

    pub fn with_description(mut self, desc: &str) -> Self {
        self.description = Some(desc.to_string());
        self
    }

    /// Display name used in messages: `--long`, `-s`, or the bare name.
    pub fn display_name(&self) -> String {
        match (self.kind, &self.long_name, self.short_name) {
            (ParameterKind::NamedOption, Some(long), _) => format!("--{long}"),
            (ParameterKind::NamedOption, None, Some(short)) => format!("-{short}"),
            _ => self.name.clone(),
        }
    }
}

/// Lifecycle phase a hook is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookKind {
    Before,
    After,
    OnError,
}

/// Reference to a registered hook handler with its ordering key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookDescriptor {
    pub kind: HookKind,
    /// Ascending execution order; ties keep declaration order.
    #[serde(default)]
    pub order: i32,
    /// Name the handler is registered under.
    pub handler: String,
}

impl HookDescriptor {
    pub fn before(handler: &str, order: i32) -> Self {
        Self {
            kind: HookKind::Before,
            order,
            handler: handler.to_string(),
        }
    }

    pub fn after(handler: &str, order: i32) -> Self {
        Self {
            kind: HookKind::After,
            order,
            handler: handler.to_string(),
        }
    }

    pub fn on_error(handler: &str, order: i32) -> Self {
        Self {
            kind: HookKind::OnError,
            order,
            handler: handler.to_string(),
        }
    }
}

/// A leaf operation of a command.
///
/// # Examples
///
/// ```
/// use command_dispatch_core::*;
///
/// let add = ActionDescriptor::new("add")
///     .with_alias("a")
///     .with_parameter(ParameterDescriptor::argument("name", ValueShape::default()))
///     .with_parameter(ParameterDescriptor::argument("url", ValueShape::Scalar(ScalarType::Uri)))
///     .map_error("io", 74);
///
/// assert!(add.matches("a"));
/// assert_eq!(add.exit_codes.get("io"), Some(&74));
/// assert_eq!(add.leaf_parameters().len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ActionDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub parameters: Vec<ParameterDescriptor>,
    /// Selected when no token names an action of the owning command.
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub is_async: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hooks: Vec<HookDescriptor>,
    /// Error kind to exit code.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub exit_codes: BTreeMap<String, i32>,
}

impl ActionDescriptor {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.aliases.push(alias.to_string());
        self
    }

    pub fn with_description(mut self, desc: &str) -> Self {
        self.description = Some(desc.to_string());
        self
    }

    pub fn with_parameter(mut self, param: ParameterDescriptor) -> Self {
        self.parameters.push(param);
        self
    }

    /// Marks this action as the command's primary action.
    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    pub fn asynchronous(mut self) -> Self {
        self.is_async = true;
        self
    }

    pub fn with_hook(mut self, hook: HookDescriptor) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Maps an action error kind to an exit code.
    pub fn map_error(mut self, kind: &str, code: i32) -> Self {
        self.exit_codes.insert(kind.to_string(), code);
        self
    }

    /// Exact, case-sensitive match on name or alias.
    pub fn matches(&self, token: &str) -> bool {
        self.name == token || self.aliases.iter().any(|a| a == token)
    }

    /// Parameters with container members expanded in place, in declaration
    /// order. Containers themselves are not included.
    pub fn leaf_parameters(&self) -> Vec<&ParameterDescriptor> {
        let mut out = Vec::new();
        flatten_into(&self.parameters, &mut out);
        out
    }

    /// Finds a leaf parameter by binding name.
    pub fn find_parameter(&self, name: &str) -> Option<&ParameterDescriptor> {
        self.leaf_parameters().into_iter().find(|p| p.name == name)
    }
}

fn flatten_into<'a>(params: &'a [ParameterDescriptor], out: &mut Vec<&'a ParameterDescriptor>) {
    for param in params {
        if param.kind.is_container() {
            flatten_into(&param.members, out);
        } else {
            out.push(param);
        }
    }
}

/// A node of the command tree.
///
/// # Examples
///
/// ```
/// use command_dispatch_core::*;
///
/// let remote = CommandNode::new("remote")
///     .with_action(ActionDescriptor::new("list").primary())
///     .with_action(ActionDescriptor::new("add"));
/// let git = CommandNode::new("gitcli").with_child(remote);
///
/// let remote = git.find_child("remote").unwrap();
/// assert_eq!(remote.primary_action().unwrap().name, "list");
/// assert!(remote.find_action("add").is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CommandNode {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<CommandNode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<ActionDescriptor>,
    /// Hooks inherited by every action below this node.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hooks: Vec<HookDescriptor>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub exit_codes: BTreeMap<String, i32>,
}

impl CommandNode {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.aliases.push(alias.to_string());
        self
    }

    pub fn with_description(mut self, desc: &str) -> Self {
        self.description = Some(desc.to_string());
        self
    }

    pub fn with_child(mut self, child: CommandNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_action(mut self, action: ActionDescriptor) -> Self {
        self.actions.push(action);
        self
    }

    pub fn with_hook(mut self, hook: HookDescriptor) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn map_error(mut self, kind: &str, code: i32) -> Self {
        self.exit_codes.insert(kind.to_string(), code);
        self
    }

    /// Exact, case-sensitive match on name or alias.
    pub fn matches(&self, token: &str) -> bool {
        self.name == token || self.aliases.iter().any(|a| a == token)
    }

    pub fn find_child(&self, token: &str) -> Option<&CommandNode> {
        self.children.iter().find(|c| c.matches(token))
    }

    pub fn find_action(&self, token: &str) -> Option<&ActionDescriptor> {
        self.actions.iter().find(|a| a.matches(token))
    }

    pub fn primary_action(&self) -> Option<&ActionDescriptor> {
        self.actions.iter().find(|a| a.primary)
    }
}

/// The whole command tree, rooted at an anonymous program node.
///
/// Top-level commands are the root's children; actions declared on the root
/// are invocable without naming a command. The tree serializes as its root
/// node.
///
/// # Examples
///
/// ```
/// use command_dispatch_core::*;
///
/// let tree = CommandTree::new("app").with_command(
///     CommandNode::new("remote").with_child(CommandNode::new("branch")),
/// );
///
/// assert!(tree.find_path(&["remote", "branch"]).is_some());
/// assert!(tree.find_path(&["branch"]).is_none());
///
/// let mut seen = Vec::new();
/// tree.walk(&mut |path, _node| seen.push(path.join(" ")));
/// assert_eq!(seen, vec!["", "remote", "remote branch"]);
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandTree {
    root: CommandNode,
}

impl CommandTree {
    pub fn new(program: &str) -> Self {
        Self {
            root: CommandNode::new(program),
        }
    }

    pub fn from_root(root: CommandNode) -> Self {
        Self { root }
    }

    pub fn with_command(mut self, command: CommandNode) -> Self {
        self.root.children.push(command);
        self
    }

    /// Adds an action invocable without naming a command.
    pub fn with_action(mut self, action: ActionDescriptor) -> Self {
        self.root.actions.push(action);
        self
    }

    pub fn with_hook(mut self, hook: HookDescriptor) -> Self {
        self.root.hooks.push(hook);
        self
    }

    pub fn map_error(mut self, kind: &str, code: i32) -> Self {
        self.root.exit_codes.insert(kind.to_string(), code);
        self
    }

    pub fn root(&self) -> &CommandNode {
        &self.root
    }

    /// Program name.
    pub fn name(&self) -> &str {
        &self.root.name
    }

    /// Follows `path` (names or aliases) from the root.
    pub fn find_path(&self, path: &[&str]) -> Option<&CommandNode> {
        path.iter()
            .try_fold(&self.root, |node, segment| node.find_child(segment))
    }

    /// Root plus the nodes named by `path`, stopping at the first name that
    /// is not a child.
    pub fn chain<S: AsRef<str>>(&self, path: &[S]) -> Vec<&CommandNode> {
        let mut node = &self.root;
        let mut chain = vec![node];
        for name in path {
            let Some(child) = node.find_child(name.as_ref()) else {
                break;
            };
            node = child;
            chain.push(child);
        }
        chain
    }

    /// Visits every node depth-first, parents before children. The root is
    /// visited with an empty path.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&[&'a str], &'a CommandNode)) {
        let mut path = Vec::new();
        walk_node(&self.root, &mut path, visit);
    }
}

fn walk_node<'a>(
    node: &'a CommandNode,
    path: &mut Vec<&'a str>,
    visit: &mut dyn FnMut(&[&'a str], &'a CommandNode),
) {
    visit(path, node);
    for child in &node.children {
        path.push(&child.name);
        walk_node(child, path, visit);
        path.pop();
    }
}
