//! Command resolution and argument binding engine.
//!
//! Takes a [`CommandTree`](command_dispatch_core::CommandTree) and one
//! argument vector and runs it through:
//!
//! 1. [`tokenize`] – classify each argument.
//! 2. [`resolve`] – walk the tree to the deepest command and its action.
//! 3. binding – map the remaining tokens onto typed parameters, with
//!    environment, default and prompt fallbacks.
//! 4. [`check_rules`] and [`check_exclusive`] – validation rules and
//!    mutually exclusive sets.
//! 5. the hook pipeline – before-hooks, the action, after-hooks, and error
//!    hooks on failure.
//! 6. exit code mapping.
//!
//! [`Dispatcher`] drives the whole sequence. Effectful inputs (environment,
//! prompts, injected contexts, cancellation) are passed in by the host.
//!
//! # Example
//!
//! ```
//! use command_dispatch::{ActionError, ActionOutcome, Dispatcher, HandlerRegistry, MapEnvironment};
//! use command_dispatch_core::*;
//!
//! let tree = CommandTree::new("gitcli").with_command(
//!     CommandNode::new("remote").with_action(
//!         ActionDescriptor::new("add")
//!             .with_parameter(ParameterDescriptor::argument("name", ValueShape::default()))
//!             .with_parameter(ParameterDescriptor::argument(
//!                 "url",
//!                 ValueShape::Scalar(ScalarType::Uri),
//!             ))
//!             .map_error("exists", 17),
//!     ),
//! );
//!
//! let registry = HandlerRegistry::default().with_action_fn("remote add", |ctx| async move {
//!     match ctx.invocation.arguments.str("name") {
//!         Some("origin") => Err(ActionError::new("exists", "remote 'origin' already exists")),
//!         _ => Ok(ActionOutcome::Unit),
//!     }
//! });
//!
//! let dispatcher = Dispatcher::builder(tree)
//!     .registry(registry)
//!     .environment(MapEnvironment::default())
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(dispatcher.run_blocking(["remote", "add", "upstream", "https://x"]), 0);
//! assert_eq!(dispatcher.run_blocking(["remote", "add", "origin", "https://x"]), 17);
//! assert_eq!(dispatcher.run_blocking(["remote", "add", "origin", "not a uri"]), 2);
//! ```

mod bind;
mod config;
mod convert;
mod dispatch;
mod error;
mod exclusion;
mod exit;
mod hooks;
mod host;
mod registry;
mod resolve;
mod rules;
mod token;
mod value;

pub use config::{DispatchConfig, ExitCodes};
pub use convert::{convert_enum, convert_flags, convert_scalar, split_list};
pub use dispatch::{
    BoundInvocation, Completion, DispatchOutcome, Dispatcher, DispatcherBuilder, InvocationState,
    Prepared,
};
pub use error::{
    ActionError, BindError, CANCELLED_KIND, ConfigError, DispatchError, FAILURE_KIND,
    MutualExclusionError, PromptError, ResolveError, Result, ValidationError,
};
pub use exclusion::check_exclusive;
pub use exit::{ActionOutcome, error_exit_code};
pub use hooks::{PipelineState, ordered_hooks};
pub use host::{
    ContextValues, Environment, MapEnvironment, ProcessEnvironment, Prompter, ScriptedPrompter,
    TerminalPrompter,
};
pub use registry::{
    ActionContext, ActionHandler, FnAction, FnConverter, FnHook, HandlerRegistry, HelpRenderer,
    Hook, HookContext, HookSignal, ValueConverter,
};
pub use resolve::{HelpTarget, Resolution, Resolved, resolve};
pub use rules::check_rules;
pub use token::{Token, tokenize};
pub use value::{BoundArguments, BoundValue, EnumValue, FlagsValue, TypedValue, ValueSource};
