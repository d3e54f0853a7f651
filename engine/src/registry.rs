//! Handler registry.
//!
//! The tree only names things: actions by their path, hooks and custom
//! converters by a string key. The registry maps those names to code.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use command_dispatch_core::{CommandTree, HookKind};
use tokio_util::sync::CancellationToken;

use crate::dispatch::BoundInvocation;
use crate::error::ActionError;
use crate::exit::ActionOutcome;
use crate::host::ContextValues;
use crate::resolve::HelpTarget;
use crate::value::TypedValue;

/// What an action handler receives.
#[derive(Debug, Clone)]
pub struct ActionContext {
    pub invocation: Arc<BoundInvocation>,
    pub contexts: ContextValues,
    /// Fires when the host asks the dispatch to stop.
    pub cancel: CancellationToken,
}

impl ActionContext {
    /// The host value bound to an `InjectedContext` parameter.
    pub fn context<T: 'static>(&self, parameter: &str) -> Option<&T> {
        let context_type = self
            .invocation
            .action
            .find_parameter(parameter)?
            .context_type
            .as_deref()?;
        self.contexts.get::<T>(context_type)
    }
}

/// What a hook receives.
#[derive(Debug, Clone)]
pub struct HookContext {
    pub phase: HookKind,
    pub invocation: Arc<BoundInvocation>,
    /// The error being handled, for `OnError` hooks.
    pub error: Option<ActionError>,
    pub contexts: ContextValues,
    pub cancel: CancellationToken,
}

/// A before-hook's verdict. Ignored for after and error hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookSignal {
    Continue,
    /// Skip the action and after-hooks; the dispatch ends with the
    /// cancellation code.
    Cancel,
}

#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn invoke(&self, ctx: ActionContext) -> Result<ActionOutcome, ActionError>;
}

#[async_trait]
pub trait Hook: Send + Sync {
    async fn call(&self, ctx: HookContext) -> Result<HookSignal, ActionError>;
}

/// Converts raw text for a `Custom` value shape.
#[async_trait]
pub trait ValueConverter: Send + Sync {
    async fn convert(&self, raw: &str) -> Result<TypedValue, String>;
}

/// Renders help when `--help` or `-h` is given. The engine never renders
/// help text itself.
pub trait HelpRenderer: Send + Sync {
    fn render(&self, tree: &CommandTree, target: &HelpTarget);
}

/// Adapts an async closure to [`ActionHandler`].
pub struct FnAction<F>(pub F);

#[async_trait]
impl<F, Fut> ActionHandler for FnAction<F>
where
    F: Fn(ActionContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<ActionOutcome, ActionError>> + Send + 'static,
{
    async fn invoke(&self, ctx: ActionContext) -> Result<ActionOutcome, ActionError> {
        (self.0)(ctx).await
    }
}

/// Adapts an async closure to [`Hook`].
pub struct FnHook<F>(pub F);

#[async_trait]
impl<F, Fut> Hook for FnHook<F>
where
    F: Fn(HookContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<HookSignal, ActionError>> + Send + 'static,
{
    async fn call(&self, ctx: HookContext) -> Result<HookSignal, ActionError> {
        (self.0)(ctx).await
    }
}

/// Adapts a synchronous closure to [`ValueConverter`].
pub struct FnConverter<F>(pub F);

#[async_trait]
impl<F> ValueConverter for FnConverter<F>
where
    F: Fn(&str) -> Result<TypedValue, String> + Send + Sync,
{
    async fn convert(&self, raw: &str) -> Result<TypedValue, String> {
        (self.0)(raw)
    }
}

/// Named handlers for one tree.
///
/// Actions are keyed by their path below the root (`"remote add"`), hooks
/// and converters by the name the tree declares.
///
/// # Examples
///
/// ```
/// use command_dispatch::{ActionOutcome, HandlerRegistry, HookSignal};
///
/// let registry = HandlerRegistry::default()
///     .with_action_fn("remote add", |_ctx| async { Ok(ActionOutcome::Unit) })
///     .with_hook_fn("audit", |_ctx| async { Ok(HookSignal::Continue) });
///
/// assert!(registry.action("remote add").is_some());
/// assert!(registry.hook("audit").is_some());
/// assert!(registry.hook("missing").is_none());
/// ```
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    actions: HashMap<String, Arc<dyn ActionHandler>>,
    hooks: HashMap<String, Arc<dyn Hook>>,
    converters: HashMap<String, Arc<dyn ValueConverter>>,
    help: Option<Arc<dyn HelpRenderer>>,
}

impl HandlerRegistry {
    pub fn with_action(mut self, path: &str, handler: impl ActionHandler + 'static) -> Self {
        self.actions.insert(path.to_string(), Arc::new(handler));
        self
    }

    pub fn with_action_fn<F, Fut>(self, path: &str, handler: F) -> Self
    where
        F: Fn(ActionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ActionOutcome, ActionError>> + Send + 'static,
    {
        self.with_action(path, FnAction(handler))
    }

    pub fn with_hook(mut self, name: &str, hook: impl Hook + 'static) -> Self {
        self.hooks.insert(name.to_string(), Arc::new(hook));
        self
    }

    pub fn with_hook_fn<F, Fut>(self, name: &str, hook: F) -> Self
    where
        F: Fn(HookContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HookSignal, ActionError>> + Send + 'static,
    {
        self.with_hook(name, FnHook(hook))
    }

    pub fn with_converter(mut self, name: &str, converter: impl ValueConverter + 'static) -> Self {
        self.converters.insert(name.to_string(), Arc::new(converter));
        self
    }

    pub fn with_converter_fn<F>(self, name: &str, converter: F) -> Self
    where
        F: Fn(&str) -> Result<TypedValue, String> + Send + Sync + 'static,
    {
        self.with_converter(name, FnConverter(converter))
    }

    pub fn with_help(mut self, renderer: impl HelpRenderer + 'static) -> Self {
        self.help = Some(Arc::new(renderer));
        self
    }

    pub fn action(&self, path: &str) -> Option<&Arc<dyn ActionHandler>> {
        self.actions.get(path)
    }

    pub fn hook(&self, name: &str) -> Option<&Arc<dyn Hook>> {
        self.hooks.get(name)
    }

    pub fn converter(&self, name: &str) -> Option<&Arc<dyn ValueConverter>> {
        self.converters.get(name)
    }

    pub fn help_renderer(&self) -> Option<&Arc<dyn HelpRenderer>> {
        self.help.as_ref()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("actions", &sorted_keys(&self.actions))
            .field("hooks", &sorted_keys(&self.hooks))
            .field("converters", &sorted_keys(&self.converters))
            .field("help", &self.help.is_some())
            .finish()
    }
}

fn sorted_keys<V>(map: &HashMap<String, V>) -> Vec<&str> {
    let mut keys: Vec<&str> = map.keys().map(String::as_str).collect();
    keys.sort_unstable();
    keys
}
