//! The dispatcher.
//!
//! Strings the stages together for one argument vector:
//! tokenize, resolve, bind, validate, check exclusions, then run the hook
//! pipeline around the action and map the result to an exit code.

use std::sync::Arc;

use command_dispatch_core::{ActionDescriptor, CommandTree, validate_tree};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::bind::Binder;
use crate::config::DispatchConfig;
use crate::error::{ActionError, DispatchError, Result};
use crate::exclusion::check_exclusive;
use crate::exit::{ActionOutcome, error_exit_code};
use crate::hooks::{HookPipeline, PipelineEnd, PipelineState};
use crate::host::{ContextValues, Environment, ProcessEnvironment, Prompter, TerminalPrompter};
use crate::registry::HandlerRegistry;
use crate::resolve::{HelpTarget, Resolved, resolve};
use crate::rules::check_rules;
use crate::token::tokenize;
use crate::value::BoundArguments;

/// A resolved action with its bound and validated arguments.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundInvocation {
    /// Canonical command names below the root.
    pub path: Vec<String>,
    pub action: ActionDescriptor,
    pub arguments: BoundArguments,
}

impl BoundInvocation {
    /// Handler key, e.g. `remote add`.
    pub fn action_path(&self) -> String {
        let mut parts: Vec<&str> = self.path.iter().map(String::as_str).collect();
        parts.push(&self.action.name);
        parts.join(" ")
    }
}

/// Lifecycle of one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationState {
    Resolving,
    Binding,
    Validating,
    Invoking,
    Completed,
    Failed,
}

/// Result of [`Dispatcher::prepare`].
#[derive(Debug, Clone, PartialEq)]
pub enum Prepared {
    Invocation(BoundInvocation),
    Help(HelpTarget),
}

/// How a dispatch ended.
#[derive(Debug, Clone)]
pub enum Completion {
    /// The action returned normally and all after-hooks passed.
    Succeeded(ActionOutcome),
    /// The action or a hook raised. Error hooks have observed it.
    Failed(ActionError),
    /// A before-hook cancelled, or the cancellation signal fired.
    Cancelled,
    /// Help was requested and handed to the renderer.
    Help(HelpTarget),
    /// Resolution, binding, validation or wiring failed before any hook ran.
    Rejected(DispatchError),
}

/// Everything a dispatch produced.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub exit_code: i32,
    pub completion: Completion,
    /// Handler key of the selected action, once resolved.
    pub action: Option<String>,
    pub phases: Vec<InvocationState>,
    /// Hook pipeline states; empty if the pipeline never started.
    pub trace: Vec<PipelineState>,
}

impl DispatchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(
            self.completion,
            Completion::Succeeded(_) | Completion::Help(_)
        )
    }

    /// The error to show the user, if any.
    pub fn error(&self) -> Option<String> {
        match &self.completion {
            Completion::Rejected(err) => Some(err.to_string()),
            Completion::Failed(err) if !err.is_cancellation() => Some(err.to_string()),
            _ => None,
        }
    }
}

/// Builder for [`Dispatcher`].
pub struct DispatcherBuilder {
    tree: Arc<CommandTree>,
    registry: HandlerRegistry,
    config: DispatchConfig,
    environment: Arc<dyn Environment>,
    prompter: Option<Arc<dyn Prompter>>,
    contexts: ContextValues,
}

impl DispatcherBuilder {
    pub fn registry(mut self, registry: HandlerRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(mut self, config: DispatchConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the process environment, e.g. with a
    /// [`MapEnvironment`](crate::MapEnvironment).
    pub fn environment(mut self, environment: impl Environment + 'static) -> Self {
        self.environment = Arc::new(environment);
        self
    }

    pub fn prompter(mut self, prompter: impl Prompter + 'static) -> Self {
        self.prompter = Some(Arc::new(prompter));
        self
    }

    /// Disables prompting regardless of configuration.
    pub fn without_prompter(mut self) -> Self {
        self.prompter = None;
        self
    }

    pub fn context<T: std::any::Any + Send + Sync>(
        mut self,
        context_type: &str,
        value: T,
    ) -> Self {
        self.contexts.insert(context_type, value);
        self
    }

    /// Checks the tree definition and builds the dispatcher.
    ///
    /// # Errors
    ///
    /// [`DispatchError::InvalidTree`] listing every definition error.
    pub fn build(self) -> Result<Dispatcher> {
        let errors = validate_tree(&self.tree);
        if !errors.is_empty() {
            return Err(DispatchError::InvalidTree(errors));
        }
        Ok(Dispatcher {
            tree: self.tree,
            registry: self.registry,
            config: self.config,
            environment: self.environment,
            prompter: self.prompter,
            contexts: self.contexts,
        })
    }
}

/// Resolves, binds and invokes actions of one command tree.
///
/// The tree is shared read-only; each call owns its own invocation state, so
/// one dispatcher can serve any number of sequential dispatches.
///
/// # Examples
///
/// ```
/// use command_dispatch::{ActionOutcome, Dispatcher, HandlerRegistry};
/// use command_dispatch_core::*;
///
/// let tree = CommandTree::new("app").with_command(
///     CommandNode::new("greet").with_action(
///         ActionDescriptor::new("hello")
///             .primary()
///             .with_parameter(ParameterDescriptor::argument("name", ValueShape::default())),
///     ),
/// );
/// let registry = HandlerRegistry::default().with_action_fn("greet hello", |ctx| async move {
///     let name = ctx.invocation.arguments.str("name").unwrap_or_default().to_string();
///     Ok(ActionOutcome::Code(if name == "world" { 0 } else { 3 }))
/// });
///
/// let dispatcher = Dispatcher::builder(tree).registry(registry).build().unwrap();
/// assert_eq!(dispatcher.run_blocking(["greet", "world"]), 0);
/// assert_eq!(dispatcher.run_blocking(["greet", "hello", "moon"]), 3);
/// assert_eq!(dispatcher.run_blocking(["greet"]), 2);
/// ```
pub struct Dispatcher {
    tree: Arc<CommandTree>,
    registry: HandlerRegistry,
    config: DispatchConfig,
    environment: Arc<dyn Environment>,
    prompter: Option<Arc<dyn Prompter>>,
    contexts: ContextValues,
}

impl Dispatcher {
    /// Starts a builder using the process environment and terminal prompts.
    pub fn builder(tree: impl Into<Arc<CommandTree>>) -> DispatcherBuilder {
        DispatcherBuilder {
            tree: tree.into(),
            registry: HandlerRegistry::default(),
            config: DispatchConfig::default(),
            environment: Arc::new(ProcessEnvironment),
            prompter: Some(Arc::new(TerminalPrompter)),
            contexts: ContextValues::default(),
        }
    }

    pub fn tree(&self) -> &CommandTree {
        &self.tree
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Runs resolve, bind, validate and exclusion checks without invoking
    /// anything.
    pub async fn prepare<I, S>(&self, args: I, cancel: &CancellationToken) -> Result<Prepared>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tokens = tokenize(args);
        let mut phases = Vec::new();
        self.prepare_tokens(&tokens, cancel, &mut phases).await
    }

    async fn prepare_tokens(
        &self,
        tokens: &[crate::token::Token],
        cancel: &CancellationToken,
        phases: &mut Vec<InvocationState>,
    ) -> Result<Prepared> {
        phases.push(InvocationState::Resolving);
        let resolution = match resolve(&self.tree, tokens)? {
            Resolved::Help(target) => return Ok(Prepared::Help(target)),
            Resolved::Action(resolution) => resolution,
        };

        phases.push(InvocationState::Binding);
        let binder = Binder {
            config: &self.config,
            environment: self.environment.as_ref(),
            prompter: self.prompter.as_deref(),
            registry: &self.registry,
            contexts: &self.contexts,
            cancel,
        };
        let arguments = binder
            .bind(resolution.action, &resolution.remaining)
            .await?;

        phases.push(InvocationState::Validating);
        check_rules(resolution.action, &arguments)?;
        check_exclusive(resolution.action, &arguments)?;

        Ok(Prepared::Invocation(BoundInvocation {
            path: resolution
                .command_names()
                .into_iter()
                .map(str::to_string)
                .collect(),
            action: resolution.action.clone(),
            arguments,
        }))
    }

    /// Dispatches one argument vector and reports the outcome.
    ///
    /// Never fails: errors before the action are reported as
    /// [`Completion::Rejected`] with the usage or failure code.
    pub async fn dispatch<I, S>(&self, args: I, cancel: CancellationToken) -> DispatchOutcome
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tokens = tokenize(args);
        let codes = self.config.exit_codes;
        let mut phases = Vec::new();

        let prepared = match self.prepare_tokens(&tokens, &cancel, &mut phases).await {
            Ok(prepared) => prepared,
            Err(err) => {
                debug!(error = %err, "dispatch rejected");
                phases.push(InvocationState::Failed);
                return self.finish(DispatchOutcome {
                    exit_code: err.exit_code(&codes),
                    completion: Completion::Rejected(err),
                    action: None,
                    phases,
                    trace: Vec::new(),
                });
            }
        };

        let invocation = match prepared {
            Prepared::Help(target) => {
                if let Some(renderer) = self.registry.help_renderer() {
                    renderer.render(&self.tree, &target);
                }
                phases.push(InvocationState::Completed);
                return self.finish(DispatchOutcome {
                    exit_code: codes.success,
                    completion: Completion::Help(target),
                    action: None,
                    phases,
                    trace: Vec::new(),
                });
            }
            Prepared::Invocation(invocation) => Arc::new(invocation),
        };

        let action_path = invocation.action_path();
        let commands = self.tree.chain(&invocation.path);
        phases.push(InvocationState::Invoking);

        let pipeline = match HookPipeline::new(
            &self.registry,
            &commands,
            Arc::clone(&invocation),
            self.contexts.clone(),
            cancel,
        ) {
            Ok(pipeline) => pipeline,
            Err(err) => {
                phases.push(InvocationState::Failed);
                return self.finish(DispatchOutcome {
                    exit_code: err.exit_code(&codes),
                    completion: Completion::Rejected(err),
                    action: Some(action_path),
                    phases,
                    trace: Vec::new(),
                });
            }
        };

        let (end, trace) = pipeline.run().await;
        let (exit_code, completion) = match end {
            PipelineEnd::Succeeded(outcome) => (outcome.exit_code(&codes), Completion::Succeeded(outcome)),
            PipelineEnd::CancelledByHook(_) | PipelineEnd::Interrupted => {
                (codes.cancelled, Completion::Cancelled)
            }
            PipelineEnd::Failed(err) => (
                error_exit_code(&err, &invocation.action, &commands, &codes),
                Completion::Failed(err),
            ),
        };
        phases.push(match completion {
            Completion::Succeeded(_) => InvocationState::Completed,
            _ => InvocationState::Failed,
        });

        self.finish(DispatchOutcome {
            exit_code,
            completion,
            action: Some(action_path),
            phases,
            trace,
        })
    }

    /// Dispatches and prints any error as `error: <message>` on stderr.
    /// Returns the exit code.
    pub async fn run<I, S>(&self, args: I, cancel: CancellationToken) -> i32
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let outcome = self.dispatch(args, cancel).await;
        if let Some(message) = outcome.error() {
            eprintln!("error: {message}");
        }
        outcome.exit_code
    }

    /// [`run`](Self::run) on a fresh current-thread runtime, without a
    /// cancellation source.
    pub fn run_blocking<I, S>(&self, args: I) -> i32
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(err) => {
                eprintln!("error: {err}");
                return self.config.exit_codes.failure;
            }
        };
        runtime.block_on(self.run(args, CancellationToken::new()))
    }

    fn finish(&self, outcome: DispatchOutcome) -> DispatchOutcome {
        info!(
            action = outcome.action.as_deref().unwrap_or("<none>"),
            exit_code = outcome.exit_code,
            "dispatch completed"
        );
        outcome
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("program", &self.tree.name())
            .field("registry", &self.registry)
            .field("config", &self.config)
            .field("contexts", &self.contexts)
            .finish_non_exhaustive()
    }
}
