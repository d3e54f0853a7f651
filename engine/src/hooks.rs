//! Hook pipeline.
//!
//! ```text
//! Idle -> BeforeRunning -> Invoking -> AfterRunning -> Completed
//!              |              |             |
//!              +--------------+-------------+--> ErrorRunning -> Completed
//! ```
//!
//! A before-hook returning [`HookSignal::Cancel`] jumps straight to
//! `Completed`. Every error hook runs, in order, even if an earlier one
//! failed. The cancellation signal is checked at each await; once observed,
//! the remaining phases are skipped.

use std::sync::Arc;

use command_dispatch_core::{ActionDescriptor, CommandNode, HookDescriptor, HookKind};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::dispatch::BoundInvocation;
use crate::error::{ActionError, DispatchError};
use crate::exit::ActionOutcome;
use crate::host::{ContextValues, suspend};
use crate::registry::{ActionContext, ActionHandler, HandlerRegistry, Hook, HookContext, HookSignal};

/// States the pipeline passes through for one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    BeforeRunning,
    Invoking,
    AfterRunning,
    ErrorRunning,
    Completed,
}

/// How the pipeline ended.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEnd {
    Succeeded(ActionOutcome),
    /// A before-hook asked to stop.
    CancelledByHook(String),
    /// The cancellation signal was observed.
    Interrupted,
    /// The action or a hook raised; error hooks have already run.
    Failed(ActionError),
}

/// Hook descriptors for one phase, in execution order.
///
/// Command hooks come root first, then the action's own; a stable sort on
/// `order` keeps that declaration order among equal keys.
pub fn ordered_hooks(
    commands: &[&CommandNode],
    action: &ActionDescriptor,
    kind: HookKind,
) -> Vec<HookDescriptor> {
    let mut hooks: Vec<HookDescriptor> = commands
        .iter()
        .flat_map(|node| node.hooks.iter())
        .chain(action.hooks.iter())
        .filter(|hook| hook.kind == kind)
        .cloned()
        .collect();
    hooks.sort_by_key(|hook| hook.order);
    hooks
}

struct Scheduled {
    name: String,
    hook: Arc<dyn Hook>,
}

/// One invocation's hooks and action, ready to run.
pub(crate) struct HookPipeline {
    before: Vec<Scheduled>,
    after: Vec<Scheduled>,
    on_error: Vec<Scheduled>,
    handler: Arc<dyn ActionHandler>,
    invocation: Arc<BoundInvocation>,
    contexts: ContextValues,
    cancel: CancellationToken,
    trace: Vec<PipelineState>,
}

impl HookPipeline {
    /// Looks up the action handler and every hook handler up front.
    pub fn new(
        registry: &HandlerRegistry,
        commands: &[&CommandNode],
        invocation: Arc<BoundInvocation>,
        contexts: ContextValues,
        cancel: CancellationToken,
    ) -> Result<Self, DispatchError> {
        let path = invocation.action_path();
        let handler = registry
            .action(&path)
            .cloned()
            .ok_or(DispatchError::MissingHandler(path))?;

        let schedule = |kind: HookKind| -> Result<Vec<Scheduled>, DispatchError> {
            ordered_hooks(commands, &invocation.action, kind)
                .into_iter()
                .map(|descriptor| {
                    let hook = registry
                        .hook(&descriptor.handler)
                        .cloned()
                        .ok_or_else(|| DispatchError::MissingHook(descriptor.handler.clone()))?;
                    Ok(Scheduled {
                        name: descriptor.handler,
                        hook,
                    })
                })
                .collect()
        };

        Ok(Self {
            before: schedule(HookKind::Before)?,
            after: schedule(HookKind::After)?,
            on_error: schedule(HookKind::OnError)?,
            handler,
            invocation,
            contexts,
            cancel,
            trace: vec![PipelineState::Idle],
        })
    }

    /// Runs the pipeline to completion and returns how it ended together
    /// with the states visited.
    pub async fn run(mut self) -> (PipelineEnd, Vec<PipelineState>) {
        let end = self.run_phases().await;
        self.enter(PipelineState::Completed);
        (end, self.trace)
    }

    async fn run_phases(&mut self) -> PipelineEnd {
        self.enter(PipelineState::BeforeRunning);
        for index in 0..self.before.len() {
            let ctx = self.hook_context(HookKind::Before, None);
            let scheduled = &self.before[index];
            let name = scheduled.name.clone();
            match suspend(&self.cancel, scheduled.hook.call(ctx)).await {
                Err(_) => return PipelineEnd::Interrupted,
                Ok(Ok(HookSignal::Continue)) => {}
                Ok(Ok(HookSignal::Cancel)) => {
                    debug!(hook = %name, "before-hook cancelled the invocation");
                    return PipelineEnd::CancelledByHook(name);
                }
                Ok(Err(err)) => return self.handle_error(err).await,
            }
        }

        self.enter(PipelineState::Invoking);
        let ctx = ActionContext {
            invocation: Arc::clone(&self.invocation),
            contexts: self.contexts.clone(),
            cancel: self.cancel.clone(),
        };
        let outcome = match suspend(&self.cancel, self.handler.invoke(ctx)).await {
            Err(_) => return PipelineEnd::Interrupted,
            Ok(Ok(outcome)) => outcome,
            Ok(Err(err)) => return self.handle_error(err).await,
        };

        self.enter(PipelineState::AfterRunning);
        for index in 0..self.after.len() {
            let ctx = self.hook_context(HookKind::After, None);
            match suspend(&self.cancel, self.after[index].hook.call(ctx)).await {
                Err(_) => return PipelineEnd::Interrupted,
                Ok(Ok(_)) => {}
                Ok(Err(err)) => return self.handle_error(err).await,
            }
        }

        PipelineEnd::Succeeded(outcome)
    }

    async fn handle_error(&mut self, err: ActionError) -> PipelineEnd {
        self.enter(PipelineState::ErrorRunning);
        debug!(kind = %err.kind(), error = %err, "running error hooks");
        for index in 0..self.on_error.len() {
            let ctx = self.hook_context(HookKind::OnError, Some(err.clone()));
            let scheduled = &self.on_error[index];
            match suspend(&self.cancel, scheduled.hook.call(ctx)).await {
                Err(_) => return PipelineEnd::Interrupted,
                Ok(Ok(_)) => {}
                Ok(Err(hook_err)) => {
                    warn!(hook = %scheduled.name, error = %hook_err, "error hook failed");
                }
            }
        }
        PipelineEnd::Failed(err)
    }

    fn hook_context(&self, phase: HookKind, error: Option<ActionError>) -> HookContext {
        HookContext {
            phase,
            invocation: Arc::clone(&self.invocation),
            error,
            contexts: self.contexts.clone(),
            cancel: self.cancel.clone(),
        }
    }

    fn enter(&mut self, state: PipelineState) {
        debug!(state = ?state, "pipeline");
        self.trace.push(state);
    }
}
