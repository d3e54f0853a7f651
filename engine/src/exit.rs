//! Exit code mapping.

use command_dispatch_core::{ActionDescriptor, CommandNode, EnumSpec};

use crate::config::ExitCodes;
use crate::error::ActionError;

/// What an action body returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// Nothing; maps to the success code.
    Unit,
    /// An explicit exit code, used verbatim.
    Code(i32),
    Success,
    Failure,
    /// A member of a declared result enum; maps to its underlying value.
    Member { name: String, value: i32 },
}

impl ActionOutcome {
    /// Returns the member of `spec` named `name` (case-insensitive), if any.
    ///
    /// # Examples
    ///
    /// ```
    /// use command_dispatch::{ActionOutcome, ExitCodes};
    /// use command_dispatch_core::EnumSpec;
    ///
    /// let status = EnumSpec::new("Status", [("Clean", 0), ("Dirty", 3)]);
    /// let outcome = ActionOutcome::member(&status, "dirty").unwrap();
    /// assert_eq!(outcome.exit_code(&ExitCodes::default()), 3);
    /// ```
    pub fn member(spec: &EnumSpec, name: &str) -> Option<Self> {
        let member = spec.find(name)?;
        Some(ActionOutcome::Member {
            name: member.name.clone(),
            value: i32::try_from(member.value).ok()?,
        })
    }

    pub fn exit_code(&self, codes: &ExitCodes) -> i32 {
        match self {
            ActionOutcome::Unit | ActionOutcome::Success => codes.success,
            ActionOutcome::Failure => codes.failure,
            ActionOutcome::Code(code) => *code,
            ActionOutcome::Member { value, .. } => *value,
        }
    }
}

impl From<()> for ActionOutcome {
    fn from((): ()) -> Self {
        ActionOutcome::Unit
    }
}

impl From<i32> for ActionOutcome {
    fn from(code: i32) -> Self {
        ActionOutcome::Code(code)
    }
}

impl From<bool> for ActionOutcome {
    fn from(ok: bool) -> Self {
        if ok {
            ActionOutcome::Success
        } else {
            ActionOutcome::Failure
        }
    }
}

/// Maps an action error to an exit code.
///
/// The action's own map is consulted first, then each command from the
/// deepest matched node up to the root, then the generic failure code.
/// Cancellation always maps to the cancellation code.
pub fn error_exit_code(
    err: &ActionError,
    action: &ActionDescriptor,
    commands: &[&CommandNode],
    codes: &ExitCodes,
) -> i32 {
    if err.is_cancellation() {
        return codes.cancelled;
    }
    action
        .exit_codes
        .get(err.kind())
        .or_else(|| {
            commands
                .iter()
                .rev()
                .find_map(|node| node.exit_codes.get(err.kind()))
        })
        .copied()
        .unwrap_or(codes.failure)
}
