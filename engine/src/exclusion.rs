//! Mutually exclusive sets.

use command_dispatch_core::ActionDescriptor;

use crate::error::MutualExclusionError;
use crate::value::{BoundArguments, TypedValue, ValueSource};

/// Fails if more than one member of any exclusive set was supplied.
///
/// A member counts as supplied when its value came from argv, the
/// environment or a prompt. Booleans additionally have to be `true`, so
/// `--json=false` does not conflict with `--yaml`.
///
/// Sets are checked in order of first declaration.
pub fn check_exclusive(
    action: &ActionDescriptor,
    args: &BoundArguments,
) -> Result<(), MutualExclusionError> {
    let mut groups: Vec<(&str, Vec<String>)> = Vec::new();

    for param in action.leaf_parameters() {
        let Some(group) = param.exclusive_set.as_deref() else {
            continue;
        };
        let slot = match groups.iter().position(|(name, _)| *name == group) {
            Some(index) => index,
            None => {
                groups.push((group, Vec::new()));
                groups.len() - 1
            }
        };
        let supplied = args.get(&param.name).is_some_and(|bound| {
            bound.source != ValueSource::Default
                && !matches!(bound.value, TypedValue::Bool(false))
        });
        if supplied {
            groups[slot].1.push(param.display_name());
        }
    }

    match groups.into_iter().find(|(_, supplied)| supplied.len() > 1) {
        Some((group, parameters)) => Err(MutualExclusionError {
            group: group.to_string(),
            parameters,
        }),
        None => Ok(()),
    }
}
