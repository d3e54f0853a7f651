//! Post-binding validation rules.
//!
//! Rules run in declaration order over every leaf parameter that ended up
//! with a value. Provenance is never consulted. Collection values are
//! checked element by element.

use command_dispatch_core::{ActionDescriptor, ParameterDescriptor, PathKind, ValidationRule};
use regex::Regex;

use crate::error::ValidationError;
use crate::value::{BoundArguments, TypedValue};

/// Applies every parameter's validation rules to the bound values.
///
/// # Examples
///
/// ```
/// use command_dispatch::{BoundArguments, BoundValue, TypedValue, ValueSource, check_rules};
/// use command_dispatch_core::*;
///
/// let action = ActionDescriptor::new("connect").with_parameter(
///     ParameterDescriptor::option("port", ValueShape::Scalar(ScalarType::U16))
///         .with_rule(ValidationRule::range(1.0, 65535.0)),
/// );
/// let mut args = BoundArguments::default();
/// args.insert("port", BoundValue::new(TypedValue::UInt(0), ValueSource::Argv));
///
/// let err = check_rules(&action, &args).unwrap_err();
/// assert_eq!(err.to_string(), "value 0 for '--port' is out of range [1, 65535]");
/// ```
pub fn check_rules(action: &ActionDescriptor, args: &BoundArguments) -> Result<(), ValidationError> {
    for param in action.leaf_parameters() {
        if param.validators.is_empty() {
            continue;
        }
        let Some(bound) = args.value(&param.name) else {
            continue;
        };
        let values: Vec<&TypedValue> = match bound {
            TypedValue::List(items) => items.iter().collect(),
            single => vec![single],
        };
        for rule in &param.validators {
            for value in &values {
                check_rule(param, rule, value)?;
            }
        }
    }
    Ok(())
}

fn check_rule(
    param: &ParameterDescriptor,
    rule: &ValidationRule,
    value: &TypedValue,
) -> Result<(), ValidationError> {
    let name = param.display_name();
    let fail = |message: String| {
        Err(ValidationError {
            parameter: param.name.clone(),
            message,
        })
    };

    match rule {
        ValidationRule::Range { min, max } => {
            let Some(number) = value.as_f64() else {
                return fail(format!(
                    "value '{value}' for '{name}' is not numeric and cannot be range checked"
                ));
            };
            if !(*min..=*max).contains(&number) {
                return fail(format!(
                    "value {value} for '{name}' is out of range [{min}, {max}]"
                ));
            }
        }
        ValidationRule::Pattern { regex, message } => {
            let anchored = match Regex::new(&format!("^(?:{regex})$")) {
                Ok(re) => re,
                Err(e) => return fail(format!("pattern '{regex}' for '{name}' is invalid: {e}")),
            };
            let text = value.to_string();
            if !anchored.is_match(&text) {
                return fail(message.clone().unwrap_or_else(|| {
                    format!("value '{text}' for '{name}' does not match pattern '{regex}'")
                }));
            }
        }
        ValidationRule::PathExists { kind, message } => {
            let text = value.to_string();
            let path = value.as_path().unwrap_or_else(|| std::path::Path::new(&text));
            let (exists, noun) = match kind {
                PathKind::File => (path.is_file(), "file"),
                PathKind::Directory => (path.is_dir(), "directory"),
            };
            if !exists {
                return fail(message.clone().unwrap_or_else(|| {
                    format!("{noun} '{}' for '{name}' does not exist", path.display())
                }));
            }
        }
    }
    Ok(())
}
