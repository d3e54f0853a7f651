//! Typed binding without an async host.
//!
//! A deploy tool with flag enums, an enum collection, a custom converter,
//! a shared global options object, a mutually exclusive output set and
//! exit codes loaded from YAML. `main` stays synchronous and uses
//! `run_blocking`.
//!
//! # Usage
//!
//! ```bash
//! cargo run -p command-dispatch-demos --example deploy -- push api --region eu,us --features tls,metrics
//! cargo run -p command-dispatch-demos --example deploy -- push api --after 90s --memory 512Mi --json
//! cargo run -p command-dispatch-demos --example deploy -- push api --json --yaml     # exit 64
//! DEPLOY_ENV=prod cargo run -p command-dispatch-demos --example deploy -- push api -n
//! ```

use command_dispatch::{
    ActionContext, ActionError, ActionOutcome, DispatchConfig, Dispatcher, HandlerRegistry,
    TypedValue,
};
use command_dispatch_core::*;

const EXIT_CODES: &str = "\
exit_codes:
  usage: 64
  failure: 70
interactive: false
";

fn tree() -> CommandTree {
    let regions = EnumSpec::new("Region", [("Eu", 1), ("Us", 2), ("Ap", 3)]);
    let features = EnumSpec::new("Features", [("Tls", 1), ("Metrics", 2), ("Tracing", 4)]);

    let globals = ParameterDescriptor::global_options(
        "globals",
        vec![
            ParameterDescriptor::option("env", ValueShape::default())
                .short('e')
                .with_env("DEPLOY_ENV")
                .with_default("staging")
                .with_rule(ValidationRule::pattern("staging|prod")),
            ParameterDescriptor::switch("dry-run").short('n'),
        ],
    );
    let output = ParameterDescriptor::container(
        "output",
        vec![
            ParameterDescriptor::switch("json").exclusive_in("format"),
            ParameterDescriptor::switch("yaml").exclusive_in("format"),
        ],
    );

    CommandTree::new("deploy").with_command(
        CommandNode::new("push").map_error("quota", 75).with_action(
            ActionDescriptor::new("service")
                .primary()
                .with_parameter(ParameterDescriptor::argument("name", ValueShape::default()))
                .with_parameter(
                    ParameterDescriptor::option(
                        "region",
                        ValueShape::Collection(ElementShape::Enum(regions)),
                    )
                    .with_default("eu"),
                )
                .with_parameter(ParameterDescriptor::option(
                    "features",
                    ValueShape::FlagsEnum(features),
                ))
                .with_parameter(ParameterDescriptor::option(
                    "after",
                    ValueShape::Scalar(ScalarType::Duration),
                ))
                .with_parameter(ParameterDescriptor::option(
                    "memory",
                    ValueShape::Custom {
                        converter: "memory".to_string(),
                    },
                ))
                .with_parameter(globals)
                .with_parameter(output),
        ),
    )
}

/// Parses `512Mi` / `2Gi` into a byte count.
fn parse_memory(raw: &str) -> Result<TypedValue, String> {
    let (digits, scale) = if let Some(n) = raw.strip_suffix("Gi") {
        (n, 1u64 << 30)
    } else if let Some(n) = raw.strip_suffix("Mi") {
        (n, 1u64 << 20)
    } else {
        (raw, 1)
    };
    let amount: u64 = digits
        .parse()
        .map_err(|_| format!("expected a size like 512Mi or 2Gi, got '{raw}'"))?;
    amount
        .checked_mul(scale)
        .map(TypedValue::UInt)
        .ok_or_else(|| "size is too large".to_string())
}

async fn push(ctx: ActionContext) -> Result<ActionOutcome, ActionError> {
    let args = &ctx.invocation.arguments;
    let name = args.str("name").unwrap_or_default();
    let regions: Vec<String> = args
        .list("region")
        .unwrap_or_default()
        .iter()
        .map(ToString::to_string)
        .collect();

    if regions.len() > 2 {
        return Err(ActionError::new("quota", "at most two regions per push"));
    }

    let mut report = vec![
        format!("service={name}"),
        format!("env={}", args.str("env").unwrap_or_default()),
        format!("regions={}", regions.join(",")),
    ];
    if let Some(features) = args.value("features") {
        report.push(format!("features={features} ({})", features.as_i64().unwrap_or(0)));
    }
    if let Some(after) = args.value("after") {
        report.push(format!("after={after}"));
    }
    if let Some(bytes) = args.value("memory").and_then(TypedValue::as_u64) {
        report.push(format!("memory={bytes}"));
    }

    let separator = if args.flag("json") { ", " } else { "\n" };
    let prefix = if args.flag("dry-run") { "[dry run] " } else { "" };
    println!("{prefix}{}", report.join(separator));
    Ok(ActionOutcome::Success)
}

fn main() {
    let config = match DispatchConfig::from_yaml_str(EXIT_CODES) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    };

    let registry = HandlerRegistry::default()
        .with_action_fn("push service", push)
        .with_converter_fn("memory", parse_memory);

    let dispatcher = match Dispatcher::builder(tree())
        .registry(registry)
        .config(config)
        .build()
    {
        Ok(dispatcher) => dispatcher,
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    };

    std::process::exit(dispatcher.run_blocking(std::env::args().skip(1)));
}
