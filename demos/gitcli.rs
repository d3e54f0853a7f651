//! A small git-like program driven entirely by a command tree.
//!
//! Shows nested commands with aliases, a primary action, hooks at two
//! levels, error-kind exit codes, an enum outcome, an injected context and
//! Ctrl-C cancellation.
//!
//! # Usage
//!
//! ```bash
//! cargo run -p command-dispatch-demos --example gitcli -- remote add origin https://example.com/repo
//! cargo run -p command-dispatch-demos --example gitcli -- remote add origin https://x   # exit 17
//! cargo run -p command-dispatch-demos --example gitcli -- r -v
//! cargo run -p command-dispatch-demos --example gitcli -- clone https://x --depth 200  # Ctrl-C -> 130
//! GITCLI_TOKEN=abc cargo run -p command-dispatch-demos --example gitcli -- login
//! cargo run -p command-dispatch-demos --example gitcli -- status; echo $?
//! cargo run -p command-dispatch-demos --example gitcli -- remote --help
//! ```

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use command_dispatch::{
    ActionContext, ActionError, ActionOutcome, Dispatcher, HandlerRegistry, HelpRenderer,
    HelpTarget, HookContext, HookSignal,
};
use command_dispatch_core::*;
use tokio_util::sync::CancellationToken;
use tracing::info;

type Remotes = Arc<Mutex<BTreeMap<String, String>>>;

/// Objects fetched so far, shared with the host.
#[derive(Debug, Default)]
struct Progress {
    fetched: AtomicU64,
}

fn status_enum() -> EnumSpec {
    EnumSpec::new("Status", [("Clean", 0), ("Dirty", 3)])
}

fn tree() -> CommandTree {
    CommandTree::new("gitcli")
        .with_hook(HookDescriptor::before("audit", 0))
        .map_error("auth", 77)
        .with_command(
            CommandNode::new("remote")
                .with_alias("r")
                .with_description("Manage tracked repositories")
                .map_error("exists", 17)
                .map_error("not_found", 18)
                .with_hook(HookDescriptor::after("save_remotes", 0))
                .with_action(
                    ActionDescriptor::new("list")
                        .primary()
                        .with_parameter(ParameterDescriptor::switch("verbose").short('v')),
                )
                .with_action(
                    ActionDescriptor::new("add")
                        .with_description("Add a remote")
                        .with_parameter(ParameterDescriptor::argument("name", ValueShape::default()))
                        .with_parameter(ParameterDescriptor::argument(
                            "url",
                            ValueShape::Scalar(ScalarType::Uri),
                        )),
                )
                .with_action(
                    ActionDescriptor::new("remove")
                        .with_alias("rm")
                        .with_parameter(ParameterDescriptor::argument("name", ValueShape::default())),
                ),
        )
        .with_command(
            CommandNode::new("clone").with_action(
                ActionDescriptor::new("run")
                    .primary()
                    .asynchronous()
                    .with_parameter(ParameterDescriptor::argument(
                        "url",
                        ValueShape::Scalar(ScalarType::Uri),
                    ))
                    .with_parameter(
                        ParameterDescriptor::argument("dir", ValueShape::Scalar(ScalarType::Path))
                            .optional(),
                    )
                    .with_parameter(
                        ParameterDescriptor::option("depth", ValueShape::Scalar(ScalarType::U32))
                            .with_default("20")
                            .with_rule(ValidationRule::range(1.0, 1000.0)),
                    )
                    .with_parameter(
                        ParameterDescriptor::option("jobs", ValueShape::Scalar(ScalarType::U8))
                            .short('j')
                            .with_env("GITCLI_JOBS")
                            .with_default("4"),
                    )
                    .with_parameter(ParameterDescriptor::injected("progress", "progress"))
                    .with_hook(HookDescriptor::on_error("report_clone", 0)),
            ),
        )
        .with_command(
            CommandNode::new("login").with_action(
                ActionDescriptor::new("run").primary().with_parameter(
                    ParameterDescriptor::option("token", ValueShape::default())
                        .required()
                        .with_env("GITCLI_TOKEN")
                        .with_prompt("Access token")
                        .secure()
                        .with_rule(
                            ValidationRule::pattern("[A-Za-z0-9]{3,}")
                                .with_message("tokens are at least three letters or digits"),
                        ),
                ),
            ),
        )
        .with_command(
            CommandNode::new("status").with_action(ActionDescriptor::new("show").primary()),
        )
}

async fn list_remotes(remotes: Remotes, ctx: ActionContext) -> Result<ActionOutcome, ActionError> {
    let verbose = ctx.invocation.arguments.flag("verbose");
    let remotes = remotes
        .lock()
        .map_err(|_| ActionError::failure("remote table is unavailable"))?;
    for (name, url) in remotes.iter() {
        if verbose {
            println!("{name}\t{url}");
        } else {
            println!("{name}");
        }
    }
    Ok(ActionOutcome::Unit)
}

async fn add_remote(remotes: Remotes, ctx: ActionContext) -> Result<ActionOutcome, ActionError> {
    let args = &ctx.invocation.arguments;
    let name = args.str("name").unwrap_or_default().to_string();
    let url = args.value("url").map(ToString::to_string).unwrap_or_default();
    let mut remotes = remotes
        .lock()
        .map_err(|_| ActionError::failure("remote table is unavailable"))?;
    if remotes.contains_key(&name) {
        return Err(ActionError::new(
            "exists",
            format!("remote '{name}' already exists"),
        ));
    }
    remotes.insert(name, url);
    Ok(ActionOutcome::Unit)
}

async fn remove_remote(remotes: Remotes, ctx: ActionContext) -> Result<ActionOutcome, ActionError> {
    let name = ctx.invocation.arguments.str("name").unwrap_or_default();
    let mut remotes = remotes
        .lock()
        .map_err(|_| ActionError::failure("remote table is unavailable"))?;
    match remotes.remove(name) {
        Some(_) => Ok(ActionOutcome::Unit),
        None => Err(ActionError::new(
            "not_found",
            format!("no such remote '{name}'"),
        )),
    }
}

async fn clone_repo(ctx: ActionContext) -> Result<ActionOutcome, ActionError> {
    let args = &ctx.invocation.arguments;
    let depth = args.i64("depth").unwrap_or(20).max(0) as u64;
    let jobs = args.i64("jobs").unwrap_or(1);
    let progress = ctx
        .context::<Progress>("progress")
        .ok_or_else(|| ActionError::failure("progress context missing"))?;

    println!(
        "cloning {} with {jobs} job(s)",
        args.value("url").map(ToString::to_string).unwrap_or_default()
    );
    for _ in 0..depth {
        tokio::select! {
            _ = ctx.cancel.cancelled() => return Err(ActionError::cancelled()),
            _ = tokio::time::sleep(Duration::from_millis(50)) => {}
        }
        progress.fetched.fetch_add(1, Ordering::Relaxed);
    }
    println!("fetched {} object(s)", progress.fetched.load(Ordering::Relaxed));
    Ok(ActionOutcome::Unit)
}

async fn login(ctx: ActionContext) -> Result<ActionOutcome, ActionError> {
    let token = ctx.invocation.arguments.str("token").unwrap_or_default();
    if token == "expired" {
        return Err(ActionError::new("auth", "token has expired"));
    }
    println!("logged in");
    Ok(ActionOutcome::Success)
}

fn audit(ctx: HookContext) -> HookSignal {
    info!(action = %ctx.invocation.action_path(), "audit");
    HookSignal::Continue
}

fn registry(remotes: &Remotes) -> HandlerRegistry {
    let list = Arc::clone(remotes);
    let add = Arc::clone(remotes);
    let remove = Arc::clone(remotes);
    let saved = Arc::clone(remotes);
    let status = status_enum();

    HandlerRegistry::default()
        .with_action_fn("remote list", move |ctx| list_remotes(Arc::clone(&list), ctx))
        .with_action_fn("remote add", move |ctx| add_remote(Arc::clone(&add), ctx))
        .with_action_fn("remote remove", move |ctx| remove_remote(Arc::clone(&remove), ctx))
        .with_action_fn("clone run", clone_repo)
        .with_action_fn("login run", login)
        .with_action_fn("status show", move |_ctx| {
            let outcome = ActionOutcome::member(&status, "dirty").unwrap_or(ActionOutcome::Failure);
            async move { Ok(outcome) }
        })
        .with_hook_fn("audit", |ctx| {
            let signal = audit(ctx);
            async move { Ok(signal) }
        })
        .with_hook_fn("save_remotes", move |_ctx| {
            let count = saved.lock().map(|r| r.len()).unwrap_or_default();
            info!(count, "remotes saved");
            async { Ok(HookSignal::Continue) }
        })
        .with_hook_fn("report_clone", |ctx| {
            if let Some(err) = &ctx.error {
                eprintln!("clone aborted: {err}");
            }
            async { Ok(HookSignal::Continue) }
        })
        .with_help(TextHelp)
}

/// Prints the commands and actions under the requested node.
struct TextHelp;

impl HelpRenderer for TextHelp {
    fn render(&self, tree: &CommandTree, target: &HelpTarget) {
        let path: Vec<&str> = target.path.iter().map(String::as_str).collect();
        let Some(node) = tree.find_path(&path) else {
            return;
        };
        let mut heading = vec![tree.name()];
        heading.extend(path.iter().copied());
        println!("usage: {} <command>", heading.join(" "));

        if let Some(action) = target.action.as_deref().and_then(|a| node.find_action(a)) {
            println!("\n{}", action.description.as_deref().unwrap_or(&action.name));
            for param in action.leaf_parameters() {
                println!("  {}", param.display_name());
            }
            return;
        }
        for child in &node.children {
            println!("  {:<12}{}", child.name, child.description.as_deref().unwrap_or(""));
        }
        for action in &node.actions {
            let marker = if action.primary { " (default)" } else { "" };
            println!("  {:<12}{}", action.name, marker);
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let remotes: Remotes = Arc::new(Mutex::new(BTreeMap::from([(
        "origin".to_string(),
        "https://example.com/gitcli".to_string(),
    )])));

    let dispatcher = match Dispatcher::builder(tree())
        .registry(registry(&remotes))
        .context("progress", Progress::default())
        .build()
    {
        Ok(dispatcher) => dispatcher,
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    };

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let code = dispatcher.run(std::env::args().skip(1), cancel).await;
    std::process::exit(code);
}
