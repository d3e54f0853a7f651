use std::sync::{Arc, Mutex};
use std::time::Duration;

use command_dispatch::{
    ActionError, ActionOutcome, Completion, DispatchConfig, DispatchError, Dispatcher,
    HandlerRegistry, HelpRenderer, HelpTarget, HookContext, HookSignal, InvocationState,
    MapEnvironment, PipelineState, Prepared, ScriptedPrompter, TypedValue, ValueSource,
};
use command_dispatch_core::*;
use tokio_util::sync::CancellationToken;

type Log = Arc<Mutex<Vec<String>>>;

fn new_log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// Registers a hook that appends `label` to `log` and answers `signal`.
fn recording_hook(
    registry: HandlerRegistry,
    name: &str,
    log: &Log,
    signal: HookSignal,
) -> HandlerRegistry {
    let log = Arc::clone(log);
    let label = name.to_string();
    registry.with_hook_fn(name, move |_ctx: HookContext| {
        log.lock().unwrap().push(label.clone());
        async move { Ok(signal) }
    })
}

/// Registers a hook that appends `label` and then raises `kind`.
fn failing_hook(registry: HandlerRegistry, name: &str, log: &Log, kind: &str) -> HandlerRegistry {
    let log = Arc::clone(log);
    let label = name.to_string();
    let kind = kind.to_string();
    registry.with_hook_fn(name, move |_ctx: HookContext| {
        log.lock().unwrap().push(label.clone());
        let err = ActionError::new(kind.clone(), format!("{label} failed"));
        async move { Err(err) }
    })
}

fn recording_action(registry: HandlerRegistry, path: &str, log: &Log) -> HandlerRegistry {
    let log = Arc::clone(log);
    registry.with_action_fn(path, move |_ctx| {
        log.lock().unwrap().push("action".to_string());
        async { Ok(ActionOutcome::Unit) }
    })
}

fn dispatcher(tree: CommandTree, registry: HandlerRegistry) -> Dispatcher {
    Dispatcher::builder(tree)
        .registry(registry)
        .environment(MapEnvironment::default())
        .without_prompter()
        .build()
        .unwrap()
}

// ---------------------------------------------------------------------------
// Resolution and binding
// ---------------------------------------------------------------------------

fn demo_tree() -> CommandTree {
    CommandTree::new("demo")
        .with_command(
            CommandNode::new("validate").with_action(
                ActionDescriptor::new("connect").with_parameter(
                    ParameterDescriptor::option("port", ValueShape::Scalar(ScalarType::U16))
                        .with_rule(ValidationRule::range(1.0, 65535.0)),
                ),
            ),
        )
        .with_command(
            CommandNode::new("gitcli").with_child(
                CommandNode::new("remote").with_action(
                    ActionDescriptor::new("add")
                        .with_parameter(ParameterDescriptor::argument("name", ValueShape::default()))
                        .with_parameter(ParameterDescriptor::argument(
                            "url",
                            ValueShape::Scalar(ScalarType::Uri),
                        )),
                ),
            ),
        )
}

#[tokio::test]
async fn port_zero_fails_range_rule() {
    let dispatcher = dispatcher(demo_tree(), HandlerRegistry::default());
    let outcome = dispatcher
        .dispatch(["validate", "connect", "--port", "0"], CancellationToken::new())
        .await;

    assert_eq!(outcome.exit_code, 2);
    let Completion::Rejected(DispatchError::Validation(err)) = &outcome.completion else {
        panic!("expected a validation error, got {:?}", outcome.completion);
    };
    assert_eq!(err.parameter, "port");
    assert!(err.message.contains("value 0"));
    assert!(err.message.contains("[1, 65535]"));
    assert_eq!(
        outcome.phases,
        vec![
            InvocationState::Resolving,
            InvocationState::Binding,
            InvocationState::Validating,
            InvocationState::Failed,
        ]
    );
    assert!(outcome.trace.is_empty());
}

#[tokio::test]
async fn port_bounds_pass() {
    let dispatcher = dispatcher(demo_tree(), HandlerRegistry::default());
    for port in ["1", "65535"] {
        let prepared = dispatcher
            .prepare(["validate", "connect", "--port", port], &CancellationToken::new())
            .await;
        assert!(prepared.is_ok(), "port {port} should pass");
    }
}

#[tokio::test]
async fn nested_remote_add_binds_positionals() {
    let dispatcher = dispatcher(demo_tree(), HandlerRegistry::default());
    let prepared = dispatcher
        .prepare(
            ["gitcli", "remote", "add", "origin", "https://x"],
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let Prepared::Invocation(invocation) = prepared else {
        panic!("expected an invocation");
    };
    assert_eq!(invocation.path, vec!["gitcli", "remote"]);
    assert_eq!(invocation.action.name, "add");
    assert_eq!(invocation.action_path(), "gitcli remote add");
    assert_eq!(invocation.arguments.str("name"), Some("origin"));
    assert_eq!(
        invocation.arguments.value("url"),
        Some(&TypedValue::Uri("https://x".to_string()))
    );
}

#[tokio::test]
async fn unknown_command_and_action_are_usage_errors() {
    let dispatcher = dispatcher(demo_tree(), HandlerRegistry::default());

    let outcome = dispatcher.dispatch(["deploy"], CancellationToken::new()).await;
    assert_eq!(outcome.exit_code, 2);
    assert_eq!(outcome.error().as_deref(), Some("unknown command 'deploy'"));

    let outcome = dispatcher
        .dispatch(["gitcli", "remote", "rename"], CancellationToken::new())
        .await;
    assert_eq!(
        outcome.error().as_deref(),
        Some("unknown action 'rename' for command 'demo gitcli remote'")
    );
}

#[tokio::test]
async fn collection_forms_bind_identically() {
    let tree = CommandTree::new("app").with_action(
        ActionDescriptor::new("tag").with_parameter(
            ParameterDescriptor::option(
                "tag",
                ValueShape::Collection(ElementShape::Scalar(ScalarType::String)),
            )
            .short('t'),
        ),
    );
    let dispatcher = dispatcher(tree, HandlerRegistry::default());
    let cancel = CancellationToken::new();

    let mut bound = Vec::new();
    for args in [
        vec!["tag", "--tag", "a", "--tag", "b"],
        vec!["tag", "--tag", "a,b"],
        vec!["tag", "-t", "a", "-tb"],
    ] {
        let Prepared::Invocation(invocation) = dispatcher.prepare(args, &cancel).await.unwrap()
        else {
            panic!("expected an invocation");
        };
        bound.push(invocation.arguments.value("tag").cloned());
    }

    let expected = Some(TypedValue::List(vec![
        TypedValue::Str("a".to_string()),
        TypedValue::Str("b".to_string()),
    ]));
    assert!(bound.iter().all(|value| *value == expected));
}

#[tokio::test]
async fn optional_fallbacks_never_fail_validation() {
    let tree = CommandTree::new("app").with_action(
        ActionDescriptor::new("serve")
            .with_parameter(
                ParameterDescriptor::option("port", ValueShape::Scalar(ScalarType::U16))
                    .with_env("APP_PORT")
                    .with_default("8080")
                    .with_rule(ValidationRule::range(1024.0, 65535.0)),
            )
            .with_parameter(
                ParameterDescriptor::option("host", ValueShape::default())
                    .with_rule(ValidationRule::pattern("[a-z.]+")),
            ),
    );
    let cancel = CancellationToken::new();

    let plain = dispatcher(tree.clone(), HandlerRegistry::default());
    let Ok(Prepared::Invocation(invocation)) = plain.prepare(["serve"], &cancel).await else {
        panic!("expected an invocation");
    };
    assert_eq!(invocation.arguments.i64("port"), Some(8080));
    assert_eq!(invocation.arguments.source("port"), Some(ValueSource::Default));
    assert!(!invocation.arguments.contains("host"));

    let with_env = Dispatcher::builder(tree)
        .environment(MapEnvironment::default().with("APP_PORT", "9000"))
        .without_prompter()
        .build()
        .unwrap();
    let Ok(Prepared::Invocation(invocation)) = with_env.prepare(["serve"], &cancel).await else {
        panic!("expected an invocation");
    };
    assert_eq!(invocation.arguments.i64("port"), Some(9000));
    assert_eq!(
        invocation.arguments.source("port"),
        Some(ValueSource::Environment)
    );
}

#[tokio::test]
async fn prompt_fills_missing_secret() {
    let tree = CommandTree::new("app").with_action(
        ActionDescriptor::new("login").with_parameter(
            ParameterDescriptor::option("token", ValueShape::default())
                .required()
                .with_prompt("Token")
                .secure(),
        ),
    );
    let dispatcher = Dispatcher::builder(tree)
        .environment(MapEnvironment::default())
        .prompter(ScriptedPrompter::new(["abc123"]))
        .build()
        .unwrap();

    let Ok(Prepared::Invocation(invocation)) =
        dispatcher.prepare(["login"], &CancellationToken::new()).await
    else {
        panic!("expected an invocation");
    };
    assert_eq!(invocation.arguments.str("token"), Some("abc123"));
    assert_eq!(invocation.arguments.source("token"), Some(ValueSource::Prompt));
}

#[tokio::test]
async fn path_rule_applies_to_environment_values() {
    let dir = tempfile::tempdir().unwrap();
    let tree = CommandTree::new("app").with_action(
        ActionDescriptor::new("build").with_parameter(
            ParameterDescriptor::option("out", ValueShape::Scalar(ScalarType::Path))
                .with_env("OUT_DIR")
                .with_rule(ValidationRule::directory_exists()),
        ),
    );
    let cancel = CancellationToken::new();

    let good = Dispatcher::builder(tree.clone())
        .environment(MapEnvironment::default().with("OUT_DIR", dir.path().to_string_lossy()))
        .build()
        .unwrap();
    assert!(good.prepare(["build"], &cancel).await.is_ok());

    let missing = dir.path().join("nope");
    let bad = Dispatcher::builder(tree)
        .environment(MapEnvironment::default().with("OUT_DIR", missing.to_string_lossy()))
        .build()
        .unwrap();
    let err = bad.prepare(["build"], &cancel).await.unwrap_err();
    assert!(matches!(err, DispatchError::Validation(_)));
    assert!(err.to_string().contains("does not exist"));
}

#[tokio::test]
async fn exclusive_members_conflict() {
    let tree = CommandTree::new("app").with_action(
        ActionDescriptor::new("show")
            .with_parameter(ParameterDescriptor::switch("json").exclusive_in("output"))
            .with_parameter(ParameterDescriptor::switch("yaml").exclusive_in("output"))
            .with_parameter(ParameterDescriptor::switch("verbose").short('v')),
    );
    let log = new_log();
    let dispatcher = dispatcher(tree, recording_action(HandlerRegistry::default(), "show", &log));

    let outcome = dispatcher
        .dispatch(["show", "--json", "--yaml"], CancellationToken::new())
        .await;
    assert_eq!(outcome.exit_code, 2);
    assert_eq!(
        outcome.error().as_deref(),
        Some("--json, --yaml cannot be used together (mutually exclusive set 'output')")
    );

    let outcome = dispatcher
        .dispatch(["show", "--json", "-v"], CancellationToken::new())
        .await;
    assert_eq!(outcome.exit_code, 0);
    assert_eq!(entries(&log), vec!["action"]);
}

#[tokio::test]
async fn pattern_matched_value_binds_unchanged() {
    let tree = CommandTree::new("app").with_action(
        ActionDescriptor::new("serve").with_parameter(
            ParameterDescriptor::option("host", ValueShape::default())
                .with_rule(ValidationRule::pattern("[a-z.]+")),
        ),
    );
    let dispatcher = dispatcher(tree, HandlerRegistry::default());

    let Ok(Prepared::Invocation(invocation)) = dispatcher
        .prepare(["serve", "--host", "api.example.com"], &CancellationToken::new())
        .await
    else {
        panic!("expected an invocation");
    };
    assert_eq!(
        invocation.arguments.value("host"),
        Some(&TypedValue::Str("api.example.com".to_string()))
    );
    assert_eq!(invocation.arguments.source("host"), Some(ValueSource::Argv));
}

#[tokio::test]
async fn oversized_duration_is_a_usage_error() {
    let tree = CommandTree::new("app").with_action(ActionDescriptor::new("wait").with_parameter(
        ParameterDescriptor::option("for", ValueShape::Scalar(ScalarType::Duration)),
    ));
    let dispatcher = dispatcher(tree, HandlerRegistry::default());

    let outcome = dispatcher
        .dispatch(["wait", "--for", "999999999999999999d"], CancellationToken::new())
        .await;
    assert_eq!(outcome.exit_code, 2);
    assert_eq!(
        outcome.error().as_deref(),
        Some("invalid value '999999999999999999d' for 'for': duration is out of range")
    );
}

#[tokio::test]
async fn optional_prompt_without_input_stays_unset() {
    let tree = CommandTree::new("app").with_action(
        ActionDescriptor::new("login").with_parameter(
            ParameterDescriptor::option("user", ValueShape::default()).with_prompt("User"),
        ),
    );
    let log = new_log();
    let dispatcher = Dispatcher::builder(tree)
        .registry(recording_action(HandlerRegistry::default(), "login", &log))
        .environment(MapEnvironment::default())
        .prompter(ScriptedPrompter::new(Vec::<String>::new()))
        .build()
        .unwrap();

    let outcome = dispatcher.dispatch(["login"], CancellationToken::new()).await;
    assert_eq!(outcome.exit_code, 0, "{:?}", outcome.error());
    assert_eq!(entries(&log), vec!["action"]);
}

#[tokio::test]
async fn nan_fails_range_rule() {
    let tree = CommandTree::new("app").with_action(
        ActionDescriptor::new("scale").with_parameter(
            ParameterDescriptor::option("ratio", ValueShape::Scalar(ScalarType::F64))
                .with_rule(ValidationRule::range(0.0, 1.0)),
        ),
    );
    let dispatcher = dispatcher(tree, HandlerRegistry::default());
    let cancel = CancellationToken::new();

    let err = dispatcher
        .prepare(["scale", "--ratio", "NaN"], &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::Validation(_)));
    assert!(dispatcher.prepare(["scale", "--ratio", "0.25"], &cancel).await.is_ok());
}

// ---------------------------------------------------------------------------
// Hook pipeline
// ---------------------------------------------------------------------------

fn hooked_tree(action: ActionDescriptor) -> CommandTree {
    CommandTree::new("app").with_command(CommandNode::new("job").with_action(action))
}

#[tokio::test]
async fn before_hooks_run_in_ascending_order() {
    let log = new_log();
    let tree = hooked_tree(
        ActionDescriptor::new("run")
            .with_hook(HookDescriptor::before("three", 3))
            .with_hook(HookDescriptor::before("one", 1))
            .with_hook(HookDescriptor::before("two", 2))
            .with_hook(HookDescriptor::after("after", 0)),
    );
    let mut registry = recording_action(HandlerRegistry::default(), "job run", &log);
    for name in ["one", "two", "three", "after"] {
        registry = recording_hook(registry, name, &log, HookSignal::Continue);
    }

    let outcome = dispatcher(tree, registry)
        .dispatch(["job", "run"], CancellationToken::new())
        .await;

    assert_eq!(outcome.exit_code, 0);
    assert_eq!(entries(&log), vec!["one", "two", "three", "action", "after"]);
    assert_eq!(
        outcome.trace,
        vec![
            PipelineState::Idle,
            PipelineState::BeforeRunning,
            PipelineState::Invoking,
            PipelineState::AfterRunning,
            PipelineState::Completed,
        ]
    );
    assert_eq!(outcome.action.as_deref(), Some("job run"));
}

#[tokio::test]
async fn command_hooks_precede_action_hooks_at_equal_order() {
    let log = new_log();
    let tree = CommandTree::new("app")
        .with_hook(HookDescriptor::before("root", 0))
        .with_command(
            CommandNode::new("job")
                .with_hook(HookDescriptor::before("command", 0))
                .with_action(ActionDescriptor::new("run").with_hook(HookDescriptor::before("own", 0))),
        );
    let mut registry = recording_action(HandlerRegistry::default(), "job run", &log);
    for name in ["own", "command", "root"] {
        registry = recording_hook(registry, name, &log, HookSignal::Continue);
    }

    dispatcher(tree, registry)
        .dispatch(["job", "run"], CancellationToken::new())
        .await;
    assert_eq!(entries(&log), vec!["root", "command", "own", "action"]);
}

#[tokio::test]
async fn cancelling_before_hook_skips_action_and_error_hooks() {
    let log = new_log();
    let tree = hooked_tree(
        ActionDescriptor::new("run")
            .with_hook(HookDescriptor::before("gate", 0))
            .with_hook(HookDescriptor::before("later", 1))
            .with_hook(HookDescriptor::after("after", 0))
            .with_hook(HookDescriptor::on_error("report", 0)),
    );
    let registry = recording_action(HandlerRegistry::default(), "job run", &log);
    let registry = recording_hook(registry, "gate", &log, HookSignal::Cancel);
    let registry = recording_hook(registry, "later", &log, HookSignal::Continue);
    let registry = recording_hook(registry, "after", &log, HookSignal::Continue);
    let registry = recording_hook(registry, "report", &log, HookSignal::Continue);

    let outcome = dispatcher(tree, registry)
        .dispatch(["job", "run"], CancellationToken::new())
        .await;

    assert_eq!(outcome.exit_code, 130);
    assert!(matches!(outcome.completion, Completion::Cancelled));
    assert_eq!(entries(&log), vec!["gate"]);
    assert_eq!(
        outcome.trace,
        vec![
            PipelineState::Idle,
            PipelineState::BeforeRunning,
            PipelineState::Completed,
        ]
    );
}

#[tokio::test]
async fn raising_before_hook_runs_every_error_hook() {
    let log = new_log();
    let tree = hooked_tree(
        ActionDescriptor::new("run")
            .with_hook(HookDescriptor::before("auth", 0))
            .with_hook(HookDescriptor::on_error("second", 2))
            .with_hook(HookDescriptor::on_error("first", 1))
            .map_error("denied", 77),
    );
    let registry = recording_action(HandlerRegistry::default(), "job run", &log);
    let registry = failing_hook(registry, "auth", &log, "denied");
    let registry = failing_hook(registry, "first", &log, "report_failed");
    let registry = recording_hook(registry, "second", &log, HookSignal::Continue);

    let outcome = dispatcher(tree, registry)
        .dispatch(["job", "run"], CancellationToken::new())
        .await;

    assert_eq!(entries(&log), vec!["auth", "first", "second"]);
    assert_eq!(outcome.exit_code, 77);
    let Completion::Failed(err) = &outcome.completion else {
        panic!("expected failure");
    };
    assert_eq!(err.kind(), "denied");
    assert_eq!(outcome.error().as_deref(), Some("auth failed"));
    assert!(outcome.trace.contains(&PipelineState::ErrorRunning));
    assert!(!outcome.trace.contains(&PipelineState::Invoking));
}

#[tokio::test]
async fn error_hooks_see_the_action_error() {
    let seen = new_log();
    let tree = hooked_tree(ActionDescriptor::new("run").with_hook(HookDescriptor::on_error("observe", 0)));
    let seen_by_hook = Arc::clone(&seen);
    let registry = HandlerRegistry::default()
        .with_action_fn("job run", |_ctx| async {
            Err(ActionError::new("io", "disk full"))
        })
        .with_hook_fn("observe", move |ctx: HookContext| {
            let message = ctx.error.map(|e| format!("{:?}:{}", ctx.phase, e)).unwrap_or_default();
            seen_by_hook.lock().unwrap().push(message);
            async { Ok(HookSignal::Continue) }
        });

    let outcome = dispatcher(tree, registry)
        .dispatch(["job", "run"], CancellationToken::new())
        .await;
    assert_eq!(outcome.exit_code, 1);
    assert_eq!(entries(&seen), vec!["OnError:disk full"]);
}

#[tokio::test]
async fn after_hook_failure_routes_to_error_phase() {
    let log = new_log();
    let tree = hooked_tree(
        ActionDescriptor::new("run")
            .with_hook(HookDescriptor::after("flush", 0))
            .with_hook(HookDescriptor::after("never", 1))
            .with_hook(HookDescriptor::on_error("report", 0)),
    );
    let registry = recording_action(HandlerRegistry::default(), "job run", &log);
    let registry = failing_hook(registry, "flush", &log, "io");
    let registry = recording_hook(registry, "never", &log, HookSignal::Continue);
    let registry = recording_hook(registry, "report", &log, HookSignal::Continue);

    let outcome = dispatcher(tree, registry)
        .dispatch(["job", "run"], CancellationToken::new())
        .await;
    assert_eq!(entries(&log), vec!["action", "flush", "report"]);
    assert_eq!(outcome.exit_code, 1);
    assert_eq!(
        outcome.trace,
        vec![
            PipelineState::Idle,
            PipelineState::BeforeRunning,
            PipelineState::Invoking,
            PipelineState::AfterRunning,
            PipelineState::ErrorRunning,
            PipelineState::Completed,
        ]
    );
}

#[tokio::test]
async fn missing_hook_handler_is_reported() {
    let tree = hooked_tree(ActionDescriptor::new("run").with_hook(HookDescriptor::before("ghost", 0)));
    let log = new_log();
    let outcome = dispatcher(tree, recording_action(HandlerRegistry::default(), "job run", &log))
        .dispatch(["job", "run"], CancellationToken::new())
        .await;
    assert_eq!(outcome.exit_code, 1);
    assert_eq!(
        outcome.error().as_deref(),
        Some("no hook handler registered under 'ghost'")
    );
    assert!(entries(&log).is_empty());
}

// ---------------------------------------------------------------------------
// Exit codes and cancellation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn exit_codes_follow_outcomes_and_maps() {
    let status = EnumSpec::new("Status", [("Clean", 0), ("Dirty", 3)]);
    let tree = CommandTree::new("app").map_error("auth", 77).with_command(
        CommandNode::new("repo")
            .map_error("io", 74)
            .with_action(ActionDescriptor::new("status"))
            .with_action(ActionDescriptor::new("pull").map_error("io", 75))
            .with_action(ActionDescriptor::new("push"))
            .with_action(ActionDescriptor::new("login"))
            .with_action(ActionDescriptor::new("gc")),
    );
    let registry = HandlerRegistry::default()
        .with_action_fn("repo status", move |_ctx| {
            let dirty = ActionOutcome::member(&status, "dirty");
            async move { dirty.ok_or_else(|| ActionError::failure("no such member")) }
        })
        .with_action_fn("repo pull", |_ctx| async { Err(ActionError::new("io", "net down")) })
        .with_action_fn("repo push", |_ctx| async { Err(ActionError::new("io", "net down")) })
        .with_action_fn("repo login", |_ctx| async { Err(ActionError::new("auth", "denied")) })
        .with_action_fn("repo gc", |_ctx| async { Err(ActionError::new("weird", "?")) });
    let dispatcher = dispatcher(tree, registry);

    for (action, expected) in [("status", 3), ("pull", 75), ("push", 74), ("login", 77), ("gc", 1)] {
        let outcome = dispatcher
            .dispatch(["repo", action], CancellationToken::new())
            .await;
        assert_eq!(outcome.exit_code, expected, "repo {action}");
    }
}

#[tokio::test]
async fn cancellation_signal_interrupts_action() {
    let log = new_log();
    let tree = hooked_tree(
        ActionDescriptor::new("run")
            .asynchronous()
            .with_hook(HookDescriptor::after("after", 0))
            .with_hook(HookDescriptor::on_error("report", 0)),
    );
    let registry = HandlerRegistry::default()
        .with_action_fn("job run", |_ctx| async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(ActionOutcome::Unit)
        });
    let registry = recording_hook(registry, "after", &log, HookSignal::Continue);
    let registry = recording_hook(registry, "report", &log, HookSignal::Continue);

    let dispatcher = Dispatcher::builder(tree)
        .registry(registry)
        .environment(MapEnvironment::default())
        .config(DispatchConfig::from_yaml_str("exit_codes:\n  cancelled: 99\n").unwrap())
        .build()
        .unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let outcome = dispatcher.dispatch(["job", "run"], cancel).await;
    assert_eq!(outcome.exit_code, 99);
    assert!(matches!(outcome.completion, Completion::Cancelled));
    assert!(entries(&log).is_empty());
}

#[tokio::test]
async fn action_reporting_cancellation_maps_to_cancel_code() {
    let tree = hooked_tree(ActionDescriptor::new("run"));
    let registry = HandlerRegistry::default()
        .with_action_fn("job run", |_ctx| async { Err(ActionError::cancelled()) });
    let outcome = dispatcher(tree, registry)
        .dispatch(["job", "run"], CancellationToken::new())
        .await;
    assert_eq!(outcome.exit_code, 130);
    assert_eq!(outcome.error(), None);
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
struct CapturingHelp {
    seen: Arc<Mutex<Vec<HelpTarget>>>,
}

impl HelpRenderer for CapturingHelp {
    fn render(&self, _tree: &CommandTree, target: &HelpTarget) {
        self.seen.lock().unwrap().push(target.clone());
    }
}

#[tokio::test]
async fn help_is_handed_to_renderer() {
    let help = CapturingHelp::default();
    let registry = HandlerRegistry::default().with_help(help.clone());
    let dispatcher = dispatcher(demo_tree(), registry);

    let outcome = dispatcher
        .dispatch(["gitcli", "remote", "add", "--help"], CancellationToken::new())
        .await;
    assert_eq!(outcome.exit_code, 0);
    assert!(matches!(outcome.completion, Completion::Help(_)));
    assert_eq!(
        help.seen.lock().unwrap().as_slice(),
        &[HelpTarget {
            path: vec!["gitcli".to_string(), "remote".to_string()],
            action: Some("add".to_string()),
        }]
    );
}

#[tokio::test]
async fn missing_action_handler_is_a_failure() {
    let outcome = dispatcher(demo_tree(), HandlerRegistry::default())
        .dispatch(["gitcli", "remote", "add", "o", "https://x"], CancellationToken::new())
        .await;
    assert_eq!(outcome.exit_code, 1);
    assert_eq!(
        outcome.error().as_deref(),
        Some("no handler registered for action 'gitcli remote add'")
    );
}

#[tokio::test]
async fn injected_context_reaches_handler() {
    struct Progress {
        total: u32,
    }

    let tree = hooked_tree(
        ActionDescriptor::new("run")
            .with_parameter(ParameterDescriptor::injected("progress", "progress_reporter")),
    );
    let registry = HandlerRegistry::default().with_action_fn("job run", |ctx| async move {
        let total = ctx.context::<Progress>("progress").map_or(0, |p| p.total);
        Ok(ActionOutcome::Code(total as i32))
    });

    let with_context = Dispatcher::builder(tree.clone())
        .registry(registry.clone())
        .context("progress_reporter", Progress { total: 5 })
        .build()
        .unwrap();
    assert_eq!(with_context.run(["job", "run"], CancellationToken::new()).await, 5);

    let without = dispatcher(tree, registry);
    assert_eq!(without.run(["job", "run"], CancellationToken::new()).await, 2);
}

#[test]
fn invalid_tree_is_rejected_at_build() {
    let tree = CommandTree::new("app").with_action(
        ActionDescriptor::new("run")
            .with_parameter(ParameterDescriptor::argument("a", ValueShape::default()).optional())
            .with_parameter(ParameterDescriptor::argument("b", ValueShape::default())),
    );
    let err = Dispatcher::builder(tree).build().unwrap_err();
    assert!(matches!(err, DispatchError::InvalidTree(ref errors) if errors.len() == 1));
}

#[test]
fn run_blocking_reuses_the_dispatcher() {
    let log = new_log();
    let tree = hooked_tree(ActionDescriptor::new("run").primary());
    let dispatcher = dispatcher(tree, recording_action(HandlerRegistry::default(), "job run", &log));
    assert_eq!(dispatcher.run_blocking(["job"]), 0);
    assert_eq!(dispatcher.run_blocking(["job", "run"]), 0);
    assert_eq!(entries(&log).len(), 2);
}
