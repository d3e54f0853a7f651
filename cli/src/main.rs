use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use command_dispatch::{
    BoundArguments, DispatchConfig, Dispatcher, MapEnvironment, Prepared, ProcessEnvironment,
    ordered_hooks,
};
use command_dispatch_core::{CommandTree, HookKind, TreeDocument, validate_document, validate_tree};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;
use tracing::debug;

const PACKAGE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Output format for `describe`.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliOutputFormat {
    Json,
    Yaml,
}

#[derive(Debug, Parser)]
#[command(name = "dispatch-probe")]
#[command(about = "Offline checks and dry runs for command trees")]
struct Cli {
    /// Log engine decisions to stderr.
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Check one or more tree definitions for structural errors.
    Check(CheckArgs),
    /// Wrap a tree in a versioned document for help or completion tools.
    Describe(DescribeArgs),
    /// Resolve and bind an argument vector without invoking anything.
    Bind(BindArgs),
}

#[derive(Debug, Args)]
struct CheckArgs {
    /// Tree files (.json, .yaml or .yml), bare trees or documents.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
}

#[derive(Debug, Args)]
struct DescribeArgs {
    /// Tree file.
    tree: PathBuf,
    /// Document version.
    #[arg(long, default_value = PACKAGE_VERSION)]
    version: String,
    /// Optional application name metadata.
    #[arg(long)]
    name: Option<String>,
    /// Optional application description metadata.
    #[arg(long)]
    description: Option<String>,
    /// Write to this path instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,
    #[arg(long, default_value = "json")]
    format: CliOutputFormat,
}

#[derive(Debug, Args)]
struct BindArgs {
    /// Tree file.
    tree: PathBuf,
    /// Dispatch configuration YAML.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Environment variable visible to binding (NAME=VALUE, repeatable).
    #[arg(long = "env", value_name = "NAME=VALUE")]
    env: Vec<String>,
    /// Read fallbacks from the real process environment instead.
    #[arg(long, conflicts_with = "env")]
    inherit_env: bool,
    /// Supply an injected context as text (TYPE=VALUE, repeatable).
    #[arg(long = "context", value_name = "TYPE=VALUE")]
    contexts: Vec<String>,
    /// Argument vector to bind, after `--`.
    #[arg(last = true)]
    args: Vec<String>,
}

/// A tree file holds either a bare tree or a full document.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TreeFile {
    Document(TreeDocument),
    Tree(CommandTree),
}

impl TreeFile {
    fn into_tree(self) -> CommandTree {
        match self {
            TreeFile::Document(doc) => doc.tree,
            TreeFile::Tree(tree) => tree,
        }
    }
}

/// What `bind` prints on success.
#[derive(Debug, Serialize)]
struct BindReport<'a> {
    path: &'a [String],
    action: &'a str,
    arguments: &'a BoundArguments,
    hooks: HookPlan,
}

#[derive(Debug, Serialize)]
struct HookPlan {
    before: Vec<String>,
    after: Vec<String>,
    on_error: Vec<String>,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Command::Check(args) => run_check(args),
        Command::Describe(args) => run_describe(args),
        Command::Bind(args) => run_bind(args),
    };

    if let Err(failure) = result {
        eprintln!("error: {}", failure.message);
        std::process::exit(failure.code);
    }
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(fallback)),
        )
        .init();
}

/// Error message plus the process exit code it maps to.
#[derive(Debug)]
struct Failure {
    message: String,
    code: i32,
}

impl From<String> for Failure {
    fn from(message: String) -> Self {
        Self { message, code: 1 }
    }
}

fn run_check(args: CheckArgs) -> Result<(), Failure> {
    let mut problems = Vec::new();
    let mut commands = 0usize;

    for path in &args.inputs {
        let errors = match read_tree_file(path)? {
            TreeFile::Document(doc) => {
                commands += doc.command_count();
                validate_document(&doc)
            }
            TreeFile::Tree(tree) => {
                commands += tree.root().children.len();
                validate_tree(&tree)
            }
        };
        for err in errors {
            problems.push(format!("{}: {err}", path.display()));
        }
    }

    if !problems.is_empty() {
        for problem in &problems {
            eprintln!("  {problem}");
        }
        return Err(format!("{} definition error(s)", problems.len()).into());
    }

    println!(
        "Checked {} tree file(s) with {commands} top-level command(s).",
        args.inputs.len()
    );
    Ok(())
}

fn run_describe(args: DescribeArgs) -> Result<(), Failure> {
    let tree = read_tree_file(&args.tree)?.into_tree();
    let errors = validate_tree(&tree);
    if let Some(first) = errors.first() {
        return Err(format!("'{}' is not a valid tree: {first}", args.tree.display()).into());
    }
    let hash = bundle_hash(&tree)?;
    let mut doc = TreeDocument::new(args.version, chrono::Utc::now().to_rfc3339(), tree);
    doc.name = args.name;
    doc.description = args.description;
    doc.bundle_hash = Some(hash);

    let raw = match args.format {
        CliOutputFormat::Json => serde_json::to_string_pretty(&doc)
            .map_err(|err| format!("Failed to serialize document: {err}"))?,
        CliOutputFormat::Yaml => serde_yaml::to_string(&doc)
            .map_err(|err| format!("Failed to serialize document: {err}"))?,
    };

    match args.output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent).map_err(|err| {
                        format!("Failed to create directory '{}': {err}", parent.display())
                    })?;
                }
            }
            fs::write(&path, raw)
                .map_err(|err| format!("Failed to write '{}': {err}", path.display()))?;
            println!(
                "Described {} command(s) into '{}'.",
                doc.command_count(),
                path.display()
            );
        }
        None => println!("{raw}"),
    }
    Ok(())
}

fn run_bind(args: BindArgs) -> Result<(), Failure> {
    let tree = read_tree_file(&args.tree)?.into_tree();
    let config = match &args.config {
        Some(path) => DispatchConfig::load(path)
            .map_err(|err| format!("Failed to load '{}': {err}", path.display()))?,
        None => DispatchConfig::default(),
    };
    let usage = config.exit_codes.usage;

    let mut builder = Dispatcher::builder(tree).config(config).without_prompter();
    builder = if args.inherit_env {
        builder.environment(ProcessEnvironment)
    } else {
        let pairs = args
            .env
            .iter()
            .map(|pair| parse_pair(pair, "--env"))
            .collect::<Result<Vec<_>, _>>()?;
        builder.environment(pairs.into_iter().collect::<MapEnvironment>())
    };
    for pair in &args.contexts {
        let (context_type, value) = parse_pair(pair, "--context")?;
        builder = builder.context(&context_type, value);
    }
    let dispatcher = builder.build().map_err(|err| err.to_string())?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .map_err(|err| format!("Failed to start runtime: {err}"))?;
    let prepared = runtime
        .block_on(dispatcher.prepare(args.args.clone(), &CancellationToken::new()))
        .map_err(|err| Failure {
            message: err.to_string(),
            code: usage,
        })?;

    let invocation = match prepared {
        Prepared::Help(target) => {
            let mut words = target.path.clone();
            words.extend(target.action);
            println!("help requested for '{}'", words.join(" "));
            return Ok(());
        }
        Prepared::Invocation(invocation) => invocation,
    };
    debug!(action = %invocation.action_path(), "bound");

    let chain = dispatcher.tree().chain(&invocation.path);
    let names = |kind| {
        ordered_hooks(&chain, &invocation.action, kind)
            .into_iter()
            .map(|hook| hook.handler)
            .collect::<Vec<_>>()
    };
    let report = BindReport {
        path: &invocation.path,
        action: &invocation.action.name,
        arguments: &invocation.arguments,
        hooks: HookPlan {
            before: names(HookKind::Before),
            after: names(HookKind::After),
            on_error: names(HookKind::OnError),
        },
    };
    let raw = serde_json::to_string_pretty(&report)
        .map_err(|err| format!("Failed to serialize binding: {err}"))?;
    println!("{raw}");
    Ok(())
}

fn read_tree_file(path: &Path) -> Result<TreeFile, String> {
    let raw = fs::read_to_string(path)
        .map_err(|err| format!("Failed to read '{}': {err}", path.display()))?;
    let yaml = matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml" | "yml")
    );
    if yaml {
        serde_yaml::from_str(&raw)
            .map_err(|err| format!("Failed to parse '{}': {err}", path.display()))
    } else {
        serde_json::from_str(&raw)
            .map_err(|err| format!("Failed to parse '{}': {err}", path.display()))
    }
}

/// Hex SHA-256 of the tree's compact JSON form.
fn bundle_hash(tree: &CommandTree) -> Result<String, String> {
    let bytes =
        serde_json::to_vec(tree).map_err(|err| format!("Failed to serialize tree: {err}"))?;
    Ok(format!("{:x}", Sha256::digest(&bytes)))
}

fn parse_pair(raw: &str, flag: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("{flag} expects NAME=VALUE, got '{raw}'")),
    }
}
