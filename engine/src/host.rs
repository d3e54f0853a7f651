//! Host capabilities the binder depends on.
//!
//! Environment lookup and interactive prompting are effectful, so the binder
//! only sees them through [`Environment`] and [`Prompter`]. Tests swap in
//! [`MapEnvironment`] and [`ScriptedPrompter`].

use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::io::{BufRead, Write};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::PromptError;

/// Read access to environment variables.
pub trait Environment: Send + Sync {
    fn var(&self, name: &str) -> Option<String>;
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnvironment;

impl Environment for ProcessEnvironment {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// A pre-resolved environment map.
///
/// # Examples
///
/// ```
/// use command_dispatch::{Environment, MapEnvironment};
///
/// let env = MapEnvironment::default().with("APP_PORT", "9000");
/// assert_eq!(env.var("APP_PORT").as_deref(), Some("9000"));
/// assert!(env.var("HOME").is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct MapEnvironment {
    vars: HashMap<String, String>,
}

impl MapEnvironment {
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }
}

impl Environment for MapEnvironment {
    fn var(&self, name: &str) -> Option<String> {
        self.vars.get(name).cloned()
    }
}

impl From<HashMap<String, String>> for MapEnvironment {
    fn from(vars: HashMap<String, String>) -> Self {
        Self { vars }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MapEnvironment {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Source of interactive answers.
#[async_trait]
pub trait Prompter: Send + Sync {
    /// Shows `text` and reads one line. `secure` masks the input.
    async fn prompt(&self, text: &str, secure: bool) -> Result<String, PromptError>;
}

/// Prompts on the controlling terminal.
///
/// Plain prompts are written to stderr and read from stdin; secure prompts
/// go through `rpassword` so the answer is not echoed.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPrompter;

#[async_trait]
impl Prompter for TerminalPrompter {
    async fn prompt(&self, text: &str, secure: bool) -> Result<String, PromptError> {
        let label = format!("{text}: ");
        tokio::task::spawn_blocking(move || read_terminal(&label, secure))
            .await
            .map_err(|e| PromptError::Io(e.to_string()))?
    }
}

fn read_terminal(label: &str, secure: bool) -> Result<String, PromptError> {
    if secure {
        return rpassword::prompt_password(label).map_err(|e| PromptError::Io(e.to_string()));
    }

    let mut stderr = std::io::stderr();
    write!(stderr, "{label}").map_err(|e| PromptError::Io(e.to_string()))?;
    stderr.flush().map_err(|e| PromptError::Io(e.to_string()))?;

    let mut line = String::new();
    let read = std::io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| PromptError::Io(e.to_string()))?;
    if read == 0 {
        return Err(PromptError::Exhausted);
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Answers prompts from a fixed queue and records what was asked.
///
/// # Examples
///
/// ```
/// use command_dispatch::{Prompter, ScriptedPrompter};
///
/// # tokio_test_block(async {
/// let prompter = ScriptedPrompter::new(["hunter2"]);
/// assert_eq!(prompter.prompt("Password", true).await.unwrap(), "hunter2");
/// assert!(prompter.prompt("Again", false).await.is_err());
/// assert_eq!(prompter.asked(), vec![("Password".to_string(), true), ("Again".to_string(), false)]);
/// # });
/// # fn tokio_test_block(f: impl std::future::Future<Output = ()>) {
/// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: Mutex<VecDeque<String>>,
    asked: Mutex<Vec<(String, bool)>>,
}

impl ScriptedPrompter {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: Mutex::new(answers.into_iter().map(Into::into).collect()),
            asked: Mutex::new(Vec::new()),
        }
    }

    /// Prompt texts seen so far, with their `secure` flag.
    pub fn asked(&self) -> Vec<(String, bool)> {
        self.asked.lock().map(|a| a.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Prompter for ScriptedPrompter {
    async fn prompt(&self, text: &str, secure: bool) -> Result<String, PromptError> {
        if let Ok(mut asked) = self.asked.lock() {
            asked.push((text.to_string(), secure));
        }
        self.answers
            .lock()
            .map_err(|e| PromptError::Io(e.to_string()))?
            .pop_front()
            .ok_or(PromptError::Exhausted)
    }
}

/// Opaque host-supplied values for `InjectedContext` parameters, keyed by
/// the declared context type.
///
/// # Examples
///
/// ```
/// use command_dispatch::ContextValues;
///
/// struct Progress(u8);
///
/// let mut contexts = ContextValues::default();
/// contexts.insert("progress", Progress(40));
/// assert_eq!(contexts.get::<Progress>("progress").map(|p| p.0), Some(40));
/// assert!(contexts.get::<String>("progress").is_none());
/// ```
#[derive(Clone, Default)]
pub struct ContextValues {
    values: HashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl ContextValues {
    pub fn insert<T: Any + Send + Sync>(&mut self, context_type: impl Into<String>, value: T) {
        self.values.insert(context_type.into(), Arc::new(value));
    }

    pub fn with<T: Any + Send + Sync>(mut self, context_type: impl Into<String>, value: T) -> Self {
        self.insert(context_type, value);
        self
    }

    /// Typed access; `None` if absent or of another type.
    pub fn get<T: Any>(&self, context_type: &str) -> Option<&T> {
        self.values.get(context_type)?.downcast_ref::<T>()
    }

    pub fn contains(&self, context_type: &str) -> bool {
        self.values.contains_key(context_type)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl std::fmt::Debug for ContextValues {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<&String> = self.values.keys().collect();
        keys.sort();
        f.debug_struct("ContextValues").field("types", &keys).finish()
    }
}

/// The cancellation signal fired while a suspension point was pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Interrupted;

/// Awaits `fut` unless `cancel` fires first. A signal that is already set
/// wins without polling `fut`.
pub(crate) async fn suspend<F: Future>(
    cancel: &CancellationToken,
    fut: F,
) -> Result<F::Output, Interrupted> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Interrupted),
        out = fut => Ok(out),
    }
}
