//! Parameter binding.
//!
//! Binding runs in two passes. The first sorts the remaining tokens into
//! option occurrences and positional values, expanding short clusters now
//! that each letter's arity is known. The second walks the action's leaf
//! parameters in declaration order and converts whatever each one found,
//! falling back to environment, default and prompt. Container parameters
//! are assembled from their members afterwards.

use std::collections::{HashMap, VecDeque};

use command_dispatch_core::{
    ActionDescriptor, ElementShape, ParameterDescriptor, ParameterKind, ValueShape,
};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::DispatchConfig;
use crate::convert::{convert_enum, convert_flags, convert_scalar, split_list};
use crate::error::{BindError, DispatchError, PromptError};
use crate::host::{ContextValues, Environment, Prompter, suspend};
use crate::registry::HandlerRegistry;
use crate::token::Token;
use crate::value::{BoundArguments, BoundValue, TypedValue, ValueSource};

/// Everything binding reads besides the tokens themselves.
pub(crate) struct Binder<'a> {
    pub config: &'a DispatchConfig,
    pub environment: &'a dyn Environment,
    pub prompter: Option<&'a dyn Prompter>,
    pub registry: &'a HandlerRegistry,
    pub contexts: &'a ContextValues,
    pub cancel: &'a CancellationToken,
}

/// Tokens sorted by the first pass.
#[derive(Debug, Default)]
struct Partition {
    /// Raw values per leaf index, in occurrence order.
    options: HashMap<usize, Vec<String>>,
    positionals: VecDeque<String>,
}

impl Binder<'_> {
    /// Binds `tokens` onto `action`'s parameters.
    pub async fn bind(
        &self,
        action: &ActionDescriptor,
        tokens: &[Token],
    ) -> Result<BoundArguments, DispatchError> {
        let leaves = action.leaf_parameters();
        let mut partition = partition(&leaves, tokens)?;
        let mut bound: HashMap<String, BoundValue> = HashMap::new();

        for (index, param) in leaves.iter().enumerate() {
            let value = match param.kind {
                ParameterKind::InjectedContext => {
                    self.check_context(param)?;
                    continue;
                }
                ParameterKind::NamedOption => {
                    let raws = partition.options.remove(&index).unwrap_or_default();
                    self.bind_option(param, raws).await?
                }
                ParameterKind::PositionalArgument => {
                    self.bind_positional(param, &mut partition.positionals)
                        .await?
                }
                ParameterKind::ContainerObject | ParameterKind::GlobalOptionsObject => continue,
            };
            if let Some(value) = value {
                debug!(parameter = %param.name, source = ?value.source, "bound");
                bound.insert(param.name.clone(), value);
            }
        }

        if let Some(extra) = partition.positionals.pop_front() {
            return Err(BindError::UnexpectedArgument { token: extra }.into());
        }

        Ok(assemble(&action.parameters, &mut bound))
    }

    fn check_context(&self, param: &ParameterDescriptor) -> Result<(), BindError> {
        let context_type = param.context_type.clone().unwrap_or_default();
        if self.contexts.contains(&context_type) {
            Ok(())
        } else {
            Err(BindError::MissingContext {
                parameter: param.name.clone(),
                context_type,
            })
        }
    }

    async fn bind_option(
        &self,
        param: &ParameterDescriptor,
        raws: Vec<String>,
    ) -> Result<Option<BoundValue>, DispatchError> {
        if !raws.is_empty() {
            let value = match &param.shape {
                ValueShape::Collection(_) => {
                    let parts: Vec<String> = raws
                        .iter()
                        .flat_map(|raw| split_list(raw, self.config.list_separator))
                        .collect();
                    self.convert_list(param, parts).await?
                }
                ValueShape::FlagsEnum(_) => {
                    let separator = self.config.list_separator.to_string();
                    let joined = raws.join(separator.as_str());
                    self.convert(param, &joined).await?
                }
                // Repeated scalar options: last one wins.
                _ => {
                    let last = raws.last().map(String::as_str).unwrap_or_default();
                    self.convert(param, last).await?
                }
            };
            return Ok(Some(BoundValue::new(value, ValueSource::Argv)));
        }

        match self.fallback(param).await? {
            Some(bound) => Ok(Some(bound)),
            None if param.required => Err(BindError::MissingRequiredOption {
                parameter: param.name.clone(),
                option: param.display_name(),
            }
            .into()),
            None => Ok(None),
        }
    }

    async fn bind_positional(
        &self,
        param: &ParameterDescriptor,
        positionals: &mut VecDeque<String>,
    ) -> Result<Option<BoundValue>, DispatchError> {
        let taken: Option<TypedValue> = if param.shape.is_collection() {
            if positionals.is_empty() {
                None
            } else {
                let rest: Vec<String> = positionals.drain(..).collect();
                Some(self.convert_list(param, rest).await?)
            }
        } else {
            match positionals.pop_front() {
                Some(raw) => Some(self.convert(param, &raw).await?),
                None => None,
            }
        };
        if let Some(value) = taken {
            return Ok(Some(BoundValue::new(value, ValueSource::Argv)));
        }

        match self.fallback(param).await? {
            Some(bound) => Ok(Some(bound)),
            None if param.required => Err(BindError::MissingRequiredArgument {
                parameter: param.name.clone(),
            }
            .into()),
            None => Ok(None),
        }
    }

    /// Environment, then default, then prompt.
    async fn fallback(
        &self,
        param: &ParameterDescriptor,
    ) -> Result<Option<BoundValue>, DispatchError> {
        if let Some(raw) = param
            .env_var
            .as_deref()
            .and_then(|name| self.environment.var(name))
        {
            let value = self.convert_raw(param, &raw).await?;
            return Ok(Some(BoundValue::new(value, ValueSource::Environment)));
        }

        if let Some(raw) = &param.default_value {
            let value = self.convert_raw(param, raw).await?;
            return Ok(Some(BoundValue::new(value, ValueSource::Default)));
        }

        let (Some(text), Some(prompter)) = (&param.prompt, self.prompter) else {
            return Ok(None);
        };
        if !self.config.interactive {
            return Ok(None);
        }

        let answer = match suspend(self.cancel, prompter.prompt(text, param.secure_prompt))
            .await
            .map_err(|_| DispatchError::Cancelled)?
        {
            Ok(answer) => answer,
            // No answer to read; required checks decide what happens next.
            Err(PromptError::Exhausted | PromptError::NotInteractive) => {
                debug!(parameter = %param.name, "prompt had no input");
                return Ok(None);
            }
            Err(source) => {
                return Err(BindError::Prompt {
                    parameter: param.name.clone(),
                    source,
                }
                .into());
            }
        };
        if answer.is_empty() {
            return Ok(None);
        }
        let value = self.convert_raw(param, &answer).await?;
        Ok(Some(BoundValue::new(value, ValueSource::Prompt)))
    }

    /// Converts text that did not come from argv, splitting collections.
    async fn convert_raw(
        &self,
        param: &ParameterDescriptor,
        raw: &str,
    ) -> Result<TypedValue, DispatchError> {
        if param.shape.is_collection() {
            let parts = split_list(raw, self.config.list_separator);
            self.convert_list(param, parts).await
        } else {
            self.convert(param, raw).await
        }
    }

    async fn convert_list(
        &self,
        param: &ParameterDescriptor,
        parts: Vec<String>,
    ) -> Result<TypedValue, DispatchError> {
        let mut items = Vec::with_capacity(parts.len());
        for part in &parts {
            items.push(self.convert(param, part).await?);
        }
        Ok(TypedValue::List(items))
    }

    /// Converts one raw value (one element, for collections).
    async fn convert(
        &self,
        param: &ParameterDescriptor,
        raw: &str,
    ) -> Result<TypedValue, DispatchError> {
        let converted = match &param.shape {
            ValueShape::Scalar(ty) => convert_scalar(*ty, raw),
            ValueShape::Enum(spec) => convert_enum(spec, raw),
            ValueShape::FlagsEnum(spec) => convert_flags(spec, raw, self.config.list_separator),
            ValueShape::Collection(ElementShape::Scalar(ty)) => convert_scalar(*ty, raw),
            ValueShape::Collection(ElementShape::Enum(spec)) => convert_enum(spec, raw),
            ValueShape::Custom { converter } => match self.registry.converter(converter) {
                Some(custom) => suspend(self.cancel, custom.convert(raw))
                    .await
                    .map_err(|_| DispatchError::Cancelled)?,
                None => Err(format!("no converter registered under '{converter}'")),
            },
        };
        converted.map_err(|reason| {
            DispatchError::from(BindError::ValueConversion {
                parameter: param.name.clone(),
                value: raw.to_string(),
                reason,
            })
        })
    }
}

/// First pass: option occurrences per leaf index, plus positional values.
fn partition(leaves: &[&ParameterDescriptor], tokens: &[Token]) -> Result<Partition, BindError> {
    let mut longs: HashMap<&str, usize> = HashMap::new();
    let mut shorts: HashMap<char, usize> = HashMap::new();
    for (index, param) in leaves.iter().enumerate() {
        if param.kind != ParameterKind::NamedOption {
            continue;
        }
        if let Some(long) = &param.long_name {
            longs.insert(long.as_str(), index);
        }
        if let Some(short) = param.short_name {
            shorts.insert(short, index);
        }
    }

    let mut out = Partition::default();
    let mut iter = tokens.iter().peekable();

    while let Some(token) = iter.next() {
        match token {
            Token::Separator => {}
            Token::Positional(text) => out.positionals.push_back(text.clone()),
            Token::Long { name, value } => {
                let option = format!("--{name}");
                let index = *longs
                    .get(name.as_str())
                    .ok_or_else(|| BindError::UnknownOption {
                        option: option.clone(),
                    })?;
                let raw = match value {
                    Some(value) => value.clone(),
                    None if leaves[index].shape.is_switch() => "true".to_string(),
                    None => take_value(&mut iter)
                        .ok_or(BindError::MissingOptionValue { option })?,
                };
                out.options.entry(index).or_default().push(raw);
            }
            Token::Short(cluster) => {
                for (offset, letter) in cluster.char_indices() {
                    let option = format!("-{letter}");
                    let index = *shorts
                        .get(&letter)
                        .ok_or_else(|| BindError::UnknownOption {
                            option: option.clone(),
                        })?;
                    if leaves[index].shape.is_switch() {
                        out.options.entry(index).or_default().push("true".to_string());
                        continue;
                    }
                    let rest = &cluster[offset + letter.len_utf8()..];
                    let rest = rest.strip_prefix('=').unwrap_or(rest);
                    let raw = if rest.is_empty() {
                        take_value(&mut iter).ok_or(BindError::MissingOptionValue { option })?
                    } else {
                        rest.to_string()
                    };
                    out.options.entry(index).or_default().push(raw);
                    break;
                }
            }
        }
    }

    Ok(out)
}

/// Takes the next token as an option value if it is positional.
fn take_value<'t>(
    iter: &mut std::iter::Peekable<impl Iterator<Item = &'t Token>>,
) -> Option<String> {
    let text = iter.peek()?.as_positional()?.to_string();
    iter.next();
    Some(text)
}

/// Moves bound leaves into top-level entries, folding container members
/// into objects.
fn assemble(
    params: &[ParameterDescriptor],
    bound: &mut HashMap<String, BoundValue>,
) -> BoundArguments {
    let mut args = BoundArguments::default();
    for param in params {
        if let Some(value) = take_entry(param, bound) {
            args.insert(param.name.clone(), value);
        }
    }
    args
}

fn take_entry(
    param: &ParameterDescriptor,
    bound: &mut HashMap<String, BoundValue>,
) -> Option<BoundValue> {
    if !param.kind.is_container() {
        return bound.remove(&param.name);
    }
    let mut members = std::collections::BTreeMap::new();
    let mut source = ValueSource::Default;
    for member in &param.members {
        if let Some(value) = take_entry(member, bound) {
            if source == ValueSource::Default {
                source = value.source;
            }
            members.insert(member.name.clone(), value);
        }
    }
    Some(BoundValue::new(TypedValue::Object(members), source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{MapEnvironment, ScriptedPrompter};
    use crate::token::tokenize;
    use command_dispatch_core::{EnumSpec, ScalarType};

    struct Fixture {
        config: DispatchConfig,
        environment: MapEnvironment,
        prompter: Option<ScriptedPrompter>,
        registry: HandlerRegistry,
        contexts: ContextValues,
        cancel: CancellationToken,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                config: DispatchConfig::default(),
                environment: MapEnvironment::default(),
                prompter: None,
                registry: HandlerRegistry::default(),
                contexts: ContextValues::default(),
                cancel: CancellationToken::new(),
            }
        }

        async fn bind(
            &self,
            action: &ActionDescriptor,
            args: &[&str],
        ) -> Result<BoundArguments, DispatchError> {
            let binder = Binder {
                config: &self.config,
                environment: &self.environment,
                prompter: self.prompter.as_ref().map(|p| p as &dyn Prompter),
                registry: &self.registry,
                contexts: &self.contexts,
                cancel: &self.cancel,
            };
            binder.bind(action, &tokenize(args.iter().copied())).await
        }
    }

    fn str_shape() -> ValueShape {
        ValueShape::default()
    }

    fn strings(args: &BoundArguments, name: &str) -> Vec<String> {
        args.list(name)
            .unwrap_or_default()
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    #[tokio::test]
    async fn test_short_cluster_with_attached_value() {
        let action = ActionDescriptor::new("serve")
            .with_parameter(ParameterDescriptor::switch("verbose").short('v'))
            .with_parameter(ParameterDescriptor::switch("quiet").short('q'))
            .with_parameter(
                ParameterDescriptor::option("port", ValueShape::Scalar(ScalarType::U16)).short('p'),
            );

        let args = Fixture::new().bind(&action, &["-vp8080"]).await.unwrap();
        assert!(args.flag("verbose"));
        assert!(!args.flag("quiet"));
        assert_eq!(args.i64("port"), Some(8080));

        let args = Fixture::new().bind(&action, &["-qp", "81"]).await.unwrap();
        assert!(args.flag("quiet"));
        assert_eq!(args.i64("port"), Some(81));

        let err = Fixture::new().bind(&action, &["-vx"]).await.unwrap_err();
        assert_eq!(err.to_string(), "unknown option '-x'");
    }

    #[tokio::test]
    async fn test_missing_option_value() {
        let action = ActionDescriptor::new("serve").with_parameter(ParameterDescriptor::option(
            "port",
            ValueShape::Scalar(ScalarType::U16),
        ));
        let err = Fixture::new().bind(&action, &["--port"]).await.unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Bind(BindError::MissingOptionValue { ref option }) if option == "--port"
        ));
    }

    #[tokio::test]
    async fn test_negative_number_is_an_option_value() {
        let action = ActionDescriptor::new("shift").with_parameter(ParameterDescriptor::option(
            "offset",
            ValueShape::Scalar(ScalarType::I32),
        ));
        let args = Fixture::new().bind(&action, &["--offset", "-5"]).await.unwrap();
        assert_eq!(args.i64("offset"), Some(-5));
    }

    #[tokio::test]
    async fn test_repeated_scalar_last_wins() {
        let action = ActionDescriptor::new("run")
            .with_parameter(ParameterDescriptor::option("name", str_shape()));
        let args = Fixture::new()
            .bind(&action, &["--name", "a", "--name=b"])
            .await
            .unwrap();
        assert_eq!(args.str("name"), Some("b"));
    }

    #[tokio::test]
    async fn test_trailing_collection_takes_rest_unsplit() {
        let action = ActionDescriptor::new("add")
            .with_parameter(ParameterDescriptor::argument("target", str_shape()))
            .with_parameter(ParameterDescriptor::argument(
                "files",
                ValueShape::Collection(ElementShape::Scalar(ScalarType::Path)),
            ))
            .with_parameter(ParameterDescriptor::switch("force"));

        let args = Fixture::new()
            .bind(&action, &["dest", "a,b", "--force", "c"])
            .await
            .unwrap();
        assert_eq!(args.str("target"), Some("dest"));
        assert_eq!(strings(&args, "files"), vec!["a,b", "c"]);
        assert!(args.flag("force"));
    }

    #[tokio::test]
    async fn test_separator_makes_dashes_positional() {
        let action = ActionDescriptor::new("grep")
            .with_parameter(ParameterDescriptor::argument("pattern", str_shape()));
        let args = Fixture::new().bind(&action, &["--", "--help"]).await.unwrap();
        assert_eq!(args.str("pattern"), Some("--help"));
    }

    #[tokio::test]
    async fn test_unexpected_positional() {
        let action = ActionDescriptor::new("rm")
            .with_parameter(ParameterDescriptor::argument("path", str_shape()));
        let err = Fixture::new().bind(&action, &["a", "b"]).await.unwrap_err();
        assert_eq!(err.to_string(), "unexpected argument 'b'");
    }

    #[tokio::test]
    async fn test_flags_enum_across_occurrences() {
        let perms = EnumSpec::new("Perm", [("Read", 1), ("Write", 2), ("Exec", 4)]);
        let action = ActionDescriptor::new("chmod").with_parameter(ParameterDescriptor::option(
            "mode",
            ValueShape::FlagsEnum(perms),
        ));
        let args = Fixture::new()
            .bind(&action, &["--mode", "read", "--mode", "WRITE,exec"])
            .await
            .unwrap();
        assert_eq!(args.i64("mode"), Some(7));
    }

    #[tokio::test]
    async fn test_environment_before_default() {
        let action = ActionDescriptor::new("serve").with_parameter(
            ParameterDescriptor::option("port", ValueShape::Scalar(ScalarType::U16))
                .with_default("8080")
                .with_env("APP_PORT"),
        );

        let args = Fixture::new().bind(&action, &[]).await.unwrap();
        assert_eq!(args.i64("port"), Some(8080));
        assert_eq!(args.source("port"), Some(ValueSource::Default));

        let mut fixture = Fixture::new();
        fixture.environment = MapEnvironment::default().with("APP_PORT", "9000");
        let args = fixture.bind(&action, &[]).await.unwrap();
        assert_eq!(args.i64("port"), Some(9000));
        assert_eq!(args.source("port"), Some(ValueSource::Environment));

        let args = fixture.bind(&action, &["--port", "1"]).await.unwrap();
        assert_eq!(args.source("port"), Some(ValueSource::Argv));
    }

    #[tokio::test]
    async fn test_environment_value_is_converted() {
        let action = ActionDescriptor::new("serve").with_parameter(
            ParameterDescriptor::option("port", ValueShape::Scalar(ScalarType::U16))
                .with_env("APP_PORT"),
        );
        let mut fixture = Fixture::new();
        fixture.environment = MapEnvironment::default().with("APP_PORT", "http");
        let err = fixture.bind(&action, &[]).await.unwrap_err();
        assert!(err.to_string().starts_with("invalid value 'http' for 'port'"));
    }

    #[tokio::test]
    async fn test_prompt_for_missing_argument() {
        let action = ActionDescriptor::new("login").with_parameter(
            ParameterDescriptor::argument("token", str_shape())
                .with_prompt("Token")
                .secure(),
        );

        let mut fixture = Fixture::new();
        fixture.prompter = Some(ScriptedPrompter::new(["s3cret"]));
        let args = fixture.bind(&action, &[]).await.unwrap();
        assert_eq!(args.str("token"), Some("s3cret"));
        assert_eq!(args.source("token"), Some(ValueSource::Prompt));
        assert_eq!(
            fixture.prompter.as_ref().unwrap().asked(),
            vec![("Token".to_string(), true)]
        );

        fixture.config = DispatchConfig::default().non_interactive();
        let err = fixture.bind(&action, &[]).await.unwrap_err();
        assert_eq!(err.to_string(), "missing required argument 'token'");
    }

    #[tokio::test]
    async fn test_exhausted_prompt_leaves_parameter_unset() {
        let action = ActionDescriptor::new("login").with_parameter(
            ParameterDescriptor::option("user", str_shape()).with_prompt("User"),
        );
        let mut fixture = Fixture::new();
        fixture.prompter = Some(ScriptedPrompter::new(Vec::<String>::new()));
        let args = fixture.bind(&action, &[]).await.unwrap();
        assert_eq!(args.value("user"), None);

        let required = ActionDescriptor::new("login").with_parameter(
            ParameterDescriptor::option("user", str_shape())
                .required()
                .with_prompt("User"),
        );
        let err = fixture.bind(&required, &[]).await.unwrap_err();
        assert_eq!(err.to_string(), "missing required option '--user'");
    }

    #[tokio::test]
    async fn test_prompt_observes_cancellation() {
        let action = ActionDescriptor::new("login").with_parameter(
            ParameterDescriptor::argument("token", str_shape()).with_prompt("Token"),
        );
        let mut fixture = Fixture::new();
        fixture.prompter = Some(ScriptedPrompter::new(["unused"]));
        fixture.cancel.cancel();
        let err = fixture.bind(&action, &[]).await.unwrap_err();
        assert!(matches!(err, DispatchError::Cancelled));
    }

    #[tokio::test]
    async fn test_optional_unset_stays_unset() {
        let action = ActionDescriptor::new("log")
            .with_parameter(ParameterDescriptor::option("author", str_shape()))
            .with_parameter(ParameterDescriptor::argument("rev", str_shape()).optional());
        let args = Fixture::new().bind(&action, &[]).await.unwrap();
        assert!(args.is_empty());
    }

    #[tokio::test]
    async fn test_required_option_message_uses_display_name() {
        let action = ActionDescriptor::new("push").with_parameter(
            ParameterDescriptor::option("remote", str_shape()).required(),
        );
        let err = Fixture::new().bind(&action, &[]).await.unwrap_err();
        assert_eq!(err.to_string(), "missing required option '--remote'");
    }

    #[tokio::test]
    async fn test_container_members_share_the_option_pool() {
        let action = ActionDescriptor::new("fetch")
            .with_parameter(ParameterDescriptor::global_options(
                "globals",
                vec![ParameterDescriptor::switch("verbose").short('v')],
            ))
            .with_parameter(ParameterDescriptor::container(
                "net",
                vec![
                    ParameterDescriptor::option("timeout", ValueShape::Scalar(ScalarType::U32))
                        .with_default("30"),
                ],
            ))
            .with_parameter(ParameterDescriptor::argument("remote", str_shape()));

        let args = Fixture::new().bind(&action, &["-v", "origin"]).await.unwrap();
        assert!(args.flag("verbose"));
        assert_eq!(args.i64("timeout"), Some(30));
        assert_eq!(args.source("globals"), Some(ValueSource::Argv));
        assert_eq!(args.source("net"), Some(ValueSource::Default));
        assert_eq!(args.len(), 3);
    }

    #[tokio::test]
    async fn test_injected_context_must_be_supplied() {
        let action = ActionDescriptor::new("sync")
            .with_parameter(ParameterDescriptor::injected("progress", "progress_reporter"));
        let err = Fixture::new().bind(&action, &[]).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "no context of type 'progress_reporter' supplied for 'progress'"
        );

        let mut fixture = Fixture::new();
        fixture.contexts.insert("progress_reporter", 0u32);
        assert!(fixture.bind(&action, &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_custom_converter() {
        let action = ActionDescriptor::new("paint").with_parameter(ParameterDescriptor::option(
            "color",
            ValueShape::Custom {
                converter: "rgb".to_string(),
            },
        ));

        let err = Fixture::new()
            .bind(&action, &["--color", "red"])
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid value 'red' for 'color': no converter registered under 'rgb'"
        );

        let mut fixture = Fixture::new();
        fixture.registry = HandlerRegistry::default().with_converter_fn("rgb", |raw| match raw {
            "red" => Ok(TypedValue::UInt(0xff0000)),
            other => Err(format!("unknown color '{other}'")),
        });
        let args = fixture.bind(&action, &["--color", "red"]).await.unwrap();
        assert_eq!(args.i64("color"), Some(0xff0000));
    }
}
