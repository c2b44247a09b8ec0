//! Bridging parsed options to a command call.
//!
//! Three steps turn a leaf's [`RawOptions`] into a running command:
//!
//! 1. [`command_spec`] lists the parameters a user can supply, leaving out
//!    fixture-named ones.
//! 2. [`format_command_args`] normalizes decorated option names into
//!    parameter names, fills unset values from defaults and coerces parsed
//!    strings to the shape of each default. [`supplied_args`] does the same
//!    without the defaults; that is what gets layered into state.
//! 3. [`invoke`] injects fixtures, applies remaining defaults, honors dryrun
//!    and finally calls the body with the [`Context`].
//!
//! ```rust
//! use battalion::invocation::normalize_key;
//!
//! assert_eq!(normalize_key("--dry-run"), "dry_run");
//! assert_eq!(normalize_key("<msg>"), "msg");
//! assert_eq!(normalize_key("-d"), "d");
//! ```

use serde_json::Value;

use crate::command::{Args, Command, CommandResult, Param, ParamDefault};
use crate::context::Context;
use crate::error::InvocationError;
use crate::grammar::RawOptions;
use crate::key::Key;
use crate::registry::Registry;
use crate::state::OptionFragment;

/// Converts a decorated option name into parameter form.
///
/// Strips leading dashes and angle brackets, and turns `-` into `_`.
pub fn normalize_key(raw: &str) -> String {
    raw.trim_start_matches('-')
        .trim_start_matches('<')
        .trim_end_matches('>')
        .replace('-', "_")
}

/// The user-visible parameters of `command`, in declaration order.
pub fn command_spec<'a>(command: &'a Command, registry: &Registry) -> Vec<&'a Param> {
    command
        .params()
        .iter()
        .filter(|p| !registry.is_fixture(&p.name))
        .collect()
}

/// Maps parsed options onto `command`'s parameters.
///
/// Keys are visited in sorted order, so `--name` is seen before `<name>`.
/// An unset value (or the literal string `"None"`) falls back to a value
/// already collected for the same parameter, then to the declared default.
/// Keys that are not parameters of `command` are dropped. A `null` default
/// leaves the parameter unset.
pub fn format_command_args(
    command: &Command,
    registry: &Registry,
    raw: &RawOptions,
) -> OptionFragment {
    let mut args = supplied_args(command, registry, raw);
    for param in command_spec(command, registry) {
        if let Some(slot) = args.get_mut(&param.name) {
            if slot.is_none() {
                *slot = param.default.value().filter(|d| !d.is_null()).cloned();
            }
        }
    }
    args
}

/// Like [`format_command_args`], but only with what the user typed.
///
/// Parameters left out on the command line stay unset, so recording the
/// result as an option fragment never shadows a config value.
pub fn supplied_args(command: &Command, registry: &Registry, raw: &RawOptions) -> OptionFragment {
    let spec = command_spec(command, registry);
    let mut args = OptionFragment::new();

    for (raw_key, raw_value) in raw {
        let name = normalize_key(raw_key);
        let Some(param) = spec.iter().find(|p| p.name == name) else {
            continue;
        };

        let value = match raw_value {
            Some(Value::String(s)) if s == "None" => None,
            Some(v) => Some(coerce(v, &param.default)),
            None => None,
        };

        let value = value.or_else(|| args.get(&name).cloned().flatten());
        args.insert(name, value);
    }

    args
}

/// Coerces a parsed string into the type of `default`.
///
/// Array and object defaults expect JSON text. Values that do not parse stay
/// strings.
pub fn coerce(value: &Value, default: &ParamDefault) -> Value {
    let Value::String(s) = value else {
        return value.clone();
    };
    match default {
        ParamDefault::Value(Value::Bool(_)) => match s.as_str() {
            "true" | "True" | "1" => Value::Bool(true),
            "false" | "False" | "0" => Value::Bool(false),
            _ => value.clone(),
        },
        ParamDefault::Value(Value::Number(n)) if n.is_f64() => s
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| value.clone()),
        ParamDefault::Value(Value::Number(_)) => s
            .parse::<i64>()
            .map(Value::from)
            .or_else(|_| s.parse::<f64>().map(Value::from))
            .unwrap_or_else(|_| value.clone()),
        ParamDefault::Value(Value::Array(_)) => match serde_json::from_str(s) {
            Ok(parsed @ Value::Array(_)) => parsed,
            _ => value.clone(),
        },
        ParamDefault::Value(Value::Object(_)) => match serde_json::from_str(s) {
            Ok(parsed @ Value::Object(_)) => parsed,
            _ => value.clone(),
        },
        _ => value.clone(),
    }
}

/// Calls `command` as `key` with `supplied` arguments.
///
/// Fixture-named parameters always get the fixture's value, whatever was
/// supplied. Unset parameters take their default; a parameter with neither is
/// an [`InvocationError::MissingArgument`]. When `strict`, supplied names that
/// are not parameters are an [`InvocationError::UnexpectedArgument`].
pub fn invoke(
    ctx: &mut Context,
    key: &Key,
    command: &Command,
    supplied: &OptionFragment,
    strict: bool,
) -> CommandResult {
    if strict {
        if let Some(name) = supplied
            .keys()
            .find(|name| !command.params().iter().any(|p| &p.name == *name))
        {
            return Err(InvocationError::UnexpectedArgument {
                command: command.name().to_string(),
                param: name.clone(),
            }
            .into());
        }
    }

    let mut args = Args::new();
    for param in command.params() {
        if ctx.registry().is_fixture(&param.name) {
            let value = ctx
                .registry()
                .get_fixture(&param.name, ctx.state())?
                .ok_or_else(|| InvocationError::MissingFixture(param.name.clone()))?;
            args.insert_fixture(param.name.clone(), value);
            continue;
        }

        match (supplied.get(&param.name).cloned().flatten(), &param.default) {
            (Some(value), _) => args.insert(param.name.clone(), value),
            (None, ParamDefault::Value(default)) => args.insert(param.name.clone(), default.clone()),
            (None, ParamDefault::Required) => {
                return Err(InvocationError::MissingArgument {
                    command: command.name().to_string(),
                    param: param.name.clone(),
                }
                .into())
            }
        }
    }

    if ctx.state().get_bool("debug") {
        tracing::debug!("state for {}:\n{}", key.to_dotted(), ctx.state());
    }

    if ctx.state().get_bool("dryrun") {
        if let Some(value) = command.dryrun_value() {
            tracing::info!(
                target: "battalion::dryrun",
                cli = ctx.cli_name(),
                "DRYRUN: {}",
                describe_call(command, &args)
            );
            return Ok(value.clone());
        }
    }

    tracing::debug!("invoking {}", key.to_dotted());
    let body = command.body();
    let outer = ctx.enter(key.clone());
    let result = body.call(ctx, &args);
    ctx.leave(outer);
    result
}

/// `name(arg=value, ...)`, with fixtures shown by name only.
fn describe_call(command: &Command, args: &Args) -> String {
    let rendered: Vec<String> = command
        .params()
        .iter()
        .map(|p| match args.get(&p.name) {
            Some(value) => format!("{}={}", p.name, value),
            None => format!("{}=<{}>", p.name, p.name),
        })
        .collect();
    format!("{}({})", command.name(), rendered.join(", "))
}
