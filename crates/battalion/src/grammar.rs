//! Parsing argv against a generated grammar.
//!
//! The grammar of every level is a `clap::Command` built by
//! [`autodoc`](crate::autodoc). Parsing turns argv into [`RawOptions`]: a map
//! keyed by the grammar's *decorated* surface names (`--debug`, `<msg>`,
//! `<command>`, `<args>`), where `None` marks an option the user did not set.
//!
//! | Value source | Result |
//! |--------------|--------|
//! | command line | `Some(value)` |
//! | clap default (valued option or flag) | `None` |
//! | absent | `None` |
//!
//! Defaults are never reported as set: declared defaults already live in the
//! lowest state layer, and reporting them here would let them clobber config.
//!
//! Container grammars take `[options] <command> [<args>...]`; everything after
//! the command token is left untouched in `<args>` for the next level.

use std::collections::BTreeMap;

use clap::error::ErrorKind;
use clap::parser::ValueSource;
use clap::{ArgAction, ArgMatches};
use serde_json::Value;

use crate::error::DispatchError;

/// Raw id of the command token of a container grammar.
pub const COMMAND: &str = "<command>";

/// Raw id of the residual arguments of a container grammar.
pub const ARGS: &str = "<args>";

/// Parsed options keyed by decorated name. `None` means unset.
pub type RawOptions = BTreeMap<String, Option<Value>>;

/// Parses `argv` (without a program name) against `cmd`.
///
/// `--help` and `--version` become [`DispatchError::Exit`] with status 0 and
/// the rendered text; every other clap failure is a
/// [`DispatchError::Grammar`].
pub fn parse<I, T>(cmd: &mut clap::Command, argv: I) -> Result<RawOptions, DispatchError>
where
    I: IntoIterator<Item = T>,
    T: Into<String>,
{
    let argv: Vec<String> = argv.into_iter().map(Into::into).collect();
    let matches = match cmd.try_get_matches_from_mut(&argv) {
        Ok(matches) => matches,
        Err(err) => return Err(grammar_error(cmd, err)),
    };
    Ok(raw_options(cmd, &matches))
}

fn grammar_error(cmd: &mut clap::Command, err: clap::Error) -> DispatchError {
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => DispatchError::Exit {
            code: 0,
            message: Some(err.render().to_string()),
        },
        _ => DispatchError::Grammar {
            message: err.render().to_string(),
            usage: cmd.render_usage().to_string(),
        },
    }
}

/// Collects every user argument of `cmd` from `matches`.
pub fn raw_options(cmd: &clap::Command, matches: &ArgMatches) -> RawOptions {
    let mut raw = RawOptions::new();

    for arg in cmd.get_arguments() {
        let id = arg.get_id().as_str();
        if id == "help" || id == "version" {
            continue;
        }

        let is_flag = matches!(arg.get_action(), ArgAction::SetTrue | ArgAction::SetFalse);
        let set = matches!(
            matches.value_source(id),
            Some(source) if source != ValueSource::DefaultValue
        );

        let value = if !set {
            None
        } else if is_flag {
            Some(Value::Bool(matches.get_flag(id)))
        } else {
            matches
                .get_one::<String>(id)
                .map(|v| Value::String(v.clone()))
        };
        raw.insert(id.to_string(), value);
    }

    if let Some((command, sub)) = matches.subcommand() {
        let args: Vec<Value> = sub
            .get_many::<String>("")
            .into_iter()
            .flatten()
            .map(|a| Value::String(a.clone()))
            .collect();
        raw.insert(COMMAND.to_string(), Some(Value::String(command.to_string())));
        raw.insert(ARGS.to_string(), Some(Value::Array(args)));
    }

    raw
}

/// The command token, if argv carried one.
pub fn command_token(raw: &RawOptions) -> Option<&str> {
    raw.get(COMMAND)
        .and_then(Option::as_ref)
        .and_then(Value::as_str)
        .filter(|token| !token.is_empty())
}

/// Everything after the command token.
pub fn residual_args(raw: &RawOptions) -> Vec<String> {
    raw.get(ARGS)
        .and_then(Option::as_ref)
        .and_then(Value::as_array)
        .map(|args| {
            args.iter()
                .filter_map(|a| a.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Returns true if the level's `-d`/`--debug` flag was given.
pub fn debug_requested(raw: &RawOptions) -> bool {
    matches!(raw.get("--debug"), Some(Some(Value::Bool(true))))
}
