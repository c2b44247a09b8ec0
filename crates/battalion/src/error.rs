//! Error types.
//!
//! Registration problems are [`RegistryError`]s and surface at declaration
//! time. Everything that can go wrong while handling one invocation is either
//! a [`DispatchError`] (user-facing, formatted by the top-level boundary), an
//! [`InvocationError`] (a bad call into a command) or a [`ConfigError`].
//! Command bodies return `anyhow::Error`, so any of these may arrive at the
//! boundary wrapped; it downcasts to decide how to report.

use std::path::PathBuf;

use thiserror::Error;

use crate::key::Key;

/// Errors raised while populating the registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A name (or alias) is already bound under the exact same parent key.
    #[error("{name} already registered to {key}")]
    Duplicate { name: String, key: Key },

    /// A fixture with this name already exists.
    #[error("{0} already a registered fixture")]
    DuplicateFixture(String),

    /// Registering `name` under `key` would exceed the maximum key depth.
    #[error("cannot register {name} under {key}: keys are at most 3 segments deep")]
    KeyTooDeep { name: String, key: Key },

    /// A handler or binding referenced a CLI that was never defined.
    #[error("no cli named {0} has been defined")]
    UnknownCli(String),

    /// A binding referenced a handler that was never defined.
    #[error("no handler named {handler} has been defined under {cli}")]
    UnknownHandler { cli: String, handler: String },

    /// An option or parameter takes a name the framework already provides.
    #[error("'{name}' is reserved and cannot be declared by {owner}")]
    Reserved { name: String, owner: String },
}

/// User-facing failures while resolving a command path.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// argv parsed but carried no command token.
    #[error("Unable to extract command from: {argv}")]
    CommandExtraction {
        argv: String,
        /// Help text of the level that failed, printed as guidance.
        usage: String,
    },

    /// The command token does not resolve under the current key.
    #[error("No such command: {name}")]
    NoSuchCommand {
        name: String,
        /// The supercommand whose listing should be printed.
        parent: Key,
        /// Pre-rendered `Commands:` section for that supercommand.
        commands: String,
    },

    /// argv did not satisfy the generated grammar.
    #[error("{message}")]
    Grammar { message: String, usage: String },

    /// An explicit early exit (help, version, or a command asking to stop).
    #[error("exit with status {code}")]
    Exit { code: i32, message: Option<String> },

    /// The user cancelled the run.
    #[error("Aborting.")]
    Interrupted,
}

/// Builds an early-exit error a command body can return.
///
/// ```rust
/// fn stop() -> anyhow::Result<()> {
///     Err(battalion::exit(3).into())
/// }
/// ```
pub fn exit(code: i32) -> DispatchError {
    DispatchError::Exit {
        code,
        message: None,
    }
}

/// Errors raised when calling a command.
#[derive(Debug, Error)]
pub enum InvocationError {
    /// A parameter without a default was not supplied.
    #[error("{command}() missing required argument: '{param}'")]
    MissingArgument { command: String, param: String },

    /// A keyword argument does not match any parameter.
    #[error("{command}() got an unexpected keyword argument '{param}'")]
    UnexpectedArgument { command: String, param: String },

    /// The path resolved to something that is not a leaf command.
    #[error("{0} is not a command")]
    NotACommand(Key),

    /// A fixture value was requested as the wrong type.
    #[error("fixture '{name}' is not a {expected}")]
    FixtureType { name: String, expected: &'static str },

    /// The command asked for a fixture parameter it did not receive.
    #[error("no fixture value for '{0}'")]
    MissingFixture(String),
}

/// Errors raised while loading a config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}
