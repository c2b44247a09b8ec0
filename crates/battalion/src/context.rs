//! The per-invocation context handed to every command.
//!
//! One [`Context`] is built per top-level run, after the layered state has
//! been compiled. It owns that compiled [`State`], so every command of the run
//! (including those reached through [`Context::call`]) observes and mutates
//! the same configuration.

use std::rc::Rc;

use serde_json::Value;

use crate::command::CommandResult;
use crate::container::{CliDef, Container};
use crate::error::InvocationError;
use crate::invocation;
use crate::key::Key;
use crate::output::Console;
use crate::registry::{Registry, Target};
use crate::state::{OptionFragment, State};

/// Execution environment of one run.
pub struct Context {
    registry: Rc<Registry>,
    cli: Rc<CliDef>,
    key: Key,
    state: State,
    console: Console,
}

impl Context {
    pub(crate) fn new(
        registry: Rc<Registry>,
        cli: Rc<CliDef>,
        key: Key,
        state: State,
        console: Console,
    ) -> Self {
        Self {
            registry,
            cli,
            key,
            state,
            console,
        }
    }

    /// The compiled state of this run.
    pub fn state(&self) -> &State {
        &self.state
    }

    /// Mutable access; later commands of the same run see the changes.
    pub fn state_mut(&mut self) -> &mut State {
        &mut self.state
    }

    pub fn cli(&self) -> &CliDef {
        &self.cli
    }

    pub fn cli_name(&self) -> &str {
        self.cli.name()
    }

    /// Key of the command currently running.
    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn console(&self) -> &Console {
        &self.console
    }

    /// Prints a line to stdout.
    pub fn echo(&self, text: impl AsRef<str>) {
        self.console.out(text.as_ref());
    }

    /// Prints a line to stderr.
    pub fn echo_err(&self, text: impl AsRef<str>) {
        self.console.err(text.as_ref());
    }

    /// Calls another registered command of this CLI within the same run.
    ///
    /// `path` is dotted and relative to the CLI (`"greeting"`,
    /// `"myhandler.validate"`). Fixtures are injected and defaults applied as
    /// for a dispatched command; unknown keyword names are rejected.
    ///
    /// ```rust,ignore
    /// let greeting = ctx.call("greeting", [("name", "Kyle")])?;
    /// ```
    pub fn call<I, K, V>(&mut self, path: &str, kwargs: I) -> CommandResult
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let mut key = Key::cli(self.cli_name());
        for segment in Key::from_dotted(path).segments() {
            key = key.child(segment);
        }

        let registry = Rc::clone(&self.registry);
        let command = match registry.get(&key) {
            Some(Target::Command(command)) => Rc::clone(command),
            _ => return Err(InvocationError::NotACommand(key).into()),
        };

        let supplied: OptionFragment = kwargs
            .into_iter()
            .map(|(k, v)| (k.into(), Some(v.into())))
            .collect();
        invocation::invoke(self, &key, &command, &supplied, true)
    }

    /// Marks `key` as the running command, returning the previous one.
    pub(crate) fn enter(&mut self, key: Key) -> Key {
        std::mem::replace(&mut self.key, key)
    }

    pub(crate) fn leave(&mut self, outer: Key) {
        self.key = outer;
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("cli", &self.cli_name())
            .field("key", &self.key)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
