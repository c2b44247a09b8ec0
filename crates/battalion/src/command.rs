//! Command declarations.
//!
//! A [`Command`] is a leaf callable exposed at some registry key. It carries
//! everything needed to generate its grammar and to call it: an ordered list
//! of [`Param`]s with their defaults, optional aliases, an optional dryrun
//! value, and the body itself.
//!
//! # Bodies
//!
//! Bodies implement [`CommandFn`]. Closures are wrapped in [`FnCommand`] and
//! may return any `Result<T, E>` where `T: Serialize`; the value is converted
//! to JSON by [`IntoCommandResult`]:
//!
//! ```rust
//! use battalion::{Args, Command, Context};
//!
//! let greeting = Command::new("greeting", |ctx: &mut Context, args: &Args| {
//!     let name = args.str("name").unwrap_or("World");
//!     ctx.echo(format!("Hello {}!", name));
//!     Ok::<_, anyhow::Error>(())
//! })
//! .about("Prints \"Hello {name}!\"")
//! .arg("name", "World");
//! assert_eq!(greeting.params().len(), 1);
//! ```
//!
//! Struct bodies can implement [`CommandFn`] directly when they need to carry
//! their own data.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::context::Context;
use crate::error::InvocationError;
use crate::fixture::FixtureValue;

/// The result of running a command body.
pub type CommandResult = Result<Value, anyhow::Error>;

/// A parameter's default.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamDefault {
    /// No default: the parameter must be supplied (or be a fixture).
    Required,
    /// Used when the parameter is not supplied. `Value::Null` means "None".
    Value(Value),
}

impl ParamDefault {
    pub fn is_required(&self) -> bool {
        matches!(self, ParamDefault::Required)
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            ParamDefault::Required => None,
            ParamDefault::Value(v) => Some(v),
        }
    }
}

/// One declared parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub default: ParamDefault,
}

impl Param {
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: ParamDefault::Required,
        }
    }

    pub fn with_default(name: impl Into<String>, default: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            default: ParamDefault::Value(default.into()),
        }
    }

    /// True if the default is a boolean, which makes the option a flag.
    pub fn is_flag(&self) -> bool {
        matches!(self.default, ParamDefault::Value(Value::Bool(_)))
    }
}

/// Trait for types that can be converted into a [`CommandResult`].
pub trait IntoCommandResult {
    fn into_command_result(self) -> CommandResult;
}

impl<T, E> IntoCommandResult for Result<T, E>
where
    T: Serialize,
    E: Into<anyhow::Error>,
{
    fn into_command_result(self) -> CommandResult {
        let value = self.map_err(Into::into)?;
        Ok(serde_json::to_value(value)?)
    }
}

/// A command body.
pub trait CommandFn {
    fn call(&self, ctx: &mut Context, args: &Args) -> CommandResult;
}

/// Wraps a closure as a [`CommandFn`].
pub struct FnCommand<F, R> {
    f: F,
    _phantom: std::marker::PhantomData<fn() -> R>,
}

impl<F, R> FnCommand<F, R>
where
    F: Fn(&mut Context, &Args) -> R,
    R: IntoCommandResult,
{
    pub fn new(f: F) -> Self {
        Self {
            f,
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<F, R> CommandFn for FnCommand<F, R>
where
    F: Fn(&mut Context, &Args) -> R,
    R: IntoCommandResult,
{
    fn call(&self, ctx: &mut Context, args: &Args) -> CommandResult {
        (self.f)(ctx, args).into_command_result()
    }
}

/// A leaf command.
pub struct Command {
    name: String,
    about: Option<String>,
    params: Vec<Param>,
    aliases: Vec<String>,
    dryrun: Option<Value>,
    body: Rc<dyn CommandFn>,
}

impl Command {
    /// Declares a command with a closure body.
    pub fn new<F, R>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut Context, &Args) -> R + 'static,
        R: IntoCommandResult + 'static,
    {
        Self::from_fn(name, FnCommand::new(f))
    }

    /// Declares a command with any [`CommandFn`] body.
    pub fn from_fn<C>(name: impl Into<String>, body: C) -> Self
    where
        C: CommandFn + 'static,
    {
        Self {
            name: name.into(),
            about: None,
            params: Vec::new(),
            aliases: Vec::new(),
            dryrun: None,
            body: Rc::new(body),
        }
    }

    /// Sets the help text. The first line is used in command listings.
    pub fn about(mut self, about: impl Into<String>) -> Self {
        self.about = Some(about.into());
        self
    }

    /// Declares an optional parameter with a default.
    pub fn arg(mut self, name: impl Into<String>, default: impl Into<Value>) -> Self {
        self.params.push(Param::with_default(name, default));
        self
    }

    /// Declares a parameter without a default.
    ///
    /// Name it after a registered fixture to have it injected.
    pub fn required(mut self, name: impl Into<String>) -> Self {
        self.params.push(Param::required(name));
        self
    }

    pub fn param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    /// Adds an alias that resolves to this command under the same parent.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Marks the command as modifying: under `--dryrun` it is logged and
    /// `value` is returned instead of running the body.
    pub fn dryrun(mut self, value: impl Into<Value>) -> Self {
        self.dryrun = Some(value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn about_text(&self) -> Option<&str> {
        self.about.as_deref()
    }

    /// First line of the help text, for listings.
    pub fn summary(&self) -> &str {
        self.about
            .as_deref()
            .and_then(|a| a.trim().lines().next())
            .unwrap_or("")
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn dryrun_value(&self) -> Option<&Value> {
        self.dryrun.as_ref()
    }

    pub(crate) fn body(&self) -> Rc<dyn CommandFn> {
        Rc::clone(&self.body)
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("aliases", &self.aliases)
            .finish_non_exhaustive()
    }
}

/// Resolved arguments handed to a command body.
#[derive(Default)]
pub struct Args {
    values: BTreeMap<String, Value>,
    fixtures: HashMap<String, FixtureValue>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, name: String, value: Value) {
        self.values.insert(name, value);
    }

    pub(crate) fn insert_fixture(&mut self, name: String, value: FixtureValue) {
        self.fixtures.insert(name, value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Returns the value as a string slice. `None` for null or non-strings.
    pub fn str(&self, name: &str) -> Option<&str> {
        self.values.get(name).and_then(Value::as_str)
    }

    pub fn bool(&self, name: &str) -> bool {
        self.values
            .get(name)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn i64(&self, name: &str) -> Option<i64> {
        self.values.get(name).and_then(Value::as_i64)
    }

    /// Deserializes an argument into `T`.
    pub fn value<T: DeserializeOwned>(&self, name: &str) -> anyhow::Result<T> {
        let value = self.values.get(name).cloned().unwrap_or(Value::Null);
        Ok(serde_json::from_value(value)?)
    }

    /// Returns the injected fixture value for `name`.
    pub fn fixture<T: 'static>(&self, name: &str) -> Result<Rc<T>, InvocationError> {
        let value = self
            .fixtures
            .get(name)
            .ok_or_else(|| InvocationError::MissingFixture(name.to_string()))?;
        Rc::clone(value)
            .downcast::<T>()
            .map_err(|_| InvocationError::FixtureType {
                name: name.to_string(),
                expected: std::any::type_name::<T>(),
            })
    }

    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }
}

impl fmt::Debug for Args {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Args")
            .field("values", &self.values)
            .field("fixtures", &self.fixtures.keys().collect::<Vec<_>>())
            .finish()
    }
}
