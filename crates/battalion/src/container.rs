//! Dispatchable containers: CLIs and handlers.
//!
//! Both are declared with builders and handed to the
//! [`Registry`](crate::Registry), which binds them and every command they
//! list. At dispatch time they are used through the [`Container`] trait,
//! which is all the dispatcher and AutoDoc need to know about a level.
//!
//! # Declared defaults
//!
//! Each container carries an explicit chain of [`DefaultLayer`]s. The
//! framework contributes the base layers, and everything declared with
//! [`state`](CliDef::state), [`version`](CliDef::version) or
//! [`option`](CliDef::option) goes into the container's own layer, which is
//! always the most derived:
//!
//! | Layer | Keys |
//! |-------|------|
//! | `Base` (CLIs) | `cli`, `version = "UNKNOWN"`, `default_config` |
//! | `Cli` (CLIs) | `debug = false`, `dryrun = false`, `cwd` |
//! | `Handler` (handlers) | `cli` |
//! | own | user declarations |

use std::rc::Rc;

use serde_json::Value;

use crate::command::Command;
use crate::state::{DefaultLayer, Defaults};

/// Column at which command summaries start in `Commands:` listings.
pub const DEFAULT_COLUMN_PADDING: usize = 30;

/// Long options every CLI grammar already carries.
pub(crate) const CLI_LONGS: &[&str] = &["debug", "dryrun", "config", "help", "version"];
pub(crate) const CLI_SHORTS: &[char] = &['d', 'h', 'V'];

/// Long options every handler grammar already carries.
pub(crate) const HANDLER_LONGS: &[&str] = &["help", "version"];
pub(crate) const HANDLER_SHORTS: &[char] = &['h', 'V'];

/// Parameter names a leaf grammar already uses.
pub(crate) const COMMAND_LONGS: &[&str] = &["help"];

/// An extra option accepted at a container level.
///
/// Its parsed value lands in the compiled state under the option's name.
/// Boolean defaults make the option a flag.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionDecl {
    name: String,
    short: Option<char>,
    help: Option<String>,
    default: Value,
}

impl OptionDecl {
    pub fn new(name: impl Into<String>, default: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            short: None,
            help: None,
            default: default.into(),
        }
    }

    pub fn short(mut self, short: char) -> Self {
        self.short = Some(short);
        self
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn short_flag(&self) -> Option<char> {
        self.short
    }

    pub fn help_text(&self) -> Option<&str> {
        self.help.as_deref()
    }

    pub fn default_value(&self) -> &Value {
        &self.default
    }

    pub fn is_flag(&self) -> bool {
        self.default.is_boolean()
    }

    /// The long flag as it appears on the command line.
    pub fn long(&self) -> String {
        let long = self.name.replace('_', "-");
        match self.default {
            Value::Bool(true) => format!("no-{}", long),
            _ => long,
        }
    }
}

/// The dispatch-time view of a CLI or handler.
pub trait Container {
    fn name(&self) -> &str;

    fn about_text(&self) -> Option<&str>;

    /// First line of the about text, for listings.
    fn summary(&self) -> &str {
        self.about_text()
            .and_then(|a| a.trim().lines().next())
            .unwrap_or("")
    }

    fn version_text(&self) -> Option<&str>;

    /// The full default chain, framework layers first.
    fn defaults(&self) -> Defaults;

    fn options(&self) -> &[OptionDecl];

    /// Column at which listed command summaries start.
    fn padding(&self) -> usize;

    /// True for top-level CLIs, which also own the config file option.
    fn is_cli(&self) -> bool;

    /// Default of the `--config` option, for levels that have one.
    fn config_option(&self) -> Option<String> {
        None
    }
}

fn declare_option(own: &mut DefaultLayer, option: &OptionDecl) {
    if !option.default.is_null() {
        own.insert(option.name.replace('-', "_"), option.default.clone());
    }
}

/// Declaration of a top-level CLI.
#[derive(Debug, Clone)]
pub struct CliDef {
    name: String,
    about: Option<String>,
    version: Option<String>,
    framework: Defaults,
    own: DefaultLayer,
    options: Vec<OptionDecl>,
    commands: Vec<Rc<Command>>,
    column_padding: usize,
}

impl CliDef {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let base = DefaultLayer::new("Base")
            .set("cli", name.clone())
            .set("version", "UNKNOWN")
            .set("default_config", default_config_path(&name));

        let mut cli = DefaultLayer::new("Cli").set("debug", false).set("dryrun", false);
        if let Ok(cwd) = std::env::current_dir() {
            cli.insert("cwd", cwd.to_string_lossy().into_owned());
        }

        Self {
            own: DefaultLayer::new(name.clone()),
            name,
            about: None,
            version: None,
            framework: Defaults::new().derive(base).derive(cli),
            options: Vec::new(),
            commands: Vec::new(),
            column_padding: DEFAULT_COLUMN_PADDING,
        }
    }

    pub fn about(mut self, about: impl Into<String>) -> Self {
        self.about = Some(about.into());
        self
    }

    /// Sets the version printed by `--version`. Also declared as state.
    pub fn version(mut self, version: impl Into<String>) -> Self {
        let version = version.into();
        self.own.insert("version", version.clone());
        self.version = Some(version);
        self
    }

    /// Declares a default state value.
    pub fn state(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.own.insert(key, value);
        self
    }

    /// Adds an option to the CLI's own grammar.
    pub fn option(mut self, option: OptionDecl) -> Self {
        declare_option(&mut self.own, &option);
        self.options.push(option);
        self
    }

    /// Lists a command under this CLI.
    pub fn command(mut self, command: impl Into<Rc<Command>>) -> Self {
        self.commands.push(command.into());
        self
    }

    pub fn column_padding(mut self, padding: usize) -> Self {
        self.column_padding = padding;
        self
    }

    pub fn commands(&self) -> &[Rc<Command>] {
        &self.commands
    }

    /// The config file read when `--config` is not given.
    pub fn default_config(&self) -> String {
        self.defaults()
            .flatten()
            .get_str("default_config")
            .map(str::to_string)
            .unwrap_or_else(|| default_config_path(&self.name))
    }
}

impl Container for CliDef {
    fn name(&self) -> &str {
        &self.name
    }

    fn about_text(&self) -> Option<&str> {
        self.about.as_deref()
    }

    fn version_text(&self) -> Option<&str> {
        self.version.as_deref()
    }

    fn defaults(&self) -> Defaults {
        self.framework.derive(self.own.clone())
    }

    fn options(&self) -> &[OptionDecl] {
        &self.options
    }

    fn padding(&self) -> usize {
        self.column_padding
    }

    fn is_cli(&self) -> bool {
        true
    }

    fn config_option(&self) -> Option<String> {
        Some(self.default_config())
    }
}

/// Declaration of a handler: a named group of commands under a CLI.
#[derive(Debug, Clone)]
pub struct HandlerDef {
    name: String,
    cli: String,
    about: Option<String>,
    version: Option<String>,
    aliases: Vec<String>,
    framework: Defaults,
    own: DefaultLayer,
    options: Vec<OptionDecl>,
    commands: Vec<Rc<Command>>,
    column_padding: usize,
}

impl HandlerDef {
    pub fn new(name: impl Into<String>, cli: impl Into<String>) -> Self {
        let name = name.into();
        let cli = cli.into();
        let handler = DefaultLayer::new("Handler").set("cli", cli.clone());
        Self {
            own: DefaultLayer::new(name.clone()),
            name,
            cli,
            about: None,
            version: None,
            aliases: Vec::new(),
            framework: Defaults::new().derive(handler),
            options: Vec::new(),
            commands: Vec::new(),
            column_padding: DEFAULT_COLUMN_PADDING,
        }
    }

    pub fn about(mut self, about: impl Into<String>) -> Self {
        self.about = Some(about.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        let version = version.into();
        self.own.insert("version", version.clone());
        self.version = Some(version);
        self
    }

    pub fn state(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.own.insert(key, value);
        self
    }

    pub fn option(mut self, option: OptionDecl) -> Self {
        declare_option(&mut self.own, &option);
        self.options.push(option);
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn command(mut self, command: impl Into<Rc<Command>>) -> Self {
        self.commands.push(command.into());
        self
    }

    pub fn column_padding(mut self, padding: usize) -> Self {
        self.column_padding = padding;
        self
    }

    /// Name of the owning CLI.
    pub fn cli(&self) -> &str {
        &self.cli
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn commands(&self) -> &[Rc<Command>] {
        &self.commands
    }
}

impl Container for HandlerDef {
    fn name(&self) -> &str {
        &self.name
    }

    fn about_text(&self) -> Option<&str> {
        self.about.as_deref()
    }

    fn version_text(&self) -> Option<&str> {
        self.version.as_deref()
    }

    fn defaults(&self) -> Defaults {
        self.framework.derive(self.own.clone())
    }

    fn options(&self) -> &[OptionDecl] {
        &self.options
    }

    fn padding(&self) -> usize {
        self.column_padding
    }

    fn is_cli(&self) -> bool {
        false
    }
}

/// `~/.<name>/<name>.yaml`
pub fn default_config_path(name: &str) -> String {
    format!("~/.{name}/{name}.yaml")
}
