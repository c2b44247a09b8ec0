//! Top-level dispatch.
//!
//! A [`Cli`] runs one argv through the command tree:
//!
//! 1. parse argv against the level's grammar and take the command token,
//! 2. record the level's declared defaults, parsed options and config
//!    fragment,
//! 3. resolve the token under the level's key; a handler recurses with the
//!    residual argv, a leaf command parses it against its own grammar,
//! 4. compile the layered state and invoke the command.
//!
//! Nested levels only propagate failures. The single boundary in
//! [`Cli::call`] / [`Cli::main`] turns them into messages and an exit status:
//!
//! | Failure | Printed | Status |
//! |---------|---------|--------|
//! | `--help` / `--version` | help text / `name version` on stdout | 0 |
//! | no command token | usage | 1 |
//! | unknown command | `No such command: x` and the parent's `Commands:` | 1 |
//! | grammar mismatch | clap's message | 1 |
//! | [`exit(code)`](crate::exit) | its message, if any | `code` |
//! | interrupt | `Aborting.` | 1 |
//! | anything else | the error with its cause chain | 1 |

use std::collections::BTreeMap;
use std::rc::Rc;

use serde_json::Value;

use crate::autodoc;
use crate::command::Command;
use crate::config::{expand_path, Config};
use crate::container::{CliDef, Container};
use crate::context::Context;
use crate::error::{DispatchError, InvocationError, RegistryError};
use crate::grammar::{self, RawOptions, ARGS, COMMAND};
use crate::invocation::{self, normalize_key};
use crate::key::Key;
use crate::log::enable_logging;
use crate::output::{render_value, Console, Outcome};
use crate::registry::{Registry, Target};
use crate::state::{OptionFragment, State, StateCompiler};

/// A runnable CLI instance.
///
/// ```rust
/// use std::rc::Rc;
/// use battalion::{Args, Cli, CliDef, Command, Context, Registry};
///
/// let mut registry = Registry::new();
/// registry.define_cli(
///     CliDef::new("mycli").version("0.0.1").command(
///         Command::new("ping", |_ctx: &mut Context, _args: &Args| Ok::<_, anyhow::Error>("pong")),
///     ),
/// ).unwrap();
///
/// let cli = Cli::new(Rc::new(registry), "mycli").unwrap();
/// let outcome = cli.call(["ping"]);
/// assert_eq!(outcome.status, 0);
/// assert_eq!(outcome.stdout, "pong\n");
/// ```
pub struct Cli {
    registry: Rc<Registry>,
    def: Rc<CliDef>,
    overrides: BTreeMap<String, Value>,
}

impl Cli {
    /// Looks up the CLI `name` in `registry`.
    pub fn new(registry: Rc<Registry>, name: &str) -> Result<Self, RegistryError> {
        let def = registry
            .cli(name)
            .ok_or_else(|| RegistryError::UnknownCli(name.to_string()))?;
        Ok(Self {
            registry,
            def,
            overrides: BTreeMap::new(),
        })
    }

    /// Overrides a declared default for this instance only.
    ///
    /// Keys no default layer declares are ignored with a warning.
    pub fn with_state(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.overrides.insert(key.into(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        self.def.name()
    }

    /// The instance's defaults, before any config or option layering.
    pub fn state(&self) -> State {
        self.def.defaults().flatten_with(&self.overrides)
    }

    /// Runs `argv` (without the program name) with output captured.
    ///
    /// Never exits the process.
    pub fn call<I, T>(&self, argv: I) -> Outcome
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let argv: Vec<String> = argv.into_iter().map(Into::into).collect();
        self.execute(&argv, Console::captured())
    }

    /// Runs the process arguments, streaming output, and exits with the
    /// outcome's status.
    ///
    /// Ctrl-C prints `Aborting.` and exits with status 1.
    pub fn main(&self) -> ! {
        install_interrupt_handler();
        let argv: Vec<String> = std::env::args().skip(1).collect();
        let outcome = self.execute(&argv, Console::streaming());
        std::process::exit(outcome.status)
    }

    fn execute(&self, argv: &[String], console: Console) -> Outcome {
        let state = self.state();
        let mut run = Run {
            registry: Rc::clone(&self.registry),
            cli: Rc::clone(&self.def),
            compiler: StateCompiler::new(),
            default_config: state
                .get_str("default_config")
                .map(str::to_string)
                .unwrap_or_else(|| self.def.default_config()),
            config: None,
            console: console.clone(),
        };
        run.compiler.add_state(state);

        let result = run.dispatch(self.def.as_ref(), Key::cli(self.name()), argv);
        let (status, value) = match result {
            Ok(value) => {
                if let Some(text) = render_value(&value) {
                    console.out(&text);
                }
                (0, value)
            }
            Err(err) => (report(&err, &console), Value::Null),
        };

        let (stdout, stderr) = console.take();
        Outcome {
            status,
            value,
            stdout,
            stderr,
        }
    }
}

impl std::fmt::Debug for Cli {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cli")
            .field("name", &self.name())
            .field("overrides", &self.overrides)
            .finish_non_exhaustive()
    }
}

/// Buffers of one top-level run.
struct Run {
    registry: Rc<Registry>,
    cli: Rc<CliDef>,
    compiler: StateCompiler,
    /// Config file read when `--config` is not given.
    default_config: String,
    config: Option<Config>,
    console: Console,
}

impl Run {
    fn dispatch(
        &mut self,
        container: &dyn Container,
        key: Key,
        argv: &[String],
    ) -> anyhow::Result<Value> {
        let fallback = self.cli.version_text();
        let mut grammar_cmd = autodoc::container_grammar(&self.registry, container, &key, fallback);
        let raw = grammar::parse(&mut grammar_cmd, argv)?;

        let Some(token) = grammar::command_token(&raw).map(str::to_string) else {
            return Err(DispatchError::CommandExtraction {
                argv: argv.join(" "),
                usage: grammar_cmd.render_help().to_string(),
            }
            .into());
        };
        let residual = grammar::residual_args(&raw);

        if container.is_cli() {
            let level = if grammar::debug_requested(&raw) {
                tracing::Level::DEBUG
            } else {
                tracing::Level::WARN
            };
            enable_logging(level);
            self.load_config(&raw)?;
        }
        self.compiler.add_options(level_options(&raw));
        if let Some(config) = &self.config {
            self.compiler.add_config(config.fragment_for(&key));
        }

        let target = self.registry.get(&key.child(&token)).cloned();
        tracing::debug!("resolved {} under {} to {:?}", token, key, target);
        match target {
            None => Err(DispatchError::NoSuchCommand {
                name: token,
                commands: autodoc::commands_section(
                    &self.registry,
                    &key,
                    container.padding(),
                ),
                parent: key,
            }
            .into()),
            Some(Target::Handler(handler)) => {
                self.compiler.add_state(handler.defaults().flatten());
                let child = key.child(handler.name());
                self.dispatch(handler.as_ref(), child, &residual)
            }
            Some(Target::Command(command)) => {
                let child = key.child(command.name());
                self.execute_command(&command, child, &residual)
            }
            Some(Target::Cli(_)) => Err(InvocationError::NotACommand(key.child(&token)).into()),
        }
    }

    fn execute_command(
        &mut self,
        command: &Command,
        key: Key,
        argv: &[String],
    ) -> anyhow::Result<Value> {
        let mut grammar_cmd = autodoc::command_grammar(&self.registry, command, &key);
        let raw = grammar::parse(&mut grammar_cmd, argv)?;
        let supplied = invocation::supplied_args(command, &self.registry, &raw);
        let mut args = invocation::format_command_args(command, &self.registry, &raw);

        self.compiler.add_options(supplied.clone());
        if let Some(config) = &self.config {
            let fragment = config.fragment_for(&key);
            // Config beats declared defaults for the body's arguments too.
            for (name, value) in fragment.iter() {
                if let Some(slot) = args.get_mut(name) {
                    if !matches!(supplied.get(name), Some(Some(_))) {
                        *slot = Some(value.clone());
                    }
                }
            }
            self.compiler.add_config(fragment);
        }
        let state = self.compiler.compile();

        let mut ctx = Context::new(
            Rc::clone(&self.registry),
            Rc::clone(&self.cli),
            key.clone(),
            state,
            self.console.clone(),
        );
        invocation::invoke(&mut ctx, &key, command, &args, false)
    }

    fn load_config(&mut self, raw: &RawOptions) -> anyhow::Result<()> {
        let path = raw
            .get("--config")
            .and_then(Option::as_ref)
            .and_then(Value::as_str)
            .unwrap_or(&self.default_config);
        self.config = Config::load(&expand_path(path))?;
        Ok(())
    }
}

/// A container level's parsed options, minus the command token and residual.
fn level_options(raw: &RawOptions) -> OptionFragment {
    raw.iter()
        .filter(|(k, _)| k.as_str() != COMMAND && k.as_str() != ARGS)
        .map(|(k, v)| (normalize_key(k), v.clone()))
        .collect()
}

/// Reports Ctrl-C on the process streams and exits.
///
/// A handler installed earlier in the process (by an embedder, or by a
/// previous call) is left in place.
fn install_interrupt_handler() {
    let installed = ctrlc::set_handler(|| {
        let status = interrupted(&Console::streaming());
        std::process::exit(status)
    });
    if let Err(err) = installed {
        tracing::debug!("interrupt handler not installed: {}", err);
    }
}

fn interrupted(console: &Console) -> i32 {
    report(&anyhow::Error::from(DispatchError::Interrupted), console)
}

/// Prints `err` the way its kind asks for and returns the exit status.
fn report(err: &anyhow::Error, console: &Console) -> i32 {
    match err.downcast_ref::<DispatchError>() {
        Some(DispatchError::Exit { code, message }) => {
            if let Some(message) = message {
                let message = message.trim_end();
                if *code == 0 {
                    console.out(message);
                } else {
                    console.err(message);
                }
            }
            *code
        }
        Some(DispatchError::CommandExtraction { usage, .. }) => {
            console.err(usage.trim_end());
            1
        }
        Some(DispatchError::NoSuchCommand { commands, .. }) => {
            console.err(&err.to_string());
            if !commands.is_empty() {
                console.err("");
                console.err(commands);
            }
            1
        }
        Some(DispatchError::Grammar { message, .. }) => {
            console.err(message.trim_end());
            1
        }
        Some(DispatchError::Interrupted) => {
            console.err(&err.to_string());
            1
        }
        None => {
            tracing::debug!("uncaught error: {:?}", err);
            console.err(&format!("{:?}", err));
            1
        }
    }
}
